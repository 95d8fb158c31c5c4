use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn setup_course(app: &Router) {
    let (status, _) = send(app, Method::POST, "/api/v1/course", Some(json!({ "course_id": "c1" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    for skill in ["center", "None"] {
        let (status, _) = send(
            app,
            Method::POST,
            "/api/v1/course/c1/skill",
            Some(json!({ "skill_name": skill })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    for (name, pretest, posttest) in [
        ("Pre_assessment_0", true, false),
        ("b1", false, false),
        ("Post_assessment_0", false, true),
    ] {
        let (status, _) = send(
            app,
            Method::POST,
            "/api/v1/course/c1/problem",
            Some(json!({
                "problem_name": name,
                "tutor_url": format!("https://tutor.example/{name}"),
                "skills": ["center"],
                "pretest": pretest,
                "posttest": posttest,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, _) = send(
        app,
        Method::POST,
        "/api/v1/parameters",
        Some(json!({
            "course_id": "c1",
            "user_id": "alice",
            "skill_name": "center",
            "params": { "pi": 0.1, "pt": 0.5, "pg": 0.25, "ps": 0.25, "threshold": 0.99 },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_health_root() {
    let app = common::create_test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_health_live() {
    let app = common::create_test_app();
    let (status, body) = send(&app, Method::GET, "/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let app = common::create_test_app();
    let (status, body) = send(&app, Method::GET, "/api/v1/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_duplicate_course_conflicts() {
    let app = common::create_test_app();
    setup_course(&app).await;
    let (status, body) = send(&app, Method::POST, "/api/v1/course", Some(json!({ "course_id": "c1" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_problem_with_unknown_skill_rejected() {
    let app = common::create_test_app();
    setup_course(&app).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/course/c1/problem",
        Some(json!({ "problem_name": "b9", "tutor_url": "u", "skills": ["geometry"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, Method::GET, "/api/v1/course/c1/skill/center", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_learner_walkthrough() {
    let app = common::create_test_app();
    setup_course(&app).await;

    let (status, body) = send(&app, Method::POST, "/api/v1/course/c1/user", Some(json!({ "user_id": "alice" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["selected"], true);

    let (status, body) = send(&app, Method::GET, "/api/v1/course/c1/user/alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["next"]["problem_name"], "Pre_assessment_0");
    assert_eq!(body["data"]["okay"], true);
    assert_eq!(body["data"]["done_with_current"], true);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/course/c1/user/alice/pageload",
        Some(json!({ "problem": "Pre_assessment_0", "unix_seconds": 1_700_000_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send(&app, Method::GET, "/api/v1/course/c1/user/alice", None).await;
    assert_eq!(body["data"]["current"]["problem_name"], "Pre_assessment_0");
    assert_eq!(body["data"]["done_with_current"], false);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/course/c1/user/alice/interaction",
        Some(json!({ "problem": "Pre_assessment_0", "correct": 0, "attempt": 1, "unix_seconds": 1_700_000_010 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["stored"], true);

    let (_, body) = send(&app, Method::GET, "/api/v1/course/c1/user/alice", None).await;
    assert_eq!(body["data"]["next"]["problem_name"], "b1");
    assert_eq!(body["data"]["done_with_current"], true);

    let (_, body) = send(&app, Method::GET, "/api/v1/course/c1/user/alice/estimates", None).await;
    assert_eq!(body["data"]["phase"], "main");
    assert_eq!(body["data"]["skills"][0]["skill"], "center");

    for (problem, ts) in [("b1", 1_700_000_020), ("Post_assessment_0", 1_700_000_030)] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/course/c1/user/alice/interaction",
            Some(json!({ "problem": problem, "correct": true, "attempt": 1, "unix_seconds": ts })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = send(&app, Method::GET, "/api/v1/course/c1/user/alice", None).await;
    assert_eq!(body["data"]["next"]["done"], true);
    assert_eq!(body["data"]["done_with_course"], true);

    let (_, body) = send(&app, Method::GET, "/api/v1/course/c1/user", None).await;
    assert_eq!(body["data"]["finished"], json!(["alice"]));

    let (_, body) = send(&app, Method::GET, "/api/v1/data/trajectory/course/c1/user/alice", None).await;
    assert_eq!(body["data"]["trajectories"]["all"], json!([false, true, true]));
    assert_eq!(body["data"]["trajectories"]["posttest"], json!([true]));

    let (_, body) = send(&app, Method::GET, "/api/v1/data/logs/course/c1/user/alice", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_missing_parameters_do_not_fail_interaction() {
    let app = common::create_test_app();
    setup_course(&app).await;
    send(&app, Method::POST, "/api/v1/course/c1/user", Some(json!({ "user_id": "bob" }))).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/course/c1/user/bob/interaction",
        Some(json!({ "problem": "Pre_assessment_0", "correct": true, "attempt": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["data"]["selection_error"].as_str().unwrap().contains("center"));

    let (_, body) = send(&app, Method::GET, "/api/v1/course/c1/user/bob", None).await;
    assert_eq!(body["data"]["okay"], false);
    assert!(body["data"]["next"]["error"].is_string());
}

#[tokio::test]
async fn test_interaction_validation() {
    let app = common::create_test_app();
    setup_course(&app).await;
    send(&app, Method::POST, "/api/v1/course/c1/user", Some(json!({ "user_id": "alice" }))).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/course/c1/user/alice/interaction",
        Some(json!({ "problem": "Pre_assessment_0", "correct": 3, "attempt": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/course/c1/user/alice/interaction",
        Some(json!({ "problem": "Pre_assessment_0", "correct": true, "attempt": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/course/c1/user/alice/interaction",
        Some(json!({ "problem": "nope", "correct": true, "attempt": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_parameter_scope_requires_user() {
    let app = common::create_test_app();
    setup_course(&app).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/parameters",
        Some(json!({
            "course_id": "c1",
            "skill_name": "center",
            "params": { "pi": 0.1, "pt": 0.5, "pg": 0.25, "ps": 0.25, "threshold": 0.99 },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/parameters/bulk",
        Some(json!({
            "course_id": "c1",
            "user_id": "carol",
            "params": { "pi": 0.2, "pt": 0.4, "pg": 0.2, "ps": 0.1, "threshold": 0.95 },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["skills"], json!(["center", "None"]));

    let (_, body) = send(&app, Method::GET, "/api/v1/parameters", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_experiment_subjects() {
    let app = common::create_test_app();
    setup_course(&app).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/course/c1/experiment",
        Some(json!({ "experiment_name": "fall", "start_time": 0, "end_time": 1_800_000_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    send(&app, Method::POST, "/api/v1/course/c1/user", Some(json!({ "user_id": "alice" }))).await;
    send(
        &app,
        Method::POST,
        "/api/v1/course/c1/user/alice/interaction",
        Some(json!({ "problem": "Post_assessment_0", "correct": 1, "attempt": 1, "unix_seconds": 1_700_000_000 })),
    )
    .await;

    let (_, body) = send(&app, Method::GET, "/api/v1/data/subjects/course/c1/experiment/fall", None).await;
    assert_eq!(body["data"], json!(["alice"]));

    let (status, _) = send(&app, Method::DELETE, "/api/v1/course/c1/experiment/fall", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, "/api/v1/course/c1/experiment/fall", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
