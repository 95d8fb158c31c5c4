use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::config::Config;
use crate::db::{MemoryStore, Storage};
use crate::services::reports::ReportService;
use crate::services::tutor::{TutorParts, TutorService};

#[derive(Clone)]
pub struct AppState {
    tutor: Arc<TutorService>,
    reports: Arc<ReportService>,
    started_at: Instant,
    started_at_system: SystemTime,
}

impl AppState {
    pub fn new(store: Arc<dyn Storage>, parts: TutorParts) -> Self {
        let tutor = TutorService::new(store, parts);
        let reports = ReportService::new(tutor.catalog().clone(), tutor.log().clone(), tutor.progress().clone());
        Self {
            tutor: Arc::new(tutor),
            reports: Arc::new(reports),
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
        }
    }

    /// In-memory store wired from the process config.
    pub fn from_config(config: &Config) -> Self {
        Self::new(Arc::new(MemoryStore::new()), TutorParts::from_config(config))
    }

    pub fn tutor(&self) -> &TutorService {
        &self.tutor
    }

    pub fn reports(&self) -> &ReportService {
        &self.reports
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }
}
