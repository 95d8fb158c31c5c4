use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use crate::services::completion::{CompletionPolicy, EarlyExitCheck};
use crate::services::parameters::ParameterScope;
use crate::services::selector::SelectionConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub parameter_scope: ParameterScope,
    pub selection: SelectionConfig,
    pub completion: CompletionPolicy,
    pub random_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 3000,
            log_level: "info".to_string(),
            parameter_scope: ParameterScope::default(),
            selection: SelectionConfig::default(),
            completion: CompletionPolicy::default(),
            random_seed: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unparsable values keep their
    /// default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = parsed(&lookup, "PORT").unwrap_or(defaults.port);
        let host = parsed(&lookup, "HOST").unwrap_or(defaults.host);
        let log_level = lookup("RUST_LOG").unwrap_or(defaults.log_level);

        let parameter_scope = parsed(&lookup, "ADAPT_PARAMETER_SCOPE").unwrap_or(defaults.parameter_scope);

        let first_problem = match lookup("ADAPT_FIRST_PROBLEM") {
            Some(value) if value.trim().is_empty() => None,
            Some(value) => Some(value.trim().to_string()),
            None => defaults.selection.first_problem,
        };

        let pretest_cutoff = match lookup("ADAPT_PRETEST_CUTOFF") {
            Some(value) if value.trim().eq_ignore_ascii_case("off") => None,
            Some(value) => match value.trim().parse::<f64>() {
                Ok(cutoff) if (0.0..=1.0).contains(&cutoff) => Some(cutoff),
                _ => {
                    tracing::warn!(key = "ADAPT_PRETEST_CUTOFF", value = %value, "invalid value, using default");
                    defaults.completion.pretest_cutoff
                }
            },
            None => defaults.completion.pretest_cutoff,
        };

        let attention_checks = lookup("ADAPT_ATTENTION_CHECKS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let min_attention_correct =
            parsed(&lookup, "ADAPT_MIN_ATTENTION_CORRECT").unwrap_or(defaults.completion.min_attention_correct);
        let early_exit: EarlyExitCheck =
            parsed(&lookup, "ADAPT_EARLY_EXIT_CHECK").unwrap_or(defaults.completion.early_exit);
        let random_seed = parsed(&lookup, "ADAPT_RANDOM_SEED");

        Self {
            host,
            port,
            log_level,
            parameter_scope,
            selection: SelectionConfig { first_problem },
            completion: CompletionPolicy {
                pretest_cutoff,
                attention_checks,
                min_attention_correct,
                early_exit,
            },
            random_seed,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = lookup(key)?;
    match value.trim().parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key, value = %value, "invalid value, using default");
            None
        }
    }
}
