use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from the environment at startup.
/// Deliberately env-var-driven rather than flag-driven, matching this
/// codebase's existing server configuration style.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub log_dir: PathBuf,
    pub max_backlog: usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let addr = env::var("NIMBUS_ADDR").unwrap_or_else(|_| "0.0.0.0:7070".to_string());
        let log_dir = env::var("NIMBUS_LOG_DIR")
            .unwrap_or_else(|_| "./logs".to_string())
            .into();
        let max_backlog = env_parsed("NIMBUS_MAX_BACKLOG").unwrap_or(1000);
        let heartbeat_interval_secs: u64 = env_parsed("NIMBUS_HEARTBEAT_INTERVAL_SECS").unwrap_or(5);
        let heartbeat_timeout_secs: u64 = env_parsed("NIMBUS_HEARTBEAT_TIMEOUT_SECS").unwrap_or(300);

        Self {
            addr,
            log_dir,
            max_backlog,
            heartbeat_interval: Duration::from_secs(heartbeat_interval_secs),
            heartbeat_timeout: Duration::from_secs(heartbeat_timeout_secs),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parsed_falls_back_on_missing_or_invalid() {
        assert_eq!(env_parsed::<usize>("NIMBUS_TEST_DOES_NOT_EXIST"), None);
    }
}
