use std::path::PathBuf;

use chrono::TimeDelta;
use widgetdash_core::staleness::DEFAULT_STALE_AFTER_SECS;

/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for a local backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the backend API, without a trailing slash.
    pub api_url: String,
    /// File holding the persisted session (token + user).
    pub session_file: PathBuf,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Age in seconds after which cached widget data is refetched
    /// (default: `300`).
    pub stale_after_secs: i64,
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                     |
    /// |---------------------------|-----------------------------|
    /// | `DASHBOARD_API_URL`       | `http://localhost:8000/api` |
    /// | `DASHBOARD_SESSION_FILE`  | `.widgetdash/session.json`  |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                        |
    /// | `WIDGET_STALE_AFTER_SECS` | `300`                       |
    pub fn from_env() -> Self {
        let api_url = std::env::var("DASHBOARD_API_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api".into())
            .trim_end_matches('/')
            .to_string();

        let session_file = std::env::var("DASHBOARD_SESSION_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(".widgetdash/session.json"));

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let stale_after_secs: i64 = std::env::var("WIDGET_STALE_AFTER_SECS")
            .unwrap_or_else(|_| DEFAULT_STALE_AFTER_SECS.to_string())
            .parse()
            .expect("WIDGET_STALE_AFTER_SECS must be a valid i64");

        Self {
            api_url,
            session_file,
            request_timeout_secs,
            stale_after_secs,
        }
    }

    /// Staleness threshold for the dashboard orchestrator.
    pub fn stale_after(&self) -> TimeDelta {
        TimeDelta::seconds(self.stale_after_secs)
    }
}
