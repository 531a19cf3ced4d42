//! Capture configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use faultlog_storage::{DEFAULT_DB_PATH, DEFAULT_EMERGENCY_LOG};

/// Default directory for traceback dumps.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Where a capture facility keeps its data.
///
/// Every field has a default, so hosts can embed this in their own config and
/// only override what they need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Directory receiving one traceback file per capture.
    pub log_dir: PathBuf,
    /// SQLite database holding the `error_log` table.
    pub database_path: PathBuf,
    /// Fallback file used when the database rejects a write.
    pub emergency_log: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            emergency_log: PathBuf::from(DEFAULT_EMERGENCY_LOG),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.log_dir, PathBuf::from("logs"));
        assert_eq!(config.database_path, PathBuf::from("errors.db"));
        assert_eq!(config.emergency_log, PathBuf::from("unhandled_errors.log"));
    }

    #[test]
    fn test_partial_override() {
        let config: CaptureConfig =
            serde_json::from_str(r#"{"log_dir": "/var/log/myapp/tracebacks"}"#).unwrap();

        assert_eq!(config.log_dir, PathBuf::from("/var/log/myapp/tracebacks"));
        assert_eq!(config.database_path, PathBuf::from("errors.db"));
    }
}
