//! Emergency fallback log.
//!
//! Last-resort sink for diagnostics that could not reach the database. Blocks
//! are appended whole while holding a lock so concurrent writers never
//! interleave.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::error;

use crate::block::delimited_block;

/// Default emergency log location, relative to the working directory.
pub const DEFAULT_EMERGENCY_LOG: &str = "unhandled_errors.log";

/// Append-only plain text log of diagnostics that missed the primary store.
#[derive(Debug, Clone)]
pub struct EmergencyLog {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl EmergencyLog {
    /// Emergency log at a specific path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one delimited block containing `diagnostic`.
    ///
    /// Returns `false` if the block could not be written. The failure is
    /// logged and never propagated.
    pub fn append(&self, diagnostic: &str) -> bool {
        let block = delimited_block(diagnostic);

        // A poisoned lock still serializes writers.
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());

        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                file.write_all(block.as_bytes())?;
                file.flush()
            });

        match written {
            Ok(()) => true,
            Err(e) => {
                error!(
                    "Failed to write emergency log {:?}: {}\n{}",
                    self.path, e, diagnostic
                );
                false
            }
        }
    }
}

impl Default for EmergencyLog {
    fn default() -> Self {
        Self::new(DEFAULT_EMERGENCY_LOG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_append_creates_and_appends() {
        let dir = TempDir::new().unwrap();
        let log = EmergencyLog::new(dir.path().join("unhandled_errors.log"));

        assert!(log.append("first failure"));
        assert!(log.append("second failure"));

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.contains("first failure"));
        assert!(content.contains("second failure"));
        assert_eq!(content.matches(&"|".repeat(120)).count(), 4);
    }

    #[test]
    fn test_append_to_missing_directory_reports_failure() {
        let dir = TempDir::new().unwrap();
        let log = EmergencyLog::new(dir.path().join("missing").join("unhandled.log"));

        assert!(!log.append("lost"));
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let dir = TempDir::new().unwrap();
        let log = EmergencyLog::new(dir.path().join("unhandled_errors.log"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                thread::spawn(move || {
                    let body = format!("writer-{i}\n").repeat(200);
                    assert!(log.append(&body));
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(log.path()).unwrap();
        for i in 0..8 {
            let marker = format!("writer-{i}\n").repeat(200);
            assert!(content.contains(&marker), "block {} was split", i);
        }
    }

    #[test]
    fn test_default_path() {
        assert_eq!(
            EmergencyLog::default().path(),
            Path::new(DEFAULT_EMERGENCY_LOG)
        );
    }
}
