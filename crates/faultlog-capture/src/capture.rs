//! The capture facility: run operations, turn failures into stored records.

use std::any::type_name;
use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe, Location};
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use faultlog_storage::{
    delimited_block, generate_identifier, EmergencyLog, ErrorRecord, ErrorStore, ErrorSummary,
    NewErrorRecord, Persisted,
};

use crate::config::{CaptureConfig, DEFAULT_LOG_DIR};
use crate::error::Result;
use crate::fault::Fault;
use crate::hook::{self, CaptureScope};

/// Captures failures of wrapped operations into an [`ErrorStore`].
///
/// A failed operation never propagates: the caller receives the
/// [`ErrorSummary`] of the stored record as `Err` instead. Clones share the
/// same store.
///
/// Panics are observed through a process-wide panic hook. A host installing
/// its own hook should chain the previous one obtained from
/// `std::panic::take_hook`. If it does not, the next captured panic is
/// attributed to the capturing call site and the hook is chained in again.
#[derive(Clone)]
pub struct ErrorCapture {
    store: ErrorStore,
    log_dir: PathBuf,
}

impl ErrorCapture {
    /// Capture into `store`, writing tracebacks under `logs/`.
    pub fn new(store: ErrorStore) -> Self {
        Self {
            store,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }

    /// Write tracebacks under `log_dir` instead.
    pub fn with_log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = log_dir.into();
        self
    }

    /// Open the store described by `config` and build a facility around it.
    pub fn from_config(config: &CaptureConfig) -> Result<Self> {
        let store = ErrorStore::open(&config.database_path)?
            .with_emergency_log(EmergencyLog::new(&config.emergency_log));
        fs::create_dir_all(&config.log_dir)?;

        info!("Capturing errors into {:?}", config.database_path);
        Ok(Self::new(store).with_log_dir(&config.log_dir))
    }

    pub fn store(&self) -> &ErrorStore {
        &self.store
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Persist one fault: traceback file, then the store record.
    pub fn capture_error(&self, fault: Fault) -> ErrorSummary {
        let error_tbck = self.write_traceback(&fault);

        let record = ErrorRecord::new(NewErrorRecord {
            error_file: fault.file,
            error_lnno: fault.line,
            error_text: fault.message,
            error_func: fault.function,
            error_type: fault.kind,
            error_tbck,
        });

        if self.store.save(&record) == Persisted::Stored {
            info!(
                "Captured {} in {} ({})",
                record.error_type, record.error_func, record.identifier
            );
        }

        record.summary()
    }

    /// Run `op`, capturing a panic.
    #[track_caller]
    pub fn run<T, F>(&self, op: F) -> std::result::Result<T, ErrorSummary>
    where
        F: FnOnce() -> T,
    {
        self.guard(type_name::<F>(), Location::caller(), op)
    }

    /// Run `op`, capturing a panic or a returned error.
    ///
    /// Errors are attributed to the line calling this method.
    #[track_caller]
    pub fn run_fallible<T, E, F>(&self, op: F) -> std::result::Result<T, ErrorSummary>
    where
        E: Error,
        F: FnOnce() -> std::result::Result<T, E>,
    {
        let location = Location::caller();
        let operation = type_name::<F>();

        match self.guard(operation, location, op) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.capture_error(Fault::from_error(&e, location, operation))),
            Err(summary) => Err(summary),
        }
    }

    /// Wrap `f` so every call captures its panics.
    ///
    /// Multi-argument functions take their arguments as a tuple.
    #[track_caller]
    pub fn wrap<A, T, F>(&self, f: F) -> impl Fn(A) -> std::result::Result<T, ErrorSummary>
    where
        F: Fn(A) -> T,
    {
        let capture = self.clone();
        let location = Location::caller();
        let operation = type_name::<F>();
        move |args| capture.guard(operation, location, || f(args))
    }

    /// Wrap a fallible `f` so every call captures its panics and errors.
    ///
    /// Errors are attributed to the line that wrapped `f`.
    #[track_caller]
    pub fn wrap_fallible<A, T, E, F>(
        &self,
        f: F,
    ) -> impl Fn(A) -> std::result::Result<T, ErrorSummary>
    where
        E: Error,
        F: Fn(A) -> std::result::Result<T, E>,
    {
        let capture = self.clone();
        let location = Location::caller();
        let operation = type_name::<F>();
        move |args| match capture.guard(operation, location, || f(args)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(capture.capture_error(Fault::from_error(&e, location, operation))),
            Err(summary) => Err(summary),
        }
    }

    fn guard<T>(
        &self,
        operation: &str,
        location: &Location<'_>,
        op: impl FnOnce() -> T,
    ) -> std::result::Result<T, ErrorSummary> {
        let scope = CaptureScope::enter();
        let outcome = panic::catch_unwind(AssertUnwindSafe(op));
        let site = scope.take_panic_site();
        drop(scope);

        let payload = match outcome {
            Ok(value) => return Ok(value),
            Err(payload) => payload,
        };

        let fault = match site {
            Some(site) => Fault::from_panic(payload.as_ref(), site, operation),
            None => {
                let fault = Fault::from_unsited_panic(payload.as_ref(), location, operation);
                // A message but no site means our hook is no longer in the chain.
                if fault.is_some() {
                    hook::reinstall();
                }
                fault
            }
        };

        match fault {
            Some(fault) => Err(self.capture_error(fault)),
            // No message: not ours to absorb.
            None => panic::resume_unwind(payload),
        }
    }

    /// Write the traceback file, returning its path.
    ///
    /// Falls back to the emergency log so the returned path always points at
    /// a file holding the trace.
    fn write_traceback(&self, fault: &Fault) -> String {
        match self.try_write_traceback(fault) {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(
                    "Failed to write traceback under {:?}, using emergency log: {}",
                    self.log_dir, e
                );
                let emergency = self.store.emergency_log();
                emergency.append(&fault.trace);
                emergency.path().to_string_lossy().into_owned()
            }
        }
    }

    fn try_write_traceback(&self, fault: &Fault) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.log_dir)?;

        let name = format!(
            "{}-{}.log",
            Local::now().format("%Y%m%d%H%M%S"),
            generate_identifier()
        );
        let path = self.log_dir.join(name);

        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(delimited_block(&fault.trace).as_bytes())?;
        file.flush()?;

        Ok(path)
    }
}

/// Build a capture facility writing tracebacks under `log_dir`.
pub fn with_capture(log_dir: impl Into<PathBuf>, store: ErrorStore) -> ErrorCapture {
    ErrorCapture::new(store).with_log_dir(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::ParseIntError;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ErrorCapture) {
        let dir = TempDir::new().unwrap();
        let store = ErrorStore::in_memory()
            .unwrap()
            .with_emergency_log(EmergencyLog::new(dir.path().join("unhandled_errors.log")));
        let capture = with_capture(dir.path().join("logs"), store);
        (dir, capture)
    }

    fn parse_port(raw: &str) -> std::result::Result<u16, ParseIntError> {
        raw.parse()
    }

    #[test]
    fn test_success_passes_value_through() {
        let (_dir, capture) = setup();

        assert_eq!(capture.run(|| 2 + 2), Ok(4));
        assert_eq!(capture.store().count().unwrap(), 0);
    }

    #[test]
    fn test_panic_is_captured() {
        let (_dir, capture) = setup();

        let line = line!() + 1;
        let summary = capture.run(|| -> u32 { panic!("ledger closed") }).unwrap_err();

        assert_eq!(summary.error_text, "ledger closed");
        assert_eq!(summary.error_type, "Panic");
        assert_eq!(summary.error_lnno, line);
        assert!(summary.error_file.ends_with("capture.rs"));

        let stored = capture.store().get(&summary.identifier).unwrap().unwrap();
        assert_eq!(stored.summary(), summary);
    }

    #[test]
    fn test_traceback_file_contains_message() {
        let (dir, capture) = setup();

        let summary = capture
            .run(|| -> u32 { panic!("cache shard unreachable") })
            .unwrap_err();

        let path = Path::new(&summary.error_tbck);
        assert!(path.starts_with(dir.path().join("logs")));
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("cache shard unreachable"));
        assert!(content.contains(&"|".repeat(120)));
    }

    #[test]
    fn test_fallible_error_is_captured() {
        let (_dir, capture) = setup();

        let line = line!() + 1;
        let summary = capture.run_fallible(|| parse_port("http")).unwrap_err();

        assert_eq!(summary.error_type, "ParseIntError");
        assert_eq!(summary.error_text, "invalid digit found in string");
        assert_eq!(summary.error_lnno, line);
        assert_eq!(capture.store().count().unwrap(), 1);
    }

    #[test]
    fn test_fallible_success() {
        let (_dir, capture) = setup();
        assert_eq!(capture.run_fallible(|| parse_port("8080")), Ok(8080));
    }

    #[test]
    fn test_wrap_fn_item() {
        let (_dir, capture) = setup();
        let guarded = capture.wrap_fallible(parse_port);

        assert_eq!(guarded("443"), Ok(443));
        let summary = guarded("-1").unwrap_err();
        assert_eq!(summary.error_func, "parse_port");
        assert_eq!(summary.error_type, "ParseIntError");
    }

    #[test]
    fn test_non_string_payload_propagates() {
        let (_dir, capture) = setup();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let _ = capture.run(|| panic::panic_any(7_i32));
        }));

        let payload = outcome.unwrap_err();
        assert_eq!(payload.downcast_ref::<i32>(), Some(&7));
        assert_eq!(capture.store().count().unwrap(), 0);
    }

    #[test]
    fn test_unwritable_log_dir_uses_emergency_log() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file in the way").unwrap();

        let emergency = EmergencyLog::new(dir.path().join("unhandled_errors.log"));
        let store = ErrorStore::in_memory()
            .unwrap()
            .with_emergency_log(emergency.clone());
        let capture = with_capture(&blocker, store);

        let summary = capture.run(|| -> u32 { panic!("disk full") }).unwrap_err();

        assert_eq!(Path::new(&summary.error_tbck), emergency.path());
        let content = fs::read_to_string(emergency.path()).unwrap();
        assert!(content.contains("disk full"));
        assert!(capture.store().get(&summary.identifier).unwrap().is_some());
    }

    #[test]
    fn test_from_config_creates_layout() {
        let dir = TempDir::new().unwrap();
        let config = CaptureConfig {
            log_dir: dir.path().join("tracebacks"),
            database_path: dir.path().join("data").join("errors.db"),
            emergency_log: dir.path().join("unhandled_errors.log"),
        };

        let capture = ErrorCapture::from_config(&config).unwrap();

        assert!(config.log_dir.is_dir());
        assert!(config.database_path.exists());
        assert_eq!(capture.log_dir(), config.log_dir.as_path());
        assert_eq!(
            capture.store().emergency_log().path(),
            config.emergency_log.as_path()
        );
    }
}
