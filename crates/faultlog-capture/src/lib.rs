//! Faultlog Capture - turn failures of risky operations into stored records.
//!
//! Wrap an operation and, if it panics or returns an error, the failure is
//! recorded instead of propagated:
//!
//! 1. origin file, line, enclosing function, kind and message are extracted
//! 2. the full trace is written to `<log_dir>/<YYYYMMDDHHMMSS>-<uuid>.log`
//! 3. a row is saved to the `error_log` table (or the emergency log)
//! 4. the caller gets the record's [`ErrorSummary`] as `Err`
//!
//! # Example
//!
//! ```no_run
//! use faultlog_capture::{with_capture, ErrorStore};
//!
//! fn divide(a: i32, b: i32) -> i32 {
//!     a / b
//! }
//!
//! let store = ErrorStore::open("errors.db").unwrap();
//! let capture = with_capture("logs", store);
//!
//! let divide = capture.wrap(|(a, b): (i32, i32)| divide(a, b));
//! match divide((1, 0)) {
//!     Ok(value) => println!("{}", value),
//!     Err(summary) => println!("captured {}", summary.identifier),
//! }
//! ```
//!
//! The success and failure paths return different shapes on purpose: a
//! failure is absorbed and never re-raised.

mod capture;
pub mod config;
pub mod error;
pub mod fault;
mod hook;

pub use capture::{with_capture, ErrorCapture};
pub use config::{CaptureConfig, DEFAULT_LOG_DIR};
pub use error::{CaptureError, Result};
pub use fault::Fault;

pub use faultlog_storage::{EmergencyLog, ErrorRecord, ErrorStore, ErrorSummary, Persisted};
