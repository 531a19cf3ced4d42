//! Database repositories for each table.

pub mod error_log;

pub use error_log::ErrorLogRepo;
