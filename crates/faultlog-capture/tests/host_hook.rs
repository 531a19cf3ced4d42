//! Interaction with panic hooks installed by the host application.
//!
//! Kept in its own test binary: replacing the process-wide hook would
//! otherwise race with captures in other tests.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use faultlog_capture::{with_capture, EmergencyLog, ErrorStore};
use tempfile::TempDir;

static HOST_REPORTS: AtomicUsize = AtomicUsize::new(0);

fn host_reports() -> usize {
    HOST_REPORTS.load(Ordering::SeqCst)
}

#[test]
fn captures_survive_host_hooks() {
    let dir = TempDir::new().unwrap();
    let store = ErrorStore::in_memory()
        .unwrap()
        .with_emergency_log(EmergencyLog::new(dir.path().join("unhandled_errors.log")));
    let capture = with_capture(dir.path().join("logs"), store);

    panic::set_hook(Box::new(|_| {
        HOST_REPORTS.fetch_add(1, Ordering::SeqCst);
    }));

    // Payloads without a message are resumed, and the host still hears about them.
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let _ = capture.run(|| panic::panic_any(404_u16));
    }));
    assert_eq!(outcome.unwrap_err().downcast_ref::<u16>(), Some(&404));
    assert_eq!(host_reports(), 1);
    assert_eq!(capture.store().count().unwrap(), 0);

    // Captured panics stay quiet.
    let first = capture.run(|| -> u32 { panic!("before host hook") }).unwrap_err();
    assert_eq!(first.error_text, "before host hook");
    assert_eq!(host_reports(), 1);

    // Host replaces the hook without chaining ours.
    panic::set_hook(Box::new(|_| {
        HOST_REPORTS.fetch_add(1, Ordering::SeqCst);
    }));

    let line = line!() + 1;
    let guarded = || capture.run(|| -> u32 { panic!("after host hook") });
    let outcome = panic::catch_unwind(AssertUnwindSafe(guarded));
    let second = outcome.expect("panic escaped the wrapped call").unwrap_err();
    assert_eq!(second.error_text, "after host hook");
    assert_eq!(second.error_lnno, line);
    assert!(second.error_file.ends_with("host_hook.rs"));
    assert_eq!(host_reports(), 2);

    // The capture hook is chained back in for the next failure.
    let line = line!() + 1;
    let third = capture.run(|| -> u32 { panic!("hook restored") }).unwrap_err();
    assert_eq!(third.error_text, "hook restored");
    assert_eq!(third.error_lnno, line);
    assert_eq!(host_reports(), 2);

    assert_eq!(capture.store().count().unwrap(), 3);
}
