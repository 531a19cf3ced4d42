//! Process-wide panic hook that records panic sites for active capture scopes.
//!
//! Outside a scope the previously installed hook runs unchanged. Inside one,
//! the location and a forced backtrace of a panic carrying a message are
//! stashed in a thread-local slot and the default stderr report is suppressed.
//! Host applications that set their own hook must chain the existing one via
//! `panic::take_hook`; a hook that does not is detected on the next capture
//! and ours is chained in front of it again.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::panic;
use std::sync::Mutex;

use tracing::{debug, warn};

/// Where a captured panic was raised.
#[derive(Debug)]
pub(crate) struct PanicSite {
    pub file: String,
    pub line: u32,
    pub backtrace: Backtrace,
}

thread_local! {
    static SCOPE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

/// Serializes hook chaining; true once our hook has been installed.
static INSTALLED: Mutex<bool> = Mutex::new(false);

fn has_message(payload: &(dyn Any + Send)) -> bool {
    payload.is::<&str>() || payload.is::<String>()
}

/// Chain our hook in front of whatever hook is current.
fn chain_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let depth = SCOPE_DEPTH.try_with(Cell::get).unwrap_or(0);
        if depth == 0 {
            previous(info);
            return;
        }

        // Payloads without a message are resumed, not captured; report them now.
        if !has_message(info.payload()) {
            previous(info);
            return;
        }

        let site = info.location().map(|location| PanicSite {
            file: location.file().to_string(),
            line: location.line(),
            backtrace: Backtrace::force_capture(),
        });
        debug!("Recording panic for capture: {}", info);
        let _ = LAST_PANIC.try_with(|slot| *slot.borrow_mut() = site);
    }));
}

fn install() {
    let mut installed = INSTALLED.lock().unwrap_or_else(|p| p.into_inner());
    if !*installed {
        chain_hook();
        *installed = true;
    }
}

/// Put our hook back after a host replaced it without chaining.
pub(crate) fn reinstall() {
    let mut installed = INSTALLED.lock().unwrap_or_else(|p| p.into_inner());
    warn!("Panic hook was replaced without chaining; reinstalling capture hook");
    chain_hook();
    *installed = true;
}

/// Marks the current thread as capturing panics until dropped.
pub(crate) struct CaptureScope {
    // Thread-local bookkeeping; the scope must end on the thread it began.
    _not_send: PhantomData<*const ()>,
}

impl CaptureScope {
    pub fn enter() -> Self {
        install();
        LAST_PANIC.with(|slot| slot.borrow_mut().take());
        SCOPE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self {
            _not_send: PhantomData,
        }
    }

    /// Take the site of the most recent panic on this thread, if any.
    pub fn take_panic_site(&self) -> Option<PanicSite> {
        LAST_PANIC.with(|slot| slot.borrow_mut().take())
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        let _ = SCOPE_DEPTH.try_with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}
