//! Diagnostic context extracted from a failed operation.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error;
use std::fmt::Write as _;
use std::panic::Location;
use std::path::Path;

use crate::hook::PanicSite;

/// Everything a capture needs to know about one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Source file the failure originated in.
    pub file: String,
    /// Line number of the origin.
    pub line: u32,
    /// Enclosing function of the origin.
    pub function: String,
    /// Failure kind: a panic class or the error's type name.
    pub kind: String,
    /// Primary message.
    pub message: String,
    /// Full diagnostic text written to the traceback file.
    pub trace: String,
}

impl Fault {
    /// Build a fault from a caught panic payload.
    ///
    /// Returns `None` when the payload carries no message; the caller is
    /// expected to resume the unwind in that case.
    pub(crate) fn from_panic(
        payload: &(dyn Any + Send),
        site: PanicSite,
        operation: &str,
    ) -> Option<Self> {
        let message = panic_message(payload)?;

        let backtrace = site.backtrace.to_string();
        let function = resolve_function(&backtrace, &site.file, site.line)
            .unwrap_or_else(|| short_function_name(operation));
        let kind = panic_kind(&message).to_string();

        let mut trace = header(&kind, &message, &site.file, site.line, &function);
        let _ = write!(trace, "\nstack backtrace:\n{}", backtrace);

        Some(Self {
            file: site.file,
            line: site.line,
            function,
            kind,
            message,
            trace,
        })
    }

    /// Build a fault from a caught panic whose site was never recorded,
    /// attributing it to the capturing call at `location`.
    pub(crate) fn from_unsited_panic(
        payload: &(dyn Any + Send),
        location: &Location<'_>,
        operation: &str,
    ) -> Option<Self> {
        let message = panic_message(payload)?;
        let kind = panic_kind(&message).to_string();
        let function = short_function_name(operation);

        let mut trace = header(&kind, &message, location.file(), location.line(), &function);
        let _ = write!(
            trace,
            "\npanic site not recorded, location is the capturing call\nstack backtrace:\n{}",
            Backtrace::force_capture()
        );

        Some(Self {
            file: location.file().to_string(),
            line: location.line(),
            function,
            kind,
            message,
            trace,
        })
    }

    /// Build a fault from an error value returned at `location`.
    pub fn from_error<E: Error>(err: &E, location: &Location<'_>, operation: &str) -> Self {
        let kind = short_type_name(std::any::type_name::<E>());
        let message = err.to_string();
        let function = short_function_name(operation);

        let mut trace = header(&kind, &message, location.file(), location.line(), &function);
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = writeln!(trace, "caused by: {}", cause);
            source = cause.source();
        }

        let backtrace = Backtrace::capture();
        match backtrace.status() {
            BacktraceStatus::Captured => {
                let _ = write!(trace, "\nstack backtrace:\n{}", backtrace);
            }
            _ => trace.push_str("\nstack backtrace: not captured (set RUST_BACKTRACE=1)\n"),
        }

        Self {
            file: location.file().to_string(),
            line: location.line(),
            function,
            kind,
            message,
            trace,
        }
    }
}

fn header(kind: &str, message: &str, file: &str, line: u32, function: &str) -> String {
    format!("{kind}: {message}\n  at {file}:{line} in {function}\n")
}

/// String payload of a panic, if it has one.
fn panic_message(payload: &(dyn Any + Send)) -> Option<String> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Some((*s).to_string())
    } else {
        payload.downcast_ref::<String>().cloned()
    }
}

/// Classify well-known core panics.
pub fn panic_kind(message: &str) -> &'static str {
    if message.starts_with("attempt to divide by zero")
        || message.starts_with("attempt to calculate the remainder with a divisor of zero")
    {
        "DivisionByZero"
    } else if message.starts_with("attempt to") && message.ends_with("with overflow") {
        "ArithmeticOverflow"
    } else if message.starts_with("index out of bounds")
        || message.starts_with("range start index")
        || message.starts_with("range end index")
        || message.starts_with("byte index")
    {
        "IndexOutOfBounds"
    } else if message.starts_with("called `Option::unwrap()` on a `None` value") {
        "UnwrapOnNone"
    } else if message.starts_with("called `Result::unwrap()` on an `Err` value") {
        "UnwrapOnErr"
    } else {
        "Panic"
    }
}

/// Find the function whose backtrace frame sits at `file:line`.
///
/// Works on the `Display` form of [`Backtrace`]: symbol lines (optionally
/// prefixed by a frame index) each followed by an `at path:line:col` line.
fn resolve_function(backtrace: &str, file: &str, line: u32) -> Option<String> {
    let mut symbol: Option<&str> = None;

    for raw in backtrace.lines() {
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }

        if let Some(position) = text.strip_prefix("at ") {
            let Some(name) = symbol else { continue };
            let mut parts = position.rsplitn(3, ':');
            let _column = parts.next();
            let frame_line = parts.next().and_then(|l| l.parse::<u32>().ok());
            let frame_path = parts.next();

            if let (Some(frame_line), Some(frame_path)) = (frame_line, frame_path) {
                if frame_line == line && same_source(frame_path, file) {
                    return Some(short_function_name(name));
                }
            }
        } else {
            symbol = Some(match text.split_once(": ") {
                Some((index, name)) if index.chars().all(|c| c.is_ascii_digit()) => name,
                _ => text,
            });
        }
    }

    None
}

fn same_source(frame_path: &str, file: &str) -> bool {
    let frame = Path::new(frame_path.trim_start_matches("./"));
    let file = Path::new(file.trim_start_matches("./"));
    frame.ends_with(file) || file.ends_with(frame)
}

/// Drop generic arguments, including nested ones.
fn strip_generics(path: &str) -> String {
    let mut depth = 0usize;
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn is_symbol_hash(segment: &str) -> bool {
    segment.len() == 17
        && segment.starts_with('h')
        && segment[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// `my_crate::jobs::run::{{closure}}` becomes `run`.
pub fn short_function_name(path: &str) -> String {
    let stripped = strip_generics(path);
    stripped
        .rsplit("::")
        .map(str::trim)
        .find(|segment| {
            !segment.is_empty() && !segment.starts_with('{') && !is_symbol_hash(segment)
        })
        .unwrap_or(path)
        .to_string()
}

/// `core::num::error::ParseIntError` becomes `ParseIntError`.
pub fn short_type_name(path: &str) -> String {
    let stripped = strip_generics(path);
    stripped
        .rsplit("::")
        .find(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}
