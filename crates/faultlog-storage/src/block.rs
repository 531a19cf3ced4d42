//! Delimited text blocks shared by traceback dumps and the emergency log.

use chrono::Local;

/// Width of the pipe separator line.
pub const SEPARATOR_WIDTH: usize = 120;

/// Left padding applied to the timestamp line.
const TIMESTAMP_INDENT: usize = 50;

/// Render one block: separator, indented current timestamp, separator, body.
pub fn delimited_block(body: &str) -> String {
    let separator = "|".repeat(SEPARATOR_WIDTH);
    let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.6f");

    let mut block = format!(
        "\n{sep}\n{pad}{stamp}\n{sep}\n",
        sep = separator,
        pad = " ".repeat(TIMESTAMP_INDENT),
        stamp = stamp,
    );
    block.push_str(body);
    if !body.ends_with('\n') {
        block.push('\n');
    }
    block
}
