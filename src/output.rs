//! Progress reporting helpers.
//!
//! All user-facing progress goes through a caller-supplied writer so tests
//! can capture it and the binary can point it at stderr. Write failures are
//! swallowed: losing a progress line must never fail an installation.

use std::io::Write;

/// Writes a single progress line.
pub fn write_line(writer: &mut dyn Write, line: &str) {
    let _ = writeln!(writer, "{line}");
}

/// Writes the opening half of a two-part progress line, without a newline.
///
/// Pair with [`finish_progress`] once the outcome is known, producing lines
/// like `[FILE] /cache/zlib-1.3.tar.gz... [FOUND]`.
pub fn start_progress(writer: &mut dyn Write, tag: &str, subject: &str) {
    let _ = write!(writer, "[{tag}] {subject}... ");
    let _ = writer.flush();
}

/// Completes a line opened by [`start_progress`].
pub fn finish_progress(writer: &mut dyn Write, verdict: &str) {
    let _ = writeln!(writer, "[{verdict}]");
}

/// Writes a stage header set off by blank lines.
pub fn write_stage_header(writer: &mut dyn Write, title: &str) {
    let _ = writeln!(writer, "\n{title}\n");
}
