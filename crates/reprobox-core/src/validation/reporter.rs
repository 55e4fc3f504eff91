//! Human-facing task lines and diagnostics emitted during validation.
//!
//! Structured logs go through `tracing`; a [`Reporter`] is what a person
//! watching `reprobox validate` reads.

use std::io::Write;

/// Indentation applied to diagnostic output.
pub const DIAGNOSTIC_INDENT: usize = 4;

/// Sink for task progress and mismatch diagnostics.
pub trait Reporter {
    /// A task (e.g. `Compiling`) has started.
    fn task_start(&mut self, task: &str);

    /// A task finished with the given status (e.g. `OK`, `UNEXPECTED: FAIL`).
    fn task_end(&mut self, task: &str, status: &str);

    /// An already formatted diagnostic block.
    fn diagnostic(&mut self, block: &str);

    /// A free-form message, e.g. why a build failed.
    fn message(&mut self, text: &str);
}

/// Prefix every line that is not whitespace-only with `width` spaces.
pub fn indent(text: &str, width: usize) -> String {
    let prefix = " ".repeat(width);
    text.split_inclusive('\n')
        .map(|line| {
            if line.trim().is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect()
}

/// Diagnostic block for a mismatched test: a blank line, then the indented
/// response text.
pub fn format_diagnostic(response: &str) -> String {
    format!("\n{}", indent(response, DIAGNOSTIC_INDENT))
}

/// Writes task lines as `<task>: <status>` and diagnostics verbatim.
pub struct ConsoleReporter<W: Write> {
    out: W,
}

impl ConsoleReporter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

// Write failures on the progress stream are ignored; the report carries the
// same information.
impl<W: Write> Reporter for ConsoleReporter<W> {
    fn task_start(&mut self, task: &str) {
        write!(self.out, "{task}: ").ok();
        self.out.flush().ok();
    }

    fn task_end(&mut self, _task: &str, status: &str) {
        writeln!(self.out, "{status}").ok();
    }

    fn diagnostic(&mut self, block: &str) {
        writeln!(self.out, "{block}").ok();
    }

    fn message(&mut self, text: &str) {
        writeln!(self.out, "{text}").ok();
    }
}

/// Discards everything; used when reporting is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn task_start(&mut self, _task: &str) {}
    fn task_end(&mut self, _task: &str, _status: &str) {}
    fn diagnostic(&mut self, _block: &str) {}
    fn message(&mut self, _text: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indent_skips_blank_lines() {
        let text = "line one\n\n  line two\n";
        assert_eq!(indent(text, 4), "    line one\n\n      line two\n");
    }

    #[test]
    fn test_indent_without_trailing_newline() {
        assert_eq!(indent("a\nb", 2), "  a\n  b");
        assert_eq!(indent("", 4), "");
    }

    #[test]
    fn test_format_diagnostic_leading_blank_line() {
        assert_eq!(format_diagnostic("expected 3, got 4"), "\n    expected 3, got 4");
    }

    #[test]
    fn test_console_reporter_output() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.task_start("Compiling");
        reporter.task_end("Compiling", "OK");
        reporter.task_start("Running test: p1");
        reporter.task_end("Running test: p1", "UNEXPECTED: FAIL");
        reporter.diagnostic(&format_diagnostic("segfault"));

        let out = String::from_utf8(reporter.into_inner()).expect("utf8");
        assert_eq!(
            out,
            "Compiling: OK\nRunning test: p1: UNEXPECTED: FAIL\n\n    segfault\n"
        );
    }
}
