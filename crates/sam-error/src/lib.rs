#![cfg_attr(test, allow(clippy::panic, clippy::unwrap_used, clippy::expect_used))]
//! Error types and error-log formatting for the sam structural-regex command engine.
//!
//! [`SamError`] is the single code returned by a top-level `sam_cmd` call
//! (see the state machine in the engine crate). [`ErrorLog`] accumulates the
//! user-visible, caret-annotated messages produced while parsing a command
//! line; it never holds more than the fixed grammar the spec defines, so
//! formatting is cheap and allocation-free beyond the owned message string.

use thiserror::Error;

/// Every terminal outcome `sam_cmd` can report to its caller.
///
/// Variants map one-to-one onto the exit codes enumerated for the command
/// grammar: syntactic failures during parsing, semantic pre-commit conflicts
/// (writing a file with pending changes), and commit-time range conflicts.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamError {
    #[error("ok")]
    Ok,
    #[error("out of memory")]
    Memory,
    #[error("bad address")]
    Address,
    #[error("no address")]
    NoAddress,
    #[error("unmatched '{{' or '}}'")]
    UnmatchedBrace,
    #[error("bad regular expression")]
    Regex,
    #[error("bad text")]
    Text,
    #[error("bad shell command")]
    Shell,
    #[error("unknown command")]
    Command,
    #[error("command failed to execute")]
    Execute,
    #[error("newline expected")]
    Newline,
    #[error("invalid mark")]
    Mark,
    #[error("conflicting changes")]
    Conflict,
    #[error("can not write while changing")]
    WriteConflict,
    #[error("destructive command in looping construct")]
    LoopInvalidCmd,
    #[error("destructive command in group")]
    GroupInvalidCmd,
    #[error("invalid count")]
    Count,
}

impl SamError {
    pub fn is_ok(self) -> bool {
        matches!(self, SamError::Ok)
    }

    /// The short message shown to the right of the caret in an error report.
    /// Distinct from (and shorter than) the `Display`/`thiserror` message,
    /// matching the historical wording of the C implementation this engine
    /// is descended from.
    pub fn short_message(self) -> &'static str {
        match self {
            SamError::Ok => "",
            SamError::Memory => "Out of memory",
            SamError::Address => "Bad address",
            SamError::NoAddress => "Command takes no address",
            SamError::UnmatchedBrace => "Unmatched '{' or '}'",
            SamError::Regex => "Bad regular expression",
            SamError::Text => "Bad text",
            SamError::Shell => "Bad shell command",
            SamError::Command => "Unknown command",
            SamError::Execute => "Command failed to execute",
            SamError::Newline => "Newline expected",
            SamError::Mark => "Invalid mark",
            SamError::Conflict => "Conflicting changes",
            SamError::WriteConflict => "Can not write while changing",
            SamError::LoopInvalidCmd => "Destructive command in looping construct",
            SamError::GroupInvalidCmd => "Destructive command in group",
            SamError::Count => "Invalid count",
        }
    }
}

/// One caret-annotated diagnostic, formatted per the fixed report shape:
///
/// ```text
/// ---Sam Error---
/// <raw command line>
///           ^
///           <message>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub error: SamError,
    /// Byte offset of the offending token within the raw command line.
    pub column: usize,
    pub message: String,
}

impl Diagnostic {
    pub fn new(error: SamError, column: usize, message: impl Into<String>) -> Self {
        Diagnostic { error, column, message: message.into() }
    }

    pub fn at(error: SamError, column: usize) -> Self {
        Diagnostic::new(error, column, error.short_message())
    }

    /// Render this diagnostic against `raw_line`, producing the full
    /// multi-line report with the caret positioned under `column`.
    pub fn format(&self, raw_line: &str) -> String {
        let caret_pad = " ".repeat(self.column);
        format!("---Sam Error---\n{raw_line}\n{caret_pad}^\n{caret_pad}{}", self.message)
    }
}

/// Accumulates diagnostics appended during parsing of one command line.
///
/// Info-level messages ("Filename expected", "No write since last change")
/// are routed elsewhere (the info-line UI sink) and never enter this log;
/// only parse/semantic/commit errors land here.
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Vec<Diagnostic>,
}

impl ErrorLog {
    pub fn new() -> Self {
        ErrorLog::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    pub fn report(&mut self, error: SamError, column: usize) {
        self.push(Diagnostic::at(error, column));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// The error code to surface to the caller: the first diagnostic logged,
    /// or `Ok` if none were.
    pub fn first_error(&self) -> SamError {
        self.entries.first().map(|d| d.error).unwrap_or(SamError::Ok)
    }

    /// Render every diagnostic against the original raw command line, joined
    /// by blank lines the way successive `---Sam Error---` blocks appear in
    /// the log buffer.
    pub fn render(&self, raw_line: &str) -> String {
        self.entries.iter().map(|d| d.format(raw_line)).collect::<Vec<_>>().join("\n")
    }
}

pub type SamResult<T> = Result<T, SamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_formats_caret_at_column() {
        let d = Diagnostic::at(SamError::Command, 3);
        let rendered = d.format(",zz/x/");
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("---Sam Error---"));
        assert_eq!(lines.next(), Some(",zz/x/"));
        assert_eq!(lines.next(), Some("   ^"));
        assert_eq!(lines.next(), Some("   Unknown command"));
    }

    #[test]
    fn error_log_first_error_is_ok_when_empty() {
        let log = ErrorLog::new();
        assert_eq!(log.first_error(), SamError::Ok);
        assert!(log.is_empty());
    }

    #[test]
    fn error_log_keeps_first_error_across_multiple_reports() {
        let mut log = ErrorLog::new();
        log.report(SamError::Address, 1);
        log.report(SamError::Conflict, 10);
        assert_eq!(log.first_error(), SamError::Address);
        assert_eq!(log.entries().len(), 2);
    }
}
