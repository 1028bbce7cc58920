//! The diagnostic value: severity, code, message, and location.
//!
//! Diagnostics are plain data built through a small builder API. Rendering
//! is left to hosts; `Display` produces the one-line form used by tests.

use std::fmt;

use crate::{ErrorCode, Span};

/// Severity of a diagnostic.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum Severity {
    /// Informational note.
    Info,
    /// Suspicious but not ill-formed.
    Warning,
    /// Ill-formed input; the compilation still runs to completion.
    Error,
}

/// A diagnostic message attached to a source range.
///
/// The message is pre-formatted; the template it was produced from is
/// recoverable through [`ErrorCode::description`].
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Diagnostic {
    severity: Severity,
    code: ErrorCode,
    message: String,
    span: Span,
    /// Additional notes shown below the primary message.
    notes: Vec<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    #[cold]
    pub fn error(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code,
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    /// Create a warning diagnostic.
    #[cold]
    pub fn warning(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            code,
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    /// Attach a note.
    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Severity of the diagnostic.
    #[inline]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Error code for searchability.
    #[inline]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source range the diagnostic points at.
    #[inline]
    pub fn span(&self) -> Span {
        self.span
    }

    /// Attached notes.
    #[inline]
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Rebase the span (used when a relative range becomes absolute).
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(
            f,
            "{severity}[{}] at {}: {}",
            self.code, self.span, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_form() {
        let diag = Diagnostic::error(ErrorCode::E2001, "undefined reference `x`", Span::new(4, 5));
        assert_eq!(
            diag.to_string(),
            "error[E2001] at 4..5: undefined reference `x`"
        );
    }

    #[test]
    fn test_notes_accumulate() {
        let diag = Diagnostic::warning(ErrorCode::E4001, "unreachable code", Span::DUMMY)
            .with_note("after this `return`")
            .with_note("remove the statement");
        assert_eq!(diag.notes().len(), 2);
        assert_eq!(diag.severity(), Severity::Warning);
    }
}
