//! Append-only diagnostic collector.
//!
//! Every phase reports into one shared bag. Appends never fail and never
//! throw away earlier entries; enumeration happens only after the producing
//! phase has finished, so a snapshot clone is sufficient isolation.

use parking_lot::Mutex;

use crate::{Diagnostic, Severity};

/// Thread-safe, append-only collection of diagnostics.
///
/// Insertion order is preserved; within one compilation it is deterministic
/// because phases run in a fixed order over the source.
#[derive(Default)]
pub struct DiagnosticBag {
    entries: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticBag {
    /// Create an empty bag.
    pub fn new() -> Self {
        DiagnosticBag::default()
    }

    /// Append a diagnostic.
    pub fn report(&self, diagnostic: Diagnostic) {
        self.entries.lock().push(diagnostic);
    }

    /// Append every diagnostic from an iterator.
    pub fn report_all(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        let mut entries = self.entries.lock();
        entries.extend(diagnostics);
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// True when at least one diagnostic has error severity.
    pub fn has_errors(&self) -> bool {
        self.entries
            .lock()
            .iter()
            .any(|d| d.severity() == Severity::Error)
    }

    /// Snapshot of the collected diagnostics in insertion order.
    pub fn to_vec(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }
}

impl std::fmt::Debug for DiagnosticBag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.lock();
        f.debug_struct("DiagnosticBag")
            .field("len", &entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorCode, Span};

    #[test]
    fn test_insertion_order_preserved() {
        let bag = DiagnosticBag::new();
        bag.report(Diagnostic::error(ErrorCode::E1001, "first", Span::new(0, 1)));
        bag.report(Diagnostic::error(ErrorCode::E1002, "second", Span::new(2, 3)));

        let all = bag.to_vec();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].message(), "first");
        assert_eq!(all[1].message(), "second");
    }

    #[test]
    fn test_has_errors() {
        let bag = DiagnosticBag::new();
        assert!(!bag.has_errors());
        bag.report(Diagnostic::warning(ErrorCode::E4001, "w", Span::DUMMY));
        assert!(!bag.has_errors());
        bag.report(Diagnostic::error(ErrorCode::E3001, "e", Span::DUMMY));
        assert!(bag.has_errors());
    }

    #[test]
    fn test_concurrent_appends_all_land() {
        use std::sync::Arc;

        let bag = Arc::new(DiagnosticBag::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let bag = Arc::clone(&bag);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        bag.report(Diagnostic::error(ErrorCode::E1001, "x", Span::DUMMY));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(bag.len(), 400);
    }
}
