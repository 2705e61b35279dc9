//! Diagnostic sink the engine reports backend errors to.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use looptap_core::BackendError;
use parking_lot::Mutex;
use std::panic::Location;
use std::sync::Arc;
use tracing::error;

/// One backend error observed after a group of hardware calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Operation that preceded the error.
    pub tag: &'static str,
    pub file: &'static str,
    pub line: u32,
    pub error: BackendError,
}

impl Diagnostic {
    pub fn new(
        tag: &'static str,
        location: &'static Location<'static>,
        error: BackendError,
    ) -> Self {
        Self {
            tag,
            file: location.file(),
            line: location.line(),
            error,
        }
    }
}

/// Receives engine diagnostics.
pub trait DiagnosticSink: Send {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, d: &Diagnostic) {
        error!(
            tag = d.tag,
            code = d.error.code(),
            "After \"{}\" backend error {}(0x{:x}) at {}:{}",
            d.tag,
            d.error,
            d.error.code(),
            d.file,
            d.line
        );
    }
}

/// Keeps every diagnostic in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Diagnostic> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: &Diagnostic) {
        self.records.lock().push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_shares_records() {
        let sink = MemorySink::new();
        let handle = sink.clone();

        let d = Diagnostic::new("test", Location::caller(), BackendError::InvalidValue);
        sink.report(&d);

        assert_eq!(handle.len(), 1);
        let recorded = &handle.records()[0];
        assert_eq!(recorded.tag, "test");
        assert_eq!(recorded.error, BackendError::InvalidValue);
        assert!(recorded.file.ends_with("diagnostics.rs"));
    }
}
