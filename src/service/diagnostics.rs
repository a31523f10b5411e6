//! Scoped capture of diagnostic output produced during a mutate call.

use std::sync::{Mutex, PoisonError};
use tracing::trace;

use crate::error::Operation;

/// Collects diagnostic lines for one mutate call.
///
/// The reconciler creates one capture per call and hands it to the
/// service; the lines travel back with the outcome or the error and are
/// released when the capture is consumed or dropped.
#[derive(Debug)]
pub struct DiagnosticCapture {
    /// Operation in flight.
    operation: Operation,
    /// Resource identity.
    resource: String,
    /// Captured lines.
    lines: Mutex<Vec<String>>,
}

impl DiagnosticCapture {
    /// Starts a capture for an operation on a resource.
    #[must_use]
    pub fn new(operation: Operation, resource: impl Into<String>) -> Self {
        Self {
            operation,
            resource: resource.into(),
            lines: Mutex::new(Vec::new()),
        }
    }

    /// Records one diagnostic line.
    pub fn record(&self, line: impl Into<String>) {
        let line = line.into();
        trace!("[{} {}] {}", self.operation, self.resource, line);
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    /// Returns the operation this capture belongs to.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        self.operation
    }

    /// Returns the resource this capture belongs to.
    #[must_use]
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Ends the capture and returns the recorded lines.
    #[must_use]
    pub fn finish(self) -> Vec<String> {
        self.lines
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_collects_lines_in_order() {
        let capture = DiagnosticCapture::new(Operation::Update, "IPHostGroup/GRP1");
        capture.record("POST set IPHostGroup");
        capture.record(String::from("status 200"));

        assert_eq!(capture.operation(), Operation::Update);
        assert_eq!(capture.resource(), "IPHostGroup/GRP1");
        assert_eq!(capture.finish(), vec!["POST set IPHostGroup", "status 200"]);
    }

    #[test]
    fn test_captures_are_independent() {
        let first = DiagnosticCapture::new(Operation::Create, "IPHost/a");
        let second = DiagnosticCapture::new(Operation::Create, "IPHost/b");
        first.record("only in first");

        assert!(second.finish().is_empty());
        assert_eq!(first.finish().len(), 1);
    }
}
