//! Initial backlog gate.
//!
//! On attach, a watched log file may already hold a large backlog. The first
//! read pass scans that content to advance offsets, but nothing from it may
//! reach the sinks as if it just happened. Emission opens only once every
//! watched file has completed its first pass.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Shared counter gating event emission until the initial scan is done.
///
/// The counter lives in `[0, required]`; each watched file contributes one
/// mark after its first completed read pass. It only goes back to zero on an
/// explicit engine start, never on session rotation.
#[derive(Debug)]
pub struct BacklogGate {
    passes: AtomicUsize,
    required: usize,
}

impl BacklogGate {
    /// Create a gate that opens after `required` first passes.
    #[must_use]
    pub fn new(required: usize) -> Self {
        Self {
            passes: AtomicUsize::new(0),
            required,
        }
    }

    /// Whether extracted events may be forwarded to sinks.
    #[must_use]
    pub fn should_emit(&self) -> bool {
        self.passes.load(Ordering::Acquire) >= self.required
    }

    /// Record one watched file's completed first read pass.
    ///
    /// Saturates at the required count; redundant marks are harmless.
    pub fn mark_file_pass_complete(&self) {
        let _ = self
            .passes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |passes| {
                (passes < self.required).then_some(passes + 1)
            });
    }

    /// Re-arm the gate. Called once at engine start.
    pub fn reset(&self) {
        self.passes.store(0, Ordering::Release);
    }
}
