//! Observability hooks.
//!
//! Both the resolver and the collector swallow their failures by design. These
//! traits are where those failures (and slow resolutions) surface instead, so
//! hosts can forward them to metrics and tests can assert on them without
//! capturing log output.
//!
//! Every method has a no-op default; implement only what you need.

use parking_lot::Mutex;
use std::time::Duration;

use crate::error::{ProfileError, StorageError};
use crate::types::ProfileDecision;

/// Hooks fired by [`ProfileResolver`](crate::resolver::ProfileResolver).
pub trait ResolutionObserver: Send + Sync {
    /// A resolution completed (including fail-open fallbacks).
    fn on_resolved(&self, _decision: &ProfileDecision, _elapsed: Duration) {}

    /// Resolution failed and the default profile was applied.
    fn on_fallback(&self, _error: &ProfileError) {}

    /// Resolution exceeded the configured soft budget.
    fn on_slow(&self, _elapsed: Duration, _budget: Duration) {}
}

/// What kind of collector write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistOperation {
    /// Reading the record at startup.
    Load,
    /// Throttled or page-hide flush.
    Save,
    /// Removing the record on `clear()`.
    Remove,
}

/// Hooks fired by [`TelemetryCollector`](crate::collector::TelemetryCollector).
pub trait TelemetryObserver: Send + Sync {
    /// A storage operation failed. The in-memory log is unaffected.
    fn on_storage_error(&self, _operation: PersistOperation, _error: &StorageError) {}

    /// A stored record was malformed and a fresh session was started.
    fn on_record_discarded(&self, _reason: &str) {}

    /// The session was written to storage.
    fn on_persisted(&self, _event_count: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl ResolutionObserver for NoOpObserver {}

impl TelemetryObserver for NoOpObserver {}

/// In-memory observer for tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    /// Resolved decisions, in order.
    pub resolved: Mutex<Vec<ProfileDecision>>,
    /// Rendered fallback errors.
    pub fallbacks: Mutex<Vec<String>>,
    /// Number of slow resolutions.
    pub slow: Mutex<usize>,
    /// Failed storage operations with rendered errors.
    pub storage_errors: Mutex<Vec<(PersistOperation, String)>>,
    /// Reasons for discarded records.
    pub discarded: Mutex<Vec<String>>,
    /// Event counts at each successful persist.
    pub persisted: Mutex<Vec<usize>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fail-open fallbacks seen.
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.lock().len()
    }

    /// Number of failed storage operations of a given kind.
    pub fn storage_error_count(&self, operation: PersistOperation) -> usize {
        self.storage_errors
            .lock()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }
}

impl ResolutionObserver for RecordingObserver {
    fn on_resolved(&self, decision: &ProfileDecision, _elapsed: Duration) {
        self.resolved.lock().push(*decision);
    }

    fn on_fallback(&self, error: &ProfileError) {
        self.fallbacks.lock().push(error.to_string());
    }

    fn on_slow(&self, _elapsed: Duration, _budget: Duration) {
        *self.slow.lock() += 1;
    }
}

impl TelemetryObserver for RecordingObserver {
    fn on_storage_error(&self, operation: PersistOperation, error: &StorageError) {
        self.storage_errors.lock().push((operation, error.to_string()));
    }

    fn on_record_discarded(&self, reason: &str) {
        self.discarded.lock().push(reason.to_string());
    }

    fn on_persisted(&self, event_count: usize) {
        self.persisted.lock().push(event_count);
    }
}
