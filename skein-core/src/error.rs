//! The error taxonomy shared across every skein crate.
//!
//! Each component exposes its own narrow `thiserror` enum; `WorkflowError`
//! unifies them at the runtime boundary with `#[from]` conversions so a
//! caller driving a `WorkflowRuntime` has exactly one error type to match
//! on, mirroring how the teacher funnels `StateError`/`OrchError`/
//! `HookError` into a single top-level error at the loop boundary.

use thiserror::Error;

use crate::hash::HashError;

/// Errors raised validating or parsing an agent's structured output.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OutputError {
    /// The provider's terminal result did not satisfy the agent's
    /// output schema.
    #[error("agent output invalid: {0}")]
    Invalid(String),
}

/// Errors raised calling out to a `Provider`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transient network/auth failure; caller may retry with backoff.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// The provider stream ended without ever producing a terminal
    /// result.
    #[error("provider stream ended without a result")]
    StreamEndedWithoutResult,
}

/// Errors raised by an `EventStore` implementation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Persistence layer is unreachable or failed an I/O operation.
    #[error("event store unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by a `ProviderRecorder` implementation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Playback in strict mode found no recording for the requested
    /// fingerprint.
    #[error("no recording found for fingerprint {0}")]
    NotFound(String),

    /// The recorder's backing store failed to read or write.
    #[error("recorder backend unavailable: {0}")]
    Unavailable(String),

    /// Caller tried to append to or finalize a recording id that was
    /// never started, or finalize one twice.
    #[error("unknown or already-finalized recording id: {0}")]
    UnknownRecording(String),
}

/// Errors raised constructing or running a workflow definition.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Recorder(#[from] RecorderError),

    #[error(transparent)]
    Hash(#[from] HashError),

    /// The phase graph references an undeclared phase, has no terminal
    /// phase, or declares a phase name twice.
    #[error("workflow misconfigured: {0}")]
    Misconfigured(String),

    /// A single phase exceeded its configured iteration budget.
    #[error("phase {phase} exceeded its loop budget of {budget} iterations")]
    PhaseLoopBudget { phase: String, budget: u32 },

    /// A phase exceeded its configured wall-clock timeout.
    #[error("phase {phase} timed out after {elapsed_ms}ms")]
    PhaseTimeout { phase: String, elapsed_ms: u64 },

    /// The execution was aborted via `ExecutionHandle::abort`.
    #[error("workflow aborted: {0}")]
    Aborted(String),
}

impl WorkflowError {
    /// Whether this error should abort the whole workflow, per the
    /// propagation policy: everything here is fatal by construction —
    /// recoverable conditions (`agent:failed`, a playback miss under a
    /// fallback-to-live policy) never become a `WorkflowError` at all,
    /// they stay as typed events for the phase to react to.
    pub fn is_fatal(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_error_converts_into_workflow_error() {
        let hash_err = HashError::NotSerializable("boom".into());
        let workflow_err: WorkflowError = hash_err.into();
        assert!(matches!(workflow_err, WorkflowError::Hash(_)));
        assert!(workflow_err.is_fatal());
    }

    #[test]
    fn recorder_not_found_converts_into_workflow_error() {
        let recorder_err = RecorderError::NotFound("sha256:abc".into());
        let workflow_err: WorkflowError = recorder_err.into();
        assert_eq!(
            workflow_err.to_string(),
            "no recording found for fingerprint sha256:abc"
        );
    }
}
