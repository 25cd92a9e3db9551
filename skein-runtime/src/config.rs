//! Runtime configuration and the ergonomic builder that assembles a
//! [`crate::runtime::WorkflowRuntime`] from its collaborators.

use std::sync::Arc;

use skein_core::{EventId, EventStore, Observer, ProviderRecorder, SessionId};

/// A shared, dynamically-dispatched event store handle.
pub type DynEventStore = Arc<dyn EventStore>;

/// Whether the runtime may call out to a live provider on a cache
/// miss, or must treat a miss as fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Playback misses fall back to a live provider call, and the
    /// result is recorded for next time.
    Live,
    /// Playback misses are fatal (`RecordingNotFound`). Used in tests
    /// that must never touch the network.
    Playback,
}

/// Parameters to resume a runtime from a previously checkpointed
/// position instead of running `start()`.
#[derive(Debug, Clone)]
pub struct ResumeFrom {
    /// The state to resume with, typically the output of
    /// `skein_runtime::replay::replay`.
    pub state: serde_json::Value,
    /// The phase to resume into.
    pub phase: String,
}

/// Configuration recognized by [`crate::runtime::WorkflowRuntime`].
pub struct RuntimeConfig {
    /// Live vs. playback mode.
    pub mode: Mode,
    /// The event store backing this runtime's session.
    pub store: DynEventStore,
    /// The content-addressed provider cache.
    pub recorder: Arc<dyn ProviderRecorder>,
    /// Optional typed observer.
    pub observer: Option<Arc<dyn Observer>>,
    /// Caller-assigned session id; generated if absent.
    pub session_id: Option<SessionId>,
    /// Optional resume parameters. Either both `state` and `phase` are
    /// supplied (via this field) or neither.
    pub resume_from: Option<ResumeFrom>,
    /// Maximum iterations a single phase may run before
    /// `PhaseLoopBudget` aborts the workflow.
    pub phase_loop_budget: u32,
    /// How many times a transient `ProviderUnavailable` is retried
    /// (with exponential backoff) before it is treated as fatal.
    pub provider_unavailable_retry: u32,
}

/// Default loop budget, matching the "default e.g. 1000" suggested by
/// the component design.
pub const DEFAULT_PHASE_LOOP_BUDGET: u32 = 1000;

/// Default provider retry count before a transient failure becomes
/// fatal.
pub const DEFAULT_PROVIDER_RETRY: u32 = 3;

impl RuntimeConfig {
    /// Start building a config in live mode with the required store and
    /// recorder; everything else defaults.
    pub fn builder(store: DynEventStore, recorder: Arc<dyn ProviderRecorder>) -> RuntimeConfigBuilder {
        RuntimeConfigBuilder {
            mode: Mode::Live,
            store,
            recorder,
            observer: None,
            session_id: None,
            resume_from: None,
            phase_loop_budget: DEFAULT_PHASE_LOOP_BUDGET,
            provider_unavailable_retry: DEFAULT_PROVIDER_RETRY,
        }
    }
}

/// Builder for [`RuntimeConfig`].
pub struct RuntimeConfigBuilder {
    mode: Mode,
    store: DynEventStore,
    recorder: Arc<dyn ProviderRecorder>,
    observer: Option<Arc<dyn Observer>>,
    session_id: Option<SessionId>,
    resume_from: Option<ResumeFrom>,
    phase_loop_budget: u32,
    provider_unavailable_retry: u32,
}

impl RuntimeConfigBuilder {
    /// Set live/playback mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Attach a typed observer.
    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Assign a caller-chosen session id instead of generating one.
    pub fn session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Resume from a checkpointed state and phase instead of running
    /// `start()`.
    pub fn resume_from(mut self, resume: ResumeFrom) -> Self {
        self.resume_from = Some(resume);
        self
    }

    /// Override the per-phase iteration budget.
    pub fn phase_loop_budget(mut self, budget: u32) -> Self {
        self.phase_loop_budget = budget;
        self
    }

    /// Override the provider retry count.
    pub fn provider_unavailable_retry(mut self, retries: u32) -> Self {
        self.provider_unavailable_retry = retries;
        self
    }

    /// Finish building.
    pub fn build(self) -> RuntimeConfig {
        RuntimeConfig {
            mode: self.mode,
            store: self.store,
            recorder: self.recorder,
            observer: self.observer,
            session_id: self.session_id,
            resume_from: self.resume_from,
            phase_loop_budget: self.phase_loop_budget,
            provider_unavailable_retry: self.provider_unavailable_retry,
        }
    }
}

/// A `causedBy` chain helper: wraps an `Option<EventId>` so call sites
/// reasoning about causality read as such rather than as a bare
/// optional id.
pub type CausedBy = Option<EventId>;
