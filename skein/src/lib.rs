#![deny(missing_docs)]
//! # skein — umbrella crate
//!
//! A single import surface for the skein workflow kernel: an
//! event-sourced runtime for orchestrating LLM agents through
//! multi-phase workflows with human-in-the-loop checkpoints, state
//! patches, and deterministic record/playback of provider calls.
//!
//! Re-exports the component crates behind feature flags, plus a
//! [`prelude`] for the happy path of building and starting a workflow.

#[cfg(feature = "core")]
pub use skein_core;
#[cfg(feature = "recorder")]
pub use skein_recorder;
#[cfg(feature = "runtime")]
pub use skein_runtime;
#[cfg(feature = "store-memory")]
pub use skein_store_memory;

/// Happy-path imports for defining and running a workflow.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use skein_core::{
        apply_patches, canonicalize, content_eq, hash_provider_request, make_event, update,
        AgentStream, AgentStreamEvent, CompletionRequest, Event, EventId, EventPayload,
        EventStore, FingerprintInput, InputRequest, InteractionId, InteractionKind, Observer,
        OutputError, Patch, Provider, ProviderError, ProviderRecorder, RecorderError,
        RecordedStreamEvent, RecordingEntry, RecordingId, RecordingResult, SessionId, StopReason,
        StoreError, UpdateResult, WorkflowError, WorkflowResult,
    };

    #[cfg(feature = "runtime")]
    pub use skein_runtime::{
        AgentDefinition, BoxedAgent, DynEventStore, EventHub, ExecutionHandle, HitlCoordinator,
        Mode, NextPhase, Phase, ResumeFrom, RuntimeConfig, RuntimeConfigBuilder, Subscription,
        WorkflowDefinition, WorkflowRuntime,
    };

    #[cfg(feature = "runtime")]
    pub use skein_runtime::replay;

    #[cfg(feature = "store-memory")]
    pub use skein_store_memory::MemoryEventStore;

    #[cfg(feature = "recorder")]
    pub use skein_recorder::MemoryRecorder;
}
