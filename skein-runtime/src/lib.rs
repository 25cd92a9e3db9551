//! The skein workflow runtime: the event hub, HITL coordinator, agent
//! executor, phase scheduler, replay engine, and the `WorkflowRuntime`
//! entry point that wires them into a running execution.
//!
//! `skein_core` defines the vocabulary; this crate is one concrete way
//! to run it — in-process, single-binary, with a pluggable
//! [`EventStore`](skein_core::EventStore) and
//! [`ProviderRecorder`](skein_core::ProviderRecorder).

pub mod agent;
pub mod config;
pub mod executor;
pub mod hitl;
pub mod hub;
pub mod phase;
pub mod replay;
pub mod runtime;
pub mod scheduler;

pub use agent::{AgentDefinition, BoxedAgent};
pub use config::{DynEventStore, Mode, ResumeFrom, RuntimeConfig, RuntimeConfigBuilder};
pub use executor::{AgentRunOutcome, ExecutorDeps};
pub use hitl::{HitlCoordinator, InteractionResponse};
pub use hub::{EventHub, Subscription};
pub use phase::{NextPhase, Phase, WorkflowDefinition};
pub use replay::{replay, ReplayResult};
pub use runtime::{ExecutionHandle, WorkflowRuntime};
pub use scheduler::{run_phase_graph, ControlFlags, SchedulerOutcome};

/// Re-exported so callers can write `skein_runtime::dispatch(...)`
/// without knowing the bridge actually lives in `skein-core` (it has
/// to, for the exhaustiveness guarantee described on that function).
pub use skein_core::dispatch;
