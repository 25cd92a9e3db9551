//! The `Observer` protocol — typed callbacks the Dispatch bridge drives
//! from the event stream. Any subset may be supplied; every method has
//! a no-op default so implementors only override what they care about.

use async_trait::async_trait;
use serde_json::Value;

use crate::event::InteractionKind;
use crate::id::{InteractionId, SessionId};
use crate::patch::Patch;

/// The final outcome of a workflow execution, handed to `on_completed`.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub session_id: SessionId,
    pub state: Value,
    pub completed: bool,
    pub exit_phase: Option<String>,
    pub duration_ms: u64,
}

/// A pending human-in-the-loop request, handed to `on_input_requested`.
#[derive(Debug, Clone)]
pub struct InputRequest {
    pub interaction_id: InteractionId,
    pub prompt: String,
    pub kind: InteractionKind,
    pub options: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

/// Typed subscriber to a running workflow's lifecycle.
///
/// Every callback is optional (default: no-op). `on_event` is the
/// exception in spirit, not in signature — it still defaults to
/// no-op, but it is the one callback that receives every event
/// unconditionally, internal-only events included, so a subscriber
/// that wants the raw log can get it without implementing anything
/// else.
#[async_trait]
pub trait Observer: Send + Sync {
    async fn on_started(&self, _session_id: &SessionId) {}

    async fn on_phase_changed(&self, _phase: &str, _from_phase: Option<&str>) {}

    async fn on_agent_started(&self, _agent: &str, _phase: Option<&str>) {}

    async fn on_agent_completed(&self, _agent: &str, _output: &Value, _duration_ms: u64) {}

    async fn on_state_changed(&self, _state: &Value, _patches: Option<&[Patch]>) {}

    async fn on_text_delta(&self, _agent: &str, _delta: &str) {}

    async fn on_thinking_delta(&self, _agent: &str, _delta: &str) {}

    async fn on_tool_called(&self, _agent: &str, _tool_id: &str, _tool_name: &str, _input: &Value) {}

    async fn on_tool_result(&self, _agent: &str, _tool_id: &str, _output: &Value, _is_error: bool) {}

    /// Notification of a pending HITL request. Returning `Some(value)`
    /// answers it immediately through the same path as an explicit
    /// `respond` call on the execution handle; returning `None` leaves
    /// it pending for an out-of-band `respond`.
    async fn on_input_requested(&self, _request: &InputRequest) -> Option<Value> {
        None
    }

    /// Receives every event unconditionally, including the
    /// internal-only ones the other callbacks never see.
    async fn on_event(&self, _event: &crate::event::Event) {}

    async fn on_error(&self, _error: &crate::error::WorkflowError) {}

    async fn on_completed(&self, _result: &WorkflowResult) {}
}
