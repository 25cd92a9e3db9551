//! The Dispatch/Observer bridge: a pure function matching an [`Event`]
//! to the typed callback on [`Observer`] it corresponds to.
//!
//! This lives in `skein-core`, not `skein-runtime`, on purpose:
//! [`EventPayload`] is `#[non_exhaustive]` so downstream crates must add
//! a wildcard arm to match it, which would silently swallow a new
//! variant instead of failing to compile. Matching here, inside the
//! crate that defines the enum, keeps the match exhaustive at the type
//! level — adding a variant without updating `dispatch` is a compile
//! error, exactly as the component design requires. `skein_runtime`
//! re-exports this function under its own path for callers who don't
//! want to know the split.

use crate::event::{Event, EventPayload};
use crate::observer::Observer;

/// Drive every applicable callback on `observer` for one event.
///
/// `on_event` always fires first and unconditionally, internal-only
/// events included. The internal-only events (`session:forked`,
/// `phase:exited`, `input:requested`, `input:received`) have no other
/// callback — they influence runtime behavior directly instead of
/// being surfaced through the typed protocol. `workflow:completed` and
/// `workflow:aborted` are likewise not translated into `on_completed`
/// here: per the component design, `on_completed` fires exactly once,
/// at workflow end, with the full result — the runtime calls it
/// directly rather than through this per-event bridge.
pub async fn dispatch(observer: &dyn Observer, event: &Event) {
    observer.on_event(event).await;

    match &event.payload {
        EventPayload::WorkflowStarted { session_id, .. } => {
            observer.on_started(session_id).await;
        }
        EventPayload::WorkflowCompleted { .. } => {}
        EventPayload::WorkflowAborted { .. } => {}
        EventPayload::PhaseEntered { phase, from_phase } => {
            observer
                .on_phase_changed(phase, from_phase.as_deref())
                .await;
        }
        EventPayload::PhaseExited { .. } => {}
        EventPayload::AgentStarted { agent, phase, .. } => {
            observer.on_agent_started(agent, phase.as_deref()).await;
        }
        EventPayload::AgentCompleted {
            agent,
            output,
            duration_ms,
        } => {
            observer
                .on_agent_completed(agent, output, *duration_ms)
                .await;
        }
        EventPayload::AgentFailed { .. } => {}
        EventPayload::TextDelta { agent_name, delta } => {
            observer.on_text_delta(agent_name, delta).await;
        }
        EventPayload::ThinkingDelta { agent_name, delta } => {
            observer.on_thinking_delta(agent_name, delta).await;
        }
        EventPayload::ToolCalled {
            agent_name,
            tool_id,
            tool_name,
            input,
        } => {
            observer
                .on_tool_called(agent_name, tool_id, tool_name, input)
                .await;
        }
        EventPayload::ToolResult {
            agent_name,
            tool_id,
            output,
            is_error,
        } => {
            observer
                .on_tool_result(agent_name, tool_id, output, *is_error)
                .await;
        }
        EventPayload::StateIntent { state, patches, .. } => {
            observer.on_state_changed(state, Some(patches)).await;
        }
        EventPayload::StateCheckpoint { state, .. } => {
            observer.on_state_changed(state, None).await;
        }
        EventPayload::InputRequested { .. } => {}
        EventPayload::InputReceived { .. } => {}
        EventPayload::SessionForked { .. } => {}
        EventPayload::SubscriberLagged { .. } => {}
    }
}
