//! The `Event` envelope and its tagged payload union.
//!
//! Every payload shape in the external event table has a variant here.
//! `EventPayload` is `#[non_exhaustive]` and `#[serde(tag = "name",
//! content = "payload")]` so the wire shape is exactly `{ name,
//! payload, ... }` while still giving callers an exhaustive match on
//! the Rust side — the dispatch bridge (see `skein_runtime::dispatch`)
//! relies on that exhaustiveness to make a missing observer callback a
//! compile error, not a silent drop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{EventId, InteractionId, SessionId};

/// Why a phase was exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseExitReason {
    /// Transitioned to another phase via `next`.
    Next,
    /// Reached a terminal phase.
    Terminal,
    /// Exited because the phase (or the workflow) failed.
    Failure,
}

/// The shape of a human-in-the-loop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// A yes/no approval gate.
    Approval,
    /// A choice among `options`.
    Choice,
    /// Free-form text input.
    Freeform,
}

/// One payload shape per event name. Tagged on the wire as
/// `{"name": "...", "payload": {...}}`, matching the event table.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "workflow:started")]
    WorkflowStarted {
        session_id: SessionId,
        workflow: String,
        input: Value,
    },

    #[serde(rename = "workflow:completed")]
    WorkflowCompleted {
        session_id: SessionId,
        final_state: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_phase: Option<String>,
    },

    #[serde(rename = "workflow:aborted")]
    WorkflowAborted {
        session_id: SessionId,
        reason: String,
    },

    #[serde(rename = "phase:entered")]
    PhaseEntered {
        phase: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_phase: Option<String>,
    },

    #[serde(rename = "phase:exited")]
    PhaseExited {
        phase: String,
        reason: PhaseExitReason,
    },

    #[serde(rename = "agent:started")]
    AgentStarted {
        agent: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        phase: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<Value>,
    },

    #[serde(rename = "agent:completed")]
    AgentCompleted {
        agent: String,
        output: Value,
        duration_ms: u64,
    },

    #[serde(rename = "agent:failed")]
    AgentFailed { agent: String, error: String },

    #[serde(rename = "text:delta")]
    TextDelta { agent_name: String, delta: String },

    #[serde(rename = "thinking:delta")]
    ThinkingDelta { agent_name: String, delta: String },

    #[serde(rename = "tool:called")]
    ToolCalled {
        agent_name: String,
        tool_id: String,
        tool_name: String,
        input: Value,
    },

    #[serde(rename = "tool:result")]
    ToolResult {
        agent_name: String,
        tool_id: String,
        output: Value,
        is_error: bool,
    },

    #[serde(rename = "state:intent")]
    StateIntent {
        intent_id: String,
        state: Value,
        patches: Vec<crate::patch::Patch>,
        inverse_patches: Vec<crate::patch::Patch>,
    },

    #[serde(rename = "state:checkpoint")]
    StateCheckpoint {
        state: Value,
        position: u64,
        phase: String,
    },

    #[serde(rename = "input:requested")]
    InputRequested {
        id: InteractionId,
        prompt: String,
        #[serde(rename = "type")]
        kind: InteractionKind,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },

    #[serde(rename = "input:received")]
    InputReceived {
        id: InteractionId,
        value: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        approved: Option<bool>,
    },

    #[serde(rename = "session:forked")]
    SessionForked {
        parent_session_id: SessionId,
        fork_index: u32,
        initial_state: Value,
    },

    /// Non-fatal notice that a subscriber dropped events because it
    /// could not keep up with `EventHub` fan-out. Not part of the
    /// original event table but required by the hub's contract that
    /// lag is recorded, not silently swallowed.
    #[serde(rename = "subscriber:lagged")]
    SubscriberLagged { skipped: u64 },
}

impl EventPayload {
    /// The fully-qualified, colon-separated event name.
    pub fn name(&self) -> &'static str {
        match self {
            EventPayload::WorkflowStarted { .. } => "workflow:started",
            EventPayload::WorkflowCompleted { .. } => "workflow:completed",
            EventPayload::WorkflowAborted { .. } => "workflow:aborted",
            EventPayload::PhaseEntered { .. } => "phase:entered",
            EventPayload::PhaseExited { .. } => "phase:exited",
            EventPayload::AgentStarted { .. } => "agent:started",
            EventPayload::AgentCompleted { .. } => "agent:completed",
            EventPayload::AgentFailed { .. } => "agent:failed",
            EventPayload::TextDelta { .. } => "text:delta",
            EventPayload::ThinkingDelta { .. } => "thinking:delta",
            EventPayload::ToolCalled { .. } => "tool:called",
            EventPayload::ToolResult { .. } => "tool:result",
            EventPayload::StateIntent { .. } => "state:intent",
            EventPayload::StateCheckpoint { .. } => "state:checkpoint",
            EventPayload::InputRequested { .. } => "input:requested",
            EventPayload::InputReceived { .. } => "input:received",
            EventPayload::SessionForked { .. } => "session:forked",
            EventPayload::SubscriberLagged { .. } => "subscriber:lagged",
        }
    }

    /// True for the internal-only events that the Dispatch/Observer
    /// bridge never forwards to typed callbacks (they influence runtime
    /// behavior directly instead).
    pub fn is_internal_only(&self) -> bool {
        matches!(
            self,
            EventPayload::SessionForked { .. }
                | EventPayload::PhaseExited { .. }
                | EventPayload::InputRequested { .. }
                | EventPayload::InputReceived { .. }
        )
    }
}

/// An immutable, appended-once unit in a session's event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caused_by: Option<EventId>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// The fully-qualified event name, delegating to the payload.
    pub fn name(&self) -> &'static str {
        self.payload.name()
    }
}

/// Assign a fresh id and wall-clock timestamp to a payload, optionally
/// recording the event that caused it. The sole constructor for
/// `Event` — nothing else may mint one, so every event in a log has a
/// trustworthy id and timestamp.
pub fn make_event(payload: EventPayload, caused_by: Option<EventId>) -> Event {
    Event {
        id: EventId::new(),
        timestamp: Utc::now(),
        caused_by,
        payload,
    }
}

/// Compare two events by `(name, payload)` only, ignoring `id` and
/// `timestamp`. Fingerprint/replay-determinism logic is defined over
/// this equality, never over the full struct.
pub fn content_eq(a: &Event, b: &Event) -> bool {
    // Comparing the serialized payload is sufficient and avoids
    // requiring `PartialEq` on every nested type (`Value` already has
    // it, but this keeps the comparison contract in one place).
    serde_json::to_value(&a.payload).ok() == serde_json::to_value(&b.payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn name_matches_wire_tag() {
        let event = make_event(
            EventPayload::PhaseEntered {
                phase: "review".into(),
                from_phase: None,
            },
            None,
        );
        assert_eq!(event.name(), "phase:entered");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["name"], "phase:entered");
        assert_eq!(json["payload"]["phase"], "review");
    }

    #[test]
    fn content_eq_ignores_id_and_timestamp() {
        let a = make_event(
            EventPayload::TextDelta {
                agent_name: "writer".into(),
                delta: "hi".into(),
            },
            None,
        );
        let b = make_event(
            EventPayload::TextDelta {
                agent_name: "writer".into(),
                delta: "hi".into(),
            },
            None,
        );
        assert_ne!(a.id, b.id);
        assert!(content_eq(&a, &b));
    }

    #[test]
    fn content_eq_detects_payload_difference() {
        let a = make_event(
            EventPayload::AgentCompleted {
                agent: "writer".into(),
                output: json!({"ok": true}),
                duration_ms: 10,
            },
            None,
        );
        let b = make_event(
            EventPayload::AgentCompleted {
                agent: "writer".into(),
                output: json!({"ok": false}),
                duration_ms: 10,
            },
            None,
        );
        assert!(!content_eq(&a, &b));
    }

    #[test]
    fn internal_only_events_are_flagged() {
        let requested = EventPayload::InputRequested {
            id: InteractionId::new(),
            prompt: "approve?".into(),
            kind: InteractionKind::Approval,
            options: None,
            metadata: None,
        };
        assert!(requested.is_internal_only());

        let completed = EventPayload::AgentCompleted {
            agent: "writer".into(),
            output: json!(null),
            duration_ms: 0,
        };
        assert!(!completed.is_internal_only());
    }

    #[test]
    fn round_trips_through_json() {
        let event = make_event(
            EventPayload::WorkflowStarted {
                session_id: SessionId::new(),
                workflow: "demo".into(),
                input: json!({"goal": "ship it"}),
            },
            None,
        );
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&encoded).unwrap();
        assert!(content_eq(&event, &decoded));
        assert_eq!(event.id, decoded.id);
    }
}
