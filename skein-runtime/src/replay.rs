//! The Replay Engine — re-derives state and pending HITL interactions
//! from a session's stored event log, for resuming a runtime from any
//! checkpoint.

use serde_json::Value;
use skein_core::{apply_patches, EventPayload, EventStore, SessionId, WorkflowError};

use crate::hitl::find_pending_interactions;

/// The state of a session as reconstructed from its stored log, ready
/// to feed into [`crate::config::ResumeFrom`].
#[derive(Debug, Clone)]
pub struct ReplayResult {
    /// The folded state at `position`.
    pub state: Value,
    /// The log position the state was folded through (exclusive upper
    /// bound — equal to the number of events replayed).
    pub position: u64,
    /// HITL requests with no matching response, in the order they were
    /// raised.
    pub pending_interactions: Vec<skein_core::InteractionId>,
    /// The phase the session was in when the log ends, derived from
    /// the last `phase:entered` event, falling back to the last
    /// `state:checkpoint.phase` if no phase was ever entered. `None`
    /// only for a session with no phase-bearing events at all.
    pub phase: Option<String>,
}

/// Re-derive state, position, pending interactions, and the last-known
/// phase for `session_id` by folding its stored event log.
///
/// State mutation events (`state:intent`, `state:checkpoint`) always
/// carry their resulting `state` value inline, so the fast path here
/// degrades gracefully: patches are applied on top of the
/// previously-folded state and cross-checked against the event's own
/// snapshot, but the snapshot remains authoritative — a state-mutating
/// event with no usable patches (or one from a future producer that
/// only ships the snapshot) still folds correctly.
pub async fn replay(
    store: &dyn EventStore,
    session_id: &SessionId,
) -> Result<ReplayResult, WorkflowError> {
    let events = store.get_all(session_id).await?;

    let mut state = Value::Null;
    let mut phase_from_entered: Option<String> = None;
    let mut phase_from_checkpoint: Option<String> = None;

    for event in &events {
        match &event.payload {
            EventPayload::StateIntent {
                state: snapshot,
                patches,
                ..
            } => {
                let folded = apply_patches(&state, patches);
                state = if folded == *snapshot { folded } else { snapshot.clone() };
            }
            EventPayload::StateCheckpoint {
                state: snapshot,
                phase,
                ..
            } => {
                state = snapshot.clone();
                phase_from_checkpoint = Some(phase.clone());
            }
            EventPayload::PhaseEntered { phase, .. } => {
                phase_from_entered = Some(phase.clone());
            }
            _ => {}
        }
    }

    let pending_interactions = find_pending_interactions(&events);

    Ok(ReplayResult {
        state,
        position: events.len() as u64,
        pending_interactions,
        phase: phase_from_entered.or(phase_from_checkpoint),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use skein_core::{make_event, EventPayload, InteractionId, InteractionKind, PhaseExitReason};
    use skein_store_memory::MemoryEventStore;

    #[tokio::test]
    async fn replay_folds_state_and_tracks_last_phase() {
        let store = MemoryEventStore::new();
        let session_id = SessionId::new();

        store
            .append(
                &session_id,
                make_event(
                    EventPayload::WorkflowStarted {
                        session_id: session_id.clone(),
                        workflow: "demo".into(),
                        input: json!({"goal": "ship it"}),
                    },
                    None,
                ),
            )
            .await
            .unwrap();

        store
            .append(
                &session_id,
                make_event(
                    EventPayload::PhaseEntered {
                        phase: "review".into(),
                        from_phase: None,
                    },
                    None,
                ),
            )
            .await
            .unwrap();

        store
            .append(
                &session_id,
                make_event(
                    EventPayload::StateCheckpoint {
                        state: json!({"proposal": "ship it", "approved": false}),
                        position: 2,
                        phase: "review".into(),
                    },
                    None,
                ),
            )
            .await
            .unwrap();

        store
            .append(
                &session_id,
                make_event(
                    EventPayload::PhaseExited {
                        phase: "review".into(),
                        reason: PhaseExitReason::Next,
                    },
                    None,
                ),
            )
            .await
            .unwrap();

        store
            .append(
                &session_id,
                make_event(
                    EventPayload::PhaseEntered {
                        phase: "working".into(),
                        from_phase: Some("review".into()),
                    },
                    None,
                ),
            )
            .await
            .unwrap();

        let result = replay(&store, &session_id).await.unwrap();
        assert_eq!(result.phase.as_deref(), Some("working"));
        assert_eq!(result.state, json!({"proposal": "ship it", "approved": false}));
        assert_eq!(result.position, 5);
        assert!(result.pending_interactions.is_empty());
    }

    #[tokio::test]
    async fn replay_reports_pending_hitl_interactions() {
        let store = MemoryEventStore::new();
        let session_id = SessionId::new();
        let interaction_id = InteractionId::new();

        store
            .append(
                &session_id,
                make_event(
                    EventPayload::InputRequested {
                        id: interaction_id.clone(),
                        prompt: "approve?".into(),
                        kind: InteractionKind::Approval,
                        options: None,
                        metadata: None,
                    },
                    None,
                ),
            )
            .await
            .unwrap();

        let result = replay(&store, &session_id).await.unwrap();
        assert_eq!(result.pending_interactions, vec![interaction_id]);
    }

    #[tokio::test]
    async fn replay_of_unknown_session_yields_empty_state() {
        let store = MemoryEventStore::new();
        let result = replay(&store, &SessionId::new()).await.unwrap();
        assert_eq!(result.state, Value::Null);
        assert_eq!(result.position, 0);
        assert!(result.phase.is_none());
    }
}
