//! End-to-end coverage of the concrete scenarios a `WorkflowRuntime`
//! must handle: the HITL round-trip (live and pre-buffered), dynamic
//! routing, an `until` loop, resuming mid-phase, and playback fail-
//! closed on a cache miss.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde_json::{json, Value};
use skein_core::{
    AgentStream, AgentStreamEvent, CompletionRequest, EventPayload, EventStore, InteractionKind,
    Provider, ProviderError, SessionId, StopReason, WorkflowError,
};
use skein_recorder::MemoryRecorder;
use skein_runtime::{
    replay, AgentDefinition, BoxedAgent, Mode, NextPhase, Phase, ResumeFrom, RuntimeConfig,
    WorkflowDefinition, WorkflowRuntime,
};
use skein_store_memory::MemoryEventStore;

/// Returns a fixed terminal result; stands in for a provider call.
struct FixedProvider {
    model: &'static str,
    output: Value,
    text: String,
}

impl Provider for FixedProvider {
    fn stream(
        &self,
        _request: CompletionRequest,
    ) -> impl Future<Output = Result<AgentStream, ProviderError>> + Send {
        let output = self.output.clone();
        let text = self.text.clone();
        async move {
            let events = vec![AgentStreamEvent::Result {
                output,
                text,
                stop_reason: StopReason::EndTurn,
            }];
            let stream: Pin<Box<dyn Stream<Item = AgentStreamEvent> + Send>> =
                Box::pin(futures::stream::iter(events));
            Ok(stream)
        }
    }

    fn model(&self) -> &str {
        self.model
    }
}

/// Increments `state.count` by one on every call, for `until`-loop
/// coverage.
struct CounterProvider;

impl Provider for CounterProvider {
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<AgentStream, ProviderError>> + Send {
        async move {
            let current = request.prompt["count"].as_i64().unwrap_or(0);
            let events = vec![AgentStreamEvent::Result {
                output: json!({ "count": current + 1 }),
                text: format!("count is now {}", current + 1),
                stop_reason: StopReason::EndTurn,
            }];
            let stream: Pin<Box<dyn Stream<Item = AgentStreamEvent> + Send>> =
                Box::pin(futures::stream::iter(events));
            Ok(stream)
        }
    }

    fn model(&self) -> &str {
        "counter-v1"
    }
}

fn memory_config(mode: Mode) -> (Arc<MemoryEventStore>, RuntimeConfig) {
    let store = Arc::new(MemoryEventStore::new());
    let recorder = Arc::new(MemoryRecorder::new());
    let config = RuntimeConfig::builder(store.clone(), recorder)
        .mode(mode)
        .build();
    (store, config)
}

fn approval_workflow() -> WorkflowDefinition {
    let finalizer = BoxedAgent::new(AgentDefinition::new(
        "finalizer",
        FixedProvider {
            model: "finalizer-v1",
            output: json!({ "finalMessage": "All done!" }),
            text: "All done!".into(),
        },
        |state, _context| json!({ "proposal": state["proposal"] }),
        |raw| Ok(raw.clone()),
        |output, draft, _context| {
            draft["finalMessage"] = output["finalMessage"].clone();
        },
    ));

    let mut phases = HashMap::new();
    phases.insert(
        "review".to_string(),
        Phase::human(
            Arc::new(|state: &Value| format!("Approve: {}?", state["proposal"])),
            InteractionKind::Approval,
            None,
            Arc::new(|response: &Value, draft: &mut Value| {
                draft["approved"] = Value::Bool(response.as_str() == Some("approve"));
            }),
            NextPhase::literal("finalize"),
        ),
    );
    phases.insert(
        "finalize".to_string(),
        Phase::agent(finalizer, Arc::new(|_state, _output| true), NextPhase::literal("done")),
    );
    phases.insert("done".to_string(), Phase::Terminal);

    WorkflowDefinition::new("approval_demo", Value::Null, "review", phases)
        .unwrap()
        .with_start(|input, draft| {
            draft["proposal"] = input.clone();
        })
}

#[tokio::test]
async fn hitl_approval_round_trip_completes_with_expected_state_and_events() {
    let (store, config) = memory_config(Mode::Live);
    let handle = WorkflowRuntime::start(approval_workflow(), json!("Build a REST API"), config);

    let mut subscription = handle.subscribe();
    while let Some(event) = subscription.next().await {
        if let EventPayload::InputRequested { id, .. } = &event.payload {
            handle.respond(id.clone(), json!("approve"), Some(true));
        }
        if matches!(event.payload, EventPayload::WorkflowCompleted { .. }) {
            break;
        }
    }

    let result = handle.result().await.unwrap();
    assert!(result.completed);
    assert_eq!(result.exit_phase.as_deref(), Some("done"));
    assert_eq!(
        result.state,
        json!({
            "proposal": "Build a REST API",
            "approved": true,
            "finalMessage": "All done!",
        })
    );

    let events = store.get_all(&result.session_id).await.unwrap();
    let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
    assert_eq!(
        names,
        vec![
            "workflow:started",
            "phase:entered",
            "input:requested",
            "input:received",
            "state:intent",
            "state:checkpoint",
            "phase:exited",
            "phase:entered",
            "agent:started",
            "agent:completed",
            "state:intent",
            "state:checkpoint",
            "phase:exited",
            "phase:entered",
            "phase:exited",
            "workflow:completed",
        ]
    );
}

#[tokio::test]
async fn pre_buffered_response_is_consumed_before_any_event_is_read() {
    let (_store, config) = memory_config(Mode::Live);
    let handle = WorkflowRuntime::start(approval_workflow(), json!("Ship it"), config);

    // Answer before a single event has been consumed.
    handle.respond_any(json!("approve"), Some(true));

    let result = handle.result().await.unwrap();
    assert!(result.completed);
    assert_eq!(result.state["approved"], json!(true));
}

fn routing_workflow() -> WorkflowDefinition {
    let scorer = BoxedAgent::new(AgentDefinition::new(
        "scorer",
        FixedProvider {
            model: "scorer-v1",
            output: json!({ "score": 85 }),
            text: "scored".into(),
        },
        |_state, _context| Value::Null,
        |raw| Ok(raw.clone()),
        |output, draft, _context| {
            draft["score"] = output["score"].clone();
        },
    ));

    let mut phases = HashMap::new();
    phases.insert(
        "check".to_string(),
        Phase::agent(
            scorer,
            Arc::new(|_state, _output| true),
            NextPhase::dynamic(|state| {
                if state["score"].as_i64().unwrap_or(0) >= 70 {
                    "approved".to_string()
                } else {
                    "rejected".to_string()
                }
            }),
        ),
    );
    phases.insert("approved".to_string(), Phase::Terminal);
    phases.insert("rejected".to_string(), Phase::Terminal);

    WorkflowDefinition::new("routing_demo", json!({ "score": 0 }), "check", phases).unwrap()
}

#[tokio::test]
async fn dynamic_routing_exits_through_the_branch_the_score_selects() {
    let (_store, config) = memory_config(Mode::Live);
    let handle = WorkflowRuntime::start(routing_workflow(), Value::Null, config);
    let result = handle.result().await.unwrap();
    assert_eq!(result.exit_phase.as_deref(), Some("approved"));
}

fn counting_workflow() -> WorkflowDefinition {
    let counter = BoxedAgent::new(AgentDefinition::new(
        "counter",
        CounterProvider,
        |state, _context| json!({ "count": state["count"] }),
        |raw| Ok(raw.clone()),
        |output, draft, _context| {
            draft["count"] = output["count"].clone();
        },
    ));

    let mut phases = HashMap::new();
    phases.insert(
        "counting".to_string(),
        Phase::agent(
            counter,
            Arc::new(|state: &Value, _output| state["count"].as_i64().unwrap_or(0) >= 2),
            NextPhase::literal("done"),
        ),
    );
    phases.insert("done".to_string(), Phase::Terminal);

    WorkflowDefinition::new("counting_demo", json!({ "count": 0 }), "counting", phases).unwrap()
}

#[tokio::test]
async fn until_loop_runs_exactly_the_required_iterations() {
    let (store, config) = memory_config(Mode::Live);
    let handle = WorkflowRuntime::start(counting_workflow(), Value::Null, config);
    let result = handle.result().await.unwrap();

    assert_eq!(result.state["count"], json!(2));

    let events = store.get_all(&result.session_id).await.unwrap();
    let agent_completions = events
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::AgentCompleted { .. }))
        .count();
    assert_eq!(agent_completions, 2);
}

#[tokio::test]
async fn resume_at_mid_phase_continues_without_rerunning_start() {
    // Seed a checkpoint as if a prior execution had already entered
    // `counting` with count == 1 and then been interrupted.
    let seed_store = MemoryEventStore::new();
    let session_id = SessionId::new();

    seed_store
        .append(
            &session_id,
            skein_core::make_event(
                EventPayload::WorkflowStarted {
                    session_id: session_id.clone(),
                    workflow: "counting_demo".into(),
                    input: json!("first run"),
                },
                None,
            ),
        )
        .await
        .unwrap();
    seed_store
        .append(
            &session_id,
            skein_core::make_event(
                EventPayload::PhaseEntered {
                    phase: "counting".into(),
                    from_phase: None,
                },
                None,
            ),
        )
        .await
        .unwrap();
    seed_store
        .append(
            &session_id,
            skein_core::make_event(
                EventPayload::StateCheckpoint {
                    state: json!({ "count": 1 }),
                    position: 2,
                    phase: "counting".into(),
                },
                None,
            ),
        )
        .await
        .unwrap();

    let replayed = replay(&seed_store, &session_id).await.unwrap();
    assert_eq!(replayed.phase.as_deref(), Some("counting"));
    assert_eq!(replayed.state, json!({ "count": 1 }));

    let (resumed_store, recorder) = (
        Arc::new(MemoryEventStore::new()),
        Arc::new(MemoryRecorder::new()),
    );
    let config = RuntimeConfig::builder(resumed_store.clone(), recorder)
        .mode(Mode::Live)
        .resume_from(ResumeFrom {
            state: replayed.state,
            phase: replayed.phase.unwrap(),
        })
        .build();

    // If `start()` ran again it would stomp the resumed state with an
    // empty `{count: 0}` shape; passing a workflow whose `initial_state`
    // differs from the checkpoint proves resume bypassed it.
    let handle = WorkflowRuntime::start(counting_workflow(), json!("second run"), config);
    let result = handle.result().await.unwrap();

    // Only one more increment (1 -> 2) was needed to satisfy `until`.
    assert_eq!(result.state["count"], json!(2));
    let events = resumed_store.get_all(&result.session_id).await.unwrap();
    let agent_completions = events
        .iter()
        .filter(|e| matches!(e.payload, EventPayload::AgentCompleted { .. }))
        .count();
    assert_eq!(agent_completions, 1);
}

#[tokio::test]
async fn playback_isolation_fails_closed_on_a_fingerprint_miss() {
    let (store, config) = memory_config(Mode::Playback);
    let handle = WorkflowRuntime::start(counting_workflow(), Value::Null, config);
    let result = handle.result().await;

    assert!(matches!(result, Err(WorkflowError::Recorder(_))));

    let events = store
        .get_all(
            &handle.session_id().clone(),
        )
        .await
        .unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e.payload, EventPayload::WorkflowAborted { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e.payload, EventPayload::AgentCompleted { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e.payload, EventPayload::StateCheckpoint { .. })));
}
