//! A three-phase approval workflow: a human reviews a proposal, an
//! agent finalizes it, then the workflow ends.
//!
//! Demonstrates the HITL approval round-trip and the pre-buffered
//! response case: run with `--pre-buffer` to answer the approval
//! before the runtime has even emitted `input:requested`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde_json::{json, Value};
use skein_core::{
    AgentStream, AgentStreamEvent, CompletionRequest, EventPayload, InteractionKind, Provider,
    ProviderError, StopReason,
};
use skein_recorder::MemoryRecorder;
use skein_runtime::{
    AgentDefinition, BoxedAgent, Mode, NextPhase, Phase, RuntimeConfig, WorkflowDefinition,
    WorkflowRuntime,
};
use skein_store_memory::MemoryEventStore;

/// Always produces the same closing message; stands in for a real
/// model call so this demo runs without network access or API keys.
struct FinalizerProvider;

impl Provider for FinalizerProvider {
    fn stream(
        &self,
        _request: CompletionRequest,
    ) -> impl Future<Output = Result<AgentStream, ProviderError>> + Send {
        async move {
            let events: Vec<AgentStreamEvent> = vec![
                AgentStreamEvent::TextDelta("Wrapping up...".into()),
                AgentStreamEvent::Result {
                    output: json!({"finalMessage": "All done!"}),
                    text: "Wrapping up... All done!".into(),
                    stop_reason: StopReason::EndTurn,
                },
            ];
            let stream: Pin<Box<dyn Stream<Item = AgentStreamEvent> + Send>> =
                Box::pin(futures::stream::iter(events));
            Ok(stream)
        }
    }

    fn model(&self) -> &str {
        "demo-finalizer-v1"
    }
}

fn build_workflow() -> WorkflowDefinition {
    let finalize_agent = BoxedAgent::new(AgentDefinition::new(
        "finalizer",
        FinalizerProvider,
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
            Arc::new(|state: &Value| format!("Approve proposal: {}?", state["proposal"])),
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
        Phase::agent(finalize_agent, Arc::new(|_state, _output| true), NextPhase::literal("done")),
    );
    phases.insert("done".to_string(), Phase::Terminal);

    WorkflowDefinition::new("approval_workflow", Value::Null, "review", phases)
        .expect("workflow graph is well-formed")
        .with_start(|input, draft| {
            draft["proposal"] = input.clone();
        })
}

#[tokio::main]
async fn main() {
    let pre_buffer = std::env::args().any(|arg| arg == "--pre-buffer");

    let store = Arc::new(MemoryEventStore::new());
    let recorder = Arc::new(MemoryRecorder::new());
    let config = RuntimeConfig::builder(store, recorder)
        .mode(Mode::Live)
        .build();

    let workflow = build_workflow();
    let handle = WorkflowRuntime::start(workflow, json!("Build a REST API"), config);

    if pre_buffer {
        // Answer before consuming a single event — exercises the
        // coordinator's anonymous-response queue.
        handle.respond_any(json!("approve"), Some(true));
    } else {
        let mut subscription = handle.subscribe();
        while let Some(event) = subscription.next().await {
            if let EventPayload::InputRequested { id, .. } = &event.payload {
                handle.respond(id.clone(), json!("approve"), Some(true));
            }
            if matches!(event.payload, EventPayload::WorkflowCompleted { .. }) {
                break;
            }
        }
    }

    let result = handle.result().await.expect("workflow did not abort");
    println!("completed: {}", result.completed);
    println!("final state: {}", result.state);
}
