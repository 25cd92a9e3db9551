//! A single agent phase that calls itself repeatedly under `until`,
//! raising a quality score each pass, then routes dynamically to an
//! `approved` or `rejected` terminal phase depending on the result.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use serde_json::{json, Value};
use skein_core::{AgentStream, AgentStreamEvent, CompletionRequest, Provider, ProviderError, StopReason};
use skein_recorder::MemoryRecorder;
use skein_runtime::{
    AgentDefinition, BoxedAgent, Mode, NextPhase, Phase, RuntimeConfig, WorkflowDefinition,
    WorkflowRuntime,
};
use skein_store_memory::MemoryEventStore;

const SCORE_THRESHOLD: i64 = 70;
const SCORE_STEP: i64 = 40;

/// Raises whatever score it's handed by a fixed step — stands in for
/// a real reviewer model scoring successive drafts.
struct ReviewerProvider;

impl Provider for ReviewerProvider {
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<AgentStream, ProviderError>> + Send {
        async move {
            let current = request.prompt["score"].as_i64().unwrap_or(0);
            let raised = current + SCORE_STEP;
            let events: Vec<AgentStreamEvent> = vec![AgentStreamEvent::Result {
                output: json!({ "score": raised }),
                text: format!("score now {raised}"),
                stop_reason: StopReason::EndTurn,
            }];
            let stream: Pin<Box<dyn Stream<Item = AgentStreamEvent> + Send>> =
                Box::pin(futures::stream::iter(events));
            Ok(stream)
        }
    }

    fn model(&self) -> &str {
        "demo-reviewer-v1"
    }
}

fn build_workflow() -> WorkflowDefinition {
    let reviewer = BoxedAgent::new(AgentDefinition::new(
        "reviewer",
        ReviewerProvider,
        |state, _context| json!({ "score": state["score"] }),
        |raw| Ok(raw.clone()),
        |output, draft, _context| {
            draft["score"] = output["score"].clone();
        },
    ));

    let mut phases = HashMap::new();
    phases.insert(
        "review".to_string(),
        Phase::agent(
            reviewer,
            Arc::new(|state: &Value, _output: &Value| {
                state["score"].as_i64().unwrap_or(0) >= SCORE_THRESHOLD
            }),
            NextPhase::dynamic(|state| {
                if state["score"].as_i64().unwrap_or(0) >= SCORE_THRESHOLD {
                    "approved".to_string()
                } else {
                    "rejected".to_string()
                }
            }),
        ),
    );
    phases.insert("approved".to_string(), Phase::Terminal);
    phases.insert("rejected".to_string(), Phase::Terminal);

    WorkflowDefinition::new("review_loop", json!({ "score": 0 }), "review", phases)
        .expect("workflow graph is well-formed")
}

#[tokio::main]
async fn main() {
    let store = Arc::new(MemoryEventStore::new());
    let recorder = Arc::new(MemoryRecorder::new());
    let config = RuntimeConfig::builder(store, recorder)
        .mode(Mode::Live)
        .build();

    let handle = WorkflowRuntime::start(build_workflow(), Value::Null, config);
    let result = handle.result().await.expect("workflow did not abort");

    println!("exit phase: {:?}", result.exit_phase);
    println!("final state: {}", result.state);
}
