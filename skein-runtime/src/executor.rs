//! The Agent Executor — drives one provider call, consulting the
//! recorder for playback, validating output, and emitting per-agent
//! events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use skein_core::{
    hash_provider_request, make_event, AgentStreamEvent, CompletionRequest, Event, EventId,
    EventPayload, EventStore, FingerprintInput, OutputError, Provider, ProviderError as CoreProviderError,
    ProviderRecorder, RecordedStreamEvent, RecorderError, RecordingResult, SessionId, StopReason,
    WorkflowError,
};
use tracing::{instrument, warn};

use crate::agent::AgentDefinition;
use crate::config::Mode;
use crate::hub::EventHub;

/// Everything the executor needs that isn't specific to one agent
/// call: the session's shared collaborators plus run mode.
pub struct ExecutorDeps {
    pub store: Arc<dyn EventStore>,
    pub hub: Arc<EventHub>,
    pub recorder: Arc<dyn ProviderRecorder>,
    pub session_id: SessionId,
    pub mode: Mode,
    pub provider_unavailable_retry: u32,
}

/// What one completed agent call hands back to the Phase Scheduler.
pub struct AgentRunOutcome {
    pub output: Value,
    pub text: String,
    pub duration_ms: u64,
    /// Every internal event emitted during this call, in emission
    /// order, for the scheduler's parallel-batch bookkeeping.
    pub events: Vec<Event>,
}

async fn emit(
    deps: &ExecutorDeps,
    payload: EventPayload,
    caused_by: Option<EventId>,
) -> Result<Event, WorkflowError> {
    let event = make_event(payload, caused_by);
    deps.store
        .append(&deps.session_id, event.clone())
        .await
        .map_err(WorkflowError::from)?;
    deps.hub.publish(event.clone());
    Ok(event)
}

/// Map one raw provider stream event onto at most one internal event,
/// per the executor's event table. Returns `None` for variants that
/// carry no externally visible event.
fn map_stream_event(agent_name: &str, event: &AgentStreamEvent) -> Option<EventPayload> {
    match event {
        AgentStreamEvent::TextDelta(delta) => Some(EventPayload::TextDelta {
            agent_name: agent_name.to_string(),
            delta: delta.clone(),
        }),
        AgentStreamEvent::ThinkingDelta(delta) => Some(EventPayload::ThinkingDelta {
            agent_name: agent_name.to_string(),
            delta: delta.clone(),
        }),
        AgentStreamEvent::ToolCall {
            tool_id,
            tool_name,
            input,
        } => Some(EventPayload::ToolCalled {
            agent_name: agent_name.to_string(),
            tool_id: tool_id.clone(),
            tool_name: tool_name.clone(),
            input: input.clone(),
        }),
        AgentStreamEvent::ToolResult {
            tool_id,
            output,
            is_error,
        } => Some(EventPayload::ToolResult {
            agent_name: agent_name.to_string(),
            tool_id: tool_id.clone(),
            output: output.clone(),
            is_error: *is_error,
        }),
        AgentStreamEvent::Result { .. }
        | AgentStreamEvent::TextComplete
        | AgentStreamEvent::ThinkingComplete
        | AgentStreamEvent::Stop(_)
        | AgentStreamEvent::Usage { .. }
        | AgentStreamEvent::SessionInit { .. } => None,
    }
}

/// Drive one call to completion: compute the fingerprint, consult the
/// recorder, stream or replay, validate output, and emit every
/// resulting event.
#[instrument(skip(agent, state, context, deps), fields(agent = %agent.name, session_id = %deps.session_id, phase))]
pub async fn run_agent<P: Provider>(
    agent: &AgentDefinition<P>,
    state: &Value,
    context: Option<&Value>,
    phase: Option<&str>,
    deps: &ExecutorDeps,
) -> Result<AgentRunOutcome, WorkflowError> {
    let started_at = Instant::now();
    let prompt = (agent.prompt_fn)(state, context);

    let fingerprint_input = FingerprintInput {
        model: agent.provider.model().to_string(),
        prompt: prompt.clone(),
        provider_options: agent.options.clone(),
        tools: None,
        output_schema: None,
    };
    let fingerprint = hash_provider_request(&fingerprint_input)?;

    let started_event = emit(
        deps,
        EventPayload::AgentStarted {
            agent: agent.name.clone(),
            phase: phase.map(|p| p.to_string()),
            context: context.cloned(),
        },
        None,
    )
    .await?;

    let mut emitted = vec![started_event.clone()];
    let mut text = String::new();
    let mut output: Option<Value> = None;
    let mut stop_reason = StopReason::EndTurn;

    if let Some(recording) = deps.recorder.load(&fingerprint).await.map_err(WorkflowError::from)? {
        tracing::debug!(%fingerprint, agent = %agent.name, "recorder hit, replaying from cache");
        for recorded in recording.events {
            let live = recorded.into_live();
            if let Some(payload) = map_stream_event(&agent.name, &live) {
                if let EventPayload::TextDelta { delta, .. } = &payload {
                    text.push_str(delta);
                }
                let event = emit(deps, payload, Some(started_event.id.clone())).await?;
                emitted.push(event);
            }
        }
        output = Some(recording.output);
        text = recording.text;
        stop_reason = recording.stop_reason;
    } else if matches!(deps.mode, Mode::Playback) {
        warn!(%fingerprint, agent = %agent.name, "recorder miss in playback mode, failing closed");
        return Err(WorkflowError::from(RecorderError::NotFound(fingerprint)));
    } else {
        tracing::debug!(%fingerprint, agent = %agent.name, "recorder miss, calling live provider");
        let request = CompletionRequest {
            prompt,
            provider_options: agent.options.clone().unwrap_or(Value::Null),
            tools: None,
            output_schema: None,
        };

        let mut stream = call_with_retry(agent, request, deps.provider_unavailable_retry).await?;
        let recording_id = deps.recorder.start_recording(&fingerprint).await.map_err(WorkflowError::from)?;

        use futures::StreamExt;
        while let Some(raw) = stream.next().await {
            if let Some(recorded) = RecordedStreamEvent::from_live(&raw) {
                deps.recorder
                    .append_event(&recording_id, recorded)
                    .await
                    .map_err(WorkflowError::from)?;
            }
            if let Some(payload) = map_stream_event(&agent.name, &raw) {
                if let EventPayload::TextDelta { delta, .. } = &payload {
                    text.push_str(delta);
                }
                let event = emit(deps, payload, Some(started_event.id.clone())).await?;
                emitted.push(event);
            }
            if let AgentStreamEvent::Result {
                output: result_output,
                text: result_text,
                stop_reason: result_stop,
            } = raw
            {
                output = Some(result_output);
                text = result_text;
                stop_reason = result_stop;
            }
        }

        let output = output.clone().ok_or(WorkflowError::Provider(CoreProviderError::StreamEndedWithoutResult))?;
        deps.recorder
            .finalize_recording(
                &recording_id,
                RecordingResult {
                    output,
                    text: text.clone(),
                    stop_reason,
                },
            )
            .await
            .map_err(WorkflowError::from)?;
    }

    let output = match output {
        Some(output) => output,
        None => {
            let error = WorkflowError::Provider(CoreProviderError::StreamEndedWithoutResult);
            emit(
                deps,
                EventPayload::AgentFailed {
                    agent: agent.name.clone(),
                    error: error.to_string(),
                },
                Some(started_event.id.clone()),
            )
            .await?;
            return Err(error);
        }
    };

    let validated = match (agent.output_schema)(&output) {
        Ok(validated) => validated,
        Err(reason) => {
            emit(
                deps,
                EventPayload::AgentFailed {
                    agent: agent.name.clone(),
                    error: reason.clone(),
                },
                Some(started_event.id.clone()),
            )
            .await?;
            return Err(WorkflowError::Output(OutputError::Invalid(reason)));
        }
    };

    let duration_ms = started_at.elapsed().as_millis() as u64;
    let completed_event = emit(
        deps,
        EventPayload::AgentCompleted {
            agent: agent.name.clone(),
            output: validated.clone(),
            duration_ms,
        },
        Some(started_event.id.clone()),
    )
    .await?;
    emitted.push(completed_event);

    Ok(AgentRunOutcome {
        output: validated,
        text,
        duration_ms,
        events: emitted,
    })
}

async fn call_with_retry<P: Provider>(
    agent: &AgentDefinition<P>,
    request: CompletionRequest,
    retries: u32,
) -> Result<skein_core::AgentStream, WorkflowError> {
    let mut attempt = 0;
    loop {
        match agent.provider.stream(request.clone()).await {
            Ok(stream) => return Ok(stream),
            Err(CoreProviderError::Unavailable(message)) if attempt < retries => {
                attempt += 1;
                let backoff = Duration::from_millis(50 * 2u64.pow(attempt));
                warn!(attempt, %message, backoff_ms = backoff.as_millis() as u64, "provider unavailable, retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(error) => return Err(WorkflowError::Provider(error)),
        }
    }
}
