//! The Phase Scheduler: sequences phases, handles `forEach`/parallel
//! fan-out, `until` loops, and routing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::Value;
use skein_core::{
    make_event, update, Event, EventId, EventPayload, InteractionId, PhaseExitReason, UpdateResult,
    WorkflowError,
};
use tracing::{info, instrument};

use crate::executor::ExecutorDeps;
use crate::hitl::HitlCoordinator;
use crate::phase::{NextPhase, Phase, WorkflowDefinition};

/// Cooperative flags the scheduler checks at phase boundaries and
/// between agent-stream chunks.
#[derive(Default)]
pub struct ControlFlags {
    pub paused: AtomicBool,
    pub aborted: AtomicBool,
}

impl ControlFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// The outcome of driving a workflow's phase graph to completion.
pub struct SchedulerOutcome {
    pub state: Value,
    pub exit_phase: Option<String>,
    pub completed: bool,
}

async fn emit(
    deps: &ExecutorDeps,
    payload: EventPayload,
    caused_by: Option<EventId>,
) -> Result<Event, WorkflowError> {
    use skein_core::EventStore;
    let event = make_event(payload, caused_by);
    deps.store
        .append(&deps.session_id, event.clone())
        .await
        .map_err(WorkflowError::from)?;
    deps.hub.publish(event.clone());
    Ok(event)
}

/// Emit the speculative `state:intent` a patch-producing update carries,
/// before the eventual `state:checkpoint`. One intent per reducer call.
async fn emit_intent(deps: &ExecutorDeps, result: &UpdateResult) -> Result<Event, WorkflowError> {
    emit(
        deps,
        EventPayload::StateIntent {
            intent_id: EventId::new().to_string(),
            state: result.new_state.clone(),
            patches: result.patches.clone(),
            inverse_patches: result.inverse_patches.clone(),
        },
        None,
    )
    .await
}

/// Wait cooperatively while paused, re-checking on a short interval.
/// Abort always wins over pause.
async fn wait_while_paused(flags: &ControlFlags) {
    while flags.paused.load(Ordering::SeqCst) && !flags.aborted.load(Ordering::SeqCst) {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}

/// Drive `workflow` from `start_phase` with `state`, running until a
/// terminal phase, a fatal error, or an abort.
#[instrument(skip_all, fields(workflow = %workflow.name, session_id = %deps.session_id))]
pub async fn run_phase_graph(
    workflow: &WorkflowDefinition,
    mut state: Value,
    start_phase: &str,
    deps: &ExecutorDeps,
    hitl: &HitlCoordinator,
    flags: &ControlFlags,
    loop_budget: u32,
) -> Result<SchedulerOutcome, WorkflowError> {
    let mut current_phase = start_phase.to_string();
    let mut from_phase: Option<String> = None;

    loop {
        if flags.aborted.load(Ordering::SeqCst) {
            return Ok(SchedulerOutcome {
                state,
                exit_phase: Some(current_phase),
                completed: false,
            });
        }
        wait_while_paused(flags).await;

        let entered = emit(
            deps,
            EventPayload::PhaseEntered {
                phase: current_phase.clone(),
                from_phase: from_phase.clone(),
            },
            None,
        )
        .await?;
        info!(phase = %current_phase, "phase entered");

        let phase = workflow
            .phases
            .get(&current_phase)
            .ok_or_else(|| WorkflowError::Misconfigured(format!("unknown phase {current_phase:?}")))?;

        match phase {
            Phase::Terminal => {
                emit(
                    deps,
                    EventPayload::PhaseExited {
                        phase: current_phase.clone(),
                        reason: PhaseExitReason::Terminal,
                    },
                    Some(entered.id.clone()),
                )
                .await?;
                return Ok(SchedulerOutcome {
                    state,
                    exit_phase: Some(current_phase),
                    completed: true,
                });
            }

            Phase::Agent { agent, until, next, timeout } => {
                let mut iterations = 0u32;
                let phase_started = Instant::now();
                loop {
                    if flags.aborted.load(Ordering::SeqCst) {
                        return Ok(SchedulerOutcome {
                            state,
                            exit_phase: Some(current_phase),
                            completed: false,
                        });
                    }
                    if let Some(limit) = timeout {
                        let elapsed = phase_started.elapsed();
                        if elapsed > *limit {
                            return Err(WorkflowError::PhaseTimeout {
                                phase: current_phase.clone(),
                                elapsed_ms: elapsed.as_millis() as u64,
                            });
                        }
                    }
                    iterations += 1;
                    if iterations > loop_budget {
                        return Err(WorkflowError::PhaseLoopBudget {
                            phase: current_phase.clone(),
                            budget: loop_budget,
                        });
                    }
                    tracing::debug!(phase = %current_phase, iteration = iterations, "agent phase iteration");

                    let outcome = agent.run(&state, None, Some(&current_phase), deps).await?;
                    let agent_ref = agent.clone();
                    let update_result = update(&state, |draft| {
                        agent_ref.apply_update(&outcome.output, draft, None);
                    });
                    emit_intent(deps, &update_result).await?;
                    state = update_result.new_state;
                    emit_checkpoint(deps, &state, &current_phase).await?;

                    if (until)(&state, &outcome.output) {
                        break;
                    }
                }
                let next_name = next.resolve(&state);
                transition(deps, &entered, &current_phase, &next_name, &mut current_phase, &mut from_phase)
                    .await?;
            }

            Phase::ForEachAgent {
                agent,
                for_each,
                parallel,
                until,
                next,
                timeout,
            } => {
                let mut iterations = 0u32;
                let phase_started = Instant::now();
                loop {
                    if flags.aborted.load(Ordering::SeqCst) {
                        return Ok(SchedulerOutcome {
                            state,
                            exit_phase: Some(current_phase),
                            completed: false,
                        });
                    }
                    if let Some(limit) = timeout {
                        let elapsed = phase_started.elapsed();
                        if elapsed > *limit {
                            return Err(WorkflowError::PhaseTimeout {
                                phase: current_phase.clone(),
                                elapsed_ms: elapsed.as_millis() as u64,
                            });
                        }
                    }
                    iterations += 1;
                    if iterations > loop_budget {
                        return Err(WorkflowError::PhaseLoopBudget {
                            phase: current_phase.clone(),
                            budget: loop_budget,
                        });
                    }
                    tracing::debug!(phase = %current_phase, iteration = iterations, "for-each phase iteration");

                    let contexts = (for_each)(&state);
                    let mut outputs = Vec::with_capacity(contexts.len());
                    for batch in contexts.chunks(*parallel) {
                        let futures = batch.iter().map(|ctx| {
                            let agent = agent.clone();
                            let state = state.clone();
                            let phase_name = current_phase.clone();
                            async move { agent.run(&state, Some(ctx), Some(&phase_name), deps).await }
                        });
                        let results = join_all(futures).await;
                        for result in results {
                            outputs.push(result?);
                        }
                    }

                    // State merging happens by sequentially applying
                    // each worker's reducer after all workers complete —
                    // ordering of events across workers within one batch
                    // is not guaranteed, but the merge order here is
                    // deterministic (input order) regardless.
                    let mut merged_output = Value::Null;
                    for outcome in &outputs {
                        let agent_ref = agent.clone();
                        let output = outcome.output.clone();
                        let update_result = update(&state, |draft| {
                            agent_ref.apply_update(&output, draft, None);
                        });
                        emit_intent(deps, &update_result).await?;
                        state = update_result.new_state;
                        merged_output = outcome.output.clone();
                    }
                    emit_checkpoint(deps, &state, &current_phase).await?;

                    if (until)(&state, &merged_output) {
                        break;
                    }
                }
                let next_name = next.resolve(&state);
                transition(deps, &entered, &current_phase, &next_name, &mut current_phase, &mut from_phase)
                    .await?;
            }

            Phase::Human {
                prompt,
                kind,
                options,
                on_response,
                next,
            } => {
                let interaction_id = InteractionId::new();
                let prompt_text = (prompt)(&state);
                let requested = emit(
                    deps,
                    EventPayload::InputRequested {
                        id: interaction_id.clone(),
                        prompt: prompt_text,
                        kind: *kind,
                        options: options.clone(),
                        metadata: None,
                    },
                    Some(entered.id.clone()),
                )
                .await?;

                let response = hitl
                    .await_response(&interaction_id)
                    .await
                    .ok_or_else(|| WorkflowError::Aborted("hitl coordinator dropped".into()))?;

                emit(
                    deps,
                    EventPayload::InputReceived {
                        id: interaction_id,
                        value: response.value.clone(),
                        approved: response.approved,
                    },
                    Some(requested.id.clone()),
                )
                .await?;

                let update_result = update(&state, |draft| {
                    (on_response)(&response.value, draft);
                });
                emit_intent(deps, &update_result).await?;
                state = update_result.new_state;
                emit_checkpoint(deps, &state, &current_phase).await?;

                let next_name = next.resolve(&state);
                transition(deps, &entered, &current_phase, &next_name, &mut current_phase, &mut from_phase)
                    .await?;
            }
        }
    }
}

async fn emit_checkpoint(deps: &ExecutorDeps, state: &Value, phase: &str) -> Result<(), WorkflowError> {
    use skein_core::EventStore;
    let position = deps
        .store
        .get_all(&deps.session_id)
        .await
        .map_err(WorkflowError::from)?
        .len() as u64;
    emit(
        deps,
        EventPayload::StateCheckpoint {
            state: state.clone(),
            position,
            phase: phase.to_string(),
        },
        None,
    )
    .await?;
    Ok(())
}

async fn transition(
    deps: &ExecutorDeps,
    entered: &Event,
    from: &str,
    to: &str,
    current_phase: &mut String,
    from_phase: &mut Option<String>,
) -> Result<(), WorkflowError> {
    emit(
        deps,
        EventPayload::PhaseExited {
            phase: from.to_string(),
            reason: PhaseExitReason::Next,
        },
        Some(entered.id.clone()),
    )
    .await?;
    *from_phase = Some(from.to_string());
    *current_phase = to.to_string();
    Ok(())
}
