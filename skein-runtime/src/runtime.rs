//! The Workflow Runtime: the top-level loop. Creates a session, drives
//! the Phase Scheduler to completion on a background task, and hands
//! the caller an [`ExecutionHandle`] — a stream, not a buffer.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use skein_core::{
    dispatch, make_event, update, EventPayload, EventStore, InputRequest, InteractionId, Observer,
    SessionId, WorkflowError, WorkflowResult,
};
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, instrument, warn};

use crate::executor::ExecutorDeps;
use crate::hitl::{HitlCoordinator, InteractionResponse};
use crate::hub::{EventHub, Subscription};
use crate::phase::WorkflowDefinition;
use crate::scheduler::{run_phase_graph, ControlFlags};
use crate::config::RuntimeConfig;

/// The handle a caller drives a running (or already-finished) workflow
/// execution through. Cheap to clone the underlying collaborators but
/// the handle itself is not `Clone` — `result()` consumes the single
/// completion channel, matching "one result, awaited once".
pub struct ExecutionHandle {
    session_id: SessionId,
    flags: Arc<ControlFlags>,
    hitl: Arc<HitlCoordinator>,
    hub: Arc<EventHub>,
    result_rx: Mutex<Option<oneshot::Receiver<Result<WorkflowResult, WorkflowError>>>>,
}

impl ExecutionHandle {
    /// The session this execution is running (or ran) as.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Await the final result. May only be consumed once; a second call
    /// returns `WorkflowError::Aborted` rather than hanging forever,
    /// since the oneshot channel has already been drained.
    pub async fn result(&self) -> Result<WorkflowResult, WorkflowError> {
        let rx = self.result_rx.lock().await.take();
        match rx {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(WorkflowError::Aborted("runtime task dropped".into()))),
            None => Err(WorkflowError::Aborted(
                "execution result already consumed".into(),
            )),
        }
    }

    /// Answer a specific pending HITL interaction.
    pub fn respond(&self, interaction_id: InteractionId, value: Value, approved: Option<bool>) {
        self.hitl
            .respond(interaction_id, InteractionResponse { value, approved });
    }

    /// Answer without naming which interaction — for the common case of
    /// a single pending request, answered before the caller has
    /// consumed the `input:requested` event that carries its id (see
    /// §8 scenario 2, the pre-buffered response).
    pub fn respond_any(&self, value: Value, approved: Option<bool>) {
        self.hitl.respond_any(InteractionResponse { value, approved });
    }

    /// Request a cooperative pause. Takes effect at the next phase
    /// boundary or agent-stream chunk; an in-flight provider call is
    /// allowed to finish.
    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::SeqCst);
    }

    /// Clear a pause, letting the scheduler proceed.
    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    /// Whether a pause is currently in effect.
    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Abort the execution. Cancels further phase progress, flushes the
    /// in-flight event, and resolves `result()` with `completed: false`.
    pub fn abort(&self) {
        self.flags.aborted.store(true, Ordering::SeqCst);
    }

    /// Subscribe to this execution's live event stream. Late
    /// subscribers never see events published before they subscribed.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }
}

/// The top-level entry point: starts a workflow execution (fresh or
/// resumed, depending on `config.resume_from`) and returns immediately
/// with an [`ExecutionHandle`] bound to a background task driving it.
pub struct WorkflowRuntime;

impl WorkflowRuntime {
    /// Start a workflow. If `config.resume_from` is set, `workflow.start`
    /// is skipped entirely and the session begins directly in the
    /// supplied phase with the supplied state (per the resume contract
    /// in §4.9) — `workflow:started` is still emitted so observers see
    /// the session boundary.
    #[instrument(skip_all, fields(workflow = %workflow.name))]
    pub fn start(workflow: WorkflowDefinition, input: Value, config: RuntimeConfig) -> ExecutionHandle {
        let workflow = Arc::new(workflow);
        let session_id = config.session_id.clone().unwrap_or_else(SessionId::new);
        let store = config.store.clone();
        let recorder = config.recorder.clone();
        let observer = config.observer.clone();
        let hub = Arc::new(EventHub::new());
        let hitl = Arc::new(HitlCoordinator::new());
        let flags = ControlFlags::new();
        let (result_tx, result_rx) = oneshot::channel();

        if let Some(observer) = observer.clone() {
            spawn_dispatch_task(hub.clone(), hitl.clone(), observer);
        }

        let deps = ExecutorDeps {
            store: store.clone(),
            hub: hub.clone(),
            recorder,
            session_id: session_id.clone(),
            mode: config.mode,
            provider_unavailable_retry: config.provider_unavailable_retry,
        };

        tokio::spawn(run_to_completion(
            workflow,
            input,
            config.resume_from,
            config.phase_loop_budget,
            store,
            hub.clone(),
            hitl.clone(),
            flags.clone(),
            deps,
            observer,
            session_id.clone(),
            result_tx,
        ));

        ExecutionHandle {
            session_id,
            flags,
            hitl,
            hub,
            result_rx: Mutex::new(Some(result_rx)),
        }
    }
}

fn spawn_dispatch_task(hub: Arc<EventHub>, hitl: Arc<HitlCoordinator>, observer: Arc<dyn Observer>) {
    tokio::spawn(async move {
        let mut subscription = hub.subscribe();
        while let Some(event) = subscription.next().await {
            if let EventPayload::InputRequested {
                id,
                prompt,
                kind,
                options,
                metadata,
            } = &event.payload
            {
                let request = InputRequest {
                    interaction_id: id.clone(),
                    prompt: prompt.clone(),
                    kind: *kind,
                    options: options.clone(),
                    metadata: metadata.clone(),
                };
                if let Some(value) = observer.on_input_requested(&request).await {
                    hitl.respond(id.clone(), InteractionResponse { value, approved: None });
                }
            }
            dispatch(observer.as_ref(), &event).await;
        }
    });
}

#[allow(clippy::too_many_arguments)]
async fn run_to_completion(
    workflow: Arc<WorkflowDefinition>,
    input: Value,
    resume_from: Option<crate::config::ResumeFrom>,
    loop_budget: u32,
    store: Arc<dyn EventStore>,
    hub: Arc<EventHub>,
    hitl: Arc<HitlCoordinator>,
    flags: Arc<ControlFlags>,
    deps: ExecutorDeps,
    observer: Option<Arc<dyn Observer>>,
    session_id: SessionId,
    result_tx: oneshot::Sender<Result<WorkflowResult, WorkflowError>>,
) {
    let started_at = Instant::now();

    let (state, start_phase) = match resume_from {
        Some(resume) => (resume.state, resume.phase),
        None => {
            let mut state = workflow.initial_state.clone();
            if let Some(start_fn) = &workflow.start {
                let result = update(&state, |draft| start_fn(&input, draft));
                state = result.new_state;
            }
            (state, workflow.start_phase.clone())
        }
    };

    let started_event = make_event(
        EventPayload::WorkflowStarted {
            session_id: session_id.clone(),
            workflow: workflow.name.clone(),
            input: input.clone(),
        },
        None,
    );
    if let Err(store_error) = store.append(&session_id, started_event.clone()).await {
        let error = WorkflowError::from(store_error);
        error!(%error, "failed to persist workflow:started, aborting before scheduling");
        finish_with_error(&observer, result_tx, error).await;
        return;
    }
    hub.publish(started_event);
    info!(%session_id, workflow = %workflow.name, "workflow started");

    let outcome = run_phase_graph(
        &workflow,
        state,
        &start_phase,
        &deps,
        &hitl,
        &flags,
        loop_budget,
    )
    .await;

    match outcome {
        Ok(outcome) if outcome.completed => {
            let completed_event = make_event(
                EventPayload::WorkflowCompleted {
                    session_id: session_id.clone(),
                    final_state: outcome.state.clone(),
                    exit_phase: outcome.exit_phase.clone(),
                },
                None,
            );
            if let Err(store_error) = store.append(&session_id, completed_event.clone()).await {
                let error = WorkflowError::from(store_error);
                finish_with_error(&observer, result_tx, error).await;
                return;
            }
            hub.publish(completed_event);

            let result = WorkflowResult {
                session_id,
                state: outcome.state,
                completed: true,
                exit_phase: outcome.exit_phase,
                duration_ms: started_at.elapsed().as_millis() as u64,
            };
            if let Some(observer) = &observer {
                observer.on_completed(&result).await;
            }
            let _ = result_tx.send(Ok(result));
        }
        Ok(outcome) => {
            let reason = if flags.aborted.load(Ordering::SeqCst) {
                "aborted by caller".to_string()
            } else {
                "stopped before reaching a terminal phase".to_string()
            };
            warn!(%session_id, %reason, "workflow ended without reaching a terminal phase");
            let aborted_event = make_event(
                EventPayload::WorkflowAborted {
                    session_id: session_id.clone(),
                    reason,
                },
                None,
            );
            let _ = store.append(&session_id, aborted_event.clone()).await;
            hub.publish(aborted_event);

            let result = WorkflowResult {
                session_id,
                state: outcome.state,
                completed: false,
                exit_phase: outcome.exit_phase,
                duration_ms: started_at.elapsed().as_millis() as u64,
            };
            if let Some(observer) = &observer {
                observer.on_completed(&result).await;
            }
            let _ = result_tx.send(Ok(result));
        }
        Err(error) => {
            error!(%session_id, %error, "workflow execution failed fatally");
            let aborted_event = make_event(
                EventPayload::WorkflowAborted {
                    session_id: session_id.clone(),
                    reason: error.to_string(),
                },
                None,
            );
            let _ = store.append(&session_id, aborted_event.clone()).await;
            hub.publish(aborted_event);
            finish_with_error(&observer, result_tx, error).await;
        }
    }
}

async fn finish_with_error(
    observer: &Option<Arc<dyn Observer>>,
    result_tx: oneshot::Sender<Result<WorkflowResult, WorkflowError>>,
    error: WorkflowError,
) {
    if let Some(observer) = observer {
        observer.on_error(&error).await;
    }
    let _ = result_tx.send(Err(error));
}
