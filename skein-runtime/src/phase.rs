//! The phase graph: the declarative shape a [`crate::scheduler`] drives.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use skein_core::InteractionKind;

use crate::agent::BoxedAgent;

/// The function shape used for `forEach` fan-out: given the current
/// state, produce one context value per agent invocation to dispatch.
pub type ForEachFn = Arc<dyn Fn(&Value) -> Vec<Value> + Send + Sync>;

/// The function shape used for `until` loop guards: given the current
/// state and the most recent agent output, decide whether the phase is
/// done iterating.
pub type UntilFn = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Either a literal phase name or a function of state choosing the
/// next phase dynamically.
#[derive(Clone)]
pub enum NextPhase {
    /// Always transition to this phase.
    Literal(String),
    /// Compute the next phase name (or `"terminal"`) from state.
    Dynamic(Arc<dyn Fn(&Value) -> String + Send + Sync>),
}

impl NextPhase {
    /// A fixed next-phase name.
    pub fn literal(name: impl Into<String>) -> Self {
        Self::Literal(name.into())
    }

    /// A state-dependent next-phase name.
    pub fn dynamic(f: impl Fn(&Value) -> String + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    /// Resolve against the current state.
    pub fn resolve(&self, state: &Value) -> String {
        match self {
            NextPhase::Literal(name) => name.clone(),
            NextPhase::Dynamic(f) => f(state),
        }
    }
}

/// A reducer applied to the draft state once a human response arrives.
pub type OnResponseFn = Arc<dyn Fn(&Value, &mut Value) + Send + Sync>;

/// How a human phase prompts for input. The prompt may depend on
/// state, e.g. to echo back a prior agent's output.
pub type PromptTextFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// One node in the phase graph.
pub enum Phase {
    /// Runs one agent repeatedly until `until` is satisfied, then
    /// transitions.
    Agent {
        agent: BoxedAgent,
        until: UntilFn,
        next: NextPhase,
        timeout: Option<Duration>,
    },
    /// Computes a context per element via `for_each`, dispatches up to
    /// `parallel` agent runs concurrently, joins, then evaluates
    /// `until` against the joined state.
    ForEachAgent {
        agent: BoxedAgent,
        for_each: ForEachFn,
        parallel: usize,
        until: UntilFn,
        next: NextPhase,
        timeout: Option<Duration>,
    },
    /// Raises a HITL request, suspends for the response, applies
    /// `on_response`, then transitions.
    Human {
        prompt: PromptTextFn,
        kind: InteractionKind,
        options: Option<Vec<String>>,
        on_response: OnResponseFn,
        next: NextPhase,
    },
    /// Ends the workflow.
    Terminal,
}

impl Phase {
    /// Convenience constructor for a single-agent phase.
    pub fn agent(agent: BoxedAgent, until: UntilFn, next: NextPhase) -> Self {
        Phase::Agent {
            agent,
            until,
            next,
            timeout: None,
        }
    }

    /// Convenience constructor for a fan-out agent phase.
    pub fn for_each_agent(
        agent: BoxedAgent,
        for_each: ForEachFn,
        parallel: usize,
        until: UntilFn,
        next: NextPhase,
    ) -> Self {
        Phase::ForEachAgent {
            agent,
            for_each,
            parallel: parallel.max(1),
            until,
            next,
            timeout: None,
        }
    }

    /// Attach a wall-clock timeout to an agent or for-each-agent phase.
    /// Exceeding it fails the phase with `WorkflowError::PhaseTimeout`.
    /// No-op on `Phase::Human`/`Phase::Terminal`, which have no timeout
    /// field.
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        match &mut self {
            Phase::Agent { timeout, .. } | Phase::ForEachAgent { timeout, .. } => {
                *timeout = Some(duration);
            }
            Phase::Human { .. } | Phase::Terminal => {}
        }
        self
    }

    /// Convenience constructor for a human phase.
    pub fn human(
        prompt: PromptTextFn,
        kind: InteractionKind,
        options: Option<Vec<String>>,
        on_response: OnResponseFn,
        next: NextPhase,
    ) -> Self {
        Phase::Human {
            prompt,
            kind,
            options,
            on_response,
            next,
        }
    }
}

/// A reducer run once, at workflow start, to seed state from the
/// caller's input.
pub type StartFn = Arc<dyn Fn(&Value, &mut Value) + Send + Sync>;

/// A complete workflow: named phases plus the entry point.
///
/// Both "simple" (single agent + `until`, per the data model) and
/// "phased" workflows are represented the same way here — a simple
/// workflow is just a phase map with one agent phase and one terminal
/// phase, which keeps the scheduler free of a second code path.
pub struct WorkflowDefinition {
    pub name: String,
    pub initial_state: Value,
    pub start_phase: String,
    pub phases: HashMap<String, Phase>,
    pub start: Option<StartFn>,
}

impl WorkflowDefinition {
    /// Build a workflow, validating the structural invariants the
    /// scheduler requires: a non-empty phase set, a declared start
    /// phase, and at least one terminal phase.
    pub fn new(
        name: impl Into<String>,
        initial_state: Value,
        start_phase: impl Into<String>,
        phases: HashMap<String, Phase>,
    ) -> Result<Self, skein_core::WorkflowError> {
        let start_phase = start_phase.into();
        if phases.is_empty() {
            return Err(skein_core::WorkflowError::Misconfigured(
                "workflow must declare at least one phase".into(),
            ));
        }
        if !phases.contains_key(&start_phase) {
            return Err(skein_core::WorkflowError::Misconfigured(format!(
                "start phase {start_phase:?} is not a declared phase"
            )));
        }
        if !phases.values().any(|p| matches!(p, Phase::Terminal)) {
            return Err(skein_core::WorkflowError::Misconfigured(
                "workflow must declare at least one terminal phase".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            initial_state,
            start_phase,
            phases,
            start: None,
        })
    }

    /// Attach a `start(input, draft)` reducer.
    pub fn with_start(mut self, start: impl Fn(&Value, &mut Value) + Send + Sync + 'static) -> Self {
        self.start = Some(Arc::new(start));
        self
    }
}
