//! Agent definitions and their type-erased form.
//!
//! `skein_core::Provider` uses RPITIT and is not object-safe, so an
//! `AgentDefinition<P>` can't go directly into a phase graph that must
//! hold agents over many different provider types. We erase it behind
//! `ErasedAgent`/`BoxedAgent` the same way the teacher erases
//! `DurableContext` in its loop crate: a hand-written trait whose
//! methods return a boxed future instead of `impl Future`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use skein_core::{Provider, WorkflowError};

use crate::executor::{run_agent, AgentRunOutcome, ExecutorDeps};

/// A closure computing the prompt for a call from the current state
/// and an optional phase-supplied context value.
pub type PromptFn = dyn Fn(&Value, Option<&Value>) -> Value + Send + Sync;

/// A closure validating/parsing the provider's raw output into the
/// agent's expected shape. Returns the parsed output as a `Value` (the
/// kernel never needs a concrete Rust type) or an error describing why
/// it didn't validate.
pub type OutputSchemaFn = dyn Fn(&Value) -> Result<Value, String> + Send + Sync;

/// A reducer applying a successful agent output onto the draft state.
pub type UpdateFn = dyn Fn(&Value, &mut Value, Option<&Value>) + Send + Sync;

/// An immutable description of how to call a language model and fold
/// its structured output into state. Owns its provider instance — no
/// registry lookup at run time.
pub struct AgentDefinition<P: Provider> {
    pub name: String,
    pub provider: P,
    pub prompt_fn: Arc<PromptFn>,
    pub output_schema: Arc<OutputSchemaFn>,
    pub update_fn: Arc<UpdateFn>,
    pub options: Option<Value>,
}

impl<P: Provider> AgentDefinition<P> {
    /// Construct a new agent definition.
    pub fn new(
        name: impl Into<String>,
        provider: P,
        prompt_fn: impl Fn(&Value, Option<&Value>) -> Value + Send + Sync + 'static,
        output_schema: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
        update_fn: impl Fn(&Value, &mut Value, Option<&Value>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            prompt_fn: Arc::new(prompt_fn),
            output_schema: Arc::new(output_schema),
            update_fn: Arc::new(update_fn),
            options: None,
        }
    }
}

type RunFuture<'a> = Pin<Box<dyn Future<Output = Result<AgentRunOutcome, WorkflowError>> + Send + 'a>>;

/// Dyn-compatible wrapper for driving an [`AgentDefinition`] without
/// knowing its concrete provider type.
trait ErasedAgent: Send + Sync {
    fn erased_name(&self) -> &str;

    fn erased_run<'a>(
        &'a self,
        state: &'a Value,
        context: Option<&'a Value>,
        phase: Option<&'a str>,
        deps: &'a ExecutorDeps,
    ) -> RunFuture<'a>;

    fn erased_apply_update(&self, output: &Value, draft: &mut Value, context: Option<&Value>);
}

impl<P: Provider> ErasedAgent for AgentDefinition<P> {
    fn erased_name(&self) -> &str {
        &self.name
    }

    fn erased_run<'a>(
        &'a self,
        state: &'a Value,
        context: Option<&'a Value>,
        phase: Option<&'a str>,
        deps: &'a ExecutorDeps,
    ) -> RunFuture<'a> {
        Box::pin(run_agent(self, state, context, phase, deps))
    }

    fn erased_apply_update(&self, output: &Value, draft: &mut Value, context: Option<&Value>) {
        (self.update_fn)(output, draft, context);
    }
}

/// A type-erased agent definition, usable inside a phase graph
/// regardless of its concrete provider type.
#[derive(Clone)]
pub struct BoxedAgent(Arc<dyn ErasedAgent>);

impl BoxedAgent {
    /// Erase an [`AgentDefinition`] into dyn-compatible form.
    pub fn new<P: Provider + 'static>(definition: AgentDefinition<P>) -> Self {
        Self(Arc::new(definition))
    }

    /// The agent's name, used in `agent:*` event payloads.
    pub fn name(&self) -> &str {
        self.0.erased_name()
    }

    /// Drive one call through the Agent Executor.
    pub async fn run(
        &self,
        state: &Value,
        context: Option<&Value>,
        phase: Option<&str>,
        deps: &ExecutorDeps,
    ) -> Result<AgentRunOutcome, WorkflowError> {
        self.0.erased_run(state, context, phase, deps).await
    }

    /// Apply a successful output onto a state draft via the agent's
    /// `updateFn`. Called by the Patch Engine's reducer closure.
    pub fn apply_update(&self, output: &Value, draft: &mut Value, context: Option<&Value>) {
        self.0.erased_apply_update(output, draft, context);
    }
}
