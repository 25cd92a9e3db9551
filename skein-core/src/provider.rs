//! The `Provider` boundary: the external LLM backend the Agent Executor
//! drives, specified only by the shape it streams back.
//!
//! `Provider` uses RPITIT (return-position `impl Trait` in traits) and
//! is intentionally not object-safe — an `AgentDefinition<P: Provider>`
//! is generic over its provider, so nothing upstream ever needs a `dyn
//! Provider`. Components that DO need dynamic dispatch over providers
//! (none in this kernel today, but e.g. a provider registry built on
//! top of it) should wrap one behind a hand-written erased adapter
//! rather than relaxing this trait's bound.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use serde_json::Value;

use crate::error::ProviderError;

/// Assembled inputs for one provider call. Everything here is also fed
/// into [`crate::hash::FingerprintInput`] to compute the call's
/// fingerprint, so every field must be plain JSON-serializable data —
/// no live handles or closures.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The assembled prompt (messages, system prompt, whatever shape
    /// the provider expects) as a JSON value.
    pub prompt: Value,
    /// Provider-specific options: model, temperature, max tokens, etc.
    pub provider_options: Value,
    /// Tool definitions available to this call, if any.
    pub tools: Option<Value>,
    /// The structural shape the final output must satisfy.
    pub output_schema: Option<Value>,
}

/// One event in the raw stream a `Provider` produces for a single
/// call. The Agent Executor maps a subset of these onto internal
/// events (see `skein_runtime::executor`); the rest are consumed
/// internally and never surfaced.
#[derive(Debug, Clone)]
pub enum AgentStreamEvent {
    /// Incremental assistant-visible text.
    TextDelta(String),
    /// Incremental reasoning/thinking text.
    ThinkingDelta(String),
    /// A tool invocation the model requested.
    ToolCall {
        tool_id: String,
        tool_name: String,
        input: Value,
    },
    /// The result of executing a previously requested tool call.
    ToolResult {
        tool_id: String,
        output: Value,
        is_error: bool,
    },
    /// Assistant text finished assembling (no externally visible event).
    TextComplete,
    /// Thinking finished assembling (no externally visible event).
    ThinkingComplete,
    /// The stream ended for a reason other than an explicit result.
    Stop(StopReason),
    /// Token accounting for the call.
    Usage { input_tokens: u64, output_tokens: u64 },
    /// Provider-assigned session/conversation identifier, if any.
    SessionInit { provider_session_id: String },
    /// The terminal, schema-validated result of the call.
    Result {
        output: Value,
        text: String,
        stop_reason: StopReason,
    },
}

/// Why a provider stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    ToolUse,
    Error,
}

/// A lazy, finite, non-restartable sequence of [`AgentStreamEvent`].
/// Consumed exactly once per provider call, whether it is backed by a
/// live network stream or a replayed recording.
pub type AgentStream = Pin<Box<dyn Stream<Item = AgentStreamEvent> + Send>>;

/// The external LLM backend an agent drives.
///
/// Deliberately out of scope for this kernel: concrete implementations
/// (Anthropic, OpenAI, a local model) live in their own crates and are
/// supplied by the caller at `AgentDefinition` construction time.
pub trait Provider: Send + Sync {
    /// Begin a completion call, returning a stream of events ending in
    /// exactly one [`AgentStreamEvent::Result`] (or an error).
    fn stream(
        &self,
        request: CompletionRequest,
    ) -> impl Future<Output = Result<AgentStream, ProviderError>> + Send;

    /// The provider's canonical model identifier, used as part of the
    /// fingerprint so two different models never share a cache entry.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_reason_is_copy_and_comparable() {
        let a = StopReason::EndTurn;
        let b = a;
        assert_eq!(a, b);
        assert_ne!(StopReason::EndTurn, StopReason::ToolUse);
    }
}
