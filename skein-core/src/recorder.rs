//! The `ProviderRecorder` protocol — content-addressed record/playback
//! caching of provider calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecorderError;
use crate::provider::{AgentStreamEvent, StopReason};

/// An opaque handle to an in-progress recording, returned by
/// `start_recording` and threaded through `append_event`/`finalize`.
/// Implementations are free to make this whatever they like
/// internally (a row id, a temp file path) — callers only ever pass it
/// back unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingId(pub String);

/// A finalized, immutable recording: everything needed to replay one
/// provider call without touching the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingEntry {
    /// The fingerprint this recording is keyed by.
    pub fingerprint: String,
    /// Stream events in original chronological order (excluding the
    /// terminal `Result`, which is reconstructed from `output`/`text`/
    /// `stop_reason` below to keep the persisted shape flat).
    pub events: Vec<RecordedStreamEvent>,
    /// The final parsed, schema-validated output.
    pub output: Value,
    /// The aggregate assistant-visible text for the call.
    pub text: String,
    /// Why the stream ended.
    pub stop_reason: StopReason,
}

/// A serializable projection of [`AgentStreamEvent`]. The live variants
/// (`TextComplete`, `ThinkingComplete`, `Result`) carry no independent
/// information once a recording is finalized and are reconstructed by
/// the caller rather than stored twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedStreamEvent {
    TextDelta { delta: String },
    ThinkingDelta { delta: String },
    ToolCall {
        tool_id: String,
        tool_name: String,
        input: Value,
    },
    ToolResult {
        tool_id: String,
        output: Value,
        is_error: bool,
    },
    Usage { input_tokens: u64, output_tokens: u64 },
    SessionInit { provider_session_id: String },
}

impl RecordedStreamEvent {
    /// Convert a live stream event into its recorded form. Returns
    /// `None` for variants that carry no independent information
    /// (`TextComplete`, `ThinkingComplete`, `Stop`, `Result`) — those
    /// are implicit in a finalized recording's shape.
    pub fn from_live(event: &AgentStreamEvent) -> Option<Self> {
        match event {
            AgentStreamEvent::TextDelta(delta) => Some(Self::TextDelta { delta: delta.clone() }),
            AgentStreamEvent::ThinkingDelta(delta) => {
                Some(Self::ThinkingDelta { delta: delta.clone() })
            }
            AgentStreamEvent::ToolCall {
                tool_id,
                tool_name,
                input,
            } => Some(Self::ToolCall {
                tool_id: tool_id.clone(),
                tool_name: tool_name.clone(),
                input: input.clone(),
            }),
            AgentStreamEvent::ToolResult {
                tool_id,
                output,
                is_error,
            } => Some(Self::ToolResult {
                tool_id: tool_id.clone(),
                output: output.clone(),
                is_error: *is_error,
            }),
            AgentStreamEvent::Usage {
                input_tokens,
                output_tokens,
            } => Some(Self::Usage {
                input_tokens: *input_tokens,
                output_tokens: *output_tokens,
            }),
            AgentStreamEvent::SessionInit { provider_session_id } => Some(Self::SessionInit {
                provider_session_id: provider_session_id.clone(),
            }),
            AgentStreamEvent::TextComplete
            | AgentStreamEvent::ThinkingComplete
            | AgentStreamEvent::Stop(_)
            | AgentStreamEvent::Result { .. } => None,
        }
    }

    /// Convert back into the live event shape for re-emission during
    /// playback.
    pub fn into_live(self) -> AgentStreamEvent {
        match self {
            Self::TextDelta { delta } => AgentStreamEvent::TextDelta(delta),
            Self::ThinkingDelta { delta } => AgentStreamEvent::ThinkingDelta(delta),
            Self::ToolCall {
                tool_id,
                tool_name,
                input,
            } => AgentStreamEvent::ToolCall {
                tool_id,
                tool_name,
                input,
            },
            Self::ToolResult {
                tool_id,
                output,
                is_error,
            } => AgentStreamEvent::ToolResult {
                tool_id,
                output,
                is_error,
            },
            Self::Usage {
                input_tokens,
                output_tokens,
            } => AgentStreamEvent::Usage {
                input_tokens,
                output_tokens,
            },
            Self::SessionInit { provider_session_id } => {
                AgentStreamEvent::SessionInit { provider_session_id }
            }
        }
    }
}

/// The result handed to `finalize_recording`.
#[derive(Debug, Clone)]
pub struct RecordingResult {
    pub output: Value,
    pub text: String,
    pub stop_reason: StopReason,
}

/// Content-addressed cache of provider calls, supporting both live
/// recording and deterministic playback.
#[async_trait]
pub trait ProviderRecorder: Send + Sync {
    /// Begin recording a call keyed by `fingerprint`. Returns a handle
    /// to append events to before finalizing.
    async fn start_recording(&self, fingerprint: &str) -> Result<RecordingId, RecorderError>;

    /// Append one stream event to an in-progress recording.
    async fn append_event(
        &self,
        recording_id: &RecordingId,
        event: RecordedStreamEvent,
    ) -> Result<(), RecorderError>;

    /// Seal a recording with its terminal result. After this call the
    /// entry is immutable and retrievable via `load`.
    async fn finalize_recording(
        &self,
        recording_id: &RecordingId,
        result: RecordingResult,
    ) -> Result<(), RecorderError>;

    /// Look up a finalized recording by fingerprint. Returns `None` on
    /// a cache miss, not an error — the caller decides whether a miss
    /// is fatal (strict playback) or falls back to a live call.
    async fn load(&self, fingerprint: &str) -> Result<Option<RecordingEntry>, RecorderError>;

    /// Remove a finalized recording, if present.
    async fn delete(&self, fingerprint: &str) -> Result<(), RecorderError>;

    /// Every fingerprint currently cached.
    async fn list(&self) -> Result<Vec<String>, RecorderError>;
}
