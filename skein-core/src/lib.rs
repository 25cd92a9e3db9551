//! Protocol and data-model crate for the skein workflow kernel.
//!
//! `skein-core` defines the vocabulary every other skein crate speaks:
//! ids, the event envelope, the patch model, the fingerprint hash, the
//! error taxonomy, and the three collaborator traits a runtime is
//! constructed from (`EventStore`, `ProviderRecorder`, `Provider`) plus
//! the `Observer` callback protocol. It has no opinion on how any of
//! those traits get implemented — see `skein-store-memory`,
//! `skein-recorder`, and `skein-runtime` for that.

pub mod dispatch;
pub mod error;
pub mod event;
pub mod hash;
pub mod id;
pub mod observer;
pub mod patch;
pub mod provider;
pub mod recorder;
pub mod store;

pub use dispatch::dispatch;
pub use error::{OutputError, ProviderError, RecorderError, StoreError, WorkflowError};
pub use event::{content_eq, make_event, Event, EventPayload, InteractionKind, PhaseExitReason};
pub use hash::{canonicalize, hash_provider_request, FingerprintInput, HashError};
pub use id::{EventId, InteractionId, SessionId};
pub use observer::{InputRequest, Observer, WorkflowResult};
pub use patch::{apply_patches, update, Patch, UpdateResult};
pub use provider::{AgentStream, AgentStreamEvent, CompletionRequest, Provider, StopReason};
pub use recorder::{ProviderRecorder, RecordedStreamEvent, RecordingEntry, RecordingId, RecordingResult};
pub use store::EventStore;
