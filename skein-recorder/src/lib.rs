#![deny(missing_docs)]
//! In-memory implementation of `skein_core::ProviderRecorder`.
//!
//! Recordings live in a `HashMap<String, RecordingEntry>` keyed by
//! fingerprint, plus a side table of in-progress recordings keyed by a
//! monotonic counter. An in-progress recording is invisible to `load`
//! until `finalize_recording` seals it — a partially-streamed call
//! must never look like a cache hit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use skein_core::{
    ProviderRecorder, RecordedStreamEvent, RecorderError, RecordingEntry, RecordingId,
    RecordingResult,
};
use tokio::sync::RwLock;

struct InProgress {
    fingerprint: String,
    events: Vec<RecordedStreamEvent>,
}

/// In-memory, content-addressed `ProviderRecorder`.
pub struct MemoryRecorder {
    finalized: RwLock<HashMap<String, RecordingEntry>>,
    in_progress: RwLock<HashMap<String, InProgress>>,
    next_id: AtomicU64,
}

impl MemoryRecorder {
    /// Create a new, empty recorder.
    pub fn new() -> Self {
        Self {
            finalized: RwLock::new(HashMap::new()),
            in_progress: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl Default for MemoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderRecorder for MemoryRecorder {
    async fn start_recording(&self, fingerprint: &str) -> Result<RecordingId, RecorderError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let recording_id = RecordingId(format!("rec-{id}"));
        let mut in_progress = self.in_progress.write().await;
        in_progress.insert(
            recording_id.0.clone(),
            InProgress {
                fingerprint: fingerprint.to_string(),
                events: Vec::new(),
            },
        );
        Ok(recording_id)
    }

    async fn append_event(
        &self,
        recording_id: &RecordingId,
        event: RecordedStreamEvent,
    ) -> Result<(), RecorderError> {
        let mut in_progress = self.in_progress.write().await;
        let entry = in_progress
            .get_mut(&recording_id.0)
            .ok_or_else(|| RecorderError::UnknownRecording(recording_id.0.clone()))?;
        entry.events.push(event);
        Ok(())
    }

    async fn finalize_recording(
        &self,
        recording_id: &RecordingId,
        result: RecordingResult,
    ) -> Result<(), RecorderError> {
        let mut in_progress = self.in_progress.write().await;
        let entry = in_progress
            .remove(&recording_id.0)
            .ok_or_else(|| RecorderError::UnknownRecording(recording_id.0.clone()))?;

        let mut finalized = self.finalized.write().await;
        finalized.insert(
            entry.fingerprint.clone(),
            RecordingEntry {
                fingerprint: entry.fingerprint,
                events: entry.events,
                output: result.output,
                text: result.text,
                stop_reason: result.stop_reason,
            },
        );
        Ok(())
    }

    async fn load(&self, fingerprint: &str) -> Result<Option<RecordingEntry>, RecorderError> {
        let finalized = self.finalized.read().await;
        Ok(finalized.get(fingerprint).cloned())
    }

    async fn delete(&self, fingerprint: &str) -> Result<(), RecorderError> {
        let mut finalized = self.finalized.write().await;
        finalized.remove(fingerprint);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, RecorderError> {
        let finalized = self.finalized.read().await;
        Ok(finalized.keys().cloned().collect())
    }
}
