use skein_core::{ProviderRecorder, RecordedStreamEvent, RecorderError, RecordingResult, StopReason};
use skein_recorder::MemoryRecorder;

fn dummy_result() -> RecordingResult {
    RecordingResult {
        output: serde_json::json!({"ok": true}),
        text: "hello".into(),
        stop_reason: StopReason::EndTurn,
    }
}

#[tokio::test]
async fn miss_before_any_recording() {
    let recorder = MemoryRecorder::new();
    assert!(recorder.load("sha256:none").await.unwrap().is_none());
}

#[tokio::test]
async fn record_then_load_hits() {
    let recorder = MemoryRecorder::new();
    let fp = "sha256:abc";
    let id = recorder.start_recording(fp).await.unwrap();
    recorder
        .append_event(&id, RecordedStreamEvent::TextDelta { delta: "hel".into() })
        .await
        .unwrap();
    recorder
        .append_event(&id, RecordedStreamEvent::TextDelta { delta: "lo".into() })
        .await
        .unwrap();
    recorder.finalize_recording(&id, dummy_result()).await.unwrap();

    let entry = recorder.load(fp).await.unwrap().expect("should hit");
    assert_eq!(entry.fingerprint, fp);
    assert_eq!(entry.events.len(), 2);
    assert_eq!(entry.text, "hello");
}

#[tokio::test]
async fn in_progress_recording_is_not_visible_to_load() {
    let recorder = MemoryRecorder::new();
    let fp = "sha256:partial";
    let id = recorder.start_recording(fp).await.unwrap();
    recorder
        .append_event(&id, RecordedStreamEvent::TextDelta { delta: "x".into() })
        .await
        .unwrap();

    assert!(recorder.load(fp).await.unwrap().is_none());
}

#[tokio::test]
async fn appending_to_unknown_recording_errors() {
    let recorder = MemoryRecorder::new();
    let bogus = skein_core::RecordingId("does-not-exist".into());
    let err = recorder
        .append_event(&bogus, RecordedStreamEvent::TextDelta { delta: "x".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, RecorderError::UnknownRecording(_)));
}

#[tokio::test]
async fn finalizing_twice_errors_on_the_second_call() {
    let recorder = MemoryRecorder::new();
    let id = recorder.start_recording("sha256:twice").await.unwrap();
    recorder.finalize_recording(&id, dummy_result()).await.unwrap();
    let err = recorder
        .finalize_recording(&id, dummy_result())
        .await
        .unwrap_err();
    assert!(matches!(err, RecorderError::UnknownRecording(_)));
}

#[tokio::test]
async fn delete_removes_a_finalized_recording() {
    let recorder = MemoryRecorder::new();
    let fp = "sha256:deleteme";
    let id = recorder.start_recording(fp).await.unwrap();
    recorder.finalize_recording(&id, dummy_result()).await.unwrap();

    recorder.delete(fp).await.unwrap();
    assert!(recorder.load(fp).await.unwrap().is_none());
}

#[tokio::test]
async fn list_returns_every_finalized_fingerprint() {
    let recorder = MemoryRecorder::new();
    for fp in ["sha256:a", "sha256:b"] {
        let id = recorder.start_recording(fp).await.unwrap();
        recorder.finalize_recording(&id, dummy_result()).await.unwrap();
    }

    let mut fingerprints = recorder.list().await.unwrap();
    fingerprints.sort();
    assert_eq!(fingerprints, vec!["sha256:a", "sha256:b"]);
}

#[tokio::test]
async fn cache_idempotence_same_fingerprint_replays_identically() {
    let recorder = MemoryRecorder::new();
    let fp = "sha256:repeat";
    let id = recorder.start_recording(fp).await.unwrap();
    recorder
        .append_event(&id, RecordedStreamEvent::TextDelta { delta: "hi".into() })
        .await
        .unwrap();
    recorder.finalize_recording(&id, dummy_result()).await.unwrap();

    let first = recorder.load(fp).await.unwrap().unwrap();
    let second = recorder.load(fp).await.unwrap().unwrap();
    assert_eq!(first.text, second.text);
    assert_eq!(first.output, second.output);
    assert_eq!(first.events.len(), second.events.len());
}
