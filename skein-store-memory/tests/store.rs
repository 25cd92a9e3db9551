use skein_core::{make_event, EventPayload, EventStore, SessionId};
use skein_store_memory::MemoryEventStore;
use std::sync::Arc;

fn started(session: &SessionId) -> skein_core::Event {
    make_event(
        EventPayload::WorkflowStarted {
            session_id: session.clone(),
            workflow: "demo".into(),
            input: serde_json::json!({}),
        },
        None,
    )
}

#[tokio::test]
async fn append_then_get_all() {
    let store = MemoryEventStore::new();
    let session = SessionId::new();

    store.append(&session, started(&session)).await.unwrap();
    store
        .append(
            &session,
            make_event(
                EventPayload::PhaseEntered {
                    phase: "review".into(),
                    from_phase: None,
                },
                None,
            ),
        )
        .await
        .unwrap();

    let events = store.get_all(&session).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].name(), "workflow:started");
    assert_eq!(events[1].name(), "phase:entered");
}

#[tokio::test]
async fn append_returns_zero_based_position() {
    let store = MemoryEventStore::new();
    let session = SessionId::new();

    let p0 = store.append(&session, started(&session)).await.unwrap();
    let p1 = store.append(&session, started(&session)).await.unwrap();
    assert_eq!(p0, 0);
    assert_eq!(p1, 1);
}

#[tokio::test]
async fn get_all_for_unknown_session_is_empty_not_error() {
    let store = MemoryEventStore::new();
    let unknown = SessionId::new();
    let events = store.get_all(&unknown).await.unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn get_from_returns_suffix() {
    let store = MemoryEventStore::new();
    let session = SessionId::new();
    for _ in 0..5 {
        store.append(&session, started(&session)).await.unwrap();
    }

    let from_two = store.get_from(&session, 2).await.unwrap();
    assert_eq!(from_two.len(), 3);

    let from_past_end = store.get_from(&session, 100).await.unwrap();
    assert!(from_past_end.is_empty());
}

#[tokio::test]
async fn sessions_are_isolated() {
    let store = MemoryEventStore::new();
    let a = SessionId::new();
    let b = SessionId::new();

    store.append(&a, started(&a)).await.unwrap();

    assert_eq!(store.get_all(&a).await.unwrap().len(), 1);
    assert!(store.get_all(&b).await.unwrap().is_empty());
}

#[tokio::test]
async fn list_sessions_reflects_appends() {
    let store = MemoryEventStore::new();
    let a = SessionId::new();
    let b = SessionId::new();
    store.append(&a, started(&a)).await.unwrap();
    store.append(&b, started(&b)).await.unwrap();

    let mut sessions = store.list_sessions().await.unwrap();
    sessions.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(sessions, expected);
}

#[tokio::test]
async fn delete_session_removes_its_log() {
    let store = MemoryEventStore::new();
    let session = SessionId::new();
    store.append(&session, started(&session)).await.unwrap();

    store.delete_session(&session).await.unwrap();
    assert!(store.get_all(&session).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_unknown_session_is_noop() {
    let store = MemoryEventStore::new();
    store.delete_session(&SessionId::new()).await.unwrap();
}

#[tokio::test]
async fn usable_as_dyn_event_store() {
    let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new());
    let session = SessionId::new();
    store.append(&session, started(&session)).await.unwrap();
    assert_eq!(store.get_all(&session).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_appends_to_same_session_preserve_all_events() {
    let store = Arc::new(MemoryEventStore::new());
    let session = SessionId::new();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = Arc::clone(&store);
        let session = session.clone();
        handles.push(tokio::spawn(async move {
            store.append(&session, started(&session)).await.unwrap();
        }));
    }
    for h in handles {
        h.await.unwrap();
    }

    assert_eq!(store.get_all(&session).await.unwrap().len(), 20);
}
