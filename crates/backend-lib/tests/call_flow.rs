//! End-to-end signaling flow over the in-process relay dispatch.
use axum::extract::ws::Message;
use backend_lib::auth::DefaultAuth;
use backend_lib::config::Settings;
use backend_lib::connections::ConnectionHandle;
use backend_lib::storage::FlatFileStorage;
use backend_lib::{ws_router, AppState};
use chatware_common::{CallRecord, CallStatus, CallType};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

fn setup() -> (Arc<AppState>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(FlatFileStorage::new(temp_dir.path()).unwrap());
    let state = Arc::new(AppState::new(
        Arc::new(DefaultAuth::new()),
        storage,
        Settings::default(),
    ));
    (state, temp_dir)
}

fn connect(state: &AppState, user: &str) -> (mpsc::Sender<Message>, mpsc::Receiver<Message>) {
    let (tx, rx) = mpsc::channel(32);
    state
        .connections
        .register(user.to_string(), ConnectionHandle::new(tx.clone()));
    (tx, rx)
}

fn recv_json(rx: &mut mpsc::Receiver<Message>) -> serde_json::Value {
    match rx.try_recv().expect("expected a pending message") {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("Expected text frame, got {other:?}"),
    }
}

async fn wait_for_file(path: &PathBuf) {
    for _ in 0..200 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("audit record never landed at {}", path.display());
}

#[tokio::test]
async fn test_two_party_call_teardown_scenario() {
    let (state, dir) = setup();
    let (alice_tx, mut alice_rx) = connect(&state, "alice");
    let (_bob_tx, mut bob_rx) = connect(&state, "bob");

    // create(video, [A, B]) by A
    let session = state
        .calls
        .create(CallType::Video, vec!["bob".to_string()], "alice".to_string())
        .unwrap();
    assert_eq!(session.participants, vec!["bob", "alice"]);
    assert_eq!(state.calls.list_for_user("bob").len(), 1);

    // A leaves; B is told
    let leave = format!(r#"{{"type":"leave_call","call_id":"{}"}}"#, session.call_id);
    ws_router::handle_frame(&state, "alice", &leave, &alice_tx).await;
    let event = recv_json(&mut bob_rx);
    assert_eq!(event["type"], "user_left");
    assert_eq!(event["user_id"], "alice");
    assert_eq!(event["call_id"], session.call_id);

    // B leaves; the call is gone from every listing
    let (bob_tx2, _bob_rx2) = connect(&state, "bob");
    ws_router::handle_frame(&state, "bob", &leave, &bob_tx2).await;
    assert!(state.calls.list_for_user("alice").is_empty());
    assert!(state.calls.list_for_user("bob").is_empty());
    assert!(alice_rx.try_recv().is_err());

    // the terminal audit record shows status=ended with a plausible duration
    let finished = dir
        .path()
        .join("finished-calls")
        .join(format!("{}.json", session.call_id));
    wait_for_file(&finished).await;
    let record: CallRecord =
        serde_json::from_str(&tokio::fs::read_to_string(&finished).await.unwrap()).unwrap();
    assert_eq!(record.status, CallStatus::Ended);
    assert_eq!(record.initiator, "alice");
    let duration = record.duration.unwrap();
    assert!((0.0..5.0).contains(&duration));
}

#[tokio::test]
async fn test_signal_exchange_between_connected_peers() {
    let (state, _dir) = setup();
    let (alice_tx, mut alice_rx) = connect(&state, "alice");
    let (_bob_tx, mut bob_rx) = connect(&state, "bob");

    let offer = r#"{"type":"signal","target":"bob","payload":{"kind":"offer","sdp":"v=0..."}}"#;
    ws_router::handle_frame(&state, "alice", offer, &alice_tx).await;
    match bob_rx.try_recv().unwrap() {
        Message::Text(text) => assert_eq!(text.as_str(), offer),
        other => panic!("Expected text frame, got {other:?}"),
    }

    // nothing echoed back to the sender on success
    assert!(alice_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_disconnect_cleanup_terminates_abandoned_calls() {
    let (state, dir) = setup();
    let session = state
        .calls
        .create(CallType::Audio, vec!["alice".to_string()], "alice".to_string())
        .unwrap();

    // abrupt disconnect: no leave_call was ever sent
    let notices = state.calls.disconnect_cleanup("alice");
    assert!(notices.is_empty());
    assert!(state.calls.participants(&session.call_id).is_none());

    let finished = dir
        .path()
        .join("finished-calls")
        .join(format!("{}.json", session.call_id));
    wait_for_file(&finished).await;
}
