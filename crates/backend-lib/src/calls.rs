// ============================
// chatware-backend-lib/src/calls.rs
// ============================
//! Call registry and lifecycle manager.
//!
//! All active call sessions live in one map behind a single mutex. Every
//! read-modify-write of a participant set, including the
//! empty-check-then-terminate step, runs inside one lock acquisition, so two
//! concurrent leaves on the last two participants can never both observe a
//! non-empty set. Termination is a single transition: the session is removed
//! from the map under the lock, exactly once, and the terminal audit write is
//! spawned fire-and-forget afterwards.
use crate::error::AppError;
use crate::metrics as keys;
use crate::storage::Storage;
use chatware_common::{CallId, CallRecord, CallStatus, CallType, UserId};
use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// One active call's in-memory state
#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: CallId,
    pub call_type: CallType,
    pub initiator: UserId,
    pub participants: Vec<UserId>,
    pub started_at: DateTime<Utc>,
}

impl CallSession {
    fn audit_record(
        &self,
        status: CallStatus,
        end_time: Option<DateTime<Utc>>,
        duration: Option<f64>,
    ) -> CallRecord {
        CallRecord {
            call_id: self.call_id.clone(),
            participants: self.participants.clone(),
            start_time: self.started_at,
            call_type: self.call_type,
            initiator: self.initiator.clone(),
            status,
            end_time,
            duration,
        }
    }
}

/// Active-call summary returned by the listing endpoint
#[derive(Serialize, Debug, Clone)]
pub struct ActiveCall {
    pub call_id: CallId,
    pub participants: Vec<UserId>,
    pub call_type: CallType,
    pub start_time: DateTime<Utc>,
    pub duration: f64,
}

/// Result of removing a user from a call
#[derive(Debug)]
pub enum LeaveOutcome {
    /// Call absent or the user was not a participant
    Ignored,
    /// User removed; these participants remain and should be notified
    Left { remaining: Vec<UserId> },
    /// The user was the last participant; the call has been terminated
    Ended { duration: f64 },
}

fn elapsed_secs(since: DateTime<Utc>) -> f64 {
    (Utc::now() - since).num_milliseconds() as f64 / 1000.0
}

/// Manager for all active calls.
///
/// Owns the registry map and the downstream audit sink. Audit writes are
/// best-effort: failures are logged and never block or roll back the
/// in-memory state change.
pub struct CallManager {
    calls: Mutex<HashMap<CallId, CallSession>>,
    storage: Arc<dyn Storage>,
}

impl CallManager {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        CallManager {
            calls: Mutex::new(HashMap::new()),
            storage,
        }
    }

    /// Create a new call session. The initiator is always included in the
    /// participant set; duplicate participants collapse to one entry.
    pub fn create(
        &self,
        call_type: CallType,
        participants: Vec<UserId>,
        initiator: UserId,
    ) -> Result<CallSession, AppError> {
        if participants.is_empty() {
            return Err(AppError::EmptyParticipants);
        }

        let mut members: Vec<UserId> = Vec::with_capacity(participants.len() + 1);
        for user in participants {
            if !members.contains(&user) {
                members.push(user);
            }
        }
        if !members.contains(&initiator) {
            members.push(initiator.clone());
        }

        let session = CallSession {
            call_id: Uuid::new_v4().to_string(),
            call_type,
            initiator,
            participants: members,
            started_at: Utc::now(),
        };

        {
            let mut calls = self.calls.lock();
            calls.insert(session.call_id.clone(), session.clone());
            gauge!(keys::CALLS_ACTIVE).set(calls.len() as f64);
        }
        counter!(keys::CALL_CREATED).increment(1);

        self.spawn_record(session.audit_record(CallStatus::Created, None, None));
        Ok(session)
    }

    /// End a call on behalf of one of its participants, returning the call's
    /// duration in seconds.
    pub fn end(&self, call_id: &str, requester: &str) -> Result<f64, AppError> {
        let session = {
            let mut calls = self.calls.lock();
            let session = calls.remove(call_id).ok_or(AppError::CallNotFound)?;
            if !session.participants.iter().any(|p| p == requester) {
                calls.insert(session.call_id.clone(), session);
                return Err(AppError::NotParticipant);
            }
            gauge!(keys::CALLS_ACTIVE).set(calls.len() as f64);
            session
        };
        Ok(self.finish(session))
    }

    /// Add a user to a call, idempotently. Returns the other participants,
    /// which the relay notifies with `user_joined`.
    pub fn join(&self, call_id: &str, user_id: &str) -> Result<Vec<UserId>, AppError> {
        let mut calls = self.calls.lock();
        let session = calls.get_mut(call_id).ok_or(AppError::CallNotFound)?;
        if !session.participants.iter().any(|p| p == user_id) {
            session.participants.push(user_id.to_string());
        }
        Ok(session
            .participants
            .iter()
            .filter(|p| *p != user_id)
            .cloned()
            .collect())
    }

    /// Remove a user from a call. Terminates the call if the participant set
    /// becomes empty.
    pub fn leave(&self, call_id: &str, user_id: &str) -> LeaveOutcome {
        let ended = {
            let mut calls = self.calls.lock();
            let Some(mut session) = calls.remove(call_id) else {
                return LeaveOutcome::Ignored;
            };
            if !session.participants.iter().any(|p| p == user_id) {
                calls.insert(session.call_id.clone(), session);
                return LeaveOutcome::Ignored;
            }
            session.participants.retain(|p| p != user_id);

            if session.participants.is_empty() {
                gauge!(keys::CALLS_ACTIVE).set(calls.len() as f64);
                session
            } else {
                let remaining = session.participants.clone();
                calls.insert(session.call_id.clone(), session);
                return LeaveOutcome::Left { remaining };
            }
        };
        LeaveOutcome::Ended {
            duration: self.finish(ended),
        }
    }

    /// Remove a user from every call containing them, terminating calls that
    /// become empty. Returns, per surviving call, the remaining participants
    /// the relay should notify with `user_disconnected`.
    pub fn disconnect_cleanup(&self, user_id: &str) -> Vec<(CallId, Vec<UserId>)> {
        let mut notices = Vec::new();
        let ended = {
            let mut calls = self.calls.lock();
            let member_of: Vec<CallId> = calls
                .iter()
                .filter(|(_, s)| s.participants.iter().any(|p| p == user_id))
                .map(|(id, _)| id.clone())
                .collect();

            let mut ended = Vec::new();
            for call_id in member_of {
                if let Some(session) = calls.get_mut(&call_id) {
                    session.participants.retain(|p| p != user_id);
                    if session.participants.is_empty() {
                        if let Some(session) = calls.remove(&call_id) {
                            ended.push(session);
                        }
                    } else {
                        notices.push((call_id, session.participants.clone()));
                    }
                }
            }
            gauge!(keys::CALLS_ACTIVE).set(calls.len() as f64);
            ended
        };

        for session in ended {
            self.finish(session);
        }
        notices
    }

    /// Every active call the user participates in, with elapsed duration
    pub fn list_for_user(&self, user_id: &str) -> Vec<ActiveCall> {
        let calls = self.calls.lock();
        calls
            .values()
            .filter(|s| s.participants.iter().any(|p| p == user_id))
            .map(|s| ActiveCall {
                call_id: s.call_id.clone(),
                participants: s.participants.clone(),
                call_type: s.call_type,
                start_time: s.started_at,
                duration: elapsed_secs(s.started_at),
            })
            .collect()
    }

    /// Participants of a call, if it is still active
    pub fn participants(&self, call_id: &str) -> Option<Vec<UserId>> {
        let calls = self.calls.lock();
        calls.get(call_id).map(|s| s.participants.clone())
    }

    /// Terminal transition for a session already removed from the registry:
    /// compute duration and spawn the `ended` audit update.
    fn finish(&self, session: CallSession) -> f64 {
        let end_time = Utc::now();
        let duration = elapsed_secs(session.started_at);
        counter!(keys::CALL_ENDED).increment(1);

        self.spawn_finalize(session.audit_record(
            CallStatus::Ended,
            Some(end_time),
            Some(duration),
        ));
        duration
    }

    fn spawn_record(&self, record: CallRecord) {
        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move {
            if let Err(e) = storage.record_call(&record).await {
                counter!(keys::AUDIT_WRITE_FAILED).increment(1);
                warn!(call_id = %record.call_id, error = %e, "failed to log call creation");
            }
        });
    }

    fn spawn_finalize(&self, record: CallRecord) {
        let storage = Arc::clone(&self.storage);
        tokio::spawn(async move {
            if let Err(e) = storage.finalize_call(&record).await {
                counter!(keys::AUDIT_WRITE_FAILED).increment(1);
                warn!(call_id = %record.call_id, error = %e, "failed to update call log");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Audit sink that counts writes instead of persisting them
    #[derive(Default)]
    struct CountingStorage {
        recorded: AtomicUsize,
        finalized: AtomicUsize,
    }

    #[async_trait]
    impl Storage for CountingStorage {
        async fn record_call(&self, _record: &CallRecord) -> Result<(), AppError> {
            self.recorded.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn finalize_call(&self, _record: &CallRecord) -> Result<(), AppError> {
            self.finalized.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn call_history(
            &self,
            _user_id: &str,
            _limit: usize,
            _offset: usize,
        ) -> Result<(Vec<CallRecord>, usize), AppError> {
            Ok((Vec::new(), 0))
        }
    }

    fn setup() -> (CallManager, Arc<CountingStorage>) {
        let storage = Arc::new(CountingStorage::default());
        (CallManager::new(storage.clone()), storage)
    }

    async fn wait_for_count(counter: &AtomicUsize, expected: usize) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "audit counter stuck at {} (expected {expected})",
            counter.load(Ordering::SeqCst)
        );
    }

    #[tokio::test]
    async fn test_create_includes_initiator_and_dedups() {
        let (manager, storage) = setup();
        let session = manager
            .create(
                CallType::Video,
                vec!["bob".to_string(), "bob".to_string(), "carol".to_string()],
                "alice".to_string(),
            )
            .unwrap();

        assert_eq!(session.participants, vec!["bob", "carol", "alice"]);
        assert_eq!(session.initiator, "alice");
        wait_for_count(&storage.recorded, 1).await;
    }

    #[tokio::test]
    async fn test_create_rejects_empty_participants() {
        let (manager, _storage) = setup();
        let result = manager.create(CallType::Audio, vec![], "alice".to_string());
        assert!(matches!(result, Err(AppError::EmptyParticipants)));
    }

    #[tokio::test]
    async fn test_end_requires_membership() {
        let (manager, storage) = setup();
        let session = manager
            .create(CallType::Audio, vec!["bob".to_string()], "alice".to_string())
            .unwrap();

        assert!(matches!(
            manager.end(&session.call_id, "mallory"),
            Err(AppError::NotParticipant)
        ));
        // rejected end leaves the registry unchanged
        assert!(manager.participants(&session.call_id).is_some());

        let duration = manager.end(&session.call_id, "alice").unwrap();
        assert!(duration >= 0.0);
        assert!(manager.participants(&session.call_id).is_none());
        wait_for_count(&storage.finalized, 1).await;

        assert!(matches!(
            manager.end(&session.call_id, "alice"),
            Err(AppError::CallNotFound)
        ));
    }

    #[tokio::test]
    async fn test_join_is_idempotent_and_reports_others() {
        let (manager, _storage) = setup();
        let session = manager
            .create(CallType::Video, vec!["bob".to_string()], "alice".to_string())
            .unwrap();

        let others = manager.join(&session.call_id, "carol").unwrap();
        assert_eq!(others, vec!["bob", "alice"]);

        // joining twice does not duplicate the membership
        let others = manager.join(&session.call_id, "carol").unwrap();
        assert_eq!(others, vec!["bob", "alice"]);
        assert_eq!(
            manager.participants(&session.call_id).unwrap(),
            vec!["bob", "alice", "carol"]
        );

        assert!(matches!(
            manager.join("no-such-call", "carol"),
            Err(AppError::CallNotFound)
        ));
    }

    #[tokio::test]
    async fn test_join_then_leave_restores_prior_set() {
        let (manager, _storage) = setup();
        let session = manager
            .create(CallType::Audio, vec!["bob".to_string()], "alice".to_string())
            .unwrap();
        let before = manager.participants(&session.call_id).unwrap();

        manager.join(&session.call_id, "carol").unwrap();
        match manager.leave(&session.call_id, "carol") {
            LeaveOutcome::Left { remaining } => assert_eq!(remaining, before),
            other => panic!("Expected Left, got {other:?}"),
        }
        assert_eq!(manager.participants(&session.call_id).unwrap(), before);
    }

    #[tokio::test]
    async fn test_leave_of_non_member_is_noop() {
        let (manager, _storage) = setup();
        let session = manager
            .create(CallType::Audio, vec!["bob".to_string()], "alice".to_string())
            .unwrap();

        assert!(matches!(
            manager.leave(&session.call_id, "mallory"),
            LeaveOutcome::Ignored
        ));
        assert!(matches!(
            manager.leave("no-such-call", "alice"),
            LeaveOutcome::Ignored
        ));
        assert_eq!(manager.participants(&session.call_id).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_last_leave_terminates_call() {
        let (manager, storage) = setup();
        let session = manager
            .create(CallType::Video, vec!["bob".to_string()], "alice".to_string())
            .unwrap();

        match manager.leave(&session.call_id, "alice") {
            LeaveOutcome::Left { remaining } => assert_eq!(remaining, vec!["bob"]),
            other => panic!("Expected Left, got {other:?}"),
        }
        match manager.leave(&session.call_id, "bob") {
            LeaveOutcome::Ended { duration } => assert!(duration >= 0.0),
            other => panic!("Expected Ended, got {other:?}"),
        }
        assert!(manager.participants(&session.call_id).is_none());
        wait_for_count(&storage.finalized, 1).await;
    }

    #[tokio::test]
    async fn test_concurrent_last_leaves_terminate_exactly_once() {
        // The race this guards against: both leaves observe a non-empty set
        // and neither triggers termination, or both do.
        for _ in 0..50 {
            let storage = Arc::new(CountingStorage::default());
            let manager = Arc::new(CallManager::new(storage.clone()));
            let session = manager
                .create(CallType::Audio, vec!["bob".to_string()], "alice".to_string())
                .unwrap();

            let m1 = Arc::clone(&manager);
            let m2 = Arc::clone(&manager);
            let id1 = session.call_id.clone();
            let id2 = session.call_id.clone();
            let t1 = tokio::spawn(async move { m1.leave(&id1, "alice") });
            let t2 = tokio::spawn(async move { m2.leave(&id2, "bob") });

            let (r1, r2) = (t1.await.unwrap(), t2.await.unwrap());
            let ended = [&r1, &r2]
                .iter()
                .filter(|r| matches!(r, LeaveOutcome::Ended { .. }))
                .count();
            assert_eq!(ended, 1, "exactly one leave must observe the empty set");

            wait_for_count(&storage.finalized, 1).await;
            assert_eq!(storage.finalized.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn test_disconnect_cleanup_spans_all_calls() {
        let (manager, storage) = setup();
        let shared = manager
            .create(CallType::Video, vec!["bob".to_string()], "alice".to_string())
            .unwrap();
        let solo = manager
            .create(CallType::Audio, vec!["alice".to_string()], "alice".to_string())
            .unwrap();

        let notices = manager.disconnect_cleanup("alice");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, shared.call_id);
        assert_eq!(notices[0].1, vec!["bob"]);

        // the solo call became empty and was terminated
        assert!(manager.participants(&solo.call_id).is_none());
        assert_eq!(manager.participants(&shared.call_id).unwrap(), vec!["bob"]);
        wait_for_count(&storage.finalized, 1).await;

        // disconnect of a user in no calls reports nothing
        assert!(manager.disconnect_cleanup("nobody").is_empty());
    }

    #[tokio::test]
    async fn test_list_for_user_scopes_to_membership() {
        let (manager, _storage) = setup();
        manager
            .create(CallType::Video, vec!["bob".to_string()], "alice".to_string())
            .unwrap();
        manager
            .create(CallType::Audio, vec!["carol".to_string()], "bob".to_string())
            .unwrap();

        let alice_calls = manager.list_for_user("alice");
        assert_eq!(alice_calls.len(), 1);
        assert_eq!(alice_calls[0].call_type, CallType::Video);
        assert!(alice_calls[0].duration >= 0.0);

        assert_eq!(manager.list_for_user("bob").len(), 2);
        assert!(manager.list_for_user("nobody").is_empty());
    }
}
