//! In-memory session store implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Duration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::traits::{Clock, Role, Session, SessionStore, Turn, MAX_HISTORY_TURNS};

/// An in-memory session store backed by a mutex-protected hash map.
///
/// The lock is only held for the duration of one map operation and never
/// across an await, so per-identity updates and the periodic sweep
/// interleave freely without starving each other.
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<i64, Session>>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl InMemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>, timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            clock,
            timeout,
        }
    }

    /// Fetch the live entry for `identity`, replacing an expired one with
    /// a fresh session. Refreshes the activity timestamp.
    fn live_entry<'a>(
        &self,
        sessions: &'a mut HashMap<i64, Session>,
        identity: i64,
    ) -> &'a mut Session {
        let now = self.clock.now();
        let entry = sessions
            .entry(identity)
            .or_insert_with(|| Session::new(identity, now));
        if entry.is_expired(now, self.timeout) {
            *entry = Session::new(identity, now);
        }
        entry.last_activity = now;
        entry
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, identity: i64) -> Result<Session> {
        let mut sessions = self.sessions.lock();
        Ok(self.live_entry(&mut sessions, identity).clone())
    }

    async fn set_remote_session_id(
        &self,
        identity: i64,
        remote_session_id: Option<String>,
    ) -> Result<()> {
        let mut sessions = self.sessions.lock();
        let session = self.live_entry(&mut sessions, identity);
        session.remote_session_id = remote_session_id;
        Ok(())
    }

    async fn record_turn(&self, identity: i64, role: Role, content: &str) -> Result<()> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let session = self.live_entry(&mut sessions, identity);
        session.history.push(Turn {
            role,
            content: content.to_string(),
            timestamp: now,
        });
        if session.history.len() > MAX_HISTORY_TURNS {
            let excess = session.history.len() - MAX_HISTORY_TURNS;
            session.history.drain(..excess);
        }
        Ok(())
    }

    async fn clear(&self, identity: i64) -> Result<bool> {
        let mut sessions = self.sessions.lock();
        Ok(sessions.remove(&identity).is_some())
    }

    async fn count(&self) -> Result<usize> {
        let sessions = self.sessions.lock();
        Ok(sessions.len())
    }

    async fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.timeout));
        let removed = before - sessions.len();
        let remaining = sessions.len();
        drop(sessions);

        if removed > 0 {
            tracing::info!(removed, remaining, "swept expired sessions");
        } else {
            tracing::debug!(remaining, "session sweep found nothing to remove");
        }
        Ok(removed)
    }

    fn name(&self) -> &str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    /// Test clock that only moves when told to.
    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock()
        }
    }

    fn test_store(clock: Arc<ManualClock>) -> InMemorySessionStore {
        InMemorySessionStore::new(clock, Duration::minutes(30))
    }

    #[tokio::test]
    async fn get_or_create_returns_fresh_session() {
        let clock = ManualClock::new();
        let store = test_store(clock.clone());

        let session = store.get_or_create(42).await.unwrap();
        assert_eq!(session.identity, 42);
        assert!(session.history.is_empty());
        assert!(session.remote_session_id.is_none());
        assert_eq!(session.last_activity, clock.now());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_or_create_refreshes_activity_on_existing_session() {
        let clock = ManualClock::new();
        let store = test_store(clock.clone());

        let first = store.get_or_create(42).await.unwrap();
        clock.advance(Duration::minutes(10));
        let second = store.get_or_create(42).await.unwrap();

        assert_eq!(second.created_at, first.created_at);
        assert_eq!(
            second.last_activity,
            first.last_activity + Duration::minutes(10)
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn record_turn_applies_sliding_window() {
        let clock = ManualClock::new();
        let store = test_store(clock);

        for i in 0..25 {
            store
                .record_turn(42, Role::User, &format!("turn {i}"))
                .await
                .unwrap();
        }

        let session = store.get_or_create(42).await.unwrap();
        assert_eq!(session.history.len(), MAX_HISTORY_TURNS);
        // Oldest entries slid out; the window holds turns 5..=24 in order.
        assert_eq!(session.history[0].content, "turn 5");
        assert_eq!(session.history[19].content, "turn 24");
    }

    #[tokio::test]
    async fn set_remote_session_id_creates_the_session_if_absent() {
        let clock = ManualClock::new();
        let store = test_store(clock);

        store
            .set_remote_session_id(42, Some("s1".into()))
            .await
            .unwrap();
        let session = store.get_or_create(42).await.unwrap();
        assert_eq!(session.remote_session_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn clearing_remote_session_id_keeps_history() {
        let clock = ManualClock::new();
        let store = test_store(clock);

        store.record_turn(42, Role::User, "hello").await.unwrap();
        store.record_turn(42, Role::Agent, "hi").await.unwrap();
        store
            .set_remote_session_id(42, Some("s1".into()))
            .await
            .unwrap();

        store.set_remote_session_id(42, None).await.unwrap();

        let session = store.get_or_create(42).await.unwrap();
        assert!(session.remote_session_id.is_none());
        assert_eq!(session.history.len(), 2);
    }

    #[tokio::test]
    async fn clear_reports_whether_a_session_existed() {
        let clock = ManualClock::new();
        let store = test_store(clock);

        store.get_or_create(42).await.unwrap();
        store.get_or_create(7).await.unwrap();

        assert!(store.clear(42).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(!store.clear(42).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_sessions() {
        let clock = ManualClock::new();
        let store = test_store(clock.clone());

        store.get_or_create(1).await.unwrap();
        store.get_or_create(2).await.unwrap();

        clock.advance(Duration::minutes(20));
        store.record_turn(2, Role::User, "still here").await.unwrap();

        clock.advance(Duration::minutes(11));
        let removed = store.sweep_expired().await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        let survivor = store.get_or_create(2).await.unwrap();
        assert_eq!(survivor.history.len(), 1);
    }

    #[tokio::test]
    async fn sweep_keeps_session_at_exact_timeout() {
        let clock = ManualClock::new();
        let store = test_store(clock.clone());

        store.get_or_create(42).await.unwrap();
        clock.advance(Duration::minutes(30));

        // Expiry is strictly greater-than the threshold.
        assert_eq!(store.sweep_expired().await.unwrap(), 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn expired_session_is_replaced_on_next_read() {
        let clock = ManualClock::new();
        let store = test_store(clock.clone());

        store
            .set_remote_session_id(42, Some("stale".into()))
            .await
            .unwrap();
        store.record_turn(42, Role::User, "old turn").await.unwrap();

        clock.advance(Duration::minutes(31));
        let session = store.get_or_create(42).await.unwrap();

        assert!(session.remote_session_id.is_none());
        assert!(session.history.is_empty());
    }
}
