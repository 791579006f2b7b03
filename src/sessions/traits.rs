//! Session storage traits and types for per-conversation state.

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on retained history turns; older entries slide out first.
pub const MAX_HISTORY_TURNS: usize = 20;

/// Who produced a given turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

/// A single entry in a session's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One conversation's tracked state, keyed by chat identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub identity: i64,
    /// Opaque token issued by the remote agent; `None` until the first
    /// successful exchange, and reset to `None` when the remote side
    /// reports it invalid.
    pub remote_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub history: Vec<Turn>,
}

impl Session {
    pub fn new(identity: i64, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            remote_session_id: None,
            created_at: now,
            last_activity: now,
            history: Vec::new(),
        }
    }

    /// A session idle longer than `timeout` must not serve new turns.
    pub fn is_expired(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now.signed_duration_since(self.last_activity) > timeout
    }
}

/// Time source for session aging. Injected so expiry is testable
/// without waiting on real time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Storage for conversation sessions.
///
/// The store exclusively owns all `Session` state; callers get clones
/// and must re-fetch each turn rather than hold one across calls.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Return the live session for `identity`, refreshing its activity
    /// timestamp. Creates a fresh session when none exists or when the
    /// stored one has already expired.
    async fn get_or_create(&self, identity: i64) -> Result<Session>;

    /// Update the remote agent's session token for `identity`, creating
    /// the session first if necessary. `None` clears the token while
    /// keeping the session and its history.
    async fn set_remote_session_id(
        &self,
        identity: i64,
        remote_session_id: Option<String>,
    ) -> Result<()>;

    /// Append a turn to the identity's history, dropping the oldest
    /// entry once the window is full. Refreshes the activity timestamp.
    async fn record_turn(&self, identity: i64, role: Role, content: &str) -> Result<()>;

    /// Remove the identity's session. Returns whether one existed.
    async fn clear(&self, identity: i64) -> Result<bool>;

    /// Number of currently tracked sessions.
    async fn count(&self) -> Result<usize>;

    /// Remove every session idle past the timeout. Returns how many
    /// were removed. Only this operation may delete for expiry reasons.
    async fn sweep_expired(&self) -> Result<usize>;

    /// The name of this session store implementation.
    fn name(&self) -> &str;
}
