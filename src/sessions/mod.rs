//! Session management — per-conversation state, expiry, and the sweep task.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemorySessionStore;
pub use traits::{Clock, Role, Session, SessionStore, SystemClock, Turn, MAX_HISTORY_TURNS};

use chrono::Duration;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Create the in-memory session store with the given clock and idle timeout.
pub fn create_session_store(clock: Arc<dyn Clock>, timeout: Duration) -> Arc<dyn SessionStore> {
    Arc::new(InMemorySessionStore::new(clock, timeout))
}

/// Spawn the periodic eviction pass over the store.
///
/// Returns the task handle so shutdown can abort it. The sweep body is
/// just `sweep_expired`, which tests drive directly with a manual clock.
pub fn spawn_sweeper(
    store: Arc<dyn SessionStore>,
    period: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately; consume it so the first
        // real sweep happens one full period after startup.
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = store.sweep_expired().await {
                tracing::warn!(error = %e, "session sweep failed");
            }
        }
    })
}
