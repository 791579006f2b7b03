//! Conversation routing — bridges transport events to the agent client.

pub mod default;
pub mod traits;

pub use default::DefaultConversationRouter;
pub use traits::ConversationRouter;

use crate::agentforce::AgentClient;
use crate::channels::Channel;
use crate::sessions::SessionStore;
use std::sync::Arc;

/// Create the default conversation router.
pub fn create_router(
    store: Arc<dyn SessionStore>,
    agent: Arc<dyn AgentClient>,
    channel: Arc<dyn Channel>,
) -> Arc<dyn ConversationRouter> {
    Arc::new(DefaultConversationRouter::new(store, agent, channel))
}
