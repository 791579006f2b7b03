//! Transport traits and the inbound event type.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::routing::ConversationRouter;

/// One inbound transport event, normalized for the router.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// The conversation key (Telegram chat id).
    pub identity: i64,
    pub text: String,
    pub is_command: bool,
}

/// A messaging transport the relay receives from and replies through.
#[async_trait]
pub trait Channel: Send + Sync {
    /// The name of this channel implementation.
    fn name(&self) -> &'static str;

    /// Validate credentials against the transport. Failure is fatal at
    /// startup.
    async fn init(&self) -> Result<()>;

    /// Run the inbound loop, dispatching each event to the router as an
    /// independent task. Only returns on an unrecoverable transport error.
    async fn listen(&self, router: Arc<dyn ConversationRouter>) -> Result<()>;

    /// Deliver reply text to a conversation.
    async fn send_text(&self, identity: i64, text: &str) -> Result<()>;

    /// Show a "working on it" indicator for a conversation.
    async fn send_typing(&self, identity: i64) -> Result<()>;
}
