//! Router trait bridging transport events to the agent client.

use anyhow::Result;
use async_trait::async_trait;

use crate::channels::InboundMessage;

/// Handles one inbound event end to end.
///
/// Per-message failures are contained inside `handle` and turned into a
/// user-visible reply; an `Err` means delivering the outbound reply
/// itself failed. One failed turn never affects other identities.
#[async_trait]
pub trait ConversationRouter: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> Result<()>;

    /// The name of this router implementation.
    fn name(&self) -> &str;
}
