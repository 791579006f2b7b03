//! Default router — command dispatch plus the regular message path.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::traits::ConversationRouter;
use crate::agentforce::{AgentClient, AgentError};
use crate::channels::{Channel, InboundMessage};
use crate::sessions::SessionStore;

const WELCOME_TEXT: &str = "\u{1F44B} Welcome!\n\n\
    I'm your Agentforce assistant. Send me a message and I'll do my best to help.\n\n\
    Commands:\n\
    \u{2022} /help - Show what I can do\n\
    \u{2022} /reset - Start a fresh conversation";

const HELP_TEXT: &str = "\u{2139}\u{FE0F} Help\n\n\
    Just type a message and I'll answer.\n\n\
    Commands:\n\
    \u{2022} /start - Welcome message\n\
    \u{2022} /reset - Reset your conversation\n\n\
    Conversations idle for 30 minutes expire automatically.";

const RESET_CLEARED_TEXT: &str = "\u{2705} Session Reset\n\n\
    Your conversation has been reset. Let's start fresh! \
    What would you like to talk about?";

const RESET_FRESH_TEXT: &str = "\u{2705} Session Reset\n\n\
    Ready for a new conversation! What can I help you with?";

fn error_reply(cause: &AgentError) -> String {
    format!(
        "\u{274C} Oops! Something went wrong\n\n\
         I encountered an error while processing your message. Please try again.\n\n\
         If the problem persists, try:\n\
         \u{2022} /reset - Reset your conversation\n\
         \u{2022} Wait a moment and try again\n\n\
         Error: {cause}"
    )
}

/// Extract the command token: first word, leading `/` removed, any
/// `@botname` suffix stripped, lowercased.
fn parse_command(text: &str) -> Option<String> {
    let token = text.split_whitespace().next()?.strip_prefix('/')?;
    let command = token.split('@').next().unwrap_or(token);
    Some(command.to_ascii_lowercase())
}

pub struct DefaultConversationRouter {
    store: Arc<dyn SessionStore>,
    agent: Arc<dyn AgentClient>,
    channel: Arc<dyn Channel>,
}

impl DefaultConversationRouter {
    pub fn new(
        store: Arc<dyn SessionStore>,
        agent: Arc<dyn AgentClient>,
        channel: Arc<dyn Channel>,
    ) -> Self {
        Self {
            store,
            agent,
            channel,
        }
    }

    async fn handle_command(&self, message: &InboundMessage) -> Result<()> {
        match parse_command(&message.text).as_deref() {
            Some("start") => self.channel.send_text(message.identity, WELCOME_TEXT).await,
            Some("help") => self.channel.send_text(message.identity, HELP_TEXT).await,
            Some("reset") => {
                let existed = self.store.clear(message.identity).await?;
                let reply = if existed {
                    RESET_CLEARED_TEXT
                } else {
                    RESET_FRESH_TEXT
                };
                tracing::info!(identity = message.identity, existed, "session reset");
                self.channel.send_text(message.identity, reply).await
            }
            other => {
                // Stray bot-command noise never burns an agent call.
                tracing::debug!(
                    identity = message.identity,
                    command = ?other,
                    "ignoring unrecognized command"
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ConversationRouter for DefaultConversationRouter {
    async fn handle(&self, message: InboundMessage) -> Result<()> {
        if message.is_command {
            return self.handle_command(&message).await;
        }

        if message.text.trim().is_empty() {
            return Ok(());
        }

        if let Err(e) = self.channel.send_typing(message.identity).await {
            tracing::warn!(identity = message.identity, error = %e, "typing indicator failed");
        }

        let reply = match self.agent.send(message.identity, &message.text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(identity = message.identity, error = %e, "agent exchange failed");
                error_reply(&e)
            }
        };

        self.channel.send_text(message.identity, &reply).await
    }

    fn name(&self) -> &str {
        "default"
    }
}
