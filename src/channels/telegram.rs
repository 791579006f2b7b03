//! Telegram channel — long-polls the Bot API for updates and sends
//! replies back through it.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

use super::traits::{Channel, InboundMessage};
use crate::routing::ConversationRouter;

/// Telegram rejects messages longer than this; replies are chunked.
const MAX_MESSAGE_LEN: usize = 4096;

/// Long-poll timeout passed to getUpdates, in seconds.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Back-off after a failed poll before trying again.
const POLL_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

pub struct TelegramChannel {
    bot_token: String,
    client: Client,
}

impl TelegramChannel {
    pub fn new(bot_token: &str) -> Self {
        Self {
            bot_token: bot_token.to_string(),
            client: Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Translate one getUpdates entry into an inbound event. Non-text
    /// updates (stickers, photos, edits, joins) are skipped.
    fn parse_update(update: &serde_json::Value) -> Option<InboundMessage> {
        let message = update.get("message")?;
        let identity = message
            .get("chat")
            .and_then(|chat| chat.get("id"))
            .and_then(serde_json::Value::as_i64)?;
        let text = message.get("text").and_then(|t| t.as_str())?.to_string();
        let is_command = text.starts_with('/');

        Some(InboundMessage {
            identity,
            text,
            is_command,
        })
    }

    async fn send_chunk(&self, identity: i64, text: &str) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": identity,
            "text": text,
        });

        let response = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = response.text().await.unwrap_or_default();
            bail!("Telegram sendMessage failed: {err}");
        }
        Ok(())
    }
}

/// Split reply text into chunks under the Telegram length limit,
/// preferring paragraph, line, sentence, then word boundaries.
fn split_reply(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while remaining.len() > max_len {
        // Largest char boundary that still fits the limit.
        let mut limit = max_len;
        while !remaining.is_char_boundary(limit) {
            limit -= 1;
        }
        let window = &remaining[..limit];
        let cut = window
            .rfind("\n\n")
            .or_else(|| window.rfind('\n'))
            .or_else(|| window.rfind(". "))
            .or_else(|| window.rfind(' '))
            .filter(|&pos| pos > 0)
            .unwrap_or(limit);

        chunks.push(remaining[..cut].to_string());
        remaining = remaining[cut..].trim_start();
    }
    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn init(&self) -> Result<()> {
        let response = self.client.get(self.api_url("getMe")).send().await?;
        if !response.status().is_success() {
            let err = response.text().await.unwrap_or_default();
            bail!("invalid Telegram bot token: {err}");
        }

        let data: serde_json::Value = response.json().await?;
        let username = data
            .get("result")
            .and_then(|r| r.get("username"))
            .and_then(|u| u.as_str())
            .ok_or_else(|| anyhow!("missing bot username in getMe response"))?;

        tracing::info!(bot = username, "Telegram bot validated");
        Ok(())
    }

    async fn listen(&self, router: Arc<dyn ConversationRouter>) -> Result<()> {
        let mut offset: i64 = 0;

        tracing::info!("Telegram channel listening for messages");

        loop {
            let body = serde_json::json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            });

            let response = match self
                .client
                .post(self.api_url("getUpdates"))
                .json(&body)
                .send()
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram poll error");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            let data: serde_json::Value = match response.json().await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(error = %e, "Telegram poll parse error");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                }
            };

            let Some(updates) = data.get("result").and_then(serde_json::Value::as_array) else {
                continue;
            };

            for update in updates {
                if let Some(update_id) = update.get("update_id").and_then(serde_json::Value::as_i64)
                {
                    offset = update_id + 1;
                }

                let Some(message) = Self::parse_update(update) else {
                    continue;
                };

                tracing::debug!(
                    identity = message.identity,
                    is_command = message.is_command,
                    "inbound message"
                );

                // One task per update: a slow remote call for one chat
                // never blocks the others.
                let router = router.clone();
                tokio::spawn(async move {
                    let identity = message.identity;
                    if let Err(e) = router.handle(message).await {
                        tracing::warn!(identity, error = %e, "message handling failed");
                    }
                });
            }
        }
    }

    async fn send_text(&self, identity: i64, text: &str) -> Result<()> {
        for chunk in split_reply(text, MAX_MESSAGE_LEN) {
            self.send_chunk(identity, &chunk).await?;
        }
        Ok(())
    }

    async fn send_typing(&self, identity: i64) -> Result<()> {
        let body = serde_json::json!({
            "chat_id": identity,
            "action": "typing",
        });

        let response = self
            .client
            .post(self.api_url("sendChatAction"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let err = response.text().await.unwrap_or_default();
            bail!("Telegram sendChatAction failed: {err}");
        }
        Ok(())
    }
}
