//! Agent client trait, connection handle, and error taxonomy.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Reply text used when the agent returns an empty or missing message.
pub const FALLBACK_REPLY: &str = "I apologize, but I could not generate a response.";

/// Failures surfaced by the agent client.
///
/// `SessionInvalid` is recoverable: the client clears the stale remote
/// session id and retries once. Everything else reaches the user as the
/// generic transport-failure text; the underlying cause is logged, never
/// shown.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("the remote session is no longer valid")]
    SessionInvalid,
    #[error("Unable to process your request. Please try again later.")]
    TransportFailure,
}

/// A live Salesforce connection: bearer token plus the instance that
/// issued it.
#[derive(Debug, Clone, Deserialize)]
pub struct Connection {
    pub access_token: String,
    pub instance_url: String,
}

/// Sends user messages to the remote agent and returns its replies.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Relay one user message for `identity` and return the agent's
    /// reply text. Records both turns in the session store on success.
    async fn send(&self, identity: i64, message: &str) -> Result<String, AgentError>;

    /// The name of this agent client implementation.
    fn name(&self) -> &str;
}
