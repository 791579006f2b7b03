//! Remote agent integration — Salesforce auth and the Agentforce chat client.

pub mod auth;
pub mod client;
pub mod traits;

pub use auth::SalesforceAuth;
pub use client::AgentforceClient;
pub use traits::{AgentClient, AgentError, Connection, FALLBACK_REPLY};

use crate::sessions::SessionStore;
use std::sync::Arc;

/// Create the Agentforce client for the configured agent.
pub fn create_agent_client(
    agent_name: &str,
    auth: Arc<SalesforceAuth>,
    store: Arc<dyn SessionStore>,
) -> Arc<dyn AgentClient> {
    Arc::new(AgentforceClient::new(agent_name, auth, store))
}
