//! Salesforce authentication — username-password token flow with a
//! cached connection handle and transparent re-auth.

use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;

use super::traits::Connection;
use crate::config::SalesforceConfig;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

/// Owns the access-token handshake against the Salesforce login endpoint.
///
/// The cached connection is guarded by a non-async mutex that is never
/// held across an HTTP call; two concurrent re-auths may both succeed
/// and the later one wins the cache slot.
pub struct SalesforceAuth {
    login_url: String,
    client_id: String,
    client_secret: String,
    username: String,
    password: String,
    security_token: Option<String>,
    client: Client,
    connection: Mutex<Option<Connection>>,
}

impl SalesforceAuth {
    pub fn new(config: &SalesforceConfig) -> Self {
        Self {
            login_url: config.login_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
            security_token: config.security_token.clone(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            connection: Mutex::new(None),
        }
    }

    /// Run the password grant and cache the resulting connection.
    pub async fn authenticate(&self) -> Result<Connection> {
        // Salesforce expects the security token appended to the password.
        let password = match &self.security_token {
            Some(token) => format!("{}{}", self.password, token),
            None => self.password.clone(),
        };

        let response = self
            .client
            .post(format!("{}/services/oauth2/token", self.login_url))
            .form(&[
                ("grant_type", "password"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("username", self.username.as_str()),
                ("password", password.as_str()),
            ])
            .send()
            .await
            .context("Salesforce login request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body, "Salesforce authentication rejected");
            bail!("Salesforce authentication failed: HTTP {status}");
        }

        let token: TokenResponse = response
            .json()
            .await
            .context("invalid Salesforce token response")?;
        let connection = Connection {
            access_token: token.access_token,
            instance_url: token.instance_url.trim_end_matches('/').to_string(),
        };

        *self.connection.lock() = Some(connection.clone());
        tracing::info!(instance = %connection.instance_url, "Salesforce connection established");
        Ok(connection)
    }

    /// The cached connection, or an error if `authenticate` has never
    /// succeeded.
    pub fn connection(&self) -> Result<Connection> {
        match self.connection.lock().as_ref() {
            Some(connection) => Ok(connection.clone()),
            None => bail!("not authenticated with Salesforce"),
        }
    }

    /// Probe the cached token against the userinfo endpoint. Any failure
    /// counts as invalid.
    pub async fn is_connection_valid(&self) -> bool {
        let Ok(connection) = self.connection() else {
            return false;
        };

        let probe = self
            .client
            .get(format!(
                "{}/services/oauth2/userinfo",
                connection.instance_url
            ))
            .bearer_auth(&connection.access_token)
            .send()
            .await;

        matches!(probe, Ok(response) if response.status().is_success())
    }

    /// Return a live connection, re-authenticating transparently when the
    /// cached one fails its validity probe.
    pub async fn ensure_connection(&self) -> Result<Connection> {
        if self.is_connection_valid().await {
            return self.connection();
        }

        tracing::warn!("Salesforce connection invalid, re-authenticating");
        self.authenticate().await
    }
}
