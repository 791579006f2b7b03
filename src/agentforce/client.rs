//! Apex REST chat client for the Agentforce agent.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::SalesforceAuth;
use super::traits::{AgentClient, AgentError, FALLBACK_REPLY};
use crate::sessions::{Role, SessionStore};

/// Substring the remote API embeds in error payloads when the session
/// token it issued is no longer usable.
const INVALID_SESSION_SIGNAL: &str = "INVALID_SESSION_ID";

/// Path of the agent-chat endpoint on the connection's instance.
const CHAT_ENDPOINT: &str = "/services/apexrest/agentforce/chat";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    agent_name: &'a str,
    message: &'a str,
    session_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "sessionId")]
    session_id: Option<String>,
}

/// Client for the Agentforce chat endpoint.
///
/// Each send issues exactly one request per attempt and at most two
/// attempts: on an invalid-session signal the stale remote session id is
/// cleared and the message retried once with a fresh session.
pub struct AgentforceClient {
    agent_name: String,
    auth: Arc<SalesforceAuth>,
    store: Arc<dyn SessionStore>,
    client: Client,
}

impl AgentforceClient {
    pub fn new(agent_name: &str, auth: Arc<SalesforceAuth>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            auth,
            store,
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// One complete exchange: connection, session lookup, single request,
    /// response bookkeeping.
    async fn attempt(&self, identity: i64, message: &str) -> Result<String, AgentError> {
        let connection = self
            .auth
            .ensure_connection()
            .await
            .map_err(|e| transport_failure(identity, &e))?;

        let session = self
            .store
            .get_or_create(identity)
            .await
            .map_err(|e| transport_failure(identity, &e))?;

        let request = ChatRequest {
            agent_name: &self.agent_name,
            message,
            session_id: session.remote_session_id.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}{CHAT_ENDPOINT}", connection.instance_url))
            .bearer_auth(&connection.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_failure(identity, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains(INVALID_SESSION_SIGNAL) {
                return Err(AgentError::SessionInvalid);
            }
            tracing::error!(identity, %status, body = %body, "agent request rejected");
            return Err(AgentError::TransportFailure);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| transport_failure(identity, &e))?;

        if let Some(session_id) = chat.session_id {
            self.store
                .set_remote_session_id(identity, Some(session_id))
                .await
                .map_err(|e| transport_failure(identity, &e))?;
        }

        let reply = chat
            .message
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .unwrap_or(FALLBACK_REPLY)
            .to_string();

        self.store
            .record_turn(identity, Role::User, message)
            .await
            .map_err(|e| transport_failure(identity, &e))?;
        self.store
            .record_turn(identity, Role::Agent, &reply)
            .await
            .map_err(|e| transport_failure(identity, &e))?;

        Ok(reply)
    }
}

fn transport_failure(identity: i64, cause: &dyn std::fmt::Display) -> AgentError {
    tracing::error!(identity, error = %cause, "agent exchange failed");
    AgentError::TransportFailure
}

#[async_trait]
impl AgentClient for AgentforceClient {
    async fn send(&self, identity: i64, message: &str) -> Result<String, AgentError> {
        // Bounded retry: at most two attempts, never recursion.
        let mut retried = false;
        loop {
            match self.attempt(identity, message).await {
                Err(AgentError::SessionInvalid) if !retried => {
                    tracing::warn!(identity, "remote session invalid, retrying with a fresh one");
                    self.store
                        .set_remote_session_id(identity, None)
                        .await
                        .map_err(|e| transport_failure(identity, &e))?;
                    retried = true;
                }
                Err(AgentError::SessionInvalid) => {
                    tracing::error!(identity, "remote session still invalid after retry");
                    return Err(AgentError::TransportFailure);
                }
                other => return other,
            }
        }
    }

    fn name(&self) -> &str {
        "agentforce"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SalesforceConfig;
    use crate::sessions::{create_session_store, SystemClock};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn setup(server: &MockServer) -> (AgentforceClient, Arc<dyn SessionStore>) {
        Mock::given(method("POST"))
            .and(path("/services/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "t-1",
                "instance_url": server.uri(),
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/oauth2/userinfo"))
            .respond_with(ResponseTemplate::new(200))
            .mount(server)
            .await;

        let config = SalesforceConfig {
            login_url: server.uri(),
            client_id: "cid".into(),
            client_secret: "csecret".into(),
            username: "user@example.com".into(),
            password: "pw".into(),
            ..SalesforceConfig::default()
        };
        let store = create_session_store(Arc::new(SystemClock), chrono::Duration::minutes(30));
        let auth = Arc::new(SalesforceAuth::new(&config));
        let client = AgentforceClient::new("TestAgent", auth, store.clone());
        (client, store)
    }

    #[tokio::test]
    async fn first_exchange_records_session_id_and_both_turns() {
        let server = MockServer::start().await;
        let (client, store) = setup(&server).await;

        Mock::given(method("POST"))
            .and(path(CHAT_ENDPOINT))
            .and(body_partial_json(serde_json::json!({
                "agentName": "TestAgent",
                "message": "hello",
                "sessionId": null,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "hi",
                "sessionId": "s1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client.send(42, "hello").await.unwrap();
        assert_eq!(reply, "hi");

        let session = store.get_or_create(42).await.unwrap();
        assert_eq!(session.remote_session_id.as_deref(), Some("s1"));
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].role, Role::User);
        assert_eq!(session.history[0].content, "hello");
        assert_eq!(session.history[1].role, Role::Agent);
        assert_eq!(session.history[1].content, "hi");
    }

    #[tokio::test]
    async fn empty_reply_falls_back_to_fixed_text() {
        let server = MockServer::start().await;
        let (client, store) = setup(&server).await;

        Mock::given(method("POST"))
            .and(path(CHAT_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "",
                "sessionId": "s1",
            })))
            .mount(&server)
            .await;

        let reply = client.send(42, "hello").await.unwrap();
        assert_eq!(reply, FALLBACK_REPLY);

        let session = store.get_or_create(42).await.unwrap();
        assert_eq!(session.history[1].content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn invalid_session_retries_once_and_returns_second_result() {
        let server = MockServer::start().await;
        let (client, store) = setup(&server).await;
        store
            .set_remote_session_id(42, Some("stale".into()))
            .await
            .unwrap();

        Mock::given(method("POST"))
            .and(path(CHAT_ENDPOINT))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"errorCode":"INVALID_SESSION_ID","message":"expired"}"#),
            )
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(CHAT_ENDPOINT))
            .and(body_partial_json(serde_json::json!({ "sessionId": null })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": "recovered",
                "sessionId": "s2",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client.send(42, "hello").await.unwrap();
        assert_eq!(reply, "recovered");

        let session = store.get_or_create(42).await.unwrap();
        assert_eq!(session.remote_session_id.as_deref(), Some("s2"));
    }

    #[tokio::test]
    async fn second_invalid_session_fails_without_a_third_request() {
        let server = MockServer::start().await;
        let (client, _store) = setup(&server).await;

        Mock::given(method("POST"))
            .and(path(CHAT_ENDPOINT))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"errorCode":"INVALID_SESSION_ID","message":"expired"}"#),
            )
            .expect(2)
            .mount(&server)
            .await;

        let err = client.send(42, "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::TransportFailure));
    }

    #[tokio::test]
    async fn other_failures_surface_the_generic_error() {
        let server = MockServer::start().await;
        let (client, _store) = setup(&server).await;

        Mock::given(method("POST"))
            .and(path(CHAT_ENDPOINT))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client.send(42, "hello").await.unwrap_err();
        assert!(matches!(err, AgentError::TransportFailure));
        assert_eq!(
            err.to_string(),
            "Unable to process your request. Please try again later."
        );
    }
}
