//! Configuration schema — TOML file with environment-variable overrides.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_login_url() -> String {
    "https://login.salesforce.com".to_string()
}

fn default_api_version() -> String {
    "60.0".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_minutes() -> i64 {
    30
}

fn default_sweep_interval_minutes() -> u64 {
    5
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesforceConfig {
    pub login_url: String,
    pub api_version: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub security_token: Option<String>,
}

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            api_version: default_api_version(),
            client_id: String::new(),
            client_secret: String::new(),
            username: String::new(),
            password: String::new(),
            security_token: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub timeout_minutes: i64,
    pub sweep_interval_minutes: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: default_timeout_minutes(),
            sweep_interval_minutes: default_sweep_interval_minutes(),
        }
    }
}

impl SessionsConfig {
    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.timeout_minutes)
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_minutes * 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub salesforce: SalesforceConfig,
    pub agent: AgentConfig,
    pub gateway: GatewayConfig,
    pub sessions: SessionsConfig,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram: TelegramConfig::default(),
            salesforce: SalesforceConfig::default(),
            agent: AgentConfig::default(),
            gateway: GatewayConfig::default(),
            sessions: SessionsConfig::default(),
            log_level: default_log_level(),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

impl Config {
    /// Load the config file if it exists; fall back to defaults so a
    /// purely env-driven deployment needs no file at all.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&raw)
                .with_context(|| format!("invalid TOML in {}", path.display()))?;
            tracing::info!(path = %path.display(), "config file loaded");
            Ok(config)
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Ok(Config::default())
        }
    }

    /// Environment variables win over file values.
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = env_nonempty("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(url) = env_nonempty("SF_LOGIN_URL") {
            self.salesforce.login_url = url;
        }
        if let Some(id) = env_nonempty("SF_CLIENT_ID") {
            self.salesforce.client_id = id;
        }
        if let Some(secret) = env_nonempty("SF_CLIENT_SECRET") {
            self.salesforce.client_secret = secret;
        }
        if let Some(username) = env_nonempty("SF_USERNAME") {
            self.salesforce.username = username;
        }
        if let Some(password) = env_nonempty("SF_PASSWORD") {
            self.salesforce.password = password;
        }
        if let Some(token) = env_nonempty("SF_SECURITY_TOKEN") {
            self.salesforce.security_token = Some(token);
        }
        if let Some(name) = env_nonempty("AGENTFORCE_AGENT_NAME") {
            self.agent.name = name;
        }
        if let Some(port) = env_nonempty("PORT") {
            match port.parse() {
                Ok(port) => self.gateway.port = port,
                Err(_) => tracing::warn!(value = %port, "ignoring invalid PORT override"),
            }
        }
        if let Some(level) = env_nonempty("LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Report every missing required setting in one error so a broken
    /// deployment is fixable in a single pass.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.telegram.bot_token.trim().is_empty() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.salesforce.client_id.trim().is_empty() {
            missing.push("SF_CLIENT_ID");
        }
        if self.salesforce.client_secret.trim().is_empty() {
            missing.push("SF_CLIENT_SECRET");
        }
        if self.salesforce.username.trim().is_empty() {
            missing.push("SF_USERNAME");
        }
        if self.salesforce.password.trim().is_empty() {
            missing.push("SF_PASSWORD");
        }
        if self.agent.name.trim().is_empty() {
            missing.push("AGENTFORCE_AGENT_NAME");
        }
        if !missing.is_empty() {
            bail!("missing required configuration: {}", missing.join(", "));
        }

        if self.sessions.timeout_minutes <= 0 {
            bail!("sessions.timeout_minutes must be greater than 0");
        }
        if self.sessions.sweep_interval_minutes == 0 {
            bail!("sessions.sweep_interval_minutes must be greater than 0");
        }
        if self.gateway.host.trim().is_empty() {
            bail!("gateway.host must not be empty");
        }

        Ok(())
    }

    /// Effective configuration as TOML with secret values masked.
    pub fn to_masked_toml(&self) -> Result<String> {
        let raw = toml::to_string_pretty(self).context("failed to serialize config")?;
        Ok(mask_sensitive_fields(&raw))
    }
}

fn mask_sensitive_fields(toml_str: &str) -> String {
    let mut output = String::with_capacity(toml_str.len());
    for line in toml_str.lines() {
        let trimmed = line.trim();
        let sensitive = trimmed.starts_with("bot_token")
            || trimmed.starts_with("client_secret")
            || trimmed.starts_with("password")
            || trimmed.starts_with("security_token");
        if sensitive {
            if let Some(eq_pos) = line.find('=') {
                output.push_str(&line[..=eq_pos]);
                output.push_str(" \"***MASKED***\"");
            } else {
                output.push_str(line);
            }
        } else {
            output.push_str(line);
        }
        output.push('\n');
    }
    output
}
