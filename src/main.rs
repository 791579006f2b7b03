use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use agentrelay::agentforce::{create_agent_client, SalesforceAuth};
use agentrelay::channels::{Channel, TelegramChannel};
use agentrelay::config::Config;
use agentrelay::gateway::{self, AppState};
use agentrelay::routing::create_router;
use agentrelay::sessions::{create_session_store, spawn_sweeper, SystemClock};

/// agentrelay - Telegram to Agentforce relay. Small, fast, 100% Rust.
#[derive(Parser, Debug)]
#[command(name = "agentrelay")]
#[command(version)]
#[command(about = "Relay Telegram chats to a Salesforce Agentforce agent.", long_about = None)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "agentrelay.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the relay (default when no subcommand is given)
    Run,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration with secrets masked
    Show,
}

fn init_logging() {
    // RUST_LOG wins; LOG_LEVEL is the deployment-friendly fallback.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        EnvFilter::new(level)
    });

    let subscriber = fmt::Subscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    config.apply_env_overrides();

    if let Some(Commands::Config {
        config_command: ConfigCommands::Show,
    }) = cli.command
    {
        print!("{}", config.to_masked_toml()?);
        return Ok(());
    }

    // A startup failure here exits non-zero before any traffic is taken.
    config.validate()?;
    run(config).await
}

async fn run(config: Config) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting agentrelay");

    let clock = Arc::new(SystemClock);
    let store = create_session_store(clock, config.sessions.timeout());

    let auth = Arc::new(SalesforceAuth::new(&config.salesforce));
    auth.authenticate().await?;

    let channel = Arc::new(TelegramChannel::new(&config.telegram.bot_token));
    channel.init().await?;

    let listener =
        TcpListener::bind((config.gateway.host.as_str(), config.gateway.port)).await?;

    let agent = create_agent_client(&config.agent.name, auth, store.clone());
    let router = create_router(store.clone(), agent, channel.clone());

    let sweeper = spawn_sweeper(store.clone(), config.sessions.sweep_interval());

    let state = AppState {
        store,
        agent_name: config.agent.name.clone(),
        started_at: std::time::Instant::now(),
    };
    let gateway_handle = tokio::spawn(async move {
        if let Err(e) = gateway::run_gateway(listener, state).await {
            error!(error = %e, "gateway terminated");
        }
    });

    let poller = {
        let channel = channel.clone();
        tokio::spawn(async move {
            if let Err(e) = channel.listen(router).await {
                error!(error = %e, "telegram poller terminated");
            }
        })
    };

    info!(
        agent = %config.agent.name,
        port = config.gateway.port,
        "agentrelay running"
    );

    shutdown_signal().await;
    info!("shutdown signal received, stopping");

    poller.abort();
    sweeper.abort();
    gateway_handle.abort();
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
