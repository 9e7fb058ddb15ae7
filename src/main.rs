use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tcpchat_server::chatlog::{ChatLog, FileChatLog};
use tcpchat_server::config::ServerConfig;
use tcpchat_server::engine::chat_engine::ChatEngine;
use tcpchat_server::server::ChatServer;
use tcpchat_server::tcp::connection::{DEFAULT_GREETING, SessionSettings};

/// Multi-client line relay over TCP.
#[derive(Parser, Debug)]
#[command(version, about, override_usage = "tcpchat [PORT] [HOST]")]
struct Cli {
    /// Port to listen on (defaults to the configured address, 8989)
    port: Option<u16>,

    /// Host to bind, e.g. localhost
    host: Option<String>,

    /// Path to the TOML config file
    #[arg(long, default_value = "tcpchat.toml")]
    config: String,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration (TOML file + env overrides + CLI)
    let mut config = ServerConfig::load(&cli.config)?;
    config.apply_cli(cli.port, cli.host.as_deref());

    let chat_log = FileChatLog::create(&config.log.chat_log)
        .with_context(|| format!("failed to open chat log {}", config.log.chat_log))?;
    chat_log.record("Server is starting up...");

    let greeting: Arc<[u8]> = match tokio::fs::read(&config.server.welcome_file).await {
        Ok(bytes) => Arc::from(bytes),
        Err(e) => {
            warn!(
                error = %e,
                path = %config.server.welcome_file,
                "failed to read welcome file, using built-in greeting"
            );
            Arc::from(DEFAULT_GREETING.as_bytes())
        }
    };

    let engine = Arc::new(ChatEngine::new(Arc::new(chat_log)));
    let settings = SessionSettings {
        greeting,
        max_line_length: config.server.max_line_length,
    };

    let server = ChatServer::bind(
        &config.server.address,
        engine.clone(),
        settings,
        config.server.max_sessions,
    )
    .await?;

    engine.record(&format!("Server started and listening on {}", config.server.address));
    info!(
        "TCPChat server starting on {}, chat log: {}",
        config.server.address, config.log.chat_log
    );

    // Stop on Ctrl+C
    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("Shutdown signal received");
        shutdown.cancel();
    });

    server.run().await;
    Ok(())
}
