use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::engine::chat_engine::ChatEngine;
use crate::tcp::connection::SessionSettings;
use crate::tcp::listener::run_accept_loop;

/// How long `run` waits for session tasks to finish after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// A bound chat server: listener, engine, admission gate and shutdown token.
pub struct ChatServer {
    listener: TcpListener,
    engine: Arc<ChatEngine>,
    settings: SessionSettings,
    gate: Option<Arc<Semaphore>>,
    cancel: CancellationToken,
}

impl ChatServer {
    /// Bind the listen address. This is the only place the server fails hard.
    pub async fn bind(
        addr: &str,
        engine: Arc<ChatEngine>,
        settings: SessionSettings,
        max_sessions: Option<usize>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        Ok(Self {
            listener,
            engine,
            settings,
            gate: max_sessions.map(|max| Arc::new(Semaphore::new(max))),
            cancel: CancellationToken::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Cancelling this token stops the server.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the accept loop and block until the shutdown token is cancelled.
    /// Connected sessions then get a shutdown notice and are closed.
    pub async fn run(self) {
        let addr = self
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".into());
        info!(%addr, "chat server listening");

        let tracker = TaskTracker::new();
        let close_sessions = CancellationToken::new();
        let accept_loop = tokio::spawn(run_accept_loop(
            self.listener,
            self.engine.clone(),
            self.settings,
            self.gate,
            tracker.clone(),
            self.cancel.clone(),
            close_sessions.clone(),
        ));

        self.cancel.cancelled().await;
        info!("shutdown requested, stopping gracefully...");

        let _ = accept_loop.await;

        // Notify and deregister before session tasks stop reading, so no
        // session announces its own leave during shutdown. `close_all` also
        // refuses any session still finishing its name.
        self.engine.announce_shutdown();
        self.engine.close_all();
        close_sessions.cancel();

        tracker.close();
        if tokio::time::timeout(SHUTDOWN_GRACE, tracker.wait())
            .await
            .is_err()
        {
            warn!(remaining = tracker.len(), "sessions still open after grace period");
        }

        info!("chat server stopped");
    }
}
