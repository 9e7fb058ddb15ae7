use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::engine::chat_engine::ChatEngine;
use crate::engine::format;

use super::connection::{SessionSettings, handle_connection};

/// Pause after a failed accept so a persistent error (e.g. fd exhaustion)
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accept connections until `stop` fires, spawning a session task for each.
/// Sessions run until their peer leaves or `close_sessions` fires.
///
/// Accept failures are logged and the loop keeps going. When `gate` is set,
/// each session holds one permit for its lifetime; a connection arriving with
/// no permit left is told the chat is full and closed.
pub async fn run_accept_loop(
    listener: TcpListener,
    engine: Arc<ChatEngine>,
    settings: SessionSettings,
    gate: Option<Arc<Semaphore>>,
    tracker: TaskTracker,
    stop: CancellationToken,
    close_sessions: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = stop.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let (mut stream, peer) = match accepted {
            Ok(conn) => conn,
            Err(e) => {
                error!(error = %e, "failed to accept connection");
                engine.record(&format!("Accept error: {}", e));
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };

        let permit = match &gate {
            None => None,
            Some(gate) => match gate.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(%peer, "session limit reached, rejecting connection");
                    tracker.spawn(async move {
                        let _ = stream.write_all(format::CHAT_FULL.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    });
                    continue;
                }
            },
        };

        let engine = engine.clone();
        let settings = settings.clone();
        let close = close_sessions.clone();
        tracker.spawn(async move {
            let _permit = permit;
            handle_connection(stream, engine, settings, close).await;
        });
    }

    info!("listener stopped accepting connections");
}
