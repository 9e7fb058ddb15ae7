use std::io;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::chat_engine::ChatEngine;
use crate::engine::events::{ChatEvent, SessionId};
use crate::engine::format;
use crate::engine::validation;

use super::codec::{ChatLineCodec, Frame};

/// Greeting used when no welcome file is configured or readable.
pub const DEFAULT_GREETING: &str = "Welcome to TCP-Chat!\n[ENTER YOUR NAME]: ";

/// Longest line accepted from a client, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// How long a closing session waits for its queued lines to be written.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

type LineReader = FramedRead<OwnedReadHalf, ChatLineCodec>;

/// Per-connection settings shared by every session the listener spawns.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Sent verbatim right after accept, before the name is read.
    pub greeting: Arc<[u8]>,
    pub max_line_length: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            greeting: Arc::from(DEFAULT_GREETING.as_bytes()),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Deregisters a joined session when the connection task ends, whether the
/// read loop returned normally or unwound.
struct JoinedSession {
    engine: Arc<ChatEngine>,
    session_id: SessionId,
}

impl Drop for JoinedSession {
    fn drop(&mut self) {
        self.engine.leave(self.session_id);
    }
}

/// Handle a single client connection from accept to close.
///
/// Connected -> greeting sent -> name read -> joined (read loop) -> closed.
/// A client that never finishes naming itself is never registered and never
/// announced.
pub async fn handle_connection(
    stream: TcpStream,
    engine: Arc<ChatEngine>,
    settings: SessionSettings,
    cancel: CancellationToken,
) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".into());

    info!(%peer, "client connected");

    let (reader, mut writer) = stream.into_split();
    let mut lines = FramedRead::new(reader, ChatLineCodec::new(settings.max_line_length));

    if let Err(e) = writer.write_all(&settings.greeting).await {
        warn!(%peer, error = %e, "failed to send welcome message");
        engine.record(&format!("Failed to send welcome message: {}", e));
        return;
    }

    let name = tokio::select! {
        _ = cancel.cancelled() => return,
        result = read_name(&mut lines, &mut writer) => match result {
            Ok(Some(name)) => name,
            Ok(None) => {
                info!(%peer, "client disconnected before joining");
                return;
            }
            Err(e) => {
                warn!(%peer, error = %e, "failed to read name");
                engine.record(&format!("Read error: {}", e));
                return;
            }
        },
    };

    let Some((session_id, rx)) = engine.join(name.clone()) else {
        info!(%peer, %name, "server shutting down, session not joined");
        return;
    };
    let joined = JoinedSession {
        engine: engine.clone(),
        session_id,
    };

    let write_handle = tokio::spawn(write_loop(writer, rx, engine.clone(), name.clone()));

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = lines.next() => frame,
        };

        match frame {
            Some(Ok(Frame::Line(line))) => {
                engine.send_message(session_id, &line);
            }
            Some(Ok(Frame::TooLong)) => {
                warn!(%session_id, %name, "discarded over-long line");
                engine.notify(
                    session_id,
                    format!(
                        "Message too long (max {} bytes), discarded",
                        settings.max_line_length
                    ),
                );
            }
            Some(Err(e)) => {
                error!(%session_id, %name, error = %e, "read error");
                engine.record(&format!("Read error from {}: {}", name, e));
                break;
            }
            None => {
                info!(%session_id, %name, "client disconnected");
                engine.record(&format!("Client {} disconnected", name));
                break;
            }
        }
    }

    // Leaving drops the engine's sender, so the write loop drains and stops
    drop(joined);

    let abort = write_handle.abort_handle();
    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, write_handle)
        .await
        .is_err()
    {
        warn!(%session_id, %name, "write loop did not drain in time");
        abort.abort();
    }
}

/// Read lines until one is an acceptable name. `Ok(None)` means the peer
/// closed the connection first.
async fn read_name(
    lines: &mut LineReader,
    writer: &mut OwnedWriteHalf,
) -> io::Result<Option<String>> {
    while let Some(frame) = lines.next().await {
        let reason = match frame? {
            Frame::Line(raw) => match validation::validate_name(&raw) {
                Ok(name) => return Ok(Some(name)),
                Err(e) => e.to_string(),
            },
            Frame::TooLong => "Name is too long".to_string(),
        };

        let reply = format!("{}\n{}", reason, format::NAME_PROMPT);
        writer.write_all(reply.as_bytes()).await?;
    }

    Ok(None)
}

/// Drain one session's outbound queue onto its socket.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<ChatEvent>,
    engine: Arc<ChatEngine>,
    name: String,
) {
    while let Some(event) = rx.recv().await {
        let line = format::render(&event);
        if let Err(e) = writer.write_all(line.as_bytes()).await {
            warn!(%name, error = %e, "failed to write to client");
            engine.record(&format!("Failed to send message to {}: {}", name, e));
            break;
        }
    }

    let _ = writer.shutdown().await;
}
