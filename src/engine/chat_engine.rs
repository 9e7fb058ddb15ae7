use std::sync::{Arc, PoisonError, RwLock};

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chatlog::ChatLog;

use super::events::{BroadcastReport, ChatEvent, SessionId};
use super::format;
use super::registry::Registry;
use super::user_session::{OUTBOUND_QUEUE_CAPACITY, UserSession};

/// The hub that tracks joined sessions and fans events out to them.
/// Transport-agnostic: the TCP adapter calls into it and drains the
/// per-session receivers it hands out.
pub struct ChatEngine {
    /// Sessions that completed name negotiation and have not left.
    registry: Registry,
    /// Transcript sink for joins, leaves, chat lines and client errors.
    chat_log: Arc<dyn ChatLog>,
    /// Set by `close_all`; no session may join afterwards.
    closed: RwLock<bool>,
}

impl ChatEngine {
    pub fn new(chat_log: Arc<dyn ChatLog>) -> Self {
        Self {
            registry: Registry::new(),
            chat_log,
            closed: RwLock::new(false),
        }
    }

    /// Register a named session and announce it to everyone, the joiner included.
    /// Returns the session ID and the receiver its write loop should drain, or
    /// `None` once `close_all` has run.
    pub fn join(&self, name: String) -> Option<(SessionId, mpsc::Receiver<ChatEvent>)> {
        let session_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);

        {
            // Held across the add so `close_all` cannot slip in between
            let closed = self.closed.read().unwrap_or_else(PoisonError::into_inner);
            if *closed {
                info!(%name, "join refused, server is shutting down");
                return None;
            }
            self.registry.add(Arc::new(UserSession::new(session_id, name.clone(), tx)));
        }

        info!(%session_id, %name, "session joined");

        let event = ChatEvent::Joined {
            name,
            timestamp: Local::now(),
        };
        self.broadcast(&event, None);
        self.chat_log.record(&format::render(&event));

        Some((session_id, rx))
    }

    /// Broadcast one chat line from a joined session to every session,
    /// the sender included. Whitespace-only input is dropped and yields `None`.
    pub fn send_message(&self, session_id: SessionId, text: &str) -> Option<BroadcastReport> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }

        let Some(session) = self.registry.get(session_id) else {
            warn!(%session_id, "message from unregistered session dropped");
            return None;
        };

        let event = ChatEvent::Message {
            from: session.name.clone(),
            content: content.to_string(),
            timestamp: Local::now(),
        };
        let report = self.broadcast(&event, None);
        self.chat_log.record(&format::render(&event));

        Some(report)
    }

    /// Remove a session and tell the remaining sessions it left.
    /// Only the call that actually removes the session announces anything,
    /// so racing or repeated calls produce a single leave line.
    pub fn leave(&self, session_id: SessionId) -> Option<BroadcastReport> {
        let session = self.registry.remove(session_id)?;

        info!(%session_id, name = %session.name, "session left");

        let event = ChatEvent::Left {
            name: session.name.clone(),
            timestamp: Local::now(),
        };
        let report = self.broadcast(&event, None);
        self.chat_log.record(&format::render(&event));

        Some(report)
    }

    /// Send a notice to one session only. Returns false if it is gone.
    pub fn notify(&self, session_id: SessionId, message: impl Into<String>) -> bool {
        self.registry.get(session_id).is_some_and(|session| {
            session.send(ChatEvent::ServerNotice {
                message: message.into(),
            })
        })
    }

    /// Tell every joined session the server is stopping.
    pub fn announce_shutdown(&self) -> BroadcastReport {
        let event = ChatEvent::Shutdown {
            timestamp: Local::now(),
        };
        let report = self.broadcast(&event, None);
        self.chat_log.record(&format::render(&event));
        report
    }

    /// Deregister every session without leave announcements and refuse further
    /// joins. Their write loops drain whatever is queued (e.g. the shutdown
    /// notice) and stop.
    pub fn close_all(&self) -> usize {
        *self.closed.write().unwrap_or_else(PoisonError::into_inner) = true;

        let closed = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|session| self.registry.remove(session.id).is_some())
            .count();

        info!(closed, "closed all sessions");
        closed
    }

    /// Deliver an event to every registered session, optionally skipping one.
    /// Recipients are taken from a snapshot; a failed delivery is logged and the
    /// fan-out carries on with the rest.
    pub fn broadcast(&self, event: &ChatEvent, exclude: Option<SessionId>) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for session in self.registry.snapshot() {
            if Some(session.id) == exclude {
                continue;
            }

            report.attempted += 1;
            if session.send(event.clone()) {
                report.delivered += 1;
            } else {
                warn!(
                    session_id = %session.id,
                    name = %session.name,
                    "failed to send event to session (queue full or write loop closed)"
                );
                self.chat_log
                    .record(&format!("Failed to send message to {}", session.name));
            }
        }

        report
    }

    /// Append a line to the transcript (used by the transport for client errors).
    pub fn record(&self, line: &str) {
        self.chat_log.record(line);
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
