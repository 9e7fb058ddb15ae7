use tokio::sync::mpsc;

use super::events::{ChatEvent, SessionId};

/// Events a session may have queued before further deliveries to it fail.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// A joined session as the engine sees it. The socket itself stays with the
/// connection task; the engine only holds the sending end of its outbound queue.
#[derive(Debug)]
pub struct UserSession {
    pub id: SessionId,
    pub name: String,
    /// Send outbound events to this session's write loop.
    pub outbound: mpsc::Sender<ChatEvent>,
}

impl UserSession {
    pub fn new(id: SessionId, name: String, outbound: mpsc::Sender<ChatEvent>) -> Self {
        Self { id, name, outbound }
    }

    /// Queue an event for this session without waiting. Returns false if the
    /// write loop has stopped or the peer is not keeping up.
    pub fn send(&self, event: ChatEvent) -> bool {
        self.outbound.try_send(event).is_ok()
    }
}
