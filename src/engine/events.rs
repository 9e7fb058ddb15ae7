use chrono::{DateTime, Local};
use uuid::Uuid;

/// Unique identifier for a connected session (one per connection, not per name).
pub type SessionId = Uuid;

/// Protocol-agnostic event that flows from the chat engine to session writers.
/// The transport renders each event into a line with `format::render`.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A chat line sent by a joined session.
    Message {
        from: String,
        content: String,
        timestamp: DateTime<Local>,
    },

    /// A session finished name negotiation.
    Joined {
        name: String,
        timestamp: DateTime<Local>,
    },

    /// A joined session disconnected.
    Left {
        name: String,
        timestamp: DateTime<Local>,
    },

    /// The server is about to stop accepting and close connections.
    Shutdown { timestamp: DateTime<Local> },

    /// Notice directed at a single session (never broadcast).
    ServerNotice { message: String },
}

/// Outcome of one fan-out: how many sessions were tried and how many accepted the event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub attempted: usize,
    pub delivered: usize,
}

impl BroadcastReport {
    pub fn failed(&self) -> usize {
        self.attempted - self.delivered
    }
}
