use std::fmt::Display;

use chrono::{DateTime, TimeZone};

use super::events::ChatEvent;

/// Timestamp layout used in every broadcast line: `2024-01-15 12:30:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Prompt sent whenever a name is still needed.
pub const NAME_PROMPT: &str = "[ENTER YOUR NAME]: ";

/// Line sent to a connection turned away by the admission gate.
pub const CHAT_FULL: &str = "Chat is full, please try again later.\n";

pub fn timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// [2024-01-15 12:30:00] [alice]: hello
pub fn chat_line<Tz: TimeZone>(at: &DateTime<Tz>, from: &str, content: &str) -> String
where
    Tz::Offset: Display,
{
    format!("[{}] [{}]: {}\n", timestamp(at), from, content)
}

/// [2024-01-15 12:30:00] alice has joined the chat...
pub fn joined_line<Tz: TimeZone>(at: &DateTime<Tz>, name: &str) -> String
where
    Tz::Offset: Display,
{
    format!("[{}] {} has joined the chat...\n", timestamp(at), name)
}

/// [2024-01-15 12:30:00] alice has left the chat...
pub fn left_line<Tz: TimeZone>(at: &DateTime<Tz>, name: &str) -> String
where
    Tz::Offset: Display,
{
    format!("[{}] {} has left the chat...\n", timestamp(at), name)
}

pub fn shutdown_line<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    format!("[{}] Server is shutting down...\n", timestamp(at))
}

/// Render an event as the newline-terminated text written to a peer.
pub fn render(event: &ChatEvent) -> String {
    match event {
        ChatEvent::Message {
            from,
            content,
            timestamp,
        } => chat_line(timestamp, from, content),
        ChatEvent::Joined { name, timestamp } => joined_line(timestamp, name),
        ChatEvent::Left { name, timestamp } => left_line(timestamp, name),
        ChatEvent::Shutdown { timestamp } => shutdown_line(timestamp),
        ChatEvent::ServerNotice { message } => format!("{}\n", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, Utc};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 5, 7).unwrap()
    }

    #[test]
    fn test_timestamp_is_zero_padded() {
        assert_eq!(timestamp(&at()), "2024-01-15 09:05:07");
    }

    #[test]
    fn test_chat_line() {
        assert_eq!(
            chat_line(&at(), "alice", "hello"),
            "[2024-01-15 09:05:07] [alice]: hello\n"
        );
    }

    #[test]
    fn test_join_and_leave_lines() {
        assert_eq!(
            joined_line(&at(), "bob"),
            "[2024-01-15 09:05:07] bob has joined the chat...\n"
        );
        assert_eq!(
            left_line(&at(), "bob"),
            "[2024-01-15 09:05:07] bob has left the chat...\n"
        );
    }

    #[test]
    fn test_render_uses_event_timestamp() {
        let timestamp = Local.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let event = ChatEvent::Message {
            from: "alice".into(),
            content: "hi there".into(),
            timestamp,
        };
        assert_eq!(render(&event), "[2024-01-15 12:00:00] [alice]: hi there\n");

        let event = ChatEvent::Shutdown { timestamp };
        assert_eq!(
            render(&event),
            "[2024-01-15 12:00:00] Server is shutting down...\n"
        );
    }

    #[test]
    fn test_render_notice_appends_newline() {
        let event = ChatEvent::ServerNotice {
            message: "Name cannot be empty".into(),
        };
        assert_eq!(render(&event), "Name cannot be empty\n");
    }
}
