use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use tracing::warn;

/// Prefix layout for transcript lines: `2024/01/15 12:30:00`.
const RECORD_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Append-only chat transcript. Joins, leaves, chat lines and per-client
/// errors are recorded here, separately from the operational `tracing` log.
pub trait ChatLog: Send + Sync {
    fn record(&self, line: &str);
}

/// Transcript written to a file, truncated when the server starts.
pub struct FileChatLog {
    file: Mutex<File>,
}

impl FileChatLog {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl ChatLog for FileChatLog {
    fn record(&self, line: &str) {
        let entry = format!(
            "{} {}\n",
            Local::now().format(RECORD_TIMESTAMP_FORMAT),
            line.trim_end_matches(['\r', '\n'])
        );

        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = file.write_all(entry.as_bytes()) {
            warn!(error = %e, "failed to write chat log");
        }
    }
}

/// In-memory transcript, for tests and embedding.
#[derive(Default)]
pub struct MemoryChatLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl ChatLog for MemoryChatLog {
    fn record(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.trim_end_matches(['\r', '\n']).to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_file_log_truncates_and_prefixes() {
        let path = std::env::temp_dir().join(format!("tcpchat-{}.log", Uuid::new_v4()));
        std::fs::write(&path, "stale contents\n").unwrap();

        let log = FileChatLog::create(&path).unwrap();
        log.record("Server is starting up...");
        log.record("[2024-01-15 12:00:00] alice has joined the chat...\n");

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(!contents.contains("stale contents"));

        // "YYYY/MM/DD HH:MM:SS " prefix
        assert_eq!(&lines[0][4..5], "/");
        assert_eq!(&lines[0][19..], " Server is starting up...");
        assert!(lines[1].ends_with("alice has joined the chat..."));
    }

    #[test]
    fn test_file_log_open_failure() {
        let path = std::env::temp_dir()
            .join(format!("tcpchat-missing-{}", Uuid::new_v4()))
            .join("chatlog.txt");
        assert!(FileChatLog::create(&path).is_err());
    }

    #[test]
    fn test_memory_log_strips_newlines() {
        let log = MemoryChatLog::new();
        log.record("bob has left the chat...\n");

        assert_eq!(log.lines(), vec!["bob has left the chat...".to_string()]);
        assert!(log.contains("bob has left"));
    }
}
