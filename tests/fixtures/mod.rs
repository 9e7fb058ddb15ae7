//! Shared helpers for the TCP integration tests: an in-process server bound to
//! an ephemeral port and a line-oriented test client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tcpchat_server::chatlog::MemoryChatLog;
use tcpchat_server::engine::chat_engine::ChatEngine;
use tcpchat_server::server::ChatServer;
use tcpchat_server::tcp::connection::SessionSettings;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const GREETING: &str = "Welcome to TCP-Chat!\n";

const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub engine: Arc<ChatEngine>,
    pub log: Arc<MemoryChatLog>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let settings = SessionSettings {
            greeting: Arc::from(GREETING.as_bytes()),
            ..SessionSettings::default()
        };
        Self::start_with(settings, None).await
    }

    pub async fn start_with(settings: SessionSettings, max_sessions: Option<usize>) -> Self {
        let log = Arc::new(MemoryChatLog::new());
        let engine = Arc::new(ChatEngine::new(log.clone()));

        let server = ChatServer::bind("127.0.0.1:0", engine.clone(), settings, max_sessions)
            .await
            .expect("Failed to bind test server");
        let addr = server.local_addr().expect("Failed to read local address");
        let shutdown = server.shutdown_token();
        let handle = tokio::spawn(server.run());

        Self {
            addr,
            engine,
            log,
            shutdown,
            handle,
        }
    }

    /// Cancel the server and wait until every session task has finished.
    pub async fn stop(self) {
        self.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("Server did not stop in time")
            .expect("Server task panicked");
    }

    /// Poll until the registry holds `expected` sessions.
    pub async fn wait_for_sessions(&self, expected: usize) {
        let engine = self.engine.clone();
        tokio::time::timeout(READ_TIMEOUT, async move {
            while engine.session_count() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "Expected {} sessions, found {}",
                expected,
                self.engine.session_count()
            )
        });
    }
}

pub struct TestClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    /// Connect and consume the greeting.
    pub async fn connect(addr: SocketAddr) -> Self {
        match Self::try_connect(addr).await {
            Ok(client) => client,
            Err(first_line) => panic!("Expected greeting, got {:?}", first_line),
        }
    }

    /// Connect and read the first line. Anything other than the greeting
    /// (e.g. a rejection) is handed back as the error.
    pub async fn try_connect(addr: SocketAddr) -> Result<Self, Option<String>> {
        let stream = TcpStream::connect(addr)
            .await
            .expect("Failed to connect to test server");
        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
        };

        match client.read_line().await {
            Some(line) if line == GREETING => Ok(client),
            other => Err(other),
        }
    }

    /// Connect, send a name, and wait for our own join announcement.
    pub async fn join(addr: SocketAddr, name: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(name).await;
        client
            .expect_line_containing(&format!("{} has joined the chat...", name))
            .await;
        client
    }

    pub async fn send(&mut self, line: &str) {
        self.send_raw(format!("{}\n", line).as_bytes()).await;
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer
            .write_all(bytes)
            .await
            .expect("Failed to write to server");
    }

    /// Next line from the server, `None` on EOF. Panics if nothing arrives in time.
    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = tokio::time::timeout(READ_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("Timed out waiting for a line")
            .expect("Failed to read from server");
        if n == 0 { None } else { Some(line) }
    }

    pub async fn expect_line_containing(&mut self, needle: &str) -> String {
        loop {
            match self.read_line().await {
                Some(line) if line.contains(needle) => return line,
                Some(_) => continue,
                None => panic!("Connection closed while waiting for {:?}", needle),
            }
        }
    }

    /// Read until EOF, returning everything received on the way.
    pub async fn read_to_close(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.read_line().await {
            lines.push(line);
        }
        lines
    }
}
