use std::sync::Arc;
use std::time::Duration;

use nimbus::broker::Broker;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Spins up a real broker + TCP listener on an ephemeral port for each
/// test, matching this codebase's existing "spawn a real server, drive
/// it over a real socket" test style rather than mocking the network.
pub struct TestServer {
    pub addr: String,
    _log_dir: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(1000, Duration::from_secs(5), Duration::from_secs(300)).await
    }

    pub async fn start_with(max_backlog: usize, heartbeat_interval: Duration, heartbeat_timeout: Duration) -> Self {
        let log_dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(Broker::new(log_dir.path().to_path_buf(), max_backlog));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(nimbus::server::serve(listener, broker, heartbeat_interval, heartbeat_timeout));

        Self { addr, _log_dir: log_dir }
    }

    pub async fn connect(&self) -> Client {
        let stream = TcpStream::connect(&self.addr).await.unwrap();
        Client { reader: BufReader::new(stream) }
    }
}

pub struct Client {
    reader: BufReader<TcpStream>,
}

impl Client {
    pub async fn send(&mut self, line: &str) {
        self.reader.write_all(line.as_bytes()).await.unwrap();
        if !line.ends_with('\n') {
            self.reader.write_all(b"\n").await.unwrap();
        }
    }

    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await.ok()?;
        if n == 0 {
            return None;
        }
        Some(line)
    }

    pub async fn expect_line(&mut self, expected: &str) {
        let line = self.read_line().await.expect("connection closed unexpectedly");
        assert_eq!(line, expected);
    }
}
