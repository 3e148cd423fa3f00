//! Feed transport
//!
//! The client speaks newline-delimited JSON over a byte stream. The
//! [`Transport`] trait abstracts the stream so the client state machine can
//! be exercised against an in-memory fake; [`TcpTransport`] is the
//! production implementation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::info;

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout connecting to feed")]
    ConnectTimeout,

    #[error("Not connected")]
    NotConnected,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A line-oriented duplex connection to the feed.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Send one line (the newline is appended here).
    async fn send(&mut self, line: &str) -> Result<(), TransportError>;

    /// Receive the next line. `Ok(None)` means the peer closed the
    /// connection cleanly.
    async fn recv(&mut self) -> Result<Option<String>, TransportError>;

    async fn close(&mut self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;
}

// ============================================================================
// TCP transport
// ============================================================================

/// Connect timeout for the feed endpoint.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Production transport: TCP with keepalive, buffered line reads.
pub struct TcpTransport {
    host: String,
    port: u16,
    stream: Option<BufReader<TcpStream>>,
    /// Bytes of a line received so far, kept across `recv` calls so a
    /// cancelled read never loses data
    partial: Vec<u8>,
}

impl TcpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            stream: None,
            partial: Vec::with_capacity(256),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            return Ok(());
        }

        let addr = format!("{}:{}", self.host, self.port);
        info!(address = %addr, "Connecting to biosignal feed");

        let connect_timeout = tokio::time::Duration::from_secs(CONNECT_TIMEOUT_SECS);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| TransportError::ConnectTimeout)?
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        // Enable TCP keepalive to detect dead connections
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(30))
            .with_interval(std::time::Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);

        self.stream = Some(BufReader::new(stream));
        self.partial.clear();
        info!("Feed connection established");
        Ok(())
    }

    async fn send(&mut self, line: &str) -> Result<(), TransportError> {
        let reader = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
        let stream = reader.get_mut();
        stream.write_all(line.as_bytes()).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;
        Ok(())
    }

    /// Cancel-safe line read. The only await point is `fill_buf`, which
    /// consumes nothing from the stream; bytes are moved into `partial`
    /// synchronously, so a read cancelled by a racing `select!` branch
    /// resumes exactly where it left off.
    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            if let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
                let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }

            let reader = self.stream.as_mut().ok_or(TransportError::NotConnected)?;
            let chunk = reader.fill_buf().await?;
            if chunk.is_empty() {
                // EOF: peer closed; an unterminated trailing fragment is
                // discarded with the connection
                self.stream = None;
                self.partial.clear();
                return Ok(None);
            }
            let taken = chunk.len();
            self.partial.extend_from_slice(chunk);
            reader.consume(taken);
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(ref mut reader) = self.stream {
            let _ = reader.get_mut().shutdown().await;
        }
        self.stream = None;
        info!("Feed connection closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

// ============================================================================
// In-memory transport (for tests and offline development)
// ============================================================================

/// Scripted in-memory transport. Inbound lines are pushed through a channel
/// (or pre-queued); outbound lines are recorded for inspection.
pub struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<Option<String>>,
    queued: VecDeque<Option<String>>,
    sent: Arc<Mutex<Vec<String>>>,
    connected: bool,
    connect_count: Arc<Mutex<u32>>,
}

/// Feeds lines into a [`ChannelTransport`] from test code.
#[derive(Clone)]
pub struct ChannelFeed {
    tx: mpsc::UnboundedSender<Option<String>>,
}

impl ChannelFeed {
    /// Deliver one inbound line.
    pub fn push_line(&self, line: impl Into<String>) {
        let _ = self.tx.send(Some(line.into()));
    }

    /// Simulate the peer closing the connection.
    pub fn push_close(&self) {
        let _ = self.tx.send(None);
    }
}

impl ChannelTransport {
    pub fn new() -> (Self, ChannelFeed) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            inbound: rx,
            queued: VecDeque::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            connected: false,
            connect_count: Arc::new(Mutex::new(0)),
        };
        (transport, ChannelFeed { tx })
    }

    /// Handle to the lines sent so far.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.sent)
    }

    /// Handle to the number of `connect()` calls observed.
    pub fn connect_count(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.connect_count)
    }

    /// Queue a line that `recv` returns before draining the channel.
    pub fn preload_line(&mut self, line: impl Into<String>) {
        self.queued.push_back(Some(line.into()));
    }
}

#[allow(clippy::unwrap_used)]
#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&mut self) -> Result<(), TransportError> {
        *self.connect_count.lock().unwrap() += 1;
        self.connected = true;
        Ok(())
    }

    async fn send(&mut self, line: &str) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        self.sent.lock().unwrap().push(line.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let next = match self.queued.pop_front() {
            Some(item) => Some(item),
            None => self.inbound.recv().await,
        };
        match next {
            Some(Some(line)) => Ok(Some(line)),
            Some(None) | None => {
                self.connected = false;
                Ok(None)
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    /// A read cancelled mid-line (as the coordinator's select loop does on
    /// every session tick) must not lose the partially received sample.
    #[tokio::test]
    async fn test_tcp_recv_keeps_partial_line_across_cancellation() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let line = r#"{"type":"concentration_data","data":{"concentration":25.0,"data_index":7}}"#;

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let (head, tail) = line.as_bytes().split_at(40);
            socket.write_all(head).await.unwrap();
            socket.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            socket.write_all(tail).await.unwrap();
            socket.write_all(b"\n").await.unwrap();
            socket.flush().await.unwrap();
            socket
        });

        let mut transport = TcpTransport::new("127.0.0.1", port);
        transport.connect().await.unwrap();

        // First read is cancelled while only the head has arrived
        let interrupted =
            tokio::time::timeout(Duration::from_millis(50), transport.recv()).await;
        assert!(interrupted.is_err());

        // The retried read still yields the full line
        let received = transport.recv().await.unwrap();
        assert_eq!(received.as_deref(), Some(line));

        let _socket = server.await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_channel_transport_records_sends() {
        let (mut transport, _feed) = ChannelTransport::new();
        transport.connect().await.unwrap();
        transport.send("hello").await.unwrap();
        assert_eq!(*transport.sent().lock().unwrap(), vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn test_channel_transport_close_signal() {
        let (mut transport, feed) = ChannelTransport::new();
        transport.connect().await.unwrap();
        feed.push_line("a");
        feed.push_close();
        assert_eq!(transport.recv().await.unwrap(), Some("a".to_string()));
        assert_eq!(transport.recv().await.unwrap(), None);
        assert!(!transport.is_connected());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (mut transport, _feed) = ChannelTransport::new();
        assert!(transport.send("x").await.is_err());
    }
}
