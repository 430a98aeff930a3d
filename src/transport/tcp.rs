//! TCP transport for socket-style firmware ports.
//!
//! Wraps a blocking `std::net::TcpStream` and provides async I/O using
//! Tokio's blocking task executor, the same way the serial instruments in
//! this codebase's lineage wrap their synchronous port handles. The shelf
//! controllers speak plain text over raw TCP (historically reached through
//! Telnet relays), one firmware port per card slot.

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::json;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::Transport;
use crate::error::{HalError, Result};

/// TCP transport to one firmware port.
#[derive(Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
    stream: Option<Arc<Mutex<TcpStream>>>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            stream: None,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self
    }

    fn handle(&self) -> Result<Arc<Mutex<TcpStream>>> {
        self.stream.clone().ok_or(HalError::NotConnected)
    }

    fn resolve(&self) -> Result<SocketAddr> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| HalError::Connection(format!("{}:{}: {e}", self.host, self.port)))?
            .next()
            .ok_or_else(|| {
                HalError::Connection(format!("{}:{} did not resolve", self.host, self.port))
            })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<()> {
        let addr = self.resolve()?;
        let connect_timeout = self.connect_timeout;
        let read_timeout = self.read_timeout;

        let stream = tokio::task::spawn_blocking(move || -> Result<TcpStream> {
            let stream = TcpStream::connect_timeout(&addr, connect_timeout)
                .map_err(|e| HalError::Connection(format!("{addr}: {e}")))?;
            stream.set_read_timeout(Some(read_timeout))?;
            stream.set_write_timeout(Some(read_timeout))?;
            Ok(stream)
        })
        .await
        .map_err(|e| HalError::Connection(format!("connect task failed: {e}")))??;

        debug!("tcp transport connected to {}:{}", self.host, self.port);
        self.stream = Some(Arc::new(Mutex::new(stream)));
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let handle = self.handle()?;
        let payload = bytes.to_vec();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let guard = handle.blocking_lock();
            let mut stream: &TcpStream = &guard;
            stream.write_all(&payload)?;
            stream.flush()?;
            Ok(())
        })
        .await
        .map_err(|e| HalError::Connection(format!("send task failed: {e}")))?
    }

    async fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let handle = self.handle()?;

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let guard = handle.blocking_lock();
            let mut stream: &TcpStream = &guard;
            let mut buffer = vec![0u8; max_bytes];
            match stream.read(&mut buffer) {
                Ok(0) => Err(HalError::Connection("peer closed the connection".to_string())),
                Ok(n) => {
                    buffer.truncate(n);
                    Ok(buffer)
                }
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    Err(HalError::Timeout("bytes from firmware port".to_string()))
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(|e| HalError::Connection(format!("recv task failed: {e}")))?
    }

    async fn drain(&mut self) -> Result<usize> {
        let handle = self.handle()?;

        let discarded = tokio::task::spawn_blocking(move || -> Result<usize> {
            let guard = handle.blocking_lock();
            let mut stream: &TcpStream = &guard;
            stream.set_nonblocking(true)?;
            let mut discarded = 0usize;
            let mut scratch = [0u8; 256];
            let outcome = loop {
                match stream.read(&mut scratch) {
                    Ok(0) => break Ok(discarded),
                    Ok(n) => discarded += n,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break Ok(discarded),
                    Err(e) => break Err(e.into()),
                }
            };
            stream.set_nonblocking(false)?;
            outcome
        })
        .await
        .map_err(|e| HalError::Connection(format!("drain task failed: {e}")))??;

        if discarded > 0 {
            debug!("drained {discarded} stale bytes from {}:{}", self.host, self.port);
        }
        Ok(discarded)
    }

    async fn is_alive(&mut self) -> bool {
        let handle = match &self.stream {
            Some(handle) => handle.clone(),
            None => return false,
        };
        let endpoint = format!("{}:{}", self.host, self.port);

        let probe = tokio::task::spawn_blocking(move || {
            let guard = handle.blocking_lock();
            let stream: &TcpStream = &guard;
            if stream.set_nonblocking(true).is_err() {
                return false;
            }
            // Peek without removing bytes from the buffer.
            let mut scratch = [0u8; 16];
            let alive = match stream.peek(&mut scratch) {
                Ok(0) => false, // orderly close by the peer
                Ok(_) => true,  // open, data pending
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => true,
                Err(e) if e.kind() == std::io::ErrorKind::ConnectionReset => false,
                Err(e) => {
                    warn!("unexpected error probing {endpoint}: {e}");
                    false
                }
            };
            let _ = stream.set_nonblocking(false);
            alive
        })
        .await;

        probe.unwrap_or(false)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.stream.take() {
            let _ = tokio::task::spawn_blocking(move || {
                let guard = handle.blocking_lock();
                let _ = guard.shutdown(Shutdown::Both);
            })
            .await;
            debug!("tcp transport to {}:{} closed", self.host, self.port);
        }
        Ok(())
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "kind": "tcp",
            "host": self.host,
            "port": self.port,
            "connect_timeout_ms": self.connect_timeout.as_millis(),
            "read_timeout_ms": self.read_timeout.as_millis(),
            "connected": self.stream.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_before_connect() {
        let transport = TcpTransport::new("10.0.0.9", 2002);
        let described = transport.describe();
        assert_eq!(described["kind"], "tcp");
        assert_eq!(described["port"], 2002);
        assert_eq!(described["connected"], false);
    }

    #[tokio::test]
    async fn test_operations_require_connect() {
        let mut transport = TcpTransport::new("10.0.0.9", 2002);
        assert!(matches!(
            transport.send(b"omi_read(21, 1, 1, 1, 0)\r").await,
            Err(HalError::NotConnected)
        ));
        assert!(matches!(
            transport.recv(16).await,
            Err(HalError::NotConnected)
        ));
        assert!(!transport.is_alive().await);
        // Closing a never-opened transport is a no-op.
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        // Reserved TEST-NET-1 address; nothing listens there.
        let mut transport = TcpTransport::new("192.0.2.1", 9)
            .with_timeouts(Duration::from_millis(200), Duration::from_millis(200));
        assert!(matches!(
            transport.connect().await,
            Err(HalError::Connection(_))
        ));
    }
}
