//! SSH interactive-shell transport for shell-style firmware.
//!
//! Some in-line amplifier shelves hide their firmware shell behind an SSH
//! front end: after password authentication, an interactive channel drops
//! into a line-oriented prompt. Output arrives in unpredictable chunks, so
//! `recv` polls the channel with bounded sleeps until data is ready, the
//! same discipline the socket transports use for their settle windows.
//!
//! The ssh2 handle is blocking; like every other transport here, it lives
//! behind `Arc<Mutex<…>>` with all calls on `spawn_blocking`.

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::json;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::Transport;
use crate::error::{HalError, Result};

struct ShellHandle {
    session: ssh2::Session,
    channel: ssh2::Channel,
}

/// Interactive SSH shell channel to one shelf.
pub struct SshShellTransport {
    host: String,
    port: u16,
    username: String,
    password: String,
    connect_timeout: Duration,
    read_timeout: Duration,
    poll_interval: Duration,
    handle: Option<Arc<Mutex<ShellHandle>>>,
}

impl SshShellTransport {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(200),
            handle: None,
        }
    }

    pub fn with_timeouts(mut self, connect: Duration, read: Duration, poll: Duration) -> Self {
        self.connect_timeout = connect;
        self.read_timeout = read;
        self.poll_interval = poll;
        self
    }

    fn handle(&self) -> Result<Arc<Mutex<ShellHandle>>> {
        self.handle.clone().ok_or(HalError::NotConnected)
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

fn ssh_err(context: &str, e: ssh2::Error) -> HalError {
    HalError::Connection(format!("{context}: {e}"))
}

#[async_trait]
impl Transport for SshShellTransport {
    async fn connect(&mut self) -> Result<()> {
        let addr = self.resolve()?;
        let connect_timeout = self.connect_timeout;
        let username = self.username.clone();
        let password = self.password.clone();

        let handle = tokio::task::spawn_blocking(move || -> Result<ShellHandle> {
            let tcp = TcpStream::connect_timeout(&addr, connect_timeout)
                .map_err(|e| HalError::Connection(format!("{addr}: {e}")))?;

            let mut session = ssh2::Session::new().map_err(|e| ssh_err("session", e))?;
            session.set_timeout(connect_timeout.as_millis() as u32);
            session.set_tcp_stream(tcp);
            session.handshake().map_err(|e| ssh_err("handshake", e))?;
            session
                .userauth_password(&username, &password)
                .map_err(|e| ssh_err("authentication", e))?;

            let mut channel = session
                .channel_session()
                .map_err(|e| ssh_err("channel", e))?;
            channel
                .request_pty("vt100", None, None)
                .map_err(|e| ssh_err("pty", e))?;
            channel.shell().map_err(|e| ssh_err("shell", e))?;

            Ok(ShellHandle { session, channel })
        })
        .await
        .map_err(|e| HalError::Connection(format!("connect task failed: {e}")))??;

        debug!("ssh shell transport connected to {}:{}", self.host, self.port);
        self.handle = Some(Arc::new(Mutex::new(handle)));
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let handle = self.handle()?;
        let payload = bytes.to_vec();

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = handle.blocking_lock();
            guard.session.set_blocking(true);
            guard.channel.write_all(&payload)?;
            guard.channel.flush()?;
            Ok(())
        })
        .await
        .map_err(|e| HalError::Connection(format!("send task failed: {e}")))?
    }

    async fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        let handle = self.handle()?;
        let read_timeout = self.read_timeout;
        let poll_interval = self.poll_interval;

        tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut guard = handle.blocking_lock();
            let deadline = Instant::now() + read_timeout;
            let mut buffer = vec![0u8; max_bytes];

            // The shell produces output in arbitrary chunks; poll with a
            // bounded sleep until something is ready.
            loop {
                guard.session.set_blocking(false);
                match guard.channel.read(&mut buffer) {
                    Ok(0) => {
                        if guard.channel.eof() {
                            return Err(HalError::Connection(
                                "shell channel closed by peer".to_string(),
                            ));
                        }
                    }
                    Ok(n) => {
                        buffer.truncate(n);
                        return Ok(buffer);
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }

                if Instant::now() >= deadline {
                    return Err(HalError::Timeout("shell output".to_string()));
                }
                std::thread::sleep(poll_interval);
            }
        })
        .await
        .map_err(|e| HalError::Connection(format!("recv task failed: {e}")))?
    }

    async fn drain(&mut self) -> Result<usize> {
        let handle = self.handle()?;

        let discarded = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut guard = handle.blocking_lock();
            guard.session.set_blocking(false);
            let mut discarded = 0usize;
            let mut scratch = [0u8; 256];
            loop {
                match guard.channel.read(&mut scratch) {
                    Ok(0) => break,
                    Ok(n) => discarded += n,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                    Err(e) => return Err(e.into()),
                }
            }
            Ok(discarded)
        })
        .await
        .map_err(|e| HalError::Connection(format!("drain task failed: {e}")))??;

        if discarded > 0 {
            debug!("drained {discarded} stale bytes from shell channel");
        }
        Ok(discarded)
    }

    async fn is_alive(&mut self) -> bool {
        let handle = match &self.handle {
            Some(handle) => handle.clone(),
            None => return false,
        };
        let endpoint = format!("{}:{}", self.host, self.port);

        tokio::task::spawn_blocking(move || {
            let guard = handle.blocking_lock();
            // The channel flags EOF once the peer tears the shell down;
            // there is no non-destructive peek on an SSH channel.
            if guard.channel.eof() {
                warn!("shell channel to {endpoint} reached EOF");
                false
            } else {
                true
            }
        })
        .await
        .unwrap_or(false)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(handle) = self.handle.take() {
            let _ = tokio::task::spawn_blocking(move || {
                let mut guard = handle.blocking_lock();
                guard.session.set_blocking(true);
                let _ = guard.channel.close();
                let _ = guard.channel.wait_close();
            })
            .await;
            debug!("ssh shell transport to {}:{} closed", self.host, self.port);
        }
        Ok(())
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "kind": "ssh-shell",
            "host": self.host,
            "port": self.port,
            "username": self.username,
            "connect_timeout_ms": self.connect_timeout.as_millis(),
            "read_timeout_ms": self.read_timeout.as_millis(),
            "connected": self.handle.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_operations_require_connect() {
        let mut transport = SshShellTransport::new("10.0.0.7", 22, "admin", "secret");
        assert!(matches!(
            transport.send(b"show edfa 1\n").await,
            Err(HalError::NotConnected)
        ));
        assert!(!transport.is_alive().await);
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[test]
    fn test_describe_excludes_password() {
        let transport = SshShellTransport::new("10.0.0.7", 22, "admin", "secret");
        let rendered = transport.describe().to_string();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("ssh-shell"));
    }
}
