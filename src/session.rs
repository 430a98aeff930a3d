//! Session lifecycle over one transport.
//!
//! A `Session` owns exactly one transport handle at a time and walks it
//! through `Disconnected → Connecting → Authenticated → Active → Closed`.
//! Replacing the handle on reconnect closes the old one first; handles are
//! never leaked.
//!
//! The credential handshake differs per vendor firmware:
//!
//! - socket-style shelves accept the username and password as raw lines
//!   terminated by a carriage return, with no prompt discipline at all;
//! - Telnet-style mainframes prompt (`Login:` / `Password:`) and drop into
//!   a `->` shell, with arbitrary banner text before each prompt;
//! - shell-style shelves need a second, inner firmware login after the
//!   outer SSH authentication, confirmed by a literal token in the output.
//!
//! Liveness failures detected mid-session trigger exactly one reconnect
//! attempt with the original credentials before surfacing `SessionLost`.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::device::ConnectionCredentials;
use crate::error::{HalError, Result};
use crate::transport::Transport;

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticated,
    Active,
    Closed,
}

/// How credentials are framed for the firmware behind the transport.
#[derive(Clone, Debug)]
pub enum LoginStyle {
    /// Send `username\r` then `password\r` blind, then swallow the banner.
    RawCarriageReturn,
    /// Wait for each prompt token before answering it.
    Prompted {
        username_prompt: String,
        password_prompt: String,
    },
    /// Outer authentication happens in the transport (SSH); afterwards an
    /// inner firmware login must echo `confirmation`.
    InnerShell {
        username: String,
        password: String,
        confirmation: String,
    },
}

impl LoginStyle {
    /// The Telnet-style mainframe prompts.
    pub fn prompted() -> Self {
        LoginStyle::Prompted {
            username_prompt: ":".to_string(),
            password_prompt: "Password".to_string(),
        }
    }

    /// The shell firmware's inner login.
    pub fn inner_shell(username: impl Into<String>, password: impl Into<String>) -> Self {
        LoginStyle::InnerShell {
            username: username.into(),
            password: password.into(),
            confirmation: "Completed!".to_string(),
        }
    }
}

/// One live command/response session with a device.
pub struct Session {
    transport: Box<dyn Transport>,
    credentials: ConnectionCredentials,
    login_style: LoginStyle,
    state: SessionState,
    prompt_timeout: Duration,
    recv_chunk: usize,
}

impl Session {
    pub fn new(
        transport: Box<dyn Transport>,
        credentials: ConnectionCredentials,
        login_style: LoginStyle,
    ) -> Self {
        Self {
            transport,
            credentials,
            login_style,
            state: SessionState::Disconnected,
            prompt_timeout: Duration::from_secs(5),
            recv_chunk: 1024,
        }
    }

    pub fn with_prompt_timeout(mut self, timeout: Duration) -> Self {
        self.prompt_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn credentials(&self) -> &ConnectionCredentials {
        &self.credentials
    }

    /// Connect the transport and run the credential handshake.
    pub async fn login(&mut self) -> Result<()> {
        self.state = SessionState::Connecting;
        if let Err(e) = self.transport.connect().await {
            self.state = SessionState::Disconnected;
            return Err(e);
        }
        debug!("transport up: {}", self.transport.describe());

        if let Err(e) = self.authenticate().await {
            self.state = SessionState::Disconnected;
            let _ = self.transport.close().await;
            return Err(e);
        }

        self.state = SessionState::Active;
        info!("session active on {}", self.credentials.endpoint());
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<()> {
        let username = self.credentials.username.clone();
        let password = self.credentials.password.clone();

        match self.login_style.clone() {
            LoginStyle::RawCarriageReturn => {
                self.transport
                    .send(format!("{username}\r").as_bytes())
                    .await?;
                self.transport
                    .send(format!("{password}\r").as_bytes())
                    .await?;
                // The firmware echoes an uninteresting banner; swallow it if
                // present, but a silent port is not a failure.
                match self.transport.recv(self.recv_chunk).await {
                    Ok(banner) => {
                        debug!("login banner: {:?}", String::from_utf8_lossy(&banner))
                    }
                    Err(HalError::Timeout(_)) => {}
                    Err(e) => return Err(e),
                }
            }
            LoginStyle::Prompted {
                username_prompt,
                password_prompt,
            } => {
                self.read_until(username_prompt.as_bytes()).await?;
                self.transport
                    .send(format!("{username}\r").as_bytes())
                    .await?;
                self.read_until(password_prompt.as_bytes()).await?;
                self.transport
                    .send(format!("{password}\r").as_bytes())
                    .await?;
                // The shell prompt that follows is left buffered for the
                // first command's read-until.
            }
            LoginStyle::InnerShell {
                username,
                password,
                confirmation,
            } => {
                // Outer SSH auth already happened in connect(); clear the
                // greeting before starting the inner login.
                self.transport.drain().await?;
                self.transport.send(b"login\n").await?;
                self.transport
                    .send(format!("{username}\n").as_bytes())
                    .await?;
                self.transport
                    .send(format!("{password}\n").as_bytes())
                    .await?;
                let output = self.read_until(confirmation.as_bytes()).await.map_err(|e| {
                    match e {
                        HalError::Timeout(_) => HalError::Connection(
                            "firmware shell login not confirmed".to_string(),
                        ),
                        other => other,
                    }
                })?;
                debug!(
                    "inner shell login confirmed ({} bytes of output)",
                    output.len()
                );
            }
        }

        self.state = SessionState::Authenticated;
        Ok(())
    }

    /// Accumulate received bytes until `token` appears, within the prompt
    /// timeout. Banner text before the token is tolerated and returned.
    pub async fn read_until(&mut self, token: &[u8]) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.prompt_timeout;
        let mut collected: Vec<u8> = Vec::new();

        loop {
            match self.transport.recv(self.recv_chunk).await {
                Ok(chunk) => collected.extend_from_slice(&chunk),
                Err(HalError::Timeout(_)) => {}
                Err(e) => return Err(e),
            }

            if collected
                .windows(token.len().max(1))
                .any(|window| window == token)
            {
                return Ok(collected);
            }

            if Instant::now() >= deadline {
                return Err(HalError::Timeout(format!(
                    "token {:?}",
                    String::from_utf8_lossy(token)
                )));
            }
        }
    }

    /// Verify the connection is alive, reconnecting once if it is not.
    ///
    /// A second failure is fatal: the caller gets `SessionLost` and the
    /// session drops to `Disconnected`.
    pub async fn ensure_alive(&mut self) -> Result<()> {
        if self.transport.is_alive().await {
            return Ok(());
        }

        warn!(
            "connection to {} lost, attempting reconnect",
            self.credentials.endpoint()
        );
        // The dead handle must be closed, not leaked, before it is replaced.
        let _ = self.transport.close().await;
        self.state = SessionState::Connecting;

        match self.login().await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = SessionState::Disconnected;
                Err(HalError::SessionLost(format!(
                    "{} did not come back after one reconnect: {e}",
                    self.credentials.endpoint()
                )))
            }
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport.send(bytes).await
    }

    pub async fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        self.transport.recv(max_bytes).await
    }

    pub async fn drain(&mut self) -> Result<usize> {
        self.transport.drain().await
    }

    /// Close the transport. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await?;
        self.state = SessionState::Closed;
        Ok(())
    }
}
