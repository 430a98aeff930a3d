//! Scripted transport for testing drivers without hardware.
//!
//! `MockTransport` plays back canned firmware responses: each `send`
//! records the outgoing frame and moves the next scripted response into the
//! receive buffer, so the framers' drain/recv sequencing is exercised
//! exactly as against a real socket. Stale bytes can be pre-buffered to
//! prove the drain-before-send discipline, and connect/liveness failures
//! can be forced to drive the session recovery paths.
//!
//! Handles are shared (`Clone`), so a test can keep a copy to inspect the
//! sent frames after handing the transport to a driver.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::Transport;
use crate::error::{HalError, Result};

#[derive(Default)]
struct MockState {
    /// Responses queued for future sends, in order.
    responses: VecDeque<Vec<u8>>,
    /// Bytes currently available to `recv`/`drain`.
    pending: Vec<u8>,
    /// Every frame sent through the transport.
    sent: Vec<Vec<u8>>,
}

/// Scripted in-memory transport.
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
    alive: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    fail_connect: Arc<AtomicBool>,
    connect_attempts: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        let transport = Self::default();
        transport.alive.store(true, Ordering::SeqCst);
        transport
    }

    /// Queue a response to be delivered after the next unanswered send.
    pub async fn push_response(&self, response: impl Into<Vec<u8>>) {
        self.state.lock().await.responses.push_back(response.into());
    }

    /// Leave stale bytes in the receive buffer, as a previous exchange
    /// would have.
    pub async fn prebuffer(&self, bytes: impl Into<Vec<u8>>) {
        self.state.lock().await.pending.extend(bytes.into());
    }

    /// Every frame sent so far, lossily decoded for assertions.
    pub async fn sent_frames(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .sent
            .iter()
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .collect()
    }

    pub async fn sent_count(&self) -> usize {
        self.state.lock().await.sent.len()
    }

    /// Flip the liveness probe result.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Make every subsequent connect attempt fail.
    pub fn fail_connects(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(HalError::Connection("mock connect refused".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        self.alive.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(HalError::NotConnected);
        }
        let mut state = self.state.lock().await;
        state.sent.push(bytes.to_vec());
        if let Some(response) = state.responses.pop_front() {
            state.pending.extend(response);
        }
        Ok(())
    }

    async fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(HalError::NotConnected);
        }
        let mut state = self.state.lock().await;
        if state.pending.is_empty() {
            return Err(HalError::Timeout("scripted response".to_string()));
        }
        let take = state.pending.len().min(max_bytes);
        let chunk: Vec<u8> = state.pending.drain(..take).collect();
        Ok(chunk)
    }

    async fn drain(&mut self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let discarded = state.pending.len();
        state.pending.clear();
        Ok(discarded)
    }

    async fn is_alive(&mut self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.alive.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "kind": "mock",
            "connected": self.connected.load(Ordering::SeqCst),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_exchange() {
        let mut transport = MockTransport::new();
        transport.push_response(b"pong".to_vec()).await;
        transport.connect().await.unwrap();

        transport.send(b"ping").await.unwrap();
        assert_eq!(transport.recv(64).await.unwrap(), b"pong");
        assert_eq!(transport.sent_frames().await, vec!["ping".to_string()]);
    }

    #[tokio::test]
    async fn test_drain_clears_prebuffered_bytes() {
        let mut transport = MockTransport::new();
        transport.prebuffer(b"garbage".to_vec()).await;
        transport.connect().await.unwrap();

        assert_eq!(transport.drain().await.unwrap(), 7);
        assert!(matches!(
            transport.recv(64).await,
            Err(HalError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_forced_connect_failure() {
        let mut transport = MockTransport::new();
        transport.fail_connects();
        assert!(matches!(
            transport.connect().await,
            Err(HalError::Connection(_))
        ));
        assert_eq!(transport.connect_attempts(), 1);
    }
}
