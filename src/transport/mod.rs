//! Byte-stream transports to vendor firmware.
//!
//! A transport owns one raw connection: a TCP socket to a shelf port, or an
//! interactive shell channel over SSH. The protocols carried over these
//! streams have no message framing and no correlation identifiers, so
//! transports expose exactly the primitives the framers need to stay
//! correct: raw `send`/`recv`, an explicit `drain` of stale buffered bytes,
//! and a non-destructive `is_alive` probe.
//!
//! All implementations wrap their blocking handles in `Arc<Mutex<…>>` and
//! run every blocking call on `tokio::task::spawn_blocking`, so transports
//! never stall the shared executor threads.

mod mock;
mod ssh;
mod tcp;

pub use mock::MockTransport;
pub use ssh::SshShellTransport;
pub use tcp::TcpTransport;

use async_trait::async_trait;

use crate::error::Result;

/// Raw byte-stream primitives over one firmware connection.
#[async_trait]
pub trait Transport: Send {
    /// Open the underlying connection. Fails with `Connection` if the host
    /// is unreachable or the handshake exceeds the bounded timeout.
    /// Connect failures are reported to the caller, never retried here.
    async fn connect(&mut self) -> Result<()>;

    /// Send raw bytes.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// One bounded receive of up to `max_bytes`. Returns whatever the
    /// firmware produced within the read timeout; an empty stream that
    /// never produces bytes is a `Timeout`, a peer close is `Connection`.
    async fn recv(&mut self, max_bytes: usize) -> Result<Vec<u8>>;

    /// Discard everything currently buffered on the connection and return
    /// how many bytes were dropped. Stale bytes from a previous exchange
    /// corrupt the next parse unless explicitly discarded.
    async fn drain(&mut self) -> Result<usize>;

    /// Non-destructive liveness probe. A would-block condition means the
    /// peer is connected with nothing pending (alive); a zero-length read
    /// or a reset means the peer is gone. Unexpected I/O errors are logged
    /// and treated as not-alive so the session triggers its reconnect.
    async fn is_alive(&mut self) -> bool;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Endpoint description for logging and diagnostics.
    fn describe(&self) -> serde_json::Value;
}
