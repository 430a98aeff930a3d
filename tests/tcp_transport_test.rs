//! TCP transport tests against a real loopback socket: liveness
//! classification, drain behavior, and the raw login handshake.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::time::Duration;

use ols_hal::{
    ConnectionCredentials, HalError, LoginStyle, Protocol, Session, SessionState, TcpTransport,
    Transport,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn short_timeouts(transport: TcpTransport) -> TcpTransport {
    transport.with_timeouts(Duration::from_millis(500), Duration::from_millis(200))
}

#[tokio::test]
async fn test_liveness_classification() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        peer.write_all(b"banner").unwrap();
        // Hold the connection open until told to drop it.
        let mut scratch = [0u8; 16];
        let _ = peer.read(&mut scratch);
        drop(peer);
    });

    let mut transport = short_timeouts(TcpTransport::new("127.0.0.1", addr.port()));
    transport.connect().await.unwrap();

    // Data pending: alive, and the peek must not consume the banner.
    assert!(transport.is_alive().await);
    assert_eq!(transport.recv(64).await.unwrap(), b"banner");

    // Open with nothing pending (a would-block condition): alive.
    assert!(transport.is_alive().await);

    // Ask the server to drop the connection; a zero-length peek means dead.
    transport.send(b"bye").await.unwrap();
    server.join().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert!(!transport.is_alive().await);

    transport.close().await.unwrap();
    transport.close().await.unwrap();
}

#[tokio::test]
async fn test_drain_discards_pending_bytes() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        peer.write_all(b"stale stale stale").unwrap();
        let mut scratch = [0u8; 16];
        let _ = peer.read(&mut scratch);
        peer.write_all(b"fresh").unwrap();
        let mut scratch = [0u8; 16];
        let _ = peer.read(&mut scratch);
    });

    let mut transport = short_timeouts(TcpTransport::new("127.0.0.1", addr.port()));
    transport.connect().await.unwrap();
    std::thread::sleep(Duration::from_millis(50));

    // Everything buffered before the exchange is discarded.
    assert_eq!(transport.drain().await.unwrap(), 17);

    transport.send(b"go").await.unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(transport.recv(64).await.unwrap(), b"fresh");

    // Nothing pending now: recv runs into its bounded timeout.
    assert!(matches!(
        transport.recv(64).await,
        Err(HalError::Timeout(_))
    ));

    transport.send(b"bye").await.unwrap();
    transport.close().await.unwrap();
    server.join().unwrap();
}

#[tokio::test]
async fn test_raw_login_over_loopback() {
    init_logging();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut peer, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        let mut scratch = [0u8; 64];
        while !received.windows(5).any(|w| w == b"pass\r") {
            let n = peer.read(&mut scratch).unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&scratch[..n]);
        }
        peer.write_all(b"welcome\r\n->").unwrap();
        received
    });

    let transport = short_timeouts(TcpTransport::new("127.0.0.1", addr.port()));
    let mut session = Session::new(
        Box::new(transport),
        ConnectionCredentials::new("127.0.0.1", addr.port(), "user", "pass", Protocol::Omi),
        LoginStyle::RawCarriageReturn,
    )
    .with_prompt_timeout(Duration::from_millis(300));

    session.login().await.unwrap();
    assert_eq!(session.state(), SessionState::Active);
    session.close().await.unwrap();

    let received = server.join().unwrap();
    let text = String::from_utf8_lossy(&received);
    assert!(text.contains("user\r"));
    assert!(text.contains("pass\r"));
}
