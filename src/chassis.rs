//! Mainframe (chassis) management commands.
//!
//! The shelf controllers only expose the per-card firmware ports after the
//! chassis debug relay is switched on. That is done over the management
//! Telnet port with a prompted login (`Login:` / `Password:` / `->`) and a
//! single command, after which the management session is logged out again.
//! Card sessions opened afterwards use the raw socket login.

use log::info;

use crate::error::Result;
use crate::session::Session;

/// The `->` prompt printed by the management shell between commands.
const SHELL_PROMPT: &[u8] = b"->";

/// Switch the chassis debug relay on (or off), enabling the per-card
/// firmware ports. The session must use the prompted login style; it is
/// logged out and closed when the command completes.
pub async fn set_debug_relay(session: &mut Session, enabled: bool) -> Result<()> {
    session.login().await?;

    session.read_until(SHELL_PROMPT).await?;
    session
        .send(format!("setTelnetRelay {}\n", i32::from(enabled)).as_bytes())
        .await?;
    session.read_until(SHELL_PROMPT).await?;
    session.send(b"logout\n").await?;
    session.close().await?;

    info!(
        "chassis debug relay {}",
        if enabled { "enabled" } else { "disabled" }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{ConnectionCredentials, Protocol};
    use crate::session::{LoginStyle, SessionState};
    use crate::transport::MockTransport;
    use std::time::Duration;

    #[tokio::test]
    async fn test_relay_command_sequence() {
        let transport = MockTransport::new();
        let handle = transport.clone();
        // Prompted login: username prompt waits in the buffer, the password
        // prompt answers the username, the shell prompt answers the
        // password drain, then one prompt per command.
        handle.prebuffer(b"Login:".to_vec()).await;
        handle.push_response(b"Password:".to_vec()).await;
        handle.push_response(b"\r\n->".to_vec()).await;
        handle.push_response(b"value = 1\r\n->".to_vec()).await;

        let mut session = Session::new(
            Box::new(transport),
            ConnectionCredentials::new("10.0.0.5", 23, "admin", "pw", Protocol::Omi),
            LoginStyle::prompted(),
        )
        .with_prompt_timeout(Duration::from_millis(100));

        set_debug_relay(&mut session, true).await.unwrap();
        assert_eq!(session.state(), SessionState::Closed);

        let frames = handle.sent_frames().await;
        assert_eq!(
            frames,
            vec![
                "admin\r".to_string(),
                "pw\r".to_string(),
                "setTelnetRelay 1\n".to_string(),
                "logout\n".to_string(),
            ]
        );
    }
}
