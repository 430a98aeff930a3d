//! Framing and parsing for the register-oriented command protocol.
//!
//! ## Wire format
//!
//! Reads are `omi_read(f0, f1, …)\r` — fields joined with a comma and a
//! space, because the firmware echoes the command verbatim and downstream
//! anchors match against that echo. Writes are `omi_write(f0,f1,f2,f3,v)\r`.
//! Responses embed the value between the literal anchors `I32-Value is:`
//! and `\n\rCompleted`.
//!
//! ## Timing
//!
//! The firmware needs a ~300 ms quiet period after every command; issuing
//! the next command earlier loses or corrupts it on the real hardware. The
//! protocol also has no message framing or correlation ids, so every
//! exchange drains stale bytes before sending and drains again after
//! reading, guaranteeing the session is quiescent for the next call.
//!
//! ## Numeric encoding
//!
//! Register values are base-10 integers in tenths of a physical unit
//! (dB, dBm, mA); parsing divides by 10. Setpoints are scaled by 10 and
//! truncated toward zero, so only the first decimal digit survives.

use log::debug;
use std::time::Duration;

use crate::config::OmiSettings;
use crate::error::{HalError, Result};
use crate::params::OperatingMode;
use crate::session::Session;

/// Anchor preceding the value in every register read response.
pub const VALUE_ANCHOR: &str = "I32-Value is:";
/// Anchor terminating every register read response.
pub const COMPLETED_ANCHOR: &str = "\n\rCompleted";

/// Frames register commands and runs drain/settle-disciplined exchanges.
#[derive(Clone, Debug)]
pub struct OmiFramer {
    settle_interval: Duration,
    recv_buffer: usize,
}

impl OmiFramer {
    pub fn new(settings: &OmiSettings) -> Self {
        Self {
            settle_interval: settings.settle_interval,
            recv_buffer: settings.recv_buffer,
        }
    }

    /// Render a register read command.
    pub fn encode_read(fields: &[i64]) -> String {
        let joined = fields
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("omi_read({joined})\r")
    }

    /// Render a register write command.
    pub fn encode_write(fields: [i64; 4], value: i64) -> String {
        format!(
            "omi_write({},{},{},{},{value})\r",
            fields[0], fields[1], fields[2], fields[3]
        )
    }

    /// Run one read exchange and return the raw response bytes.
    pub async fn read_register(&self, session: &mut Session, fields: &[i64]) -> Result<Vec<u8>> {
        let command = Self::encode_read(fields);
        debug!("-> {}", command.trim_end());

        // Leftovers from the previous turn would corrupt this parse.
        session.drain().await?;
        session.send(command.as_bytes()).await?;
        tokio::time::sleep(self.settle_interval).await;

        let response = session.recv(self.recv_buffer).await?;
        // Leave nothing behind for the next exchange.
        session.drain().await?;

        debug!("<- {:?}", String::from_utf8_lossy(&response));
        Ok(response)
    }

    /// Run one write exchange. The firmware sends no structured reply;
    /// whatever it prints is discarded after the settle window.
    pub async fn write_register(
        &self,
        session: &mut Session,
        fields: [i64; 4],
        value: i64,
    ) -> Result<()> {
        let command = Self::encode_write(fields, value);
        debug!("-> {}", command.trim_end());

        session.drain().await?;
        session.send(command.as_bytes()).await?;
        tokio::time::sleep(self.settle_interval).await;
        session.drain().await?;
        Ok(())
    }

    /// Send a raw command and accumulate response chunks until `terminal`
    /// appears. Used for the optical channel monitor dumps, which arrive
    /// in many fragments and have no length prefix.
    pub async fn read_until_marker(
        &self,
        session: &mut Session,
        command: &str,
        terminal: &str,
    ) -> Result<String> {
        debug!("-> {}", command.trim_end());

        session.drain().await?;
        session.send(command.as_bytes()).await?;
        tokio::time::sleep(self.settle_interval).await;

        let mut collected = String::new();
        while !collected.contains(terminal) {
            let chunk = session.recv(self.recv_buffer).await.map_err(|e| match e {
                HalError::Timeout(_) => HalError::Timeout(format!(
                    "terminal marker {terminal:?} in monitor dump"
                )),
                other => other,
            })?;
            collected.push_str(&String::from_utf8_lossy(&chunk));
        }
        session.drain().await?;
        Ok(collected)
    }
}

/// Extract the substring strictly between the first `anchor_start` and the
/// first subsequent `anchor_end`.
///
/// Invalid bytes are replaced, never fatal; a missing anchor is fatal,
/// because it means the firmware returned an unexpected or error response.
pub fn extract_value(raw: &[u8], anchor_start: &str, anchor_end: &str) -> Result<String> {
    let text = String::from_utf8_lossy(raw);

    let after_start = text.split_once(anchor_start).map(|(_, rest)| rest).ok_or_else(|| {
        HalError::Parse(format!(
            "anchor {anchor_start:?} not found in response {:?}",
            text.as_ref()
        ))
    })?;

    let value = after_start
        .split_once(anchor_end)
        .map(|(value, _)| value)
        .ok_or_else(|| {
            HalError::Parse(format!(
                "anchor {anchor_end:?} not found in response {:?}",
                text.as_ref()
            ))
        })?;

    Ok(value.to_string())
}

/// Parse a register response as a raw integer.
pub fn parse_integer(raw: &[u8]) -> Result<i64> {
    let value = extract_value(raw, VALUE_ANCHOR, COMPLETED_ANCHOR)?;
    let trimmed = value.trim();
    trimmed.parse::<i64>().map_err(|_| {
        HalError::Parse(format!("register value {trimmed:?} is not an integer"))
    })
}

/// Parse a register response as a physical value in whole units.
///
/// The wire carries tenths; dividing by 10 recovers the first decimal digit.
pub fn parse_tenths(raw: &[u8]) -> Result<f64> {
    Ok(parse_integer(raw)? as f64 / 10.0)
}

/// Parse a mode register response into the closed operating-mode set.
pub fn parse_mode(raw: &[u8]) -> Result<OperatingMode> {
    OperatingMode::from_code(parse_integer(raw)?)
}

/// Scale a physical setpoint to wire tenths, truncating toward zero so only
/// the first decimal digit is kept.
pub fn to_tenths(value: f64) -> i64 {
    (value * 10.0) as i64
}
