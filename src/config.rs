//! Settings for protocol timing and transport behavior.
//!
//! The vendor firmwares this crate talks to have hard timing constraints:
//! the register protocol loses commands that arrive before its ~300 ms
//! turnaround window has elapsed, and the credential handshake stalls
//! forever on a dead shelf without a bounded connect timeout. Those
//! constants live here rather than being scattered through the drivers.
//!
//! Settings are loaded from an optional TOML file plus environment
//! variables prefixed with `OLS_HAL_` (e.g. `OLS_HAL_OMI__SETTLE_INTERVAL=400ms`).
//! All durations accept humantime strings ("300ms", "5s").

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{HalError, Result};

/// Top-level settings for the HAL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Transport-level timeouts shared by all vendors.
    #[serde(default)]
    pub transport: TransportSettings,
    /// Register-protocol (socket-style) timing.
    #[serde(default)]
    pub omi: OmiSettings,
    /// Shell-style (SSH interactive) timing.
    #[serde(default)]
    pub shell: ShellSettings,
}

/// Timeouts shared by all transports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Bound on TCP connect and SSH handshake, matching vendor turnaround.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Bound on a single receive waiting for firmware output.
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Bound on waiting for a login or shell prompt.
    #[serde(default = "default_prompt_timeout", with = "humantime_serde")]
    pub prompt_timeout: Duration,
}

/// Timing for the register-oriented socket protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmiSettings {
    /// Mandatory quiet period after every command. The firmware has no
    /// flow control; commands issued inside this window are lost or
    /// corrupted on the wire.
    #[serde(default = "default_settle_interval", with = "humantime_serde")]
    pub settle_interval: Duration,
    /// Maximum bytes consumed per response read.
    #[serde(default = "default_recv_buffer")]
    pub recv_buffer: usize,
    /// Extra delay between the writes of a multi-register sequence
    /// (channel provisioning on the switch cards).
    #[serde(default = "default_inter_write_delay", with = "humantime_serde")]
    pub inter_write_delay: Duration,
}

/// Timing for shell-style vendors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellSettings {
    /// Sleep between polls while waiting for the shell to have output ready.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Maximum bytes consumed per shell read.
    #[serde(default = "default_shell_recv_buffer")]
    pub recv_buffer: usize,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_prompt_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_settle_interval() -> Duration {
    Duration::from_millis(300)
}

fn default_recv_buffer() -> usize {
    4096
}

fn default_inter_write_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(200)
}

fn default_shell_recv_buffer() -> usize {
    8192
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            read_timeout: default_read_timeout(),
            prompt_timeout: default_prompt_timeout(),
        }
    }
}

impl Default for OmiSettings {
    fn default() -> Self {
        Self {
            settle_interval: default_settle_interval(),
            recv_buffer: default_recv_buffer(),
            inter_write_delay: default_inter_write_delay(),
        }
    }
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            recv_buffer: default_shell_recv_buffer(),
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file and `OLS_HAL_` environment
    /// overrides, then validate.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(false));
        }

        let loaded = builder
            .add_source(config::Environment::with_prefix("OLS_HAL").separator("__"))
            .build()?;

        let settings: Settings = loaded.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic validation of values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.omi.settle_interval.is_zero() {
            return Err(HalError::Configuration(
                "omi.settle_interval must be non-zero (firmware turnaround floor)".to_string(),
            ));
        }
        if self.omi.recv_buffer < 64 {
            return Err(HalError::Configuration(format!(
                "omi.recv_buffer of {} is too small to hold a register response",
                self.omi.recv_buffer
            )));
        }
        if self.transport.connect_timeout.is_zero() {
            return Err(HalError::Configuration(
                "transport.connect_timeout must be non-zero".to_string(),
            ));
        }
        if self.shell.poll_interval.is_zero() {
            return Err(HalError::Configuration(
                "shell.poll_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
