//! In-line amplifier driver for the shell-style vendor.
//!
//! The shelf carries one EDFA per propagation direction ("ab" and "ba")
//! plus a VOA that the firmware addresses on the *opposite* direction.
//! Everything is scraped from `show` reports and set through verb
//! commands; there is no register addressing and no tenths encoding — the
//! firmware prints real numbers with unit suffixes.
//!
//! Unlike the register-protocol cards, this firmware has no mode write:
//! the operating mode is reported in the configuration block but cannot be
//! switched from the shell. `configure_operational` therefore verifies the
//! reported mode matches the target before applying setpoints, and reports
//! an unsupported transition otherwise — never a silent skip.

use async_trait::async_trait;
use log::{debug, info};
use std::collections::HashMap;

use crate::config::Settings;
use crate::device::{ConnectionCredentials, DeviceIdentity};
use crate::error::{HalError, Result};
use crate::params::{
    AbstractParameter, Direction, OperatingMode, OperationalTarget, ParamValue, ReadingMap,
};
use crate::protocol::shell::{self, ShellFramer};
use crate::registers::{
    shell_config_label, shell_readable_parameters, shell_set_verb, shell_state_label,
};
use crate::session::{LoginStyle, Session, SessionState};
use crate::transport::SshShellTransport;

use super::{DriverOptions, LineDevice};

/// Sentinel splitting the amplifier report into state and config blocks.
const EDFA_SECTION_SENTINEL: &str = "Edfa";
/// Sentinel preceding the VOA report body.
const VOA_SECTION_SENTINEL: &str = "Info";

/// One direction of an in-line amplifier shelf.
pub struct ShellAmplifier {
    identity: DeviceIdentity,
    direction: Direction,
    framer: ShellFramer,
    session: Session,
}

impl ShellAmplifier {
    /// Build a driver with an SSH shell transport.
    ///
    /// `credentials` authenticate the SSH front end; the inner firmware
    /// login pair comes from `options.shell_login` and defaults to the SSH
    /// pair when absent.
    pub fn new(
        identity: DeviceIdentity,
        credentials: ConnectionCredentials,
        options: DriverOptions,
        settings: &Settings,
    ) -> Self {
        let transport = SshShellTransport::new(
            credentials.host.clone(),
            credentials.port,
            credentials.username.clone(),
            credentials.password.clone(),
        )
        .with_timeouts(
            settings.transport.connect_timeout,
            settings.transport.read_timeout,
            settings.shell.poll_interval,
        );

        let (inner_user, inner_password) = options
            .shell_login
            .clone()
            .unwrap_or_else(|| (credentials.username.clone(), credentials.password.clone()));
        let session = Session::new(
            Box::new(transport),
            credentials,
            LoginStyle::inner_shell(inner_user, inner_password),
        )
        .with_prompt_timeout(settings.transport.prompt_timeout);

        Self::with_session(identity, session, options, settings)
    }

    /// Build a driver around an existing session (mock transports in tests).
    pub fn with_session(
        identity: DeviceIdentity,
        session: Session,
        options: DriverOptions,
        settings: &Settings,
    ) -> Self {
        Self {
            identity,
            direction: options.direction,
            framer: ShellFramer::new(&settings.shell),
            session,
        }
    }

    /// Scrape the amplifier report into its measured-state and
    /// configuration blocks.
    pub async fn edfa_info(
        &mut self,
    ) -> Result<(HashMap<String, ParamValue>, HashMap<String, ParamValue>)> {
        self.session.ensure_alive().await?;
        let report = self
            .framer
            .command_paged(
                &mut self.session,
                &format!("show edfa {}", self.direction.index()),
            )
            .await?;

        let sections = shell::split_sections(&report, EDFA_SECTION_SENTINEL);
        if sections.len() < 2 {
            return Err(HalError::Parse(format!(
                "amplifier report has {} section(s), expected state and config",
                sections.len()
            )));
        }

        let state = shell::parse_labeled_block(sections[0]);
        let config = shell::parse_labeled_block(sections[1]);
        debug!(
            "{}: scraped {} state and {} config entries",
            self.identity.uid,
            state.len(),
            config.len()
        );
        Ok((state, config))
    }

    /// The VOA report for this shelf. The VOA sits on the opposite
    /// direction from the amplifier stage.
    pub async fn voa_info(&mut self) -> Result<HashMap<String, ParamValue>> {
        self.session.ensure_alive().await?;
        let report = self
            .framer
            .command(
                &mut self.session,
                &format!("show evoa {}", self.direction.opposite().index()),
            )
            .await?;
        self.session.drain().await?;

        let sections = shell::split_sections(&report, VOA_SECTION_SENTINEL);
        let body = sections.first().ok_or_else(|| {
            HalError::Parse("VOA report has no Info section".to_string())
        })?;
        Ok(shell::parse_labeled_block(body))
    }

    /// Set the VOA attenuation in dB.
    pub async fn set_voa_attenuation(&mut self, attenuation_db: f64) -> Result<()> {
        self.session.ensure_alive().await?;
        self.framer
            .command(
                &mut self.session,
                &format!(
                    "evoa {} {attenuation_db}",
                    self.direction.opposite().index()
                ),
            )
            .await?;
        self.session.drain().await?;
        Ok(())
    }

    /// Reported operating mode, from the configuration block.
    pub async fn mode(&mut self) -> Result<OperatingMode> {
        let (_, config) = self.edfa_info().await?;
        let value = config.get("Mode").ok_or_else(|| {
            HalError::Parse("amplifier report has no Mode entry".to_string())
        })?;
        match value {
            ParamValue::Text(label) => OperatingMode::from_label(label),
            other => Err(HalError::UnrecognizedMode(other.to_string())),
        }
    }

    fn validated_value(
        &self,
        param: AbstractParameter,
        value: &ParamValue,
    ) -> Result<String> {
        match param {
            AbstractParameter::GainRange => {
                let text = match value {
                    ParamValue::Text(text) => text.clone(),
                    other => other.to_string(),
                };
                if text != "high" && text != "low" {
                    return Err(HalError::InvalidParameter(format!(
                        "gain_range must be \"high\" or \"low\", got {text:?}"
                    )));
                }
                Ok(text)
            }
            AbstractParameter::OutputEnabled => {
                let text = match value {
                    ParamValue::Bool(true) => "enable".to_string(),
                    ParamValue::Bool(false) => "disable".to_string(),
                    ParamValue::Text(text) => text.clone(),
                    other => other.to_string(),
                };
                if text != "enable" && text != "disable" {
                    return Err(HalError::InvalidParameter(format!(
                        "output_enabled must be \"enable\" or \"disable\", got {text:?}"
                    )));
                }
                Ok(text)
            }
            _ => value.as_f64().map(|v| v.to_string()).ok_or_else(|| {
                HalError::InvalidParameter(format!(
                    "{param} requires a numeric value, got {value}"
                ))
            }),
        }
    }

    async fn write_verb(&mut self, verb: &str, value: &str) -> Result<()> {
        self.session.ensure_alive().await?;
        self.framer
            .command(
                &mut self.session,
                &format!("edfa {} {verb} {value}", self.direction.index()),
            )
            .await?;
        self.session.drain().await?;
        Ok(())
    }

    /// Set the gain setpoint in dB.
    pub async fn set_gain(&mut self, gain_db: f64) -> Result<()> {
        self.write_verb("gain", &gain_db.to_string()).await
    }

    /// Set the tilt setpoint in dB.
    pub async fn set_tilt(&mut self, tilt_db: f64) -> Result<()> {
        self.write_verb("tilt", &tilt_db.to_string()).await
    }

    fn lookup(
        param: AbstractParameter,
        state: &HashMap<String, ParamValue>,
        config: &HashMap<String, ParamValue>,
    ) -> Option<ParamValue> {
        if let Some(label) = shell_state_label(param) {
            if let Some(value) = state.get(label) {
                return Some(value.clone());
            }
        }
        if let Some(label) = shell_config_label(param) {
            if let Some(value) = config.get(label) {
                return Some(value.clone());
            }
        }
        None
    }
}

#[async_trait]
impl LineDevice for ShellAmplifier {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn session_state(&self) -> SessionState {
        self.session.state()
    }

    async fn login(&mut self) -> Result<()> {
        self.session.login().await
    }

    async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }

    async fn get(&mut self, params: &[AbstractParameter]) -> Result<ReadingMap> {
        let (state, config) = self.edfa_info().await?;
        let mut readings = ReadingMap::new();
        for &param in params {
            if shell_state_label(param).is_none() && shell_config_label(param).is_none() {
                return Err(HalError::unsupported("ila", param.as_str()));
            }
            let value = Self::lookup(param, &state, &config).ok_or_else(|| {
                HalError::Parse(format!("amplifier report has no entry for {param}"))
            })?;
            readings.insert(param, value);
        }
        Ok(readings)
    }

    async fn get_all(&mut self) -> Result<ReadingMap> {
        let (state, config) = self.edfa_info().await?;
        let mut readings = ReadingMap::new();
        for &param in shell_readable_parameters() {
            if let Some(value) = Self::lookup(param, &state, &config) {
                readings.insert(param, value);
            }
        }
        Ok(readings)
    }

    async fn set(&mut self, assignments: &[(AbstractParameter, ParamValue)]) -> Result<()> {
        for (param, value) in assignments {
            let verb = shell_set_verb(*param)
                .ok_or_else(|| HalError::unsupported("ila", param.as_str()))?;
            let rendered = self.validated_value(*param, value)?;
            debug!("{}: setting {param} to {rendered}", self.identity.uid);
            self.write_verb(verb, &rendered).await?;
        }
        Ok(())
    }

    /// Apply a compound operational target.
    ///
    /// The shell cannot switch operating modes, so the reported mode is the
    /// confirmation step: if it does not match the target, the transition
    /// is reported unsupported and no setpoint is written.
    async fn configure_operational(&mut self, target: &OperationalTarget) -> Result<()> {
        let mode = target.mode()?;

        let reported = self.mode().await?;
        if reported != mode {
            return Err(HalError::unsupported(
                "ila",
                format!("mode transition {reported} -> {mode}"),
            ));
        }

        match mode {
            OperatingMode::ConstantGain => {
                if let Some(gain) = target.gain_target {
                    self.set_gain(gain).await?;
                }
            }
            OperatingMode::ConstantPower => {
                // The shelf exposes no output-power verb; a power target on
                // a gain-only shelf must not be silently dropped.
                return Err(HalError::unsupported("ila", "output power target"));
            }
            OperatingMode::ConstantCurrent => {}
        }
        self.set_tilt(target.tilt_target).await?;

        info!(
            "{} configured: mode={mode} tilt={}",
            self.identity.uid, target.tilt_target
        );
        Ok(())
    }
}
