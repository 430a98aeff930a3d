//! Wavelength-selective switch driver for the register-protocol vendor.
//!
//! The switch card shares the shelf's register protocol but adds two
//! surfaces of its own:
//!
//! - an optical channel monitor (OCM) that dumps per-slice powers for a
//!   chosen port, streamed as `ch <slice>,power<tenths>` fragments;
//! - a channel plan: each passband is provisioned by a fixed write
//!   sequence the firmware insists on (off, centre, width, port, VOA mode,
//!   attenuation, VOA mode again, on), with a short delay between writes.
//!
//! The mux and demux halves of the card are distinct register banks.
//!
//! Frequencies are on the 6.25 GHz slice grid anchored at 191.35 THz;
//! passband widths are multiples of 12.5 GHz.

use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::Duration;

use crate::config::Settings;
use crate::device::{ConnectionCredentials, DeviceIdentity};
use crate::error::{HalError, Result};
use crate::params::{AbstractParameter, OperationalTarget, ParamValue, ReadingMap};
use crate::protocol::omi::{self, OmiFramer};
use crate::session::{LoginStyle, Session, SessionState};
use crate::transport::TcpTransport;

use super::LineDevice;

/// Frequency of OCM slice 0, in THz.
const SLICE_BASE_THZ: f64 = 191.35;
/// Slice granularity, in THz (6.25 GHz).
const SLICE_STEP_THZ: f64 = 0.006_25;
/// Channel-centre grid codes accepted by the firmware (191.325–196.125 THz).
const CENTRE_CODE_RANGE: std::ops::RangeInclusive<i64> = 30612..=31380;
/// Passband width codes accepted by the firmware (50–500 GHz).
const WIDTH_CODE_RANGE: std::ops::RangeInclusive<i64> = 4..=40;
/// Terminal slice of an OCM dump; its appearance ends the read.
const OCM_TERMINAL_MARKER: &str = "ch 767";

/// Which half of the switch a command addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WssBank {
    Mux,
    Dmx,
}

impl WssBank {
    fn enable_register(&self) -> i64 {
        match self {
            WssBank::Dmx => 80,
            WssBank::Mux => 82,
        }
    }

    fn centre_register(&self) -> i64 {
        match self {
            WssBank::Dmx => 28,
            WssBank::Mux => 34,
        }
    }

    fn width_register(&self) -> i64 {
        match self {
            WssBank::Dmx => 29,
            WssBank::Mux => 35,
        }
    }

    fn port_register(&self) -> i64 {
        match self {
            WssBank::Dmx => 27,
            WssBank::Mux => 33,
        }
    }

    fn voa_mode_register(&self) -> i64 {
        match self {
            WssBank::Dmx => 26,
            WssBank::Mux => 32,
        }
    }

    fn attenuation_register(&self) -> i64 {
        match self {
            WssBank::Dmx => 30,
            WssBank::Mux => 36,
        }
    }

    /// OCM registers for this bank: demux slots are even, mux slots odd.
    fn ocm_registers(&self) -> Vec<i64> {
        match self {
            WssBank::Dmx => (0..=34).step_by(2).collect(),
            WssBank::Mux => (1..=35).step_by(2).collect(),
        }
    }
}

/// Port selector for OCM reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WssPort {
    /// The common (line) port.
    Com,
    /// A numbered add/drop port, 1-based.
    Port(usize),
}

/// One OCM sweep: per-slice powers with their absolute frequencies.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    pub frequencies_thz: Vec<f64>,
    pub powers_dbm: Vec<f64>,
}

/// A validated passband definition.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelPlan {
    /// Channel index within the bank.
    pub channel: i64,
    /// Centre frequency in THz, on the 6.25 GHz grid.
    pub centre_thz: f64,
    /// Passband width in GHz, a multiple of 12.5 GHz.
    pub width_ghz: f64,
    /// VOA attenuation in dB.
    pub attenuation_db: f64,
    /// Physical port the channel is routed to.
    pub port: i64,
}

/// One wavelength-selective switch card.
pub struct OmiWss {
    identity: DeviceIdentity,
    framer: OmiFramer,
    session: Session,
    inter_write_delay: Duration,
}

impl OmiWss {
    pub fn new(
        identity: DeviceIdentity,
        credentials: ConnectionCredentials,
        settings: &Settings,
    ) -> Self {
        let transport = TcpTransport::new(credentials.host.clone(), credentials.port)
            .with_timeouts(
                settings.transport.connect_timeout,
                settings.transport.read_timeout,
            );
        let session = Session::new(
            Box::new(transport),
            credentials,
            LoginStyle::RawCarriageReturn,
        )
        .with_prompt_timeout(settings.transport.prompt_timeout);

        Self::with_session(identity, session, settings)
    }

    pub fn with_session(identity: DeviceIdentity, session: Session, settings: &Settings) -> Self {
        Self {
            identity,
            framer: OmiFramer::new(&settings.omi),
            session,
            inter_write_delay: settings.omi.inter_write_delay,
        }
    }

    /// Read one OCM sweep for a port of the chosen bank.
    pub async fn read_spectrum(&mut self, port: WssPort, bank: WssBank) -> Result<Spectrum> {
        let registers = bank.ocm_registers();
        let register = match port {
            WssPort::Com => *registers.last().unwrap_or(&0),
            WssPort::Port(n) => *registers.get(n.saturating_sub(1)).ok_or_else(|| {
                HalError::InvalidParameter(format!(
                    "port {n} out of range for {} OCM registers",
                    registers.len()
                ))
            })?,
        };

        self.session.ensure_alive().await?;
        let command = format!("ocm_raw_read {register}\r");
        let dump = self
            .framer
            .read_until_marker(&mut self.session, &command, OCM_TERMINAL_MARKER)
            .await?;

        parse_ocm_dump(&dump)
    }

    /// Provision a channel. Grid and range violations are rejected before
    /// any register is touched.
    pub async fn provision_channel(&mut self, bank: WssBank, plan: &ChannelPlan) -> Result<()> {
        let centre_code = centre_code(plan.centre_thz)?;
        let width_code = width_code(plan.width_ghz)?;

        self.session.ensure_alive().await?;

        // The firmware expects this exact sequence and loses writes issued
        // back-to-back, hence the delay between steps.
        self.write_step(bank.enable_register(), plan.channel, 0).await?;
        self.write_step(bank.centre_register(), plan.channel, centre_code)
            .await?;
        self.write_step(bank.width_register(), plan.channel, width_code)
            .await?;
        self.write_step(bank.port_register(), plan.channel, plan.port)
            .await?;
        // VOA in attenuation mode, so the setpoint is an attenuation, not
        // a power.
        self.write_step(bank.voa_mode_register(), plan.channel, 1).await?;
        self.write_step(
            bank.attenuation_register(),
            plan.channel,
            omi::to_tenths(plan.attenuation_db),
        )
        .await?;
        self.write_step(bank.voa_mode_register(), plan.channel, 1).await?;
        self.write_step(bank.enable_register(), plan.channel, 1).await?;

        info!(
            "{}: channel {} provisioned at {:.5} THz / {} GHz",
            self.identity.uid, plan.channel, plan.centre_thz, plan.width_ghz
        );
        Ok(())
    }

    /// Enable or disable one channel.
    pub async fn set_channel_enabled(
        &mut self,
        bank: WssBank,
        channel: i64,
        enabled: bool,
    ) -> Result<()> {
        self.session.ensure_alive().await?;
        if enabled {
            // Re-arm the VOA mode before unblocking, as the firmware
            // forgets it on disabled channels.
            self.write_step(bank.voa_mode_register(), channel, 1).await?;
        }
        self.write_step(bank.enable_register(), channel, i64::from(enabled))
            .await?;
        debug!(
            "{}: channel {channel} {}",
            self.identity.uid,
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    async fn write_step(&mut self, register: i64, channel: i64, value: i64) -> Result<()> {
        self.framer
            .write_register(&mut self.session, [register, channel, 1, 1], value)
            .await?;
        tokio::time::sleep(self.inter_write_delay).await;
        Ok(())
    }
}

/// Frequency grid code for a channel centre, validated against the
/// firmware's accepted range.
fn centre_code(centre_thz: f64) -> Result<i64> {
    let code = (centre_thz * 1e3 / 6.25).round() as i64;
    if !CENTRE_CODE_RANGE.contains(&code) {
        return Err(HalError::InvalidParameter(format!(
            "channel centre {centre_thz} THz outside 191.325–196.125 THz"
        )));
    }
    Ok(code)
}

/// Width grid code for a passband, validated against the firmware's
/// accepted range.
fn width_code(width_ghz: f64) -> Result<i64> {
    let code = (width_ghz / 12.5).round() as i64;
    if !WIDTH_CODE_RANGE.contains(&code) {
        return Err(HalError::InvalidParameter(format!(
            "channel width {width_ghz} GHz outside 50–500 GHz"
        )));
    }
    Ok(code)
}

/// Parse an accumulated OCM dump into a spectrum.
///
/// Fragments look like `ch 42,power-312`; powers are tenths of dBm. A
/// malformed fragment is fatal unless it is the trailing one, which can be
/// cut short by the terminal-marker read.
fn parse_ocm_dump(dump: &str) -> Result<Spectrum> {
    let mut frequencies_thz = Vec::new();
    let mut powers_dbm = Vec::new();

    let fragments: Vec<&str> = dump.split("ch").skip(1).collect();
    let last = fragments.len().saturating_sub(1);

    for (i, fragment) in fragments.iter().enumerate() {
        match parse_ocm_fragment(fragment) {
            Ok((slice, power)) => {
                frequencies_thz.push(SLICE_BASE_THZ + slice as f64 * SLICE_STEP_THZ);
                powers_dbm.push(power);
            }
            Err(e) if i == last => {
                warn!("discarding truncated OCM fragment: {e}");
            }
            Err(e) => return Err(e),
        }
    }

    if frequencies_thz.is_empty() {
        return Err(HalError::Parse("OCM dump contained no channels".to_string()));
    }
    Ok(Spectrum {
        frequencies_thz,
        powers_dbm,
    })
}

fn parse_ocm_fragment(fragment: &str) -> Result<(i64, f64)> {
    let (slice_text, rest) = fragment.split_once(',').ok_or_else(|| {
        HalError::Parse(format!("OCM fragment {fragment:?} has no separator"))
    })?;
    let slice: i64 = slice_text.trim().parse().map_err(|_| {
        HalError::Parse(format!("OCM slice {slice_text:?} is not an integer"))
    })?;

    let power_text = rest.split_once("power").map(|(_, p)| p).ok_or_else(|| {
        HalError::Parse(format!("OCM fragment {fragment:?} has no power field"))
    })?;
    let tenths: f64 = power_text.trim().parse().map_err(|_| {
        HalError::Parse(format!("OCM power {power_text:?} is not a number"))
    })?;

    Ok((slice, tenths / 10.0))
}

#[async_trait]
impl LineDevice for OmiWss {
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
        match params.first() {
            Some(param) => Err(HalError::unsupported("wss", param.as_str())),
            None => Ok(ReadingMap::new()),
        }
    }

    async fn get_all(&mut self) -> Result<ReadingMap> {
        // The switch exposes spectra and channel plans, not the scalar
        // amplifier vocabulary.
        Ok(ReadingMap::new())
    }

    async fn set(&mut self, assignments: &[(AbstractParameter, ParamValue)]) -> Result<()> {
        match assignments.first() {
            Some((param, _)) => Err(HalError::unsupported("wss", param.as_str())),
            None => Ok(()),
        }
    }

    async fn configure_operational(&mut self, _target: &OperationalTarget) -> Result<()> {
        Err(HalError::unsupported("wss", "configure_operational"))
    }
}
