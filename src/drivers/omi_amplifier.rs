//! EDFA driver for the register-protocol vendor.
//!
//! Covers both card varieties (single-stage and the two-stage,
//! direction-sensitive revision) through their register maps. All
//! engineering-unit conventions live here, not in the protocol layer:
//!
//! - tilt is stored negated on the wire, so both the get and set paths
//!   flip the sign and `set_tilt(x)` round-trips to `get_tilt() == x`;
//! - output power readings can be corrected by a fixed insertion-loss
//!   offset (subtracted on get, added on set);
//! - setpoints keep only their first decimal digit, matching the wire's
//!   tenths encoding.

use async_trait::async_trait;
use log::{info, warn};

use crate::config::Settings;
use crate::device::{ConnectionCredentials, DeviceIdentity};
use crate::error::{HalError, Result};
use crate::params::{
    AbstractParameter, Direction, OperatingMode, OperationalTarget, ParamValue, ReadingMap,
};
use crate::protocol::omi::{self, OmiFramer};
use crate::registers::OmiVariety;
use crate::session::{LoginStyle, Session, SessionState};
use crate::transport::TcpTransport;

use super::{DriverOptions, LineDevice};

/// One EDFA card reached over the register protocol.
pub struct OmiAmplifier {
    identity: DeviceIdentity,
    variety: OmiVariety,
    direction: Direction,
    insertion_loss_db: Option<f64>,
    framer: OmiFramer,
    session: Session,
}

impl OmiAmplifier {
    /// Build a driver with a TCP transport to the card's shelf port.
    pub fn new(
        identity: DeviceIdentity,
        credentials: ConnectionCredentials,
        variety: OmiVariety,
        options: DriverOptions,
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

        Self::with_session(identity, session, variety, options, settings)
    }

    /// Build a driver around an existing session (used with mock
    /// transports in tests).
    pub fn with_session(
        identity: DeviceIdentity,
        session: Session,
        variety: OmiVariety,
        options: DriverOptions,
        settings: &Settings,
    ) -> Self {
        Self {
            identity,
            variety,
            direction: options.direction,
            insertion_loss_db: options.insertion_loss_db,
            framer: OmiFramer::new(&settings.omi),
            session,
        }
    }

    pub fn variety(&self) -> OmiVariety {
        self.variety
    }

    async fn read_raw(&mut self, param: AbstractParameter) -> Result<Vec<u8>> {
        let address = self.variety.read_address(param, self.direction)?;
        self.session.ensure_alive().await?;
        self.framer
            .read_register(&mut self.session, &address.fields)
            .await
    }

    async fn read_scaled(&mut self, param: AbstractParameter) -> Result<f64> {
        let raw = self.read_raw(param).await?;
        omi::parse_tenths(&raw)
    }

    async fn write_scaled(&mut self, param: AbstractParameter, value: f64) -> Result<()> {
        let address = self.variety.write_address(param, self.direction)?;
        self.session.ensure_alive().await?;
        self.framer
            .write_register(&mut self.session, address.fields, omi::to_tenths(value))
            .await
    }

    /// Current operating mode, decoded from the closed mode-code set.
    pub async fn mode(&mut self) -> Result<OperatingMode> {
        let raw = self.read_raw(AbstractParameter::Mode).await?;
        omi::parse_mode(&raw)
    }

    /// Switch operating mode. The mode register takes the bare code, not a
    /// tenths-scaled value.
    pub async fn set_mode(&mut self, mode: OperatingMode) -> Result<()> {
        let address = self
            .variety
            .write_address(AbstractParameter::Mode, self.direction)?;
        self.session.ensure_alive().await?;
        self.framer
            .write_register(&mut self.session, address.fields, mode.code())
            .await
    }

    /// Effective gain in dB.
    pub async fn gain(&mut self) -> Result<f64> {
        self.read_scaled(AbstractParameter::Gain).await
    }

    /// Set the gain setpoint in dB. Only the first decimal digit is kept.
    pub async fn set_gain(&mut self, gain_db: f64) -> Result<()> {
        self.write_scaled(AbstractParameter::Gain, gain_db).await
    }

    /// Amplifier tilt in dB, in the caller's sign convention.
    pub async fn tilt(&mut self) -> Result<f64> {
        // The wire stores the negated tilt.
        Ok(-self.read_scaled(AbstractParameter::Tilt).await?)
    }

    /// Set the tilt setpoint in dB, negating into the wire convention.
    pub async fn set_tilt(&mut self, tilt_db: f64) -> Result<()> {
        self.write_scaled(AbstractParameter::Tilt, -tilt_db).await
    }

    /// Total input power in dBm.
    pub async fn input_power(&mut self) -> Result<f64> {
        self.read_scaled(AbstractParameter::InputPower).await
    }

    /// Total output power in dBm, corrected for the configured insertion
    /// loss if any.
    pub async fn output_power(&mut self) -> Result<f64> {
        let raw = self.read_scaled(AbstractParameter::OutputPower).await?;
        Ok(match self.insertion_loss_db {
            Some(il) => raw - il,
            None => raw,
        })
    }

    /// Set the output power target in dBm, pre-compensating the insertion
    /// loss if configured.
    pub async fn set_output_power(&mut self, power_dbm: f64) -> Result<()> {
        let value = match self.insertion_loss_db {
            Some(il) => power_dbm + il,
            None => power_dbm,
        };
        self.write_scaled(AbstractParameter::OutputPower, value).await
    }

    /// Total signal output power in dBm (composite register).
    pub async fn total_signal_output_power(&mut self) -> Result<f64> {
        let address = self.variety.total_signal_output_address();
        self.session.ensure_alive().await?;
        let raw = self
            .framer
            .read_register(&mut self.session, &address.fields)
            .await?;
        let value = omi::parse_tenths(&raw)?;
        Ok(match self.insertion_loss_db {
            Some(il) => value - il,
            None => value,
        })
    }

    /// VOA attenuation in dB.
    pub async fn attenuation(&mut self) -> Result<f64> {
        self.read_scaled(AbstractParameter::Attenuation).await
    }

    /// Set the VOA attenuation in dB.
    pub async fn set_attenuation(&mut self, attenuation_db: f64) -> Result<()> {
        self.write_scaled(AbstractParameter::Attenuation, attenuation_db)
            .await
    }

    /// Pump currents of both amplification stages in mA.
    pub async fn currents(&mut self) -> Result<(f64, f64)> {
        let current1 = self.read_scaled(AbstractParameter::Current1).await?;
        let current2 = self.read_scaled(AbstractParameter::Current2).await?;
        Ok((current1, current2))
    }

    /// Set both stage pump currents in mA.
    pub async fn set_currents(&mut self, current1_ma: f64, current2_ma: f64) -> Result<()> {
        self.write_scaled(AbstractParameter::Current1, current1_ma)
            .await?;
        self.write_scaled(AbstractParameter::Current2, current2_ma)
            .await
    }

    async fn read_parameter(&mut self, param: AbstractParameter) -> Result<ParamValue> {
        match param {
            AbstractParameter::Mode => Ok(ParamValue::Mode(self.mode().await?)),
            AbstractParameter::Gain => Ok(ParamValue::Float(self.gain().await?)),
            AbstractParameter::Tilt => Ok(ParamValue::Float(self.tilt().await?)),
            AbstractParameter::InputPower => Ok(ParamValue::Float(self.input_power().await?)),
            AbstractParameter::OutputPower => Ok(ParamValue::Float(self.output_power().await?)),
            AbstractParameter::Attenuation => Ok(ParamValue::Float(self.attenuation().await?)),
            AbstractParameter::Current1 => {
                Ok(ParamValue::Float(self.read_scaled(param).await?))
            }
            AbstractParameter::Current2 => {
                Ok(ParamValue::Float(self.read_scaled(param).await?))
            }
            other => Err(HalError::unsupported(self.variety.as_str(), other.as_str())),
        }
    }

    fn numeric(&self, param: AbstractParameter, value: &ParamValue) -> Result<f64> {
        value.as_f64().ok_or_else(|| {
            HalError::InvalidParameter(format!("{param} requires a numeric value, got {value}"))
        })
    }

    async fn write_parameter(
        &mut self,
        param: AbstractParameter,
        value: &ParamValue,
    ) -> Result<()> {
        match param {
            AbstractParameter::Mode => {
                let mode = value.as_mode().ok_or_else(|| {
                    HalError::InvalidParameter(format!("{value} is not an operating mode"))
                })?;
                self.set_mode(mode).await
            }
            AbstractParameter::Gain => {
                let v = self.numeric(param, value)?;
                self.set_gain(v).await
            }
            AbstractParameter::Tilt => {
                let v = self.numeric(param, value)?;
                self.set_tilt(v).await
            }
            AbstractParameter::OutputPower => {
                let v = self.numeric(param, value)?;
                self.set_output_power(v).await
            }
            AbstractParameter::Attenuation => {
                let v = self.numeric(param, value)?;
                self.set_attenuation(v).await
            }
            AbstractParameter::Current1 => {
                let v = self.numeric(param, value)?;
                self.write_scaled(param, v).await
            }
            AbstractParameter::Current2 => {
                let v = self.numeric(param, value)?;
                self.write_scaled(param, v).await
            }
            other => Err(HalError::unsupported(self.variety.as_str(), other.as_str())),
        }
    }
}

#[async_trait]
impl LineDevice for OmiAmplifier {
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
        let mut readings = ReadingMap::new();
        for &param in params {
            let value = self.read_parameter(param).await?;
            readings.insert(param, value);
        }
        Ok(readings)
    }

    async fn get_all(&mut self) -> Result<ReadingMap> {
        self.get(self.variety.readable_parameters()).await
    }

    async fn set(&mut self, assignments: &[(AbstractParameter, ParamValue)]) -> Result<()> {
        for (param, value) in assignments {
            self.write_parameter(*param, value).await?;
        }
        Ok(())
    }

    /// Apply a compound operational target.
    ///
    /// The mode must be committed — and confirmed by reading it back —
    /// before the firmware accepts the dependent setpoints. The sequence is
    /// not atomic: a failure partway through leaves the device partially
    /// configured, and the error says so.
    async fn configure_operational(&mut self, target: &OperationalTarget) -> Result<()> {
        // Resolving the mode validates the target; nothing is written for a
        // conflicting or empty target.
        let mode = target.mode()?;

        self.set_mode(mode).await?;
        let confirmed = self.mode().await?;
        if confirmed != mode {
            warn!(
                "{}: firmware kept mode {confirmed} after {mode} was requested",
                self.identity.uid
            );
            return Err(HalError::ModeNotConfirmed {
                requested: mode.to_string(),
                actual: confirmed.to_string(),
            });
        }

        match mode {
            OperatingMode::ConstantPower => {
                if let Some(pout) = target.pout_target {
                    self.set_output_power(pout).await?;
                }
            }
            OperatingMode::ConstantGain => {
                if let Some(gain) = target.gain_target {
                    self.set_gain(gain).await?;
                }
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
