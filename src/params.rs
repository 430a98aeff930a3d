//! Vendor-neutral parameter vocabulary.
//!
//! Every caller addresses every device through this fixed set of abstract
//! parameters; the per-vendor register maps translate them into whatever
//! addressing scheme the firmware actually speaks. Engineering units are
//! uniform at this level: dB for gain/tilt/attenuation, dBm for powers,
//! mA for pump currents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{HalError, Result};

/// The closed set of abstract parameters understood by every device facade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractParameter {
    Gain,
    Tilt,
    InputPower,
    OutputPower,
    Mode,
    Attenuation,
    Current1,
    Current2,
    ServiceState,
    OutputEnabled,
    GainRange,
}

impl AbstractParameter {
    /// Every parameter in the vocabulary, in a stable order.
    pub const ALL: [AbstractParameter; 11] = [
        AbstractParameter::Gain,
        AbstractParameter::Tilt,
        AbstractParameter::InputPower,
        AbstractParameter::OutputPower,
        AbstractParameter::Mode,
        AbstractParameter::Attenuation,
        AbstractParameter::Current1,
        AbstractParameter::Current2,
        AbstractParameter::ServiceState,
        AbstractParameter::OutputEnabled,
        AbstractParameter::GainRange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AbstractParameter::Gain => "gain",
            AbstractParameter::Tilt => "tilt",
            AbstractParameter::InputPower => "input_power",
            AbstractParameter::OutputPower => "output_power",
            AbstractParameter::Mode => "mode",
            AbstractParameter::Attenuation => "attenuation",
            AbstractParameter::Current1 => "current1",
            AbstractParameter::Current2 => "current2",
            AbstractParameter::ServiceState => "service_state",
            AbstractParameter::OutputEnabled => "output_enabled",
            AbstractParameter::GainRange => "gain_range",
        }
    }
}

impl fmt::Display for AbstractParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbstractParameter {
    type Err = HalError;

    fn from_str(s: &str) -> Result<Self> {
        AbstractParameter::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| HalError::InvalidParameter(format!("unknown parameter {s:?}")))
    }
}

/// Which physical stage or propagation direction a parameter applies to.
///
/// Two-stage amplifier cards expose most registers per stage; in-line
/// amplifier shelves name the directions "ab" and "ba".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Side1,
    Side2,
}

impl Direction {
    /// The wire encoding used in register field tuples and shell commands.
    pub fn index(&self) -> i64 {
        match self {
            Direction::Side1 => 1,
            Direction::Side2 => 2,
        }
    }

    /// The other side. The co-located VOA on in-line shelves is addressed
    /// on the opposite direction from the amplifier stage.
    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Side1 => Direction::Side2,
            Direction::Side2 => Direction::Side1,
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::Side1
    }
}

impl TryFrom<i64> for Direction {
    type Error = HalError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            1 => Ok(Direction::Side1),
            2 => Ok(Direction::Side2),
            other => Err(HalError::InvalidParameter(format!(
                "direction must be 1 or 2, got {other}"
            ))),
        }
    }
}

impl FromStr for Direction {
    type Err = HalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ab" | "1" => Ok(Direction::Side1),
            "ba" | "2" => Ok(Direction::Side2),
            other => Err(HalError::InvalidParameter(format!(
                "direction must be \"ab\" or \"ba\", got {other:?}"
            ))),
        }
    }
}

/// Amplifier operating mode. Modes are mutually exclusive and device-wide;
/// transitions happen only through an explicit mode write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatingMode {
    ConstantCurrent,
    ConstantPower,
    ConstantGain,
}

impl OperatingMode {
    /// Decode the firmware's mode register code. The set is closed: any
    /// code outside {0, 1, 2} is an error, never a fallback value.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(OperatingMode::ConstantCurrent),
            1 => Ok(OperatingMode::ConstantPower),
            2 => Ok(OperatingMode::ConstantGain),
            other => Err(HalError::UnrecognizedMode(other.to_string())),
        }
    }

    /// The mode register code written on the wire.
    pub fn code(&self) -> i64 {
        match self {
            OperatingMode::ConstantCurrent => 0,
            OperatingMode::ConstantPower => 1,
            OperatingMode::ConstantGain => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::ConstantCurrent => "constant_current",
            OperatingMode::ConstantPower => "constant_power",
            OperatingMode::ConstantGain => "constant_gain",
        }
    }

    /// Lenient decode of the textual mode labels shell firmware prints
    /// (e.g. "ConstantGain", "constant-power").
    pub fn from_label(label: &str) -> Result<Self> {
        let lowered = label.to_ascii_lowercase();
        if lowered.contains("gain") {
            Ok(OperatingMode::ConstantGain)
        } else if lowered.contains("power") {
            Ok(OperatingMode::ConstantPower)
        } else if lowered.contains("current") {
            Ok(OperatingMode::ConstantCurrent)
        } else {
            Err(HalError::UnrecognizedMode(label.to_string()))
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed reading or setpoint value.
///
/// Register-protocol vendors only ever produce floats and mode codes;
/// shell-style vendors also print booleans, bare labels, and numbers with
/// unit suffixes, which are preserved as `Quantity`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Mode(OperatingMode),
    Bool(bool),
    Quantity { value: f64, unit: String },
    Text(String),
}

impl ParamValue {
    /// Extract the numeric value, ignoring any unit annotation.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Quantity { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn as_mode(&self) -> Option<OperatingMode> {
        match self {
            ParamValue::Mode(m) => Some(*m),
            ParamValue::Text(s) => OperatingMode::from_label(s).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Mode(m) => write!(f, "{m}"),
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Quantity { value, unit } => write!(f, "{value}{unit}"),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<OperatingMode> for ParamValue {
    fn from(value: OperatingMode) -> Self {
        ParamValue::Mode(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Map of abstract parameters to physical values, as returned by `get`.
pub type ReadingMap = HashMap<AbstractParameter, ParamValue>;

/// A timestamped reading set, shaped for the external telemetry sink.
#[derive(Clone, Debug, Serialize)]
pub struct ReadingDocument {
    pub device_uid: String,
    pub timestamp: DateTime<Utc>,
    pub values: ReadingMap,
}

impl ReadingDocument {
    pub fn new(device_uid: impl Into<String>, values: ReadingMap) -> Self {
        Self {
            device_uid: device_uid.into(),
            timestamp: Utc::now(),
            values,
        }
    }
}

/// The compound operational target applied by `configure_operational`.
///
/// Exactly one of `pout_target` / `gain_target` must be present; the mode
/// transition is derived from which one it is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationalTarget {
    /// Output power target in dBm (constant-power operation).
    #[serde(default)]
    pub pout_target: Option<f64>,
    /// Gain target in dB (constant-gain operation).
    #[serde(default)]
    pub gain_target: Option<f64>,
    /// Tilt target in dB, applied after the mode-dependent setpoint.
    pub tilt_target: f64,
}

impl OperationalTarget {
    pub fn constant_power(pout_target: f64, tilt_target: f64) -> Self {
        Self {
            pout_target: Some(pout_target),
            gain_target: None,
            tilt_target,
        }
    }

    pub fn constant_gain(gain_target: f64, tilt_target: f64) -> Self {
        Self {
            pout_target: None,
            gain_target: Some(gain_target),
            tilt_target,
        }
    }

    /// The operating mode this target requires. Both targets present is a
    /// caller error; neither present is a malformed target, reported rather
    /// than silently accepted.
    pub fn mode(&self) -> Result<OperatingMode> {
        match (self.pout_target, self.gain_target) {
            (Some(_), Some(_)) => Err(HalError::ConflictingTargets(
                "operational target has both pout_target and gain_target".to_string(),
            )),
            (Some(_), None) => Ok(OperatingMode::ConstantPower),
            (None, Some(_)) => Ok(OperatingMode::ConstantGain),
            (None, None) => Err(HalError::InvalidParameter(
                "operational target has neither pout_target nor gain_target".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_code_closure() {
        assert_eq!(
            OperatingMode::from_code(0).unwrap(),
            OperatingMode::ConstantCurrent
        );
        assert_eq!(
            OperatingMode::from_code(1).unwrap(),
            OperatingMode::ConstantPower
        );
        assert_eq!(
            OperatingMode::from_code(2).unwrap(),
            OperatingMode::ConstantGain
        );
        assert!(matches!(
            OperatingMode::from_code(3),
            Err(HalError::UnrecognizedMode(_))
        ));
        assert!(matches!(
            OperatingMode::from_code(-1),
            Err(HalError::UnrecognizedMode(_))
        ));
    }

    #[test]
    fn test_mode_code_roundtrip() {
        for mode in [
            OperatingMode::ConstantCurrent,
            OperatingMode::ConstantPower,
            OperatingMode::ConstantGain,
        ] {
            assert_eq!(OperatingMode::from_code(mode.code()).unwrap(), mode);
        }
    }

    #[test]
    fn test_mode_from_label() {
        assert_eq!(
            OperatingMode::from_label("ConstantGain").unwrap(),
            OperatingMode::ConstantGain
        );
        assert!(matches!(
            OperatingMode::from_label("Standby"),
            Err(HalError::UnrecognizedMode(_))
        ));
    }

    #[test]
    fn test_parameter_name_roundtrip() {
        for param in AbstractParameter::ALL {
            assert_eq!(param.as_str().parse::<AbstractParameter>().unwrap(), param);
        }
        assert!("wavelength".parse::<AbstractParameter>().is_err());
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("ab".parse::<Direction>().unwrap(), Direction::Side1);
        assert_eq!("ba".parse::<Direction>().unwrap(), Direction::Side2);
        assert!("bb".parse::<Direction>().is_err());
        assert_eq!(Direction::Side1.opposite(), Direction::Side2);
        assert_eq!(Direction::try_from(2).unwrap(), Direction::Side2);
        assert!(Direction::try_from(3).is_err());
    }

    #[test]
    fn test_target_mode_resolution() {
        let target = OperationalTarget::constant_power(3.0, 0.5);
        assert_eq!(target.mode().unwrap(), OperatingMode::ConstantPower);

        let target = OperationalTarget::constant_gain(17.0, -0.5);
        assert_eq!(target.mode().unwrap(), OperatingMode::ConstantGain);

        let both = OperationalTarget {
            pout_target: Some(5.0),
            gain_target: Some(10.0),
            tilt_target: 0.0,
        };
        assert!(matches!(
            both.mode(),
            Err(HalError::ConflictingTargets(_))
        ));

        let neither = OperationalTarget {
            pout_target: None,
            gain_target: None,
            tilt_target: 0.0,
        };
        assert!(matches!(
            neither.mode(),
            Err(HalError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_param_value_accessors() {
        assert_eq!(ParamValue::Float(27.5).as_f64(), Some(27.5));
        assert_eq!(
            ParamValue::Quantity {
                value: -3.2,
                unit: "dBm".to_string()
            }
            .as_f64(),
            Some(-3.2)
        );
        assert_eq!(ParamValue::Text("x".to_string()).as_f64(), None);
        assert_eq!(
            ParamValue::Text("ConstantPower".to_string()).as_mode(),
            Some(OperatingMode::ConstantPower)
        );
    }
}
