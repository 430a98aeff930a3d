//! Per-vendor register maps.
//!
//! For the register-oriented vendor, each abstract parameter maps to an
//! integer field tuple: a variable-length tuple addresses a read, a fixed
//! four-field tuple prefixes a write. The two card varieties use different
//! register numbers for the same physical quantities (firmware revisions
//! diverged), so they are kept as two explicit, separate tables rather than
//! one table with patches.
//!
//! For the shell-class vendor, parameters map to the labels printed by the
//! firmware's `show` output and to the verbs accepted by its set commands.
//!
//! Addresses are stateless and recomputed per call; nothing here caches
//! across firmware differences.

use crate::error::{HalError, Result};
use crate::params::{AbstractParameter, Direction};

/// Register layout variety of the register-protocol amplifier cards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OmiVariety {
    /// Single-stage card: fixed addressing, no direction field.
    Edfa17,
    /// Two-stage card: gain/tilt/power registers select the stage through
    /// the direction field or a direction-specific register number.
    Edfa35,
}

impl OmiVariety {
    pub fn as_str(&self) -> &'static str {
        match self {
            OmiVariety::Edfa17 => "edfa17",
            OmiVariety::Edfa35 => "edfa35",
        }
    }
}

/// A resolved read address: the field tuple for the read command and
/// whether the returned integer is in tenths of a physical unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadAddress {
    pub fields: Vec<i64>,
    pub tenths: bool,
}

/// A resolved write address: the four-field tuple the value is appended to
/// and whether the value must be scaled to tenths before writing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteAddress {
    pub fields: [i64; 4],
    pub tenths: bool,
}

fn read(fields: &[i64]) -> ReadAddress {
    ReadAddress {
        fields: fields.to_vec(),
        tenths: true,
    }
}

fn write(fields: [i64; 4]) -> WriteAddress {
    WriteAddress {
        fields,
        tenths: true,
    }
}

impl OmiVariety {
    /// Resolve the read address for an abstract parameter.
    ///
    /// `direction` selects the amplification stage on the two-stage card and
    /// is ignored by the single-stage card.
    pub fn read_address(
        &self,
        param: AbstractParameter,
        direction: Direction,
    ) -> Result<ReadAddress> {
        let dir = direction.index();
        match (self, param) {
            // The mode register is shared by both varieties and is the one
            // read that is not in tenths: it returns a bare mode code.
            (_, AbstractParameter::Mode) => Ok(ReadAddress {
                fields: vec![21, 1, 1, 1, 0],
                tenths: false,
            }),
            (_, AbstractParameter::Current1) => Ok(read(&[24, 1, 0])),
            (_, AbstractParameter::Current2) => Ok(read(&[24, 2, 0])),
            (_, AbstractParameter::Attenuation) => Ok(read(&[29, 1, 0])),

            (OmiVariety::Edfa17, AbstractParameter::Gain) => Ok(read(&[30, 1, 0])),
            (OmiVariety::Edfa17, AbstractParameter::Tilt) => Ok(read(&[33, 1, 0])),
            (OmiVariety::Edfa17, AbstractParameter::InputPower) => Ok(read(&[41, 1, 0])),
            (OmiVariety::Edfa17, AbstractParameter::OutputPower) => Ok(read(&[42, 1, 0])),

            (OmiVariety::Edfa35, AbstractParameter::Gain) => Ok(read(&[27, dir, 0])),
            (OmiVariety::Edfa35, AbstractParameter::Tilt) => Ok(read(&[28, dir, 0])),
            (OmiVariety::Edfa35, AbstractParameter::InputPower) => {
                // Input power lives in a different register per stage.
                let reg = match direction {
                    Direction::Side1 => 41,
                    Direction::Side2 => 43,
                };
                Ok(read(&[reg, 1, 0]))
            }
            (OmiVariety::Edfa35, AbstractParameter::OutputPower) => {
                let reg = match direction {
                    Direction::Side1 => 42,
                    Direction::Side2 => 44,
                };
                Ok(read(&[reg, 1, 0]))
            }

            (_, other) => Err(HalError::unsupported(self.as_str(), other.as_str())),
        }
    }

    /// The total signal output power register (composite of both stages).
    pub fn total_signal_output_address(&self) -> ReadAddress {
        read(&[42, 2, 0])
    }

    /// Resolve the write address for an abstract parameter.
    pub fn write_address(
        &self,
        param: AbstractParameter,
        direction: Direction,
    ) -> Result<WriteAddress> {
        let dir = direction.index();
        match (self, param) {
            (_, AbstractParameter::Mode) => Ok(WriteAddress {
                fields: [21, 1, 1, 1],
                tenths: false,
            }),
            (_, AbstractParameter::Current1) => Ok(write([24, 1, 1, 1])),
            (_, AbstractParameter::Current2) => Ok(write([24, 2, 1, 1])),
            (_, AbstractParameter::Attenuation) => Ok(write([29, 1, 1, 1])),
            // Output power is written through the composite register on
            // both varieties.
            (_, AbstractParameter::OutputPower) => Ok(write([42, 2, 1, 1])),

            (OmiVariety::Edfa17, AbstractParameter::Gain) => Ok(write([30, 1, 1, 1])),
            (OmiVariety::Edfa17, AbstractParameter::Tilt) => Ok(write([33, 1, 1, 1])),

            (OmiVariety::Edfa35, AbstractParameter::Gain) => Ok(write([27, dir, 1, 1])),
            (OmiVariety::Edfa35, AbstractParameter::Tilt) => Ok(write([28, dir, 1, 1])),

            (_, other) => Err(HalError::unsupported(self.as_str(), other.as_str())),
        }
    }

    /// The parameters this variety can report, in reading order.
    pub fn readable_parameters(&self) -> &'static [AbstractParameter] {
        &[
            AbstractParameter::Mode,
            AbstractParameter::Gain,
            AbstractParameter::Tilt,
            AbstractParameter::InputPower,
            AbstractParameter::OutputPower,
            AbstractParameter::Attenuation,
            AbstractParameter::Current1,
            AbstractParameter::Current2,
        ]
    }
}

/// Label of a parameter in the shell firmware's measured-state block.
pub fn shell_state_label(param: AbstractParameter) -> Option<&'static str> {
    match param {
        AbstractParameter::Gain => Some("GainValue"),
        AbstractParameter::Tilt => Some("TiltValue"),
        AbstractParameter::InputPower => Some("InputTotalPower"),
        AbstractParameter::OutputPower => Some("OutputTotalPower"),
        AbstractParameter::ServiceState => Some("State"),
        _ => None,
    }
}

/// Label of a parameter in the shell firmware's configuration block.
pub fn shell_config_label(param: AbstractParameter) -> Option<&'static str> {
    match param {
        AbstractParameter::Gain => Some("GainSetPoint"),
        AbstractParameter::Tilt => Some("TiltSetPoint"),
        AbstractParameter::OutputEnabled => Some("OutputEnable"),
        AbstractParameter::GainRange => Some("GainRange"),
        AbstractParameter::Mode => Some("Mode"),
        _ => None,
    }
}

/// Verb accepted by the shell firmware's `edfa <dir> <verb> <value>` command.
pub fn shell_set_verb(param: AbstractParameter) -> Option<&'static str> {
    match param {
        AbstractParameter::Gain => Some("gain"),
        AbstractParameter::Tilt => Some("tilt"),
        AbstractParameter::GainRange => Some("gainrange"),
        AbstractParameter::OutputEnabled => Some("output"),
        _ => None,
    }
}

/// The parameters the shell firmware reports across both blocks.
pub fn shell_readable_parameters() -> &'static [AbstractParameter] {
    &[
        AbstractParameter::Gain,
        AbstractParameter::Tilt,
        AbstractParameter::InputPower,
        AbstractParameter::OutputPower,
        AbstractParameter::ServiceState,
        AbstractParameter::OutputEnabled,
        AbstractParameter::GainRange,
        AbstractParameter::Mode,
    ]
}
