//! Vendor-neutral hardware abstraction layer for optical line systems.
//!
//! Optical line elements — EDFAs, wavelength-selective switches, VOAs —
//! ship with fragile, undocumented, text-based control protocols over raw
//! TCP, Telnet relays, or SSH shells. This crate hides those behind one
//! vocabulary of abstract parameters (gain, tilt, powers, mode,
//! attenuation) so a controller can drive any supported device the same
//! way.
//!
//! # Architecture Overview
//!
//! ```text
//! Device Facade  →  Register Map  →  Command Framer  →  Transport Session
//!   (drivers)        (registers)       (protocol)         (transport)
//!        ↑                                                     |
//!        └──────────────  Response Parser  ←───────────────────┘
//! ```
//!
//! - [`transport`]: raw byte streams with the primitives fragile protocols
//!   need (explicit drain of stale bytes, non-destructive liveness probe).
//! - [`session`]: connect/login/keepalive/reconnect lifecycle over one
//!   transport handle.
//! - [`protocol`]: per-vendor command framing, settle-interval discipline,
//!   and anchor-based response parsing.
//! - [`registers`]: per-vendor tables from abstract parameters to register
//!   field tuples or shell verbs.
//! - [`drivers`]: the uniform `get`/`set`/`configure_operational` facade
//!   and typed driver resolution.
//! - [`batch`]: multi-device runs with per-device failure reporting.
//!
//! # Concurrency
//!
//! The wire protocols carry no correlation ids, so exchanges on one
//! session are strictly sequential (`&mut self` everywhere). Sessions to
//! different devices are independent; blocking socket and SSH calls run on
//! Tokio's blocking pool, never on the shared executor threads.

pub mod batch;
pub mod chassis;
pub mod config;
pub mod device;
pub mod drivers;
pub mod error;
pub mod params;
pub mod protocol;
pub mod registers;
pub mod session;
pub mod transport;

pub use batch::{configure_batch, read_batch, BatchFailure, BatchReadings, BatchReport};
pub use config::Settings;
pub use device::{ConnectionCredentials, DeviceClass, DeviceIdentity, Protocol, Variety, Vendor};
pub use drivers::{
    ChannelPlan, Driver, DriverOptions, LineDevice, OmiAmplifier, OmiWss, ShellAmplifier,
    Spectrum, WssBank, WssPort,
};
pub use error::{HalError, Result};
pub use params::{
    AbstractParameter, Direction, OperatingMode, OperationalTarget, ParamValue, ReadingDocument,
    ReadingMap,
};
pub use registers::OmiVariety;
pub use session::{LoginStyle, Session, SessionState};
pub use transport::{MockTransport, SshShellTransport, TcpTransport, Transport};
