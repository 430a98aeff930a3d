//! Device identity and connection credentials.
//!
//! `DeviceIdentity` is created once at configuration time by the external
//! controller and is only ever used to select a register-map/framer pair.
//! `ConnectionCredentials` are owned by the caller and handed over once at
//! session construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Broad device category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Amplifier,
    Osa,
    Switch,
    Voa,
}

impl DeviceClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Amplifier => "amplifier",
            DeviceClass::Osa => "osa",
            DeviceClass::Switch => "switch",
            DeviceClass::Voa => "voa",
        }
    }
}

/// Protocol family of the vendor firmware. This is what actually decides
/// which framer and register map drive the device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Vendor {
    /// Register-oriented command protocol over raw TCP / Telnet.
    OmiClass,
    /// Line-oriented firmware shell reached over SSH.
    ShellClass,
}

impl Vendor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::OmiClass => "omi-class",
            Vendor::ShellClass => "shell-class",
        }
    }
}

/// Hardware variety within a vendor family. Varieties differ in register
/// layout even when they speak the same protocol; they are never merged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variety {
    /// Single-stage EDFA card.
    Edfa17,
    /// Two-stage, direction-sensitive EDFA card.
    Edfa35,
    /// In-line amplifier shelf with a firmware shell.
    Ila,
    /// Wavelength-selective switch card with an optical channel monitor.
    Wss,
}

impl Variety {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variety::Edfa17 => "edfa17",
            Variety::Edfa35 => "edfa35",
            Variety::Ila => "ila",
            Variety::Wss => "wss",
        }
    }
}

/// Wire protocol named in the credentials. `Tl1` is accepted in the
/// vocabulary but no TL1 driver exists; resolution reports it unsupported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Omi,
    Tl1,
    SshShell,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Omi => "omi",
            Protocol::Tl1 => "tl1",
            Protocol::SshShell => "ssh-shell",
        }
    }
}

/// Immutable identity of one network element.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub uid: String,
    pub vendor: Vendor,
    pub device_class: DeviceClass,
    pub variety: Variety,
}

impl DeviceIdentity {
    pub fn new(
        uid: impl Into<String>,
        vendor: Vendor,
        device_class: DeviceClass,
        variety: Variety,
    ) -> Self {
        Self {
            uid: uid.into(),
            vendor,
            device_class,
            variety,
        }
    }

    /// Identity with a generated uid, for elements the topology does not name.
    pub fn anonymous(vendor: Vendor, device_class: DeviceClass, variety: Variety) -> Self {
        Self::new(Uuid::new_v4().to_string(), vendor, device_class, variety)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {} {})",
            self.uid,
            self.vendor.as_str(),
            self.device_class.as_str(),
            self.variety.as_str()
        )
    }
}

/// Connection endpoint and login material for one device.
///
/// Passwords are deliberately excluded from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub protocol: Protocol,
}

impl ConnectionCredentials {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        protocol: Protocol,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            protocol,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ConnectionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("protocol", &self.protocol)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_display() {
        let identity = DeviceIdentity::new(
            "edfa-roadm-a-1",
            Vendor::OmiClass,
            DeviceClass::Amplifier,
            Variety::Edfa35,
        );
        assert_eq!(
            identity.to_string(),
            "edfa-roadm-a-1 (omi-class amplifier edfa35)"
        );
    }

    #[test]
    fn test_anonymous_identities_are_unique() {
        let a = DeviceIdentity::anonymous(Vendor::OmiClass, DeviceClass::Amplifier, Variety::Edfa17);
        let b = DeviceIdentity::anonymous(Vendor::OmiClass, DeviceClass::Amplifier, Variety::Edfa17);
        assert_ne!(a.uid, b.uid);
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds =
            ConnectionCredentials::new("10.0.0.5", 2001, "admin", "hunter2", Protocol::Omi);
        let rendered = format!("{creds:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
