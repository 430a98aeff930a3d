//! Device facades: the uniform get/set surface over the vendor drivers.
//!
//! Callers address every device through [`LineDevice`]; the vendor-specific
//! drivers translate that vocabulary into their own wire protocols. Driver
//! selection is a closed, typed resolution from [`DeviceIdentity`] — there
//! is no dynamic registry, and an identity with no driver is an explicit
//! error, not a lookup miss.

mod omi_amplifier;
mod omi_wss;
mod shell_amplifier;

pub use omi_amplifier::OmiAmplifier;
pub use omi_wss::{ChannelPlan, OmiWss, Spectrum, WssBank, WssPort};
pub use shell_amplifier::ShellAmplifier;

use async_trait::async_trait;

use crate::config::Settings;
use crate::device::{ConnectionCredentials, DeviceClass, DeviceIdentity, Protocol, Variety, Vendor};
use crate::error::{HalError, Result};
use crate::params::{
    AbstractParameter, Direction, OperationalTarget, ParamValue, ReadingDocument, ReadingMap,
};
use crate::registers::OmiVariety;
use crate::session::SessionState;

/// Uniform control surface of one network element.
///
/// One session per device, strictly sequential exchanges: every method
/// takes `&mut self`, so concurrent outstanding commands on one session
/// cannot be expressed. Different devices are independent and may be
/// driven concurrently.
#[async_trait]
pub trait LineDevice: Send {
    fn identity(&self) -> &DeviceIdentity;

    fn session_state(&self) -> SessionState;

    /// Connect and authenticate. Failures are reported, not retried.
    async fn login(&mut self) -> Result<()>;

    /// Release the session. Idempotent.
    async fn close(&mut self) -> Result<()>;

    /// Read the given parameters. An unknown or unsupported parameter is an
    /// error; readings never silently default when an exchange fails.
    async fn get(&mut self, params: &[AbstractParameter]) -> Result<ReadingMap>;

    /// Read every parameter this device supports.
    async fn get_all(&mut self) -> Result<ReadingMap>;

    /// Apply setpoints parameter by parameter, in order.
    async fn set(&mut self, assignments: &[(AbstractParameter, ParamValue)]) -> Result<()>;

    /// Apply a compound operational target (mode transition plus dependent
    /// setpoints, in the order the firmware requires).
    async fn configure_operational(&mut self, target: &OperationalTarget) -> Result<()>;

    /// Timestamped reading of everything the device supports, shaped for
    /// the telemetry sink.
    async fn snapshot(&mut self) -> Result<ReadingDocument> {
        let values = self.get_all().await?;
        Ok(ReadingDocument::new(self.identity().uid.clone(), values))
    }
}

/// Per-deployment driver options that are not part of the device identity.
#[derive(Clone, Debug, Default)]
pub struct DriverOptions {
    /// Stage / propagation direction the driver addresses.
    pub direction: Direction,
    /// Fixed insertion loss between the card and the monitored line, in dB.
    pub insertion_loss_db: Option<f64>,
    /// Inner firmware login for shell-style shelves, when it differs from
    /// the transport credentials.
    pub shell_login: Option<(String, String)>,
}

/// The closed set of drivers, resolved once per device identity.
pub enum Driver {
    OmiAmplifier(OmiAmplifier),
    OmiWss(OmiWss),
    ShellAmplifier(ShellAmplifier),
}

impl Driver {
    /// Resolve the driver for a device.
    ///
    /// The protocol named in the credentials must agree with the vendor
    /// family; combinations with no implementation are reported, never
    /// silently mapped to a default.
    pub fn for_device(
        identity: DeviceIdentity,
        credentials: ConnectionCredentials,
        options: DriverOptions,
        settings: &Settings,
    ) -> Result<Driver> {
        match credentials.protocol {
            Protocol::Omi | Protocol::SshShell => {}
            Protocol::Tl1 => {
                return Err(HalError::unsupported(
                    identity.uid.clone(),
                    "tl1 protocol (no driver implemented)",
                ))
            }
        }

        match (identity.vendor, identity.device_class, identity.variety) {
            (Vendor::OmiClass, DeviceClass::Amplifier, Variety::Edfa17) => Ok(Driver::OmiAmplifier(
                OmiAmplifier::new(identity, credentials, OmiVariety::Edfa17, options, settings),
            )),
            (Vendor::OmiClass, DeviceClass::Amplifier, Variety::Edfa35) => Ok(Driver::OmiAmplifier(
                OmiAmplifier::new(identity, credentials, OmiVariety::Edfa35, options, settings),
            )),
            (Vendor::OmiClass, DeviceClass::Switch, Variety::Wss) => {
                Ok(Driver::OmiWss(OmiWss::new(identity, credentials, settings)))
            }
            (Vendor::ShellClass, DeviceClass::Amplifier, Variety::Ila) => Ok(Driver::ShellAmplifier(
                ShellAmplifier::new(identity, credentials, options, settings),
            )),
            (vendor, device_class, variety) => Err(HalError::unsupported(
                identity.uid.clone(),
                format!(
                    "{} {} {}",
                    vendor.as_str(),
                    device_class.as_str(),
                    variety.as_str()
                ),
            )),
        }
    }

    fn inner(&self) -> &dyn LineDevice {
        match self {
            Driver::OmiAmplifier(driver) => driver,
            Driver::OmiWss(driver) => driver,
            Driver::ShellAmplifier(driver) => driver,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn LineDevice {
        match self {
            Driver::OmiAmplifier(driver) => driver,
            Driver::OmiWss(driver) => driver,
            Driver::ShellAmplifier(driver) => driver,
        }
    }
}

#[async_trait]
impl LineDevice for Driver {
    fn identity(&self) -> &DeviceIdentity {
        self.inner().identity()
    }

    fn session_state(&self) -> SessionState {
        self.inner().session_state()
    }

    async fn login(&mut self) -> Result<()> {
        self.inner_mut().login().await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner_mut().close().await
    }

    async fn get(&mut self, params: &[AbstractParameter]) -> Result<ReadingMap> {
        self.inner_mut().get(params).await
    }

    async fn get_all(&mut self) -> Result<ReadingMap> {
        self.inner_mut().get_all().await
    }

    async fn set(&mut self, assignments: &[(AbstractParameter, ParamValue)]) -> Result<()> {
        self.inner_mut().set(assignments).await
    }

    async fn configure_operational(&mut self, target: &OperationalTarget) -> Result<()> {
        self.inner_mut().configure_operational(target).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(vendor: Vendor, device_class: DeviceClass, variety: Variety) -> DeviceIdentity {
        DeviceIdentity::new("dev-1", vendor, device_class, variety)
    }

    fn credentials(protocol: Protocol) -> ConnectionCredentials {
        ConnectionCredentials::new("10.0.0.5", 2001, "user", "pw", protocol)
    }

    #[test]
    fn test_resolution_covers_known_devices() {
        let settings = Settings::default();

        let driver = Driver::for_device(
            identity(Vendor::OmiClass, DeviceClass::Amplifier, Variety::Edfa35),
            credentials(Protocol::Omi),
            DriverOptions::default(),
            &settings,
        )
        .unwrap();
        assert!(matches!(driver, Driver::OmiAmplifier(_)));

        let driver = Driver::for_device(
            identity(Vendor::OmiClass, DeviceClass::Switch, Variety::Wss),
            credentials(Protocol::Omi),
            DriverOptions::default(),
            &settings,
        )
        .unwrap();
        assert!(matches!(driver, Driver::OmiWss(_)));

        let driver = Driver::for_device(
            identity(Vendor::ShellClass, DeviceClass::Amplifier, Variety::Ila),
            credentials(Protocol::SshShell),
            DriverOptions::default(),
            &settings,
        )
        .unwrap();
        assert!(matches!(driver, Driver::ShellAmplifier(_)));
    }

    #[test]
    fn test_resolution_rejects_unknown_combinations() {
        let settings = Settings::default();
        let result = Driver::for_device(
            identity(Vendor::ShellClass, DeviceClass::Osa, Variety::Wss),
            credentials(Protocol::SshShell),
            DriverOptions::default(),
            &settings,
        );
        assert!(matches!(
            result,
            Err(HalError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn test_resolution_rejects_tl1() {
        let settings = Settings::default();
        let result = Driver::for_device(
            identity(Vendor::OmiClass, DeviceClass::Amplifier, Variety::Edfa17),
            credentials(Protocol::Tl1),
            DriverOptions::default(),
            &settings,
        );
        assert!(matches!(
            result,
            Err(HalError::UnsupportedOperation { .. })
        ));
    }
}
