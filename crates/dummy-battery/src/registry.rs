//! Host registry boundary
//!
//! The device registry the battery attaches to is owned by the host. The core
//! only sees it through [`PowerSupplyRegistry`].

use crate::property::{PowerSupplyProperty, PropertyValue, UnsupportedProperty};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Invalid device name")]
    InvalidName,

    #[error("Unknown device handle")]
    UnknownDevice,

    #[error("Power supply already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid power supply descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("No such power supply: {0}")]
    NoSuchDevice(String),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedProperty),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("Injected failure: {0}")]
    Injected(&'static str),
}

/// Kind of power source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PowerSupplyType {
    Battery,
    #[serde(rename = "UPS")]
    Ups,
    Mains,
    #[serde(rename = "USB")]
    Usb,
}

impl PowerSupplyType {
    /// Get sysfs name
    pub fn as_str(&self) -> &'static str {
        match self {
            PowerSupplyType::Battery => "Battery",
            PowerSupplyType::Ups => "UPS",
            PowerSupplyType::Mains => "Mains",
            PowerSupplyType::Usb => "USB",
        }
    }
}

/// Query callback a power supply hands to the registry
pub type PropertyQuery = fn(PowerSupplyProperty) -> Result<PropertyValue, UnsupportedProperty>;

/// Everything the registry needs to publish a power supply
#[derive(Debug, Clone)]
pub struct PowerSupplyDesc {
    pub name: String,
    pub kind: PowerSupplyType,
    pub properties: Vec<PowerSupplyProperty>,
    pub get_property: PropertyQuery,
}

impl PowerSupplyDesc {
    /// Whether the descriptor lists `property`
    pub fn supports(&self, property: PowerSupplyProperty) -> bool {
        self.properties.contains(&property)
    }
}

/// Backing device constructed by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    id: u64,
    name: String,
}

impl DeviceHandle {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Live power supply registration.
///
/// Move-only: handing it back to
/// [`PowerSupplyRegistry::unregister_power_source`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct RegistrationHandle {
    id: u64,
}

impl RegistrationHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Host device registry
pub trait PowerSupplyRegistry: Send + Sync {
    /// Construct the backing device a power supply attaches to
    fn construct_device(&self, name: &str) -> Result<DeviceHandle, RegistryError>;

    /// Publish a power supply on `device`
    fn register_power_source(
        &self,
        device: &DeviceHandle,
        desc: PowerSupplyDesc,
    ) -> Result<RegistrationHandle, RegistryError>;

    /// Withdraw a power supply. Best effort, never fails.
    ///
    /// The backing device goes with it once no registration refers to it.
    fn unregister_power_source(&self, registration: RegistrationHandle);

    /// Drop a backing device that never got a registration
    fn release_device(&self, device: DeviceHandle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{SUPPORTED_PROPERTIES, get_property};

    #[test]
    fn test_supply_type_str() {
        assert_eq!(PowerSupplyType::Battery.as_str(), "Battery");
        assert_eq!(PowerSupplyType::Ups.as_str(), "UPS");

        for kind in [
            PowerSupplyType::Battery,
            PowerSupplyType::Ups,
            PowerSupplyType::Mains,
            PowerSupplyType::Usb,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn test_desc_supports() {
        let desc = PowerSupplyDesc {
            name: "battery".into(),
            kind: PowerSupplyType::Battery,
            properties: SUPPORTED_PROPERTIES.to_vec(),
            get_property,
        };

        assert!(desc.supports(PowerSupplyProperty::Capacity));
        assert!(!desc.supports(PowerSupplyProperty::Health));
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NoSuchDevice("battery".into());
        assert!(format!("{}", err).contains("No such power supply"));

        let err: RegistryError = UnsupportedProperty { id: 0xffff }.into();
        assert_eq!(format!("{}", err), "Unsupported property: 0xffff");
    }
}
