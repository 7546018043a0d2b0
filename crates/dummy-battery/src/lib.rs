//! Dummy battery power supply
//!
//! A battery that is always present, full and idle, for hosts whose power
//! management stack expects a battery the hardware does not have. The device
//! attaches to a host registry through [`PowerSupplyRegistry`] and answers
//! property queries from a constant table.
//!
//! # Example
//!
//! ```no_run
//! use dummy_battery::{DummyBattery, LocalRegistry, PowerSupplyProperty};
//! use std::sync::Arc;
//!
//! fn main() -> anyhow::Result<()> {
//!     let registry = Arc::new(LocalRegistry::new());
//!     let battery = DummyBattery::initialize(registry.clone())?;
//!
//!     let capacity = registry.query("battery", PowerSupplyProperty::Capacity)?;
//!     println!("Capacity: {}%", capacity);
//!
//!     battery.teardown();
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod host;
pub mod mock;
pub mod property;
pub mod registry;

pub use device::{BatteryError, DRIVER_NAME, DeviceState, DummyBattery, SUPPLY_NAME};
pub use host::{LocalRegistry, PowerSupplySnapshot, SupplyEvent};
pub use property::{
    BatteryStatus, CapacityLevel, PowerSupplyProperty, PropertyValue, SUPPORTED_PROPERTIES,
    Technology, UnsupportedProperty, get_property, query_raw,
};
pub use registry::{
    DeviceHandle, PowerSupplyDesc, PowerSupplyRegistry, PowerSupplyType, RegistrationHandle,
    RegistryError,
};

/// Battery result type
pub type Result<T> = std::result::Result<T, BatteryError>;
