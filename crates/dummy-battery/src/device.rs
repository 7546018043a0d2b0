//! Dummy battery device
//!
//! Registers a fixed-state battery with the host registry and keeps the
//! single registration handle until teardown.

use crate::property::{
    self, PowerSupplyProperty, PropertyValue, SUPPORTED_PROPERTIES, UnsupportedProperty,
};
use crate::registry::{
    DeviceHandle, PowerSupplyDesc, PowerSupplyRegistry, PowerSupplyType, RegistrationHandle,
    RegistryError,
};
use std::collections::TryReserveError;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Name of the backing device constructed on the host
pub const DRIVER_NAME: &str = "dummy-battery";

/// Name the power supply is published under
pub const SUPPLY_NAME: &str = "battery";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatteryError {
    #[error("Out of memory allocating battery state")]
    OutOfMemory,

    #[error("Backing device unavailable: {0}")]
    DeviceUnavailable(RegistryError),

    #[error("Power supply registration failed: {0}")]
    RegistrationFailed(RegistryError),

    #[error(transparent)]
    UnsupportedProperty(#[from] UnsupportedProperty),
}

/// Registration state of the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unregistered,
    Registered,
}

/// The simulated battery
pub struct DummyBattery {
    registry: Arc<dyn PowerSupplyRegistry>,
    desc: PowerSupplyDesc,
    registration: Mutex<Option<RegistrationHandle>>,
    registration_error: Option<BatteryError>,
}

impl DummyBattery {
    /// Bring the battery up on `registry`.
    ///
    /// Fails only if the record cannot be allocated or the backing device
    /// cannot be constructed. A rejected registration is cleaned up and the
    /// battery is still returned, unregistered; see
    /// [`registration_error`](Self::registration_error).
    pub fn initialize(registry: Arc<dyn PowerSupplyRegistry>) -> crate::Result<Self> {
        let desc = Self::describe()?;

        let device = registry.construct_device(DRIVER_NAME).map_err(|e| {
            tracing::error!("{} device alloc failed: {}", DRIVER_NAME, e);
            BatteryError::DeviceUnavailable(e)
        })?;

        let mut battery = Self {
            registry,
            desc,
            registration: Mutex::new(None),
            registration_error: None,
        };

        // TODO: decide with host owners whether a rejected registration should fail initialize
        if let Err(e) = battery.probe(device) {
            battery.registration_error = Some(e);
        }

        Ok(battery)
    }

    /// Allocate the descriptor the battery owns.
    ///
    /// Best effort: the battery's own buffers are reserved fallibly, the copy
    /// handed to the registry in `probe` is not.
    fn describe() -> crate::Result<PowerSupplyDesc> {
        let mut properties = Vec::new();
        properties
            .try_reserve_exact(SUPPORTED_PROPERTIES.len())
            .map_err(out_of_memory)?;
        properties.extend_from_slice(SUPPORTED_PROPERTIES);

        let mut name = String::new();
        name.try_reserve_exact(SUPPLY_NAME.len())
            .map_err(out_of_memory)?;
        name.push_str(SUPPLY_NAME);

        Ok(PowerSupplyDesc {
            name,
            kind: PowerSupplyType::Battery,
            properties,
            get_property: property::get_property,
        })
    }

    /// Register the power supply on `device`, releasing partial state on failure.
    ///
    /// On success the registry owns the backing device until unregistration.
    fn probe(&self, device: DeviceHandle) -> crate::Result<()> {
        match self.registry.register_power_source(&device, self.desc.clone()) {
            Ok(handle) => {
                *self.handle() = Some(handle);
                tracing::info!("dummy battery power supply registered");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed: power supply register ({})", e);
                self.teardown();
                self.registry.release_device(device);
                Err(BatteryError::RegistrationFailed(e))
            }
        }
    }

    fn handle(&self) -> MutexGuard<'_, Option<RegistrationHandle>> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the registration if one is live. Safe to call repeatedly.
    pub fn teardown(&self) {
        let Some(handle) = self.handle().take() else {
            tracing::debug!("{} has no live registration", SUPPLY_NAME);
            return;
        };

        self.registry.unregister_power_source(handle);
        tracing::info!("dummy battery power supply unregistered");
    }

    /// Answer a property query
    pub fn get_property(&self, property: PowerSupplyProperty) -> crate::Result<PropertyValue> {
        Ok(property::get_property(property)?)
    }

    pub fn state(&self) -> DeviceState {
        if self.handle().is_some() {
            DeviceState::Registered
        } else {
            DeviceState::Unregistered
        }
    }

    pub fn is_registered(&self) -> bool {
        self.state() == DeviceState::Registered
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn kind(&self) -> PowerSupplyType {
        self.desc.kind
    }

    pub fn supported_properties(&self) -> &[PowerSupplyProperty] {
        &self.desc.properties
    }

    /// Registration failure swallowed by [`initialize`](Self::initialize), if any
    pub fn registration_error(&self) -> Option<&BatteryError> {
        self.registration_error.as_ref()
    }
}

fn out_of_memory(e: TryReserveError) -> BatteryError {
    tracing::error!("mem alloc failed: {}", e);
    BatteryError::OutOfMemory
}

impl Drop for DummyBattery {
    fn drop(&mut self) {
        self.teardown();
    }
}
