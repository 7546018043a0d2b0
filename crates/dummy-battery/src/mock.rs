//! Mock registry for testing without a host
//!
//! Wraps a [`LocalRegistry`] with failure injection and call accounting so
//! tests can drive every lifecycle path and check that no registration
//! handle is leaked.
//!
//! # Usage
//!
//! ```no_run
//! use dummy_battery::DummyBattery;
//! use dummy_battery::mock::MockRegistry;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(MockRegistry::new());
//! registry.fail_register(true);
//!
//! let battery = DummyBattery::initialize(registry.clone()).unwrap();
//! assert!(!battery.is_registered());
//! assert_eq!(registry.leaked_handles(), 0);
//! ```

use crate::host::LocalRegistry;
use crate::property::{PowerSupplyProperty, PropertyValue};
use crate::registry::{
    DeviceHandle, PowerSupplyDesc, PowerSupplyRegistry, RegistrationHandle, RegistryError,
};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Injected failures and call counters
#[derive(Debug, Default, Clone)]
pub struct MockState {
    pub fail_construct: bool,
    pub fail_register: bool,
    pub construct_calls: usize,
    pub register_calls: usize,
    pub unregister_calls: usize,
    pub release_calls: usize,
    /// Registrations handed out and not yet returned
    pub outstanding: Vec<u64>,
}

/// Fault-injecting registry
pub struct MockRegistry {
    inner: LocalRegistry,
    state: RwLock<MockState>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self {
            inner: LocalRegistry::new(),
            state: RwLock::new(MockState::default()),
        }
    }

    // Accounting must survive a panicking test thread
    fn read(&self) -> RwLockReadGuard<'_, MockState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MockState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next device constructions fail
    pub fn fail_construct(&self, fail: bool) {
        self.write().fail_construct = fail;
    }

    /// Make the next power supply registrations fail
    pub fn fail_register(&self, fail: bool) {
        self.write().fail_register = fail;
    }

    /// Copy of the current counters
    pub fn state(&self) -> MockState {
        self.read().clone()
    }

    /// Handles handed out by this mock that were never released
    pub fn leaked_handles(&self) -> usize {
        self.read().outstanding.len()
    }

    pub fn device_count(&self) -> usize {
        self.inner.device_count()
    }

    pub fn live_registrations(&self) -> usize {
        self.inner.live_registrations()
    }

    /// The wrapped registry, for queries
    pub fn host(&self) -> &LocalRegistry {
        &self.inner
    }

    pub fn query(
        &self,
        name: &str,
        property: PowerSupplyProperty,
    ) -> Result<PropertyValue, RegistryError> {
        self.inner.query(name, property)
    }

    pub fn query_raw(&self, name: &str, id: u32) -> Result<PropertyValue, RegistryError> {
        self.inner.query_raw(name, id)
    }
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSupplyRegistry for MockRegistry {
    fn construct_device(&self, name: &str) -> Result<DeviceHandle, RegistryError> {
        let fail = {
            let mut state = self.write();
            state.construct_calls += 1;
            state.fail_construct
        };

        if fail {
            tracing::debug!("[MOCK] Failing construction of {}", name);
            return Err(RegistryError::Injected("construct_device"));
        }

        self.inner.construct_device(name)
    }

    fn register_power_source(
        &self,
        device: &DeviceHandle,
        desc: PowerSupplyDesc,
    ) -> Result<RegistrationHandle, RegistryError> {
        let fail = {
            let mut state = self.write();
            state.register_calls += 1;
            state.fail_register
        };

        if fail {
            tracing::debug!("[MOCK] Failing registration of {}", desc.name);
            return Err(RegistryError::Injected("register_power_source"));
        }

        let handle = self.inner.register_power_source(device, desc)?;
        self.write().outstanding.push(handle.id());
        Ok(handle)
    }

    fn unregister_power_source(&self, registration: RegistrationHandle) {
        {
            let mut state = self.write();
            state.unregister_calls += 1;
            state.outstanding.retain(|id| *id != registration.id());
        }
        tracing::debug!("[MOCK] Unregistering {}", registration.id());
        self.inner.unregister_power_source(registration);
    }

    fn release_device(&self, device: DeviceHandle) {
        self.write().release_calls += 1;
        tracing::debug!("[MOCK] Releasing device {}", device.id());
        self.inner.release_device(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{SUPPORTED_PROPERTIES, get_property};
    use crate::registry::PowerSupplyType;

    fn battery_desc() -> PowerSupplyDesc {
        PowerSupplyDesc {
            name: "battery".into(),
            kind: PowerSupplyType::Battery,
            properties: SUPPORTED_PROPERTIES.to_vec(),
            get_property,
        }
    }

    #[test]
    fn test_mock_counts_and_tracks_handles() {
        let mock = MockRegistry::new();
        let device = mock.construct_device("dummy-battery").unwrap();
        let handle = mock.register_power_source(&device, battery_desc()).unwrap();

        assert_eq!(mock.leaked_handles(), 1);
        assert_eq!(
            mock.query("battery", PowerSupplyProperty::Present),
            Ok(PropertyValue::Bool(true))
        );

        mock.unregister_power_source(handle);
        let state = mock.state();
        assert_eq!(state.construct_calls, 1);
        assert_eq!(state.register_calls, 1);
        assert_eq!(state.unregister_calls, 1);
        assert_eq!(mock.leaked_handles(), 0);
        assert_eq!(mock.live_registrations(), 0);
    }

    #[test]
    fn test_mock_injected_failures() {
        let mock = MockRegistry::new();

        mock.fail_construct(true);
        assert_eq!(
            mock.construct_device("dummy-battery"),
            Err(RegistryError::Injected("construct_device"))
        );

        mock.fail_construct(false);
        mock.fail_register(true);
        let device = mock.construct_device("dummy-battery").unwrap();
        assert_eq!(
            mock.register_power_source(&device, battery_desc()),
            Err(RegistryError::Injected("register_power_source"))
        );
        assert_eq!(mock.live_registrations(), 0);
        assert_eq!(mock.leaked_handles(), 0);
    }

    #[test]
    fn test_mock_accounting_survives_poisoned_lock() {
        let mock = MockRegistry::new();
        let device = mock.construct_device("dummy-battery").unwrap();
        let handle = mock.register_power_source(&device, battery_desc()).unwrap();

        std::thread::scope(|s| {
            let poisoner = s.spawn(|| {
                let _guard = mock.state.write().unwrap();
                panic!("test thread panics while holding the mock state");
            });
            assert!(poisoner.join().is_err());
        });
        assert!(mock.state.is_poisoned());

        assert_eq!(mock.leaked_handles(), 1);
        mock.unregister_power_source(handle);
        assert_eq!(mock.leaked_handles(), 0);
        assert_eq!(mock.state().unregister_calls, 1);
    }
}
