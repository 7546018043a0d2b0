//! In-process power supply registry
//!
//! A thread-safe registry host that keeps registered supplies in memory and
//! dispatches subscriber queries to their callbacks. Reads mirror what the
//! power supply class exposes: one attribute per supported property, a `type`
//! attribute, and a uevent block.

use crate::property::{PowerSupplyProperty, PropertyValue, UnsupportedProperty};
use crate::registry::{
    DeviceHandle, PowerSupplyDesc, PowerSupplyRegistry, PowerSupplyType, RegistrationHandle,
    RegistryError,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 16;

/// Lifecycle notification delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SupplyEvent {
    Registered(String),
    Unregistered(String),
}

/// Point-in-time view of one power supply
#[derive(Debug, Clone, Serialize)]
pub struct PowerSupplySnapshot {
    pub name: String,
    pub kind: PowerSupplyType,
    pub properties: BTreeMap<&'static str, PropertyValue>,
}

struct Registration {
    device_id: u64,
    desc: PowerSupplyDesc,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    devices: HashMap<u64, String>,
    registrations: HashMap<u64, Registration>,
}

impl RegistryState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn device_in_use(&self, device_id: u64) -> bool {
        self.registrations
            .values()
            .any(|r| r.device_id == device_id)
    }

    /// Drop `device_id` unless a registration still refers to it
    fn release_unused(&mut self, device_id: u64) -> bool {
        !self.device_in_use(device_id) && self.devices.remove(&device_id).is_some()
    }

    fn supply(&self, name: &str) -> Option<&PowerSupplyDesc> {
        self.registrations
            .values()
            .map(|r| &r.desc)
            .find(|desc| desc.name == name)
    }
}

/// In-memory registry host
pub struct LocalRegistry {
    state: RwLock<RegistryState>,
    events: broadcast::Sender<SupplyEvent>,
}

impl LocalRegistry {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(RegistryState::default()),
            events,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_supply<T>(
        &self,
        name: &str,
        f: impl FnOnce(&PowerSupplyDesc) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        let state = self.read();
        let desc = state
            .supply(name)
            .ok_or_else(|| RegistryError::NoSuchDevice(name.to_string()))?;
        f(desc)
    }

    /// Subscribe to registration events
    pub fn subscribe(&self) -> broadcast::Receiver<SupplyEvent> {
        self.events.subscribe()
    }

    /// Query a property of a registered supply
    pub fn query(
        &self,
        name: &str,
        property: PowerSupplyProperty,
    ) -> Result<PropertyValue, RegistryError> {
        self.with_supply(name, |desc| dispatch(desc, property))
    }

    /// Query by raw property identifier
    pub fn query_raw(&self, name: &str, id: u32) -> Result<PropertyValue, RegistryError> {
        self.with_supply(name, |desc| {
            let property = PowerSupplyProperty::from_raw(id).ok_or(UnsupportedProperty { id })?;
            dispatch(desc, property)
        })
    }

    /// Read one sysfs-style attribute (`type` or a supported property name)
    pub fn read_attribute(&self, name: &str, attribute: &str) -> Result<String, RegistryError> {
        self.with_supply(name, |desc| {
            if attribute == "type" {
                return Ok(desc.kind.as_str().to_string());
            }

            let property = PowerSupplyProperty::parse(attribute)
                .filter(|p| desc.supports(*p))
                .ok_or_else(|| RegistryError::UnknownAttribute(attribute.to_string()))?;
            dispatch(desc, property).map(|value| value.to_string())
        })
    }

    /// Render the uevent block of a supply
    pub fn uevent(&self, name: &str) -> Result<Vec<String>, RegistryError> {
        self.with_supply(name, |desc| {
            let mut lines = vec![
                format!("POWER_SUPPLY_NAME={}", desc.name),
                format!("POWER_SUPPLY_TYPE={}", desc.kind.as_str()),
            ];

            // Properties that fail to answer are left out, like sysfs does
            for property in &desc.properties {
                if let Ok(value) = dispatch(desc, *property) {
                    lines.push(format!(
                        "POWER_SUPPLY_{}={}",
                        property.as_str().to_uppercase(),
                        value
                    ));
                }
            }

            Ok(lines)
        })
    }

    /// Snapshot every supported property of a supply
    pub fn snapshot(&self, name: &str) -> Result<PowerSupplySnapshot, RegistryError> {
        self.with_supply(name, |desc| {
            let properties = desc
                .properties
                .iter()
                .filter_map(|p| dispatch(desc, *p).ok().map(|value| (p.as_str(), value)))
                .collect();

            Ok(PowerSupplySnapshot {
                name: desc.name.clone(),
                kind: desc.kind,
                properties,
            })
        })
    }

    /// Registered supply names, sorted
    pub fn supplies(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .read()
            .registrations
            .values()
            .map(|r| r.desc.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn live_registrations(&self) -> usize {
        self.read().registrations.len()
    }

    pub fn device_count(&self) -> usize {
        self.read().devices.len()
    }
}

impl Default for LocalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn dispatch(
    desc: &PowerSupplyDesc,
    property: PowerSupplyProperty,
) -> Result<PropertyValue, RegistryError> {
    if !desc.supports(property) {
        return Err(UnsupportedProperty { id: property.id() }.into());
    }

    Ok((desc.get_property)(property)?)
}

impl PowerSupplyRegistry for LocalRegistry {
    fn construct_device(&self, name: &str) -> Result<DeviceHandle, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::InvalidName);
        }

        let mut state = self.write();
        let id = state.allocate_id();
        state.devices.insert(id, name.to_string());
        tracing::debug!("Constructed device {} (id={})", name, id);

        Ok(DeviceHandle::new(id, name))
    }

    fn register_power_source(
        &self,
        device: &DeviceHandle,
        desc: PowerSupplyDesc,
    ) -> Result<RegistrationHandle, RegistryError> {
        if desc.name.is_empty() {
            return Err(RegistryError::InvalidDescriptor("empty name".into()));
        }
        if desc.properties.is_empty() {
            return Err(RegistryError::InvalidDescriptor(format!(
                "{} lists no properties",
                desc.name
            )));
        }

        let mut state = self.write();
        if !state.devices.contains_key(&device.id()) {
            return Err(RegistryError::UnknownDevice);
        }
        if state.supply(&desc.name).is_some() {
            return Err(RegistryError::AlreadyRegistered(desc.name));
        }

        let id = state.allocate_id();
        let name = desc.name.clone();
        state.registrations.insert(
            id,
            Registration {
                device_id: device.id(),
                desc,
            },
        );
        drop(state);

        tracing::info!("Registered power supply {} on {}", name, device.name());
        // No subscribers is fine
        let _ = self.events.send(SupplyEvent::Registered(name));

        Ok(RegistrationHandle::new(id))
    }

    fn unregister_power_source(&self, registration: RegistrationHandle) {
        let (removed, device_released) = {
            let mut state = self.write();
            let removed = state.registrations.remove(&registration.id());
            let released = removed
                .as_ref()
                .is_some_and(|r| state.release_unused(r.device_id));
            (removed, released)
        };

        match removed {
            Some(r) => {
                tracing::info!(
                    "Unregistered power supply {} (device id={})",
                    r.desc.name,
                    r.device_id
                );
                if device_released {
                    tracing::debug!("Released device id={}", r.device_id);
                }
                let _ = self.events.send(SupplyEvent::Unregistered(r.desc.name));
            }
            None => tracing::debug!("Ignoring unknown registration {}", registration.id()),
        }
    }

    fn release_device(&self, device: DeviceHandle) {
        if self.write().release_unused(device.id()) {
            tracing::debug!("Released device {} (id={})", device.name(), device.id());
        } else {
            tracing::debug!("Device {} (id={}) not released", device.name(), device.id());
        }
    }
}
