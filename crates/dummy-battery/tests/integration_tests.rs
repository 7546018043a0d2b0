//! Integration tests for the dummy battery lifecycle

use dummy_battery::mock::MockRegistry;
use dummy_battery::{
    BatteryError, DeviceState, DummyBattery, LocalRegistry, PowerSupplyProperty, PropertyValue,
    RegistryError, SUPPLY_NAME, SUPPORTED_PROPERTIES, SupplyEvent, UnsupportedProperty,
};
use std::sync::Arc;
use std::thread;

#[test]
fn test_query_scenario() {
    let registry = Arc::new(MockRegistry::new());
    let battery = DummyBattery::initialize(registry.clone()).unwrap();
    assert_eq!(battery.state(), DeviceState::Registered);

    assert_eq!(
        registry.query(SUPPLY_NAME, PowerSupplyProperty::Capacity),
        Ok(PropertyValue::Int(100))
    );
    assert_eq!(
        registry
            .query(SUPPLY_NAME, PowerSupplyProperty::Status)
            .unwrap()
            .to_string(),
        "Full"
    );
    assert_eq!(
        registry.query(SUPPLY_NAME, PowerSupplyProperty::CurrentNow),
        Ok(PropertyValue::Int(0))
    );
    assert_eq!(
        registry.query_raw(SUPPLY_NAME, 0xFFFF),
        Err(RegistryError::Unsupported(UnsupportedProperty { id: 0xFFFF }))
    );

    battery.teardown();
    assert_eq!(battery.state(), DeviceState::Unregistered);
    assert_eq!(
        registry.query(SUPPLY_NAME, PowerSupplyProperty::Capacity),
        Err(RegistryError::NoSuchDevice(SUPPLY_NAME.to_string()))
    );
}

/// Characterizes current behavior: a rejected registration is cleaned up
/// and `initialize` still succeeds with an unregistered battery.
#[test]
fn test_registration_failure_returns_unregistered_battery() {
    let registry = Arc::new(MockRegistry::new());
    registry.fail_register(true);

    let battery = DummyBattery::initialize(registry.clone())
        .expect("registration failure is not propagated by initialize");

    assert_eq!(battery.state(), DeviceState::Unregistered);
    assert!(matches!(
        battery.registration_error(),
        Some(BatteryError::RegistrationFailed(RegistryError::Injected(_)))
    ));
    assert_eq!(registry.leaked_handles(), 0);
    assert_eq!(registry.live_registrations(), 0);
    assert_eq!(
        registry.query(SUPPLY_NAME, PowerSupplyProperty::Status),
        Err(RegistryError::NoSuchDevice(SUPPLY_NAME.to_string()))
    );

    // The backing device was handed back with the failed registration
    assert_eq!(registry.state().release_calls, 1);
    assert_eq!(registry.device_count(), 0);

    // Teardown after a failed registration has nothing to release
    battery.teardown();
    assert_eq!(registry.state().unregister_calls, 0);
}

#[test]
fn test_load_unload_cycles_release_backing_devices() {
    let registry = Arc::new(LocalRegistry::new());

    for _ in 0..5 {
        let battery = DummyBattery::initialize(registry.clone()).unwrap();
        assert_eq!(registry.device_count(), 1);
        battery.teardown();
    }

    assert_eq!(registry.live_registrations(), 0);
    assert_eq!(registry.device_count(), 0);
}

#[test]
fn test_device_construction_failure() {
    let registry = Arc::new(MockRegistry::new());
    registry.fail_construct(true);

    let err = DummyBattery::initialize(registry.clone())
        .err()
        .expect("construction failure must be reported");

    assert_eq!(
        err,
        BatteryError::DeviceUnavailable(RegistryError::Injected("construct_device"))
    );
    let state = registry.state();
    assert_eq!(state.construct_calls, 1);
    assert_eq!(state.register_calls, 0);
}

#[test]
fn test_second_battery_is_rejected_by_host() {
    let registry = Arc::new(LocalRegistry::new());
    let first = DummyBattery::initialize(registry.clone()).unwrap();
    let second = DummyBattery::initialize(registry.clone()).unwrap();

    assert!(first.is_registered());
    assert!(!second.is_registered());
    assert_eq!(
        second.registration_error(),
        Some(&BatteryError::RegistrationFailed(
            RegistryError::AlreadyRegistered(SUPPLY_NAME.to_string())
        ))
    );
    assert_eq!(registry.live_registrations(), 1);

    // The rejected battery's backing device is already gone
    assert_eq!(registry.device_count(), 1);

    drop(second);
    assert_eq!(registry.supplies(), [SUPPLY_NAME]);
    drop(first);
    assert!(registry.supplies().is_empty());
    assert_eq!(registry.device_count(), 0);
}

#[test]
fn test_concurrent_queries() {
    let registry = Arc::new(LocalRegistry::new());
    let battery = Arc::new(DummyBattery::initialize(registry.clone()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let battery = Arc::clone(&battery);
            thread::spawn(move || {
                for _ in 0..100 {
                    for property in SUPPORTED_PROPERTIES {
                        let direct = battery.get_property(*property).unwrap();
                        let routed = registry.query(SUPPLY_NAME, *property).unwrap();
                        assert_eq!(direct, routed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(battery.is_registered());
}

#[test]
fn test_concurrent_teardown_releases_once() {
    let registry = Arc::new(MockRegistry::new());
    let battery = Arc::new(DummyBattery::initialize(registry.clone()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let battery = Arc::clone(&battery);
            thread::spawn(move || battery.teardown())
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.state().unregister_calls, 1);
    assert_eq!(registry.leaked_handles(), 0);
}

#[test]
fn test_snapshot_serialization() {
    let registry = Arc::new(LocalRegistry::new());
    let _battery = DummyBattery::initialize(registry.clone()).unwrap();

    let snapshot = registry.snapshot(SUPPLY_NAME).unwrap();
    let json = serde_json::to_value(&snapshot).expect("Serialization failed");

    assert_eq!(json["name"], "battery");
    assert_eq!(json["kind"], "Battery");
    assert_eq!(json["properties"]["capacity"], 100);
    assert_eq!(json["properties"]["present"], true);
    assert_eq!(json["properties"]["status"], "Full");
    assert_eq!(json["properties"]["technology"], "Li-ion");
    assert_eq!(json["properties"]["capacity_level"], "Full");

    // JSON and sysfs agree on every attribute
    for (attribute, value) in json["properties"].as_object().unwrap() {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Bool(flag) => i32::from(*flag).to_string(),
            other => other.to_string(),
        };
        assert_eq!(
            registry.read_attribute(SUPPLY_NAME, attribute).unwrap(),
            rendered
        );
    }
    assert_eq!(json["properties"]["current_now"], 0);
}

#[tokio::test]
async fn test_subscribers_see_lifecycle() {
    let registry = Arc::new(LocalRegistry::new());
    let mut events = registry.subscribe();

    let battery = DummyBattery::initialize(registry.clone()).unwrap();
    assert_eq!(
        events.recv().await.unwrap(),
        SupplyEvent::Registered(SUPPLY_NAME.to_string())
    );

    battery.teardown();
    assert_eq!(
        events.recv().await.unwrap(),
        SupplyEvent::Unregistered(SUPPLY_NAME.to_string())
    );
}
