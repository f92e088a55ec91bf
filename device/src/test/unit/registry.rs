use std::sync::Arc;

use crate::{DeviceRegistry, EmulatedDriver, Error};

fn registry(driver: EmulatedDriver) -> DeviceRegistry {
    DeviceRegistry::new(Arc::new(driver))
}

#[test]
fn test_device_count() {
    assert_eq!(registry(EmulatedDriver::new(3)).device_count().unwrap(), 3);
    assert_eq!(registry(EmulatedDriver::new(0)).device_count().unwrap(), 0);
}

#[test]
fn test_validate_in_range() {
    let registry = registry(EmulatedDriver::new(2));
    assert!(registry.validate(0).is_ok());
    assert!(registry.validate(1).is_ok());
}

#[test]
fn test_validate_out_of_range() {
    let registry = registry(EmulatedDriver::new(2));
    assert!(matches!(registry.validate(5), Err(Error::InvalidDevice { ordinal: 5, count: 2 })));
}

#[test]
fn test_activate_opens_device() {
    let registry = registry(EmulatedDriver::new(2));
    let device = registry.activate(1).unwrap();
    assert_eq!(device.ordinal(), 1);
    assert_eq!(registry.driver().name(), "emulated");
}

#[test]
fn test_activate_unavailable_device() {
    let registry = registry(EmulatedDriver::new(3).with_unavailable([1]));
    assert!(matches!(registry.activate(1), Err(Error::DeviceUnavailable { ordinal: 1, .. })));
    assert!(registry.activate(2).is_ok());
}

#[test]
fn test_activate_invalid_device() {
    let registry = registry(EmulatedDriver::new(1));
    assert!(matches!(registry.activate(999), Err(Error::InvalidDevice { ordinal: 999, .. })));
}

#[test]
fn test_probe() {
    let driver = EmulatedDriver::new(3).with_unavailable([1]);
    let registry = registry(driver.clone());

    assert!(registry.probe(0));
    assert!(!registry.probe(1));
    assert!(registry.probe(2));
    assert!(!registry.probe(3));
    assert_eq!(driver.live_sessions(), 0);
}

#[test]
fn test_global_registry_is_shared() {
    assert!(std::ptr::eq(crate::registry(), crate::registry()));
}
