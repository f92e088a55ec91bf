use std::sync::Arc;

use crate::{AcceleratorMemory, ActiveDevice, DeviceRegistry, EmulatedDriver, HostMemory, Workspace};

#[test]
fn test_workspace_reuses_when_request_fits() {
    let mut workspace = Workspace::new();
    let a = workspace.reserve(&HostMemory, 1024).unwrap();

    assert_eq!(workspace.reserve(&HostMemory, 512).unwrap(), a);
    assert_eq!(workspace.reserve(&HostMemory, 1024).unwrap(), a);
    assert_eq!(workspace.size(), 1024);
}

#[test]
fn test_workspace_grows_on_larger_request() {
    let mut workspace = Workspace::new();
    workspace.reserve(&HostMemory, 512).unwrap();
    let b = workspace.reserve(&HostMemory, 2048).unwrap();

    assert_eq!(workspace.size(), 2048);
    assert_eq!(workspace.ptr(), Some(b));
    assert_eq!(workspace.reserve(&HostMemory, 1024).unwrap(), b);
}

#[test]
fn test_workspace_clear() {
    let mut workspace = Workspace::new();
    workspace.reserve(&HostMemory, 64).unwrap();
    workspace.clear(&HostMemory);

    assert_eq!(workspace.size(), 0);
    assert!(workspace.ptr().is_none());
}

#[test]
fn test_workspace_zero_size() {
    let mut workspace = Workspace::new();
    let a = workspace.reserve(&HostMemory, 0).unwrap();
    assert_eq!(workspace.reserve(&HostMemory, 0).unwrap(), a);
}

#[test]
fn test_workspace_holds_single_device_block() {
    let driver = EmulatedDriver::new(1);
    let registry = DeviceRegistry::new(Arc::new(driver.clone()));
    let device = ActiveDevice::activate(&registry, 0, 0, false).unwrap();
    let mut memory = AcceleratorMemory::new();
    memory.bind(&device);

    let mut workspace = Workspace::new();
    workspace.reserve(&memory, 64).unwrap();
    workspace.reserve(&memory, 128).unwrap();
    workspace.reserve(&memory, 4096).unwrap();
    assert_eq!(driver.live_allocations(), 1);
    assert_eq!(driver.live_bytes(), 4096);

    workspace.clear(&memory);
    assert_eq!(driver.live_allocations(), 0);
}
