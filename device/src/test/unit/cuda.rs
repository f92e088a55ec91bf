use std::sync::Arc;

use crate::{ActiveDevice, AcceleratorMemory, BufferPool, CudaDriver, DeviceRegistry, Driver};

/// Registry over the first CUDA device, `None` when the machine has none.
fn cuda_registry() -> Option<DeviceRegistry> {
    match CudaDriver.device_count() {
        Ok(count) if count > 0 => Some(DeviceRegistry::new(Arc::new(CudaDriver))),
        _ => {
            eprintln!("no CUDA device present, skipping");
            None
        }
    }
}

#[test]
fn test_cuda_activation_and_properties() {
    let Some(registry) = cuda_registry() else { return };
    let device = ActiveDevice::activate(&registry, 0, 42, true).unwrap();

    assert!(device.sessions().blas().is_some());
    assert!(device.sessions().rng().is_some());

    let properties = device.properties().unwrap();
    assert_eq!(properties.ordinal, 0);
    assert!(properties.total_memory > 0);
    assert!(properties.warp_size > 0);
    device.synchronize().unwrap();
}

#[test]
fn test_cuda_pool_reuse() {
    let Some(registry) = cuda_registry() else { return };
    let device = ActiveDevice::activate(&registry, 0, 42, false).unwrap();

    let mut pool = BufferPool::new(AcceleratorMemory::new());
    pool.source_mut().bind(&device);
    let a = pool.acquire(1 << 16).unwrap();
    pool.release(a).unwrap();
    assert_eq!(pool.acquire(1 << 12).unwrap(), a);
    assert_eq!(pool.record(a).unwrap().device(), Some(0));
}

#[test]
fn test_cuda_invalid_ordinal() {
    let Some(registry) = cuda_registry() else { return };
    let count = registry.device_count().unwrap();
    assert!(!registry.probe(count));
}
