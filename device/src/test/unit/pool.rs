use std::sync::Arc;

use test_case::test_case;

use crate::{AcceleratorMemory, ActiveDevice, BufferPool, BufferPtr, DeviceRegistry, EmulatedDriver, Error, HostMemory};

fn host_pool() -> BufferPool<HostMemory> {
    BufferPool::new(HostMemory)
}

fn activate(driver: &EmulatedDriver, ordinal: usize) -> ActiveDevice {
    let registry = DeviceRegistry::new(Arc::new(driver.clone()));
    ActiveDevice::activate(&registry, ordinal, 0, true).unwrap()
}

#[test]
fn test_reuse_same_size() {
    let mut pool = host_pool();
    let a = pool.acquire(256).unwrap();
    pool.release(a).unwrap();

    assert_eq!(pool.acquire(256).unwrap(), a);
    assert_eq!(pool.issued(), 1);
    assert_eq!(pool.in_use(), 1);
}

#[test]
fn test_next_larger_reuse() {
    let mut pool = host_pool();
    let a = pool.acquire(1024).unwrap();
    pool.release(a).unwrap();

    assert_eq!(pool.acquire(512).unwrap(), a, "512 bytes should be served from the 1024 class");

    let b = pool.acquire(2048).unwrap();
    assert_ne!(a, b);
    assert_eq!(pool.issued(), 2);
}

#[test]
fn test_smaller_class_not_used_for_larger_request() {
    let mut pool = host_pool();
    let a = pool.acquire(512).unwrap();
    pool.release(a).unwrap();

    let b = pool.acquire(1024).unwrap();
    assert_ne!(a, b);
    assert_eq!(pool.free(), 1);
}

#[test]
fn test_smallest_fitting_class_preferred() {
    let mut pool = host_pool();
    let large = pool.acquire(4096).unwrap();
    let small = pool.acquire(1024).unwrap();
    pool.release(large).unwrap();
    pool.release(small).unwrap();

    assert_eq!(pool.acquire(600).unwrap(), small);
    assert_eq!(pool.acquire(600).unwrap(), large);
    assert_eq!(pool.free(), 0);
}

#[test]
fn test_release_returns_to_original_class() {
    let mut pool = host_pool();
    let a = pool.acquire(1024).unwrap();
    pool.release(a).unwrap();
    assert_eq!(pool.acquire(512).unwrap(), a);
    pool.release(a).unwrap();

    assert_eq!(pool.record(a).unwrap().size(), 1024);
    assert_eq!(pool.acquire(1000).unwrap(), a);
}

#[test]
fn test_release_unknown_pointer() {
    let mut pool = host_pool();
    let _ = pool.acquire(64).unwrap();

    let result = pool.release(BufferPtr::new(0xdead));
    assert!(matches!(result, Err(Error::UnknownBuffer { .. })));
    assert_eq!(pool.in_use(), 1);
}

#[test]
fn test_double_release_rejected() {
    let mut pool = host_pool();
    let a = pool.acquire(64).unwrap();
    pool.release(a).unwrap();

    assert!(matches!(pool.release(a), Err(Error::AlreadyReleased { .. })));
    assert_eq!(pool.free(), 1, "a double release must not list the block twice");
}

#[test]
fn test_clear_frees_checked_out_and_released() {
    let mut pool = host_pool();
    let a = pool.acquire(128).unwrap();
    let b = pool.acquire(256).unwrap();
    pool.release(a).unwrap();

    pool.clear();

    assert!(pool.is_empty());
    assert_eq!(pool.issued(), 0);
    assert_eq!(pool.free(), 0);
    assert_eq!(pool.in_use(), 0);
    assert_eq!(pool.reserved_bytes(), 0);
    assert!(matches!(pool.release(b), Err(Error::UnknownBuffer { .. })));
}

#[test]
fn test_clear_is_idempotent() {
    let mut pool = host_pool();
    pool.clear();
    pool.clear();

    let a = pool.acquire(32).unwrap();
    pool.clear();
    pool.clear();

    assert!(pool.is_empty());
    assert!(pool.record(a).is_none());
}

#[test_case(0; "zero bytes")]
#[test_case(1; "one byte")]
#[test_case(4097; "odd size")]
#[test_case(1 << 20; "one megabyte")]
fn test_acquire_records_requested_size(size: usize) {
    let mut pool = host_pool();
    let ptr = pool.acquire(size).unwrap();

    let record = pool.record(ptr).unwrap();
    assert_eq!(record.size(), size);
    assert_eq!(record.device(), None);
    assert!(record.in_use());
    assert!(pool.reserved_bytes() >= size);
}

#[test]
fn test_zero_size_buffers_are_distinct() {
    let mut pool = host_pool();
    let a = pool.acquire(0).unwrap();
    let b = pool.acquire(0).unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_oversized_host_request_fails() {
    let mut pool = host_pool();
    assert!(matches!(pool.acquire(usize::MAX), Err(Error::Allocation { size: usize::MAX, .. })));
    assert!(pool.is_empty());

    let ptr = pool.acquire(64).unwrap();
    assert!(pool.record(ptr).is_some(), "the pool stays usable after a failed allocation");
}

#[test]
fn test_oversized_emulated_request_fails() {
    let driver = EmulatedDriver::new(1).with_memory(usize::MAX);
    let device = activate(&driver, 0);

    let mut pool = BufferPool::new(AcceleratorMemory::new());
    pool.source_mut().bind(&device);
    assert!(matches!(pool.acquire(usize::MAX), Err(Error::Allocation { .. })));
    assert_eq!(driver.live_allocations(), 0);
    assert_eq!(driver.live_bytes(), 0);
}

#[test]
fn test_buffer_ptr_address() {
    let ptr = BufferPtr::new(0x1f40);
    assert_eq!(ptr.addr(), 0x1f40);
    assert_eq!(ptr.to_string(), "0x1f40");
    assert_eq!(ptr.as_mut_ptr::<u8>() as usize, ptr.addr());
}

#[test]
fn test_host_buffer_is_writable() {
    let mut pool = host_pool();
    let ptr = pool.acquire(16).unwrap();
    assert_eq!(pool.record(ptr).unwrap().size(), 16);
    assert_ne!(ptr.addr(), 0);

    unsafe {
        std::ptr::write_bytes(ptr.as_mut_ptr::<u8>(), 7, 16);
        assert_eq!(*ptr.as_mut_ptr::<u8>().add(15), 7);
    }
}

#[test]
fn test_accelerator_pool_requires_bound_device() {
    let mut pool = BufferPool::new(AcceleratorMemory::new());
    assert!(matches!(pool.acquire(64), Err(Error::NoActiveDevice)));
    assert!(pool.is_empty());
}

#[test]
fn test_accelerator_pool_records_device() {
    let driver = EmulatedDriver::new(2);
    let device = activate(&driver, 1);

    let mut pool = BufferPool::new(AcceleratorMemory::new());
    pool.source_mut().bind(&device);
    assert_eq!(pool.source().ordinal(), Some(1));

    let ptr = pool.acquire(64).unwrap();
    assert_eq!(pool.record(ptr).unwrap().device(), Some(1));
    assert_eq!(driver.live_allocations(), 1);

    pool.clear();
    assert_eq!(driver.live_allocations(), 0);
}

#[test]
fn test_accelerator_pool_out_of_memory() {
    let driver = EmulatedDriver::new(1).with_memory(1024);
    let device = activate(&driver, 0);

    let mut pool = BufferPool::new(AcceleratorMemory::new());
    pool.source_mut().bind(&device);

    let a = pool.acquire(512).unwrap();
    assert!(matches!(pool.acquire(1024), Err(Error::Allocation { size: 1024, .. })));

    pool.release(a).unwrap();
    assert_eq!(pool.acquire(256).unwrap(), a);
    assert_eq!(driver.live_bytes(), 512);
}

#[test]
fn test_pool_drop_frees_device_memory() {
    let driver = EmulatedDriver::new(1);
    let device = activate(&driver, 0);
    {
        let mut pool = BufferPool::new(AcceleratorMemory::new());
        pool.source_mut().bind(&device);
        pool.acquire(64).unwrap();
        pool.acquire(128).unwrap();
        assert_eq!(driver.live_allocations(), 2);
    }
    assert_eq!(driver.live_allocations(), 0);
}

#[test]
fn test_blocks_survive_unbind() {
    let driver = EmulatedDriver::new(1);
    let device = activate(&driver, 0);

    let mut pool = BufferPool::new(AcceleratorMemory::new());
    pool.source_mut().bind(&device);
    let a = pool.acquire(64).unwrap();
    pool.release(a).unwrap();
    pool.source_mut().unbind();

    assert_eq!(pool.acquire(64).unwrap(), a, "released blocks stay reusable without a bound device");
    assert!(matches!(pool.acquire(64), Err(Error::NoActiveDevice)));
}
