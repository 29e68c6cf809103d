//! Integration tests for the pool allocator

use std::alloc::Layout;
use std::rc::Rc;

use cairn_memory::allocator::{Allocator, MemoryUsage, PoolAllocator, PoolConfig, TypedAllocator};
use pretty_assertions::assert_eq;
use rstest::rstest;

#[test]
fn test_every_pooled_size_is_aligned() {
    let pool = PoolAllocator::with_config(PoolConfig::debug()).expect("valid config");

    let mut blocks = Vec::new();
    for n in 1..=128 {
        let ptr = pool.allocate_bytes(n).expect("allocation failed");
        assert_eq!(ptr.as_ptr() as usize % 8, 0, "size {n} misaligned");
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), n as u8, n) };
        blocks.push((ptr, n));
    }

    for &(ptr, n) in &blocks {
        let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), n) };
        assert!(bytes.iter().all(|&b| b == n as u8), "block of {n} overwritten");
    }

    for (ptr, n) in blocks {
        unsafe { pool.deallocate_bytes(ptr, n) };
    }
    assert_eq!(pool.used_memory(), 0);
}

#[test]
fn test_cycles_do_not_grow_heap() {
    let pool = PoolAllocator::new();

    let warmup: Vec<_> = (0..20).map(|_| pool.allocate_bytes(40).unwrap()).collect();
    for ptr in warmup {
        unsafe { pool.deallocate_bytes(ptr, 40) };
    }
    let heap = pool.heap_size();

    for _ in 0..1_000 {
        let batch: Vec<_> = (0..20).map(|_| pool.allocate_bytes(40).unwrap()).collect();
        for ptr in batch {
            unsafe { pool.deallocate_bytes(ptr, 40) };
        }
    }

    assert_eq!(pool.heap_size(), heap);
    assert_eq!(pool.free_blocks(40), 20);
}

#[test]
fn test_heap_size_only_grows() {
    let pool = PoolAllocator::new();
    let mut last = 0;
    let mut live = Vec::new();

    for n in (8..=128).step_by(8).cycle().take(400) {
        live.push((pool.allocate_bytes(n).unwrap(), n));
        assert!(pool.heap_size() >= last);
        last = pool.heap_size();
    }
    for (ptr, n) in live {
        unsafe { pool.deallocate_bytes(ptr, n) };
        assert_eq!(pool.heap_size(), last);
    }
}

#[rstest]
#[case(129)]
#[case(4096)]
#[case(1 << 20)]
fn test_large_requests_bypass_pool(#[case] n: usize) {
    let pool = PoolAllocator::with_config(PoolConfig::debug()).unwrap();
    let ptr = pool.allocate_bytes(n).unwrap();

    assert_eq!(pool.heap_size(), 0);
    unsafe {
        std::ptr::write_bytes(ptr.as_ptr(), 0xAB, n);
        pool.deallocate_bytes(ptr, n);
    }

    let stats = pool.stats().unwrap();
    assert_eq!(stats.large_allocs, 1);
    assert_eq!(stats.large_deallocs, 1);
    assert_eq!(stats.pooled_allocs, 0);
}

#[test]
fn test_over_aligned_layout_bypasses_pool() {
    let pool = PoolAllocator::new();
    let layout = Layout::from_size_align(32, 64).unwrap();

    unsafe {
        let ptr = pool.allocate(layout).unwrap();
        assert_eq!(ptr.cast::<u8>().as_ptr() as usize % 64, 0);
        pool.deallocate(ptr.cast(), layout);
    }
    assert_eq!(pool.heap_size(), 0);
}

#[test]
fn test_leftover_recycled_into_matching_class() {
    let pool = PoolAllocator::with_config(PoolConfig::production()).unwrap();

    // 960-byte chunk, 480 carved for twenty 24-byte blocks.
    let small = pool.allocate_bytes(24).unwrap();
    // Three 128-byte blocks fit in the remaining 480, leaving 96.
    let large = pool.allocate_bytes(128).unwrap();
    assert_eq!(pool.arena_remaining(), 96);
    assert_eq!(pool.free_blocks(128), 2);

    // A 104-byte batch cannot use the 96-byte tail, which lands on the 96 list.
    let odd = pool.allocate_bytes(104).unwrap();
    assert_eq!(pool.free_blocks(96), 1);
    assert_eq!(pool.heap_size(), 960 + 2 * 20 * 104 + 64);

    unsafe {
        pool.deallocate_bytes(small, 24);
        pool.deallocate_bytes(large, 128);
        pool.deallocate_bytes(odd, 104);
    }
}

#[test]
fn test_shared_pool_between_handles() {
    let pool = Rc::new(PoolAllocator::new());
    let a = Rc::clone(&pool);
    let b = Rc::clone(&pool);

    unsafe {
        let x = a.alloc_init(1u64).unwrap();
        b.dealloc_typed(x);
        let y = b.alloc_init(2u64).unwrap();
        assert_eq!(x, y, "both handles draw from one free list");
        a.dealloc_typed(y);
    }
}

#[test]
fn test_layout_and_byte_apis_agree() {
    let pool = PoolAllocator::new();
    let layout = Layout::from_size_align(48, 8).unwrap();

    unsafe {
        let ptr = pool.allocate(layout).unwrap().cast::<u8>();
        pool.deallocate_bytes(ptr, 48);
        let again = pool.allocate_bytes(41).unwrap();
        assert_eq!(ptr, again);
        pool.deallocate(again, layout);
    }
}

#[test]
fn test_zero_sized_requests() {
    let pool = PoolAllocator::new();
    let ptr = pool.allocate_bytes(0).unwrap();
    unsafe { pool.deallocate_bytes(ptr, 0) };
    assert_eq!(pool.heap_size(), 0);
}

#[test]
fn test_invalid_config_rejected() {
    let err = PoolAllocator::with_config(PoolConfig::debug().with_refill_batch(0)).unwrap_err();
    assert_eq!(err.code(), "MEM:CONFIG:INVALID");
}

#[test]
fn test_refill_batch_respected() {
    let pool = PoolAllocator::with_config(PoolConfig::production().with_refill_batch(5)).unwrap();
    let ptr = pool.allocate_bytes(16).unwrap();
    assert_eq!(pool.free_blocks(16), 4);
    assert_eq!(pool.heap_size(), 2 * 5 * 16);
    unsafe { pool.deallocate_bytes(ptr, 16) };
}
