//! Property tests for pool allocate/deallocate invariants.

use std::ptr::NonNull;

use cairn_memory::allocator::{MemoryUsage, PoolAllocator, PoolConfig};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Alloc(usize),
    Free(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1usize..=300).prop_map(Op::Alloc),
        2 => any::<usize>().prop_map(Op::Free),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn live_blocks_never_overlap(ops in proptest::collection::vec(op(), 1..200)) {
        let pool = PoolAllocator::with_config(PoolConfig::debug()).unwrap();
        let mut live: Vec<(NonNull<u8>, usize, u8)> = Vec::new();
        let mut heap = 0;
        let mut tag = 0u8;

        for op in ops {
            match op {
                Op::Alloc(n) => {
                    let ptr = pool.allocate_bytes(n).unwrap();
                    prop_assert_eq!(ptr.as_ptr() as usize % 8, 0);
                    tag = tag.wrapping_add(1);
                    unsafe { std::ptr::write_bytes(ptr.as_ptr(), tag, n) };
                    live.push((ptr, n, tag));
                }
                Op::Free(pick) if !live.is_empty() => {
                    let (ptr, n, tag) = live.swap_remove(pick % live.len());
                    let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), n) };
                    prop_assert!(bytes.iter().all(|&b| b == tag));
                    unsafe { pool.deallocate_bytes(ptr, n) };
                }
                Op::Free(_) => {}
            }
            prop_assert!(pool.heap_size() >= heap);
            heap = pool.heap_size();
        }

        for (ptr, n, _) in live.drain(..) {
            unsafe { pool.deallocate_bytes(ptr, n) };
        }
        prop_assert_eq!(pool.used_memory(), 0);
        prop_assert_eq!(pool.stats().unwrap().outstanding_pooled(), 0);
    }
}
