//! Chained hash table engine: growth, failure handling and ownership.

use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

use cairn_collections::HashMap;
use cairn_collections::function::{EqualTo, Identity, SelectFirst, SimpleHash, StdHash};
use cairn_collections::hashtable::{HashTable, MAX_BUCKET_COUNT, next_prime};
use cairn_memory::allocator::{AllocError, AllocResult, Allocator, PoolAllocator, SystemAllocator};
use pretty_assertions::assert_eq;
use rstest::rstest;

type Pool = Rc<PoolAllocator>;
type IntTable<A = Pool> = HashTable<u32, Identity, SimpleHash, EqualTo, A>;

fn int_table(hint: usize) -> IntTable {
    HashTable::with_buckets_in(hint, Identity, SimpleHash, EqualTo, Rc::new(PoolAllocator::new()))
        .unwrap()
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Serves `quota` allocations, then refuses every request.
struct QuotaAllocator {
    quota: Cell<usize>,
    live: Rc<Cell<usize>>,
}

impl QuotaAllocator {
    fn new(quota: usize) -> (Self, Rc<Cell<usize>>) {
        let live = Rc::new(Cell::new(0));
        let alloc = Self {
            quota: Cell::new(quota),
            live: Rc::clone(&live),
        };
        (alloc, live)
    }
}

unsafe impl Allocator for QuotaAllocator {
    unsafe fn allocate(&self, layout: Layout) -> AllocResult<NonNull<[u8]>> {
        if self.quota.get() == 0 {
            return Err(AllocError::out_of_memory_with_layout(layout));
        }
        self.quota.set(self.quota.get() - 1);
        let block = unsafe { SystemAllocator.allocate(layout)? };
        self.live.set(self.live.get() + 1);
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.live.set(self.live.get() - 1);
        unsafe { SystemAllocator.deallocate(ptr, layout) };
    }
}

#[rstest]
#[case(0, 53)]
#[case(53, 53)]
#[case(54, 97)]
#[case(100, 193)]
fn test_bucket_count_rounds_up_to_prime(#[case] hint: usize, #[case] expected: usize) {
    let table = int_table(hint);
    assert_eq!(table.bucket_count(), expected);
    assert_eq!(next_prime(hint), expected);
    assert_eq!(table.max_bucket_count(), MAX_BUCKET_COUNT);
}

#[test]
fn test_growth_keeps_every_element_findable() {
    init_tracing();
    let mut table = int_table(53);
    let mut seen_counts = vec![table.bucket_count()];
    for key in 0..5_000 {
        table.insert_unique(key).unwrap();
        if seen_counts.last() != Some(&table.bucket_count()) {
            seen_counts.push(table.bucket_count());
        }
    }
    assert_eq!(seen_counts, vec![53, 97, 193, 389, 769, 1543, 3079, 6151]);
    assert!((0..5_000).all(|key| table.contains(&key)));
    table.verify().unwrap();
}

#[test]
fn test_bucket_sizes_add_up_to_len() {
    let mut table = int_table(53);
    table.insert_equal_iter((0..40).map(|i| i % 13)).unwrap();
    let total: usize = (0..table.bucket_count())
        .map(|b| table.elements_in_bucket(b))
        .sum();
    assert_eq!(total, table.len());
    assert_eq!(table.elements_in_bucket(table.bucket_index(&0)), 4);
    table.verify().unwrap();
}

/// A table of 53 elements in 53 buckets built on a quota of
/// `1 + 53 + extra` allocations, so the next new key needs a rehash.
fn full_quota_table(extra: usize) -> (IntTable<QuotaAllocator>, Rc<Cell<usize>>) {
    let (alloc, live) = QuotaAllocator::new(1 + 53 + extra);
    let mut table: IntTable<QuotaAllocator> =
        HashTable::with_buckets_in(53, Identity, SimpleHash, EqualTo, alloc).unwrap();
    table.insert_unique_iter(0..53).unwrap();
    assert_eq!(table.bucket_count(), 53);
    (table, live)
}

#[test]
fn test_failed_node_allocation_leaves_table_unchanged() {
    let (mut table, live) = full_quota_table(0);

    let err = table.insert_unique(53).unwrap_err();
    assert!(err.is_out_of_memory());
    assert_eq!(table.bucket_count(), 53);
    assert_eq!(table.len(), 53);
    table.verify().unwrap();

    drop(table);
    assert_eq!(live.get(), 0);
}

#[rstest]
#[case::unique(false)]
#[case::equal(true)]
fn test_failed_rehash_after_node_allocation_keeps_bucket_count(#[case] duplicate: bool) {
    init_tracing();
    // The node fits in the quota, the larger bucket array does not.
    let (mut table, live) = full_quota_table(1);
    let before: Vec<u32> = table.iter().copied().collect();

    let result = if duplicate {
        table.insert_equal(7).map(|_| ())
    } else {
        table.insert_unique(53).map(|_| ())
    };
    assert!(result.unwrap_err().is_out_of_memory());
    assert_eq!(table.bucket_count(), 53);
    assert_eq!(table.len(), 53);
    assert_eq!(table.count(&7), 1);
    assert!(!table.contains(&53));
    assert_eq!(table.iter().copied().collect::<Vec<_>>(), before);
    // The node allocated for the failed insert has been handed back.
    assert_eq!(live.get(), 1 + 53);
    table.verify().unwrap();

    drop(table);
    assert_eq!(live.get(), 0);
}

#[test]
fn test_existing_key_needs_no_allocation() {
    let (mut table, live) = full_quota_table(0);

    let (found, inserted) = table.insert_unique(7).unwrap();
    assert_eq!((*found, inserted), (7, false));
    assert_eq!(*table.find_or_insert(8).unwrap(), 8);
    assert_eq!(table.len(), 53);
    assert_eq!(table.bucket_count(), 53);

    drop(table);
    assert_eq!(live.get(), 0);
}

#[test]
fn test_failed_map_entry_insert_keeps_prior_state() {
    let (alloc, live) = QuotaAllocator::new(1 + 53 + 1);
    let mut map: HashMap<u32, u32, SimpleHash, EqualTo, QuotaAllocator> =
        HashMap::with_buckets_in(53, alloc).unwrap();
    for key in 0..53 {
        map.insert(key, key).unwrap();
    }

    *map.get_or_insert_with(3, || 0).unwrap() += 100;
    assert!(map.get_or_insert_with(99, || 0).is_err());
    assert_eq!(map.bucket_count(), 53);
    assert_eq!(map.len(), 53);
    assert_eq!(map.get(&3), Some(&103));
    assert_eq!(map.get(&99), None);
    map.as_table().verify().unwrap();

    drop(map);
    assert_eq!(live.get(), 0);
}

/// Claims `usize::MAX` upcoming items and yields none.
struct Boastful;

impl Iterator for Boastful {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}

#[test]
fn test_huge_size_hint_saturates() {
    let (alloc, live) = QuotaAllocator::new(1);
    let mut table: IntTable<QuotaAllocator> =
        HashTable::with_buckets_in(0, Identity, SimpleHash, EqualTo, alloc).unwrap();

    // The hint saturates to the largest listed prime, which the quota refuses.
    let err = table.insert_equal_iter(Boastful).unwrap_err();
    assert!(err.is_out_of_memory());
    assert_eq!(table.bucket_count(), 53);
    assert!(table.is_empty());

    drop(table);
    assert_eq!(live.get(), 0);
}

#[test]
fn test_equal_range_is_contiguous_after_rehash() {
    let mut table: HashTable<(u32, u32), SelectFirst, SimpleHash, EqualTo, Pool> =
        HashTable::with_buckets_in(0, SelectFirst, SimpleHash, EqualTo, Rc::new(PoolAllocator::new()))
            .unwrap();
    for seq in 0..300 {
        table.insert_equal((seq % 5, seq)).unwrap();
    }
    assert!(table.bucket_count() > 53);
    for key in 0..5 {
        let run = table.equal_range(&key);
        assert_eq!(run.len(), 60);
        assert!(run.clone().all(|&(k, _)| k == key));
    }
    table.verify().unwrap();
}

#[test]
fn test_std_hash_strategy_with_strings() {
    let mut table: HashTable<String, Identity, StdHash, EqualTo, SystemAllocator> =
        HashTable::with_buckets_in(0, Identity, StdHash::default(), EqualTo, SystemAllocator)
            .unwrap();
    for word in ["alpha", "beta", "gamma", "beta"] {
        table.insert_unique(word.to_owned()).unwrap();
    }
    assert_eq!(table.len(), 3);
    assert!(table.contains(&"gamma".to_owned()));
    assert_eq!(table.erase(&"beta".to_owned()), 1);
    table.verify().unwrap();
}

#[test]
fn test_find_or_insert_and_remove_one() {
    let mut table: HashTable<(u32, u32), SelectFirst, SimpleHash, EqualTo, Pool> =
        HashTable::with_buckets_in(0, SelectFirst, SimpleHash, EqualTo, Rc::new(PoolAllocator::new()))
            .unwrap();
    table.find_or_insert((1, 10)).unwrap().1 += 1;
    table.find_or_insert((1, 99)).unwrap().1 += 1;
    assert_eq!(table.find(&1), Some(&(1, 12)));

    table.insert_equal((1, 0)).unwrap();
    assert!(table.remove_one(&1).is_some());
    assert_eq!(table.count(&1), 1);
    assert_eq!(table.remove_one(&2), None);
}

#[test]
fn test_retain_and_clear_keep_bucket_count() {
    let mut table = int_table(0);
    table.insert_unique_iter(0..200).unwrap();
    let buckets = table.bucket_count();

    table.retain(|k| k % 2 == 0);
    assert_eq!(table.len(), 100);
    assert!(table.iter().all(|k| k % 2 == 0));
    table.verify().unwrap();

    table.clear();
    assert!(table.is_empty());
    assert_eq!(table.bucket_count(), buckets);
}

#[test]
fn test_clone_matches_layout() {
    let mut table = int_table(0);
    table.insert_equal_iter([3, 56, 3, 109, 4]).unwrap();
    let copy = table.try_clone().unwrap();
    assert_eq!(copy.bucket_count(), table.bucket_count());
    assert_eq!(
        copy.iter().copied().collect::<Vec<_>>(),
        table.iter().copied().collect::<Vec<_>>()
    );
    copy.verify().unwrap();

    let mut target = int_table(1_000);
    target.insert_unique(1).unwrap();
    target.clone_from(&table);
    assert_eq!(target.len(), 5);
    assert_eq!(target.count(&3), 2);
    assert!(!target.contains(&1));
}

#[test]
fn test_swap_exchanges_contents() {
    let mut a = int_table(0);
    let mut b = int_table(200);
    a.insert_unique(1).unwrap();
    b.insert_unique_iter([2, 3]).unwrap();
    a.swap(&mut b);
    assert_eq!(a.len(), 2);
    assert_eq!(a.bucket_count(), 389);
    assert_eq!(b.iter().copied().collect::<Vec<_>>(), vec![1]);
}

#[test]
fn test_partially_consumed_into_iter_frees_everything() {
    let (alloc, live) = QuotaAllocator::new(usize::MAX);
    let mut table: HashTable<String, Identity, SimpleHash, EqualTo, QuotaAllocator> =
        HashTable::with_buckets_in(0, Identity, SimpleHash, EqualTo, alloc).unwrap();
    for i in 0..20 {
        table.insert_unique(format!("key-{i}")).unwrap();
    }

    let mut iter = table.into_iter();
    assert_eq!(iter.len(), 20);
    let taken: Vec<String> = iter.by_ref().take(5).collect();
    assert_eq!(taken.len(), 5);
    assert_eq!(iter.len(), 15);
    drop(iter);
    assert_eq!(live.get(), 0);
}
