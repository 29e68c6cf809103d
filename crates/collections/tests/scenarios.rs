//! The four reference scenarios, each against the engine types directly.

use std::rc::Rc;

use cairn_collections::function::{EqualTo, Identity, Less, SelectFirst, SimpleHash};
use cairn_collections::hashtable::HashTable;
use cairn_collections::tree::RbTree;
use cairn_memory::allocator::PoolAllocator;
use pretty_assertions::assert_eq;

type Pool = Rc<PoolAllocator>;

fn pool() -> Pool {
    Rc::new(PoolAllocator::new())
}

#[test]
fn scenario_1_unique_inserts_iterate_in_order() {
    let mut tree: RbTree<i32, Identity, Less, Pool> = RbTree::new_in(Identity, Less, pool());
    for key in [5, 3, 8, 1, 4] {
        let (_, inserted) = tree.insert_unique(key).unwrap();
        assert!(inserted);
    }

    assert_eq!(tree.iter().copied().collect::<Vec<_>>(), vec![1, 3, 4, 5, 8]);
    tree.verify().unwrap();
}

#[test]
fn scenario_2_equal_range_keeps_insertion_order() {
    let mut tree: RbTree<(i32, char), SelectFirst, Less, Pool> =
        RbTree::new_in(SelectFirst, Less, pool());
    tree.insert_equal((3, 'a')).unwrap();
    tree.insert_equal((3, 'b')).unwrap();

    let values: Vec<char> = tree.equal_range(&3).map(|&(_, v)| v).collect();
    assert_eq!(values, vec!['a', 'b']);
    assert_eq!(tree.count(&3), 2);
}

#[test]
fn scenario_3_growth_past_first_prime_rehashes() {
    let mut table: HashTable<u32, Identity, SimpleHash, EqualTo, Pool> =
        HashTable::with_buckets_in(53, Identity, SimpleHash, EqualTo, pool()).unwrap();
    assert_eq!(table.bucket_count(), 53);

    for key in 0..54 {
        let (_, inserted) = table.insert_unique(key).unwrap();
        assert!(inserted);
    }

    assert_eq!(table.bucket_count(), 97);
    assert_eq!(table.len(), 54);
    assert!((0..54).all(|key| table.find(&key) == Some(&key)));
    table.verify().unwrap();
}

#[test]
fn scenario_4_erase_removes_every_duplicate() {
    let mut table: HashTable<u32, Identity, SimpleHash, EqualTo, Pool> =
        HashTable::with_buckets_in(53, Identity, SimpleHash, EqualTo, pool()).unwrap();
    for _ in 0..3 {
        table.insert_equal(7).unwrap();
    }
    table.insert_equal(60).unwrap();

    assert_eq!(table.erase(&7), 3);
    assert_eq!(table.find(&7), None);
    assert_eq!(table.len(), 1);
    table.verify().unwrap();
}
