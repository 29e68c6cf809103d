//! Strategy objects plugged into the tree and the hash table.
//!
//! - [`KeyOfValue`]: projects the ordering/hash key out of a stored value
//!   ([`Identity`] for sets, [`SelectFirst`] for maps)
//! - [`KeyCompare`]: strict weak ordering for the tree ([`Less`], [`Greater`],
//!   [`CompareFn`])
//! - [`KeyHash`] / [`KeyEqual`]: hashing and equivalence for the hash table
//!   ([`SimpleHash`], [`StdHash`], [`EqualTo`])

use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

// ============================================================================
// Key extraction
// ============================================================================

/// Projects the key out of a stored value.
pub trait KeyOfValue<V> {
    type Key: ?Sized;

    fn key<'a>(&self, value: &'a V) -> &'a Self::Key;
}

/// The value is its own key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Identity;

impl<T> KeyOfValue<T> for Identity {
    type Key = T;

    #[inline]
    fn key<'a>(&self, value: &'a T) -> &'a T {
        value
    }
}

/// The key is the first half of a `(key, mapped)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectFirst;

impl<K, V> KeyOfValue<(K, V)> for SelectFirst {
    type Key = K;

    #[inline]
    fn key<'a>(&self, value: &'a (K, V)) -> &'a K {
        &value.0
    }
}

// ============================================================================
// Ordering
// ============================================================================

/// Strict weak ordering over keys.
///
/// `less(a, b)` must be irreflexive and transitive, and incomparability must
/// be transitive. Two keys are *equivalent* when neither is less than the
/// other; the tree never calls `==`.
pub trait KeyCompare<K: ?Sized> {
    fn less(&self, a: &K, b: &K) -> bool;
}

/// Ascending order via [`Ord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Less;

impl<K: Ord + ?Sized> KeyCompare<K> for Less {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a < b
    }
}

/// Descending order via [`Ord`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Greater;

impl<K: Ord + ?Sized> KeyCompare<K> for Greater {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        a > b
    }
}

/// Adapts a `Fn(&K, &K) -> bool` "less than" closure.
#[derive(Clone, Copy)]
pub struct CompareFn<F>(pub F);

impl<K: ?Sized, F: Fn(&K, &K) -> bool> KeyCompare<K> for CompareFn<F> {
    #[inline]
    fn less(&self, a: &K, b: &K) -> bool {
        (self.0)(a, b)
    }
}

impl<F> std::fmt::Debug for CompareFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CompareFn(..)")
    }
}

// ============================================================================
// Equality
// ============================================================================

/// Key equivalence for the hash table.
pub trait KeyEqual<K: ?Sized> {
    fn eq(&self, a: &K, b: &K) -> bool;
}

/// Equivalence via [`PartialEq`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualTo;

impl<K: PartialEq + ?Sized> KeyEqual<K> for EqualTo {
    #[inline]
    fn eq(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

// ============================================================================
// Hashing
// ============================================================================

/// Maps a key to a bucket-independent hash value.
///
/// Keys that are equal under the table's [`KeyEqual`] must hash equally.
pub trait KeyHash<K: ?Sized> {
    fn hash(&self, key: &K) -> usize;
}

/// Keys understood by [`SimpleHash`].
pub trait SimpleHashable {
    fn simple_hash(&self) -> usize;
}

macro_rules! simple_hash_as_value {
    ($($ty:ty),+ $(,)?) => {$(
        impl SimpleHashable for $ty {
            #[inline]
            fn simple_hash(&self) -> usize {
                *self as usize
            }
        }
    )+};
}

simple_hash_as_value!(u8, u16, u32, u64, i8, i16, i32, i64, isize, char, bool);

impl SimpleHashable for usize {
    #[inline]
    fn simple_hash(&self) -> usize {
        *self
    }
}

impl SimpleHashable for str {
    fn simple_hash(&self) -> usize {
        self.as_bytes().simple_hash()
    }
}

impl SimpleHashable for [u8] {
    fn simple_hash(&self) -> usize {
        self.iter()
            .fold(0usize, |h, &b| h.wrapping_mul(5).wrapping_add(b as usize))
    }
}

impl SimpleHashable for String {
    #[inline]
    fn simple_hash(&self) -> usize {
        self.as_str().simple_hash()
    }
}

impl<T: SimpleHashable + ?Sized> SimpleHashable for &T {
    #[inline]
    fn simple_hash(&self) -> usize {
        (**self).simple_hash()
    }
}

impl<T: SimpleHashable + ?Sized> SimpleHashable for Box<T> {
    #[inline]
    fn simple_hash(&self) -> usize {
        (**self).simple_hash()
    }
}

/// Default hash: integers and `char` hash to their value, strings fold their
/// bytes with `h = 5 * h + byte`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimpleHash;

impl<K: SimpleHashable + ?Sized> KeyHash<K> for SimpleHash {
    #[inline]
    fn hash(&self, key: &K) -> usize {
        key.simple_hash()
    }
}

/// Hashes through any [`BuildHasher`], for keys without a [`SimpleHashable`]
/// impl.
#[derive(Debug, Clone, Default)]
pub struct StdHash<S = RandomState>(pub S);

impl<K: std::hash::Hash + ?Sized, S: BuildHasher> KeyHash<K> for StdHash<S> {
    #[inline]
    fn hash(&self, key: &K) -> usize {
        self.0.hash_one(key) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_projections() {
        let pair = (3, 'a');
        assert_eq!(*SelectFirst.key(&pair), 3);
        assert_eq!(*Identity.key(&7), 7);
    }

    #[test]
    fn test_comparators() {
        assert!(Less.less(&1, &2));
        assert!(!Less.less(&2, &2));
        assert!(Greater.less(&2, &1));
        let by_len = CompareFn(|a: &&str, b: &&str| a.len() < b.len());
        assert!(by_len.less(&"ab", &"abc"));
    }

    #[rstest]
    #[case("", 0)]
    #[case("a", 97)]
    #[case("ab", 5 * 97 + 98)]
    #[case("abc", 5 * (5 * 97 + 98) + 99)]
    fn test_string_hash(#[case] key: &str, #[case] expected: usize) {
        assert_eq!(SimpleHash.hash(key), expected);
        assert_eq!(SimpleHash.hash(&key.to_string()), expected);
    }

    #[test]
    fn test_integer_hash_is_identity() {
        assert_eq!(SimpleHash.hash(&42u32), 42);
        assert_eq!(SimpleHash.hash(&'A'), 65);
        assert_eq!(SimpleHash.hash(&-1i64), usize::MAX);
    }

    #[test]
    fn test_std_hash_is_deterministic_per_builder() {
        let hasher = StdHash::<RandomState>::default();
        assert_eq!(hasher.hash(&(1, "x")), hasher.hash(&(1, "x")));
    }
}
