//! Size-class arithmetic for the segmented free lists.

use core::alloc::Layout;

/// Alignment unit; every size class is a multiple of it.
pub const ALIGN: usize = 8;

/// Largest request served from the free lists.
pub const MAX_BYTES: usize = 128;

/// Number of size classes (8, 16, ..., 128).
pub const N_FREE_LISTS: usize = MAX_BYTES / ALIGN;

/// Rounds `bytes` up to the next multiple of [`ALIGN`].
#[inline]
pub const fn round_up(bytes: usize) -> usize {
    (bytes + ALIGN - 1) & !(ALIGN - 1)
}

/// Index of the free list serving a request of `bytes` (1..=MAX_BYTES).
#[inline]
pub const fn free_list_index(bytes: usize) -> usize {
    debug_assert!(bytes > 0 && bytes <= MAX_BYTES);
    (bytes + ALIGN - 1) / ALIGN - 1
}

/// Block size held by free list `index`.
#[inline]
pub const fn class_size(index: usize) -> usize {
    (index + 1) * ALIGN
}

/// Whether `layout` is served from the free lists rather than the backing
/// allocator. Zero-sized layouts never touch either.
#[inline]
pub const fn is_pooled(layout: Layout) -> bool {
    layout.size() > 0 && layout.size() <= MAX_BYTES && layout.align() <= ALIGN
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 0, 8)]
    #[case(8, 0, 8)]
    #[case(9, 1, 16)]
    #[case(64, 7, 64)]
    #[case(65, 8, 72)]
    #[case(127, 15, 128)]
    #[case(128, 15, 128)]
    fn test_class_mapping(#[case] bytes: usize, #[case] index: usize, #[case] size: usize) {
        assert_eq!(free_list_index(bytes), index);
        assert_eq!(class_size(index), size);
        assert_eq!(round_up(bytes), size);
    }

    #[test]
    fn test_is_pooled_boundaries() {
        assert!(is_pooled(Layout::from_size_align(128, 8).unwrap()));
        assert!(!is_pooled(Layout::from_size_align(129, 8).unwrap()));
        assert!(!is_pooled(Layout::from_size_align(32, 16).unwrap()));
        assert!(!is_pooled(Layout::from_size_align(0, 1).unwrap()));
    }
}
