//! Bucket counts.
//!
//! Bucket arrays only ever take sizes from this table; each entry is roughly
//! twice the previous one.

pub const NUM_PRIMES: usize = 28;

pub const PRIME_LIST: [usize; NUM_PRIMES] = [
    53,
    97,
    193,
    389,
    769,
    1_543,
    3_079,
    6_151,
    12_289,
    24_593,
    49_157,
    98_317,
    196_613,
    393_241,
    786_433,
    1_572_869,
    3_145_739,
    6_291_469,
    12_582_917,
    25_165_843,
    50_331_653,
    100_663_319,
    201_326_611,
    402_653_189,
    805_306_457,
    1_610_612_741,
    3_221_225_473,
    4_294_967_291,
];

/// Largest bucket count a table can reach.
pub const MAX_BUCKET_COUNT: usize = PRIME_LIST[NUM_PRIMES - 1];

/// Smallest listed prime `>= n`, saturating at [`MAX_BUCKET_COUNT`].
pub fn next_prime(n: usize) -> usize {
    let pos = PRIME_LIST.partition_point(|&p| p < n);
    PRIME_LIST.get(pos).copied().unwrap_or(MAX_BUCKET_COUNT)
}

pub(crate) fn is_listed(n: usize) -> bool {
    PRIME_LIST.binary_search(&n).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 53)]
    #[case(53, 53)]
    #[case(54, 97)]
    #[case(100, 193)]
    #[case(4_294_967_291, 4_294_967_291)]
    #[case(usize::MAX, 4_294_967_291)]
    fn test_next_prime(#[case] n: usize, #[case] expected: usize) {
        assert_eq!(next_prime(n), expected);
    }

    #[test]
    fn test_table_is_sorted() {
        assert!(PRIME_LIST.windows(2).all(|w| w[0] < w[1]));
        assert!(is_listed(193));
        assert!(!is_listed(100));
    }
}
