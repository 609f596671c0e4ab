//! Property-based test generators for the storage primitives.
//!
//! Provides proptest strategies for:
//! - Sorted, duplicate-free key/value runs (block builder input)
//! - Keys drawn from a small alphabet so shared prefixes are common
//! - Logical log records, including ones larger than a log block
//! - Strictly increasing sequence numbers (snapshot registry input)

use proptest::prelude::*;

/// Keys over a tiny alphabet; long shared prefixes show up constantly.
pub fn arb_prefix_heavy_key(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop_oneof![Just(b'a'), Just(b'b'), Just(b'c'), Just(0xFFu8)], 0..max_len)
}

/// Arbitrary bytes, possibly empty.
pub fn arb_bytes(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..max_len)
}

/// Sorted (byte-wise), duplicate-free key/value pairs.
pub fn arb_sorted_entries(max_entries: usize) -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    prop::collection::btree_map(
        prop_oneof![arb_prefix_heavy_key(24), arb_bytes(24)],
        arb_bytes(64),
        0..max_entries,
    )
    .prop_map(|map| map.into_iter().collect())
}

/// Logical log records sized around a block of `block_size` bytes.
pub fn arb_log_records(
    block_size: usize,
    max_records: usize,
) -> impl Strategy<Value = Vec<Vec<u8>>> {
    let size = prop_oneof![
        4 => 0..32usize,
        2 => 0..block_size,
        1 => block_size - 16..block_size + 16,
        1 => 0..3 * block_size,
    ];
    prop::collection::vec(size, 0..max_records).prop_map(|sizes| {
        sizes
            .into_iter()
            .enumerate()
            .map(|(i, len)| (0..len).map(|j| (i * 31 + j) as u8).collect())
            .collect()
    })
}

/// Strictly increasing sequence numbers starting above zero.
pub fn arb_increasing_seqnos(max_count: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1u64..1000, 0..max_count).prop_map(|gaps| {
        gaps.into_iter()
            .scan(0u64, |acc, gap| {
                *acc += gap;
                Some(*acc)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_sorted_entries_are_sorted_and_unique() {
        let mut runner = TestRunner::deterministic();
        for _ in 0..50 {
            let entries = arb_sorted_entries(40).new_tree(&mut runner).unwrap().current();
            for pair in entries.windows(2) {
                assert!(pair[0].0 < pair[1].0);
            }
        }
    }

    #[test]
    fn test_seqnos_strictly_increase() {
        let mut runner = TestRunner::deterministic();
        for _ in 0..50 {
            let seqnos = arb_increasing_seqnos(30).new_tree(&mut runner).unwrap().current();
            for pair in seqnos.windows(2) {
                assert!(pair[0] < pair[1]);
            }
        }
    }
}
