//! Total orders over byte-string keys.
//!
//! A [`Comparator`] supplies the ordering used by blocks, tables and every
//! sorted structure above them, plus two key-shortening hooks that let index
//! blocks store shorter separator keys. Implementations are immutable and
//! shared freely across threads.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

/// Ordering and key-shortening over byte strings.
pub trait Comparator: Send + Sync {
    /// Three-way comparison of `a` and `b`.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Stable identifier recorded in persistent files.
    ///
    /// Tables written under one name must never be read under a comparator
    /// with a different name.
    fn name(&self) -> &'static str;

    /// Shortens `start` in place to some `s` with `start <= s < limit`.
    ///
    /// Leaving `start` untouched is always correct; shorter results only make
    /// index entries smaller.
    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]);

    /// Changes `key` in place to a short string `>= key`.
    fn find_short_successor(&self, key: &mut Vec<u8>);
}

/// Lexicographic unsigned-byte order. A proper prefix sorts first.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn name(&self) -> &'static str {
        "leveldb.BytewiseComparator"
    }

    fn find_shortest_separator(&self, start: &mut Vec<u8>, limit: &[u8]) {
        let diff_index = common_prefix_len(start, limit);
        if diff_index >= start.len().min(limit.len()) {
            // One is a prefix of the other; nothing shorter is safe.
            return;
        }

        let diff_byte = start[diff_index];
        if diff_byte < 0xFF && diff_byte + 1 < limit[diff_index] {
            start[diff_index] += 1;
            start.truncate(diff_index + 1);
            debug_assert_eq!(self.compare(start, limit), Ordering::Less);
        }
    }

    fn find_short_successor(&self, key: &mut Vec<u8>) {
        if let Some(i) = key.iter().position(|&b| b != 0xFF) {
            key[i] += 1;
            key.truncate(i + 1);
        }
        // A run of 0xFF bytes is left alone.
    }
}

/// Byte-wise order reversed.
///
/// Key shortening is disabled: a shorter key is never guaranteed to sort
/// between `start` and `limit` in reverse order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseBytewiseComparator;

impl Comparator for ReverseBytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        b.cmp(a)
    }

    fn name(&self) -> &'static str {
        "loam.ReverseBytewiseComparator"
    }

    fn find_shortest_separator(&self, _start: &mut Vec<u8>, _limit: &[u8]) {}

    fn find_short_successor(&self, _key: &mut Vec<u8>) {}
}

/// Shared byte-wise comparator.
///
/// Initialised once on first call, even under concurrent first callers; every
/// call returns a handle to the same instance.
pub fn bytewise_comparator() -> Arc<dyn Comparator> {
    static BYTEWISE: OnceLock<Arc<dyn Comparator>> = OnceLock::new();
    BYTEWISE
        .get_or_init(|| Arc::new(BytewiseComparator))
        .clone()
}

/// Length of the longest common prefix of `a` and `b`.
pub fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_key() -> impl Strategy<Value = Vec<u8>> {
        // Bias toward a tiny alphabet so shared prefixes are common.
        prop::collection::vec(
            prop_oneof![Just(0u8), Just(b'a'), Just(b'b'), Just(0xFF), any::<u8>()],
            0..12,
        )
    }

    proptest! {
        #[test]
        fn prop_separator_within_bounds(a in arb_key(), b in arb_key()) {
            let cmp = BytewiseComparator;
            let (start, limit) = if a <= b { (a, b) } else { (b, a) };
            let mut s = start.clone();
            cmp.find_shortest_separator(&mut s, &limit);

            if start == limit || limit.starts_with(&start) {
                prop_assert_eq!(&s, &start);
            } else {
                prop_assert!(start <= s);
                prop_assert!(s < limit);
                prop_assert!(s.len() <= start.len());
            }
        }

        #[test]
        fn prop_successor_not_smaller(key in arb_key()) {
            let mut s = key.clone();
            BytewiseComparator.find_short_successor(&mut s);
            prop_assert!(s >= key);
            let all_ff = key.iter().all(|&b| b == 0xFF);
            prop_assert_eq!(s == key, all_ff);
        }
    }
}
