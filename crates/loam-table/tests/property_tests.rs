//! Property tests for block building and decoding over generated key sets.

use bytes::Bytes;
use loam_table::{Block, BlockBuilder, BlockConfig};
use loam_testkit::arb_sorted_entries;
use loam_util::bytewise_comparator;
use loam_util::coding::get_varint32;
use proptest::prelude::*;

fn build(entries: &[(Vec<u8>, Vec<u8>)], interval: usize) -> Bytes {
    let config = BlockConfig {
        restart_interval: interval,
        ..Default::default()
    };
    let mut builder = BlockBuilder::with_config(&config, bytewise_comparator()).unwrap();
    for (k, v) in entries {
        builder.add(k, v);
    }
    let estimate = builder.current_size_estimate();
    let data = Bytes::copy_from_slice(builder.finish());
    assert_eq!(estimate, data.len());
    data
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Re-parsing the raw entry encoding, without the decoder, yields the
    /// inputs, and no entry at a restart shares a prefix.
    #[test]
    fn prop_manual_parse_matches_input(entries in arb_sorted_entries(60), interval in 1usize..6) {
        let data = build(&entries, interval);
        let block = Block::new(data.clone(), bytewise_comparator()).unwrap();
        let restarts: Vec<u32> = (0..block.num_restarts())
            .map(|i| block.restart_point(i))
            .collect();
        let entries_end = data.len() - 4 * (restarts.len() + 1);

        let mut input = &data[..entries_end];
        let mut prev: Vec<u8> = Vec::new();
        for (i, (key, value)) in entries.iter().enumerate() {
            let offset = (entries_end - input.len()) as u32;
            let shared = get_varint32(&mut input).unwrap() as usize;
            let unshared = get_varint32(&mut input).unwrap() as usize;
            let value_len = get_varint32(&mut input).unwrap() as usize;

            if i % interval == 0 {
                prop_assert_eq!(shared, 0);
                prop_assert_eq!(restarts[i / interval], offset);
            }

            let mut rebuilt = prev[..shared].to_vec();
            rebuilt.extend_from_slice(&input[..unshared]);
            prop_assert_eq!(&rebuilt, key);
            prop_assert_eq!(&input[unshared..unshared + value_len], value.as_slice());
            input = &input[unshared + value_len..];
            prev = rebuilt;
        }
        prop_assert!(input.is_empty());
    }

    /// Seeking to any probe lands on the first key at or after it.
    #[test]
    fn prop_seek_finds_lower_bound(
        entries in arb_sorted_entries(60),
        probe in prop::collection::vec(any::<u8>(), 0..8),
        interval in 1usize..20,
    ) {
        let block = Block::new(build(&entries, interval), bytewise_comparator()).unwrap();
        let mut iter = block.iter();
        iter.seek(&probe).unwrap();

        let expected = entries.iter().find(|(k, _)| k.as_slice() >= probe.as_slice());
        let got = iter.try_next().unwrap();
        match (expected, got) {
            (None, None) => {}
            (Some((k, v)), Some(entry)) => {
                prop_assert_eq!(entry.key.as_ref(), k.as_slice());
                prop_assert_eq!(entry.value.as_ref(), v.as_slice());
            }
            (e, g) => prop_assert!(false, "expected {:?}, got {:?}", e, g),
        }
    }
}
