use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// Reference model: index -> (item, tag set).
type Model = BTreeMap<u64, (u64, u8)>;

fn key_strategy() -> impl Strategy<Value = u64> {
    // Mostly a dense low range so tag and delete ops hit stored keys, plus
    // sparse and extreme indices that force tall trees.
    prop_oneof![
        6 => 0u64..256,
        2 => (0u64..16, 0u64..8).prop_map(|(hi, lo)| (hi << 40) | lo),
        1 => any::<u64>(),
        1 => prop_oneof![Just(0u64), Just(u64::MAX), Just(u64::MAX - 1), Just(1 << 63)],
    ]
}

fn tag_strategy() -> impl Strategy<Value = Tag> {
    prop_oneof![Just(Tag::Dirty), Just(Tag::Writeback)]
}

#[derive(Debug, Clone, Arbitrary)]
enum Op {
    #[proptest(weight = 4)]
    Insert(#[proptest(strategy = "key_strategy()")] u64, u64),
    #[proptest(weight = 2)]
    Delete(#[proptest(strategy = "key_strategy()")] u64),
    Lookup(#[proptest(strategy = "key_strategy()")] u64),
    #[proptest(weight = 2)]
    TagSet(
        #[proptest(strategy = "key_strategy()")] u64,
        #[proptest(strategy = "tag_strategy()")] Tag,
    ),
    TagClear(
        #[proptest(strategy = "key_strategy()")] u64,
        #[proptest(strategy = "tag_strategy()")] Tag,
    ),
    TagGet(
        #[proptest(strategy = "key_strategy()")] u64,
        #[proptest(strategy = "tag_strategy()")] Tag,
    ),
    Gang(
        #[proptest(strategy = "key_strategy()")] u64,
        #[proptest(strategy = "0usize..48")] usize,
        #[proptest(strategy = "prop::option::of(tag_strategy())")] Option<Tag>,
    ),
}

fn model_gang(m: &Model, first: u64, max: usize, tag: Option<Tag>) -> Vec<(u64, u64)> {
    m.range(first..)
        .filter(|(_, (_, tags))| tag.map_or(true, |tag| tags & tag.bit() != 0))
        .take(max)
        .map(|(k, (v, _))| (*k, *v))
        .collect()
}

fn check_aggregates(t: &RadixTree<u64>, m: &Model) -> Result<(), TestCaseError> {
    prop_assert_eq!(t.len(), m.len());
    for tag in Tag::ALL {
        let expected = m.values().any(|(_, tags)| tags & tag.bit() != 0);
        prop_assert_eq!(t.tagged(tag), expected, "tagged({:?})", tag);
    }
    if let Some((&last, _)) = m.last_key_value() {
        prop_assert!(t.max_index() >= last);
    } else {
        prop_assert_eq!(t.height(), 0);
    }
    Ok(())
}

fn run_model(shift: u32, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let config = TreeConfig::default().with_shift(shift);
    let mut t: RadixTree<u64> = RadixTree::with_config(config).unwrap();
    let mut m = Model::new();

    for (step, op) in ops.into_iter().enumerate() {
        let height_before = t.height();
        match op {
            Op::Insert(key, value) => {
                let got = t.insert(key, value);
                if m.contains_key(&key) {
                    prop_assert_eq!(got, Err(Error::AlreadyExists { index: key }));
                } else {
                    prop_assert_eq!(got, Ok(()));
                    m.insert(key, (value, 0));
                }
                prop_assert!(t.height() >= height_before, "insert shrank the tree");
            }
            Op::Delete(key) => {
                let got = t.delete(key);
                prop_assert_eq!(got, m.remove(&key).map(|(v, _)| v));
                if !m.is_empty() {
                    prop_assert_eq!(t.height(), height_before, "delete changed height");
                }
            }
            Op::Lookup(key) => {
                prop_assert_eq!(t.lookup(key).copied(), m.get(&key).map(|(v, _)| *v));
                prop_assert_eq!(t.contains_key(key), m.contains_key(&key));
            }
            Op::TagSet(key, tag) => {
                let got = t.tag_set(key, tag).copied();
                match m.get_mut(&key) {
                    Some((value, tags)) => {
                        prop_assert_eq!(got, Ok(*value));
                        *tags |= tag.bit();
                    }
                    None => prop_assert_eq!(got, Err(Error::NoSuchKey { index: key })),
                }
            }
            Op::TagClear(key, tag) => {
                let got = t.tag_clear(key, tag).copied();
                match m.get_mut(&key) {
                    Some((value, tags)) => {
                        prop_assert_eq!(got, Some(*value));
                        *tags &= !tag.bit();
                    }
                    None => prop_assert_eq!(got, None),
                }
            }
            Op::TagGet(key, tag) => {
                let expected = m.get(&key).is_some_and(|(_, tags)| tags & tag.bit() != 0);
                prop_assert_eq!(t.tag_get(key, tag), expected);
            }
            Op::Gang(first, max, tag) => {
                let got: Vec<(u64, u64)> = t
                    .gang_lookup_filtered(first, max, tag)
                    .into_iter()
                    .map(|(k, v)| (k, *v))
                    .collect();
                prop_assert_eq!(got, model_gang(&m, first, max, tag));
            }
        }
        check_aggregates(&t, &m)?;
        if step % 16 == 0 {
            t.validate();
        }
    }
    t.validate();

    let got: Vec<(u64, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
    let expected: Vec<(u64, u64)> = m.iter().map(|(k, (v, _))| (*k, *v)).collect();
    prop_assert_eq!(got, expected);

    // Deleting everything must return the tree to height 0 with no nodes.
    let keys: Vec<u64> = m.keys().copied().collect();
    for key in keys {
        prop_assert!(t.delete(key).is_some());
    }
    t.validate();
    prop_assert_eq!(t.height(), 0);
    prop_assert_eq!(t.node_count(), 0);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_default_shift(ops in prop::collection::vec(any::<Op>(), 0..=300)) {
        run_model(MAX_SHIFT, ops)?;
    }

    #[test]
    fn prop_equivalence_any_shift(
        shift in 1u32..=MAX_SHIFT,
        ops in prop::collection::vec(any::<Op>(), 0..=150),
    ) {
        run_model(shift, ops)?;
    }

    #[test]
    fn prop_gang_resume_visits_everything(
        keys in prop::collection::btree_set(key_strategy(), 0..200),
        page in 1usize..20,
    ) {
        let mut t: RadixTree<u64> = RadixTree::new();
        for &key in &keys {
            t.insert(key, !key).unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = Some(0u64);
        while let Some(first) = cursor {
            let batch = t.gang_lookup(first, page);
            prop_assert!(batch.len() <= page);
            if batch.is_empty() {
                break;
            }
            for (key, value) in &batch {
                prop_assert_eq!(**value, !*key);
            }
            cursor = batch.last().and_then(|(k, _)| k.checked_add(1));
            seen.extend(batch.into_iter().map(|(k, _)| k));
        }
        prop_assert_eq!(seen, keys.into_iter().collect::<Vec<_>>());
    }
}

#[test]
fn randomized_stress_small_shift() {
    let _ = env_logger::try_init();
    let config = TreeConfig::default().with_shift(3);
    let mut t: RadixTree<u64> = RadixTree::with_config(config).unwrap();
    let mut m = Model::new();
    let mut rng = StdRng::seed_from_u64(0x5eed_1dea);

    for step in 0..20_000u32 {
        let key = match rng.gen_range(0..10) {
            0 => rng.gen::<u64>(),
            1..=2 => rng.gen_range(0..1u64 << 24),
            _ => rng.gen_range(0..4096),
        };
        let tag = Tag::ALL[rng.gen_range(0..Tag::ALL.len())];
        match rng.gen_range(0..10) {
            0..=3 => {
                let inserted = t.insert(key, step as u64).is_ok();
                assert_eq!(inserted, !m.contains_key(&key));
                m.entry(key).or_insert((step as u64, 0));
            }
            4..=5 => assert_eq!(t.delete(key), m.remove(&key).map(|(v, _)| v)),
            6..=7 => {
                let ok = t.tag_set(key, tag).is_ok();
                assert_eq!(ok, m.contains_key(&key));
                if let Some((_, tags)) = m.get_mut(&key) {
                    *tags |= tag.bit();
                }
            }
            8 => {
                let ok = t.tag_clear(key, tag).is_some();
                assert_eq!(ok, m.contains_key(&key));
                if let Some((_, tags)) = m.get_mut(&key) {
                    *tags &= !tag.bit();
                }
            }
            _ => {
                let got: Vec<u64> = t
                    .gang_lookup_tag(key, 32, tag)
                    .into_iter()
                    .map(|(k, _)| k)
                    .collect();
                let expected: Vec<u64> = model_gang(&m, key, 32, Some(tag))
                    .into_iter()
                    .map(|(k, _)| k)
                    .collect();
                assert_eq!(got, expected);
            }
        }
        if step % 1000 == 0 {
            t.validate();
        }
    }

    t.validate();
    for tag in Tag::ALL {
        assert_eq!(
            t.tagged(tag),
            m.values().any(|(_, tags)| tags & tag.bit() != 0)
        );
    }
    let got: Vec<u64> = t.iter().map(|(k, _)| k).collect();
    assert_eq!(got, m.keys().copied().collect::<Vec<_>>());
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

const SMALL_SET: [u64; 6] = [0, 1, 64, 4096, 1 << 40, u64::MAX];

#[test]
fn exhaustive_insert_order_small_set() {
    for_each_permutation(&SMALL_SET, |perm| {
        let mut t: RadixTree<u64> = RadixTree::new();
        for (i, &key) in perm.iter().enumerate() {
            t.insert(key, key).unwrap();
            if i % 2 == 0 {
                t.tag_set(key, Tag::Dirty).unwrap();
            }
            t.validate();
        }
        assert_eq!(t.height(), 11);
        let got: Vec<u64> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(got, SMALL_SET.to_vec());

        let mut tagged: Vec<u64> = perm.iter().step_by(2).copied().collect();
        tagged.sort_unstable();
        let got: Vec<u64> = t.iter_tagged(Tag::Dirty).map(|(k, _)| k).collect();
        assert_eq!(got, tagged);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    // Insert in a fixed order, then remove in all permutations.
    for_each_permutation(&SMALL_SET, |perm| {
        let mut t: RadixTree<u64> = RadixTree::new();
        for &key in &SMALL_SET {
            t.insert(key, key).unwrap();
            t.tag_set(key, Tag::Writeback).unwrap();
        }
        let nodes_full = t.node_count();

        for (removed, &key) in perm.iter().enumerate() {
            assert_eq!(t.delete(key), Some(key));
            assert_eq!(t.len(), SMALL_SET.len() - removed - 1);
            t.validate();
            assert!(t.node_count() <= nodes_full);
        }
        assert!(t.is_empty());
        assert_eq!(t.height(), 0);
        assert!(!t.tagged(Tag::Writeback));
    });
}
