/// Split scenarios, split ordering and length conservation
use longjoin::config::{JoinConfig, SplitOrder};
use longjoin::ids::{ChainId, SequenceName};
use longjoin::path::{total_query_length, Fragment};
use longjoin::range::Range;
use longjoin::split::{ensure_drained, split_chains, split_query};
use longjoin::store::{ChainIdAllocator, FragmentStore, InMemoryStore};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

fn hit(id: u64, qs: u32, qe: u32, identity: f64) -> Fragment {
    Fragment::new(
        ChainId(id),
        Range::new("chr1", qs, qe),
        Range::new("TE1", 1, qe - qs + 1),
        1e-30,
        200,
        identity,
    )
}

#[test]
fn test_split_around_younger_insertion() {
    let (out, records) = split_chains(
        vec![hit(1, 1000, 1999, 70.0), hit(1, 2101, 5000, 70.0)],
        vec![hit(50, 2000, 2100, 95.0)],
        &JoinConfig::default(),
    )
    .unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].query, Range::new("chr1", 1000, 1999));
    assert_eq!(out[0].chain_id, ChainId(1));
    assert_eq!(out[1].query, Range::new("chr1", 2101, 5000));
    assert_eq!(out[1].chain_id, ChainId(51));

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].resulting_ids, vec![ChainId(1), ChainId(51)]);
    assert_eq!(records[0].evidence, vec![ChainId(50)]);
    assert!(records[0].was_split());
}

#[test]
fn test_single_fragment_chain_untouched() {
    let (out, records) = split_chains(
        vec![hit(7, 1000, 5000, 70.0)],
        vec![hit(50, 2000, 2100, 95.0)],
        &JoinConfig::default(),
    )
    .unwrap();
    assert_eq!(out, vec![hit(7, 1000, 5000, 70.0)]);
    assert!(!records[0].was_split());
}

#[test]
fn test_split_order_changes_evidence() {
    // Chain 2 is short and old; chain 1 is long and younger
    let fragments = vec![
        hit(1, 1000, 1099, 90.0),
        hit(1, 3000, 3999, 90.0),
        hit(2, 1200, 1350, 60.0),
    ];

    let by_identity = JoinConfig::default();
    let (out, _) = split_chains(fragments.clone(), Vec::new(), &by_identity).unwrap();
    let ids: BTreeSet<u64> = out.iter().map(|f| f.chain_id.get()).collect();
    assert_eq!(ids.len(), 3, "chain 1 should be split around chain 2");

    let by_length = JoinConfig {
        split_order: SplitOrder::DescendingLength,
        ..Default::default()
    };
    let (out, _) = split_chains(fragments, Vec::new(), &by_length).unwrap();
    let ids: BTreeSet<u64> = out.iter().map(|f| f.chain_id.get()).collect();
    assert_eq!(ids, BTreeSet::from([1, 2]));
}

#[test]
fn test_fresh_ids_shared_between_queries() {
    let chr1 = SequenceName::from("chr1");
    let chr2 = SequenceName::from("chr2");
    let on = |query: &str, id: u64, qs: u32, qe: u32| {
        Fragment::new(
            ChainId(id),
            Range::new(query, qs, qe),
            Range::new("TE1", 1, qe - qs + 1),
            0.0,
            1,
            70.0,
        )
    };

    let allocator = ChainIdAllocator::starting_at(ChainId(100));
    let mut fresh = Vec::new();
    for (query, id) in [(&chr1, 1), (&chr2, 2)] {
        let mut input = InMemoryStore::from_fragments(vec![
            on(query.as_str(), id, 1000, 1999),
            on(query.as_str(), id, 2101, 5000),
        ])
        .unwrap();
        let mut output =
            InMemoryStore::from_fragments(vec![on(query.as_str(), 50, 2000, 2100)]).unwrap();
        let (_, records) = split_query(
            &mut input,
            &mut output,
            query,
            &allocator,
            &JoinConfig::default(),
        )
        .unwrap();
        ensure_drained(&input).unwrap();
        fresh.extend(records[0].resulting_ids[1..].iter().copied());
    }
    assert_eq!(fresh, vec![ChainId(100), ChainId(101)]);
}

#[test]
fn test_working_store_drained_after_split() {
    let mut input = InMemoryStore::from_fragments(vec![
        hit(1, 100, 200, 80.0),
        hit(2, 500, 900, 85.0),
        hit(2, 1200, 1300, 85.0),
    ])
    .unwrap();
    let mut output = InMemoryStore::new();
    let allocator = ChainIdAllocator::starting_at(input.get_new_id().unwrap());
    split_query(
        &mut input,
        &mut output,
        &SequenceName::from("chr1"),
        &allocator,
        &JoinConfig::default(),
    )
    .unwrap();

    assert!(input.is_empty());
    assert!(ensure_drained(&input).is_ok());
    assert_eq!(output.len(), 3);
}

fn chain_strategy() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((1u32..20_000, 1u32..800), 1..6)
}

/// Property: split output length equals input length minus dropped sub-chains
#[test]
fn prop_split_conserves_length() {
    proptest!(|(
        chains in prop::collection::vec((chain_strategy(), 50.0f64..100.0), 1..6),
        finalized in prop::collection::vec((1u32..20_000, 1u32..2_000), 0..6)
    )| {
        let mut fragments = Vec::new();
        for (i, (pieces, identity)) in chains.iter().enumerate() {
            for &(start, len) in pieces {
                fragments.push(hit(i as u64 + 1, start, start + len - 1, *identity));
            }
        }
        let reference: Vec<Fragment> = finalized
            .iter()
            .enumerate()
            .map(|(i, &(start, len))| hit(1000 + i as u64, start, start + len - 1, 99.0))
            .collect();

        let before = total_query_length(&fragments);
        let input_ids: BTreeSet<ChainId> = fragments.iter().map(|f| f.chain_id).collect();
        let highest = fragments
            .iter()
            .chain(reference.iter())
            .map(|f| f.chain_id)
            .max()
            .unwrap_or_default();
        let (out, records) =
            split_chains(fragments, reference, &JoinConfig::default()).unwrap();

        let dropped: u64 = records.iter().map(|r| r.dropped_length).sum();
        prop_assert_eq!(total_query_length(&out), before - dropped);
        prop_assert_eq!(records.len(), input_ids.len());

        // Fresh ids never collide with ids already in use
        let mut owner: BTreeMap<ChainId, ChainId> = BTreeMap::new();
        for r in &records {
            for &id in &r.resulting_ids {
                prop_assert!(owner.insert(id, r.chain_id).is_none(), "id {} reused", id);
                prop_assert!(id == r.chain_id || id > highest);
            }
        }
    });
}
