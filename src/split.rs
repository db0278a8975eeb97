//! Split chains that were joined across a younger nested insertion.
//!
//! Chains move from an input (working) store to an output store one at a
//! time. Lookups for nested material only ever read the output store, so a
//! chain is judged against finalized chains and chains already moved, never
//! against rows still being processed.

use crate::config::{JoinConfig, SplitOrder};
use crate::decision::SplitRecord;
use crate::error::{LongJoinError, Result};
use crate::ids::{ChainId, SequenceName};
use crate::path::{total_query_length, Fragment, NamedRegion};
use crate::range::Range;
use crate::range_set::group_overlaps;
use crate::store::{ChainIdAllocator, ChainRangeView, FragmentStore, InMemoryStore};
use log::{debug, info, warn};
use std::collections::BTreeSet;

/// Chains of `query` in processing order
fn chain_order<I: FragmentStore + ?Sized>(
    input: &I,
    query: &SequenceName,
    order: SplitOrder,
) -> Result<Vec<ChainId>> {
    Ok(match order {
        SplitOrder::AscendingIdentity => input
            .chains_sorted_by_ascending_weighted_identity(query)?
            .into_iter()
            .map(|(id, _)| id)
            .collect(),
        SplitOrder::DescendingLength => input
            .chains_sorted_by_descending_length(query)?
            .into_iter()
            .map(|(id, _)| id)
            .collect(),
    })
}

/// Fragments of one chain cut at every gap filled by finalized material
struct Partition {
    groups: Vec<Vec<Fragment>>,
    gaps: Vec<Range>,
    evidence: Vec<Fragment>,
}

fn partition_chain<O: ChainRangeView + ?Sized>(
    output: &O,
    query: &SequenceName,
    fragments: Vec<Fragment>,
    config: &JoinConfig,
) -> Result<Partition> {
    let min_split = config.min_length_to_split as u64;
    let mut partition = Partition {
        groups: Vec::new(),
        gaps: Vec::new(),
        evidence: Vec::new(),
    };
    let mut running_max: Option<u32> = None;

    for f in fragments {
        let boundary = match running_max {
            Some(reach) if f.query.min() > reach.saturating_add(1) => {
                let (lo, hi) = (reach + 1, f.query.min() - 1);
                if (hi - lo + 1) as u64 > min_split {
                    let inside = output.fragments_included_in(query, lo, hi)?;
                    if total_query_length(&inside) > min_split {
                        partition.gaps.push(Range::new(query.clone(), lo, hi));
                        partition.evidence.extend(inside);
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            _ => false,
        };
        running_max = Some(running_max.map_or(f.query.max(), |m| m.max(f.query.max())));

        if boundary || partition.groups.is_empty() {
            partition.groups.push(vec![f]);
        } else if let Some(group) = partition.groups.last_mut() {
            group.push(f);
        }
    }
    Ok(partition)
}

/// Chain ids of finalized material connected to the split gaps
fn evidence_ids(chain_id: ChainId, gaps: &[Range], evidence: &[Fragment]) -> Vec<ChainId> {
    let gap_regions: Vec<NamedRegion> = gaps
        .iter()
        .map(|g| NamedRegion::new(chain_id, g.seqname.clone(), g.clone()))
        .collect();
    let found: Vec<NamedRegion> = evidence.iter().map(|f| f.to_region()).collect();

    let ids: BTreeSet<ChainId> = group_overlaps(&gap_regions, &found)
        .into_iter()
        .flatten()
        .filter(|&id| id != chain_id)
        .collect();
    ids.into_iter().collect()
}

/// Move every chain of `query` from `input` to `output`, splitting as needed.
///
/// Returns the fragments written to `output` by this call and one record per
/// chain examined.
pub fn split_query<I, O>(
    input: &mut I,
    output: &mut O,
    query: &SequenceName,
    allocator: &ChainIdAllocator,
    config: &JoinConfig,
) -> Result<(Vec<Fragment>, Vec<SplitRecord>)>
where
    I: FragmentStore + ?Sized,
    O: FragmentStore + ChainRangeView + ?Sized,
{
    let mut emitted = Vec::new();
    let mut records = Vec::new();

    for chain_id in chain_order(&*input, query, config.split_order)? {
        let fragments = input.fragments_by_chain(chain_id)?;
        if fragments.len() == 1 {
            input.delete_by_id(chain_id)?;
            output.insert_all(fragments.clone())?;
            emitted.extend(fragments);
            records.push(SplitRecord {
                query: query.clone(),
                chain_id,
                resulting_ids: vec![chain_id],
                dropped_fragments: 0,
                dropped_length: 0,
                evidence: Vec::new(),
            });
            continue;
        }

        let partition = partition_chain(&*output, query, fragments, config)?;
        let was_partitioned = partition.groups.len() > 1;

        let mut resulting_ids = Vec::new();
        let mut dropped_fragments = 0;
        let mut dropped_length = 0;
        let mut survivors = Vec::new();
        for (index, mut group) in partition.groups.into_iter().enumerate() {
            let id = if index == 0 {
                chain_id
            } else {
                allocator.next_id()
            };
            let length = total_query_length(&group);
            if was_partitioned && length < config.min_length_to_keep_chain as u64 {
                warn!(
                    "Dropping {} bp sub-chain of chain {} on {} ({} fragments)",
                    length,
                    chain_id,
                    query,
                    group.len()
                );
                dropped_fragments += group.len();
                dropped_length += length;
                continue;
            }
            for f in group.iter_mut() {
                f.chain_id = id;
            }
            resulting_ids.push(id);
            survivors.extend(group);
        }

        let evidence = evidence_ids(chain_id, &partition.gaps, &partition.evidence);
        if was_partitioned {
            debug!(
                "Split chain {} on {} at {} gaps into {:?} (evidence {:?})",
                chain_id,
                query,
                partition.gaps.len(),
                resulting_ids,
                evidence
            );
        }

        input.delete_by_id(chain_id)?;
        output.insert_all(survivors.clone())?;
        emitted.extend(survivors);
        records.push(SplitRecord {
            query: query.clone(),
            chain_id,
            resulting_ids,
            dropped_fragments,
            dropped_length,
            evidence,
        });
    }
    Ok((emitted, records))
}

/// Fail when the working store still holds rows after a split run
pub fn ensure_drained<I: FragmentStore + ?Sized>(input: &I) -> Result<()> {
    if input.is_empty() {
        return Ok(());
    }
    let leftover = input.fragments()?;
    let mut err = LongJoinError::consistency(format!(
        "{} fragments left in the working store after splitting",
        input.len()
    ));
    if let Some(first) = leftover.first() {
        err = err
            .with_chain(first.chain_id)
            .with_query(first.query_name())
            .with_range(&first.query);
    }
    Err(err)
}

/// Split a whole fragment list against a set of finalized chains.
///
/// Finalized fragments serve nested lookups only and are not returned.
pub fn split_chains(
    fragments: Vec<Fragment>,
    finalized: Vec<Fragment>,
    config: &JoinConfig,
) -> Result<(Vec<Fragment>, Vec<SplitRecord>)> {
    let mut input = InMemoryStore::from_fragments(fragments)?;
    let mut output = InMemoryStore::from_fragments(finalized)?;
    let allocator =
        ChainIdAllocator::starting_at(input.get_new_id()?.max(output.get_new_id()?));

    let mut emitted = Vec::new();
    let mut records = Vec::new();
    for query in input.distinct_queries()? {
        let (fragments, splits) =
            split_query(&mut input, &mut output, &query, &allocator, config)?;
        emitted.extend(fragments);
        records.extend(splits);
    }
    ensure_drained(&input)?;

    info!(
        "Split: {} chains examined, {} split",
        records.len(),
        records.iter().filter(|r| r.was_split()).count()
    );
    crate::store::sort_fragments(&mut emitted);
    Ok((emitted, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(id: u64, qs: u32, qe: u32, identity: f64) -> Fragment {
        Fragment::new(
            ChainId(id),
            Range::new("chr1", qs, qe),
            Range::new("TE1", qs, qe),
            1e-10,
            100,
            identity,
        )
    }

    #[test]
    fn test_short_gap_is_not_examined() {
        let (out, records) = split_chains(
            vec![frag(1, 100, 200, 70.0), frag(1, 250, 400, 70.0)],
            vec![frag(9, 210, 240, 95.0)],
            &JoinConfig::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|f| f.chain_id == ChainId(1)));
        assert!(!records[0].was_split());
    }

    #[test]
    fn test_thin_evidence_does_not_split() {
        // Gap is long but the finalized material inside it is too short
        let (out, records) = split_chains(
            vec![frag(1, 100, 200, 70.0), frag(1, 601, 800, 70.0)],
            vec![frag(9, 300, 350, 95.0)],
            &JoinConfig::default(),
        )
        .unwrap();
        assert!(out.iter().all(|f| f.chain_id == ChainId(1)));
        assert_eq!(records[0].resulting_ids, vec![ChainId(1)]);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 100 bp gap filled by 100 bp of finalized material
        let (out, records) = split_chains(
            vec![frag(1, 1000, 1999, 70.0), frag(1, 2100, 5000, 70.0)],
            vec![frag(50, 2000, 2099, 95.0)],
            &JoinConfig::default(),
        )
        .unwrap();
        assert!(out.iter().all(|f| f.chain_id == ChainId(1)));
        assert!(!records[0].was_split());

        // 101 bp gap but only 100 bp of evidence inside it
        let (out, _) = split_chains(
            vec![frag(1, 1000, 1999, 70.0), frag(1, 2101, 5000, 70.0)],
            vec![frag(50, 2000, 2099, 95.0)],
            &JoinConfig::default(),
        )
        .unwrap();
        assert!(out.iter().all(|f| f.chain_id == ChainId(1)));

        // One more base on both sides splits
        let (_, records) = split_chains(
            vec![frag(1, 1000, 1999, 70.0), frag(1, 2101, 5000, 70.0)],
            vec![frag(50, 2000, 2100, 95.0)],
            &JoinConfig::default(),
        )
        .unwrap();
        assert_eq!(records[0].resulting_ids, vec![ChainId(1), ChainId(51)]);
    }

    #[test]
    fn test_small_piece_dropped_after_split() {
        let (out, records) = split_chains(
            vec![frag(3, 100, 110, 70.0), frag(3, 301, 800, 70.0)],
            vec![frag(9, 120, 290, 95.0)],
            &JoinConfig::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].query, Range::new("chr1", 301, 800));
        assert_eq!(out[0].chain_id, ChainId(10));
        assert_eq!(records[0].dropped_fragments, 1);
        assert_eq!(records[0].dropped_length, 11);
        assert_eq!(records[0].evidence, vec![ChainId(9)]);
    }

    #[test]
    fn test_ensure_drained() {
        let store = InMemoryStore::from_fragments(vec![frag(5, 10, 20, 80.0)]).unwrap();
        let err = ensure_drained(&store).unwrap_err().to_string();
        assert!(err.contains("chain 5"), "{err}");
        assert!(ensure_drained(&InMemoryStore::new()).is_ok());
    }
}
