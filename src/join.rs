//! Long join: stitch adjacent fragments of one query/subject pair into chains.
//!
//! Fragments are grouped by subject and relative strand, then walked in
//! ascending query order. The chain built so far is summarised by an
//! envelope; each fragment of a different chain is tested against that
//! envelope and either merged into it or starts a new envelope.
//!
//! Reverse-strand groups are walked with mirrored subject coordinates so the
//! same diagonal arithmetic applies to both strands. The mirror only lives
//! in the envelopes; stored rows change nothing but their chain id.

use crate::config::JoinConfig;
use crate::decision::{DenyReason, JoinDecision, JoinOutcome};
use crate::error::{LongJoinError, Result};
use crate::ids::{ChainId, SequenceName};
use crate::path::{Fragment, Strand};
use crate::range::Range;
use crate::range_set::covered_length;
use crate::store::{ChainRangeView, FragmentStore, InMemoryStore};
use crate::union_find::UnionFind;
use log::{debug, info};
use std::collections::BTreeMap;

/// Query and subject footprint of a chain under construction
#[derive(Debug, Clone, PartialEq)]
pub struct ChainEnvelope {
    pub chain_id: ChainId,
    pub query: Range,
    pub subject: Range,
    identity_sum: f64,
    length: u64,
}

impl ChainEnvelope {
    pub fn new(chain_id: ChainId, query: Range, subject: Range, identity: f64) -> Self {
        let length = query.length() as u64;
        ChainEnvelope {
            chain_id,
            query,
            subject,
            identity_sum: identity * length as f64,
            length,
        }
    }

    fn of_fragment(fragment: &Fragment, chain_id: ChainId) -> Self {
        ChainEnvelope::new(
            chain_id,
            fragment.query.clone(),
            fragment.subject.clone(),
            fragment.identity,
        )
    }

    /// Length-weighted identity of everything absorbed so far
    pub fn identity(&self) -> f64 {
        if self.length == 0 {
            0.0
        } else {
            self.identity_sum / self.length as f64
        }
    }

    pub fn absorb(&mut self, other: &ChainEnvelope) {
        self.query.merge(&other.query);
        self.subject.merge(&other.subject);
        self.identity_sum += other.identity_sum;
        self.length += other.length;
    }

    /// Weighted identity of both envelopes taken together
    pub fn mean_identity_with(&self, other: &ChainEnvelope) -> f64 {
        let length = self.length + other.length;
        if length == 0 {
            0.0
        } else {
            (self.identity_sum + other.identity_sum) / length as f64
        }
    }
}

fn distance_or_err(a: &Range, b: &Range, chain: ChainId) -> Result<i64> {
    a.distance(b).ok_or_else(|| {
        LongJoinError::consistency("join attempted across ranges on mismatched strands")
            .with_chain(chain)
            .with_query(&a.seqname)
            .with_range(b)
    })
}

/// Decide whether `cur` may be merged into `prev`.
///
/// Checks run in a fixed order and stop at the first refusal.
pub fn evaluate_pair<V: ChainRangeView + ?Sized>(
    view: &V,
    prev: &ChainEnvelope,
    cur: &ChainEnvelope,
    config: &JoinConfig,
) -> Result<JoinOutcome> {
    use DenyReason::*;

    if cur.query.start == prev.query.start || cur.query.end == prev.query.end {
        return Ok(JoinOutcome::Deny(IdenticalBoundary));
    }

    let dist_q = distance_or_err(&prev.query, &cur.query, cur.chain_id)?;
    let dist_s = distance_or_err(&prev.subject, &cur.subject, cur.chain_id)?;

    if dist_q > config.max_gap_length_for_query as i64 {
        return Ok(JoinOutcome::Deny(QueryGapTooLong));
    }
    if dist_s > config.max_gap_length_for_subject as i64 {
        return Ok(JoinOutcome::Deny(SubjectGapTooLong));
    }

    let max_overlap = config.max_overlap as i64;
    if dist_q < -max_overlap {
        return Ok(JoinOutcome::Deny(QueryOverlap));
    }
    if dist_s < -max_overlap {
        return Ok(JoinOutcome::Deny(SubjectOverlap));
    }

    let diag1 = prev.subject.max() as i64 - prev.query.max() as i64;
    let diag2 = cur.subject.min() as i64 - cur.query.min() as i64;
    let gap = diag1 - diag2;
    let mismatch = if gap > 0 { dist_s } else { dist_q };
    if mismatch > config.max_mismatch_length as i64 {
        return Ok(JoinOutcome::Deny(MismatchTooLong));
    }

    let mean_identity = prev.mean_identity_with(cur);
    if (prev.identity() - mean_identity).abs() > config.identity_tolerance
        || (cur.identity() - mean_identity).abs() > config.identity_tolerance
    {
        return Ok(JoinOutcome::Deny(IdentityDivergence));
    }

    if gap.abs() <= config.max_gap_length as i64 {
        return Ok(JoinOutcome::AllowSimple);
    }

    nested_outcome(view, prev, cur, mean_identity, config)
}

/// Long gap: only join across it when a younger element fills it
fn nested_outcome<V: ChainRangeView + ?Sized>(
    view: &V,
    prev: &ChainEnvelope,
    cur: &ChainEnvelope,
    identity_checked: f64,
    config: &JoinConfig,
) -> Result<JoinOutcome> {
    let lo = prev.query.max() + 1;
    let hi = cur.query.min().saturating_sub(1);
    if lo > hi {
        return Ok(JoinOutcome::Deny(DenyReason::NoNestedElement));
    }

    let nested: Vec<Fragment> = view
        .fragments_included_in(&prev.query.seqname, lo, hi)?
        .into_iter()
        .filter(|f| f.chain_id != prev.chain_id && f.chain_id != cur.chain_id)
        .collect();
    if nested.is_empty() {
        return Ok(JoinOutcome::Deny(DenyReason::NoNestedElement));
    }

    let identity_nested = nested.iter().map(|f| f.identity).sum::<f64>() / nested.len() as f64;
    if identity_nested < identity_checked
        && identity_checked - identity_nested > config.identity_tolerance
    {
        return Ok(JoinOutcome::Deny(DenyReason::NestedOlder));
    }

    let footprints: Vec<Range> = nested.iter().map(|f| f.query.clone()).collect();
    let coverage = covered_length(&footprints) as f64 / (hi - lo + 1) as f64;
    if coverage < config.min_nested_te_coverage {
        return Ok(JoinOutcome::Deny(DenyReason::NestedCoverage));
    }
    Ok(JoinOutcome::AllowNested)
}

/// Flip reverse-strand subjects onto the direct strand: s' = M - s
fn mirror_subjects(fragments: &mut [Fragment]) {
    let Some(mirror) = fragments.iter().map(|f| f.subject.max() + 1).max() else {
        return;
    };
    for f in fragments.iter_mut() {
        f.subject = Range::new(
            f.subject.seqname.clone(),
            mirror - f.subject.start,
            mirror - f.subject.end,
        );
    }
}

/// Join the chains of one query in place.
///
/// Returns one decision per evaluated pair, in evaluation order.
pub fn join_query<S>(
    store: &mut S,
    query: &SequenceName,
    config: &JoinConfig,
) -> Result<Vec<JoinDecision>>
where
    S: FragmentStore + ChainRangeView,
{
    let mut groups: BTreeMap<(SequenceName, Strand), Vec<Fragment>> = BTreeMap::new();
    for f in store.fragments()? {
        if f.query_name() != query {
            continue;
        }
        if !f.is_normalized() {
            return Err(
                LongJoinError::consistency("fragment reached the join with a reverse query")
                    .with_chain(f.chain_id)
                    .with_query(query)
                    .with_range(&f.query),
            );
        }
        groups
            .entry((f.subject_name().clone(), f.strand()))
            .or_default()
            .push(f);
    }

    let mut aliases = UnionFind::new();
    let mut decisions = Vec::new();
    for ((subject, strand), mut group) in groups {
        if strand == Strand::Reverse {
            mirror_subjects(&mut group);
        }
        group.sort_by_key(|f| (f.query.min(), f.query.max(), f.chain_id));

        let mut current: Option<ChainEnvelope> = None;
        for f in &group {
            let id = aliases.find(f.chain_id);
            let next = ChainEnvelope::of_fragment(f, id);
            match current.as_mut() {
                None => current = Some(next),
                Some(prev) if prev.chain_id == id => prev.absorb(&next),
                Some(prev) => {
                    let outcome = evaluate_pair(&*store, prev, &next, config)?;
                    debug!(
                        "{} vs {} {}: chain {} {} + chain {} {} -> {}",
                        query, subject, strand, prev.chain_id, prev.query, id, next.query, outcome
                    );
                    decisions.push(JoinDecision {
                        query: query.clone(),
                        subject: subject.clone(),
                        strand,
                        prev_chain: prev.chain_id,
                        cur_chain: id,
                        prev_range: prev.query.clone(),
                        cur_range: next.query.clone(),
                        outcome,
                    });

                    if outcome.is_allowed() {
                        let winner = aliases.union(prev.chain_id, id);
                        let loser = if winner == id { prev.chain_id } else { id };
                        store.change_id(loser, winner)?;
                        prev.absorb(&next);
                        prev.chain_id = winner;
                    } else {
                        *prev = next;
                    }
                }
            }
        }
    }
    Ok(decisions)
}

/// Join a whole fragment list, query by query
pub fn long_join(
    fragments: Vec<Fragment>,
    config: &JoinConfig,
) -> Result<(Vec<Fragment>, Vec<JoinDecision>)> {
    let mut store = InMemoryStore::from_fragments(fragments)?;
    let mut decisions = Vec::new();
    for query in store.distinct_queries()? {
        decisions.extend(join_query(&mut store, &query, config)?);
    }
    info!(
        "Long join: {} pair decisions, {} chains remain",
        decisions.len(),
        store.chain_ids().len()
    );
    Ok((store.into_fragments(), decisions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(id: u64, qs: u32, qe: u32, ss: u32, se: u32, identity: f64) -> ChainEnvelope {
        ChainEnvelope::new(
            ChainId(id),
            Range::new("chr1", qs, qe),
            Range::new("TE1", ss, se),
            identity,
        )
    }

    fn evaluate(prev: &ChainEnvelope, cur: &ChainEnvelope) -> JoinOutcome {
        evaluate_pair(&InMemoryStore::new(), prev, cur, &JoinConfig::default()).unwrap()
    }

    #[test]
    fn test_identical_boundary() {
        let prev = envelope(1, 100, 200, 1, 101, 90.0);
        let cur = envelope(2, 100, 300, 102, 302, 90.0);
        assert_eq!(
            evaluate(&prev, &cur),
            JoinOutcome::Deny(DenyReason::IdenticalBoundary)
        );
    }

    #[test]
    fn test_subject_gap_too_long() {
        let prev = envelope(1, 100, 200, 1, 101, 90.0);
        let cur = envelope(2, 301, 400, 40_000, 40_099, 90.0);
        assert_eq!(
            evaluate(&prev, &cur),
            JoinOutcome::Deny(DenyReason::SubjectGapTooLong)
        );
    }

    #[test]
    fn test_mismatch_too_long() {
        let prev = envelope(1, 100, 200, 100, 200, 90.0);
        let cur = envelope(2, 2000, 2100, 800, 900, 90.0);
        assert_eq!(
            evaluate(&prev, &cur),
            JoinOutcome::Deny(DenyReason::MismatchTooLong)
        );
    }

    #[test]
    fn test_identity_divergence() {
        let prev = envelope(1, 100, 200, 100, 200, 95.0);
        let cur = envelope(2, 201, 301, 201, 301, 80.0);
        assert_eq!(
            evaluate(&prev, &cur),
            JoinOutcome::Deny(DenyReason::IdentityDivergence)
        );
    }

    #[test]
    fn test_mean_identity_is_symmetric() {
        let a = envelope(1, 100, 200, 100, 200, 95.0);
        let b = envelope(2, 201, 500, 201, 500, 81.5);
        assert_eq!(a.mean_identity_with(&b), b.mean_identity_with(&a));
    }

    #[test]
    fn test_reverse_strand_pass() {
        // Subject runs backwards while the query advances
        let fragments = vec![
            Fragment::new(
                ChainId(4),
                Range::new("chr1", 100, 200),
                Range::new("TE1", 400, 300),
                0.0,
                10,
                90.0,
            ),
            Fragment::new(
                ChainId(7),
                Range::new("chr1", 201, 300),
                Range::new("TE1", 299, 200),
                0.0,
                10,
                90.0,
            ),
        ];
        let (joined, decisions) = long_join(fragments, &JoinConfig::default()).unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].outcome, JoinOutcome::AllowSimple);
        assert_eq!(decisions[0].strand, Strand::Reverse);
        assert!(joined.iter().all(|f| f.chain_id == ChainId(4)));
        // Stored subjects keep their orientation
        assert_eq!(joined[1].subject, Range::new("TE1", 299, 200));
    }
}
