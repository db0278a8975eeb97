//! Sweep-line algebra over lists of ranges.
//!
//! Ranges on different sequences never interact; each function groups its
//! input by sequence name before sweeping.

use crate::ids::{ChainId, SequenceName};
use crate::path::NamedRegion;
use crate::range::Range;
use crate::union_find::UnionFind;
use std::collections::BTreeMap;

/// Merge overlapping ranges into pairwise non-overlapping envelopes.
///
/// Input is sorted by `(min, longest first)`; each range either extends the
/// last emitted envelope on its sequence or is emitted as a new one.
pub fn merge_all(ranges: &[Range]) -> Vec<Range> {
    let mut sorted: Vec<&Range> = ranges.iter().filter(|r| !r.is_empty()).collect();
    sorted.sort_by(|a, b| {
        a.seqname
            .cmp(&b.seqname)
            .then(a.min().cmp(&b.min()))
            .then(b.length().cmp(&a.length()))
    });

    sorted.into_iter().fold(Vec::new(), |mut merged: Vec<Range>, r| {
        match merged.last_mut() {
            Some(last) if last.overlaps(r) => last.merge(r),
            _ => merged.push(r.clone()),
        }
        merged
    })
}

/// Cumulative length of a list of ranges
pub fn total_length(ranges: &[Range]) -> u64 {
    ranges.iter().map(|r| r.length() as u64).sum()
}

/// Bases covered at least once by `ranges`
pub fn covered_length(ranges: &[Range]) -> u64 {
    total_length(&merge_all(ranges))
}

fn by_sequence<'a, T, F>(items: &'a [T], range_of: F) -> BTreeMap<SequenceName, Vec<&'a T>>
where
    F: Fn(&T) -> &Range,
{
    let mut groups: BTreeMap<SequenceName, Vec<&T>> = BTreeMap::new();
    for item in items {
        let r = range_of(item);
        if r.is_empty() {
            continue;
        }
        groups.entry(r.seqname.clone()).or_default().push(item);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|item| (range_of(item).min(), range_of(item).max()));
    }
    groups
}

/// Two-pointer sweep over two sorted lists of one sequence.
///
/// Calls `on_overlap` for every overlapping pair.
fn sweep_pairs<'a, T, F, G>(list1: &[&'a T], list2: &[&'a T], range_of: F, mut on_overlap: G)
where
    F: Fn(&T) -> &Range,
    G: FnMut(&'a T, &'a T),
{
    let mut first = 0;
    for &a in list1 {
        let ra = range_of(a);
        while first < list2.len() && range_of(list2[first]).max() < ra.min() {
            first += 1;
        }
        for &b in &list2[first..] {
            let rb = range_of(b);
            if rb.min() > ra.max() {
                break;
            }
            if ra.overlaps(rb) {
                on_overlap(a, b);
            }
        }
    }
}

/// Sum of `overlap_length` over every overlapping cross-list pair
pub fn overlap_length_between(list1: &[Range], list2: &[Range]) -> u64 {
    let groups1 = by_sequence(list1, |r| r);
    let groups2 = by_sequence(list2, |r| r);

    let mut total = 0u64;
    for (seq, g1) in &groups1 {
        if let Some(g2) = groups2.get(seq) {
            sweep_pairs(g1, g2, |r| r, |a, b| total += a.overlap_length(b) as u64);
        }
    }
    total
}

/// Equivalence classes of ids connected through cross-list overlaps.
///
/// Two ids share a class when their regions overlap, directly or through a
/// chain of overlaps. Ids without any cross-list overlap are left out.
pub fn group_overlaps(list1: &[NamedRegion], list2: &[NamedRegion]) -> Vec<Vec<ChainId>> {
    let groups1 = by_sequence(list1, |s| &s.range);
    let groups2 = by_sequence(list2, |s| &s.range);

    let mut uf = UnionFind::new();
    for (seq, g1) in &groups1 {
        if let Some(g2) = groups2.get(seq) {
            sweep_pairs(g1, g2, |s| &s.range, |a, b| {
                uf.union(a.id, b.id);
            });
        }
    }
    uf.get_sets()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn r(start: u32, end: u32) -> Range {
        Range::new("chr1", start, end)
    }

    fn region(id: u64, start: u32, end: u32) -> NamedRegion {
        NamedRegion::new(ChainId(id), "TE", r(start, end))
    }

    #[test]
    fn test_merge_all() {
        let merged = merge_all(&[r(300, 400), r(100, 200), r(150, 250), r(100, 120), r(500, 600)]);
        assert_eq!(merged, vec![r(100, 250), r(300, 400), r(500, 600)]);
    }

    #[test]
    fn test_merge_all_keeps_sequences_apart() {
        let merged = merge_all(&[r(100, 200), Range::new("chr2", 150, 250)]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_all_adjacent_not_merged() {
        let merged = merge_all(&[r(100, 200), r(201, 300)]);
        assert_eq!(merged.len(), 2);
        assert_eq!(covered_length(&[r(100, 200), r(150, 300)]), 201);
    }

    #[test]
    fn test_overlap_length_between() {
        let a = vec![r(100, 200), r(300, 400)];
        let b = vec![r(150, 350), r(390, 500), r(1000, 1100)];
        assert_eq!(overlap_length_between(&a, &b), 51 + 51 + 11);
        assert_eq!(overlap_length_between(&b, &a), 51 + 51 + 11);
    }

    #[test]
    fn test_overlap_length_long_range_first() {
        // A long range before shorter ones must not be skipped
        let a = vec![r(100, 150), r(400, 450)];
        let b = vec![r(1, 1000), r(120, 130)];
        assert_eq!(overlap_length_between(&a, &b), 51 + 11 + 51);
    }

    #[test]
    fn test_group_overlaps() {
        let list1 = vec![region(1, 100, 200), region(2, 500, 600), region(3, 900, 950)];
        let list2 = vec![region(10, 150, 550), region(11, 2000, 2100)];
        let classes = group_overlaps(&list1, &list2);
        assert_eq!(classes, vec![vec![ChainId(1), ChainId(2), ChainId(10)]]);
    }
}
