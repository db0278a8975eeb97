//! Directed coordinate range on a named sequence.
//!
//! Coordinates are 1-based and inclusive. Orientation is implicit:
//! `start <= end` is the direct strand, `start > end` the reverse strand.
//! `(0, 0)` is the empty sentinel and never a valid 1-bp range.

use crate::bin_index::BinKey;
use crate::ids::SequenceName;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_till1};
use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map_res};
use nom::sequence::tuple;
use nom::IResult;
use std::cmp::{max, min};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub seqname: SequenceName,
    pub start: u32,
    pub end: u32,
}

impl Range {
    pub fn new(seqname: impl Into<SequenceName>, start: u32, end: u32) -> Self {
        Range {
            seqname: seqname.into(),
            start,
            end,
        }
    }

    /// Empty sentinel on `seqname`
    pub fn empty(seqname: impl Into<SequenceName>) -> Self {
        Range::new(seqname, 0, 0)
    }

    /// Range spanning `[lo, hi]` with the given orientation
    fn oriented(seqname: SequenceName, lo: u32, hi: u32, direct: bool) -> Self {
        if direct {
            Range::new(seqname, lo, hi)
        } else {
            Range::new(seqname, hi, lo)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    pub fn is_on_direct_strand(&self) -> bool {
        self.start <= self.end
    }

    pub fn min(&self) -> u32 {
        min(self.start, self.end)
    }

    pub fn max(&self) -> u32 {
        max(self.start, self.end)
    }

    pub fn length(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.max() - self.min() + 1
        }
    }

    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
    }

    pub fn reversed(&self) -> Range {
        Range::new(self.seqname.clone(), self.end, self.start)
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        self.seqname == other.seqname
            && !self.is_empty()
            && !other.is_empty()
            && other.min() <= self.max()
            && other.max() >= self.min()
    }

    pub fn overlap_length(&self, other: &Range) -> u32 {
        if !self.overlaps(other) {
            return 0;
        }
        min(self.max(), other.max()) - max(self.min(), other.min()) + 1
    }

    /// True when `self` lies within `other` (shared endpoints allowed)
    pub fn is_included_in(&self, other: &Range) -> bool {
        self.seqname == other.seqname
            && !self.is_empty()
            && !other.is_empty()
            && self.min() >= other.min()
            && self.max() <= other.max()
    }

    /// Strand-aware distance between nearer endpoints.
    ///
    /// Adjacent ranges are at distance 1; overlapping ranges give the negated
    /// overlap length. `None` when the ranges sit on different sequences or
    /// different orientations.
    pub fn distance(&self, other: &Range) -> Option<i64> {
        if self.seqname != other.seqname
            || self.is_on_direct_strand() != other.is_on_direct_strand()
            || self.is_empty()
            || other.is_empty()
        {
            return None;
        }
        if self.overlaps(other) {
            return Some(-(self.overlap_length(other) as i64));
        }
        if self.max() < other.min() {
            Some(other.min() as i64 - self.max() as i64)
        } else {
            Some(self.min() as i64 - other.max() as i64)
        }
    }

    /// Extend `self` to the envelope of both ranges, keeping `self`'s orientation
    pub fn merge(&mut self, other: &Range) {
        if other.is_empty() {
            return;
        }
        if self.is_empty() {
            let direct = other.is_on_direct_strand();
            *self = Range::oriented(other.seqname.clone(), other.min(), other.max(), direct);
            return;
        }
        let direct = self.is_on_direct_strand();
        let lo = min(self.min(), other.min());
        let hi = max(self.max(), other.max());
        *self = Range::oriented(self.seqname.clone(), lo, hi, direct);
    }

    /// Remove the part of `self` covered by `other`.
    ///
    /// Returns the remainder (the empty sentinel when fully covered) and, when
    /// `other` falls strictly inside `self`, the right-hand piece.
    pub fn diff(&self, other: &Range) -> (Range, Option<Range>) {
        if !self.overlaps(other) {
            return (self.clone(), None);
        }
        let direct = self.is_on_direct_strand();
        let left = (other.min() > self.min())
            .then(|| Range::oriented(self.seqname.clone(), self.min(), other.min() - 1, direct));
        let right = (other.max() < self.max())
            .then(|| Range::oriented(self.seqname.clone(), other.max() + 1, self.max(), direct));

        match (left, right) {
            (Some(l), Some(r)) => (l, Some(r)),
            (Some(l), None) => (l, None),
            (None, Some(r)) => (r, None),
            (None, None) => (Range::empty(self.seqname.clone()), None),
        }
    }

    pub fn bin(&self) -> BinKey {
        BinKey::for_coords(self.min(), self.max())
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}..{}", self.seqname, self.start, self.end)
    }
}

fn coordinate(input: &str) -> IResult<&str, u32> {
    map_res(digit1, str::parse::<u32>)(input)
}

fn region(input: &str) -> IResult<&str, (&str, char, u32, &str, u32)> {
    tuple((
        take_till1(|c| c == ':'),
        char(':'),
        coordinate,
        alt((tag(".."), tag("-"))),
        coordinate,
    ))(input)
}

impl FromStr for Range {
    type Err = String;

    /// Parse `name:start-end` or `name:start..end`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (_, (name, _, start, _, end)) = all_consuming(region)(s.trim())
            .map_err(|e| format!("Invalid region '{s}': {e}"))?;
        Ok(Range::new(name, start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u32, end: u32) -> Range {
        Range::new("chr1", start, end)
    }

    #[test]
    fn test_length_and_strand() {
        assert_eq!(r(100, 200).length(), 101);
        assert_eq!(r(200, 100).length(), 101);
        assert!(r(100, 200).is_on_direct_strand());
        assert!(!r(200, 100).is_on_direct_strand());
        assert_eq!(Range::empty("chr1").length(), 0);
        assert!(Range::empty("chr1").is_empty());
        assert!(!r(1, 1).is_empty());
    }

    #[test]
    fn test_overlap() {
        assert!(r(100, 200).overlaps(&r(200, 300)));
        assert!(!r(100, 200).overlaps(&r(201, 300)));
        assert!(r(100, 200).overlaps(&r(250, 150)));
        assert!(!r(100, 200).overlaps(&Range::new("chr2", 100, 200)));
        assert_eq!(r(100, 200).overlap_length(&r(150, 400)), 51);
        assert_eq!(r(100, 200).overlap_length(&r(300, 400)), 0);
    }

    #[test]
    fn test_inclusion() {
        assert!(r(120, 180).is_included_in(&r(100, 200)));
        assert!(r(100, 200).is_included_in(&r(100, 200)));
        assert!(!r(90, 180).is_included_in(&r(100, 200)));
    }

    #[test]
    fn test_distance() {
        assert_eq!(r(100, 200).distance(&r(201, 300)), Some(1));
        assert_eq!(r(201, 300).distance(&r(100, 200)), Some(1));
        assert_eq!(r(100, 200).distance(&r(186, 300)), Some(-15));
        assert_eq!(r(200, 100).distance(&r(50, 10)), Some(50));
        assert_eq!(r(100, 200).distance(&r(300, 250)), None);
    }

    #[test]
    fn test_merge_keeps_orientation() {
        let mut a = r(300, 200);
        a.merge(&r(100, 150));
        assert_eq!(a, r(300, 100));

        let mut e = Range::empty("chr1");
        e.merge(&r(10, 20));
        assert_eq!(e, r(10, 20));
    }

    #[test]
    fn test_diff() {
        let (left, right) = r(100, 200).diff(&r(140, 160));
        assert_eq!(left, r(100, 139));
        assert_eq!(right, Some(r(161, 200)));

        let (rest, none) = r(100, 200).diff(&r(150, 250));
        assert_eq!(rest, r(100, 149));
        assert!(none.is_none());

        let (rest, _) = r(200, 100).diff(&r(50, 150));
        assert_eq!(rest, r(200, 151));

        let (rest, _) = r(100, 200).diff(&r(50, 250));
        assert!(rest.is_empty());

        let (same, _) = r(100, 200).diff(&r(300, 400));
        assert_eq!(same, r(100, 200));
    }

    #[test]
    fn test_parse_region() {
        let a: Range = "chr1:100-200".parse().unwrap();
        assert_eq!(a, r(100, 200));
        let b: Range = "scaffold_3:500..20".parse().unwrap();
        assert_eq!(b, Range::new("scaffold_3", 500, 20));
        assert!("chr1:100".parse::<Range>().is_err());
        assert!("chr1:abc-200".parse::<Range>().is_err());
        assert_eq!(a.to_string().parse::<Range>().unwrap(), a);
    }
}
