/// Power-of-ten bin classification used to prune range lookups
///
/// A range is assigned to the smallest level L in 3..=8 at which its two ends
/// fall into the same 10^L bucket. Ranges wider than every level fall back to
/// level 8, keyed by the bucket of their lower end.
use crate::ids::{ChainId, SequenceName};
use crate::path::Strand;
use std::collections::HashMap;

pub const MIN_BIN_LEVEL: u8 = 3;
pub const MAX_BIN_LEVEL: u8 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BinKey {
    pub level: u8,
    pub bucket: u64,
}

fn bin_size(level: u8) -> u64 {
    10u64.pow(level as u32)
}

impl BinKey {
    pub fn for_coords(min: u32, max: u32) -> BinKey {
        let (lo, hi) = (min as u64, max as u64);
        for level in MIN_BIN_LEVEL..=MAX_BIN_LEVEL {
            let size = bin_size(level);
            if lo / size == hi / size {
                return BinKey {
                    level,
                    bucket: lo / size,
                };
            }
        }
        BinKey {
            level: MAX_BIN_LEVEL,
            bucket: lo / bin_size(MAX_BIN_LEVEL),
        }
    }

    /// Single numeric key: level in the high bits, bucket below
    pub fn encode(&self) -> u64 {
        ((self.level as u64) << 56) | self.bucket
    }

    pub fn decode(key: u64) -> BinKey {
        BinKey {
            level: (key >> 56) as u8,
            bucket: key & ((1u64 << 56) - 1),
        }
    }
}

/// Every bin that may hold a range overlapping `[min, max]`, coarsest level first.
///
/// Level 8 also covers buckets left of the window because oversized ranges are
/// keyed by their lower end only.
pub fn query_windows(min: u32, max: u32) -> Vec<BinKey> {
    let (lo, hi) = (min.min(max) as u64, min.max(max) as u64);
    let mut keys = Vec::new();
    for level in (MIN_BIN_LEVEL..=MAX_BIN_LEVEL).rev() {
        let size = bin_size(level);
        let first = if level == MAX_BIN_LEVEL { 0 } else { lo / size };
        for bucket in first..=hi / size {
            keys.push(BinKey { level, bucket });
        }
    }
    keys
}

/// Per-level bucket counts used to narrow lookups from coarse to fine.
///
/// An entry at level `l` marks its own bucket and every enclosing bucket at
/// the coarser levels, so a fine bucket can only hold entries when its parent
/// is marked.
#[derive(Debug, Clone, Default)]
pub struct BinOccupancy {
    counts: HashMap<BinKey, usize>,
}

impl BinOccupancy {
    pub fn new() -> Self {
        Self::default()
    }

    fn ancestors(key: BinKey) -> impl Iterator<Item = BinKey> {
        (key.level..=MAX_BIN_LEVEL).map(move |level| BinKey {
            level,
            bucket: key.bucket / 10u64.pow((level - key.level) as u32),
        })
    }

    pub fn add(&mut self, key: BinKey) {
        for k in Self::ancestors(key) {
            *self.counts.entry(k).or_insert(0) += 1;
        }
    }

    pub fn remove(&mut self, key: BinKey) {
        for k in Self::ancestors(key) {
            if let Some(n) = self.counts.get_mut(&k) {
                *n -= 1;
                if *n == 0 {
                    self.counts.remove(&k);
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    fn is_marked(&self, key: &BinKey) -> bool {
        self.counts.contains_key(key)
    }

    /// Marked bins that may hold a range overlapping `[min, max]`.
    ///
    /// Always a subset of [`query_windows`]. Each level only visits the
    /// children of buckets marked at the level above.
    pub fn windows(&self, min: u32, max: u32) -> Vec<BinKey> {
        let (lo, hi) = (min.min(max) as u64, min.max(max) as u64);
        let top = bin_size(MAX_BIN_LEVEL);
        let mut keys: Vec<BinKey> = (0..=hi / top)
            .map(|bucket| BinKey {
                level: MAX_BIN_LEVEL,
                bucket,
            })
            .filter(|k| self.is_marked(k))
            .collect();
        let mut parents: Vec<u64> = keys
            .iter()
            .map(|k| k.bucket)
            .filter(|&b| b >= lo / top)
            .collect();

        for level in (MIN_BIN_LEVEL..MAX_BIN_LEVEL).rev() {
            let size = bin_size(level);
            let (first, last) = (lo / size, hi / size);
            let children: Vec<u64> = parents
                .iter()
                .flat_map(|&p| (p * 10).max(first)..=(p * 10 + 9).min(last))
                .filter(|&bucket| self.is_marked(&BinKey { level, bucket }))
                .collect();
            keys.extend(children.iter().map(|&bucket| BinKey { level, bucket }));
            parents = children;
        }
        keys
    }
}

/// Derived lookup record; the fragment table stays authoritative
#[derive(Debug, Clone, PartialEq)]
pub struct BinEntry {
    pub row: u64,
    pub chain_id: ChainId,
    pub bin: BinKey,
    pub sequence_name: SequenceName,
    pub min: u32,
    pub max: u32,
    pub strand: Strand,
}

impl BinEntry {
    pub fn overlaps(&self, min: u32, max: u32) -> bool {
        self.min <= max && self.max >= min
    }

    /// Containment with shared endpoints allowed
    pub fn is_included_in(&self, min: u32, max: u32) -> bool {
        self.min >= min && self.max <= max
    }
}
