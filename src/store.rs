//! Chain store: fragments grouped by chain id, with a bin index for range lookups.
//!
//! Two read interfaces are kept apart. [`FragmentStore`] owns the fragment
//! table and its chain-level operations; [`ChainRangeView`] answers coordinate
//! lookups. Engines take whichever they need as separate parameters.

use crate::bin_index::{BinEntry, BinKey, BinOccupancy};
use crate::error::{LongJoinError, Result};
use crate::ids::{ChainId, SequenceName};
use crate::path::{total_query_length, weighted_identity, Fragment};
use crate::range::Range;
use ordered_float::OrderedFloat;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Coordinate lookups over fragments, pruned through the bin index
pub trait ChainRangeView {
    /// Fragments whose query range overlaps `[start, end]` on `seq`
    fn fragments_overlapping(&self, seq: &SequenceName, start: u32, end: u32)
        -> Result<Vec<Fragment>>;

    /// Fragments whose query range lies entirely within `[start, end]` on `seq`.
    ///
    /// Shared endpoints count as inside; callers wanting the open interval
    /// between two ranges pass `prev.max + 1` and `cur.min - 1`.
    fn fragments_included_in(&self, seq: &SequenceName, start: u32, end: u32)
        -> Result<Vec<Fragment>>;
}

/// Fragment table grouped by chain id.
///
/// Every write keeps the bin index consistent with the table before returning.
pub trait FragmentStore {
    fn insert(&mut self, fragment: Fragment) -> Result<()>;

    fn insert_all(&mut self, fragments: Vec<Fragment>) -> Result<()> {
        for f in fragments {
            self.insert(f)?;
        }
        Ok(())
    }

    /// Remove every fragment of `id`; returns how many were removed
    fn delete_by_id(&mut self, id: ChainId) -> Result<usize>;

    fn delete_by_id_list(&mut self, ids: &[ChainId]) -> Result<usize> {
        let mut removed = 0;
        for &id in ids {
            removed += self.delete_by_id(id)?;
        }
        Ok(removed)
    }

    /// Re-point every fragment of `old` to `new`; `old` disappears
    fn change_id(&mut self, old: ChainId, new: ChainId) -> Result<()>;

    /// Fragments of one chain, ascending by query start
    fn fragments_by_chain(&self, id: ChainId) -> Result<Vec<Fragment>>;

    /// Chains of `query` with their length-weighted identity, lowest identity first
    fn chains_sorted_by_ascending_weighted_identity(
        &self,
        query: &SequenceName,
    ) -> Result<Vec<(ChainId, f64)>>;

    /// Chains of `query` with their cumulative query length, longest first
    fn chains_sorted_by_descending_length(&self, query: &SequenceName)
        -> Result<Vec<(ChainId, u64)>>;

    fn distinct_queries(&self) -> Result<Vec<SequenceName>>;

    fn distinct_subjects(&self) -> Result<Vec<SequenceName>>;

    /// One past the highest id this store has ever held
    fn get_new_id(&self) -> Result<ChainId>;

    /// Every fragment, ordered by query, subject, query start, chain id
    fn fragments(&self) -> Result<Vec<Fragment>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hands out fresh chain ids shared across parallel partitions
#[derive(Debug)]
pub struct ChainIdAllocator {
    next: AtomicU64,
}

impl ChainIdAllocator {
    /// Allocator whose first id is `first`
    pub fn starting_at(first: ChainId) -> Self {
        ChainIdAllocator {
            next: AtomicU64::new(first.get()),
        }
    }

    pub fn next_id(&self) -> ChainId {
        ChainId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

type RowId = u64;

/// In-memory chain store with a power-of-ten bin index on query coordinates
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: BTreeMap<RowId, Fragment>,
    chains: BTreeMap<ChainId, BTreeSet<RowId>>,
    bins: HashMap<(SequenceName, BinKey), Vec<BinEntry>>,
    occupancy: HashMap<SequenceName, BinOccupancy>,
    next_row: RowId,
    high_water: Option<ChainId>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fragments(fragments: Vec<Fragment>) -> Result<Self> {
        let mut store = Self::new();
        store.insert_all(fragments)?;
        Ok(store)
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        self.chains.keys().copied().collect()
    }

    pub fn contains_chain(&self, id: ChainId) -> bool {
        self.chains.contains_key(&id)
    }

    /// Query-coordinate envelope of a chain
    pub fn chain_envelope(&self, id: ChainId) -> Option<Range> {
        let rows = self.chains.get(&id)?;
        let mut envelope: Option<Range> = None;
        for row in rows {
            let q = &self.rows[row].query;
            match envelope.as_mut() {
                Some(e) => e.merge(q),
                None => envelope = Some(q.clone()),
            }
        }
        envelope
    }

    pub fn into_fragments(self) -> Vec<Fragment> {
        let mut fragments: Vec<Fragment> = self.rows.into_values().collect();
        sort_fragments(&mut fragments);
        fragments
    }

    /// Number of bin entries; always equals the number of fragments
    pub fn bin_entry_count(&self) -> usize {
        self.bins.values().map(|v| v.len()).sum()
    }

    fn bin_entry(row: RowId, fragment: &Fragment) -> BinEntry {
        BinEntry {
            row,
            chain_id: fragment.chain_id,
            bin: fragment.query.bin(),
            sequence_name: fragment.query.seqname.clone(),
            min: fragment.query.min(),
            max: fragment.query.max(),
            strand: fragment.strand(),
        }
    }

    fn remove_row(&mut self, row: RowId) -> Result<Fragment> {
        let fragment = self
            .rows
            .remove(&row)
            .ok_or_else(|| LongJoinError::Store(format!("row {} missing from table", row)))?;
        let key = (fragment.query.seqname.clone(), fragment.query.bin());
        let now_empty = match self.bins.get_mut(&key) {
            Some(slot) => {
                slot.retain(|e| e.row != row);
                slot.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.bins.remove(&key);
        }
        let (seq, bin) = key;
        let drained = match self.occupancy.get_mut(&seq) {
            Some(occupancy) => {
                occupancy.remove(bin);
                occupancy.is_empty()
            }
            None => false,
        };
        if drained {
            self.occupancy.remove(&seq);
        }
        Ok(fragment)
    }

    fn lookup<F>(&self, seq: &SequenceName, start: u32, end: u32, keep: F) -> Vec<Fragment>
    where
        F: Fn(&BinEntry, u32, u32) -> bool,
    {
        let (lo, hi) = (start.min(end), start.max(end));
        let Some(occupancy) = self.occupancy.get(seq) else {
            return Vec::new();
        };
        let mut rows: Vec<RowId> = Vec::new();
        for key in occupancy.windows(lo, hi) {
            if let Some(entries) = self.bins.get(&(seq.clone(), key)) {
                rows.extend(entries.iter().filter(|e| keep(e, lo, hi)).map(|e| e.row));
            }
        }
        let mut fragments: Vec<Fragment> = rows.iter().map(|r| self.rows[r].clone()).collect();
        sort_fragments(&mut fragments);
        fragments
    }

    fn chain_fragments(&self, id: ChainId) -> impl Iterator<Item = &Fragment> {
        self.chains
            .get(&id)
            .into_iter()
            .flat_map(move |rows| rows.iter().map(move |r| &self.rows[r]))
    }

    fn chains_of_query(&self, query: &SequenceName) -> Vec<ChainId> {
        self.chains
            .iter()
            .filter(|(_, rows)| {
                rows.iter()
                    .next()
                    .map(|r| self.rows[r].query_name() == query)
                    .unwrap_or(false)
            })
            .map(|(&id, _)| id)
            .collect()
    }
}

/// Stable order: query, subject, query start, chain id
pub fn sort_fragments(fragments: &mut [Fragment]) {
    fragments.sort_by(|a, b| {
        a.query
            .seqname
            .cmp(&b.query.seqname)
            .then_with(|| a.subject.seqname.cmp(&b.subject.seqname))
            .then_with(|| a.query.min().cmp(&b.query.min()))
            .then_with(|| a.query.max().cmp(&b.query.max()))
            .then_with(|| a.chain_id.cmp(&b.chain_id))
    });
}

impl ChainRangeView for InMemoryStore {
    fn fragments_overlapping(
        &self,
        seq: &SequenceName,
        start: u32,
        end: u32,
    ) -> Result<Vec<Fragment>> {
        Ok(self.lookup(seq, start, end, |e, lo, hi| e.overlaps(lo, hi)))
    }

    fn fragments_included_in(
        &self,
        seq: &SequenceName,
        start: u32,
        end: u32,
    ) -> Result<Vec<Fragment>> {
        Ok(self.lookup(seq, start, end, |e, lo, hi| e.is_included_in(lo, hi)))
    }
}

impl FragmentStore for InMemoryStore {
    fn insert(&mut self, fragment: Fragment) -> Result<()> {
        if fragment.query.is_empty() || fragment.subject.is_empty() {
            return Err(LongJoinError::consistency("cannot store an empty range")
                .with_chain(fragment.chain_id)
                .with_query(fragment.query_name())
                .with_range(&fragment.query));
        }
        let row = self.next_row;
        self.next_row += 1;

        let entry = Self::bin_entry(row, &fragment);
        self.occupancy
            .entry(entry.sequence_name.clone())
            .or_default()
            .add(entry.bin);
        self.bins
            .entry((entry.sequence_name.clone(), entry.bin))
            .or_default()
            .push(entry);
        self.chains.entry(fragment.chain_id).or_default().insert(row);
        self.high_water = self.high_water.max(Some(fragment.chain_id));
        self.rows.insert(row, fragment);
        Ok(())
    }

    fn delete_by_id(&mut self, id: ChainId) -> Result<usize> {
        let Some(rows) = self.chains.remove(&id) else {
            return Ok(0);
        };
        for &row in &rows {
            self.remove_row(row)?;
        }
        Ok(rows.len())
    }

    fn change_id(&mut self, old: ChainId, new: ChainId) -> Result<()> {
        if old == new {
            return Ok(());
        }
        let Some(rows) = self.chains.remove(&old) else {
            return Err(LongJoinError::Store(format!(
                "cannot rename chain {} to {}: no such chain",
                old, new
            )));
        };
        for &row in &rows {
            let fragment = self
                .rows
                .get_mut(&row)
                .ok_or_else(|| LongJoinError::Store(format!("row {} missing from table", row)))?;
            fragment.chain_id = new;
            let key = (fragment.query.seqname.clone(), fragment.query.bin());
            if let Some(slot) = self.bins.get_mut(&key) {
                for entry in slot.iter_mut().filter(|e| e.row == row) {
                    entry.chain_id = new;
                }
            }
        }
        self.chains.entry(new).or_default().extend(rows);
        self.high_water = self.high_water.max(Some(new));
        Ok(())
    }

    fn fragments_by_chain(&self, id: ChainId) -> Result<Vec<Fragment>> {
        let mut fragments: Vec<Fragment> = self.chain_fragments(id).cloned().collect();
        fragments.sort_by_key(|f| (f.query.min(), f.query.max()));
        Ok(fragments)
    }

    fn chains_sorted_by_ascending_weighted_identity(
        &self,
        query: &SequenceName,
    ) -> Result<Vec<(ChainId, f64)>> {
        let mut chains: Vec<(ChainId, f64)> = self
            .chains_of_query(query)
            .into_iter()
            .map(|id| (id, weighted_identity(self.chain_fragments(id))))
            .collect();
        chains.sort_by_key(|&(id, identity)| (OrderedFloat(identity), id));
        Ok(chains)
    }

    fn chains_sorted_by_descending_length(
        &self,
        query: &SequenceName,
    ) -> Result<Vec<(ChainId, u64)>> {
        let mut chains: Vec<(ChainId, u64)> = self
            .chains_of_query(query)
            .into_iter()
            .map(|id| (id, total_query_length(self.chain_fragments(id))))
            .collect();
        chains.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(chains)
    }

    fn distinct_queries(&self) -> Result<Vec<SequenceName>> {
        let names: BTreeSet<&SequenceName> = self.rows.values().map(|f| f.query_name()).collect();
        Ok(names.into_iter().cloned().collect())
    }

    fn distinct_subjects(&self) -> Result<Vec<SequenceName>> {
        let names: BTreeSet<&SequenceName> =
            self.rows.values().map(|f| f.subject_name()).collect();
        Ok(names.into_iter().cloned().collect())
    }

    fn get_new_id(&self) -> Result<ChainId> {
        Ok(self.high_water.map(|id| id.next()).unwrap_or(ChainId(1)))
    }

    fn fragments(&self) -> Result<Vec<Fragment>> {
        let mut fragments: Vec<Fragment> = self.rows.values().cloned().collect();
        sort_fragments(&mut fragments);
        Ok(fragments)
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}
