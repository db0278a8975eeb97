/// Union-Find (Disjoint Sets) keyed by identifier, lowest key wins
///
/// Used for transitive grouping of overlapping regions and for chain id
/// aliasing during long joins, where the merged chain keeps the lower id.
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct UnionFind<K> {
    parent: HashMap<K, K>,
}

impl<K: Copy + Ord + Hash> Default for UnionFind<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy + Ord + Hash> UnionFind<K> {
    pub fn new() -> Self {
        UnionFind {
            parent: HashMap::new(),
        }
    }

    /// Register `x` as its own set if unseen
    pub fn insert(&mut self, x: K) {
        self.parent.entry(x).or_insert(x);
    }

    /// Find the representative of `x` with path compression.
    /// Unknown keys are their own representative.
    pub fn find(&mut self, x: K) -> K {
        let mut root = x;
        while let Some(&p) = self.parent.get(&root) {
            if p == root {
                break;
            }
            root = p;
        }

        let mut cur = x;
        while cur != root {
            match self.parent.insert(cur, root) {
                Some(next) => cur = next,
                None => break,
            }
        }
        root
    }

    /// Union the sets of `x` and `y`; returns the surviving representative
    pub fn union(&mut self, x: K, y: K) -> K {
        self.insert(x);
        self.insert(y);
        let root_x = self.find(x);
        let root_y = self.find(y);

        if root_x == root_y {
            return root_x;
        }
        let (winner, loser) = if root_x < root_y {
            (root_x, root_y)
        } else {
            (root_y, root_x)
        };
        self.parent.insert(loser, winner);
        winner
    }

    /// Check if two elements are in the same set
    pub fn connected(&mut self, x: K, y: K) -> bool {
        self.find(x) == self.find(y)
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// All sets, each sorted, ordered by representative
    pub fn get_sets(&mut self) -> Vec<Vec<K>> {
        let keys: Vec<K> = self.parent.keys().copied().collect();
        let mut root_to_group: BTreeMap<K, Vec<K>> = BTreeMap::new();

        for k in keys {
            let root = self.find(k);
            root_to_group.entry(root).or_default().push(k);
        }

        root_to_group
            .into_values()
            .map(|mut group| {
                group.sort();
                group
            })
            .collect()
    }
}
