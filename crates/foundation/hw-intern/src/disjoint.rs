//! Disjoint sets over interned names
//!
//! A parent-pointer forest with path compression. The representative of a
//! set is always the root of whichever key was passed as the leader when
//! the sets were joined, so the first symbol of a chain of renames stays
//! recoverable from any later member.

use crate::Symbol;
use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Union-find keyed by an opaque copyable key
#[derive(Debug, Clone)]
pub struct DisjointSets<K = Symbol> {
    parent: FxHashMap<K, K>,
}

impl<K: Copy + Eq + Hash> DisjointSets<K> {
    /// Creates an empty forest
    pub fn new() -> Self {
        Self {
            parent: FxHashMap::default(),
        }
    }

    fn insert(&mut self, key: K) {
        self.parent.entry(key).or_insert(key);
    }

    /// Finds the representative of `key`, compressing the path behind it
    ///
    /// Untracked keys are inserted as singletons.
    pub fn find(&mut self, key: K) -> K {
        self.insert(key);
        let mut root = key;
        while let Some(&next) = self.parent.get(&root) {
            if next == root {
                break;
            }
            root = next;
        }

        let mut cursor = key;
        while cursor != root {
            let next = self.parent[&cursor];
            self.parent.insert(cursor, root);
            cursor = next;
        }
        root
    }

    /// Joins the sets of `leader` and `member`, keeping the root of `leader`
    pub fn union(&mut self, leader: K, member: K) -> K {
        let leader_root = self.find(leader);
        let member_root = self.find(member);
        if leader_root != member_root {
            self.parent.insert(member_root, leader_root);
        }
        leader_root
    }
}

impl<K: Copy + Eq + Hash> Default for DisjointSets<K> {
    fn default() -> Self {
        Self::new()
    }
}
