//! Bidirectional partition ↔ id bookkeeping.
//!
//! Invariants:
//! - One canonical descriptor per partition key; its `primary` flag is the OR of
//!   every descriptor added for that key.
//! - `id ∈ members(key)` ⟺ `key ∈ partitions_of(id)`.
//! - An id is stored in at most one of `primaries` / `others`.

use std::collections::{BTreeSet, HashMap};

use super::types::{ItemId, PartitionData, PartitionKey};

#[derive(Clone, Debug, Default)]
struct PartitionEntry {
    primary: bool,
    members: BTreeSet<ItemId>,
}

/// Partition index over stored values `V`.
#[derive(Clone, Debug)]
pub struct PartitionIndex<V> {
    partitions: HashMap<PartitionKey, PartitionEntry>,
    id_partitions: HashMap<ItemId, BTreeSet<PartitionKey>>,
    primaries: HashMap<ItemId, V>,
    others: HashMap<ItemId, V>,
}

impl<V> Default for PartitionIndex<V> {
    fn default() -> Self {
        Self {
            partitions: HashMap::new(),
            id_partitions: HashMap::new(),
            primaries: HashMap::new(),
            others: HashMap::new(),
        }
    }
}

impl<V> PartitionIndex<V> {
    /// Store `value` and register `id` in every partition of `partitions`.
    pub fn insert(
        &mut self,
        id: ItemId,
        primary: bool,
        value: V,
        partitions: impl IntoIterator<Item = PartitionData>,
    ) {
        for pd in partitions {
            self.link(&id, pd);
        }
        if primary {
            self.others.remove(&id);
            self.primaries.insert(id, value);
        } else {
            self.primaries.remove(&id);
            self.others.insert(id, value);
        }
    }

    /// Remove `id` from both directions and from the value maps.
    /// Returns whether anything was stored for it.
    pub fn remove(&mut self, id: &ItemId) -> bool {
        let mut found = false;
        if let Some(keys) = self.id_partitions.remove(id) {
            found = true;
            for key in keys {
                if let Some(entry) = self.partitions.get_mut(&key) {
                    entry.members.remove(id);
                }
            }
        }
        found |= self.primaries.remove(id).is_some();
        found |= self.others.remove(id).is_some();
        found
    }

    fn link(&mut self, id: &ItemId, pd: PartitionData) {
        let entry = self.partitions.entry(pd.key.clone()).or_default();
        entry.primary |= pd.primary;
        entry.members.insert(id.clone());
        self.id_partitions
            .entry(id.clone())
            .or_default()
            .insert(pd.key);
    }

    /// Canonical descriptor for `key`.
    pub fn partition(&self, key: &PartitionKey) -> Option<PartitionData> {
        self.partitions
            .get(key)
            .map(|e| PartitionData::new(key.clone(), e.primary))
    }

    pub fn partitions_of(&self, id: &ItemId) -> impl Iterator<Item = &PartitionKey> {
        self.id_partitions.get(id).into_iter().flatten()
    }

    pub fn members(&self, key: &PartitionKey) -> impl Iterator<Item = &ItemId> {
        self.partitions
            .get(key)
            .into_iter()
            .flat_map(|e| e.members.iter())
    }

    /// Every id sharing at least one partition with `id` (may repeat, includes `id`).
    pub fn co_members<'a>(&'a self, id: &ItemId) -> impl Iterator<Item = &'a ItemId> + 'a {
        let keys: Vec<&'a PartitionKey> = self
            .id_partitions
            .get(id)
            .map(|keys| keys.iter().collect())
            .unwrap_or_default();
        keys.into_iter().flat_map(move |key| self.members(key))
    }

    #[inline]
    pub fn primary(&self, id: &ItemId) -> Option<&V> {
        self.primaries.get(id)
    }

    #[inline]
    pub fn other(&self, id: &ItemId) -> Option<&V> {
        self.others.get(id)
    }

    pub fn primary_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.primaries.keys()
    }

    #[inline]
    pub fn primary_count(&self) -> usize {
        self.primaries.len()
    }

    #[inline]
    pub fn other_count(&self) -> usize {
        self.others.len()
    }

    /// Number of distinct partition keys ever seen.
    #[inline]
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Check the bidirectional invariant. Intended for tests and debug assertions.
    pub fn is_consistent(&self) -> bool {
        let forward = self.id_partitions.iter().all(|(id, keys)| {
            keys.iter().all(|k| {
                self.partitions
                    .get(k)
                    .is_some_and(|e| e.members.contains(id))
            })
        });
        let backward = self.partitions.iter().all(|(k, e)| {
            e.members.iter().all(|id| {
                self.id_partitions
                    .get(id)
                    .is_some_and(|keys| keys.contains(k))
            })
        });
        let disjoint = self.primaries.keys().all(|id| !self.others.contains_key(id));
        forward && backward && disjoint
    }
}
