use std::collections::{BTreeSet, HashMap, HashSet};

use crate::nn::ItemId;

use super::cluster::ClusterId;

/// Pending links from clusters to the item ids they reached but have not
/// merged with yet.
///
/// Both directions are stored so that dropping a cluster or detaching an item
/// updates every side in one call.
#[derive(Clone, Debug, Default)]
pub(crate) struct LinkGraph {
    forward: HashMap<ClusterId, BTreeSet<ItemId>>,
    reverse: HashMap<ItemId, HashSet<ClusterId>>,
}

impl LinkGraph {
    /// Returns `false` if the link already existed.
    pub fn link(&mut self, from: ClusterId, to: &ItemId) -> bool {
        if !self.forward.entry(from).or_default().insert(to.clone()) {
            return false;
        }
        self.reverse.entry(to.clone()).or_default().insert(from);
        true
    }

    pub fn unlink(&mut self, from: ClusterId, to: &ItemId) -> bool {
        let removed = match self.forward.get_mut(&from) {
            Some(targets) => targets.remove(to),
            None => false,
        };
        if removed {
            if let Some(set) = self.forward.get(&from) {
                if set.is_empty() {
                    self.forward.remove(&from);
                }
            }
            self.drop_reverse(to, from);
        }
        removed
    }

    #[inline]
    pub fn contains(&self, from: ClusterId, to: &ItemId) -> bool {
        self.forward.get(&from).is_some_and(|t| t.contains(to))
    }

    pub fn iter(&self, from: ClusterId) -> impl Iterator<Item = &ItemId> {
        self.forward.get(&from).into_iter().flatten()
    }

    /// Owned snapshot, for walks that unlink while iterating.
    pub fn targets(&self, from: ClusterId) -> Vec<ItemId> {
        self.iter(from).cloned().collect()
    }

    #[inline]
    pub fn len(&self, from: ClusterId) -> usize {
        self.forward.get(&from).map_or(0, BTreeSet::len)
    }

    /// Move every link of `other` onto `into`.
    pub fn absorb(&mut self, into: ClusterId, other: ClusterId) {
        for to in self.remove_cluster(other) {
            self.link(into, &to);
        }
    }

    /// Remove `to` from every cluster's link set.
    pub fn detach(&mut self, to: &ItemId) {
        let Some(froms) = self.reverse.remove(to) else {
            return;
        };
        for from in froms {
            if let Some(targets) = self.forward.get_mut(&from) {
                targets.remove(to);
                if targets.is_empty() {
                    self.forward.remove(&from);
                }
            }
        }
    }

    /// Drop all links of `from`, returning the former targets.
    pub fn remove_cluster(&mut self, from: ClusterId) -> BTreeSet<ItemId> {
        let targets = self.forward.remove(&from).unwrap_or_default();
        for to in &targets {
            self.drop_reverse(to, from);
        }
        targets
    }

    fn drop_reverse(&mut self, to: &ItemId, from: ClusterId) {
        if let Some(set) = self.reverse.get_mut(to) {
            set.remove(&from);
            if set.is_empty() {
                self.reverse.remove(to);
            }
        }
    }

    /// Forward and reverse maps mirror each other.
    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(from, targets)| {
            targets
                .iter()
                .all(|to| self.reverse.get(to).is_some_and(|s| s.contains(from)))
        });
        let reverse_ok = self
            .reverse
            .iter()
            .all(|(to, froms)| froms.iter().all(|from| self.contains(*from, to)));
        forward_ok && reverse_ok
    }
}
