//! Neighbor lists and the per-run neighbor index.
//!
//! `NeighborList` is the capability a traversal feeds: the plain
//! `DefaultNeighborList` here, or the cluster-backed list from `dbscan`. The
//! factory handed to `NnProcessor::process` picks the variant (static dispatch).

use std::collections::HashMap;
use std::marker::PhantomData;

use super::types::{DistanceProfile, InferType, ItemId};

/// Per-center collection of accepted neighbors.
pub trait NeighborList<V, C> {
    /// Offer a neighbor within range. Returns whether it was accepted.
    fn add(&mut self, profile: &DistanceProfile<C>, id: &ItemId, value: &V) -> bool;
    /// Classify a candidate before paying for a distance computation.
    fn infer(&self, id: &ItemId, value: &V) -> InferType;
    fn size(&self) -> usize;
    #[inline]
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
    fn clear(&mut self);
}

/// Builds the neighbor list for a center the first time it is referenced.
pub trait NeighborListFactory<V, C> {
    type List: NeighborList<V, C>;
    fn build(&mut self, center_id: &ItemId, center: &V) -> Self::List;
}

/// Plain accumulator: accepts everything, keeps insertion order.
#[derive(Clone, Debug)]
pub struct DefaultNeighborList<V> {
    entries: Vec<(ItemId, V)>,
}

impl<V> Default for DefaultNeighborList<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V> DefaultNeighborList<V> {
    #[inline]
    pub fn entries(&self) -> &[(ItemId, V)] {
        &self.entries
    }
    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.entries.iter().map(|(id, _)| id)
    }
}

impl<V: Clone, C> NeighborList<V, C> for DefaultNeighborList<V> {
    fn add(&mut self, _profile: &DistanceProfile<C>, id: &ItemId, value: &V) -> bool {
        self.entries.push((id.clone(), value.clone()));
        true
    }
    #[inline]
    fn infer(&self, _id: &ItemId, _value: &V) -> InferType {
        InferType::None
    }
    #[inline]
    fn size(&self) -> usize {
        self.entries.len()
    }
    fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Factory for `DefaultNeighborList`.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultListFactory;

impl<V: Clone, C> NeighborListFactory<V, C> for DefaultListFactory {
    type List = DefaultNeighborList<V>;
    fn build(&mut self, _center_id: &ItemId, _center: &V) -> Self::List {
        DefaultNeighborList::default()
    }
}

/// Slot of the neighbor index. Evicted centers keep an `Emptied` marker so a
/// late reciprocal add cannot resurrect their list.
enum Slot<L> {
    Live(L),
    Emptied,
}

/// Neighbor lists alive during one traversal, keyed by center id.
pub struct NeighborIndex<V, C, F: NeighborListFactory<V, C>> {
    factory: F,
    lists: HashMap<ItemId, Slot<F::List>>,
    _marker: PhantomData<fn(&V, &C)>,
}

impl<V, C, F: NeighborListFactory<V, C>> NeighborIndex<V, C, F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            lists: HashMap::new(),
            _marker: PhantomData,
        }
    }

    /// The list for `id`, built on first reference. `None` once emptied.
    pub fn init(&mut self, id: &ItemId, value: &V) -> Option<&mut F::List> {
        let factory = &mut self.factory;
        let slot = self
            .lists
            .entry(id.clone())
            .or_insert_with(|| Slot::Live(factory.build(id, value)));
        match slot {
            Slot::Live(list) => Some(list),
            Slot::Emptied => None,
        }
    }

    pub fn get_mut(&mut self, id: &ItemId) -> Option<&mut F::List> {
        match self.lists.get_mut(id) {
            Some(Slot::Live(list)) => Some(list),
            _ => None,
        }
    }

    /// Classify `neighbor_id` for `center_id`'s list. Emptied or unknown centers skip.
    pub fn infer(&self, center_id: &ItemId, neighbor_id: &ItemId, neighbor: &V) -> InferType {
        match self.lists.get(center_id) {
            Some(Slot::Live(list)) => list.infer(neighbor_id, neighbor),
            _ => InferType::Skip,
        }
    }

    /// Add `neighbor` to `center`'s list; with `reciprocal` also add `center`
    /// to `neighbor`'s list. Returns whether the center's list accepted it.
    pub fn add(
        &mut self,
        profile: &DistanceProfile<C>,
        center_id: &ItemId,
        center: &V,
        neighbor_id: &ItemId,
        neighbor: &V,
        reciprocal: bool,
    ) -> bool {
        let accepted = self.add_to_list(profile, center_id, center, neighbor_id, neighbor);
        if reciprocal {
            self.add_to_list(profile, neighbor_id, neighbor, center_id, center);
        }
        accepted
    }

    /// Drop the list for `id`; later adds to it are ignored.
    pub fn empty(&mut self, id: &ItemId) {
        self.lists.insert(id.clone(), Slot::Emptied);
    }

    #[inline]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn add_to_list(
        &mut self,
        profile: &DistanceProfile<C>,
        center_id: &ItemId,
        center: &V,
        neighbor_id: &ItemId,
        neighbor: &V,
    ) -> bool {
        match self.init(center_id, center) {
            Some(list) => list.add(profile, neighbor_id, neighbor),
            None => false,
        }
    }
}
