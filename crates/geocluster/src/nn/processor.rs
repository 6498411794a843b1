//! Neighbor traversal over one partition group.
//!
//! Walk order: start at the first recorded primary, then repeatedly jump to the
//! farthest still-unvisited primary found among the current center's neighbors,
//! falling back to the smallest remaining primary id. Spreading out this way keeps
//! few partial clusters alive at once.

use std::collections::{BTreeSet, HashSet};

use crate::config::NeighborCfg;
use crate::error::{NnError, TraversalCause};

use super::list::{NeighborIndex, NeighborListFactory};
use super::partition::PartitionIndex;
use super::types::{
    CompleteNotifier, DistanceProfileFn, InferType, ItemId, PartitionData, Partitioner,
    TypeConverter,
};

/// Partition-local nearest-neighbor processor.
///
/// `P` is the raw value handed to the partitioner, `V` the stored value the
/// distance function compares. Not meant for concurrent use; run one processor
/// per partition group.
pub struct NnProcessor<P, V, D> {
    index: PartitionIndex<V>,
    partitioner: Box<dyn Partitioner<P>>,
    converter: Box<dyn TypeConverter<P, V>>,
    distance_fn: D,
    cfg: NeighborCfg,
    parent: PartitionData,
    start: Option<ItemId>,
}

impl<P, V, D> NnProcessor<P, V, D>
where
    D: DistanceProfileFn<V>,
{
    pub fn new(
        partitioner: impl Partitioner<P> + 'static,
        converter: impl TypeConverter<P, V> + 'static,
        distance_fn: D,
        cfg: NeighborCfg,
        parent: PartitionData,
    ) -> Self {
        Self {
            index: PartitionIndex::default(),
            partitioner: Box::new(partitioner),
            converter: Box::new(converter),
            distance_fn,
            cfg,
            parent,
            start: None,
        }
    }

    /// Convert and index one point. Nothing is stored if conversion or
    /// partitioning fails.
    pub fn add(&mut self, id: ItemId, primary: bool, raw: &P) -> Result<(), NnError> {
        let value = self
            .converter
            .convert(&id, raw)
            .map_err(|source| NnError::Conversion {
                id: id.clone(),
                source,
            })?;
        let mut partitions = Vec::new();
        self.partitioner
            .partition(raw, &mut |pd| {
                partitions.push(pd);
                Ok(())
            })
            .map_err(|source| NnError::Partition {
                id: id.clone(),
                source,
            })?;
        if primary && self.start.is_none() {
            self.start = Some(id.clone());
        }
        self.index.insert(id, primary, value, partitions);
        Ok(())
    }

    /// Forget `id` entirely.
    pub fn remove(&mut self, id: &ItemId) -> bool {
        self.index.remove(id)
    }

    #[inline]
    pub fn index(&self) -> &PartitionIndex<V> {
        &self.index
    }

    #[inline]
    pub fn parent(&self) -> &PartitionData {
        &self.parent
    }

    /// Traverse every primary once, handing each one's neighbor list to `notifier`.
    ///
    /// The first failing distance computation or notification aborts the run.
    /// Lists built by `factory` are dropped on return.
    pub fn process<F, N>(&self, factory: F, mut notifier: N) -> Result<(), NnError>
    where
        F: NeighborListFactory<V, D::Context>,
        N: CompleteNotifier<V, F::List>,
    {
        tracing::info!(
            partition = %self.parent.key,
            primaries = self.index.primary_count(),
            others = self.index.other_count(),
            sub_partitions = self.index.partition_count(),
            "processing partition"
        );
        let mut lists = NeighborIndex::new(factory);
        let mut inspection: BTreeSet<ItemId> = self.index.primary_ids().cloned().collect();
        let mut next = self
            .start
            .clone()
            .or_else(|| inspection.first().cloned());

        while let Some(current) = next.take() {
            inspection.remove(&current);
            let Some(center) = self.index.primary(&current) else {
                next = inspection.first().cloned();
                continue;
            };
            tracing::trace!(id = %current, "processing primary");
            if lists.init(&current, center).is_none() {
                next = inspection.first().cloned();
                continue;
            }

            let mut farthest_distance = 0.0;
            let mut farthest: Option<ItemId> = None;
            let mut seen: HashSet<&ItemId> = HashSet::new();
            for neighbor_id in self.index.co_members(&current) {
                if *neighbor_id == current || !seen.insert(neighbor_id) {
                    continue;
                }
                // A primary missing from the inspection set was already processed
                // or removed; only `others` are looked up without that check.
                let (neighbor, is_primary) = match self.index.primary(neighbor_id) {
                    Some(value) => {
                        if !inspection.contains(neighbor_id) {
                            continue;
                        }
                        (value, true)
                    }
                    None => match self.index.other(neighbor_id) {
                        Some(value) => (value, false),
                        None => continue,
                    },
                };
                match lists.infer(&current, neighbor_id, neighbor) {
                    InferType::Skip => {}
                    InferType::Remove => {
                        inspection.remove(neighbor_id);
                    }
                    InferType::None => {
                        let profile =
                            self.distance_fn
                                .profile(center, neighbor)
                                .map_err(|source| {
                                    self.abort(&current, TraversalCause::Distance(source))
                                })?;
                        let distance = profile.distance;
                        if distance <= self.cfg.max_distance {
                            lists.add(
                                &profile,
                                &current,
                                center,
                                neighbor_id,
                                neighbor,
                                is_primary,
                            );
                            tracing::trace!(id = %current, neighbor = %neighbor_id, distance, "neighbor");
                        }
                        if distance > farthest_distance && inspection.contains(neighbor_id) {
                            farthest_distance = distance;
                            farthest = Some(neighbor_id.clone());
                        }
                    }
                }
            }

            if let Some(list) = lists.get_mut(&current) {
                notifier
                    .complete(&current, center, list)
                    .map_err(|source| self.abort(&current, TraversalCause::Notification(source)))?;
            }
            lists.empty(&current);
            next = farthest.or_else(|| inspection.first().cloned());
        }
        Ok(())
    }

    fn abort(&self, id: &ItemId, cause: TraversalCause) -> NnError {
        NnError::Traversal {
            partition: self.parent.key.clone(),
            id: id.clone(),
            cause,
        }
    }
}
