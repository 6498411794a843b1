use std::cell::RefCell;
use std::rc::Rc;

use crate::config::DbscanCfg;
use crate::error::{BoxError, NnError};
use crate::geom::Geometry;
use crate::nn::{ItemId, NeighborList, NnProcessor, PartitionData, Partitioner};

use super::cluster::ClusterIndex;
use super::item::{ClusterItem, ClusterItemDistanceFn};
use super::list::{ClusterListFactory, ClusterNeighborList};

/// One cluster found in a partition.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterSummary {
    /// Representative id.
    pub id: ItemId,
    pub members: Vec<ItemId>,
    pub count: u64,
    /// Hull over the accumulated geometry and raw coordinates.
    pub geometry: Option<Geometry<f64>>,
    pub compressed: bool,
}

impl ClusterSummary {
    /// Compressed item standing for this cluster in a later pass.
    pub fn to_item(&self) -> Option<ClusterItem> {
        let geometry = self.geometry.clone()?;
        Some(ClusterItem::new(self.id.clone(), geometry, self.count, true))
    }
}

/// Cluster one partition group.
///
/// Every completed primary either finishes its cluster (merging what it
/// linked to) or, below `min_owners`, invalidates it as noise. Returns the
/// remaining clusters of at least `min_owners` in creation order. `cfg` is
/// expected to be validated.
pub fn run_partition<I>(
    cfg: &DbscanCfg,
    parent: PartitionData,
    partitioner: impl Partitioner<ClusterItem> + 'static,
    items: I,
) -> Result<Vec<ClusterSummary>, NnError>
where
    I: IntoIterator<Item = (ClusterItem, bool)>,
{
    let clusters = Rc::new(RefCell::new(ClusterIndex::new(cfg.cluster())));
    let mut nn = NnProcessor::new(
        partitioner,
        |_id: &ItemId, item: &ClusterItem| -> Result<ClusterItem, BoxError> { Ok(item.clone()) },
        ClusterItemDistanceFn::new(cfg.coord_distance),
        cfg.neighbor(),
        parent,
    );
    for (item, primary) in items {
        nn.add(item.id.clone(), primary, &item)?;
    }

    let min_owners = cfg.min_owners;
    let mut noise = 0usize;
    nn.process(
        ClusterListFactory::new(Rc::clone(&clusters)),
        |id: &ItemId, _item: &ClusterItem, list: &mut ClusterNeighborList| -> Result<(), BoxError> {
            if list.size() < min_owners {
                tracing::trace!(id = %id, size = list.size(), "noise");
                noise += 1;
                list.invalidate();
            } else {
                list.finish();
            }
            Ok(())
        },
    )?;

    let clusters = clusters.borrow();
    let summaries: Vec<ClusterSummary> = clusters
        .clusters()
        .filter(|cid| clusters.size(*cid) >= min_owners)
        .filter_map(|cid| {
            Some(ClusterSummary {
                id: clusters.representative(cid)?.clone(),
                members: clusters.members(cid).to_vec(),
                count: clusters.size(cid) as u64,
                geometry: clusters.get(cid),
                compressed: clusters.is_compressed(cid),
            })
        })
        .collect();
    tracing::info!(
        partition = %nn.parent().key,
        clusters = summaries.len(),
        noise,
        "dbscan partition done"
    );
    Ok(summaries)
}
