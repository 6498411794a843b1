use std::cell::RefCell;
use std::rc::Rc;

use crate::nn::{DistanceProfile, InferType, ItemId, NeighborList, NeighborListFactory};

use super::cluster::{ClusterId, ClusterIndex};
use super::item::{ClusterItem, ClusterProfileContext};

/// Neighbor list backed by the cluster that currently owns its center.
///
/// The owner is looked up on every call, so a list keeps working after its
/// cluster was merged into another one.
#[derive(Clone, Debug)]
pub struct ClusterNeighborList {
    center: ItemId,
    clusters: Rc<RefCell<ClusterIndex>>,
}

impl ClusterNeighborList {
    #[inline]
    pub fn center(&self) -> &ItemId {
        &self.center
    }

    /// Current owner of the center; `None` once invalidated.
    pub fn cluster(&self) -> Option<ClusterId> {
        self.clusters.borrow().cluster_of(&self.center)
    }

    pub fn finish(&mut self) {
        if let Some(cid) = self.cluster() {
            self.clusters.borrow_mut().finish(cid);
        }
    }

    pub fn invalidate(&mut self) {
        if let Some(cid) = self.cluster() {
            self.clusters.borrow_mut().invalidate(cid);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.cluster()
            .is_some_and(|cid| self.clusters.borrow().is_finished(cid))
    }

    pub fn is_compressed(&self) -> bool {
        self.cluster()
            .is_some_and(|cid| self.clusters.borrow().is_compressed(cid))
    }
}

impl NeighborList<ClusterItem, ClusterProfileContext> for ClusterNeighborList {
    fn add(
        &mut self,
        profile: &DistanceProfile<ClusterProfileContext>,
        id: &ItemId,
        _value: &ClusterItem,
    ) -> bool {
        let mut clusters = self.clusters.borrow_mut();
        match clusters.cluster_of(&self.center) {
            Some(cid) => clusters.add_link(cid, profile, id),
            None => false,
        }
    }

    fn infer(&self, id: &ItemId, _value: &ClusterItem) -> InferType {
        let clusters = self.clusters.borrow();
        match clusters.cluster_of(&self.center) {
            Some(cid) => clusters.infer(cid, id),
            // Invalidated center: `add` would drop the link anyway.
            None => InferType::Skip,
        }
    }

    fn size(&self) -> usize {
        let clusters = self.clusters.borrow();
        clusters
            .cluster_of(&self.center)
            .map_or(0, |cid| clusters.size(cid))
    }

    fn clear(&mut self) {
        if let Some(cid) = self.cluster() {
            self.clusters.borrow_mut().clear(cid);
        }
    }
}

/// Builds `ClusterNeighborList`s, creating the center's cluster on first use.
#[derive(Clone, Debug)]
pub struct ClusterListFactory {
    clusters: Rc<RefCell<ClusterIndex>>,
}

impl ClusterListFactory {
    pub fn new(clusters: Rc<RefCell<ClusterIndex>>) -> Self {
        Self { clusters }
    }
}

impl NeighborListFactory<ClusterItem, ClusterProfileContext> for ClusterListFactory {
    type List = ClusterNeighborList;

    fn build(&mut self, center_id: &ItemId, center: &ClusterItem) -> ClusterNeighborList {
        self.clusters.borrow_mut().get_or_create(center_id, center);
        ClusterNeighborList {
            center: center_id.clone(),
            clusters: Rc::clone(&self.clusters),
        }
    }
}
