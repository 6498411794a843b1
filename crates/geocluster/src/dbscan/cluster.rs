//! Cluster arena: membership, pending links, merging and geometry accumulation.

use std::collections::{HashMap, HashSet};

use crate::config::{ClusterCfg, ClusterKind};
use crate::geom::{self, CoordKey, Geometry, GeometryError};
use crate::nn::{DistanceProfile, InferType, ItemId};

use super::item::{ClusterItem, ClusterProfileContext};
use super::links::LinkGraph;

/// Handle of a cluster record. Stale after the cluster is merged away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterId(usize);

#[derive(Clone, Debug)]
struct ClusterRecord {
    /// `members[0]` is the representative.
    members: Vec<ItemId>,
    /// Negative once invalidated.
    count: i64,
    geometry: Option<Geometry<f64>>,
    points: HashSet<CoordKey>,
    initialized_as_point: bool,
    compressed: bool,
    finished: bool,
}

impl ClusterRecord {
    fn new(id: &ItemId, item: &ClusterItem) -> Self {
        let initialized_as_point = geom::is_point(&item.geometry);
        let mut points = HashSet::new();
        let mut geometry = None;
        // A point-initialized hull always contains its origin, so only its
        // centroid is tracked and the origin is never re-added.
        if initialized_as_point || item.compressed {
            if let Some(c) = geom::centroid(&item.geometry) {
                points.insert(CoordKey::from(c));
            }
            geometry = Some(item.geometry.clone());
        }
        Self {
            members: vec![id.clone()],
            count: i64::try_from(item.count).unwrap_or(i64::MAX),
            geometry,
            points,
            initialized_as_point,
            compressed: item.compressed,
            finished: false,
        }
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.count >= 0
    }

    #[inline]
    fn size(&self) -> usize {
        usize::try_from(self.count).unwrap_or(0)
    }
}

/// Every cluster of one partition run plus the `ItemId -> ClusterId` owner map,
/// the single source of truth for which cluster an id belongs to.
///
/// Merging reassigns owner entries and frees the absorbed record; its handle
/// goes stale. Single-threaded.
#[derive(Debug)]
pub struct ClusterIndex {
    cfg: ClusterCfg,
    slots: Vec<Option<ClusterRecord>>,
    owners: HashMap<ItemId, ClusterId>,
    links: LinkGraph,
}

impl ClusterIndex {
    pub fn new(cfg: ClusterCfg) -> Self {
        Self {
            cfg,
            slots: Vec::new(),
            owners: HashMap::new(),
            links: LinkGraph::default(),
        }
    }

    #[inline]
    pub fn cfg(&self) -> &ClusterCfg {
        &self.cfg
    }

    /// The cluster currently owning `id`.
    #[inline]
    pub fn cluster_of(&self, id: &ItemId) -> Option<ClusterId> {
        self.owners.get(id).copied()
    }

    /// The cluster owning `id`, created from `item` if there is none.
    pub fn get_or_create(&mut self, id: &ItemId, item: &ClusterItem) -> ClusterId {
        if let Some(cid) = self.cluster_of(id) {
            return cid;
        }
        let cid = ClusterId(self.slots.len());
        self.slots.push(Some(ClusterRecord::new(id, item)));
        self.owners.insert(id.clone(), cid);
        tracing::trace!(id = %id, cluster = ?cid, "new cluster");
        cid
    }

    /// Live clusters in creation order.
    pub fn clusters(&self) -> impl Iterator<Item = ClusterId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.as_ref().is_some_and(ClusterRecord::is_live))
            .map(|(k, _)| ClusterId(k))
    }

    pub fn is_live(&self, cid: ClusterId) -> bool {
        self.record(cid).is_some_and(ClusterRecord::is_live)
    }

    /// Item count; zero for stale or invalidated handles.
    pub fn size(&self, cid: ClusterId) -> usize {
        self.record(cid).map_or(0, ClusterRecord::size)
    }

    /// Raw count, `-1` after invalidation, `None` for stale handles.
    pub fn count(&self, cid: ClusterId) -> Option<i64> {
        self.record(cid).map(|r| r.count)
    }

    pub fn representative(&self, cid: ClusterId) -> Option<&ItemId> {
        self.record(cid).and_then(|r| r.members.first())
    }

    pub fn members(&self, cid: ClusterId) -> &[ItemId] {
        self.record(cid)
            .map(|r| r.members.as_slice())
            .unwrap_or_default()
    }

    pub fn links(&self, cid: ClusterId) -> impl Iterator<Item = &ItemId> {
        self.links.iter(cid)
    }

    #[inline]
    pub fn link_count(&self, cid: ClusterId) -> usize {
        self.links.len(cid)
    }

    pub fn is_compressed(&self, cid: ClusterId) -> bool {
        self.record(cid).is_some_and(|r| r.compressed)
    }

    pub fn is_finished(&self, cid: ClusterId) -> bool {
        self.record(cid).is_some_and(|r| r.finished)
    }

    /// Raw coordinates not yet folded into the geometry.
    pub fn raw_point_count(&self, cid: ClusterId) -> usize {
        self.record(cid).map_or(0, |r| r.points.len())
    }

    /// Stored geometry, without pending raw coordinates.
    pub fn geometry(&self, cid: ClusterId) -> Option<&Geometry<f64>> {
        self.record(cid).and_then(|r| r.geometry.as_ref())
    }

    /// Hull over the stored geometry and the raw coordinates. Leaves the
    /// cluster untouched.
    pub fn get(&self, cid: ClusterId) -> Option<Geometry<f64>> {
        let rec = self.record(cid)?;
        geom::hull(
            rec.geometry.as_ref(),
            rec.points.iter().map(|k| k.coord()),
            true,
        )
    }

    /// `Skip` for ids this cluster owns or already links to.
    pub fn infer(&self, cid: ClusterId, id: &ItemId) -> InferType {
        if self.cluster_of(id) == Some(cid) || self.links.contains(cid, id) {
            InferType::Skip
        } else {
            InferType::None
        }
    }

    /// Record a link from `cid` to `new_id` and count the new item.
    ///
    /// Rejects repeated links and ids the cluster already owns. A finished
    /// cluster immediately tries to merge with what it just reached.
    pub fn add_link(
        &mut self,
        cid: ClusterId,
        profile: &DistanceProfile<ClusterProfileContext>,
        new_id: &ItemId,
    ) -> bool {
        if !self.is_live(cid) || !self.links.link(cid, new_id) {
            return false;
        }
        tracing::trace!(cluster = ?cid, id = %new_id, "link");
        if self.cluster_of(new_id) == Some(cid) {
            return false;
        }
        let threshold = self.cfg.compression_threshold;
        let Some(rec) = self.record_mut(cid) else {
            return false;
        };
        let delta = add_and_fetch_count(rec, new_id, &profile.context, threshold);
        rec.count += delta;
        if rec.finished {
            self.merge_if_possible(cid, false);
        }
        true
    }

    /// Final merge pass, pruning links that cannot merge, then mark finished.
    pub fn finish(&mut self, cid: ClusterId) {
        self.merge_if_possible(cid, true);
        if let Some(rec) = self.record_mut(cid) {
            rec.finished = true;
        }
    }

    /// Drop `cid` from the index: peers stop linking to its members, its owner
    /// entries go, the geometry is discarded and the count becomes `-1`.
    pub fn invalidate(&mut self, cid: ClusterId) {
        let Some(rec) = self.record_mut(cid) else {
            return;
        };
        let members = std::mem::take(&mut rec.members);
        rec.geometry = None;
        rec.points.clear();
        rec.count = -1;
        for id in &members {
            self.links.detach(id);
            if self.owners.get(id) == Some(&cid) {
                self.owners.remove(id);
            }
        }
        self.links.remove_cluster(cid);
        tracing::debug!(cluster = ?cid, members = members.len(), "invalidate");
        if let Some(rec) = self.record_mut(cid) {
            rec.members = members;
        }
    }

    /// Drop links and geometry of `cid`, keeping membership and count.
    pub fn clear(&mut self, cid: ClusterId) {
        self.links.remove_cluster(cid);
        if let Some(rec) = self.record_mut(cid) {
            rec.geometry = None;
            rec.points.clear();
        }
    }

    /// Absorb `other` into `into`. No-op when they are the same cluster.
    ///
    /// The resulting count is approximate and may fall below the member count:
    /// a raw coordinate that `into` already holds (such as the origin of an
    /// absorbed point cluster reached through a link) is not counted again.
    pub fn merge(&mut self, into: ClusterId, other: ClusterId) {
        if into == other || !self.is_live(into) {
            return;
        }
        let Some(mut absorbed) = self.take_live(other) else {
            return;
        };
        tracing::debug!(into = ?into, other = ?other, "merge");
        // Raw points come over below; keep them out of the interpolated count.
        absorbed.count -= absorbed.points.len() as i64;

        for id in &absorbed.members {
            self.owners.insert(id.clone(), into);
        }
        self.links.absorb(into, other);

        let threshold = self.cfg.compression_threshold;
        let Some(rec) = self.record_mut(into) else {
            return;
        };
        rec.members.append(&mut absorbed.members);
        if rec.compressed && absorbed.compressed {
            let factor = interpolation_factor(rec.geometry.as_ref(), absorbed.geometry.as_ref());
            rec.count += (factor * absorbed.count as f64) as i64;
        }
        if let Some(other_geo) = absorbed.geometry.take() {
            if rec.compressed {
                rec.geometry = union_or_hull(rec.geometry.take(), other_geo);
            } else {
                rec.points
                    .extend(geom::coords(&other_geo).into_iter().map(CoordKey::from));
            }
        }
        let before = rec.points.len();
        rec.points.extend(absorbed.points);
        rec.count += (rec.points.len() - before) as i64;
        check_for_compression(rec, threshold);
    }

    /// Merge every cluster reachable from `cid` through links between clusters
    /// of at least `merge_size`. With `delete_non_links`, links of `cid` that
    /// do not lead to such a cluster are pruned.
    pub(crate) fn merge_if_possible(&mut self, cid: ClusterId, delete_non_links: bool) {
        if self.cfg.kind == ClusterKind::PreProcess
            || self.size(cid) < self.cfg.merge_size
            || self.links.len(cid) == 0
        {
            return;
        }
        let mut ready = vec![cid];
        let mut seen: HashSet<ClusterId> = HashSet::from([cid]);
        let mut stack = vec![(cid, delete_non_links)];
        while let Some((current, prune)) = stack.pop() {
            for target in self.links.targets(current) {
                let mut fresh = false;
                if let Some(owner) = self.cluster_of(&target) {
                    if self.size(owner) >= self.cfg.merge_size && seen.insert(owner) {
                        ready.push(owner);
                        stack.push((owner, false));
                        fresh = true;
                    }
                }
                if prune || fresh {
                    self.links.unlink(current, &target);
                }
            }
        }
        if ready.len() > 1 {
            tracing::debug!(cluster = ?cid, ready = ready.len() - 1, "merge pass");
        }
        for other in ready.into_iter().skip(1) {
            self.merge(cid, other);
        }
    }

    fn record(&self, cid: ClusterId) -> Option<&ClusterRecord> {
        self.slots.get(cid.0).and_then(Option::as_ref)
    }

    fn record_mut(&mut self, cid: ClusterId) -> Option<&mut ClusterRecord> {
        self.slots.get_mut(cid.0).and_then(Option::as_mut)
    }

    fn take_live(&mut self, cid: ClusterId) -> Option<ClusterRecord> {
        let slot = self.slots.get_mut(cid.0)?;
        if slot.as_ref().is_some_and(ClusterRecord::is_live) {
            slot.take()
        } else {
            None
        }
    }

    /// Owner map and link graph agree with the records.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let owners_ok = self.owners.iter().all(|(id, cid)| {
            self.record(*cid)
                .is_some_and(|r| r.is_live() && r.members.contains(id))
        });
        let members_ok = self.clusters().all(|cid| {
            self.members(cid)
                .iter()
                .all(|id| self.cluster_of(id) == Some(cid))
        });
        owners_ok && members_ok && self.links.is_consistent()
    }
}

/// Feed the profile's coordinates into the raw set and count the new item once.
///
/// `item1`/`point1` name the side the profile was computed from; for
/// reciprocal adds the new item is `item1` and the roles swap.
fn add_and_fetch_count(
    rec: &mut ClusterRecord,
    new_id: &ItemId,
    ctx: &ClusterProfileContext,
    threshold: usize,
) -> i64 {
    let new_is_first = ctx.item1 == *new_id;
    let mut grew = false;
    if !rec.initialized_as_point {
        let own = if new_is_first { ctx.point2 } else { ctx.point1 };
        grew |= rec.points.insert(CoordKey::from(own));
    }
    let theirs = if ctx.item2 == *new_id {
        ctx.point2
    } else {
        ctx.point1
    };
    grew |= rec.points.insert(CoordKey::from(theirs));
    if grew {
        check_for_compression(rec, threshold);
    }
    1
}

fn check_for_compression(rec: &mut ClusterRecord, threshold: usize) {
    if rec.points.len() <= threshold {
        return;
    }
    let folded = rec.points.len();
    let points = std::mem::take(&mut rec.points);
    rec.geometry = geom::hull(rec.geometry.as_ref(), points.into_iter().map(|k| k.coord()), true)
        .or(rec.geometry.take());
    rec.compressed = true;
    tracing::debug!(folded, count = rec.count, "compressed");
}

/// Share of `other` not already covered by `this`, used to scale its count.
fn interpolation_factor(this: Option<&Geometry<f64>>, other: Option<&Geometry<f64>>) -> f64 {
    let (Some(this), Some(other)) = (this, other) else {
        return 1.0;
    };
    let inter = match geom::intersection(other, this) {
        Ok(g) => g,
        Err(err) => {
            tracing::warn!(%err, "cannot intersect geometries to interpolate size");
            return 0.0;
        }
    };
    let other_area = geom::area(other);
    if geom::is_point(&inter) && geom::is_point(other) {
        0.0
    } else if geom::is_empty(&inter) {
        1.0
    } else if other_area > 0.0 {
        1.0 - geom::area(&inter) / other_area
    } else {
        0.0
    }
}

/// Union, or a hull over both when the union cannot be computed.
fn union_or_hull(this: Option<Geometry<f64>>, other: Geometry<f64>) -> Option<Geometry<f64>> {
    let Some(this) = this else {
        return Some(other);
    };
    match geom::union(&this, &other) {
        Ok(u) => Some(u),
        Err(err) => {
            match &err {
                GeometryError::NonPolygonal => tracing::debug!(%err, "rebuilding hull"),
                GeometryError::Topology(_) => {
                    tracing::warn!(%err, "union failed, rebuilding hull")
                }
            }
            geom::hull(Some(&this), geom::coords(&other), false).or(Some(this))
        }
    }
}
