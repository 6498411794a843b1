use super::links::LinkGraph;
use super::*;
use crate::config::{ClusterCfg, ClusterKind, DbscanCfg, NeighborCfg};
use crate::error::BoxError;
use crate::geom::{self, Geometry};
use crate::nn::{
    DistanceProfile, DistanceProfileFn, InferType, ItemId, NeighborList, NeighborListFactory,
    NnProcessor, PartitionData, PartitionKey, PartitionSink, Partitioner,
};
use geo::polygon;
use std::cell::RefCell;
use std::rc::Rc;

/// Everything lands in one primary cell.
struct OneCell;

impl Partitioner<ClusterItem> for OneCell {
    fn partition(&self, _item: &ClusterItem, emit: &mut PartitionSink<'_>) -> Result<(), BoxError> {
        emit(PartitionData::new(PartitionKey::cell(&[0, 0]), true))
    }
}

fn cfg(merge_size: usize) -> ClusterCfg {
    ClusterCfg {
        merge_size,
        ..ClusterCfg::default()
    }
}

fn square(id: &str, x0: f64, y0: f64, side: f64, count: u64) -> ClusterItem {
    let poly = polygon![
        (x: x0, y: y0),
        (x: x0 + side, y: y0),
        (x: x0 + side, y: y0 + side),
        (x: x0, y: y0 + side)
    ];
    ClusterItem::new(ItemId::from(id), Geometry::Polygon(poly), count, true)
}

fn profile(center: &ClusterItem, other: &ClusterItem) -> DistanceProfile<ClusterProfileContext> {
    ClusterItemDistanceFn::default().profile(center, other).unwrap()
}

/// Link `cid` (grown from `center`) to `other`.
fn link(index: &mut ClusterIndex, cid: ClusterId, center: &ClusterItem, other: &ClusterItem) -> bool {
    index.add_link(cid, &profile(center, other), &other.id)
}

#[test]
fn three_mutual_neighbors_end_in_one_finished_cluster() {
    let clusters = Rc::new(RefCell::new(ClusterIndex::new(cfg(2))));
    let mut nn = NnProcessor::new(
        OneCell,
        |_id: &ItemId, item: &ClusterItem| -> Result<ClusterItem, BoxError> { Ok(item.clone()) },
        ClusterItemDistanceFn::default(),
        NeighborCfg { max_distance: 2.0 },
        PartitionData::new(PartitionKey::cell(&[0]), true),
    );
    for (name, x) in [("A", 0.0), ("B", 0.5), ("C", 1.0)] {
        let item = ClusterItem::point(name, x, 0.0);
        nn.add(item.id.clone(), true, &item).unwrap();
    }
    nn.process(
        ClusterListFactory::new(Rc::clone(&clusters)),
        |_id: &ItemId, _item: &ClusterItem, list: &mut ClusterNeighborList| -> Result<(), BoxError> {
            list.finish();
            Ok(())
        },
    )
    .unwrap();

    let clusters = clusters.borrow();
    let cid = clusters.cluster_of(&ItemId::from("A")).unwrap();
    let mut members: Vec<String> = clusters.members(cid).iter().map(|m| m.to_string()).collect();
    members.sort();
    assert_eq!(members, ["A", "B", "C"]);
    assert_eq!(clusters.link_count(cid), 0);
    assert!(clusters.is_finished(cid));
    assert_eq!(clusters.size(cid), 3);
    assert_eq!(clusters.clusters().count(), 1);
    assert!(clusters.is_consistent());
}

#[test]
fn compresses_after_the_201st_coordinate() {
    let mut index = ClusterIndex::new(cfg(2));
    let center = ClusterItem::point("center", 0.0, 0.0);
    let cid = index.get_or_create(&center.id, &center);
    // The center's own coordinate is the first one.
    assert_eq!(index.raw_point_count(cid), 1);
    for k in 0..250 {
        let angle = k as f64 * 0.7;
        let r = 1.0 + k as f64 * 0.01;
        let item = ClusterItem::point(format!("p{k}"), r * angle.cos(), r * angle.sin());
        assert!(link(&mut index, cid, &center, &item));
        match k {
            0..=198 => assert!(!index.is_compressed(cid)),
            199 => {
                assert!(index.is_compressed(cid));
                assert_eq!(index.raw_point_count(cid), 0);
            }
            _ => assert!(index.is_compressed(cid)),
        }
    }
    assert_eq!(index.raw_point_count(cid), 50);
    assert_eq!(index.size(cid), 251);
    assert!(geom::area(index.geometry(cid).unwrap()) > 0.0);
    // The read view folds pending points without touching the cluster.
    let view = index.get(cid).unwrap();
    assert!(geom::area(&view) >= geom::area(index.geometry(cid).unwrap()));
    assert_eq!(index.raw_point_count(cid), 50);
}

#[test]
fn merging_with_itself_changes_nothing() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = ClusterItem::point("a", 0.0, 0.0);
    let b = ClusterItem::point("b", 1.0, 0.0);
    let cid = index.get_or_create(&a.id, &a);
    link(&mut index, cid, &a, &b);
    index.merge(cid, cid);
    assert_eq!(index.size(cid), 2);
    assert_eq!(index.members(cid).len(), 1);
    assert_eq!(index.link_count(cid), 1);
    assert!(index.links(cid).all(|id| *id != a.id));
}

#[test]
fn disjoint_compressed_clusters_add_up() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = square("a", 0.0, 0.0, 1.0, 10);
    let b = square("b", 5.0, 5.0, 1.0, 7);
    let ca = index.get_or_create(&a.id, &a);
    let cb = index.get_or_create(&b.id, &b);
    index.merge(ca, cb);
    assert_eq!(index.size(ca), 17);
    assert!(!index.is_live(cb));
    assert_eq!(index.cluster_of(&b.id), Some(ca));
    assert!((geom::area(index.geometry(ca).unwrap()) - 2.0).abs() < 1e-9);
    assert!(index.is_consistent());
}

#[test]
fn overlapping_compressed_clusters_do_not_double_count() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = square("a", 0.0, 0.0, 2.0, 10);
    let b = square("b", 0.0, 0.0, 2.0, 7);
    let ca = index.get_or_create(&a.id, &a);
    let cb = index.get_or_create(&b.id, &b);
    index.merge(ca, cb);
    assert_eq!(index.size(ca), 10);

    // Half of c overlaps a: half its interior count plus its new centroid.
    let c = square("c", 1.0, 0.0, 2.0, 5);
    let cc = index.get_or_create(&c.id, &c);
    index.merge(ca, cc);
    assert_eq!(index.size(ca), 13);
    assert!(index.is_compressed(ca));
}

#[test]
fn merge_survives_a_polygon_with_a_nan_vertex() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = square("a", 0.0, 0.0, 2.0, 10);
    let bad = polygon![
        (x: 5.0, y: 5.0),
        (x: 6.0, y: 6.0),
        (x: 5.0, y: 6.0),
        (x: f64::NAN, y: 5.5)
    ];
    let b = ClusterItem::new(ItemId::from("b"), Geometry::Polygon(bad.clone()), 4, true);
    let ca = index.get_or_create(&a.id, &a);
    let cb = index.get_or_create(&b.id, &b);

    // Intersection fails (factor 0) and union fails (hull over both instead).
    index.merge(ca, cb);
    assert!(index.is_live(ca));
    assert!(!index.is_live(cb));
    assert!(index.is_compressed(ca));
    let fresh_centroid = usize::from(geom::centroid(&b.geometry).is_some());
    assert_eq!(index.size(ca), 10 + fresh_centroid);

    let g = index.geometry(ca).unwrap();
    assert!(matches!(g, Geometry::Polygon(_)));
    let finite = geom::coords(&a.geometry)
        .into_iter()
        .chain(geom::coords(&b.geometry))
        .filter(|c| c.x.is_finite() && c.y.is_finite());
    for c in finite {
        assert!(geom::covers(g, c), "{c:?} not covered");
    }
    assert!(index.is_consistent());
}

#[test]
fn absorbed_point_origin_is_not_recounted() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = ClusterItem::point("a", 0.0, 0.0);
    let b = ClusterItem::point("b", 1.0, 0.0);
    let ca = index.get_or_create(&a.id, &a);
    let cb = index.get_or_create(&b.id, &b);
    index.merge(ca, cb);
    // The count is approximate: b's origin arrives as geometry, uncounted.
    assert_eq!(index.members(ca).len(), 2);
    assert_eq!(index.size(ca), 1);
    assert_eq!(index.raw_point_count(ca), 2);
    assert!(index.is_consistent());
}

#[test]
fn invalidate_unlinks_from_peers() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = ClusterItem::point("a", 0.0, 0.0);
    let b = ClusterItem::point("b", 0.5, 0.0);
    let ca = index.get_or_create(&a.id, &a);
    let cb = index.get_or_create(&b.id, &b);
    assert!(link(&mut index, ca, &a, &b));
    assert!(link(&mut index, cb, &b, &a));
    assert_eq!(index.infer(ca, &b.id), InferType::Skip);

    index.invalidate(cb);
    assert_eq!(index.count(cb), Some(-1));
    assert_eq!(index.size(cb), 0);
    assert_eq!(index.cluster_of(&b.id), None);
    assert_eq!(index.link_count(ca), 0);
    assert!(index.geometry(cb).is_none());
    assert_eq!(index.infer(ca, &b.id), InferType::None);
    assert_eq!(index.clusters().collect::<Vec<_>>(), vec![ca]);
    assert!(index.is_consistent());
}

#[test]
fn repeated_and_own_links_are_rejected() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = ClusterItem::point("a", 0.0, 0.0);
    let b = ClusterItem::point("b", 0.5, 0.0);
    let ca = index.get_or_create(&a.id, &a);
    assert!(link(&mut index, ca, &a, &b));
    assert!(!link(&mut index, ca, &a, &b));
    assert_eq!(index.size(ca), 2);
    // Linking to an owned id records the link but counts nothing.
    assert!(!link(&mut index, ca, &a, &a));
    assert_eq!(index.size(ca), 2);
}

#[test]
fn late_link_to_finished_cluster_merges() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = ClusterItem::point("a", 0.0, 0.0);
    let x = ClusterItem::point("x", -0.5, 0.0);
    let b = ClusterItem::point("b", 1.0, 0.0);
    let c = ClusterItem::point("c", 1.5, 0.0);
    let ca = index.get_or_create(&a.id, &a);
    let cb = index.get_or_create(&b.id, &b);
    link(&mut index, ca, &a, &x);
    link(&mut index, cb, &b, &c);
    index.finish(ca);
    // `x` owns no cluster, so the final pass prunes it.
    assert_eq!(index.link_count(ca), 0);
    assert!(index.is_finished(ca));

    assert!(link(&mut index, ca, &a, &b));
    assert_eq!(index.cluster_of(&b.id), Some(ca));
    assert!(!index.is_live(cb));
    assert_eq!(index.members(ca), [a.id.clone(), b.id.clone()]);
    assert!(index.is_consistent());
}

#[test]
fn pre_process_clusters_never_merge() {
    let mut index = ClusterIndex::new(ClusterCfg {
        kind: ClusterKind::PreProcess,
        ..cfg(1)
    });
    let a = ClusterItem::point("a", 0.0, 0.0);
    let b = ClusterItem::point("b", 0.5, 0.0);
    let ca = index.get_or_create(&a.id, &a);
    let cb = index.get_or_create(&b.id, &b);
    link(&mut index, ca, &a, &b);
    index.finish(ca);
    assert!(index.is_live(cb));
    assert_eq!(index.link_count(ca), 1);
    assert_eq!(index.size(ca), 2);
}

#[test]
fn neighbor_list_follows_its_center_across_merges() {
    let clusters = Rc::new(RefCell::new(ClusterIndex::new(cfg(1))));
    let mut factory = ClusterListFactory::new(Rc::clone(&clusters));
    let a = ClusterItem::point("a", 0.0, 0.0);
    let b = ClusterItem::point("b", 0.5, 0.0);
    let mut la = factory.build(&a.id, &a);
    let mut lb = factory.build(&b.id, &b);
    assert_ne!(la.cluster(), lb.cluster());
    assert_eq!(la.infer(&b.id, &b), InferType::None);
    assert!(la.add(&profile(&a, &b), &b.id, &b));
    assert_eq!(la.infer(&b.id, &b), InferType::Skip);
    la.finish();
    assert_eq!(la.cluster(), lb.cluster());
    assert_eq!(lb.size(), 2);
    assert!(lb.is_finished());

    la.invalidate();
    assert_eq!(lb.cluster(), None);
    assert_eq!(lb.size(), 0);
    assert!(lb.is_empty());
    // No cluster behind the center: nothing left to measure for.
    let c = ClusterItem::point("c", 2.0, 0.0);
    assert_eq!(lb.infer(&c.id, &c), InferType::Skip);
    assert!(!lb.add(&profile(&b, &c), &c.id, &c));
}

#[test]
fn link_graph_keeps_both_directions() {
    let mut index = ClusterIndex::new(cfg(2));
    let a = ClusterItem::point("a", 0.0, 0.0);
    let b = ClusterItem::point("b", 1.0, 0.0);
    let ca = index.get_or_create(&a.id, &a);
    let cb = index.get_or_create(&b.id, &b);

    let mut g = LinkGraph::default();
    let (x, y) = (ItemId::from("x"), ItemId::from("y"));
    assert!(g.link(ca, &x));
    assert!(!g.link(ca, &x));
    g.link(cb, &x);
    g.link(cb, &y);
    g.absorb(ca, cb);
    assert_eq!(g.len(ca), 2);
    assert_eq!(g.len(cb), 0);
    g.detach(&x);
    assert!(!g.contains(ca, &x));
    assert_eq!(g.targets(ca), vec![y.clone()]);
    assert!(g.unlink(ca, &y));
    assert!(!g.unlink(ca, &y));
    assert!(g.is_consistent());
}

#[test]
fn item_distance_uses_nearest_coordinates() {
    let a = square("a", 0.0, 0.0, 1.0, 1);
    let p = ClusterItem::point("p", 3.0, 0.5);
    let d = profile(&a, &p);
    assert!((d.distance - 2.0).abs() < 1e-12);
    assert_eq!(d.context.item1, a.id);
    assert_eq!(d.context.point2, geo::Coord { x: 3.0, y: 0.5 });
    let inside = ClusterItem::point("q", 0.5, 0.5);
    assert_eq!(profile(&a, &inside).distance, 0.0);
}

#[test]
fn haversine_measures_degrees_on_the_sphere() {
    let radius = 6_371_008.8;
    let h = CoordDistance::Haversine { radius };
    let one_degree = h.measure(geo::Coord { x: 0.0, y: 0.0 }, geo::Coord { x: 0.0, y: 1.0 });
    assert!((one_degree - radius * std::f64::consts::PI / 180.0).abs() < 1e-6);
    // Longitude degrees shrink with latitude.
    let at_60 = h.measure(geo::Coord { x: 0.0, y: 60.0 }, geo::Coord { x: 1.0, y: 60.0 });
    assert!((at_60 / one_degree - 0.5).abs() < 1e-3);
}

#[test]
fn run_partition_drops_noise() {
    let cfg = DbscanCfg {
        max_distance: 1.0,
        min_owners: 2,
        ..DbscanCfg::default()
    };
    let items = [
        ClusterItem::point("A", 0.0, 0.0),
        ClusterItem::point("B", 0.5, 0.0),
        ClusterItem::point("C", 10.0, 0.0),
    ];
    let out = run_partition(
        &cfg,
        PartitionData::new(PartitionKey::cell(&[0]), true),
        OneCell,
        items.into_iter().map(|i| (i, true)),
    )
    .unwrap();
    assert_eq!(out.len(), 1);
    let summary = &out[0];
    assert_eq!(summary.id, ItemId::from("A"));
    assert_eq!(summary.members, [ItemId::from("A"), ItemId::from("B")]);
    assert_eq!(summary.count, 2);
    assert!(!summary.compressed);
    let item = summary.to_item().unwrap();
    assert!(item.compressed);
    assert_eq!(item.count, 2);
}
