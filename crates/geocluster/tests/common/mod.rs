//! Shared partitioners and generators for the integration tests.
#![allow(dead_code)]

use geocluster::geom;
use geocluster::nn::PartitionSink;
use geocluster::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

pub type Pt = (f64, f64);

fn grid_cells(x: f64, y: f64, cell: f64, emit: &mut PartitionSink<'_>) -> Result<(), BoxError> {
    if !x.is_finite() || !y.is_finite() {
        return Err("non-finite coordinate".into());
    }
    let cx = (x / cell).floor() as i64;
    let cy = (y / cell).floor() as i64;
    for dx in -1..=1 {
        for dy in -1..=1 {
            emit(PartitionData::new(
                PartitionKey::cell(&[cx + dx, cy + dy]),
                dx == 0 && dy == 0,
            ))?;
        }
    }
    Ok(())
}

/// Own grid cell (primary) plus the eight around it. With `cell >= max_distance`
/// every pair within range shares a partition.
pub struct Grid {
    pub cell: f64,
}

impl Partitioner<Pt> for Grid {
    fn partition(&self, p: &Pt, emit: &mut PartitionSink<'_>) -> Result<(), BoxError> {
        grid_cells(p.0, p.1, self.cell, emit)
    }
}

/// `Grid` keyed on the item's centroid.
pub struct ItemGrid {
    pub cell: f64,
}

impl Partitioner<ClusterItem> for ItemGrid {
    fn partition(&self, item: &ClusterItem, emit: &mut PartitionSink<'_>) -> Result<(), BoxError> {
        let c = geom::centroid(&item.geometry)
            .ok_or_else(|| format!("item {} has no centroid", item.id))?;
        grid_cells(c.x, c.y, self.cell, emit)
    }
}

pub fn euclid(a: &Pt, b: &Pt) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// `n` points uniformly in the disk of `radius` around `center`.
pub fn blob(rng: &mut StdRng, prefix: &str, center: Pt, radius: f64, n: usize) -> Vec<ClusterItem> {
    (0..n)
        .map(|k| {
            let r = radius * rng.gen::<f64>().sqrt();
            let t = rng.gen::<f64>() * std::f64::consts::TAU;
            ClusterItem::point(
                format!("{prefix}{k:03}"),
                center.0 + r * t.cos(),
                center.1 + r * t.sin(),
            )
        })
        .collect()
}

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}
