//! Cluster seeded random blobs in one grid partition and print the clusters as
//! JSON lines.
//!
//! Usage: `cargo run --example grid_clusters -- [config.json]`
//! Set `RUST_LOG=geocluster=debug` to watch merges and compression.

use anyhow::Context;
use geocluster::geom::{self, Geometry};
use geocluster::nn::PartitionSink;
use geocluster::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

struct ItemGrid {
    cell: f64,
}

impl Partitioner<ClusterItem> for ItemGrid {
    fn partition(&self, item: &ClusterItem, emit: &mut PartitionSink<'_>) -> Result<(), BoxError> {
        let c = geom::centroid(&item.geometry).ok_or("no centroid")?;
        let cx = (c.x / self.cell).floor() as i64;
        let cy = (c.y / self.cell).floor() as i64;
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
}

fn outline(g: &Geometry<f64>) -> Vec<[f64; 2]> {
    geom::coords(g).into_iter().map(|c| [c.x, c.y]).collect()
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            DbscanCfg::from_json(&text).with_context(|| format!("parsing {path}"))?
        }
        None => DbscanCfg {
            max_distance: 0.3,
            min_owners: 3,
            ..DbscanCfg::default()
        },
    };

    let mut rng = StdRng::seed_from_u64(42);
    let mut items = Vec::new();
    for (b, (cx, cy)) in [(0.0, 0.0), (4.0, 1.0), (1.5, 5.0)].into_iter().enumerate() {
        for k in 0..400 {
            let r = 1.2 * rng.gen::<f64>().sqrt();
            let t = rng.gen::<f64>() * std::f64::consts::TAU;
            items.push(ClusterItem::point(
                format!("b{b}-{k:03}"),
                cx + r * t.cos(),
                cy + r * t.sin(),
            ));
        }
    }
    for k in 0..40 {
        items.push(ClusterItem::point(
            format!("noise-{k:02}"),
            rng.gen_range(-3.0..8.0),
            rng.gen_range(-3.0..8.0),
        ));
    }

    let summaries = run_partition(
        &cfg,
        PartitionData::new(PartitionKey::cell(&[0]), true),
        ItemGrid {
            cell: cfg.max_distance,
        },
        items.into_iter().map(|i| (i, true)),
    )?;

    for s in &summaries {
        let line = serde_json::json!({
            "id": s.id.to_string(),
            "members": s.members.len(),
            "count": s.count,
            "compressed": s.compressed,
            "area": s.geometry.as_ref().map(geom::area),
            "outline": s.geometry.as_ref().map(outline),
        });
        println!("{line}");
    }
    Ok(())
}
