//! Incremental DBSCAN over the neighbor traversal.
//!
//! Purpose
//! - Replace the plain neighbor list with one backed by a cluster: every
//!   accepted neighbor becomes a link, and clusters that reach `merge_size`
//!   merge transitively along their links.
//! - Accumulate each cluster's footprint as raw coordinates and fold them into
//!   a hull once there are more than `compression_threshold` of them.
//!
//! Pieces
//! - `item`: the clustered value, its distance function and profile context.
//! - `links`: pending cluster-to-item links, indexed both ways.
//! - `cluster`: the `ClusterIndex` arena (merge engine + geometry policy).
//! - `list`: `ClusterNeighborList` and its factory.
//! - `run`: `run_partition`, the per-partition driver.

mod cluster;
mod item;
mod links;
mod list;
mod run;

pub use cluster::{ClusterId, ClusterIndex};
pub use item::{ClusterItem, ClusterItemDistanceFn, ClusterProfileContext, CoordDistance};
pub use list::{ClusterListFactory, ClusterNeighborList};
pub use run::{run_partition, ClusterSummary};

#[cfg(test)]
mod tests;
