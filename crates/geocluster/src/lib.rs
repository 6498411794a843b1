//! Partition-local nearest-neighbor traversal and incremental DBSCAN clustering.
//!
//! Points arrive already split into overlapping spatial partitions. Within one
//! partition group:
//! - `nn` indexes points by partition, then walks the primaries in a greedy
//!   farthest-neighbor order and builds a neighbor list per primary.
//! - `dbscan` plugs a cluster-backed neighbor list into that walk; clusters link,
//!   merge transitively once large enough, and compress their raw coordinates
//!   into hull geometry.
//! - `geom` is the planar geometry layer both sides lean on.
//!
//! Everything here is single-threaded per partition group. Parallelism comes from
//! running disjoint partition groups on separate workers.

pub mod config;
pub mod dbscan;
pub mod error;
pub mod geom;
pub mod nn;

pub use config::{ClusterCfg, ClusterKind, DbscanCfg, NeighborCfg};
pub use error::{BoxError, ConfigError, NnError, TraversalCause};

/// Common exports for quick imports in callers.
pub mod prelude {
    pub use crate::config::{ClusterCfg, ClusterKind, DbscanCfg, NeighborCfg};
    pub use crate::dbscan::{
        run_partition, ClusterId, ClusterIndex, ClusterItem, ClusterItemDistanceFn,
        ClusterListFactory, ClusterNeighborList, ClusterProfileContext, ClusterSummary,
        CoordDistance,
    };
    pub use crate::error::{BoxError, NnError};
    pub use crate::geom::{Coord, Geometry};
    pub use crate::nn::{
        DefaultNeighborList, DistanceProfile, DistanceProfileFn, InferType, ItemId,
        NeighborList, NeighborListFactory, NnProcessor, PartitionData, PartitionKey, Partitioner,
        TypeConverter,
    };
}
