//! Partition-local nearest-neighbor discovery.
//!
//! Purpose
//! - Index points by the (overlapping) partitions an injected partitioner puts
//!   them in, then visit every primary once and build its neighbor list from the
//!   points sharing a partition with it.
//!
//! Pieces
//! - `partition`: the bidirectional partition ↔ id index plus the value maps.
//! - `list`: the `NeighborList` capability, the plain list, the per-run index.
//! - `processor`: `NnProcessor`, the traversal engine.
//! - `types`: ids, descriptors, distance profiles, collaborator traits.

mod list;
mod partition;
mod processor;
mod types;

pub use list::{
    DefaultListFactory, DefaultNeighborList, NeighborIndex, NeighborList, NeighborListFactory,
};
pub use partition::PartitionIndex;
pub use processor::NnProcessor;
pub use types::{
    CompleteNotifier, DistanceProfile, DistanceProfileFn, InferType, ItemId, PartitionData,
    PartitionKey, PartitionSink, Partitioner, TypeConverter,
};
