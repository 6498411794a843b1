//! Error types surfaced by the traversal and configuration layers.
//!
//! Geometry failures never reach this level: they are recovered inside the
//! cluster engine (see `geom::GeometryError`).

use std::fmt;

use crate::nn::{ItemId, PartitionKey};

/// Error type collaborators (converters, partitioners, distance functions,
/// notifiers) report through.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What stopped a traversal.
#[derive(Debug)]
pub enum TraversalCause {
    /// The distance-profile function failed.
    Distance(BoxError),
    /// The completion notifier failed.
    Notification(BoxError),
}

/// Errors surfaced by the partition index and the traversal engine.
#[derive(Debug)]
pub enum NnError {
    /// The type converter rejected a value; the point was not indexed.
    Conversion { id: ItemId, source: BoxError },
    /// The partitioner failed while placing a point (I/O-class failure).
    Partition { id: ItemId, source: BoxError },
    /// A traversal aborted. Cluster state merged so far is not rolled back.
    Traversal {
        partition: PartitionKey,
        id: ItemId,
        cause: TraversalCause,
    },
}

impl fmt::Display for NnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnError::Conversion { id, source } => {
                write!(f, "cannot convert value for item {id}: {source}")
            }
            NnError::Partition { id, source } => {
                write!(f, "I/O error partitioning item {id}: {source}")
            }
            NnError::Traversal {
                partition,
                id,
                cause: TraversalCause::Distance(source),
            } => write!(
                f,
                "traversal of partition {partition} aborted at item {id}: distance profile failed: {source}"
            ),
            NnError::Traversal {
                partition,
                id,
                cause: TraversalCause::Notification(source),
            } => write!(
                f,
                "traversal of partition {partition} aborted at item {id}: completion notifier failed: {source}"
            ),
        }
    }
}

impl std::error::Error for NnError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NnError::Conversion { source, .. } | NnError::Partition { source, .. } => {
                Some(source.as_ref())
            }
            NnError::Traversal { cause, .. } => match cause {
                TraversalCause::Distance(source) | TraversalCause::Notification(source) => {
                    Some(source.as_ref())
                }
            },
        }
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Invalid { reason: String },
    Parse(serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid { reason } => write!(f, "invalid configuration: {reason}"),
            Self::Parse(err) => write!(f, "cannot parse configuration: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Invalid { .. } => None,
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err)
    }
}
