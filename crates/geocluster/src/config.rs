//! Run configuration.
//!
//! - `NeighborCfg`: acceptance radius of the neighbor traversal.
//! - `ClusterCfg`: merge threshold and compression policy of the cluster engine.
//! - `DbscanCfg`: flat, serializable bundle used by `dbscan::run_partition`.

use serde::{Deserialize, Serialize};

use crate::dbscan::CoordDistance;
use crate::error::ConfigError;

/// Raw coordinate count above which a cluster folds its points into a hull.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 200;

/// Neighbor traversal configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborCfg {
    /// Neighbors with `distance <= max_distance` are accepted.
    pub max_distance: f64,
}

impl Default for NeighborCfg {
    fn default() -> Self {
        Self { max_distance: 1.0 }
    }
}

/// Which cluster behavior the factory builds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterKind {
    /// Link, merge and compress.
    #[default]
    Merging,
    /// Link and compress only. Used for a first summarising pass over dense data.
    PreProcess,
}

/// Cluster engine configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterCfg {
    /// Both ends of a link must reach this size before they merge.
    pub merge_size: usize,
    /// See `DEFAULT_COMPRESSION_THRESHOLD`.
    pub compression_threshold: usize,
    pub kind: ClusterKind,
}

impl Default for ClusterCfg {
    fn default() -> Self {
        Self {
            merge_size: 2,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            kind: ClusterKind::Merging,
        }
    }
}

/// DBSCAN partition run configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbscanCfg {
    pub max_distance: f64,
    /// Minimum cluster size. Smaller clusters are noise; it is also the merge size.
    pub min_owners: usize,
    pub compression_threshold: usize,
    pub kind: ClusterKind,
    pub coord_distance: CoordDistance,
}

impl Default for DbscanCfg {
    fn default() -> Self {
        Self {
            max_distance: 1.0,
            min_owners: 2,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
            kind: ClusterKind::Merging,
            coord_distance: CoordDistance::Euclidean,
        }
    }
}

impl DbscanCfg {
    /// Parse a JSON document (missing fields take defaults) and validate it.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: DbscanCfg = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_distance.is_finite() || self.max_distance < 0.0 {
            return Err(ConfigError::invalid(
                "max_distance must be finite and >= 0",
            ));
        }
        if self.min_owners == 0 {
            return Err(ConfigError::invalid("min_owners must be > 0"));
        }
        if self.compression_threshold == 0 {
            return Err(ConfigError::invalid("compression_threshold must be > 0"));
        }
        if let CoordDistance::Haversine { radius } = self.coord_distance {
            if !radius.is_finite() || radius <= 0.0 {
                return Err(ConfigError::invalid("haversine radius must be > 0"));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn neighbor(&self) -> NeighborCfg {
        NeighborCfg {
            max_distance: self.max_distance,
        }
    }

    #[inline]
    pub fn cluster(&self) -> ClusterCfg {
        ClusterCfg {
            merge_size: self.min_owners,
            compression_threshold: self.compression_threshold,
            kind: self.kind,
        }
    }
}
