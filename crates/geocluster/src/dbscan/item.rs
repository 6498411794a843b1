use geo::Point;
use serde::{Deserialize, Serialize};

use crate::error::BoxError;
use crate::geom::{nearest_points, Coord, Geometry};
use crate::nn::{DistanceProfile, DistanceProfileFn, ItemId};

/// The value DBSCAN clusters: a feature footprint plus how many points it
/// stands for. Summaries from an earlier pass come back as compressed items.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterItem {
    pub id: ItemId,
    pub geometry: Geometry<f64>,
    pub count: u64,
    pub compressed: bool,
}

impl ClusterItem {
    pub fn new(id: ItemId, geometry: Geometry<f64>, count: u64, compressed: bool) -> Self {
        Self {
            id,
            geometry,
            count,
            compressed,
        }
    }

    /// Single raw point.
    pub fn point(id: impl Into<ItemId>, x: f64, y: f64) -> Self {
        Self::new(id.into(), Geometry::Point(Point::new(x, y)), 1, false)
    }
}

/// Which coordinates realised the distance between two items.
///
/// `point1` lies on `item1` (the center when produced by the traversal) and
/// `point2` on `item2`.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterProfileContext {
    pub point1: Coord<f64>,
    pub item1: ItemId,
    pub point2: Coord<f64>,
    pub item2: ItemId,
}

/// Distance between two coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordDistance {
    /// Planar distance in coordinate units.
    #[default]
    Euclidean,
    /// Great-circle distance for `x = lon`, `y = lat` in degrees, scaled by
    /// `radius` (e.g. metres on a 6 371 008.8 m sphere).
    Haversine { radius: f64 },
}

impl CoordDistance {
    pub fn measure(&self, a: Coord<f64>, b: Coord<f64>) -> f64 {
        match *self {
            Self::Euclidean => (a.x - b.x).hypot(a.y - b.y),
            Self::Haversine { radius } => {
                let (lat1, lat2) = (a.y.to_radians(), b.y.to_radians());
                let dlat = lat2 - lat1;
                let dlon = (b.x - a.x).to_radians();
                let h = (dlat / 2.0).sin().powi(2)
                    + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
                2.0 * radius * h.sqrt().min(1.0).asin()
            }
        }
    }
}

/// Distance between the closest coordinates of two item geometries, zero when
/// they intersect.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ClusterItemDistanceFn {
    pub coord_distance: CoordDistance,
}

impl ClusterItemDistanceFn {
    #[inline]
    pub fn new(coord_distance: CoordDistance) -> Self {
        Self { coord_distance }
    }
}

impl DistanceProfileFn<ClusterItem> for ClusterItemDistanceFn {
    type Context = ClusterProfileContext;

    fn profile(
        &self,
        a: &ClusterItem,
        b: &ClusterItem,
    ) -> Result<DistanceProfile<ClusterProfileContext>, BoxError> {
        let (point1, point2) = nearest_points(&a.geometry, &b.geometry).ok_or_else(|| {
            format!("no coordinates to compare between {} and {}", a.id, b.id)
        })?;
        Ok(DistanceProfile {
            distance: self.coord_distance.measure(point1, point2),
            context: ClusterProfileContext {
                point1,
                item1: a.id.clone(),
                point2,
                item2: b.id.clone(),
            },
        })
    }
}
