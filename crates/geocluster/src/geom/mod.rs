//! Planar geometry used by the cluster engine.
//!
//! Purpose
//! - Union, intersection, area, centroid, covers and hull over `geo` geometries,
//!   with failures reported instead of propagated as panics.
//! - Nearest coordinate pairs between two geometries (distance profiles).
//!
//! Assumptions and conventions
//! - Cluster footprints are points, segments (two-point hulls), polygons or
//!   multipolygons. Only areal operands take part in boolean ops; anything else
//!   reports `GeometryError::NonPolygonal` and callers rebuild a hull instead.
//! - Point equality uses `EPS = 1e-12`.

mod hull;
mod nearest;

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::{Area, BooleanOps, Centroid, CoordsIter, Intersects, MultiPoint, MultiPolygon, Point};

pub use geo::{Coord, Geometry};
pub use hull::hull;
pub use nearest::nearest_points;

const EPS: f64 = 1e-12;

/// Boolean-op failure. Recovered by hull reconstruction, never fatal.
#[derive(Clone, Debug, PartialEq)]
pub enum GeometryError {
    /// Invalid or self-intersecting input made the operation fail.
    Topology(String),
    /// An operand has no area (point, segment, empty).
    NonPolygonal,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Topology(reason) => write!(f, "topology error: {reason}"),
            Self::NonPolygonal => write!(f, "operand is not polygonal"),
        }
    }
}

impl std::error::Error for GeometryError {}

/// Hashable exact coordinate (`-0.0` folded into `0.0`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CoordKey {
    x: u64,
    y: u64,
}

impl CoordKey {
    #[inline]
    pub fn coord(self) -> Coord<f64> {
        Coord {
            x: f64::from_bits(self.x),
            y: f64::from_bits(self.y),
        }
    }
}

impl From<Coord<f64>> for CoordKey {
    #[inline]
    fn from(c: Coord<f64>) -> Self {
        // `+ 0.0` turns -0.0 into 0.0.
        Self {
            x: (c.x + 0.0).to_bits(),
            y: (c.y + 0.0).to_bits(),
        }
    }
}

/// The empty geometry.
#[inline]
pub fn empty() -> Geometry<f64> {
    Geometry::MultiPolygon(MultiPolygon(vec![]))
}

pub fn is_empty(g: &Geometry<f64>) -> bool {
    g.coords_count() == 0
}

#[inline]
pub fn is_point(g: &Geometry<f64>) -> bool {
    matches!(g, Geometry::Point(_))
}

pub fn area(g: &Geometry<f64>) -> f64 {
    g.unsigned_area()
}

pub fn centroid(g: &Geometry<f64>) -> Option<Coord<f64>> {
    g.centroid().map(|p| p.0)
}

pub fn coords(g: &Geometry<f64>) -> Vec<Coord<f64>> {
    g.coords_iter().collect()
}

/// `c` lies in `g` or on its boundary.
pub fn covers(g: &Geometry<f64>, c: Coord<f64>) -> bool {
    match g {
        Geometry::Point(p) => same(p.0, c),
        Geometry::MultiPoint(mp) => mp.iter().any(|p| same(p.0, c)),
        Geometry::Line(l) => l.intersects(&c),
        Geometry::LineString(ls) => ls.intersects(&c),
        Geometry::Polygon(poly) => poly.intersects(&c),
        Geometry::MultiPolygon(mp) => mp.iter().any(|poly| poly.intersects(&c)),
        Geometry::Rect(r) => r.to_polygon().intersects(&c),
        Geometry::Triangle(t) => t.to_polygon().intersects(&c),
        _ => coords(g).into_iter().any(|v| same(v, c)),
    }
}

/// Union of two areal geometries.
pub fn union(a: &Geometry<f64>, b: &Geometry<f64>) -> Result<Geometry<f64>, GeometryError> {
    check_finite(a)?;
    check_finite(b)?;
    let (Some(ma), Some(mb)) = (areal(a), areal(b)) else {
        return Err(GeometryError::NonPolygonal);
    };
    let out = guarded(|| ma.union(&mb))?;
    if out.0.is_empty() {
        return Err(GeometryError::Topology("union produced no polygons".into()));
    }
    Ok(collapse(out))
}

/// Intersection. Areal pairs use boolean ops; for anything else the result is
/// the coordinates of the lower-dimensional operand that the other one covers.
pub fn intersection(
    a: &Geometry<f64>,
    b: &Geometry<f64>,
) -> Result<Geometry<f64>, GeometryError> {
    check_finite(a)?;
    check_finite(b)?;
    match (areal(a), areal(b)) {
        (Some(ma), Some(mb)) => Ok(collapse(guarded(|| ma.intersection(&mb))?)),
        (None, _) => Ok(covered_points(a, b)),
        (Some(_), None) => Ok(covered_points(b, a)),
    }
}

fn covered_points(low: &Geometry<f64>, other: &Geometry<f64>) -> Geometry<f64> {
    let mut hits: Vec<Point<f64>> = Vec::new();
    for c in coords(low) {
        if covers(other, c) && !hits.iter().any(|p| same(p.0, c)) {
            hits.push(Point(c));
        }
    }
    match hits.len() {
        0 => empty(),
        1 => Geometry::Point(hits[0]),
        _ => Geometry::MultiPoint(MultiPoint(hits)),
    }
}

/// Areal view of `g`; `None` for points, lines and zero-area polygons.
fn areal(g: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    let mp = match g {
        Geometry::Polygon(p) => MultiPolygon(vec![p.clone()]),
        Geometry::MultiPolygon(mp) => mp.clone(),
        Geometry::Rect(r) => MultiPolygon(vec![r.to_polygon()]),
        Geometry::Triangle(t) => MultiPolygon(vec![t.to_polygon()]),
        _ => return None,
    };
    if mp.unsigned_area() > 0.0 {
        Some(mp)
    } else {
        None
    }
}

fn collapse(mut mp: MultiPolygon<f64>) -> Geometry<f64> {
    if mp.0.len() == 1 {
        Geometry::Polygon(mp.0.remove(0))
    } else {
        Geometry::MultiPolygon(mp)
    }
}

fn check_finite(g: &Geometry<f64>) -> Result<(), GeometryError> {
    if g.coords_iter().all(|c| c.x.is_finite() && c.y.is_finite()) {
        Ok(())
    } else {
        Err(GeometryError::Topology("non-finite coordinate".into()))
    }
}

/// Boolean ops in `geo` panic on some invalid inputs; turn that into an error.
///
/// Only effective with `panic = "unwind"`. Under `panic = "abort"` the process
/// still aborts, and with unwinding the default panic hook still prints the
/// panic to stderr before it is caught here.
fn guarded<T>(op: impl FnOnce() -> T) -> Result<T, GeometryError> {
    catch_unwind(AssertUnwindSafe(op)).map_err(|payload| {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "boolean operation panicked".to_string());
        GeometryError::Topology(reason)
    })
}

#[inline]
fn same(a: Coord<f64>, b: Coord<f64>) -> bool {
    (a.x - b.x).abs() <= EPS && (a.y - b.y).abs() <= EPS
}
