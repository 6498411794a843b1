use geo::{Coord, Geometry, LineString, Point, Polygon};
use nalgebra::Vector2;

use super::{coords, covers};

/// Andrew's monotone chain convex hull (CCW, no repeated closing vertex).
///
/// Fewer than three distinct or fully collinear inputs come back as the one or two
/// extreme points.
pub(crate) fn convex_hull(points: &[Vector2<f64>]) -> Vec<Vector2<f64>> {
    let mut pts: Vec<_> = points.iter().copied().filter(|p| p.iter().all(|c| c.is_finite())).collect();
    pts.sort_by(|a, b| match a.x.total_cmp(&b.x) {
        std::cmp::Ordering::Equal => a.y.total_cmp(&b.y),
        o => o,
    });
    pts.dedup_by(|a, b| (*a - *b).norm() < 1e-12);
    if pts.len() < 3 {
        return pts;
    }
    let mut lower: Vec<Vector2<f64>> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0.0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Vector2<f64>> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0.0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    let mut hull = lower;
    hull.extend(upper);
    hull
}

#[inline]
pub(crate) fn cross(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    ab.x * ac.y - ab.y * ac.x
}

/// Hull over `existing`'s coordinates plus `points`.
///
/// Without `rebuild`, an existing geometry that already covers every new point is
/// returned unchanged. Returns `None` only when there is nothing to enclose.
pub fn hull(
    existing: Option<&Geometry<f64>>,
    points: impl IntoIterator<Item = Coord<f64>>,
    rebuild: bool,
) -> Option<Geometry<f64>> {
    let extra: Vec<Coord<f64>> = points.into_iter().collect();
    if !rebuild {
        if let Some(g) = existing {
            if extra.iter().all(|c| covers(g, *c)) {
                return Some(g.clone());
            }
        }
    }
    let mut all: Vec<Vector2<f64>> = existing
        .map(|g| coords(g).into_iter().map(to_vec2).collect())
        .unwrap_or_default();
    all.extend(extra.into_iter().map(to_vec2));
    let ring = convex_hull(&all);
    match ring.len() {
        0 => existing.cloned(),
        1 => Some(Geometry::Point(Point(to_coord(ring[0])))),
        2 => Some(Geometry::LineString(LineString::from(vec![
            to_coord(ring[0]),
            to_coord(ring[1]),
        ]))),
        _ => Some(Geometry::Polygon(Polygon::new(
            LineString::from(ring.into_iter().map(to_coord).collect::<Vec<_>>()),
            vec![],
        ))),
    }
}

#[inline]
pub(crate) fn to_vec2(c: Coord<f64>) -> Vector2<f64> {
    Vector2::new(c.x, c.y)
}

#[inline]
pub(crate) fn to_coord(v: Vector2<f64>) -> Coord<f64> {
    Coord { x: v.x, y: v.y }
}
