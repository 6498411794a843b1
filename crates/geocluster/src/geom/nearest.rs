use geo::{Coord, CoordsIter, Geometry};
use nalgebra::Vector2;

use super::covers;
use super::hull::{cross, to_coord, to_vec2};

/// Closest coordinate pair `(on a, on b)`. Intersecting inputs return a shared
/// point. `None` if either side has no coordinates.
pub fn nearest_points(a: &Geometry<f64>, b: &Geometry<f64>) -> Option<(Coord<f64>, Coord<f64>)> {
    let va: Vec<Coord<f64>> = a.coords_iter().collect();
    let vb: Vec<Coord<f64>> = b.coords_iter().collect();
    if va.is_empty() || vb.is_empty() {
        return None;
    }
    // Vertex inside the other geometry: distance zero.
    if let Some(c) = va.iter().find(|c| covers(b, **c)) {
        return Some((*c, *c));
    }
    if let Some(c) = vb.iter().find(|c| covers(a, **c)) {
        return Some((*c, *c));
    }
    let sa = segments(a);
    let sb = segments(b);
    for &(p1, p2) in &sa {
        for &(q1, q2) in &sb {
            if let Some(x) = crossing(p1, p2, q1, q2) {
                let c = to_coord(x);
                return Some((c, c));
            }
        }
    }
    // Otherwise the minimum is realised between a vertex and a segment.
    let mut best: Option<(f64, Vector2<f64>, Vector2<f64>)> = None;
    let mut consider = |pa: Vector2<f64>, pb: Vector2<f64>| {
        let d = (pa - pb).norm_squared();
        if best.as_ref().is_none_or(|(bd, _, _)| d < *bd) {
            best = Some((d, pa, pb));
        }
    };
    for c in &va {
        let p = to_vec2(*c);
        for &(q1, q2) in &sb {
            consider(p, closest_on_segment(p, q1, q2));
        }
    }
    for c in &vb {
        let q = to_vec2(*c);
        for &(p1, p2) in &sa {
            consider(closest_on_segment(q, p1, p2), q);
        }
    }
    best.map(|(_, pa, pb)| (to_coord(pa), to_coord(pb)))
}

/// Boundary segments; isolated points become zero-length segments.
fn segments(g: &Geometry<f64>) -> Vec<(Vector2<f64>, Vector2<f64>)> {
    let mut out = Vec::new();
    let mut push_ring = |coords: &[Coord<f64>]| {
        if coords.len() == 1 {
            let p = to_vec2(coords[0]);
            out.push((p, p));
        }
        for w in coords.windows(2) {
            out.push((to_vec2(w[0]), to_vec2(w[1])));
        }
    };
    match g {
        Geometry::Point(p) => push_ring(&[p.0]),
        Geometry::MultiPoint(mp) => {
            for p in mp.iter() {
                push_ring(&[p.0]);
            }
        }
        Geometry::Line(l) => push_ring(&[l.start, l.end]),
        Geometry::LineString(ls) => push_ring(&ls.0),
        Geometry::MultiLineString(mls) => {
            for ls in mls.iter() {
                push_ring(&ls.0);
            }
        }
        Geometry::Polygon(poly) => {
            push_ring(&poly.exterior().0);
            for ring in poly.interiors() {
                push_ring(&ring.0);
            }
        }
        Geometry::MultiPolygon(mp) => {
            for poly in mp.iter() {
                push_ring(&poly.exterior().0);
                for ring in poly.interiors() {
                    push_ring(&ring.0);
                }
            }
        }
        Geometry::Rect(r) => push_ring(&r.to_polygon().exterior().0),
        Geometry::Triangle(t) => push_ring(&t.to_polygon().exterior().0),
        Geometry::GeometryCollection(gc) => {
            for part in gc.iter() {
                for (a, b) in segments(part) {
                    push_ring(&[to_coord(a), to_coord(b)]);
                }
            }
        }
    }
    out
}

fn closest_on_segment(p: Vector2<f64>, a: Vector2<f64>, b: Vector2<f64>) -> Vector2<f64> {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= 0.0 {
        return a;
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

/// Proper or touching intersection point of segments `p1p2` and `q1q2`.
fn crossing(
    p1: Vector2<f64>,
    p2: Vector2<f64>,
    q1: Vector2<f64>,
    q2: Vector2<f64>,
) -> Option<Vector2<f64>> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denom = r.x * s.y - r.y * s.x;
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = cross(p1, q1, q1 + s) / denom;
    let u = cross(p1, q1, q1 + r) / denom;
    if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
        Some(p1 + r * t)
    } else {
        None
    }
}
