// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Curve Tesselator: circles, arcs, bulges, and splines to polyline point
//! sequences.
//!
//! Bulge-to-arc and the NURBS evaluation are adapted from the teacher's
//! `add_poly_segment`/`eval_spline`/`derivative_control_points` in
//! `tabulon_dxf/src/lib.rs`, re-targeted to emit `Vec<Point2>` samples
//! instead of `kurbo::BezPath` curve segments.

use alloc::vec::Vec;
use core::f64::consts::PI;

use crate::model::Point2;

/// Default angular step per tesselated segment, in degrees (§6's hard limit).
pub(crate) const DEFAULT_DEVIATION_DEGREES: f64 = 2.5;

fn segment_count(sweep_degrees: f64, deviation_degrees: f64) -> usize {
    let deviation = deviation_degrees.max(0.01);
    ((sweep_degrees.abs() / deviation).ceil() as usize).max(1)
}

/// Sample a closed circle ring, center `(cx, cy)`, radius `r`.
pub(crate) fn tesselate_circle(cx: f64, cy: f64, r: f64, deviation_degrees: f64) -> Vec<Point2> {
    let n = segment_count(360.0, deviation_degrees);
    (0..=n)
        .map(|i| {
            let theta = 2.0 * PI * (i as f64) / (n as f64);
            Point2::new(cx + r * theta.cos(), cy + r * theta.sin())
        })
        .collect()
}

const FULL_TURN_RADIANS: f64 = 2.0 * PI;
const RADIAN_GUARD_EPSILON: f64 = 1e-9;

/// Interpret a raw entity arc angle. Normally these are degrees and get
/// converted to radians; defensively, a value already beyond a full turn
/// (`> 2π + ε`) is assumed to be radians already and passed through
/// unconverted, per §4.4.
fn arc_angle_to_radians(angle: f64) -> f64 {
    if angle.abs() > FULL_TURN_RADIANS + RADIAN_GUARD_EPSILON {
        angle
    } else {
        angle.to_radians()
    }
}

/// Sample an arc from `start_deg` to `end_deg`, counter-clockwise, closing
/// the sweep modulo 2π if `start > end`.
pub(crate) fn tesselate_arc(
    cx: f64,
    cy: f64,
    r: f64,
    start_deg: f64,
    end_deg: f64,
    deviation_degrees: f64,
) -> Vec<Point2> {
    let start = arc_angle_to_radians(start_deg);
    let mut end = arc_angle_to_radians(end_deg);
    if start > end {
        end += FULL_TURN_RADIANS;
    }
    let sweep = end - start;
    let n = segment_count(sweep.to_degrees(), deviation_degrees);
    (0..=n)
        .map(|i| {
            let rad = start + sweep * (i as f64) / (n as f64);
            Point2::new(cx + r * rad.cos(), cy + r * rad.sin())
        })
        .collect()
}

/// Sample the arc implied by a polyline-segment bulge between `start` and
/// `end`, per §4.4's bulge formula: `theta = 4 atan(b)`,
/// `radius = chord / (2 sin(theta/2))`, center offset perpendicular to the
/// chord midpoint by `radius cos(theta/2)`, sign from `b`'s sign.
pub(crate) fn tesselate_bulge(
    start: Point2,
    end: Point2,
    bulge: f64,
    deviation_degrees: f64,
) -> Vec<Point2> {
    if bulge == 0.0 {
        return alloc::vec![start, end];
    }

    let theta = 4.0 * bulge.atan();
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let chord = (dx * dx + dy * dy).sqrt();
    if chord < 1e-12 {
        return alloc::vec![start, end];
    }

    let half_theta = theta / 2.0;
    let radius = chord / (2.0 * half_theta.sin().abs());
    let h = radius * half_theta.cos();

    let mid_x = (start.x + end.x) / 2.0;
    let mid_y = (start.y + end.y) / 2.0;
    // Unit vector perpendicular to the chord.
    let perp_x = -dy / chord;
    let perp_y = dx / chord;
    let sign = bulge.signum();
    let center = Point2::new(mid_x + sign * h * perp_x, mid_y + sign * h * perp_y);

    let start_angle = (start.y - center.y).atan2(start.x - center.x);
    let sweep_deg = theta.to_degrees();
    let n = segment_count(sweep_deg, deviation_degrees);

    (0..=n)
        .map(|i| {
            let angle = start_angle + theta * (i as f64) / (n as f64);
            Point2::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

/// Expand a polyline's vertices (with optional per-vertex bulge) into a
/// sampled point sequence, closing the ring if `closed`.
pub(crate) fn expand_polyline(
    vertices: &[(Point2, f64)],
    closed: bool,
    deviation_degrees: f64,
) -> Vec<Point2> {
    if vertices.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    out.push(vertices[0].0);

    let n = vertices.len();
    let edge_count = if closed { n } else { n - 1 };
    for i in 0..edge_count {
        let (start, bulge) = vertices[i];
        let (end, _) = vertices[(i + 1) % n];
        let sampled = tesselate_bulge(start, end, bulge, deviation_degrees);
        out.extend(sampled.into_iter().skip(1));
    }
    out
}

/// Evaluate a point on a B-spline basis function span using de Boor's
/// algorithm at parameter `t`, supporting rational (weighted) splines.
/// Falls back to a uniform knot vector when `knots` is empty.
pub(crate) fn tesselate_spline(
    control_points: &[Point2],
    knots: &[f64],
    weights: &[f64],
    degree: usize,
    samples_per_span: usize,
) -> Vec<Point2> {
    let n = control_points.len();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return alloc::vec![control_points[0]];
    }
    let degree = degree.clamp(1, n - 1);

    let knots: Vec<f64> = if knots.len() >= n + degree + 1 {
        knots.to_vec()
    } else {
        uniform_knots(n, degree)
    };
    let weights: Vec<f64> = if weights.len() == n {
        weights.to_vec()
    } else {
        alloc::vec![1.0; n]
    };

    let t_min = knots[degree];
    let t_max = knots[n];
    if t_max <= t_min {
        return control_points.to_vec();
    }

    let span_count = n - degree;
    let total_samples = (span_count * samples_per_span.max(1)).max(2);

    (0..=total_samples)
        .map(|i| {
            let t = t_min + (t_max - t_min) * (i as f64) / (total_samples as f64);
            de_boor_rational(control_points, &knots, &weights, degree, t)
        })
        .collect()
}

fn uniform_knots(n: usize, degree: usize) -> Vec<f64> {
    let m = n + degree + 1;
    (0..m)
        .map(|i| {
            if i <= degree {
                0.0
            } else if i >= m - degree - 1 {
                (m - 2 * degree - 1) as f64
            } else {
                (i - degree) as f64
            }
        })
        .collect()
}

fn find_span(knots: &[f64], degree: usize, n: usize, t: f64) -> usize {
    let mut span = degree;
    while span < n - 1 && t >= knots[span + 1] {
        span += 1;
    }
    span
}

fn de_boor_rational(
    control_points: &[Point2],
    knots: &[f64],
    weights: &[f64],
    degree: usize,
    t: f64,
) -> Point2 {
    let n = control_points.len();
    let span = find_span(knots, degree, n, t);

    let mut d: Vec<(f64, f64, f64)> = (0..=degree)
        .map(|j| {
            let idx = span - degree + j;
            let w = weights[idx];
            (control_points[idx].x * w, control_points[idx].y * w, w)
        })
        .collect();

    for r in 1..=degree {
        for j in (r..=degree).rev() {
            let i = span - degree + j;
            let denom = knots[i + degree - r + 1] - knots[i];
            let alpha = if denom.abs() < 1e-12 {
                0.0
            } else {
                (t - knots[i]) / denom
            };
            let prev = d[j - 1];
            let cur = d[j];
            d[j] = (
                (1.0 - alpha) * prev.0 + alpha * cur.0,
                (1.0 - alpha) * prev.1 + alpha * cur.1,
                (1.0 - alpha) * prev.2 + alpha * cur.2,
            );
        }
    }

    let (x, y, w) = d[degree];
    if w.abs() < 1e-12 {
        Point2::new(x, y)
    } else {
        Point2::new(x / w, y / w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circle_samples_are_closed() {
        let pts = tesselate_circle(0.0, 0.0, 10.0, 2.5);
        assert!(pts.len() > 100);
        let first = pts.first().unwrap();
        let last = pts.last().unwrap();
        assert!((first.x - last.x).abs() < 1e-9);
        assert!((first.y - last.y).abs() < 1e-9);
    }

    #[test]
    fn bulge_of_one_is_a_semicircle() {
        let start = Point2::new(-5.0, 0.0);
        let end = Point2::new(5.0, 0.0);
        let pts = tesselate_bulge(start, end, 1.0, 2.5);
        let mid = pts[pts.len() / 2];
        assert!((mid.x).abs() < 0.2);
        assert!((mid.y.abs() - 5.0).abs() < 0.2);
    }

    #[test]
    fn zero_bulge_is_a_straight_segment() {
        let pts = tesselate_bulge(Point2::new(0.0, 0.0), Point2::new(1.0, 1.0), 0.0, 2.5);
        assert_eq!(pts, alloc::vec![Point2::new(0.0, 0.0), Point2::new(1.0, 1.0)]);
    }

    #[test]
    fn spline_endpoints_pass_through_clamped_knots() {
        let cps = alloc::vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 2.0),
            Point2::new(2.0, -1.0),
            Point2::new(3.0, 0.0),
        ];
        let pts = tesselate_spline(&cps, &[], &[], 3, 8);
        let first = pts.first().unwrap();
        let last = pts.last().unwrap();
        assert!((first.x - cps[0].x).abs() < 1e-6);
        assert!((last.x - cps[3].x).abs() < 1e-6);
    }
}
