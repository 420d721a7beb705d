//! Projective (homography) engine.
//!
//! A `Homography` maps the canonical unit square onto an arbitrary
//! quadrilateral on the physical projection surface. The canonical corner
//! order is fixed: `(0,0) → (1,0) → (1,1) → (0,1)` (top-left, top-right,
//! bottom-right, bottom-left in table space).
//!
//! All functions are pure. Numeric degeneracy never errors: a singular
//! matrix inverts to identity and a zero homogeneous denominator leaves the
//! point unchanged, so a live projection never flashes NaN geometry.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Below this determinant magnitude a matrix is treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-12;

/// Canonical unit-square corners in warp order.
pub const UNIT_SQUARE: [Point; 4] = [
    Point::new(0.0, 0.0),
    Point::new(1.0, 0.0),
    Point::new(1.0, 1.0),
    Point::new(0.0, 1.0),
];

/// 3×3 projective matrix, row-major, `m[8]` normalized to 1 when built
/// from corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Homography(pub [f64; 9]);

impl Default for Homography {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Homography {
    pub const IDENTITY: Homography = Homography([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub fn apply(&self, p: Point) -> Point {
        apply_homography(self, p)
    }

    pub fn inverse(&self) -> Self {
        invert_homography(self)
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
            + m[2] * (m[3] * m[7] - m[4] * m[6])
    }

    /// Column-major `f32` packing for a GLSL/WGSL `mat3` uniform.
    #[rustfmt::skip]
    pub fn to_gl_mat3(&self) -> [f32; 9] {
        let m = &self.0;
        [
            m[0] as f32, m[3] as f32, m[6] as f32,
            m[1] as f32, m[4] as f32, m[7] as f32,
            m[2] as f32, m[5] as f32, m[8] as f32,
        ]
    }
}

/// Build the homography mapping the unit square's corners onto `corners`.
///
/// Solves the 2×2 system for the foreshortening terms `g`, `h`; when that
/// system is singular the map is affine and both terms are zero.
///
/// # Panics
/// If `corners` does not hold exactly four points. That is a caller bug.
pub fn compute_homography(corners: &[Point]) -> Homography {
    assert_eq!(
        corners.len(),
        4,
        "homography needs exactly 4 corners, got {}",
        corners.len()
    );
    let [p0, p1, p2, p3] = [corners[0], corners[1], corners[2], corners[3]];

    let dx1 = p1.x - p2.x;
    let dx2 = p3.x - p2.x;
    let dx3 = p0.x - p1.x + p2.x - p3.x;
    let dy1 = p1.y - p2.y;
    let dy2 = p3.y - p2.y;
    let dy3 = p0.y - p1.y + p2.y - p3.y;

    let den = dx1 * dy2 - dx2 * dy1;
    let (g, h) = if den.abs() < SINGULAR_EPSILON {
        (0.0, 0.0)
    } else {
        (
            (dx3 * dy2 - dx2 * dy3) / den,
            (dx1 * dy3 - dx3 * dy1) / den,
        )
    };

    let a = p1.x - p0.x + g * p1.x;
    let b = p3.x - p0.x + h * p3.x;
    let c = p0.x;
    let d = p1.y - p0.y + g * p1.y;
    let e = p3.y - p0.y + h * p3.y;
    let f = p0.y;

    log::trace!("homography g={g:.6} h={h:.6} den={den:.6}");
    Homography([a, b, c, d, e, f, g, h, 1.0])
}

/// Adjugate/determinant inverse. Near-singular input yields identity.
pub fn invert_homography(m: &Homography) -> Homography {
    let det = m.determinant();
    if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
        log::debug!("singular homography (det={det:e}), falling back to identity");
        return Homography::IDENTITY;
    }
    let m = &m.0;
    let inv = 1.0 / det;
    Homography([
        (m[4] * m[8] - m[5] * m[7]) * inv,
        (m[2] * m[7] - m[1] * m[8]) * inv,
        (m[1] * m[5] - m[2] * m[4]) * inv,
        (m[5] * m[6] - m[3] * m[8]) * inv,
        (m[0] * m[8] - m[2] * m[6]) * inv,
        (m[2] * m[3] - m[0] * m[5]) * inv,
        (m[3] * m[7] - m[4] * m[6]) * inv,
        (m[1] * m[6] - m[0] * m[7]) * inv,
        (m[0] * m[4] - m[1] * m[3]) * inv,
    ])
}

/// Homogeneous transform with perspective divide. A zero denominator
/// returns `p` unchanged.
pub fn apply_homography(m: &Homography, p: Point) -> Point {
    let m = &m.0;
    let w = m[6] * p.x + m[7] * p.y + m[8];
    if w == 0.0 {
        return p;
    }
    Point::new(
        (m[0] * p.x + m[1] * p.y + m[2]) / w,
        (m[3] * p.x + m[4] * p.y + m[5]) / w,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point, eps: f64) -> bool {
        (a.x - b.x).abs() < eps && (a.y - b.y).abs() < eps
    }

    #[test]
    fn identity_quad_maps_center_to_center() {
        let m = compute_homography(&UNIT_SQUARE);
        assert_eq!(m.apply(Point::new(0.5, 0.5)), Point::new(0.5, 0.5));
    }

    #[test]
    fn reproduces_keystoned_corners() {
        let quad = [
            Point::new(0.1, 0.05),
            Point::new(0.92, 0.12),
            Point::new(0.8, 0.9),
            Point::new(0.05, 0.97),
        ];
        let m = compute_homography(&quad);
        for (unit, corner) in UNIT_SQUARE.iter().zip(quad.iter()) {
            let got = m.apply(*unit);
            assert!(close(got, *corner, 1e-6), "{unit:?} -> {got:?}, want {corner:?}");
        }
    }

    #[test]
    fn parallelogram_is_affine() {
        let quad = [
            Point::new(0.25, 0.125),
            Point::new(0.75, 0.125),
            Point::new(1.0, 0.75),
            Point::new(0.5, 0.75),
        ];
        let m = compute_homography(&quad);
        assert_eq!(m.0[6], 0.0);
        assert_eq!(m.0[7], 0.0);
        assert!(close(m.apply(Point::new(1.0, 1.0)), quad[2], 1e-9));
    }

    #[test]
    fn inverse_round_trips_interior_points() {
        let quad = [
            Point::new(0.0, 0.1),
            Point::new(1.0, 0.0),
            Point::new(0.85, 1.0),
            Point::new(0.1, 0.9),
        ];
        let m = compute_homography(&quad);
        let inv = invert_homography(&m);
        for &(x, y) in &[(0.25, 0.25), (0.5, 0.5), (0.7, 0.3), (0.1, 0.9)] {
            let p = Point::new(x, y);
            let back = inv.apply(m.apply(p));
            assert!(close(back, p, 1e-9), "{p:?} came back as {back:?}");
        }
    }

    #[test]
    fn singular_matrix_inverts_to_identity() {
        let degenerate = Homography([1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0]);
        assert_eq!(invert_homography(&degenerate), Homography::IDENTITY);
    }

    #[test]
    fn collapsed_quad_does_not_produce_nan() {
        let quad = [Point::new(0.5, 0.5); 4];
        let m = compute_homography(&quad);
        let p = m.inverse().apply(Point::new(0.3, 0.3));
        assert!(p.x.is_finite() && p.y.is_finite());
    }

    #[test]
    fn zero_denominator_leaves_point_unchanged() {
        let m = Homography([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0]);
        assert_eq!(m.apply(Point::new(1.0, 0.4)), Point::new(1.0, 0.4));
    }

    #[test]
    #[should_panic(expected = "exactly 4 corners")]
    fn wrong_corner_count_fails_fast() {
        compute_homography(&UNIT_SQUARE[..3]);
    }

    #[test]
    fn gl_packing_is_column_major() {
        let m = Homography([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(m.to_gl_mat3(), [1.0, 4.0, 7.0, 2.0, 5.0, 8.0, 3.0, 6.0, 9.0]);
    }
}
