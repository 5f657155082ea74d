// Copyright 2025 the Tabulon Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A plain 2D affine matrix value, re-expressed from `tabulon`'s
//! `Affine`/`DirectIsometry` composition pattern (`tabulon/src/transform.rs`)
//! as six bare scalars rather than a `kurbo` type, per the matrix model in
//! this crate's design notes.

use crate::model::Point2;

/// `p' = (a·x + c·y + e, b·x + d·y + f)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat2d {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Mat2d {
    pub const IDENTITY: Self = Self {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            e: tx,
            f: ty,
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: 0.0,
            f: 0.0,
        }
    }

    pub fn scale_uniform(s: f64) -> Self {
        Self::scale(s, s)
    }

    pub fn rotate_degrees(deg: f64) -> Self {
        let r = deg.to_radians();
        let (s, c) = (r.sin(), r.cos());
        Self {
            a: c,
            b: s,
            c: -s,
            d: c,
            e: 0.0,
            f: 0.0,
        }
    }

    /// `self · rhs`, parent-first: apply `rhs` then `self`.
    pub fn then(&self, rhs: &Self) -> Self {
        Self {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }

    pub fn apply(&self, p: Point2) -> Point2 {
        Point2 {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// Row norms and dot product, used to detect a similarity transform
    /// (equal scale on both axes, zero shear).
    pub fn is_similarity(&self) -> bool {
        let row1_sq = self.a * self.a + self.b * self.b;
        let row2_sq = self.c * self.c + self.d * self.d;
        let dot = self.a * self.c + self.b * self.d;
        (row1_sq - row2_sq).abs() < 1e-9 && dot.abs() < 1e-9
    }

    /// Uniform scale factor, valid only when [`Self::is_similarity`] holds.
    pub fn uniform_scale(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Determinant, whose sign indicates a mirrored (reflected) transform.
    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// Decompose into `(rotation_radians, scale_x, scale_y, mirrored)`,
    /// assuming no shear (valid for the matrices this crate ever builds:
    /// translate/scale/rotate compositions).
    pub fn decompose(&self) -> (f64, f64, f64, bool) {
        let mirrored = self.determinant() < 0.0;
        let scale_x = (self.a * self.a + self.b * self.b).sqrt();
        let scale_y_unsigned = (self.c * self.c + self.d * self.d).sqrt();
        let scale_y = if mirrored { -scale_y_unsigned } else { scale_y_unsigned };
        let rotation = self.b.atan2(self.a);
        (rotation, scale_x, scale_y, mirrored)
    }
}

impl Default for Mat2d {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_apply_is_noop() {
        let p = Point2::new(3.0, 4.0);
        assert_eq!(Mat2d::IDENTITY.apply(p), p);
    }

    #[test]
    fn translate_then_scale_parent_first() {
        let parent = Mat2d::scale_uniform(2.0);
        let child = Mat2d::translate(1.0, 1.0);
        let combined = parent.then(&child);
        let p = combined.apply(Point2::new(0.0, 0.0));
        assert_eq!(p, Point2::new(2.0, 2.0));
    }

    #[test]
    fn uniform_scale_detected_as_similarity() {
        let m = Mat2d::scale_uniform(3.0).then(&Mat2d::rotate_degrees(40.0));
        assert!(m.is_similarity());
        assert!((m.uniform_scale() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn non_uniform_scale_is_not_similarity() {
        let m = Mat2d::scale(2.0, 3.0);
        assert!(!m.is_similarity());
    }
}
