//! Axis position vector.
//!
//! `AxisVec` is a fixed-size array of positions, one slot per physical axis,
//! expressed in base length units (blu). It is a plain `Copy` value: the
//! motion core copies it between stages and never shares it.

use std::ops::{Add, Index, IndexMut, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::consts::AXIS_SLOTS;

/// Absolute or relative axis positions [blu].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AxisVec(pub [f64; AXIS_SLOTS]);

static_assertions::assert_impl_all!(AxisVec: Copy, Send, Sync);

impl AxisVec {
    /// All-zero vector.
    pub const ZERO: Self = Self([0.0; AXIS_SLOTS]);

    /// Build from a slice; missing slots are zero, extra values are ignored.
    pub fn from_slice(values: &[f64]) -> Self {
        let mut out = Self::ZERO;
        for (slot, v) in out.0.iter_mut().zip(values.iter()) {
            *slot = *v;
        }
        out
    }

    /// Euclidean length.
    #[inline]
    pub fn norm(&self) -> f64 {
        self.0.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Euclidean distance to `other`.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> f64 {
        (*other - *self).norm()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn unit(&self) -> Option<Self> {
        let n = self.norm();
        if n <= f64::EPSILON {
            None
        } else {
            Some(*self * (1.0 / n))
        }
    }

    /// Dot product.
    #[inline]
    pub fn dot(&self, other: &Self) -> f64 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }

    /// Whether every slot differs from `other` by at most `tol`.
    pub fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() <= tol)
    }

    /// Whether every slot is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Convert from millimetres to blu.
    pub fn from_mm(mm: &[f64], blu_per_mm: f64) -> Self {
        Self::from_slice(mm) * blu_per_mm
    }

    /// Convert to millimetres.
    pub fn to_mm(&self, blu_per_mm: f64) -> [f64; AXIS_SLOTS] {
        let mut out = [0.0; AXIS_SLOTS];
        for (o, v) in out.iter_mut().zip(self.0.iter()) {
            *o = v / blu_per_mm;
        }
        out
    }
}

impl Add for AxisVec {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let mut out = self;
        for (o, r) in out.0.iter_mut().zip(rhs.0.iter()) {
            *o += r;
        }
        out
    }
}

impl Sub for AxisVec {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let mut out = self;
        for (o, r) in out.0.iter_mut().zip(rhs.0.iter()) {
            *o -= r;
        }
        out
    }
}

impl Mul<f64> for AxisVec {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        let mut out = self;
        for o in out.0.iter_mut() {
            *o *= rhs;
        }
        out
    }
}

impl Index<usize> for AxisVec {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

impl IndexMut<usize> for AxisVec {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.0[index]
    }
}
