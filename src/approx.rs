//! Utilities to approximate equality of floating point values and tensors.
//!
//! Gradient checks compare analytic gradients against finite differences, so
//! exact equality is too strict and a single epsilon is too coarse. Comparisons
//! are graded into an [`ApproxEquality`] instead.

use crate::tensors::Ten64;

/// The max epsilon accepted on `f64`s.
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The expected minimum epsilon accepted on `f64`s.
pub const F64_AVG_ERROR: f64 = 1e-6;

/// The best expected epsilon accepted on `f64`s.
pub const F64_MIN_ERROR: f64 = 1e-13;

/// Checks the relative distance based off epsilon.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Enumerates the equality of `self`
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

impl RelativeEq<Self> for f64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        let dif = (self - rhs).abs();
        let scale = self.abs().max(rhs.abs()).max(1.0);

        if dif < F64_MIN_ERROR * scale {
            ApproxEquality::Precise
        } else if dif < F64_AVG_ERROR * scale {
            ApproxEquality::Partial
        } else if dif < F64_MAX_ERROR * scale {
            ApproxEquality::Relative
        } else {
            ApproxEquality::Scarce
        }
    }
}

impl RelativeEq<[f64]> for [f64] {
    fn approx_eq(&self, rhs: &[f64]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        // worst rating wins
        self.iter()
            .zip(rhs)
            .map(|(a, b)| a.approx_eq(b))
            .max()
            .unwrap_or(ApproxEquality::Precise)
    }
}

impl RelativeEq<Ten64> for Ten64 {
    fn approx_eq(&self, rhs: &Ten64) -> ApproxEquality {
        if self.shape() != rhs.shape() {
            return ApproxEquality::Scarce;
        }
        self.data().approx_eq(rhs.data())
    }
}

/// The approximated equality enumerated, best first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

/// Approximates equality based off the relative difference.
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b) == ApproxEquality::Precise
}

/// True when `a` and `b` agree at least as well as `worst`.
pub fn approx_eq_within<A: RelativeEq<B> + ?Sized, B: ?Sized>(
    a: &A,
    b: &B,
    worst: ApproxEquality,
) -> bool {
    a.approx_eq(b) <= worst
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grades_by_distance() {
        assert_eq!(1.0f64.approx_eq(&1.0), ApproxEquality::Precise);
        assert_eq!(1.0f64.approx_eq(&(1.0 + 1e-8)), ApproxEquality::Partial);
        assert_eq!(1.0f64.approx_eq(&1.0001), ApproxEquality::Relative);
        assert_eq!(1.0f64.approx_eq(&1.1), ApproxEquality::Scarce);
    }

    #[test]
    fn slices_take_the_worst_rating() {
        let a = [1.0, 2.0, 3.0];
        let b = [1.0, 2.0001, 4.0];
        assert_eq!(a[..].approx_eq(&b[..]), ApproxEquality::Scarce);
        assert!(approx_eq_within(&a[..2], &b[..2], ApproxEquality::Relative));
        assert!(!approx_eq(&a[..2], &b[..2]));
    }
}
