//! Toeplitz factorization engines.
//!
//! [`Toeplitz`](crate::Toeplitz) delegates its numerical work to one of two
//! engines behind the [`ToeplitzEngine`] trait: [`gschur`] (the superfast,
//! generator-based path) and [`durbin_levinson`] (the O(N²) reference path).
//! [`crate::config::crossover`] decides which one a freshly bound handle
//! picks; both produce the same [`Generators`] shape so the handle doesn't
//! need to know which one it's holding.

use crate::error::Error;

pub mod durbin_levinson;
pub mod gschur;

// ======================================================================
// Generators - CRATE

/// Factorization state a [`Toeplitz`](crate::Toeplitz) handle caches once
/// bound and factored.
///
/// `x` is the first column of Σ⁻¹ (the Gohberg-Semencul generator); `log_det`
/// is `log|Σ|` computed alongside it. Together these are everything `solve`,
/// `log_det`, `trace_grad` and `trace_hess` need — see [`gschur::apply_inverse`].
#[derive(Clone, Debug)]
pub struct Generators {
    pub(crate) acf: Vec<f64>,
    pub(crate) x: Vec<f64>,
    pub(crate) log_det: f64,
}

impl Generators {
    /// Order this generator pair was computed for.
    pub fn order(&self) -> usize {
        self.x.len()
    }
}

// ======================================================================
// ToeplitzEngine - CRATE

/// Common contract both factorization engines satisfy.
pub trait ToeplitzEngine {
    /// Factors the Toeplitz matrix with first row/column `acf`, returning its
    /// generators. `acf[0]` must be positive; fails with
    /// [`Error::NotPositiveDefinite`] at the first non-positive pivot.
    fn factor(acf: &[f64]) -> Result<Generators, Error>;

    /// Applies Σ⁻¹ to `v` given already-computed generators for the same ACF.
    fn apply_inverse(generators: &Generators, v: &[f64]) -> Vec<f64>;
}

// ======================================================================
// TESTS
