//! Shared test helpers: seeded RNGs, a dense-Toeplitz reference builder, and
//! a finite-difference Jacobian.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ======================================================================
// FUNCTIONS - CRATE

/// A `ChaCha8Rng` seeded deterministically from `seed`, for tests that need a
/// reproducible stream of randomness rather than `rand::thread_rng`.
pub(crate) fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// An exponentially-decaying ACF of length `n` and decay rate `rate`, the
/// stand-in "some positive-definite ACF" used across several modules' tests.
pub(crate) fn exp_acf(n: usize, rate: f64) -> Vec<f64> {
    (0..n).map(|i| (-rate * i as f64).exp()).collect()
}

/// Dense `N x N` reference matrix for the symmetric Toeplitz matrix with
/// first row/column `acf`, built with naive indexing rather than any FFT or
/// recursion this crate's own code uses.
pub(crate) fn dense_toeplitz(acf: &[f64]) -> Vec<Vec<f64>> {
    let n = acf.len();
    (0..n)
        .map(|i| (0..n).map(|j| acf[(i as isize - j as isize).unsigned_abs() as usize]).collect())
        .collect()
}

/// `a @ b` for dense square matrices of equal order.
pub(crate) fn dense_mat_vec(a: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    a.iter().map(|row| row.iter().zip(v.iter()).map(|(r, x)| r * x).sum()).collect()
}

/// Central finite-difference approximation of `d f(x) / d x_i` at every
/// coordinate of `x`, given a scalar-valued `f`. Used to cross-check
/// hand-derived gradients against numerical differentiation.
pub(crate) fn finite_diff_grad(f: impl Fn(&[f64]) -> f64, x: &[f64], h: f64) -> Vec<f64> {
    let mut grad = vec![0.0; x.len()];
    for i in 0..x.len() {
        let mut plus = x.to_vec();
        let mut minus = x.to_vec();
        plus[i] += h;
        minus[i] -= h;
        grad[i] = (f(&plus) - f(&minus)) / (2.0 * h);
    }
    grad
}

/// Asserts every pair of elements of `a` and `b` are within `tol` of each
/// other, reporting the offending index and both values on failure.
pub(crate) fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len(), "length mismatch: {} vs {}", a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert!((x - y).abs() < tol, "index {i}: {x} vs {y} (tol {tol})");
    }
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_rng_is_deterministic() {
        use rand::Rng;
        let mut a = seeded_rng(7);
        let mut b = seeded_rng(7);
        let xa: f64 = a.gen();
        let xb: f64 = b.gen();
        assert_eq!(xa, xb);
    }

    #[test]
    fn dense_toeplitz_matches_acf_on_diagonals() {
        let acf = vec![2.0, 1.0, 0.5];
        let t = dense_toeplitz(&acf);
        assert_eq!(t[0], vec![2.0, 1.0, 0.5]);
        assert_eq!(t[1], vec![1.0, 2.0, 1.0]);
        assert_eq!(t[2], vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn finite_diff_grad_matches_known_derivative() {
        // f(x) = x0^2 + 3*x0*x1 has grad (2*x0 + 3*x1, 3*x0).
        let f = |x: &[f64]| x[0] * x[0] + 3.0 * x[0] * x[1];
        let g = finite_diff_grad(f, &[2.0, 1.0], 1e-6);
        assert_close(&g, &[2.0 * 2.0 + 3.0 * 1.0, 3.0 * 2.0], 1e-3);
    }
}
