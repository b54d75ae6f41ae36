#![deny(missing_docs)]
//! Superfast likelihood inference for stationary Gaussian time series with a
//! Toeplitz covariance matrix.
//!
//! The central object is [`Toeplitz`]: a symmetric positive-definite matrix
//! Σ of order `N`, identified by its first row (the autocorrelation
//! function, ACF). It exposes multiply, solve, log-determinant and the trace
//! formulas the Gaussian score/Hessian need, backed by whichever of
//! [`engine::gschur`] or [`engine::durbin_levinson`] fits the order. Most
//! callers never touch the handle directly: [`rnormtz`], [`dnormtz`],
//! [`snorm_grad`] and [`snorm_hess`] are thin free-function wrappers around
//! it, the same way a front-facing convenience API sits above a lower-level
//! engine elsewhere in this crate's lineage.
//!
//! ```rust
//! use gschur_toeplitz::Toeplitz;
//!
//! let t = Toeplitz::new(4);
//! t.set_acf(&[2.0, 1.0, 0.5, 0.25]).unwrap();
//! let w = t.multiply(&[1.0, 0.0, 0.0, 0.0]).unwrap();
//! assert_eq!(w, vec![2.0, 1.0, 0.5, 0.25]);
//! ```

pub use crate::{error::Error, toeplitz::Toeplitz};

pub mod config;
pub mod engine;
pub mod fft;
mod simulate;
mod toeplitz;

mod density;
mod error;
mod workspace;

#[cfg(test)]
mod test_util;

// ======================================================================
// FUNCTIONS - PUBLIC - convenience wrappers

/// Draws `n_paths` independent realizations of a length-`N` stationary
/// Gaussian vector with autocorrelation `acf`. `use_fft` selects the sampler:
/// `true` for circulant embedding (O(N log N) per path, but only valid ACFs
/// embed), `false` for the Durbin-Levinson Cholesky recursion (O(N²) per
/// path, valid for any positive-definite `acf`). Thin wrapper over
/// [`simulate::rnormtz`].
pub fn rnormtz(acf: &[f64], n_paths: usize, use_fft: bool, rng: &mut impl rand::Rng) -> Result<Vec<Vec<f64>>, Error> {
    simulate::rnormtz(acf, n_paths, use_fft, rng)
}

/// Gaussian log-density (or density) of each column of `x` under
/// `N(mu, Toeplitz)`. Thin wrapper over [`density::dnormtz`].
pub fn dnormtz(x: &[Vec<f64>], mu: Option<&[f64]>, toeplitz: &Toeplitz, log: bool) -> Result<Vec<f64>, Error> {
    density::dnormtz(x, mu, toeplitz, log)
}

/// Gradient of `ln dnormtz` with respect to a parameter vector θ. Thin
/// wrapper over [`density::snorm_grad`].
pub fn snorm_grad(
    x: &[f64],
    mu: Option<&[f64]>,
    toeplitz: &Toeplitz,
    dmu: Option<&[Vec<f64>]>,
    dacf: Option<&[Vec<f64>]>,
) -> Result<Vec<f64>, Error> {
    density::snorm_grad(x, mu, toeplitz, dmu, dacf)
}

/// Hessian of `ln dnormtz` with respect to θ. Thin wrapper over
/// [`density::snorm_hess`].
#[allow(clippy::too_many_arguments)]
pub fn snorm_hess(
    x: &[f64],
    mu: Option<&[f64]>,
    toeplitz: &Toeplitz,
    dmu: Option<&[Vec<f64>]>,
    dacf: Option<&[Vec<f64>]>,
    d2mu: Option<&[Vec<Vec<f64>>]>,
    d2acf: Option<&[Vec<Vec<f64>>]>,
) -> Result<Vec<Vec<f64>>, Error> {
    density::snorm_hess(x, mu, toeplitz, dmu, dacf, d2mu, d2acf)
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{exp_acf, seeded_rng};

    #[test]
    fn end_to_end_density_on_exponential_acf() {
        let acf = exp_acf(16, 0.1);
        let t = Toeplitz::new(16);
        t.set_acf(&acf).unwrap();

        let mut rng = seeded_rng(42);
        let paths = rnormtz(&acf, 1, true, &mut rng).unwrap();
        let ll = dnormtz(&paths, None, &t, true).unwrap();
        assert_eq!(ll.len(), 1);
        assert!(ll[0].is_finite());
    }

    #[test]
    fn dl_path_feeds_back_into_dnormtz() {
        let acf = vec![2.0, 1.0, 0.5, 0.25];
        let t = Toeplitz::new(4);
        t.set_acf(&acf).unwrap();

        let mut rng = seeded_rng(9);
        let paths = rnormtz(&acf, 3, false, &mut rng).unwrap();
        let ll = dnormtz(&paths, None, &t, true).unwrap();
        assert_eq!(ll.len(), 3);
        assert!(ll.iter().all(|v| v.is_finite()));
    }
}
