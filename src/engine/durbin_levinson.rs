//! Reference O(N²) Toeplitz engine.
//!
//! This is the classical Durbin recursion (for the log-determinant and the
//! first column of Σ⁻¹) paired with its generalization to an arbitrary
//! right-hand side, sometimes called Levinson's algorithm. [`Toeplitz`]
//! selects this engine below [`crate::config::crossover`] and tests use it as
//! ground truth against [`super::gschur`].
//!
//! [`Toeplitz`]: crate::Toeplitz

use crate::{engine::Generators, error::Error};

// ======================================================================
// DurbinLevinson - CRATE

/// Marker type implementing [`super::ToeplitzEngine`] for the reference path.
pub struct DurbinLevinson;

impl super::ToeplitzEngine for DurbinLevinson {
    fn factor(acf: &[f64]) -> Result<Generators, Error> {
        let log_det = log_det(acf)?;
        let mut e0 = vec![0.0; acf.len()];
        e0[0] = 1.0;
        let x = solve(acf, &e0)?;
        Ok(Generators {
            acf: acf.to_vec(),
            x,
            log_det,
        })
    }

    fn apply_inverse(generators: &Generators, v: &[f64]) -> Vec<f64> {
        // DL has no asymptotic benefit from caching generators; it resolves
        // the system directly every time, same cost as the factorization solve.
        solve(&generators.acf, v).expect("acf was already validated by factor")
    }
}

// ======================================================================
// FUNCTIONS - CRATE - Durbin/Levinson recursions

/// One step of the Durbin (Yule-Walker) recursion: extends the order-`(k-1)`
/// reflection coefficients `phi` and prediction variance `v` to order `k`.
///
/// `phi` solves `T_{k-1} phi = (acf[1], .., acf[k-1])`; on return it solves
/// the order-`k` analogue. `k` must equal `phi.len() + 1`.
pub(crate) fn durbin_step(acf: &[f64], phi: &[f64], v: f64, k: usize) -> (Vec<f64>, f64) {
    debug_assert_eq!(phi.len() + 1, k);
    let s = if phi.is_empty() {
        acf[k]
    } else {
        acf[k] - (0..phi.len()).map(|j| phi[j] * acf[k - 1 - j]).sum::<f64>()
    };
    let kk = s / v;
    let mut new_phi: Vec<f64> = (0..phi.len()).map(|j| phi[j] - kk * phi[k - 2 - j]).collect();
    new_phi.push(kk);
    let new_v = v * (1.0 - kk * kk);
    (new_phi, new_v)
}

/// Returns `log det T_n` for the Toeplitz matrix with first row/column `acf`.
///
/// # Errors
///
/// [`Error::NotPositiveDefinite`] as soon as a prediction variance is
/// non-positive.
pub fn log_det(acf: &[f64]) -> Result<f64, Error> {
    let n = acf.len();
    let mut v = acf[0];
    check_pivot(v, 0)?;
    let mut logdet = v.ln();
    let mut phi: Vec<f64> = Vec::new();
    for k in 1..n {
        let (new_phi, new_v) = durbin_step(acf, &phi, v, k);
        check_pivot(new_v, k)?;
        phi = new_phi;
        v = new_v;
        logdet += v.ln();
    }
    Ok(logdet)
}

/// Solves `T_n x = b` for the Toeplitz matrix with first row/column `acf`,
/// via the generalized Levinson recursion (Durbin's recursion extended to an
/// arbitrary right-hand side).
///
/// # Errors
///
/// [`Error::InvalidLength`] if `b.len() != acf.len()`,
/// [`Error::NotPositiveDefinite`] at the first non-positive pivot.
pub fn solve(acf: &[f64], b: &[f64]) -> Result<Vec<f64>, Error> {
    let n = acf.len();
    if b.len() != n {
        return Err(Error::InvalidLength {
            expected: n,
            got: b.len(),
        });
    }
    check_pivot(acf[0], 0)?;
    let mut y = vec![b[0] / acf[0]];
    if n == 1 {
        return Ok(y);
    }

    let mut v = acf[0];
    let (mut phi, new_v) = durbin_step(acf, &[], v, 1);
    check_pivot(new_v, 1)?;
    v = new_v;

    for k in 1..n {
        let s: f64 = (0..k).map(|i| acf[k - i] * y[i]).sum();
        let mu = (b[k] - s) / v;
        let mut p: Vec<f64> = (0..k).map(|i| y[i] - mu * phi[k - 1 - i]).collect();
        p.push(mu);
        y = p;
        if k + 1 < n {
            let (new_phi, new_v) = durbin_step(acf, &phi, v, k + 1);
            check_pivot(new_v, k + 1)?;
            phi = new_phi;
            v = new_v;
        }
    }
    Ok(y)
}

fn check_pivot(v: f64, step: usize) -> Result<(), Error> {
    if v <= 0.0 {
        Err(Error::NotPositiveDefinite { step, pivot: v })
    } else {
        Ok(())
    }
}

// ======================================================================
// TESTS
