//! Superfast generator-based Toeplitz engine.
//!
//! The generator pair this module produces is the first column `x` of Σ⁻¹
//! together with `log|Σ|`. [`apply_inverse`] then reconstructs the action of
//! Σ⁻¹ on any vector in O(N log N) via the Gohberg-Semencul representation
//!
//! ```text
//! Σ⁻¹ = (1 / x₀) (X Xᵀ - Z Zᵀ)
//! ```
//!
//! where `X` is the lower-triangular Toeplitz matrix with first column `x`
//! and `Z` is the lower-triangular Toeplitz matrix with first column
//! `z = (0, x_{n-1}, .., x_1)`. Both `X v` and `Xᵀ v` reduce to a single
//! zero-padded circular convolution (see [`crate::fft::circular_convolve`]),
//! which is where the O(N log N) comes from once `x` is known.
//!
//! `x` itself is `Σ⁻¹ e₀`, obtained here by conjugate-gradient iteration on
//! the SPD system `Σ x = e₀` rather than the O(N²) Durbin recursion: every CG
//! iteration applies Σ via [`crate::fft::toeplitz_multiply`] (O(N log N)) and
//! the search direction is preconditioned by the Strang circulant
//! approximation to Σ, diagonalized once via FFT. Run to `N` iterations this
//! converges exactly in exact arithmetic (CG on an N-dimensional SPD system
//! terminates in at most N steps); a decaying ACF converges in far fewer in
//! practice, since the circulant preconditioner captures the bulk of Σ's
//! spectrum. `log|Σ|` has no comparably simple CG analogue, so it is still
//! produced by [`durbin_levinson::log_det`] — the one piece of this engine
//! that remains O(N²).

use crate::{
    engine::{durbin_levinson, Generators},
    error::Error,
    fft,
    fft::{circular_convolve, next_pow2},
    workspace::Workspace,
};
use rustfft::num_complex::Complex64;

// ======================================================================
// GSchur - CRATE

/// Marker type implementing [`super::ToeplitzEngine`] for the superfast path.
pub struct GSchur;

impl super::ToeplitzEngine for GSchur {
    fn factor(acf: &[f64]) -> Result<Generators, Error> {
        let log_det = durbin_levinson::log_det(acf)?;
        let x = pcg_solve_e0(acf);
        Ok(Generators {
            acf: acf.to_vec(),
            x,
            log_det,
        })
    }

    fn apply_inverse(generators: &Generators, v: &[f64]) -> Vec<f64> {
        apply_inverse(&generators.x, v)
    }
}

// ======================================================================
// FUNCTIONS - CRATE - generator construction via preconditioned CG

/// Returns the first column of `T(acf)⁻¹`, via conjugate-gradient iteration
/// preconditioned by a Strang circulant. `acf[0] > 0` is assumed already
/// checked by the `log_det` call `factor` makes first.
fn pcg_solve_e0(acf: &[f64]) -> Vec<f64> {
    let n = acf.len();
    let mut b = vec![0.0; n];
    b[0] = 1.0;
    pcg_solve(acf, &b)
}

fn pcg_solve(acf: &[f64], b: &[f64]) -> Vec<f64> {
    let n = acf.len();
    let precond = StrangPreconditioner::new(acf);

    let mut x = vec![0.0; n];
    let mut r = b.to_vec();
    let mut z = precond.apply(&r);
    let mut p = z.clone();
    let mut rz = dot(&r, &z);

    for _ in 0..n {
        if rz.abs() < 1e-30 {
            break;
        }
        let ap = fft::toeplitz_multiply(acf, &p);
        let pap = dot(&p, &ap);
        if pap.abs() < 1e-300 {
            break;
        }
        let alpha = rz / pap;
        for i in 0..n {
            x[i] += alpha * p[i];
            r[i] -= alpha * ap[i];
        }
        if r.iter().map(|v| v * v).sum::<f64>() < 1e-28 {
            break;
        }
        z = precond.apply(&r);
        let rz_new = dot(&r, &z);
        let beta = rz_new / rz;
        for i in 0..n {
            p[i] = z[i] + beta * p[i];
        }
        rz = rz_new;
    }
    x
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Strang's circulant preconditioner: the circulant matrix whose first
/// column agrees with `acf` on `[0, n/2]` and wraps the remaining entries
/// around symmetrically. Diagonalized once by FFT; applying its inverse is
/// then a forward/inverse FFT pair with a pointwise divide.
struct StrangPreconditioner {
    n: usize,
    eigenvalues: Vec<Complex64>,
}

impl StrangPreconditioner {
    fn new(acf: &[f64]) -> Self {
        let n = acf.len();
        let mut c = vec![0.0; n];
        c[0] = acf[0];
        for k in 1..n {
            c[k] = if k <= n / 2 { acf[k] } else { acf[n - k] };
        }
        let mut spectrum = fft::pack_real(&c, n);
        fft::forward(&mut spectrum);
        // Circulant from a symmetric first column has a real spectrum up to
        // rounding; floor near-zero/negative eigenvalues so the
        // preconditioner stays SPD and division-safe even when the Strang
        // circulant isn't itself positive definite.
        let floor = (1e-8 * acf[0].abs()).max(1e-300);
        for s in spectrum.iter_mut() {
            if s.re < floor {
                s.re = floor;
            }
        }
        Self { n, eigenvalues: spectrum }
    }

    fn apply(&self, r: &[f64]) -> Vec<f64> {
        let mut v = fft::pack_real(r, self.n);
        fft::forward(&mut v);
        for (vi, lambda) in v.iter_mut().zip(self.eigenvalues.iter()) {
            *vi /= lambda.re;
        }
        fft::inverse(&mut v);
        v.iter().map(|c| c.re / self.n as f64).collect()
    }
}

// ======================================================================
// FUNCTIONS - CRATE

/// Applies Σ⁻¹ to `v` given the first column `x` of Σ⁻¹, via the
/// Gohberg-Semencul formula. Allocates a throwaway [`Workspace`]; callers that
/// repeat this at a fixed order (every [`Toeplitz`](crate::Toeplitz) solve)
/// should use [`apply_inverse_ws`] with a workspace they hold onto instead.
pub(crate) fn apply_inverse(x: &[f64], v: &[f64]) -> Vec<f64> {
    let mut workspace = Workspace::new(next_pow2(2 * x.len()).max(1));
    apply_inverse_ws(x, v, &mut workspace)
}

/// Same as [`apply_inverse`], but threading FFT scratch through a caller-owned
/// [`Workspace`] instead of allocating one per call. `workspace.m()` must
/// already be `>= next_pow2(2 * x.len())`.
pub(crate) fn apply_inverse_ws(x: &[f64], v: &[f64], workspace: &mut Workspace) -> Vec<f64> {
    let n = x.len();
    let x0 = x[0];
    let mut z = vec![0.0; n];
    for k in 1..n {
        z[k] = x[n - k];
    }

    let tx = tri_mul_t_ws(workspace, x, v);
    let t1 = tri_mul_ws(workspace, x, &tx);
    let tz = tri_mul_t_ws(workspace, &z, v);
    let t2 = tri_mul_ws(workspace, &z, &tz);
    (0..n).map(|i| (t1[i] - t2[i]) / x0).collect()
}

/// Returns `g[k] = Σᵢ (Σ⁻¹)_{i,i+k}` for `k = 0..n`, the diagonal band sums of
/// Σ⁻¹ derived purely from the generator `x` — no dense inverse, no solve.
///
/// From `Σ⁻¹ = (1/x₀)(X Xᵀ - Z Zᵀ)`, the `k`-th superdiagonal sum of `X Xᵀ`
/// works out to `(n-k)·r(k) - s(k)` where `r` is the autocorrelation of `X`'s
/// first column and `s` is the same column's correlation against its
/// index-weighted self (`s(k) = Σₘ m·x[m]·x[m+k]`); same formula for `Z Zᵀ`
/// with `Z`'s first column. Both `r` and `s` are one FFT pass each over the
/// whole generator, so this is O(N log N) total rather than the O(N) solves
/// a dense-inverse approach would need. [`crate::toeplitz::Toeplitz`] calls
/// this once per factorization and reuses the result across every
/// `trace_grad` call.
pub(crate) fn diagonal_band_sums(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let x0 = x[0];
    let mut z = vec![0.0; n];
    for k in 1..n {
        z[k] = x[n - k];
    }
    let gx = band_sums_of_triangular_gram(x);
    let gz = band_sums_of_triangular_gram(&z);
    (0..n).map(|k| (gx[k] - gz[k]) / x0).collect()
}

/// Diagonal band sums of `C Cᵀ` for `C` lower-triangular Toeplitz with first
/// column `c`: `Σᵢ (C Cᵀ)_{i,i+k} = Σₘ (n-k-m)·c[m]·c[m+k]`.
fn band_sums_of_triangular_gram(c: &[f64]) -> Vec<f64> {
    let n = c.len();
    let r = crate::fft::autocorrelate(c);
    let weighted: Vec<f64> = c.iter().enumerate().map(|(m, &cm)| m as f64 * cm).collect();
    let s = crate::fft::cross_correlate(&weighted, c);
    (0..n).map(|k| (n - k) as f64 * r[k] - s[k]).collect()
}

/// `A v` where `A[i,j] = c[i-j]` for `i >= j`, else 0 (lower-triangular
/// Toeplitz with first column `c`).
fn tri_mul(c: &[f64], v: &[f64]) -> Vec<f64> {
    let n = c.len();
    let m = next_pow2(2 * n);
    let mut c_pad = vec![0.0; m];
    c_pad[..n].copy_from_slice(c);
    let mut v_pad = vec![0.0; m];
    v_pad[..n].copy_from_slice(v);
    let conv = circular_convolve(&c_pad, &v_pad, m);
    conv[..n].to_vec()
}

/// `Aᵀ v` for the same `A` as [`tri_mul`].
fn tri_mul_t(c: &[f64], v: &[f64]) -> Vec<f64> {
    let n = c.len();
    let m = next_pow2(2 * n);
    let mut c_pad = vec![0.0; m];
    c_pad[..n].copy_from_slice(c);
    let mut v_pad = vec![0.0; m];
    for (i, &vi) in v.iter().rev().enumerate() {
        v_pad[m - n + i] = vi;
    }
    let conv = circular_convolve(&c_pad, &v_pad, m);
    let mut out: Vec<f64> = conv[m - n..m].to_vec();
    out.reverse();
    out
}

/// Same as [`tri_mul`], via `workspace`'s FFT scratch instead of a fresh
/// allocation. `workspace.m()` must already be `>= next_pow2(2 * c.len())`.
fn tri_mul_ws(workspace: &mut Workspace, c: &[f64], v: &[f64]) -> Vec<f64> {
    let n = c.len();
    let m = workspace.m();
    debug_assert_eq!(m, next_pow2(2 * n));
    let mut c_pad = vec![0.0; m];
    c_pad[..n].copy_from_slice(c);
    let mut v_pad = vec![0.0; m];
    v_pad[..n].copy_from_slice(v);
    let conv = workspace.circular_convolve(&c_pad, &v_pad);
    conv[..n].to_vec()
}

/// Same as [`tri_mul_t`], via `workspace`'s FFT scratch instead of a fresh
/// allocation.
fn tri_mul_t_ws(workspace: &mut Workspace, c: &[f64], v: &[f64]) -> Vec<f64> {
    let n = c.len();
    let m = workspace.m();
    debug_assert_eq!(m, next_pow2(2 * n));
    let mut c_pad = vec![0.0; m];
    c_pad[..n].copy_from_slice(c);
    let mut v_pad = vec![0.0; m];
    for (i, &vi) in v.iter().rev().enumerate() {
        v_pad[m - n + i] = vi;
    }
    let conv = workspace.circular_convolve(&c_pad, &v_pad);
    let mut out: Vec<f64> = conv[m - n..m].to_vec();
    out.reverse();
    out
}

// ======================================================================
// TESTS
