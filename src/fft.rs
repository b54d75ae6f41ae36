//! Process-wide FFT plan cache.
//!
//! **This is a low-level module, not normally needed for everyday use of
//! [`Toeplitz`](crate::Toeplitz), [`rnormtz`](crate::rnormtz) or
//! [`dnormtz`](crate::dnormtz).**
//!
//! This module is relevant if you want to
//! - write a new [`ToeplitzEngine`](crate::engine::ToeplitzEngine).
//! - understand/benchmark the transform at a low level.
//!
//! Plans are cached process-wide keyed by transform length and direction;
//! acquisition is idempotent. Transforms are unnormalized: the inverse
//! transform must be divided by the length by the caller when an L2 inverse
//! is wanted, exactly as the forward/inverse pair is unnormalized in most FFT
//! libraries.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use once_cell::sync::Lazy;
use rustfft::{num_complex::Complex64, Fft, FftPlanner};

// ======================================================================
// STATIC - PRIVATE

static FORWARD_PLANS: Lazy<Mutex<HashMap<usize, Arc<dyn Fft<f64>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));
static INVERSE_PLANS: Lazy<Mutex<HashMap<usize, Arc<dyn Fft<f64>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

// ======================================================================
// FUNCTIONS - PUBLIC - misc

/// Returns the smallest power of two that is `>= n`.
///
/// # Examples
///
/// ```rust
/// use gschur_toeplitz::fft;
///
/// assert_eq!(fft::next_pow2(1), 1);
/// assert_eq!(fft::next_pow2(5), 8);
/// assert_eq!(fft::next_pow2(8), 8);
/// ```
pub fn next_pow2(n: usize) -> usize {
    if n <= 1 {
        1
    } else {
        1usize << (usize::BITS - (n - 1).leading_zeros())
    }
}

// ======================================================================
// FUNCTIONS - PUBLIC - plan cache

/// Returns the cached forward FFT plan of length `len`, creating and
/// inserting it if absent.
pub fn forward_plan(len: usize) -> Arc<dyn Fft<f64>> {
    plan(&FORWARD_PLANS, len, true)
}

/// Returns the cached inverse FFT plan of length `len`, creating and
/// inserting it if absent.
pub fn inverse_plan(len: usize) -> Arc<dyn Fft<f64>> {
    plan(&INVERSE_PLANS, len, false)
}

fn plan(cache: &Lazy<Mutex<HashMap<usize, Arc<dyn Fft<f64>>>>>, len: usize, forward: bool) -> Arc<dyn Fft<f64>> {
    let mut guard = cache.lock().unwrap();
    guard
        .entry(len)
        .or_insert_with(|| {
            let mut planner = FftPlanner::new();
            if forward {
                planner.plan_fft_forward(len)
            } else {
                planner.plan_fft_inverse(len)
            }
        })
        .clone()
}

// ======================================================================
// FUNCTIONS - PUBLIC - transforms

/// In-place forward FFT of `data`, whose length selects the cached plan.
pub fn forward(data: &mut [Complex64]) {
    forward_plan(data.len()).process(data);
}

/// In-place inverse FFT of `data`, whose length selects the cached plan.
///
/// Unnormalized: divide every element by `data.len()` for an L2 inverse.
pub fn inverse(data: &mut [Complex64]) {
    inverse_plan(data.len()).process(data);
}

/// Packs a real slice into a zero-padded [`Complex64`] buffer of length `len`.
///
/// # Panics
///
/// If `real.len() > len`.
pub fn pack_real(real: &[f64], len: usize) -> Vec<Complex64> {
    assert!(real.len() <= len);
    let mut out = vec![Complex64::new(0.0, 0.0); len];
    for (o, &r) in out.iter_mut().zip(real.iter()) {
        o.re = r;
    }
    out
}

// ======================================================================
// FUNCTIONS - PUBLIC - Toeplitz-shaped convolutions
//
// Every structured matrix-vector product this crate needs (full symmetric
// multiply, and the triangular products behind the Gohberg-Semencul solve in
// `engine::gschur`) reduces to a circular convolution of two zero-padded
// length-M vectors, M >= 2 * (the matrix order). Centralizing it here keeps
// the embedding-and-truncation arithmetic in one place.

/// Circular convolution of `a` and `b`, both already length `m`.
pub fn circular_convolve(a: &[f64], b: &[f64], m: usize) -> Vec<f64> {
    debug_assert_eq!(a.len(), m);
    debug_assert_eq!(b.len(), m);
    let mut fa = pack_real(a, m);
    let mut fb = pack_real(b, m);
    forward(&mut fa);
    forward(&mut fb);
    for (x, y) in fa.iter_mut().zip(fb.iter()) {
        *x *= y;
    }
    inverse(&mut fa);
    fa.iter().map(|c| c.re / m as f64).collect()
}

/// Cross-correlation `corr[k] = Σₘ y[m] x[m+k]` for `k = 0..x.len()`, both
/// `y` and `x` implicitly zero beyond their length. Computed as one
/// forward/inverse FFT pair on a `>= 2n`-padded buffer, which is long enough
/// that the circular cross-correlation FFT gives agrees with the wanted
/// linear one for every `k` in range (no wraparound term can reach back).
///
/// # Panics
///
/// If `y.len() != x.len()`.
pub(crate) fn cross_correlate(y: &[f64], x: &[f64]) -> Vec<f64> {
    assert_eq!(y.len(), x.len());
    let n = x.len();
    let m = next_pow2(2 * n).max(1);
    let mut fy = pack_real(y, m);
    let mut fx = pack_real(x, m);
    forward(&mut fy);
    forward(&mut fx);
    for (a, b) in fy.iter_mut().zip(fx.iter()) {
        *a *= b.conj();
    }
    inverse(&mut fy);
    fy[..n].iter().map(|c| c.re / m as f64).collect()
}

/// Autocorrelation `corr[k] = Σₘ x[m] x[m+k]` for `k = 0..x.len()`.
pub(crate) fn autocorrelate(x: &[f64]) -> Vec<f64> {
    cross_correlate(x, x)
}

/// Multiplies the symmetric Toeplitz matrix with first row/column `acf` by
/// `v`, via circulant embedding: `w = Toeplitz(acf) * v`.
pub fn toeplitz_multiply(acf: &[f64], v: &[f64]) -> Vec<f64> {
    let n = acf.len();
    let m = next_pow2(2 * n);
    let mut c = vec![0.0; m];
    c[..n].copy_from_slice(acf);
    for k in 1..n {
        c[m - k] = acf[k];
    }
    let mut v_pad = vec![0.0; m];
    v_pad[..n].copy_from_slice(v);
    let conv = circular_convolve(&c, &v_pad, m);
    conv[..n].to_vec()
}

// ======================================================================
// TESTS
