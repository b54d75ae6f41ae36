//! Exact simulation of stationary Gaussian vectors with a given ACF.

use rand::Rng;
use rand_distr::StandardNormal;
use rustfft::num_complex::Complex64;

use crate::{engine::durbin_levinson::durbin_step, error::Error, fft};

// ======================================================================
// FUNCTIONS - PUBLIC

/// Draws `n_paths` independent length-`N` stationary Gaussian vectors with
/// autocorrelation `acf`.
///
/// `use_fft = true` simulates via circulant embedding (O(N log N) per path,
/// but restricted to ACFs whose circulant extension stays positive
/// semidefinite); `use_fft = false` uses the Durbin-Levinson Cholesky
/// recursion directly (O(N²) per path, exact for any positive-definite
/// `acf`, no embeddability restriction). Callers that don't know in advance
/// whether their ACF embeds cleanly should try `true` first and fall back to
/// `false` on [`Error::Nonembeddable`].
///
/// # Errors
///
/// [`Error::Nonembeddable`] (only with `use_fft = true`) if the circulant
/// extension of `acf` at embedding length `2(N-1)` has a negative spectral
/// value; [`Error::NotPositiveDefinite`] (only with `use_fft = false`) at the
/// first non-positive Durbin-Levinson pivot.
pub fn rnormtz(acf: &[f64], n_paths: usize, use_fft: bool, rng: &mut impl Rng) -> Result<Vec<Vec<f64>>, Error> {
    if use_fft {
        circulant_sample(acf, n_paths, rng)
    } else {
        dl_sample(acf, n_paths, rng)
    }
}

/// Circulant-embedding path behind [`rnormtz`]`(.., use_fft: true, ..)`: one
/// complex FFT produces two independent paths (the real and imaginary parts
/// of the driving noise), so the FFT is only run `ceil(n_paths / 2)` times.
fn circulant_sample(acf: &[f64], n_paths: usize, rng: &mut impl Rng) -> Result<Vec<Vec<f64>>, Error> {
    let n = acf.len();
    if n < 2 {
        // L = 2(n-1) degenerates; every sample is i.i.d. N(0, acf[0]).
        let sd = acf.first().copied().unwrap_or(0.0).sqrt();
        return Ok((0..n_paths)
            .map(|_| (0..n).map(|_| sd * rng.sample::<f64, _>(StandardNormal)).collect())
            .collect());
    }

    let l = 2 * (n - 1);
    let mut c = vec![0.0; l];
    c[..n].copy_from_slice(acf);
    for k in 1..n - 1 {
        c[l - k] = acf[k];
    }

    let mut spectrum = fft::pack_real(&c, l);
    fft::forward(&mut spectrum);
    for (i, s) in spectrum.iter().enumerate() {
        if s.re < -1e-8 * acf[0] {
            return Err(Error::Nonembeddable { index: i, value: s.re });
        }
    }
    let scale: Vec<f64> = spectrum.iter().map(|s| (s.re.max(0.0) / l as f64).sqrt()).collect();

    let mut out = Vec::with_capacity(n_paths);
    let mut pending: Option<Vec<f64>> = None;
    while out.len() < n_paths {
        if let Some(second) = pending.take() {
            out.push(second);
            continue;
        }
        let re: Vec<f64> = (0..l).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
        let im: Vec<f64> = (0..l).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();
        let mut w: Vec<Complex64> = re
            .iter()
            .zip(im.iter())
            .zip(scale.iter())
            .map(|((&r, &i), &s)| Complex64::new(r * s, i * s))
            .collect();
        fft::inverse(&mut w);
        let path1: Vec<f64> = w[..n].iter().map(|c| c.re / (l as f64).sqrt()).collect();
        let path2: Vec<f64> = w[..n].iter().map(|c| c.im / (l as f64).sqrt()).collect();
        out.push(path1);
        if out.len() < n_paths {
            pending = Some(path2);
        }
    }
    Ok(out)
}

/// Durbin-Levinson Cholesky path behind [`rnormtz`]`(.., use_fft: false, ..)`:
/// O(N²) per path, exact for every positive-definite `acf`.
fn dl_sample(acf: &[f64], n_paths: usize, rng: &mut impl Rng) -> Result<Vec<Vec<f64>>, Error> {
    let n = acf.len();
    if acf[0] <= 0.0 {
        return Err(Error::NotPositiveDefinite { step: 0, pivot: acf[0] });
    }

    // Precompute, once, the per-step (phi, sqrt(v)) pairs shared by every path.
    let mut steps: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n);
    let mut v = acf[0];
    let mut phi: Vec<f64> = Vec::new();
    steps.push((phi.clone(), v.sqrt()));
    for k in 1..n {
        let (new_phi, new_v) = durbin_step(acf, &phi, v, k);
        if new_v <= 0.0 {
            return Err(Error::NotPositiveDefinite { step: k, pivot: new_v });
        }
        phi = new_phi;
        v = new_v;
        steps.push((phi.clone(), v.sqrt()));
    }

    let mut out = Vec::with_capacity(n_paths);
    for _ in 0..n_paths {
        let mut x = Vec::with_capacity(n);
        for (k, (phi_k, sd_k)) in steps.iter().enumerate() {
            let mean: f64 = (0..k).map(|j| phi_k[j] * x[k - 1 - j]).sum();
            let z: f64 = rng.sample(StandardNormal);
            x.push(mean + sd_k * z);
        }
        out.push(x);
    }
    Ok(out)
}

// ======================================================================
// TESTS
