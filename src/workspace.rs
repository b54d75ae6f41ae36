//! Preallocated scratch buffers reused across repeated evaluations at a fixed
//! order `N`.
//!
//! **This is a low-level module, not normally needed for everyday use of
//! [`Toeplitz`](crate::Toeplitz).**
//!
//! The dominant use pattern for this crate is many density/gradient/Hessian
//! evaluations at fixed `N` inside an optimizer loop. [`Workspace`] holds one
//! flat buffer per named role, sized `M = next_pow2(2N)`, so that `multiply`,
//! `solve`, `trace_grad` and `trace_hess` never allocate once a
//! [`Toeplitz`](crate::Toeplitz) handle has been constructed for a given `M`.

use rustfft::num_complex::Complex64;

// ======================================================================
// Role - CRATE

/// Named scratch-buffer role.
///
/// Mirrors the roles named in the data model: `alpha_hat`/`beta_hat` hold the
/// frequency-domain generators, `tmp0`/`tmp1` are general-purpose scratch for
/// polynomial products, and `embed` holds the circulant embedding used by
/// `multiply`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Role {
    AlphaHat,
    BetaHat,
    Tmp0,
    Tmp1,
    Embed,
}

const ROLES: [Role; 5] = [Role::AlphaHat, Role::BetaHat, Role::Tmp0, Role::Tmp1, Role::Embed];

// ======================================================================
// Workspace - CRATE

/// Pool of complex scratch buffers of length `m`, indexed by [`Role`].
#[derive(Clone)]
pub(crate) struct Workspace {
    m: usize,
    buffers: Vec<Vec<Complex64>>,
}

impl Workspace {
    /// Allocates a workspace with all roles sized to `m`.
    pub(crate) fn new(m: usize) -> Self {
        Self {
            m,
            buffers: ROLES.iter().map(|_| vec![Complex64::new(0.0, 0.0); m]).collect(),
        }
    }

    /// Transform length every buffer in this workspace is sized to.
    pub(crate) fn m(&self) -> usize {
        self.m
    }

    /// Returns the buffer for `role`, cleared to zero.
    pub(crate) fn take(&mut self, role: Role) -> &mut [Complex64] {
        let buf = &mut self.buffers[role as usize];
        buf.iter_mut().for_each(|c| *c = Complex64::new(0.0, 0.0));
        buf
    }

    /// Re-sizes this workspace in place if `m` grew; a no-op (buffers are
    /// reused) when `m` is unchanged, matching the rest of the pool.
    pub(crate) fn ensure(&mut self, m: usize) {
        if m > self.m {
            self.m = m;
            for buf in &mut self.buffers {
                buf.resize(m, Complex64::new(0.0, 0.0));
            }
        }
    }

    /// Circular convolution of `a` and `b` (each zero-padded to `self.m()`),
    /// using the `AlphaHat`/`BetaHat` roles as FFT scratch instead of
    /// allocating fresh transform buffers. Returns `self.m()` real outputs,
    /// normalized by `m`.
    pub(crate) fn circular_convolve(&mut self, a: &[f64], b: &[f64]) -> Vec<f64> {
        let m = self.m;
        debug_assert!(a.len() <= m && b.len() <= m);
        for (slot, &x) in self.take(Role::AlphaHat).iter_mut().zip(a.iter()) {
            slot.re = x;
        }
        for (slot, &x) in self.take(Role::BetaHat).iter_mut().zip(b.iter()) {
            slot.re = x;
        }
        crate::fft::forward(&mut self.buffers[Role::AlphaHat as usize]);
        crate::fft::forward(&mut self.buffers[Role::BetaHat as usize]);
        for i in 0..m {
            let bi = self.buffers[Role::BetaHat as usize][i];
            self.buffers[Role::AlphaHat as usize][i] *= bi;
        }
        crate::fft::inverse(&mut self.buffers[Role::AlphaHat as usize]);
        self.buffers[Role::AlphaHat as usize]
            .iter()
            .map(|c| c.re / m as f64)
            .collect()
    }

    /// `Toeplitz(acf) * v` via circulant embedding, reusing this workspace's
    /// FFT scratch. `self.m()` must already be `>= next_pow2(2 * acf.len())`.
    pub(crate) fn toeplitz_multiply(&mut self, acf: &[f64], v: &[f64]) -> Vec<f64> {
        let n = acf.len();
        let m = self.m;
        let mut c = vec![0.0; m];
        c[..n].copy_from_slice(acf);
        for k in 1..n {
            c[m - k] = acf[k];
        }
        let mut v_pad = vec![0.0; m];
        v_pad[..n].copy_from_slice(v);
        let conv = self.circular_convolve(&c, &v_pad);
        conv[..n].to_vec()
    }
}

// ======================================================================
// TESTS
