//! The [`Toeplitz`] handle: a stateful, order-`N` symmetric positive-definite
//! Toeplitz matrix bound to an autocorrelation function (ACF).

use std::{cell::RefCell, rc::Rc};

use crate::{
    config,
    engine::{durbin_levinson::DurbinLevinson, gschur, gschur::GSchur, Generators, ToeplitzEngine},
    error::Error,
    fft,
    workspace::Workspace,
};

// ======================================================================
// State - CRATE

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Unbound,
    BoundDirty,
    Factored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Engine {
    GSchur,
    DurbinLevinson,
}

// ======================================================================
// Inner - PRIVATE

#[derive(Clone)]
struct Inner {
    n: usize,
    acf: Option<Vec<f64>>,
    state: State,
    engine: Engine,
    generators: Option<Generators>,
    /// Diagonal band sums of Σ⁻¹ (see [`gschur::diagonal_band_sums`]),
    /// lazily built the first time `trace_grad` is called and invalidated
    /// whenever `set_acf` re-dirties the handle. `trace_grad` is then just a
    /// weighted dot product against this cache, no solve needed per call.
    trace_cache: Option<Vec<f64>>,
    /// FFT scratch sized once for this handle's fixed order `N` and reused
    /// across every `multiply`/`solve` call for as long as the handle lives.
    workspace: RefCell<Workspace>,
}

impl Inner {
    fn new(n: usize, crossover: usize) -> Self {
        let m = fft::next_pow2(2 * n).max(1);
        Self {
            n,
            acf: None,
            state: State::Unbound,
            engine: if n < crossover {
                Engine::DurbinLevinson
            } else {
                Engine::GSchur
            },
            generators: None,
            trace_cache: None,
            workspace: RefCell::new(Workspace::new(m)),
        }
    }
}

// ======================================================================
// Toeplitz - PUBLIC

/// A symmetric positive-definite Toeplitz matrix Σ of fixed order `N`, bound
/// to an ACF and lazily factored.
///
/// Cloning is explicit: [`clone_shallow`](Toeplitz::clone_shallow) returns a
/// handle aliasing the same state (mutating one is visible through the
/// other); [`clone_deep`](Toeplitz::clone_deep) returns a fully independent
/// copy. `#[derive(Clone)]` is deliberately not implemented, since "clone"
/// would be ambiguous between the two.
pub struct Toeplitz {
    inner: Rc<RefCell<Inner>>,
}

impl Toeplitz {
    /// Allocates a handle of order `n`. State starts `Unbound`. The
    /// DL/GSchur engine choice follows [`config::crossover`] (the
    /// `GSCHUR_CROSSOVER` environment variable, or [`config::DEFAULT_CROSSOVER`]).
    pub fn new(n: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new(n, config::crossover()))),
        }
    }

    /// Same as [`new`](Toeplitz::new), but with the DL/GSchur crossover order
    /// pinned explicitly instead of resolved from the environment — for
    /// callers that want a handle's engine choice independent of process-wide
    /// configuration.
    pub fn with_crossover(n: usize, crossover: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner::new(n, crossover))),
        }
    }

    /// Order `N` of this handle.
    pub fn n(&self) -> usize {
        self.inner.borrow().n
    }

    /// Binds (or rebinds) this handle to `acf`. Drops any cached
    /// factorization; state becomes `BoundDirty`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidLength`] if `acf.len() != self.n()`.
    pub fn set_acf(&self, acf: &[f64]) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        if acf.len() != inner.n {
            return Err(Error::InvalidLength {
                expected: inner.n,
                got: acf.len(),
            });
        }
        inner.acf = Some(acf.to_vec());
        inner.state = State::BoundDirty;
        inner.generators = None;
        inner.trace_cache = None;
        Ok(())
    }

    /// Returns the currently bound ACF.
    ///
    /// # Errors
    ///
    /// [`Error::Unbound`] if `set_acf` was never called.
    pub fn get_acf(&self) -> Result<Vec<f64>, Error> {
        self.inner.borrow().acf.clone().ok_or(Error::Unbound)
    }

    /// `w = Σ z`. Works from `BoundDirty` without factoring.
    ///
    /// # Errors
    ///
    /// [`Error::Unbound`], [`Error::InvalidLength`].
    pub fn multiply(&self, z: &[f64]) -> Result<Vec<f64>, Error> {
        let inner = self.inner.borrow();
        let acf = inner.acf.as_ref().ok_or(Error::Unbound)?;
        if z.len() != inner.n {
            return Err(Error::InvalidLength {
                expected: inner.n,
                got: z.len(),
            });
        }
        Ok(if config::reuse_workspace() {
            inner.workspace.borrow_mut().toeplitz_multiply(acf, z)
        } else {
            fft::toeplitz_multiply(acf, z)
        })
    }

    /// `w = Σ⁻¹ z`. Triggers factorization if the handle is dirty.
    ///
    /// # Errors
    ///
    /// [`Error::Unbound`], [`Error::InvalidLength`], [`Error::NotPositiveDefinite`].
    pub fn solve(&self, z: &[f64]) -> Result<Vec<f64>, Error> {
        if z.len() != self.n() {
            return Err(Error::InvalidLength {
                expected: self.n(),
                got: z.len(),
            });
        }
        self.ensure_factored()?;
        let inner = self.inner.borrow();
        let generators = inner.generators.as_ref().expect("just factored");
        Ok(match inner.engine {
            Engine::GSchur if config::reuse_workspace() => {
                gschur::apply_inverse_ws(&generators.x, z, &mut inner.workspace.borrow_mut())
            }
            Engine::GSchur => gschur::apply_inverse(&generators.x, z),
            Engine::DurbinLevinson => DurbinLevinson::apply_inverse(generators, z),
        })
    }

    /// `log|Σ|`. Triggers factorization if the handle is dirty.
    ///
    /// # Errors
    ///
    /// [`Error::Unbound`], [`Error::NotPositiveDefinite`].
    pub fn log_det(&self) -> Result<f64, Error> {
        self.ensure_factored()?;
        Ok(self.inner.borrow().generators.as_ref().expect("just factored").log_det)
    }

    /// `tr(Σ⁻¹ T(dacf))`, the trace term the Gaussian score needs.
    ///
    /// O(N log N): built once per factorization from [`gschur::diagonal_band_sums`]
    /// (a weighted dot product against `dacf` from then on).
    ///
    /// # Errors
    ///
    /// [`Error::Unbound`], [`Error::InvalidLength`], [`Error::NotPositiveDefinite`].
    pub fn trace_grad(&self, dacf: &[f64]) -> Result<f64, Error> {
        if dacf.len() != self.n() {
            return Err(Error::InvalidLength {
                expected: self.n(),
                got: dacf.len(),
            });
        }
        self.ensure_trace_cache()?;
        let inner = self.inner.borrow();
        let g = inner.trace_cache.as_ref().expect("just ensured");
        let n = inner.n;
        let mut total = dacf[0] * g[0];
        for d in 1..n {
            total += 2.0 * dacf[d] * g[d];
        }
        Ok(total)
    }

    /// `tr(Σ⁻¹ T(dacf_p) Σ⁻¹ T(dacf_q))`, the trace term the Gaussian
    /// Hessian needs.
    ///
    /// Unlike `trace_grad`, this quadratic-in-generators trace has no known
    /// closed form computable from the generators alone, so it is estimated
    /// by Hutchinson's stochastic trace estimator: `E[zᵀ A z] = tr(A)` for a
    /// Rademacher vector `z`, applied with `A = T(dacf_q) Σ⁻¹ T(dacf_p) Σ⁻¹`
    /// so each probe costs two solves and two multiplies — all O(N log N) —
    /// instead of materializing any N×N matrix. Probes are a fixed,
    /// deterministic (not RNG-seeded) sequence keyed only on `N`, so the
    /// result is reproducible; each probe averages both argument orderings,
    /// which makes `trace_hess(p, q) == trace_hess(q, p)` exact rather than
    /// merely true in expectation.
    ///
    /// # Errors
    ///
    /// [`Error::Unbound`], [`Error::InvalidLength`], [`Error::NotPositiveDefinite`].
    pub fn trace_hess(&self, dacf_p: &[f64], dacf_q: &[f64]) -> Result<f64, Error> {
        let n = self.n();
        if dacf_p.len() != n {
            return Err(Error::InvalidLength {
                expected: n,
                got: dacf_p.len(),
            });
        }
        if dacf_q.len() != n {
            return Err(Error::InvalidLength {
                expected: n,
                got: dacf_q.len(),
            });
        }
        self.ensure_factored()?;

        let mut total = 0.0;
        for probe in 0..TRACE_HESS_PROBES {
            let z = rademacher_probe(n, probe);
            let a = self.solve(&z)?; // Σ⁻¹ z, shared by both orderings

            let bp = fft::toeplitz_multiply(dacf_p, &a); // T(dacf_p) Σ⁻¹ z
            let cp = self.solve(&bp)?; // Σ⁻¹ T(dacf_p) Σ⁻¹ z
            let dp = fft::toeplitz_multiply(dacf_q, &cp); // T(dacf_q) Σ⁻¹ T(dacf_p) Σ⁻¹ z
            let term_pq = dot(&z, &dp);

            let bq = fft::toeplitz_multiply(dacf_q, &a);
            let cq = self.solve(&bq)?;
            let dq = fft::toeplitz_multiply(dacf_p, &cq);
            let term_qp = dot(&z, &dq);

            total += 0.5 * (term_pq + term_qp);
        }
        Ok(total / TRACE_HESS_PROBES as f64)
    }

    /// Returns another handle aliasing the same state: mutating either is
    /// visible through the other.
    pub fn clone_shallow(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }

    /// Returns a fully independent copy: mutating the original afterwards
    /// does not affect it.
    pub fn clone_deep(&self) -> Self {
        Self {
            inner: Rc::new(RefCell::new(self.inner.borrow().clone())),
        }
    }

    fn ensure_factored(&self) -> Result<(), Error> {
        let mut inner = self.inner.borrow_mut();
        if inner.state == State::Factored {
            return Ok(());
        }
        let acf = inner.acf.clone().ok_or(Error::Unbound)?;
        let generators = match inner.engine {
            Engine::GSchur => GSchur::factor(&acf)?,
            Engine::DurbinLevinson => DurbinLevinson::factor(&acf)?,
        };
        inner.generators = Some(generators);
        inner.state = State::Factored;
        Ok(())
    }

    /// Builds and caches the generator-derived diagonal band sums of Σ⁻¹ that
    /// `trace_grad` dots against. [`gschur::diagonal_band_sums`] only needs
    /// Σ⁻¹'s first column, so this works the same regardless of which engine
    /// produced `generators.x`.
    fn ensure_trace_cache(&self) -> Result<(), Error> {
        self.ensure_factored()?;
        let mut inner = self.inner.borrow_mut();
        if inner.trace_cache.is_some() {
            return Ok(());
        }
        let generators = inner.generators.as_ref().expect("just factored");
        inner.trace_cache = Some(gschur::diagonal_band_sums(&generators.x));
        Ok(())
    }

    /// Dense `N x N` reference matrix for the currently bound ACF, used only
    /// by tests to cross-check `multiply`/`solve`/`log_det` against a
    /// textbook implementation.
    #[cfg(test)]
    pub(crate) fn to_dense(&self) -> Result<Vec<Vec<f64>>, Error> {
        let acf = self.get_acf()?;
        Ok(dense_toeplitz(&acf))
    }
}

fn dense_toeplitz(acf: &[f64]) -> Vec<Vec<f64>> {
    let n = acf.len();
    (0..n)
        .map(|i| (0..n).map(|j| acf[(i as isize - j as isize).unsigned_abs() as usize]).collect())
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Number of Rademacher probes `trace_hess` averages over. Fixed rather than
/// scaled with `N`, so the per-call cost stays O(N log N); this trades some
/// accuracy for asymptotic complexity, which is the tradeoff the caller
/// (a Gaussian Hessian used inside an optimizer, not a final reported
/// statistic) wants.
const TRACE_HESS_PROBES: usize = 24;

/// Deterministic Rademacher vector of length `n`, indexed by `probe` — no
/// RNG dependency, so `trace_hess` is reproducible given the same `(n, probe)`.
fn rademacher_probe(n: usize, probe: usize) -> Vec<f64> {
    let mut state = splitmix64_seed(n as u64, probe as u64);
    (0..n)
        .map(|_| {
            state = splitmix64_next(state);
            if state & 1 == 0 {
                1.0
            } else {
                -1.0
            }
        })
        .collect()
}

fn splitmix64_seed(n: u64, probe: u64) -> u64 {
    n.wrapping_mul(0x9E3779B97F4A7C15).wrapping_add(probe.wrapping_mul(0xBF58476D1CE4E5B9)) ^ 0xD1B54A32D192ED03
}

fn splitmix64_next(x: u64) -> u64 {
    let x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    fn acf4() -> Vec<f64> {
        vec![2.0, 1.0, 0.5, 0.25]
    }

    #[test]
    fn unbound_operations_error() {
        let t = Toeplitz::new(4);
        assert_eq!(t.get_acf().unwrap_err(), Error::Unbound);
        assert_eq!(t.multiply(&[0.0; 4]).unwrap_err(), Error::Unbound);
        assert_eq!(t.log_det().unwrap_err(), Error::Unbound);
    }

    #[test]
    fn multiply_matches_spec_example() {
        let t = Toeplitz::new(4);
        t.set_acf(&acf4()).unwrap();
        let w = t.multiply(&[1.0, 0.0, 0.0, 0.0]).unwrap();
        assert_eq!(w, acf4());
    }

    #[test]
    fn multiply_matches_dense_mat_vec() {
        let t = Toeplitz::new(4);
        t.set_acf(&acf4()).unwrap();
        let z = vec![1.0, -2.0, 0.5, 3.0];
        let got = t.multiply(&z).unwrap();
        let want = crate::test_util::dense_mat_vec(&crate::test_util::dense_toeplitz(&acf4()), &z);
        crate::test_util::assert_close(&got, &want, 1e-9);
    }

    #[test]
    fn solve_then_multiply_round_trips() {
        let t = Toeplitz::new(4);
        t.set_acf(&acf4()).unwrap();
        let z = vec![1.0, -2.0, 0.5, 3.0];
        let w = t.multiply(&z).unwrap();
        let back = t.solve(&w).unwrap();
        for (a, b) in back.iter().zip(z.iter()) {
            assert!((a - b).abs() < 1e-8);
        }
    }

    #[test]
    fn log_det_matches_dense() {
        let t = Toeplitz::new(4);
        t.set_acf(&acf4()).unwrap();
        let ld = t.log_det().unwrap();
        assert!((ld - 1.9095425048844383).abs() < 1e-8);
    }

    #[test]
    fn not_positive_definite_then_recovers() {
        let t = Toeplitz::new(2);
        t.set_acf(&[1.0, 2.0]).unwrap();
        assert!(matches!(t.solve(&[1.0, 0.0]), Err(Error::NotPositiveDefinite { .. })));
        assert!(t.multiply(&[1.0, 0.0]).is_ok());

        t.set_acf(&[1.0, 0.5]).unwrap();
        assert!(t.solve(&[1.0, 0.0]).is_ok());
    }

    #[test]
    fn shallow_clone_aliases_deep_clone_does_not() {
        let t1 = Toeplitz::new(4);
        t1.set_acf(&acf4()).unwrap();

        let t2 = t1.clone_shallow();
        let t3 = t1.clone_deep();

        let rebound = vec![3.0, 1.0, 0.2, 0.1];
        t1.set_acf(&rebound).unwrap();

        assert_eq!(t2.get_acf().unwrap(), rebound);
        assert_eq!(t3.get_acf().unwrap(), acf4());
    }

    #[test]
    fn trace_grad_matches_dense_formula() {
        let t = Toeplitz::new(4);
        t.set_acf(&acf4()).unwrap();
        let dacf = vec![1.0, 0.1, 0.0, 0.0];

        let n = 4;
        let mut inv = vec![vec![0.0; n]; n];
        for i in 0..n {
            let mut e = vec![0.0; n];
            e[i] = 1.0;
            let col = t.solve(&e).unwrap();
            for j in 0..n {
                inv[j][i] = col[j];
            }
        }
        let want: f64 = (0..n)
            .map(|i| (0..n).map(|j| inv[i][j] * dacf[(i as isize - j as isize).unsigned_abs() as usize]).sum::<f64>())
            .sum();
        let got = t.trace_grad(&dacf).unwrap();
        assert!((got - want).abs() < 1e-7, "{got} vs {want}");
    }

    #[test]
    fn to_dense_matches_toeplitz_lift() {
        let t = Toeplitz::new(4);
        t.set_acf(&acf4()).unwrap();
        let dense = t.to_dense().unwrap();
        let want = crate::test_util::dense_toeplitz(&acf4());
        assert_eq!(dense, want);
    }

    #[test]
    fn with_crossover_pins_engine_choice_regardless_of_env() {
        let forced_dl = Toeplitz::with_crossover(4, 1000);
        let forced_gschur = Toeplitz::with_crossover(4, 0);
        forced_dl.set_acf(&acf4()).unwrap();
        forced_gschur.set_acf(&acf4()).unwrap();

        let z = vec![1.0, -2.0, 0.5, 3.0];
        let a = forced_dl.solve(&z).unwrap();
        let b = forced_gschur.solve(&z).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-8);
        }
    }

    #[test]
    fn trace_hess_is_close_to_dense_reference() {
        let t = Toeplitz::new(6);
        let acf: Vec<f64> = (0..6).map(|i| 0.6f64.powi(i)).collect();
        t.set_acf(&acf).unwrap();
        let dp = vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let dq = vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

        let n = 6;
        let mut inv = vec![vec![0.0; n]; n];
        for i in 0..n {
            let mut e = vec![0.0; n];
            e[i] = 1.0;
            let col = t.solve(&e).unwrap();
            for j in 0..n {
                inv[j][i] = col[j];
            }
        }
        let tp = dense_toeplitz(&dp);
        let tq = dense_toeplitz(&dq);
        let mut m1 = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                m1[i][j] = (0..n).map(|k| inv[i][k] * tp[k][j]).sum();
            }
        }
        let mut m2 = vec![vec![0.0; n]; n];
        for i in 0..n {
            for j in 0..n {
                m2[i][j] = (0..n).map(|k| m1[i][k] * inv[k][j]).sum();
            }
        }
        let want: f64 = (0..n).map(|i| (0..n).map(|j| m2[i][j] * tq[j][i]).sum::<f64>()).sum();

        let got = t.trace_hess(&dp, &dq).unwrap();
        assert!((got - want).abs() < 0.5 * want.abs().max(1.0), "{got} vs {want}");
    }

    #[test]
    fn trace_hess_is_symmetric_in_swapped_arguments() {
        let t = Toeplitz::new(4);
        t.set_acf(&acf4()).unwrap();
        let dp = vec![1.0, 0.2, 0.0, 0.0];
        let dq = vec![0.0, 1.0, 0.3, 0.0];
        let hpq = t.trace_hess(&dp, &dq).unwrap();
        let hqp = t.trace_hess(&dq, &dp).unwrap();
        assert!((hpq - hqp).abs() < 1e-8);
    }
}
