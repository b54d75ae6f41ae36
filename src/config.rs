//! Process-wide tunables.
//!
//! There is no configuration file. The handful of knobs named in the public
//! contract are read from the environment at most once and memoized, the
//! same way [`crate::fft`] memoizes plans and [`crate::engine::gschur`] would
//! memoize lookup tables if it had any.

use once_cell::sync::OnceCell;

// ======================================================================
// CONST - PUBLIC

/// Default order below which [`Toeplitz`](crate::Toeplitz) prefers the
/// Durbin-Levinson engine over GSchur.
pub const DEFAULT_CROSSOVER: usize = 300;

// ======================================================================
// STATIC - PRIVATE

static CROSSOVER: OnceCell<usize> = OnceCell::new();
static REUSE_WORKSPACE: OnceCell<bool> = OnceCell::new();

// ======================================================================
// FUNCTIONS - PUBLIC

/// Returns the DL/GSchur crossover order.
///
/// Resolution order: the `GSCHUR_CROSSOVER` environment variable (parsed as
/// `usize`) if present and valid, otherwise [`DEFAULT_CROSSOVER`]. Resolved
/// once per process and cached. [`Toeplitz::with_crossover`](crate::Toeplitz::with_crossover)
/// bypasses this for a single handle.
pub fn crossover() -> usize {
    *CROSSOVER.get_or_init(|| {
        std::env::var("GSCHUR_CROSSOVER")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_CROSSOVER)
    })
}

/// Whether a [`Toeplitz`](crate::Toeplitz) handle should keep its FFT scratch
/// buffers ([`crate::workspace::Workspace`]) alive across calls instead of
/// allocating a fresh one per `multiply`/`solve`.
///
/// Resolution order: the `TOEPLITZ_REUSE_WORKSPACE` environment variable
/// (`"0"`/`"false"` disables, anything else present enables) if set,
/// otherwise `true`. Resolved once per process and cached. Disabling this is
/// a debugging knob for isolating workspace-aliasing bugs from the rest of a
/// solve; there is no performance reason to turn it off.
pub fn reuse_workspace() -> bool {
    *REUSE_WORKSPACE.get_or_init(|| {
        std::env::var("TOEPLITZ_REUSE_WORKSPACE")
            .ok()
            .map(|s| !matches!(s.as_str(), "0" | "false"))
            .unwrap_or(true)
    })
}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_crossover_is_three_hundred() {
        // This test only holds if `GSCHUR_CROSSOVER` is unset in the test
        // process, which is the case in normal `cargo test` runs.
        if std::env::var("GSCHUR_CROSSOVER").is_err() {
            assert_eq!(crossover(), DEFAULT_CROSSOVER);
        }
    }

    #[test]
    fn default_reuse_workspace_is_enabled() {
        // Same caveat as above: holds only when the env var is unset.
        if std::env::var("TOEPLITZ_REUSE_WORKSPACE").is_err() {
            assert!(reuse_workspace());
        }
    }
}
