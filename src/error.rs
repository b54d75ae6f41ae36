use std::fmt;

// ======================================================================
// Error - PUBLIC

/// Represents all possible errors that can occur in this crate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error {
    /// Given vector has a different length than the order `N` of the
    /// [`Toeplitz`](crate::Toeplitz) handle it was passed to.
    InvalidLength {
        /// Expected length, i.e. `N`.
        expected: usize,
        /// Length of the given vector.
        got: usize,
    },

    /// Operation requires a bound ACF but [`Toeplitz::set_acf`](crate::Toeplitz::set_acf)
    /// was never called (or the handle was constructed but never configured).
    Unbound,

    /// GSchur (or Durbin-Levinson) factorization encountered a pivot that is
    /// not positive, i.e. the given ACF does not define a positive-definite
    /// Toeplitz matrix.
    NotPositiveDefinite {
        /// Recursion step (0-based) at which the non-positive pivot was found.
        step: usize,
        /// The offending pivot value.
        pivot: f64,
    },

    /// Circulant embedding of the ACF produced a negative eigenvalue, so the
    /// requested process cannot be simulated exactly at this embedding size.
    Nonembeddable {
        /// Index of the first negative eigenvalue found in the embedding FFT.
        index: usize,
        /// The (negative) eigenvalue.
        value: f64,
    },

    /// Workspace or generator allocation failed.
    Alloc,
}

// ======================================================================
// Error - IMPL DISPLAY

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidLength { expected, got } => {
                write!(
                    f,
                    "invalid length: expected {} elements, got {}",
                    expected, got
                )
            }

            Error::Unbound => {
                write!(f, "handle has no ACF bound (call set_acf first)")
            }

            Error::NotPositiveDefinite { step, pivot } => {
                write!(
                    f,
                    "not positive definite: pivot at step {} was {} (<= 0)",
                    step, pivot
                )
            }

            Error::Nonembeddable { index, value } => {
                write!(
                    f,
                    "circulant embedding is not nonnegative definite: \
                     eigenvalue {} at index {} is negative",
                    value, index
                )
            }

            Error::Alloc => {
                write!(f, "workspace allocation failed")
            }
        }
    }
}

// ======================================================================
// Error - IMPL ERROR

impl std::error::Error for Error {}

// ======================================================================
// TESTS

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_mention_key_facts() {
        assert!(
            Error::InvalidLength { expected: 4, got: 3 }
                .to_string()
                .contains("4")
        );
        assert!(Error::Unbound.to_string().contains("set_acf"));
        assert!(Error::NotPositiveDefinite { step: 2, pivot: -0.5 }
            .to_string()
            .contains("step 2"));
        assert!(Error::Nonembeddable { index: 7, value: -1.0 }
            .to_string()
            .contains("index 7"));
        assert!(Error::Alloc.to_string().contains("allocation"));
    }
}
