//! Error type shared by every fallible operation in the crate.

use thiserror::Error;

/// Errors raised while configuring or running a sampler.
///
/// Configuration variants are reported before the first iteration. A
/// [`SamplerError::NonFiniteState`] aborts a run at the iteration where it was
/// detected; nothing is retried.
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("noise scale must be positive, got {0}")]
    NonPositiveNoiseScale(f64),

    #[error("prior weight must be non-negative, got {0}")]
    NegativePriorWeight(f64),

    #[error("smoothing fraction must lie in (0, 1), got {0}")]
    InvalidSmoothingFraction(f64),

    #[error("smoothing scale must be positive, got {0}")]
    NonPositiveSmoothingScale(f64),

    #[error("proximal solver needs at least one inner iteration")]
    ZeroInnerIterations,

    #[error("Lipschitz constant must be positive and finite, got {0}")]
    NonPositiveLipschitz(f64),

    #[error("step size {step_size} exceeds the stability bound {bound}")]
    StepSizeTooLarge { step_size: f64, bound: f64 },

    #[error("step size must be positive, got {0}")]
    NonPositiveStepSize(f64),

    #[error("stage count must be at least 1, got {0}")]
    InvalidStageCount(usize),

    #[error("damping parameter must lie in (0, 1), got {0}")]
    DampingOutOfRange(f64),

    #[error("step fraction must lie in (0, 1), got {0}")]
    InvalidStepFraction(f64),

    #[error("burn-in fraction must lie in [0, 1), got {0}")]
    InvalidBurninFraction(f64),

    #[error("burn-in of {burnin} iterations is not shorter than the {total} collected iterations")]
    BurninTooLong { burnin: usize, total: usize },

    #[error("thinning step is zero: {n_samples} retained samples requested from {total} iterations")]
    ZeroThinning { total: usize, n_samples: usize },

    #[error("number of iterations must be positive")]
    ZeroIterations,

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("non-finite state after iteration {iteration} ({kernel} kernel, step size {step_size})")]
    NonFiniteState {
        iteration: usize,
        step_size: f64,
        kernel: &'static str,
    },

    #[error("proximal operator failed: {0}")]
    Proximal(String),

    #[cfg(feature = "csv")]
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "csv")]
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Checks that `found` has the `expected` (rows, columns) shape.
pub(crate) fn check_shape(expected: (usize, usize), found: &[usize]) -> Result<(), SamplerError> {
    let found = (found[0], found[1]);
    if found != expected {
        return Err(SamplerError::ShapeMismatch { expected, found });
    }
    Ok(())
}
