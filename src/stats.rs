//! Streaming per-pixel moments.

use ndarray::{Array2, Zip};
use num_traits::Float;

use crate::error::{check_shape, SamplerError};

/// Welford's running mean and sum of squared deviations, element-wise over
/// images of a fixed shape.
///
/// After `n` updates `mean()` is the arithmetic mean of the inputs and
/// `variance()` their unbiased sample variance `M2/(n − 1)`, without any of
/// the inputs being retained.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningMoments<T> {
    n: usize,
    mean: Array2<T>,
    m2: Array2<T>,
}

impl<T: Float> RunningMoments<T> {
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            n: 0,
            mean: Array2::from_elem(shape, T::zero()),
            m2: Array2::from_elem(shape, T::zero()),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.mean.dim()
    }

    pub fn count(&self) -> usize {
        self.n
    }

    /// Incorporates one observation in `O(size)` time.
    pub fn update(&mut self, x: &Array2<T>) -> Result<(), SamplerError> {
        check_shape(self.shape(), x.shape())?;
        self.n += 1;
        let n = T::from(self.n).unwrap_or_else(T::infinity);
        Zip::from(&mut self.mean)
            .and(&mut self.m2)
            .and(x)
            .for_each(|mean, m2, &x| {
                let delta = x - *mean;
                *mean = *mean + delta / n;
                *m2 = *m2 + delta * (x - *mean);
            });
        Ok(())
    }

    pub fn mean(&self) -> &Array2<T> {
        &self.mean
    }

    /// Unbiased variance; all zeros until two observations have been seen.
    pub fn variance(&self) -> Array2<T> {
        if self.n < 2 {
            return Array2::from_elem(self.shape(), T::zero());
        }
        let denom = T::from(self.n - 1).unwrap_or_else(T::infinity);
        self.m2.mapv(|m2| m2 / denom)
    }

    /// Drops everything seen so far.
    pub fn reset(&mut self) {
        self.n = 0;
        self.mean.fill(T::zero());
        self.m2.fill(T::zero());
    }
}
