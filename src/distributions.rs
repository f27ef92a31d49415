/*!
Closed-form image densities implementing [`GradientTarget`].

These are used to check the kernels against known stationary laws and to
benchmark a transition without paying for a proximal solve.

# Examples

```rust
use ndarray::Array2;
use prox_mcmc::distributions::DiagonalGaussian;
use prox_mcmc::posterior::GradientTarget;

// Independent N(0, 0.5) pixels on a 4x4 grid.
let target = DiagonalGaussian::isotropic(Array2::zeros((4, 4)), 0.5);
assert_eq!(target.lipschitz(), 2.0);
let grad = target.grad_log_prob(&Array2::ones((4, 4))).unwrap();
assert_eq!(grad[[0, 0]], -2.0);
```
*/

use ndarray::{Array2, Zip};

use crate::error::{check_shape, SamplerError};
use crate::posterior::GradientTarget;

/**
Independent Gaussian pixels: `x[i, j] ~ N(mean[i, j], variance[i, j])`.

The log-density is unnormalized,

```text
log p(x) = −Σ (x − μ)² / (2 v)
```

and the gradient `(μ − x)/v` is Lipschitz with constant `max 1/v`.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalGaussian {
    pub mean: Array2<f64>,
    pub variance: Array2<f64>,
}

impl DiagonalGaussian {
    /// Fails with [`SamplerError::ShapeMismatch`] when the arrays disagree and
    /// with [`SamplerError::NonPositiveNoiseScale`] on a non-positive variance.
    pub fn new(mean: Array2<f64>, variance: Array2<f64>) -> Result<Self, SamplerError> {
        check_shape(mean.dim(), variance.shape())?;
        if let Some(&v) = variance.iter().find(|&&v| !(v > 0.0)) {
            return Err(SamplerError::NonPositiveNoiseScale(v));
        }
        Ok(Self { mean, variance })
    }

    /// Every pixel shares one variance, which is not validated.
    pub fn isotropic(mean: Array2<f64>, variance: f64) -> Self {
        let variance = Array2::from_elem(mean.dim(), variance);
        Self { mean, variance }
    }
}

impl GradientTarget for DiagonalGaussian {
    fn shape(&self) -> (usize, usize) {
        self.mean.dim()
    }

    fn log_prob(&self, x: &Array2<f64>) -> Result<f64, SamplerError> {
        check_shape(self.shape(), x.shape())?;
        let mut acc = 0.0;
        Zip::from(x)
            .and(&self.mean)
            .and(&self.variance)
            .for_each(|&x, &m, &v| acc -= (x - m).powi(2) / (2.0 * v));
        Ok(acc)
    }

    fn grad_log_prob(&self, x: &Array2<f64>) -> Result<Array2<f64>, SamplerError> {
        check_shape(self.shape(), x.shape())?;
        Ok(Zip::from(x)
            .and(&self.mean)
            .and(&self.variance)
            .map_collect(|&x, &m, &v| (m - x) / v))
    }

    fn lipschitz(&self) -> f64 {
        self.variance
            .iter()
            .fold(0.0, |acc: f64, &v| acc.max(1.0 / v))
    }
}

/// `log p(x) = ⟨c, x⟩`: a constant gradient field.
///
/// Improper, but every kernel step is still well defined, which makes it a
/// convenient probe for comparing kernels draw for draw.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTarget {
    pub slope: Array2<f64>,
}

impl LinearTarget {
    pub fn new(slope: Array2<f64>) -> Self {
        Self { slope }
    }
}

impl GradientTarget for LinearTarget {
    fn shape(&self) -> (usize, usize) {
        self.slope.dim()
    }

    fn log_prob(&self, x: &Array2<f64>) -> Result<f64, SamplerError> {
        check_shape(self.shape(), x.shape())?;
        Ok((&self.slope * x).sum())
    }

    fn grad_log_prob(&self, x: &Array2<f64>) -> Result<Array2<f64>, SamplerError> {
        check_shape(self.shape(), x.shape())?;
        Ok(self.slope.clone())
    }

    /// Any positive constant bounds a zero Hessian; `1` keeps step sizes on
    /// a natural scale.
    fn lipschitz(&self) -> f64 {
        1.0
    }
}
