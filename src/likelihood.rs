//! Gaussian data-fidelity term `f(x) = ‖A x − y‖² / (2σ²)`.

use ndarray::Array2;

use crate::error::{check_shape, SamplerError};
use crate::operator::LinearOperator;

/// Negative log-likelihood of a linear observation with additive white
/// Gaussian noise.
///
/// The observation `y`, the noise scale `σ` and the Lipschitz constant
/// `L_y = ‖AAᵗ‖₂ / σ²` of `∇f` are fixed at construction.
#[derive(Debug, Clone)]
pub struct GaussianLikelihood<A> {
    operator: A,
    observation: Array2<f64>,
    sigma: f64,
    lipschitz: f64,
}

impl<A: LinearOperator> GaussianLikelihood<A> {
    /// Creates the likelihood, checking that `observation` lies in the
    /// operator's output space and that `sigma` is positive.
    pub fn new(operator: A, observation: Array2<f64>, sigma: f64) -> Result<Self, SamplerError> {
        if !(sigma > 0.0 && sigma.is_finite()) {
            return Err(SamplerError::NonPositiveNoiseScale(sigma));
        }
        check_shape(operator.output_shape(), observation.shape())?;

        let lipschitz = operator.norm_squared() / (sigma * sigma);
        if !(lipschitz > 0.0 && lipschitz.is_finite()) {
            return Err(SamplerError::NonPositiveLipschitz(lipschitz));
        }
        log::debug!("likelihood: sigma = {sigma}, L_y = {lipschitz:.6e}");

        Ok(Self {
            operator,
            observation,
            sigma,
            lipschitz,
        })
    }

    pub fn operator(&self) -> &A {
        &self.operator
    }

    pub fn observation(&self) -> &Array2<f64> {
        &self.observation
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// `L_y = ‖AAᵗ‖₂ / σ²`.
    pub fn lipschitz(&self) -> f64 {
        self.lipschitz
    }

    pub fn shape(&self) -> (usize, usize) {
        self.operator.input_shape()
    }

    fn residual(&self, x: &Array2<f64>) -> Result<Array2<f64>, SamplerError> {
        check_shape(self.operator.input_shape(), x.shape())?;
        Ok(self.operator.apply(x) - &self.observation)
    }

    /// `f(x)`.
    pub fn value(&self, x: &Array2<f64>) -> Result<f64, SamplerError> {
        let r = self.residual(x)?;
        Ok(r.mapv(|v| v * v).sum() / (2.0 * self.sigma * self.sigma))
    }

    /// `∇f(x) = Aᵗ(A x − y) / σ²`.
    pub fn gradient(&self, x: &Array2<f64>) -> Result<Array2<f64>, SamplerError> {
        let r = self.residual(x)?;
        let inv_var = 1.0 / (self.sigma * self.sigma);
        Ok(self.operator.adjoint(&r) * inv_var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{CircularConvolution, Identity};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;

    #[test]
    fn identity_gradient_is_scaled_residual() {
        let y = array![[1.0, 2.0], [3.0, 4.0]];
        let lik = GaussianLikelihood::new(Identity::new((2, 2)), y.clone(), 0.5).unwrap();
        let x = Array2::<f64>::zeros((2, 2));
        assert_abs_diff_eq!(lik.gradient(&x).unwrap(), -&y * 4.0, epsilon = 1e-12);
        assert_relative_eq!(lik.value(&x).unwrap(), 30.0 / 0.5, epsilon = 1e-12);
        assert_relative_eq!(lik.lipschitz(), 4.0);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let op = CircularConvolution::uniform((5, 5), 3).unwrap();
        let y = Array2::from_shape_fn((5, 5), |(i, j)| (i as f64 * 0.3).sin() + j as f64 * 0.1);
        let lik = GaussianLikelihood::new(op, y, 0.2).unwrap();
        let x = Array2::from_shape_fn((5, 5), |(i, j)| ((i * 5 + j) as f64 * 0.7).cos());
        let grad = lik.gradient(&x).unwrap();

        let h = 1e-6;
        for &(i, j) in &[(0, 0), (2, 3), (4, 1)] {
            let mut xp = x.clone();
            xp[[i, j]] += h;
            let mut xm = x.clone();
            xm[[i, j]] -= h;
            let fd = (lik.value(&xp).unwrap() - lik.value(&xm).unwrap()) / (2.0 * h);
            assert_abs_diff_eq!(grad[[i, j]], fd, epsilon = 1e-4);
        }
    }

    #[test]
    fn rejects_bad_noise_scale() {
        let y = Array2::<f64>::zeros((3, 3));
        assert!(matches!(
            GaussianLikelihood::new(Identity::new((3, 3)), y.clone(), 0.0),
            Err(SamplerError::NonPositiveNoiseScale(_))
        ));
        assert!(matches!(
            GaussianLikelihood::new(Identity::new((3, 3)), y, -1.0),
            Err(SamplerError::NonPositiveNoiseScale(_))
        ));
    }

    #[test]
    fn rejects_inconsistent_shapes() {
        let y = Array2::<f64>::zeros((3, 3));
        assert!(matches!(
            GaussianLikelihood::new(Identity::new((4, 3)), y.clone(), 1.0),
            Err(SamplerError::ShapeMismatch { .. })
        ));

        let lik = GaussianLikelihood::new(Identity::new((3, 3)), y, 1.0).unwrap();
        assert!(lik.gradient(&Array2::zeros((2, 3))).is_err());
    }
}
