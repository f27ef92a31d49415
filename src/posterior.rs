//! Log-posterior oracle composed from a likelihood and a smoothed prior.

use ndarray::Array2;

use crate::error::SamplerError;
use crate::likelihood::GaussianLikelihood;
use crate::operator::LinearOperator;
use crate::prior::{MoreauYosida, ProximalOperator};

/// A target density over images that exposes its gradient.
///
/// Kernels only ever see this trait: they call [`GradientTarget::grad_log_prob`]
/// and size their steps from [`GradientTarget::lipschitz`].
pub trait GradientTarget {
    /// Shape of the images the density is defined on.
    fn shape(&self) -> (usize, usize);

    /// Log-density used for monitoring, up to an additive constant.
    fn log_prob(&self, x: &Array2<f64>) -> Result<f64, SamplerError>;

    /// Gradient of the (possibly smoothed) log-density driving the chain.
    fn grad_log_prob(&self, x: &Array2<f64>) -> Result<Array2<f64>, SamplerError>;

    /// Lipschitz constant of [`GradientTarget::grad_log_prob`].
    fn lipschitz(&self) -> f64;
}

/// `log p(x) = −f(x) − θ g(x)` with `f` a Gaussian likelihood and `g` a
/// nonsmooth penalty.
///
/// Sampling uses the smoothed gradient `−∇f(x) − ∇(θg)_λ(x)`; the reported
/// log-density uses the exact penalty, so monitoring tracks the true posterior
/// rather than its surrogate.
#[derive(Debug, Clone)]
pub struct Posterior<A, P> {
    likelihood: GaussianLikelihood<A>,
    prior: MoreauYosida<P>,
}

impl<A: LinearOperator, P: ProximalOperator> Posterior<A, P> {
    pub fn new(likelihood: GaussianLikelihood<A>, prior: MoreauYosida<P>) -> Self {
        Self { likelihood, prior }
    }

    pub fn likelihood(&self) -> &GaussianLikelihood<A> {
        &self.likelihood
    }

    pub fn prior(&self) -> &MoreauYosida<P> {
        &self.prior
    }
}

impl<A: LinearOperator, P: ProximalOperator> GradientTarget for Posterior<A, P> {
    fn shape(&self) -> (usize, usize) {
        self.likelihood.shape()
    }

    fn log_prob(&self, x: &Array2<f64>) -> Result<f64, SamplerError> {
        Ok(-self.likelihood.value(x)? - self.prior.penalty_value(x))
    }

    fn grad_log_prob(&self, x: &Array2<f64>) -> Result<Array2<f64>, SamplerError> {
        let mut grad = self.likelihood.gradient(x)?;
        grad += &self.prior.gradient(x)?;
        grad.mapv_inplace(|v| -v);
        Ok(grad)
    }

    /// `L = L_y + 1/λ`.
    fn lipschitz(&self) -> f64 {
        self.likelihood.lipschitz() + self.prior.lipschitz()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::Identity;
    use crate::prior::{ProxConfig, TotalVariation};
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn posterior(theta: f64) -> Posterior<Identity, TotalVariation> {
        let y = Array2::from_shape_fn((6, 6), |(i, j)| if i + j < 6 { 1.0 } else { 0.0 });
        let lik = GaussianLikelihood::new(Identity::new((6, 6)), y, 0.1).unwrap();
        let config = ProxConfig::from_fraction(0.99, lik.lipschitz(), 25).unwrap();
        let prior = MoreauYosida::new(TotalVariation::new(), theta, config).unwrap();
        Posterior::new(lik, prior)
    }

    #[test]
    fn lipschitz_adds_likelihood_and_envelope() {
        let post = posterior(5.0);
        assert_relative_eq!(post.lipschitz(), 100.0 + 100.0 / 0.99, max_relative = 1e-12);
    }

    #[test]
    fn gradient_vanishes_at_observation_without_prior() {
        let post = posterior(0.0);
        let y = post.likelihood().observation().clone();
        let grad = post.grad_log_prob(&y).unwrap();
        assert_abs_diff_eq!(grad, Array2::<f64>::zeros((6, 6)), epsilon = 1e-12);
        assert_abs_diff_eq!(post.log_prob(&y).unwrap(), 0.0);
    }

    #[test]
    fn log_prob_uses_exact_penalty() {
        let post = posterior(5.0);
        let y = post.likelihood().observation().clone();
        let expected = -5.0 * TotalVariation::new().value(&y);
        assert_relative_eq!(post.log_prob(&y).unwrap(), expected, max_relative = 1e-12);
    }

    #[test]
    fn gradient_combines_both_terms() {
        let post = posterior(5.0);
        let x = Array2::from_shape_fn((6, 6), |(i, j)| 0.1 * (i as f64) - 0.05 * (j as f64));
        let expected =
            -(post.likelihood().gradient(&x).unwrap() + post.prior().gradient(&x).unwrap());
        assert_abs_diff_eq!(post.grad_log_prob(&x).unwrap(), expected, epsilon = 1e-10);
    }
}
