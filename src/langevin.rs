//! Single-evaluation proximal Langevin kernel.
//!
//! One Euler-Maruyama step of the overdamped Langevin diffusion driven by the
//! smoothed log-posterior:
//!
//! ```text
//! X' = X + δ ∇log p(X) + √(2δ) Z,   Z ~ N(0, I)
//! ```
//!
//! The chain is stable for `δ < 2/L`. Its invariant measure carries an
//! `O(δ)` bias relative to the smoothed target, which is accepted rather than
//! corrected by a Metropolis step.

use ndarray::{Array2, Zip};
use rand::Rng;

use crate::core::{fill_standard_normal, Kernel};
use crate::error::SamplerError;
use crate::posterior::GradientTarget;

#[derive(Debug, Clone)]
pub struct ProximalLangevin {
    step_size: f64,
    noise: Array2<f64>,
}

impl ProximalLangevin {
    /// Creates the kernel with an explicit step size and no stability check.
    pub fn new(step_size: f64, shape: (usize, usize)) -> Result<Self, SamplerError> {
        if !(step_size > 0.0 && step_size.is_finite()) {
            return Err(SamplerError::NonPositiveStepSize(step_size));
        }
        Ok(Self {
            step_size,
            noise: Array2::zeros(shape),
        })
    }

    /// Creates the kernel for a target with Lipschitz constant `lipschitz`.
    ///
    /// `None` selects `δ = 1/L`. An explicit step must stay strictly below
    /// [`ProximalLangevin::stability_bound`].
    pub fn from_lipschitz(
        lipschitz: f64,
        step_size: Option<f64>,
        shape: (usize, usize),
    ) -> Result<Self, SamplerError> {
        if !(lipschitz > 0.0 && lipschitz.is_finite()) {
            return Err(SamplerError::NonPositiveLipschitz(lipschitz));
        }
        let bound = Self::stability_bound(lipschitz);
        let step_size = step_size.unwrap_or(1.0 / lipschitz);
        if step_size >= bound {
            return Err(SamplerError::StepSizeTooLarge { step_size, bound });
        }
        log::debug!("proximal Langevin: L = {lipschitz:.6e}, delta = {step_size:.6e}");
        Self::new(step_size, shape)
    }

    /// `2/L`.
    pub fn stability_bound(lipschitz: f64) -> f64 {
        2.0 / lipschitz
    }
}

impl Kernel for ProximalLangevin {
    fn name(&self) -> &'static str {
        "proximal Langevin"
    }

    fn step_size(&self) -> f64 {
        self.step_size
    }

    fn gradient_evaluations(&self) -> usize {
        1
    }

    fn transition<G, R>(
        &mut self,
        target: &G,
        state: &mut Array2<f64>,
        rng: &mut R,
    ) -> Result<(), SamplerError>
    where
        G: GradientTarget + ?Sized,
        R: Rng + ?Sized,
    {
        let grad = target.grad_log_prob(state)?;
        if self.noise.dim() != state.dim() {
            self.noise = Array2::zeros(state.dim());
        }
        fill_standard_normal(&mut self.noise, rng);

        let delta = self.step_size;
        let scale = (2.0 * delta).sqrt();
        Zip::from(state)
            .and(&grad)
            .and(&self.noise)
            .for_each(|x, &g, &z| *x += delta * g + scale * z);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::DiagonalGaussian;
    use approx::assert_relative_eq;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn quadratic() -> DiagonalGaussian {
        DiagonalGaussian::isotropic(Array2::zeros((4, 4)), 1.0)
    }

    #[test]
    fn default_step_is_inverse_lipschitz() {
        let k = ProximalLangevin::from_lipschitz(8.0, None, (4, 4)).unwrap();
        assert_relative_eq!(k.step_size(), 0.125);
    }

    #[test]
    fn rejects_step_at_stability_bound() {
        assert!(matches!(
            ProximalLangevin::from_lipschitz(1.0, Some(2.0), (4, 4)),
            Err(SamplerError::StepSizeTooLarge { .. })
        ));
        assert!(matches!(
            ProximalLangevin::new(0.0, (4, 4)),
            Err(SamplerError::NonPositiveStepSize(_))
        ));
    }

    #[test]
    fn zero_noise_limit_is_gradient_ascent() {
        // With a huge gradient and tiny step the noise term is negligible.
        let target = DiagonalGaussian::isotropic(Array2::from_elem((2, 2), 1e12), 1.0);
        let mut k = ProximalLangevin::new(1e-16, (2, 2)).unwrap();
        let mut x = Array2::<f64>::zeros((2, 2));
        k.transition(&target, &mut x, &mut SmallRng::seed_from_u64(0))
            .unwrap();
        for &v in x.iter() {
            assert_relative_eq!(v, 1e-4, max_relative = 1e-2);
        }
    }

    #[test]
    fn step_below_bound_stays_bounded() {
        let target = quadratic();
        let mut k = ProximalLangevin::new(1.9 / target.lipschitz(), (4, 4)).unwrap();
        let mut x = Array2::from_elem((4, 4), 5.0);
        let mut rng = SmallRng::seed_from_u64(11);
        for _ in 0..5_000 {
            k.transition(&target, &mut x, &mut rng).unwrap();
            assert!(x.iter().all(|v| v.abs() < 100.0));
        }
    }

    #[test]
    fn step_above_bound_diverges() {
        let target = quadratic();
        let mut k = ProximalLangevin::new(2.5 / target.lipschitz(), (4, 4)).unwrap();
        let mut x = Array2::from_elem((4, 4), 1.0);
        let mut rng = SmallRng::seed_from_u64(12);
        let mut diverged = false;
        for _ in 0..5_000 {
            k.transition(&target, &mut x, &mut rng).unwrap();
            if x.iter().any(|v| !v.is_finite()) {
                diverged = true;
                break;
            }
        }
        assert!(diverged, "state stayed finite: {x:?}");
    }
}
