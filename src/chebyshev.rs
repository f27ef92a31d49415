//! Chebyshev-accelerated multistage Langevin kernel.
//!
//! Each transition runs an `s`-stage second-kind stochastic Runge-Kutta
//! recursion whose coefficients come from Chebyshev polynomials of the first
//! kind. Spending `s` gradient evaluations buys a stability interval of length
//! `ℓ_s ≈ 2s²` along the negative real axis, against `2` for the
//! single-evaluation kernel, so the admissible step `δ = α ℓ_s / L` grows
//! quadratically with the stage count.
//!
//! With `Q = √(2δ) Z` drawn once per transition:
//!
//! ```text
//! K_0 = X
//! K_1 = X + μ_1 δ ∇log p(X + ν_1 Q) + κ_1 Q
//! K_j = μ_j δ ∇log p(K_{j-1}) + ν_j K_{j-1} + κ_j K_{j-2},   j = 2..s
//! X'  = K_s
//! ```

use ndarray::{Array2, Zip};
use rand::Rng;

use crate::core::{fill_standard_normal, Kernel};
use crate::error::SamplerError;
use crate::posterior::GradientTarget;

/// `T_j(x)` by the three-term recurrence `T_{j+1} = 2x T_j − T_{j-1}`.
pub fn chebyshev_t(j: usize, x: f64) -> f64 {
    let (mut prev, mut curr) = (1.0, x);
    if j == 0 {
        return prev;
    }
    for _ in 1..j {
        let next = 2.0 * x * curr - prev;
        prev = curr;
        curr = next;
    }
    curr
}

/// `(ω₀, ω₁)` for `s` stages and damping `η`, with `ω₀ = 1 + η/s²` and
/// `ω₁ = T_s(ω₀) / T_s'(ω₀)`.
///
/// Both are evaluated through `T_s(x) = cosh(s·arccosh x)`, which requires
/// `ω₀ > 1`, i.e. `η > 0`.
pub fn recursion_weights(stages: usize, damping: f64) -> (f64, f64) {
    let s = stages as f64;
    let omega0 = 1.0 + damping / (s * s);
    let theta = omega0.acosh();
    let t_s = (s * theta).cosh();
    let dt_s = s * (s * theta).sinh() / (omega0 * omega0 - 1.0).sqrt();
    (omega0, t_s / dt_s)
}

/// Length `ℓ_s` of the stability interval `[−ℓ_s, 0]`.
///
/// Uses `(s − 0.5)²(2 − 4η/3) − 1.5` for `s ≥ 2`. That approximation is
/// negative for a single stage, where the exact interval of the one-stage
/// recursion, `(1 + ω₀)/ω₁`, is used instead.
pub fn stiffness_ratio(stages: usize, damping: f64) -> f64 {
    if stages >= 2 {
        let s = stages as f64;
        (s - 0.5).powi(2) * (2.0 - 4.0 * damping / 3.0) - 1.5
    } else {
        let (omega0, omega1) = recursion_weights(stages, damping);
        (1.0 + omega0) / omega1
    }
}

/// Per-stage coefficients `(μ_j, ν_j, κ_j)`, index 0 holding stage 1.
fn stage_coefficients(stages: usize, omega0: f64, omega1: f64) -> Vec<(f64, f64, f64)> {
    let s = stages as f64;
    let mut coefficients = Vec::with_capacity(stages);
    coefficients.push((omega1 / omega0, s * omega1 / 2.0, s * omega1 / omega0));
    for j in 2..=stages {
        let ratio = chebyshev_t(j - 1, omega0) / chebyshev_t(j, omega0);
        let mu = 2.0 * omega1 * ratio;
        let nu = 2.0 * omega0 * ratio;
        coefficients.push((mu, nu, 1.0 - nu));
    }
    coefficients
}

#[derive(Debug, Clone)]
pub struct ChebyshevKernel {
    stages: usize,
    damping: f64,
    step_fraction: f64,
    step_size: f64,
    stiffness: f64,
    omega: (f64, f64),
    coefficients: Vec<(f64, f64, f64)>,
    noise: Array2<f64>,
}

impl ChebyshevKernel {
    /// Validates `s ≥ 1`, `η ∈ (0, 1)` and `α ∈ (0, 1)`, then fixes the
    /// step size `δ = α ℓ_s / L` and precomputes every stage coefficient.
    pub fn new(
        stages: usize,
        damping: f64,
        step_fraction: f64,
        lipschitz: f64,
        shape: (usize, usize),
    ) -> Result<Self, SamplerError> {
        if stages < 1 {
            return Err(SamplerError::InvalidStageCount(stages));
        }
        if !(damping > 0.0 && damping < 1.0) {
            return Err(SamplerError::DampingOutOfRange(damping));
        }
        if !(step_fraction > 0.0 && step_fraction < 1.0) {
            return Err(SamplerError::InvalidStepFraction(step_fraction));
        }
        if !(lipschitz > 0.0 && lipschitz.is_finite()) {
            return Err(SamplerError::NonPositiveLipschitz(lipschitz));
        }

        let omega = recursion_weights(stages, damping);
        let stiffness = stiffness_ratio(stages, damping);
        let step_size = step_fraction * stiffness / lipschitz;
        log::debug!(
            "Chebyshev kernel: s = {stages}, eta = {damping}, l_s = {stiffness:.4}, \
             L = {lipschitz:.6e}, delta = {step_size:.6e}"
        );

        Ok(Self {
            stages,
            damping,
            step_fraction,
            step_size,
            stiffness,
            omega,
            coefficients: stage_coefficients(stages, omega.0, omega.1),
            noise: Array2::zeros(shape),
        })
    }

    pub fn stages(&self) -> usize {
        self.stages
    }

    pub fn damping(&self) -> f64 {
        self.damping
    }

    pub fn step_fraction(&self) -> f64 {
        self.step_fraction
    }

    /// `ℓ_s`.
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// `(ω₀, ω₁)`.
    pub fn omega(&self) -> (f64, f64) {
        self.omega
    }

    /// `(μ_j, ν_j, κ_j)` for `j = 1..=s`.
    pub fn coefficients(&self) -> &[(f64, f64, f64)] {
        &self.coefficients
    }
}

impl Kernel for ChebyshevKernel {
    fn name(&self) -> &'static str {
        "Chebyshev"
    }

    fn step_size(&self) -> f64 {
        self.step_size
    }

    fn gradient_evaluations(&self) -> usize {
        self.stages
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
        let delta = self.step_size;
        if self.noise.dim() != state.dim() {
            self.noise = Array2::zeros(state.dim());
        }
        fill_standard_normal(&mut self.noise, rng);
        self.noise.mapv_inplace(|z| (2.0 * delta).sqrt() * z);

        let (mu1, nu1, kappa1) = self.coefficients[0];
        let mut shifted = state.clone();
        shifted.scaled_add(nu1, &self.noise);
        let grad = target.grad_log_prob(&shifted)?;

        // `shifted` is reused as the K_{j-2} buffer from here on.
        let mut prev2 = shifted;
        prev2.assign(state);
        let mut prev = state.clone();
        Zip::from(&mut prev)
            .and(&grad)
            .and(&self.noise)
            .for_each(|k, &g, &q| *k += mu1 * delta * g + kappa1 * q);

        for &(mu, nu, kappa) in &self.coefficients[1..] {
            let grad = target.grad_log_prob(&prev)?;
            Zip::from(&mut prev2)
                .and(&prev)
                .and(&grad)
                .for_each(|k2, &k1, &g| *k2 = mu * delta * g + nu * k1 + kappa * *k2);
            std::mem::swap(&mut prev, &mut prev2);
        }

        state.assign(&prev);
        Ok(())
    }
}
