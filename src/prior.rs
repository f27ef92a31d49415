//! Nonsmooth convex priors and their Moreau-Yosida smoothing.
//!
//! A penalty `g` only needs a value and a proximal operator. The sampler never
//! differentiates `g` directly; it uses the envelope gradient
//! `∇(θg)_λ(x) = (x − prox_{θλ g}(x)) / λ`, which is `1/λ`-Lipschitz whatever
//! the smoothness of `g`.

use ndarray::{s, Array2, Zip};

use crate::error::SamplerError;

/// A proper convex penalty with a (possibly inexact) proximal operator.
pub trait ProximalOperator {
    /// The penalty `g(x)`.
    fn value(&self, x: &Array2<f64>) -> f64;

    /// `prox_{γ g}(x) = argmin_u g(u) + ‖u − x‖² / (2γ)`, computed with a
    /// budget of `iterations` solver steps.
    fn prox(
        &self,
        x: &Array2<f64>,
        gamma: f64,
        iterations: usize,
    ) -> Result<Array2<f64>, SamplerError>;
}

/// Settings of the inner proximal solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxConfig {
    /// Moreau-Yosida smoothing scale `λ`.
    pub smoothing_scale: f64,
    /// Number of proximal solver iterations per gradient evaluation.
    pub inner_iterations: usize,
}

impl ProxConfig {
    pub fn new(smoothing_scale: f64, inner_iterations: usize) -> Result<Self, SamplerError> {
        let config = Self {
            smoothing_scale,
            inner_iterations,
        };
        config.validate()?;
        Ok(config)
    }

    /// Couples the smoothing scale to the likelihood's conditioning:
    /// `λ = α / L_y` with `α ∈ (0, 1)`.
    pub fn from_fraction(
        alpha: f64,
        lipschitz_y: f64,
        inner_iterations: usize,
    ) -> Result<Self, SamplerError> {
        if !(alpha > 0.0 && alpha < 1.0) {
            return Err(SamplerError::InvalidSmoothingFraction(alpha));
        }
        if !(lipschitz_y > 0.0 && lipschitz_y.is_finite()) {
            return Err(SamplerError::NonPositiveLipschitz(lipschitz_y));
        }
        Self::new(alpha / lipschitz_y, inner_iterations)
    }

    pub fn validate(&self) -> Result<(), SamplerError> {
        if !(self.smoothing_scale > 0.0 && self.smoothing_scale.is_finite()) {
            return Err(SamplerError::NonPositiveSmoothingScale(self.smoothing_scale));
        }
        if self.inner_iterations == 0 {
            return Err(SamplerError::ZeroInnerIterations);
        }
        Ok(())
    }
}

/// Isotropic total variation with forward differences and Neumann boundary.
///
/// The proximal operator runs Chambolle's dual projection iteration from a
/// zero dual variable for exactly the requested number of steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TotalVariation {
    /// Dual step size of the projection iteration.
    pub tau: f64,
}

impl Default for TotalVariation {
    fn default() -> Self {
        Self { tau: 0.249 }
    }
}

impl TotalVariation {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Forward differences along rows and columns, zero on the last row/column.
pub fn gradient(x: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let mut dx = Array2::<f64>::zeros(x.dim());
    let mut dy = Array2::<f64>::zeros(x.dim());
    if x.nrows() > 1 {
        dx.slice_mut(s![..-1, ..])
            .assign(&(&x.slice(s![1.., ..]) - &x.slice(s![..-1, ..])));
    }
    if x.ncols() > 1 {
        dy.slice_mut(s![.., ..-1])
            .assign(&(&x.slice(s![.., 1..]) - &x.slice(s![.., ..-1])));
    }
    (dx, dy)
}

/// Negative adjoint of [`gradient`].
pub fn divergence(px: &Array2<f64>, py: &Array2<f64>) -> Array2<f64> {
    let mut div = Array2::<f64>::zeros(px.dim());
    if px.nrows() > 1 {
        div.slice_mut(s![..-1, ..])
            .zip_mut_with(&px.slice(s![..-1, ..]), |d, &p| *d += p);
        div.slice_mut(s![1.., ..])
            .zip_mut_with(&px.slice(s![..-1, ..]), |d, &p| *d -= p);
    }
    if py.ncols() > 1 {
        div.slice_mut(s![.., ..-1])
            .zip_mut_with(&py.slice(s![.., ..-1]), |d, &p| *d += p);
        div.slice_mut(s![.., 1..])
            .zip_mut_with(&py.slice(s![.., ..-1]), |d, &p| *d -= p);
    }
    div
}

impl ProximalOperator for TotalVariation {
    fn value(&self, x: &Array2<f64>) -> f64 {
        let (dx, dy) = gradient(x);
        Zip::from(&dx)
            .and(&dy)
            .fold(0.0, |acc, &a, &b| acc + (a * a + b * b).sqrt())
    }

    fn prox(
        &self,
        x: &Array2<f64>,
        gamma: f64,
        iterations: usize,
    ) -> Result<Array2<f64>, SamplerError> {
        if gamma.is_nan() || gamma < 0.0 {
            return Err(SamplerError::Proximal(format!(
                "TV prox needs a non-negative scale, got {gamma}"
            )));
        }
        if gamma == 0.0 {
            return Ok(x.clone());
        }

        let tau = self.tau;
        let scaled = x / gamma;
        let mut px = Array2::<f64>::zeros(x.dim());
        let mut py = Array2::<f64>::zeros(x.dim());
        for _ in 0..iterations {
            let (gx, gy) = gradient(&(divergence(&px, &py) - &scaled));
            Zip::from(&mut px)
                .and(&mut py)
                .and(&gx)
                .and(&gy)
                .for_each(|px, py, &gx, &gy| {
                    let denom = 1.0 + tau * (gx * gx + gy * gy).sqrt();
                    *px = (*px + tau * gx) / denom;
                    *py = (*py + tau * gy) / denom;
                });
        }

        Ok(x - &(divergence(&px, &py) * gamma))
    }
}

/// Moreau-Yosida envelope of the weighted penalty `θ·g`.
#[derive(Debug, Clone)]
pub struct MoreauYosida<P> {
    penalty: P,
    theta: f64,
    config: ProxConfig,
}

impl<P: ProximalOperator> MoreauYosida<P> {
    /// `theta = 0` switches the prior off.
    pub fn new(penalty: P, theta: f64, config: ProxConfig) -> Result<Self, SamplerError> {
        if !(theta >= 0.0 && theta.is_finite()) {
            return Err(SamplerError::NegativePriorWeight(theta));
        }
        config.validate()?;
        log::debug!(
            "Moreau-Yosida envelope: theta = {theta}, lambda = {:.6e}, {} inner iterations",
            config.smoothing_scale,
            config.inner_iterations
        );
        Ok(Self {
            penalty,
            theta,
            config,
        })
    }

    pub fn penalty(&self) -> &P {
        &self.penalty
    }

    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn config(&self) -> &ProxConfig {
        &self.config
    }

    /// `L = 1/λ`.
    pub fn lipschitz(&self) -> f64 {
        1.0 / self.config.smoothing_scale
    }

    fn prox(&self, x: &Array2<f64>) -> Result<Array2<f64>, SamplerError> {
        let lambda = self.config.smoothing_scale;
        self.penalty
            .prox(x, self.theta * lambda, self.config.inner_iterations)
    }

    /// `(x − prox_{θλ g}(x)) / λ`.
    pub fn gradient(&self, x: &Array2<f64>) -> Result<Array2<f64>, SamplerError> {
        let p = self.prox(x)?;
        Ok((x - &p) / self.config.smoothing_scale)
    }

    /// The unsmoothed weighted penalty `θ·g(x)`.
    pub fn penalty_value(&self, x: &Array2<f64>) -> f64 {
        if self.theta == 0.0 {
            return 0.0;
        }
        self.theta * self.penalty.value(x)
    }

    /// The envelope `θ g(p) + ‖x − p‖² / (2λ)` at `p = prox_{θλ g}(x)`.
    pub fn envelope_value(&self, x: &Array2<f64>) -> Result<f64, SamplerError> {
        let p = self.prox(x)?;
        let dist = (x - &p).mapv(|v| v * v).sum();
        Ok(self.penalty_value(&p) + dist / (2.0 * self.config.smoothing_scale))
    }
}
