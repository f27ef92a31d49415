//! The sampling driver: burn-in, streaming moments, thinning and monitoring.
//!
//! A [`Sampler`] advances a single chain sequentially. After `burnin`
//! discarded iterations it collects `n_iterations` more, feeding each state
//! to a spatial [`RunningMoments`], its Fourier magnitude to a second
//! accumulator, and every `thinning_step`-th state to a [`TraceBuffer`].
//!
//! # Example
//!
//! ```rust
//! use ndarray::Array2;
//! use prox_mcmc::core::KernelConfig;
//! use prox_mcmc::distributions::DiagonalGaussian;
//! use prox_mcmc::sampler::{Burnin, Sampler, SamplerConfig};
//!
//! let target = DiagonalGaussian::isotropic(Array2::zeros((4, 4)), 1.0);
//! let config = SamplerConfig::default()
//!     .set_kernel(KernelConfig::chebyshev(5))
//!     .set_n_iterations(200)
//!     .set_burnin(Burnin::Count(20))
//!     .set_n_samples(20)
//!     .set_seed(42);
//! let mut sampler = Sampler::new(target, config, Array2::zeros((4, 4))).unwrap();
//! let out = sampler.run().unwrap();
//! assert_eq!(out.trace.dim(), (20, 4, 4));
//! assert_eq!(out.thinning_step, 10);
//! ```

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, Array3};
use rand::rngs::SmallRng;
use rand::{thread_rng, Rng, SeedableRng};

use crate::core::{Kernel, KernelConfig, SamplingKernel};
use crate::diagnostics::{DiagnosticsReport, DEFAULT_MAX_LAG};
use crate::error::{check_shape, SamplerError};
use crate::fft::Fft2;
use crate::posterior::GradientTarget;
use crate::quality;
use crate::stats::RunningMoments;
use crate::trace::{thinning_step, TraceBuffer};

/// Length of the discarded warm-up phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Burnin {
    /// A fixed number of iterations.
    Count(usize),
    /// A fraction in `[0, 1)` of the collected iterations, rounded.
    Fraction(f64),
}

impl Burnin {
    /// Resolves to an iteration count that must be shorter than
    /// `n_iterations`.
    pub fn resolve(&self, n_iterations: usize) -> Result<usize, SamplerError> {
        let burnin = match *self {
            Burnin::Count(n) => n,
            Burnin::Fraction(f) => {
                if !(0.0..1.0).contains(&f) {
                    return Err(SamplerError::InvalidBurninFraction(f));
                }
                (f * n_iterations as f64).round() as usize
            }
        };
        if burnin >= n_iterations {
            return Err(SamplerError::BurninTooLong {
                burnin,
                total: n_iterations,
            });
        }
        Ok(burnin)
    }
}

/// Run configuration, validated once by [`Sampler::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    pub kernel: KernelConfig,
    /// Iterations collected after burn-in.
    pub n_iterations: usize,
    pub burnin: Burnin,
    /// Target length of the thinned trace.
    pub n_samples: usize,
    /// Collected iterations between quality evaluations; `0` disables them.
    pub quality_interval: usize,
    pub seed: Option<u64>,
    pub time_budget: Option<Duration>,
    pub max_lag: Option<usize>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            kernel: KernelConfig::langevin(),
            n_iterations: 1000,
            burnin: Burnin::Fraction(0.05),
            n_samples: 100,
            quality_interval: 10,
            seed: None,
            time_budget: None,
            max_lag: None,
        }
    }
}

impl SamplerConfig {
    pub fn set_kernel(mut self, kernel: KernelConfig) -> Self {
        self.kernel = kernel;
        self
    }

    pub fn set_n_iterations(mut self, n_iterations: usize) -> Self {
        self.n_iterations = n_iterations;
        self
    }

    pub fn set_burnin(mut self, burnin: Burnin) -> Self {
        self.burnin = burnin;
        self
    }

    pub fn set_n_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    pub fn set_quality_interval(mut self, quality_interval: usize) -> Self {
        self.quality_interval = quality_interval;
        self
    }

    /// Fixes the random source so that a run can be replayed exactly.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Stops the run between iterations once `budget` has elapsed.
    pub fn set_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn set_max_lag(mut self, max_lag: usize) -> Self {
        self.max_lag = Some(max_lag);
        self
    }
}

/// Reconstruction quality of the running posterior mean, sampled every
/// `quality_interval` collected iterations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QualitySeries {
    /// Collected-iteration index (1-based) of each evaluation.
    pub iterations: Vec<usize>,
    pub relative_error: Vec<f64>,
    pub psnr: Vec<f64>,
    pub ssim: Vec<f64>,
}

impl QualitySeries {
    fn with_capacity(n: usize) -> Self {
        Self {
            iterations: Vec::with_capacity(n),
            relative_error: Vec::with_capacity(n),
            psnr: Vec::with_capacity(n),
            ssim: Vec::with_capacity(n),
        }
    }

    fn record(
        &mut self,
        k: usize,
        estimate: &Array2<f64>,
        truth: &Array2<f64>,
    ) -> Result<(), SamplerError> {
        self.iterations.push(k);
        self.relative_error.push(quality::relative_error(estimate, truth)?);
        self.psnr.push(quality::psnr(estimate, truth)?);
        self.ssim.push(quality::ssim(estimate, truth)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.iterations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty()
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct SamplerOutput {
    pub mean: Array2<f64>,
    pub variance: Array2<f64>,
    /// Mean of `|FFT2(X)|` over the collected iterations.
    pub transform_mean: Array2<f64>,
    pub transform_variance: Array2<f64>,
    /// Thinned snapshots, `(len, rows, cols)`.
    pub trace: Array3<f64>,
    /// `log p(X)` after every iteration, burn-in included.
    pub log_posterior: Vec<f64>,
    /// Present when a ground truth was set.
    pub quality: Option<QualitySeries>,
    pub kernel: &'static str,
    pub step_size: f64,
    pub burnin: usize,
    pub thinning_step: usize,
    /// Iterations actually run, burn-in included.
    pub completed_iterations: usize,
    /// Iterations that fed the accumulators.
    pub collected_iterations: usize,
    pub gradient_evaluations: usize,
    pub elapsed: Duration,
    pub diagnostics: DiagnosticsReport,
}

/// A single chain over a [`GradientTarget`].
#[derive(Debug)]
pub struct Sampler<G> {
    target: G,
    config: SamplerConfig,
    kernel: SamplingKernel,
    state: Array2<f64>,
    rng: SmallRng,
    burnin: usize,
    thinning_step: usize,
    fft: Fft2,
    ground_truth: Option<Array2<f64>>,
}

impl<G: GradientTarget> Sampler<G> {
    /// Validates `config` against `target` and builds the kernel. The chain
    /// starts from `initial_state`, typically the observation.
    pub fn new(
        target: G,
        config: SamplerConfig,
        initial_state: Array2<f64>,
    ) -> Result<Self, SamplerError> {
        let shape = target.shape();
        check_shape(shape, initial_state.shape())?;
        if config.n_iterations == 0 {
            return Err(SamplerError::ZeroIterations);
        }
        let burnin = config.burnin.resolve(config.n_iterations)?;
        let thinning_step = thinning_step(config.n_iterations, config.n_samples)?;
        let kernel = config.kernel.build(target.lipschitz(), shape)?;

        let seed = config.seed.unwrap_or_else(|| thread_rng().gen::<u64>());
        log::debug!(
            "sampler: shape = {shape:?}, burn-in = {burnin}, thinning step = {thinning_step}, seed = {seed}"
        );

        Ok(Self {
            target,
            config,
            kernel,
            state: initial_state,
            rng: SmallRng::seed_from_u64(seed),
            burnin,
            thinning_step,
            fft: Fft2::new(shape),
            ground_truth: None,
        })
    }

    /// Enables quality monitoring against `truth`.
    pub fn set_ground_truth(&mut self, truth: Array2<f64>) -> Result<(), SamplerError> {
        check_shape(self.target.shape(), truth.shape())?;
        self.ground_truth = Some(truth);
        Ok(())
    }

    pub fn target(&self) -> &G {
        &self.target
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    pub fn kernel(&self) -> &SamplingKernel {
        &self.kernel
    }

    /// The current chain state.
    pub fn state(&self) -> &Array2<f64> {
        &self.state
    }

    pub fn burnin(&self) -> usize {
        self.burnin
    }

    pub fn thinning_step(&self) -> usize {
        self.thinning_step
    }

    /// Runs `burnin + n_iterations` transitions from the current state.
    pub fn run(&mut self) -> Result<SamplerOutput, SamplerError> {
        self.run_inner(None)
    }

    /// Same as [`Sampler::run`], drawing a progress bar that shows the
    /// current log-posterior and, with a ground truth, the latest PSNR.
    pub fn run_progress(&mut self) -> Result<SamplerOutput, SamplerError> {
        let total = self.burnin + self.config.n_iterations;
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:8} {bar:40.white} ETA {eta:3} | {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        pb.set_prefix(self.kernel.name());
        let out = self.run_inner(Some(&pb));
        match &out {
            Ok(_) => pb.finish_with_message("Done!"),
            Err(_) => pb.abandon_with_message("Failed"),
        }
        out
    }

    fn run_inner(&mut self, pb: Option<&ProgressBar>) -> Result<SamplerOutput, SamplerError> {
        let shape = self.target.shape();
        let n_iterations = self.config.n_iterations;
        let total = self.burnin + n_iterations;
        let step_size = self.kernel.step_size();

        let mut spatial = RunningMoments::<f64>::new(shape);
        let mut transform = RunningMoments::<f64>::new(shape);
        let mut trace = TraceBuffer::new(n_iterations, self.config.n_samples, shape)?;
        let mut log_posterior = Vec::with_capacity(total);
        let interval = self.config.quality_interval;
        let mut quality = match &self.ground_truth {
            Some(_) if interval > 0 => Some(QualitySeries::with_capacity(n_iterations / interval)),
            _ => None,
        };

        log::info!(
            "{} kernel: {} iterations ({} burn-in), delta = {:.4e}, {} gradient evaluations per step",
            self.kernel.name(),
            total,
            self.burnin,
            step_size,
            self.kernel.gradient_evaluations()
        );

        let start = Instant::now();
        let mut completed = 0;
        for it in 0..total {
            if let Some(budget) = self.config.time_budget {
                if start.elapsed() >= budget {
                    log::warn!(
                        "time budget of {budget:?} exhausted after {completed} of {total} iterations"
                    );
                    break;
                }
            }

            self.kernel
                .transition(&self.target, &mut self.state, &mut self.rng)?;
            if self.state.iter().any(|v| !v.is_finite()) {
                log::error!(
                    "non-finite state after iteration {it}; the step size {step_size:.4e} is likely too large"
                );
                return Err(SamplerError::NonFiniteState {
                    iteration: it,
                    step_size,
                    kernel: self.kernel.name(),
                });
            }
            let lp = self.target.log_prob(&self.state)?;
            log_posterior.push(lp);
            completed = it + 1;

            if it >= self.burnin {
                let k = it + 1 - self.burnin;
                spatial.update(&self.state)?;
                transform.update(&self.fft.magnitude(&self.state))?;
                trace.offer(k, &self.state)?;
                if let (Some(series), Some(truth)) = (quality.as_mut(), &self.ground_truth) {
                    if k % interval == 0 {
                        series.record(k, spatial.mean(), truth)?;
                    }
                }
            }

            if let Some(pb) = pb {
                pb.inc(1);
                match quality.as_ref().and_then(|q| q.psnr.last()) {
                    Some(psnr) => pb.set_message(format!("log p≈{lp:.4e} psnr≈{psnr:.2}")),
                    None => pb.set_message(format!("log p≈{lp:.4e}")),
                }
            }
        }
        let elapsed = start.elapsed();
        let collected = completed.saturating_sub(self.burnin);
        log::info!(
            "{} kernel: {completed} iterations in {elapsed:.2?}, {} snapshots retained",
            self.kernel.name(),
            trace.len()
        );

        let variance = spatial.variance();
        let max_lag = self.config.max_lag.unwrap_or(DEFAULT_MAX_LAG);
        let diagnostics = DiagnosticsReport::compute(trace.samples(), &variance, max_lag);

        Ok(SamplerOutput {
            mean: spatial.mean().clone(),
            variance,
            transform_mean: transform.mean().clone(),
            transform_variance: transform.variance(),
            trace: trace.into_samples(),
            log_posterior,
            quality,
            kernel: self.kernel.name(),
            step_size,
            burnin: self.burnin,
            thinning_step: self.thinning_step,
            completed_iterations: completed,
            collected_iterations: collected,
            gradient_evaluations: completed * self.kernel.gradient_evaluations(),
            elapsed,
            diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::DiagonalGaussian;

    fn target() -> DiagonalGaussian {
        DiagonalGaussian::isotropic(Array2::zeros((3, 3)), 1.0)
    }

    fn config() -> SamplerConfig {
        SamplerConfig::default()
            .set_n_iterations(1000)
            .set_burnin(Burnin::Count(50))
            .set_n_samples(50)
            .set_seed(1)
    }

    #[test]
    fn burnin_resolution() {
        assert_eq!(Burnin::Fraction(0.05).resolve(1000).unwrap(), 50);
        assert_eq!(Burnin::Count(0).resolve(10).unwrap(), 0);
        assert!(matches!(
            Burnin::Count(10).resolve(10),
            Err(SamplerError::BurninTooLong { burnin: 10, total: 10 })
        ));
        assert!(matches!(
            Burnin::Fraction(1.0).resolve(10),
            Err(SamplerError::InvalidBurninFraction(_))
        ));
    }

    #[test]
    fn run_lengths_and_thinning() {
        let mut sampler = Sampler::new(target(), config(), Array2::zeros((3, 3))).unwrap();
        assert_eq!(sampler.thinning_step(), 20);
        let out = sampler.run().unwrap();
        assert_eq!(out.completed_iterations, 1050);
        assert_eq!(out.collected_iterations, 1000);
        assert_eq!(out.log_posterior.len(), 1050);
        assert_eq!(out.trace.dim(), (50, 3, 3));
        assert_eq!(out.gradient_evaluations, 1050);
        assert!(out.quality.is_none());
        assert_eq!(out.diagnostics.pixels.len(), 3);
    }

    #[test]
    fn seeded_runs_replay_exactly() {
        let run = |seed| {
            let mut s =
                Sampler::new(target(), config().set_seed(seed), Array2::zeros((3, 3))).unwrap();
            s.run().unwrap()
        };
        let (a, b, c) = (run(7), run(7), run(8));
        assert_eq!(a.trace, b.trace);
        assert_eq!(a.log_posterior, b.log_posterior);
        assert_ne!(a.trace, c.trace);
    }

    #[test]
    fn quality_series_follow_interval() {
        let mut sampler = Sampler::new(
            target(),
            config().set_quality_interval(100),
            Array2::zeros((3, 3)),
        )
        .unwrap();
        sampler.set_ground_truth(Array2::zeros((3, 3))).unwrap();
        let q = sampler.run().unwrap().quality.unwrap();
        assert_eq!(q.iterations, (1..=10).map(|k| k * 100).collect::<Vec<_>>());
        assert_eq!(q.psnr.len(), 10);
        assert!(sampler.set_ground_truth(Array2::zeros((2, 2))).is_err());
    }

    #[test]
    fn zero_time_budget_stops_immediately() {
        let mut sampler = Sampler::new(
            target(),
            config().set_time_budget(Duration::ZERO),
            Array2::zeros((3, 3)),
        )
        .unwrap();
        let out = sampler.run().unwrap();
        assert_eq!(out.completed_iterations, 0);
        assert_eq!(out.trace.dim(), (0, 3, 3));
        assert!(out.diagnostics.pixels.iter().all(|p| p.ess == 0.0));
    }

    #[test]
    fn invalid_configurations_fail_before_running() {
        let init = || Array2::zeros((3, 3));
        assert!(matches!(
            Sampler::new(target(), config().set_n_iterations(0), init()),
            Err(SamplerError::ZeroIterations)
        ));
        assert!(matches!(
            Sampler::new(target(), config().set_n_samples(2000), init()),
            Err(SamplerError::ZeroThinning { .. })
        ));
        assert!(matches!(
            Sampler::new(target(), config().set_burnin(Burnin::Count(1000)), init()),
            Err(SamplerError::BurninTooLong { .. })
        ));
        assert!(matches!(
            Sampler::new(target(), config(), Array2::zeros((2, 3))),
            Err(SamplerError::ShapeMismatch { .. })
        ));
    }
}
