//! Post-hoc convergence diagnostics over a thinned trace.
//!
//! Nothing here feeds back into the chain. The autocorrelation of a scalar
//! series is computed with a zero-padded FFT, and the effective sample size
//! follows from its initial positive sequence:
//!
//! ```text
//! ESS = n / (1 + 2 Σ_{k=1}^{K} ρ_k)
//! ```
//!
//! where `K` is the last lag before the first non-positive `ρ_k` (or the
//! maximum lag).

use std::fmt::{self, Write as _};

use ndarray::{Array2, ArrayView1, ArrayView3};
use ndarray_stats::QuantileExt;
use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::trace::pixel_columns;

/// Lag cap used when none is configured.
pub const DEFAULT_MAX_LAG: usize = 100;

/// Normalised autocorrelation `ρ_0 = 1, ρ_1, ..., ρ_m` of `series`, with
/// `m = min(max_lag, n − 1)`.
///
/// Uses the biased lag covariance `(1/n) Σ_t (x_t − x̄)(x_{t+k} − x̄)`. A
/// constant series is reported as perfectly correlated at every lag.
pub fn autocorrelation(series: ArrayView1<'_, f64>, max_lag: usize) -> Vec<f64> {
    let n = series.len();
    if n == 0 {
        return Vec::new();
    }
    let max_lag = max_lag.min(n - 1);
    let mean = series.sum() / n as f64;
    let spread: f64 = series.iter().map(|&x| (x - mean).powi(2)).sum();
    if spread <= n as f64 * (f64::EPSILON * mean.abs()).powi(2) {
        return vec![1.0; max_lag + 1];
    }

    // Padding to at least 2n turns the circular correlation into a linear one.
    let padded = (2 * n).next_power_of_two();
    let mut buf: Vec<Complex<f64>> = series
        .iter()
        .map(|&x| Complex::new(x - mean, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(padded)
        .collect();

    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(padded).process(&mut buf);
    for z in buf.iter_mut() {
        *z = Complex::new(z.norm_sqr(), 0.0);
    }
    planner.plan_fft_inverse(padded).process(&mut buf);

    let c0 = buf[0].re;
    buf[..=max_lag].iter().map(|z| z.re / c0).collect()
}

/// Effective sample size of `series`, in `[1, n]` for a non-empty series.
pub fn effective_sample_size(series: ArrayView1<'_, f64>, max_lag: usize) -> f64 {
    let n = series.len();
    if n == 0 {
        return 0.0;
    }
    let rho = autocorrelation(series, max_lag);
    ess_from_autocorrelation(n, &rho)
}

fn ess_from_autocorrelation(n: usize, rho: &[f64]) -> f64 {
    let tail: f64 = rho
        .iter()
        .skip(1)
        .take_while(|&&r| r > 0.0)
        .sum();
    n as f64 / (1.0 + 2.0 * tail)
}

/// Per-pixel ESS image over every pixel of a `(len, rows, cols)` trace.
pub fn ess_map(samples: ArrayView3<'_, f64>, max_lag: usize) -> Array2<f64> {
    let (_, rows, cols) = samples.dim();
    let ess: Vec<f64> = pixel_columns(samples)
        .par_iter()
        .map(|series| effective_sample_size(series.view(), max_lag))
        .collect();
    Array2::from_shape_vec((rows, cols), ess).unwrap_or_else(|_| Array2::zeros((rows, cols)))
}

/// Which marginal-variance rank a diagnosed pixel was picked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelRank {
    MinVariance,
    MedianVariance,
    MaxVariance,
}

impl fmt::Display for PixelRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PixelRank::MinVariance => "min var",
            PixelRank::MedianVariance => "median var",
            PixelRank::MaxVariance => "max var",
        };
        f.write_str(label)
    }
}

/// Pixels of minimal, median and maximal marginal variance, in that order.
///
/// `None` for an empty image or one containing NaN.
pub fn select_pixels(variance: &Array2<f64>) -> Option<[(PixelRank, (usize, usize)); 3]> {
    let min = variance.argmin().ok()?;
    let max = variance.argmax().ok()?;

    let cols = variance.ncols();
    let mut order: Vec<(usize, f64)> = variance.iter().copied().enumerate().collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));
    let median = order[order.len() / 2].0;

    Some([
        (PixelRank::MinVariance, min),
        (PixelRank::MedianVariance, (median / cols, median % cols)),
        (PixelRank::MaxVariance, max),
    ])
}

#[derive(Debug, Clone, PartialEq)]
pub struct PixelDiagnostics {
    pub rank: PixelRank,
    pub pixel: (usize, usize),
    pub variance: f64,
    pub autocorrelation: Vec<f64>,
    pub ess: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DiagnosticsReport {
    /// Length of the trace the report was computed from.
    pub n_samples: usize,
    pub max_lag: usize,
    pub pixels: Vec<PixelDiagnostics>,
}

impl DiagnosticsReport {
    /// ACF and ESS at the pixels chosen by [`select_pixels`] on `variance`.
    pub fn compute(samples: ArrayView3<'_, f64>, variance: &Array2<f64>, max_lag: usize) -> Self {
        let n_samples = samples.len_of(ndarray::Axis(0));
        let Some(selected) = select_pixels(variance) else {
            log::warn!("no pixels selected for diagnostics");
            return Self {
                n_samples,
                max_lag,
                pixels: Vec::new(),
            };
        };
        let pixels = selected[..]
            .par_iter()
            .map(|&(rank, pixel)| {
                let series = samples.slice(ndarray::s![.., pixel.0, pixel.1]);
                let autocorrelation = autocorrelation(series, max_lag);
                let ess = if n_samples == 0 {
                    0.0
                } else {
                    ess_from_autocorrelation(n_samples, &autocorrelation)
                };
                PixelDiagnostics {
                    rank,
                    pixel,
                    variance: variance[pixel],
                    autocorrelation,
                    ess,
                }
            })
            .collect();
        Self {
            n_samples,
            max_lag,
            pixels,
        }
    }

    pub fn min_ess(&self) -> Option<f64> {
        self.pixels.iter().map(|p| p.ess).reduce(f64::min)
    }

    /// Plain-text summary, one row per diagnosed pixel.
    pub fn to_table(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<11} {:>10} {:>12} {:>8} {:>8} {:>10}",
            "pixel", "position", "variance", "acf(1)", "ESS", "ESS/n"
        );
        for p in &self.pixels {
            let lag1 = p.autocorrelation.get(1).copied().unwrap_or(f64::NAN);
            let ratio = if self.n_samples > 0 {
                p.ess / self.n_samples as f64
            } else {
                f64::NAN
            };
            let _ = writeln!(
                out,
                "{:<11} {:>10} {:>12.4e} {:>8.3} {:>8.1} {:>10.3}",
                p.rank.to_string(),
                format!("({}, {})", p.pixel.0, p.pixel.1),
                p.variance,
                lag1,
                p.ess,
                ratio
            );
        }
        out
    }
}
