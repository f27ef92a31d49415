//! Reconstruction-quality metrics of an estimate against a reference image.
//!
//! The peak value for PSNR and SSIM is the data range of the reference,
//! `max − min`, or `1` when the reference is constant.

use ndarray::{Array2, Zip};

use crate::error::{check_shape, SamplerError};

const SSIM_WINDOW: usize = 7;
const SSIM_K1: f64 = 0.01;
const SSIM_K2: f64 = 0.03;

/// Mean squared error.
pub fn mse(estimate: &Array2<f64>, reference: &Array2<f64>) -> Result<f64, SamplerError> {
    check_shape(reference.dim(), estimate.shape())?;
    if reference.is_empty() {
        return Ok(0.0);
    }
    let mut sum = 0.0;
    Zip::from(estimate)
        .and(reference)
        .for_each(|&a, &b| sum += (a - b).powi(2));
    Ok(sum / reference.len() as f64)
}

/// `‖estimate − reference‖ / ‖reference‖` in the Frobenius norm.
pub fn relative_error(estimate: &Array2<f64>, reference: &Array2<f64>) -> Result<f64, SamplerError> {
    check_shape(reference.dim(), estimate.shape())?;
    let mut diff = 0.0;
    Zip::from(estimate)
        .and(reference)
        .for_each(|&a, &b| diff += (a - b).powi(2));
    let norm = reference.iter().map(|v| v * v).sum::<f64>().sqrt();
    Ok(diff.sqrt() / norm)
}

/// Peak signal-to-noise ratio in decibels; infinite for a perfect estimate.
pub fn psnr(estimate: &Array2<f64>, reference: &Array2<f64>) -> Result<f64, SamplerError> {
    let err = mse(estimate, reference)?;
    let peak = data_range(reference);
    Ok(10.0 * (peak * peak / err).log10())
}

/// Mean structural similarity index over all fully contained 7x7 windows.
///
/// Windows shrink to the image size for images smaller than 7 pixels on a
/// side. Local variances and covariance use the unbiased sample estimate.
pub fn ssim(estimate: &Array2<f64>, reference: &Array2<f64>) -> Result<f64, SamplerError> {
    check_shape(reference.dim(), estimate.shape())?;
    let (rows, cols) = reference.dim();
    let w = SSIM_WINDOW.min(rows).min(cols);
    if w == 0 {
        return Ok(1.0);
    }
    let area = (w * w) as f64;
    let unbiased = if w > 1 { area / (area - 1.0) } else { 1.0 };

    let peak = data_range(reference);
    let c1 = (SSIM_K1 * peak).powi(2);
    let c2 = (SSIM_K2 * peak).powi(2);

    let mu_x = box_mean(estimate, w);
    let mu_y = box_mean(reference, w);
    let xx = box_mean(&(estimate * estimate), w);
    let yy = box_mean(&(reference * reference), w);
    let xy = box_mean(&(estimate * reference), w);

    let mut total = 0.0;
    Zip::from(&mu_x)
        .and(&mu_y)
        .and(&xx)
        .and(&yy)
        .and(&xy)
        .for_each(|&mx, &my, &sxx, &syy, &sxy| {
            let vx = unbiased * (sxx - mx * mx);
            let vy = unbiased * (syy - my * my);
            let cxy = unbiased * (sxy - mx * my);
            total += ((2.0 * mx * my + c1) * (2.0 * cxy + c2))
                / ((mx * mx + my * my + c1) * (vx + vy + c2));
        });
    Ok(total / mu_x.len() as f64)
}

fn data_range(reference: &Array2<f64>) -> f64 {
    let (lo, hi) = reference
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;
    if range > 0.0 {
        range
    } else {
        1.0
    }
}

/// Means over every `w x w` window fully inside `img`, via a summed-area table.
fn box_mean(img: &Array2<f64>, w: usize) -> Array2<f64> {
    let (rows, cols) = img.dim();
    let mut sat = Array2::<f64>::zeros((rows + 1, cols + 1));
    for i in 0..rows {
        for j in 0..cols {
            sat[[i + 1, j + 1]] = img[[i, j]] + sat[[i, j + 1]] + sat[[i + 1, j]] - sat[[i, j]];
        }
    }
    let area = (w * w) as f64;
    Array2::from_shape_fn((rows + 1 - w, cols + 1 - w), |(i, j)| {
        (sat[[i + w, j + w]] - sat[[i, j + w]] - sat[[i + w, j]] + sat[[i, j]]) / area
    })
}
