//! Planned two-dimensional FFTs over `Array2` images, built on `rustfft`.
//!
//! Rows are transformed in a single batched call (a standard-layout image is a
//! sequence of contiguous rows), then the transposed image is transformed the
//! same way to handle columns.

use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Forward and inverse 2-D transforms planned for one image shape.
#[derive(Clone)]
pub struct Fft2 {
    shape: (usize, usize),
    row_forward: Arc<dyn Fft<f64>>,
    row_inverse: Arc<dyn Fft<f64>>,
    col_forward: Arc<dyn Fft<f64>>,
    col_inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for Fft2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fft2").field("shape", &self.shape).finish()
    }
}

impl Fft2 {
    /// Plans transforms for images with `shape = (rows, cols)`.
    pub fn new(shape: (usize, usize)) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            shape,
            row_forward: planner.plan_fft_forward(shape.1),
            row_inverse: planner.plan_fft_inverse(shape.1),
            col_forward: planner.plan_fft_forward(shape.0),
            col_inverse: planner.plan_fft_inverse(shape.0),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Unnormalised forward transform of a real image.
    pub fn forward(&self, x: &Array2<f64>) -> Array2<Complex<f64>> {
        self.forward_complex(x.mapv(|v| Complex::new(v, 0.0)))
    }

    /// Unnormalised forward transform of a complex image.
    pub fn forward_complex(&self, x: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
        let rows_done = process_rows(self.row_forward.as_ref(), x);
        let cols_done = process_rows(self.col_forward.as_ref(), rows_done.reversed_axes());
        cols_done.reversed_axes().as_standard_layout().into_owned()
    }

    /// Inverse transform, scaled by `1 / (rows * cols)` so that
    /// `inverse(forward(x)) == x`.
    pub fn inverse(&self, x: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
        let rows_done = process_rows(self.row_inverse.as_ref(), x);
        let cols_done = process_rows(self.col_inverse.as_ref(), rows_done.reversed_axes());
        let scale = 1.0 / (self.shape.0 * self.shape.1) as f64;
        cols_done
            .reversed_axes()
            .as_standard_layout()
            .mapv(|c| c * scale)
    }

    /// Real part of the inverse transform.
    pub fn inverse_real(&self, x: Array2<Complex<f64>>) -> Array2<f64> {
        self.inverse(x).mapv(|c| c.re)
    }

    /// Modulus of the forward transform, `|FFT2(x)|`.
    pub fn magnitude(&self, x: &Array2<f64>) -> Array2<f64> {
        self.forward(x).mapv(|c| c.norm())
    }
}

/// Runs `fft` over every row of `data` after forcing a standard layout.
fn process_rows(fft: &dyn Fft<f64>, data: Array2<Complex<f64>>) -> Array2<Complex<f64>> {
    let mut data = data.as_standard_layout().into_owned();
    if let Some(buffer) = data.as_slice_mut() {
        if !buffer.is_empty() {
            fft.process(buffer);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn forward_of_impulse_is_flat() {
        let mut x = Array2::<f64>::zeros((4, 6));
        x[[0, 0]] = 1.0;
        let spectrum = Fft2::new((4, 6)).forward(&x);
        for c in spectrum.iter() {
            assert_abs_diff_eq!(c.re, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(c.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn dc_component_is_the_sum() {
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let spectrum = Fft2::new((2, 3)).forward(&x);
        assert_abs_diff_eq!(spectrum[[0, 0]].re, 21.0, epsilon = 1e-12);
    }

    #[test]
    fn inverse_recovers_input() {
        let x = array![[0.5, -1.0, 2.0, 3.5], [1.0, 0.0, -2.5, 4.0], [7.0, 1.5, 0.25, -3.0]];
        let fft = Fft2::new((3, 4));
        let back = fft.inverse_real(fft.forward(&x));
        assert_abs_diff_eq!(back, x, epsilon = 1e-12);
    }
}
