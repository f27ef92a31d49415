//! Linear forward operators `A` of the observation model `y = A x + noise`.
//!
//! The sampler only needs `A`, its adjoint, and the spectral norm `‖AAᵗ‖₂`
//! (for the likelihood's Lipschitz constant). [`Identity`] models denoising,
//! [`CircularConvolution`] models a periodic blur.

use ndarray::{Array2, Zip};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use rustfft::num_complex::Complex;

use crate::error::SamplerError;
use crate::fft::Fft2;

/// A linear map between images together with its adjoint.
pub trait LinearOperator {
    /// Shape of the images the operator is applied to.
    fn input_shape(&self) -> (usize, usize);

    /// Shape of the images the operator produces.
    fn output_shape(&self) -> (usize, usize) {
        self.input_shape()
    }

    /// Computes `A x`.
    fn apply(&self, x: &Array2<f64>) -> Array2<f64>;

    /// Computes `Aᵗ y`.
    fn adjoint(&self, y: &Array2<f64>) -> Array2<f64>;

    /// Spectral norm `‖AAᵗ‖₂`.
    ///
    /// The default estimates it with 200 power iterations on `AᵗA`.
    fn norm_squared(&self) -> f64 {
        power_iteration(self, 200)
    }
}

/// Largest eigenvalue of `AᵗA`, estimated by power iteration from a fixed
/// pseudo-random start.
pub fn power_iteration<A: LinearOperator + ?Sized>(op: &A, n_iter: usize) -> f64 {
    let mut rng = SmallRng::seed_from_u64(0);
    let mut x: Array2<f64> =
        Array2::<f64>::zeros(op.input_shape()).mapv(|_| rng.sample(StandardNormal));
    let norm = x.mapv(|v| v * v).sum().sqrt();
    x.mapv_inplace(|v| v / norm);

    let mut eigenvalue = 0.0;
    for _ in 0..n_iter {
        let y = op.adjoint(&op.apply(&x));
        eigenvalue = y.mapv(|v| v * v).sum().sqrt();
        if eigenvalue == 0.0 {
            return 0.0;
        }
        x = y / eigenvalue;
    }
    eigenvalue
}

/// The identity map on images of a fixed shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub shape: (usize, usize),
}

impl Identity {
    pub fn new(shape: (usize, usize)) -> Self {
        Self { shape }
    }
}

impl LinearOperator for Identity {
    fn input_shape(&self) -> (usize, usize) {
        self.shape
    }

    fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        x.clone()
    }

    fn adjoint(&self, y: &Array2<f64>) -> Array2<f64> {
        y.clone()
    }

    fn norm_squared(&self) -> f64 {
        1.0
    }
}

/// Periodic convolution with a point spread function, applied in the Fourier
/// domain.
///
/// The PSF is centred on pixel `(rows / 2, cols / 2)` of its own array, so a
/// symmetric PSF produces no shift.
#[derive(Debug, Clone)]
pub struct CircularConvolution {
    shape: (usize, usize),
    fft: Fft2,
    transfer: Array2<Complex<f64>>,
}

impl CircularConvolution {
    /// Builds the operator for images of `shape` from a PSF no larger than
    /// the image.
    pub fn new(psf: &Array2<f64>, shape: (usize, usize)) -> Result<Self, SamplerError> {
        let (kh, kw) = psf.dim();
        if kh == 0 || kw == 0 || kh > shape.0 || kw > shape.1 {
            return Err(SamplerError::ShapeMismatch {
                expected: shape,
                found: (kh, kw),
            });
        }

        let mut embedded = Array2::<f64>::zeros(shape);
        for ((i, j), &v) in psf.indexed_iter() {
            let r = (i + shape.0 - kh / 2) % shape.0;
            let c = (j + shape.1 - kw / 2) % shape.1;
            embedded[[r, c]] += v;
        }

        let fft = Fft2::new(shape);
        let transfer = fft.forward(&embedded);
        Ok(Self {
            shape,
            fft,
            transfer,
        })
    }

    /// A normalised `size x size` box blur.
    pub fn uniform(shape: (usize, usize), size: usize) -> Result<Self, SamplerError> {
        let weight = 1.0 / (size * size) as f64;
        Self::new(&Array2::from_elem((size, size), weight), shape)
    }

    /// The Fourier transform of the embedded PSF.
    pub fn transfer(&self) -> &Array2<Complex<f64>> {
        &self.transfer
    }

    fn filter(&self, x: &Array2<f64>, conjugate: bool) -> Array2<f64> {
        let mut spectrum = self.fft.forward(x);
        Zip::from(&mut spectrum)
            .and(&self.transfer)
            .for_each(|s, &h| *s *= if conjugate { h.conj() } else { h });
        self.fft.inverse_real(spectrum)
    }
}

impl LinearOperator for CircularConvolution {
    fn input_shape(&self) -> (usize, usize) {
        self.shape
    }

    fn apply(&self, x: &Array2<f64>) -> Array2<f64> {
        self.filter(x, false)
    }

    fn adjoint(&self, y: &Array2<f64>) -> Array2<f64> {
        self.filter(y, true)
    }

    fn norm_squared(&self) -> f64 {
        self.transfer
            .iter()
            .map(|h| h.norm_sqr())
            .fold(0.0, f64::max)
    }
}
