pub mod chebyshev;
pub mod core;
pub mod diagnostics;
pub mod distributions;
pub mod error;
pub mod fft;
pub mod io;
pub mod langevin;
pub mod likelihood;
pub mod operator;
pub mod posterior;
pub mod prior;
pub mod quality;
pub mod sampler;
pub mod stats;
pub mod trace;

pub use error::SamplerError;
