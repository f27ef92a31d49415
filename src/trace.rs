//! Thinned storage of post-burn-in chain states.

use ndarray::{s, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::error::{check_shape, SamplerError};

/// A buffer of at most `capacity` state snapshots, allocated once.
///
/// The collected iterates are numbered `1, 2, ...` from the end of burn-in;
/// iterate `k` is retained when `k` is a multiple of the thinning step and
/// the buffer is not yet full.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceBuffer {
    samples: Array3<f64>,
    len: usize,
    thinning_step: usize,
}

impl TraceBuffer {
    /// Sizes the buffer for `n_samples` snapshots out of `n_iterations`
    /// collected iterates, with `thinning_step = ⌊n_iterations / n_samples⌋`.
    pub fn new(
        n_iterations: usize,
        n_samples: usize,
        shape: (usize, usize),
    ) -> Result<Self, SamplerError> {
        let thinning_step = thinning_step(n_iterations, n_samples)?;
        Ok(Self {
            samples: Array3::zeros((n_samples, shape.0, shape.1)),
            len: 0,
            thinning_step,
        })
    }

    pub fn thinning_step(&self) -> usize {
        self.thinning_step
    }

    pub fn capacity(&self) -> usize {
        self.samples.len_of(Axis(0))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Whether the `k`-th collected iterate (1-based) is kept.
    pub fn is_scheduled(&self, k: usize) -> bool {
        k > 0 && k % self.thinning_step == 0 && !self.is_full()
    }

    /// Offers the `k`-th collected iterate; returns whether it was stored.
    pub fn offer(&mut self, k: usize, state: &Array2<f64>) -> Result<bool, SamplerError> {
        if !self.is_scheduled(k) {
            return Ok(false);
        }
        check_shape(
            (self.samples.len_of(Axis(1)), self.samples.len_of(Axis(2))),
            state.shape(),
        )?;
        self.samples.index_axis_mut(Axis(0), self.len).assign(state);
        self.len += 1;
        Ok(true)
    }

    /// The retained snapshots, `(len, rows, cols)`.
    pub fn samples(&self) -> ArrayView3<'_, f64> {
        self.samples.slice(s![..self.len, .., ..])
    }

    pub fn sample(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        (index < self.len).then(|| self.samples.index_axis(Axis(0), index))
    }

    /// Scalar series of one pixel across the retained snapshots.
    pub fn pixel_series(&self, pixel: (usize, usize)) -> ArrayView1<'_, f64> {
        self.samples.slice(s![..self.len, pixel.0, pixel.1])
    }

    /// Consumes the buffer, dropping unused capacity.
    pub fn into_samples(self) -> Array3<f64> {
        let len = self.len;
        self.samples.slice_move(s![..len, .., ..])
    }
}

/// `⌊n_iterations / n_samples⌋`, rejecting a zero result.
pub fn thinning_step(n_iterations: usize, n_samples: usize) -> Result<usize, SamplerError> {
    let step = n_iterations.checked_div(n_samples).unwrap_or(0);
    if step == 0 {
        return Err(SamplerError::ZeroThinning {
            total: n_iterations,
            n_samples,
        });
    }
    Ok(step)
}

/// Every pixel series of a `(len, rows, cols)` trace, flattened row-major.
pub(crate) fn pixel_columns(samples: ArrayView3<'_, f64>) -> Vec<Array1<f64>> {
    let (_, rows, cols) = samples.dim();
    (0..rows * cols)
        .map(|p| samples.slice(s![.., p / cols, p % cols]).to_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thinning_keeps_requested_count() {
        let mut trace = TraceBuffer::new(1000, 50, (2, 2)).unwrap();
        assert_eq!(trace.thinning_step(), 20);
        let mut state = Array2::zeros((2, 2));
        for k in 1..=1000 {
            state.fill(k as f64);
            trace.offer(k, &state).unwrap();
        }
        assert_eq!(trace.len(), 50);
        assert!(trace.is_full());
        assert_eq!(trace.sample(0).unwrap()[[0, 0]], 20.0);
        assert_eq!(trace.sample(49).unwrap()[[1, 1]], 1000.0);
        assert!(trace.sample(50).is_none());
    }

    #[test]
    fn uneven_division_stops_at_capacity() {
        let mut trace = TraceBuffer::new(1010, 50, (1, 1)).unwrap();
        assert_eq!(trace.thinning_step(), 20);
        let state = Array2::zeros((1, 1));
        let stored = (1..=1010)
            .filter(|&k| trace.offer(k, &state).unwrap())
            .count();
        assert_eq!(stored, 50);
        assert_eq!(trace.into_samples().dim(), (50, 1, 1));
    }

    #[test]
    fn zero_thinning_is_an_error() {
        assert!(matches!(
            TraceBuffer::new(10, 50, (1, 1)),
            Err(SamplerError::ZeroThinning { total: 10, n_samples: 50 })
        ));
        assert!(thinning_step(10, 0).is_err());
    }

    #[test]
    fn pixel_series_follow_snapshots() {
        let mut trace = TraceBuffer::new(6, 3, (2, 3)).unwrap();
        for k in 1..=6 {
            let state = Array2::from_shape_fn((2, 3), |(i, j)| (k * 10 + i * 3 + j) as f64);
            trace.offer(k, &state).unwrap();
        }
        assert_eq!(trace.pixel_series((1, 2)).to_vec(), vec![25.0, 45.0, 65.0]);
        let columns = pixel_columns(trace.samples());
        assert_eq!(columns.len(), 6);
        assert_eq!(columns[5].to_vec(), vec![25.0, 45.0, 65.0]);
    }

    #[test]
    fn rejects_wrong_shape() {
        let mut trace = TraceBuffer::new(4, 2, (2, 2)).unwrap();
        assert!(trace.offer(2, &Array2::zeros((3, 3))).is_err());
        assert!(trace.is_empty());
    }
}
