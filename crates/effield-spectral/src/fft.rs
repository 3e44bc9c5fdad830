// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — N-D FFT Plumbing
// ─────────────────────────────────────────────────────────────────────
//! Separable 3-D complex FFT over flat x-fastest buffers, wavenumber
//! grids and centred zero padding.
//!
//! Length-1 axes are skipped, so a planar field transforms as 2-D.
//! The inverse transform is normalised by 1/N; rustfft itself does not
//! normalise.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use effield_types::GridShape;

/// Plans shared across solves, cached per (length, direction).
///
/// The planner itself is not `Send`, so only the finished plans are
/// kept; a miss builds the plan with a fresh planner.
#[derive(Default)]
pub struct FftPlanCache {
    plans: Mutex<HashMap<(usize, bool), Arc<dyn Fft<f64>>>>,
}

impl FftPlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn plan(&self, n: usize, inverse: bool) -> Arc<dyn Fft<f64>> {
        let mut plans = self.plans.lock();
        plans
            .entry((n, inverse))
            .or_insert_with(|| {
                let mut planner = FftPlanner::new();
                if inverse {
                    planner.plan_fft_inverse(n)
                } else {
                    planner.plan_fft_forward(n)
                }
            })
            .clone()
    }

    /// Number of cached plans.
    pub fn len(&self) -> usize {
        self.plans.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.lock().is_empty()
    }

    pub fn forward(&self, buf: &mut [Complex64], shape: GridShape) {
        self.transform(buf, shape, false);
    }

    /// Inverse transform including the 1/N normalisation.
    pub fn inverse(&self, buf: &mut [Complex64], shape: GridShape) {
        self.transform(buf, shape, true);
        let scale = 1.0 / shape.len() as f64;
        buf.par_iter_mut().for_each(|v| *v *= scale);
    }

    fn transform(&self, buf: &mut [Complex64], shape: GridShape, inverse: bool) {
        debug_assert_eq!(buf.len(), shape.len());
        let dims = shape.dims();
        for axis in 0..3 {
            let n = dims[axis];
            if n <= 1 {
                continue;
            }
            let fft = self.plan(n, inverse);
            if axis == 0 {
                // x lines are contiguous
                buf.par_chunks_mut(n).for_each(|line| fft.process(line));
            } else {
                let mut lines = gather_lines(buf, shape, axis);
                lines.par_chunks_mut(n).for_each(|line| fft.process(line));
                scatter_lines(buf, &lines, shape, axis);
            }
        }
    }
}

/// Copy every line along `axis` into a contiguous buffer, one line after another.
fn gather_lines(buf: &[Complex64], shape: GridShape, axis: usize) -> Vec<Complex64> {
    let n = shape.dims()[axis];
    let stride = shape.stride(axis);
    let mut out = Vec::with_capacity(buf.len());
    for start in line_starts(shape, axis) {
        out.extend((0..n).map(|i| buf[start + i * stride]));
    }
    out
}

fn scatter_lines(buf: &mut [Complex64], lines: &[Complex64], shape: GridShape, axis: usize) {
    let n = shape.dims()[axis];
    let stride = shape.stride(axis);
    for (line, start) in lines.chunks(n).zip(line_starts(shape, axis)) {
        for (i, &v) in line.iter().enumerate() {
            buf[start + i * stride] = v;
        }
    }
}

/// Flat index of the first element of every line along `axis`.
fn line_starts(shape: GridShape, axis: usize) -> Vec<usize> {
    let [nx, ny, nz] = shape.dims();
    match axis {
        1 => (0..nz)
            .flat_map(|iz| (0..nx).map(move |ix| shape.index(ix, 0, iz)))
            .collect(),
        2 => (0..ny)
            .flat_map(|iy| (0..nx).map(move |ix| shape.index(ix, iy, 0)))
            .collect(),
        _ => (0..ny * nz).map(|row| row * nx).collect(),
    }
}

/// Angular wavenumbers 2π·fftfreq(n, d).
pub fn angular_frequencies(n: usize, d: f64) -> Vec<f64> {
    let scale = 2.0 * std::f64::consts::PI / (n as f64 * d);
    (0..n)
        .map(|i| {
            let f = if i < n.div_ceil(2) {
                i as i64
            } else {
                i as i64 - n as i64
            };
            f as f64 * scale
        })
        .collect()
}

/// Wavenumber components per axis for a grid of `shape` and `spacing`.
pub fn wavenumber_axes(shape: GridShape, spacing: [f64; 3]) -> [Vec<f64>; 3] {
    let dims = shape.dims();
    [
        angular_frequencies(dims[0], spacing[0]),
        angular_frequencies(dims[1], spacing[1]),
        angular_frequencies(dims[2], spacing[2]),
    ]
}

/// Shape after padding every non-degenerate axis by `factor`.
pub fn padded_shape(shape: GridShape, factor: usize) -> GridShape {
    let pad = |n: usize| if n > 1 { n * factor } else { n };
    GridShape::new(pad(shape.nx), pad(shape.ny), pad(shape.nz))
}

/// Offset of the original block inside the padded grid (source centred).
pub fn pad_offset(shape: GridShape, padded: GridShape) -> [usize; 3] {
    let (d, p) = (shape.dims(), padded.dims());
    [(p[0] - d[0]) / 2, (p[1] - d[1]) / 2, (p[2] - d[2]) / 2]
}

/// Embed a real block into a zero-filled complex buffer of `padded` shape.
pub fn embed(data: &[f64], shape: GridShape, padded: GridShape) -> Vec<Complex64> {
    let mut out = vec![Complex64::new(0.0, 0.0); padded.len()];
    let [ox, oy, oz] = pad_offset(shape, padded);
    for iz in 0..shape.nz {
        for iy in 0..shape.ny {
            let src = shape.index(0, iy, iz);
            let dst = padded.index(ox, oy + iy, oz + iz);
            for ix in 0..shape.nx {
                out[dst + ix] = Complex64::new(data[src + ix], 0.0);
            }
        }
    }
    out
}

/// Real part of the centred `shape` block of a padded buffer.
pub fn crop_real(buf: &[Complex64], shape: GridShape, padded: GridShape) -> Vec<f64> {
    let mut out = vec![0.0; shape.len()];
    let [ox, oy, oz] = pad_offset(shape, padded);
    for iz in 0..shape.nz {
        for iy in 0..shape.ny {
            let dst = shape.index(0, iy, iz);
            let src = padded.index(ox, oy + iy, oz + iz);
            for ix in 0..shape.nx {
                out[dst + ix] = buf[src + ix].re;
            }
        }
    }
    out
}

/// Signed minimum-image offset of index `i` on a periodic axis of length `n`.
#[inline]
pub fn min_image(i: usize, n: usize) -> i64 {
    if 2 * i < n || n <= 1 {
        i as i64
    } else {
        i as i64 - n as i64
    }
}
