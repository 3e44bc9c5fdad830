// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Finite-Difference Stencils
// ─────────────────────────────────────────────────────────────────────
//! Central-difference gradient and separable Gaussian smoothing.
//!
//! The gradient wraps periodically: second order in the interior, biased
//! on the two edge layers of a non-periodic field. Length-1 axes have a
//! zero derivative.

use rayon::prelude::*;

use effield_types::{FieldError, FieldResult, ScalarField, VectorField};

/// Periodic central-difference gradient.
pub fn gradient(field: &ScalarField) -> VectorField {
    VectorField {
        x: derivative(field, 0),
        y: derivative(field, 1),
        z: derivative(field, 2),
    }
}

/// ∂f/∂x_axis with periodic wrap.
pub fn derivative(field: &ScalarField, axis: usize) -> ScalarField {
    let shape = field.shape();
    let n = shape.dims()[axis];
    if n <= 1 {
        return field.zeros_like();
    }
    let stride = shape.stride(axis);
    let inv = 1.0 / (2.0 * field.spacing()[axis]);
    let src = field.data();
    let data: Vec<f64> = (0..src.len())
        .into_par_iter()
        .map(|idx| {
            let i = shape.unravel(idx)[axis];
            let base = idx - i * stride;
            let ip = (i + 1) % n;
            let im = (i + n - 1) % n;
            (src[base + ip * stride] - src[base + im * stride]) * inv
        })
        .collect();
    let mut out = field.zeros_like();
    out.data_mut().copy_from_slice(&data);
    out
}

/// Normalised 1-D Gaussian weights truncated at 4σ and at `max_radius` taps.
pub fn gaussian_weights(sigma: f64, max_radius: usize) -> Vec<f64> {
    let radius = (4.0 * sigma + 0.5).floor().min(max_radius as f64) as usize;
    let mut w: Vec<f64> = (0..=2 * radius)
        .map(|j| {
            let x = j as f64 - radius as f64;
            (-0.5 * x * x / (sigma * sigma)).exp()
        })
        .collect();
    let total: f64 = w.iter().sum();
    w.iter_mut().for_each(|v| *v /= total);
    w
}

/// Half-sample symmetric reflection of `i` into [0, n).
#[inline]
fn reflect(i: i64, n: i64) -> usize {
    let m = i.rem_euclid(2 * n);
    (if m < n { m } else { 2 * n - 1 - m }) as usize
}

/// Separable Gaussian blur, σ in voxels, reflect boundary.
///
/// σ = 0 returns an unchanged copy. Length-1 axes are not smoothed.
pub fn gaussian_smooth(field: &ScalarField, sigma: f64) -> FieldResult<ScalarField> {
    if !(sigma.is_finite() && sigma >= 0.0) {
        return Err(FieldError::invalid(format!(
            "smoothing sigma must be finite and >= 0, got {sigma}"
        )));
    }
    let mut out = field.clone();
    if sigma == 0.0 {
        return Ok(out);
    }
    let shape = field.shape();
    // taps past the longest axis only revisit reflected samples
    let longest = shape.dims().into_iter().max().unwrap_or(1);
    let weights = gaussian_weights(sigma, longest);
    let radius = (weights.len() / 2) as i64;
    for axis in 0..3 {
        let n = shape.dims()[axis];
        if n <= 1 {
            continue;
        }
        let stride = shape.stride(axis);
        let src = out.data().to_vec();
        let blurred: Vec<f64> = (0..src.len())
            .into_par_iter()
            .map(|idx| {
                let i = shape.unravel(idx)[axis];
                let base = idx - i * stride;
                weights
                    .iter()
                    .enumerate()
                    .map(|(j, w)| {
                        let k = reflect(i as i64 + j as i64 - radius, n as i64);
                        w * src[base + k * stride]
                    })
                    .sum()
            })
            .collect();
        out.data_mut().copy_from_slice(&blurred);
    }
    Ok(out)
}
