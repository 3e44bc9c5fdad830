// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Accelerations and Rotation Curves
// ─────────────────────────────────────────────────────────────────────
//! Acceleration g = −∇φ, azimuthally averaged radial acceleration on
//! the mid-plane, and circular speed v_c = sqrt(max(R·g_R, 0)).

use serde::{Deserialize, Serialize};

use effield_types::{FieldError, FieldResult, ScalarField, VectorField};

use crate::stencil::gradient;

/// g = −∇φ by periodic central differences.
pub fn acceleration(phi: &ScalarField) -> VectorField {
    gradient(phi).negated()
}

/// Binned radial profile: bin centres and mean inward g_R per bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialProfile {
    pub r: Vec<f64>,
    /// Mean of −(x·g_x + y·g_y)/R, positive for attraction. NaN for empty bins.
    pub g_r: Vec<f64>,
}

impl RadialProfile {
    /// Circular speed for every bin.
    pub fn circular_velocity(&self) -> Vec<f64> {
        vc_from_gr(&self.g_r, &self.r)
    }
}

/// Azimuthally averaged radial acceleration on the mid z-plane.
///
/// Radii are measured from the box centre in the x–y plane; `nbins`
/// equal-width bins span [0, ½·min(nx·dx, ny·dy)).
pub fn circular_profile(accel: &VectorField, nbins: usize) -> FieldResult<RadialProfile> {
    if nbins == 0 {
        return Err(FieldError::invalid("nbins must be >= 1"));
    }
    let field = &accel.x;
    accel.x.ensure_same_shape(&accel.y, "g_y")?;
    let shape = field.shape();
    let spacing = field.spacing();
    let centre = field.box_center();
    let iz = shape.nz / 2;
    let r_max = 0.5 * (shape.nx as f64 * spacing[0]).min(shape.ny as f64 * spacing[1]);
    let width = r_max / nbins as f64;

    let mut sum = vec![0.0; nbins];
    let mut count = vec![0usize; nbins];
    for iy in 0..shape.ny {
        for ix in 0..shape.nx {
            let p = field.voxel_center(ix, iy, iz);
            let (x, y) = (p[0] - centre[0], p[1] - centre[1]);
            let r = x.hypot(y);
            if r == 0.0 || r >= r_max {
                continue;
            }
            let idx = shape.index(ix, iy, iz);
            let g_r = -(x * accel.x.data()[idx] + y * accel.y.data()[idx]) / r;
            if !g_r.is_finite() {
                continue;
            }
            let bin = ((r / width) as usize).min(nbins - 1);
            sum[bin] += g_r;
            count[bin] += 1;
        }
    }

    let r = (0..nbins).map(|i| (i as f64 + 0.5) * width).collect();
    let g_r = sum
        .iter()
        .zip(count.iter())
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { f64::NAN })
        .collect();
    Ok(RadialProfile { r, g_r })
}

/// v_c = sqrt(max(R·g_R, 0)); NaN inputs give NaN.
pub fn vc_from_gr(g_r: &[f64], r: &[f64]) -> Vec<f64> {
    g_r.iter()
        .zip(r.iter())
        .map(|(&g, &rr)| {
            let v2 = rr * g;
            if v2.is_nan() {
                f64::NAN
            } else {
                v2.max(0.0).sqrt()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use effield_types::GridShape;

    #[test]
    fn test_vc_clamps_negative() {
        let v = vc_from_gr(&[4.0, -1.0], &[1.0, 2.0]);
        assert_eq!(v[0], 2.0);
        assert_eq!(v[1], 0.0);
        assert!(vc_from_gr(&[f64::NAN], &[1.0])[0].is_nan());
    }

    #[test]
    fn test_profile_of_harmonic_potential() {
        // φ = ½(x² + y²) → g_R = R inside the box (up to edge wrap)
        let shape = GridShape::planar(41, 41);
        let origin = ScalarField::centered_origin(shape, [1.0; 3]);
        let phi = ScalarField::from_fn(shape, origin, [1.0; 3], |p| {
            0.5 * (p[0] * p[0] + p[1] * p[1])
        })
        .unwrap();
        let prof = circular_profile(&acceleration(&phi), 10).unwrap();
        // the innermost bin holds too few pixels for its centre to be representative
        for (i, (&r, &g)) in prof.r.iter().zip(prof.g_r.iter()).enumerate().skip(1).take(7) {
            assert!((g - r).abs() / r < 0.15, "bin {i}: g_R = {g}, R = {r}");
        }
        let vc = prof.circular_velocity();
        assert!(vc[4] > vc[1]);
    }

    #[test]
    fn test_rejects_zero_bins() {
        let f = ScalarField::zeros(GridShape::planar(4, 4), [0.0; 3], [1.0; 3]).unwrap();
        assert!(circular_profile(&acceleration(&f), 0).is_err());
    }
}
