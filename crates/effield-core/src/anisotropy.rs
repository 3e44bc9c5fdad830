// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Structure-Tensor Anisotropy
// ─────────────────────────────────────────────────────────────────────
//! Local anisotropy of a density field from its structure tensor.
//!
//! Per voxel: g = ∇ρ (central differences), J = g⊗g, optionally
//! Gaussian-smoothed component-wise, then a symmetric eigendecomposition.
//! Strengths b_p = (λ_p − λ̄)/(|λ̄| + ε) sum to zero; the anisotropy
//! amplitude is max_p |b_p| and the preferred axis is the eigenvector of
//! the largest eigenvalue.

use rayon::prelude::*;

use effield_physics::harmonics::{lm_count, lm_index};
use effield_spectral::{gaussian_smooth, gradient, PrincipalAxis};
use effield_types::{FieldError, FieldResult, GridShape, ScalarField};

use crate::eigen::{from_components, sym_eigen3, SymEigen3};

/// Default regulariser ε in b_p.
pub const STRENGTH_EPS: f64 = 1e-12;

/// b_p = (λ_p − mean λ)/(|mean λ| + ε).
#[inline]
pub fn anisotropy_strengths(values: [f64; 3], eps: f64) -> [f64; 3] {
    let mean = (values[0] + values[1] + values[2]) / 3.0;
    let denom = mean.abs() + eps;
    [
        (values[0] - mean) / denom,
        (values[1] - mean) / denom,
        (values[2] - mean) / denom,
    ]
}

/// Structure-tensor estimator.
#[derive(Debug, Clone, Copy)]
pub struct AnisotropyEstimator {
    pub epsilon: f64,
}

impl Default for AnisotropyEstimator {
    fn default() -> Self {
        Self {
            epsilon: STRENGTH_EPS,
        }
    }
}

impl AnisotropyEstimator {
    /// Eigen-decompose the (optionally smoothed) structure tensor of `density`.
    ///
    /// `smoothing_scale` is a Gaussian σ in voxels applied to the six
    /// tensor components.
    pub fn estimate(
        &self,
        density: &ScalarField,
        smoothing_scale: Option<f64>,
    ) -> FieldResult<AnisotropyEstimate> {
        let g = gradient(density);
        let (gx, gy, gz) = (g.x.data(), g.y.data(), g.z.data());
        let products: [fn(f64, f64, f64) -> f64; 6] = [
            |x, _, _| x * x,
            |_, y, _| y * y,
            |_, _, z| z * z,
            |x, y, _| x * y,
            |x, _, z| x * z,
            |_, y, z| y * z,
        ];
        let mut components = Vec::with_capacity(6);
        for prod in products {
            let data = (0..density.len())
                .map(|i| prod(gx[i], gy[i], gz[i]))
                .collect();
            let mut comp = density.with_data(data)?;
            if let Some(sigma) = smoothing_scale.filter(|&s| s > 0.0) {
                comp = gaussian_smooth(&comp, sigma)?;
            }
            components.push(comp);
        }

        let eigen: Vec<SymEigen3> = (0..density.len())
            .into_par_iter()
            .map(|i| {
                let c = [
                    components[0].data()[i],
                    components[1].data()[i],
                    components[2].data()[i],
                    components[3].data()[i],
                    components[4].data()[i],
                    components[5].data()[i],
                ];
                sym_eigen3(from_components(c))
            })
            .collect();

        Ok(AnisotropyEstimate {
            template: density.zeros_like(),
            eigen,
            epsilon: self.epsilon,
        })
    }
}

/// Per-voxel eigenvalues (descending) and eigenvectors (columns).
#[derive(Debug, Clone)]
pub struct AnisotropyEstimate {
    template: ScalarField,
    eigen: Vec<SymEigen3>,
    epsilon: f64,
}

impl AnisotropyEstimate {
    pub fn shape(&self) -> GridShape {
        self.template.shape()
    }

    pub fn eigenvalues(&self, voxel: usize) -> [f64; 3] {
        self.eigen[voxel].values
    }

    /// Row-major 3×3, columns are eigenvectors.
    pub fn eigenvectors(&self, voxel: usize) -> [f64; 9] {
        self.eigen[voxel].vectors
    }

    pub fn strengths(&self, voxel: usize) -> [f64; 3] {
        anisotropy_strengths(self.eigen[voxel].values, self.epsilon)
    }

    /// Tagged per-voxel `(amplitude, axis)` view.
    pub fn to_field(&self) -> AnisotropyField {
        let (amplitude, axes): (Vec<f64>, Vec<[f64; 3]>) = self
            .eigen
            .par_iter()
            .map(|e| {
                let b = anisotropy_strengths(e.values, self.epsilon);
                let amp = b.iter().fold(0.0f64, |m, v| m.max(v.abs()));
                (amp, e.vector(0))
            })
            .unzip();
        let mut amp_field = self.template.clone();
        amp_field.data_mut().copy_from_slice(&amplitude);
        AnisotropyField {
            amplitude: amp_field,
            axes,
        }
    }

    /// Harmonic coefficients a_lm with the amplitude placed on (l=2, m=0).
    ///
    /// The amplitude is not rotated into each voxel's principal frame;
    /// [`AnisotropyField`] keeps the axis for solvers that need it.
    pub fn to_coefficients(
        &self,
        lmax: usize,
        smoothing: Option<f64>,
    ) -> FieldResult<AnisotropyCoefficientField> {
        let mut coeffs = AnisotropyCoefficientField::zeros(&self.template, lmax);
        if lmax >= 2 {
            coeffs.planes[lm_index(2, 0)] = self.to_field().amplitude;
        }
        if let Some(sigma) = smoothing.filter(|&s| s > 0.0) {
            coeffs.smooth(sigma)?;
        }
        Ok(coeffs)
    }
}

/// Per-voxel anisotropy amplitude and preferred axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnisotropyField {
    pub amplitude: ScalarField,
    pub axes: Vec<[f64; 3]>,
}

impl AnisotropyField {
    /// Per-voxel axes for the quadrupole solver.
    pub fn principal_axis(&self) -> PrincipalAxis {
        PrincipalAxis::PerVoxel(self.axes.clone())
    }
}

/// Per-voxel real-harmonic coefficients a_lm, one grid plane per (l, m)
/// in `l² + (m + l)` order. Planes with l < 2 stay zero.
#[derive(Debug, Clone, PartialEq)]
pub struct AnisotropyCoefficientField {
    lmax: usize,
    planes: Vec<ScalarField>,
}

impl AnisotropyCoefficientField {
    pub fn zeros(like: &ScalarField, lmax: usize) -> Self {
        Self {
            lmax,
            planes: vec![like.zeros_like(); lm_count(lmax)],
        }
    }

    /// Build from explicit planes; l < 2 planes must be zero.
    pub fn from_planes(lmax: usize, planes: Vec<ScalarField>) -> FieldResult<Self> {
        if planes.len() != lm_count(lmax) {
            return Err(FieldError::invalid(format!(
                "expected {} coefficient planes for lmax={lmax}, got {}",
                lm_count(lmax),
                planes.len()
            )));
        }
        if let Some(first) = planes.first() {
            for p in &planes[1..] {
                first.ensure_same_shape(p, "coefficient plane")?;
            }
        }
        if planes.iter().take(4).any(|p| !p.is_all_zero()) {
            return Err(FieldError::invalid(
                "a_lm with l < 2 must be zero".to_string(),
            ));
        }
        Ok(Self { lmax, planes })
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn plane(&self, l: usize, m: i64) -> &ScalarField {
        &self.planes[lm_index(l, m)]
    }

    pub fn planes(&self) -> &[ScalarField] {
        &self.planes
    }

    /// a_lm of one voxel in flattened order.
    pub fn at(&self, voxel: usize) -> Vec<f64> {
        self.planes.iter().map(|p| p.data()[voxel]).collect()
    }

    /// Gaussian-smooth every plane (σ in voxels).
    pub fn smooth(&mut self, sigma: f64) -> FieldResult<()> {
        for plane in self.planes.iter_mut().skip(4) {
            if !plane.is_all_zero() {
                *plane = gaussian_smooth(plane, sigma)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_field(n: usize, f: impl Fn([f64; 3]) -> f64) -> ScalarField {
        let shape = GridShape::cube(n);
        ScalarField::from_fn(shape, ScalarField::centered_origin(shape, [1.0; 3]), [1.0; 3], f)
            .unwrap()
    }

    #[test]
    fn test_strengths_sum_to_zero() {
        let b = anisotropy_strengths([3.0, 1.0, -0.5], STRENGTH_EPS);
        assert!((b[0] + b[1] + b[2]).abs() < 1e-12);
        assert_eq!(anisotropy_strengths([0.0; 3], STRENGTH_EPS), [0.0; 3]);
    }

    #[test]
    fn test_constant_density_is_isotropic() {
        let rho = cube_field(7, |_| 2.5);
        let est = AnisotropyEstimator::default().estimate(&rho, None).unwrap();
        for v in 0..rho.len() {
            let l = est.eigenvalues(v);
            assert!(l[0] == l[1] && l[1] == l[2], "λ[{v}] = {l:?}");
            assert!(est.strengths(v).iter().all(|b| b.abs() < 1e-12));
        }
        assert!(est.to_field().amplitude.is_all_zero());
    }

    #[test]
    fn test_smoothed_symmetric_blob_centre_has_equal_eigenvalues() {
        let rho = cube_field(11, |p| (-(p[0] * p[0] + p[1] * p[1] + p[2] * p[2]) / 8.0).exp());
        let est = AnisotropyEstimator::default()
            .estimate(&rho, Some(1.5))
            .unwrap();
        let c = rho.shape().index(5, 5, 5);
        let l = est.eigenvalues(c);
        assert!(l[0] > 0.0);
        assert!((l[0] - l[2]).abs() < 1e-9 * l[0], "λ = {l:?}");
        assert!(est.strengths(c).iter().all(|b| b.abs() < 1e-8));
    }

    #[test]
    fn test_planar_wave_axis_and_amplitude() {
        let n = 8;
        let k = 2.0 * std::f64::consts::PI / n as f64;
        let rho = cube_field(n, |p| (k * p[0]).sin());
        let field = AnisotropyEstimator::default()
            .estimate(&rho, None)
            .unwrap()
            .to_field();
        let mut checked = 0;
        for v in 0..rho.len() {
            if field.amplitude.data()[v] == 0.0 {
                continue;
            }
            assert!((field.amplitude.data()[v] - 2.0).abs() < 1e-9);
            assert!((field.axes[v][0].abs() - 1.0).abs() < 1e-12);
            checked += 1;
        }
        assert!(checked > 0);
    }

    #[test]
    fn test_coefficients_place_amplitude_on_l2_m0() {
        let n = 8;
        let k = 2.0 * std::f64::consts::PI / n as f64;
        let rho = cube_field(n, |p| (k * p[1]).cos());
        let est = AnisotropyEstimator::default().estimate(&rho, None).unwrap();
        let coeffs = est.to_coefficients(3, None).unwrap();
        assert_eq!(coeffs.planes().len(), 16);
        assert_eq!(coeffs.plane(2, 0), &est.to_field().amplitude);
        for (idx, plane) in coeffs.planes().iter().enumerate() {
            if idx != lm_index(2, 0) {
                assert!(plane.is_all_zero(), "plane {idx} non-zero");
            }
        }
        let low = est.to_coefficients(1, None).unwrap();
        assert!(low.planes().iter().all(|p| p.is_all_zero()));
    }

    #[test]
    fn test_coefficient_smoothing_spreads_amplitude() {
        let rho = cube_field(9, |p| if p[0].abs() < 1.0 { 1.0 } else { 0.0 });
        let est = AnisotropyEstimator::default().estimate(&rho, None).unwrap();
        let raw = est.to_coefficients(2, None).unwrap();
        let smooth = est.to_coefficients(2, Some(1.0)).unwrap();
        let count = |f: &ScalarField| f.data().iter().filter(|&&v| v > 1e-6).count();
        assert!(count(smooth.plane(2, 0)) > count(raw.plane(2, 0)));
    }

    #[test]
    fn test_from_planes_validation() {
        let like = cube_field(3, |_| 0.0);
        assert!(AnisotropyCoefficientField::from_planes(2, vec![like.clone(); 8]).is_err());
        let mut planes = vec![like.clone(); 9];
        planes[1] = like.map(|_| 1.0);
        assert!(AnisotropyCoefficientField::from_planes(2, planes).is_err());
        assert!(AnisotropyCoefficientField::from_planes(2, vec![like; 9]).is_ok());
    }
}
