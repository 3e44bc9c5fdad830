// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Direct Summation
// ─────────────────────────────────────────────────────────────────────
//! Brute-force O(N)-per-query reference sums used to validate the
//! spectral solvers.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use effield_physics::harmonics::{index_lm, lm_count, real_sph_harm_dir};
use effield_types::{FieldError, FieldResult, ScalarField, SolverConfig};

use crate::anisotropy::AnisotropyCoefficientField;

/// Separations below this are treated as the query voxel itself.
const SELF_DISTANCE: f64 = 1e-12;
const SELF_DISTANCE_SQ: f64 = 1e-24;
const MIN_POINT_DISTANCE: f64 = 1e-9;

/// A point mass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSource {
    pub position: [f64; 3],
    pub mass: f64,
}

/// Non-zero a_lm planes that take part in Â.
struct ActivePlane<'a> {
    l: usize,
    m: i64,
    data: &'a [f64],
}

fn active_planes<'a>(
    density: &ScalarField,
    coeffs: Option<&'a AnisotropyCoefficientField>,
    lmax: usize,
) -> FieldResult<Vec<ActivePlane<'a>>> {
    let Some(coeffs) = coeffs else {
        return Ok(Vec::new());
    };
    let lmax = lmax.min(coeffs.lmax());
    let mut out = Vec::new();
    for (idx, plane) in coeffs.planes().iter().enumerate().take(lm_count(lmax)) {
        density.ensure_same_shape(plane, "anisotropy coefficients")?;
        let (l, m) = index_lm(idx);
        if l >= 2 && !plane.is_all_zero() {
            out.push(ActivePlane {
                l,
                m,
                data: plane.data(),
            });
        }
    }
    Ok(out)
}

/// Â = 1 + Σ a_lm·Y_lm(r̂) at one source voxel.
#[inline]
fn angular_factor(planes: &[ActivePlane<'_>], voxel: usize, r: [f64; 3]) -> f64 {
    planes.iter().fold(1.0, |acc, p| {
        let a = p.data[voxel];
        if a == 0.0 {
            acc
        } else {
            acc + a * real_sph_harm_dir(p.l, p.m, r)
        }
    })
}

/// Direct sums over a density grid or a set of point masses.
#[derive(Debug, Clone, Copy)]
pub struct DirectSummationEvaluator {
    g: f64,
    c: f64,
    softening: f64,
}

impl DirectSummationEvaluator {
    pub fn new(g: f64, c: f64) -> FieldResult<Self> {
        if !g.is_finite() || !(c.is_finite() && c > 0.0) {
            return Err(FieldError::invalid(format!(
                "G must be finite and c > 0, got G={g}, c={c}"
            )));
        }
        Ok(Self { g, c, softening: 0.0 })
    }

    pub fn from_config(config: &SolverConfig) -> FieldResult<Self> {
        config.validate()?;
        Self::new(config.g, config.c)?.with_softening(config.softening)
    }

    /// Plummer softening ε.
    pub fn with_softening(mut self, eps: f64) -> FieldResult<Self> {
        if !(eps.is_finite() && eps >= 0.0) {
            return Err(FieldError::invalid(format!("softening must be >= 0, got {eps}")));
        }
        self.softening = eps;
        Ok(self)
    }

    pub fn softening(&self) -> f64 {
        self.softening
    }

    /// Φ(x) = −G·Σ ρ(y)·Â_y(r̂)/sqrt(|x−y|² + ε²)·dV, r = x − y.
    ///
    /// `lmax` caps the harmonic orders taken from `coeffs`.
    pub fn phi_eff_direct(
        &self,
        point: [f64; 3],
        density: &ScalarField,
        coeffs: Option<&AnisotropyCoefficientField>,
        lmax: usize,
    ) -> FieldResult<f64> {
        let planes = active_planes(density, coeffs, lmax)?;
        Ok(self.phi_with(point, density, &planes))
    }

    /// Λ(x) = (G/c)·Σ ρ(y)·Â_y(r̂)/(|x−y|² + ε²)·dV.
    pub fn lambda_direct(
        &self,
        point: [f64; 3],
        density: &ScalarField,
        coeffs: Option<&AnisotropyCoefficientField>,
        lmax: usize,
    ) -> FieldResult<f64> {
        let planes = active_planes(density, coeffs, lmax)?;
        Ok(self.lambda_with(point, density, &planes))
    }

    /// [`Self::phi_eff_direct`] for many points in parallel.
    pub fn phi_eff_batch(
        &self,
        points: &[[f64; 3]],
        density: &ScalarField,
        coeffs: Option<&AnisotropyCoefficientField>,
        lmax: usize,
    ) -> FieldResult<Vec<f64>> {
        let planes = active_planes(density, coeffs, lmax)?;
        Ok(points
            .par_iter()
            .map(|&x| self.phi_with(x, density, &planes))
            .collect())
    }

    /// [`Self::lambda_direct`] for many points in parallel.
    pub fn lambda_batch(
        &self,
        points: &[[f64; 3]],
        density: &ScalarField,
        coeffs: Option<&AnisotropyCoefficientField>,
        lmax: usize,
    ) -> FieldResult<Vec<f64>> {
        let planes = active_planes(density, coeffs, lmax)?;
        Ok(points
            .par_iter()
            .map(|&x| self.lambda_with(x, density, &planes))
            .collect())
    }

    /// Newtonian acceleration G·Σ m·(y − x)/(d² + ε²)^{3/2}, d ≥ 1e-9.
    pub fn acceleration_from_points(&self, point: [f64; 3], sources: &[PointSource]) -> [f64; 3] {
        let eps2 = self.softening * self.softening;
        let mut acc = [0.0; 3];
        for s in sources {
            let d = [
                s.position[0] - point[0],
                s.position[1] - point[1],
                s.position[2] - point[2],
            ];
            let dist = (d[0] * d[0] + d[1] * d[1] + d[2] * d[2])
                .sqrt()
                .max(MIN_POINT_DISTANCE);
            let inv = self.g * s.mass / (dist * dist + eps2).powf(1.5);
            for a in 0..3 {
                acc[a] += inv * d[a];
            }
        }
        acc
    }

    /// [`Self::acceleration_from_points`] for many points in parallel.
    pub fn acceleration_batch(&self, points: &[[f64; 3]], sources: &[PointSource]) -> Vec<[f64; 3]> {
        points
            .par_iter()
            .map(|&x| self.acceleration_from_points(x, sources))
            .collect()
    }

    fn phi_with(&self, x: [f64; 3], density: &ScalarField, planes: &[ActivePlane<'_>]) -> f64 {
        let eps2 = self.softening * self.softening;
        let shape = density.shape();
        let mut acc = 0.0;
        for (idx, &rho) in density.data().iter().enumerate() {
            if rho == 0.0 {
                continue;
            }
            let [ix, iy, iz] = shape.unravel(idx);
            let y = density.voxel_center(ix, iy, iz);
            let r = [x[0] - y[0], x[1] - y[1], x[2] - y[2]];
            let r2 = r[0] * r[0] + r[1] * r[1] + r[2] * r[2];
            if r2.sqrt() < SELF_DISTANCE {
                continue;
            }
            acc += rho * angular_factor(planes, idx, r) / (r2 + eps2).sqrt();
        }
        -self.g * acc * density.voxel_volume()
    }

    fn lambda_with(&self, x: [f64; 3], density: &ScalarField, planes: &[ActivePlane<'_>]) -> f64 {
        let eps2 = self.softening * self.softening;
        let shape = density.shape();
        let mut acc = 0.0;
        for (idx, &rho) in density.data().iter().enumerate() {
            if rho == 0.0 {
                continue;
            }
            let [ix, iy, iz] = shape.unravel(idx);
            let y = density.voxel_center(ix, iy, iz);
            let r = [x[0] - y[0], x[1] - y[1], x[2] - y[2]];
            let r2 = r[0] * r[0] + r[1] * r[1] + r[2] * r[2];
            if r2 < SELF_DISTANCE_SQ {
                continue;
            }
            acc += rho * angular_factor(planes, idx, r) / (r2 + eps2);
        }
        self.g / self.c * acc * density.voxel_volume()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use effield_types::GridShape;

    fn point_density(n: usize, mass: f64) -> ScalarField {
        let shape = GridShape::cube(n);
        let mut f = ScalarField::zeros(shape, ScalarField::centered_origin(shape, [1.0; 3]), [1.0; 3]).unwrap();
        let c = n / 2;
        f.set(c, c, c, mass);
        f
    }

    fn eval() -> DirectSummationEvaluator {
        DirectSummationEvaluator::new(1.0, 1.0).unwrap()
    }

    #[test]
    fn test_single_voxel_potential() {
        let rho = point_density(5, 2.0);
        let e = eval();
        let phi = e.phi_eff_direct([3.0, 4.0, 0.0], &rho, None, 0).unwrap();
        assert!((phi + 2.0 / 5.0).abs() < 1e-14);
        // the source voxel itself is skipped
        assert_eq!(e.phi_eff_direct([0.0; 3], &rho, None, 0).unwrap(), 0.0);
        let lam = e.lambda_direct([3.0, 4.0, 0.0], &rho, None, 0).unwrap();
        assert!((lam - 2.0 / 25.0).abs() < 1e-14);
    }

    #[test]
    fn test_softening_regularises() {
        let rho = point_density(5, 1.0);
        let e = eval().with_softening(1.0).unwrap();
        let phi = e.phi_eff_direct([1.0, 0.0, 0.0], &rho, None, 0).unwrap();
        assert!((phi + 1.0 / 2f64.sqrt()).abs() < 1e-14);
        assert!(eval().with_softening(-1.0).is_err());
    }

    #[test]
    fn test_quadrupole_coefficients_modulate_by_direction() {
        let rho = point_density(5, 1.0);
        let mut planes = vec![rho.zeros_like(); 9];
        planes[6] = rho.map(|_| 1.0);
        let coeffs = AnisotropyCoefficientField::from_planes(2, planes).unwrap();
        let e = eval();
        let y20_pole = (5.0 / (4.0 * std::f64::consts::PI)).sqrt();
        let along_z = e.phi_eff_direct([0.0, 0.0, 2.0], &rho, Some(&coeffs), 2).unwrap();
        assert!((along_z + (1.0 + y20_pole) / 2.0).abs() < 1e-12);
        let along_x = e.phi_eff_direct([2.0, 0.0, 0.0], &rho, Some(&coeffs), 2).unwrap();
        assert!((along_x + (1.0 - 0.5 * y20_pole) / 2.0).abs() < 1e-12);
        // lmax = 1 ignores every l = 2 plane
        let iso = e.phi_eff_direct([0.0, 0.0, 2.0], &rho, Some(&coeffs), 1).unwrap();
        assert!((iso + 0.5).abs() < 1e-14);
    }

    #[test]
    fn test_mismatched_coefficients_rejected() {
        let rho = point_density(5, 1.0);
        let other = point_density(3, 1.0);
        let mut planes = vec![other.zeros_like(); 9];
        planes[6] = other.map(|_| 1.0);
        let coeffs = AnisotropyCoefficientField::from_planes(2, planes).unwrap();
        assert!(eval().phi_eff_direct([0.0; 3], &rho, Some(&coeffs), 2).is_err());
    }

    #[test]
    fn test_batches_match_single_queries() {
        let shape = GridShape::cube(6);
        let rho = ScalarField::from_fn(shape, [0.0; 3], [0.5; 3], |p| p[0] + p[1] * p[2]).unwrap();
        let e = eval();
        let pts = [[0.1, 0.2, 0.3], [5.0, -1.0, 2.0], [1.25, 1.25, 1.25]];
        let phi = e.phi_eff_batch(&pts, &rho, None, 0).unwrap();
        let lam = e.lambda_batch(&pts, &rho, None, 0).unwrap();
        for (i, &p) in pts.iter().enumerate() {
            assert_eq!(phi[i], e.phi_eff_direct(p, &rho, None, 0).unwrap());
            assert_eq!(lam[i], e.lambda_direct(p, &rho, None, 0).unwrap());
        }
    }

    #[test]
    fn test_point_mass_acceleration() {
        let e = eval();
        let src = [PointSource {
            position: [0.0; 3],
            mass: 4.0,
        }];
        let a = e.acceleration_from_points([2.0, 0.0, 0.0], &src);
        assert!((a[0] + 1.0).abs() < 1e-15);
        assert_eq!(a[1], 0.0);
        let batch = e.acceleration_batch(&[[2.0, 0.0, 0.0], [0.0, -1.0, 0.0]], &src);
        assert_eq!(batch[0], a);
        assert!((batch[1][1] - 4.0).abs() < 1e-15);
    }
}
