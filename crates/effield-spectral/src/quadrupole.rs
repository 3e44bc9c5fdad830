// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Quadrupole (l = 2) Correction Solver
// ─────────────────────────────────────────────────────────────────────
//! Φ2(x) = Σ_y ρ(y)·a2(y)·K(x − y)·dV with the direction-dependent kernel
//!
//!   K(r) = −G·(cos²θ − 1/3) / |r|,   K(0) = 0,
//!
//! θ the angle between r and the principal axis. The kernel is sampled
//! in real space at minimum-image offsets of the padded grid, so with
//! a padding factor ≥ 2 the FFT convolution reproduces the free-space
//! discrete sum exactly.
//!
//! Per-voxel axes use K(r; n) = Σ_ij n_i n_j K_ij(r) with
//! K_ij = −G·(r̂_i r̂_j − δ_ij/3)/|r|, i.e. six convolutions.

use rayon::prelude::*;
use rustfft::num_complex::Complex64;

use effield_physics::multiplier::mu0_fn;
use effield_types::{
    FieldError, FieldResult, GridShape, ScalarField, ScaleMultiplierParams, SolverConfig,
};

use crate::fft::{crop_real, embed, min_image, padded_shape, wavenumber_axes, FftPlanCache};
use crate::green::KMultiplier;

/// Principal axis of the quadrupole kernel.
#[derive(Debug, Clone, PartialEq)]
pub enum PrincipalAxis {
    /// One axis for the whole grid.
    Global([f64; 3]),
    /// One axis per voxel, in flat grid order. Zero vectors contribute nothing.
    PerVoxel(Vec<[f64; 3]>),
}

/// Upper-triangle component pairs of a symmetric 3×3 tensor.
const PAIRS: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (0, 2), (1, 2)];

fn normalise(v: [f64; 3]) -> Option<[f64; 3]> {
    let n = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if n > 0.0 && n.is_finite() {
        Some([v[0] / n, v[1] / n, v[2] / n])
    } else {
        None
    }
}

/// FFT solver for the l = 2 correction potential.
pub struct AnisotropicCorrectionSolver {
    g: f64,
    zero_pad_factor: usize,
    multiplier: Option<KMultiplier>,
    plans: FftPlanCache,
}

impl AnisotropicCorrectionSolver {
    pub fn new(g: f64) -> FieldResult<Self> {
        if !g.is_finite() {
            return Err(FieldError::invalid(format!("G must be finite, got {g}")));
        }
        Ok(Self {
            g,
            zero_pad_factor: 2,
            multiplier: None,
            plans: FftPlanCache::new(),
        })
    }

    pub fn from_config(config: &SolverConfig) -> FieldResult<Self> {
        config.validate()?;
        Self::new(config.g)?.with_padding(config.zero_pad_factor)
    }

    pub fn with_padding(mut self, factor: usize) -> FieldResult<Self> {
        if factor == 0 {
            return Err(FieldError::invalid("zero_pad_factor must be >= 1"));
        }
        self.zero_pad_factor = factor;
        Ok(self)
    }

    pub fn with_multiplier(mut self, f: KMultiplier) -> Self {
        self.multiplier = Some(f);
        self
    }

    pub fn with_scale_multiplier(self, params: ScaleMultiplierParams) -> FieldResult<Self> {
        params.validate()?;
        Ok(self.with_multiplier(mu0_fn(params)))
    }

    /// Quadrupole correction Φ2 for `density` weighted by `a2`.
    ///
    /// a2 ≡ 0 yields an exactly-zero field without any transform.
    pub fn solve_l2(
        &self,
        density: &ScalarField,
        a2: &ScalarField,
        axis: &PrincipalAxis,
    ) -> FieldResult<ScalarField> {
        density.ensure_same_shape(a2, "a2")?;
        let q = density.zip_map(a2, |rho, w| rho * w)?;
        if q.is_all_zero() {
            log::debug!("solve_l2: source ρ·a2 is identically zero");
            return Ok(density.zeros_like());
        }

        let shape = density.shape();
        let padded = padded_shape(shape, self.zero_pad_factor);
        let spacing = density.spacing();
        let scale = -self.g * density.voxel_volume();

        let mut acc = match axis {
            PrincipalAxis::Global(n) => {
                let n = normalise(*n).ok_or_else(|| {
                    FieldError::invalid(format!("principal axis must be non-zero, got {n:?}"))
                })?;
                let mut src = embed(q.data(), shape, padded);
                self.plans.forward(&mut src, padded);
                let kernel = self.kernel(padded, spacing, |r, rn| {
                    let c = (r[0] * n[0] + r[1] * n[1] + r[2] * n[2]) / rn;
                    scale * (c * c - 1.0 / 3.0) / rn
                });
                src.iter_mut().zip(kernel.iter()).for_each(|(s, k)| *s *= *k);
                src
            }
            PrincipalAxis::PerVoxel(axes) => {
                if axes.len() != shape.len() {
                    return Err(FieldError::invalid(format!(
                        "per-voxel axis count {} does not match grid size {}",
                        axes.len(),
                        shape.len()
                    )));
                }
                let unit: Vec<[f64; 3]> = axes
                    .iter()
                    .map(|&v| normalise(v).unwrap_or([0.0; 3]))
                    .collect();
                let mut acc = vec![Complex64::new(0.0, 0.0); padded.len()];
                for &(i, j) in PAIRS.iter() {
                    let weighted: Vec<f64> = q
                        .data()
                        .iter()
                        .zip(unit.iter())
                        .map(|(&qv, n)| qv * n[i] * n[j])
                        .collect();
                    let mut src = embed(&weighted, shape, padded);
                    self.plans.forward(&mut src, padded);
                    let delta = if i == j { 1.0 / 3.0 } else { 0.0 };
                    // off-diagonal pairs appear twice in Σ_ij
                    let mult = if i == j { 1.0 } else { 2.0 };
                    let kernel = self.kernel(padded, spacing, |r, rn| {
                        mult * scale * (r[i] * r[j] / (rn * rn) - delta) / rn
                    });
                    acc.iter_mut()
                        .zip(src.iter().zip(kernel.iter()))
                        .for_each(|(a, (s, k))| *a += *s * *k);
                }
                acc
            }
        };

        if let Some(mu) = &self.multiplier {
            let [kx, ky, kz] = wavenumber_axes(padded, spacing);
            for (idx, v) in acc.iter_mut().enumerate() {
                let [ix, iy, iz] = padded.unravel(idx);
                let k = (kx[ix] * kx[ix] + ky[iy] * ky[iy] + kz[iz] * kz[iz]).sqrt();
                *v *= mu(k);
            }
        }

        self.plans.inverse(&mut acc, padded);
        density.with_data(crop_real(&acc, shape, padded))
    }

    /// Transformed real-space kernel `f(r, |r|)` on minimum-image offsets, zero at r = 0.
    fn kernel(
        &self,
        padded: GridShape,
        spacing: [f64; 3],
        f: impl Fn([f64; 3], f64) -> f64 + Sync,
    ) -> Vec<Complex64> {
        let dims = padded.dims();
        let mut buf: Vec<Complex64> = (0..padded.len())
            .into_par_iter()
            .map(|idx| {
                let c = padded.unravel(idx);
                let r = [
                    min_image(c[0], dims[0]) as f64 * spacing[0],
                    min_image(c[1], dims[1]) as f64 * spacing[1],
                    min_image(c[2], dims[2]) as f64 * spacing[2],
                ];
                let rn = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
                if rn == 0.0 {
                    Complex64::new(0.0, 0.0)
                } else {
                    Complex64::new(f(r, rn), 0.0)
                }
            })
            .collect();
        self.plans.forward(&mut buf, padded);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(n: usize) -> ScalarField {
        let c = n as f64 / 2.0;
        ScalarField::from_fn(GridShape::cube(n), [0.0; 3], [1.0; 3], |p| {
            let d2 = (p[0] - c).powi(2) + (p[1] - c - 0.7).powi(2) + (p[2] - c).powi(2);
            (-d2 / 4.0).exp()
        })
        .unwrap()
    }

    /// Brute-force Σ_y q(y) K(x − y) dV for a global axis.
    fn direct_l2(q: &ScalarField, n: [f64; 3], g: f64) -> Vec<f64> {
        let shape = q.shape();
        let dv = q.voxel_volume();
        (0..shape.len())
            .map(|i| {
                let [ax, ay, az] = shape.unravel(i);
                let x = q.voxel_center(ax, ay, az);
                let mut acc = 0.0;
                for j in 0..shape.len() {
                    if i == j {
                        continue;
                    }
                    let [bx, by, bz] = shape.unravel(j);
                    let y = q.voxel_center(bx, by, bz);
                    let r = [x[0] - y[0], x[1] - y[1], x[2] - y[2]];
                    let rn = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
                    let c = (r[0] * n[0] + r[1] * n[1] + r[2] * n[2]) / rn;
                    acc += q.data()[j] * -g * (c * c - 1.0 / 3.0) / rn * dv;
                }
                acc
            })
            .collect()
    }

    #[test]
    fn test_zero_weight_gives_exact_zero() {
        let rho = blob(8);
        let a2 = rho.zeros_like();
        let solver = AnisotropicCorrectionSolver::new(1.0).unwrap();
        let phi = solver
            .solve_l2(&rho, &a2, &PrincipalAxis::Global([0.0, 0.0, 1.0]))
            .unwrap();
        assert!(phi.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_padded_solve_equals_direct_sum() {
        let rho = blob(7);
        let a2 = rho.map(|_| 0.4);
        let axis = [0.3, -0.2, 0.9];
        let solver = AnisotropicCorrectionSolver::new(1.0).unwrap();
        let phi = solver
            .solve_l2(&rho, &a2, &PrincipalAxis::Global(axis))
            .unwrap();
        let q = rho.zip_map(&a2, |a, b| a * b).unwrap();
        let n = normalise(axis).unwrap();
        let direct = direct_l2(&q, n, 1.0);
        let peak = direct.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        for (i, (a, b)) in phi.data().iter().zip(direct.iter()).enumerate() {
            assert!(
                (a - b).abs() < 1e-9 * peak.max(1.0),
                "Φ2[{i}] = {a}, direct {b}"
            );
        }
    }

    #[test]
    fn test_uniform_per_voxel_axis_matches_global() {
        let rho = blob(8);
        let a2 = rho.map(|v| 0.5 * v);
        let axis = [1.0, 1.0, 0.5];
        let solver = AnisotropicCorrectionSolver::new(1.0).unwrap();
        let global = solver
            .solve_l2(&rho, &a2, &PrincipalAxis::Global(axis))
            .unwrap();
        let per = solver
            .solve_l2(&rho, &a2, &PrincipalAxis::PerVoxel(vec![axis; rho.len()]))
            .unwrap();
        let peak = global.data().iter().fold(0.0f64, |m, v| m.max(v.abs()));
        for (i, (a, b)) in global.data().iter().zip(per.data()).enumerate() {
            assert!((a - b).abs() < 1e-9 * peak, "Φ2[{i}]: {a} vs {b}");
        }
    }

    #[test]
    fn test_constant_multiplier_doubles_correction() {
        let rho = blob(8);
        let a2 = rho.map(|_| 0.5);
        let axis = PrincipalAxis::Global([0.0, 1.0, 1.0]);
        let base = AnisotropicCorrectionSolver::new(1.0)
            .unwrap()
            .solve_l2(&rho, &a2, &axis)
            .unwrap();
        let doubled = AnisotropicCorrectionSolver::new(1.0)
            .unwrap()
            .with_multiplier(Box::new(|_| 2.0))
            .solve_l2(&rho, &a2, &axis)
            .unwrap();
        let peak = base.data().iter().fold(0.0f64, |m, v| m.max(v.abs()));
        assert!(peak > 0.0);
        for (i, (a, b)) in base.data().iter().zip(doubled.data()).enumerate() {
            assert!((2.0 * a - b).abs() < 1e-12 * peak, "Φ2[{i}]: {a} vs {b}");
        }
    }

    #[test]
    fn test_rejects_mismatched_inputs() {
        let rho = blob(6);
        let a2 = ScalarField::zeros(GridShape::new(6, 6, 5), [0.0; 3], [1.0; 3]).unwrap();
        let solver = AnisotropicCorrectionSolver::new(1.0).unwrap();
        assert!(solver
            .solve_l2(&rho, &a2, &PrincipalAxis::Global([0.0, 0.0, 1.0]))
            .is_err());
        let a2 = rho.map(|_| 1.0);
        assert!(solver
            .solve_l2(&rho, &a2, &PrincipalAxis::PerVoxel(vec![[0.0, 0.0, 1.0]; 3]))
            .is_err());
        assert!(solver
            .solve_l2(&rho, &a2, &PrincipalAxis::Global([0.0; 3]))
            .is_err());
    }

    #[test]
    fn test_axial_sign_pattern() {
        // single source: along the axis cos² = 1 → K < 0; in the plane cos² = 0 → K > 0
        let mut rho = ScalarField::zeros(GridShape::cube(9), [0.0; 3], [1.0; 3]).unwrap();
        rho.set(4, 4, 4, 1.0);
        let a2 = rho.map(|_| 1.0);
        let phi = AnisotropicCorrectionSolver::new(1.0)
            .unwrap()
            .solve_l2(&rho, &a2, &PrincipalAxis::Global([0.0, 0.0, 1.0]))
            .unwrap();
        assert!(phi.get(4, 4, 6) < 0.0);
        assert!(phi.get(6, 4, 4) > 0.0);
        assert!((phi.get(4, 4, 6) + 2.0 * phi.get(6, 4, 4)).abs() < 1e-12);
    }
}
