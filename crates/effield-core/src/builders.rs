// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Test and Model Source Builders
// ─────────────────────────────────────────────────────────────────────
//! Analytic density/emission sources on centred regular grids.
//!
//! All grids are centred on the coordinate origin, so voxel centres sit
//! at `(i − (n−1)/2)·d`.

use effield_types::{FieldError, FieldResult, GridShape, ScalarField};

fn positive(name: &str, v: f64) -> FieldResult<()> {
    if !(v.is_finite() && v > 0.0) {
        return Err(FieldError::invalid(format!(
            "{name} must be finite and > 0, got {v}"
        )));
    }
    Ok(())
}

fn centred(shape: GridShape, spacing: [f64; 3], f: impl Fn([f64; 3]) -> f64) -> FieldResult<ScalarField> {
    let origin = ScalarField::centered_origin(shape, spacing);
    ScalarField::from_fn(shape, origin, spacing, f)
}

/// Uniform-density ball of `radius`.
///
/// Without an explicit size the cube is the smallest odd side ≥ 8 that
/// encloses the ball with a one-voxel margin.
pub fn uniform_sphere(
    radius: f64,
    rho0: f64,
    spacing: f64,
    n: Option<usize>,
) -> FieldResult<ScalarField> {
    positive("radius", radius)?;
    positive("spacing", spacing)?;
    let n = n.unwrap_or_else(|| ((2.0 * radius / spacing).ceil() as usize + 2).max(8) | 1);
    centred(GridShape::cube(n), [spacing; 3], |p| {
        let r2 = p[0] * p[0] + p[1] * p[1] + p[2] * p[2];
        if r2 <= radius * radius {
            rho0
        } else {
            0.0
        }
    })
}

/// Uniform cylinder of `length` along z.
pub fn finite_rod(length: f64, radius: f64, rho0: f64, spacing: f64) -> FieldResult<ScalarField> {
    positive("length", length)?;
    positive("radius", radius)?;
    positive("spacing", spacing)?;
    let nxy = ((2.0 * radius / spacing).ceil() as usize + 4).max(8);
    let nz = ((length / spacing).ceil() as usize + 4).max(8);
    centred(GridShape::new(nxy, nxy, nz), [spacing; 3], |p| {
        if p[0].hypot(p[1]) <= radius && p[2].abs() <= 0.5 * length {
            rho0
        } else {
            0.0
        }
    })
}

/// Uniform slab disk of `radius` and full `thickness` in the x–y plane.
pub fn thin_disk(radius: f64, thickness: f64, rho0: f64, spacing: f64) -> FieldResult<ScalarField> {
    positive("radius", radius)?;
    positive("thickness", thickness)?;
    positive("spacing", spacing)?;
    let nxy = ((2.0 * radius / spacing).ceil() as usize + 4).max(8);
    let nz = ((thickness / spacing).ceil() as usize + 4).max(8);
    centred(GridShape::new(nxy, nxy, nz), [spacing; 3], |p| {
        if p[0].hypot(p[1]) <= radius && p[2].abs() <= 0.5 * thickness {
            rho0
        } else {
            0.0
        }
    })
}

/// Planar exponential disk j = i0·exp(−R/R_d).
pub fn exponential_disk(nx: usize, ny: usize, pix: f64, i0: f64, r_d: f64) -> FieldResult<ScalarField> {
    positive("r_d", r_d)?;
    centred(GridShape::planar(nx, ny), [pix, pix, 1.0], |p| {
        i0 * (-p[0].hypot(p[1]) / r_d).exp()
    })
}

/// Planar sum of equal-amplitude Gaussian blobs at `centres` (x, y).
pub fn gaussian_sources(
    nx: usize,
    ny: usize,
    pix: f64,
    centres: &[[f64; 2]],
    sigma: f64,
    amp: f64,
) -> FieldResult<ScalarField> {
    positive("sigma", sigma)?;
    let s2 = 2.0 * sigma * sigma;
    centred(GridShape::planar(nx, ny), [pix, pix, 1.0], |p| {
        centres
            .iter()
            .map(|c| amp * (-((p[0] - c[0]).powi(2) + (p[1] - c[1]).powi(2)) / s2).exp())
            .sum()
    })
}

/// Isotropic 3-D Gaussian centred in the box.
pub fn gaussian_blob(shape: GridShape, spacing: f64, sigma: f64, amplitude: f64) -> FieldResult<ScalarField> {
    positive("sigma", sigma)?;
    let s2 = 2.0 * sigma * sigma;
    centred(shape, [spacing; 3], |p| {
        amplitude * (-(p[0] * p[0] + p[1] * p[1] + p[2] * p[2]) / s2).exp()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_default_size_is_odd_and_encloses() {
        let s = uniform_sphere(3.0, 2.0, 1.0, None).unwrap();
        let n = s.shape().nx;
        assert_eq!(n % 2, 1);
        assert!(n >= 8);
        let c = n / 2;
        assert_eq!(s.get(c, c, c), 2.0);
        assert_eq!(s.get(0, 0, 0), 0.0);
        // voxel count approximates the ball volume
        let count = s.data().iter().filter(|&&v| v > 0.0).count() as f64;
        let vol = 4.0 / 3.0 * std::f64::consts::PI * 27.0;
        assert!((count - vol).abs() / vol < 0.2, "count {count} vs {vol}");
    }

    #[test]
    fn test_sphere_explicit_size() {
        let s = uniform_sphere(10.0, 1.0, 1.0, Some(41)).unwrap();
        assert_eq!(s.shape(), GridShape::cube(41));
        assert_eq!(s.voxel_center(20, 20, 20), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_rod_and_disk_extents() {
        let rod = finite_rod(10.0, 1.0, 1.0, 0.5).unwrap();
        assert!(rod.shape().nz > rod.shape().nx);
        let disk = thin_disk(5.0, 1.0, 1.0, 0.5).unwrap();
        assert!(disk.shape().nx > disk.shape().nz);
        assert!(disk.sum() > 0.0);
    }

    #[test]
    fn test_planar_builders() {
        let d = exponential_disk(33, 33, 0.5, 2.0, 3.0).unwrap();
        assert!(d.shape().is_planar());
        assert_eq!(d.get(16, 16, 0), 2.0);
        let g = gaussian_sources(21, 21, 1.0, &[[0.0, 0.0], [5.0, 0.0]], 1.0, 1.0).unwrap();
        assert!((g.get(10, 10, 0) - 1.0).abs() < 1e-5);
        assert!((g.get(15, 10, 0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        assert!(uniform_sphere(-1.0, 1.0, 1.0, None).is_err());
        assert!(gaussian_blob(GridShape::cube(4), 1.0, 0.0, 1.0).is_err());
        assert!(exponential_disk(8, 8, 1.0, 1.0, 0.0).is_err());
    }
}
