// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Monte-Carlo Shells
// ─────────────────────────────────────────────────────────────────────
//! Uniform random points on a sphere and the thin-shell acceleration
//! profile used to check the direct point-mass sum.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use effield_types::{FieldError, FieldResult};

use crate::direct::{DirectSummationEvaluator, PointSource};

/// `n` points uniform on the sphere of `radius` about the origin.
pub fn sample_sphere_points<R: Rng + ?Sized>(n: usize, radius: f64, rng: &mut R) -> Vec<[f64; 3]> {
    (0..n)
        .map(|_| {
            let u: f64 = rng.gen();
            let v: f64 = rng.gen();
            let az = 2.0 * std::f64::consts::PI * u;
            let polar = (2.0 * v - 1.0).acos();
            [
                radius * polar.sin() * az.cos(),
                radius * polar.sin() * az.sin(),
                radius * polar.cos(),
            ]
        })
        .collect()
}

/// Thin shell of total `mass` split over `n` equal point masses.
pub fn shell_sources(n: usize, radius: f64, mass: f64, seed: u64) -> FieldResult<Vec<PointSource>> {
    if n == 0 {
        return Err(FieldError::invalid("shell needs at least one point"));
    }
    if !(radius.is_finite() && radius > 0.0) {
        return Err(FieldError::invalid(format!("radius must be > 0, got {radius}")));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let m = mass / n as f64;
    Ok(sample_sphere_points(n, radius, &mut rng)
        .into_iter()
        .map(|position| PointSource { position, mass: m })
        .collect())
}

/// |a| at each radius along `direction` (normalised internally).
pub fn shell_acceleration_profile(
    evaluator: &DirectSummationEvaluator,
    sources: &[PointSource],
    radii: &[f64],
    direction: [f64; 3],
) -> FieldResult<Vec<f64>> {
    let norm = (direction[0].powi(2) + direction[1].powi(2) + direction[2].powi(2)).sqrt();
    if !(norm > 0.0 && norm.is_finite()) {
        return Err(FieldError::invalid("direction must be a non-zero vector"));
    }
    let unit = [direction[0] / norm, direction[1] / norm, direction[2] / norm];
    let points: Vec<[f64; 3]> = radii
        .iter()
        .map(|&r| [r * unit[0], r * unit[1], r * unit[2]])
        .collect();
    Ok(evaluator
        .acceleration_batch(&points, sources)
        .into_iter()
        .map(|a| (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_lie_on_sphere() {
        let mut rng = StdRng::seed_from_u64(7);
        let pts = sample_sphere_points(500, 3.0, &mut rng);
        for p in &pts {
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((r - 3.0).abs() < 1e-12);
        }
        // roughly isotropic: the mean position is near the centre
        let mz: f64 = pts.iter().map(|p| p[2]).sum::<f64>() / 500.0;
        assert!(mz.abs() < 0.3);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a = shell_sources(10, 1.0, 1.0, 42).unwrap();
        let b = shell_sources(10, 1.0, 1.0, 42).unwrap();
        assert_eq!(a, b);
        assert!((a.iter().map(|s| s.mass).sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(shell_sources(0, 1.0, 1.0, 42).is_err());
        assert!(shell_sources(5, 0.0, 1.0, 42).is_err());
    }

    #[test]
    fn test_profile_rejects_zero_direction() {
        let e = DirectSummationEvaluator::new(1.0, 1.0).unwrap();
        assert!(shell_acceleration_profile(&e, &[], &[1.0], [0.0; 3]).is_err());
    }
}
