// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Real Spherical Harmonics
// ─────────────────────────────────────────────────────────────────────
//! Orthonormal real spherical harmonics Y_lm and the flattened (l, m)
//! coefficient layout `idx = l² + (m + l)`.
//!
//! Convention (real basis, Condon–Shortley phase cancelled):
//!
//! - m > 0: Y_lm = √2 · N_l^m · P_l^m(cos θ) · cos(m φ)
//! - m = 0: Y_l0 = N_l^0 · P_l(cos θ)
//! - m < 0: Y_lm = √2 · N_l^|m| · P_l^|m|(cos θ) · sin(|m| φ)
//!
//! with N_l^m = sqrt((2l+1)/(4π) · (l−m)!/(l+m)!) and P_l^m the associated
//! Legendre function without the (−1)^m phase.

use std::f64::consts::PI;

/// Number of coefficients for all l ≤ `lmax`: (lmax + 1)².
#[inline]
pub fn lm_count(lmax: usize) -> usize {
    (lmax + 1) * (lmax + 1)
}

/// Flattened index of (l, m). Caller guarantees |m| ≤ l.
#[inline]
pub fn lm_index(l: usize, m: i64) -> usize {
    ((l * l + l) as i64 + m) as usize
}

/// Inverse of [`lm_index`].
pub fn index_lm(idx: usize) -> (usize, i64) {
    let mut l = 0usize;
    while (l + 1) * (l + 1) <= idx {
        l += 1;
    }
    let m = idx as i64 - (l * l) as i64 - l as i64;
    (l, m)
}

/// Associated Legendre P_l^m(x), m ≥ 0, no Condon–Shortley phase.
pub fn assoc_legendre(l: usize, m: usize, x: f64) -> f64 {
    if m > l {
        return 0.0;
    }
    let x = x.clamp(-1.0, 1.0);
    let mut pmm = 1.0;
    if m > 0 {
        let somx2 = ((1.0 - x) * (1.0 + x)).sqrt();
        let mut fact = 1.0;
        for _ in 0..m {
            pmm *= fact * somx2;
            fact += 2.0;
        }
    }
    if l == m {
        return pmm;
    }
    let mut pmmp1 = x * (2 * m + 1) as f64 * pmm;
    if l == m + 1 {
        return pmmp1;
    }
    let mut pll = 0.0;
    for ll in (m + 2)..=l {
        pll = (x * (2 * ll - 1) as f64 * pmmp1 - (ll + m - 1) as f64 * pmm) / (ll - m) as f64;
        pmm = pmmp1;
        pmmp1 = pll;
    }
    pll
}

fn norm(l: usize, m: usize) -> f64 {
    // (l-m)!/(l+m)! as a running product
    let mut ratio = 1.0;
    for i in (l - m + 1)..=(l + m) {
        ratio /= i as f64;
    }
    ((2 * l + 1) as f64 / (4.0 * PI) * ratio).sqrt()
}

/// Real Y_lm at polar angle `theta` ∈ [0, π] and azimuth `phi`.
pub fn real_sph_harm(l: usize, m: i64, theta: f64, phi: f64) -> f64 {
    let am = m.unsigned_abs() as usize;
    if am > l {
        return 0.0;
    }
    let base = norm(l, am) * assoc_legendre(l, am, theta.cos());
    match m {
        0 => base,
        m if m > 0 => std::f64::consts::SQRT_2 * base * (am as f64 * phi).cos(),
        _ => std::f64::consts::SQRT_2 * base * (am as f64 * phi).sin(),
    }
}

/// Real Y_lm evaluated on a direction vector (need not be normalised).
///
/// The zero vector maps to θ = 0.
pub fn real_sph_harm_dir(l: usize, m: i64, dir: [f64; 3]) -> f64 {
    let (theta, phi) = angles(dir);
    real_sph_harm(l, m, theta, phi)
}

/// Polar and azimuthal angles of a direction vector.
#[inline]
pub fn angles(dir: [f64; 3]) -> (f64, f64) {
    let r = (dir[0] * dir[0] + dir[1] * dir[1] + dir[2] * dir[2]).sqrt();
    if r == 0.0 {
        return (0.0, 0.0);
    }
    let theta = (dir[2] / r).clamp(-1.0, 1.0).acos();
    let phi = dir[1].atan2(dir[0]);
    (theta, phi)
}

/// All Y_lm with l ≤ `lmax` for one direction, in flattened order.
pub fn real_sph_harm_all(lmax: usize, dir: [f64; 3]) -> Vec<f64> {
    let (theta, phi) = angles(dir);
    let mut out = vec![0.0; lm_count(lmax)];
    for l in 0..=lmax {
        for m in -(l as i64)..=(l as i64) {
            out[lm_index(l, m)] = real_sph_harm(l, m, theta, phi);
        }
    }
    out
}
