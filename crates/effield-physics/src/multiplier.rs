// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Gravity Multipliers μ0(k) and μ(a,k)
// ─────────────────────────────────────────────────────────────────────
//! Scale- and time-dependent multipliers of the Newtonian coupling.
//!
//! - μ0(k) = 1 + ε / (1 + (k/k0)^m) enhances long wavelengths in the
//!   spectral solvers.
//! - μ(a,k) = 1 + ε(a)·S(k)·sup(k) switches on at late times in the
//!   growth ODE.

use effield_types::{LateMultiplierParams, ScaleMultiplierParams};

/// Logistic σ(x) = 1 / (1 + e^{-x}) with x clipped to ±60.
#[inline]
pub fn logistic(x: f64) -> f64 {
    let x = x.clamp(-60.0, 60.0);
    1.0 / (1.0 + (-x).exp())
}

/// Isotropic scale multiplier μ0(k).
#[inline]
pub fn mu0(k: f64, p: &ScaleMultiplierParams) -> f64 {
    let kk = k.max(1e-12);
    let k0 = p.k0.max(1e-12);
    1.0 + p.eps / (1.0 + (kk / k0).powf(p.m))
}

/// Boxed μ0(k) closure, the form the spectral convolver takes.
pub fn mu0_fn(p: ScaleMultiplierParams) -> Box<dyn Fn(f64) -> f64 + Send + Sync> {
    Box::new(move |k| mu0(k, &p))
}

/// Smooth late-time switch-on ε(a).
#[inline]
pub fn eps_of_a(a: f64, p: &LateMultiplierParams) -> f64 {
    p.eps_max * logistic((a - p.a_on) / p.da.max(1e-9))
}

/// Shape kernel S(k) = k² / (k² + k_c²); zero at k ≤ 0.
#[inline]
pub fn shape_s_of_k(k: f64, k_c: f64) -> f64 {
    let kc2 = k_c.max(1e-12).powi(2);
    let kk = k.max(0.0);
    kk * kk / (kk * kk + kc2)
}

/// Optional small-scale suppression exp(−(k/k_sup)^n).
#[inline]
pub fn suppression(k: f64, p: &LateMultiplierParams) -> f64 {
    match p.k_sup {
        Some(ks) if ks > 0.0 => {
            let n = p.n_sup.max(1.0);
            (-(k.max(0.0) / ks).powf(n)).exp()
        }
        _ => 1.0,
    }
}

/// Late-time multiplier μ(a,k).
#[inline]
pub fn mu_late(a: f64, k: f64, p: &LateMultiplierParams) -> f64 {
    1.0 + eps_of_a(a, p) * shape_s_of_k(k, p.k_c) * suppression(k, p)
}
