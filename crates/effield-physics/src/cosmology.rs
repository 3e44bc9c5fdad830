// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Flat Background Cosmology
// ─────────────────────────────────────────────────────────────────────

use effield_types::{CosmologyParams, FieldResult};

/// Flat matter + Λ background: E²(a) = Ωm0·a⁻³ + ΩΛ0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Background {
    params: CosmologyParams,
}

impl Background {
    pub fn new(params: CosmologyParams) -> FieldResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &CosmologyParams {
        &self.params
    }

    #[inline]
    pub fn e2(&self, a: f64) -> f64 {
        self.params.omega_m0 * a.powi(-3) + self.params.omega_lambda0
    }

    /// Matter fraction Ωm(a).
    #[inline]
    pub fn omega_m(&self, a: f64) -> f64 {
        self.params.omega_m0 * a.powi(-3) / self.e2(a)
    }

    /// d ln H / d ln a = −1.5·Ωm(a).
    #[inline]
    pub fn dlnh_dlna(&self, a: f64) -> f64 {
        -1.5 * self.omega_m(a)
    }
}

impl Default for Background {
    fn default() -> Self {
        Self {
            params: CosmologyParams::default(),
        }
    }
}
