// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Solver Configuration
// ─────────────────────────────────────────────────────────────────────

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FieldResult};

/// SI gravitational constant [m³ kg⁻¹ s⁻²].
pub const G_SI: f64 = 6.674_30e-11;

/// SI speed of light [m/s].
pub const C_SI: f64 = 2.997_924_58e8;

fn require_positive(name: &str, value: f64) -> FieldResult<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(FieldError::Config(format!(
            "{name} must be finite and > 0, got {value}"
        )));
    }
    Ok(())
}

fn require_finite(name: &str, value: f64) -> FieldResult<()> {
    if !value.is_finite() {
        return Err(FieldError::Config(format!(
            "{name} must be finite, got {value}"
        )));
    }
    Ok(())
}

fn parse<T: for<'de> Deserialize<'de>>(json: &str) -> FieldResult<T> {
    serde_json::from_str(json).map_err(|e| FieldError::Config(format!("JSON parse error: {e}")))
}

/// Shared constants and discretisation settings for the field solvers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Gravitational coupling G. Default: SI value.
    pub g: f64,

    /// Signal speed used by the Λ surface integral. Default: SI value.
    pub c: f64,

    /// Zero-padding factor for spectral solves. 1 = periodic.
    /// Default: 2 (free-space result for compact sources).
    pub zero_pad_factor: usize,

    /// Plummer softening ε for direct sums. Default: 0.
    pub softening: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            g: G_SI,
            c: C_SI,
            zero_pad_factor: 2,
            softening: 0.0,
        }
    }
}

impl SolverConfig {
    /// Unit-system config with G = c = 1.
    pub fn geometric() -> Self {
        Self {
            g: 1.0,
            c: 1.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> FieldResult<()> {
        require_finite("g", self.g)?;
        require_positive("c", self.c)?;
        if self.zero_pad_factor == 0 {
            return Err(FieldError::Config(
                "zero_pad_factor must be >= 1".to_string(),
            ));
        }
        if !(self.softening.is_finite() && self.softening >= 0.0) {
            return Err(FieldError::Config(format!(
                "softening must be finite and >= 0, got {}",
                self.softening
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> FieldResult<Self> {
        let cfg: Self = parse(json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Isotropic multiplier μ0(k) = 1 + ε / (1 + (k/k0)^m).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleMultiplierParams {
    /// Enhancement amplitude at k ≪ k0.
    pub eps: f64,
    /// Transition wavenumber.
    pub k0: f64,
    /// Transition sharpness.
    pub m: f64,
}

impl Default for ScaleMultiplierParams {
    fn default() -> Self {
        Self {
            eps: 0.0,
            k0: 1.0,
            m: 2.0,
        }
    }
}

impl ScaleMultiplierParams {
    pub fn validate(&self) -> FieldResult<()> {
        require_finite("eps", self.eps)?;
        require_finite("k0", self.k0)?;
        require_finite("m", self.m)?;
        Ok(())
    }

    pub fn from_json(json: &str) -> FieldResult<Self> {
        let cfg: Self = parse(json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Late-time multiplier μ(a,k) = 1 + ε(a)·S(k)·sup(k).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LateMultiplierParams {
    /// Late-time amplitude of ε(a). Default: 0.1.
    pub eps_max: f64,
    /// Scale factor at which the logistic switch-on is centred. Default: 1/21 (z = 20).
    pub a_on: f64,
    /// Width of the switch-on in a. Default: 0.02.
    pub da: f64,
    /// Scale above which S(k) saturates. Default: 0.2.
    pub k_c: f64,
    /// Optional small-scale suppression wavenumber.
    pub k_sup: Option<f64>,
    /// Suppression exponent, clamped ≥ 1 on use. Default: 2.
    pub n_sup: f64,
}

impl Default for LateMultiplierParams {
    fn default() -> Self {
        Self {
            eps_max: 0.1,
            a_on: 1.0 / 21.0,
            da: 0.02,
            k_c: 0.2,
            k_sup: None,
            n_sup: 2.0,
        }
    }
}

impl LateMultiplierParams {
    /// Parameters that make μ ≡ 1.
    pub fn off() -> Self {
        Self {
            eps_max: 0.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> FieldResult<()> {
        require_finite("eps_max", self.eps_max)?;
        require_finite("a_on", self.a_on)?;
        require_finite("da", self.da)?;
        require_finite("k_c", self.k_c)?;
        require_finite("n_sup", self.n_sup)?;
        if let Some(k_sup) = self.k_sup {
            require_positive("k_sup", k_sup)?;
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> FieldResult<Self> {
        let cfg: Self = parse(json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Flat background cosmology.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmologyParams {
    /// Matter density today. Default: 0.315.
    pub omega_m0: f64,
    /// Dark-energy density today. Default: 0.685.
    pub omega_lambda0: f64,
}

impl Default for CosmologyParams {
    fn default() -> Self {
        Self {
            omega_m0: 0.315,
            omega_lambda0: 0.685,
        }
    }
}

impl CosmologyParams {
    pub fn validate(&self) -> FieldResult<()> {
        require_positive("omega_m0", self.omega_m0)?;
        if !(self.omega_lambda0.is_finite() && self.omega_lambda0 >= 0.0) {
            return Err(FieldError::Config(format!(
                "omega_lambda0 must be finite and >= 0, got {}",
                self.omega_lambda0
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> FieldResult<Self> {
        let cfg: Self = parse(json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Integrator settings for the growth ODE.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    /// Relative tolerance. Must be ≤ 1e-5. Default: 1e-5.
    pub rtol: f64,
    /// Absolute tolerance. Default: 1e-7.
    pub atol: f64,
    /// Step budget before the integrator gives up. Default: 100 000.
    pub max_steps: usize,
    /// Number of log-spaced μ table points. Default: 256.
    pub table_points: usize,
}

/// Loosest relative tolerance the growth solver accepts.
pub const MAX_GROWTH_RTOL: f64 = 1e-5;

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            rtol: MAX_GROWTH_RTOL,
            atol: 1e-7,
            max_steps: 100_000,
            table_points: 256,
        }
    }
}

impl GrowthConfig {
    pub fn validate(&self) -> FieldResult<()> {
        require_positive("rtol", self.rtol)?;
        if self.rtol > MAX_GROWTH_RTOL {
            return Err(FieldError::invalid(format!(
                "rtol must be <= {MAX_GROWTH_RTOL:e}, got {:e}",
                self.rtol
            )));
        }
        require_positive("atol", self.atol)?;
        if self.max_steps == 0 {
            return Err(FieldError::Config("max_steps must be >= 1".to_string()));
        }
        if self.table_points < 2 {
            return Err(FieldError::Config(format!(
                "table_points must be >= 2, got {}",
                self.table_points
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> FieldResult<Self> {
        let cfg: Self = parse(json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Parameters shared by every interface-source implementation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterfaceParams {
    /// Threshold on ω_cut = sqrt(|proxy|) that locates the interface.
    pub omega_star: f64,
    /// Strength α of the interface contribution.
    pub coupling_strength: f64,
    /// Length scale L: attenuation for explicit surfaces.
    pub characteristic_length: f64,
    /// Gaussian σ (voxels) applied to ω_cut before locating the interface.
    #[serde(default)]
    pub smoothing_scale: Option<f64>,
}

impl InterfaceParams {
    pub fn new(omega_star: f64, coupling_strength: f64, characteristic_length: f64) -> Self {
        Self {
            omega_star,
            coupling_strength,
            characteristic_length,
            smoothing_scale: None,
        }
    }

    pub fn with_smoothing(mut self, sigma: f64) -> Self {
        self.smoothing_scale = Some(sigma);
        self
    }

    pub fn validate(&self) -> FieldResult<()> {
        require_finite("omega_star", self.omega_star)?;
        require_finite("coupling_strength", self.coupling_strength)?;
        require_positive("characteristic_length", self.characteristic_length)?;
        if let Some(sigma) = self.smoothing_scale {
            if !(sigma.is_finite() && sigma >= 0.0) {
                return Err(FieldError::invalid(format!(
                    "smoothing_scale must be finite and >= 0, got {sigma}"
                )));
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> FieldResult<Self> {
        let cfg: Self = parse(json)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        SolverConfig::default().validate().unwrap();
        ScaleMultiplierParams::default().validate().unwrap();
        LateMultiplierParams::default().validate().unwrap();
        CosmologyParams::default().validate().unwrap();
        GrowthConfig::default().validate().unwrap();
    }

    #[test]
    fn test_solver_config_rejects_zero_padding() {
        let cfg = SolverConfig {
            zero_pad_factor: 0,
            ..SolverConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_growth_rejects_loose_rtol() {
        let cfg = GrowthConfig {
            rtol: 1e-4,
            ..GrowthConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(FieldError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_from_json_partial_uses_defaults() {
        let cfg = SolverConfig::from_json(r#"{"g": 1.0, "c": 1.0}"#).unwrap();
        assert_eq!(cfg.zero_pad_factor, 2);
        assert_eq!(cfg.g, 1.0);

        let late = LateMultiplierParams::from_json(r#"{"eps_max": 0.3, "k_sup": 5.0}"#).unwrap();
        assert_eq!(late.k_sup, Some(5.0));
        assert!((late.a_on - 1.0 / 21.0).abs() < 1e-15);
    }

    #[test]
    fn test_from_json_invalid() {
        assert!(matches!(
            SolverConfig::from_json("not json"),
            Err(FieldError::Config(_))
        ));
        assert!(InterfaceParams::from_json(
            r#"{"omega_star": 1.0, "coupling_strength": 1.0, "characteristic_length": -1.0}"#
        )
        .is_err());
    }

    #[test]
    fn test_interface_params_smoothing() {
        let p = InterfaceParams::new(0.5, 1.0, 2.0).with_smoothing(1.5);
        assert_eq!(p.smoothing_scale, Some(1.5));
        p.validate().unwrap();
    }
}
