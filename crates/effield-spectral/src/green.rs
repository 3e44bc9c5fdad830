// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Green-Kernel Convolver
// ─────────────────────────────────────────────────────────────────────
//! Spectral solver for ∇²φ − φ/λ² = −coupling·S (with an optional
//! multiplier μ0(k)):
//!
//!   φ̂(k) = coupling · μ0(k) · Ŝ(k) / (k² + λ⁻²)
//!
//! The k = 0 mode is dropped for the bare 1/k² kernel. A Newtonian
//! potential (∇²Φ = 4πGρ) uses `coupling = −4πG`.
//!
//! Non-degenerate axes are zero-padded to `n·factor` around the centred
//! source and the result cropped back. Factor 1 is a periodic solve.

use rustfft::num_complex::Complex64;

use effield_physics::multiplier::mu0_fn;
use effield_types::{
    FieldError, FieldResult, ScalarField, ScaleMultiplierParams, SolverConfig,
};

use crate::fft::{crop_real, embed, padded_shape, wavenumber_axes, FftPlanCache};
use crate::stencil::gradient;

/// Scalar function of |k| applied in Fourier space.
pub type KMultiplier = Box<dyn Fn(f64) -> f64 + Send + Sync>;

/// FFT solver for the screened or bare Poisson problem.
///
/// Holds an FFT plan cache behind a mutex; `&self` solves may run
/// concurrently from several threads.
pub struct GreenKernelConvolver {
    coupling: f64,
    screening_length: Option<f64>,
    zero_pad_factor: usize,
    multiplier: Option<KMultiplier>,
    /// (q, angle): k'² = k'_x² + (k'_y/q)² after rotating (k_x, k_y) by angle.
    axis_ratio: Option<(f64, f64)>,
    plans: FftPlanCache,
}

impl std::fmt::Debug for GreenKernelConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreenKernelConvolver")
            .field("coupling", &self.coupling)
            .field("screening_length", &self.screening_length)
            .field("zero_pad_factor", &self.zero_pad_factor)
            .field("has_multiplier", &self.multiplier.is_some())
            .field("axis_ratio", &self.axis_ratio)
            .finish()
    }
}

impl GreenKernelConvolver {
    /// Bare (unscreened) periodic solver with the given coupling.
    pub fn new(coupling: f64) -> FieldResult<Self> {
        if !coupling.is_finite() {
            return Err(FieldError::invalid(format!(
                "coupling must be finite, got {coupling}"
            )));
        }
        Ok(Self {
            coupling,
            screening_length: None,
            zero_pad_factor: 1,
            multiplier: None,
            axis_ratio: None,
            plans: FftPlanCache::new(),
        })
    }

    /// Newtonian potential solver: coupling = −4πG.
    pub fn newtonian(g: f64) -> FieldResult<Self> {
        Self::new(-4.0 * std::f64::consts::PI * g)
    }

    /// Newtonian solver with G and zero padding taken from `config`.
    pub fn from_config(config: &SolverConfig) -> FieldResult<Self> {
        config.validate()?;
        Self::newtonian(config.g)?.with_padding(config.zero_pad_factor)
    }

    /// Yukawa screening length λ > 0.
    pub fn with_screening(mut self, lambda: f64) -> FieldResult<Self> {
        if !(lambda.is_finite() && lambda > 0.0) {
            return Err(FieldError::invalid(format!(
                "screening_length must be finite and > 0, got {lambda}"
            )));
        }
        self.screening_length = Some(lambda);
        Ok(self)
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

    /// Install μ0(k) from parameters.
    pub fn with_scale_multiplier(self, params: ScaleMultiplierParams) -> FieldResult<Self> {
        params.validate()?;
        Ok(self.with_multiplier(mu0_fn(params)))
    }

    /// Elliptical kernel in the x–y plane. `q` is clamped to ≥ 1e-3.
    pub fn with_axis_ratio(mut self, q: f64, angle_rad: f64) -> FieldResult<Self> {
        if !(q.is_finite() && angle_rad.is_finite()) {
            return Err(FieldError::invalid(format!(
                "axis ratio and angle must be finite, got q={q}, angle={angle_rad}"
            )));
        }
        self.axis_ratio = Some((q.max(1e-3), angle_rad));
        Ok(self)
    }

    pub fn coupling(&self) -> f64 {
        self.coupling
    }

    pub fn screening_length(&self) -> Option<f64> {
        self.screening_length
    }

    pub fn zero_pad_factor(&self) -> usize {
        self.zero_pad_factor
    }

    /// Potential sourced by `source`, same grid as the input.
    pub fn solve(&self, source: &ScalarField) -> FieldResult<ScalarField> {
        let shape = source.shape();
        let padded = padded_shape(shape, self.zero_pad_factor);
        let [kx, ky, kz] = wavenumber_axes(padded, source.spacing());
        let inv_lambda2 = self.screening_length.map_or(0.0, |l| 1.0 / (l * l));
        let (cos_a, sin_a, inv_q) = match self.axis_ratio {
            Some((q, angle)) => (angle.cos(), angle.sin(), 1.0 / q),
            None => (1.0, 0.0, 1.0),
        };

        let mut buf = embed(source.data(), shape, padded);
        self.plans.forward(&mut buf, padded);

        for (idx, v) in buf.iter_mut().enumerate() {
            let [ix, iy, iz] = padded.unravel(idx);
            let (kxi, kyi, kzi) = (kx[ix], ky[iy], kz[iz]);
            let kxp = cos_a * kxi + sin_a * kyi;
            let kyp = (-sin_a * kxi + cos_a * kyi) * inv_q;
            let k2 = kxp * kxp + kyp * kyp + kzi * kzi;
            let denom = k2 + inv_lambda2;
            if denom == 0.0 {
                *v = Complex64::new(0.0, 0.0);
                continue;
            }
            let mu = match &self.multiplier {
                Some(f) => f((kxi * kxi + kyi * kyi + kzi * kzi).sqrt()),
                None => 1.0,
            };
            *v *= self.coupling * mu / denom;
        }

        self.plans.inverse(&mut buf, padded);
        source.with_data(crop_real(&buf, shape, padded))
    }

    /// Fixed-point nonlinear coupling j_eff = j·(1 + γ|∇φ|²)^q.
    ///
    /// Starts from the linear solution and re-solves `n_iter` times.
    /// γ is clamped to ≥ 0.
    pub fn solve_nonlinear(
        &self,
        source: &ScalarField,
        gamma: f64,
        power_q: f64,
        n_iter: usize,
    ) -> FieldResult<ScalarField> {
        if !(gamma.is_finite() && power_q.is_finite()) {
            return Err(FieldError::invalid(format!(
                "gamma and power_q must be finite, got {gamma}, {power_q}"
            )));
        }
        let gamma = gamma.max(0.0);
        let mut phi = self.solve(source)?;
        for _ in 0..n_iter {
            let g = gradient(&phi);
            let boosted: Vec<f64> = source
                .data()
                .iter()
                .enumerate()
                .map(|(i, &j)| {
                    let [gx, gy, gz] = g.at(i);
                    j * (1.0 + gamma * (gx * gx + gy * gy + gz * gz)).powf(power_q)
                })
                .collect();
            phi = self.solve(&source.with_data(boosted)?)?;
        }
        Ok(phi)
    }
}
