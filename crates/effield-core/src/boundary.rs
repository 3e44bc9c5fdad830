// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Diffuse Boundary Layer
// ─────────────────────────────────────────────────────────────────────
//! Thin-layer interface source concentrated near the ω_cut = ω* level.
//!
//! ω_cut = sqrt(|proxy|), optionally smoothed. The layer width is the
//! local scale height H = 1/|∇ω_cut/ω_cut| (floored at 1e-6), and the
//! weight S = exp(−((ω_cut − ω*)/w)²)/(√π·w) integrates to ≈ 1 across
//! the interface.

use serde::{Deserialize, Serialize};

use effield_spectral::{gaussian_smooth, gradient};
use effield_types::{FieldResult, InterfaceParams, ScalarField, VectorField};

const MIN_WIDTH: f64 = 1e-6;
const TINY: f64 = 1e-30;

/// Parameters and summary statistics of a built layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerMetadata {
    pub params: InterfaceParams,
    /// max S over the grid.
    pub peak_weight: f64,
    /// Σ S·dV.
    pub integrated_weight: f64,
}

/// Output of [`BoundaryLayerBuilder::build`].
#[derive(Debug, Clone)]
pub struct BoundaryLayer {
    pub effective_density: ScalarField,
    pub shell: ScalarField,
    pub omega_cut: ScalarField,
    pub metadata: LayerMetadata,
}

impl BoundaryLayer {
    /// Unit outward normals −∇ω_cut/|∇ω_cut|; zero where ω_cut is flat.
    pub fn normals(&self) -> VectorField {
        interface_normals(&self.omega_cut)
    }
}

/// ρ_iso, S and ρ_eff of a two-component composite.
#[derive(Debug, Clone)]
pub struct CompositeLayers {
    pub rho_iso: ScalarField,
    pub shell: ScalarField,
    pub rho_eff: ScalarField,
    pub metadata: LayerMetadata,
}

/// ω_cut = sqrt(|proxy|), Gaussian-smoothed when σ > 0.
pub fn omega_cut(proxy: &ScalarField, smoothing_scale: Option<f64>) -> FieldResult<ScalarField> {
    let oc = proxy.map(|v| v.abs().sqrt());
    match smoothing_scale.filter(|&s| s > 0.0) {
        Some(sigma) => gaussian_smooth(&oc, sigma),
        None => Ok(oc),
    }
}

/// −∇ω/|∇ω| per voxel.
pub fn interface_normals(omega: &ScalarField) -> VectorField {
    let g = gradient(omega);
    let mut n = VectorField {
        x: omega.zeros_like(),
        y: omega.zeros_like(),
        z: omega.zeros_like(),
    };
    for i in 0..omega.len() {
        let v = g.at(i);
        let mag = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        if mag > 0.0 {
            n.x.data_mut()[i] = -v[0] / mag;
            n.y.data_mut()[i] = -v[1] / mag;
            n.z.data_mut()[i] = -v[2] / mag;
        }
    }
    n
}

/// Layer weight S from ω_cut.
pub fn layer_weight(omega: &ScalarField, omega_star: f64) -> ScalarField {
    let g = gradient(omega);
    let mut s = omega.zeros_like();
    for (i, out) in s.data_mut().iter_mut().enumerate() {
        let w_val = omega.data()[i];
        let v = g.at(i);
        let grad_mag = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        let h = 1.0 / (grad_mag / (w_val + TINY) + TINY);
        let width = h.max(MIN_WIDTH);
        let x = (w_val - omega_star) / width;
        *out = (-x * x).exp() / (std::f64::consts::PI.sqrt() * width);
    }
    s
}

/// Builds ρ_eff = ρ + α·S.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryLayerBuilder {
    params: InterfaceParams,
}

impl BoundaryLayerBuilder {
    pub fn new(params: InterfaceParams) -> FieldResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &InterfaceParams {
        &self.params
    }

    pub fn build(&self, density: &ScalarField, proxy: &ScalarField) -> FieldResult<BoundaryLayer> {
        density.ensure_same_shape(proxy, "proxy")?;
        let oc = omega_cut(proxy, self.params.smoothing_scale)?;
        let shell = layer_weight(&oc, self.params.omega_star);
        let alpha = self.params.coupling_strength;
        let effective_density = density.zip_map(&shell, |rho, s| rho + alpha * s)?;
        let metadata = self.metadata(&shell);
        Ok(BoundaryLayer {
            effective_density,
            shell,
            omega_cut: oc,
            metadata,
        })
    }

    /// ρ_iso = ρ_star + gas_scale·ρ_gas, then ρ_eff = ρ_iso + α·S.
    pub fn build_layers(
        &self,
        rho_star: &ScalarField,
        rho_gas: &ScalarField,
        proxy: &ScalarField,
        gas_scale: f64,
    ) -> FieldResult<CompositeLayers> {
        let rho_iso = rho_star.zip_map(rho_gas, |s, g| s + gas_scale * g)?;
        let layer = self.build(&rho_iso, proxy)?;
        Ok(CompositeLayers {
            rho_iso,
            shell: layer.shell,
            rho_eff: layer.effective_density,
            metadata: layer.metadata,
        })
    }

    fn metadata(&self, shell: &ScalarField) -> LayerMetadata {
        let (_, peak) = shell.min_max();
        LayerMetadata {
            params: self.params,
            peak_weight: peak,
            integrated_weight: shell.sum() * shell.voxel_volume(),
        }
    }
}
