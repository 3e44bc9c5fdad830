// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Interface Sources
// ─────────────────────────────────────────────────────────────────────
//! One interface-source capability, two implementations.
//!
//! [`DiffuseLayer`] spreads the interface over a Gaussian thin layer;
//! [`ExplicitSurface`] extracts the ω_cut = ω* isosurface, computes the
//! attenuated inward flux per face and deposits flux·area onto the grid
//! by cloud-in-cell weighting. Either result feeds the convolver as an
//! additional density contribution.

use effield_types::{FieldResult, InterfaceParams, ScalarField};

use crate::boundary::{omega_cut, BoundaryLayerBuilder};
use crate::surface::{SurfaceEmissionModel, SurfaceMesh, SurfaceMethod};

/// A source term concentrated on the interface located by a proxy field.
pub trait InterfaceSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn params(&self) -> &InterfaceParams;

    /// Interface density on the grid of `density` (before the coupling α).
    fn interface_density(&self, density: &ScalarField, proxy: &ScalarField) -> FieldResult<ScalarField>;

    /// ρ + α·interface density.
    fn effective_density(&self, density: &ScalarField, proxy: &ScalarField) -> FieldResult<ScalarField> {
        let s = self.interface_density(density, proxy)?;
        let alpha = self.params().coupling_strength;
        density.zip_map(&s, |rho, v| rho + alpha * v)
    }
}

/// Gaussian thin-layer interface.
#[derive(Debug, Clone, Copy)]
pub struct DiffuseLayer {
    builder: BoundaryLayerBuilder,
}

impl DiffuseLayer {
    pub fn new(params: InterfaceParams) -> FieldResult<Self> {
        Ok(Self {
            builder: BoundaryLayerBuilder::new(params)?,
        })
    }
}

impl InterfaceSource for DiffuseLayer {
    fn name(&self) -> &'static str {
        "diffuse_layer"
    }

    fn params(&self) -> &InterfaceParams {
        self.builder.params()
    }

    fn interface_density(&self, density: &ScalarField, proxy: &ScalarField) -> FieldResult<ScalarField> {
        Ok(self.builder.build(density, proxy)?.shell)
    }
}

/// Explicit isosurface interface with flux attenuated over L.
#[derive(Debug, Clone, Copy)]
pub struct ExplicitSurface {
    params: InterfaceParams,
    model: SurfaceEmissionModel,
}

impl ExplicitSurface {
    pub fn new(params: InterfaceParams, model: SurfaceEmissionModel) -> FieldResult<Self> {
        params.validate()?;
        Ok(Self { params, model })
    }

    pub fn with_method(mut self, method: SurfaceMethod) -> Self {
        self.model = self.model.with_method(method);
        self
    }

    /// Isosurface mesh and per-face flux.
    pub fn mesh_and_flux(
        &self,
        density: &ScalarField,
        proxy: &ScalarField,
    ) -> FieldResult<(SurfaceMesh, Vec<f64>)> {
        density.ensure_same_shape(proxy, "proxy")?;
        let oc = omega_cut(proxy, self.params.smoothing_scale)?;
        let mesh = self.model.extract(&oc, self.params.omega_star);
        let flux = self.model.line_integral_flux(
            &mesh,
            density,
            self.params.characteristic_length,
            None,
            None,
        )?;
        Ok((mesh, flux))
    }
}

impl InterfaceSource for ExplicitSurface {
    fn name(&self) -> &'static str {
        "explicit_surface"
    }

    fn params(&self) -> &InterfaceParams {
        &self.params
    }

    fn interface_density(&self, density: &ScalarField, proxy: &ScalarField) -> FieldResult<ScalarField> {
        let (mesh, flux) = self.mesh_and_flux(density, proxy)?;
        let weights: Vec<f64> = flux.iter().zip(&mesh.areas).map(|(f, a)| f * a).collect();
        Ok(deposit_cic(density, &mesh.centers, &weights))
    }
}

/// Cloud-in-cell deposit of `weights` at physical `points`, divided by the
/// voxel volume. Indices are clamped, so every weight lands on the grid.
pub fn deposit_cic(like: &ScalarField, points: &[[f64; 3]], weights: &[f64]) -> ScalarField {
    let mut out = like.zeros_like();
    let shape = like.shape();
    let dims = shape.dims();
    let origin = like.origin();
    let spacing = like.spacing();
    let inv_dv = 1.0 / like.voxel_volume();
    for (x, &w) in points.iter().zip(weights) {
        let mut i0 = [0usize; 3];
        let mut i1 = [0usize; 3];
        let mut t = [0.0; 3];
        for a in 0..3 {
            let g = (x[a] - origin[a]) / spacing[a] - 0.5;
            let last = dims[a] as i64 - 1;
            let fl = g.floor();
            let i = fl as i64;
            if i < 0 || i >= last {
                // outside the interior: all weight on the nearest voxel
                i0[a] = i.clamp(0, last) as usize;
                i1[a] = i0[a];
                t[a] = 0.0;
            } else {
                i0[a] = i as usize;
                i1[a] = i as usize + 1;
                t[a] = g - fl;
            }
        }
        let data = out.data_mut();
        for corner in 0..8 {
            let pick = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let mut wt = w * inv_dv;
            let mut idx = [0usize; 3];
            for a in 0..3 {
                if pick[a] == 1 {
                    wt *= t[a];
                    idx[a] = i1[a];
                } else {
                    wt *= 1.0 - t[a];
                    idx[a] = i0[a];
                }
            }
            if wt != 0.0 {
                data[shape.index(idx[0], idx[1], idx[2])] += wt;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use effield_types::GridShape;

    fn blob(n: usize) -> ScalarField {
        let shape = GridShape::cube(n);
        ScalarField::from_fn(shape, ScalarField::centered_origin(shape, [1.0; 3]), [1.0; 3], |p| {
            (-(p[0] * p[0] + p[1] * p[1] + p[2] * p[2]) / 8.0).exp()
        })
        .unwrap()
    }

    fn model() -> SurfaceEmissionModel {
        SurfaceEmissionModel::new(1.0, 1.0).unwrap()
    }

    #[test]
    fn test_cic_conserves_weight() {
        let like = blob(7);
        let pts = [[0.3, -0.2, 0.7], [2.9, 2.9, 2.9], [-40.0, 0.0, 0.0]];
        let dep = deposit_cic(&like, &pts, &[1.0, 2.0, 3.0]);
        assert!((dep.sum() * dep.voxel_volume() - 6.0).abs() < 1e-12);
        // a point on a voxel centre lands entirely on that voxel
        let one = deposit_cic(&like, &[[0.0; 3]], &[1.0]);
        assert!((one.get(3, 3, 3) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn test_both_sources_behind_one_trait() {
        let rho = blob(13);
        let params = InterfaceParams::new(0.5, 0.2, 2.0);
        let sources: Vec<Box<dyn InterfaceSource>> = vec![
            Box::new(DiffuseLayer::new(params).unwrap()),
            Box::new(ExplicitSurface::new(params, model()).unwrap()),
        ];
        for src in &sources {
            let s = src.interface_density(&rho, &rho).unwrap();
            assert!(s.sum() > 0.0, "{} produced no interface", src.name());
            let eff = src.effective_density(&rho, &rho).unwrap();
            for i in 0..rho.len() {
                assert!((eff.data()[i] - (rho.data()[i] + 0.2 * s.data()[i])).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_explicit_deposit_matches_surface_flux() {
        let rho = blob(13);
        let src = ExplicitSurface::new(InterfaceParams::new(0.5, 1.0, 2.0), model()).unwrap();
        let (mesh, flux) = src.mesh_and_flux(&rho, &rho).unwrap();
        assert!(!mesh.is_empty());
        let total: f64 = flux.iter().zip(&mesh.areas).map(|(f, a)| f * a).sum();
        let dep = src.interface_density(&rho, &rho).unwrap();
        assert!((dep.sum() * dep.voxel_volume() - total).abs() < 1e-9 * total);
    }

    #[test]
    fn test_explicit_surface_out_of_range_is_zero() {
        let rho = blob(9);
        let src = ExplicitSurface::new(InterfaceParams::new(5.0, 1.0, 2.0), model())
            .unwrap()
            .with_method(SurfaceMethod::VoxelFace);
        let s = src.interface_density(&rho, &rho).unwrap();
        assert!(s.is_all_zero());
        assert_eq!(src.effective_density(&rho, &rho).unwrap(), rho);
    }

    #[test]
    fn test_explicit_surface_on_planar_disk() {
        let disk = crate::builders::exponential_disk(33, 33, 1.0, 1.0, 4.0).unwrap();
        // ω_cut = sqrt(j) spans roughly [0.06, 1]
        let src = ExplicitSurface::new(InterfaceParams::new(0.7, 1.0, 2.0), model()).unwrap();
        let (mesh, flux) = src.mesh_and_flux(&disk, &disk).unwrap();
        assert!(!mesh.is_empty());
        assert!(flux.iter().all(|u| *u > 0.0));
        let s = src.interface_density(&disk, &disk).unwrap();
        assert!(!s.is_all_zero());
        assert!(s.sum() > 0.0);
    }
}
