// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Core Engine
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Density-side machinery of the effective-field engine: structure-tensor
//! anisotropy, diffuse and explicit interface sources, direct-sum
//! reference evaluators, Monte-Carlo shells and analytic grid builders.

pub mod anisotropy;
pub mod boundary;
pub mod builders;
pub mod direct;
pub mod eigen;
pub mod interface;
pub mod shell;
pub mod surface;

pub use anisotropy::{
    anisotropy_strengths, AnisotropyCoefficientField, AnisotropyEstimate, AnisotropyEstimator,
    AnisotropyField,
};
pub use boundary::{
    interface_normals, layer_weight, omega_cut, BoundaryLayer, BoundaryLayerBuilder,
    CompositeLayers, LayerMetadata,
};
pub use builders::{
    exponential_disk, finite_rod, gaussian_blob, gaussian_sources, thin_disk, uniform_sphere,
};
pub use direct::{DirectSummationEvaluator, PointSource};
pub use eigen::{sym_eigen3, SymEigen3};
pub use interface::{deposit_cic, DiffuseLayer, ExplicitSurface, InterfaceSource};
pub use shell::{sample_sphere_points, shell_acceleration_profile, shell_sources};
pub use surface::{trilinear_sample, SurfaceEmissionModel, SurfaceMesh, SurfaceMethod};
