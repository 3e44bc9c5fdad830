// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Types
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Regular-grid fields, solver configuration and the error hierarchy
//! shared by every crate of the effective-field kernel.

pub mod config;
pub mod error;
pub mod grid;

pub use config::{
    CosmologyParams, GrowthConfig, InterfaceParams, LateMultiplierParams, ScaleMultiplierParams,
    SolverConfig, C_SI, G_SI, MAX_GROWTH_RTOL,
};
pub use error::{FieldError, FieldResult};
pub use grid::{finite_or, validate_spacing, DensityField, GridShape, ScalarField, VectorField};
