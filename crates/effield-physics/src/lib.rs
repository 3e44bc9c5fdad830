// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Physics
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! Scale multipliers μ0(k) and μ(a,k), real spherical harmonics, the flat
//! background cosmology and the scale-dependent linear growth solver.

pub mod cosmology;
pub mod growth;
pub mod harmonics;
pub mod multiplier;

pub use cosmology::Background;
pub use growth::{GrowthTrajectory, MuTable, ScaleDependentGrowthSolver};
pub use harmonics::{index_lm, lm_count, lm_index, real_sph_harm, real_sph_harm_all, real_sph_harm_dir};
pub use multiplier::{eps_of_a, logistic, mu0, mu0_fn, mu_late, shape_s_of_k};
