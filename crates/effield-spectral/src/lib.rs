// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Spectral Solvers
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
#![deny(unsafe_code)]
//! FFT-based potential solvers on regular grids: the screened/bare
//! Green-kernel convolver, the l = 2 quadrupole correction, and the
//! finite-difference stencils and profiles built on top of them.

pub mod fft;
pub mod green;
pub mod profile;
pub mod quadrupole;
pub mod stencil;

pub use fft::FftPlanCache;
pub use green::{GreenKernelConvolver, KMultiplier};
pub use profile::{acceleration, circular_profile, vc_from_gr, RadialProfile};
pub use quadrupole::{AnisotropicCorrectionSolver, PrincipalAxis};
pub use stencil::{derivative, gaussian_smooth, gradient};
