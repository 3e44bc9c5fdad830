// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Scale-Dependent Linear Growth
// ─────────────────────────────────────────────────────────────────────
//! Linear growth factor D(a) under a gravity multiplier μ(a,k).
//!
//! With u = ln a the growth ODE is
//!
//!   d²D/du² + [2 + dlnH/dlna]·dD/du − (3/2)·Ωm(a)·μ(a,k)·D = 0
//!
//! integrated with an adaptive Dormand–Prince 5(4) pair. μ is tabulated
//! on a log-spaced grid in a and interpolated linearly in ln a. Steps
//! are clipped so the integrator lands exactly on every requested a.

use serde::{Deserialize, Serialize};

use effield_types::{
    CosmologyParams, FieldError, FieldResult, GrowthConfig, LateMultiplierParams,
};

use crate::cosmology::Background;
use crate::multiplier::mu_late;

/// Lower bound on the μ-table start.
const A_TABLE_FLOOR: f64 = 1e-4;

// Dormand–Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// b - b* (5th minus embedded 4th order weights)
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Growth factor series over the requested scale-factor grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthTrajectory {
    /// Scale factors, as requested.
    pub a: Vec<f64>,
    /// D(a) / D(a[0]).
    pub d: Vec<f64>,
    /// Growth rate f = dlnD/dlna.
    pub f: Vec<f64>,
}

impl GrowthTrajectory {
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }
}

/// μ(a) sampled on a log-spaced grid, interpolated linearly in ln a.
#[derive(Debug, Clone)]
pub struct MuTable {
    ln_a: Vec<f64>,
    mu: Vec<f64>,
}

impl MuTable {
    /// Tabulate `mu_of_a` on `n` log-spaced points over [a_lo, a_hi].
    pub fn build(a_lo: f64, a_hi: f64, n: usize, mu_of_a: impl Fn(f64) -> f64) -> Self {
        let n = n.max(2);
        let (lo, hi) = (a_lo.ln(), a_hi.ln());
        let ln_a: Vec<f64> = (0..n)
            .map(|i| lo + (hi - lo) * i as f64 / (n - 1) as f64)
            .collect();
        let mu = ln_a.iter().map(|&la| mu_of_a(la.exp())).collect();
        Self { ln_a, mu }
    }

    /// Linear interpolation in ln a, clamped to the end values.
    pub fn at_ln_a(&self, la: f64) -> f64 {
        let n = self.ln_a.len();
        if la <= self.ln_a[0] {
            return self.mu[0];
        }
        if la >= self.ln_a[n - 1] {
            return self.mu[n - 1];
        }
        let j = self.ln_a.partition_point(|&x| x <= la).clamp(1, n - 1);
        let (x0, x1) = (self.ln_a[j - 1], self.ln_a[j]);
        if x1 <= x0 {
            return self.mu[j];
        }
        let t = (la - x0) / (x1 - x0);
        self.mu[j - 1] + t * (self.mu[j] - self.mu[j - 1])
    }
}

/// Adaptive integrator for the linear growth ODE.
#[derive(Debug, Clone)]
pub struct ScaleDependentGrowthSolver {
    config: GrowthConfig,
}

impl Default for ScaleDependentGrowthSolver {
    fn default() -> Self {
        Self {
            config: GrowthConfig::default(),
        }
    }
}

impl ScaleDependentGrowthSolver {
    /// Fails with `InvalidParameter` if `config.rtol` is looser than 1e-5.
    pub fn new(config: GrowthConfig) -> FieldResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GrowthConfig {
        &self.config
    }

    /// Growth factor at wavenumber `k`.
    ///
    /// With `use_multiplier == false` the ODE runs with μ ≡ 1. `a_init`
    /// defaults to `a_grid[0]` and must not exceed it.
    pub fn solve(
        &self,
        a_grid: &[f64],
        k: f64,
        cosmology: &CosmologyParams,
        use_multiplier: bool,
        multiplier: &LateMultiplierParams,
        a_init: Option<f64>,
    ) -> FieldResult<GrowthTrajectory> {
        if !k.is_finite() {
            return Err(FieldError::invalid(format!("k must be finite, got {k}")));
        }
        multiplier.validate()?;
        if use_multiplier {
            self.solve_with(a_grid, cosmology, a_init, |a| mu_late(a, k, multiplier))
        } else {
            self.solve_with(a_grid, cosmology, a_init, |_| 1.0)
        }
    }

    /// Growth factor for an arbitrary μ(a).
    pub fn solve_with(
        &self,
        a_grid: &[f64],
        cosmology: &CosmologyParams,
        a_init: Option<f64>,
        mu_of_a: impl Fn(f64) -> f64,
    ) -> FieldResult<GrowthTrajectory> {
        validate_grid(a_grid)?;
        let a0 = a_init.unwrap_or(a_grid[0]);
        if !(a0.is_finite() && a0 > 0.0) {
            return Err(FieldError::invalid(format!(
                "a_init must be finite and > 0, got {a0}"
            )));
        }
        if a0 > a_grid[0] {
            return Err(FieldError::invalid(format!(
                "a_init {a0} must not exceed the first grid point {}",
                a_grid[0]
            )));
        }
        let background = Background::new(*cosmology)?;
        let a_last = a_grid[a_grid.len() - 1];
        let table = MuTable::build(
            a0.max(A_TABLE_FLOOR),
            a_last,
            self.config.table_points,
            mu_of_a,
        );

        let rhs = |u: f64, y: [f64; 2]| -> [f64; 2] {
            let a = u.exp();
            let drag = 2.0 + background.dlnh_dlna(a);
            let source = 1.5 * background.omega_m(a) * table.at_ln_a(u);
            [y[1], -drag * y[1] + source * y[0]]
        };

        let targets: Vec<f64> = a_grid.iter().map(|a| a.ln()).collect();
        let raw = self.integrate(rhs, a0.ln(), [a0, a0], &targets)?;

        let d_ref = if raw[0][0] != 0.0 { raw[0][0] } else { 1.0 };
        let d = raw.iter().map(|y| y[0] / d_ref).collect();
        let f = raw
            .iter()
            .map(|y| if y[0] != 0.0 { y[1] / y[0] } else { 0.0 })
            .collect();

        Ok(GrowthTrajectory {
            a: a_grid.to_vec(),
            d,
            f,
        })
    }

    /// Dormand–Prince 5(4) from `u0` through every (ascending) target.
    fn integrate(
        &self,
        rhs: impl Fn(f64, [f64; 2]) -> [f64; 2],
        u0: f64,
        y0: [f64; 2],
        targets: &[f64],
    ) -> FieldResult<Vec<[f64; 2]>> {
        let GrowthConfig {
            rtol,
            atol,
            max_steps,
            ..
        } = self.config;

        let span = targets[targets.len() - 1] - u0;
        let mut h = if span > 0.0 { (1e-3 * span).max(1e-6) } else { 1e-3 };
        let mut u = u0;
        let mut y = y0;
        let mut k1 = rhs(u, y);
        let mut steps = 0usize;
        let mut out = Vec::with_capacity(targets.len());

        for &target in targets {
            while u < target {
                if steps >= max_steps {
                    let msg = format!(
                        "maximum number of steps ({max_steps}) exceeded at u={u:.6}"
                    );
                    log::error!("growth integrator: {msg}");
                    return Err(FieldError::IntegrationFailure(msg));
                }
                let min_step = 1e-14 * u.abs().max(1.0);
                if h < min_step {
                    let msg = format!("step size {h:.3e} underflow at u={u:.6}");
                    log::error!("growth integrator: {msg}");
                    return Err(FieldError::IntegrationFailure(msg));
                }

                let remaining = target - u;
                let lands = h >= remaining;
                let step = if lands { remaining } else { h };
                steps += 1;

                let (y_new, k7, err) = dp45_step(&rhs, u, y, k1, step);
                let mut norm = 0.0;
                for i in 0..2 {
                    let scale = atol + rtol * y[i].abs().max(y_new[i].abs());
                    norm += (err[i] / scale).powi(2);
                }
                let norm = (norm / 2.0).sqrt();

                if !norm.is_finite() {
                    h = 0.2 * step;
                    continue;
                }

                if norm <= 1.0 {
                    u = if lands { target } else { u + step };
                    y = y_new;
                    k1 = k7;
                    let grow = if norm == 0.0 {
                        5.0
                    } else {
                        (0.9 * norm.powf(-0.2)).clamp(0.2, 5.0)
                    };
                    // keep the untruncated proposal when the step was clipped
                    h = if lands { h.max(step * grow) } else { step * grow };
                } else {
                    h = step * (0.9 * norm.powf(-0.2)).clamp(0.2, 1.0);
                }
            }
            out.push(y);
        }
        Ok(out)
    }
}

/// One DP45 step. Returns (y5, f(u+h, y5), y5 − y4).
fn dp45_step(
    rhs: &impl Fn(f64, [f64; 2]) -> [f64; 2],
    u: f64,
    y: [f64; 2],
    k1: [f64; 2],
    h: f64,
) -> ([f64; 2], [f64; 2], [f64; 2]) {
    let at = |coef: &[(f64, [f64; 2])]| combine(y, h, coef);

    let k2 = rhs(u + C2 * h, at(&[(A21, k1)]));
    let k3 = rhs(u + C3 * h, at(&[(A31, k1), (A32, k2)]));
    let k4 = rhs(u + C4 * h, at(&[(A41, k1), (A42, k2), (A43, k3)]));
    let k5 = rhs(
        u + C5 * h,
        at(&[(A51, k1), (A52, k2), (A53, k3), (A54, k4)]),
    );
    let k6 = rhs(
        u + h,
        at(&[(A61, k1), (A62, k2), (A63, k3), (A64, k4), (A65, k5)]),
    );
    let y5 = at(&[(B1, k1), (B3, k3), (B4, k4), (B5, k5), (B6, k6)]);
    let k7 = rhs(u + h, y5);

    let mut err = [0.0; 2];
    for i in 0..2 {
        err[i] = h
            * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
    }
    (y5, k7, err)
}

fn combine(y: [f64; 2], h: f64, coef: &[(f64, [f64; 2])]) -> [f64; 2] {
    let mut s = y;
    for &(c, k) in coef {
        s[0] += h * c * k[0];
        s[1] += h * c * k[1];
    }
    s
}

fn validate_grid(a_grid: &[f64]) -> FieldResult<()> {
    if a_grid.is_empty() {
        return Err(FieldError::invalid("a_grid must not be empty"));
    }
    if let Some(bad) = a_grid.iter().find(|a| !(a.is_finite() && **a > 0.0)) {
        return Err(FieldError::invalid(format!(
            "a_grid values must be finite and > 0, got {bad}"
        )));
    }
    if a_grid.windows(2).any(|w| w[1] <= w[0]) {
        return Err(FieldError::invalid("a_grid must be strictly increasing"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geomspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
        let (l, h) = (lo.ln(), hi.ln());
        (0..n)
            .map(|i| (l + (h - l) * i as f64 / (n - 1) as f64).exp())
            .collect()
    }

    fn baseline(a_grid: &[f64]) -> GrowthTrajectory {
        ScaleDependentGrowthSolver::default()
            .solve(
                a_grid,
                0.1,
                &CosmologyParams::default(),
                false,
                &LateMultiplierParams::default(),
                None,
            )
            .unwrap()
    }

    #[test]
    fn test_matter_era_growth_proportional_to_a() {
        let a = geomspace(1e-3, 1e-2, 12);
        let traj = baseline(&a);
        for (i, (&ai, &di)) in traj.a.iter().zip(traj.d.iter()).enumerate() {
            let expect = ai / a[0];
            assert!(
                ((di - expect) / expect).abs() < 1e-4,
                "D[{i}] = {di}, expected {expect}"
            );
            assert!((traj.f[i] - 1.0).abs() < 1e-3, "f[{i}] = {}", traj.f[i]);
        }
    }

    #[test]
    fn test_einstein_de_sitter_exact() {
        let a = geomspace(0.01, 1.0, 8);
        let eds = CosmologyParams {
            omega_m0: 1.0,
            omega_lambda0: 0.0,
        };
        let traj = ScaleDependentGrowthSolver::default()
            .solve_with(&a, &eds, None, |_| 1.0)
            .unwrap();
        let last = traj.d[traj.len() - 1];
        assert!((last - 100.0).abs() / 100.0 < 1e-4, "D(1)/D(0.01) = {last}");
    }

    #[test]
    fn test_lcdm_suppression_today() {
        let traj = baseline(&[0.01, 0.1, 0.5, 1.0]);
        let g = traj.d[3] * 0.01;
        assert!((0.74..=0.82).contains(&g), "D(1)/D(0.01)·0.01 = {g}");
        assert!((traj.f[3] - 0.53).abs() < 0.02, "f(1) = {}", traj.f[3]);
    }

    #[test]
    fn test_multiplier_enhances_growth() {
        let a = [0.02, 0.2, 1.0];
        let solver = ScaleDependentGrowthSolver::default();
        let params = LateMultiplierParams {
            eps_max: 0.3,
            ..LateMultiplierParams::default()
        };
        let cosmo = CosmologyParams::default();
        let base = solver.solve(&a, 1.0, &cosmo, false, &params, None).unwrap();
        let modified = solver.solve(&a, 1.0, &cosmo, true, &params, None).unwrap();
        assert!(modified.d[2] > base.d[2] * 1.01);
        assert!(modified.f[2] > base.f[2]);
    }

    #[test]
    fn test_earlier_a_init_is_allowed() {
        let solver = ScaleDependentGrowthSolver::default();
        let traj = solver
            .solve(
                &[0.01, 1.0],
                0.1,
                &CosmologyParams::default(),
                false,
                &LateMultiplierParams::default(),
                Some(1e-3),
            )
            .unwrap();
        assert_eq!(traj.d[0], 1.0);
        assert!((traj.d[1] * 0.01 - 0.78).abs() < 0.04);
    }

    #[test]
    fn test_rejects_loose_rtol() {
        let cfg = GrowthConfig {
            rtol: 1e-3,
            ..GrowthConfig::default()
        };
        assert!(matches!(
            ScaleDependentGrowthSolver::new(cfg),
            Err(FieldError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_rejects_bad_grids() {
        let solver = ScaleDependentGrowthSolver::default();
        let cosmo = CosmologyParams::default();
        assert!(solver.solve_with(&[0.1, 0.1], &cosmo, None, |_| 1.0).is_err());
        assert!(solver.solve_with(&[0.5, 0.2], &cosmo, None, |_| 1.0).is_err());
        assert!(solver.solve_with(&[], &cosmo, None, |_| 1.0).is_err());
        assert!(solver
            .solve_with(&[0.1, 0.5], &cosmo, Some(0.2), |_| 1.0)
            .is_err());
    }

    #[test]
    fn test_step_budget_exhaustion_reports_failure() {
        let solver = ScaleDependentGrowthSolver::new(GrowthConfig {
            max_steps: 3,
            ..GrowthConfig::default()
        })
        .unwrap();
        let err = solver
            .solve_with(&[1e-3, 1.0], &CosmologyParams::default(), None, |_| 1.0)
            .unwrap_err();
        match err {
            FieldError::IntegrationFailure(msg) => assert!(msg.contains("steps")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_mu_table_clamps_and_interpolates() {
        let table = MuTable::build(0.1, 1.0, 256, |a| a);
        assert!((table.at_ln_a(0.01f64.ln()) - 0.1).abs() < 1e-12);
        assert!((table.at_ln_a(2.0f64.ln()) - 1.0).abs() < 1e-12);
        assert!((table.at_ln_a(0.5f64.ln()) - 0.5).abs() < 1e-4);
    }
}
