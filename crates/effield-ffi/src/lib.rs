// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — PyO3 FFI Bindings
// (C) 1998-2026 Miroslav Sotek. All rights reserved.
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
// Note: #[deny(unsafe_code)] not applied — PyO3 proc macros generate
// unsafe blocks internally. All hand-written code in this crate is safe.
//! Python-callable wrappers around the effective-field engine.
//!
//! Grids cross the boundary as flat x-fastest lists wrapped in `Grid`;
//! meshes and trajectories come back as dicts of plain lists.
//!
//! - `FieldError::IntegrationFailure` → `RuntimeError`, every other
//!   variant → `ValueError`.
//! - All parameters are validated on the Rust side before use.
//!
//! Install: `pip install -e crates/effield-ffi` (requires maturin).
//!
//! Usage from Python:
//! ```python
//! from effield_kernel import Grid, GreenKernelConvolver
//!
//! rho = Grid(data, (32, 32, 32), spacing=(1.0, 1.0, 1.0))
//! phi = GreenKernelConvolver(g=1.0, zero_pad_factor=2).solve(rho)
//! ```

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use effield_core::{
    AnisotropyEstimator, BoundaryLayerBuilder, SurfaceEmissionModel, SurfaceMesh, SurfaceMethod,
};
use effield_physics::ScaleDependentGrowthSolver;
use effield_spectral::{
    acceleration, circular_profile, AnisotropicCorrectionSolver, GreenKernelConvolver,
    PrincipalAxis,
};
use effield_types::{
    CosmologyParams, FieldError, GridShape, GrowthConfig, InterfaceParams, LateMultiplierParams,
    ScalarField, ScaleMultiplierParams, SolverConfig,
};

fn to_py_err(e: FieldError) -> PyErr {
    match e {
        FieldError::IntegrationFailure(_) => PyRuntimeError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

fn mesh_from_lists(
    centers: Vec<[f64; 3]>,
    normals: Vec<[f64; 3]>,
    areas: Vec<f64>,
) -> PyResult<SurfaceMesh> {
    if centers.len() != areas.len() || normals.len() != areas.len() {
        return Err(PyValueError::new_err(format!(
            "mesh lists differ in length: {} centers, {} normals, {} areas",
            centers.len(),
            normals.len(),
            areas.len()
        )));
    }
    Ok(SurfaceMesh {
        centers,
        normals,
        areas,
    })
}

// ─── PySolverConfig ─────────────────────────────────────────────────

/// Python-visible solver constants.
#[pyclass(name = "SolverConfig")]
#[derive(Clone)]
struct PySolverConfig {
    inner: SolverConfig,
}

#[pymethods]
impl PySolverConfig {
    #[new]
    #[pyo3(signature = (g = 1.0, c = 1.0, zero_pad_factor = 2, softening = 0.0))]
    fn new(g: f64, c: f64, zero_pad_factor: usize, softening: f64) -> PyResult<Self> {
        let config = SolverConfig {
            g,
            c,
            zero_pad_factor,
            softening,
        };
        config.validate().map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    /// Construct from JSON string; missing keys take SI defaults.
    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        let config = SolverConfig::from_json(json).map_err(to_py_err)?;
        Ok(Self { inner: config })
    }

    #[getter]
    fn g(&self) -> f64 {
        self.inner.g
    }

    #[getter]
    fn c(&self) -> f64 {
        self.inner.c
    }

    #[getter]
    fn zero_pad_factor(&self) -> usize {
        self.inner.zero_pad_factor
    }

    fn __repr__(&self) -> String {
        format!(
            "SolverConfig(g={:e}, c={:e}, zero_pad_factor={}, softening={})",
            self.inner.g, self.inner.c, self.inner.zero_pad_factor, self.inner.softening
        )
    }
}

// ─── PyGrid ─────────────────────────────────────────────────────────

/// Regular-grid scalar field, flat in x-fastest order.
#[pyclass(name = "Grid")]
#[derive(Clone)]
struct PyGrid {
    inner: ScalarField,
}

#[pymethods]
impl PyGrid {
    /// `origin = None` centres the grid on the coordinate origin.
    #[new]
    #[pyo3(signature = (data, shape, spacing = (1.0, 1.0, 1.0), origin = None))]
    fn new(
        data: Vec<f64>,
        shape: (usize, usize, usize),
        spacing: (f64, f64, f64),
        origin: Option<(f64, f64, f64)>,
    ) -> PyResult<Self> {
        let shape = GridShape::new(shape.0, shape.1, shape.2);
        let spacing = [spacing.0, spacing.1, spacing.2];
        let origin = origin
            .map(|o| [o.0, o.1, o.2])
            .unwrap_or_else(|| ScalarField::centered_origin(shape, spacing));
        let inner = ScalarField::new(shape, origin, spacing, data).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    fn data(&self) -> Vec<f64> {
        self.inner.data().to_vec()
    }

    #[getter]
    fn shape(&self) -> (usize, usize, usize) {
        let s = self.inner.shape();
        (s.nx, s.ny, s.nz)
    }

    #[getter]
    fn spacing(&self) -> (f64, f64, f64) {
        let d = self.inner.spacing();
        (d[0], d[1], d[2])
    }

    #[getter]
    fn origin(&self) -> (f64, f64, f64) {
        let o = self.inner.origin();
        (o[0], o[1], o[2])
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        let s = self.inner.shape();
        let (lo, hi) = self.inner.min_max();
        format!("Grid(shape=({}, {}, {}), min={lo:.4e}, max={hi:.4e})", s.nx, s.ny, s.nz)
    }
}

// ─── PyGreenKernelConvolver ─────────────────────────────────────────

/// Poisson/Yukawa spectral solver with optional μ0(k) and ellipsoidal kernel.
#[pyclass(name = "GreenKernelConvolver")]
struct PyGreenKernelConvolver {
    inner: GreenKernelConvolver,
}

#[pymethods]
impl PyGreenKernelConvolver {
    /// `coupling = None` selects the Newtonian −4πG.
    #[new]
    #[pyo3(signature = (
        g = 1.0,
        coupling = None,
        screening_length = None,
        zero_pad_factor = 1,
        eps = 0.0,
        k0 = 1.0,
        m = 2.0,
        axis_ratio = None,
        angle = 0.0,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        g: f64,
        coupling: Option<f64>,
        screening_length: Option<f64>,
        zero_pad_factor: usize,
        eps: f64,
        k0: f64,
        m: f64,
        axis_ratio: Option<f64>,
        angle: f64,
    ) -> PyResult<Self> {
        let mut conv = match coupling {
            Some(c) => GreenKernelConvolver::new(c),
            None => GreenKernelConvolver::newtonian(g),
        }
        .and_then(|c| c.with_padding(zero_pad_factor))
        .map_err(to_py_err)?;
        if let Some(lambda) = screening_length {
            conv = conv.with_screening(lambda).map_err(to_py_err)?;
        }
        if eps != 0.0 {
            conv = conv
                .with_scale_multiplier(ScaleMultiplierParams { eps, k0, m })
                .map_err(to_py_err)?;
        }
        if let Some(q) = axis_ratio {
            conv = conv.with_axis_ratio(q, angle).map_err(to_py_err)?;
        }
        Ok(Self { inner: conv })
    }

    /// Linear solve on the grid of `source`.
    fn solve(&self, source: PyRef<'_, PyGrid>) -> PyResult<PyGrid> {
        let inner = self.inner.solve(&source.inner).map_err(to_py_err)?;
        Ok(PyGrid { inner })
    }

    /// Fixed-point nonlinear solve j_eff = j·(1 + γ|∇φ|²)^q.
    #[pyo3(signature = (source, gamma, power_q = 1.0, n_iter = 3))]
    fn solve_nonlinear(
        &self,
        source: PyRef<'_, PyGrid>,
        gamma: f64,
        power_q: f64,
        n_iter: usize,
    ) -> PyResult<PyGrid> {
        let inner = self
            .inner
            .solve_nonlinear(&source.inner, gamma, power_q, n_iter)
            .map_err(to_py_err)?;
        Ok(PyGrid { inner })
    }

    fn __repr__(&self) -> String {
        format!(
            "GreenKernelConvolver(coupling={}, screening_length={:?}, zero_pad_factor={})",
            self.inner.coupling(),
            self.inner.screening_length(),
            self.inner.zero_pad_factor()
        )
    }
}

// ─── Quadrupole / anisotropy ────────────────────────────────────────

/// l = 2 correction potential. `axis` is a global 3-vector; `axes`, when
/// given, holds one axis per voxel and takes precedence.
#[pyfunction]
#[pyo3(signature = (density, a2, axis = (0.0, 0.0, 1.0), axes = None, g = 1.0, zero_pad_factor = 2))]
fn solve_l2(
    density: PyRef<'_, PyGrid>,
    a2: PyRef<'_, PyGrid>,
    axis: (f64, f64, f64),
    axes: Option<Vec<[f64; 3]>>,
    g: f64,
    zero_pad_factor: usize,
) -> PyResult<PyGrid> {
    let solver = AnisotropicCorrectionSolver::new(g)
        .and_then(|s| s.with_padding(zero_pad_factor))
        .map_err(to_py_err)?;
    let axis = match axes {
        Some(v) => PrincipalAxis::PerVoxel(v),
        None => PrincipalAxis::Global([axis.0, axis.1, axis.2]),
    };
    let inner = solver
        .solve_l2(&density.inner, &a2.inner, &axis)
        .map_err(to_py_err)?;
    Ok(PyGrid { inner })
}

/// Structure-tensor anisotropy. Returns dict with amplitude (Grid),
/// axes (per-voxel unit vectors) and eigenvalues (per-voxel, descending).
#[pyfunction]
#[pyo3(signature = (density, smoothing_scale = None))]
fn estimate_anisotropy(
    py: Python<'_>,
    density: PyRef<'_, PyGrid>,
    smoothing_scale: Option<f64>,
) -> PyResult<PyObject> {
    let est = AnisotropyEstimator::default()
        .estimate(&density.inner, smoothing_scale)
        .map_err(to_py_err)?;
    let field = est.to_field();
    let eigenvalues: Vec<[f64; 3]> = (0..density.inner.len()).map(|v| est.eigenvalues(v)).collect();
    let dict = PyDict::new(py);
    dict.set_item("amplitude", Py::new(py, PyGrid { inner: field.amplitude })?)?;
    dict.set_item("axes", field.axes)?;
    dict.set_item("eigenvalues", eigenvalues)?;
    Ok(dict.into())
}

// ─── Interface sources ──────────────────────────────────────────────

/// Diffuse boundary layer. Returns dict with effective_density, shell,
/// peak_weight and integrated_weight.
#[pyfunction]
#[pyo3(signature = (
    density,
    proxy,
    omega_star,
    coupling_strength,
    characteristic_length,
    smoothing_scale = None,
))]
fn boundary_layer(
    py: Python<'_>,
    density: PyRef<'_, PyGrid>,
    proxy: PyRef<'_, PyGrid>,
    omega_star: f64,
    coupling_strength: f64,
    characteristic_length: f64,
    smoothing_scale: Option<f64>,
) -> PyResult<PyObject> {
    let params = InterfaceParams {
        omega_star,
        coupling_strength,
        characteristic_length,
        smoothing_scale,
    };
    let layer = BoundaryLayerBuilder::new(params)
        .and_then(|b| b.build(&density.inner, &proxy.inner))
        .map_err(to_py_err)?;
    let dict = PyDict::new(py);
    dict.set_item(
        "effective_density",
        Py::new(
            py,
            PyGrid {
                inner: layer.effective_density,
            },
        )?,
    )?;
    dict.set_item("shell", Py::new(py, PyGrid { inner: layer.shell })?)?;
    dict.set_item("peak_weight", layer.metadata.peak_weight)?;
    dict.set_item("integrated_weight", layer.metadata.integrated_weight)?;
    Ok(dict.into())
}

/// Isosurface of `field` at `level`. Returns dict with centers, normals, areas.
#[pyfunction]
#[pyo3(signature = (field, level, method = "triangulated"))]
fn extract_isosurface(
    py: Python<'_>,
    field: PyRef<'_, PyGrid>,
    level: f64,
    method: &str,
) -> PyResult<PyObject> {
    let method = match method {
        "triangulated" => SurfaceMethod::Triangulated,
        "voxel_face" => SurfaceMethod::VoxelFace,
        other => {
            return Err(PyValueError::new_err(format!(
                "unknown method '{other}', expected 'triangulated' or 'voxel_face'"
            )))
        }
    };
    // G and c do not enter extraction
    let model = SurfaceEmissionModel::new(1.0, 1.0)
        .map_err(to_py_err)?
        .with_method(method);
    let mesh = model.extract(&field.inner, level);
    let dict = PyDict::new(py);
    dict.set_item("centers", mesh.centers)?;
    dict.set_item("normals", mesh.normals)?;
    dict.set_item("areas", mesh.areas)?;
    Ok(dict.into())
}

/// Attenuated inward flux per mesh face.
#[pyfunction]
#[pyo3(signature = (centers, normals, areas, density, attenuation_length, step = None, max_path = None))]
fn line_integral_flux(
    centers: Vec<[f64; 3]>,
    normals: Vec<[f64; 3]>,
    areas: Vec<f64>,
    density: PyRef<'_, PyGrid>,
    attenuation_length: f64,
    step: Option<f64>,
    max_path: Option<f64>,
) -> PyResult<Vec<f64>> {
    let mesh = mesh_from_lists(centers, normals, areas)?;
    SurfaceEmissionModel::new(1.0, 1.0)
        .and_then(|m| m.line_integral_flux(&mesh, &density.inner, attenuation_length, step, max_path))
        .map_err(to_py_err)
}

/// Λ(x) surface integral at `points`.
#[pyfunction]
#[pyo3(signature = (centers, normals, areas, flux, points, config = None))]
fn evaluate_lambda(
    centers: Vec<[f64; 3]>,
    normals: Vec<[f64; 3]>,
    areas: Vec<f64>,
    flux: Vec<f64>,
    points: Vec<[f64; 3]>,
    config: Option<PySolverConfig>,
) -> PyResult<Vec<f64>> {
    let mesh = mesh_from_lists(centers, normals, areas)?;
    let config = config.map(|c| c.inner).unwrap_or_else(SolverConfig::geometric);
    SurfaceEmissionModel::from_config(&config)
        .and_then(|m| m.evaluate_at_points(&mesh, &flux, &points))
        .map_err(to_py_err)
}

// ─── Profiles / growth ──────────────────────────────────────────────

/// Mid-plane rotation curve of a potential. Returns dict with r, g_r, v_c.
#[pyfunction]
#[pyo3(signature = (phi, nbins = 20))]
fn rotation_curve(py: Python<'_>, phi: PyRef<'_, PyGrid>, nbins: usize) -> PyResult<PyObject> {
    let prof = circular_profile(&acceleration(&phi.inner), nbins).map_err(to_py_err)?;
    let dict = PyDict::new(py);
    dict.set_item("v_c", prof.circular_velocity())?;
    dict.set_item("r", prof.r)?;
    dict.set_item("g_r", prof.g_r)?;
    Ok(dict.into())
}

/// Linear growth D(a)/D(a[0]) and f = dlnD/dlna at wavenumber `k`.
#[pyfunction]
#[pyo3(signature = (
    a_grid,
    k,
    omega_m0 = 0.315,
    omega_lambda0 = 0.685,
    use_multiplier = true,
    multiplier_json = None,
    a_init = None,
))]
#[allow(clippy::too_many_arguments)]
fn growth_factor(
    py: Python<'_>,
    a_grid: Vec<f64>,
    k: f64,
    omega_m0: f64,
    omega_lambda0: f64,
    use_multiplier: bool,
    multiplier_json: Option<&str>,
    a_init: Option<f64>,
) -> PyResult<PyObject> {
    let multiplier = match multiplier_json {
        Some(json) => LateMultiplierParams::from_json(json).map_err(to_py_err)?,
        None => LateMultiplierParams::default(),
    };
    let cosmology = CosmologyParams {
        omega_m0,
        omega_lambda0,
    };
    let traj = ScaleDependentGrowthSolver::new(GrowthConfig::default())
        .and_then(|s| s.solve(&a_grid, k, &cosmology, use_multiplier, &multiplier, a_init))
        .map_err(to_py_err)?;
    let dict = PyDict::new(py);
    dict.set_item("a", traj.a)?;
    dict.set_item("d", traj.d)?;
    dict.set_item("f", traj.f)?;
    Ok(dict.into())
}

// ─── Module Registration ────────────────────────────────────────────

/// Effective-Field Kernel — spectral and direct solvers for
/// density-sourced effective potentials.
///
/// - `SolverConfig`, `Grid`: configuration and grid container
/// - `GreenKernelConvolver`: Poisson/Yukawa FFT solver
/// - `solve_l2`, `estimate_anisotropy`: quadrupole correction path
/// - `boundary_layer`, `extract_isosurface`, `line_integral_flux`,
///   `evaluate_lambda`: interface sources
/// - `rotation_curve`, `growth_factor`: derived observables
#[pymodule]
fn effield_kernel(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySolverConfig>()?;
    m.add_class::<PyGrid>()?;
    m.add_class::<PyGreenKernelConvolver>()?;
    // Quadrupole path
    m.add_function(wrap_pyfunction!(solve_l2, m)?)?;
    m.add_function(wrap_pyfunction!(estimate_anisotropy, m)?)?;
    // Interface sources
    m.add_function(wrap_pyfunction!(boundary_layer, m)?)?;
    m.add_function(wrap_pyfunction!(extract_isosurface, m)?)?;
    m.add_function(wrap_pyfunction!(line_integral_flux, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_lambda, m)?)?;
    // Observables
    m.add_function(wrap_pyfunction!(rotation_curve, m)?)?;
    m.add_function(wrap_pyfunction!(growth_factor, m)?)?;
    Ok(())
}
