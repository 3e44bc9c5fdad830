// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Surface Emission
// ─────────────────────────────────────────────────────────────────────
//! Explicit isosurface extraction, inward line-integral flux and the
//! outward-flux surface integral Λ(x).
//!
//! Normals always point toward decreasing field, i.e. outward for a
//! density-like field that peaks inside the surface.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use effield_types::{FieldError, FieldResult, ScalarField, SolverConfig};

/// Cube corner offsets (x, y, z).
const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Six tetrahedra sharing the 0–6 diagonal. Conforming across cubes.
const TETS: [[usize; 4]; 6] = [
    [0, 1, 2, 6],
    [0, 1, 5, 6],
    [0, 3, 2, 6],
    [0, 3, 7, 6],
    [0, 4, 5, 6],
    [0, 4, 7, 6],
];

/// Most samples one face's line integral may take.
const MAX_PATH_SAMPLES: f64 = 1e7;

/// Isosurface discretisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceMethod {
    /// Marching tetrahedra; needs at least two samples on every axis.
    #[default]
    Triangulated,
    /// One axis-aligned face per straddling voxel pair.
    VoxelFace,
}

/// Surface elements in physical coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceMesh {
    pub centers: Vec<[f64; 3]>,
    pub normals: Vec<[f64; 3]>,
    pub areas: Vec<f64>,
}

impl SurfaceMesh {
    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn total_area(&self) -> f64 {
        self.areas.iter().sum()
    }

    fn from_faces(faces: Vec<Face>) -> Self {
        let mut mesh = SurfaceMesh {
            centers: Vec::with_capacity(faces.len()),
            normals: Vec::with_capacity(faces.len()),
            areas: Vec::with_capacity(faces.len()),
        };
        for f in faces {
            mesh.centers.push(f.center);
            mesh.normals.push(f.normal);
            mesh.areas.push(f.area);
        }
        mesh
    }
}

#[derive(Debug, Clone, Copy)]
struct Face {
    center: [f64; 3],
    normal: [f64; 3],
    area: f64,
}

#[inline]
fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn mean(points: &[[f64; 3]]) -> [f64; 3] {
    let n = points.len() as f64;
    let mut m = [0.0; 3];
    for p in points {
        for a in 0..3 {
            m[a] += p[a] / n;
        }
    }
    m
}

/// Triangle face oriented along `toward`; degenerate triangles are dropped.
fn triangle(tri: [[f64; 3]; 3], toward: [f64; 3], out: &mut Vec<Face>) {
    let c = cross(sub(tri[1], tri[0]), sub(tri[2], tri[0]));
    let mag = dot(c, c).sqrt();
    if !(mag > 0.0) {
        return;
    }
    let sign = if dot(c, toward) < 0.0 { -1.0 } else { 1.0 };
    out.push(Face {
        center: mean(&tri),
        normal: [sign * c[0] / mag, sign * c[1] / mag, sign * c[2] / mag],
        area: 0.5 * mag,
    });
}

fn tet_faces(p: [[f64; 3]; 4], v: [f64; 4], level: f64, out: &mut Vec<Face>) {
    let mut hi = [0usize; 4];
    let mut lo = [0usize; 4];
    let (mut nh, mut nl) = (0, 0);
    for i in 0..4 {
        if v[i] > level {
            hi[nh] = i;
            nh += 1;
        } else {
            lo[nl] = i;
            nl += 1;
        }
    }
    if nh == 0 || nh == 4 {
        return;
    }
    let cut = |a: usize, b: usize| {
        let t = (level - v[a]) / (v[b] - v[a]);
        [
            p[a][0] + t * (p[b][0] - p[a][0]),
            p[a][1] + t * (p[b][1] - p[a][1]),
            p[a][2] + t * (p[b][2] - p[a][2]),
        ]
    };
    let hi_pts: Vec<[f64; 3]> = hi[..nh].iter().map(|&i| p[i]).collect();
    let lo_pts: Vec<[f64; 3]> = lo[..nl].iter().map(|&i| p[i]).collect();
    let toward = sub(mean(&lo_pts), mean(&hi_pts));
    match nh {
        1 => {
            let a = hi[0];
            triangle([cut(a, lo[0]), cut(a, lo[1]), cut(a, lo[2])], toward, out);
        }
        3 => {
            let b = lo[0];
            triangle([cut(hi[0], b), cut(hi[1], b), cut(hi[2], b)], toward, out);
        }
        _ => {
            let q = [
                cut(hi[0], lo[0]),
                cut(hi[0], lo[1]),
                cut(hi[1], lo[1]),
                cut(hi[1], lo[0]),
            ];
            triangle([q[0], q[1], q[2]], toward, out);
            triangle([q[0], q[2], q[3]], toward, out);
        }
    }
}

fn triangulate(field: &ScalarField, level: f64) -> Vec<Face> {
    let shape = field.shape();
    let [nx, ny, nz] = shape.dims();
    let (cx, cy, cz) = (nx - 1, ny - 1, nz - 1);
    let data = field.data();
    (0..cx * cy * cz)
        .into_par_iter()
        .flat_map_iter(|c| {
            let (ix, iy, iz) = (c % cx, (c / cx) % cy, c / (cx * cy));
            let mut pts = [[0.0; 3]; 8];
            let mut vals = [0.0; 8];
            for (k, off) in CORNERS.iter().enumerate() {
                let (jx, jy, jz) = (ix + off[0], iy + off[1], iz + off[2]);
                pts[k] = field.voxel_center(jx, jy, jz);
                vals[k] = data[shape.index(jx, jy, jz)];
            }
            let mut faces = Vec::new();
            let any_hi = vals.iter().any(|&v| v > level);
            let any_lo = vals.iter().any(|&v| v <= level);
            if any_hi && any_lo {
                for t in TETS {
                    tet_faces(
                        [pts[t[0]], pts[t[1]], pts[t[2]], pts[t[3]]],
                        [vals[t[0]], vals[t[1]], vals[t[2]], vals[t[3]]],
                        level,
                        &mut faces,
                    );
                }
            }
            faces
        })
        .collect()
}

fn voxel_faces(field: &ScalarField, level: f64) -> Vec<Face> {
    let shape = field.shape();
    let dims = shape.dims();
    let spacing = field.spacing();
    let data = field.data();
    let mut faces = Vec::new();
    for axis in 0..3 {
        if dims[axis] < 2 {
            continue;
        }
        let area = (0..3).filter(|&a| a != axis).map(|a| spacing[a]).product();
        let stride = shape.stride(axis);
        for idx in 0..data.len() {
            let [ix, iy, iz] = shape.unravel(idx);
            if [ix, iy, iz][axis] + 1 >= dims[axis] {
                continue;
            }
            let (a, b) = (data[idx], data[idx + stride]);
            if (a > level) == (b > level) {
                continue;
            }
            let p = field.voxel_center(ix, iy, iz);
            let mut center = p;
            center[axis] += 0.5 * spacing[axis];
            let mut normal = [0.0; 3];
            normal[axis] = if b < a { 1.0 } else { -1.0 };
            faces.push(Face {
                center,
                normal,
                area,
            });
        }
    }
    faces
}

/// Trilinear sample at a physical point with clamped voxel indices.
pub fn trilinear_sample(field: &ScalarField, x: [f64; 3]) -> f64 {
    let shape = field.shape();
    let dims = shape.dims();
    let origin = field.origin();
    let spacing = field.spacing();
    let mut i0 = [0usize; 3];
    let mut i1 = [0usize; 3];
    let mut t = [0.0; 3];
    for a in 0..3 {
        let g = (x[a] - origin[a]) / spacing[a] - 0.5;
        let fl = g.floor();
        t[a] = g - fl;
        let last = dims[a] as i64 - 1;
        let i = fl as i64;
        i0[a] = i.clamp(0, last) as usize;
        i1[a] = (i + 1).clamp(0, last) as usize;
    }
    let d = field.data();
    let at = |x: usize, y: usize, z: usize| d[shape.index(x, y, z)];
    let c00 = at(i0[0], i0[1], i0[2]) * (1.0 - t[0]) + at(i1[0], i0[1], i0[2]) * t[0];
    let c10 = at(i0[0], i1[1], i0[2]) * (1.0 - t[0]) + at(i1[0], i1[1], i0[2]) * t[0];
    let c01 = at(i0[0], i0[1], i1[2]) * (1.0 - t[0]) + at(i1[0], i0[1], i1[2]) * t[0];
    let c11 = at(i0[0], i1[1], i1[2]) * (1.0 - t[0]) + at(i1[0], i1[1], i1[2]) * t[0];
    let c0 = c00 * (1.0 - t[1]) + c10 * t[1];
    let c1 = c01 * (1.0 - t[1]) + c11 * t[1];
    c0 * (1.0 - t[2]) + c1 * t[2]
}

/// Isosurface extraction, flux and Λ evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceEmissionModel {
    g: f64,
    c: f64,
    method: SurfaceMethod,
}

impl SurfaceEmissionModel {
    pub fn new(g: f64, c: f64) -> FieldResult<Self> {
        if !g.is_finite() || !(c.is_finite() && c > 0.0) {
            return Err(FieldError::invalid(format!(
                "G must be finite and c > 0, got G={g}, c={c}"
            )));
        }
        Ok(Self {
            g,
            c,
            method: SurfaceMethod::default(),
        })
    }

    pub fn from_config(config: &SolverConfig) -> FieldResult<Self> {
        config.validate()?;
        Self::new(config.g, config.c)
    }

    pub fn with_method(mut self, method: SurfaceMethod) -> Self {
        self.method = method;
        self
    }

    pub fn method(&self) -> SurfaceMethod {
        self.method
    }

    /// Surface where `field` crosses `level`. A level outside the field's
    /// value range yields an empty mesh.
    ///
    /// Triangulation needs two samples along every axis; planar fields
    /// use voxel faces instead.
    pub fn extract(&self, field: &ScalarField, level: f64) -> SurfaceMesh {
        let (lo, hi) = field.min_max();
        if !(level >= lo && level < hi) {
            log::debug!("isosurface level {level} outside field range [{lo}, {hi}]");
            return SurfaceMesh::default();
        }
        let faces = match self.method {
            SurfaceMethod::Triangulated if field.shape().dims().iter().any(|&n| n < 2) => {
                let [nx, ny, nz] = field.shape().dims();
                log::debug!("{nx}x{ny}x{nz} grid has a length-1 axis, extracting voxel faces");
                voxel_faces(field, level)
            }
            SurfaceMethod::Triangulated => triangulate(field, level),
            SurfaceMethod::VoxelFace => voxel_faces(field, level),
        };
        SurfaceMesh::from_faces(faces)
    }

    /// Attenuated inward line integral u = Σ ρ(c − ℓn̂)·e^(−ℓ/L)·Δℓ per face.
    ///
    /// Defaults: step 0.75·min spacing, path 10·max spacing·max extent.
    pub fn line_integral_flux(
        &self,
        mesh: &SurfaceMesh,
        density: &ScalarField,
        attenuation_length: f64,
        step: Option<f64>,
        max_path: Option<f64>,
    ) -> FieldResult<Vec<f64>> {
        let spacing = density.spacing();
        let dims = density.shape().dims();
        let step = step.unwrap_or_else(|| 0.75 * spacing.iter().copied().fold(f64::INFINITY, f64::min));
        let max_path = max_path.unwrap_or_else(|| {
            let d_max = spacing.iter().copied().fold(0.0, f64::max);
            10.0 * d_max * dims.iter().copied().max().unwrap_or(1) as f64
        });
        if !(step.is_finite() && step > 0.0) {
            return Err(FieldError::invalid(format!("step must be > 0, got {step}")));
        }
        if !(max_path.is_finite() && max_path >= 0.0) {
            return Err(FieldError::invalid(format!("max_path must be >= 0, got {max_path}")));
        }
        let samples = max_path / step;
        if samples > MAX_PATH_SAMPLES {
            return Err(FieldError::invalid(format!(
                "step {step:e} needs {samples:.3e} samples over path {max_path}, limit {MAX_PATH_SAMPLES:e}"
            )));
        }
        let l_att = attenuation_length.max(1e-9);
        Ok(mesh
            .centers
            .par_iter()
            .zip(mesh.normals.par_iter())
            .map(|(c, n)| {
                let mut acc = 0.0;
                let mut ell = 0.0;
                while ell <= max_path {
                    let p = [c[0] - ell * n[0], c[1] - ell * n[1], c[2] - ell * n[2]];
                    acc += trilinear_sample(density, p) * (-ell / l_att).exp() * step;
                    ell += step;
                }
                acc
            })
            .collect())
    }

    /// Λ(x) = (G/πc)·Σ flux·(n̂·r)/|r|³·area with r = x − center.
    pub fn evaluate_at_points(
        &self,
        mesh: &SurfaceMesh,
        flux: &[f64],
        points: &[[f64; 3]],
    ) -> FieldResult<Vec<f64>> {
        if flux.len() != mesh.len() {
            return Err(FieldError::invalid(format!(
                "flux has {} entries for {} faces",
                flux.len(),
                mesh.len()
            )));
        }
        let k = self.g / self.c / std::f64::consts::PI;
        Ok(points
            .par_iter()
            .map(|x| {
                let mut acc = 0.0;
                for i in 0..mesh.len() {
                    let r = sub(*x, mesh.centers[i]);
                    let rn = dot(r, r).sqrt() + 1e-30;
                    acc += flux[i] * dot(mesh.normals[i], r) / (rn * rn * rn) * mesh.areas[i];
                }
                k * acc
            })
            .collect())
    }
}
