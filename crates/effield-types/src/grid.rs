// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Regular Grid Types
// ─────────────────────────────────────────────────────────────────────
//! Regular-grid scalar and vector fields.
//!
//! Storage is a flat row-major `Vec<f64>` with x varying fastest:
//! `idx = (iz * ny + iy) * nx + ix`. Planar (2D) fields are stored with
//! `nz == 1`; every operator in the workspace treats a length-1 axis as
//! absent. Voxel `i` along an axis is centred at `origin + (i + 0.5) * d`.

use serde::{Deserialize, Serialize};

use crate::error::{FieldError, FieldResult};

/// Replace a non-finite value with `fallback`, logging the substitution.
#[inline]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        log::warn!("finite_or: non-finite value {value} replaced by {fallback:.4e}");
        fallback
    }
}

/// Check that every spacing component is finite and strictly positive.
pub fn validate_spacing(spacing: [f64; 3]) -> FieldResult<()> {
    for (axis, &d) in spacing.iter().enumerate() {
        if !(d.is_finite() && d > 0.0) {
            return Err(FieldError::invalid(format!(
                "spacing[{axis}] must be finite and > 0, got {d}"
            )));
        }
    }
    Ok(())
}

/// Number of voxels along x, y and z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
}

impl GridShape {
    pub fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Single-plane shape for 2D fields.
    pub fn planar(nx: usize, ny: usize) -> Self {
        Self { nx, ny, nz: 1 }
    }

    /// Cubic shape with `n` voxels per side.
    pub fn cube(n: usize) -> Self {
        Self { nx: n, ny: n, nz: n }
    }

    pub fn from_dims(dims: [usize; 3]) -> Self {
        Self::new(dims[0], dims[1], dims[2])
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        [self.nx, self.ny, self.nz]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of axes with more than one voxel.
    pub fn active_axes(&self) -> usize {
        self.dims().iter().filter(|&&n| n > 1).count()
    }

    pub fn is_planar(&self) -> bool {
        self.nz == 1
    }

    /// Flat-buffer stride of `axis` (0 = x, 1 = y, 2 = z).
    #[inline]
    pub fn stride(&self, axis: usize) -> usize {
        match axis {
            0 => 1,
            1 => self.nx,
            _ => self.nx * self.ny,
        }
    }

    #[inline]
    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        (iz * self.ny + iy) * self.nx + ix
    }

    #[inline]
    pub fn unravel(&self, idx: usize) -> [usize; 3] {
        let ix = idx % self.nx;
        let rest = idx / self.nx;
        [ix, rest % self.ny, rest / self.ny]
    }
}

/// Scalar field on a regular grid (density, proxy tracer, potential).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarField {
    shape: GridShape,
    origin: [f64; 3],
    spacing: [f64; 3],
    data: Vec<f64>,
}

/// Mass/tracer density on a regular grid.
pub type DensityField = ScalarField;

impl ScalarField {
    pub fn new(
        shape: GridShape,
        origin: [f64; 3],
        spacing: [f64; 3],
        data: Vec<f64>,
    ) -> FieldResult<Self> {
        validate_spacing(spacing)?;
        if shape.is_empty() {
            return Err(FieldError::invalid(format!(
                "grid shape must be non-empty, got {:?}",
                shape.dims()
            )));
        }
        if data.len() != shape.len() {
            return Err(FieldError::invalid(format!(
                "data length {} does not match grid {:?} ({} voxels)",
                data.len(),
                shape.dims(),
                shape.len()
            )));
        }
        Ok(Self {
            shape,
            origin,
            spacing,
            data,
        })
    }

    pub fn zeros(shape: GridShape, origin: [f64; 3], spacing: [f64; 3]) -> FieldResult<Self> {
        Self::new(shape, origin, spacing, vec![0.0; shape.len()])
    }

    /// Build a field by evaluating `f` at every voxel centre.
    pub fn from_fn(
        shape: GridShape,
        origin: [f64; 3],
        spacing: [f64; 3],
        f: impl Fn([f64; 3]) -> f64,
    ) -> FieldResult<Self> {
        let mut field = Self::zeros(shape, origin, spacing)?;
        for idx in 0..shape.len() {
            let [ix, iy, iz] = shape.unravel(idx);
            field.data[idx] = f(field.voxel_center(ix, iy, iz));
        }
        Ok(field)
    }

    /// Grid geometry chosen so the box is centred on the coordinate origin.
    pub fn centered_origin(shape: GridShape, spacing: [f64; 3]) -> [f64; 3] {
        let dims = shape.dims();
        [
            -0.5 * dims[0] as f64 * spacing[0],
            -0.5 * dims[1] as f64 * spacing[1],
            -0.5 * dims[2] as f64 * spacing[2],
        ]
    }

    /// New field with this field's geometry and the given data.
    pub fn with_data(&self, data: Vec<f64>) -> FieldResult<Self> {
        Self::new(self.shape, self.origin, self.spacing, data)
    }

    pub fn zeros_like(&self) -> Self {
        Self {
            shape: self.shape,
            origin: self.origin,
            spacing: self.spacing,
            data: vec![0.0; self.data.len()],
        }
    }

    #[inline]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[inline]
    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }

    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, ix: usize, iy: usize, iz: usize) -> f64 {
        self.data[self.shape.index(ix, iy, iz)]
    }

    #[inline]
    pub fn set(&mut self, ix: usize, iy: usize, iz: usize, value: f64) {
        let idx = self.shape.index(ix, iy, iz);
        self.data[idx] = value;
    }

    /// Physical coordinates of a voxel centre.
    #[inline]
    pub fn voxel_center(&self, ix: usize, iy: usize, iz: usize) -> [f64; 3] {
        [
            self.origin[0] + (ix as f64 + 0.5) * self.spacing[0],
            self.origin[1] + (iy as f64 + 0.5) * self.spacing[1],
            self.origin[2] + (iz as f64 + 0.5) * self.spacing[2],
        ]
    }

    /// Centre of the whole box.
    pub fn box_center(&self) -> [f64; 3] {
        let dims = self.shape.dims();
        [
            self.origin[0] + 0.5 * dims[0] as f64 * self.spacing[0],
            self.origin[1] + 0.5 * dims[1] as f64 * self.spacing[1],
            self.origin[2] + 0.5 * dims[2] as f64 * self.spacing[2],
        ]
    }

    /// dx·dy·dz. Planar fields use their z spacing as slab thickness.
    #[inline]
    pub fn voxel_volume(&self) -> f64 {
        self.spacing[0] * self.spacing[1] * self.spacing[2]
    }

    /// Fail fast unless `other` has exactly this field's grid shape.
    pub fn ensure_same_shape(&self, other: &ScalarField, what: &str) -> FieldResult<()> {
        if self.shape != other.shape {
            return Err(FieldError::invalid(format!(
                "{what} grid {:?} does not match density grid {:?}",
                other.shape.dims(),
                self.shape.dims()
            )));
        }
        Ok(())
    }

    /// (min, max) over all voxels, ignoring NaN.
    pub fn min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn is_all_zero(&self) -> bool {
        self.data.iter().all(|&v| v == 0.0)
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape,
            origin: self.origin,
            spacing: self.spacing,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Element-wise combination with a same-shape field.
    pub fn zip_map(&self, other: &ScalarField, f: impl Fn(f64, f64) -> f64) -> FieldResult<Self> {
        self.ensure_same_shape(other, "operand")?;
        Ok(Self {
            shape: self.shape,
            origin: self.origin,
            spacing: self.spacing,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }
}

/// Three-component field, e.g. a gradient or an acceleration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub x: ScalarField,
    pub y: ScalarField,
    pub z: ScalarField,
}

impl VectorField {
    pub fn components(&self) -> [&ScalarField; 3] {
        [&self.x, &self.y, &self.z]
    }

    #[inline]
    pub fn at(&self, idx: usize) -> [f64; 3] {
        [self.x.data()[idx], self.y.data()[idx], self.z.data()[idx]]
    }

    pub fn magnitude(&self) -> ScalarField {
        let data = (0..self.x.len())
            .map(|i| {
                let [a, b, c] = self.at(i);
                (a * a + b * b + c * c).sqrt()
            })
            .collect();
        Self::rebuild(&self.x, data)
    }

    /// Component-wise negation (acceleration from a potential gradient).
    pub fn negated(&self) -> VectorField {
        VectorField {
            x: self.x.map(|v| -v),
            y: self.y.map(|v| -v),
            z: self.z.map(|v| -v),
        }
    }

    fn rebuild(like: &ScalarField, data: Vec<f64>) -> ScalarField {
        ScalarField {
            shape: like.shape,
            origin: like.origin,
            spacing: like.spacing,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip_corner_cases() {
        let s = GridShape::new(4, 3, 2);
        assert_eq!(s.index(0, 0, 0), 0);
        assert_eq!(s.index(3, 2, 1), s.len() - 1);
        assert_eq!(s.unravel(s.index(2, 1, 1)), [2, 1, 1]);
        assert_eq!(s.stride(2), 12);
    }

    #[test]
    fn test_planar_shape() {
        let s = GridShape::planar(8, 6);
        assert!(s.is_planar());
        assert_eq!(s.active_axes(), 2);
        assert_eq!(GridShape::cube(5).active_axes(), 3);
    }

    #[test]
    fn test_rejects_bad_spacing() {
        let shape = GridShape::cube(2);
        let err = ScalarField::zeros(shape, [0.0; 3], [1.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, FieldError::InvalidParameter(_)));
        assert!(ScalarField::zeros(shape, [0.0; 3], [1.0, -2.0, 1.0]).is_err());
        assert!(ScalarField::zeros(shape, [0.0; 3], [f64::NAN, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let r = ScalarField::new(GridShape::cube(2), [0.0; 3], [1.0; 3], vec![0.0; 7]);
        assert!(r.is_err());
    }

    #[test]
    fn test_voxel_center_convention() {
        let f = ScalarField::zeros(GridShape::cube(4), [-2.0, -2.0, -2.0], [1.0; 3]).unwrap();
        assert_eq!(f.voxel_center(0, 0, 0), [-1.5, -1.5, -1.5]);
        assert_eq!(f.box_center(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_shape_mismatch_fails_fast() {
        let a = ScalarField::zeros(GridShape::cube(4), [0.0; 3], [1.0; 3]).unwrap();
        let b = ScalarField::zeros(GridShape::new(4, 4, 3), [0.0; 3], [1.0; 3]).unwrap();
        assert!(a.ensure_same_shape(&b, "proxy").is_err());
        assert!(a.zip_map(&b, |x, y| x + y).is_err());
    }

    #[test]
    fn test_from_fn_and_min_max() {
        let shape = GridShape::new(3, 1, 1);
        let f = ScalarField::from_fn(shape, [0.0; 3], [1.0; 3], |p| p[0]).unwrap();
        assert_eq!(f.data(), &[0.5, 1.5, 2.5]);
        assert_eq!(f.min_max(), (0.5, 2.5));
    }

    #[test]
    fn test_finite_or() {
        assert_eq!(finite_or(f64::NAN, 0.0), 0.0);
        assert_eq!(finite_or(f64::INFINITY, 1.0), 1.0);
        assert_eq!(finite_or(0.25, 1.0), 0.25);
    }
}
