// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Core Engine Benchmarks
// ─────────────────────────────────────────────────────────────────────
//! Criterion benchmarks for the per-voxel and per-face hot paths.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use effield_core::{
    gaussian_blob, AnisotropyEstimator, DirectSummationEvaluator, SurfaceEmissionModel,
};
use effield_types::GridShape;

// ── AnisotropyEstimator.estimate() ──────────────────────────────────

fn bench_estimator(c: &mut Criterion) {
    let rho = gaussian_blob(GridShape::cube(24), 1.0, 4.0, 1.0).unwrap();
    let est = AnisotropyEstimator::default();
    c.bench_function("estimate_24", |b| b.iter(|| est.estimate(black_box(&rho), None)));
    c.bench_function("estimate_24_smoothed", |b| {
        b.iter(|| est.estimate(black_box(&rho), Some(1.5)))
    });
}

// ── SurfaceEmissionModel ────────────────────────────────────────────

fn bench_surface(c: &mut Criterion) {
    let rho = gaussian_blob(GridShape::cube(24), 1.0, 4.0, 1.0).unwrap();
    let model = SurfaceEmissionModel::new(1.0, 1.0).unwrap();
    c.bench_function("extract_24", |b| b.iter(|| model.extract(black_box(&rho), 0.3)));

    let mesh = model.extract(&rho, 0.3);
    c.bench_function("line_integral_flux_24", |b| {
        b.iter(|| model.line_integral_flux(black_box(&mesh), &rho, 2.0, None, Some(20.0)))
    });
    let flux = vec![1.0; mesh.len()];
    let points: Vec<[f64; 3]> = (0..64).map(|i| [i as f64 * 0.5 - 16.0, 0.0, 0.0]).collect();
    c.bench_function("evaluate_at_points_64", |b| {
        b.iter(|| model.evaluate_at_points(&mesh, &flux, black_box(&points)))
    });
}

// ── DirectSummationEvaluator ────────────────────────────────────────

fn bench_direct(c: &mut Criterion) {
    let rho = gaussian_blob(GridShape::cube(16), 1.0, 3.0, 1.0).unwrap();
    let eval = DirectSummationEvaluator::new(1.0, 1.0).unwrap();
    let points: Vec<[f64; 3]> = (0..32).map(|i| [i as f64 * 0.25, 0.3, -0.2]).collect();
    c.bench_function("phi_direct_batch_16_32pts", |b| {
        b.iter(|| eval.phi_eff_batch(black_box(&points), &rho, None, 0))
    });
}

criterion_group!(benches, bench_estimator, bench_surface, bench_direct);
criterion_main!(benches);
