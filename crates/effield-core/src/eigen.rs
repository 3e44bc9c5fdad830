// ─────────────────────────────────────────────────────────────────────
// Effective-Field Kernel — Symmetric 3×3 Eigensolver
// ─────────────────────────────────────────────────────────────────────
//! Cyclic Jacobi eigendecomposition for symmetric 3×3 tensors.
//!
//! Row-major `[f64; 9]` storage. Converges in a handful of sweeps;
//! used once per voxel by the structure-tensor estimator.

/// Eigenvalues (descending) and eigenvectors of a symmetric 3×3 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymEigen3 {
    pub values: [f64; 3],
    /// Row-major 3×3; column `p` is the eigenvector of `values[p]`.
    pub vectors: [f64; 9],
}

impl SymEigen3 {
    /// Eigenvector `p` as a 3-vector.
    #[inline]
    pub fn vector(&self, p: usize) -> [f64; 3] {
        [self.vectors[p], self.vectors[3 + p], self.vectors[6 + p]]
    }
}

/// Build a symmetric matrix from its six independent components
/// `[xx, yy, zz, xy, xz, yz]`.
#[inline]
pub fn from_components(c: [f64; 6]) -> [f64; 9] {
    [c[0], c[3], c[4], c[3], c[1], c[5], c[4], c[5], c[2]]
}

/// Eigendecomposition with eigenvalues sorted descending.
pub fn sym_eigen3(m: [f64; 9]) -> SymEigen3 {
    let mut a = m;
    let mut v = [0.0; 9];
    let mut values = [0.0; 3];
    jacobi(&mut a, &mut values, &mut v);
    sort_descending(&mut values, &mut v);
    SymEigen3 { values, vectors: v }
}

/// Sort eigenvalues descending, permuting eigenvector columns to match.
fn sort_descending(values: &mut [f64; 3], vectors: &mut [f64; 9]) {
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        values[b]
            .partial_cmp(&values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let old_vals = *values;
    let old_vecs = *vectors;
    for (new_col, &old_col) in order.iter().enumerate() {
        values[new_col] = old_vals[old_col];
        for row in 0..3 {
            vectors[row * 3 + new_col] = old_vecs[row * 3 + old_col];
        }
    }
}

/// Cyclic Jacobi with Rutishauser updates; `a` is destroyed.
fn jacobi(a: &mut [f64; 9], values: &mut [f64; 3], v: &mut [f64; 9]) {
    const N: usize = 3;
    const MAX_SWEEPS: usize = 50;

    for i in 0..N {
        for j in 0..N {
            v[i * N + j] = if i == j { 1.0 } else { 0.0 };
        }
    }

    // relative to the matrix scale so tiny tensors still converge
    let scale = a.iter().fold(0.0f64, |m, x| m.max(x.abs()));
    let tol = 1e-15 * scale;

    for sweep in 0..MAX_SWEEPS {
        let mut max_off = 0.0f64;
        for p in 0..N {
            for q in (p + 1)..N {
                max_off = max_off.max(a[p * N + q].abs());
            }
        }
        if max_off <= tol {
            break;
        }
        let threshold = if sweep < 4 {
            0.2 * max_off / (N * N) as f64
        } else {
            0.0
        };

        for p in 0..N {
            for q in (p + 1)..N {
                let apq = a[p * N + q];
                if apq == 0.0 || apq.abs() < threshold {
                    continue;
                }
                let diff = a[q * N + q] - a[p * N + p];
                let t = if diff.abs() < 1e-300 {
                    apq.signum()
                } else {
                    let tau = diff / (2.0 * apq);
                    if tau >= 0.0 {
                        1.0 / (tau + (1.0 + tau * tau).sqrt())
                    } else {
                        -1.0 / (-tau + (1.0 + tau * tau).sqrt())
                    }
                };
                let c = 1.0 / (1.0 + t * t).sqrt();
                let s = t * c;
                let tau_rot = s / (1.0 + c);

                a[p * N + p] -= t * apq;
                a[q * N + q] += t * apq;
                a[p * N + q] = 0.0;
                a[q * N + p] = 0.0;

                for r in 0..N {
                    if r == p || r == q {
                        continue;
                    }
                    let arp = a[r * N + p];
                    let arq = a[r * N + q];
                    a[r * N + p] = arp - s * (arq + tau_rot * arp);
                    a[p * N + r] = a[r * N + p];
                    a[r * N + q] = arq + s * (arp - tau_rot * arq);
                    a[q * N + r] = a[r * N + q];
                }
                for r in 0..N {
                    let vrp = v[r * N + p];
                    let vrq = v[r * N + q];
                    v[r * N + p] = vrp - s * (vrq + tau_rot * vrp);
                    v[r * N + q] = vrq + s * (vrp - tau_rot * vrq);
                }
            }
        }
    }

    for i in 0..N {
        values[i] = a[i * N + i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mat_vec(m: &[f64; 9], x: [f64; 3]) -> [f64; 3] {
        [
            m[0] * x[0] + m[1] * x[1] + m[2] * x[2],
            m[3] * x[0] + m[4] * x[1] + m[5] * x[2],
            m[6] * x[0] + m[7] * x[1] + m[8] * x[2],
        ]
    }

    #[test]
    fn test_diagonal_sorted_descending() {
        let e = sym_eigen3(from_components([1.0, 3.0, 2.0, 0.0, 0.0, 0.0]));
        assert_eq!(e.values, [3.0, 2.0, 1.0]);
        assert_eq!(e.vector(0), [0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_eigenpairs_satisfy_definition() {
        let m = from_components([4.0, 3.0, 2.0, 1.0, 0.5, 0.8]);
        let e = sym_eigen3(m);
        for p in 0..3 {
            let x = e.vector(p);
            let ax = mat_vec(&m, x);
            for i in 0..3 {
                assert!(
                    (ax[i] - e.values[p] * x[i]).abs() < 1e-10,
                    "A·v[{p}] component {i}: {} vs {}",
                    ax[i],
                    e.values[p] * x[i]
                );
            }
        }
        assert!(e.values[0] >= e.values[1] && e.values[1] >= e.values[2]);
    }

    #[test]
    fn test_eigenvectors_orthonormal() {
        let e = sym_eigen3(from_components([2.0, 2.0, 5.0, -1.0, 0.3, 0.0]));
        for i in 0..3 {
            for j in 0..3 {
                let a = e.vector(i);
                let b = e.vector(j);
                let dot = a[0] * b[0] + a[1] * b[1] + a[2] * b[2];
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-10, "V^T V[{i},{j}] = {dot}");
            }
        }
    }

    #[test]
    fn test_rank_one_outer_product() {
        let g = [0.0, 3.0, 4.0];
        let e = sym_eigen3(from_components([
            g[0] * g[0],
            g[1] * g[1],
            g[2] * g[2],
            g[0] * g[1],
            g[0] * g[2],
            g[1] * g[2],
        ]));
        assert!((e.values[0] - 25.0).abs() < 1e-12);
        assert!(e.values[1].abs() < 1e-12 && e.values[2].abs() < 1e-12);
        let top = e.vector(0);
        assert!((top[1].abs() - 0.6).abs() < 1e-12 && (top[2].abs() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_zero_matrix() {
        let e = sym_eigen3([0.0; 9]);
        assert_eq!(e.values, [0.0; 3]);
    }
}
