//! Dense LU solver.

use thiserror::Error;

use super::mna::MnaSystem;
use super::PIVOT_TOLERANCE;

/// The assembled matrix has no usable pivot in some column.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("no usable pivot in column {column} (largest candidate {magnitude:.2e})")]
pub struct SingularSystem {
    /// Column where elimination failed
    pub column: usize,
    /// Largest pivot candidate found in that column
    pub magnitude: f64,
}

/// Solve `A x = z` by LU decomposition with partial pivoting.
///
/// Works on private copies; the system itself is left untouched. Rows are
/// only swapped, so column k keeps its meaning through elimination. A pivot
/// at most [`PIVOT_TOLERANCE`] times the largest entry of the same column of
/// A is treated as singular, which keeps circuits mixing very large and very
/// small conductances solvable.
pub fn solve(system: &MnaSystem) -> std::result::Result<Vec<f64>, SingularSystem> {
    let n = system.size;
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut lu = system.a.clone();
    let mut x = system.z.clone();

    let column_scale: Vec<f64> = (0..n)
        .map(|k| (0..n).fold(0.0f64, |m, i| m.max(lu[i * n + k].abs())))
        .collect();

    for k in 0..n {
        // Find pivot
        let mut max_val = lu[k * n + k].abs();
        let mut max_row = k;

        for i in (k + 1)..n {
            let val = lu[i * n + k].abs();
            if val > max_val {
                max_val = val;
                max_row = i;
            }
        }

        if max_val == 0.0 || max_val <= column_scale[k] * PIVOT_TOLERANCE {
            return Err(SingularSystem {
                column: k,
                magnitude: max_val,
            });
        }

        // Swap rows (matrix and right-hand side together)
        if max_row != k {
            for j in 0..n {
                lu.swap(k * n + j, max_row * n + j);
            }
            x.swap(k, max_row);
        }

        // Eliminate
        let pivot = lu[k * n + k];
        for i in (k + 1)..n {
            let factor = lu[i * n + k] / pivot;
            if factor == 0.0 {
                continue;
            }
            lu[i * n + k] = factor;
            for j in (k + 1)..n {
                lu[i * n + j] -= factor * lu[k * n + j];
            }
            x[i] -= factor * x[k];
        }
    }

    // Back substitution (U * x = y)
    for i in (0..n).rev() {
        for j in (i + 1)..n {
            x[i] -= lu[i * n + j] * x[j];
        }
        x[i] /= lu[i * n + i];
    }

    Ok(x)
}
