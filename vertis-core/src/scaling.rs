//! Equilibration scaling for the simplex engine.
//!
//! Iteratively scales the rows and columns of the constraint matrix so
//! that entry magnitudes are balanced, which keeps pivot selection and
//! the basis factorization well conditioned. Scaling is applied to a
//! working copy only; every reported quantity is unscaled back to the
//! original space.
//!
//! With scaled matrix `A' = R A C` the transformed quantities are
//! `x' = x / C`, `cost' = C . c`, row bounds scaled by `R`, column
//! bounds by `1 / C`, and duals map back via `y = R . y'`,
//! `d = d' / C`.

use crate::model::SparseCsc;

/// Accumulated row and column scaling factors.
#[derive(Debug, Clone)]
pub struct ScaleFactors {
    /// Row factors (length m).
    pub row: Vec<f64>,
    /// Column factors (length n).
    pub col: Vec<f64>,
    /// True when no scaling is applied.
    pub is_identity: bool,
}

impl ScaleFactors {
    /// Identity scaling.
    pub fn identity(num_row: usize, num_col: usize) -> Self {
        Self {
            row: vec![1.0; num_row],
            col: vec![1.0; num_col],
            is_identity: true,
        }
    }
}

/// Compute equilibration factors for the given matrix.
///
/// Strategy 0 returns identity. Strategies 1..=4 run increasingly many
/// sweeps; each sweep divides rows and columns by the square root of
/// their largest scaled magnitude. Final factors are snapped to powers
/// of two so that scaling and unscaling are exact in floating point.
pub fn scale_factors(a: &SparseCsc, strategy: i64) -> ScaleFactors {
    let m = a.rows();
    let n = a.cols();
    if strategy <= 0 || a.nnz() == 0 {
        return ScaleFactors::identity(m, n);
    }
    let sweeps = 4 + 2 * strategy as usize;

    let mut row = vec![1.0_f64; m];
    let mut col = vec![1.0_f64; n];

    for _ in 0..sweeps {
        let mut row_max = vec![0.0_f64; m];
        let mut col_max = vec![0.0_f64; n];
        for (j, column) in a.outer_iterator().enumerate() {
            for (i, &v) in column.iter() {
                let scaled = (v * row[i] * col[j]).abs();
                if scaled > row_max[i] {
                    row_max[i] = scaled;
                }
                if scaled > col_max[j] {
                    col_max[j] = scaled;
                }
            }
        }
        let mut moved = false;
        for i in 0..m {
            if row_max[i] > 0.0 {
                let f = 1.0 / row_max[i].sqrt();
                if (f - 1.0).abs() > 1e-3 {
                    moved = true;
                }
                row[i] *= f;
            }
        }
        for j in 0..n {
            if col_max[j] > 0.0 {
                let f = 1.0 / col_max[j].sqrt();
                if (f - 1.0).abs() > 1e-3 {
                    moved = true;
                }
                col[j] *= f;
            }
        }
        if !moved {
            break;
        }
    }

    for f in row.iter_mut().chain(col.iter_mut()) {
        *f = snap_power_of_two(*f);
    }

    let is_identity =
        row.iter().all(|&f| f == 1.0) && col.iter().all(|&f| f == 1.0);
    ScaleFactors { row, col, is_identity }
}

/// Snap a positive factor to the nearest power of two, so that
/// multiplying and dividing by it round-trips exactly.
fn snap_power_of_two(f: f64) -> f64 {
    debug_assert!(f > 0.0);
    let e = f.log2().round() as i32;
    (2.0_f64).powi(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprs::TriMat;

    fn matrix(entries: &[(usize, usize, f64)], m: usize, n: usize) -> SparseCsc {
        let mut tri = TriMat::new((m, n));
        for &(i, j, v) in entries {
            tri.add_triplet(i, j, v);
        }
        tri.to_csc()
    }

    #[test]
    fn test_strategy_zero_is_identity() {
        let a = matrix(&[(0, 0, 1000.0), (1, 1, 0.001)], 2, 2);
        let s = scale_factors(&a, 0);
        assert!(s.is_identity);
    }

    #[test]
    fn test_factors_are_powers_of_two() {
        let a = matrix(&[(0, 0, 1000.0), (0, 1, 0.5), (1, 1, 0.003)], 2, 2);
        let s = scale_factors(&a, 2);
        for &f in s.row.iter().chain(s.col.iter()) {
            assert!(f > 0.0);
            let e = f.log2();
            assert_eq!(e, e.round(), "factor {f} is not a power of two");
        }
    }

    #[test]
    fn test_equilibration_reduces_spread() {
        let a = matrix(&[(0, 0, 4096.0), (1, 0, 1.0), (1, 1, 1.0 / 4096.0)], 2, 2);
        let s = scale_factors(&a, 4);
        let mut max_abs = 0.0_f64;
        let mut min_abs = f64::INFINITY;
        for (j, column) in a.outer_iterator().enumerate() {
            for (i, &v) in column.iter() {
                let scaled = (v * s.row[i] * s.col[j]).abs();
                max_abs = max_abs.max(scaled);
                min_abs = min_abs.min(scaled);
            }
        }
        assert!(max_abs / min_abs < 4096.0);
    }

    #[test]
    fn test_well_scaled_matrix_untouched() {
        let a = matrix(&[(0, 0, 1.0), (1, 1, 1.0)], 2, 2);
        let s = scale_factors(&a, 1);
        assert!(s.is_identity);
    }
}
