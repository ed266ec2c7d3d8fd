//! LP model data and validation.
//!
//! The canonical problem is
//!
//! ```text
//! minimize (or maximize)  c'x + offset
//! subject to              row_lower <=  A x  <= row_upper
//!                         col_lower <=   x   <= col_upper
//! ```
//!
//! with `A` stored column-wise in CSC format. Infinite bounds use the
//! sentinel [`INF`], a finite magic number rather than IEEE infinity, so
//! that bound arithmetic stays finite.

use sprs::{CsMat, TriMat};

use crate::error::{VertisError, VertisResult};

/// Infinite-bound sentinel. Any magnitude at or above this value is
/// treated as unbounded.
pub const INF: f64 = 1e30;

/// Returns true when `value` encodes an infinite bound.
#[inline]
pub fn is_infinite(value: f64) -> bool {
    value.abs() >= INF
}

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Objective sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObjSense {
    /// Minimize the objective.
    #[default]
    Minimize,
    /// Maximize the objective.
    Maximize,
}

impl ObjSense {
    /// Sign multiplier mapping this sense onto minimization: `+1` for
    /// minimize, `-1` for maximize.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            ObjSense::Minimize => 1.0,
            ObjSense::Maximize => -1.0,
        }
    }
}

/// A linear program.
#[derive(Debug, Clone)]
pub struct Lp {
    /// Number of structural columns (n).
    pub num_col: usize,
    /// Number of rows (m).
    pub num_row: usize,
    /// Objective sense.
    pub sense: ObjSense,
    /// Constant objective offset.
    pub offset: f64,
    /// Linear objective coefficients (length `num_col`).
    pub col_cost: Vec<f64>,
    /// Column lower bounds (length `num_col`).
    pub col_lower: Vec<f64>,
    /// Column upper bounds (length `num_col`).
    pub col_upper: Vec<f64>,
    /// Row lower bounds (length `num_row`).
    pub row_lower: Vec<f64>,
    /// Row upper bounds (length `num_row`).
    pub row_upper: Vec<f64>,
    /// Constraint matrix, `num_row` x `num_col`, CSC.
    pub a_matrix: SparseCsc,
    /// Optional model name, used only in log lines.
    pub model_name: String,
}

impl Default for Lp {
    fn default() -> Self {
        Lp {
            num_col: 0,
            num_row: 0,
            sense: ObjSense::Minimize,
            offset: 0.0,
            col_cost: Vec::new(),
            col_lower: Vec::new(),
            col_upper: Vec::new(),
            row_lower: Vec::new(),
            row_upper: Vec::new(),
            a_matrix: CsMat::empty(sprs::CSC, 0),
            model_name: String::new(),
        }
    }
}

impl Lp {
    /// Build an LP from raw column-wise arrays.
    ///
    /// `start` has length `num_col + 1` with `start[0] == 0` and
    /// `start[num_col] == index.len()`; `index` holds row indices in
    /// `[0, num_row)`; `value` holds the matching nonzeros.
    #[allow(clippy::too_many_arguments)]
    pub fn from_column_arrays(
        num_col: usize,
        num_row: usize,
        sense: ObjSense,
        offset: f64,
        col_cost: Vec<f64>,
        col_lower: Vec<f64>,
        col_upper: Vec<f64>,
        row_lower: Vec<f64>,
        row_upper: Vec<f64>,
        start: &[usize],
        index: &[usize],
        value: &[f64],
    ) -> VertisResult<Self> {
        let a_matrix = assemble_csc(num_row, num_col, start, index, value)?;
        let lp = Lp {
            num_col,
            num_row,
            sense,
            offset,
            col_cost,
            col_lower,
            col_upper,
            row_lower,
            row_upper,
            a_matrix,
            model_name: String::new(),
        };
        lp.validate()?;
        Ok(lp)
    }

    /// Number of matrix nonzeros.
    pub fn num_nz(&self) -> usize {
        self.a_matrix.nnz()
    }

    /// Whether the LP has neither columns nor rows.
    pub fn is_empty(&self) -> bool {
        self.num_col == 0 && self.num_row == 0
    }

    /// Well-formedness check per the data-model contract: consistent
    /// dimensions, `lower <= upper` everywhere, finite nonzero matrix
    /// entries, indices in range, no duplicate entries within a column.
    pub fn validate(&self) -> VertisResult<()> {
        let n = self.num_col;
        let m = self.num_row;
        if self.col_cost.len() != n {
            return Err(VertisError::Model(format!(
                "col_cost has length {}, expected {}",
                self.col_cost.len(),
                n
            )));
        }
        if self.col_lower.len() != n || self.col_upper.len() != n {
            return Err(VertisError::Model(format!(
                "column bounds have lengths {}/{}, expected {}",
                self.col_lower.len(),
                self.col_upper.len(),
                n
            )));
        }
        if self.row_lower.len() != m || self.row_upper.len() != m {
            return Err(VertisError::Model(format!(
                "row bounds have lengths {}/{}, expected {}",
                self.row_lower.len(),
                self.row_upper.len(),
                m
            )));
        }
        if self.a_matrix.rows() != m || self.a_matrix.cols() != n {
            return Err(VertisError::Model(format!(
                "matrix has shape {}x{}, expected {}x{}",
                self.a_matrix.rows(),
                self.a_matrix.cols(),
                m,
                n
            )));
        }
        if !self.offset.is_finite() {
            return Err(VertisError::Model("objective offset is not finite".to_string()));
        }
        for (j, &c) in self.col_cost.iter().enumerate() {
            if !c.is_finite() {
                return Err(VertisError::Model(format!("cost of column {j} is not finite")));
            }
        }
        check_bounds("column", &self.col_lower, &self.col_upper)?;
        check_bounds("row", &self.row_lower, &self.row_upper)?;

        let mut seen = vec![usize::MAX; m];
        for (j, col) in self.a_matrix.outer_iterator().enumerate() {
            for (i, &v) in col.iter() {
                if i >= m {
                    return Err(VertisError::Model(format!(
                        "column {j} has row index {i} outside [0, {m})"
                    )));
                }
                if seen[i] == j {
                    return Err(VertisError::Model(format!(
                        "column {j} has a duplicate entry in row {i}"
                    )));
                }
                seen[i] = j;
                if !v.is_finite() || v == 0.0 {
                    return Err(VertisError::Model(format!(
                        "entry ({i}, {j}) has illegal value {v}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Row activities `A x` for the given column values.
    pub fn row_activity(&self, col_value: &[f64]) -> Vec<f64> {
        debug_assert_eq!(col_value.len(), self.num_col);
        let mut activity = vec![0.0; self.num_row];
        for (j, col) in self.a_matrix.outer_iterator().enumerate() {
            let xj = col_value[j];
            if xj == 0.0 {
                continue;
            }
            for (i, &v) in col.iter() {
                activity[i] += v * xj;
            }
        }
        activity
    }

    /// Objective value `c'x + offset` in the model's own sense.
    pub fn objective_value(&self, col_value: &[f64]) -> f64 {
        let dot: f64 = self
            .col_cost
            .iter()
            .zip(col_value.iter())
            .map(|(c, x)| c * x)
            .sum();
        dot + self.offset
    }
}

fn check_bounds(what: &str, lower: &[f64], upper: &[f64]) -> VertisResult<()> {
    for (k, (&l, &u)) in lower.iter().zip(upper.iter()).enumerate() {
        if l.is_nan() || u.is_nan() {
            return Err(VertisError::Model(format!("{what} {k} has NaN bound")));
        }
        if l > u {
            return Err(VertisError::Model(format!(
                "{what} {k} has lower bound {l} above upper bound {u}"
            )));
        }
    }
    Ok(())
}

/// Assemble a CSC matrix from raw column-wise arrays, checking the start
/// array for monotone consistency.
pub fn assemble_csc(
    num_row: usize,
    num_col: usize,
    start: &[usize],
    index: &[usize],
    value: &[f64],
) -> VertisResult<SparseCsc> {
    if start.len() != num_col + 1 {
        return Err(VertisError::Model(format!(
            "start has length {}, expected {}",
            start.len(),
            num_col + 1
        )));
    }
    if !start.is_empty() && start[0] != 0 {
        return Err(VertisError::Model("start[0] must be 0".to_string()));
    }
    let nnz = index.len();
    if value.len() != nnz {
        return Err(VertisError::Model(format!(
            "index and value have mismatched lengths {} and {}",
            nnz,
            value.len()
        )));
    }
    if start[num_col] != nnz {
        return Err(VertisError::Model(format!(
            "start[{}] is {}, expected nnz {}",
            num_col, start[num_col], nnz
        )));
    }
    let mut tri = TriMat::new((num_row, num_col));
    let mut seen = vec![usize::MAX; num_row];
    for j in 0..num_col {
        if start[j] > start[j + 1] {
            return Err(VertisError::Model(format!("start is not monotone at column {j}")));
        }
        for k in start[j]..start[j + 1] {
            if index[k] >= num_row {
                return Err(VertisError::Model(format!(
                    "row index {} in column {j} outside [0, {num_row})",
                    index[k]
                )));
            }
            if seen[index[k]] == j {
                return Err(VertisError::Model(format!(
                    "column {j} has a duplicate entry in row {}",
                    index[k]
                )));
            }
            seen[index[k]] = j;
            tri.add_triplet(index[k], j, value[k]);
        }
    }
    Ok(tri.to_csc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_lp() -> Lp {
        Lp::from_column_arrays(
            2,
            2,
            ObjSense::Minimize,
            0.0,
            vec![-8.0, -10.0],
            vec![0.0, 0.0],
            vec![INF, INF],
            vec![-INF, -INF],
            vec![80.0, 120.0],
            &[0, 2, 4],
            &[0, 1, 0, 1],
            &[1.0, 1.0, 2.0, 4.0],
        )
        .unwrap()
    }

    #[test]
    fn test_assembly_and_activity() {
        let lp = small_lp();
        assert_eq!(lp.num_nz(), 4);
        let act = lp.row_activity(&[1.0, 1.0]);
        assert_eq!(act, vec![2.0, 6.0]);
        assert_eq!(lp.objective_value(&[1.0, 1.0]), -18.0);
    }

    #[test]
    fn test_rejects_crossed_bounds() {
        let mut lp = small_lp();
        lp.col_lower[0] = 2.0;
        lp.col_upper[0] = 1.0;
        assert!(lp.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_start() {
        let err = Lp::from_column_arrays(
            2,
            2,
            ObjSense::Minimize,
            0.0,
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            &[0, 2, 3],
            &[0, 1, 0, 1],
            &[1.0, 1.0, 2.0, 4.0],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_zero_entry() {
        let err = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![1.0],
            vec![0.0],
            vec![1.0],
            vec![0.0],
            vec![1.0],
            &[0, 1],
            &[0],
            &[0.0],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_infinite_sentinel() {
        assert!(is_infinite(INF));
        assert!(is_infinite(-INF));
        assert!(is_infinite(2e30));
        assert!(!is_infinite(1e29));
    }
}
