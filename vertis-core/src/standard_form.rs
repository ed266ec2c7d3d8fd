//! Standard-form conversion.
//!
//! Rewrites an LP as `min c'y + offset'` subject to `A'y = b'`, `y >= 0`
//! in minimize space: maximization is exported negated, so solving the
//! export yields the original optimal value up to the sense sign.
//!
//! The rewriting is the usual one: finite lower bounds shift variables,
//! upper-only variables are negated, free variables split into a
//! difference of nonnegatives, inequality rows gain slacks, and finite
//! variable or range-slack upper bounds become extra equality rows with
//! their own slack. The column/row origin tables retain enough
//! information to map a standard-form solution back onto the source LP,
//! which is how the interior-point engine consumes this module.

use sprs::TriMat;

use crate::model::{is_infinite, Lp, SparseCsc};

/// Where a standard-form column came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColOrigin {
    /// `x[col] = lower + y`.
    Shifted { col: usize },
    /// `x[col] = upper - y`.
    Negated { col: usize },
    /// Positive part of a free variable split.
    FreePos { col: usize },
    /// Negative part of a free variable split.
    FreeNeg { col: usize },
    /// Slack of an original inequality row; `sign` is its coefficient.
    RowSlack { row: usize, sign: f64 },
    /// Slack of a variable upper-bound row.
    BoundSlack { col: usize },
    /// Slack bounding the range slack of an original row.
    RangeSlack { row: usize },
}

/// Where a standard-form row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrigin {
    /// Original row brought to equality.
    Model { row: usize },
    /// Upper-bound row `y + t = upper - lower` of a shifted column.
    ColUpper { col: usize },
    /// Upper-bound row of a range row's slack.
    RowRange { row: usize },
}

/// A standard-form LP with its mapping back to the source model.
#[derive(Debug, Clone)]
pub struct StandardFormLp {
    /// Standard-form column count.
    pub num_col: usize,
    /// Standard-form row count.
    pub num_row: usize,
    /// Objective offset (minimize space).
    pub offset: f64,
    /// Costs (minimize space).
    pub cost: Vec<f64>,
    /// Equality right-hand sides.
    pub rhs: Vec<f64>,
    /// Constraint matrix, CSC.
    pub matrix: SparseCsc,
    /// Origin of every standard-form column.
    pub col_origin: Vec<ColOrigin>,
    /// Origin of every standard-form row.
    pub row_origin: Vec<RowOrigin>,
    /// Columns of the source LP fixed by equal bounds, with their value.
    pub fixed_cols: Vec<(usize, f64)>,
    /// Source rows dropped because both bounds are infinite.
    pub dropped_rows: Vec<usize>,
}

impl StandardFormLp {
    /// Nonzeros of the standard-form matrix.
    pub fn num_nz(&self) -> usize {
        self.matrix.nnz()
    }

    /// Recover source-model column values from a standard-form point.
    pub fn recover_col_values(&self, lp: &Lp, y: &[f64]) -> Vec<f64> {
        let mut x = vec![0.0; lp.num_col];
        for (k, origin) in self.col_origin.iter().enumerate() {
            match *origin {
                ColOrigin::Shifted { col } => x[col] = lp.col_lower[col] + y[k],
                ColOrigin::Negated { col } => x[col] = lp.col_upper[col] - y[k],
                ColOrigin::FreePos { col } => x[col] += y[k],
                ColOrigin::FreeNeg { col } => x[col] -= y[k],
                _ => {}
            }
        }
        for &(col, value) in &self.fixed_cols {
            x[col] = value;
        }
        x
    }

    /// Recover source-model row duals (minimize space) from the
    /// standard-form row duals.
    pub fn recover_row_duals(&self, lp: &Lp, lambda: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; lp.num_row];
        for (k, origin) in self.row_origin.iter().enumerate() {
            if let RowOrigin::Model { row } = *origin {
                y[row] = lambda[k];
            }
        }
        y
    }
}

/// Build the standard form of an LP.
pub fn build(lp: &Lp) -> StandardFormLp {
    let sign = lp.sense.sign();
    let n = lp.num_col;
    let m = lp.num_row;

    let mut cost: Vec<f64> = Vec::new();
    let mut col_origin: Vec<ColOrigin> = Vec::new();
    let mut fixed_cols: Vec<(usize, f64)> = Vec::new();
    let mut offset = sign * lp.offset;

    // Shift absorbed into each source row's right-hand side.
    let mut row_shift = vec![0.0; m];
    // Standard-form columns of each source column (with coefficient
    // sign), so the matrix can be assembled in one sweep.
    let mut col_images: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    // Upper-bound rows required by boxed columns.
    let mut bound_rows: Vec<(usize, f64)> = Vec::new(); // (source col, range)

    for j in 0..n {
        let l = lp.col_lower[j];
        let u = lp.col_upper[j];
        let c = sign * lp.col_cost[j];
        if l == u {
            fixed_cols.push((j, l));
            offset += c * l;
            for (i, v) in column_entries(lp, j) {
                row_shift[i] += v * l;
            }
            continue;
        }
        if !is_infinite(l) {
            let k = cost.len();
            cost.push(c);
            col_origin.push(ColOrigin::Shifted { col: j });
            col_images[j].push((k, 1.0));
            offset += c * l;
            for (i, v) in column_entries(lp, j) {
                row_shift[i] += v * l;
            }
            if !is_infinite(u) {
                bound_rows.push((j, u - l));
            }
        } else if !is_infinite(u) {
            let k = cost.len();
            cost.push(-c);
            col_origin.push(ColOrigin::Negated { col: j });
            col_images[j].push((k, -1.0));
            offset += c * u;
            for (i, v) in column_entries(lp, j) {
                row_shift[i] += v * u;
            }
        } else {
            let kp = cost.len();
            cost.push(c);
            col_origin.push(ColOrigin::FreePos { col: j });
            col_images[j].push((kp, 1.0));
            let kn = cost.len();
            cost.push(-c);
            col_origin.push(ColOrigin::FreeNeg { col: j });
            col_images[j].push((kn, -1.0));
        }
    }

    // Rows: bring each kept source row to equality.
    let mut rhs: Vec<f64> = Vec::new();
    let mut row_origin: Vec<RowOrigin> = Vec::new();
    let mut dropped_rows: Vec<usize> = Vec::new();
    let mut row_index = vec![usize::MAX; m];
    // Range rows whose slack needs an upper-bound row: (source row,
    // slack std col, range).
    let mut range_rows: Vec<(usize, usize, f64)> = Vec::new();
    // Slack columns to add: (std row, std col, coefficient).
    let mut slack_entries: Vec<(usize, usize, f64)> = Vec::new();

    for i in 0..m {
        let rl = lp.row_lower[i];
        let ru = lp.row_upper[i];
        if is_infinite(rl) && is_infinite(ru) {
            dropped_rows.push(i);
            continue;
        }
        let k = rhs.len();
        row_index[i] = k;
        row_origin.push(RowOrigin::Model { row: i });
        if rl == ru {
            rhs.push(rl - row_shift[i]);
        } else if !is_infinite(rl) {
            // A x - s = rl, s >= 0; a finite upper bound turns into a
            // range row below.
            let sc = cost.len();
            cost.push(0.0);
            col_origin.push(ColOrigin::RowSlack { row: i, sign: -1.0 });
            slack_entries.push((k, sc, -1.0));
            rhs.push(rl - row_shift[i]);
            if !is_infinite(ru) {
                range_rows.push((i, sc, ru - rl));
            }
        } else {
            // A x + s = ru, s >= 0.
            let sc = cost.len();
            cost.push(0.0);
            col_origin.push(ColOrigin::RowSlack { row: i, sign: 1.0 });
            slack_entries.push((k, sc, 1.0));
            rhs.push(ru - row_shift[i]);
        }
    }

    // Upper-bound rows for boxed columns: y + t = range.
    for &(j, range) in &bound_rows {
        let k = rhs.len();
        row_origin.push(RowOrigin::ColUpper { col: j });
        rhs.push(range);
        let tc = cost.len();
        cost.push(0.0);
        col_origin.push(ColOrigin::BoundSlack { col: j });
        slack_entries.push((k, tc, 1.0));
        // The shifted column's entry in its bound row.
        let shifted = col_images[j][0].0;
        slack_entries.push((k, shifted, 1.0));
    }

    // Upper-bound rows for range-row slacks: s + t = range.
    for &(i, sc, range) in &range_rows {
        let k = rhs.len();
        row_origin.push(RowOrigin::RowRange { row: i });
        rhs.push(range);
        let tc = cost.len();
        cost.push(0.0);
        col_origin.push(ColOrigin::RangeSlack { row: i });
        slack_entries.push((k, sc, 1.0));
        slack_entries.push((k, tc, 1.0));
    }

    let num_col = cost.len();
    let num_row = rhs.len();
    let mut tri = TriMat::new((num_row, num_col));
    for j in 0..n {
        if col_images[j].is_empty() {
            continue;
        }
        for (i, v) in column_entries(lp, j) {
            let Some(&k) = row_index.get(i) else { continue };
            if k == usize::MAX {
                continue;
            }
            for &(std_col, coeff) in &col_images[j] {
                tri.add_triplet(k, std_col, v * coeff);
            }
        }
    }
    for &(row, col, v) in &slack_entries {
        tri.add_triplet(row, col, v);
    }

    StandardFormLp {
        num_col,
        num_row,
        offset,
        cost,
        rhs,
        matrix: tri.to_csc(),
        col_origin,
        row_origin,
        fixed_cols,
        dropped_rows,
    }
}

fn column_entries(lp: &Lp, j: usize) -> Vec<(usize, f64)> {
    match lp.a_matrix.outer_view(j) {
        Some(col) => col.iter().map(|(i, &v)| (i, v)).collect(),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lp, ObjSense, INF};

    #[test]
    fn test_simple_inequalities_gain_slacks() {
        // min -x1 - x2, x >= 0, rows <= (80, 120).
        let lp = Lp::from_column_arrays(
            2,
            2,
            ObjSense::Minimize,
            0.0,
            vec![-1.0, -1.0],
            vec![0.0, 0.0],
            vec![INF, INF],
            vec![-INF, -INF],
            vec![80.0, 120.0],
            &[0, 2, 4],
            &[0, 1, 0, 1],
            &[1.0, 1.0, 2.0, 4.0],
        )
        .unwrap();
        let sf = build(&lp);
        // Two shifted columns plus two row slacks.
        assert_eq!(sf.num_col, 4);
        assert_eq!(sf.num_row, 2);
        assert_eq!(sf.rhs, vec![80.0, 120.0]);
        assert_eq!(sf.cost[0], -1.0);
        assert_eq!(sf.cost[2], 0.0);
        assert!(sf.fixed_cols.is_empty());
    }

    #[test]
    fn test_boxed_column_adds_bound_row() {
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![2.0],
            vec![1.0],
            vec![4.0],
            vec![5.0],
            vec![5.0],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        let sf = build(&lp);
        // Shifted column + bound slack; equality row + bound row.
        assert_eq!(sf.num_col, 2);
        assert_eq!(sf.num_row, 2);
        // Equality rhs shifted by the lower bound: 5 - 1 = 4.
        assert_eq!(sf.rhs[0], 4.0);
        // Bound row rhs is the range 4 - 1 = 3.
        assert_eq!(sf.rhs[1], 3.0);
        // Offset picks up c * l = 2.
        assert_eq!(sf.offset, 2.0);
    }

    #[test]
    fn test_free_variable_splits() {
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![1.0],
            vec![-INF],
            vec![INF],
            vec![3.0],
            vec![3.0],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        let sf = build(&lp);
        assert_eq!(sf.num_col, 2);
        assert_eq!(sf.cost, vec![1.0, -1.0]);
        let x = sf.recover_col_values(&lp, &[5.0, 2.0]);
        assert_eq!(x[0], 3.0);
    }

    #[test]
    fn test_maximization_is_negated() {
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Maximize,
            10.0,
            vec![8.0],
            vec![0.0],
            vec![INF],
            vec![-INF],
            vec![80.0],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        let sf = build(&lp);
        assert_eq!(sf.cost[0], -8.0);
        assert_eq!(sf.offset, -10.0);
    }

    #[test]
    fn test_range_row_slack_bounded() {
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![1.0],
            vec![0.0],
            vec![INF],
            vec![2.0],
            vec![6.0],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        let sf = build(&lp);
        // Column, row slack, range slack; model row + range row.
        assert_eq!(sf.num_col, 3);
        assert_eq!(sf.num_row, 2);
        assert_eq!(sf.rhs, vec![2.0, 4.0]);
    }
}
