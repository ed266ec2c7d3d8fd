//! Presolve reductions and their postsolve inverses.
//!
//! The reductions implemented are the contract-level set: empty rows
//! (with a trivial consistency check), fixed-column substitution,
//! empty-column fixation at an optimal bound, and singleton-row bound
//! tightening. Each reduction pushes a record; postsolve pops them in
//! reverse to restore full-space values, duals and basis statuses so
//! that the complementarity equalities hold in the original space.

use sprs::TriMat;

use crate::model::{is_infinite, Lp};
use crate::solution::{Basis, BasisStatus, Solution};

const FEAS_TOL: f64 = 1e-9;

/// One applied reduction.
#[derive(Debug, Clone)]
pub enum Reduction {
    /// Row with no remaining entries.
    EmptyRow { row: usize },
    /// Row with one remaining entry, turned into column bounds.
    SingletonRow {
        row: usize,
        col: usize,
        coef: f64,
        /// The column's lower bound now comes from this row.
        lower_from_row: bool,
        /// The column's upper bound now comes from this row.
        upper_from_row: bool,
    },
    /// Column with equal bounds, substituted out.
    FixedCol { col: usize, value: f64 },
    /// Column with no entries, fixed at its optimal bound.
    EmptyCol {
        col: usize,
        status: BasisStatus,
        value: f64,
    },
}

/// Presolve output.
#[derive(Debug)]
pub enum PresolveOutcome {
    /// A (possibly trivially empty) reduced LP.
    Reduced(Box<ReducedLp>),
    /// Trivially primal infeasible.
    Infeasible,
    /// An empty column rides an unbounded improving direction.
    UnboundedOrInfeasible,
}

/// A reduced LP with the bookkeeping needed to undo the reduction.
#[derive(Debug, Clone)]
pub struct ReducedLp {
    /// The reduced model.
    pub lp: Lp,
    /// Original column to reduced column (`usize::MAX` if removed).
    pub col_map: Vec<usize>,
    /// Original row to reduced row (`usize::MAX` if removed).
    pub row_map: Vec<usize>,
    /// Applied reductions, in application order.
    pub stack: Vec<Reduction>,
}

impl ReducedLp {
    /// Whether presolve removed anything.
    pub fn reduced_anything(&self) -> bool {
        !self.stack.is_empty()
    }
}

/// Run the presolve loop to a fixpoint.
pub fn presolve(lp: &Lp) -> PresolveOutcome {
    let n = lp.num_col;
    let m = lp.num_row;
    let sign = lp.sense.sign();

    let mut col_alive = vec![true; n];
    let mut row_alive = vec![true; m];
    let mut col_lower = lp.col_lower.clone();
    let mut col_upper = lp.col_upper.clone();
    let mut row_lower = lp.row_lower.clone();
    let mut row_upper = lp.row_upper.clone();
    let mut stack: Vec<Reduction> = Vec::new();

    // Row-wise view of the matrix for entry counting.
    let mut rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); m];
    for (j, col) in lp.a_matrix.outer_iterator().enumerate() {
        for (i, &v) in col.iter() {
            rows[i].push((j, v));
        }
    }
    let cols: Vec<Vec<(usize, f64)>> = (0..n)
        .map(|j| match lp.a_matrix.outer_view(j) {
            Some(col) => col.iter().map(|(i, &v)| (i, v)).collect(),
            None => Vec::new(),
        })
        .collect();

    let mut changed = true;
    let mut passes = 0;
    while changed && passes < 10 {
        changed = false;
        passes += 1;

        // Fixed columns: substitute into the row bounds.
        for j in 0..n {
            if !col_alive[j] || col_lower[j] != col_upper[j] {
                continue;
            }
            let value = col_lower[j];
            for &(i, v) in &cols[j] {
                if !row_alive[i] {
                    continue;
                }
                if !is_infinite(row_lower[i]) {
                    row_lower[i] -= v * value;
                }
                if !is_infinite(row_upper[i]) {
                    row_upper[i] -= v * value;
                }
            }
            col_alive[j] = false;
            stack.push(Reduction::FixedCol { col: j, value });
            changed = true;
        }

        // Empty and singleton rows.
        for i in 0..m {
            if !row_alive[i] {
                continue;
            }
            let live: Vec<(usize, f64)> = rows[i]
                .iter()
                .copied()
                .filter(|&(j, _)| col_alive[j])
                .collect();
            match live.len() {
                0 => {
                    if row_lower[i] > FEAS_TOL || row_upper[i] < -FEAS_TOL {
                        return PresolveOutcome::Infeasible;
                    }
                    row_alive[i] = false;
                    stack.push(Reduction::EmptyRow { row: i });
                    changed = true;
                }
                1 => {
                    let (j, coef) = live[0];
                    let (implied_l, implied_u) = if coef > 0.0 {
                        (
                            bound_div(row_lower[i], coef),
                            bound_div(row_upper[i], coef),
                        )
                    } else {
                        (
                            bound_div(row_upper[i], coef),
                            bound_div(row_lower[i], coef),
                        )
                    };
                    let mut lower_from_row = false;
                    let mut upper_from_row = false;
                    if implied_l > col_lower[j] {
                        col_lower[j] = implied_l;
                        lower_from_row = true;
                    }
                    if implied_u < col_upper[j] {
                        col_upper[j] = implied_u;
                        upper_from_row = true;
                    }
                    if col_lower[j] > col_upper[j] + FEAS_TOL {
                        return PresolveOutcome::Infeasible;
                    }
                    if col_lower[j] > col_upper[j] {
                        // Within tolerance; collapse to a point.
                        col_upper[j] = col_lower[j];
                    }
                    row_alive[i] = false;
                    stack.push(Reduction::SingletonRow {
                        row: i,
                        col: j,
                        coef,
                        lower_from_row,
                        upper_from_row,
                    });
                    changed = true;
                }
                _ => {}
            }
        }

        // Empty columns: fix at the bound the objective prefers.
        for j in 0..n {
            if !col_alive[j] {
                continue;
            }
            if cols[j].iter().any(|&(i, _)| row_alive[i]) {
                continue;
            }
            let c = sign * lp.col_cost[j];
            let (status, value) = if c > 0.0 {
                if is_infinite(col_lower[j]) {
                    return PresolveOutcome::UnboundedOrInfeasible;
                }
                (BasisStatus::Lower, col_lower[j])
            } else if c < 0.0 {
                if is_infinite(col_upper[j]) {
                    return PresolveOutcome::UnboundedOrInfeasible;
                }
                (BasisStatus::Upper, col_upper[j])
            } else if !is_infinite(col_lower[j]) {
                (BasisStatus::Lower, col_lower[j])
            } else if !is_infinite(col_upper[j]) {
                (BasisStatus::Upper, col_upper[j])
            } else {
                (BasisStatus::Free, 0.0)
            };
            let status = if col_lower[j] == col_upper[j] {
                BasisStatus::Fixed
            } else {
                status
            };
            col_alive[j] = false;
            stack.push(Reduction::EmptyCol { col: j, status, value });
            changed = true;
        }
    }

    // Compact the surviving rows and columns.
    let mut col_map = vec![usize::MAX; n];
    let mut row_map = vec![usize::MAX; m];
    let mut next = 0;
    for j in 0..n {
        if col_alive[j] {
            col_map[j] = next;
            next += 1;
        }
    }
    let red_n = next;
    next = 0;
    for i in 0..m {
        if row_alive[i] {
            row_map[i] = next;
            next += 1;
        }
    }
    let red_m = next;

    let mut offset = lp.offset;
    for r in &stack {
        match *r {
            Reduction::FixedCol { col, value } | Reduction::EmptyCol { col, value, .. } => {
                offset += lp.col_cost[col] * value;
            }
            _ => {}
        }
    }

    let mut tri = TriMat::new((red_m, red_n));
    for j in 0..n {
        if !col_alive[j] {
            continue;
        }
        for &(i, v) in &cols[j] {
            if row_alive[i] {
                tri.add_triplet(row_map[i], col_map[j], v);
            }
        }
    }

    let reduced = Lp {
        num_col: red_n,
        num_row: red_m,
        sense: lp.sense,
        offset,
        col_cost: (0..n)
            .filter(|&j| col_alive[j])
            .map(|j| lp.col_cost[j])
            .collect(),
        col_lower: (0..n).filter(|&j| col_alive[j]).map(|j| col_lower[j]).collect(),
        col_upper: (0..n).filter(|&j| col_alive[j]).map(|j| col_upper[j]).collect(),
        row_lower: (0..m).filter(|&i| row_alive[i]).map(|i| row_lower[i]).collect(),
        row_upper: (0..m).filter(|&i| row_alive[i]).map(|i| row_upper[i]).collect(),
        a_matrix: tri.to_csc(),
        model_name: lp.model_name.clone(),
    };
    log::debug!(
        "presolve: {} -> {} rows, {} -> {} cols, {} reductions",
        m,
        red_m,
        n,
        red_n,
        stack.len()
    );
    PresolveOutcome::Reduced(Box::new(ReducedLp {
        lp: reduced,
        col_map,
        row_map,
        stack,
    }))
}

fn bound_div(bound: f64, coef: f64) -> f64 {
    if is_infinite(bound) {
        if (bound > 0.0) == (coef > 0.0) {
            crate::model::INF
        } else {
            -crate::model::INF
        }
    } else {
        bound / coef
    }
}

/// Restore a reduced-space basis and solution to the original space.
pub fn postsolve(
    lp: &Lp,
    red: &ReducedLp,
    red_basis: &Basis,
    red_solution: &Solution,
) -> (Basis, Solution) {
    let n = lp.num_col;
    let m = lp.num_row;
    let mut col_status = vec![BasisStatus::Lower; n];
    let mut row_status = vec![BasisStatus::Basic; m];
    let mut col_value = vec![0.0; n];
    let mut row_value = vec![0.0; m];
    let mut col_dual = vec![0.0; n];
    let mut row_dual = vec![0.0; m];
    // Columns whose reduced cost must be recomputed at the end.
    let mut recompute_dual: Vec<usize> = Vec::new();

    for j in 0..n {
        let k = red.col_map[j];
        if k != usize::MAX {
            col_status[j] = red_basis.col_status[k];
            col_value[j] = red_solution.col_value[k];
            col_dual[j] = red_solution.col_dual[k];
        }
    }
    for i in 0..m {
        let k = red.row_map[i];
        if k != usize::MAX {
            row_status[i] = red_basis.row_status[k];
            row_value[i] = red_solution.row_value[k];
            row_dual[i] = red_solution.row_dual[k];
        }
    }

    for reduction in red.stack.iter().rev() {
        match *reduction {
            Reduction::EmptyRow { row } => {
                row_status[row] = BasisStatus::Basic;
                row_dual[row] = 0.0;
            }
            Reduction::FixedCol { col, value } => {
                col_status[col] = BasisStatus::Fixed;
                col_value[col] = value;
                recompute_dual.push(col);
            }
            Reduction::EmptyCol { col, status, value } => {
                col_status[col] = status;
                col_value[col] = value;
                col_dual[col] = lp.col_cost[col];
            }
            Reduction::SingletonRow {
                row,
                col,
                coef,
                lower_from_row,
                upper_from_row,
            } => {
                // If the column rests on a bound this row imposed, the
                // dual support belongs to the row and the column joins
                // the basis in its place.
                let transfer = match col_status[col] {
                    BasisStatus::Lower | BasisStatus::Fixed => lower_from_row,
                    BasisStatus::Upper => upper_from_row,
                    _ => false,
                };
                if transfer {
                    let at_lower = matches!(
                        col_status[col],
                        BasisStatus::Lower | BasisStatus::Fixed
                    );
                    // A positive coefficient maps the column's lower
                    // bound to the row's lower bound.
                    let row_at_lower = at_lower == (coef > 0.0);
                    row_status[row] = if row_at_lower {
                        BasisStatus::Lower
                    } else {
                        BasisStatus::Upper
                    };
                    row_value[row] = if row_at_lower {
                        lp.row_lower[row]
                    } else {
                        lp.row_upper[row]
                    };
                    row_dual[row] = col_dual[col] / coef;
                    col_status[col] = BasisStatus::Basic;
                    col_dual[col] = 0.0;
                } else {
                    row_status[row] = BasisStatus::Basic;
                    row_dual[row] = 0.0;
                }
            }
        }
    }

    // Activities for rows whose logical is basic, and duals for
    // substituted columns, both against the full-space data.
    let activity = lp.row_activity(&col_value);
    for i in 0..m {
        if row_status[i] == BasisStatus::Basic {
            row_value[i] = activity[i];
        }
    }
    for &j in &recompute_dual {
        // A substituted column can be pulled into the basis by a later
        // singleton transfer; its dual stays exactly zero.
        if col_status[j] == BasisStatus::Basic {
            continue;
        }
        let mut dot = 0.0;
        if let Some(col) = lp.a_matrix.outer_view(j) {
            for (i, &v) in col.iter() {
                dot += v * row_dual[i];
            }
        }
        col_dual[j] = lp.col_cost[j] - dot;
    }

    let basis = Basis {
        valid: true,
        col_status,
        row_status,
        revision: red_basis.revision,
    };
    let objective_value = lp.objective_value(&col_value);
    let solution = Solution {
        valid: true,
        col_value,
        row_value,
        col_dual,
        row_dual,
        objective_value,
    };
    (basis, solution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ObjSense, INF};

    #[test]
    fn test_fixed_col_substitution() {
        // x0 fixed at 2, x1 free to move; row x0 + x1 <= 10.
        let lp = Lp::from_column_arrays(
            2,
            1,
            ObjSense::Minimize,
            0.0,
            vec![3.0, 1.0],
            vec![2.0, 0.0],
            vec![2.0, INF],
            vec![-INF],
            vec![10.0],
            &[0, 1, 2],
            &[0, 0],
            &[1.0, 1.0],
        )
        .unwrap();
        let PresolveOutcome::Reduced(red) = presolve(&lp) else {
            panic!("expected a reduced LP");
        };
        // The fixed column cascades: the row becomes a singleton on x1,
        // x1 becomes empty, and the whole model presolves away.
        assert_eq!(red.lp.num_col, 0);
        assert_eq!(red.lp.num_row, 0);
        // Offset picks up 3 * 2 from the fixed column.
        assert_eq!(red.lp.offset, 6.0);

        // Postsolve from the empty reduction rebuilds the full model.
        let red_basis = Basis {
            valid: true,
            col_status: vec![],
            row_status: vec![],
            revision: 0,
        };
        let red_solution = Solution::default();
        let (basis, solution) = postsolve(&lp, &red, &red_basis, &red_solution);
        assert!(basis.validate(&lp).is_ok());
        assert_eq!(solution.col_value, vec![2.0, 0.0]);
        assert_eq!(solution.row_value, vec![2.0]);
        assert_eq!(solution.objective_value, 6.0);
    }

    #[test]
    fn test_empty_row_consistency() {
        // A row over only the fixed column, with bounds excluding its
        // activity, is infeasible.
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![1.0],
            vec![2.0],
            vec![2.0],
            vec![5.0],
            vec![5.0],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        // Row becomes 5 - 2 = 3 on both bounds after substitution: the
        // empty row check sees [3, 3] and rejects.
        assert!(matches!(presolve(&lp), PresolveOutcome::Infeasible));
    }

    #[test]
    fn test_singleton_row_tightens_and_restores() {
        // Row 0: 2 x0 <= 8 tightens x0 <= 4; row 1 couples x0 and x1.
        let lp = Lp::from_column_arrays(
            2,
            2,
            ObjSense::Minimize,
            0.0,
            vec![-1.0, 0.5],
            vec![0.0, 0.0],
            vec![INF, INF],
            vec![-INF, -INF],
            vec![8.0, 6.0],
            &[0, 2, 3],
            &[0, 1, 1],
            &[2.0, 1.0, 1.0],
        )
        .unwrap();
        let PresolveOutcome::Reduced(red) = presolve(&lp) else {
            panic!("expected a reduced LP");
        };
        assert_eq!(red.lp.num_row, 1);
        assert_eq!(red.lp.col_upper[0], 4.0);

        // Pretend the engine left x0 nonbasic at the tightened upper
        // bound: postsolve must move the dual onto the removed row.
        let red_basis = Basis {
            valid: true,
            col_status: vec![BasisStatus::Upper, BasisStatus::Lower],
            row_status: vec![BasisStatus::Basic],
            revision: 1,
        };
        let red_solution = Solution {
            valid: true,
            col_value: vec![4.0, 0.0],
            row_value: vec![4.0],
            col_dual: vec![-1.0, 0.5],
            row_dual: vec![0.0],
            objective_value: -4.0,
        };
        let (basis, solution) = postsolve(&lp, &red, &red_basis, &red_solution);
        assert!(basis.validate(&lp).is_ok());
        assert_eq!(basis.col_status[0], BasisStatus::Basic);
        assert_eq!(basis.row_status[0], BasisStatus::Upper);
        assert_eq!(solution.row_value[0], 8.0);
        // Dual moved onto the row: d / coef = -1 / 2.
        assert_eq!(solution.row_dual[0], -0.5);
        assert_eq!(solution.col_dual[0], 0.0);
    }

    #[test]
    fn test_empty_col_unbounded_direction() {
        let lp = Lp::from_column_arrays(
            1,
            0,
            ObjSense::Minimize,
            0.0,
            vec![-1.0],
            vec![0.0],
            vec![INF],
            vec![],
            vec![],
            &[0, 0],
            &[],
            &[],
        )
        .unwrap();
        assert!(matches!(
            presolve(&lp),
            PresolveOutcome::UnboundedOrInfeasible
        ));
    }
}
