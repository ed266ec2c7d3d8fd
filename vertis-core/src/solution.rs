//! Basis, solution and post-run report types.

use crate::error::{VertisError, VertisResult};
use crate::model::{is_infinite, Lp};

/// Status of one variable (structural or logical) with respect to the
/// current basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisStatus {
    /// In the basis.
    Basic,
    /// Nonbasic at its lower bound.
    Lower,
    /// Nonbasic at its upper bound.
    Upper,
    /// Nonbasic with both bounds infinite; rests at zero.
    Free,
    /// Nonbasic with equal bounds.
    Fixed,
}

/// A simplex basis over the `num_col` structural and `num_row` logical
/// variables.
#[derive(Debug, Clone, Default)]
pub struct Basis {
    /// Whether the basis describes the incumbent model.
    pub valid: bool,
    /// Status per structural variable.
    pub col_status: Vec<BasisStatus>,
    /// Status per logical (row) variable.
    pub row_status: Vec<BasisStatus>,
    /// Incremented whenever the set of basic variables changes.
    pub revision: u64,
}

impl Basis {
    /// The all-logical basis: every row variable basic, every column
    /// nonbasic on a bound (lower when finite, else upper, else free).
    pub fn logical(lp: &Lp) -> Self {
        let col_status = (0..lp.num_col)
            .map(|j| nonbasic_resting_status(lp.col_lower[j], lp.col_upper[j]))
            .collect();
        Basis {
            valid: true,
            col_status,
            row_status: vec![BasisStatus::Basic; lp.num_row],
            revision: 0,
        }
    }

    /// Number of basic variables.
    pub fn num_basic(&self) -> usize {
        self.col_status
            .iter()
            .chain(self.row_status.iter())
            .filter(|s| **s == BasisStatus::Basic)
            .count()
    }

    /// Check the basis against an LP: dimensions match, exactly
    /// `num_row` variables basic, and every nonbasic status names a bound
    /// that exists.
    pub fn validate(&self, lp: &Lp) -> VertisResult<()> {
        if self.col_status.len() != lp.num_col || self.row_status.len() != lp.num_row {
            return Err(VertisError::Model(format!(
                "basis has {}+{} statuses, model has {}+{}",
                self.col_status.len(),
                self.row_status.len(),
                lp.num_col,
                lp.num_row
            )));
        }
        let num_basic = self.num_basic();
        if num_basic != lp.num_row {
            return Err(VertisError::Model(format!(
                "basis has {num_basic} basic variables, expected {}",
                lp.num_row
            )));
        }
        for (j, &st) in self.col_status.iter().enumerate() {
            check_nonbasic_status(st, lp.col_lower[j], lp.col_upper[j])
                .map_err(|msg| VertisError::Model(format!("column {j}: {msg}")))?;
        }
        for (i, &st) in self.row_status.iter().enumerate() {
            check_nonbasic_status(st, lp.row_lower[i], lp.row_upper[i])
                .map_err(|msg| VertisError::Model(format!("row {i}: {msg}")))?;
        }
        Ok(())
    }
}

/// Resting status for a nonbasic variable with the given bounds.
pub fn nonbasic_resting_status(lower: f64, upper: f64) -> BasisStatus {
    if lower == upper {
        BasisStatus::Fixed
    } else if !is_infinite(lower) {
        BasisStatus::Lower
    } else if !is_infinite(upper) {
        BasisStatus::Upper
    } else {
        BasisStatus::Free
    }
}

fn check_nonbasic_status(st: BasisStatus, lower: f64, upper: f64) -> Result<(), String> {
    match st {
        BasisStatus::Basic => Ok(()),
        BasisStatus::Lower => {
            if is_infinite(lower) {
                Err("nonbasic at an infinite lower bound".to_string())
            } else {
                Ok(())
            }
        }
        BasisStatus::Upper => {
            if is_infinite(upper) {
                Err("nonbasic at an infinite upper bound".to_string())
            } else {
                Ok(())
            }
        }
        BasisStatus::Fixed => {
            if lower == upper {
                Ok(())
            } else {
                Err("fixed status with unequal bounds".to_string())
            }
        }
        BasisStatus::Free => {
            if is_infinite(lower) && is_infinite(upper) {
                Ok(())
            } else {
                Err("free status with a finite bound".to_string())
            }
        }
    }
}

/// Primal and dual values for a solved LP, in the original (unscaled)
/// space and the model's own objective sense.
#[derive(Debug, Clone, Default)]
pub struct Solution {
    /// Whether the solution describes the incumbent model.
    pub valid: bool,
    /// Structural variable values.
    pub col_value: Vec<f64>,
    /// Row activities `A x`.
    pub row_value: Vec<f64>,
    /// Reduced costs.
    pub col_dual: Vec<f64>,
    /// Row dual multipliers.
    pub row_dual: Vec<f64>,
    /// Objective value `c'x + offset`.
    pub objective_value: f64,
}

/// Read-only post-run report, regenerated on every run.
#[derive(Debug, Clone, Default)]
pub struct SolveInfo {
    /// Whether the snapshot describes a completed run.
    pub valid: bool,
    /// Simplex iterations performed by the run.
    pub simplex_iteration_count: i64,
    /// IPM iterations performed by the run.
    pub ipm_iteration_count: i64,
    /// Crossover iterations performed by the run.
    pub crossover_iteration_count: i64,
    /// Objective value of the reported solution.
    pub objective_function_value: f64,
    /// Number of primal infeasibilities above tolerance.
    pub num_primal_infeasibilities: i64,
    /// Largest primal infeasibility.
    pub max_primal_infeasibility: f64,
    /// Sum of primal infeasibilities.
    pub sum_primal_infeasibilities: f64,
    /// Number of dual infeasibilities above tolerance.
    pub num_dual_infeasibilities: i64,
    /// Largest dual infeasibility.
    pub max_dual_infeasibility: f64,
    /// Sum of dual infeasibilities.
    pub sum_dual_infeasibilities: f64,
    /// Largest product of a dual value and its variable's distance from
    /// the nearest bound. Exactly zero for any basic solution.
    pub max_complementarity_violation: f64,
    /// Sum of the complementarity products.
    pub sum_complementarity_violations: f64,
}

/// Factorization and work-density counters from the simplex engine.
#[derive(Debug, Clone, Default)]
pub struct SimplexStats {
    /// Whether the stats describe a completed run.
    pub valid: bool,
    /// Simplex iterations performed by the run.
    pub iteration_count: i64,
    /// Number of INVERT (full refactorization) calls.
    pub num_invert: i64,
    /// Nonzeros in the most recent factor.
    pub last_invert_num_el: i64,
    /// Nonzeros in the most recently factored basis matrix.
    pub last_factored_basis_num_el: i64,
    /// Smoothed density of FTRAN results for entering columns.
    pub col_aq_density: f64,
    /// Smoothed density of BTRAN results for leaving rows.
    pub row_ep_density: f64,
    /// Smoothed density of PRICE results.
    pub row_ap_density: f64,
    /// Smoothed density of the steepest-edge update vector.
    pub row_dse_density: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lp, ObjSense, INF};

    fn lp() -> Lp {
        Lp::from_column_arrays(
            2,
            2,
            ObjSense::Minimize,
            0.0,
            vec![1.0, 1.0],
            vec![0.0, -INF],
            vec![INF, INF],
            vec![-INF, 1.0],
            vec![4.0, 1.0],
            &[0, 2, 4],
            &[0, 1, 0, 1],
            &[1.0, 1.0, 1.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_logical_basis() {
        let lp = lp();
        let basis = Basis::logical(&lp);
        assert!(basis.valid);
        assert_eq!(basis.num_basic(), 2);
        assert_eq!(basis.col_status[0], BasisStatus::Lower);
        // Column 1 has no finite lower bound; it rests free.
        assert_eq!(basis.col_status[1], BasisStatus::Free);
        assert!(basis.validate(&lp).is_ok());
    }

    #[test]
    fn test_validate_counts_basics() {
        let lp = lp();
        let mut basis = Basis::logical(&lp);
        basis.row_status[0] = BasisStatus::Upper;
        assert!(basis.validate(&lp).is_err());
    }

    #[test]
    fn test_validate_rejects_infinite_resting_bound() {
        let lp = lp();
        let mut basis = Basis::logical(&lp);
        basis.col_status[1] = BasisStatus::Lower;
        assert!(basis.validate(&lp).is_err());
    }

    #[test]
    fn test_fixed_resting_status() {
        assert_eq!(nonbasic_resting_status(2.0, 2.0), BasisStatus::Fixed);
        assert_eq!(nonbasic_resting_status(-INF, 3.0), BasisStatus::Upper);
        assert_eq!(nonbasic_resting_status(-INF, INF), BasisStatus::Free);
    }
}
