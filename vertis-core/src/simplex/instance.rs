//! Working problem state for the simplex engine.
//!
//! The instance holds the scaled, minimize-form copy of the LP over the
//! `n + m` structural and logical variables, the current basis with its
//! factorization, and the primal/dual value arrays the pivot loops read
//! and write. Logical variable `n + i` carries the activity of row `i`:
//! the working constraint is `A x - s = 0`, so the matrix seen by the
//! basis is `[A | -I]` and logical bounds are the row bounds.

use sprs::TriMat;

use crate::factor::{BasisFactor, SparseVec};
use crate::model::{is_infinite, Lp, SparseCsc, INF};
use crate::scaling::{scale_factors, ScaleFactors};
use crate::solution::{nonbasic_resting_status, Basis, BasisStatus, SimplexStats, Solution};

/// Initial magnitude for the temporary working bounds that dual phase 1
/// places on unboxed dual-infeasible variables.
pub const WORKING_BOUND: f64 = 1e7;
/// Growth cap; persistent resting on a working bound past this magnitude
/// is reported as dual infeasibility.
pub const WORKING_BOUND_LIMIT: f64 = 1e13;

const DENSITY_SMOOTHING: f64 = 0.95;

/// Scaled working copy of the LP plus basis state.
pub struct SimplexInstance {
    /// Structural variable count n.
    pub num_col: usize,
    /// Row count m.
    pub num_row: usize,
    /// Total variable count n + m.
    pub num_tot: usize,
    /// Objective sense sign: +1 minimize, -1 maximize.
    pub sense_sign: f64,
    /// Objective offset of the model being solved.
    pub offset: f64,
    /// Scaled minimize-form costs, zero on logicals.
    pub work_cost: Vec<f64>,
    /// Working lower bounds (scaled; may be boxed by dual phase 1).
    pub work_lower: Vec<f64>,
    /// Working upper bounds.
    pub work_upper: Vec<f64>,
    /// Scaled model bounds before boxing.
    pub model_lower: Vec<f64>,
    /// Scaled model bounds before boxing.
    pub model_upper: Vec<f64>,
    /// Variables carrying temporary working bounds.
    pub boxed: Vec<bool>,
    /// Scaled constraint matrix.
    pub matrix: SparseCsc,
    /// Row/column scale factors.
    pub scale: ScaleFactors,
    /// Basic variable per row.
    pub basic_index: Vec<usize>,
    /// Row of each basic variable; `usize::MAX` for nonbasic.
    pub row_of: Vec<usize>,
    /// Basis status per variable.
    pub status: Vec<BasisStatus>,
    /// Resting value per nonbasic variable.
    pub work_value: Vec<f64>,
    /// Value of the basic variable on each row.
    pub base_value: Vec<f64>,
    /// Reduced cost per variable; exactly zero on basics.
    pub work_dual: Vec<f64>,
    /// Row dual multipliers y (scaled space).
    pub dual_row: Vec<f64>,
    /// Dual steepest-edge reference weights per row.
    pub dse_weight: Vec<f64>,
    /// Basis factorization.
    pub factor: BasisFactor,
    /// Incremented whenever the basic set changes.
    pub basis_revision: u64,
}

impl SimplexInstance {
    /// Build the working instance for an LP under the given scaling
    /// strategy.
    pub fn build(lp: &Lp, scale_strategy: i64) -> Self {
        let n = lp.num_col;
        let m = lp.num_row;
        let num_tot = n + m;
        let scale = scale_factors(&lp.a_matrix, scale_strategy);
        let sense_sign = lp.sense.sign();

        let matrix = if scale.is_identity {
            lp.a_matrix.clone()
        } else {
            let mut tri = TriMat::new((m, n));
            for (j, col) in lp.a_matrix.outer_iterator().enumerate() {
                for (i, &v) in col.iter() {
                    tri.add_triplet(i, j, v * scale.row[i] * scale.col[j]);
                }
            }
            tri.to_csc()
        };

        let mut work_cost = vec![0.0; num_tot];
        let mut work_lower = vec![0.0; num_tot];
        let mut work_upper = vec![0.0; num_tot];
        for j in 0..n {
            work_cost[j] = sense_sign * lp.col_cost[j] * scale.col[j];
            work_lower[j] = scale_bound(lp.col_lower[j], 1.0 / scale.col[j]);
            work_upper[j] = scale_bound(lp.col_upper[j], 1.0 / scale.col[j]);
        }
        for i in 0..m {
            work_lower[n + i] = scale_bound(lp.row_lower[i], scale.row[i]);
            work_upper[n + i] = scale_bound(lp.row_upper[i], scale.row[i]);
        }

        SimplexInstance {
            num_col: n,
            num_row: m,
            num_tot,
            sense_sign,
            offset: lp.offset,
            model_lower: work_lower.clone(),
            model_upper: work_upper.clone(),
            work_cost,
            work_lower,
            work_upper,
            boxed: vec![false; num_tot],
            matrix,
            scale,
            basic_index: Vec::new(),
            row_of: vec![usize::MAX; num_tot],
            status: vec![BasisStatus::Lower; num_tot],
            work_value: vec![0.0; num_tot],
            base_value: vec![0.0; m],
            work_dual: vec![0.0; num_tot],
            dual_row: vec![0.0; m],
            dse_weight: vec![1.0; m],
            factor: BasisFactor::new(m),
            basis_revision: 0,
        }
    }

    /// Install the given basis; statuses with no matching working bound
    /// are coerced to the resting status of the variable.
    pub fn install_basis(&mut self, basis: &Basis) {
        let n = self.num_col;
        self.basic_index.clear();
        self.row_of.iter_mut().for_each(|r| *r = usize::MAX);
        for var in 0..self.num_tot {
            let st = if var < n {
                basis.col_status[var]
            } else {
                basis.row_status[var - n]
            };
            if st == BasisStatus::Basic {
                self.status[var] = BasisStatus::Basic;
                self.basic_index.push(var);
            } else {
                self.set_nonbasic(var, st);
            }
        }
        debug_assert_eq!(self.basic_index.len(), self.num_row);
        for (row, &var) in self.basic_index.iter().enumerate() {
            self.row_of[var] = row;
        }
        self.basis_revision = basis.revision;
    }

    /// Install the all-logical basis.
    pub fn install_logical_basis(&mut self) {
        let n = self.num_col;
        self.basic_index.clear();
        self.row_of.iter_mut().for_each(|r| *r = usize::MAX);
        for j in 0..n {
            let st = nonbasic_resting_status(self.work_lower[j], self.work_upper[j]);
            self.set_nonbasic(j, st);
        }
        for i in 0..self.num_row {
            let var = n + i;
            self.status[var] = BasisStatus::Basic;
            self.basic_index.push(var);
            self.row_of[var] = i;
        }
        self.basis_revision += 1;
    }

    /// Mark a variable nonbasic with the given status and set its exact
    /// resting value.
    pub fn set_nonbasic(&mut self, var: usize, st: BasisStatus) {
        let st = match st {
            BasisStatus::Lower if is_infinite(self.work_lower[var]) => {
                nonbasic_resting_status(self.work_lower[var], self.work_upper[var])
            }
            BasisStatus::Upper if is_infinite(self.work_upper[var]) => {
                nonbasic_resting_status(self.work_lower[var], self.work_upper[var])
            }
            other => other,
        };
        self.status[var] = st;
        self.row_of[var] = usize::MAX;
        self.work_value[var] = match st {
            BasisStatus::Lower | BasisStatus::Fixed => self.work_lower[var],
            BasisStatus::Upper => self.work_upper[var],
            BasisStatus::Free => 0.0,
            BasisStatus::Basic => unreachable!("nonbasic status expected"),
        };
    }

    /// Column of `[A | -I]` for a variable, in the scaled space.
    pub fn column(&self, var: usize) -> SparseVec {
        if var < self.num_col {
            match self.matrix.outer_view(var) {
                Some(col) => col.iter().map(|(i, &v)| (i, v)).collect(),
                None => Vec::new(),
            }
        } else {
            vec![(var - self.num_col, -1.0)]
        }
    }

    /// Refactorize the current basis. Singular slots are repaired by
    /// substituting the logical of the offending pivot row; the displaced
    /// variable is made nonbasic at its resting bound.
    pub fn reinvert(&mut self, stats: &mut SimplexStats) {
        // A repaired basis must itself be refactorized so that solves
        // reflect the substituted logicals; a repair can also displace a
        // logical that was basic elsewhere, so iterate until INVERT
        // comes back clean. Each round pins at least one more logical to
        // its own row, which bounds the loop.
        for _ in 0..=self.num_row {
            let columns: Vec<SparseVec> =
                self.basic_index.iter().map(|&v| self.column(v)).collect();
            let outcome = self.factor.invert(&columns);

            // Reorder so that the variable of slot k sits on its pivot
            // row.
            let old = self.basic_index.clone();
            for (slot, &row) in outcome.pivot_rows.iter().enumerate() {
                self.basic_index[row] = old[slot];
            }
            if outcome.replaced.is_empty() {
                break;
            }
            log::debug!(
                "INVERT repaired {} singular slot(s); refactorizing",
                outcome.replaced.len()
            );
            for &(slot, row) in &outcome.replaced {
                let displaced = old[slot];
                let st = nonbasic_resting_status(
                    self.work_lower[displaced],
                    self.work_upper[displaced],
                );
                self.set_nonbasic(displaced, st);
                let logical = self.num_col + row;
                self.basic_index[row] = logical;
                self.status[logical] = BasisStatus::Basic;
            }
            self.basis_revision += 1;
        }
        for r in self.row_of.iter_mut() {
            *r = usize::MAX;
        }
        for (row, &var) in self.basic_index.iter().enumerate() {
            self.row_of[var] = row;
            self.status[var] = BasisStatus::Basic;
        }
        stats.num_invert = self.factor.num_invert;
        stats.last_invert_num_el = self.factor.last_invert_num_el;
        stats.last_factored_basis_num_el = self.factor.last_factored_basis_num_el;
    }

    /// Recompute the basic variable values from the nonbasic resting
    /// values: `B x_B = -N x_N`.
    pub fn compute_base_values(&mut self) {
        let mut rhs = vec![0.0; self.num_row];
        for var in 0..self.num_tot {
            if self.status[var] == BasisStatus::Basic {
                continue;
            }
            let xv = self.work_value[var];
            if xv == 0.0 {
                continue;
            }
            for (i, v) in self.column(var) {
                rhs[i] -= v * xv;
            }
        }
        self.factor.ftran(&mut rhs);
        self.base_value = rhs;
    }

    /// Recompute row duals and reduced costs from the basis: solves
    /// `B' y = c_B` and prices every nonbasic column. Basic reduced
    /// costs are exactly zero.
    pub fn compute_duals(&mut self) {
        let mut y = vec![0.0; self.num_row];
        for (row, &var) in self.basic_index.iter().enumerate() {
            y[row] = self.work_cost[var];
        }
        self.factor.btran(&mut y);
        self.dual_row = y;
        for var in 0..self.num_tot {
            let d = if self.status[var] == BasisStatus::Basic {
                0.0
            } else {
                self.reduced_cost(var)
            };
            self.work_dual[var] = d;
        }
    }

    /// Reduced cost of one variable against the current `dual_row`.
    pub fn reduced_cost(&self, var: usize) -> f64 {
        if var < self.num_col {
            let mut dot = 0.0;
            if let Some(col) = self.matrix.outer_view(var) {
                for (i, &v) in col.iter() {
                    dot += v * self.dual_row[i];
                }
            }
            self.work_cost[var] - dot
        } else {
            // Logical column is -e_i with zero cost.
            self.dual_row[var - self.num_col]
        }
    }

    /// Refactorize and recompute both value arrays.
    pub fn refresh(&mut self, stats: &mut SimplexStats) {
        self.reinvert(stats);
        self.compute_base_values();
        self.compute_duals();
    }

    /// Dual objective of the working problem in minimize space,
    /// including the model offset: `offset + sum over nonbasic of
    /// d_j x_j`. Scaling cancels in each product.
    pub fn dual_objective(&self) -> f64 {
        let mut g = 0.0;
        for var in 0..self.num_tot {
            if self.status[var] != BasisStatus::Basic {
                let d = self.work_dual[var];
                if d != 0.0 {
                    g += d * self.work_value[var];
                }
            }
        }
        self.sense_sign * g + self.offset
    }

    /// Objective of the current iterate in the model's own sense.
    pub fn current_objective(&self) -> f64 {
        let mut obj = 0.0;
        for var in 0..self.num_col {
            let x = match self.row_of[var] {
                usize::MAX => self.work_value[var],
                row => self.base_value[row],
            };
            obj += self.work_cost[var] * x;
        }
        self.sense_sign * obj + self.offset
    }

    /// Primal infeasibility of the basic variable on `row`; positive
    /// magnitudes mean a bound violation.
    pub fn row_infeasibility(&self, row: usize) -> f64 {
        let var = self.basic_index[row];
        let x = self.base_value[row];
        let below = self.work_lower[var] - x;
        let above = x - self.work_upper[var];
        below.max(above).max(0.0)
    }

    /// Largest primal infeasibility over the basis.
    pub fn max_primal_infeasibility(&self) -> f64 {
        (0..self.num_row)
            .map(|r| self.row_infeasibility(r))
            .fold(0.0, f64::max)
    }

    /// Apply temporary working bounds to a variable so that it can rest
    /// dual-feasibly, recording the boxing for later resolution.
    pub fn apply_working_bounds(&mut self, var: usize, magnitude: f64) {
        if is_infinite(self.model_lower[var]) {
            self.work_lower[var] = -magnitude;
        }
        if is_infinite(self.model_upper[var]) {
            self.work_upper[var] = magnitude;
        }
        self.boxed[var] = true;
    }

    /// Whether a nonbasic variable currently rests on a temporary
    /// working bound rather than a model bound.
    pub fn rests_on_working_bound(&self, var: usize) -> bool {
        if !self.boxed[var] || self.status[var] == BasisStatus::Basic {
            return false;
        }
        match self.status[var] {
            BasisStatus::Lower => is_infinite(self.model_lower[var]),
            BasisStatus::Upper => is_infinite(self.model_upper[var]),
            _ => false,
        }
    }

    /// Record the density of a work vector into a smoothed stats field.
    pub fn record_density(field: &mut f64, nnz: usize, dim: usize) {
        if dim == 0 {
            return;
        }
        let density = nnz as f64 / dim as f64;
        if *field == 0.0 {
            *field = density;
        } else {
            *field = DENSITY_SMOOTHING * *field + (1.0 - DENSITY_SMOOTHING) * density;
        }
    }

    /// Extract the basis and solution in the original space and sense.
    ///
    /// Nonbasic values are placed exactly on their model bound so that
    /// complementarity holds as an equality; reported row values come
    /// from the logical variables, which carry the row activities of the
    /// basic solution.
    pub fn extract(&self, lp: &Lp) -> (Basis, Solution) {
        let n = self.num_col;
        let m = self.num_row;
        let mut col_status = Vec::with_capacity(n);
        let mut row_status = Vec::with_capacity(m);
        let mut col_value = vec![0.0; n];
        let mut row_value = vec![0.0; m];
        let mut col_dual = vec![0.0; n];
        let mut row_dual = vec![0.0; m];

        for var in 0..self.num_tot {
            let (orig_lower, orig_upper) = if var < n {
                (lp.col_lower[var], lp.col_upper[var])
            } else {
                (lp.row_lower[var - n], lp.row_upper[var - n])
            };
            let (st, value) = match self.status[var] {
                BasisStatus::Basic => {
                    let row = self.row_of[var];
                    let scaled = self.base_value[row];
                    let unscaled = if var < n {
                        scaled * self.scale.col[var]
                    } else {
                        scaled / self.scale.row[var - n]
                    };
                    (BasisStatus::Basic, unscaled)
                }
                BasisStatus::Lower if !self.rests_on_working_bound(var) => {
                    (BasisStatus::Lower, orig_lower)
                }
                BasisStatus::Upper if !self.rests_on_working_bound(var) => {
                    (BasisStatus::Upper, orig_upper)
                }
                BasisStatus::Fixed => (BasisStatus::Fixed, orig_lower),
                BasisStatus::Free => (BasisStatus::Free, 0.0),
                _ => {
                    // Resting on a temporary working bound: only seen on
                    // limit trips. Report the nearest model bound.
                    if !is_infinite(orig_lower) {
                        (BasisStatus::Lower, orig_lower)
                    } else if !is_infinite(orig_upper) {
                        (BasisStatus::Upper, orig_upper)
                    } else {
                        (BasisStatus::Free, 0.0)
                    }
                }
            };
            let dual = if self.status[var] == BasisStatus::Basic {
                0.0
            } else if var < n {
                self.sense_sign * self.work_dual[var] / self.scale.col[var]
            } else {
                self.sense_sign * self.work_dual[var] * self.scale.row[var - n]
            };
            if var < n {
                col_status.push(st);
                col_value[var] = value;
                col_dual[var] = dual;
            } else {
                row_status.push(st);
                row_value[var - n] = value;
                row_dual[var - n] = dual;
            }
        }

        let basis = Basis {
            valid: true,
            col_status,
            row_status,
            revision: self.basis_revision,
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
}

fn scale_bound(bound: f64, factor: f64) -> f64 {
    if is_infinite(bound) {
        if bound > 0.0 {
            INF
        } else {
            -INF
        }
    } else {
        bound * factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjSense;

    fn blending_lp() -> Lp {
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
    fn test_logical_basis_values() {
        let lp = blending_lp();
        let mut inst = SimplexInstance::build(&lp, 0);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        inst.reinvert(&mut stats);
        inst.compute_base_values();
        inst.compute_duals();
        // All structurals at zero, so every logical sits at zero activity.
        assert_eq!(inst.base_value, vec![0.0, 0.0]);
        // Reduced costs of the structurals are their costs.
        assert_eq!(inst.work_dual[0], -8.0);
        assert_eq!(inst.work_dual[1], -10.0);
        // Logical duals are zero.
        assert_eq!(inst.work_dual[2], 0.0);
        assert_eq!(inst.work_dual[3], 0.0);
    }

    #[test]
    fn test_base_values_track_nonbasic_positions() {
        let lp = blending_lp();
        let mut inst = SimplexInstance::build(&lp, 0);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        inst.reinvert(&mut stats);
        // Put x0 at value 5: logicals must absorb (5, 10).
        inst.status[0] = BasisStatus::Upper;
        inst.work_upper[0] = 5.0;
        inst.work_value[0] = 5.0;
        inst.compute_base_values();
        assert!((inst.base_value[0] - 5.0).abs() < 1e-12);
        assert!((inst.base_value[1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_dual_objective_at_entry() {
        let lp = blending_lp();
        let mut inst = SimplexInstance::build(&lp, 0);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        inst.refresh(&mut stats);
        // Everything rests at zero, so the dual objective is the offset.
        assert_eq!(inst.dual_objective(), 0.0);
    }

    #[test]
    fn test_extract_places_nonbasics_exactly() {
        let lp = blending_lp();
        let mut inst = SimplexInstance::build(&lp, 1);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        inst.refresh(&mut stats);
        let (basis, solution) = inst.extract(&lp);
        assert!(basis.validate(&lp).is_ok());
        assert_eq!(solution.col_value, vec![0.0, 0.0]);
        assert_eq!(solution.objective_value, 0.0);
    }
}
