//! Solver orchestrator.
//!
//! [`Solver`] is the public facade: it owns the model, the options, the
//! incumbent basis/solution, the statistics, and routes `run()` to the
//! simplex or interior-point engine under the active budgets. Engines
//! borrow the working state for the duration of one call and retain
//! nothing; every public operation returns a [`SolverStatus`] and never
//! panics across the boundary.

use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{VertisError, VertisResult};
use crate::ipm::{self, IpmControl};
use crate::model::{is_infinite, Lp, ObjSense};
use crate::options::{OptionValue, Options, PresolveMode, SolverChoice};
use crate::presolve::{self, PresolveOutcome, ReducedLp};
use crate::simplex::{self, instance::SimplexInstance, SimplexControl};
use crate::solution::{
    nonbasic_resting_status, Basis, BasisStatus, SimplexStats, Solution, SolveInfo,
};
use crate::standard_form;
use crate::status::{ModelStatus, SolverStatus};

/// Hook invoked by [`Solver::read_model`]; the parser itself is an
/// external collaborator.
pub type ModelParser = Box<dyn Fn(&Path) -> VertisResult<Lp> + Send>;

/// A single solver instance. Not safe for concurrent use; independent
/// instances are independent.
#[derive(Default)]
pub struct Solver {
    lp: Lp,
    options: Options,
    basis: Basis,
    solution: Solution,
    info: SolveInfo,
    simplex_stats: SimplexStats,
    model_status: ModelStatus,
    presolved: Option<Box<ReducedLp>>,
    parser: Option<ModelParser>,
    run_time: Duration,
}

impl Solver {
    /// A fresh instance with default options and an empty model.
    pub fn new() -> Self {
        Self {
            options: Options::default(),
            ..Default::default()
        }
    }

    /// Install the external model parser used by [`Solver::read_model`].
    pub fn set_model_parser(&mut self, parser: ModelParser) {
        self.parser = Some(parser);
    }

    /// Read a model file through the installed parser. On success the
    /// incumbent model is replaced and all solver state cleared.
    pub fn read_model(&mut self, path: impl AsRef<Path>) -> SolverStatus {
        let Some(parser) = self.parser.as_ref() else {
            log::warn!("read_model: no model parser installed");
            self.model_status = ModelStatus::LoadError;
            return SolverStatus::Error;
        };
        match parser(path.as_ref()) {
            Ok(lp) => self.pass_model(lp),
            Err(err) => {
                log::warn!("read_model: {err}");
                self.lp = Lp::default();
                self.model_status = ModelStatus::LoadError;
                SolverStatus::Error
            }
        }
    }

    /// Validate and install a model. All solver state is cleared.
    pub fn pass_model(&mut self, lp: Lp) -> SolverStatus {
        if let Err(err) = lp.validate() {
            log::warn!("pass_model: {err}");
            self.lp = Lp::default();
            self.model_status = ModelStatus::ModelError;
            return SolverStatus::Error;
        }
        self.lp = lp;
        self.clear_solver();
        SolverStatus::Ok
    }

    /// Read-only view of the incumbent model.
    pub fn get_lp(&self) -> &Lp {
        &self.lp
    }

    /// Set an option; rejected values leave the table untouched.
    pub fn set_option_value(
        &mut self,
        key: &str,
        value: impl Into<OptionValue>,
    ) -> SolverStatus {
        let value = value.into();
        let scale_before = self.options.simplex_scale_strategy;
        match self.options.set(key, value) {
            Ok(()) => {
                // A new scaling regime invalidates the incumbent basis:
                // the factorized problem would no longer match it.
                if key == "simplex_scale_strategy"
                    && self.options.simplex_scale_strategy != scale_before
                {
                    self.basis.valid = false;
                }
                SolverStatus::Ok
            }
            Err(err) => {
                log::warn!("set_option_value: {err}");
                SolverStatus::Error
            }
        }
    }

    /// Read an option. Never mutates.
    pub fn get_option_value(&self, key: &str) -> VertisResult<OptionValue> {
        self.options.get(key)
    }

    /// Restore every option to its documented default.
    pub fn reset_options(&mut self) -> SolverStatus {
        self.options = Options::default();
        SolverStatus::Ok
    }

    /// Validate and install a basis.
    pub fn set_basis(&mut self, basis: Basis) -> SolverStatus {
        if let Err(err) = basis.validate(&self.lp) {
            log::warn!("set_basis: {err}");
            return SolverStatus::Error;
        }
        self.basis = basis;
        self.basis.valid = true;
        SolverStatus::Ok
    }

    /// Install the logical basis: every row variable basic, every
    /// column nonbasic on a bound.
    pub fn set_logical_basis(&mut self) -> SolverStatus {
        self.basis = Basis::logical(&self.lp);
        SolverStatus::Ok
    }

    /// Discard basis, solution and statistics. The model, the options
    /// and the engine work buffers are preserved.
    pub fn clear_solver(&mut self) -> SolverStatus {
        self.basis = Basis::default();
        self.solution = Solution::default();
        self.info = SolveInfo::default();
        self.simplex_stats = SimplexStats::default();
        self.model_status = ModelStatus::NotSet;
        self.presolved = None;
        SolverStatus::Ok
    }

    /// Flip the objective sense. The incumbent basis remains valid; the
    /// bound semantics of `objective_bound`/`objective_target` are
    /// re-evaluated on the next run.
    pub fn change_objective_sense(&mut self, sense: ObjSense) -> SolverStatus {
        if self.lp.sense != sense {
            self.lp.sense = sense;
            self.model_status = ModelStatus::NotSet;
            self.solution.valid = false;
        }
        SolverStatus::Ok
    }

    /// Append a column with the given cost, bounds and sparse entries.
    /// The solution is invalidated; a valid basis is extended with the
    /// new column nonbasic at a finite bound (free if it has none).
    pub fn add_col(
        &mut self,
        cost: f64,
        lower: f64,
        upper: f64,
        entries: &[(usize, f64)],
    ) -> SolverStatus {
        if lower > upper {
            log::warn!("add_col: lower bound {lower} above upper bound {upper}");
            return SolverStatus::Error;
        }
        if entries.iter().any(|&(i, v)| i >= self.lp.num_row || v == 0.0 || !v.is_finite()) {
            log::warn!("add_col: illegal entry");
            return SolverStatus::Error;
        }
        let mut tri = sprs::TriMat::new((self.lp.num_row, self.lp.num_col + 1));
        for (j, col) in self.lp.a_matrix.outer_iterator().enumerate() {
            for (i, &v) in col.iter() {
                tri.add_triplet(i, j, v);
            }
        }
        for &(i, v) in entries {
            tri.add_triplet(i, self.lp.num_col, v);
        }
        self.lp.num_col += 1;
        self.lp.col_cost.push(cost);
        self.lp.col_lower.push(lower);
        self.lp.col_upper.push(upper);
        self.lp.a_matrix = tri.to_csc();
        self.solution.valid = false;
        self.model_status = ModelStatus::NotSet;
        if self.basis.valid {
            self.basis.col_status.push(nonbasic_resting_status(lower, upper));
        }
        SolverStatus::Ok
    }

    /// Append a row with the given bounds and sparse entries. The
    /// solution is invalidated; a valid basis is extended with the new
    /// row's logical basic, which keeps the basis count consistent.
    pub fn add_row(&mut self, lower: f64, upper: f64, entries: &[(usize, f64)]) -> SolverStatus {
        if lower > upper {
            log::warn!("add_row: lower bound {lower} above upper bound {upper}");
            return SolverStatus::Error;
        }
        if entries.iter().any(|&(j, v)| j >= self.lp.num_col || v == 0.0 || !v.is_finite()) {
            log::warn!("add_row: illegal entry");
            return SolverStatus::Error;
        }
        let mut tri = sprs::TriMat::new((self.lp.num_row + 1, self.lp.num_col));
        for (j, col) in self.lp.a_matrix.outer_iterator().enumerate() {
            for (i, &v) in col.iter() {
                tri.add_triplet(i, j, v);
            }
        }
        for &(j, v) in entries {
            tri.add_triplet(self.lp.num_row, j, v);
        }
        self.lp.num_row += 1;
        self.lp.row_lower.push(lower);
        self.lp.row_upper.push(upper);
        self.lp.a_matrix = tri.to_csc();
        self.solution.valid = false;
        self.model_status = ModelStatus::NotSet;
        if self.basis.valid {
            self.basis.row_status.push(BasisStatus::Basic);
            self.basis.revision += 1;
        }
        SolverStatus::Ok
    }

    /// Run presolve on the incumbent model; the reduced LP is kept for
    /// [`Solver::get_presolved_lp`].
    pub fn presolve(&mut self) -> SolverStatus {
        match presolve::presolve(&self.lp) {
            PresolveOutcome::Reduced(red) => {
                self.presolved = Some(red);
                SolverStatus::Ok
            }
            PresolveOutcome::Infeasible => {
                self.model_status = ModelStatus::Infeasible;
                SolverStatus::Ok
            }
            PresolveOutcome::UnboundedOrInfeasible => {
                self.model_status = ModelStatus::UnboundedOrInfeasible;
                SolverStatus::Ok
            }
        }
    }

    /// The LP produced by the most recent [`Solver::presolve`] call.
    pub fn get_presolved_lp(&self) -> Option<&Lp> {
        self.presolved.as_ref().map(|red| &red.lp)
    }

    /// Execute the configured engine on the incumbent model.
    pub fn run(&mut self) -> SolverStatus {
        let started = Instant::now();
        let status = self.run_inner(started);
        self.run_time += started.elapsed();
        if self.options.output_flag {
            log::info!(
                "{}: {} ({}), objective {:.12e}, simplex {} / ipm {} / crossover {} iterations",
                if self.lp.model_name.is_empty() {
                    "lp"
                } else {
                    &self.lp.model_name
                },
                self.model_status,
                status,
                self.info.objective_function_value,
                self.info.simplex_iteration_count,
                self.info.ipm_iteration_count,
                self.info.crossover_iteration_count,
            );
        }
        status
    }

    fn run_inner(&mut self, started: Instant) -> SolverStatus {
        self.info = SolveInfo::default();
        self.simplex_stats = SimplexStats::default();

        if self.lp.num_col == 0 {
            // With no columns every row activity is zero and the
            // objective is the offset; a model with no rows either is
            // trivially optimal at that value.
            return self.run_no_columns();
        }

        let deadline = if is_infinite(self.options.time_limit) {
            None
        } else {
            Some(started + Duration::from_secs_f64(self.options.time_limit))
        };

        let warm = self.options.use_warm_start
            && self.basis.valid
            && self.basis.col_status.len() == self.lp.num_col
            && self.basis.row_status.len() == self.lp.num_row
            && self.options.solver != SolverChoice::Ipm;
        let use_presolve = match self.options.presolve {
            PresolveMode::Off => false,
            PresolveMode::On => true,
            PresolveMode::Choose => !warm,
        };

        // Reduce, or solve the model as-is.
        let reduction: Option<Box<ReducedLp>> = if use_presolve {
            match presolve::presolve(&self.lp) {
                PresolveOutcome::Infeasible => {
                    self.model_status = ModelStatus::Infeasible;
                    self.refresh_info();
                    return SolverStatus::Ok;
                }
                PresolveOutcome::UnboundedOrInfeasible => {
                    self.model_status = ModelStatus::UnboundedOrInfeasible;
                    self.refresh_info();
                    return SolverStatus::Ok;
                }
                PresolveOutcome::Reduced(red) => Some(red),
            }
        } else {
            None
        };
        let solve_lp = match &reduction {
            Some(red) => red.lp.clone(),
            None => self.lp.clone(),
        };

        // Fully presolved away: postsolve reconstructs everything.
        if solve_lp.num_col == 0 && solve_lp.num_row == 0 {
            if let Some(red) = &reduction {
                let empty_basis = Basis {
                    valid: true,
                    col_status: Vec::new(),
                    row_status: Vec::new(),
                    revision: 0,
                };
                let (basis, solution) =
                    presolve::postsolve(&self.lp, red, &empty_basis, &Solution::default());
                self.basis = basis;
                self.solution = solution;
                self.model_status = ModelStatus::Optimal;
                self.refresh_info();
                return SolverStatus::Ok;
            }
        }

        let use_ipm = self.options.solver == SolverChoice::Ipm;
        if use_ipm {
            self.run_ipm(&solve_lp, reduction.as_deref(), deadline)
        } else {
            self.run_simplex(&solve_lp, reduction.as_deref(), warm, deadline)
        }
    }

    fn run_simplex(
        &mut self,
        solve_lp: &Lp,
        reduction: Option<&ReducedLp>,
        warm: bool,
        deadline: Option<Instant>,
    ) -> SolverStatus {
        let mut inst =
            SimplexInstance::build(solve_lp, self.options.simplex_scale_strategy);
        if warm && reduction.is_none() && self.basis.validate(solve_lp).is_ok() {
            inst.install_basis(&self.basis);
        } else {
            inst.install_logical_basis();
        }
        let ctrl = SimplexControl {
            iteration_limit: self.options.simplex_iteration_limit,
            deadline,
            objective_bound: self.options.objective_bound,
            objective_target: self.options.objective_target,
            sense: solve_lp.sense,
            primal_tol: self.options.primal_feasibility_tolerance,
            dual_tol: self.options.dual_feasibility_tolerance,
        };
        let outcome = simplex::run(
            &mut inst,
            &ctrl,
            &mut self.simplex_stats,
            self.options.simplex_strategy,
        );
        self.info.simplex_iteration_count = outcome.iterations;
        self.simplex_stats.valid = true;

        let (mut basis, mut solution) = inst.extract(solve_lp);
        if let Some(red) = reduction {
            let restored = presolve::postsolve(&self.lp, red, &basis, &solution);
            basis = restored.0;
            solution = restored.1;
        }
        self.basis = basis;
        self.solution = solution;
        self.model_status = outcome.model_status;
        self.refresh_info();
        run_status_of(self.model_status)
    }

    fn run_ipm(
        &mut self,
        solve_lp: &Lp,
        reduction: Option<&ReducedLp>,
        deadline: Option<Instant>,
    ) -> SolverStatus {
        let ctrl = IpmControl {
            iteration_limit: self.options.ipm_iteration_limit,
            deadline,
            primal_tol: self.options.primal_feasibility_tolerance,
            dual_tol: self.options.dual_feasibility_tolerance,
        };
        let outcome = ipm::run(solve_lp, &ctrl, &mut self.simplex_stats);
        self.info.ipm_iteration_count = outcome.ipm_iterations;
        self.info.crossover_iteration_count = outcome.crossover_iterations;
        self.simplex_stats.valid = true;
        if let Some((mut basis, mut solution)) = outcome.result {
            if let Some(red) = reduction {
                let restored = presolve::postsolve(&self.lp, red, &basis, &solution);
                basis = restored.0;
                solution = restored.1;
            }
            self.basis = basis;
            self.solution = solution;
        } else {
            self.basis.valid = false;
            self.solution.valid = false;
        }
        self.model_status = outcome.model_status;
        self.refresh_info();
        run_status_of(self.model_status)
    }

    /// A model with rows but no columns: every row activity is zero.
    fn run_no_columns(&mut self) -> SolverStatus {
        let feasible = (0..self.lp.num_row).all(|i| {
            self.lp.row_lower[i] <= 0.0 && self.lp.row_upper[i] >= 0.0
        });
        self.basis = Basis::logical(&self.lp);
        self.solution = Solution {
            valid: true,
            col_value: Vec::new(),
            row_value: vec![0.0; self.lp.num_row],
            col_dual: Vec::new(),
            row_dual: vec![0.0; self.lp.num_row],
            objective_value: self.lp.offset,
        };
        self.model_status = if feasible {
            ModelStatus::Optimal
        } else {
            ModelStatus::Infeasible
        };
        self.refresh_info();
        SolverStatus::Ok
    }

    /// Post-run report.
    pub fn get_info(&self) -> &SolveInfo {
        &self.info
    }

    /// Factorization and density counters of the most recent simplex
    /// work.
    pub fn get_simplex_stats(&self) -> &SimplexStats {
        &self.simplex_stats
    }

    /// Status of the most recent run.
    pub fn get_model_status(&self) -> ModelStatus {
        self.model_status
    }

    /// Stable display string for a model status.
    pub fn model_status_to_string(&self, status: ModelStatus) -> &'static str {
        status.as_str()
    }

    /// Accumulated wall-clock time spent in [`Solver::run`].
    pub fn get_run_time(&self) -> f64 {
        self.run_time.as_secs_f64()
    }

    /// The incumbent basis.
    pub fn get_basis(&self) -> &Basis {
        &self.basis
    }

    /// The incumbent solution.
    pub fn get_solution(&self) -> &Solution {
        &self.solution
    }

    /// Dual objective value of the incumbent solution: the bound-side
    /// value certified by the duals. For any successful run it matches
    /// the primal objective to rounding.
    pub fn get_dual_objective_value(&self) -> VertisResult<f64> {
        if !self.solution.valid {
            return Err(VertisError::Solve(
                "no valid solution for dual objective".to_string(),
            ));
        }
        let s = self.lp.sense.sign();
        let mut v = 0.0;
        for i in 0..self.lp.num_row {
            let y = s * self.solution.row_dual[i];
            if y == 0.0 {
                continue;
            }
            let bound = if y > 0.0 {
                self.lp.row_lower[i]
            } else {
                self.lp.row_upper[i]
            };
            let bound = if is_infinite(bound) {
                self.solution.row_value[i]
            } else {
                bound
            };
            v += y * bound;
        }
        for j in 0..self.lp.num_col {
            let d = s * self.solution.col_dual[j];
            if d == 0.0 {
                continue;
            }
            let bound = if d > 0.0 {
                self.lp.col_lower[j]
            } else {
                self.lp.col_upper[j]
            };
            let bound = if is_infinite(bound) {
                self.solution.col_value[j]
            } else {
                bound
            };
            v += d * bound;
        }
        Ok(s * v + self.lp.offset)
    }

    /// Size query of the two-call standard-form protocol.
    pub fn get_standard_form_dims(&self) -> (usize, usize, usize, f64) {
        let sf = standard_form::build(&self.lp);
        (sf.num_col, sf.num_row, sf.num_nz(), sf.offset)
    }

    /// Fill call of the two-call standard-form protocol. Slice lengths
    /// must match the preceding size query.
    pub fn get_standard_form_lp(
        &self,
        cost: &mut [f64],
        rhs: &mut [f64],
        start: &mut [usize],
        index: &mut [usize],
        value: &mut [f64],
    ) -> SolverStatus {
        let sf = standard_form::build(&self.lp);
        if cost.len() != sf.num_col
            || rhs.len() != sf.num_row
            || start.len() != sf.num_col + 1
            || index.len() != sf.num_nz()
            || value.len() != sf.num_nz()
        {
            log::warn!("get_standard_form_lp: buffer lengths do not match the size query");
            return SolverStatus::Error;
        }
        cost.copy_from_slice(&sf.cost);
        rhs.copy_from_slice(&sf.rhs);
        let mut k = 0;
        start[0] = 0;
        for (j, col) in sf.matrix.outer_iterator().enumerate() {
            for (i, &v) in col.iter() {
                index[k] = i;
                value[k] = v;
                k += 1;
            }
            start[j + 1] = k;
        }
        SolverStatus::Ok
    }

    /// Recompute the info snapshot from the incumbent solution.
    fn refresh_info(&mut self) {
        let info = &mut self.info;
        info.valid = true;
        if !self.solution.valid {
            return;
        }
        info.objective_function_value = self.solution.objective_value;

        let primal_tol = self.options.primal_feasibility_tolerance;
        let dual_tol = self.options.dual_feasibility_tolerance;
        let s = self.lp.sense.sign();

        fn visit_primal(info: &mut SolveInfo, tol: f64, value: f64, lower: f64, upper: f64) {
            let viol = (lower - value).max(value - upper).max(0.0);
            if viol > 0.0 {
                info.sum_primal_infeasibilities += viol;
                info.max_primal_infeasibility = info.max_primal_infeasibility.max(viol);
                if viol > tol {
                    info.num_primal_infeasibilities += 1;
                }
            }
        }
        for j in 0..self.lp.num_col {
            visit_primal(
                info,
                primal_tol,
                self.solution.col_value[j],
                self.lp.col_lower[j],
                self.lp.col_upper[j],
            );
        }
        for i in 0..self.lp.num_row {
            visit_primal(
                info,
                primal_tol,
                self.solution.row_value[i],
                self.lp.row_lower[i],
                self.lp.row_upper[i],
            );
        }

        let basis_ok = self.basis.valid
            && self.basis.col_status.len() == self.lp.num_col
            && self.basis.row_status.len() == self.lp.num_row;
        #[allow(clippy::too_many_arguments)]
        fn visit_dual(
            info: &mut SolveInfo,
            s: f64,
            tol: f64,
            dual: f64,
            status: BasisStatus,
            value: f64,
            lower: f64,
            upper: f64,
        ) {
            let d = s * dual;
            let viol = match status {
                BasisStatus::Basic | BasisStatus::Fixed => 0.0,
                BasisStatus::Lower => (-d).max(0.0),
                BasisStatus::Upper => d.max(0.0),
                BasisStatus::Free => d.abs(),
            };
            if viol > 0.0 {
                info.sum_dual_infeasibilities += viol;
                info.max_dual_infeasibility = info.max_dual_infeasibility.max(viol);
                if viol > tol {
                    info.num_dual_infeasibilities += 1;
                }
            }
            // Complementarity: |dual| times the distance to the nearest
            // bound. A basic variable has exactly zero dual, a nonbasic
            // one zero distance, so the products vanish exactly.
            if dual != 0.0 {
                let dist_l = if is_infinite(lower) {
                    f64::INFINITY
                } else {
                    (value - lower).abs()
                };
                let dist_u = if is_infinite(upper) {
                    f64::INFINITY
                } else {
                    (upper - value).abs()
                };
                let dist = dist_l.min(dist_u);
                let dist = if dist.is_finite() { dist } else { value.abs() };
                let prod = dual.abs() * dist;
                info.sum_complementarity_violations += prod;
                info.max_complementarity_violation =
                    info.max_complementarity_violation.max(prod);
            }
        }
        if basis_ok {
            for j in 0..self.lp.num_col {
                visit_dual(
                    info,
                    s,
                    dual_tol,
                    self.solution.col_dual[j],
                    self.basis.col_status[j],
                    self.solution.col_value[j],
                    self.lp.col_lower[j],
                    self.lp.col_upper[j],
                );
            }
            for i in 0..self.lp.num_row {
                visit_dual(
                    info,
                    s,
                    dual_tol,
                    self.solution.row_dual[i],
                    self.basis.row_status[i],
                    self.solution.row_value[i],
                    self.lp.row_lower[i],
                    self.lp.row_upper[i],
                );
            }
        }
    }
}

fn run_status_of(status: ModelStatus) -> SolverStatus {
    match status {
        ModelStatus::Optimal
        | ModelStatus::Infeasible
        | ModelStatus::Unbounded
        | ModelStatus::UnboundedOrInfeasible
        | ModelStatus::ModelEmpty => SolverStatus::Ok,
        ModelStatus::TimeLimit
        | ModelStatus::IterationLimit
        | ModelStatus::ObjectiveBound
        | ModelStatus::ObjectiveTarget => SolverStatus::Warning,
        _ => SolverStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::INF;

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
    fn test_run_sets_exactly_one_status() {
        let mut solver = Solver::new();
        solver.set_option_value("output_flag", false);
        assert_eq!(solver.pass_model(blending_lp()), SolverStatus::Ok);
        assert_eq!(solver.get_model_status(), ModelStatus::NotSet);
        assert_eq!(solver.run(), SolverStatus::Ok);
        assert_eq!(solver.get_model_status(), ModelStatus::Optimal);
        assert!(solver.get_info().valid);
    }

    #[test]
    fn test_empty_model_is_optimal_at_offset() {
        let mut solver = Solver::new();
        solver.set_option_value("output_flag", false);
        let lp = Lp {
            offset: 2.5,
            ..Lp::default()
        };
        assert_eq!(solver.pass_model(lp), SolverStatus::Ok);
        assert_eq!(solver.run(), SolverStatus::Ok);
        assert_eq!(solver.get_model_status(), ModelStatus::Optimal);
        assert_eq!(solver.get_info().objective_function_value, 2.5);
    }

    #[test]
    fn test_read_model_without_parser_is_load_error() {
        let mut solver = Solver::new();
        assert_eq!(solver.read_model("model.mps"), SolverStatus::Error);
        assert_eq!(solver.get_model_status(), ModelStatus::LoadError);
    }

    #[test]
    fn test_read_model_through_parser() {
        let mut solver = Solver::new();
        solver.set_option_value("output_flag", false);
        solver.set_model_parser(Box::new(|_path| Ok(blending_lp())));
        assert_eq!(solver.read_model("blend.mps"), SolverStatus::Ok);
        assert_eq!(solver.run(), SolverStatus::Ok);
        assert_eq!(solver.get_model_status(), ModelStatus::Optimal);
    }

    #[test]
    fn test_ill_formed_model_rejected_and_emptied() {
        let mut solver = Solver::new();
        let mut lp = blending_lp();
        lp.col_lower[0] = 1.0;
        lp.col_upper[0] = 0.0;
        assert_eq!(solver.pass_model(lp), SolverStatus::Error);
        assert_eq!(solver.get_model_status(), ModelStatus::ModelError);
        assert!(solver.get_lp().is_empty());
    }

    #[test]
    fn test_scale_strategy_change_invalidates_basis() {
        let mut solver = Solver::new();
        solver.set_option_value("output_flag", false);
        solver.pass_model(blending_lp());
        solver.run();
        assert!(solver.get_basis().valid);
        solver.set_option_value("simplex_scale_strategy", 0i64);
        assert!(!solver.get_basis().valid);
    }

    #[test]
    fn test_run_time_accumulates() {
        let mut solver = Solver::new();
        solver.set_option_value("output_flag", false);
        solver.pass_model(blending_lp());
        solver.run();
        let t1 = solver.get_run_time();
        solver.clear_solver();
        solver.run();
        assert!(solver.get_run_time() >= t1);
    }
}
