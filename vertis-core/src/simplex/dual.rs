//! Dual simplex with dual steepest-edge pricing.
//!
//! Phase 1 restores dual feasibility without pivoting: boxed variables
//! are flipped to the bound matching the sign of their reduced cost, and
//! variables with no finite bound on that side receive temporary working
//! bounds. Phase 2 then drives out primal infeasibility with dual
//! pivots. When the optimum of the boxed problem rests on a working
//! bound, the box is enlarged and the solve resumed; persistent growth
//! is reported as dual infeasibility.

use crate::factor::UpdateStatus;
use crate::model::ObjSense;
use crate::options::SimplexStrategy;
use crate::solution::{BasisStatus, SimplexStats};
use crate::status::ModelStatus;

use super::instance::{SimplexInstance, WORKING_BOUND, WORKING_BOUND_LIMIT};
use super::{deadline_exceeded, SimplexControl, SimplexOutcome, SimplexPhase};

const PIVOT_TOL: f64 = 1e-9;
const DSE_WEIGHT_FLOOR: f64 = 1e-4;
const MULTI_CANDIDATES: usize = 8;
const MAX_CONSECUTIVE_UNSTABLE: usize = 3;

/// Run the dual simplex. `strategy` selects plain, parallel-PRICE or
/// multiple-pricing row choice; the pivot algebra is shared.
pub fn solve(
    inst: &mut SimplexInstance,
    ctrl: &SimplexControl,
    stats: &mut SimplexStats,
    strategy: SimplexStrategy,
) -> SimplexOutcome {
    let mut phase = SimplexPhase::Loading;
    log::trace!("dual simplex: {:?}", phase);
    inst.refresh(stats);

    phase = SimplexPhase::PhaseI;
    log::trace!("dual simplex: {:?}", phase);
    feasibilize_duals(inst, ctrl.dual_tol);
    inst.compute_base_values();

    phase = SimplexPhase::PhaseII;
    log::trace!("dual simplex: {:?}", phase);
    let mut iterations: i64 = 0;
    let mut working_bound = WORKING_BOUND;
    let mut candidates: Vec<usize> = Vec::new();
    let mut consecutive_unstable = 0usize;

    let model_status = loop {
        if iterations >= ctrl.iteration_limit {
            break ModelStatus::IterationLimit;
        }
        if deadline_exceeded(ctrl.deadline) {
            break ModelStatus::TimeLimit;
        }
        if ctrl.sense == ObjSense::Minimize
            && !crate::model::is_infinite(ctrl.objective_bound)
            && inst.dual_objective() > ctrl.objective_bound
        {
            break ModelStatus::ObjectiveBound;
        }

        // CHUZR: pick the leaving row.
        let leaving = match strategy {
            SimplexStrategy::DualMulti => {
                choose_row_multi(inst, ctrl.primal_tol, &mut candidates)
            }
            _ => choose_row(inst, ctrl.primal_tol),
        };
        let Some(row) = leaving else {
            // Optimal for the working problem; resolve working bounds.
            let resting = resting_on_working_bounds(inst, ctrl.dual_tol);
            if resting.is_empty() {
                break ModelStatus::Optimal;
            }
            if working_bound >= WORKING_BOUND_LIMIT {
                break ModelStatus::UnboundedOrInfeasible;
            }
            working_bound *= 100.0;
            for var in resting {
                widen_working_bounds(inst, var, working_bound);
            }
            inst.compute_base_values();
            continue;
        };

        let leaving_var = inst.basic_index[row];
        let x = inst.base_value[row];
        // Direction sign: +1 above the upper bound, -1 below the lower.
        let (sign, target) = if x > inst.work_upper[leaving_var] {
            (1.0, inst.work_upper[leaving_var])
        } else {
            (-1.0, inst.work_lower[leaving_var])
        };

        // BTRAN the unit vector of the leaving row.
        let mut rho = vec![0.0; inst.num_row];
        rho[row] = 1.0;
        inst.factor.btran(&mut rho);
        SimplexInstance::record_density(
            &mut stats.row_ep_density,
            count_nonzeros(&rho),
            inst.num_row,
        );

        // PRICE the pivotal row over the nonbasic columns.
        let alpha = price(inst, &rho);
        SimplexInstance::record_density(
            &mut stats.row_ap_density,
            count_nonzeros(&alpha),
            inst.num_tot,
        );

        // Dual ratio test.
        let Some(entering) = dual_ratio_test(inst, &alpha, sign) else {
            break ModelStatus::Infeasible;
        };

        // FTRAN the entering column and the steepest-edge vector.
        let mut col_aq = vec![0.0; inst.num_row];
        for (i, v) in inst.column(entering) {
            col_aq[i] = v;
        }
        inst.factor.ftran(&mut col_aq);
        SimplexInstance::record_density(
            &mut stats.col_aq_density,
            count_nonzeros(&col_aq),
            inst.num_row,
        );
        let mut tau = rho.clone();
        inst.factor.ftran(&mut tau);
        SimplexInstance::record_density(
            &mut stats.row_dse_density,
            count_nonzeros(&tau),
            inst.num_row,
        );

        let pivot = col_aq[row];
        if pivot.abs() <= PIVOT_TOL {
            // The priced row and the FTRAN disagree; the factors are
            // stale. Rebuild and retry the iteration.
            consecutive_unstable += 1;
            if consecutive_unstable > MAX_CONSECUTIVE_UNSTABLE {
                break ModelStatus::SolveError;
            }
            inst.refresh(stats);
            continue;
        }
        if inst.factor.update(&col_aq, row) == UpdateStatus::Unstable {
            consecutive_unstable += 1;
            if consecutive_unstable > MAX_CONSECUTIVE_UNSTABLE {
                break ModelStatus::SolveError;
            }
            inst.refresh(stats);
            continue;
        }
        consecutive_unstable = 0;

        apply_pivot(inst, row, entering, &alpha, &col_aq, &tau, sign, target);
        iterations += 1;
        stats.iteration_count += 1;

        if inst.factor.refactorization_due() {
            inst.refresh(stats);
        }
        if deadline_exceeded(ctrl.deadline) {
            break ModelStatus::TimeLimit;
        }
    };

    phase = SimplexPhase::Finished;
    log::trace!("dual simplex: {:?}", phase);
    // Leave an exact last iterate: refactorize, recompute values and
    // duals from scratch so basic reduced costs are exactly zero and
    // nonbasic variables sit exactly on their bounds.
    inst.refresh(stats);
    log::debug!(
        "dual simplex: {} after {} iterations, dual objective {:.12e}",
        model_status,
        iterations,
        inst.dual_objective()
    );
    SimplexOutcome { model_status, iterations }
}

/// Flip or box every dual-infeasible nonbasic variable.
fn feasibilize_duals(inst: &mut SimplexInstance, dual_tol: f64) {
    for var in 0..inst.num_tot {
        let d = inst.work_dual[var];
        match inst.status[var] {
            BasisStatus::Lower if d < -dual_tol => {
                if crate::model::is_infinite(inst.work_upper[var]) {
                    inst.apply_working_bounds(var, WORKING_BOUND);
                }
                inst.set_nonbasic(var, BasisStatus::Upper);
            }
            BasisStatus::Upper if d > dual_tol => {
                if crate::model::is_infinite(inst.work_lower[var]) {
                    inst.apply_working_bounds(var, WORKING_BOUND);
                }
                inst.set_nonbasic(var, BasisStatus::Lower);
            }
            BasisStatus::Free if d.abs() > dual_tol => {
                inst.apply_working_bounds(var, WORKING_BOUND);
                let side = if d > 0.0 {
                    BasisStatus::Lower
                } else {
                    BasisStatus::Upper
                };
                inst.set_nonbasic(var, side);
            }
            _ => {}
        }
    }
}

/// Plain CHUZR: the row with the largest steepest-edge merit
/// `infeasibility^2 / weight`. Ties take the lowest row.
fn choose_row(inst: &SimplexInstance, primal_tol: f64) -> Option<usize> {
    let mut best_merit = 0.0;
    let mut best_row = None;
    for row in 0..inst.num_row {
        let infeas = inst.row_infeasibility(row);
        if infeas <= primal_tol {
            continue;
        }
        let merit = infeas * infeas / inst.dse_weight[row];
        if merit > best_merit {
            best_merit = merit;
            best_row = Some(row);
        }
    }
    best_row
}

/// Multiple-pricing CHUZR: maintain a candidate set of attractive rows
/// and pick the best within it, refilling from a full scan only when the
/// set is exhausted.
fn choose_row_multi(
    inst: &SimplexInstance,
    primal_tol: f64,
    candidates: &mut Vec<usize>,
) -> Option<usize> {
    loop {
        candidates.retain(|&row| inst.row_infeasibility(row) > primal_tol);
        if let Some(&row) = candidates.iter().max_by(|&&a, &&b| {
            let ma = merit(inst, a);
            let mb = merit(inst, b);
            // Lowest row wins exact ties.
            ma.partial_cmp(&mb)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.cmp(&a))
        }) {
            candidates.retain(|&r| r != row);
            return Some(row);
        }
        // Refill with the most attractive rows of a full scan.
        let mut scored: Vec<(f64, usize)> = (0..inst.num_row)
            .filter(|&row| inst.row_infeasibility(row) > primal_tol)
            .map(|row| (merit(inst, row), row))
            .collect();
        if scored.is_empty() {
            return None;
        }
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });
        scored.truncate(MULTI_CANDIDATES);
        *candidates = scored.into_iter().map(|(_, row)| row).collect();
    }
}

fn merit(inst: &SimplexInstance, row: usize) -> f64 {
    let infeas = inst.row_infeasibility(row);
    infeas * infeas / inst.dse_weight[row]
}

/// PRICE: the pivotal row over all nonbasic columns.
#[cfg(feature = "parallel")]
fn price(inst: &SimplexInstance, rho: &[f64]) -> Vec<f64> {
    use rayon::prelude::*;
    let n = inst.num_col;
    let mut alpha = vec![0.0; inst.num_tot];
    let structural: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|j| {
            if inst.status[j] == BasisStatus::Basic {
                0.0
            } else {
                price_column(inst, j, rho)
            }
        })
        .collect();
    alpha[..n].copy_from_slice(&structural);
    for i in 0..inst.num_row {
        let var = n + i;
        if inst.status[var] != BasisStatus::Basic {
            alpha[var] = -rho[i];
        }
    }
    alpha
}

#[cfg(not(feature = "parallel"))]
fn price(inst: &SimplexInstance, rho: &[f64]) -> Vec<f64> {
    let n = inst.num_col;
    let mut alpha = vec![0.0; inst.num_tot];
    for j in 0..n {
        if inst.status[j] != BasisStatus::Basic {
            alpha[j] = price_column(inst, j, rho);
        }
    }
    for i in 0..inst.num_row {
        let var = n + i;
        if inst.status[var] != BasisStatus::Basic {
            alpha[var] = -rho[i];
        }
    }
    alpha
}

fn price_column(inst: &SimplexInstance, j: usize, rho: &[f64]) -> f64 {
    let mut dot = 0.0;
    if let Some(col) = inst.matrix.outer_view(j) {
        for (i, &v) in col.iter() {
            dot += v * rho[i];
        }
    }
    dot
}

/// Dual ratio test over the signed pivotal row. Returns the entering
/// variable, or `None` when the dual is unbounded (primal infeasible).
///
/// With `sign` encoding the direction of the leaving variable's
/// violation, a nonbasic variable is a candidate when moving it off its
/// bound repairs the violated row: at lower with positive signed entry,
/// at upper with negative, free with either. The entering variable
/// minimizes `d_j / (sign * alpha_j)`, which keeps every other reduced
/// cost dual feasible; ties prefer the larger pivot, then the lower
/// index.
fn dual_ratio_test(inst: &SimplexInstance, alpha: &[f64], sign: f64) -> Option<usize> {
    let mut best: Option<(f64, f64, usize)> = None;
    for var in 0..inst.num_tot {
        let st = inst.status[var];
        if st == BasisStatus::Basic || st == BasisStatus::Fixed {
            continue;
        }
        if inst.work_lower[var] == inst.work_upper[var] {
            continue;
        }
        let a = sign * alpha[var];
        let candidate = match st {
            BasisStatus::Lower => a > PIVOT_TOL,
            BasisStatus::Upper => a < -PIVOT_TOL,
            BasisStatus::Free => a.abs() > PIVOT_TOL,
            _ => false,
        };
        if !candidate {
            continue;
        }
        let ratio = (inst.work_dual[var] / a).max(0.0);
        let better = match best {
            None => true,
            Some((best_ratio, best_abs, best_var)) => {
                ratio < best_ratio - 1e-12
                    || (ratio < best_ratio + 1e-12
                        && (a.abs() > best_abs + 1e-12
                            || (a.abs() > best_abs - 1e-12 && var < best_var)))
            }
        };
        if better {
            best = Some((ratio, a.abs(), var));
        }
    }
    best.map(|(_, _, var)| var)
}

/// Apply one dual pivot: update primal values, reduced costs, the
/// steepest-edge weights and the basis bookkeeping.
#[allow(clippy::too_many_arguments)]
fn apply_pivot(
    inst: &mut SimplexInstance,
    row: usize,
    entering: usize,
    alpha: &[f64],
    col_aq: &[f64],
    tau: &[f64],
    sign: f64,
    target: f64,
) {
    let leaving = inst.basic_index[row];
    let pivot = col_aq[row];
    let x_leaving = inst.base_value[row];

    // Primal step: the entering variable moves until the leaving one
    // lands exactly on its violated bound.
    let delta = x_leaving - target;
    let step = delta / pivot;
    for i in 0..inst.num_row {
        if col_aq[i] != 0.0 {
            inst.base_value[i] -= step * col_aq[i];
        }
    }
    let entering_value = inst.work_value[entering] + step;

    // Dual step: d_j -= mu * alpha_j with mu chosen to zero the entering
    // reduced cost.
    let mu = inst.work_dual[entering] / alpha[entering];
    for var in 0..inst.num_tot {
        if inst.status[var] != BasisStatus::Basic && alpha[var] != 0.0 {
            inst.work_dual[var] -= mu * alpha[var];
        }
    }
    inst.work_dual[entering] = 0.0;

    // Steepest-edge reference weights.
    let w_row = inst.dse_weight[row];
    for i in 0..inst.num_row {
        if i == row || col_aq[i] == 0.0 {
            continue;
        }
        let kappa = col_aq[i] / pivot;
        let updated = inst.dse_weight[i] - kappa * (2.0 * tau[i] - kappa * w_row);
        inst.dse_weight[i] = updated.max(DSE_WEIGHT_FLOOR);
    }
    inst.dse_weight[row] = (w_row / (pivot * pivot)).max(DSE_WEIGHT_FLOOR);

    // Basis bookkeeping: the leaving variable rests exactly on the bound
    // it violated; its reduced cost takes the sign that keeps it dual
    // feasible there.
    let leaving_status = if sign > 0.0 {
        BasisStatus::Upper
    } else {
        BasisStatus::Lower
    };
    inst.set_nonbasic(leaving, leaving_status);
    inst.work_dual[leaving] = -mu;
    inst.status[entering] = BasisStatus::Basic;
    inst.basic_index[row] = entering;
    inst.row_of[entering] = row;
    inst.base_value[row] = entering_value;
    inst.basis_revision += 1;
}

/// Nonbasic variables resting on a temporary working bound with a
/// meaningfully nonzero reduced cost.
fn resting_on_working_bounds(inst: &SimplexInstance, dual_tol: f64) -> Vec<usize> {
    (0..inst.num_tot)
        .filter(|&var| {
            inst.rests_on_working_bound(var) && inst.work_dual[var].abs() > dual_tol
        })
        .collect()
}

/// Enlarge the working box of a variable and move its resting value to
/// the new bound.
fn widen_working_bounds(inst: &mut SimplexInstance, var: usize, magnitude: f64) {
    inst.apply_working_bounds(var, magnitude);
    let st = inst.status[var];
    inst.set_nonbasic(var, st);
}

fn count_nonzeros(v: &[f64]) -> usize {
    v.iter().filter(|x| x.abs() > 1e-14).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lp, ObjSense, INF};
    use crate::simplex::SimplexControl;

    fn control(sense: ObjSense) -> SimplexControl {
        SimplexControl {
            iteration_limit: i64::MAX,
            deadline: None,
            objective_bound: INF,
            objective_target: -INF,
            sense,
            primal_tol: 1e-7,
            dual_tol: 1e-7,
        }
    }

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
    fn test_dual_solves_blending() {
        let lp = blending_lp();
        let mut inst = SimplexInstance::build(&lp, 1);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        let outcome = solve(
            &mut inst,
            &control(ObjSense::Minimize),
            &mut stats,
            SimplexStrategy::DualPlain,
        );
        assert_eq!(outcome.model_status, ModelStatus::Optimal);
        let (basis, solution) = inst.extract(&lp);
        assert!(basis.validate(&lp).is_ok());
        // Optimum at x = (60, 0): objective -480.
        assert!((solution.objective_value - -480.0).abs() < 1e-6);
        assert!((solution.col_value[0] - 60.0).abs() < 1e-6);
        assert!(solution.col_value[1].abs() < 1e-6);
    }

    #[test]
    fn test_zero_iteration_limit() {
        let lp = blending_lp();
        let mut inst = SimplexInstance::build(&lp, 1);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        let mut ctrl = control(ObjSense::Minimize);
        ctrl.iteration_limit = 0;
        let outcome = solve(&mut inst, &ctrl, &mut stats, SimplexStrategy::DualPlain);
        assert_eq!(outcome.model_status, ModelStatus::IterationLimit);
        assert_eq!(outcome.iterations, 0);
    }

    #[test]
    fn test_infeasible_lp_detected() {
        // x >= 2 with row x <= 1.
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![1.0],
            vec![2.0],
            vec![INF],
            vec![-INF],
            vec![1.0],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        let mut inst = SimplexInstance::build(&lp, 0);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        let outcome = solve(
            &mut inst,
            &control(ObjSense::Minimize),
            &mut stats,
            SimplexStrategy::DualPlain,
        );
        assert_eq!(outcome.model_status, ModelStatus::Infeasible);
    }

    #[test]
    fn test_unbounded_direction_reported() {
        // min -x, x >= 0, no binding row: dual infeasible.
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![-1.0],
            vec![0.0],
            vec![INF],
            vec![-INF],
            vec![INF],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        let mut inst = SimplexInstance::build(&lp, 0);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        let outcome = solve(
            &mut inst,
            &control(ObjSense::Minimize),
            &mut stats,
            SimplexStrategy::DualPlain,
        );
        assert_eq!(outcome.model_status, ModelStatus::UnboundedOrInfeasible);
    }
}
