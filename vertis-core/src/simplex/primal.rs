//! Two-phase primal simplex.
//!
//! Phase 1 minimizes the sum of primal infeasibilities with the classic
//! composite gradient (phase-1 cost -1/+1 on basic variables outside
//! their bounds); phase 2 prices the true costs. Both phases share the
//! ratio test, which also handles bound flips of the entering variable.

use crate::factor::UpdateStatus;
use crate::model::{is_infinite, ObjSense};
use crate::solution::{BasisStatus, SimplexStats};
use crate::status::ModelStatus;

use super::instance::SimplexInstance;
use super::{deadline_exceeded, SimplexControl, SimplexOutcome, SimplexPhase};

const PIVOT_TOL: f64 = 1e-9;
const MAX_CONSECUTIVE_UNSTABLE: usize = 3;

enum Block {
    /// Blocked by the basic variable of a row reaching a bound.
    Row { row: usize, at_upper: bool, step: f64 },
    /// Blocked by the entering variable reaching its opposite bound.
    OwnBound { step: f64 },
    /// No blocking bound in the chosen direction.
    Unbounded,
}

/// Run the two-phase primal simplex on a prepared instance.
pub fn solve(
    inst: &mut SimplexInstance,
    ctrl: &SimplexControl,
    stats: &mut SimplexStats,
) -> SimplexOutcome {
    let mut phase = SimplexPhase::Loading;
    log::trace!("primal simplex: {:?}", phase);
    inst.refresh(stats);

    let mut iterations: i64 = 0;
    let mut consecutive_unstable = 0usize;

    let model_status = loop {
        if iterations >= ctrl.iteration_limit {
            break ModelStatus::IterationLimit;
        }
        if deadline_exceeded(ctrl.deadline) {
            break ModelStatus::TimeLimit;
        }

        let infeasible = inst.max_primal_infeasibility() > ctrl.primal_tol;
        let next_phase = if infeasible {
            SimplexPhase::PhaseI
        } else {
            SimplexPhase::PhaseII
        };
        if next_phase != phase {
            phase = next_phase;
            log::trace!("primal simplex: {:?}", phase);
        }

        if !infeasible
            && ctrl.sense == ObjSense::Maximize
            && !is_infinite(ctrl.objective_target)
            && inst.current_objective() > ctrl.objective_target
        {
            break ModelStatus::ObjectiveTarget;
        }

        // CHUZC: entering variable and direction for the active costs.
        let entering = if infeasible {
            phase1_entering(inst, ctrl.dual_tol)
        } else {
            inst.compute_duals();
            phase2_entering(inst, ctrl.dual_tol)
        };
        let Some((q, dir)) = entering else {
            break if infeasible {
                ModelStatus::Infeasible
            } else {
                ModelStatus::Optimal
            };
        };

        // FTRAN the entering column.
        let mut col_aq = vec![0.0; inst.num_row];
        for (i, v) in inst.column(q) {
            col_aq[i] = v;
        }
        inst.factor.ftran(&mut col_aq);
        SimplexInstance::record_density(
            &mut stats.col_aq_density,
            col_aq.iter().filter(|v| v.abs() > 1e-14).count(),
            inst.num_row,
        );

        match ratio_test(inst, q, dir, &col_aq) {
            Block::Row { row, at_upper, step } => {
                if inst.factor.update(&col_aq, row) == UpdateStatus::Unstable {
                    consecutive_unstable += 1;
                    if consecutive_unstable > MAX_CONSECUTIVE_UNSTABLE {
                        break ModelStatus::SolveError;
                    }
                    inst.refresh(stats);
                    continue;
                }
                consecutive_unstable = 0;
                apply_pivot(inst, q, dir, row, at_upper, step, &col_aq);
                iterations += 1;
                stats.iteration_count += 1;
                if inst.factor.refactorization_due() {
                    inst.refresh(stats);
                }
            }
            Block::OwnBound { step } => {
                apply_bound_flip(inst, q, dir, step, &col_aq);
                iterations += 1;
                stats.iteration_count += 1;
            }
            Block::Unbounded => {
                break if infeasible {
                    // The infeasibility sum is bounded below; an unblocked
                    // descent direction means the factors are wrong.
                    ModelStatus::SolveError
                } else {
                    ModelStatus::Unbounded
                };
            }
        }
    };

    phase = SimplexPhase::Finished;
    log::trace!("primal simplex: {:?}", phase);
    inst.refresh(stats);
    log::debug!(
        "primal simplex: {} after {} iterations, objective {:.12e}",
        model_status,
        iterations,
        inst.current_objective()
    );
    SimplexOutcome { model_status, iterations }
}

/// Phase-1 pricing: gradient of the infeasibility sum. Returns the
/// entering variable and its movement direction.
fn phase1_entering(inst: &mut SimplexInstance, dual_tol: f64) -> Option<(usize, f64)> {
    let mut gradient = vec![0.0; inst.num_row];
    for row in 0..inst.num_row {
        let var = inst.basic_index[row];
        let x = inst.base_value[row];
        if x < inst.work_lower[var] {
            gradient[row] = -1.0;
        } else if x > inst.work_upper[var] {
            gradient[row] = 1.0;
        }
    }
    inst.factor.btran(&mut gradient);

    let mut best: Option<(f64, usize, f64)> = None;
    for var in 0..inst.num_tot {
        let st = inst.status[var];
        if st == BasisStatus::Basic || st == BasisStatus::Fixed {
            continue;
        }
        // Phase-1 reduced cost: derivative of the infeasibility sum with
        // respect to increasing this variable.
        let d1 = -dot_column(inst, var, &gradient);
        let (attractive, dir) = match st {
            BasisStatus::Lower => (d1 < -dual_tol, 1.0),
            BasisStatus::Upper => (d1 > dual_tol, -1.0),
            BasisStatus::Free => (d1.abs() > dual_tol, -d1.signum()),
            _ => (false, 0.0),
        };
        if !attractive {
            continue;
        }
        let magnitude = d1.abs();
        let better = match best {
            None => true,
            Some((bm, bv, _)) => magnitude > bm + 1e-12 || (magnitude > bm - 1e-12 && var < bv),
        };
        if better {
            best = Some((magnitude, var, dir));
        }
    }
    best.map(|(_, var, dir)| (var, dir))
}

/// Phase-2 pricing: Dantzig rule on the true reduced costs, which
/// `compute_duals` has just refreshed.
fn phase2_entering(inst: &SimplexInstance, dual_tol: f64) -> Option<(usize, f64)> {
    let mut best: Option<(f64, usize, f64)> = None;
    for var in 0..inst.num_tot {
        let st = inst.status[var];
        if st == BasisStatus::Basic || st == BasisStatus::Fixed {
            continue;
        }
        let d = inst.work_dual[var];
        let (attractive, dir) = match st {
            BasisStatus::Lower => (d < -dual_tol, 1.0),
            BasisStatus::Upper => (d > dual_tol, -1.0),
            BasisStatus::Free => (d.abs() > dual_tol, -d.signum()),
            _ => (false, 0.0),
        };
        if !attractive {
            continue;
        }
        let magnitude = d.abs();
        let better = match best {
            None => true,
            Some((bm, bv, _)) => magnitude > bm + 1e-12 || (magnitude > bm - 1e-12 && var < bv),
        };
        if better {
            best = Some((magnitude, var, dir));
        }
    }
    best.map(|(_, var, dir)| (var, dir))
}

fn dot_column(inst: &SimplexInstance, var: usize, y: &[f64]) -> f64 {
    if var < inst.num_col {
        let mut dot = 0.0;
        if let Some(col) = inst.matrix.outer_view(var) {
            for (i, &v) in col.iter() {
                dot += v * y[i];
            }
        }
        dot
    } else {
        -y[var - inst.num_col]
    }
}

/// Ratio test for a step of the entering variable in direction `dir`.
///
/// A basic variable rising toward a violated lower bound (or falling
/// toward a violated upper bound) blocks at that bound, which is how
/// phase 1 retires infeasibilities one pivot at a time. Ties prefer the
/// larger pivot magnitude, then the lower row.
fn ratio_test(inst: &SimplexInstance, q: usize, dir: f64, col_aq: &[f64]) -> Block {
    let mut best: Option<(f64, f64, usize, bool)> = None;
    for row in 0..inst.num_row {
        let slope = -dir * col_aq[row];
        if slope.abs() <= PIVOT_TOL {
            continue;
        }
        let var = inst.basic_index[row];
        let x = inst.base_value[row];
        let lower = inst.work_lower[var];
        let upper = inst.work_upper[var];
        let (bound, at_upper) = if slope > 0.0 {
            if x < lower {
                (lower, false)
            } else if !is_infinite(upper) {
                (upper, true)
            } else {
                continue;
            }
        } else if x > upper {
            (upper, true)
        } else if !is_infinite(lower) {
            (lower, false)
        } else {
            continue;
        };
        let step = ((bound - x) / slope).max(0.0);
        let better = match best {
            None => true,
            Some((bs, babs, brow, _)) => {
                step < bs - 1e-12
                    || (step < bs + 1e-12
                        && (slope.abs() > babs + 1e-12
                            || (slope.abs() > babs - 1e-12 && row < brow)))
            }
        };
        if better {
            best = Some((step, slope.abs(), row, at_upper));
        }
    }

    let own_range = inst.work_upper[q] - inst.work_lower[q];
    let own_step = if is_infinite(inst.work_upper[q]) || is_infinite(inst.work_lower[q]) {
        f64::INFINITY
    } else {
        own_range
    };

    match best {
        Some((step, _, row, at_upper)) if step <= own_step => {
            Block::Row { row, at_upper, step }
        }
        _ if own_step.is_finite() => Block::OwnBound { step: own_step },
        _ => Block::Unbounded,
    }
}

fn apply_pivot(
    inst: &mut SimplexInstance,
    q: usize,
    dir: f64,
    row: usize,
    at_upper: bool,
    step: f64,
    col_aq: &[f64],
) {
    let leaving = inst.basic_index[row];
    for i in 0..inst.num_row {
        if col_aq[i] != 0.0 {
            inst.base_value[i] -= dir * step * col_aq[i];
        }
    }
    let entering_value = inst.work_value[q] + dir * step;
    let leaving_status = if at_upper {
        BasisStatus::Upper
    } else {
        BasisStatus::Lower
    };
    inst.set_nonbasic(leaving, leaving_status);
    inst.status[q] = BasisStatus::Basic;
    inst.basic_index[row] = q;
    inst.row_of[q] = row;
    inst.base_value[row] = entering_value;
    inst.basis_revision += 1;
}

fn apply_bound_flip(
    inst: &mut SimplexInstance,
    q: usize,
    dir: f64,
    step: f64,
    col_aq: &[f64],
) {
    for i in 0..inst.num_row {
        if col_aq[i] != 0.0 {
            inst.base_value[i] -= dir * step * col_aq[i];
        }
    }
    let flipped = if dir > 0.0 {
        BasisStatus::Upper
    } else {
        BasisStatus::Lower
    };
    inst.set_nonbasic(q, flipped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lp, ObjSense, INF};
    use crate::options::SimplexStrategy;
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

    fn run_primal(lp: &Lp) -> (ModelStatus, SimplexInstance) {
        let mut inst = SimplexInstance::build(lp, 1);
        let mut stats = SimplexStats::default();
        inst.install_logical_basis();
        let outcome = super::super::run(
            &mut inst,
            &control(lp.sense),
            &mut stats,
            SimplexStrategy::Primal,
        );
        (outcome.model_status, inst)
    }

    #[test]
    fn test_primal_solves_blending() {
        let lp = Lp::from_column_arrays(
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
        .unwrap();
        let (status, inst) = run_primal(&lp);
        assert_eq!(status, ModelStatus::Optimal);
        let (_, solution) = inst.extract(&lp);
        assert!((solution.objective_value - -480.0).abs() < 1e-6);
    }

    #[test]
    fn test_primal_phase1_feasibilizes() {
        // x in [2, 5], row 3 <= x <= 4: logical basis starts infeasible.
        let lp = Lp::from_column_arrays(
            1,
            1,
            ObjSense::Minimize,
            0.0,
            vec![1.0],
            vec![2.0],
            vec![5.0],
            vec![3.0],
            vec![4.0],
            &[0, 1],
            &[0],
            &[1.0],
        )
        .unwrap();
        let (status, inst) = run_primal(&lp);
        assert_eq!(status, ModelStatus::Optimal);
        let (_, solution) = inst.extract(&lp);
        assert!((solution.col_value[0] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_primal_detects_unbounded() {
        // min -x, 0 <= x, row free.
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
        let (status, _) = run_primal(&lp);
        assert_eq!(status, ModelStatus::Unbounded);
    }

    #[test]
    fn test_primal_detects_infeasible() {
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
        let (status, _) = run_primal(&lp);
        assert_eq!(status, ModelStatus::Infeasible);
    }
}
