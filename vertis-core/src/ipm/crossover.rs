//! Crossover from an interior point to a vertex basis.
//!
//! Variables within tolerance of a bound are snapped nonbasic onto it;
//! the most interior of the remaining variables crash the basis, which
//! the factorization kernel repairs if the chosen columns are
//! dependent. Simplex cleanup pivots then restore exact primal and dual
//! feasibility; those pivots are the reported crossover iterations.

use std::time::Instant;

use crate::model::{is_infinite, Lp, INF};
use crate::simplex::instance::SimplexInstance;
use crate::simplex::{primal, SimplexControl};
use crate::solution::{Basis, BasisStatus, SimplexStats, Solution};
use crate::status::ModelStatus;

use super::IpmControl;

const SNAP_TOL: f64 = 1e-6;

/// Build a basis from the interior column values and clean it up to a
/// vertex. Returns the terminal status, the cleanup pivot count, and
/// the extracted basis and solution.
pub fn run(
    lp: &Lp,
    col_value: &[f64],
    ctrl: &IpmControl,
    stats: &mut SimplexStats,
) -> (ModelStatus, i64, Basis, Solution) {
    // Scaling is left off: the crash works with the interior magnitudes
    // of the original space.
    let mut inst = SimplexInstance::build(lp, 0);
    crash_basis(&mut inst, lp, col_value);
    let cleanup = SimplexControl {
        iteration_limit: i64::MAX,
        deadline: ctrl.deadline,
        objective_bound: INF,
        objective_target: -INF,
        sense: lp.sense,
        primal_tol: ctrl.primal_tol,
        dual_tol: ctrl.dual_tol,
    };
    let started = Instant::now();
    let outcome = primal::solve(&mut inst, &cleanup, stats);
    log::debug!(
        "crossover: {} cleanup pivots in {:.3}s",
        outcome.iterations,
        started.elapsed().as_secs_f64()
    );
    let (basis, solution) = inst.extract(lp);
    (outcome.model_status, outcome.iterations, basis, solution)
}

/// Choose initial statuses from the interior point: near-bound variables
/// rest on their bound, and the most interior variables fill the basis.
fn crash_basis(inst: &mut SimplexInstance, lp: &Lp, col_value: &[f64]) {
    let n = lp.num_col;
    let m = lp.num_row;
    let row_value = lp.row_activity(col_value);

    // Interiorness score per variable; None means snapped to a bound.
    let mut score = vec![None; n + m];
    let mut snapped = vec![BasisStatus::Free; n + m];
    for var in 0..(n + m) {
        let (value, lower, upper) = if var < n {
            (col_value[var], lp.col_lower[var], lp.col_upper[var])
        } else {
            (
                row_value[var - n],
                lp.row_lower[var - n],
                lp.row_upper[var - n],
            )
        };
        if lower == upper {
            snapped[var] = BasisStatus::Fixed;
            continue;
        }
        let dist_l = if is_infinite(lower) {
            f64::INFINITY
        } else {
            value - lower
        };
        let dist_u = if is_infinite(upper) {
            f64::INFINITY
        } else {
            upper - value
        };
        let near = dist_l.min(dist_u);
        if near < SNAP_TOL * (1.0 + value.abs()) {
            snapped[var] = if dist_l <= dist_u {
                BasisStatus::Lower
            } else {
                BasisStatus::Upper
            };
        } else {
            score[var] = Some(near.min(1e20));
            snapped[var] = if !is_infinite(lower) {
                BasisStatus::Lower
            } else if !is_infinite(upper) {
                BasisStatus::Upper
            } else {
                BasisStatus::Free
            };
        }
    }

    // Most interior first; lowest index on ties.
    let mut candidates: Vec<(f64, usize)> = score
        .iter()
        .enumerate()
        .filter_map(|(var, s)| s.map(|v| (v, var)))
        .collect();
    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    let mut is_basic = vec![false; n + m];
    let mut num_basic = 0;
    for &(_, var) in candidates.iter() {
        if num_basic == m {
            break;
        }
        is_basic[var] = true;
        num_basic += 1;
    }
    // Pad with logicals when the interior names fewer than m basics.
    for i in 0..m {
        if num_basic == m {
            break;
        }
        let var = n + i;
        if !is_basic[var] {
            is_basic[var] = true;
            num_basic += 1;
        }
    }

    let mut basis = Basis {
        valid: true,
        col_status: Vec::with_capacity(n),
        row_status: Vec::with_capacity(m),
        revision: 0,
    };
    for var in 0..(n + m) {
        let st = if is_basic[var] {
            BasisStatus::Basic
        } else {
            snapped[var]
        };
        if var < n {
            basis.col_status.push(st);
        } else {
            basis.row_status.push(st);
        }
    }
    inst.install_basis(&basis);
    // The crash columns may be dependent; INVERT repairs with logicals.
    let mut scratch = SimplexStats::default();
    inst.reinvert(&mut scratch);
    inst.compute_base_values();
    inst.compute_duals();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjSense;

    #[test]
    fn test_crossover_reaches_vertex() {
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
        // A slightly perturbed interior rendition of the optimum (60, 0).
        let interior = vec![59.999999, 1e-7];
        let ctrl = IpmControl {
            iteration_limit: 100,
            deadline: None,
            primal_tol: 1e-7,
            dual_tol: 1e-7,
        };
        let mut stats = SimplexStats::default();
        let (status, _iters, basis, solution) = run(&lp, &interior, &ctrl, &mut stats);
        assert_eq!(status, ModelStatus::Optimal);
        assert!(basis.validate(&lp).is_ok());
        assert!((solution.objective_value - -480.0).abs() < 1e-6);
        // Every nonbasic variable sits exactly on a bound.
        for (j, st) in basis.col_status.iter().enumerate() {
            if *st == BasisStatus::Lower {
                assert_eq!(solution.col_value[j], lp.col_lower[j]);
            }
        }
    }
}
