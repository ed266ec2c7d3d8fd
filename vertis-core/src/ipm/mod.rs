//! Interior-point engine with crossover.
//!
//! The LP is rewritten into standard form (`min c'y, A'y = b', y >= 0`)
//! and solved with a Mehrotra predictor-corrector method whose KKT
//! systems are reduced to normal equations. On convergence the interior
//! point is handed to the crossover, which crashes a basis from the
//! interior magnitudes, repairs it through the factorization kernel and
//! cleans up with simplex pivots; the cleanup pivots are what the
//! crossover iteration count reports.

pub mod crossover;
pub mod solve;

use std::time::Instant;

use crate::model::Lp;
use crate::solution::{Basis, SimplexStats, Solution};
use crate::standard_form;
use crate::status::ModelStatus;

use solve::{mehrotra, IpmStatus};

/// Budgets and tolerances for one IPM run.
#[derive(Debug, Clone)]
pub struct IpmControl {
    /// Interior-point iteration budget.
    pub iteration_limit: i64,
    /// Wall-clock deadline shared with the crossover.
    pub deadline: Option<Instant>,
    /// Primal feasibility tolerance.
    pub primal_tol: f64,
    /// Dual feasibility tolerance.
    pub dual_tol: f64,
}

/// Result of one IPM + crossover run.
#[derive(Debug, Clone)]
pub struct IpmOutcome {
    /// Terminal status.
    pub model_status: ModelStatus,
    /// Interior-point iterations performed.
    pub ipm_iterations: i64,
    /// Crossover cleanup pivots performed.
    pub crossover_iterations: i64,
    /// Vertex basis and solution; present on success.
    pub result: Option<(Basis, Solution)>,
}

/// Solve an LP with the interior-point method and cross over to a
/// basic solution.
pub fn run(lp: &Lp, ctrl: &IpmControl, stats: &mut SimplexStats) -> IpmOutcome {
    let sf = standard_form::build(lp);
    log::debug!(
        "ipm: standard form {} rows, {} cols, {} nonzeros",
        sf.num_row,
        sf.num_col,
        sf.num_nz()
    );
    let interior = mehrotra(&sf, ctrl);
    let ipm_iterations = interior.iterations;
    match interior.status {
        IpmStatus::Converged => {}
        IpmStatus::IterationLimit => {
            return IpmOutcome {
                model_status: ModelStatus::IterationLimit,
                ipm_iterations,
                crossover_iterations: 0,
                result: None,
            };
        }
        IpmStatus::TimeLimit => {
            return IpmOutcome {
                model_status: ModelStatus::TimeLimit,
                ipm_iterations,
                crossover_iterations: 0,
                result: None,
            };
        }
        IpmStatus::DualInfeasible => {
            return IpmOutcome {
                model_status: ModelStatus::UnboundedOrInfeasible,
                ipm_iterations,
                crossover_iterations: 0,
                result: None,
            };
        }
        IpmStatus::NumericalError => {
            return IpmOutcome {
                model_status: ModelStatus::SolveError,
                ipm_iterations,
                crossover_iterations: 0,
                result: None,
            };
        }
    }

    // Map the interior point back onto the model space and cross over.
    let col_value = sf.recover_col_values(lp, &interior.x);
    let (model_status, crossover_iterations, basis, solution) =
        crossover::run(lp, &col_value, ctrl, stats);
    log::debug!(
        "ipm: {} after {} interior and {} crossover iterations",
        model_status,
        ipm_iterations,
        crossover_iterations
    );
    IpmOutcome {
        model_status,
        ipm_iterations,
        crossover_iterations,
        result: Some((basis, solution)),
    }
}
