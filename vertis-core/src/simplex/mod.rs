//! Revised simplex engine.
//!
//! The engine owns no model data: the orchestrator hands it a working
//! [`SimplexInstance`] plus a [`SimplexControl`] with the active budgets,
//! and receives back a [`SimplexOutcome`]. Pivot strategies share the
//! instance machinery; `DualPlain`, `DualTasks` and `DualMulti` run the
//! dual simplex with dual steepest-edge pricing, `Primal` the two-phase
//! primal simplex.
//!
//! Internally a run moves through `Idle -> Loading -> PhaseI -> PhaseII
//! -> Finished`; any budget trip jumps straight to `Finished` with the
//! matching model status.

pub mod dual;
pub mod instance;
pub mod primal;

use std::time::Instant;

use crate::model::ObjSense;
use crate::options::SimplexStrategy;
use crate::solution::SimplexStats;
use crate::status::ModelStatus;
use instance::SimplexInstance;

/// Budgets and termination controls for one simplex run.
#[derive(Debug, Clone)]
pub struct SimplexControl {
    /// Pivot budget for this run; zero means no pivots at all.
    pub iteration_limit: i64,
    /// Wall-clock deadline, checked at every pivot and every INVERT.
    pub deadline: Option<Instant>,
    /// Dual objective upper bound; active for minimization only.
    pub objective_bound: f64,
    /// Primal objective target; active for maximization only.
    pub objective_target: f64,
    /// Objective sense of the model being solved.
    pub sense: ObjSense,
    /// Primal feasibility tolerance.
    pub primal_tol: f64,
    /// Dual feasibility tolerance.
    pub dual_tol: f64,
}

/// Result of one simplex run.
#[derive(Debug, Clone, Copy)]
pub struct SimplexOutcome {
    /// Terminal status of the run.
    pub model_status: ModelStatus,
    /// Pivots performed by the run.
    pub iterations: i64,
}

/// Engine-internal state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimplexPhase {
    /// No work started.
    Idle,
    /// Factorizing and computing the starting point.
    Loading,
    /// Restoring dual feasibility.
    PhaseI,
    /// Driving out primal infeasibility.
    PhaseII,
    /// Terminal.
    Finished,
}

/// Run the simplex engine with the given strategy on a prepared
/// instance. `Choose` resolves to dual plain; `DualTasks` falls back to
/// dual plain when the parallel runtime is not built in.
pub fn run(
    inst: &mut SimplexInstance,
    ctrl: &SimplexControl,
    stats: &mut SimplexStats,
    strategy: SimplexStrategy,
) -> SimplexOutcome {
    let strategy = effective_strategy(strategy);
    log::debug!(
        "simplex: strategy {:?}, {} rows, {} cols, limit {}",
        strategy,
        inst.num_row,
        inst.num_col,
        ctrl.iteration_limit
    );
    match strategy {
        SimplexStrategy::Primal => primal::solve(inst, ctrl, stats),
        _ => dual::solve(inst, ctrl, stats, strategy),
    }
}

/// Resolve `Choose` and unavailable strategies to what actually runs.
pub fn effective_strategy(strategy: SimplexStrategy) -> SimplexStrategy {
    match strategy {
        SimplexStrategy::Choose => SimplexStrategy::DualPlain,
        #[cfg(not(feature = "parallel"))]
        SimplexStrategy::DualTasks => SimplexStrategy::DualPlain,
        other => other,
    }
}

/// True when the deadline has passed.
pub fn deadline_exceeded(deadline: Option<Instant>) -> bool {
    match deadline {
        Some(t) => Instant::now() >= t,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_resolves_to_dual_plain() {
        assert_eq!(
            effective_strategy(SimplexStrategy::Choose),
            SimplexStrategy::DualPlain
        );
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_tasks_available_with_parallel_runtime() {
        assert_eq!(
            effective_strategy(SimplexStrategy::DualTasks),
            SimplexStrategy::DualTasks
        );
    }
}
