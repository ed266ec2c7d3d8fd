//! Solver options.
//!
//! Options are held in a typed struct with an explicitly declared
//! string-key schema on top: every key is matched by name, type-checked
//! and range-checked before anything is written, so a rejected call
//! leaves the table untouched.

use crate::error::{VertisError, VertisResult};
use crate::model::INF;

/// Engine requested by the `solver` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SolverChoice {
    /// Let the orchestrator pick (simplex in practice).
    #[default]
    Choose,
    /// Revised simplex.
    Simplex,
    /// Interior point with crossover.
    Ipm,
}

/// Simplex pivot strategy, selected by the `simplex_strategy` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimplexStrategy {
    /// Implementation-defined default (dual plain).
    #[default]
    Choose,
    /// Serial dual simplex.
    DualPlain,
    /// Dual simplex with parallel PRICE. Silently falls back to
    /// [`SimplexStrategy::DualPlain`] when no parallel runtime is built in.
    DualTasks,
    /// Dual simplex with multiple pricing.
    DualMulti,
    /// Two-phase primal simplex.
    Primal,
}

impl SimplexStrategy {
    /// Decode the integer form used by the option table.
    pub fn from_int(v: i64) -> Option<Self> {
        match v {
            0 => Some(SimplexStrategy::Choose),
            1 => Some(SimplexStrategy::DualPlain),
            2 => Some(SimplexStrategy::DualTasks),
            3 => Some(SimplexStrategy::DualMulti),
            4 => Some(SimplexStrategy::Primal),
            _ => None,
        }
    }

    /// Integer form used by the option table.
    pub fn as_int(self) -> i64 {
        match self {
            SimplexStrategy::Choose => 0,
            SimplexStrategy::DualPlain => 1,
            SimplexStrategy::DualTasks => 2,
            SimplexStrategy::DualMulti => 3,
            SimplexStrategy::Primal => 4,
        }
    }
}

/// Presolve mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresolveMode {
    /// Presolve unless a warm basis makes it pointless.
    #[default]
    Choose,
    /// Always presolve.
    On,
    /// Never presolve.
    Off,
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// Boolean option.
    Bool(bool),
    /// Integer option.
    Int(i64),
    /// Floating-point option.
    Double(f64),
    /// String option.
    Str(String),
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}
impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}
impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(v as i64)
    }
}
impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Double(v)
    }
}
impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

/// The option table.
#[derive(Debug, Clone)]
pub struct Options {
    /// Engine selection: `"simplex"`, `"ipm"`, `"choose"`.
    pub solver: SolverChoice,
    /// Pivot strategy for the simplex engine.
    pub simplex_strategy: SimplexStrategy,
    /// Presolve mode: `"on"`, `"off"`, `"choose"`.
    pub presolve: PresolveMode,
    /// Scaling strategy; 0 disables scaling, 1..=4 select equilibration
    /// intensities.
    pub simplex_scale_strategy: i64,
    /// Iteration budget for one simplex run.
    pub simplex_iteration_limit: i64,
    /// Iteration budget for one IPM run.
    pub ipm_iteration_limit: i64,
    /// Wall-clock limit in seconds for one run.
    pub time_limit: f64,
    /// Upper bound on the dual objective (minimization only).
    pub objective_bound: f64,
    /// Target for the primal objective (maximization only).
    pub objective_target: f64,
    /// Reuse the incumbent basis when one is available.
    pub use_warm_start: bool,
    /// Emit run reporting through the log channel.
    pub output_flag: bool,
    /// Primal feasibility tolerance.
    pub primal_feasibility_tolerance: f64,
    /// Dual feasibility tolerance.
    pub dual_feasibility_tolerance: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            solver: SolverChoice::Choose,
            simplex_strategy: SimplexStrategy::Choose,
            presolve: PresolveMode::Choose,
            simplex_scale_strategy: 1,
            simplex_iteration_limit: 10_000_000,
            ipm_iteration_limit: 300,
            time_limit: INF,
            objective_bound: INF,
            objective_target: -INF,
            use_warm_start: true,
            output_flag: true,
            primal_feasibility_tolerance: 1e-7,
            dual_feasibility_tolerance: 1e-7,
        }
    }
}

impl Options {
    /// Set an option by key. Type and range are checked before any write;
    /// on error the table is unchanged.
    pub fn set(&mut self, key: &str, value: OptionValue) -> VertisResult<()> {
        match key {
            "solver" => {
                let s = expect_str(key, &value)?;
                self.solver = match s.as_str() {
                    "simplex" => SolverChoice::Simplex,
                    "ipm" => SolverChoice::Ipm,
                    "choose" => SolverChoice::Choose,
                    other => {
                        return Err(VertisError::Options(format!(
                            "value \"{other}\" is not legal for solver"
                        )))
                    }
                };
            }
            "simplex_strategy" => {
                let v = expect_int(key, &value)?;
                self.simplex_strategy = SimplexStrategy::from_int(v).ok_or_else(|| {
                    VertisError::Options(format!("value {v} is not legal for simplex_strategy"))
                })?;
            }
            "presolve" => {
                let s = expect_str(key, &value)?;
                self.presolve = match s.as_str() {
                    "on" => PresolveMode::On,
                    "off" => PresolveMode::Off,
                    "choose" => PresolveMode::Choose,
                    other => {
                        return Err(VertisError::Options(format!(
                            "value \"{other}\" is not legal for presolve"
                        )))
                    }
                };
            }
            "simplex_scale_strategy" => {
                let v = expect_int(key, &value)?;
                if !(0..=4).contains(&v) {
                    return Err(VertisError::Options(format!(
                        "value {v} outside [0, 4] for simplex_scale_strategy"
                    )));
                }
                self.simplex_scale_strategy = v;
            }
            "simplex_iteration_limit" => {
                let v = expect_int(key, &value)?;
                if v < 0 {
                    return Err(VertisError::Options(format!(
                        "value {v} is negative for simplex_iteration_limit"
                    )));
                }
                self.simplex_iteration_limit = v;
            }
            "ipm_iteration_limit" => {
                let v = expect_int(key, &value)?;
                if v < 0 {
                    return Err(VertisError::Options(format!(
                        "value {v} is negative for ipm_iteration_limit"
                    )));
                }
                self.ipm_iteration_limit = v;
            }
            "time_limit" => {
                let v = expect_double(key, &value)?;
                if !(v > 0.0) {
                    return Err(VertisError::Options(format!(
                        "value {v} is not positive for time_limit"
                    )));
                }
                self.time_limit = v;
            }
            "objective_bound" => {
                let v = expect_double(key, &value)?;
                if v.is_nan() {
                    return Err(VertisError::Options("objective_bound is NaN".to_string()));
                }
                self.objective_bound = v;
            }
            "objective_target" => {
                let v = expect_double(key, &value)?;
                if v.is_nan() {
                    return Err(VertisError::Options("objective_target is NaN".to_string()));
                }
                self.objective_target = v;
            }
            "use_warm_start" => self.use_warm_start = expect_bool(key, &value)?,
            "output_flag" => self.output_flag = expect_bool(key, &value)?,
            "primal_feasibility_tolerance" => {
                let v = expect_double(key, &value)?;
                if !(v >= 1e-10) {
                    return Err(VertisError::Options(format!(
                        "value {v} below 1e-10 for primal_feasibility_tolerance"
                    )));
                }
                self.primal_feasibility_tolerance = v;
            }
            "dual_feasibility_tolerance" => {
                let v = expect_double(key, &value)?;
                if !(v >= 1e-10) {
                    return Err(VertisError::Options(format!(
                        "value {v} below 1e-10 for dual_feasibility_tolerance"
                    )));
                }
                self.dual_feasibility_tolerance = v;
            }
            other => {
                return Err(VertisError::Options(format!("unknown option \"{other}\"")));
            }
        }
        Ok(())
    }

    /// Read an option by key. Never mutates.
    pub fn get(&self, key: &str) -> VertisResult<OptionValue> {
        let value = match key {
            "solver" => OptionValue::Str(
                match self.solver {
                    SolverChoice::Simplex => "simplex",
                    SolverChoice::Ipm => "ipm",
                    SolverChoice::Choose => "choose",
                }
                .to_string(),
            ),
            "simplex_strategy" => OptionValue::Int(self.simplex_strategy.as_int()),
            "presolve" => OptionValue::Str(
                match self.presolve {
                    PresolveMode::On => "on",
                    PresolveMode::Off => "off",
                    PresolveMode::Choose => "choose",
                }
                .to_string(),
            ),
            "simplex_scale_strategy" => OptionValue::Int(self.simplex_scale_strategy),
            "simplex_iteration_limit" => OptionValue::Int(self.simplex_iteration_limit),
            "ipm_iteration_limit" => OptionValue::Int(self.ipm_iteration_limit),
            "time_limit" => OptionValue::Double(self.time_limit),
            "objective_bound" => OptionValue::Double(self.objective_bound),
            "objective_target" => OptionValue::Double(self.objective_target),
            "use_warm_start" => OptionValue::Bool(self.use_warm_start),
            "output_flag" => OptionValue::Bool(self.output_flag),
            "primal_feasibility_tolerance" => {
                OptionValue::Double(self.primal_feasibility_tolerance)
            }
            "dual_feasibility_tolerance" => OptionValue::Double(self.dual_feasibility_tolerance),
            other => {
                return Err(VertisError::Options(format!("unknown option \"{other}\"")));
            }
        };
        Ok(value)
    }
}

fn expect_bool(key: &str, value: &OptionValue) -> VertisResult<bool> {
    match value {
        OptionValue::Bool(v) => Ok(*v),
        other => Err(type_mismatch(key, "bool", other)),
    }
}

fn expect_int(key: &str, value: &OptionValue) -> VertisResult<i64> {
    match value {
        OptionValue::Int(v) => Ok(*v),
        other => Err(type_mismatch(key, "integer", other)),
    }
}

fn expect_double(key: &str, value: &OptionValue) -> VertisResult<f64> {
    match value {
        OptionValue::Double(v) => Ok(*v),
        // Integer-to-double widening is the one coercion allowed.
        OptionValue::Int(v) => Ok(*v as f64),
        other => Err(type_mismatch(key, "double", other)),
    }
}

fn expect_str(key: &str, value: &OptionValue) -> VertisResult<String> {
    match value {
        OptionValue::Str(v) => Ok(v.clone()),
        other => Err(type_mismatch(key, "string", other)),
    }
}

fn type_mismatch(key: &str, expected: &str, got: &OptionValue) -> VertisError {
    let kind = match got {
        OptionValue::Bool(_) => "bool",
        OptionValue::Int(_) => "integer",
        OptionValue::Double(_) => "double",
        OptionValue::Str(_) => "string",
    };
    VertisError::Options(format!("option \"{key}\" expects {expected}, got {kind}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = Options::default();
        assert_eq!(opts.solver, SolverChoice::Choose);
        assert_eq!(opts.simplex_strategy, SimplexStrategy::Choose);
        assert_eq!(opts.simplex_scale_strategy, 1);
        assert!(opts.use_warm_start);
        assert_eq!(opts.objective_bound, INF);
    }

    #[test]
    fn test_set_and_get_round_trip() {
        let mut opts = Options::default();
        opts.set("solver", "ipm".into()).unwrap();
        assert_eq!(opts.get("solver").unwrap(), OptionValue::Str("ipm".to_string()));
        opts.set("simplex_iteration_limit", 10i64.into()).unwrap();
        assert_eq!(
            opts.get("simplex_iteration_limit").unwrap(),
            OptionValue::Int(10)
        );
        opts.set("objective_bound", (-45.876).into()).unwrap();
        assert_eq!(
            opts.get("objective_bound").unwrap(),
            OptionValue::Double(-45.876)
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut opts = Options::default();
        assert!(opts.set("no_such_option", 1i64.into()).is_err());
        assert!(opts.get("no_such_option").is_err());
    }

    #[test]
    fn test_rejection_is_atomic() {
        let mut opts = Options::default();
        let before = opts.simplex_iteration_limit;
        assert!(opts.set("simplex_iteration_limit", (-3i64).into()).is_err());
        assert_eq!(opts.simplex_iteration_limit, before);
        assert!(opts.set("solver", "newton".into()).is_err());
        assert_eq!(opts.solver, SolverChoice::Choose);
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut opts = Options::default();
        assert!(opts.set("use_warm_start", 1i64.into()).is_err());
        assert!(opts.set("solver", OptionValue::Bool(true)).is_err());
        // Int widens to double.
        assert!(opts.set("time_limit", 5i64.into()).is_ok());
        assert_eq!(opts.time_limit, 5.0);
    }
}
