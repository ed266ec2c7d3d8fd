//! Vertis: a linear programming core with two interchangeable engines.
//!
//! This library solves problems of the form
//!
//! ```text
//! minimize (or maximize)  c'x + offset
//! subject to              row_lower <=  A x  <= row_upper
//!                         col_lower <=   x   <= col_upper
//! ```
//!
//! with a **revised simplex method** (dual and primal pivot strategies,
//! serial and parallel PRICE, dual steepest-edge pricing, product-form
//! basis factorization) and a **primal-dual interior-point method with
//! crossover** that finishes on a vertex basis. A single [`Solver`]
//! instance owns the model, the options, the incumbent basis and
//! solution, and routes `run()` to the configured engine under
//! iteration, time and dual-objective budgets.
//!
//! # Example
//!
//! ```ignore
//! use vertis_core::{Lp, ObjSense, Solver, INF};
//!
//! let lp = Lp::from_column_arrays(
//!     2, 2, ObjSense::Minimize, 0.0,
//!     vec![-8.0, -10.0],
//!     vec![0.0, 0.0], vec![INF, INF],
//!     vec![-INF, -INF], vec![80.0, 120.0],
//!     &[0, 2, 4], &[0, 1, 0, 1], &[1.0, 1.0, 2.0, 4.0],
//! )?;
//!
//! let mut solver = Solver::new();
//! solver.pass_model(lp);
//! solver.run();
//!
//! println!("status:    {}", solver.get_model_status());
//! println!("objective: {}", solver.get_info().objective_function_value);
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod error;
pub mod factor;
pub mod ipm;
pub mod model;
pub mod options;
pub mod presolve;
pub mod scaling;
pub mod simplex;
pub mod solution;
pub mod solver;
pub mod standard_form;
pub mod status;

pub use error::{VertisError, VertisResult};
pub use model::{Lp, ObjSense, INF};
pub use options::{OptionValue, Options, PresolveMode, SimplexStrategy, SolverChoice};
pub use solution::{Basis, BasisStatus, SimplexStats, Solution, SolveInfo};
pub use solver::{ModelParser, Solver};
pub use status::{ModelStatus, SolverStatus};
