// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # Halyard Solver
//!
//! A metaheuristic solver for mixed-integer programming models with linear
//! or user-supplied nonlinear objectives and constraints. A solve runs an
//! optional Lagrangian-dual warm start and local-search refinement, then
//! repeats tabu-search loops with adaptive tenure, restart perturbation,
//! and penalty-coefficient updates until the time or iteration budget is
//! exhausted or the target objective is reached.
//!
//! ```rust
//! use halyard_model::expression::LinearBuilder;
//! use halyard_model::model::Model;
//! use halyard_search::option::SolverOptions;
//!
//! let mut model: Model<i64> = Model::new("sample");
//! let x = model.create_bounded_variables("x", 3, 0, 1).unwrap();
//! let mut row = LinearBuilder::new();
//! let mut objective = LinearBuilder::new();
//! for i in 0..3 {
//!     row = row.add(1.0, x.at(i));
//!     objective = objective.add((i + 1) as f64, x.at(i));
//! }
//! model.create_constraint_with("choose_one", row.eq(1.0)).unwrap();
//! model.minimize(objective);
//!
//! let mut options = SolverOptions::default();
//! options.iteration_max = 5;
//! let result = halyard_solver::solve(&mut model, &options).unwrap();
//! assert!(result.status.is_found_feasible_solution);
//! assert_eq!(result.solution.objective, 1.0);
//! ```

pub mod penalty;
pub mod result;
pub mod solve;

pub use result::{SolveResult, SolveStatus};
pub use solve::{solve, solve_with_updater};
