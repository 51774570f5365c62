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

//! The exported result of a solve.
//!
//! Nothing is persisted by the core; downstream emitters consume this
//! record. The name-keyed surface derives `Serialize` so a JSON writer
//! needs no glue code.

use halyard_core::num::VariableValue;
use halyard_model::solution::{ModelSummary, NamedSolution, NamedValues, PlainSolution};
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate information about a finished solve.
#[derive(Clone, Debug, Serialize)]
pub struct SolveStatus {
    pub model_summary: ModelSummary,
    pub is_found_feasible_solution: bool,
    /// Elapsed wall-clock time in seconds.
    pub elapsed_time: f64,
    pub number_of_lagrange_dual_iterations: usize,
    pub number_of_local_search_iterations: usize,
    pub number_of_tabu_search_iterations: usize,
    pub number_of_tabu_search_loops: usize,
    /// Final local penalty coefficients, keyed by constraint base name.
    pub penalty_coefficients: BTreeMap<String, NamedValues<f64>>,
    /// Per-variable update counts, keyed by variable base name.
    pub update_counts: BTreeMap<String, NamedValues<i64>>,
    /// The message of a user-callback failure, if one aborted the solve;
    /// the best incumbent found so far is still exported.
    pub callback_error: Option<String>,
}

/// The full record a solve produces.
pub struct SolveResult<V>
where
    V: VariableValue + Serialize,
{
    /// The exported incumbent: feasible if one was found, otherwise the
    /// global-augmented incumbent.
    pub solution: NamedSolution<V>,
    pub status: SolveStatus,
    /// Archived feasible solutions, best first (empty unless historical
    /// data collection is enabled).
    pub feasible_solutions: Vec<PlainSolution<V>>,
}
