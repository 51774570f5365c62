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

//! Driver outcomes.
//!
//! Each driver returns its loop-local incumbent holder together with the
//! aggregate update status and a termination reason; the outer loop merges
//! the incumbents and reacts to the reason.

use halyard_core::num::VariableValue;
use halyard_model::solution::PlainSolution;
use halyard_search::incumbent::{IncumbentHolder, UpdateStatus};

/// Why a tabu-search inner loop stopped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TabuSearchTermination {
    IterationLimit,
    TimeLimit,
    NoAdmissibleMove,
    EarlyStop,
}

/// The outcome of one tabu-search inner loop.
pub struct TabuSearchResult<V>
where
    V: VariableValue,
{
    pub incumbent_holder: IncumbentHolder<V>,
    pub total_update_status: UpdateStatus,
    pub number_of_iterations: usize,
    /// The iteration at which the local-augmented incumbent last improved;
    /// feeds the automatic iteration adjustment of the next loop.
    pub last_local_incumbent_update_iteration: usize,
    pub termination: TabuSearchTermination,
    pub historical_feasible_solutions: Vec<PlainSolution<V>>,
}

impl<V> TabuSearchResult<V>
where
    V: VariableValue,
{
    /// Returns `true` if the loop stopped before exhausting its iteration
    /// budget.
    #[inline]
    pub fn is_early_stopped(&self) -> bool {
        self.termination != TabuSearchTermination::IterationLimit
    }
}

/// Why a local-search descent stopped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LocalSearchTermination {
    LocalOptimum,
    IterationLimit,
    TimeLimit,
}

/// The outcome of a best-improvement local search.
pub struct LocalSearchResult<V>
where
    V: VariableValue,
{
    pub incumbent_holder: IncumbentHolder<V>,
    pub total_update_status: UpdateStatus,
    pub number_of_iterations: usize,
    pub termination: LocalSearchTermination,
    pub historical_feasible_solutions: Vec<PlainSolution<V>>,
}

/// Why the Lagrangian-dual ascent stopped.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LagrangeDualTermination {
    Converged,
    IterationLimit,
    TimeLimit,
}

/// The outcome of the Lagrangian-dual warm start.
pub struct LagrangeDualResult<V>
where
    V: VariableValue,
{
    pub incumbent_holder: IncumbentHolder<V>,
    pub total_update_status: UpdateStatus,
    pub number_of_iterations: usize,
    /// The best dual bound reached (a lower bound on the minimization
    /// objective).
    pub lagrangian_bound: f64,
    pub termination: LagrangeDualTermination,
    pub historical_feasible_solutions: Vec<PlainSolution<V>>,
}
