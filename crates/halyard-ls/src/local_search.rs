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

//! Best-improvement local search.
//!
//! A plain descent under the local-augmented objective, sharing the move
//! evaluation kernel with the tabu search: each iteration applies the
//! strictly best improving move and terminates at the first iteration
//! without one (a local optimum), at the iteration cap, or at the time
//! limit.

use crate::neighborhood::Neighborhood;
use crate::result::{LocalSearchResult, LocalSearchTermination};
use halyard_core::num::{EPSILON, VariableValue};
use halyard_model::error::ModelResult;
use halyard_model::model::Model;
use halyard_model::mv::Move;
use halyard_model::proxy::ValueProxy;
use halyard_model::solution::{PlainSolution, SolutionScore};
use halyard_search::incumbent::{IncumbentHolder, UpdateStatus};
use halyard_search::memory::Memory;
use halyard_search::option::SolverOptions;
use halyard_search::time_keeper::TimeKeeper;

/// Runs a best-improvement descent from `initial_values` to a local
/// optimum of the local-augmented objective.
#[allow(clippy::too_many_arguments)]
pub fn solve<V>(
    model: &mut Model<V>,
    neighborhood: &mut Neighborhood<V>,
    options: &SolverOptions,
    initial_values: &[ValueProxy<V>],
    local_weights: &[ValueProxy<f64>],
    global_weights: &[ValueProxy<f64>],
    mut incumbent_holder: IncumbentHolder<V>,
    memory: &mut Memory,
    time_keeper: &TimeKeeper,
) -> ModelResult<LocalSearchResult<V>>
where
    V: VariableValue,
{
    model.import_variable_values(initial_values)?;
    model.update();
    incumbent_holder.reset_local_augmented();

    let mut current_score = model.evaluate(&Move::empty(), local_weights, global_weights);
    let mut total_update_status = {
        let solution = model.export_solution();
        incumbent_holder.try_update(&solution, &current_score)
    };
    let mut historical_feasible_solutions = Vec::new();
    if options.is_enabled_collect_historical_data && current_score.is_feasible {
        historical_feasible_solutions.push(model.export_plain_solution());
    }

    let mut iteration = 0usize;
    let termination = loop {
        if iteration >= options.local_search.iteration_max {
            break LocalSearchTermination::IterationLimit;
        }
        if iteration % options.local_search.time_check_interval == 0
            && time_keeper.is_time_over(options.time_max)
        {
            break LocalSearchTermination::TimeLimit;
        }

        let moves = neighborhood.update_moves(model);
        let mut best: Option<(usize, SolutionScore)> = None;
        for (index, mv) in moves.iter().enumerate() {
            let score = model.evaluate_delta(mv, &current_score, local_weights, global_weights);
            if score.local_augmented_objective
                >= current_score.local_augmented_objective - EPSILON
            {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_index, best_score)) => {
                    let gap = score.local_augmented_objective
                        - best_score.local_augmented_objective;
                    if gap < -EPSILON {
                        true
                    } else if gap > EPSILON {
                        false
                    } else {
                        let violation_gap = score.total_violation - best_score.total_violation;
                        if violation_gap < -EPSILON {
                            true
                        } else if violation_gap > EPSILON {
                            false
                        } else {
                            mv.first_altered_variable()
                                < moves[*best_index].first_altered_variable()
                        }
                    }
                }
            };
            if better {
                best = Some((index, score));
            }
        }

        let Some((chosen_index, chosen_score)) = best else {
            break LocalSearchTermination::LocalOptimum;
        };
        let chosen = moves[chosen_index].clone();

        model.apply(&chosen);
        memory.update(&chosen, iteration as i64);
        current_score = chosen_score;

        let solution = model.export_solution();
        let status = incumbent_holder.try_update(&solution, &chosen_score);
        total_update_status |= status;
        if status.contains(UpdateStatus::FEASIBLE_INCUMBENT_UPDATE)
            && options.is_enabled_collect_historical_data
        {
            historical_feasible_solutions.push(PlainSolution::from_solution(&solution));
        }

        iteration += 1;
    };

    tracing::debug!(
        iterations = iteration,
        ?termination,
        local = incumbent_holder.local_augmented_incumbent_objective(),
        "local search finished"
    );

    Ok(LocalSearchResult {
        incumbent_holder,
        total_update_status,
        number_of_iterations: iteration,
        termination,
        historical_feasible_solutions,
    })
}
