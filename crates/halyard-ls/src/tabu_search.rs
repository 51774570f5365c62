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

//! The tabu-search inner loop.
//!
//! Each iteration scores every candidate move with the delta evaluator,
//! drops moves whose variables were altered within the tenure window
//! (unless aspiration applies — the move would improve the global
//! augmented incumbent), and applies the best admissible move by
//! local-augmented objective. Ties break deterministically: smaller total
//! violation, then smaller first-altered `(proxy, flat)` reference.
//!
//! Before the loop, the restart solution may be perturbed by a number of
//! random admissible moves whose memory stamps are randomized across the
//! tenure width, so the perturbed variables do not all leave the tabu
//! list at once.

use crate::neighborhood::Neighborhood;
use crate::result::{TabuSearchResult, TabuSearchTermination};
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
use rand::Rng;

/// Compares two scored moves; returns `true` when the first is strictly
/// better under the driver's deterministic order.
fn is_better<V: VariableValue>(
    score: &SolutionScore,
    mv: &Move<V>,
    best_score: &SolutionScore,
    best_move: &Move<V>,
) -> bool {
    let objective_gap = score.local_augmented_objective - best_score.local_augmented_objective;
    if objective_gap < -EPSILON {
        return true;
    }
    if objective_gap > EPSILON {
        return false;
    }
    let violation_gap = score.total_violation - best_score.total_violation;
    if violation_gap < -EPSILON {
        return true;
    }
    if violation_gap > EPSILON {
        return false;
    }
    mv.first_altered_variable() < best_move.first_altered_variable()
}

/// Runs one tabu-search loop from `initial_values`.
///
/// The incumbent holder is taken by value (the caller keeps the master
/// copy), its local-augmented incumbent is reopened, and the loop-local
/// holder is returned in the result for the outer loop to merge.
#[allow(clippy::too_many_arguments)]
pub fn solve<V, R>(
    model: &mut Model<V>,
    neighborhood: &mut Neighborhood<V>,
    options: &SolverOptions,
    initial_values: &[ValueProxy<V>],
    local_weights: &[ValueProxy<f64>],
    global_weights: &[ValueProxy<f64>],
    mut incumbent_holder: IncumbentHolder<V>,
    memory: &mut Memory,
    time_keeper: &TimeKeeper,
    rng: &mut R,
) -> ModelResult<TabuSearchResult<V>>
where
    V: VariableValue,
    R: Rng,
{
    let tabu = &options.tabu_search;
    let tenure = tabu.initial_tabu_tenure as i64;

    model.import_variable_values(initial_values)?;
    model.update();
    incumbent_holder.reset_local_augmented();
    // Short-term memory is loop-local; the long-term counters persist.
    memory.reset_last_update_iterations();

    let mut current_score = model.evaluate(&Move::empty(), local_weights, global_weights);
    let mut total_update_status = {
        let solution = model.export_solution();
        incumbent_holder.try_update(&solution, &current_score)
    };
    let mut historical_feasible_solutions = Vec::new();
    if options.is_enabled_collect_historical_data && current_score.is_feasible {
        historical_feasible_solutions.push(model.export_plain_solution());
    }

    // The initial random kick perturbs the restart solution to escape the
    // basin the previous loop settled in.
    for _ in 0..tabu.number_of_initial_modification {
        let chosen = {
            let moves = neighborhood.update_moves(model);
            if moves.is_empty() {
                break;
            }
            moves[rng.gen_range(0..moves.len())].clone()
        };
        model.apply(&chosen);
        memory.update_randomized(&chosen, 0, tenure, rng);
    }
    if tabu.number_of_initial_modification > 0 {
        current_score = model.evaluate(&Move::empty(), local_weights, global_weights);
    }

    let mut last_local_incumbent_update_iteration = 0usize;
    let mut last_global_incumbent_update_iteration = 0usize;
    let mut iteration = 0usize;
    let mut candidates: Vec<(usize, SolutionScore)> = Vec::new();

    let termination = loop {
        if iteration >= tabu.iteration_max {
            break TabuSearchTermination::IterationLimit;
        }
        if iteration % tabu.time_check_interval == 0 && time_keeper.is_time_over(options.time_max)
        {
            break TabuSearchTermination::TimeLimit;
        }
        if incumbent_holder.is_found_feasible_solution()
            && iteration - last_global_incumbent_update_iteration > tabu.early_stop_window
        {
            break TabuSearchTermination::EarlyStop;
        }

        let moves = neighborhood.update_moves(model);
        if moves.is_empty() {
            break TabuSearchTermination::NoAdmissibleMove;
        }

        // Score every candidate; tabu moves survive only on aspiration.
        candidates.clear();
        let mut has_improvable_candidate = false;
        for (index, mv) in moves.iter().enumerate() {
            let score = model.evaluate_delta(mv, &current_score, local_weights, global_weights);
            let improves_global_incumbent = score.global_augmented_objective
                < incumbent_holder.global_augmented_incumbent_objective();
            let is_tabu = mv.alterations().iter().any(|&(reference, _)| {
                (iteration as i64) - memory.last_update_iteration(reference) < tenure
            });
            if is_tabu && !improves_global_incumbent {
                continue;
            }
            if score.is_objective_improvable || score.is_constraint_improvable {
                has_improvable_candidate = true;
            }
            candidates.push((index, score));
        }
        if candidates.is_empty() {
            break TabuSearchTermination::NoAdmissibleMove;
        }

        let screening = options.is_enabled_improvability_screening && has_improvable_candidate;
        let mut best: Option<(usize, SolutionScore)> = None;
        for &(index, score) in candidates.iter() {
            if screening && !score.is_objective_improvable && !score.is_constraint_improvable {
                continue;
            }
            best = match best {
                None => Some((index, score)),
                Some((best_index, best_score)) => {
                    if is_better(&score, &moves[index], &best_score, &moves[best_index]) {
                        Some((index, score))
                    } else {
                        Some((best_index, best_score))
                    }
                }
            };
        }
        let Some((chosen_index, chosen_score)) = best else {
            break TabuSearchTermination::NoAdmissibleMove;
        };
        let chosen = moves[chosen_index].clone();

        model.apply(&chosen);
        memory.update(&chosen, iteration as i64);
        current_score = chosen_score;

        // Exporting the full solution is linear in the model size; do it
        // only when some incumbent can actually improve.
        let may_update = chosen_score.local_augmented_objective
            < incumbent_holder.local_augmented_incumbent_objective()
            || chosen_score.global_augmented_objective
                < incumbent_holder.global_augmented_incumbent_objective()
            || (chosen_score.is_feasible
                && chosen_score.objective < incumbent_holder.feasible_incumbent_objective());
        if may_update {
            let solution = model.export_solution();
            let status = incumbent_holder.try_update(&solution, &chosen_score);
            total_update_status |= status;
            if status.contains(UpdateStatus::LOCAL_AUGMENTED_INCUMBENT_UPDATE) {
                last_local_incumbent_update_iteration = iteration;
            }
            if status.contains(UpdateStatus::GLOBAL_AUGMENTED_INCUMBENT_UPDATE) {
                last_global_incumbent_update_iteration = iteration;
            }
            if status.contains(UpdateStatus::FEASIBLE_INCUMBENT_UPDATE)
                && options.is_enabled_collect_historical_data
            {
                historical_feasible_solutions.push(PlainSolution::from_solution(&solution));
            }
        }

        if neighborhood.is_enabled_chain_move() {
            neighborhood.register_chain_moves(model, &chosen);
        }

        iteration += 1;
    };

    tracing::debug!(
        iterations = iteration,
        ?termination,
        local = incumbent_holder.local_augmented_incumbent_objective(),
        global = incumbent_holder.global_augmented_incumbent_objective(),
        "tabu search loop finished"
    );

    Ok(TabuSearchResult {
        incumbent_holder,
        total_update_status,
        number_of_iterations: iteration,
        last_local_incumbent_update_iteration,
        termination,
        historical_feasible_solutions,
    })
}
