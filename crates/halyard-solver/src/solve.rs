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

//! The outer solve loop.
//!
//! Sequences the solve: sign and target normalization, model setup, the
//! optional Lagrangian-dual warm start and local-search refinement, then
//! repeated tabu-search loops. Between loops the outer loop adapts the
//! tabu tenure from the memory bias, chooses the restart perturbation
//! width, arms or disarms the special neighborhoods, updates the penalty
//! coefficients, and polls the user callback. The whole solve is
//! single-threaded and cooperative; runs are byte-reproducible for a
//! fixed seed and option set.

use crate::penalty;
use crate::result::{SolveResult, SolveStatus};
use halyard_core::num::{EPSILON, VariableValue};
use halyard_ls::lagrange_dual;
use halyard_ls::local_search;
use halyard_ls::neighborhood::{MoveUpdater, Neighborhood};
use halyard_ls::tabu_search;
use halyard_model::error::ModelResult;
use halyard_model::model::{CallbackAction, Model};
use halyard_model::mv::Move;
use halyard_model::selection::SelectionMode;
use halyard_model::solution::{NamedValues, Solution};
use halyard_search::incumbent::{IncumbentHolder, UpdateStatus};
use halyard_search::memory::Memory;
use halyard_search::option::{RestartMode, SolverOptions, Verbose};
use halyard_search::penalty::PenaltyState;
use halyard_search::pool::SolutionPool;
use halyard_search::time_keeper::TimeKeeper;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;

/// Solves the model with the given options.
pub fn solve<V>(model: &mut Model<V>, options: &SolverOptions) -> ModelResult<SolveResult<V>>
where
    V: VariableValue + Serialize,
{
    solve_with_updater(model, options, None)
}

/// Solves the model with a user-defined move updater installed on the
/// neighborhood.
pub fn solve_with_updater<V>(
    model: &mut Model<V>,
    options: &SolverOptions,
    move_updater: Option<MoveUpdater<V>>,
) -> ModelResult<SolveResult<V>>
where
    V: VariableValue + Serialize,
{
    options.validate()?;
    model.mark_solved()?;

    let time_keeper = TimeKeeper::new();
    let mut master = options.clone();

    // Normalize the target objective: user-given targets follow the
    // model's sign; without an objective the target becomes 0 so the first
    // feasible solution terminates the run.
    if master.has_default_target_objective() {
        if !model.is_defined_objective() {
            master.target_objective_value = 0.0;
        }
    } else {
        master.target_objective_value *= model.sign();
    }

    model.setup(&master.to_setup_options())?;

    if master.verbose >= Verbose::Outer {
        let summary = model.export_summary();
        tracing::info!(
            variables = summary.number_of_variables,
            constraints = summary.number_of_enabled_constraints,
            selections = summary.number_of_selections,
            linear = summary.is_linear,
            "optimization starts"
        );
    }

    let mut neighborhood = Neighborhood::new(model);
    if master.is_enabled_binary_move {
        neighborhood.enable_binary_move();
    }
    if master.is_enabled_integer_move {
        neighborhood.enable_integer_move();
    }
    if master.selection_mode != SelectionMode::None && !model.selections().is_empty() {
        neighborhood.enable_selection_move();
    }
    if let Some(updater) = move_updater {
        neighborhood.set_move_updater(updater);
        if master.is_enabled_user_defined_move {
            neighborhood.enable_user_defined_move();
        }
    }
    // The structural and chain families stay disabled here; they are armed
    // when optimization stagnates.

    let mut rng = ChaCha8Rng::seed_from_u64(master.seed);
    let mut penalty_state = PenaltyState::new(model, master.initial_penalty_coefficient);
    let mut memory = Memory::new(model);
    let mut pool: SolutionPool<V> = SolutionPool::new(master.historical_data_capacity);
    let mut incumbent_holder: IncumbentHolder<V> = IncumbentHolder::new();

    model.update();
    let initial_score = model.evaluate(&Move::empty(), penalty_state.local(), penalty_state.global());
    let mut current_solution = model.export_solution();
    incumbent_holder.try_update(&current_solution, &initial_score);

    let mut number_of_lagrange_dual_iterations = 0usize;
    let mut number_of_local_search_iterations = 0usize;
    let mut number_of_tabu_search_iterations = 0usize;
    let mut number_of_tabu_search_loops = 0usize;
    let mut callback_error: Option<String> = None;

    // Optional Lagrangian-dual warm start.
    if master.is_enabled_lagrange_dual && !time_keeper.is_time_over(master.time_max) {
        if !model.is_linear() {
            tracing::warn!("lagrange dual skipped because the model is nonlinear");
        } else if !model.selections().is_empty() {
            tracing::warn!("lagrange dual skipped because selection variables are present");
        } else {
            let result = lagrange_dual::solve(
                model,
                &mut neighborhood,
                &master,
                &current_solution.variable_value_proxies,
                penalty_state.local(),
                penalty_state.global(),
                incumbent_holder.clone(),
                &time_keeper,
            )?;
            merge_driver_incumbents(&mut incumbent_holder, &result.incumbent_holder);
            current_solution = result
                .incumbent_holder
                .global_augmented_incumbent_solution()
                .clone();
            if master.is_enabled_collect_historical_data {
                pool.push(&result.historical_feasible_solutions);
            }
            number_of_lagrange_dual_iterations = result.number_of_iterations;
            if master.verbose >= Verbose::Outer {
                tracing::info!(
                    iterations = result.number_of_iterations,
                    bound = result.lagrangian_bound,
                    "lagrange dual finished"
                );
            }
        }
    }

    // Optional local-search refinement.
    if master.is_enabled_local_search && !time_keeper.is_time_over(master.time_max) {
        let result = local_search::solve(
            model,
            &mut neighborhood,
            &master,
            &current_solution.variable_value_proxies,
            penalty_state.local(),
            penalty_state.global(),
            incumbent_holder.clone(),
            &mut memory,
            &time_keeper,
        )?;
        merge_driver_incumbents(&mut incumbent_holder, &result.incumbent_holder);
        current_solution = result
            .incumbent_holder
            .global_augmented_incumbent_solution()
            .clone();
        if master.is_enabled_collect_historical_data {
            pool.push(&result.historical_feasible_solutions);
        }
        number_of_local_search_iterations = result.number_of_iterations;
        if master.verbose >= Verbose::Outer {
            tracing::info!(
                iterations = result.number_of_iterations,
                "local search finished"
            );
        }
    }

    // Repeated tabu-search loops with adaptive parameters.
    let mut loop_index = 0usize;
    let mut not_update_count = 0usize;
    let mut next_tabu_tenure = master.tabu_search.initial_tabu_tenure;
    let mut next_iteration_max = master.tabu_search.iteration_max;
    let mut next_number_of_initial_modification = 0usize;
    let mut previous_bias = memory.bias();

    while loop_index < master.iteration_max {
        if time_keeper.is_time_over(master.time_max) {
            if master.verbose >= Verbose::Outer {
                tracing::info!(
                    elapsed = time_keeper.elapsed(),
                    "outer loop terminated by the time limit"
                );
            }
            break;
        }
        if incumbent_holder.is_found_feasible_solution()
            && incumbent_holder.feasible_incumbent_objective() <= master.target_objective_value
        {
            if master.verbose >= Verbose::Outer {
                tracing::info!("outer loop terminated: the target objective was reached");
            }
            break;
        }
        match model.invoke_callback() {
            Ok(CallbackAction::Continue) => {}
            Ok(CallbackAction::Stop) => break,
            Err(error) => {
                callback_error = Some(error.to_string());
                break;
            }
        }

        let mut loop_options = master.clone();
        loop_options.tabu_search.initial_tabu_tenure = next_tabu_tenure;
        if master.tabu_search.is_enabled_automatic_iteration_adjustment {
            loop_options.tabu_search.iteration_max = next_iteration_max;
        }
        loop_options.tabu_search.number_of_initial_modification =
            next_number_of_initial_modification;

        let result = tabu_search::solve(
            model,
            &mut neighborhood,
            &loop_options,
            &current_solution.variable_value_proxies,
            penalty_state.local(),
            penalty_state.global(),
            incumbent_holder.clone(),
            &mut memory,
            &time_keeper,
            &mut rng,
        )?;

        let result_local_solution = result
            .incumbent_holder
            .local_augmented_incumbent_solution()
            .clone();
        let result_global_solution = result
            .incumbent_holder
            .global_augmented_incumbent_solution()
            .clone();

        // Restart point for the next loop.
        let is_changed = match master.tabu_search.restart_mode {
            RestartMode::Global => {
                let changed = result_global_solution.variable_value_proxies
                    != current_solution.variable_value_proxies;
                current_solution = result_global_solution.clone();
                changed
            }
            RestartMode::Local => {
                let changed = result_local_solution.variable_value_proxies
                    != current_solution.variable_value_proxies;
                current_solution = result_local_solution.clone();
                changed
            }
        };

        // Merge the loop's incumbents into the master holder.
        let merge_status = merge_driver_incumbents(&mut incumbent_holder, &result.incumbent_holder);
        let global_improved =
            merge_status.contains(UpdateStatus::GLOBAL_AUGMENTED_INCUMBENT_UPDATE);
        if master.is_enabled_collect_historical_data {
            pool.push(&result.historical_feasible_solutions);
        }

        // Stagnation accounting for the penalty reset.
        let mut penalty_reset_flag = false;
        if global_improved {
            not_update_count = 0;
        } else {
            not_update_count += 1;
            if not_update_count == master.penalty_coefficient_reset_count_threshold {
                penalty_reset_flag = true;
                not_update_count = 0;
            }
        }

        // Penalty-coefficient update.
        let gap = incumbent_holder.global_augmented_incumbent_objective()
            - result.incumbent_holder.local_augmented_incumbent_objective();
        if penalty_reset_flag {
            penalty_state.reset_local_to_global();
            if master.verbose >= Verbose::Outer {
                tracing::info!("penalty coefficients were reset due to search stagnation");
            }
        } else if gap > EPSILON && !result_local_solution.is_feasible {
            penalty::tighten_local(
                penalty_state.local_mut(),
                &result_local_solution.violation_value_proxies,
                gap,
                master.penalty_coefficient_tightening_rate,
                master.penalty_coefficient_updating_balance,
                master.initial_penalty_coefficient,
                master.is_enabled_grouping_penalty_coefficient,
            );
        } else {
            penalty::relax_local(
                penalty_state.local_mut(),
                &result_local_solution.violation_value_proxies,
                master.penalty_coefficient_relaxing_rate,
            );
        }
        if global_improved {
            penalty::ratchet_global(&mut penalty_state);
        }

        // Tabu-tenure adjustment from the memory bias.
        let bias = memory.bias();
        if master.tabu_search.is_enabled_automatic_tabu_tenure_adjustment {
            let ceiling = model.number_of_not_fixed_variables().max(1);
            if result
                .total_update_status
                .contains(UpdateStatus::GLOBAL_AUGMENTED_INCUMBENT_UPDATE)
            {
                next_tabu_tenure = master.tabu_search.initial_tabu_tenure.min(ceiling);
            } else if bias > previous_bias {
                next_tabu_tenure = (loop_options.tabu_search.initial_tabu_tenure + 1).min(ceiling);
            } else if bias < previous_bias {
                next_tabu_tenure = loop_options
                    .tabu_search
                    .initial_tabu_tenure
                    .saturating_sub(1)
                    .max(1);
            }
        } else {
            next_tabu_tenure = master.tabu_search.initial_tabu_tenure;
        }
        previous_bias = bias;

        // Initial-modification count for the next loop.
        if result
            .total_update_status
            .contains(UpdateStatus::FEASIBLE_INCUMBENT_UPDATE)
            || result
                .total_update_status
                .contains(UpdateStatus::GLOBAL_AUGMENTED_INCUMBENT_UPDATE)
        {
            next_number_of_initial_modification = 0;
        } else if master.tabu_search.is_enabled_initial_modification && !is_changed {
            let nominal = (master.tabu_search.initial_modification_fixed_rate
                * next_tabu_tenure as f64)
                .floor() as i64;
            let width =
                (master.tabu_search.initial_modification_randomize_rate * nominal as f64) as i64;
            let mut count = nominal;
            if width > 0 {
                count += rng.gen_range(-width..width);
            }
            next_number_of_initial_modification = count.max(1) as usize;
        }

        // Iteration cap for the next loop.
        if master.tabu_search.is_enabled_automatic_iteration_adjustment
            && !result.is_early_stopped()
        {
            let grown = if result
                .total_update_status
                .contains(UpdateStatus::GLOBAL_AUGMENTED_INCUMBENT_UPDATE)
            {
                (result.last_local_incumbent_update_iteration as f64
                    * master.tabu_search.iteration_increase_rate)
                    .ceil() as usize
            } else {
                (loop_options.tabu_search.iteration_max as f64
                    * master.tabu_search.iteration_increase_rate)
                    .ceil() as usize
            };
            next_iteration_max = grown
                .max(master.tabu_search.initial_tabu_tenure)
                .min(master.tabu_search.iteration_max);
        }

        // Special neighborhoods: disarm on improvement, arm on stagnation.
        if result
            .total_update_status
            .contains(UpdateStatus::GLOBAL_AUGMENTED_INCUMBENT_UPDATE)
        {
            let disabled = disarm_special_moves(&mut neighborhood, &master);
            if disabled && master.verbose >= Verbose::Outer {
                tracing::info!("special neighborhood moves were disabled");
            }
        } else if !result.is_early_stopped()
            && loop_options.tabu_search.iteration_max == master.tabu_search.iteration_max
        {
            let enabled = arm_special_moves(&mut neighborhood, &master);
            if enabled && master.verbose >= Verbose::Outer {
                tracing::info!("special neighborhood moves were enabled");
            }
        }

        number_of_tabu_search_iterations += result.number_of_iterations;
        number_of_tabu_search_loops += 1;
        loop_index += 1;

        if master.verbose >= Verbose::Outer {
            tracing::info!(
                loop_index,
                iterations = result.number_of_iterations,
                global = incumbent_holder.global_augmented_incumbent_objective() * model.sign(),
                feasible = incumbent_holder.feasible_incumbent_objective() * model.sign(),
                next_tenure = next_tabu_tenure,
                "tabu search loop finished"
            );
        }
    }

    // Export: the feasible incumbent if any, else the global-augmented
    // incumbent. Values of disabled rows are refreshed by a full update.
    let incumbent: Solution<V> = match incumbent_holder.feasible_incumbent_solution() {
        Some(solution) => solution.clone(),
        None => incumbent_holder.global_augmented_incumbent_solution().clone(),
    };
    model.import_variable_values(&incumbent.variable_value_proxies)?;
    model.update();
    let final_solution = model.export_solution();
    let named_solution = model.convert_to_named_solution(&final_solution);

    let mut penalty_coefficients = BTreeMap::new();
    for (base, weights) in model
        .constraint_base_names()
        .iter()
        .zip(penalty_state.local().iter())
    {
        penalty_coefficients.insert(base.clone(), NamedValues::from_proxy(weights));
    }
    let mut update_counts = BTreeMap::new();
    for (base, counts) in model
        .variable_base_names()
        .iter()
        .zip(memory.update_counts().iter())
    {
        update_counts.insert(base.clone(), NamedValues::from_proxy(counts));
    }

    let status = SolveStatus {
        model_summary: model.export_summary(),
        is_found_feasible_solution: named_solution.is_feasible(),
        elapsed_time: time_keeper.elapsed(),
        number_of_lagrange_dual_iterations,
        number_of_local_search_iterations,
        number_of_tabu_search_iterations,
        number_of_tabu_search_loops,
        penalty_coefficients,
        update_counts,
        callback_error,
    };

    Ok(SolveResult {
        solution: named_solution,
        status,
        feasible_solutions: pool.solutions().to_vec(),
    })
}

/// Merges a driver's loop-local incumbents into the master holder and
/// returns the union of update flags.
fn merge_driver_incumbents<V>(
    master: &mut IncumbentHolder<V>,
    driver: &IncumbentHolder<V>,
) -> UpdateStatus
where
    V: VariableValue,
{
    let mut status = master.try_update(
        driver.global_augmented_incumbent_solution(),
        driver.global_augmented_incumbent_score(),
    );
    if let Some(feasible) = driver.feasible_incumbent_solution() {
        status |= master.try_update(feasible, driver.feasible_incumbent_score());
    }
    status
}

fn arm_special_moves<V>(neighborhood: &mut Neighborhood<V>, options: &SolverOptions) -> bool
where
    V: VariableValue,
{
    let mut changed = false;
    if options.is_enabled_aggregation_move && !neighborhood.is_enabled_aggregation_move() {
        neighborhood.enable_aggregation_move();
        changed = true;
    }
    if options.is_enabled_precedence_move && !neighborhood.is_enabled_precedence_move() {
        neighborhood.enable_precedence_move();
        changed = true;
    }
    if options.is_enabled_variable_bound_move && !neighborhood.is_enabled_variable_bound_move() {
        neighborhood.enable_variable_bound_move();
        changed = true;
    }
    if options.is_enabled_exclusive_move && !neighborhood.is_enabled_exclusive_move() {
        neighborhood.enable_exclusive_move();
        changed = true;
    }
    if options.is_enabled_chain_move && !neighborhood.is_enabled_chain_move() {
        neighborhood.enable_chain_move();
        changed = true;
    }
    if changed {
        neighborhood.arm_stagnation_moves();
    }
    changed
}

fn disarm_special_moves<V>(neighborhood: &mut Neighborhood<V>, options: &SolverOptions) -> bool
where
    V: VariableValue,
{
    let mut changed = false;
    if options.is_enabled_aggregation_move && neighborhood.is_enabled_aggregation_move() {
        neighborhood.disable_aggregation_move();
        changed = true;
    }
    if options.is_enabled_precedence_move && neighborhood.is_enabled_precedence_move() {
        neighborhood.disable_precedence_move();
        changed = true;
    }
    if options.is_enabled_variable_bound_move && neighborhood.is_enabled_variable_bound_move() {
        neighborhood.disable_variable_bound_move();
        changed = true;
    }
    if options.is_enabled_exclusive_move && neighborhood.is_enabled_exclusive_move() {
        neighborhood.disable_exclusive_move();
        changed = true;
    }
    if options.is_enabled_chain_move && neighborhood.is_enabled_chain_move() {
        neighborhood.disable_chain_move();
        changed = true;
    }
    neighborhood.disarm_stagnation_moves();
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use halyard_model::error::ModelError;
    use halyard_model::expression::LinearBuilder;
    use halyard_model::mv::MoveSense;

    fn small_options(loops: usize) -> SolverOptions {
        let mut options = SolverOptions::default();
        options.iteration_max = loops;
        options.tabu_search.iteration_max = 100;
        options
    }

    #[test]
    fn test_second_solve_is_rejected() {
        let mut model: Model<i64> = Model::new("twice");
        let x = model.create_bounded_variable("x", 0, 1).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x));
        assert!(solve(&mut model, &small_options(1)).is_ok());
        assert!(matches!(
            solve(&mut model, &small_options(1)),
            Err(ModelError::AlreadySolved)
        ));
    }

    #[test]
    fn test_invalid_options_fail_before_setup() {
        let mut model: Model<i64> = Model::new("invalid");
        let x = model.create_bounded_variable("x", 0, 1).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x));
        let mut options = small_options(1);
        options.penalty_coefficient_relaxing_rate = 2.0;
        assert!(matches!(
            solve(&mut model, &options),
            Err(ModelError::InvalidOption(_))
        ));
        // The failed solve must not have latched the model.
        assert!(!model.is_solved());
    }

    #[test]
    fn test_callback_stop_terminates_the_outer_loop() {
        let mut model: Model<i64> = Model::new("stopped");
        let x = model.create_bounded_variables("x", 4, 0, 1).unwrap();
        let mut objective = LinearBuilder::new();
        for i in 0..4 {
            objective = objective.add(-1.0, x.at(i));
        }
        model.minimize(objective);
        model.set_callback(Box::new(|| Ok(CallbackAction::Stop)));

        let result = solve(&mut model, &small_options(50)).unwrap();
        // The callback stops the loop before the first tabu search.
        assert_eq!(result.status.number_of_tabu_search_loops, 0);
        assert!(result.status.callback_error.is_none());
    }

    #[test]
    fn test_callback_error_preserves_the_incumbent() {
        let mut model: Model<i64> = Model::new("erroring");
        let x = model.create_bounded_variables("x", 4, 0, 1).unwrap();
        let mut objective = LinearBuilder::new();
        for i in 0..4 {
            objective = objective.add(1.0, x.at(i));
        }
        model.minimize(objective);
        let mut calls = 0;
        model.set_callback(Box::new(move || {
            calls += 1;
            if calls >= 2 {
                Err("external cancellation".into())
            } else {
                Ok(CallbackAction::Continue)
            }
        }));

        let mut options = small_options(50);
        options.is_enabled_presolve = false;
        let result = solve(&mut model, &options).unwrap();
        assert_eq!(
            result.status.callback_error.as_deref(),
            Some("user callback failed: external cancellation")
        );
        // The incumbent found before the failure is still exported.
        assert!(result.status.is_found_feasible_solution);
    }

    #[test]
    fn test_user_defined_moves_flow_through_the_solve() {
        let mut model: Model<i64> = Model::new("user_moves");
        let x = model.create_bounded_variables("x", 6, 0, 1).unwrap();
        let mut row = LinearBuilder::new();
        let mut objective = LinearBuilder::new();
        for i in 0..6 {
            row = row.add(1.0, x.at(i));
            objective = objective.add((i + 1) as f64, x.at(i));
        }
        model.create_constraint_with("cover", row.geq(2.0)).unwrap();
        model.minimize(objective);

        let mut options = small_options(3);
        options.is_enabled_presolve = false;
        options.is_enabled_binary_move = false;
        // Only the user-defined pair moves can reach feasibility.
        let updater: MoveUpdater<i64> = Box::new(move |moves, model| {
            for i in 0..6 {
                for j in (i + 1)..6 {
                    let mut mv = Move::bivariate(MoveSense::UserDefined, (x.at(i), 1), (x.at(j), 1));
                    model.attach_related_constraints(&mut mv);
                    moves.push(mv);
                }
            }
        });
        let result = solve_with_updater(&mut model, &options, Some(updater)).unwrap();
        assert!(result.status.is_found_feasible_solution);
        assert_eq!(result.solution.objective, 3.0);
    }
}
