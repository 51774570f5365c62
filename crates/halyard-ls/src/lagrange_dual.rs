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

//! Lagrangian-dual warm start.
//!
//! Subgradient ascent on one multiplier per enabled constraint. Each
//! sub-step minimizes the Lagrangian over the variable box — every
//! variable settles at the bound favored by its reduced cost — and the
//! resulting primal candidate is offered to the incumbents. Multipliers
//! move along the constraint values and are projected back to their
//! admissible sign (`≥ 0` for `≤` rows, `≤ 0` for `≥` rows, free for
//! equalities); the step size shrinks geometrically whenever the dual
//! bound fails to improve.
//!
//! Valid only for linear models without selection variables; the outer
//! loop skips the phase (with a warning) otherwise.

use crate::neighborhood::Neighborhood;
use crate::result::{LagrangeDualResult, LagrangeDualTermination};
use halyard_core::num::{EPSILON, VariableValue};
use halyard_model::constraint::ConstraintSense;
use halyard_model::error::ModelResult;
use halyard_model::model::Model;
use halyard_model::mv::Move;
use halyard_model::proxy::ValueProxy;
use halyard_search::incumbent::IncumbentHolder;
use halyard_search::option::SolverOptions;
use halyard_search::time_keeper::TimeKeeper;

/// Runs the subgradient ascent from `initial_values` and returns the best
/// primal candidates it produced along the way.
#[allow(clippy::too_many_arguments)]
pub fn solve<V>(
    model: &mut Model<V>,
    _neighborhood: &mut Neighborhood<V>,
    options: &SolverOptions,
    initial_values: &[ValueProxy<V>],
    local_weights: &[ValueProxy<f64>],
    global_weights: &[ValueProxy<f64>],
    mut incumbent_holder: IncumbentHolder<V>,
    time_keeper: &TimeKeeper,
) -> ModelResult<LagrangeDualResult<V>>
where
    V: VariableValue,
{
    debug_assert!(
        model.is_linear(),
        "called `lagrange_dual::solve` on a nonlinear model"
    );
    debug_assert!(
        model.selections().is_empty(),
        "called `lagrange_dual::solve` with selection variables present"
    );

    model.import_variable_values(initial_values)?;
    model.update();

    let mut multipliers = model.generate_constraint_parameter_proxies(0.0f64);
    let mut step_size = options.lagrange_dual.initial_step_size;
    let mut best_bound = f64::NEG_INFINITY;
    let mut total_update_status = halyard_search::incumbent::UpdateStatus::NONE;
    let mut historical_feasible_solutions = Vec::new();

    let mut iteration = 0usize;
    let termination = loop {
        if iteration >= options.lagrange_dual.iteration_max {
            break LagrangeDualTermination::IterationLimit;
        }
        if iteration % options.lagrange_dual.time_check_interval == 0
            && time_keeper.is_time_over(options.time_max)
        {
            break LagrangeDualTermination::TimeLimit;
        }
        if step_size < options.lagrange_dual.tolerance {
            break LagrangeDualTermination::Converged;
        }

        // Primal step: minimize the Lagrangian over the box. Each variable
        // settles at the bound favored by its reduced cost.
        let mut candidate_values = model.export_variable_values();
        for proxy in model.variable_proxies() {
            for variable in proxy.elements() {
                if variable.is_fixed() {
                    continue;
                }
                let mut reduced_cost = variable.objective_sensitivity();
                for &(constraint_reference, coefficient) in variable.constraint_sensitivities() {
                    if !model.constraint(constraint_reference).is_enabled() {
                        continue;
                    }
                    let multiplier = multipliers[constraint_reference.proxy().get()]
                        .flat(constraint_reference.flat().get());
                    reduced_cost += multiplier * coefficient;
                }
                let target = if reduced_cost > 0.0 {
                    variable.lower_bound()
                } else {
                    variable.upper_bound()
                };
                let reference = variable.reference();
                candidate_values[reference.proxy().get()]
                    .set_flat(reference.flat().get(), target);
            }
        }
        model.import_variable_values(&candidate_values)?;
        model.update();

        // Offer the primal candidate to the incumbents.
        let score = model.evaluate(&Move::empty(), local_weights, global_weights);
        let solution = model.export_solution();
        let status = incumbent_holder.try_update(&solution, &score);
        total_update_status |= status;
        if status.contains(halyard_search::incumbent::UpdateStatus::FEASIBLE_INCUMBENT_UPDATE)
            && options.is_enabled_collect_historical_data
        {
            historical_feasible_solutions.push(model.export_plain_solution());
        }

        // Dual bound at the current multipliers.
        let mut bound = model.objective_value();
        for proxy in model.constraint_proxies() {
            for constraint in proxy.elements() {
                if !constraint.is_enabled() {
                    continue;
                }
                let reference = constraint.reference();
                let multiplier =
                    multipliers[reference.proxy().get()].flat(reference.flat().get());
                bound += multiplier * constraint.constraint_value();
            }
        }
        if bound > best_bound + EPSILON {
            best_bound = bound;
        } else {
            step_size *= options.lagrange_dual.step_size_shrink_rate;
        }

        // Subgradient step with sign projection.
        for proxy in model.constraint_proxies() {
            for constraint in proxy.elements() {
                if !constraint.is_enabled() {
                    continue;
                }
                let reference = constraint.reference();
                let (proxy_index, flat_index) =
                    (reference.proxy().get(), reference.flat().get());
                let mut multiplier = multipliers[proxy_index].flat(flat_index)
                    + step_size * constraint.constraint_value();
                multiplier = match constraint.sense() {
                    ConstraintSense::LessEqual => multiplier.max(0.0),
                    ConstraintSense::GreaterEqual => multiplier.min(0.0),
                    ConstraintSense::Equal => multiplier,
                };
                multipliers[proxy_index].set_flat(flat_index, multiplier);
            }
        }

        iteration += 1;
    };

    tracing::debug!(
        iterations = iteration,
        ?termination,
        bound = best_bound,
        "lagrange dual finished"
    );

    Ok(LagrangeDualResult {
        incumbent_holder,
        total_update_status,
        number_of_iterations: iteration,
        lagrangian_bound: best_bound,
        termination,
        historical_feasible_solutions,
    })
}
