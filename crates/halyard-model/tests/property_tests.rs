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

//! Randomized invariant checks over small linear models.
//!
//! For arbitrary coefficient rows, senses, and right-hand sides, a random
//! sequence of in-bounds moves must preserve: cached-value parity with a
//! fresh recomputation, violation parity with the sense formula, bound
//! respect, and field-wise agreement between the full and delta
//! evaluation forms.

use halyard_model::constraint::ConstraintSense;
use halyard_model::expression::LinearBuilder;
use halyard_model::model::{Model, SetupOptions};
use halyard_model::mv::{Move, MoveSense};
use proptest::prelude::*;

const NUMBER_OF_VARIABLES: usize = 4;

fn build_model(
    coefficient_rows: &[Vec<i32>],
    senses: &[u8],
    rhs_values: &[i32],
) -> (Model<i64>, halyard_model::model::VariableVector) {
    let mut model: Model<i64> = Model::new("prop");
    let x = model
        .create_bounded_variables("x", NUMBER_OF_VARIABLES, -3, 3)
        .unwrap();

    let number_of_rows = coefficient_rows
        .len()
        .min(senses.len())
        .min(rhs_values.len());
    for row in 0..number_of_rows {
        let mut builder = LinearBuilder::new();
        for (i, &coefficient) in coefficient_rows[row].iter().enumerate() {
            if coefficient != 0 {
                builder = builder.add(coefficient as f64, x.at(i));
            }
        }
        let rhs = rhs_values[row] as f64;
        let definition = match senses[row] % 3 {
            0 => builder.leq(rhs),
            1 => builder.eq(rhs),
            _ => builder.geq(rhs),
        };
        model
            .create_constraint_with(&format!("g{}", row), definition)
            .unwrap();
    }

    let mut objective = LinearBuilder::new();
    for i in 0..NUMBER_OF_VARIABLES {
        objective = objective.add(i as f64 - 1.5, x.at(i));
    }
    model.minimize(objective);

    let mut setup = SetupOptions::default();
    setup.is_enabled_presolve = false;
    model.setup(&setup).unwrap();
    (model, x)
}

/// Recomputes every constraint value from scratch and checks the cached
/// state against it.
fn assert_cached_state_consistent(model: &Model<i64>) -> Result<(), TestCaseError> {
    let mut total_violation = 0.0;
    for proxy in model.constraint_proxies() {
        for constraint in proxy.elements() {
            let form = constraint.linear_form().expect("linear rows only");
            let mut expected = form.constant();
            for (&reference, &coefficient) in form.coefficients() {
                expected += coefficient * model.variable(reference).value() as f64;
            }
            prop_assert!(
                (constraint.constraint_value() - expected).abs() < 1e-9,
                "cached constraint value {} diverged from recomputation {}",
                constraint.constraint_value(),
                expected
            );

            let expected_violation = match constraint.sense() {
                ConstraintSense::LessEqual => expected.max(0.0),
                ConstraintSense::Equal => expected.abs(),
                ConstraintSense::GreaterEqual => (-expected).max(0.0),
            };
            prop_assert!(
                (constraint.violation_value() - expected_violation).abs() < 1e-9,
                "cached violation {} diverged from {}",
                constraint.violation_value(),
                expected_violation
            );
            if constraint.is_enabled() {
                total_violation += expected_violation;
            }
        }
    }
    prop_assert!((model.total_violation() - total_violation).abs() < 1e-9);

    for proxy in model.variable_proxies() {
        for variable in proxy.elements() {
            prop_assert!(variable.lower_bound() <= variable.value());
            prop_assert!(variable.value() <= variable.upper_bound());
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_random_move_sequences_preserve_invariants(
        coefficient_rows in prop::collection::vec(
            prop::collection::vec(-3i32..=3, NUMBER_OF_VARIABLES),
            1..5,
        ),
        senses in prop::collection::vec(0u8..3, 1..5),
        rhs_values in prop::collection::vec(-5i32..=5, 1..5),
        alterations in prop::collection::vec(
            (0usize..NUMBER_OF_VARIABLES, -3i64..=3),
            1..20,
        ),
    ) {
        let (mut model, x) = build_model(&coefficient_rows, &senses, &rhs_values);
        let local_weights = model.generate_constraint_parameter_proxies(10.0);
        let global_weights = model.generate_constraint_parameter_proxies(20.0);

        for &(index, value) in &alterations {
            let reference = x.at(index);
            if model.variable(reference).is_fixed() {
                continue;
            }

            let mut mv = Move::univariate(MoveSense::Integer, reference, value);
            model.attach_related_constraints(&mut mv);

            // The delta form must agree field-wise with the full form.
            let score_before = model.evaluate(&Move::empty(), &local_weights, &global_weights);
            let full = model.evaluate(&mv, &local_weights, &global_weights);
            let delta = model.evaluate_delta(&mv, &score_before, &local_weights, &global_weights);
            prop_assert!((full.objective - delta.objective).abs() < 1e-9);
            prop_assert!((full.total_violation - delta.total_violation).abs() < 1e-9);
            prop_assert!((full.local_penalty - delta.local_penalty).abs() < 1e-9);
            prop_assert!((full.global_penalty - delta.global_penalty).abs() < 1e-9);
            prop_assert!(
                (full.local_augmented_objective - delta.local_augmented_objective).abs() < 1e-9
            );
            prop_assert_eq!(full.is_feasible, delta.is_feasible);

            model.apply(&mv);
            assert_cached_state_consistent(&model)?;

            // The committed caches must match what a fresh recomputation
            // yields.
            let cached_objective = model.objective_value();
            let cached_violation = model.total_violation();
            model.update();
            prop_assert!((model.objective_value() - cached_objective).abs() < 1e-9);
            prop_assert!((model.total_violation() - cached_violation).abs() < 1e-9);
        }
    }

    #[test]
    fn test_applied_score_matches_next_empty_evaluation(
        coefficient_rows in prop::collection::vec(
            prop::collection::vec(-2i32..=2, NUMBER_OF_VARIABLES),
            1..4,
        ),
        senses in prop::collection::vec(0u8..3, 1..4),
        rhs_values in prop::collection::vec(-4i32..=4, 1..4),
        alterations in prop::collection::vec(
            (0usize..NUMBER_OF_VARIABLES, -3i64..=3),
            1..10,
        ),
    ) {
        let (mut model, x) = build_model(&coefficient_rows, &senses, &rhs_values);
        let local_weights = model.generate_constraint_parameter_proxies(5.0);
        let global_weights = model.generate_constraint_parameter_proxies(5.0);

        for &(index, value) in &alterations {
            let reference = x.at(index);
            if model.variable(reference).is_fixed() {
                continue;
            }
            let mut mv = Move::univariate(MoveSense::Integer, reference, value);
            model.attach_related_constraints(&mut mv);

            let predicted = model.evaluate(&mv, &local_weights, &global_weights);
            model.apply(&mv);
            let observed = model.evaluate(&Move::empty(), &local_weights, &global_weights);
            prop_assert!((predicted.objective - observed.objective).abs() < 1e-9);
            prop_assert!((predicted.total_violation - observed.total_violation).abs() < 1e-9);
            prop_assert!((predicted.local_penalty - observed.local_penalty).abs() < 1e-9);
        }
    }
}
