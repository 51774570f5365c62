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

//! Penalty-coefficient adaptation between tabu-search loops.
//!
//! After each loop, with the gap Δ = (global augmented incumbent) −
//! (loop-local augmented incumbent):
//!
//! * after `reset_count_threshold` stagnant loops the local weights are
//!   **reset** to the global weights;
//! * else, when Δ > ε and the local incumbent is infeasible, the local
//!   weights of violated rows are **tightened** by a balance-weighted mix
//!   of a constant term `Δ / Σv` and a proportional term `Δ·v_g / Σv²`,
//!   capped at the initial penalty coefficient (optionally grouped to the
//!   per-proxy maximum);
//! * otherwise the weights of satisfied rows are **relaxed** by a factor
//!   in `(0, 1)`.
//!
//! The global weights are ratcheted — monotone non-decreasing — and only
//! when the global augmented incumbent improves.

use halyard_core::num::EPSILON;
use halyard_model::proxy::ValueProxy;
use halyard_search::penalty::PenaltyState;

/// Tightens the local weights against the violations of the loop-local
/// incumbent.
pub fn tighten_local(
    local_weights: &mut [ValueProxy<f64>],
    violations: &[ValueProxy<f64>],
    gap: f64,
    tightening_rate: f64,
    balance: f64,
    cap: f64,
    is_enabled_grouping: bool,
) {
    debug_assert_eq!(
        local_weights.len(),
        violations.len(),
        "called `tighten_local` with {} weight proxies but {} violation proxies",
        local_weights.len(),
        violations.len()
    );

    let total_violation: f64 = violations
        .iter()
        .flat_map(|proxy| proxy.values())
        .sum();
    let total_squared_violation: f64 = violations
        .iter()
        .flat_map(|proxy| proxy.values())
        .map(|&violation| violation * violation)
        .sum();
    if total_violation < EPSILON {
        return;
    }

    let gap = gap.max(0.0);
    for (weights, violation_values) in local_weights.iter_mut().zip(violations.iter()) {
        for (flat, weight) in weights.values_mut().iter_mut().enumerate() {
            let violation = violation_values.flat(flat);
            let constant_term = gap / total_violation;
            let proportional_term = gap * violation / total_squared_violation;
            *weight +=
                tightening_rate * (balance * constant_term + (1.0 - balance) * proportional_term);
        }

        if is_enabled_grouping {
            let maximum = weights
                .values()
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max);
            weights.fill(maximum);
        }

        for weight in weights.values_mut() {
            *weight = weight.min(cap);
        }
    }
}

/// Relaxes the local weights of rows the loop-local incumbent satisfies.
pub fn relax_local(
    local_weights: &mut [ValueProxy<f64>],
    violations: &[ValueProxy<f64>],
    relaxing_rate: f64,
) {
    debug_assert!(
        (0.0..1.0).contains(&relaxing_rate),
        "called `relax_local` with relaxing rate {} outside (0, 1)",
        relaxing_rate
    );

    for (weights, violation_values) in local_weights.iter_mut().zip(violations.iter()) {
        for (flat, weight) in weights.values_mut().iter_mut().enumerate() {
            if violation_values.flat(flat) < EPSILON {
                *weight *= relaxing_rate;
            }
        }
    }
}

/// Ratchets the global weights up to the local ones. Called only when the
/// global augmented incumbent improved, which keeps the global vector
/// monotone non-decreasing.
pub fn ratchet_global(penalty: &mut PenaltyState) {
    let locals: Vec<Vec<f64>> = penalty
        .local()
        .iter()
        .map(|proxy| proxy.values().to_vec())
        .collect();
    for (global, local_values) in penalty.global_mut().iter_mut().zip(locals.iter()) {
        for (flat, weight) in global.values_mut().iter_mut().enumerate() {
            *weight = weight.max(local_values[flat]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halyard_core::array::ArrayShape;

    fn proxy(values: Vec<f64>) -> ValueProxy<f64> {
        ValueProxy::from_values(ArrayShape::one_dimensional(0, values.len()), values)
    }

    #[test]
    fn test_tighten_distributes_the_gap() {
        let mut local = vec![proxy(vec![10.0, 10.0])];
        let violations = vec![proxy(vec![3.0, 1.0])];
        // gap = 8, balance 0.5: constant term 8/4 = 2 on both rows,
        // proportional terms 8*3/10 = 2.4 and 8*1/10 = 0.8.
        tighten_local(&mut local, &violations, 8.0, 1.0, 0.5, 1e7, false);
        assert!((local[0].flat(0) - (10.0 + 0.5 * 2.0 + 0.5 * 2.4)).abs() < 1e-12);
        assert!((local[0].flat(1) - (10.0 + 0.5 * 2.0 + 0.5 * 0.8)).abs() < 1e-12);
    }

    #[test]
    fn test_tighten_caps_at_initial_coefficient() {
        let mut local = vec![proxy(vec![99.5])];
        let violations = vec![proxy(vec![2.0])];
        tighten_local(&mut local, &violations, 100.0, 1.0, 0.5, 100.0, false);
        assert_eq!(local[0].flat(0), 100.0);
    }

    #[test]
    fn test_tighten_grouping_raises_to_proxy_maximum() {
        let mut local = vec![proxy(vec![10.0, 20.0])];
        let violations = vec![proxy(vec![1.0, 0.0])];
        tighten_local(&mut local, &violations, 4.0, 1.0, 0.0, 1e7, true);
        // Only the violated row was raised (10 + 4), then grouping lifts
        // both entries to the proxy maximum.
        assert_eq!(local[0].flat(0), local[0].flat(1));
        assert!(local[0].flat(0) >= 20.0);
    }

    #[test]
    fn test_relax_touches_only_satisfied_rows() {
        let mut local = vec![proxy(vec![10.0, 10.0])];
        let violations = vec![proxy(vec![0.0, 2.0])];
        relax_local(&mut local, &violations, 0.5);
        assert_eq!(local[0].flat(0), 5.0);
        assert_eq!(local[0].flat(1), 10.0);
    }

    #[test]
    fn test_zero_violation_total_is_a_no_op() {
        let mut local = vec![proxy(vec![10.0])];
        let violations = vec![proxy(vec![0.0])];
        tighten_local(&mut local, &violations, 5.0, 1.0, 0.5, 1e7, false);
        assert_eq!(local[0].flat(0), 10.0);
    }

    #[test]
    fn test_ratchet_is_monotone_non_decreasing() {
        use halyard_model::expression::LinearBuilder;
        use halyard_model::model::{Model, SetupOptions};
        use halyard_search::penalty::PenaltyState;

        let mut model: Model<i64> = Model::new("ratchet");
        let x = model.create_bounded_variables("x", 3, 0, 1).unwrap();
        model.create_constraints("rows", 2).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x.at(0)));
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();

        let mut state = PenaltyState::new(&model, 100.0);
        state.local_mut()[0].set_flat(0, 250.0);
        state.local_mut()[0].set_flat(1, 50.0);

        ratchet_global(&mut state);
        // Raised where the local weight exceeds the global one, unchanged
        // elsewhere.
        assert_eq!(state.global()[0].flat(0), 250.0);
        assert_eq!(state.global()[0].flat(1), 100.0);

        // A second ratchet after relaxation never lowers the global vector.
        state.local_mut()[0].set_flat(0, 10.0);
        ratchet_global(&mut state);
        assert_eq!(state.global()[0].flat(0), 250.0);

        // The stagnation reset copies the (monotone) global weights back.
        state.reset_local_to_global();
        assert_eq!(state.local()[0].flat(0), 250.0);
        assert_eq!(state.local()[0].flat(1), 100.0);
    }
}
