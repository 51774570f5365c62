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

//! Solution snapshots, scores, and exported summaries.
//!
//! A `Solution` is a by-value snapshot of the full model state; the
//! incumbent holder copies these on update so no live variable state is
//! ever aliased. `PlainSolution` is the compact form archived by the
//! historical solution pool. `NamedSolution` and `ModelSummary` are the
//! name-keyed export surface consumed by downstream emitters.

use crate::proxy::ValueProxy;
use halyard_core::num::{EPSILON, VariableValue};
use serde::Serialize;
use std::collections::BTreeMap;

/// The score of one assignment under given penalty weight vectors.
///
/// All objectives are expressed as minimization values; the model's sign is
/// applied on external read only.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolutionScore {
    pub objective: f64,
    pub total_violation: f64,
    pub local_penalty: f64,
    pub global_penalty: f64,
    pub local_augmented_objective: f64,
    pub global_augmented_objective: f64,
    pub is_feasible: bool,
    pub is_objective_improvable: bool,
    pub is_constraint_improvable: bool,
}

/// A full by-value snapshot of the model state.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution<V>
where
    V: VariableValue,
{
    pub variable_value_proxies: Vec<ValueProxy<V>>,
    pub expression_value_proxies: Vec<ValueProxy<f64>>,
    pub constraint_value_proxies: Vec<ValueProxy<f64>>,
    pub violation_value_proxies: Vec<ValueProxy<f64>>,
    pub objective: f64,
    pub total_violation: f64,
    pub is_feasible: bool,
}

impl<V> Solution<V>
where
    V: VariableValue,
{
    /// Sums the violation values across all constraint proxies.
    pub fn total_violation_from_proxies(&self) -> f64 {
        self.violation_value_proxies
            .iter()
            .map(|proxy| proxy.values().iter().sum::<f64>())
            .sum()
    }
}

/// A compact solution record for the historical archive.
#[derive(Clone, Debug, PartialEq)]
pub struct PlainSolution<V>
where
    V: VariableValue,
{
    pub variable_values: Vec<Vec<V>>,
    pub objective: f64,
    pub total_violation: f64,
    pub is_feasible: bool,
}

impl<V> PlainSolution<V>
where
    V: VariableValue,
{
    /// Creates a plain record from a full snapshot.
    pub fn from_solution(solution: &Solution<V>) -> Self {
        Self {
            variable_values: solution
                .variable_value_proxies
                .iter()
                .map(|proxy| proxy.values().to_vec())
                .collect(),
            objective: solution.objective,
            total_violation: solution.total_violation,
            is_feasible: solution.is_feasible,
        }
    }
}

/// A shaped block of values keyed by base name in the export surface.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NamedValues<T> {
    pub shape: Vec<usize>,
    pub values: Vec<T>,
}

impl<T> NamedValues<T>
where
    T: Clone,
{
    /// Creates a named block from a value proxy.
    pub fn from_proxy(proxy: &ValueProxy<T>) -> Self {
        Self {
            shape: proxy.shape().shape().to_vec(),
            values: proxy.values().to_vec(),
        }
    }
}

/// A name-keyed solution export.
///
/// The objective here carries the model's external sign: for a
/// maximization problem it is the negated internal (minimization) value.
#[derive(Clone, Debug, Serialize)]
pub struct NamedSolution<V>
where
    V: VariableValue + Serialize,
{
    pub name: String,
    pub variables: BTreeMap<String, NamedValues<V>>,
    pub expressions: BTreeMap<String, NamedValues<f64>>,
    pub constraints: BTreeMap<String, NamedValues<f64>>,
    pub violations: BTreeMap<String, NamedValues<f64>>,
    pub objective: f64,
    pub total_violation: f64,
    pub is_feasible: bool,
}

impl<V> NamedSolution<V>
where
    V: VariableValue + Serialize,
{
    /// Returns `true` if the snapshot satisfies every enabled constraint.
    #[inline]
    pub fn is_feasible(&self) -> bool {
        self.is_feasible
    }
}

/// Aggregate counts describing a set-up model.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub name: String,
    pub number_of_variables: usize,
    pub number_of_fixed_variables: usize,
    pub number_of_binary_variables: usize,
    pub number_of_integer_variables: usize,
    pub number_of_selection_variables: usize,
    pub number_of_constraints: usize,
    pub number_of_enabled_constraints: usize,
    pub number_of_selections: usize,
    pub is_linear: bool,
    pub is_minimization: bool,
}

/// Checks feasibility of a violation total under the shared tolerance.
#[inline(always)]
pub fn is_feasible_total(total_violation: f64) -> bool {
    total_violation < EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use halyard_core::array::ArrayShape;

    fn solution() -> Solution<i64> {
        let mut variables = ValueProxy::new(ArrayShape::one_dimensional(0, 3), 0i64);
        variables.set_flat(1, 4);
        let violations = ValueProxy::from_values(
            ArrayShape::one_dimensional(0, 2),
            vec![0.5, 1.5],
        );
        Solution {
            variable_value_proxies: vec![variables],
            expression_value_proxies: vec![],
            constraint_value_proxies: vec![],
            violation_value_proxies: vec![violations],
            objective: 12.0,
            total_violation: 2.0,
            is_feasible: false,
        }
    }

    #[test]
    fn test_total_violation_from_proxies() {
        assert_eq!(solution().total_violation_from_proxies(), 2.0);
    }

    #[test]
    fn test_plain_solution_snapshot() {
        let plain = PlainSolution::from_solution(&solution());
        assert_eq!(plain.variable_values, vec![vec![0, 4, 0]]);
        assert_eq!(plain.objective, 12.0);
        assert!(!plain.is_feasible);
    }

    #[test]
    fn test_named_values_from_proxy() {
        let proxy = ValueProxy::from_values(ArrayShape::new(0, &[2, 2]), vec![1, 2, 3, 4]);
        let named = NamedValues::from_proxy(&proxy);
        assert_eq!(named.shape, vec![2, 2]);
        assert_eq!(named.values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_feasibility_tolerance() {
        assert!(is_feasible_total(0.0));
        assert!(is_feasible_total(1e-9));
        assert!(!is_feasible_total(1e-3));
    }

    #[test]
    fn test_score_default_is_zeroed() {
        let score = SolutionScore::default();
        assert_eq!(score.objective, 0.0);
        assert!(!score.is_feasible);
    }
}
