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

//! Scalar integer decision variables.
//!
//! A variable carries its bounds, current value, classification, and the
//! sensitivity tables the evaluation kernel reads on the hot path: its
//! coefficient in the objective and its coefficient in every constraint it
//! participates in. Values are mutated only by `Model::apply` and by the
//! setup pipeline.

use crate::index::{ConstraintRef, ExpressionRef, VariableRef};
use halyard_core::num::VariableValue;

/// The classification of a decision variable.
///
/// * `Binary` — bounds are exactly `[0, 1]`.
/// * `Integer` — any other bounded integer variable.
/// * `Selection` — a binary variable covered by a one-hot selection group.
/// * `Fixed` — `lower == upper == value`; never altered by any move.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum VariableSense {
    Binary,
    Integer,
    Selection,
    Fixed,
}

/// A scalar integer decision variable.
#[derive(Debug, Clone)]
pub struct Variable<V>
where
    V: VariableValue,
{
    reference: VariableRef,
    label: String,
    lower: V,
    upper: V,
    value: V,
    is_fixed: bool,
    sense: VariableSense,
    objective_sensitivity: f64,
    constraint_sensitivities: Vec<(ConstraintRef, f64)>,
    expression_sensitivities: Vec<(ExpressionRef, f64)>,
    related_constraints: Vec<ConstraintRef>,
    selection_index: Option<usize>,
}

impl<V> Variable<V>
where
    V: VariableValue,
{
    /// Creates a new variable with the given reference and bounds.
    ///
    /// The initial value is `0` clamped into `[lower, upper]`. The sense is
    /// derived from the bounds and refreshed during categorization.
    pub fn new(reference: VariableRef, lower: V, upper: V) -> Self {
        debug_assert!(
            lower <= upper,
            "called `Variable::new` with crossing bounds: lower is {} but upper is {}",
            lower,
            upper
        );

        let value = clamp(V::zero(), lower, upper);
        let mut variable = Self {
            reference,
            label: String::new(),
            lower,
            upper,
            value,
            is_fixed: false,
            sense: VariableSense::Integer,
            objective_sensitivity: 0.0,
            constraint_sensitivities: Vec::new(),
            expression_sensitivities: Vec::new(),
            related_constraints: Vec::new(),
            selection_index: None,
        };
        variable.refresh_sense();
        variable
    }

    /// Returns the `(proxy, flat)` reference of this variable.
    #[inline(always)]
    pub fn reference(&self) -> VariableRef {
        self.reference
    }

    /// Returns the element label assigned during setup (e.g. `x[03]`).
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    /// Returns the lower bound.
    #[inline(always)]
    pub fn lower_bound(&self) -> V {
        self.lower
    }

    /// Returns the upper bound.
    #[inline(always)]
    pub fn upper_bound(&self) -> V {
        self.upper
    }

    /// Returns the current value.
    #[inline(always)]
    pub fn value(&self) -> V {
        self.value
    }

    /// Returns `true` if this variable is fixed.
    #[inline(always)]
    pub fn is_fixed(&self) -> bool {
        self.is_fixed
    }

    /// Returns the classification of this variable.
    #[inline(always)]
    pub fn sense(&self) -> VariableSense {
        self.sense
    }

    /// Returns the coefficient of this variable in the objective expression,
    /// or `0.0` if it does not appear there.
    #[inline(always)]
    pub fn objective_sensitivity(&self) -> f64 {
        self.objective_sensitivity
    }

    /// Returns the `(constraint, coefficient)` sensitivity table.
    #[inline(always)]
    pub fn constraint_sensitivities(&self) -> &[(ConstraintRef, f64)] {
        &self.constraint_sensitivities
    }

    /// Returns the `(expression, coefficient)` sensitivity table for
    /// standalone expressions this variable appears in.
    #[inline(always)]
    pub fn expression_sensitivities(&self) -> &[(ExpressionRef, f64)] {
        &self.expression_sensitivities
    }

    /// Returns the constraints this variable participates in.
    #[inline(always)]
    pub fn related_constraints(&self) -> &[ConstraintRef] {
        &self.related_constraints
    }

    /// Returns the selection group index, if this variable belongs to one.
    #[inline(always)]
    pub fn selection_index(&self) -> Option<usize> {
        self.selection_index
    }

    /// Returns `true` if `candidate` lies within the bounds.
    #[inline(always)]
    pub fn is_within_bounds(&self, candidate: V) -> bool {
        self.lower <= candidate && candidate <= self.upper
    }

    /// Tightens the bounds to `[lower, upper]`.
    ///
    /// Only the setup pipeline may call this; bounds never widen.
    pub(crate) fn set_bounds(&mut self, lower: V, upper: V) {
        debug_assert!(
            lower <= upper,
            "called `Variable::set_bounds` with crossing bounds: lower is {} but upper is {}",
            lower,
            upper
        );
        self.lower = lower;
        self.upper = upper;
        self.refresh_sense();
    }

    /// Fixes the variable at `value`, collapsing its bounds.
    pub(crate) fn fix_to(&mut self, value: V) {
        self.lower = value;
        self.upper = value;
        self.value = value;
        self.is_fixed = true;
        self.sense = VariableSense::Fixed;
    }

    /// Sets the current value. The single caller is `Model::apply` (and the
    /// setup pipeline); the value must already be within bounds.
    #[inline]
    pub(crate) fn set_value(&mut self, value: V) {
        debug_assert!(
            self.is_within_bounds(value),
            "called `Variable::set_value` with value {} out of bounds [{}, {}]",
            value,
            self.lower,
            self.upper
        );
        self.value = value;
    }

    /// Sets the current value without a bounds check. Used only by
    /// initial-value correction before bounds are verified.
    pub(crate) fn set_value_unchecked(&mut self, value: V) {
        self.value = value;
    }

    pub(crate) fn set_objective_sensitivity(&mut self, sensitivity: f64) {
        self.objective_sensitivity = sensitivity;
    }

    pub(crate) fn set_constraint_sensitivities(
        &mut self,
        sensitivities: Vec<(ConstraintRef, f64)>,
    ) {
        self.constraint_sensitivities = sensitivities;
    }

    pub(crate) fn set_expression_sensitivities(
        &mut self,
        sensitivities: Vec<(ExpressionRef, f64)>,
    ) {
        self.expression_sensitivities = sensitivities;
    }

    pub(crate) fn set_related_constraints(&mut self, related: Vec<ConstraintRef>) {
        self.related_constraints = related;
    }

    pub(crate) fn set_selection_index(&mut self, index: usize) {
        self.selection_index = Some(index);
        self.sense = VariableSense::Selection;
    }

    /// Re-derives the sense from the current bounds and fixed flag.
    ///
    /// Selection membership is assigned later by `extract_selections` and is
    /// not revisited here.
    pub(crate) fn refresh_sense(&mut self) {
        if self.is_fixed || self.lower == self.upper {
            self.sense = VariableSense::Fixed;
        } else if self.lower == V::zero() && self.upper == V::one() {
            self.sense = VariableSense::Binary;
        } else {
            self.sense = VariableSense::Integer;
        }
    }
}

#[inline]
fn clamp<V: VariableValue>(value: V, lower: V, upper: V) -> V {
    if value < lower {
        lower
    } else if value > upper {
        upper
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(lower: i64, upper: i64) -> Variable<i64> {
        Variable::new(VariableRef::from_raw(0, 0), lower, upper)
    }

    #[test]
    fn test_new_clamps_initial_value() {
        assert_eq!(variable(-5, 5).value(), 0);
        assert_eq!(variable(3, 8).value(), 3);
        assert_eq!(variable(-8, -3).value(), -3);
    }

    #[test]
    fn test_sense_derivation() {
        assert_eq!(variable(0, 1).sense(), VariableSense::Binary);
        assert_eq!(variable(-2, 4).sense(), VariableSense::Integer);
        assert_eq!(variable(3, 3).sense(), VariableSense::Fixed);
    }

    #[test]
    fn test_fix_to_collapses_bounds() {
        let mut v = variable(-5, 5);
        v.fix_to(2);
        assert!(v.is_fixed());
        assert_eq!(v.lower_bound(), 2);
        assert_eq!(v.upper_bound(), 2);
        assert_eq!(v.value(), 2);
        assert_eq!(v.sense(), VariableSense::Fixed);
    }

    #[test]
    fn test_bound_tightening_updates_sense() {
        let mut v = variable(-5, 5);
        v.set_bounds(0, 1);
        assert_eq!(v.sense(), VariableSense::Binary);
        v.set_bounds(1, 1);
        assert_eq!(v.sense(), VariableSense::Fixed);
    }

    #[test]
    fn test_selection_membership() {
        let mut v = variable(0, 1);
        v.set_selection_index(3);
        assert_eq!(v.selection_index(), Some(3));
        assert_eq!(v.sense(), VariableSense::Selection);
    }

    #[test]
    fn test_is_within_bounds() {
        let v = variable(-1, 2);
        assert!(v.is_within_bounds(-1));
        assert!(v.is_within_bounds(2));
        assert!(!v.is_within_bounds(3));
        assert!(!v.is_within_bounds(-2));
    }
}
