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

//! Sensed constraints and shape classification.
//!
//! A constraint is an expression body in canonical `e ⋄ 0` form plus a
//! sense. It caches its current value and the derived violation magnitude:
//! `max(0, v)` for `≤`, `|v|` for `=`, and `max(0, −v)` for `≥`.
//!
//! Classification recognizes the structural shape of a linear constraint
//! (set partitioning, knapsack, precedence, …). The neighborhood generator
//! derives structural move families from these tags and the presolver uses
//! them to prioritize reductions. The first matching row of the priority
//! table wins.

use crate::expression::{Expression, ExpressionBody, LinearForm};
use crate::index::ConstraintRef;
use halyard_core::num::{EPSILON, VariableValue};

/// The sense of a constraint in canonical `e ⋄ 0` form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ConstraintSense {
    LessEqual,
    Equal,
    GreaterEqual,
}

impl ConstraintSense {
    /// Returns the violation magnitude of a constraint value under this
    /// sense.
    #[inline(always)]
    pub fn violation(&self, value: f64) -> f64 {
        match self {
            ConstraintSense::LessEqual => value.max(0.0),
            ConstraintSense::Equal => value.abs(),
            ConstraintSense::GreaterEqual => (-value).max(0.0),
        }
    }
}

impl std::fmt::Display for ConstraintSense {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            ConstraintSense::LessEqual => "<=",
            ConstraintSense::Equal => "=",
            ConstraintSense::GreaterEqual => ">=",
        };
        write!(f, "{}", symbol)
    }
}

/// The structural shape of a constraint.
///
/// The variants are ordered by classification priority; `classify` returns
/// the first matching shape.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ConstraintClassification {
    Singleton,
    Aggregation,
    Precedence,
    VariableBound,
    SetPartitioning,
    SetPacking,
    SetCovering,
    Cardinality,
    InvariantKnapsack,
    EquationKnapsack,
    BinPacking,
    Knapsack,
    IntegerKnapsack,
    GeneralLinear,
    Nonlinear,
}

/// Per-term information the classifier needs about a constraint row.
#[derive(Clone, Copy, Debug)]
pub struct ClassificationTerm {
    pub coefficient: f64,
    pub is_binary: bool,
}

#[inline]
fn is_integral(value: f64) -> bool {
    (value - value.round()).abs() < EPSILON
}

/// Classifies a linear constraint row given its terms and its right-hand
/// side `b` (the canonical form `Σ aᵢ·xᵢ + c ⋄ 0` has `b = −c`).
pub fn classify(
    terms: &[ClassificationTerm],
    rhs: f64,
    sense: ConstraintSense,
) -> ConstraintClassification {
    use ConstraintClassification::*;

    if terms.is_empty() {
        return GeneralLinear;
    }

    if terms.len() == 1 {
        return Singleton;
    }

    if terms.len() == 2 {
        if sense == ConstraintSense::Equal {
            return Aggregation;
        }
        if (terms[0].coefficient + terms[1].coefficient).abs() < EPSILON {
            return Precedence;
        }
        return VariableBound;
    }

    let all_binary = terms.iter().all(|term| term.is_binary);
    let all_unit = terms.iter().all(|term| (term.coefficient - 1.0).abs() < EPSILON);
    let all_nonnegative_integral = terms
        .iter()
        .all(|term| term.coefficient > -EPSILON && is_integral(term.coefficient));
    let rhs_integral = is_integral(rhs);

    if all_binary && all_unit && rhs_integral {
        if (rhs - 1.0).abs() < EPSILON {
            match sense {
                ConstraintSense::Equal => return SetPartitioning,
                ConstraintSense::LessEqual => return SetPacking,
                ConstraintSense::GreaterEqual => return SetCovering,
            }
        }
        if rhs >= 1.0 - EPSILON {
            match sense {
                ConstraintSense::Equal => return Cardinality,
                ConstraintSense::LessEqual => return InvariantKnapsack,
                ConstraintSense::GreaterEqual => {}
            }
        }
    }

    if all_binary && all_nonnegative_integral && rhs_integral {
        if sense == ConstraintSense::Equal {
            return EquationKnapsack;
        }

        // One "capacity" term whose coefficient matches the right-hand side
        // while every other item weighs one unit.
        let capacity_terms = terms
            .iter()
            .filter(|term| (term.coefficient - rhs).abs() < EPSILON)
            .count();
        let unit_terms = terms
            .iter()
            .filter(|term| (term.coefficient - 1.0).abs() < EPSILON)
            .count();
        if rhs >= 2.0 - EPSILON && capacity_terms == 1 && unit_terms == terms.len() - 1 {
            return BinPacking;
        }

        return Knapsack;
    }

    if !all_binary && all_nonnegative_integral && rhs_integral && sense != ConstraintSense::Equal {
        return IntegerKnapsack;
    }

    GeneralLinear
}

/// A constraint entity: an expression body in canonical `e ⋄ 0` form, a
/// sense, and cached evaluation state.
#[derive(Debug)]
pub struct Constraint<V>
where
    V: VariableValue,
{
    reference: ConstraintRef,
    label: String,
    expression: Expression<V>,
    sense: ConstraintSense,
    is_enabled: bool,
    classification: ConstraintClassification,
    constraint_value: f64,
    violation_value: f64,
}

impl<V> Constraint<V>
where
    V: VariableValue,
{
    /// Creates a constraint with an empty linear body and `≤` sense. The
    /// body and sense are filled in when the constraint is defined.
    pub fn new(reference: ConstraintRef) -> Self {
        // Reuse the expression cache machinery; the inner expression keeps a
        // mirrored reference so its debug output stays addressable.
        let expression = Expression::new(crate::index::ExpressionRef::new(
            reference.proxy(),
            reference.flat(),
        ));
        Self {
            reference,
            label: String::new(),
            expression,
            sense: ConstraintSense::LessEqual,
            is_enabled: true,
            classification: ConstraintClassification::GeneralLinear,
            constraint_value: 0.0,
            violation_value: 0.0,
        }
    }

    /// Returns the `(proxy, flat)` reference of this constraint.
    #[inline(always)]
    pub fn reference(&self) -> ConstraintRef {
        self.reference
    }

    /// Returns the element label assigned during setup.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = label;
    }

    /// Returns the inner expression.
    #[inline(always)]
    pub fn expression(&self) -> &Expression<V> {
        &self.expression
    }

    pub(crate) fn expression_mut(&mut self) -> &mut Expression<V> {
        &mut self.expression
    }

    /// Returns the sense.
    #[inline(always)]
    pub fn sense(&self) -> ConstraintSense {
        self.sense
    }

    pub(crate) fn set_sense(&mut self, sense: ConstraintSense) {
        self.sense = sense;
    }

    /// Returns `true` if this constraint participates in evaluation.
    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }

    pub(crate) fn set_enabled(&mut self, is_enabled: bool) {
        self.is_enabled = is_enabled;
    }

    /// Returns `true` if the body is linear.
    #[inline]
    pub fn is_linear(&self) -> bool {
        self.expression.is_linear()
    }

    /// Returns the linear form of the body, if any.
    #[inline]
    pub fn linear_form(&self) -> Option<&LinearForm> {
        self.expression.body().linear()
    }

    /// Returns the classification tag.
    #[inline(always)]
    pub fn classification(&self) -> ConstraintClassification {
        self.classification
    }

    pub(crate) fn set_classification(&mut self, classification: ConstraintClassification) {
        self.classification = classification;
    }

    /// Returns the cached constraint value.
    #[inline(always)]
    pub fn constraint_value(&self) -> f64 {
        self.constraint_value
    }

    /// Returns the cached violation magnitude.
    #[inline(always)]
    pub fn violation_value(&self) -> f64 {
        self.violation_value
    }

    /// Refreshes the cached constraint and violation values.
    #[inline]
    pub(crate) fn set_constraint_value(&mut self, value: f64) {
        self.constraint_value = value;
        self.violation_value = self.sense.violation(value);
        self.expression.set_value(value);
    }

    /// Returns the violation a candidate constraint value would incur.
    #[inline(always)]
    pub fn violation_of(&self, value: f64) -> f64 {
        self.sense.violation(value)
    }

    pub(crate) fn set_body(&mut self, body: ExpressionBody<V>) {
        self.expression.set_body(body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(entries: &[(f64, bool)]) -> Vec<ClassificationTerm> {
        entries
            .iter()
            .map(|&(coefficient, is_binary)| ClassificationTerm {
                coefficient,
                is_binary,
            })
            .collect()
    }

    #[test]
    fn test_violation_by_sense() {
        assert_eq!(ConstraintSense::LessEqual.violation(2.5), 2.5);
        assert_eq!(ConstraintSense::LessEqual.violation(-1.0), 0.0);
        assert_eq!(ConstraintSense::Equal.violation(-3.0), 3.0);
        assert_eq!(ConstraintSense::Equal.violation(3.0), 3.0);
        assert_eq!(ConstraintSense::GreaterEqual.violation(-2.0), 2.0);
        assert_eq!(ConstraintSense::GreaterEqual.violation(1.0), 0.0);
    }

    #[test]
    fn test_classify_singleton() {
        let terms = terms(&[(3.0, false)]);
        assert_eq!(
            classify(&terms, 10.0, ConstraintSense::LessEqual),
            ConstraintClassification::Singleton
        );
    }

    #[test]
    fn test_classify_two_variable_shapes() {
        // 2x + 3y = 10 with integer variables lands in Aggregation.
        let aggregation = terms(&[(2.0, false), (3.0, false)]);
        assert_eq!(
            classify(&aggregation, 10.0, ConstraintSense::Equal),
            ConstraintClassification::Aggregation
        );

        // x - y <= 2 is a precedence row.
        let precedence = terms(&[(1.0, false), (-1.0, false)]);
        assert_eq!(
            classify(&precedence, 2.0, ConstraintSense::LessEqual),
            ConstraintClassification::Precedence
        );

        // 2x + 3y <= 10 bounds one variable by the other.
        let variable_bound = terms(&[(2.0, true), (3.0, true)]);
        assert_eq!(
            classify(&variable_bound, 10.0, ConstraintSense::LessEqual),
            ConstraintClassification::VariableBound
        );
    }

    #[test]
    fn test_classify_set_shapes() {
        let unit = terms(&[(1.0, true), (1.0, true), (1.0, true)]);
        assert_eq!(
            classify(&unit, 1.0, ConstraintSense::Equal),
            ConstraintClassification::SetPartitioning
        );
        assert_eq!(
            classify(&unit, 1.0, ConstraintSense::LessEqual),
            ConstraintClassification::SetPacking
        );
        assert_eq!(
            classify(&unit, 1.0, ConstraintSense::GreaterEqual),
            ConstraintClassification::SetCovering
        );
        assert_eq!(
            classify(&unit, 2.0, ConstraintSense::Equal),
            ConstraintClassification::Cardinality
        );
        assert_eq!(
            classify(&unit, 2.0, ConstraintSense::LessEqual),
            ConstraintClassification::InvariantKnapsack
        );
    }

    #[test]
    fn test_classify_knapsack_shapes() {
        let mixed = terms(&[(2.0, true), (3.0, true), (5.0, true)]);
        assert_eq!(
            classify(&mixed, 7.0, ConstraintSense::Equal),
            ConstraintClassification::EquationKnapsack
        );
        assert_eq!(
            classify(&mixed, 7.0, ConstraintSense::LessEqual),
            ConstraintClassification::Knapsack
        );

        // One capacity term matching the right-hand side, unit items.
        let bin_packing = terms(&[(4.0, true), (1.0, true), (1.0, true)]);
        assert_eq!(
            classify(&bin_packing, 4.0, ConstraintSense::LessEqual),
            ConstraintClassification::BinPacking
        );

        let integer = terms(&[(2.0, false), (3.0, false), (1.0, false)]);
        assert_eq!(
            classify(&integer, 7.0, ConstraintSense::LessEqual),
            ConstraintClassification::IntegerKnapsack
        );
    }

    #[test]
    fn test_classify_general_linear() {
        let fractional = terms(&[(0.5, true), (1.5, true), (1.0, true)]);
        assert_eq!(
            classify(&fractional, 2.0, ConstraintSense::LessEqual),
            ConstraintClassification::GeneralLinear
        );

        let mixed_sign = terms(&[(1.0, false), (-2.0, false), (3.0, false)]);
        assert_eq!(
            classify(&mixed_sign, 0.0, ConstraintSense::Equal),
            ConstraintClassification::GeneralLinear
        );
    }

    #[test]
    fn test_constraint_cache_refresh() {
        let mut constraint: Constraint<i64> = Constraint::new(ConstraintRef::from_raw(0, 0));
        constraint.set_sense(ConstraintSense::GreaterEqual);
        constraint.set_constraint_value(-2.5);
        assert_eq!(constraint.constraint_value(), -2.5);
        assert_eq!(constraint.violation_value(), 2.5);

        constraint.set_constraint_value(1.0);
        assert_eq!(constraint.violation_value(), 0.0);
    }
}
