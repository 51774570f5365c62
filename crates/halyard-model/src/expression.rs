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

//! Sparse linear forms and the expression entity.
//!
//! An expression body is either a sparse linear form `Σ aᵢ·xᵢ + c` or an
//! opaque evaluation callback. Linear bodies support incremental evaluation
//! under a move; callback bodies mark the model nonlinear and force full
//! recomputation on every evaluation.
//!
//! Expressions are built through the fluent [`LinearBuilder`]:
//!
//! ```rust
//! use halyard_model::expression::LinearBuilder;
//! use halyard_model::index::VariableRef;
//!
//! let x = VariableRef::from_raw(0, 0);
//! let y = VariableRef::from_raw(0, 1);
//! // 2x + 3y - 5 <= 0, i.e. 2x + 3y <= 5
//! let definition = LinearBuilder::new().add(2.0, x).add(3.0, y).leq(5.0);
//! ```

use crate::constraint::ConstraintSense;
use crate::index::{ExpressionRef, VariableRef};
use crate::proxy::ValueProxy;
use halyard_core::num::VariableValue;
use std::collections::BTreeMap;

/// A sparse linear form `Σ aᵢ·xᵢ + c`.
///
/// Coefficients are keyed by variable reference in a `BTreeMap` so iteration
/// order is deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearForm {
    coefficients: BTreeMap<VariableRef, f64>,
    constant: f64,
}

impl LinearForm {
    /// Creates an empty form (the constant `0`).
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the coefficient map.
    #[inline(always)]
    pub fn coefficients(&self) -> &BTreeMap<VariableRef, f64> {
        &self.coefficients
    }

    /// Returns the constant term.
    #[inline(always)]
    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Returns the coefficient of `variable`, or `0.0` if absent.
    #[inline]
    pub fn coefficient(&self, variable: VariableRef) -> f64 {
        self.coefficients.get(&variable).copied().unwrap_or(0.0)
    }

    /// Returns the number of terms.
    #[inline]
    pub fn number_of_terms(&self) -> usize {
        self.coefficients.len()
    }

    pub(crate) fn add_term(&mut self, coefficient: f64, variable: VariableRef) {
        let entry = self.coefficients.entry(variable).or_insert(0.0);
        *entry += coefficient;
        if *entry == 0.0 {
            self.coefficients.remove(&variable);
        }
    }

    pub(crate) fn add_constant(&mut self, constant: f64) {
        self.constant += constant;
    }

    pub(crate) fn negate(&mut self) {
        for coefficient in self.coefficients.values_mut() {
            *coefficient = -*coefficient;
        }
        self.constant = -self.constant;
    }
}

/// Fluent builder for linear expressions, objectives, and constraints.
#[derive(Debug, Clone, Default)]
pub struct LinearBuilder {
    form: LinearForm,
}

impl LinearBuilder {
    /// Creates an empty builder.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `coefficient · variable` to the form. Terms on the same
    /// variable accumulate.
    #[inline]
    pub fn add(mut self, coefficient: f64, variable: VariableRef) -> Self {
        self.form.add_term(coefficient, variable);
        self
    }

    /// Adds a constant term.
    #[inline]
    pub fn constant(mut self, constant: f64) -> Self {
        self.form.add_constant(constant);
        self
    }

    /// Finishes the builder into a bare linear form.
    #[inline]
    pub fn build(self) -> LinearForm {
        self.form
    }

    /// Builds the constraint `form ≤ rhs` in canonical `e ⋄ 0` shape.
    #[inline]
    pub fn leq(self, rhs: f64) -> ConstraintDefinition {
        self.sensed(ConstraintSense::LessEqual, rhs)
    }

    /// Builds the constraint `form = rhs` in canonical `e ⋄ 0` shape.
    #[inline]
    pub fn eq(self, rhs: f64) -> ConstraintDefinition {
        self.sensed(ConstraintSense::Equal, rhs)
    }

    /// Builds the constraint `form ≥ rhs` in canonical `e ⋄ 0` shape.
    #[inline]
    pub fn geq(self, rhs: f64) -> ConstraintDefinition {
        self.sensed(ConstraintSense::GreaterEqual, rhs)
    }

    fn sensed(mut self, sense: ConstraintSense, rhs: f64) -> ConstraintDefinition {
        self.form.add_constant(-rhs);
        ConstraintDefinition {
            form: self.form,
            sense,
        }
    }
}

/// A linear constraint definition: a canonical form plus a sense.
#[derive(Debug, Clone)]
pub struct ConstraintDefinition {
    pub form: LinearForm,
    pub sense: ConstraintSense,
}

/// The type of opaque evaluation callbacks.
///
/// The callback receives the full candidate variable assignment and returns
/// the value of the expression. It is invoked only on the full-recomputation
/// path; it must be pure with respect to the passed values.
pub type EvaluationCallback<V> = Box<dyn Fn(&[ValueProxy<V>]) -> f64 + Send>;

/// The body of an expression: a sparse linear form or an opaque callback.
pub enum ExpressionBody<V>
where
    V: VariableValue,
{
    Linear(LinearForm),
    Callback(EvaluationCallback<V>),
}

impl<V> ExpressionBody<V>
where
    V: VariableValue,
{
    /// Returns `true` if this body is a linear form.
    #[inline]
    pub fn is_linear(&self) -> bool {
        matches!(self, ExpressionBody::Linear(_))
    }

    /// Returns the linear form, if any.
    #[inline]
    pub fn linear(&self) -> Option<&LinearForm> {
        match self {
            ExpressionBody::Linear(form) => Some(form),
            ExpressionBody::Callback(_) => None,
        }
    }

    /// Evaluates the body against a full variable assignment.
    pub fn evaluate(&self, values: &[ValueProxy<V>]) -> f64 {
        match self {
            ExpressionBody::Linear(form) => {
                let mut result = form.constant();
                for (&variable, &coefficient) in form.coefficients() {
                    let value = values[variable.proxy().get()].flat(variable.flat().get());
                    result += coefficient * value.as_f64();
                }
                result
            }
            ExpressionBody::Callback(callback) => callback(values),
        }
    }
}

impl<V> std::fmt::Debug for ExpressionBody<V>
where
    V: VariableValue,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpressionBody::Linear(form) => f.debug_tuple("Linear").field(form).finish(),
            ExpressionBody::Callback(_) => f.debug_tuple("Callback").finish(),
        }
    }
}

/// An expression entity: a body plus cached evaluation state.
#[derive(Debug)]
pub struct Expression<V>
where
    V: VariableValue,
{
    reference: ExpressionRef,
    label: String,
    body: ExpressionBody<V>,
    value: f64,
    fixed_term: f64,
}

impl<V> Expression<V>
where
    V: VariableValue,
{
    /// Creates an expression with an empty linear body.
    pub fn new(reference: ExpressionRef) -> Self {
        Self {
            reference,
            label: String::new(),
            body: ExpressionBody::Linear(LinearForm::new()),
            value: 0.0,
            fixed_term: 0.0,
        }
    }

    /// Returns the `(proxy, flat)` reference of this expression.
    #[inline(always)]
    pub fn reference(&self) -> ExpressionRef {
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

    /// Returns the body.
    #[inline(always)]
    pub fn body(&self) -> &ExpressionBody<V> {
        &self.body
    }

    pub(crate) fn set_body(&mut self, body: ExpressionBody<V>) {
        self.body = body;
    }

    /// Returns `true` if the body is linear.
    #[inline]
    pub fn is_linear(&self) -> bool {
        self.body.is_linear()
    }

    /// Returns the cached value.
    #[inline(always)]
    pub fn value(&self) -> f64 {
        self.value
    }

    pub(crate) fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub(crate) fn add_to_value(&mut self, delta: f64) {
        self.value += delta;
    }

    /// Returns the precomputed constant contribution of fixed variables
    /// (including the constant term itself).
    #[inline(always)]
    pub fn fixed_term(&self) -> f64 {
        self.fixed_term
    }

    pub(crate) fn set_fixed_term(&mut self, fixed_term: f64) {
        self.fixed_term = fixed_term;
    }

    /// Returns the coefficient of `variable`, or `0.0` for callback bodies.
    #[inline]
    pub fn coefficient(&self, variable: VariableRef) -> f64 {
        match &self.body {
            ExpressionBody::Linear(form) => form.coefficient(variable),
            ExpressionBody::Callback(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(flat: usize) -> VariableRef {
        VariableRef::from_raw(0, flat)
    }

    #[test]
    fn test_builder_accumulates_terms() {
        let form = LinearBuilder::new()
            .add(2.0, var(0))
            .add(3.0, var(1))
            .add(1.5, var(0))
            .constant(4.0)
            .build();
        assert_eq!(form.coefficient(var(0)), 3.5);
        assert_eq!(form.coefficient(var(1)), 3.0);
        assert_eq!(form.constant(), 4.0);
        assert_eq!(form.number_of_terms(), 2);
    }

    #[test]
    fn test_builder_drops_cancelled_terms() {
        let form = LinearBuilder::new()
            .add(2.0, var(0))
            .add(-2.0, var(0))
            .build();
        assert_eq!(form.number_of_terms(), 0);
        assert_eq!(form.coefficient(var(0)), 0.0);
    }

    #[test]
    fn test_sensed_builders_fold_rhs_into_constant() {
        let definition = LinearBuilder::new().add(1.0, var(0)).leq(5.0);
        assert_eq!(definition.sense, ConstraintSense::LessEqual);
        assert_eq!(definition.form.constant(), -5.0);

        let definition = LinearBuilder::new().add(2.0, var(1)).eq(4.0);
        assert_eq!(definition.sense, ConstraintSense::Equal);
        assert_eq!(definition.form.constant(), -4.0);

        let definition = LinearBuilder::new().add(8.0, var(2)).geq(20.0);
        assert_eq!(definition.sense, ConstraintSense::GreaterEqual);
        assert_eq!(definition.form.constant(), -20.0);
    }

    #[test]
    fn test_body_evaluation() {
        use halyard_core::array::ArrayShape;

        let values = vec![ValueProxy::new(ArrayShape::one_dimensional(0, 3), 0i64)];
        let mut values = values;
        values[0].set_flat(0, 2);
        values[0].set_flat(1, -1);

        let body: ExpressionBody<i64> = ExpressionBody::Linear(
            LinearBuilder::new()
                .add(3.0, var(0))
                .add(4.0, var(1))
                .constant(1.0)
                .build(),
        );
        assert_eq!(body.evaluate(&values), 3.0 * 2.0 + 4.0 * (-1.0) + 1.0);

        let callback: ExpressionBody<i64> = ExpressionBody::Callback(Box::new(|values| {
            values[0].flat(0) as f64 * values[0].flat(1) as f64
        }));
        assert!(!callback.is_linear());
        assert_eq!(callback.evaluate(&values), -2.0);
    }

    #[test]
    fn test_negate() {
        let mut form = LinearBuilder::new()
            .add(2.0, var(0))
            .constant(-3.0)
            .build();
        form.negate();
        assert_eq!(form.coefficient(var(0)), -2.0);
        assert_eq!(form.constant(), 3.0);
    }
}
