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

//! The model arena and the incremental evaluation kernel.
//!
//! The `Model` exclusively owns every variable, expression, constraint, and
//! selection group. All cross-references are `(proxy, flat)` index pairs.
//! `evaluate` scores a candidate move without mutating anything; `apply` is
//! the single write path that commits a move and refreshes every cache with
//! the same delta formulas, so the two can never drift apart.
//!
//! Internally every objective is a minimization; `maximize` negates the
//! stored objective and `sign()` is applied on external read.

use crate::constraint::{
    ClassificationTerm, Constraint, ConstraintClassification, ConstraintSense, classify,
};
use crate::error::{ModelError, ModelResult};
use crate::expression::{
    ConstraintDefinition, EvaluationCallback, Expression, ExpressionBody, LinearBuilder,
};
use crate::index::{ConstraintRef, ExpressionRef, FlatIndex, ProxyIndex, VariableRef};
use crate::mv::Move;
use crate::proxy::{ConstraintProxy, ExpressionProxy, ValueProxy, VariableProxy};
use crate::selection::{Selection, SelectionMode};
use crate::solution::{
    ModelSummary, NamedSolution, NamedValues, PlainSolution, Solution, SolutionScore,
    is_feasible_total,
};
use crate::variable::{Variable, VariableSense};
use halyard_core::array::ArrayShape;
use halyard_core::num::{EPSILON, VariableValue};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Maximum number of variable proxies a model may hold.
///
/// The proxy vectors are pre-reserved to these limits so that references
/// into them stay valid across further `create_*` calls.
pub const MAX_NUMBER_OF_VARIABLE_PROXIES: usize = 100;

/// Maximum number of expression proxies a model may hold.
pub const MAX_NUMBER_OF_EXPRESSION_PROXIES: usize = 100;

/// Maximum number of constraint proxies a model may hold.
pub const MAX_NUMBER_OF_CONSTRAINT_PROXIES: usize = 100;

/// The action a user callback requests from the solver.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CallbackAction {
    Continue,
    Stop,
}

/// The user callback type, polled once per outer-loop iteration.
pub type UserCallback =
    Box<dyn FnMut() -> Result<CallbackAction, Box<dyn std::error::Error + Send + Sync>> + Send>;

/// Switches consumed by `Model::setup`.
#[derive(Clone, Copy, Debug)]
pub struct SetupOptions {
    pub is_enabled_presolve: bool,
    pub is_enabled_initial_value_correction: bool,
    pub selection_mode: SelectionMode,
}

impl Default for SetupOptions {
    fn default() -> Self {
        Self {
            is_enabled_presolve: true,
            is_enabled_initial_value_correction: true,
            selection_mode: SelectionMode::None,
        }
    }
}

/// Per-category variable counts computed during setup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VariableCategoryCounts {
    pub total: usize,
    pub fixed: usize,
    pub binary: usize,
    pub integer: usize,
    pub selection: usize,
}

macro_rules! define_vector_handle {
    ($(#[$meta:meta])* $name:ident, $reference:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug)]
        pub struct $name {
            proxy: ProxyIndex,
            len: usize,
        }

        impl $name {
            pub(crate) fn new(proxy: ProxyIndex, len: usize) -> Self {
                Self { proxy, len }
            }

            /// Returns the reference of the element at `flat`.
            ///
            /// # Panics
            ///
            /// Panics in debug builds if `flat` is out of bounds.
            #[inline]
            pub fn at(&self, flat: usize) -> $reference {
                debug_assert!(
                    flat < self.len,
                    "called `{}::at` with flat index out of bounds: the len is {} but the index is {}",
                    stringify!($name),
                    self.len,
                    flat
                );
                $reference::new(self.proxy, FlatIndex::new(flat))
            }

            /// Returns the number of elements.
            #[inline(always)]
            pub fn len(&self) -> usize {
                self.len
            }

            /// Returns `true` if the handle addresses no elements.
            #[inline(always)]
            pub fn is_empty(&self) -> bool {
                self.len == 0
            }

            /// Returns the proxy position.
            #[inline(always)]
            pub fn proxy(&self) -> ProxyIndex {
                self.proxy
            }
        }
    };
}

define_vector_handle!(
    /// A handle to a 1-D block of variables.
    VariableVector,
    VariableRef
);

define_vector_handle!(
    /// A handle to a 1-D block of expressions.
    ExpressionVector,
    ExpressionRef
);

define_vector_handle!(
    /// A handle to a 1-D block of constraints.
    ConstraintVector,
    ConstraintRef
);

enum ObjectiveBody<V>
where
    V: VariableValue,
{
    Undefined,
    Defined(ExpressionBody<V>),
}

/// The model arena.
pub struct Model<V>
where
    V: VariableValue,
{
    name: String,
    variable_proxies: Vec<VariableProxy<V>>,
    variable_base_names: Vec<String>,
    expression_proxies: Vec<ExpressionProxy<V>>,
    expression_base_names: Vec<String>,
    constraint_proxies: Vec<ConstraintProxy<V>>,
    constraint_base_names: Vec<String>,
    objective: ObjectiveBody<V>,
    objective_value: f64,
    objective_fixed_term: f64,
    is_minimization: bool,
    is_linear: bool,
    is_solved: bool,
    total_violation: f64,
    selections: Vec<Selection>,
    nonlinear_constraints: Vec<ConstraintRef>,
    variable_counts: VariableCategoryCounts,
    callback: Option<UserCallback>,
}

fn validate_name(name: &str) -> ModelResult<()> {
    let mut characters = name.chars();
    let valid_head = characters
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_tail = characters.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid_head || !valid_tail {
        return Err(ModelError::InvalidName {
            name: name.to_string(),
            detail: "names must match [A-Za-z_][A-Za-z_0-9]*".to_string(),
        });
    }
    Ok(())
}

fn register_name(names: &mut Vec<String>, name: &str) -> ModelResult<()> {
    validate_name(name)?;
    if names.iter().any(|existing| existing == name) {
        return Err(ModelError::InvalidName {
            name: name.to_string(),
            detail: "a proxy with this name already exists".to_string(),
        });
    }
    names.push(name.to_string());
    Ok(())
}

impl<V> Model<V>
where
    V: VariableValue,
{
    /// Creates an empty model.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            variable_proxies: Vec::with_capacity(MAX_NUMBER_OF_VARIABLE_PROXIES),
            variable_base_names: Vec::with_capacity(MAX_NUMBER_OF_VARIABLE_PROXIES),
            expression_proxies: Vec::with_capacity(MAX_NUMBER_OF_EXPRESSION_PROXIES),
            expression_base_names: Vec::with_capacity(MAX_NUMBER_OF_EXPRESSION_PROXIES),
            constraint_proxies: Vec::with_capacity(MAX_NUMBER_OF_CONSTRAINT_PROXIES),
            constraint_base_names: Vec::with_capacity(MAX_NUMBER_OF_CONSTRAINT_PROXIES),
            objective: ObjectiveBody::Undefined,
            objective_value: 0.0,
            objective_fixed_term: 0.0,
            is_minimization: true,
            is_linear: true,
            is_solved: false,
            total_violation: 0.0,
            selections: Vec::new(),
            nonlinear_constraints: Vec::new(),
            variable_counts: VariableCategoryCounts::default(),
            callback: None,
        }
    }

    // ------------------------------------------------------------------
    // Construction API
    // ------------------------------------------------------------------

    /// Creates a scalar variable with the full integer range as bounds.
    pub fn create_variable(&mut self, name: &str) -> ModelResult<VariableRef> {
        self.create_bounded_variable(name, V::min_value(), V::max_value())
    }

    /// Creates a scalar variable with bounds `[lower, upper]`.
    pub fn create_bounded_variable(
        &mut self,
        name: &str,
        lower: V,
        upper: V,
    ) -> ModelResult<VariableRef> {
        let vector = self.create_variable_block(name, &[1], lower, upper)?;
        Ok(vector.at(0))
    }

    /// Creates a 1-D block of variables with the full integer range.
    pub fn create_variables(
        &mut self,
        name: &str,
        number_of_elements: usize,
    ) -> ModelResult<VariableVector> {
        self.create_bounded_variables(name, number_of_elements, V::min_value(), V::max_value())
    }

    /// Creates a 1-D block of variables with bounds `[lower, upper]`.
    pub fn create_bounded_variables(
        &mut self,
        name: &str,
        number_of_elements: usize,
        lower: V,
        upper: V,
    ) -> ModelResult<VariableVector> {
        self.create_variable_block(name, &[number_of_elements], lower, upper)
    }

    /// Creates an N-D block of variables; element references are obtained
    /// with [`Model::variable_reference`].
    pub fn create_variable_array(
        &mut self,
        name: &str,
        shape: &[usize],
        lower: V,
        upper: V,
    ) -> ModelResult<ProxyIndex> {
        let vector = self.create_variable_block(name, shape, lower, upper)?;
        Ok(vector.proxy())
    }

    fn create_variable_block(
        &mut self,
        name: &str,
        shape: &[usize],
        lower: V,
        upper: V,
    ) -> ModelResult<VariableVector> {
        if lower > upper {
            return Err(ModelError::InvalidOption(format!(
                "lower bound {} exceeds upper bound {} for `{}`",
                lower, upper, name
            )));
        }
        if self.variable_proxies.len() >= MAX_NUMBER_OF_VARIABLE_PROXIES {
            return Err(ModelError::TooManyProxies {
                kind: "variable",
                limit: MAX_NUMBER_OF_VARIABLE_PROXIES,
            });
        }
        register_name(&mut self.variable_base_names, name)?;

        let proxy_index = ProxyIndex::new(self.variable_proxies.len());
        let array_shape = ArrayShape::new(proxy_index.get(), shape);
        let number_of_elements = array_shape.number_of_elements();
        let variables = (0..number_of_elements)
            .map(|flat| {
                Variable::new(
                    VariableRef::new(proxy_index, FlatIndex::new(flat)),
                    lower,
                    upper,
                )
            })
            .collect();
        self.variable_proxies
            .push(VariableProxy::new(array_shape, variables));
        Ok(VariableVector::new(proxy_index, number_of_elements))
    }

    /// Returns the reference of the variable at `index` in an N-D block.
    pub fn variable_reference(&self, proxy: ProxyIndex, index: &[usize]) -> VariableRef {
        let shape = self.variable_proxies[proxy.get()].shape();
        VariableRef::new(proxy, FlatIndex::new(shape.flat_index(index)))
    }

    /// Creates a scalar expression with an empty body.
    pub fn create_expression(&mut self, name: &str) -> ModelResult<ExpressionRef> {
        let vector = self.create_expression_block(name, &[1])?;
        Ok(vector.at(0))
    }

    /// Creates a scalar expression and defines its body in one step.
    pub fn create_expression_with(
        &mut self,
        name: &str,
        builder: LinearBuilder,
    ) -> ModelResult<ExpressionRef> {
        let reference = self.create_expression(name)?;
        self.define_expression(reference, builder);
        Ok(reference)
    }

    /// Creates a 1-D block of expressions with empty bodies.
    pub fn create_expressions(
        &mut self,
        name: &str,
        number_of_elements: usize,
    ) -> ModelResult<ExpressionVector> {
        self.create_expression_block(name, &[number_of_elements])
    }

    /// Creates an N-D block of expressions; element references are obtained
    /// with [`Model::expression_reference`].
    pub fn create_expression_array(
        &mut self,
        name: &str,
        shape: &[usize],
    ) -> ModelResult<ProxyIndex> {
        let vector = self.create_expression_block(name, shape)?;
        Ok(vector.proxy())
    }

    /// Returns the reference of the expression at `index` in an N-D block.
    pub fn expression_reference(&self, proxy: ProxyIndex, index: &[usize]) -> ExpressionRef {
        let shape = self.expression_proxies[proxy.get()].shape();
        ExpressionRef::new(proxy, FlatIndex::new(shape.flat_index(index)))
    }

    fn create_expression_block(
        &mut self,
        name: &str,
        shape: &[usize],
    ) -> ModelResult<ExpressionVector> {
        if self.expression_proxies.len() >= MAX_NUMBER_OF_EXPRESSION_PROXIES {
            return Err(ModelError::TooManyProxies {
                kind: "expression",
                limit: MAX_NUMBER_OF_EXPRESSION_PROXIES,
            });
        }
        register_name(&mut self.expression_base_names, name)?;

        let proxy_index = ProxyIndex::new(self.expression_proxies.len());
        let array_shape = ArrayShape::new(proxy_index.get(), shape);
        let number_of_elements = array_shape.number_of_elements();
        let expressions = (0..number_of_elements)
            .map(|flat| Expression::new(ExpressionRef::new(proxy_index, FlatIndex::new(flat))))
            .collect();
        self.expression_proxies
            .push(ExpressionProxy::new(array_shape, expressions));
        Ok(ExpressionVector::new(proxy_index, number_of_elements))
    }

    /// Defines the linear body of an expression created earlier.
    pub fn define_expression(&mut self, reference: ExpressionRef, builder: LinearBuilder) {
        self.expression_proxies[reference.proxy().get()]
            .element_mut(reference.flat().get())
            .set_body(ExpressionBody::Linear(builder.build()));
    }

    /// Creates a scalar constraint with an undefined body.
    pub fn create_constraint(&mut self, name: &str) -> ModelResult<ConstraintRef> {
        let vector = self.create_constraint_block(name, &[1])?;
        Ok(vector.at(0))
    }

    /// Creates a scalar constraint and defines it in one step.
    pub fn create_constraint_with(
        &mut self,
        name: &str,
        definition: ConstraintDefinition,
    ) -> ModelResult<ConstraintRef> {
        let reference = self.create_constraint(name)?;
        self.define_constraint(reference, definition);
        Ok(reference)
    }

    /// Creates a 1-D block of constraints with undefined bodies.
    pub fn create_constraints(
        &mut self,
        name: &str,
        number_of_elements: usize,
    ) -> ModelResult<ConstraintVector> {
        self.create_constraint_block(name, &[number_of_elements])
    }

    /// Creates an N-D block of constraints; element references are obtained
    /// with [`Model::constraint_reference`].
    pub fn create_constraint_array(
        &mut self,
        name: &str,
        shape: &[usize],
    ) -> ModelResult<ProxyIndex> {
        let vector = self.create_constraint_block(name, shape)?;
        Ok(vector.proxy())
    }

    /// Returns the reference of the constraint at `index` in an N-D block.
    pub fn constraint_reference(&self, proxy: ProxyIndex, index: &[usize]) -> ConstraintRef {
        let shape = self.constraint_proxies[proxy.get()].shape();
        ConstraintRef::new(proxy, FlatIndex::new(shape.flat_index(index)))
    }

    fn create_constraint_block(
        &mut self,
        name: &str,
        shape: &[usize],
    ) -> ModelResult<ConstraintVector> {
        if self.constraint_proxies.len() >= MAX_NUMBER_OF_CONSTRAINT_PROXIES {
            return Err(ModelError::TooManyProxies {
                kind: "constraint",
                limit: MAX_NUMBER_OF_CONSTRAINT_PROXIES,
            });
        }
        register_name(&mut self.constraint_base_names, name)?;

        let proxy_index = ProxyIndex::new(self.constraint_proxies.len());
        let array_shape = ArrayShape::new(proxy_index.get(), shape);
        let number_of_elements = array_shape.number_of_elements();
        let constraints = (0..number_of_elements)
            .map(|flat| Constraint::new(ConstraintRef::new(proxy_index, FlatIndex::new(flat))))
            .collect();
        self.constraint_proxies
            .push(ConstraintProxy::new(array_shape, constraints));
        Ok(ConstraintVector::new(proxy_index, number_of_elements))
    }

    /// Defines the linear body and sense of a constraint created earlier.
    pub fn define_constraint(&mut self, reference: ConstraintRef, definition: ConstraintDefinition) {
        let constraint = self.constraint_proxies[reference.proxy().get()]
            .element_mut(reference.flat().get());
        constraint.set_body(ExpressionBody::Linear(definition.form));
        constraint.set_sense(definition.sense);
    }

    /// Defines an opaque nonlinear constraint body. This marks the model
    /// nonlinear and disables the incremental delta path for this row.
    pub fn define_nonlinear_constraint(
        &mut self,
        reference: ConstraintRef,
        callback: EvaluationCallback<V>,
        sense: ConstraintSense,
    ) {
        let constraint = self.constraint_proxies[reference.proxy().get()]
            .element_mut(reference.flat().get());
        constraint.set_body(ExpressionBody::Callback(callback));
        constraint.set_sense(sense);
    }

    /// Sets the objective to minimize the given linear form.
    pub fn minimize(&mut self, builder: LinearBuilder) {
        self.is_minimization = true;
        self.objective = ObjectiveBody::Defined(ExpressionBody::Linear(builder.build()));
    }

    /// Sets the objective to maximize the given linear form.
    ///
    /// The form is negated so the stored objective is a minimization; the
    /// sign is re-applied on external read.
    pub fn maximize(&mut self, builder: LinearBuilder) {
        self.is_minimization = false;
        let mut form = builder.build();
        form.negate();
        self.objective = ObjectiveBody::Defined(ExpressionBody::Linear(form));
    }

    /// Sets an opaque callback objective to minimize.
    pub fn minimize_with_callback(&mut self, callback: EvaluationCallback<V>) {
        self.is_minimization = true;
        self.objective = ObjectiveBody::Defined(ExpressionBody::Callback(callback));
    }

    /// Sets an opaque callback objective to maximize.
    pub fn maximize_with_callback(&mut self, callback: EvaluationCallback<V>) {
        self.is_minimization = false;
        let negated: EvaluationCallback<V> = Box::new(move |values| -callback(values));
        self.objective = ObjectiveBody::Defined(ExpressionBody::Callback(negated));
    }

    /// Installs the user callback polled once per outer-loop iteration.
    pub fn set_callback(&mut self, callback: UserCallback) {
        self.callback = Some(callback);
    }

    /// Polls the user callback, if any.
    pub fn invoke_callback(&mut self) -> ModelResult<CallbackAction> {
        match self.callback.as_mut() {
            Some(callback) => callback().map_err(ModelError::UserCallback),
            None => Ok(CallbackAction::Continue),
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Returns the model name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the objective and every constraint are linear.
    #[inline(always)]
    pub fn is_linear(&self) -> bool {
        self.is_linear
    }

    /// Returns `true` if this model went through a solve already.
    #[inline(always)]
    pub fn is_solved(&self) -> bool {
        self.is_solved
    }

    /// Latches the solved flag; a second solve fails with `AlreadySolved`.
    pub fn mark_solved(&mut self) -> ModelResult<()> {
        if self.is_solved {
            return Err(ModelError::AlreadySolved);
        }
        self.is_solved = true;
        Ok(())
    }

    /// Returns `true` if the model minimizes its objective.
    #[inline(always)]
    pub fn is_minimization(&self) -> bool {
        self.is_minimization
    }

    /// Returns the external sign: `+1` for minimization, `−1` for
    /// maximization.
    #[inline(always)]
    pub fn sign(&self) -> f64 {
        if self.is_minimization { 1.0 } else { -1.0 }
    }

    /// Returns `true` if an objective was defined.
    #[inline]
    pub fn is_defined_objective(&self) -> bool {
        matches!(self.objective, ObjectiveBody::Defined(_))
    }

    /// Returns the cached internal (minimization) objective value.
    #[inline(always)]
    pub fn objective_value(&self) -> f64 {
        self.objective_value
    }

    /// Returns the cached total violation over enabled constraints.
    #[inline(always)]
    pub fn total_violation(&self) -> f64 {
        self.total_violation
    }

    /// Returns the extracted selection groups.
    #[inline(always)]
    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// Returns the per-category variable counts.
    #[inline(always)]
    pub fn variable_counts(&self) -> &VariableCategoryCounts {
        &self.variable_counts
    }

    /// Returns the number of variables that are not fixed.
    #[inline]
    pub fn number_of_not_fixed_variables(&self) -> usize {
        self.variable_counts.total - self.variable_counts.fixed
    }

    /// Returns the variable proxies.
    #[inline(always)]
    pub fn variable_proxies(&self) -> &[VariableProxy<V>] {
        &self.variable_proxies
    }

    /// Returns the expression proxies.
    #[inline(always)]
    pub fn expression_proxies(&self) -> &[ExpressionProxy<V>] {
        &self.expression_proxies
    }

    /// Returns the constraint proxies.
    #[inline(always)]
    pub fn constraint_proxies(&self) -> &[ConstraintProxy<V>] {
        &self.constraint_proxies
    }

    /// Returns the base names of the variable proxies.
    #[inline(always)]
    pub fn variable_base_names(&self) -> &[String] {
        &self.variable_base_names
    }

    /// Returns the base names of the constraint proxies.
    #[inline(always)]
    pub fn constraint_base_names(&self) -> &[String] {
        &self.constraint_base_names
    }

    /// Returns the variable addressed by `reference`.
    #[inline(always)]
    pub fn variable(&self, reference: VariableRef) -> &Variable<V> {
        debug_assert!(
            reference.proxy().get() < self.variable_proxies.len(),
            "called `Model::variable` with proxy index out of bounds: the len is {} but the index is {}",
            self.variable_proxies.len(),
            reference.proxy().get()
        );
        self.variable_proxies[reference.proxy().get()].element(reference.flat().get())
    }

    pub(crate) fn variable_mut(&mut self, reference: VariableRef) -> &mut Variable<V> {
        self.variable_proxies[reference.proxy().get()].element_mut(reference.flat().get())
    }

    pub(crate) fn variable_proxies_mut(&mut self) -> &mut [VariableProxy<V>] {
        &mut self.variable_proxies
    }

    /// Returns the expression addressed by `reference`.
    #[inline(always)]
    pub fn expression(&self, reference: ExpressionRef) -> &Expression<V> {
        self.expression_proxies[reference.proxy().get()].element(reference.flat().get())
    }

    /// Returns the constraint addressed by `reference`.
    #[inline(always)]
    pub fn constraint(&self, reference: ConstraintRef) -> &Constraint<V> {
        debug_assert!(
            reference.proxy().get() < self.constraint_proxies.len(),
            "called `Model::constraint` with proxy index out of bounds: the len is {} but the index is {}",
            self.constraint_proxies.len(),
            reference.proxy().get()
        );
        self.constraint_proxies[reference.proxy().get()].element(reference.flat().get())
    }

    pub(crate) fn constraint_mut(&mut self, reference: ConstraintRef) -> &mut Constraint<V> {
        self.constraint_proxies[reference.proxy().get()].element_mut(reference.flat().get())
    }

    /// Returns the total number of variables across all proxies.
    pub fn number_of_variables(&self) -> usize {
        self.variable_proxies
            .iter()
            .map(|proxy| proxy.number_of_elements())
            .sum()
    }

    /// Returns the total number of constraints across all proxies.
    pub fn number_of_constraints(&self) -> usize {
        self.constraint_proxies
            .iter()
            .map(|proxy| proxy.number_of_elements())
            .sum()
    }

    /// Returns the number of enabled constraints.
    pub fn number_of_enabled_constraints(&self) -> usize {
        self.constraint_proxies
            .iter()
            .flat_map(|proxy| proxy.elements())
            .filter(|constraint| constraint.is_enabled())
            .count()
    }

    // ------------------------------------------------------------------
    // Setup pipeline
    // ------------------------------------------------------------------

    /// Runs the full setup pipeline. Stages are individually addressable
    /// for tests; this is the canonical order.
    pub fn setup(&mut self, options: &SetupOptions) -> ModelResult<()> {
        if self.variable_proxies.is_empty() {
            return Err(ModelError::InvalidModel(
                "the model has no decision variables".to_string(),
            ));
        }
        if !self.is_defined_objective() && self.constraint_proxies.is_empty() {
            return Err(ModelError::InvalidModel(
                "the model has neither an objective nor a constraint".to_string(),
            ));
        }

        self.setup_variable_related_constraints();
        self.setup_unique_names();
        self.setup_is_linear();
        self.setup_variable_sensitivities();
        if options.is_enabled_presolve && self.is_linear {
            self.presolve()?;
        }
        self.categorize_variables();
        self.categorize_constraints();
        self.extract_selections(options.selection_mode);
        self.refresh_variable_counts();
        self.verify_and_correct_initial_values(options.is_enabled_initial_value_correction)?;
        self.setup_fixed_sensitivities();
        self.update();
        Ok(())
    }

    /// Stage 1: registers every constraint with each variable that has a
    /// nonzero sensitivity in its body.
    pub fn setup_variable_related_constraints(&mut self) {
        let mut related: BTreeMap<VariableRef, Vec<ConstraintRef>> = BTreeMap::new();
        for proxy in &self.constraint_proxies {
            for constraint in proxy.elements() {
                if let Some(form) = constraint.linear_form() {
                    for &variable in form.coefficients().keys() {
                        related
                            .entry(variable)
                            .or_default()
                            .push(constraint.reference());
                    }
                }
            }
        }
        for proxy in self.variable_proxies.iter_mut() {
            for variable in proxy.elements_mut() {
                let list = related.remove(&variable.reference()).unwrap_or_default();
                variable.set_related_constraints(list);
            }
        }
    }

    /// Stage 2: assigns a unique element label to every entity
    /// (`base[i]`, `base[i, j]`, zero-padded).
    pub fn setup_unique_names(&mut self) {
        for (proxy, base) in self
            .variable_proxies
            .iter_mut()
            .zip(self.variable_base_names.iter())
        {
            let shape = proxy.shape().clone();
            for (flat, variable) in proxy.elements_mut().iter_mut().enumerate() {
                variable.set_label(format!("{}{}", base, shape.indices_label(flat)));
            }
        }
        for (proxy, base) in self
            .expression_proxies
            .iter_mut()
            .zip(self.expression_base_names.iter())
        {
            let shape = proxy.shape().clone();
            for (flat, expression) in proxy.elements_mut().iter_mut().enumerate() {
                expression.set_label(format!("{}{}", base, shape.indices_label(flat)));
            }
        }
        for (proxy, base) in self
            .constraint_proxies
            .iter_mut()
            .zip(self.constraint_base_names.iter())
        {
            let shape = proxy.shape().clone();
            for (flat, constraint) in proxy.elements_mut().iter_mut().enumerate() {
                constraint.set_label(format!("{}{}", base, shape.indices_label(flat)));
            }
        }
    }

    /// Stage 3: the model is linear iff neither the objective nor any
    /// constraint carries an opaque callback.
    pub fn setup_is_linear(&mut self) {
        self.nonlinear_constraints.clear();
        let mut is_linear = match &self.objective {
            ObjectiveBody::Defined(body) => body.is_linear(),
            ObjectiveBody::Undefined => true,
        };
        for proxy in &self.constraint_proxies {
            for constraint in proxy.elements() {
                if !constraint.is_linear() {
                    is_linear = false;
                    self.nonlinear_constraints.push(constraint.reference());
                }
            }
        }
        self.is_linear = is_linear;
    }

    /// Stage 4: tabulates, per variable, its objective coefficient and its
    /// coefficient in each containing constraint and standalone expression.
    pub fn setup_variable_sensitivities(&mut self) {
        let mut constraint_sensitivities: BTreeMap<VariableRef, Vec<(ConstraintRef, f64)>> =
            BTreeMap::new();
        for proxy in &self.constraint_proxies {
            for constraint in proxy.elements() {
                if let Some(form) = constraint.linear_form() {
                    for (&variable, &coefficient) in form.coefficients() {
                        constraint_sensitivities
                            .entry(variable)
                            .or_default()
                            .push((constraint.reference(), coefficient));
                    }
                }
            }
        }

        let mut expression_sensitivities: BTreeMap<VariableRef, Vec<(ExpressionRef, f64)>> =
            BTreeMap::new();
        for proxy in &self.expression_proxies {
            for expression in proxy.elements() {
                if let Some(form) = expression.body().linear() {
                    for (&variable, &coefficient) in form.coefficients() {
                        expression_sensitivities
                            .entry(variable)
                            .or_default()
                            .push((expression.reference(), coefficient));
                    }
                }
            }
        }

        let objective_form = match &self.objective {
            ObjectiveBody::Defined(body) => body.linear().cloned(),
            ObjectiveBody::Undefined => None,
        };

        for proxy in self.variable_proxies.iter_mut() {
            for variable in proxy.elements_mut() {
                let reference = variable.reference();
                variable.set_constraint_sensitivities(
                    constraint_sensitivities.remove(&reference).unwrap_or_default(),
                );
                variable.set_expression_sensitivities(
                    expression_sensitivities.remove(&reference).unwrap_or_default(),
                );
                let objective_sensitivity = objective_form
                    .as_ref()
                    .map(|form| form.coefficient(reference))
                    .unwrap_or(0.0);
                variable.set_objective_sensitivity(objective_sensitivity);
            }
        }
    }

    /// Stage 6: fixes variables whose bounds collapsed and refreshes every
    /// variable's sense tag.
    pub fn categorize_variables(&mut self) {
        for proxy in self.variable_proxies.iter_mut() {
            for variable in proxy.elements_mut() {
                if !variable.is_fixed() && variable.lower_bound() == variable.upper_bound() {
                    variable.fix_to(variable.lower_bound());
                } else {
                    variable.refresh_sense();
                }
            }
        }
        self.refresh_variable_counts();
    }

    /// Recomputes the per-category variable counts from the sense tags.
    pub fn refresh_variable_counts(&mut self) {
        let mut counts = VariableCategoryCounts::default();
        for proxy in &self.variable_proxies {
            for variable in proxy.elements() {
                counts.total += 1;
                match variable.sense() {
                    VariableSense::Fixed => counts.fixed += 1,
                    VariableSense::Binary => counts.binary += 1,
                    VariableSense::Integer => counts.integer += 1,
                    VariableSense::Selection => counts.selection += 1,
                }
            }
        }
        self.variable_counts = counts;
    }

    /// Stage 7: classifies every constraint by its structural shape.
    ///
    /// Terms over fixed variables are folded into the right-hand side so
    /// classification sees the effective row.
    pub fn categorize_constraints(&mut self) {
        let mut classifications: Vec<(ConstraintRef, ConstraintClassification)> = Vec::new();
        for proxy in &self.constraint_proxies {
            for constraint in proxy.elements() {
                let classification = match constraint.linear_form() {
                    None => ConstraintClassification::Nonlinear,
                    Some(form) => {
                        let mut terms = Vec::with_capacity(form.number_of_terms());
                        let mut rhs = -form.constant();
                        for (&reference, &coefficient) in form.coefficients() {
                            let variable = self.variable(reference);
                            if variable.is_fixed() {
                                rhs -= coefficient * variable.value().as_f64();
                            } else {
                                terms.push(ClassificationTerm {
                                    coefficient,
                                    is_binary: variable.sense() == VariableSense::Binary,
                                });
                            }
                        }
                        classify(&terms, rhs, constraint.sense())
                    }
                };
                classifications.push((constraint.reference(), classification));
            }
        }
        for (reference, classification) in classifications {
            self.constraint_mut(reference).set_classification(classification);
        }
    }

    /// Stage 8: extracts one-hot selection groups from set-partitioning
    /// rows according to the given mode.
    pub fn extract_selections(&mut self, mode: SelectionMode) {
        if mode == SelectionMode::None {
            return;
        }

        let mut candidates: Vec<(ConstraintRef, Vec<VariableRef>)> = Vec::new();
        for proxy in &self.constraint_proxies {
            for constraint in proxy.elements() {
                if !constraint.is_enabled()
                    || constraint.classification() != ConstraintClassification::SetPartitioning
                {
                    continue;
                }
                let Some(form) = constraint.linear_form() else {
                    continue;
                };
                let members: Vec<VariableRef> = form
                    .coefficients()
                    .keys()
                    .copied()
                    .filter(|&reference| !self.variable(reference).is_fixed())
                    .collect();
                if members.len() >= 2 {
                    candidates.push((constraint.reference(), members));
                }
            }
        }

        if mode == SelectionMode::Larger {
            candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));
        }

        let mut covered: BTreeSet<VariableRef> = BTreeSet::new();
        for (reference, members) in candidates {
            let overlaps = members.iter().any(|member| covered.contains(member));
            if overlaps {
                if mode == SelectionMode::Defined {
                    tracing::warn!(
                        constraint = self.constraint(reference).label(),
                        "selection extraction skipped a row sharing variables with an earlier group"
                    );
                }
                continue;
            }

            let index = self.selections.len();
            for &member in &members {
                covered.insert(member);
                self.variable_mut(member).set_selection_index(index);
            }
            self.constraint_mut(reference).set_enabled(false);
            self.selections
                .push(Selection::new(index, members, reference));
        }
    }

    /// Stage 10: verifies each category's initial values, snapping them
    /// into range when correction is enabled and rejecting them otherwise.
    pub fn verify_and_correct_initial_values(&mut self, correction: bool) -> ModelResult<()> {
        for proxy in self.variable_proxies.iter_mut() {
            for variable in proxy.elements_mut() {
                let value = variable.value();
                match variable.sense() {
                    VariableSense::Fixed => {}
                    VariableSense::Binary | VariableSense::Selection => {
                        if value < V::zero() || value > V::one() {
                            if !correction {
                                return Err(ModelError::InvalidInitialValue {
                                    name: variable.label().to_string(),
                                    detail: format!(
                                        "value {} is outside the binary domain {{0, 1}}",
                                        value
                                    ),
                                });
                            }
                            let corrected = if value > V::one() { V::one() } else { V::zero() };
                            variable.set_value_unchecked(corrected);
                        }
                    }
                    VariableSense::Integer => {
                        if !variable.is_within_bounds(value) {
                            if !correction {
                                return Err(ModelError::InvalidInitialValue {
                                    name: variable.label().to_string(),
                                    detail: format!(
                                        "value {} is outside the bounds [{}, {}]",
                                        value,
                                        variable.lower_bound(),
                                        variable.upper_bound()
                                    ),
                                });
                            }
                            let corrected = if value < variable.lower_bound() {
                                variable.lower_bound()
                            } else {
                                variable.upper_bound()
                            };
                            variable.set_value_unchecked(corrected);
                        }
                    }
                }
            }
        }

        // Re-establish the one-hot property per selection group.
        let selections: Vec<Vec<VariableRef>> = self
            .selections
            .iter()
            .map(|selection| selection.variable_references().to_vec())
            .collect();
        for members in selections {
            let selected: Vec<VariableRef> = members
                .iter()
                .copied()
                .filter(|&member| self.variable(member).value() == V::one())
                .collect();
            if selected.len() == 1 {
                continue;
            }
            if !correction {
                let label = self.variable(members[0]).label().to_string();
                return Err(ModelError::InvalidInitialValue {
                    name: label,
                    detail: format!(
                        "the selection group has {} members set to 1 but exactly 1 is required",
                        selected.len()
                    ),
                });
            }
            if selected.is_empty() {
                self.variable_mut(members[0]).set_value_unchecked(V::one());
            } else {
                for &member in &selected[1..] {
                    self.variable_mut(member).set_value_unchecked(V::zero());
                }
            }
        }
        Ok(())
    }

    /// Stage 11: precomputes, per linear body, the constant contribution of
    /// fixed variables so full re-evaluation can skip them.
    pub fn setup_fixed_sensitivities(&mut self) {
        fn fixed_term<V: VariableValue>(
            form: &crate::expression::LinearForm,
            variables: &[VariableProxy<V>],
        ) -> f64 {
            let mut term = form.constant();
            for (&reference, &coefficient) in form.coefficients() {
                let variable = variables[reference.proxy().get()].element(reference.flat().get());
                if variable.is_fixed() {
                    term += coefficient * variable.value().as_f64();
                }
            }
            term
        }

        self.objective_fixed_term = match &self.objective {
            ObjectiveBody::Defined(body) => body
                .linear()
                .map(|form| fixed_term(form, &self.variable_proxies))
                .unwrap_or(0.0),
            ObjectiveBody::Undefined => 0.0,
        };

        let variables = std::mem::take(&mut self.variable_proxies);
        for proxy in self.expression_proxies.iter_mut() {
            for expression in proxy.elements_mut() {
                let term = expression
                    .body()
                    .linear()
                    .map(|form| fixed_term(form, &variables))
                    .unwrap_or(0.0);
                expression.set_fixed_term(term);
            }
        }
        for proxy in self.constraint_proxies.iter_mut() {
            for constraint in proxy.elements_mut() {
                let term = constraint
                    .linear_form()
                    .map(|form| fixed_term(form, &variables))
                    .unwrap_or(0.0);
                constraint.expression_mut().set_fixed_term(term);
            }
        }
        self.variable_proxies = variables;
    }

    // ------------------------------------------------------------------
    // Evaluation kernel
    // ------------------------------------------------------------------

    /// Recomputes every cached value from the current variable assignment.
    ///
    /// Disabled constraints are refreshed too, so exported snapshots show
    /// their values; only enabled constraints contribute to the total
    /// violation.
    pub fn update(&mut self) {
        let values = self.export_variable_values();

        self.objective_value = match &self.objective {
            ObjectiveBody::Defined(body) => match body.linear() {
                Some(form) => {
                    let mut objective = self.objective_fixed_term;
                    for (&reference, &coefficient) in form.coefficients() {
                        let variable = self.variable(reference);
                        if !variable.is_fixed() {
                            objective += coefficient * variable.value().as_f64();
                        }
                    }
                    objective
                }
                None => body.evaluate(&values),
            },
            ObjectiveBody::Undefined => 0.0,
        };

        let variables = std::mem::take(&mut self.variable_proxies);
        for proxy in self.expression_proxies.iter_mut() {
            for expression in proxy.elements_mut() {
                let value = match expression.body().linear() {
                    Some(form) => {
                        let mut value = expression.fixed_term();
                        for (&reference, &coefficient) in form.coefficients() {
                            let variable =
                                variables[reference.proxy().get()].element(reference.flat().get());
                            if !variable.is_fixed() {
                                value += coefficient * variable.value().as_f64();
                            }
                        }
                        value
                    }
                    None => expression.body().evaluate(&values),
                };
                expression.set_value(value);
            }
        }

        let mut total_violation = 0.0;
        for proxy in self.constraint_proxies.iter_mut() {
            for constraint in proxy.elements_mut() {
                let value = match constraint.linear_form() {
                    Some(form) => {
                        let mut value = constraint.expression().fixed_term();
                        for (&reference, &coefficient) in form.coefficients() {
                            let variable =
                                variables[reference.proxy().get()].element(reference.flat().get());
                            if !variable.is_fixed() {
                                value += coefficient * variable.value().as_f64();
                            }
                        }
                        value
                    }
                    None => constraint.expression().body().evaluate(&values),
                };
                constraint.set_constraint_value(value);
                if constraint.is_enabled() {
                    total_violation += constraint.violation_value();
                }
            }
        }
        self.variable_proxies = variables;
        self.total_violation = total_violation;
    }

    /// Builds the sorted, deduplicated union of the altered variables'
    /// related constraints (plus every nonlinear row, whose membership is
    /// opaque) and stores it on the move.
    pub fn attach_related_constraints(&self, mv: &mut Move<V>) {
        let mut related: Vec<ConstraintRef> = Vec::new();
        for &(reference, _) in mv.alterations() {
            related.extend_from_slice(self.variable(reference).related_constraints());
        }
        related.extend_from_slice(&self.nonlinear_constraints);
        related.sort_unstable();
        related.dedup();
        mv.set_related_constraints(related);
    }

    /// The candidate constraint value of `constraint` under `mv`, computed
    /// from the cached value and the move's deltas.
    fn constraint_value_after(
        &self,
        constraint: &Constraint<V>,
        mv: &Move<V>,
        candidate_values: Option<&[ValueProxy<V>]>,
    ) -> f64 {
        match constraint.linear_form() {
            Some(form) => {
                let mut value = constraint.constraint_value();
                for &(reference, new_value) in mv.alterations() {
                    let coefficient = form.coefficient(reference);
                    if coefficient != 0.0 {
                        let old_value = self.variable(reference).value();
                        value += coefficient * (new_value.as_f64() - old_value.as_f64());
                    }
                }
                value
            }
            None => {
                let values = candidate_values
                    .expect("candidate values must be materialized for nonlinear rows");
                constraint.expression().body().evaluate(values)
            }
        }
    }

    /// The candidate objective value under `mv`.
    fn objective_value_after(&self, mv: &Move<V>, candidate_values: Option<&[ValueProxy<V>]>) -> f64 {
        match &self.objective {
            ObjectiveBody::Undefined => 0.0,
            ObjectiveBody::Defined(body) => match body.linear() {
                Some(_) => {
                    let mut objective = self.objective_value;
                    for &(reference, new_value) in mv.alterations() {
                        let variable = self.variable(reference);
                        objective += variable.objective_sensitivity()
                            * (new_value.as_f64() - variable.value().as_f64());
                    }
                    objective
                }
                None => {
                    let values = candidate_values
                        .expect("candidate values must be materialized for nonlinear objectives");
                    body.evaluate(values)
                }
            },
        }
    }

    /// Materializes the candidate variable assignment when an opaque body
    /// must be re-evaluated in full.
    fn candidate_values_for(&self, mv: &Move<V>) -> Option<Vec<ValueProxy<V>>> {
        let objective_is_opaque = match &self.objective {
            ObjectiveBody::Defined(body) => !body.is_linear(),
            ObjectiveBody::Undefined => false,
        };
        if self.is_linear && !objective_is_opaque {
            return None;
        }
        let mut values = self.export_variable_values();
        for &(reference, new_value) in mv.alterations() {
            values[reference.proxy().get()].set_flat(reference.flat().get(), new_value);
        }
        Some(values)
    }

    /// Scores `mv` against the given penalty weight vectors without
    /// mutating any model state.
    ///
    /// This full form walks every enabled constraint; the delta overload
    /// [`Model::evaluate_delta`] is the hot path and touches only the
    /// constraints related to the move.
    pub fn evaluate(
        &self,
        mv: &Move<V>,
        local_weights: &[ValueProxy<f64>],
        global_weights: &[ValueProxy<f64>],
    ) -> SolutionScore {
        let candidate_values = self.candidate_values_for(mv);
        let objective = self.objective_value_after(mv, candidate_values.as_deref());

        let mut total_violation = 0.0;
        let mut local_penalty = 0.0;
        let mut global_penalty = 0.0;
        for (proxy_index, proxy) in self.constraint_proxies.iter().enumerate() {
            for (flat_index, constraint) in proxy.elements().iter().enumerate() {
                if !constraint.is_enabled() {
                    continue;
                }
                let touched = mv
                    .related_constraints()
                    .binary_search(&constraint.reference())
                    .is_ok();
                let violation = if touched {
                    constraint.violation_of(self.constraint_value_after(
                        constraint,
                        mv,
                        candidate_values.as_deref(),
                    ))
                } else {
                    constraint.violation_value()
                };
                total_violation += violation;
                local_penalty += local_weights[proxy_index].flat(flat_index) * violation;
                global_penalty += global_weights[proxy_index].flat(flat_index) * violation;
            }
        }

        self.score_from(
            objective,
            total_violation,
            local_penalty,
            global_penalty,
        )
    }

    /// Δ-updates `score_before` (the score of the current assignment under
    /// the same weights) in time proportional to the size of the move.
    ///
    /// The result agrees field-wise with [`Model::evaluate`] up to
    /// floating-point determinism.
    pub fn evaluate_delta(
        &self,
        mv: &Move<V>,
        score_before: &SolutionScore,
        local_weights: &[ValueProxy<f64>],
        global_weights: &[ValueProxy<f64>],
    ) -> SolutionScore {
        let candidate_values = self.candidate_values_for(mv);
        let objective = self.objective_value_after(mv, candidate_values.as_deref());

        let mut total_violation = score_before.total_violation;
        let mut local_penalty = score_before.local_penalty;
        let mut global_penalty = score_before.global_penalty;
        for &reference in mv.related_constraints() {
            let constraint = self.constraint(reference);
            if !constraint.is_enabled() {
                continue;
            }
            let new_violation = constraint.violation_of(self.constraint_value_after(
                constraint,
                mv,
                candidate_values.as_deref(),
            ));
            let difference = new_violation - constraint.violation_value();
            let (proxy_index, flat_index) = (reference.proxy().get(), reference.flat().get());
            total_violation += difference;
            local_penalty += local_weights[proxy_index].flat(flat_index) * difference;
            global_penalty += global_weights[proxy_index].flat(flat_index) * difference;
        }

        self.score_from(
            objective,
            total_violation.max(0.0),
            local_penalty.max(0.0),
            global_penalty.max(0.0),
        )
    }

    fn score_from(
        &self,
        objective: f64,
        total_violation: f64,
        local_penalty: f64,
        global_penalty: f64,
    ) -> SolutionScore {
        SolutionScore {
            objective,
            total_violation,
            local_penalty,
            global_penalty,
            local_augmented_objective: objective + local_penalty,
            global_augmented_objective: objective + global_penalty,
            is_feasible: is_feasible_total(total_violation),
            is_objective_improvable: objective < self.objective_value - EPSILON,
            is_constraint_improvable: total_violation < self.total_violation - EPSILON,
        }
    }

    /// Commits `mv`: the single write path that mutates variable values and
    /// refreshes the cached expression, constraint, and objective values
    /// with the same delta formulas the evaluator uses.
    pub fn apply(&mut self, mv: &Move<V>) {
        for &(reference, new_value) in mv.alterations() {
            let (proxy_index, flat_index) = (reference.proxy().get(), reference.flat().get());
            let variable = self.variable_proxies[proxy_index].element_mut(flat_index);
            debug_assert!(
                !variable.is_fixed(),
                "called `Model::apply` with an alteration of the fixed variable {:?}",
                reference
            );
            let old_value = variable.value();
            variable.set_value(new_value);
            let delta = new_value.as_f64() - old_value.as_f64();
            let objective_sensitivity = variable.objective_sensitivity();

            let number_of_constraint_sensitivities = variable.constraint_sensitivities().len();
            let number_of_expression_sensitivities = variable.expression_sensitivities().len();

            if let ObjectiveBody::Defined(body) = &self.objective
                && body.is_linear()
            {
                self.objective_value += objective_sensitivity * delta;
            }

            for i in 0..number_of_constraint_sensitivities {
                let (constraint_reference, coefficient) = self.variable_proxies[proxy_index]
                    .element(flat_index)
                    .constraint_sensitivities()[i];
                let constraint = self.constraint_proxies[constraint_reference.proxy().get()]
                    .element_mut(constraint_reference.flat().get());
                let old_violation = constraint.violation_value();
                let new_constraint_value = constraint.constraint_value() + coefficient * delta;
                constraint.set_constraint_value(new_constraint_value);
                if constraint.is_enabled() {
                    self.total_violation += constraint.violation_value() - old_violation;
                }
            }

            for i in 0..number_of_expression_sensitivities {
                let (expression_reference, coefficient) = self.variable_proxies[proxy_index]
                    .element(flat_index)
                    .expression_sensitivities()[i];
                self.expression_proxies[expression_reference.proxy().get()]
                    .element_mut(expression_reference.flat().get())
                    .add_to_value(coefficient * delta);
            }
        }
        self.total_violation = self.total_violation.max(0.0);

        // Opaque bodies cannot be delta-updated; recompute them in full.
        if !self.nonlinear_constraints.is_empty() {
            let values = self.export_variable_values();
            let references = self.nonlinear_constraints.clone();
            for reference in references {
                let value = self
                    .constraint(reference)
                    .expression()
                    .body()
                    .evaluate(&values);
                let constraint = self.constraint_proxies[reference.proxy().get()]
                    .element_mut(reference.flat().get());
                let old_violation = constraint.violation_value();
                constraint.set_constraint_value(value);
                if constraint.is_enabled() {
                    self.total_violation += constraint.violation_value() - old_violation;
                }
            }
        }
        if let ObjectiveBody::Defined(body) = &self.objective
            && !body.is_linear()
        {
            let values = self.export_variable_values();
            self.objective_value = body.evaluate(&values);
        }
    }

    // ------------------------------------------------------------------
    // Import / export
    // ------------------------------------------------------------------

    /// Exports the current variable values as value proxies.
    pub fn export_variable_values(&self) -> Vec<ValueProxy<V>> {
        self.variable_proxies
            .iter()
            .map(|proxy| {
                ValueProxy::from_values(
                    proxy.shape().clone(),
                    proxy.elements().iter().map(|v| v.value()).collect(),
                )
            })
            .collect()
    }

    /// Imports variable values from proxies with matching shapes. Fixed
    /// variables keep their fixed value; out-of-bounds values are rejected.
    pub fn import_variable_values(&mut self, proxies: &[ValueProxy<V>]) -> ModelResult<()> {
        if proxies.len() != self.variable_proxies.len() {
            return Err(ModelError::InvalidModel(format!(
                "imported {} variable proxies but the model has {}",
                proxies.len(),
                self.variable_proxies.len()
            )));
        }
        for (proxy, values) in self.variable_proxies.iter_mut().zip(proxies.iter()) {
            for (flat, variable) in proxy.elements_mut().iter_mut().enumerate() {
                if variable.is_fixed() {
                    continue;
                }
                let value = values.flat(flat);
                if !variable.is_within_bounds(value) {
                    return Err(ModelError::InvalidInitialValue {
                        name: variable.label().to_string(),
                        detail: format!(
                            "imported value {} is outside the bounds [{}, {}]",
                            value,
                            variable.lower_bound(),
                            variable.upper_bound()
                        ),
                    });
                }
                variable.set_value(value);
            }
        }
        Ok(())
    }

    /// Exports a full by-value snapshot of the model state.
    pub fn export_solution(&self) -> Solution<V> {
        let expression_value_proxies = self
            .expression_proxies
            .iter()
            .map(|proxy| {
                ValueProxy::from_values(
                    proxy.shape().clone(),
                    proxy.elements().iter().map(|e| e.value()).collect(),
                )
            })
            .collect();
        let constraint_value_proxies = self
            .constraint_proxies
            .iter()
            .map(|proxy| {
                ValueProxy::from_values(
                    proxy.shape().clone(),
                    proxy
                        .elements()
                        .iter()
                        .map(|c| c.constraint_value())
                        .collect(),
                )
            })
            .collect();
        let violation_value_proxies: Vec<ValueProxy<f64>> = self
            .constraint_proxies
            .iter()
            .map(|proxy| {
                ValueProxy::from_values(
                    proxy.shape().clone(),
                    proxy
                        .elements()
                        .iter()
                        .map(|c| if c.is_enabled() { c.violation_value() } else { 0.0 })
                        .collect(),
                )
            })
            .collect();

        Solution {
            variable_value_proxies: self.export_variable_values(),
            expression_value_proxies,
            constraint_value_proxies,
            violation_value_proxies,
            objective: self.objective_value,
            total_violation: self.total_violation,
            is_feasible: is_feasible_total(self.total_violation),
        }
    }

    /// Exports the compact archival form of the current state.
    pub fn export_plain_solution(&self) -> PlainSolution<V> {
        PlainSolution::from_solution(&self.export_solution())
    }

    /// Converts a snapshot into the name-keyed export surface. The
    /// objective carries the external sign.
    pub fn convert_to_named_solution(&self, solution: &Solution<V>) -> NamedSolution<V>
    where
        V: Serialize,
    {
        let mut variables = BTreeMap::new();
        for (base, proxy) in self
            .variable_base_names
            .iter()
            .zip(solution.variable_value_proxies.iter())
        {
            variables.insert(base.clone(), NamedValues::from_proxy(proxy));
        }
        let mut expressions = BTreeMap::new();
        for (base, proxy) in self
            .expression_base_names
            .iter()
            .zip(solution.expression_value_proxies.iter())
        {
            expressions.insert(base.clone(), NamedValues::from_proxy(proxy));
        }
        let mut constraints = BTreeMap::new();
        let mut violations = BTreeMap::new();
        for ((base, values), violation_values) in self
            .constraint_base_names
            .iter()
            .zip(solution.constraint_value_proxies.iter())
            .zip(solution.violation_value_proxies.iter())
        {
            constraints.insert(base.clone(), NamedValues::from_proxy(values));
            violations.insert(base.clone(), NamedValues::from_proxy(violation_values));
        }

        NamedSolution {
            name: self.name.clone(),
            variables,
            expressions,
            constraints,
            violations,
            objective: solution.objective * self.sign(),
            total_violation: solution.total_violation,
            is_feasible: solution.is_feasible,
        }
    }

    /// Exports the aggregate model summary.
    pub fn export_summary(&self) -> ModelSummary {
        ModelSummary {
            name: self.name.clone(),
            number_of_variables: self.number_of_variables(),
            number_of_fixed_variables: self.variable_counts.fixed,
            number_of_binary_variables: self.variable_counts.binary,
            number_of_integer_variables: self.variable_counts.integer,
            number_of_selection_variables: self.variable_counts.selection,
            number_of_constraints: self.number_of_constraints(),
            number_of_enabled_constraints: self.number_of_enabled_constraints(),
            number_of_selections: self.selections.len(),
            is_linear: self.is_linear,
            is_minimization: self.is_minimization,
        }
    }

    /// Generates per-variable value proxies filled with `initial`, shaped
    /// like the model's variable proxies.
    pub fn generate_variable_parameter_proxies<T: Clone>(&self, initial: T) -> Vec<ValueProxy<T>> {
        self.variable_proxies
            .iter()
            .map(|proxy| ValueProxy::new(proxy.shape().clone(), initial.clone()))
            .collect()
    }

    /// Generates per-constraint value proxies filled with `initial`, shaped
    /// like the model's constraint proxies.
    pub fn generate_constraint_parameter_proxies<T: Clone>(
        &self,
        initial: T,
    ) -> Vec<ValueProxy<T>> {
        self.constraint_proxies
            .iter()
            .map(|proxy| ValueProxy::new(proxy.shape().clone(), initial.clone()))
            .collect()
    }
}

impl<V> std::fmt::Debug for Model<V>
where
    V: VariableValue,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("number_of_variables", &self.number_of_variables())
            .field("number_of_constraints", &self.number_of_constraints())
            .field("is_linear", &self.is_linear)
            .field("is_minimization", &self.is_minimization)
            .field("objective_value", &self.objective_value)
            .field("total_violation", &self.total_violation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mv::MoveSense;

    fn uniform_weights(model: &Model<i64>, weight: f64) -> Vec<ValueProxy<f64>> {
        model.generate_constraint_parameter_proxies(weight)
    }

    #[test]
    fn test_name_validation() {
        let mut model: Model<i64> = Model::new("test");
        assert!(model.create_variable("x").is_ok());
        assert!(matches!(
            model.create_variable("bad name"),
            Err(ModelError::InvalidName { .. })
        ));
        assert!(matches!(
            model.create_variable("1leading"),
            Err(ModelError::InvalidName { .. })
        ));
        assert!(matches!(
            model.create_variable("x"),
            Err(ModelError::InvalidName { .. })
        ));
        assert!(model.create_variable("_x1").is_ok());
    }

    #[test]
    fn test_too_many_variable_proxies() {
        let mut model: Model<i64> = Model::new("test");
        for i in 0..MAX_NUMBER_OF_VARIABLE_PROXIES {
            model.create_variable(&format!("x{}", i)).unwrap();
        }
        assert!(matches!(
            model.create_variable("overflow"),
            Err(ModelError::TooManyProxies { kind: "variable", .. })
        ));
    }

    #[test]
    fn test_crossing_bounds_are_rejected() {
        let mut model: Model<i64> = Model::new("test");
        assert!(matches!(
            model.create_bounded_variable("x", 5, 3),
            Err(ModelError::InvalidOption(_))
        ));
    }

    #[test]
    fn test_setup_rejects_empty_model() {
        let mut model: Model<i64> = Model::new("test");
        assert!(matches!(
            model.setup(&SetupOptions::default()),
            Err(ModelError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_setup_rejects_model_without_objective_and_constraints() {
        let mut model: Model<i64> = Model::new("test");
        model.create_bounded_variable("x", 0, 1).unwrap();
        assert!(matches!(
            model.setup(&SetupOptions::default()),
            Err(ModelError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_unique_names_are_zero_padded() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variables("x", 12, 0, 1).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x.at(0)));
        model.setup(&SetupOptions::default()).unwrap();
        assert_eq!(model.variable(x.at(3)).label(), "x[03]");
        assert_eq!(model.variable(x.at(11)).label(), "x[11]");
    }

    #[test]
    fn test_two_dimensional_blocks() {
        let mut model: Model<i64> = Model::new("grid");
        let grid = model.create_variable_array("y", &[3, 4], 0, 1).unwrap();
        let reference = model.variable_reference(grid, &[1, 2]);
        assert_eq!(reference.flat().get(), 6);
        model.minimize(LinearBuilder::new().add(1.0, reference));
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();
        assert_eq!(model.variable(reference).label(), "y[1, 2]");
    }

    #[test]
    fn test_related_constraints_and_sensitivities() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variables("x", 3, 0, 1).unwrap();
        let g = model
            .create_constraint_with(
                "g",
                LinearBuilder::new()
                    .add(1.0, x.at(0))
                    .add(2.0, x.at(1))
                    .leq(2.0),
            )
            .unwrap();
        model.minimize(LinearBuilder::new().add(5.0, x.at(0)));
        model.setup(&SetupOptions::default()).unwrap();

        assert_eq!(model.variable(x.at(0)).related_constraints(), &[g]);
        assert_eq!(model.variable(x.at(1)).related_constraints(), &[g]);
        assert!(model.variable(x.at(2)).related_constraints().is_empty() || model.variable(x.at(2)).is_fixed());
        assert_eq!(model.variable(x.at(0)).objective_sensitivity(), 5.0);
        assert_eq!(
            model.variable(x.at(1)).constraint_sensitivities(),
            &[(g, 2.0)]
        );
    }

    #[test]
    fn test_maximization_is_sign_normalized() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variable("x", 0, 1).unwrap();
        model.maximize(LinearBuilder::new().add(3.0, x));
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();

        let mv = Move::univariate(MoveSense::Binary, x, 1);
        let mut mv = mv;
        model.attach_related_constraints(&mut mv);
        model.apply(&mv);
        // Internal objective is the negated maximization objective.
        assert_eq!(model.objective_value(), -3.0);
        assert_eq!(model.sign(), -1.0);
        let named = model.convert_to_named_solution(&model.export_solution());
        assert_eq!(named.objective, 3.0);
    }

    #[test]
    fn test_update_and_apply_agree() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variables("x", 4, 0, 1).unwrap();
        model
            .create_constraint_with(
                "cover",
                LinearBuilder::new()
                    .add(1.0, x.at(0))
                    .add(1.0, x.at(1))
                    .add(1.0, x.at(2))
                    .add(1.0, x.at(3))
                    .geq(2.0),
            )
            .unwrap();
        model.minimize(
            LinearBuilder::new()
                .add(1.0, x.at(0))
                .add(2.0, x.at(1))
                .add(3.0, x.at(2))
                .add(4.0, x.at(3)),
        );
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();

        // All zero: violation of the covering row is 2.
        assert_eq!(model.total_violation(), 2.0);
        assert_eq!(model.objective_value(), 0.0);

        let mut mv = Move::bivariate(MoveSense::Binary, (x.at(0), 1), (x.at(2), 1));
        model.attach_related_constraints(&mut mv);
        model.apply(&mv);
        assert_eq!(model.objective_value(), 4.0);
        assert_eq!(model.total_violation(), 0.0);

        // A fresh full recomputation must agree with the delta path.
        let objective_before = model.objective_value();
        let violation_before = model.total_violation();
        model.update();
        assert!((model.objective_value() - objective_before).abs() < 1e-12);
        assert!((model.total_violation() - violation_before).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_matches_apply() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variables("x", 3, 0, 1).unwrap();
        model
            .create_constraint_with(
                "pack",
                LinearBuilder::new()
                    .add(1.0, x.at(0))
                    .add(1.0, x.at(1))
                    .add(1.0, x.at(2))
                    .leq(1.0),
            )
            .unwrap();
        model.minimize(
            LinearBuilder::new()
                .add(-1.0, x.at(0))
                .add(-2.0, x.at(1))
                .add(-3.0, x.at(2)),
        );
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();

        let local = uniform_weights(&model, 10.0);
        let global = uniform_weights(&model, 20.0);

        let mut mv = Move::bivariate(MoveSense::Binary, (x.at(1), 1), (x.at(2), 1));
        model.attach_related_constraints(&mut mv);

        let score = model.evaluate(&mv, &local, &global);
        assert_eq!(score.objective, -5.0);
        assert_eq!(score.total_violation, 1.0);
        assert_eq!(score.local_penalty, 10.0);
        assert_eq!(score.global_penalty, 20.0);
        assert_eq!(score.local_augmented_objective, 5.0);
        assert_eq!(score.global_augmented_objective, 15.0);
        assert!(!score.is_feasible);
        assert!(score.is_objective_improvable);
        assert!(!score.is_constraint_improvable);

        model.apply(&mv);
        assert_eq!(model.objective_value(), -5.0);
        assert_eq!(model.total_violation(), 1.0);
    }

    #[test]
    fn test_evaluate_delta_agrees_with_full_form() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variables("x", 5, 0, 1).unwrap();
        let mut objective = LinearBuilder::new();
        let mut row = LinearBuilder::new();
        for i in 0..5 {
            objective = objective.add((i + 1) as f64, x.at(i));
            row = row.add(1.0, x.at(i));
        }
        model.create_constraint_with("row", row.eq(2.0)).unwrap();
        model.minimize(objective);
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();

        let local = uniform_weights(&model, 3.0);
        let global = uniform_weights(&model, 7.0);

        let score_before = model.evaluate(&Move::empty(), &local, &global);
        let mut mv = Move::bivariate(MoveSense::Binary, (x.at(0), 1), (x.at(4), 1));
        model.attach_related_constraints(&mut mv);

        let full = model.evaluate(&mv, &local, &global);
        let delta = model.evaluate_delta(&mv, &score_before, &local, &global);
        assert!((full.objective - delta.objective).abs() < 1e-12);
        assert!((full.total_violation - delta.total_violation).abs() < 1e-12);
        assert!((full.local_penalty - delta.local_penalty).abs() < 1e-12);
        assert!((full.global_penalty - delta.global_penalty).abs() < 1e-12);
        assert_eq!(full.is_feasible, delta.is_feasible);
        assert_eq!(full.is_objective_improvable, delta.is_objective_improvable);
        assert_eq!(full.is_constraint_improvable, delta.is_constraint_improvable);
    }

    #[test]
    fn test_callback_objective_marks_model_nonlinear() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variables("x", 2, 0, 3).unwrap();
        model
            .create_constraint_with(
                "g",
                LinearBuilder::new().add(1.0, x.at(0)).add(1.0, x.at(1)).leq(4.0),
            )
            .unwrap();
        model.minimize_with_callback(Box::new(|values| {
            let a = values[0].flat(0) as f64;
            let b = values[0].flat(1) as f64;
            (a - 1.0) * (a - 1.0) + (b - 2.0) * (b - 2.0)
        }));
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();
        assert!(!model.is_linear());

        // Full recomputation drives the objective on every path.
        let local = uniform_weights(&model, 1.0);
        let global = uniform_weights(&model, 1.0);
        let mut mv = Move::univariate(MoveSense::Integer, x.at(0), 1);
        model.attach_related_constraints(&mut mv);
        let score = model.evaluate(&mv, &local, &global);
        assert_eq!(score.objective, 4.0);

        model.apply(&mv);
        assert_eq!(model.objective_value(), 4.0);
    }

    #[test]
    fn test_import_and_export_roundtrip() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variables("x", 3, -5, 5).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x.at(0)));
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();

        let mut values = model.export_variable_values();
        values[0].set_flat(0, 3);
        values[0].set_flat(2, -2);
        model.import_variable_values(&values).unwrap();
        model.update();

        assert_eq!(model.variable(x.at(0)).value(), 3);
        assert_eq!(model.variable(x.at(2)).value(), -2);
        assert_eq!(model.objective_value(), 3.0);

        values[0].set_flat(1, 99);
        assert!(matches!(
            model.import_variable_values(&values),
            Err(ModelError::InvalidInitialValue { .. })
        ));
    }

    #[test]
    fn test_mark_solved_latch() {
        let mut model: Model<i64> = Model::new("test");
        assert!(model.mark_solved().is_ok());
        assert!(matches!(model.mark_solved(), Err(ModelError::AlreadySolved)));
    }

    #[test]
    fn test_selection_extraction_modes() {
        // g0: x0 + x1 + x2 = 1, g1: x2 + x3 = 1 (overlap on x2),
        // g2: y0 + y1 = 1 (disjoint).
        let build = |mode: SelectionMode| {
            let mut model: Model<i64> = Model::new("test");
            let x = model.create_bounded_variables("x", 4, 0, 1).unwrap();
            let y = model.create_bounded_variables("y", 2, 0, 1).unwrap();
            model
                .create_constraint_with(
                    "g0",
                    LinearBuilder::new()
                        .add(1.0, x.at(0))
                        .add(1.0, x.at(1))
                        .add(1.0, x.at(2))
                        .eq(1.0),
                )
                .unwrap();
            model
                .create_constraint_with(
                    "g1",
                    LinearBuilder::new().add(1.0, x.at(2)).add(1.0, x.at(3)).eq(1.0),
                )
                .unwrap();
            model
                .create_constraint_with(
                    "g2",
                    LinearBuilder::new().add(1.0, y.at(0)).add(1.0, y.at(1)).eq(1.0),
                )
                .unwrap();
            model.minimize(LinearBuilder::new().add(1.0, x.at(0)).add(1.0, y.at(0)));
            let mut options = SetupOptions::default();
            options.is_enabled_presolve = false;
            options.selection_mode = mode;
            model.setup(&options).unwrap();
            model
        };

        let model = build(SelectionMode::None);
        assert!(model.selections().is_empty());

        let model = build(SelectionMode::Independent);
        // g0 first, g1 overlaps and is skipped, g2 is disjoint.
        assert_eq!(model.selections().len(), 2);
        assert_eq!(model.selections()[0].size(), 3);
        assert_eq!(model.selections()[1].size(), 2);
        assert_eq!(model.variable_counts().selection, 5);

        let model = build(SelectionMode::Larger);
        assert_eq!(model.selections().len(), 2);
        assert_eq!(model.selections()[0].size(), 3);

        // One-hot is established on each extracted group.
        for selection in model.selections() {
            let ones = selection
                .variable_references()
                .iter()
                .filter(|&&member| model.variable(member).value() == 1)
                .count();
            assert_eq!(ones, 1);
        }
    }

    #[test]
    fn test_initial_value_rejection_without_correction() {
        let mut model: Model<i64> = Model::new("test");
        let x = model.create_bounded_variables("x", 2, 0, 1).unwrap();
        model
            .create_constraint_with(
                "g",
                LinearBuilder::new().add(1.0, x.at(0)).add(1.0, x.at(1)).eq(1.0),
            )
            .unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x.at(0)));
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        options.selection_mode = SelectionMode::Defined;
        options.is_enabled_initial_value_correction = false;
        // Both members start at 0, so the one-hot verification must fail.
        assert!(matches!(
            model.setup(&options),
            Err(ModelError::InvalidInitialValue { .. })
        ));
    }
}
