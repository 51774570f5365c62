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

//! Presolve reductions for linear models.
//!
//! Three reductions iterate to a fixed point:
//!
//! 1. Variables whose bounds collapsed are fixed.
//! 2. Enabled constraints with exactly one free variable induce a bound on
//!    that variable; the bound is tightened and the constraint disabled.
//!    Constraints whose variables are all fixed are disabled when
//!    satisfied.
//! 3. Free variables appearing in no enabled constraint are fixed at the
//!    bound favored by their objective coefficient.
//!
//! An empty induced range or an unsatisfiable single-variable equality is
//! an irreparable inconsistency and fails with `InvalidModel`.

use crate::constraint::ConstraintSense;
use crate::error::{ModelError, ModelResult};
use crate::index::{ConstraintRef, VariableRef};
use crate::model::Model;
use halyard_core::num::{EPSILON, VariableValue};

#[inline]
fn floor_to<V: VariableValue>(value: f64) -> V {
    V::from_f64(value.floor()).unwrap_or(if value > 0.0 {
        V::max_value()
    } else {
        V::min_value()
    })
}

#[inline]
fn ceil_to<V: VariableValue>(value: f64) -> V {
    V::from_f64(value.ceil()).unwrap_or(if value > 0.0 {
        V::max_value()
    } else {
        V::min_value()
    })
}

enum Reduction<V> {
    DisableConstraint,
    FixVariable(VariableRef, V),
    TightenUpper(VariableRef, V),
    TightenLower(VariableRef, V),
}

impl<V> Model<V>
where
    V: VariableValue,
{
    /// Stage 5: runs the presolve reductions to a fixed point.
    ///
    /// Valid only on linear models; the caller gates on `is_linear`.
    pub fn presolve(&mut self) -> ModelResult<()> {
        debug_assert!(
            self.is_linear(),
            "called `Model::presolve` on a nonlinear model"
        );
        loop {
            let mut changed = self.presolve_fix_implicitly_fixed_variables();
            changed |= self.presolve_reduce_single_free_variable_constraints()?;
            changed |= self.presolve_fix_independent_variables();
            if !changed {
                break;
            }
        }
        Ok(())
    }

    /// Fixes every variable whose bounds collapsed to a single value.
    pub fn presolve_fix_implicitly_fixed_variables(&mut self) -> bool {
        let mut changed = false;
        for proxy in self.variable_proxies_mut() {
            for variable in proxy.elements_mut() {
                if !variable.is_fixed() && variable.lower_bound() == variable.upper_bound() {
                    variable.fix_to(variable.lower_bound());
                    changed = true;
                }
            }
        }
        changed
    }

    /// Derives bounds from enabled constraints with at most one free
    /// variable and disables the processed constraints.
    pub fn presolve_reduce_single_free_variable_constraints(&mut self) -> ModelResult<bool> {
        let references: Vec<ConstraintRef> = self
            .constraint_proxies()
            .iter()
            .flat_map(|proxy| proxy.elements())
            .filter(|constraint| constraint.is_enabled())
            .map(|constraint| constraint.reference())
            .collect();

        let mut changed = false;
        for reference in references {
            let reductions = self.single_free_variable_reductions(reference)?;
            for reduction in reductions {
                changed = true;
                match reduction {
                    Reduction::DisableConstraint => {
                        self.constraint_mut(reference).set_enabled(false);
                    }
                    Reduction::FixVariable(variable, value) => {
                        self.variable_mut(variable).fix_to(value);
                    }
                    Reduction::TightenUpper(variable, upper) => {
                        let lower = self.variable(variable).lower_bound();
                        if lower > upper {
                            return Err(ModelError::InvalidModel(format!(
                                "presolve collapsed the range of `{}` to empty",
                                self.variable(variable).label()
                            )));
                        }
                        self.variable_mut(variable).set_bounds(lower, upper);
                    }
                    Reduction::TightenLower(variable, lower) => {
                        let upper = self.variable(variable).upper_bound();
                        if lower > upper {
                            return Err(ModelError::InvalidModel(format!(
                                "presolve collapsed the range of `{}` to empty",
                                self.variable(variable).label()
                            )));
                        }
                        self.variable_mut(variable).set_bounds(lower, upper);
                    }
                }
            }
        }
        Ok(changed)
    }

    fn single_free_variable_reductions(
        &self,
        reference: ConstraintRef,
    ) -> ModelResult<Vec<Reduction<V>>> {
        let constraint = self.constraint(reference);
        let Some(form) = constraint.linear_form() else {
            return Ok(Vec::new());
        };

        let mut fixed_part = form.constant();
        let mut free: Option<(VariableRef, f64)> = None;
        let mut number_of_free = 0usize;
        for (&variable_reference, &coefficient) in form.coefficients() {
            let variable = self.variable(variable_reference);
            if variable.is_fixed() {
                fixed_part += coefficient * variable.value().as_f64();
            } else {
                number_of_free += 1;
                free = Some((variable_reference, coefficient));
            }
        }

        if number_of_free == 0 {
            // All variables fixed: the row is redundant when satisfied and a
            // permanent witness of infeasibility otherwise.
            if constraint.sense().violation(fixed_part) < EPSILON {
                return Ok(vec![Reduction::DisableConstraint]);
            }
            return Ok(Vec::new());
        }
        if number_of_free > 1 {
            return Ok(Vec::new());
        }

        let (variable_reference, coefficient) = free.expect("exactly one free variable");
        let variable = self.variable(variable_reference);
        let bound = -fixed_part / coefficient;

        let mut reductions = Vec::with_capacity(2);
        match constraint.sense() {
            ConstraintSense::Equal => {
                if (bound - bound.round()).abs() > EPSILON {
                    return Err(ModelError::InvalidModel(format!(
                        "`{}` forces `{}` to the non-integer value {}",
                        constraint.label(),
                        variable.label(),
                        bound
                    )));
                }
                let value = V::from_f64(bound.round()).ok_or_else(|| {
                    ModelError::InvalidModel(format!(
                        "`{}` forces `{}` outside its value range",
                        constraint.label(),
                        variable.label()
                    ))
                })?;
                if !variable.is_within_bounds(value) {
                    return Err(ModelError::InvalidModel(format!(
                        "`{}` forces `{}` to {} outside its bounds [{}, {}]",
                        constraint.label(),
                        variable.label(),
                        value,
                        variable.lower_bound(),
                        variable.upper_bound()
                    )));
                }
                reductions.push(Reduction::FixVariable(variable_reference, value));
            }
            ConstraintSense::LessEqual => {
                if coefficient > 0.0 {
                    let upper = floor_to::<V>(bound).min(variable.upper_bound());
                    reductions.push(Reduction::TightenUpper(variable_reference, upper));
                } else {
                    let lower = ceil_to::<V>(bound).max(variable.lower_bound());
                    reductions.push(Reduction::TightenLower(variable_reference, lower));
                }
            }
            ConstraintSense::GreaterEqual => {
                if coefficient > 0.0 {
                    let lower = ceil_to::<V>(bound).max(variable.lower_bound());
                    reductions.push(Reduction::TightenLower(variable_reference, lower));
                } else {
                    let upper = floor_to::<V>(bound).min(variable.upper_bound());
                    reductions.push(Reduction::TightenUpper(variable_reference, upper));
                }
            }
        }
        reductions.push(Reduction::DisableConstraint);
        Ok(reductions)
    }

    /// Fixes free variables that appear in no enabled constraint at the
    /// bound favored by their (minimization) objective coefficient.
    pub fn presolve_fix_independent_variables(&mut self) -> bool {
        let independent: Vec<(VariableRef, V)> = self
            .variable_proxies()
            .iter()
            .flat_map(|proxy| proxy.elements())
            .filter(|variable| !variable.is_fixed())
            .filter(|variable| {
                variable
                    .related_constraints()
                    .iter()
                    .all(|&reference| !self.constraint(reference).is_enabled())
            })
            .map(|variable| {
                let target = if variable.objective_sensitivity() > EPSILON {
                    variable.lower_bound()
                } else {
                    variable.upper_bound()
                };
                (variable.reference(), target)
            })
            .collect();

        let changed = !independent.is_empty();
        for (reference, value) in independent {
            self.variable_mut(reference).fix_to(value);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::LinearBuilder;
    use crate::model::SetupOptions;

    /// Ten variables in [-10, 10] with four rows that presolve must reduce
    /// completely: after setup every variable is fixed and every constraint
    /// is disabled.
    #[test]
    fn test_presolve_fixes_chained_rows() {
        let mut model: Model<i64> = Model::new("presolve");
        let x = model.create_bounded_variables("x", 10, -10, 10).unwrap();
        let mut objective = LinearBuilder::new();
        for i in 0..10 {
            objective = objective.add(1.0, x.at(i));
        }
        model.minimize(objective);

        model
            .create_constraint_with("g0", LinearBuilder::new().add(2.0, x.at(0)).eq(4.0))
            .unwrap();
        model
            .create_constraint_with("g1", LinearBuilder::new().add(3.0, x.at(1)).leq(10.0))
            .unwrap();
        model
            .create_constraint_with("g2", LinearBuilder::new().add(8.0, x.at(1)).geq(20.0))
            .unwrap();
        model
            .create_constraint_with(
                "g3",
                LinearBuilder::new()
                    .add(1.0, x.at(1))
                    .add(1.0, x.at(2))
                    .constant(1.0)
                    .eq(8.0),
            )
            .unwrap();

        model.setup(&SetupOptions::default()).unwrap();

        assert_eq!(model.variable(x.at(0)).value(), 2);
        assert_eq!(model.variable(x.at(1)).value(), 3);
        assert_eq!(model.variable(x.at(2)).value(), 4);
        for i in 3..10 {
            assert!(model.variable(x.at(i)).is_fixed());
            assert_eq!(model.variable(x.at(i)).value(), -10);
        }
        assert_eq!(model.number_of_enabled_constraints(), 0);
        assert_eq!(model.variable_counts().fixed, 10);
        assert_eq!(model.objective_value(), 2.0 + 3.0 + 4.0 - 70.0);
        assert_eq!(model.total_violation(), 0.0);
    }

    #[test]
    fn test_presolve_detects_empty_range() {
        let mut model: Model<i64> = Model::new("infeasible");
        let x = model.create_bounded_variable("x", 0, 5).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x));
        model
            .create_constraint_with("low", LinearBuilder::new().add(1.0, x).geq(7.0))
            .unwrap();
        assert!(matches!(
            model.setup(&SetupOptions::default()),
            Err(ModelError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_presolve_detects_fractional_equality() {
        let mut model: Model<i64> = Model::new("fractional");
        let x = model.create_bounded_variable("x", -10, 10).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x));
        model
            .create_constraint_with("half", LinearBuilder::new().add(2.0, x).eq(5.0))
            .unwrap();
        assert!(matches!(
            model.setup(&SetupOptions::default()),
            Err(ModelError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_presolve_disables_satisfied_fixed_rows() {
        let mut model: Model<i64> = Model::new("redundant");
        let x = model.create_bounded_variable("x", 3, 3).unwrap();
        let y = model.create_bounded_variable("y", 0, 1).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, y));
        model
            .create_constraint_with("fixed_row", LinearBuilder::new().add(1.0, x).leq(5.0))
            .unwrap();
        model
            .create_constraint_with(
                "live_row",
                LinearBuilder::new().add(1.0, x).add(1.0, y).leq(4.0),
            )
            .unwrap();
        model.setup(&SetupOptions::default()).unwrap();

        // `fixed_row` is implied by the fixed value; `live_row` reduces to a
        // bound on y (y <= 1) and is disabled as well.
        assert_eq!(model.number_of_enabled_constraints(), 0);
        assert!(model.variable(x).is_fixed());
    }

    #[test]
    fn test_independent_variables_follow_objective_direction() {
        let mut model: Model<i64> = Model::new("independent");
        let x = model.create_bounded_variables("x", 2, -4, 9).unwrap();
        model.minimize(
            LinearBuilder::new().add(1.0, x.at(0)).add(-2.0, x.at(1)),
        );
        model.setup(&SetupOptions::default()).unwrap();

        // Positive coefficient settles at the lower bound, negative at the
        // upper bound.
        assert_eq!(model.variable(x.at(0)).value(), -4);
        assert_eq!(model.variable(x.at(1)).value(), 9);
        assert_eq!(model.variable_counts().fixed, 2);
    }
}
