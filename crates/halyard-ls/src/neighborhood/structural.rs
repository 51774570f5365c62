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

//! Structural move families over classified two-variable rows.
//!
//! Each family enumerates the finite set of paired assignments that keep
//! the defining constraint satisfied or push it toward feasibility:
//!
//! * **Aggregation** (`a₁x + a₂y + c = 0`): shift one variable by ±1 and
//!   set the other to the equality-induced value when it is integral.
//! * **Precedence** (`a(x − y) + c ⋄ 0`): shift both variables together,
//!   preserving their difference.
//! * **VariableBound**: shift one variable by ±1 and move the other to the
//!   extreme value the row still admits.
//! * **Exclusive** (`x + y ≤ 1` over binaries): enumerate the three
//!   admissible assignments.

use halyard_core::num::{EPSILON, VariableValue};
use halyard_model::constraint::{Constraint, ConstraintSense};
use halyard_model::index::VariableRef;
use halyard_model::model::Model;
use halyard_model::mv::{Move, MoveSense};
use halyard_model::variable::VariableSense;

/// A classified constraint row over exactly two free variables, with fixed
/// contributions folded into the constant.
#[derive(Clone, Copy, Debug)]
pub struct TwoVariableRow {
    pub first: (VariableRef, f64),
    pub second: (VariableRef, f64),
    pub constant: f64,
    pub sense: ConstraintSense,
}

impl TwoVariableRow {
    /// Reads a two-free-variable row off a constraint, or `None` if the
    /// shape does not match.
    pub fn from_constraint<V: VariableValue>(
        model: &Model<V>,
        constraint: &Constraint<V>,
    ) -> Option<Self> {
        let form = constraint.linear_form()?;
        let mut constant = form.constant();
        let mut free: Vec<(VariableRef, f64)> = Vec::with_capacity(2);
        for (&reference, &coefficient) in form.coefficients() {
            let variable = model.variable(reference);
            if variable.is_fixed() {
                constant += coefficient * variable.value().as_f64();
            } else {
                free.push((reference, coefficient));
            }
        }
        if free.len() != 2 {
            return None;
        }
        Some(Self {
            first: free[0],
            second: free[1],
            constant,
            sense: constraint.sense(),
        })
    }

    /// Returns `true` if this row is the exclusive pattern `x + y ≤ 1`
    /// over binary variables.
    pub fn is_exclusive_pair<V: VariableValue>(&self, model: &Model<V>) -> bool {
        self.sense == ConstraintSense::LessEqual
            && (self.first.1 - 1.0).abs() < EPSILON
            && (self.second.1 - 1.0).abs() < EPSILON
            && (self.constant + 1.0).abs() < EPSILON
            && model.variable(self.first.0).sense() == VariableSense::Binary
            && model.variable(self.second.0).sense() == VariableSense::Binary
    }
}

#[inline]
fn integral<V: VariableValue>(value: f64) -> Option<V> {
    if (value - value.round()).abs() < EPSILON {
        V::from_f64(value.round())
    } else {
        None
    }
}

#[inline]
fn floor_clamped<V: VariableValue>(value: f64, lower: V, upper: V) -> V {
    let floored = V::from_f64(value.floor()).unwrap_or(if value > 0.0 {
        V::max_value()
    } else {
        V::min_value()
    });
    floored.max(lower).min(upper)
}

#[inline]
fn ceil_clamped<V: VariableValue>(value: f64, lower: V, upper: V) -> V {
    let ceiled = V::from_f64(value.ceil()).unwrap_or(if value > 0.0 {
        V::max_value()
    } else {
        V::min_value()
    });
    ceiled.max(lower).min(upper)
}

/// Emits the aggregation moves of every row: one variable shifts by ±1 and
/// the other takes the equality-induced value.
pub fn build_aggregation_moves<V: VariableValue>(
    model: &Model<V>,
    rows: &[TwoVariableRow],
    moves: &mut Vec<Move<V>>,
) {
    for row in rows {
        for (driver, follower) in [(row.first, row.second), (row.second, row.first)] {
            let driver_variable = model.variable(driver.0);
            let follower_variable = model.variable(follower.0);
            for delta in [-1i64, 1] {
                let Some(step) = V::from_i64(delta) else {
                    continue;
                };
                let driver_value = driver_variable.value() + step;
                if !driver_variable.is_within_bounds(driver_value) {
                    continue;
                }
                let induced = (-row.constant - driver.1 * driver_value.as_f64()) / follower.1;
                let Some(follower_value) = integral::<V>(induced) else {
                    continue;
                };
                if !follower_variable.is_within_bounds(follower_value) {
                    continue;
                }
                moves.push(Move::bivariate(
                    MoveSense::Aggregation,
                    (driver.0, driver_value),
                    (follower.0, follower_value),
                ));
            }
        }
    }
}

/// Emits the precedence moves of every row: both variables shift together,
/// preserving their difference.
pub fn build_precedence_moves<V: VariableValue>(
    model: &Model<V>,
    rows: &[TwoVariableRow],
    moves: &mut Vec<Move<V>>,
) {
    for row in rows {
        let first = model.variable(row.first.0);
        let second = model.variable(row.second.0);
        for delta in [-1i64, 1] {
            let Some(step) = V::from_i64(delta) else {
                continue;
            };
            let first_value = first.value() + step;
            let second_value = second.value() + step;
            if first.is_within_bounds(first_value) && second.is_within_bounds(second_value) {
                moves.push(Move::bivariate(
                    MoveSense::Precedence,
                    (row.first.0, first_value),
                    (row.second.0, second_value),
                ));
            }
        }
    }
}

/// Emits the variable-bound moves of every row: one variable shifts by ±1
/// and the other moves to the extreme value the row still admits.
pub fn build_variable_bound_moves<V: VariableValue>(
    model: &Model<V>,
    rows: &[TwoVariableRow],
    moves: &mut Vec<Move<V>>,
) {
    for row in rows {
        for (driver, follower) in [(row.first, row.second), (row.second, row.first)] {
            let driver_variable = model.variable(driver.0);
            let follower_variable = model.variable(follower.0);
            for delta in [-1i64, 1] {
                let Some(step) = V::from_i64(delta) else {
                    continue;
                };
                let driver_value = driver_variable.value() + step;
                if !driver_variable.is_within_bounds(driver_value) {
                    continue;
                }
                // The row admits follower values on one side of this
                // threshold; move the follower to the admissible extreme.
                let threshold = (-row.constant - driver.1 * driver_value.as_f64()) / follower.1;
                let lower = follower_variable.lower_bound();
                let upper = follower_variable.upper_bound();
                let follower_value = match (row.sense, follower.1 > 0.0) {
                    (ConstraintSense::LessEqual, true) => floor_clamped(threshold, lower, upper),
                    (ConstraintSense::LessEqual, false) => ceil_clamped(threshold, lower, upper),
                    (ConstraintSense::GreaterEqual, true) => ceil_clamped(threshold, lower, upper),
                    (ConstraintSense::GreaterEqual, false) => floor_clamped(threshold, lower, upper),
                    // Two-variable equalities classify as aggregation rows.
                    (ConstraintSense::Equal, _) => continue,
                };
                moves.push(Move::bivariate(
                    MoveSense::VariableBound,
                    (driver.0, driver_value),
                    (follower.0, follower_value),
                ));
            }
        }
    }
}

/// Emits the exclusive moves of every pair: the admissible assignments of
/// `x + y ≤ 1` that differ from the current one.
pub fn build_exclusive_moves<V: VariableValue>(
    model: &Model<V>,
    pairs: &[(VariableRef, VariableRef)],
    moves: &mut Vec<Move<V>>,
) {
    for &(first, second) in pairs {
        let first_value = model.variable(first).value();
        let second_value = model.variable(second).value();
        for (target_first, target_second) in [
            (V::one(), V::zero()),
            (V::zero(), V::one()),
            (V::zero(), V::zero()),
        ] {
            let first_changes = target_first != first_value;
            let second_changes = target_second != second_value;
            match (first_changes, second_changes) {
                (true, true) => moves.push(Move::bivariate(
                    MoveSense::Exclusive,
                    (first, target_first),
                    (second, target_second),
                )),
                (true, false) => {
                    moves.push(Move::univariate(MoveSense::Exclusive, first, target_first))
                }
                (false, true) => {
                    moves.push(Move::univariate(MoveSense::Exclusive, second, target_second))
                }
                (false, false) => {}
            }
        }
    }
}
