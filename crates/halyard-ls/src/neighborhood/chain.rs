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

//! Chain-move composition.
//!
//! A chain move welds a just-applied flip or swap to one additional flip
//! that repairs a set-partitioning or set-packing row the first move left
//! violated. The composed moves are kept as templates; they let later
//! iterations jump between feasibility islands in a single step. The
//! driver registers chains while they are enabled (stagnation) and the
//! outer loop clears the family again on improvement.

use halyard_core::num::{EPSILON, VariableValue};
use halyard_model::constraint::ConstraintClassification;
use halyard_model::model::Model;
use halyard_model::mv::{Move, MoveSense};

/// Derives chain templates from `applied` and pushes them onto
/// `templates`, evicting the oldest entries beyond `capacity`.
pub(crate) fn register_chain_moves<V: VariableValue>(
    model: &Model<V>,
    applied: &Move<V>,
    templates: &mut Vec<Move<V>>,
    capacity: usize,
) {
    for &reference in applied.related_constraints() {
        let constraint = model.constraint(reference);
        if !constraint.is_enabled() {
            continue;
        }
        let repairable = matches!(
            constraint.classification(),
            ConstraintClassification::SetPartitioning | ConstraintClassification::SetPacking
        );
        if !repairable || constraint.violation_value() < EPSILON {
            continue;
        }
        let Some(form) = constraint.linear_form() else {
            continue;
        };

        for &member in form.coefficients().keys() {
            let variable = model.variable(member);
            if variable.is_fixed() || variable.value() != V::one() {
                continue;
            }
            let altered = applied
                .alterations()
                .iter()
                .any(|&(existing, _)| existing == member);
            if altered {
                continue;
            }

            let mut chain = Move::new(MoveSense::Chain);
            for &(existing, value) in applied.alterations() {
                chain.push_alteration(existing, value);
            }
            chain.push_alteration(member, V::zero());
            model.attach_related_constraints(&mut chain);
            templates.push(chain);
        }
    }

    if templates.len() > capacity {
        let excess = templates.len() - capacity;
        templates.drain(0..excess);
    }
}

/// Emits every template that is still meaningful: all alterations within
/// bounds on unfixed variables, and at least one alteration that actually
/// changes the current value.
pub(crate) fn emit_chain_moves<V: VariableValue>(
    model: &Model<V>,
    templates: &[Move<V>],
    moves: &mut Vec<Move<V>>,
) {
    for template in templates {
        let valid = template.alterations().iter().all(|&(reference, value)| {
            let variable = model.variable(reference);
            !variable.is_fixed() && variable.is_within_bounds(value)
        });
        if !valid {
            continue;
        }
        let changes_something = template
            .alterations()
            .iter()
            .any(|&(reference, value)| model.variable(reference).value() != value);
        if changes_something {
            moves.push(template.clone());
        }
    }
}
