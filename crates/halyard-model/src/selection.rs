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

//! One-hot selection groups.
//!
//! An enabled equality constraint `Σ xᵢ = 1` over binary variables defines
//! a selection group. When such a group is extracted, the covered variables
//! are reclassified as `Selection`, the defining constraint is disabled,
//! and the neighborhood enforces the one-hot property directly with swap
//! moves.

use crate::index::{ConstraintRef, VariableRef};

/// The selection extraction strategy applied during model setup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum SelectionMode {
    /// No extraction.
    #[default]
    None,
    /// Extract from every set-partitioning row. Rows sharing a variable
    /// with an already-extracted group are skipped with a warning.
    Defined,
    /// Extract only groups whose variable sets are disjoint from previously
    /// extracted groups, in definition order.
    Independent,
    /// Greedy extraction ordered by group size descending; disjointness is
    /// still required so that every variable belongs to at most one group.
    Larger,
}

/// A one-hot group of binary variables.
#[derive(Clone, Debug)]
pub struct Selection {
    index: usize,
    variable_references: Vec<VariableRef>,
    constraint_reference: ConstraintRef,
}

impl Selection {
    pub(crate) fn new(
        index: usize,
        variable_references: Vec<VariableRef>,
        constraint_reference: ConstraintRef,
    ) -> Self {
        debug_assert!(
            variable_references.len() >= 2,
            "called `Selection::new` with {} variables but a selection group needs at least 2",
            variable_references.len()
        );
        Self {
            index,
            variable_references,
            constraint_reference,
        }
    }

    /// Returns the position of this group in the model's selection list.
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the member variables.
    #[inline(always)]
    pub fn variable_references(&self) -> &[VariableRef] {
        &self.variable_references
    }

    /// Returns the defining (now disabled) constraint.
    #[inline(always)]
    pub fn constraint_reference(&self) -> ConstraintRef {
        self.constraint_reference
    }

    /// Returns the number of member variables.
    #[inline]
    pub fn size(&self) -> usize {
        self.variable_references.len()
    }
}
