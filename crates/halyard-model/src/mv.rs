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

//! Candidate moves.
//!
//! A move is an atomic candidate transition: an ordered list of
//! `(variable, new value)` alterations plus the set of constraints it
//! touches. Moves hold index-pair back-references into the model and never
//! outlive the model that produced them. Most moves alter one or two
//! variables, so the alteration list is a `SmallVec` that stays on the
//! stack.

use crate::index::{ConstraintRef, VariableRef};
use halyard_core::num::VariableValue;
use smallvec::SmallVec;

/// The family a move belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MoveSense {
    Binary,
    Integer,
    Selection,
    Aggregation,
    Precedence,
    VariableBound,
    Exclusive,
    Chain,
    UserDefined,
}

/// An atomic candidate transition.
#[derive(Clone, Debug)]
pub struct Move<V>
where
    V: VariableValue,
{
    sense: MoveSense,
    alterations: SmallVec<[(VariableRef, V); 2]>,
    related_constraints: Vec<ConstraintRef>,
    is_univariate: bool,
}

impl<V> Move<V>
where
    V: VariableValue,
{
    /// Creates an empty move of the given family.
    #[inline]
    pub fn new(sense: MoveSense) -> Self {
        Self {
            sense,
            alterations: SmallVec::new(),
            related_constraints: Vec::new(),
            is_univariate: false,
        }
    }

    /// Creates a single-alteration move.
    #[inline]
    pub fn univariate(sense: MoveSense, variable: VariableRef, value: V) -> Self {
        let mut alterations = SmallVec::new();
        alterations.push((variable, value));
        Self {
            sense,
            alterations,
            related_constraints: Vec::new(),
            is_univariate: true,
        }
    }

    /// Creates a two-alteration move.
    #[inline]
    pub fn bivariate(
        sense: MoveSense,
        first: (VariableRef, V),
        second: (VariableRef, V),
    ) -> Self {
        debug_assert!(
            first.0 != second.0,
            "called `Move::bivariate` with the same variable {:?} in both alterations",
            first.0
        );
        let mut alterations = SmallVec::new();
        alterations.push(first);
        alterations.push(second);
        Self {
            sense,
            alterations,
            related_constraints: Vec::new(),
            is_univariate: false,
        }
    }

    /// The empty move; evaluating it scores the current assignment.
    #[inline]
    pub fn empty() -> Self {
        Self::new(MoveSense::UserDefined)
    }

    /// Returns the move family.
    #[inline(always)]
    pub fn sense(&self) -> MoveSense {
        self.sense
    }

    /// Returns the ordered alteration list.
    #[inline(always)]
    pub fn alterations(&self) -> &[(VariableRef, V)] {
        &self.alterations
    }

    /// Appends an alteration.
    #[inline]
    pub fn push_alteration(&mut self, variable: VariableRef, value: V) {
        debug_assert!(
            self.alterations
                .iter()
                .all(|&(existing, _)| existing != variable),
            "called `Move::push_alteration` with variable {:?} already altered by this move",
            variable
        );
        self.alterations.push((variable, value));
    }

    /// Returns the constraints this move touches.
    #[inline(always)]
    pub fn related_constraints(&self) -> &[ConstraintRef] {
        &self.related_constraints
    }

    /// Replaces the touched-constraint set. The caller passes the sorted,
    /// deduplicated union of the altered variables' related constraints.
    pub fn set_related_constraints(&mut self, related_constraints: Vec<ConstraintRef>) {
        debug_assert!(
            related_constraints.is_sorted(),
            "called `Move::set_related_constraints` with an unsorted constraint set"
        );
        self.related_constraints = related_constraints;
    }

    /// Returns `true` if this move alters exactly one variable.
    #[inline(always)]
    pub fn is_univariate(&self) -> bool {
        self.is_univariate
    }

    /// Returns `true` if this move has no alterations.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.alterations.is_empty()
    }

    /// Returns the first altered variable, used by the deterministic move
    /// tie-break.
    #[inline]
    pub fn first_altered_variable(&self) -> Option<VariableRef> {
        self.alterations.first().map(|&(variable, _)| variable)
    }

    /// Clears the move for reuse from a pooled buffer.
    pub fn clear(&mut self) {
        self.alterations.clear();
        self.related_constraints.clear();
        self.is_univariate = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(flat: usize) -> VariableRef {
        VariableRef::from_raw(0, flat)
    }

    #[test]
    fn test_univariate_move() {
        let mv: Move<i64> = Move::univariate(MoveSense::Binary, var(3), 1);
        assert!(mv.is_univariate());
        assert_eq!(mv.alterations(), &[(var(3), 1)]);
        assert_eq!(mv.first_altered_variable(), Some(var(3)));
    }

    #[test]
    fn test_bivariate_move() {
        let mv: Move<i64> = Move::bivariate(MoveSense::Selection, (var(0), 0), (var(4), 1));
        assert!(!mv.is_univariate());
        assert_eq!(mv.alterations().len(), 2);
        assert_eq!(mv.first_altered_variable(), Some(var(0)));
    }

    #[test]
    fn test_empty_move() {
        let mv: Move<i64> = Move::empty();
        assert!(mv.is_empty());
        assert_eq!(mv.first_altered_variable(), None);
        assert!(mv.related_constraints().is_empty());
    }

    #[test]
    fn test_clear_for_reuse() {
        let mut mv: Move<i64> = Move::univariate(MoveSense::Integer, var(1), 5);
        mv.set_related_constraints(vec![ConstraintRef::from_raw(0, 0)]);
        mv.clear();
        assert!(mv.is_empty());
        assert!(mv.related_constraints().is_empty());
        assert!(!mv.is_univariate());
    }
}
