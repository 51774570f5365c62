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

//! The three-way incumbent holder.
//!
//! The search tracks three incumbents at once, all scored as minimization
//! problems:
//!
//! * the **local-augmented** incumbent — best local-augmented objective in
//!   the current tabu loop, reopened between loops;
//! * the **global-augmented** incumbent — best global-augmented objective
//!   across the whole solve;
//! * the **feasible** incumbent — best plain objective among feasible
//!   solutions.
//!
//! Solutions are copied by value on update; no live variable state is ever
//! aliased. `try_update` reports which incumbents improved as a bitflag
//! union so callers can react to each kind of progress.

use halyard_core::num::VariableValue;
use halyard_model::solution::{Solution, SolutionScore};

/// A bitflag union of incumbent updates.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct UpdateStatus(u8);

impl UpdateStatus {
    /// No incumbent was updated.
    pub const NONE: UpdateStatus = UpdateStatus(0);
    /// The local-augmented incumbent improved.
    pub const LOCAL_AUGMENTED_INCUMBENT_UPDATE: UpdateStatus = UpdateStatus(1);
    /// The global-augmented incumbent improved.
    pub const GLOBAL_AUGMENTED_INCUMBENT_UPDATE: UpdateStatus = UpdateStatus(2);
    /// The feasible incumbent improved.
    pub const FEASIBLE_INCUMBENT_UPDATE: UpdateStatus = UpdateStatus(4);

    /// Returns `true` if every flag in `other` is set in `self`.
    #[inline(always)]
    pub fn contains(&self, other: UpdateStatus) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if no flag is set.
    #[inline(always)]
    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for UpdateStatus {
    type Output = UpdateStatus;

    #[inline(always)]
    fn bitor(self, rhs: UpdateStatus) -> UpdateStatus {
        UpdateStatus(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for UpdateStatus {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: UpdateStatus) {
        self.0 |= rhs.0;
    }
}

/// Holds the three incumbents of a solve.
#[derive(Clone, Debug)]
pub struct IncumbentHolder<V>
where
    V: VariableValue,
{
    found_feasible_solution: bool,
    local_augmented_incumbent_solution: Option<Solution<V>>,
    global_augmented_incumbent_solution: Option<Solution<V>>,
    feasible_incumbent_solution: Option<Solution<V>>,
    local_augmented_incumbent_objective: f64,
    global_augmented_incumbent_objective: f64,
    feasible_incumbent_objective: f64,
    local_augmented_incumbent_score: SolutionScore,
    global_augmented_incumbent_score: SolutionScore,
    feasible_incumbent_score: SolutionScore,
}

impl<V> Default for IncumbentHolder<V>
where
    V: VariableValue,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IncumbentHolder<V>
where
    V: VariableValue,
{
    /// Creates an empty holder; every incumbent objective starts at
    /// positive infinity.
    pub fn new() -> Self {
        Self {
            found_feasible_solution: false,
            local_augmented_incumbent_solution: None,
            global_augmented_incumbent_solution: None,
            feasible_incumbent_solution: None,
            local_augmented_incumbent_objective: f64::INFINITY,
            global_augmented_incumbent_objective: f64::INFINITY,
            feasible_incumbent_objective: f64::INFINITY,
            local_augmented_incumbent_score: SolutionScore::default(),
            global_augmented_incumbent_score: SolutionScore::default(),
            feasible_incumbent_score: SolutionScore::default(),
        }
    }

    /// Offers a scored solution to all three incumbents and reports which
    /// of them improved.
    ///
    /// The comparison is strict, so re-offering an incumbent is a no-op.
    pub fn try_update(&mut self, solution: &Solution<V>, score: &SolutionScore) -> UpdateStatus {
        let mut status = UpdateStatus::NONE;

        if score.local_augmented_objective < self.local_augmented_incumbent_objective {
            status |= UpdateStatus::LOCAL_AUGMENTED_INCUMBENT_UPDATE;
            self.local_augmented_incumbent_solution = Some(solution.clone());
            self.local_augmented_incumbent_score = *score;
            self.local_augmented_incumbent_objective = score.local_augmented_objective;
        }

        if score.global_augmented_objective < self.global_augmented_incumbent_objective {
            status |= UpdateStatus::GLOBAL_AUGMENTED_INCUMBENT_UPDATE;
            self.global_augmented_incumbent_solution = Some(solution.clone());
            self.global_augmented_incumbent_score = *score;
            self.global_augmented_incumbent_objective = score.global_augmented_objective;
        }

        if score.is_feasible {
            self.found_feasible_solution = true;
            if score.objective < self.feasible_incumbent_objective {
                status |= UpdateStatus::FEASIBLE_INCUMBENT_UPDATE;
                self.feasible_incumbent_solution = Some(solution.clone());
                self.feasible_incumbent_score = *score;
                self.feasible_incumbent_objective = score.objective;
            }
        }

        status
    }

    /// Reopens the local-augmented incumbent so the next tabu loop can
    /// settle into its own local best.
    pub fn reset_local_augmented(&mut self) {
        self.local_augmented_incumbent_objective = f64::INFINITY;
    }

    /// Returns `true` if any feasible solution has been offered.
    #[inline(always)]
    pub fn is_found_feasible_solution(&self) -> bool {
        self.found_feasible_solution
    }

    /// Returns the local-augmented incumbent solution.
    ///
    /// # Panics
    ///
    /// Panics if no solution has been offered yet.
    pub fn local_augmented_incumbent_solution(&self) -> &Solution<V> {
        self.local_augmented_incumbent_solution
            .as_ref()
            .expect("called `IncumbentHolder::local_augmented_incumbent_solution` before any update")
    }

    /// Returns the global-augmented incumbent solution.
    ///
    /// # Panics
    ///
    /// Panics if no solution has been offered yet.
    pub fn global_augmented_incumbent_solution(&self) -> &Solution<V> {
        self.global_augmented_incumbent_solution
            .as_ref()
            .expect("called `IncumbentHolder::global_augmented_incumbent_solution` before any update")
    }

    /// Returns the feasible incumbent solution, if one exists.
    pub fn feasible_incumbent_solution(&self) -> Option<&Solution<V>> {
        self.feasible_incumbent_solution.as_ref()
    }

    /// Returns the local-augmented incumbent objective (minimization).
    #[inline(always)]
    pub fn local_augmented_incumbent_objective(&self) -> f64 {
        self.local_augmented_incumbent_objective
    }

    /// Returns the global-augmented incumbent objective (minimization).
    #[inline(always)]
    pub fn global_augmented_incumbent_objective(&self) -> f64 {
        self.global_augmented_incumbent_objective
    }

    /// Returns the feasible incumbent objective (minimization).
    #[inline(always)]
    pub fn feasible_incumbent_objective(&self) -> f64 {
        self.feasible_incumbent_objective
    }

    /// Returns the score of the local-augmented incumbent.
    #[inline(always)]
    pub fn local_augmented_incumbent_score(&self) -> &SolutionScore {
        &self.local_augmented_incumbent_score
    }

    /// Returns the score of the global-augmented incumbent.
    #[inline(always)]
    pub fn global_augmented_incumbent_score(&self) -> &SolutionScore {
        &self.global_augmented_incumbent_score
    }

    /// Returns the score of the feasible incumbent.
    #[inline(always)]
    pub fn feasible_incumbent_score(&self) -> &SolutionScore {
        &self.feasible_incumbent_score
    }
}
