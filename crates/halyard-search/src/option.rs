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

//! The solver option surface.
//!
//! One flat struct with nested per-driver blocks. Every knob has a
//! conservative default; `validate()` rejects values outside their
//! admissible ranges with `InvalidOption` before any search state is
//! built. The random seed makes runs byte-reproducible for fixed options.

use halyard_model::error::{ModelError, ModelResult};
use halyard_model::model::SetupOptions;
use halyard_model::selection::SelectionMode;

/// The sentinel target objective meaning "no target given by the user".
pub const DEFAULT_TARGET_OBJECTIVE: f64 = -1e100;

/// Console verbosity of the solver.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub enum Verbose {
    #[default]
    None,
    Warning,
    Outer,
    Full,
}

/// Which incumbent seeds the next tabu-search loop.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum RestartMode {
    #[default]
    Global,
    Local,
}

/// Knobs of the tabu-search inner loop.
#[derive(Clone, Copy, Debug)]
pub struct TabuSearchOptions {
    /// Iteration cap of one inner loop.
    pub iteration_max: usize,
    /// Tabu tenure at the start of a loop.
    pub initial_tabu_tenure: usize,
    /// Adjust the tenure between loops from the memory bias signal.
    pub is_enabled_automatic_tabu_tenure_adjustment: bool,
    /// Adjust the next loop's iteration cap from the last improvement.
    pub is_enabled_automatic_iteration_adjustment: bool,
    /// Growth factor for the automatic iteration adjustment.
    pub iteration_increase_rate: f64,
    /// Nominal number of initial random modifications per tenure unit.
    pub initial_modification_fixed_rate: f64,
    /// Randomization width of the initial modification count, as a rate of
    /// the nominal count.
    pub initial_modification_randomize_rate: f64,
    /// Perturb the restart solution when the previous loop stalled.
    pub is_enabled_initial_modification: bool,
    /// Number of random modifications applied before this loop; set by the
    /// outer loop, not by users.
    pub number_of_initial_modification: usize,
    /// Which incumbent the next loop restarts from.
    pub restart_mode: RestartMode,
    /// Inner-loop iterations between wall-clock polls.
    pub time_check_interval: usize,
    /// Stop the loop early when a feasible incumbent exists and the global
    /// augmented incumbent has not improved for this many iterations.
    pub early_stop_window: usize,
}

impl Default for TabuSearchOptions {
    fn default() -> Self {
        Self {
            iteration_max: 200,
            initial_tabu_tenure: 10,
            is_enabled_automatic_tabu_tenure_adjustment: true,
            is_enabled_automatic_iteration_adjustment: true,
            iteration_increase_rate: 1.5,
            initial_modification_fixed_rate: 1.0,
            initial_modification_randomize_rate: 0.5,
            is_enabled_initial_modification: true,
            number_of_initial_modification: 0,
            restart_mode: RestartMode::Global,
            time_check_interval: 100,
            early_stop_window: 500,
        }
    }
}

/// Knobs of the best-improvement local search.
#[derive(Clone, Copy, Debug)]
pub struct LocalSearchOptions {
    pub iteration_max: usize,
    pub time_check_interval: usize,
}

impl Default for LocalSearchOptions {
    fn default() -> Self {
        Self {
            iteration_max: 10_000,
            time_check_interval: 100,
        }
    }
}

/// Knobs of the Lagrangian-dual warm start.
#[derive(Clone, Copy, Debug)]
pub struct LagrangeDualOptions {
    pub iteration_max: usize,
    /// Initial subgradient step size.
    pub initial_step_size: f64,
    /// Geometric shrink applied when the dual bound fails to improve.
    pub step_size_shrink_rate: f64,
    /// Convergence tolerance on the dual bound.
    pub tolerance: f64,
    pub time_check_interval: usize,
}

impl Default for LagrangeDualOptions {
    fn default() -> Self {
        Self {
            iteration_max: 1_000,
            initial_step_size: 1.0,
            step_size_shrink_rate: 0.9,
            tolerance: 1e-5,
            time_check_interval: 100,
        }
    }
}

/// The full option surface of a solve.
#[derive(Clone, Debug)]
pub struct SolverOptions {
    /// Outer-loop cap (number of tabu-search loops).
    pub iteration_max: usize,
    /// Wall-clock cap in seconds.
    pub time_max: f64,
    /// Terminate once the feasible incumbent reaches this value (after
    /// sign normalization).
    pub target_objective_value: f64,
    /// Seeds both penalty weight vectors and caps tightened local weights.
    pub initial_penalty_coefficient: f64,
    pub penalty_coefficient_tightening_rate: f64,
    pub penalty_coefficient_relaxing_rate: f64,
    /// Balance between the constant and violation-proportional tightening
    /// terms, in `[0, 1]`.
    pub penalty_coefficient_updating_balance: f64,
    /// Reset `local ← global` after this many stagnant loops.
    pub penalty_coefficient_reset_count_threshold: usize,
    /// Raise all weights within one constraint proxy to the proxy maximum
    /// when tightening.
    pub is_enabled_grouping_penalty_coefficient: bool,
    pub selection_mode: SelectionMode,
    pub is_enabled_presolve: bool,
    pub is_enabled_initial_value_correction: bool,
    /// Skip moves that improve neither the objective nor the violation.
    pub is_enabled_improvability_screening: bool,
    pub is_enabled_lagrange_dual: bool,
    pub is_enabled_local_search: bool,
    pub is_enabled_binary_move: bool,
    pub is_enabled_integer_move: bool,
    pub is_enabled_user_defined_move: bool,
    pub is_enabled_aggregation_move: bool,
    pub is_enabled_precedence_move: bool,
    pub is_enabled_variable_bound_move: bool,
    pub is_enabled_exclusive_move: bool,
    pub is_enabled_chain_move: bool,
    pub historical_data_capacity: usize,
    pub is_enabled_collect_historical_data: bool,
    pub seed: u64,
    pub verbose: Verbose,
    pub tabu_search: TabuSearchOptions,
    pub local_search: LocalSearchOptions,
    pub lagrange_dual: LagrangeDualOptions,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            iteration_max: 100,
            time_max: 120.0,
            target_objective_value: DEFAULT_TARGET_OBJECTIVE,
            initial_penalty_coefficient: 1e7,
            penalty_coefficient_tightening_rate: 1.0,
            penalty_coefficient_relaxing_rate: 0.9,
            penalty_coefficient_updating_balance: 0.5,
            penalty_coefficient_reset_count_threshold: 5,
            is_enabled_grouping_penalty_coefficient: false,
            selection_mode: SelectionMode::None,
            is_enabled_presolve: true,
            is_enabled_initial_value_correction: true,
            is_enabled_improvability_screening: false,
            is_enabled_lagrange_dual: false,
            is_enabled_local_search: false,
            is_enabled_binary_move: true,
            is_enabled_integer_move: true,
            is_enabled_user_defined_move: true,
            is_enabled_aggregation_move: false,
            is_enabled_precedence_move: false,
            is_enabled_variable_bound_move: false,
            is_enabled_exclusive_move: false,
            is_enabled_chain_move: false,
            historical_data_capacity: 1_000,
            is_enabled_collect_historical_data: true,
            seed: 1,
            verbose: Verbose::None,
            tabu_search: TabuSearchOptions::default(),
            local_search: LocalSearchOptions::default(),
            lagrange_dual: LagrangeDualOptions::default(),
        }
    }
}

impl SolverOptions {
    /// Validates every knob against its admissible range.
    pub fn validate(&self) -> ModelResult<()> {
        if self.time_max <= 0.0 {
            return Err(ModelError::InvalidOption(format!(
                "time_max must be positive but is {}",
                self.time_max
            )));
        }
        if self.initial_penalty_coefficient <= 0.0 {
            return Err(ModelError::InvalidOption(format!(
                "initial_penalty_coefficient must be positive but is {}",
                self.initial_penalty_coefficient
            )));
        }
        if self.penalty_coefficient_tightening_rate < 0.0 {
            return Err(ModelError::InvalidOption(format!(
                "penalty_coefficient_tightening_rate must be non-negative but is {}",
                self.penalty_coefficient_tightening_rate
            )));
        }
        if !(0.0..1.0).contains(&self.penalty_coefficient_relaxing_rate)
            || self.penalty_coefficient_relaxing_rate <= 0.0
        {
            return Err(ModelError::InvalidOption(format!(
                "penalty_coefficient_relaxing_rate must be in (0, 1) but is {}",
                self.penalty_coefficient_relaxing_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.penalty_coefficient_updating_balance) {
            return Err(ModelError::InvalidOption(format!(
                "penalty_coefficient_updating_balance must be in [0, 1] but is {}",
                self.penalty_coefficient_updating_balance
            )));
        }
        if self.penalty_coefficient_reset_count_threshold == 0 {
            return Err(ModelError::InvalidOption(
                "penalty_coefficient_reset_count_threshold must be at least 1".to_string(),
            ));
        }
        if self.tabu_search.initial_tabu_tenure == 0 {
            return Err(ModelError::InvalidOption(
                "tabu_search.initial_tabu_tenure must be at least 1".to_string(),
            ));
        }
        if self.tabu_search.iteration_increase_rate < 1.0 {
            return Err(ModelError::InvalidOption(format!(
                "tabu_search.iteration_increase_rate must be at least 1 but is {}",
                self.tabu_search.iteration_increase_rate
            )));
        }
        if self.tabu_search.initial_modification_fixed_rate < 0.0
            || self.tabu_search.initial_modification_randomize_rate < 0.0
        {
            return Err(ModelError::InvalidOption(
                "initial modification rates must be non-negative".to_string(),
            ));
        }
        if self.tabu_search.time_check_interval == 0 {
            return Err(ModelError::InvalidOption(
                "tabu_search.time_check_interval must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.lagrange_dual.step_size_shrink_rate)
            || self.lagrange_dual.step_size_shrink_rate <= 0.0
        {
            return Err(ModelError::InvalidOption(format!(
                "lagrange_dual.step_size_shrink_rate must be in (0, 1) but is {}",
                self.lagrange_dual.step_size_shrink_rate
            )));
        }
        Ok(())
    }

    /// Projects the setup-relevant switches for `Model::setup`.
    pub fn to_setup_options(&self) -> SetupOptions {
        SetupOptions {
            is_enabled_presolve: self.is_enabled_presolve,
            is_enabled_initial_value_correction: self.is_enabled_initial_value_correction,
            selection_mode: self.selection_mode,
        }
    }

    /// Returns `true` if the user left the target objective at its default.
    pub fn has_default_target_objective(&self) -> bool {
        let changed_rate = self.target_objective_value / DEFAULT_TARGET_OBJECTIVE - 1.0;
        changed_rate.abs() < halyard_core::num::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SolverOptions::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_rates_are_rejected() {
        let mut options = SolverOptions::default();
        options.penalty_coefficient_relaxing_rate = 1.0;
        assert!(options.validate().is_err());

        let mut options = SolverOptions::default();
        options.penalty_coefficient_updating_balance = 1.5;
        assert!(options.validate().is_err());

        let mut options = SolverOptions::default();
        options.tabu_search.initial_tabu_tenure = 0;
        assert!(options.validate().is_err());

        let mut options = SolverOptions::default();
        options.time_max = 0.0;
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_default_target_detection() {
        let options = SolverOptions::default();
        assert!(options.has_default_target_objective());

        let mut options = SolverOptions::default();
        options.target_objective_value = 42.0;
        assert!(!options.has_default_target_objective());
    }

    #[test]
    fn test_verbose_ordering() {
        assert!(Verbose::Full > Verbose::Outer);
        assert!(Verbose::Outer > Verbose::Warning);
        assert!(Verbose::Warning > Verbose::None);
    }

    #[test]
    fn test_setup_projection() {
        let mut options = SolverOptions::default();
        options.selection_mode = SelectionMode::Larger;
        options.is_enabled_presolve = false;
        let setup = options.to_setup_options();
        assert!(!setup.is_enabled_presolve);
        assert_eq!(setup.selection_mode, SelectionMode::Larger);
    }
}
