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

//! The neighborhood generator.
//!
//! One `Neighborhood` per solve. At construction it indexes the set-up
//! model's structure (binary and integer variables, selection groups, and
//! the two-variable rows recognized by the constraint classifier); each
//! iteration, `update_moves` rebuilds the candidate move list from the
//! current variable values into a pooled buffer.
//!
//! Families are individually switchable. The structural families
//! (aggregation, precedence, variable-bound, exclusive) and the chain
//! family are the "special" neighborhoods: the outer loop arms them on
//! stagnation and disarms them on improvement. Every emitted move skips
//! fixed variables and stays within bounds.

mod chain;
mod structural;

pub use structural::TwoVariableRow;

use halyard_core::num::VariableValue;
use halyard_model::constraint::ConstraintClassification;
use halyard_model::index::VariableRef;
use halyard_model::model::Model;
use halyard_model::mv::{Move, MoveSense};
use halyard_model::variable::VariableSense;

/// The user-defined move updater: appends candidate moves for the current
/// state of the model.
pub type MoveUpdater<V> = Box<dyn FnMut(&mut Vec<Move<V>>, &Model<V>) + Send>;

/// Upper bound on retained chain-move templates; the oldest templates are
/// evicted first.
pub(crate) const MAX_NUMBER_OF_CHAIN_MOVES: usize = 1_000;

/// Generates the per-iteration candidate move set.
pub struct Neighborhood<V>
where
    V: VariableValue,
{
    binary_variables: Vec<VariableRef>,
    integer_variables: Vec<VariableRef>,
    selection_members: Vec<Vec<VariableRef>>,
    aggregation_rows: Vec<TwoVariableRow>,
    precedence_rows: Vec<TwoVariableRow>,
    variable_bound_rows: Vec<TwoVariableRow>,
    exclusive_rows: Vec<(VariableRef, VariableRef)>,
    chain_templates: Vec<Move<V>>,

    is_enabled_binary_move: bool,
    is_enabled_integer_move: bool,
    is_enabled_selection_move: bool,
    is_enabled_user_defined_move: bool,
    is_enabled_aggregation_move: bool,
    is_enabled_precedence_move: bool,
    is_enabled_variable_bound_move: bool,
    is_enabled_exclusive_move: bool,
    is_enabled_chain_move: bool,
    is_stagnation_armed: bool,

    updater: Option<MoveUpdater<V>>,
    moves: Vec<Move<V>>,
    scratch: Vec<Move<V>>,
}

macro_rules! define_family_switch {
    ($is_enabled:ident, $enable:ident, $disable:ident) => {
        #[inline(always)]
        pub fn $is_enabled(&self) -> bool {
            self.$is_enabled
        }

        #[inline]
        pub fn $enable(&mut self) {
            self.$is_enabled = true;
        }

        #[inline]
        pub fn $disable(&mut self) {
            self.$is_enabled = false;
        }
    };
}

impl<V> Neighborhood<V>
where
    V: VariableValue,
{
    /// Indexes a set-up model. Structural rows are read off the constraint
    /// classification; disabled constraints (including extracted selection
    /// rows) contribute nothing.
    pub fn new(model: &Model<V>) -> Self {
        let mut binary_variables = Vec::new();
        let mut integer_variables = Vec::new();
        for proxy in model.variable_proxies() {
            for variable in proxy.elements() {
                match variable.sense() {
                    VariableSense::Binary => binary_variables.push(variable.reference()),
                    VariableSense::Integer => integer_variables.push(variable.reference()),
                    VariableSense::Selection | VariableSense::Fixed => {}
                }
            }
        }

        let selection_members = model
            .selections()
            .iter()
            .map(|selection| selection.variable_references().to_vec())
            .collect();

        let mut aggregation_rows = Vec::new();
        let mut precedence_rows = Vec::new();
        let mut variable_bound_rows = Vec::new();
        let mut exclusive_rows = Vec::new();
        for proxy in model.constraint_proxies() {
            for constraint in proxy.elements() {
                if !constraint.is_enabled() {
                    continue;
                }
                match constraint.classification() {
                    ConstraintClassification::Aggregation => {
                        if let Some(row) = TwoVariableRow::from_constraint(model, constraint) {
                            aggregation_rows.push(row);
                        }
                    }
                    ConstraintClassification::Precedence => {
                        if let Some(row) = TwoVariableRow::from_constraint(model, constraint) {
                            precedence_rows.push(row);
                        }
                    }
                    ConstraintClassification::VariableBound => {
                        if let Some(row) = TwoVariableRow::from_constraint(model, constraint) {
                            // A two-variable set-packing row (x + y <= 1 over
                            // binaries) is the exclusive pattern.
                            if row.is_exclusive_pair(model) {
                                exclusive_rows.push((row.first.0, row.second.0));
                            } else {
                                variable_bound_rows.push(row);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        Self {
            binary_variables,
            integer_variables,
            selection_members,
            aggregation_rows,
            precedence_rows,
            variable_bound_rows,
            exclusive_rows,
            chain_templates: Vec::new(),
            is_enabled_binary_move: false,
            is_enabled_integer_move: false,
            is_enabled_selection_move: false,
            is_enabled_user_defined_move: false,
            is_enabled_aggregation_move: false,
            is_enabled_precedence_move: false,
            is_enabled_variable_bound_move: false,
            is_enabled_exclusive_move: false,
            is_enabled_chain_move: false,
            is_stagnation_armed: false,
            updater: None,
            moves: Vec::new(),
            scratch: Vec::new(),
        }
    }

    define_family_switch!(is_enabled_binary_move, enable_binary_move, disable_binary_move);
    define_family_switch!(is_enabled_integer_move, enable_integer_move, disable_integer_move);
    define_family_switch!(
        is_enabled_selection_move,
        enable_selection_move,
        disable_selection_move
    );
    define_family_switch!(
        is_enabled_user_defined_move,
        enable_user_defined_move,
        disable_user_defined_move
    );
    define_family_switch!(
        is_enabled_aggregation_move,
        enable_aggregation_move,
        disable_aggregation_move
    );
    define_family_switch!(
        is_enabled_precedence_move,
        enable_precedence_move,
        disable_precedence_move
    );
    define_family_switch!(
        is_enabled_variable_bound_move,
        enable_variable_bound_move,
        disable_variable_bound_move
    );
    define_family_switch!(
        is_enabled_exclusive_move,
        enable_exclusive_move,
        disable_exclusive_move
    );
    define_family_switch!(is_enabled_chain_move, enable_chain_move, disable_chain_move);

    /// Arms the stagnation extras: integer bound-snap moves are emitted
    /// while armed.
    #[inline]
    pub fn arm_stagnation_moves(&mut self) {
        self.is_stagnation_armed = true;
    }

    /// Disarms the stagnation extras.
    #[inline]
    pub fn disarm_stagnation_moves(&mut self) {
        self.is_stagnation_armed = false;
    }

    /// Installs the user-defined move updater.
    pub fn set_move_updater(&mut self, updater: MoveUpdater<V>) {
        self.updater = Some(updater);
    }

    /// Returns `true` if any special (structural or chain) family has
    /// registered structure.
    pub fn has_special_moves(&self) -> bool {
        !self.aggregation_rows.is_empty()
            || !self.precedence_rows.is_empty()
            || !self.variable_bound_rows.is_empty()
            || !self.exclusive_rows.is_empty()
    }

    /// Returns the number of retained chain templates.
    pub fn number_of_chain_templates(&self) -> usize {
        self.chain_templates.len()
    }

    /// Rebuilds the candidate move list from the current variable values.
    ///
    /// The returned slice is valid until the next call; the backing buffer
    /// is pooled across iterations.
    pub fn update_moves(&mut self, model: &Model<V>) -> &[Move<V>] {
        let mut moves = std::mem::take(&mut self.moves);
        moves.clear();

        if self.is_enabled_binary_move {
            self.build_binary_moves(model, &mut moves);
        }
        if self.is_enabled_integer_move {
            self.build_integer_moves(model, &mut moves);
        }
        if self.is_enabled_selection_move {
            self.build_selection_moves(model, &mut moves);
        }
        if self.is_enabled_aggregation_move {
            structural::build_aggregation_moves(model, &self.aggregation_rows, &mut moves);
        }
        if self.is_enabled_precedence_move {
            structural::build_precedence_moves(model, &self.precedence_rows, &mut moves);
        }
        if self.is_enabled_variable_bound_move {
            structural::build_variable_bound_moves(model, &self.variable_bound_rows, &mut moves);
        }
        if self.is_enabled_exclusive_move {
            structural::build_exclusive_moves(model, &self.exclusive_rows, &mut moves);
        }
        if self.is_enabled_chain_move {
            chain::emit_chain_moves(model, &self.chain_templates, &mut moves);
        }
        if self.is_enabled_user_defined_move
            && let Some(updater) = self.updater.as_mut()
        {
            let mut user_moves = std::mem::take(&mut self.scratch);
            user_moves.clear();
            updater(&mut user_moves, model);
            moves.append(&mut user_moves);
            self.scratch = user_moves;
        }

        // No fixed variable may appear in an alteration and every new value
        // must stay within bounds, regardless of the emitting family.
        moves.retain(|mv| {
            !mv.is_empty()
                && mv.alterations().iter().all(|&(reference, value)| {
                    let variable = model.variable(reference);
                    !variable.is_fixed() && variable.is_within_bounds(value)
                })
        });
        for mv in moves.iter_mut() {
            if mv.related_constraints().is_empty() {
                model.attach_related_constraints(mv);
            }
        }

        self.moves = moves;
        &self.moves
    }

    /// Registers chain templates derived from a just-applied move: the
    /// applied alterations plus one repairing flip on each
    /// set-partitioning/packing row the move left violated.
    pub fn register_chain_moves(&mut self, model: &Model<V>, applied: &Move<V>) {
        chain::register_chain_moves(
            model,
            applied,
            &mut self.chain_templates,
            MAX_NUMBER_OF_CHAIN_MOVES,
        );
    }

    /// Drops all retained chain templates.
    pub fn clear_chain_moves(&mut self) {
        self.chain_templates.clear();
    }

    fn build_binary_moves(&self, model: &Model<V>, moves: &mut Vec<Move<V>>) {
        for &reference in &self.binary_variables {
            let variable = model.variable(reference);
            if variable.is_fixed() {
                continue;
            }
            let flipped = V::one() - variable.value();
            moves.push(Move::univariate(MoveSense::Binary, reference, flipped));
        }
    }

    fn build_integer_moves(&self, model: &Model<V>, moves: &mut Vec<Move<V>>) {
        for &reference in &self.integer_variables {
            let variable = model.variable(reference);
            if variable.is_fixed() {
                continue;
            }
            let value = variable.value();
            if value < variable.upper_bound() {
                moves.push(Move::univariate(
                    MoveSense::Integer,
                    reference,
                    value + V::one(),
                ));
            }
            if value > variable.lower_bound() {
                moves.push(Move::univariate(
                    MoveSense::Integer,
                    reference,
                    value - V::one(),
                ));
            }
            if self.is_stagnation_armed {
                // Bound snaps; the +-1 shifts above already cover adjacent
                // bounds.
                if variable.upper_bound() - value > V::one() {
                    moves.push(Move::univariate(
                        MoveSense::Integer,
                        reference,
                        variable.upper_bound(),
                    ));
                }
                if value - variable.lower_bound() > V::one() {
                    moves.push(Move::univariate(
                        MoveSense::Integer,
                        reference,
                        variable.lower_bound(),
                    ));
                }
            }
        }
    }

    fn build_selection_moves(&self, model: &Model<V>, moves: &mut Vec<Move<V>>) {
        for members in &self.selection_members {
            let Some(&selected) = members
                .iter()
                .find(|&&member| model.variable(member).value() == V::one())
            else {
                continue;
            };
            for &member in members {
                if member == selected {
                    continue;
                }
                moves.push(Move::bivariate(
                    MoveSense::Selection,
                    (selected, V::zero()),
                    (member, V::one()),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halyard_model::expression::LinearBuilder;
    use halyard_model::model::SetupOptions;
    use halyard_model::selection::SelectionMode;

    fn setup_options() -> SetupOptions {
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        options
    }

    #[test]
    fn test_binary_moves_flip_current_values() {
        let mut model: Model<i64> = Model::new("binary");
        let x = model.create_bounded_variables("x", 3, 0, 1).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x.at(0)).add(1.0, x.at(1)));
        model.setup(&setup_options()).unwrap();

        let mut neighborhood = Neighborhood::new(&model);
        neighborhood.enable_binary_move();
        let moves = neighborhood.update_moves(&model);
        assert_eq!(moves.len(), 3);
        assert!(moves.iter().all(|mv| mv.sense() == MoveSense::Binary));
        assert!(moves.iter().all(|mv| mv.alterations()[0].1 == 1));
        assert!(moves.iter().all(|mv| mv.is_univariate()));
    }

    #[test]
    fn test_integer_moves_respect_bounds_and_stagnation() {
        let mut model: Model<i64> = Model::new("integer");
        let x = model.create_bounded_variable("x", 0, 10).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x));
        model.setup(&setup_options()).unwrap();

        let mut neighborhood = Neighborhood::new(&model);
        neighborhood.enable_integer_move();

        // Value at the lower bound: only the +1 shift exists.
        let moves = neighborhood.update_moves(&model);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].alterations()[0].1, 1);

        // Armed stagnation adds the far-bound snap.
        neighborhood.arm_stagnation_moves();
        let moves = neighborhood.update_moves(&model);
        let values: Vec<i64> = moves.iter().map(|mv| mv.alterations()[0].1).collect();
        assert!(values.contains(&1));
        assert!(values.contains(&10));
        assert_eq!(moves.len(), 2);
    }

    #[test]
    fn test_selection_moves_swap_the_selected_member() {
        let mut model: Model<i64> = Model::new("selection");
        let x = model.create_bounded_variables("x", 4, 0, 1).unwrap();
        let mut row = LinearBuilder::new();
        for i in 0..4 {
            row = row.add(1.0, x.at(i));
        }
        model.create_constraint_with("partition", row.eq(1.0)).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x.at(0)));
        let mut options = setup_options();
        options.selection_mode = SelectionMode::Defined;
        model.setup(&options).unwrap();
        assert_eq!(model.selections().len(), 1);

        let mut neighborhood = Neighborhood::new(&model);
        neighborhood.enable_selection_move();
        let moves = neighborhood.update_moves(&model);
        // One swap per unselected member.
        assert_eq!(moves.len(), 3);
        for mv in moves {
            assert_eq!(mv.sense(), MoveSense::Selection);
            assert_eq!(mv.alterations().len(), 2);
            assert_eq!(mv.alterations()[0].1, 0);
            assert_eq!(mv.alterations()[1].1, 1);
        }
    }

    #[test]
    fn test_fixed_variables_never_appear() {
        let mut model: Model<i64> = Model::new("fixed");
        let x = model.create_bounded_variables("x", 3, 0, 1).unwrap();
        let y = model.create_bounded_variable("y", 1, 1).unwrap();
        model.minimize(
            LinearBuilder::new()
                .add(1.0, x.at(0))
                .add(1.0, x.at(1))
                .add(1.0, x.at(2))
                .add(1.0, y),
        );
        model.setup(&setup_options()).unwrap();

        let mut neighborhood = Neighborhood::new(&model);
        neighborhood.enable_binary_move();
        let moves = neighborhood.update_moves(&model);
        assert!(
            moves
                .iter()
                .all(|mv| mv.alterations().iter().all(|&(r, _)| r != y))
        );
    }

    #[test]
    fn test_user_defined_moves_are_filtered() {
        let mut model: Model<i64> = Model::new("user");
        let x = model.create_bounded_variables("x", 2, 0, 1).unwrap();
        let y = model.create_bounded_variable("y", 2, 2).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x.at(0)).add(1.0, y));
        model.setup(&setup_options()).unwrap();

        let mut neighborhood = Neighborhood::new(&model);
        neighborhood.enable_user_defined_move();
        let x0 = x.at(0);
        let x1 = x.at(1);
        neighborhood.set_move_updater(Box::new(move |moves, _model| {
            // A valid move, a move on a fixed variable, and an
            // out-of-bounds move; only the first must survive.
            moves.push(Move::univariate(MoveSense::UserDefined, x0, 1));
            moves.push(Move::univariate(MoveSense::UserDefined, y, 0));
            moves.push(Move::univariate(MoveSense::UserDefined, x1, 5));
        }));
        let moves = neighborhood.update_moves(&model);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].sense(), MoveSense::UserDefined);
        assert!(!moves[0].related_constraints().is_empty() || model.constraint_proxies().is_empty());
    }

    #[test]
    fn test_family_switches() {
        let mut model: Model<i64> = Model::new("switch");
        let x = model.create_bounded_variables("x", 2, 0, 1).unwrap();
        model.minimize(LinearBuilder::new().add(1.0, x.at(0)).add(1.0, x.at(1)));
        model.setup(&setup_options()).unwrap();

        let mut neighborhood = Neighborhood::new(&model);
        assert!(neighborhood.update_moves(&model).is_empty());
        neighborhood.enable_binary_move();
        assert!(!neighborhood.update_moves(&model).is_empty());
        neighborhood.disable_binary_move();
        assert!(neighborhood.update_moves(&model).is_empty());
    }
}
