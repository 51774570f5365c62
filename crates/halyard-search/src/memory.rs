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

//! Short- and long-term per-variable memory.
//!
//! The short-term memory records the iteration at which each variable was
//! last altered; the tabu classification compares `iteration − last_update`
//! against the tenure. The initial value is a large-but-finite negative
//! sentinel so the difference is always a finite integer.
//!
//! The long-term memory counts how often each variable has been altered.
//! The **bias** — the sum of squared update frequencies — is a
//! concentration index in `(1/n, 1]`: rising bias across loops means the
//! search keeps revisiting the same variables, and the outer loop responds
//! by raising the tabu tenure.

use halyard_core::num::VariableValue;
use halyard_model::model::Model;
use halyard_model::mv::Move;
use halyard_model::proxy::ValueProxy;
use rand::Rng;

/// The sentinel stored before a variable's first update. It must be finite
/// so `iteration − last_update` stays a valid integer, and negative enough
/// that fresh variables are never tabu.
pub const INITIAL_LAST_UPDATE_ITERATION: i64 = -1000;

/// Per-variable update recency and frequency counters.
#[derive(Clone, Debug)]
pub struct Memory {
    last_update_iterations: Vec<ValueProxy<i64>>,
    update_counts: Vec<ValueProxy<i64>>,
    total_update_count: i64,
}

impl Memory {
    /// Creates memory shaped like the model's variable proxies.
    pub fn new<V: VariableValue>(model: &Model<V>) -> Self {
        Self {
            last_update_iterations: model
                .generate_variable_parameter_proxies(INITIAL_LAST_UPDATE_ITERATION),
            update_counts: model.generate_variable_parameter_proxies(0i64),
            total_update_count: 0,
        }
    }

    /// Records that every variable altered by `mv` was updated at
    /// `iteration`.
    pub fn update<V: VariableValue>(&mut self, mv: &Move<V>, iteration: i64) {
        for &(reference, _) in mv.alterations() {
            let (proxy, flat) = (reference.proxy().get(), reference.flat().get());
            self.last_update_iterations[proxy].set_flat(flat, iteration);
            let count = self.update_counts[proxy].flat(flat);
            self.update_counts[proxy].set_flat(flat, count + 1);
            self.total_update_count += 1;
        }
    }

    /// Records an update with a randomized iteration stamp in
    /// `iteration ± width`.
    ///
    /// Used during the initial random modifications so the perturbed
    /// variables do not all leave the tabu list in the same iteration.
    pub fn update_randomized<V: VariableValue, R: Rng>(
        &mut self,
        mv: &Move<V>,
        iteration: i64,
        width: i64,
        rng: &mut R,
    ) {
        if width == 0 {
            self.update(mv, iteration);
            return;
        }
        for &(reference, _) in mv.alterations() {
            let (proxy, flat) = (reference.proxy().get(), reference.flat().get());
            let randomness = rng.gen_range(-width..=width);
            self.last_update_iterations[proxy].set_flat(flat, iteration + randomness);
            let count = self.update_counts[proxy].flat(flat);
            self.update_counts[proxy].set_flat(flat, count + 1);
            self.total_update_count += 1;
        }
    }

    /// Returns the iteration at which `reference` was last updated.
    #[inline]
    pub fn last_update_iteration(
        &self,
        reference: halyard_model::index::VariableRef,
    ) -> i64 {
        self.last_update_iterations[reference.proxy().get()].flat(reference.flat().get())
    }

    /// Resets the short-term memory to the sentinel, keeping the long-term
    /// counters.
    pub fn reset_last_update_iterations(&mut self) {
        for proxy in self.last_update_iterations.iter_mut() {
            proxy.fill(INITIAL_LAST_UPDATE_ITERATION);
        }
    }

    /// Returns the concentration index `Σ (count / total)²`.
    ///
    /// Returns `0.0` before the first update.
    pub fn bias(&self) -> f64 {
        if self.total_update_count == 0 {
            return 0.0;
        }
        let total = self.total_update_count as f64;
        self.update_counts
            .iter()
            .flat_map(|proxy| proxy.values())
            .map(|&count| {
                let frequency = count as f64 / total;
                frequency * frequency
            })
            .sum()
    }

    /// Returns the long-term update counters.
    #[inline(always)]
    pub fn update_counts(&self) -> &[ValueProxy<i64>] {
        &self.update_counts
    }

    /// Returns the short-term recency stamps.
    #[inline(always)]
    pub fn last_update_iterations(&self) -> &[ValueProxy<i64>] {
        &self.last_update_iterations
    }

    /// Returns the total number of recorded updates.
    #[inline(always)]
    pub fn total_update_count(&self) -> i64 {
        self.total_update_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halyard_model::expression::LinearBuilder;
    use halyard_model::model::SetupOptions;
    use halyard_model::mv::MoveSense;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn model_with_variables(n: usize) -> (Model<i64>, halyard_model::model::VariableVector) {
        let mut model: Model<i64> = Model::new("memory");
        let x = model.create_bounded_variables("x", n, 0, 1).unwrap();
        let mut objective = LinearBuilder::new();
        for i in 0..n {
            objective = objective.add(1.0, x.at(i));
        }
        model.minimize(objective);
        let mut row = LinearBuilder::new();
        for i in 0..n {
            row = row.add(1.0, x.at(i));
        }
        model.create_constraint_with("row", row.geq(1.0)).unwrap();
        let mut options = SetupOptions::default();
        options.is_enabled_presolve = false;
        model.setup(&options).unwrap();
        (model, x)
    }

    #[test]
    fn test_initial_state() {
        let (model, x) = model_with_variables(4);
        let memory = Memory::new(&model);
        assert_eq!(
            memory.last_update_iteration(x.at(0)),
            INITIAL_LAST_UPDATE_ITERATION
        );
        assert_eq!(memory.total_update_count(), 0);
        assert_eq!(memory.bias(), 0.0);
    }

    #[test]
    fn test_update_records_iteration_and_count() {
        let (model, x) = model_with_variables(4);
        let mut memory = Memory::new(&model);
        let mv: Move<i64> = Move::univariate(MoveSense::Binary, x.at(2), 1);
        memory.update(&mv, 17);
        assert_eq!(memory.last_update_iteration(x.at(2)), 17);
        assert_eq!(memory.total_update_count(), 1);
        assert_eq!(memory.update_counts()[0].flat(2), 1);
    }

    #[test]
    fn test_bias_concentration() {
        let (model, x) = model_with_variables(4);
        let mut memory = Memory::new(&model);
        let mv: Move<i64> = Move::univariate(MoveSense::Binary, x.at(0), 1);

        // All updates on one variable concentrate the bias at 1.
        for iteration in 0..10 {
            memory.update(&mv, iteration);
        }
        assert!((memory.bias() - 1.0).abs() < 1e-12);

        // Spreading updates over a second variable lowers the bias.
        let other: Move<i64> = Move::univariate(MoveSense::Binary, x.at(1), 1);
        for iteration in 10..20 {
            memory.update(&other, iteration);
        }
        assert!((memory.bias() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_randomized_update_stays_within_width() {
        let (model, x) = model_with_variables(4);
        let mut memory = Memory::new(&model);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mv: Move<i64> = Move::univariate(MoveSense::Binary, x.at(3), 1);
        memory.update_randomized(&mv, 100, 5, &mut rng);
        let stamp = memory.last_update_iteration(x.at(3));
        assert!((95..=105).contains(&stamp));
        assert_eq!(memory.total_update_count(), 1);
    }

    #[test]
    fn test_reset_keeps_long_term_counters() {
        let (model, x) = model_with_variables(4);
        let mut memory = Memory::new(&model);
        let mv: Move<i64> = Move::univariate(MoveSense::Binary, x.at(0), 1);
        memory.update(&mv, 5);
        memory.reset_last_update_iterations();
        assert_eq!(
            memory.last_update_iteration(x.at(0)),
            INITIAL_LAST_UPDATE_ITERATION
        );
        assert_eq!(memory.total_update_count(), 1);
        assert_eq!(memory.update_counts()[0].flat(0), 1);
    }
}
