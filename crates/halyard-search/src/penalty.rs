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

//! Penalty-coefficient state.
//!
//! Two per-constraint weight vectors drive the augmented objectives: the
//! **local** vector adapts within and between tabu loops (tightened,
//! relaxed, or reset by the outer loop), while the **global** vector is
//! ratcheted monotonically and only when the global augmented incumbent
//! improves. Both start at the configured initial penalty coefficient.

use halyard_core::num::VariableValue;
use halyard_model::model::Model;
use halyard_model::proxy::ValueProxy;

/// The local and global penalty weight vectors, indexed like the model's
/// constraint proxies.
#[derive(Clone, Debug)]
pub struct PenaltyState {
    local: Vec<ValueProxy<f64>>,
    global: Vec<ValueProxy<f64>>,
}

impl PenaltyState {
    /// Creates both vectors seeded with `initial_penalty_coefficient`.
    pub fn new<V: VariableValue>(model: &Model<V>, initial_penalty_coefficient: f64) -> Self {
        let seeded = model.generate_constraint_parameter_proxies(initial_penalty_coefficient);
        Self {
            local: seeded.clone(),
            global: seeded,
        }
    }

    /// Returns the local weights.
    #[inline(always)]
    pub fn local(&self) -> &[ValueProxy<f64>] {
        &self.local
    }

    /// Returns the local weights mutably.
    #[inline(always)]
    pub fn local_mut(&mut self) -> &mut [ValueProxy<f64>] {
        &mut self.local
    }

    /// Returns the global weights.
    #[inline(always)]
    pub fn global(&self) -> &[ValueProxy<f64>] {
        &self.global
    }

    /// Returns the global weights mutably. The caller is responsible for
    /// keeping the global vector monotone non-decreasing.
    #[inline(always)]
    pub fn global_mut(&mut self) -> &mut [ValueProxy<f64>] {
        &mut self.global
    }

    /// Resets the local vector to the global one (the stagnation reset).
    pub fn reset_local_to_global(&mut self) {
        self.local = self.global.clone();
    }
}
