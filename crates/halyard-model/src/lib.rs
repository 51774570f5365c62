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

//! # Halyard Model
//!
//! **The core domain model for the Halyard mixed-integer metaheuristic
//! solver.**
//!
//! A model is an arena of integer decision variables, sparse linear (or
//! opaque nonlinear) expressions, and sensed constraints, together with an
//! incremental evaluation kernel: applying or scoring a candidate move costs
//! time proportional to the size of the move, not the size of the model.
//!
//! ## Architecture
//!
//! * **`index`**: `(proxy, flat)` reference pairs for variables,
//!   expressions, and constraints. All cross-references are these integer
//!   pairs — never pointers — so there are no lifetime cycles and snapshots
//!   are trivial.
//! * **`variable`** / **`expression`** / **`constraint`**: the three entity
//!   kinds, each with cached evaluation state.
//! * **`mv`**: an atomic candidate transition (alterations + touched
//!   constraints).
//! * **`proxy`**: dense multi-dimensional containers that own the entities
//!   and supply their stable ids; `ValueProxy<T>` mirrors the same shapes
//!   for plain values (penalty weights, memory counters, exported
//!   solutions).
//! * **`selection`**: one-hot groups extracted from set-partitioning rows.
//! * **`model`**: the owning arena, the setup pipeline, and the
//!   `evaluate` / `apply` kernel. Presolve lives in its own module.
//!
//! ## Design Philosophy
//!
//! 1. **Type safety**: references are distinct types per entity kind; a
//!    `VariableRef` cannot address a constraint.
//! 2. **Incrementality**: every cached value is maintained by the same
//!    delta formulas on both the read path (`evaluate`) and the write path
//!    (`apply`), so the two can never drift apart.
//! 3. **Fail-fast**: the construction API validates eagerly and returns
//!    typed errors; the hot kernel relies on debug assertions instead.

pub mod constraint;
pub mod error;
pub mod expression;
pub mod index;
pub mod model;
pub mod mv;
pub mod presolve;
pub mod proxy;
pub mod selection;
pub mod solution;
pub mod variable;
