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

//! Historical feasible-solution archive.
//!
//! A capacity-bounded, best-first pool of compact solution records. The
//! drivers hand over every feasible solution they encounter; duplicates are
//! dropped and the worst records fall off the end when the capacity is
//! exceeded. Objectives are internal minimization values.

use halyard_core::num::VariableValue;
use halyard_model::solution::PlainSolution;

/// A capacity-bounded archive of feasible solutions, kept sorted
/// best-first.
#[derive(Clone, Debug)]
pub struct SolutionPool<V>
where
    V: VariableValue,
{
    capacity: usize,
    solutions: Vec<PlainSolution<V>>,
}

impl<V> SolutionPool<V>
where
    V: VariableValue,
{
    /// Creates an empty pool holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            solutions: Vec::with_capacity(capacity.min(1024)),
        }
    }

    /// Inserts every feasible record, dropping duplicates and trimming the
    /// pool back to its capacity.
    pub fn push(&mut self, candidates: &[PlainSolution<V>]) {
        for candidate in candidates {
            if !candidate.is_feasible {
                continue;
            }
            let duplicate = self
                .solutions
                .iter()
                .any(|existing| existing.variable_values == candidate.variable_values);
            if !duplicate {
                self.solutions.push(candidate.clone());
            }
        }
        self.solutions.sort_by(|a, b| {
            a.objective
                .partial_cmp(&b.objective)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.solutions.truncate(self.capacity);
    }

    /// Returns the archived solutions, best (smallest objective) first.
    #[inline(always)]
    pub fn solutions(&self) -> &[PlainSolution<V>] {
        &self.solutions
    }

    /// Returns the number of archived solutions.
    #[inline]
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Returns `true` if the pool is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Returns the configured capacity.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(values: Vec<i64>, objective: f64, is_feasible: bool) -> PlainSolution<i64> {
        PlainSolution {
            variable_values: vec![values],
            objective,
            total_violation: if is_feasible { 0.0 } else { 1.0 },
            is_feasible,
        }
    }

    #[test]
    fn test_push_keeps_best_first_order() {
        let mut pool: SolutionPool<i64> = SolutionPool::new(10);
        pool.push(&[
            plain(vec![0, 1], 5.0, true),
            plain(vec![1, 0], 2.0, true),
            plain(vec![1, 1], 9.0, true),
        ]);
        let objectives: Vec<f64> = pool.solutions().iter().map(|s| s.objective).collect();
        assert_eq!(objectives, vec![2.0, 5.0, 9.0]);
    }

    #[test]
    fn test_infeasible_records_are_dropped() {
        let mut pool: SolutionPool<i64> = SolutionPool::new(10);
        pool.push(&[plain(vec![0], 1.0, false), plain(vec![1], 3.0, true)]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.solutions()[0].objective, 3.0);
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut pool: SolutionPool<i64> = SolutionPool::new(10);
        pool.push(&[plain(vec![0, 1], 5.0, true)]);
        pool.push(&[plain(vec![0, 1], 5.0, true), plain(vec![1, 0], 4.0, true)]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_capacity_trims_worst() {
        let mut pool: SolutionPool<i64> = SolutionPool::new(2);
        pool.push(&[
            plain(vec![0, 0], 5.0, true),
            plain(vec![0, 1], 2.0, true),
            plain(vec![1, 0], 9.0, true),
        ]);
        assert_eq!(pool.len(), 2);
        let objectives: Vec<f64> = pool.solutions().iter().map(|s| s.objective).collect();
        assert_eq!(objectives, vec![2.0, 5.0]);
    }
}
