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

//! Monotonic wall-clock keeper.
//!
//! Cancellation is cooperative: the outer loop polls the clock before each
//! inner-loop entry and the inner loops poll it every
//! `time_check_interval` iterations. Timeouts are not errors — on timeout
//! the current incumbents are returned unchanged.

use std::time::Instant;

/// Measures elapsed wall-clock time from its construction.
#[derive(Clone, Copy, Debug)]
pub struct TimeKeeper {
    start: Instant,
}

impl Default for TimeKeeper {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeKeeper {
    /// Starts the clock.
    #[inline]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed time in seconds.
    #[inline]
    pub fn elapsed(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Returns `true` once the elapsed time exceeds `time_max` seconds.
    #[inline]
    pub fn is_time_over(&self, time_max: f64) -> bool {
        self.elapsed() > time_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_monotone() {
        let keeper = TimeKeeper::new();
        let first = keeper.elapsed();
        let second = keeper.elapsed();
        assert!(first >= 0.0);
        assert!(second >= first);
    }

    #[test]
    fn test_time_over_thresholds() {
        let keeper = TimeKeeper::new();
        assert!(!keeper.is_time_over(60.0));
        assert!(keeper.is_time_over(0.0) || keeper.elapsed() == 0.0);
    }
}
