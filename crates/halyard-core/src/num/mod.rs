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

pub mod constants;

use self::constants::{MinusOne, PlusOne, Zero};
use num_traits::{FromPrimitive, PrimInt, Signed, ToPrimitive};

/// Comparison tolerance for objective values, violations, and penalty
/// coefficients. Quantities below this threshold are treated as zero.
pub const EPSILON: f64 = 1e-7;

/// A trait alias for the value type of decision variables.
///
/// These are the signed integer primitives `i8`, `i16`, `i32`, `i64` and
/// `isize`. Objective values, coefficients, and penalties are always `f64`;
/// this trait covers the integral side of the model.
///
/// # Note
///
/// `i128` is intentionally excluded due to performance reasons, as it is
/// significantly slower on many platforms.
pub trait VariableValue:
    PrimInt
    + Signed
    + FromPrimitive
    + ToPrimitive
    + MinusOne
    + PlusOne
    + Zero
    + std::hash::Hash
    + std::fmt::Debug
    + std::fmt::Display
    + Send
    + Sync
    + 'static
{
    /// Converts the value to `f64` for objective and penalty arithmetic.
    ///
    /// For the primitive widths admitted by this trait the conversion never
    /// fails; the fallback exists only to keep the hot path panic-free.
    #[inline(always)]
    fn as_f64(self) -> f64 {
        self.to_f64().unwrap_or(0.0)
    }
}

impl VariableValue for i8 {}
impl VariableValue for i16 {}
impl VariableValue for i32 {}
impl VariableValue for i64 {}
impl VariableValue for isize {}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<V: VariableValue>(value: V) -> f64 {
        value.as_f64()
    }

    #[test]
    fn test_as_f64_for_all_widths() {
        assert_eq!(roundtrip(-3i8), -3.0);
        assert_eq!(roundtrip(100i16), 100.0);
        assert_eq!(roundtrip(-40_000i32), -40_000.0);
        assert_eq!(roundtrip(1_000_000_007i64), 1_000_000_007.0);
        assert_eq!(roundtrip(0isize), 0.0);
    }

    #[test]
    fn test_constants_are_consistent() {
        assert_eq!(i64::MINUS_ONE, -1);
        assert_eq!(i64::ZERO, 0);
        assert_eq!(i64::PLUS_ONE, 1);
    }
}
