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

//! # Integer Constant Traits
//!
//! Compile-time constants for common numeric sentinel values across the
//! signed integer types. These traits provide a uniform way to access `-1`,
//! `0`, and `+1` as associated constants, enabling concise generic code
//! without littering call sites with type-specific literals.

/// A trait for integer types that have a constant representing -1.
pub trait MinusOne {
    /// The constant representing -1 for the implementing type.
    const MINUS_ONE: Self;
}

/// A trait for integer types that have a constant representing +1.
pub trait PlusOne {
    /// The constant representing +1 for the implementing type.
    const PLUS_ONE: Self;
}

/// A trait for integer types that have a constant representing 0.
pub trait Zero {
    /// The constant representing 0 for the implementing type.
    const ZERO: Self;
}

macro_rules! impl_signed_constants_for {
    ($t:ty) => {
        impl MinusOne for $t {
            const MINUS_ONE: Self = -1;
        }
        impl PlusOne for $t {
            const PLUS_ONE: Self = 1;
        }
        impl Zero for $t {
            const ZERO: Self = 0;
        }
    };
}

impl_signed_constants_for!(i8);
impl_signed_constants_for!(i16);
impl_signed_constants_for!(i32);
impl_signed_constants_for!(i64);
impl_signed_constants_for!(isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minus_one() {
        assert_eq!(i8::MINUS_ONE, -1i8);
        assert_eq!(i32::MINUS_ONE, -1i32);
        assert_eq!(isize::MINUS_ONE, -1isize);
    }

    #[test]
    fn test_zero_and_plus_one() {
        assert_eq!(i16::ZERO, 0i16);
        assert_eq!(i64::PLUS_ONE, 1i64);
    }

    #[test]
    fn test_generic_usage() {
        fn decrement<T: MinusOne + std::ops::Add<Output = T>>(value: T) -> T {
            value + T::MINUS_ONE
        }
        assert_eq!(decrement(5i64), 4);
    }
}
