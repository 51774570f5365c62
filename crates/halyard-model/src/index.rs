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

//! Index-pair references into the model arena.
//!
//! Every variable, expression, and constraint lives in a dense proxy vector
//! owned by the model. A reference is the `(proxy, flat)` integer pair that
//! addresses one element; references are `Copy`, `Ord` (lexicographic, which
//! gives the deterministic tie-break order used by the move chooser), and
//! remain valid for the lifetime of the model.

use halyard_core::utils::index::{TypedIndex, TypedIndexTag};

/// A tag type for proxy positions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ProxyIndexTag;

impl TypedIndexTag for ProxyIndexTag {
    const NAME: &'static str = "ProxyIndex";
}

/// The position of a proxy within its kind's proxy vector.
pub type ProxyIndex = TypedIndex<ProxyIndexTag>;

/// A tag type for flat element positions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct FlatIndexTag;

impl TypedIndexTag for FlatIndexTag {
    const NAME: &'static str = "FlatIndex";
}

/// The flat position of an element within its proxy.
pub type FlatIndex = TypedIndex<FlatIndexTag>;

macro_rules! define_reference {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            proxy: ProxyIndex,
            flat: FlatIndex,
        }

        impl $name {
            /// Creates a reference from a proxy position and a flat element
            /// position.
            #[inline(always)]
            pub const fn new(proxy: ProxyIndex, flat: FlatIndex) -> Self {
                Self { proxy, flat }
            }

            /// Creates a reference from raw `usize` positions.
            #[inline(always)]
            pub const fn from_raw(proxy: usize, flat: usize) -> Self {
                Self {
                    proxy: ProxyIndex::new(proxy),
                    flat: FlatIndex::new(flat),
                }
            }

            /// Returns the proxy position.
            #[inline(always)]
            pub const fn proxy(&self) -> ProxyIndex {
                self.proxy
            }

            /// Returns the flat element position.
            #[inline(always)]
            pub const fn flat(&self) -> FlatIndex {
                self.flat
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    "{}({}, {})",
                    stringify!($name),
                    self.proxy.get(),
                    self.flat.get()
                )
            }
        }
    };
}

define_reference!(
    /// A reference to a decision variable.
    VariableRef
);

define_reference!(
    /// A reference to an expression.
    ExpressionRef
);

define_reference!(
    /// A reference to a constraint.
    ConstraintRef
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_accessors() {
        let reference = VariableRef::from_raw(2, 7);
        assert_eq!(reference.proxy().get(), 2);
        assert_eq!(reference.flat().get(), 7);
    }

    #[test]
    fn test_lexicographic_ordering() {
        // Proxy position dominates, flat position breaks ties.
        assert!(VariableRef::from_raw(0, 9) < VariableRef::from_raw(1, 0));
        assert!(VariableRef::from_raw(1, 3) < VariableRef::from_raw(1, 4));
        assert_eq!(ConstraintRef::from_raw(5, 5), ConstraintRef::from_raw(5, 5));
    }

    #[test]
    fn test_debug_format() {
        let reference = ConstraintRef::from_raw(1, 2);
        assert_eq!(format!("{:?}", reference), "ConstraintRef(1, 2)");
    }
}
