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

//! # Multi-Dimensional Array Shapes
//!
//! Shape and stride metadata for dense, flat-indexed storage. A proxy that
//! owns an N-dimensional block of variables, expressions, constraints, or
//! plain values stores its elements in a single contiguous `Vec` and uses an
//! `ArrayShape` to translate between flat positions and multi-dimensional
//! index tuples.
//!
//! Strides are row-major: the last dimension is contiguous. The shape also
//! knows the widest extent's digit count so that generated element labels
//! (`x[03]`, `y[1, 12]`) align into fixed-width columns.

/// Shape, stride, and labeling metadata for a dense multi-dimensional block.
///
/// The shape is immutable after construction. Flat indices are always in
/// `0..number_of_elements()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayShape {
    id: usize,
    shape: Vec<usize>,
    strides: Vec<usize>,
    number_of_elements: usize,
    max_digits: usize,
}

#[inline]
fn digits(mut value: usize) -> usize {
    let mut count = 1;
    while value >= 10 {
        value /= 10;
        count += 1;
    }
    count
}

impl ArrayShape {
    /// Creates a scalar shape (a single element).
    #[inline]
    pub fn scalar(id: usize) -> Self {
        Self::new(id, &[1])
    }

    /// Creates a one-dimensional shape with `number_of_elements` elements.
    #[inline]
    pub fn one_dimensional(id: usize, number_of_elements: usize) -> Self {
        Self::new(id, &[number_of_elements])
    }

    /// Creates an N-dimensional shape.
    ///
    /// # Panics
    ///
    /// Panics if `shape` is empty or any extent is zero.
    pub fn new(id: usize, shape: &[usize]) -> Self {
        assert!(
            !shape.is_empty(),
            "called `ArrayShape::new` with an empty shape"
        );
        assert!(
            shape.iter().all(|&extent| extent > 0),
            "called `ArrayShape::new` with a zero extent in shape {:?}",
            shape
        );

        let number_of_elements = shape.iter().product();

        // Row-major strides: stride of the last dimension is 1, and each
        // earlier stride is the product of all later extents.
        let mut strides = vec![1usize; shape.len()];
        for i in (0..shape.len().saturating_sub(1)).rev() {
            strides[i] = strides[i + 1] * shape[i + 1];
        }

        let max_digits = shape
            .iter()
            .map(|&extent| digits(extent.saturating_sub(1)))
            .max()
            .unwrap_or(1);

        Self {
            id,
            shape: shape.to_vec(),
            strides,
            number_of_elements,
            max_digits,
        }
    }

    /// Returns the proxy id this shape belongs to.
    #[inline(always)]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Returns the extents of each dimension.
    #[inline(always)]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the row-major strides of each dimension.
    #[inline(always)]
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Returns the number of dimensions.
    #[inline(always)]
    pub fn number_of_dimensions(&self) -> usize {
        self.shape.len()
    }

    /// Returns the total number of elements.
    #[inline(always)]
    pub fn number_of_elements(&self) -> usize {
        self.number_of_elements
    }

    /// Translates a multi-dimensional index into a flat position.
    ///
    /// # Panics
    ///
    /// Panics if the index has the wrong arity or any component is out of
    /// bounds.
    pub fn flat_index(&self, multi_dimensional_index: &[usize]) -> usize {
        assert_eq!(
            multi_dimensional_index.len(),
            self.shape.len(),
            "called `ArrayShape::flat_index` with index arity {} but the shape has {} dimensions",
            multi_dimensional_index.len(),
            self.shape.len()
        );

        let mut flat = 0;
        for (dimension, (&component, &stride)) in multi_dimensional_index
            .iter()
            .zip(self.strides.iter())
            .enumerate()
        {
            debug_assert!(
                component < self.shape[dimension],
                "called `ArrayShape::flat_index` with component {} out of bounds: the extent of dimension {} is {}",
                component,
                dimension,
                self.shape[dimension]
            );
            flat += component * stride;
        }
        flat
    }

    /// Translates a flat position back into a multi-dimensional index.
    pub fn multi_dimensional_index(&self, flat_index: usize) -> Vec<usize> {
        debug_assert!(
            flat_index < self.number_of_elements,
            "called `ArrayShape::multi_dimensional_index` with flat index out of bounds: the len is {} but the index is {}",
            self.number_of_elements,
            flat_index
        );

        let mut result = vec![0usize; self.shape.len()];
        let mut remain = flat_index;
        for (component, &stride) in result.iter_mut().zip(self.strides.iter()) {
            *component = remain / stride;
            remain %= stride;
        }
        result
    }

    /// Returns the label of the element at `flat_index`.
    ///
    /// A scalar shape yields the empty string; otherwise the label is the
    /// bracketed, comma-separated index tuple with zero-padded components,
    /// e.g. `"[03]"` or `"[1, 12]"`.
    pub fn indices_label(&self, flat_index: usize) -> String {
        if self.number_of_elements == 1 {
            return String::new();
        }

        let index = self.multi_dimensional_index(flat_index);
        let mut label = String::with_capacity(2 + index.len() * (self.max_digits + 2));
        label.push('[');
        for (i, component) in index.iter().enumerate() {
            if i > 0 {
                label.push_str(", ");
            }
            label.push_str(&format!("{:0width$}", component, width = self.max_digits));
        }
        label.push(']');
        label
    }
}
