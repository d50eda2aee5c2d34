//! Row-major owned 3-D array.

use std::ops::{Index, IndexMut};

use crate::{ArrayError, Result};

/// Owned 3-D array with row-major layout: `linear = i * n_y * n_z + j * n_z + k`.
///
/// The buffer always holds exactly `n_x * n_y * n_z` elements. Moving out with
/// [`std::mem::take`] leaves an empty array of size 0 behind.
#[derive(Clone)]
pub struct Dense3DArray<T> {
    data: Vec<T>,
    dims: [usize; 3],
}

impl<T> Default for Dense3DArray<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            dims: [0, 0, 0],
        }
    }
}

impl<T> std::fmt::Debug for Dense3DArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dense3DArray")
            .field("dims", &self.dims)
            .field("size", &self.data.len())
            .finish()
    }
}

impl<T: Clone + Default> Dense3DArray<T> {
    /// Create an array filled with `T::default()` (zero for floats).
    pub fn new(n_x: usize, n_y: usize, n_z: usize) -> Self {
        Self::filled(n_x, n_y, n_z, T::default())
    }

    /// Change the extents of the array.
    ///
    /// When the element count is unchanged only the metadata changes and the
    /// buffer is reused as is. Otherwise the buffer is replaced by a
    /// default-filled one of the new size.
    pub fn reshape(&mut self, n_x: usize, n_y: usize, n_z: usize) {
        let total = n_x * n_y * n_z;
        if total != self.data.len() {
            self.data = vec![T::default(); total];
        }
        self.dims = [n_x, n_y, n_z];
    }
}

impl<T: Clone> Dense3DArray<T> {
    /// Create an array with every element set to `value`.
    pub fn filled(n_x: usize, n_y: usize, n_z: usize, value: T) -> Self {
        Self {
            data: vec![value; n_x * n_y * n_z],
            dims: [n_x, n_y, n_z],
        }
    }
}

impl<T> Dense3DArray<T> {
    /// Wrap an existing row-major buffer.
    pub fn from_vec(data: Vec<T>, n_x: usize, n_y: usize, n_z: usize) -> Result<Self> {
        let expected = n_x * n_y * n_z;
        if data.len() != expected {
            return Err(ArrayError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            dims: [n_x, n_y, n_z],
        })
    }

    /// Create an array with values produced by `f(i, j, k)`, called in memory order.
    pub fn from_fn(
        n_x: usize,
        n_y: usize,
        n_z: usize,
        mut f: impl FnMut(usize, usize, usize) -> T,
    ) -> Self {
        let mut data = Vec::with_capacity(n_x * n_y * n_z);
        for i in 0..n_x {
            for j in 0..n_y {
                for k in 0..n_z {
                    data.push(f(i, j, k));
                }
            }
        }
        Self {
            data,
            dims: [n_x, n_y, n_z],
        }
    }

    #[inline]
    pub fn n_x(&self) -> usize {
        self.dims[0]
    }

    #[inline]
    pub fn n_y(&self) -> usize {
        self.dims[1]
    }

    #[inline]
    pub fn n_z(&self) -> usize {
        self.dims[2]
    }

    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    /// Number of stored elements, `n_x * n_y * n_z`.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    fn linear_index(&self, i: usize, j: usize, k: usize) -> usize {
        i * self.dims[1] * self.dims[2] + j * self.dims[2] + k
    }

    fn checked_index(&self, i: usize, j: usize, k: usize) -> Result<usize> {
        let linear = self.linear_index(i, j, k);
        if i >= self.dims[0] || j >= self.dims[1] || k >= self.dims[2] || linear >= self.size() {
            return Err(ArrayError::IndexOutOfRange {
                index: [i, j, k],
                dims: self.dims,
            });
        }
        Ok(linear)
    }

    /// Bounds-checked element access.
    pub fn at(&self, i: usize, j: usize, k: usize) -> Result<&T> {
        let linear = self.checked_index(i, j, k)?;
        Ok(&self.data[linear])
    }

    /// Bounds-checked mutable element access.
    pub fn at_mut(&mut self, i: usize, j: usize, k: usize) -> Result<&mut T> {
        let linear = self.checked_index(i, j, k)?;
        Ok(&mut self.data[linear])
    }

    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Raw pointer to the first element, for handing the buffer to kernels.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }

    /// The `(y, z)` slab at x-index `i`.
    ///
    /// # Panics
    /// Panics if `i >= n_x`.
    pub fn slice_yz(&self, i: usize) -> &[T] {
        let len = self.dims[1] * self.dims[2];
        &self.data[i * len..(i + 1) * len]
    }

    /// Mutable `(y, z)` slab at x-index `i`.
    pub fn slice_yz_mut(&mut self, i: usize) -> &mut [T] {
        let len = self.dims[1] * self.dims[2];
        &mut self.data[i * len..(i + 1) * len]
    }

    /// The z-line at `(i, j)`.
    ///
    /// # Panics
    /// Panics if the line lies outside the buffer.
    pub fn vector_z(&self, i: usize, j: usize) -> &[T] {
        let start = self.linear_index(i, j, 0);
        &self.data[start..start + self.dims[2]]
    }

    /// Mutable z-line at `(i, j)`.
    pub fn vector_z_mut(&mut self, i: usize, j: usize) -> &mut [T] {
        let start = self.linear_index(i, j, 0);
        let n_z = self.dims[2];
        &mut self.data[start..start + n_z]
    }

    /// Iterate over all elements in memory order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    /// Mutable iteration over all elements in memory order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    /// Release the underlying buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: PartialEq> PartialEq for Dense3DArray<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.dims != other.dims {
            return false;
        }
        self.data.iter().zip(other.data.iter()).all(|(a, b)| a == b)
    }
}

/// Unchecked coordinate access: only the flat buffer bound is enforced.
impl<T> Index<(usize, usize, usize)> for Dense3DArray<T> {
    type Output = T;

    #[inline]
    fn index(&self, (i, j, k): (usize, usize, usize)) -> &T {
        &self.data[self.linear_index(i, j, k)]
    }
}

impl<T> IndexMut<(usize, usize, usize)> for Dense3DArray<T> {
    #[inline]
    fn index_mut(&mut self, (i, j, k): (usize, usize, usize)) -> &mut T {
        let linear = self.linear_index(i, j, k);
        &mut self.data[linear]
    }
}

// ============================================================================
// Tests
// ============================================================================
