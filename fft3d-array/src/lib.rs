//! Owned dense 3-D array for the shared-memory FFT pipeline.
//!
//! [`Dense3DArray`] stores `n_x * n_y * n_z` elements in one contiguous
//! row-major buffer (z varies fastest). The FFT engines keep real and complex
//! data in the same buffer type: a complex value occupies two adjacent slots
//! `(re, im)` along z.
//!
//! # Example
//!
//! ```rust
//! use fft3d_array::Dense3DArray;
//!
//! let mut a = Dense3DArray::<f64>::new(2, 3, 4);
//! a[(1, 2, 3)] = 5.0;
//! assert_eq!(*a.at(1, 2, 3).unwrap(), 5.0);
//! assert!(a.at(2, 0, 0).is_err());
//! assert_eq!(a.vector_z(1, 2), &[0.0, 0.0, 0.0, 5.0]);
//! ```

mod array;
mod display;

pub use array::Dense3DArray;

// ============================================================================
// Error types
// ============================================================================

/// Errors raised by checked [`Dense3DArray`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArrayError {
    /// A coordinate is not smaller than its extent.
    #[error("index {index:?} out of range for dims {dims:?}")]
    IndexOutOfRange { index: [usize; 3], dims: [usize; 3] },

    /// A buffer handed to the array does not hold `n_x * n_y * n_z` elements.
    #[error("buffer length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Result type for array operations.
pub type Result<T> = std::result::Result<T, ArrayError>;
