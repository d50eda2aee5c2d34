//! Plan-once, execute-many 1-D FFT adapters.
//!
//! Two adapters wrap the external kernels:
//!
//! - [`R2cAdapter`]: real-to-complex along a line of `L` reals, producing
//!   `L/2 + 1` complex bins in place over a `2 * (L/2 + 1)`-real-wide line.
//! - [`C2cAdapter`]: complex-to-complex of length `L`, in place over `2 * L`
//!   interleaved reals.
//!
//! Both are planned once for a fixed length and [`PlanEffort`], are cheap to
//! clone (the plan is shared), and may execute concurrently on disjoint lines.
//!
//! # Example
//!
//! ```rust
//! use fft1d_adapter::{C2cAdapter, Direction, LineTransform, PlanEffort};
//!
//! let plan = C2cAdapter::plan(4, PlanEffort::Estimate, Direction::Forward).unwrap();
//! // (1, 0), (1, 0), (1, 0), (1, 0)
//! let mut line = [1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0];
//! plan.execute(&mut line).unwrap();
//! assert_eq!(line[0], 4.0);
//! assert_eq!(line[2], 0.0);
//! ```

mod c2c;
mod effort;
mod flops;
mod r2c;

pub use c2c::C2cAdapter;
pub use effort::PlanEffort;
pub use flops::FlopCount;
pub use r2c::R2cAdapter;

use std::fmt;
use std::io;

// ============================================================================
// Shared types
// ============================================================================

/// Transform direction of a complex plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => f.write_str("forward"),
            Direction::Backward => f.write_str("backward"),
        }
    }
}

/// A planned 1-D transform applied in place to one interleaved line.
pub trait LineTransform: Send + Sync {
    /// Logical transform length the plan was created for.
    fn length(&self) -> usize;

    /// Number of reals a line handed to [`execute`](Self::execute) must hold.
    fn line_len(&self) -> usize;

    /// Scratch sized for this plan, to be reused across many lines.
    fn make_scratch(&self) -> LineScratch;

    /// Apply the cached plan to `line` in place, using caller-owned scratch.
    ///
    /// `scratch` grows if it is too small for this plan and is never shrunk,
    /// so one buffer can serve every line of an axis without reallocating.
    fn execute_with_scratch(&self, line: &mut [f64], scratch: &mut LineScratch) -> Result<()>;

    /// Apply the cached plan to `line` in place with freshly allocated scratch.
    fn execute(&self, line: &mut [f64]) -> Result<()> {
        let mut scratch = self.make_scratch();
        self.execute_with_scratch(line, &mut scratch)
    }

    /// Operation-count estimate for one execution.
    fn flops(&self) -> FlopCount;

    /// Write a human-readable description of the plan.
    fn write_plan(&self, sink: &mut dyn io::Write) -> io::Result<()>;
}

/// Reusable working memory for [`LineTransform::execute_with_scratch`].
///
/// Holds a real staging line (the real-to-complex kernel consumes its input)
/// and the complex scratch the kernels ask for.
#[derive(Debug, Clone, Default)]
pub struct LineScratch {
    input: Vec<f64>,
    work: Vec<num_complex::Complex<f64>>,
}

impl LineScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_lens(input_len: usize, work_len: usize) -> Self {
        Self {
            input: vec![0.0; input_len],
            work: vec![num_complex::Complex::default(); work_len],
        }
    }

    /// Exact-length views, growing the buffers only when they are too short.
    pub(crate) fn split(
        &mut self,
        input_len: usize,
        work_len: usize,
    ) -> (&mut [f64], &mut [num_complex::Complex<f64>]) {
        if self.input.len() < input_len {
            self.input.resize(input_len, 0.0);
        }
        if self.work.len() < work_len {
            self.work.resize(work_len, num_complex::Complex::default());
        }
        (&mut self.input[..input_len], &mut self.work[..work_len])
    }
}

// ============================================================================
// Error types
// ============================================================================

/// Errors raised while planning or executing a 1-D transform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The planning-effort flag is not one of the recognized values.
    #[error("unknown planning effort {0:?} (expected estimate, measure, patient or exhaustive)")]
    UnknownEffort(String),

    /// A complex plan of length zero was requested.
    #[error("cannot plan a complex transform of length 0")]
    EmptyLength,

    /// The line handed to `execute` does not match the planned width.
    #[error("line holds {actual} reals, plan expects {expected}")]
    LineLength { expected: usize, actual: usize },

    /// The external kernel rejected the buffers.
    #[error("fft kernel error: {0}")]
    Kernel(String),
}

/// Result type for adapter operations.
pub type Result<T> = std::result::Result<T, PlanError>;

fn check_line(line: &[f64], expected: usize) -> Result<()> {
    if line.len() != expected {
        return Err(PlanError::LineLength {
            expected,
            actual: line.len(),
        });
    }
    Ok(())
}

fn as_complex_mut(line: &mut [f64]) -> Result<&mut [num_complex::Complex<f64>]> {
    bytemuck::try_cast_slice_mut(line).map_err(|e| PlanError::Kernel(e.to_string()))
}
