//! Shared-memory 3-D real-to-complex FFT built from 1-D transforms and axis
//! transposes.
//!
//! The input is an `(n_x, n_y, n_z)` array of reals where only the first
//! `n_z - 2` values of every z-line are data; the last two slots are padding
//! that holds the extra Hermitian bin. The output has the same shape and holds
//! `n_z / 2` interleaved `(re, im)` bins per z-line.
//!
//! The transform runs in six ordered steps (r2c along z, transpose, c2c along
//! y, transpose, c2c along x, transpose). Three engines schedule the same
//! steps differently:
//!
//! - [`LoopEngine`]: rayon fan-out per step with an implicit join, plus a
//!   strictly sequential baseline.
//! - [`SyncEngine`]: one task per unit on a futures thread pool, blocking the
//!   caller after every step.
//! - [`NaiveEngine`]: each step's tasks are continuations of the previous
//!   step's aggregate future; the caller blocks once.
//!
//! # Example
//!
//! ```rust
//! use fft3d_rs::{Dense3DArray, EngineConfig, ForwardFft3d, LoopEngine};
//!
//! // every z-line holds 0, 1, 2, 3 followed by two padding slots
//! let input = Dense3DArray::from_fn(3, 5, 6, |_, _, k| if k < 4 { k as f64 } else { 0.0 });
//!
//! let mut engine = LoopEngine::with_config(&EngineConfig::default().with_num_threads(2)).unwrap();
//! engine.initialize(input, "estimate").unwrap();
//! let out = engine.compute_forward_transform().unwrap();
//!
//! assert!((out[(0, 0, 0)] - 90.0).abs() < 1e-9);
//! assert!((out[(0, 0, 2)] + 30.0).abs() < 1e-9);
//! assert!((out[(0, 0, 3)] - 30.0).abs() < 1e-9);
//! ```
//!
//! # Logging
//!
//! Initialization and transform completion are reported through `tracing` at
//! `info`, individual steps at `debug`. No subscriber is installed.

mod config;
mod loop_engine;
mod measure;
mod naive;
mod runtime;
mod stage;
mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Re-exports
// ============================================================================
pub use fft1d_adapter::{FlopCount, PlanEffort, PlanError};
pub use fft3d_array::{ArrayError, Dense3DArray};

pub use config::{EngineConfig, NUM_THREADS_ENV};
pub use measure::Measurements;
pub use stage::Dimensions;

// ============================================================================
// Engines
// ============================================================================
pub use loop_engine::LoopEngine;
pub use naive::NaiveEngine;
pub use sync::SyncEngine;

/// Common surface of every scheduling strategy.
pub trait ForwardFft3d {
    /// Take ownership of `values`, derive the extents and plan the three
    /// 1-D transforms with the effort named by `plan_effort`.
    ///
    /// Records the `plan` duration and the `plan_flops` counter. Calling it
    /// again discards the previous state first, so a failed call leaves the
    /// engine uninitialized.
    fn initialize(&mut self, values: Dense3DArray<f64>, plan_effort: &str) -> Result<()>;

    /// Run the six steps and return the transformed array.
    ///
    /// Consumes the buffers: a second call without a new
    /// [`initialize`](Self::initialize) fails with
    /// [`Fft3dError::NotInitialized`].
    fn compute_forward_transform(&mut self) -> Result<Dense3DArray<f64>>;

    /// Duration recorded under `name`, zero when never recorded.
    fn measurement(&self, name: &str) -> Duration;

    /// Counter recorded under `name` (such as `plan_flops`), zero when never
    /// recorded.
    fn counter(&self, name: &str) -> f64;

    /// Extents derived by the last successful initialization.
    fn dimensions(&self) -> Option<Dimensions>;

    /// Every duration and counter recorded since the last initialization.
    fn measurements(&self) -> &Measurements;

    /// Append a description of the three plans to the file at `path`.
    fn write_plans_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()>;
}

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while planning or running a 3-D transform.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Fft3dError {
    #[error(transparent)]
    Array(#[from] ArrayError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// The plan file could not be opened or written.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Input extents the pipeline cannot handle: a zero extent, or an odd or
    /// too short z extent.
    #[error("invalid input shape {dims:?}: extents must be positive and n_z even and at least 2")]
    InvalidShape { dims: [usize; 3] },

    /// No buffers to transform: `initialize` was never called or the
    /// transform already ran.
    #[error("engine not initialized")]
    NotInitialized,

    /// Worker pool construction or task submission failed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Fft3dError>;
