//! Shared transform stage: buffers, plans, layout arithmetic and the per-line
//! and per-slice primitives every scheduling strategy is built from.
//!
//! The pipeline runs six ordered steps over two ping-pong buffers that always
//! hold `c_x * c_y * 2*c_z` reals. Only the extents attached to each buffer
//! change between steps:
//!
//! | step | work | reads | writes | fan-out |
//! |------|------|-------|--------|---------|
//! | 1 | r2c along z | values `(c_x, c_y, 2c_z)` | in place | x |
//! | 2 | transpose y/z | values | permuted `(c_x, c_z, 2c_y)` | x |
//! | 3 | c2c along y | permuted | in place | x |
//! | 4 | transpose x/y | permuted | values `(c_y, c_z, 2c_x)` | z |
//! | 5 | c2c along x | values | in place | y |
//! | 6 | restore order | values | permuted `(c_x, c_y, 2c_z)` | y |

use std::fs::OpenOptions;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fft1d_adapter::{C2cAdapter, Direction, LineScratch, LineTransform, PlanEffort, R2cAdapter};
use fft3d_array::Dense3DArray;
use tracing::{debug, info};

use crate::measure::Measurements;
use crate::{Fft3dError, Result};

// ============================================================================
// Steps
// ============================================================================

/// One of the six ordered pipeline steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Step {
    FirstFft,
    FirstPermute,
    SecondFft,
    SecondPermute,
    ThirdFft,
    ThirdPermute,
}

impl Step {
    pub(crate) const ALL: [Step; 6] = [
        Step::FirstFft,
        Step::FirstPermute,
        Step::SecondFft,
        Step::SecondPermute,
        Step::ThirdFft,
        Step::ThirdPermute,
    ];

    /// Measurement key of the step.
    pub(crate) fn key(self) -> &'static str {
        match self {
            Step::FirstFft => "first_fftw",
            Step::FirstPermute => "first_permute",
            Step::SecondFft => "second_fftw",
            Step::SecondPermute => "second_permute",
            Step::ThirdFft => "third_fftw",
            Step::ThirdPermute => "third_permute",
        }
    }
}

// ============================================================================
// Dimensions
// ============================================================================

/// Extents derived from the input shape `(n_x, n_y, n_z)`.
///
/// `c_z = n_z / 2` complex bins are kept along z, which is the half spectrum
/// of `r_z = 2 * c_z - 2` reals. `c_x` and `c_y` are `n_x` and `n_y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub c_x: usize,
    pub c_y: usize,
    pub c_z: usize,
    pub r_z: usize,
}

impl Dimensions {
    /// Derive the extents of an input array of shape `dims`.
    ///
    /// Every extent must be positive and `n_z` must be even.
    pub fn from_input(dims: [usize; 3]) -> Result<Self> {
        let [n_x, n_y, n_z] = dims;
        if n_x == 0 || n_y == 0 || n_z < 2 || n_z % 2 != 0 {
            return Err(Fft3dError::InvalidShape { dims });
        }
        let c_z = n_z / 2;
        Ok(Self {
            c_x: n_x,
            c_y: n_y,
            c_z,
            r_z: 2 * c_z - 2,
        })
    }

    /// Reals held by each buffer.
    pub fn buffer_len(&self) -> usize {
        self.c_x * self.c_y * 2 * self.c_z
    }
}

// ============================================================================
// Plans
// ============================================================================

/// The three 1-D plans of one initialization.
#[derive(Debug, Clone)]
pub(crate) struct Plans {
    pub(crate) dims: Dimensions,
    pub(crate) r2c: R2cAdapter,
    pub(crate) c2c_y: C2cAdapter,
    pub(crate) c2c_x: C2cAdapter,
}

impl Plans {
    fn new(dims: Dimensions, effort: PlanEffort) -> Result<Self> {
        Ok(Self {
            dims,
            r2c: R2cAdapter::plan(dims.r_z, effort)?,
            c2c_y: C2cAdapter::plan(dims.c_y, effort, Direction::Forward)?,
            c2c_x: C2cAdapter::plan(dims.c_x, effort, Direction::Forward)?,
        })
    }

    /// Operation estimate weighted by the extent of each transformed axis.
    fn flops(&self) -> f64 {
        let count = self.r2c.flops() * self.dims.r_z as f64
            + self.c2c_y.flops() * self.dims.c_y as f64
            + self.c2c_x.flops() * self.dims.c_x as f64;
        count.total()
    }

    fn write_sections(&self, sink: &mut dyn Write) -> std::io::Result<()> {
        sink.write_all(b"r2c 1D plan:\n")?;
        self.r2c.write_plan(sink)?;
        sink.write_all(b"\n")?;
        sink.write_all(b"c2c 1D plan direction y:\n")?;
        self.c2c_y.write_plan(sink)?;
        sink.write_all(b"\n")?;
        sink.write_all(b"c2c 1D plan direction x:\n")?;
        self.c2c_x.write_plan(sink)?;
        sink.write_all(b"\n\n")
    }
}

// ============================================================================
// Buffers
// ============================================================================

/// The two ping-pong buffers owned by a transform in progress.
#[derive(Debug)]
pub(crate) struct Buffers {
    values: Dense3DArray<f64>,
    permuted: Dense3DArray<f64>,
}

impl Buffers {
    fn new(values: Dense3DArray<f64>, dims: Dimensions) -> Self {
        let permuted = Dense3DArray::new(dims.c_x, dims.c_z, 2 * dims.c_y);
        Self { values, permuted }
    }

    /// Attach the extents the buffers carry from `step` on.
    ///
    /// Both buffers keep their element count, so this never touches data and
    /// may run while tasks of an earlier step still work on the buffers.
    pub(crate) fn prepare(&mut self, step: Step, dims: Dimensions) {
        match step {
            Step::SecondPermute => self.values.reshape(dims.c_y, dims.c_z, 2 * dims.c_x),
            Step::ThirdPermute => self.permuted.reshape(dims.c_x, dims.c_y, 2 * dims.c_z),
            _ => {}
        }
    }

    /// Hand out the result of step 6.
    pub(crate) fn into_result(self) -> Dense3DArray<f64> {
        self.permuted
    }
}

// ============================================================================
// Stage context
// ============================================================================

/// A raw pointer wrapper that is `Send` + `Sync`.
///
/// # Safety
/// The caller must guarantee that the pointed-to buffer outlives every task
/// holding the pointer and that concurrent tasks touch disjoint regions.
struct SendPtr<T>(*mut T);

impl<T> Clone for SendPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendPtr<T> {}

unsafe impl<T> Send for SendPtr<T> {}
unsafe impl<T> Sync for SendPtr<T> {}

impl<T> SendPtr<T> {
    fn as_ptr(self) -> *mut T {
        self.0
    }
}

/// Everything a unit of work needs, cheap to clone into tasks.
///
/// Offsets are computed from the captured [`Dimensions`], never from the
/// extents currently attached to the buffers.
#[derive(Clone)]
pub(crate) struct StageContext {
    values: SendPtr<f64>,
    permuted: SendPtr<f64>,
    plans: Arc<Plans>,
}

impl StageContext {
    fn new(buffers: &mut Buffers, plans: Arc<Plans>) -> Self {
        Self {
            values: SendPtr(buffers.values.as_mut_ptr()),
            permuted: SendPtr(buffers.permuted.as_mut_ptr()),
            plans,
        }
    }

    pub(crate) fn dims(&self) -> Dimensions {
        self.plans.dims
    }

    /// Number of independent units `step` fans out into.
    pub(crate) fn units(&self, step: Step) -> usize {
        let d = self.dims();
        match step {
            Step::FirstFft | Step::FirstPermute | Step::SecondFft => d.c_x,
            Step::SecondPermute => d.c_z,
            Step::ThirdFft | Step::ThirdPermute => d.c_y,
        }
    }

    /// Run unit `index` of `step`.
    ///
    /// A panic inside the unit is caught and reported as
    /// [`Fft3dError::Runtime`], so an aggregate wait always sees every unit
    /// finish.
    ///
    /// # Safety
    /// The buffers behind this context must be alive. Units of one step may
    /// run concurrently only for distinct indices, and no unit of a step may
    /// start before every unit of the previous step has finished.
    pub(crate) unsafe fn run_unit(&self, step: Step, index: usize) -> Result<()> {
        catch_unit(step, index, || self.run_lines(step, index))
    }

    unsafe fn run_lines(&self, step: Step, index: usize) -> Result<()> {
        let d = self.dims();
        match step {
            Step::FirstFft => {
                let mut scratch = self.plans.r2c.make_scratch();
                for y in 0..d.c_y {
                    self.r2c_line(index, y, &mut scratch)?;
                }
            }
            Step::FirstPermute => self.transpose_xyz_to_xzy(index),
            Step::SecondFft => {
                let mut scratch = self.plans.c2c_y.make_scratch();
                for z in 0..d.c_z {
                    self.c2c_line_y(index, z, &mut scratch)?;
                }
            }
            Step::SecondPermute => self.transpose_xzy_to_yzx(index),
            Step::ThirdFft => {
                let mut scratch = self.plans.c2c_x.make_scratch();
                for z in 0..d.c_z {
                    self.c2c_line_x(index, z, &mut scratch)?;
                }
            }
            Step::ThirdPermute => self.transpose_yzx_to_xyz(index),
        }
        Ok(())
    }

    unsafe fn line<'a>(buffer: SendPtr<f64>, offset: usize, len: usize) -> &'a mut [f64] {
        std::slice::from_raw_parts_mut(buffer.as_ptr().add(offset), len)
    }

    /// R2C along z on line `(x, y)` of the values buffer.
    unsafe fn r2c_line(&self, x: usize, y: usize, scratch: &mut LineScratch) -> Result<()> {
        let d = self.dims();
        let width = 2 * d.c_z;
        let line = Self::line(self.values, (x * d.c_y + y) * width, width);
        Ok(self.plans.r2c.execute_with_scratch(line, scratch)?)
    }

    /// C2C along y on line `(x, z)` of the permuted buffer.
    unsafe fn c2c_line_y(&self, x: usize, z: usize, scratch: &mut LineScratch) -> Result<()> {
        let d = self.dims();
        let width = 2 * d.c_y;
        let line = Self::line(self.permuted, (x * d.c_z + z) * width, width);
        Ok(self.plans.c2c_y.execute_with_scratch(line, scratch)?)
    }

    /// C2C along x on line `(y, z)` of the values buffer.
    unsafe fn c2c_line_x(&self, y: usize, z: usize, scratch: &mut LineScratch) -> Result<()> {
        let d = self.dims();
        let width = 2 * d.c_x;
        let line = Self::line(self.values, (y * d.c_z + z) * width, width);
        Ok(self.plans.c2c_x.execute_with_scratch(line, scratch)?)
    }

    /// values `(x, y, z)` to permuted `(x, z, y)` for one x-slice.
    unsafe fn transpose_xyz_to_xzy(&self, x: usize) {
        let d = self.dims();
        let src = self.values.as_ptr();
        let dst = self.permuted.as_ptr();
        for z in 0..d.c_z {
            for y in 0..d.c_y {
                let from = (x * d.c_y + y) * 2 * d.c_z + 2 * z;
                let to = (x * d.c_z + z) * 2 * d.c_y + 2 * y;
                std::ptr::copy_nonoverlapping(src.add(from), dst.add(to), 2);
            }
        }
    }

    /// permuted `(x, z, y)` to values `(y, z, x)` for one z-slice.
    unsafe fn transpose_xzy_to_yzx(&self, z: usize) {
        let d = self.dims();
        let src = self.permuted.as_ptr();
        let dst = self.values.as_ptr();
        for y in 0..d.c_y {
            for x in 0..d.c_x {
                let from = (x * d.c_z + z) * 2 * d.c_y + 2 * y;
                let to = (y * d.c_z + z) * 2 * d.c_x + 2 * x;
                std::ptr::copy_nonoverlapping(src.add(from), dst.add(to), 2);
            }
        }
    }

    /// values `(y, z, x)` back to permuted `(x, y, z)` for one y-slice.
    unsafe fn transpose_yzx_to_xyz(&self, y: usize) {
        let d = self.dims();
        let src = self.values.as_ptr();
        let dst = self.permuted.as_ptr();
        for z in 0..d.c_z {
            for x in 0..d.c_x {
                let from = (y * d.c_z + z) * 2 * d.c_x + 2 * x;
                let to = (x * d.c_y + y) * 2 * d.c_z + 2 * z;
                std::ptr::copy_nonoverlapping(src.add(from), dst.add(to), 2);
            }
        }
    }
}

/// Run `unit`, turning a panic into [`Fft3dError::Runtime`].
pub(crate) fn catch_unit<F>(step: Step, index: usize, unit: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    panic::catch_unwind(AssertUnwindSafe(unit)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Err(Fft3dError::Runtime(format!(
            "{} unit {index} panicked: {message}",
            step.key()
        )))
    })
}

// ============================================================================
// Stage kernel
// ============================================================================

/// State shared by every engine: plans, buffers and measurements.
#[derive(Debug, Default)]
pub(crate) struct StageKernel {
    plans: Option<Arc<Plans>>,
    buffers: Option<Buffers>,
    measurements: Measurements,
}

impl StageKernel {
    /// Take ownership of `values`, derive the extents, allocate the permuted
    /// buffer and plan the three 1-D transforms.
    ///
    /// Records `plan` and the `plan_flops` counter. Earlier plans, buffers and
    /// measurements are discarded before anything is validated, so a failed
    /// call leaves the kernel uninitialized.
    pub(crate) fn initialize(&mut self, values: Dense3DArray<f64>, plan_effort: &str) -> Result<()> {
        self.plans = None;
        self.buffers = None;
        self.measurements.clear();

        let effort: PlanEffort = plan_effort.parse()?;
        let dims = Dimensions::from_input(values.dims())?;

        let start = Instant::now();
        let plans = Plans::new(dims, effort)?;
        let plan_time = start.elapsed();
        let plan_flops = plans.flops();

        self.measurements.record("plan", plan_time);
        self.measurements.set_counter("plan_flops", plan_flops);
        info!(
            dims = ?values.dims(),
            %effort,
            ?plan_time,
            plan_flops,
            "initialized 3-D transform"
        );

        self.buffers = Some(Buffers::new(values, dims));
        self.plans = Some(Arc::new(plans));
        Ok(())
    }

    /// Move the buffers out for one transform and build the task context.
    pub(crate) fn begin(&mut self) -> Result<(Buffers, StageContext)> {
        let plans = self.plans.clone().ok_or(Fft3dError::NotInitialized)?;
        let mut buffers = self.buffers.take().ok_or(Fft3dError::NotInitialized)?;
        let ctx = StageContext::new(&mut buffers, plans);
        Ok((buffers, ctx))
    }

    /// Drive the six steps in order, recording each step and the `total`.
    ///
    /// `fan_out` must not return before every unit of the step has finished.
    pub(crate) fn run_steps<F>(&mut self, engine: &str, mut fan_out: F) -> Result<Dense3DArray<f64>>
    where
        F: FnMut(&StageContext, Step) -> Result<()>,
    {
        let (mut buffers, ctx) = self.begin()?;
        let start = Instant::now();
        for step in Step::ALL {
            buffers.prepare(step, ctx.dims());
            let step_start = Instant::now();
            fan_out(&ctx, step)?;
            let elapsed = step_start.elapsed();
            self.measurements.record(step.key(), elapsed);
            debug!(engine, step = step.key(), units = ctx.units(step), ?elapsed, "step done");
        }
        let total = start.elapsed();
        self.measurements.record("total", total);
        info!(engine, ?total, "forward transform done");
        Ok(buffers.into_result())
    }

    pub(crate) fn record(&mut self, name: &str, elapsed: Duration) {
        self.measurements.record(name, elapsed);
    }

    pub(crate) fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    pub(crate) fn dimensions(&self) -> Option<Dimensions> {
        self.plans.as_ref().map(|p| p.dims)
    }

    /// Append the three plan descriptions to `path`, creating the file when
    /// missing.
    pub(crate) fn write_plans_to_file(&self, path: &Path) -> Result<()> {
        let plans = self.plans.as_ref().ok_or(Fft3dError::NotInitialized)?;
        let io_error = |source: std::io::Error| Fft3dError::Io {
            path: path.to_path_buf(),
            source: Arc::new(source),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_error)?;
        let mut text = Vec::new();
        plans.write_sections(&mut text).map_err(io_error)?;
        file.write_all(&text).map_err(io_error)
    }
}
