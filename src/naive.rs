//! Continuation-chained engine: steps linked through aggregate futures.

use std::path::Path;
use std::time::{Duration, Instant};

use fft3d_array::Dense3DArray;
use futures::executor::{block_on, ThreadPool};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::runtime::{after, build_task_pool, continuation, gate, spawn_units, StepGate};
use crate::stage::{Dimensions, StageKernel, Step};
use crate::{ForwardFft3d, Measurements, Result};

/// Builds the whole six-step pipeline up front: every unit of step `s` is a
/// pool task that first awaits the aggregate completion of step `s - 1`.
///
/// The calling thread blocks once, on the aggregate of the last step, so only
/// `total` is recorded. The dependency between steps is still a full barrier.
#[derive(Debug)]
pub struct NaiveEngine {
    kernel: StageKernel,
    pool: ThreadPool,
}

impl NaiveEngine {
    /// Engine configured from the environment (see [`EngineConfig::from_env`]).
    pub fn new() -> Result<Self> {
        Self::with_config(&EngineConfig::from_env())
    }

    pub fn with_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self {
            kernel: StageKernel::default(),
            pool: build_task_pool(config)?,
        })
    }
}

impl ForwardFft3d for NaiveEngine {
    fn initialize(&mut self, values: Dense3DArray<f64>, plan_effort: &str) -> Result<()> {
        self.kernel.initialize(values, plan_effort)
    }

    fn compute_forward_transform(&mut self) -> Result<Dense3DArray<f64>> {
        let (mut buffers, ctx) = self.kernel.begin()?;
        let start = Instant::now();

        let mut previous: Option<StepGate> = None;
        for step in Step::ALL {
            // Extents only; tasks still in flight never read them.
            buffers.prepare(step, ctx.dims());
            let spawned = spawn_units(&self.pool, ctx.units(step), |i| {
                let ctx = ctx.clone();
                // SAFETY: one task per distinct index, and each task waits for
                // every unit of the previous step first.
                continuation(previous.clone(), move || unsafe { ctx.run_unit(step, i) })
            });
            let handles = match spawned {
                Ok(handles) => handles,
                Err(e) => {
                    // drain what was already chained before the buffers go away
                    let _ = block_on(after(previous));
                    return Err(e);
                }
            };
            debug!(step = step.key(), units = handles.len(), "chained step");
            previous = Some(gate(handles));
        }

        block_on(after(previous))?;
        let total = start.elapsed();
        self.kernel.record("total", total);
        info!(engine = "naive", ?total, "forward transform done");
        Ok(buffers.into_result())
    }

    fn measurement(&self, name: &str) -> Duration {
        self.kernel.measurements().get(name)
    }

    fn counter(&self, name: &str) -> f64 {
        self.kernel.measurements().counter(name)
    }

    fn dimensions(&self) -> Option<Dimensions> {
        self.kernel.dimensions()
    }

    fn measurements(&self) -> &Measurements {
        self.kernel.measurements()
    }

    fn write_plans_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.kernel.write_plans_to_file(path.as_ref())
    }
}
