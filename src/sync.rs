//! Blocking-task engine: one task per unit, calling thread waits per step.

use std::path::Path;
use std::time::Duration;

use fft3d_array::Dense3DArray;
use futures::executor::{block_on, ThreadPool};

use crate::config::EngineConfig;
use crate::runtime::{build_task_pool, join_units, spawn_units};
use crate::stage::{Dimensions, StageContext, StageKernel, Step};
use crate::{ForwardFft3d, Measurements, Result};

/// Submits every unit of a step as its own task on a futures thread pool and
/// blocks until all of them are done before submitting the next step.
#[derive(Debug)]
pub struct SyncEngine {
    kernel: StageKernel,
    pool: ThreadPool,
}

impl SyncEngine {
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

fn run_step_blocking(pool: &ThreadPool, ctx: &StageContext, step: Step) -> Result<()> {
    let handles = spawn_units(pool, ctx.units(step), |i| {
        let ctx = ctx.clone();
        // SAFETY: one task per distinct index; the caller waits for the whole
        // step before the next one is spawned.
        async move { unsafe { ctx.run_unit(step, i) } }
    })?;
    block_on(join_units(handles))
}

impl ForwardFft3d for SyncEngine {
    fn initialize(&mut self, values: Dense3DArray<f64>, plan_effort: &str) -> Result<()> {
        self.kernel.initialize(values, plan_effort)
    }

    fn compute_forward_transform(&mut self) -> Result<Dense3DArray<f64>> {
        let pool = &self.pool;
        self.kernel
            .run_steps("sync", |ctx, step| run_step_blocking(pool, ctx, step))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LoopEngine;

    #[test]
    fn test_matches_sequential_bitwise() {
        let input = Dense3DArray::from_fn(3, 4, 8, |i, j, k| (i as f64).sin() + (j * k) as f64);
        let config = EngineConfig::default().with_num_threads(3);

        let mut sync = SyncEngine::with_config(&config).unwrap();
        sync.initialize(input.clone(), "estimate").unwrap();
        let a = sync.compute_forward_transform().unwrap();

        let mut seq = LoopEngine::with_config(&config).unwrap();
        seq.initialize(input, "estimate").unwrap();
        let b = seq.compute_forward_transform_seq().unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_records_every_step() {
        let mut e = SyncEngine::with_config(&EngineConfig::default().with_num_threads(2)).unwrap();
        e.initialize(Dense3DArray::filled(2, 2, 4, 1.0), "measure").unwrap();
        e.compute_forward_transform().unwrap();
        for step in Step::ALL {
            assert!(e.kernel.measurements().contains(step.key()));
        }
        assert!(e.kernel.measurements().contains("plan"));
        assert!(e.kernel.measurements().contains("total"));
    }
}
