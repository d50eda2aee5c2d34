//! Barrier-parallel engine: one data-parallel fan-out per step.

use std::path::Path;
use std::time::Duration;

use fft3d_array::Dense3DArray;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::config::EngineConfig;
use crate::stage::{Dimensions, StageContext, StageKernel, Step};
use crate::{ForwardFft3d, Measurements, Result};

/// Runs each step as a fan-out over its slice axis with an implicit join
/// before the next step, on a dedicated rayon pool.
///
/// [`compute_forward_transform_seq`](Self::compute_forward_transform_seq)
/// runs the same six steps as plain loops on the calling thread. Without the
/// `parallel` feature both entry points are sequential.
#[derive(Debug)]
pub struct LoopEngine {
    kernel: StageKernel,
    #[cfg(feature = "parallel")]
    pool: rayon::ThreadPool,
}

impl LoopEngine {
    /// Engine configured from the environment (see [`EngineConfig::from_env`]).
    pub fn new() -> Result<Self> {
        Self::with_config(&EngineConfig::from_env())
    }

    pub fn with_config(config: &EngineConfig) -> Result<Self> {
        #[cfg(feature = "parallel")]
        let pool = {
            let prefix = config.thread_name_prefix.clone();
            rayon::ThreadPoolBuilder::new()
                .num_threads(config.resolved_threads())
                .thread_name(move |i| format!("{prefix}-{i}"))
                .build()
                .map_err(|e| {
                    crate::Fft3dError::Runtime(format!("failed to start rayon pool: {e}"))
                })?
        };
        #[cfg(not(feature = "parallel"))]
        let _ = config;

        Ok(Self {
            kernel: StageKernel::default(),
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    /// The six steps as ordinary loops on the calling thread.
    ///
    /// Records the same measurement keys as the parallel transform.
    pub fn compute_forward_transform_seq(&mut self) -> Result<Dense3DArray<f64>> {
        self.kernel.run_steps("seq", fan_out_sequential)
    }
}

fn fan_out_sequential(ctx: &StageContext, step: Step) -> Result<()> {
    for i in 0..ctx.units(step) {
        // SAFETY: units run one after another on this thread.
        unsafe { ctx.run_unit(step, i)? };
    }
    Ok(())
}

#[cfg(feature = "parallel")]
fn fan_out_parallel(pool: &rayon::ThreadPool, ctx: &StageContext, step: Step) -> Result<()> {
    pool.install(|| {
        (0..ctx.units(step)).into_par_iter().try_for_each(|i| {
            // SAFETY: indices are distinct within the fan-out, and `install`
            // returns only after every unit has finished.
            unsafe { ctx.run_unit(step, i) }
        })
    })
}

impl ForwardFft3d for LoopEngine {
    fn initialize(&mut self, values: Dense3DArray<f64>, plan_effort: &str) -> Result<()> {
        self.kernel.initialize(values, plan_effort)
    }

    #[cfg(feature = "parallel")]
    fn compute_forward_transform(&mut self) -> Result<Dense3DArray<f64>> {
        let pool = &self.pool;
        self.kernel
            .run_steps("loop", |ctx, step| fan_out_parallel(pool, ctx, step))
    }

    #[cfg(not(feature = "parallel"))]
    fn compute_forward_transform(&mut self) -> Result<Dense3DArray<f64>> {
        self.kernel.run_steps("loop", fan_out_sequential)
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
    use approx::assert_abs_diff_eq;

    fn engine() -> LoopEngine {
        LoopEngine::with_config(&EngineConfig::default().with_num_threads(2)).unwrap()
    }

    fn input() -> Dense3DArray<f64> {
        Dense3DArray::from_fn(4, 3, 10, |i, j, k| ((i * 7 + j * 3 + k) % 5) as f64 - 2.0)
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut par = engine();
        par.initialize(input(), "estimate").unwrap();
        let a = par.compute_forward_transform().unwrap();

        let mut seq = engine();
        seq.initialize(input(), "estimate").unwrap();
        let b = seq.compute_forward_transform_seq().unwrap();

        assert_eq!(a.dims(), b.dims());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_records_step_keys() {
        let mut e = engine();
        e.initialize(input(), "estimate").unwrap();
        e.compute_forward_transform_seq().unwrap();
        for step in Step::ALL {
            assert!(e.kernel.measurements().contains(step.key()));
        }
        assert!(e.kernel.measurements().contains("total"));
        assert!(e.measurement("total") >= e.measurement("first_fftw"));
        assert!(e.counter("plan_flops") > 0.0);
    }

    #[test]
    fn test_second_transform_requires_initialize() {
        let mut e = engine();
        e.initialize(input(), "estimate").unwrap();
        e.compute_forward_transform().unwrap();
        assert!(matches!(
            e.compute_forward_transform(),
            Err(crate::Fft3dError::NotInitialized)
        ));
        e.initialize(input(), "estimate").unwrap();
        assert!(e.compute_forward_transform_seq().is_ok());
    }
}
