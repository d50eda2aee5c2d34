//! Task-pool plumbing for the task-based engines.

use std::future::Future;

use futures::executor::{block_on, ThreadPool};
use futures::future::{join_all, BoxFuture, Shared};
use futures::task::SpawnExt;
use futures::{FutureExt, TryFutureExt};
use tracing::trace;

use crate::config::EngineConfig;
use crate::{Fft3dError, Result};

/// Handle to one spawned unit of work.
pub(crate) type UnitHandle = futures::future::RemoteHandle<Result<()>>;

/// Aggregate completion of every unit of one step, awaitable from many tasks.
pub(crate) type StepGate = Shared<BoxFuture<'static, Result<()>>>;

pub(crate) fn build_task_pool(config: &EngineConfig) -> Result<ThreadPool> {
    let threads = config.resolved_threads();
    ThreadPool::builder()
        .pool_size(threads)
        .name_prefix(format!("{}-", config.thread_name_prefix))
        .create()
        .map_err(|e| Fft3dError::Runtime(format!("failed to start task pool: {e}")))
}

/// Spawn `count` units produced by `make` onto `pool`.
///
/// If a spawn fails, the units already spawned are waited for before the
/// error is returned, so no task outlives the call touching the buffers.
pub(crate) fn spawn_units<F, Fut>(
    pool: &ThreadPool,
    count: usize,
    mut make: F,
) -> Result<Vec<UnitHandle>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut handles = Vec::with_capacity(count);
    for index in 0..count {
        match pool.spawn_with_handle(make(index)) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                let _ = block_on(join_units(handles));
                return Err(Fft3dError::Runtime(format!("failed to spawn task: {e}")));
            }
        }
    }
    trace!(count, "spawned units");
    Ok(handles)
}

/// Wait for every handle, then report the first failure.
///
/// Unlike `try_join_all` this never resolves while a unit is still running.
pub(crate) fn join_units(handles: Vec<UnitHandle>) -> impl Future<Output = Result<()>> {
    join_all(handles).map(|results| results.into_iter().collect::<Result<()>>())
}

/// Turn the handles of one step into a gate the next step can wait on.
pub(crate) fn gate(handles: Vec<UnitHandle>) -> StepGate {
    join_units(handles).boxed().shared()
}

/// Resolve once `gate` has, failing with its error.
pub(crate) async fn after(gate: Option<StepGate>) -> Result<()> {
    match gate {
        Some(gate) => gate.await,
        None => Ok(()),
    }
}

/// Run `unit` once `gate` has resolved successfully.
pub(crate) fn continuation<U>(
    gate: Option<StepGate>,
    unit: U,
) -> impl Future<Output = Result<()>> + Send + 'static
where
    U: FnOnce() -> Result<()> + Send + 'static,
{
    after(gate).and_then(|()| async move { unit() })
}
