//! Real-to-complex adapter over `realfft`.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use realfft::{RealFftPlanner, RealToComplex};
use tracing::debug;

use crate::{
    as_complex_mut, check_line, FlopCount, LineScratch, LineTransform, PlanEffort, PlanError, Result,
};

/// Forward real-to-complex transform of `length` reals.
///
/// A line holds `2 * (length / 2 + 1)` reals. The first `length` of them are
/// the input; on return the whole line holds `length / 2 + 1` interleaved
/// `(re, im)` bins. A zero-length plan writes a single zero bin.
#[derive(Clone)]
pub struct R2cAdapter {
    len: usize,
    effort: PlanEffort,
    kernel: Option<Arc<dyn RealToComplex<f64>>>,
    time_per_exec: Option<Duration>,
}

impl fmt::Debug for R2cAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("R2cAdapter")
            .field("len", &self.len)
            .field("effort", &self.effort)
            .finish()
    }
}

impl R2cAdapter {
    pub fn plan(len: usize, effort: PlanEffort) -> Result<Self> {
        if len == 0 {
            return Ok(Self {
                len,
                effort,
                kernel: None,
                time_per_exec: None,
            });
        }

        let kernel = RealFftPlanner::<f64>::new().plan_fft_forward(len);
        let trials = effort.trial_runs();
        let time_per_exec = if trials == 0 {
            None
        } else {
            Some(time_trials(kernel.as_ref(), len, trials)?)
        };

        debug!(len, %effort, ?time_per_exec, "planned r2c transform");
        Ok(Self {
            len,
            effort,
            kernel: Some(kernel),
            time_per_exec,
        })
    }

    /// Number of complex bins produced, `length / 2 + 1`.
    pub fn bins(&self) -> usize {
        self.len / 2 + 1
    }

    pub fn effort(&self) -> PlanEffort {
        self.effort
    }
}

fn kernel_error(e: realfft::FftError) -> PlanError {
    PlanError::Kernel(e.to_string())
}

fn time_trials(kernel: &dyn RealToComplex<f64>, len: usize, trials: usize) -> Result<Duration> {
    let input: Vec<f64> = (0..len).map(|k| (k % 5) as f64).collect();
    let mut buffer = input.clone();
    let mut output = kernel.make_output_vec();
    let mut scratch = kernel.make_scratch_vec();

    kernel
        .process_with_scratch(&mut buffer, &mut output, &mut scratch)
        .map_err(kernel_error)?;

    let start = Instant::now();
    for _ in 0..trials {
        buffer.copy_from_slice(&input);
        kernel
            .process_with_scratch(&mut buffer, &mut output, &mut scratch)
            .map_err(kernel_error)?;
    }
    Ok(start.elapsed() / trials as u32)
}

impl LineTransform for R2cAdapter {
    fn length(&self) -> usize {
        self.len
    }

    fn line_len(&self) -> usize {
        2 * self.bins()
    }

    fn make_scratch(&self) -> LineScratch {
        match &self.kernel {
            Some(kernel) => LineScratch::with_lens(self.len, kernel.get_scratch_len()),
            None => LineScratch::default(),
        }
    }

    fn execute_with_scratch(&self, line: &mut [f64], scratch: &mut LineScratch) -> Result<()> {
        check_line(line, self.line_len())?;
        let Some(kernel) = &self.kernel else {
            line.fill(0.0);
            return Ok(());
        };

        // realfft consumes its input as scratch space
        let (input, work) = scratch.split(self.len, kernel.get_scratch_len());
        input.copy_from_slice(&line[..self.len]);
        let output = as_complex_mut(line)?;
        kernel
            .process_with_scratch(input, output, work)
            .map_err(kernel_error)
    }

    fn flops(&self) -> FlopCount {
        FlopCount::real(self.len)
    }

    fn write_plan(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        writeln!(
            sink,
            "r2c length={} bins={} effort={}",
            self.len,
            self.bins(),
            self.effort
        )?;
        writeln!(sink, "kernel: realfft")?;
        match self.time_per_exec {
            Some(t) => writeln!(sink, "measured: {t:?} per execution")?,
            None => writeln!(sink, "measured: no trial runs")?,
        }
        writeln!(sink, "flops: {}", self.flops())
    }
}
