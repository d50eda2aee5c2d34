//! Complex-to-complex adapter over `rustfft`.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner, FftPlannerScalar};
use tracing::debug;

use crate::{
    as_complex_mut, check_line, Direction, FlopCount, LineScratch, LineTransform, PlanEffort,
    PlanError, Result,
};

/// Kernel families the planner picks between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    /// SIMD-detecting planner.
    Auto,
    Scalar,
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Auto => f.write_str("rustfft auto"),
            Candidate::Scalar => f.write_str("rustfft scalar"),
        }
    }
}

/// In-place complex transform of a fixed length over interleaved `(re, im)`
/// lines of `2 * length` reals.
#[derive(Clone)]
pub struct C2cAdapter {
    len: usize,
    effort: PlanEffort,
    direction: Direction,
    candidate: Candidate,
    kernel: Arc<dyn Fft<f64>>,
    time_per_exec: Option<Duration>,
}

impl fmt::Debug for C2cAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("C2cAdapter")
            .field("len", &self.len)
            .field("effort", &self.effort)
            .field("direction", &self.direction)
            .field("candidate", &self.candidate)
            .finish()
    }
}

impl C2cAdapter {
    /// Plan a transform of `len` complex values.
    ///
    /// With an effort above [`PlanEffort::Estimate`] both kernel families are
    /// timed over [`PlanEffort::trial_runs`] executions and the faster one is
    /// kept.
    pub fn plan(len: usize, effort: PlanEffort, direction: Direction) -> Result<Self> {
        if len == 0 {
            return Err(PlanError::EmptyLength);
        }
        let fft_direction = match direction {
            Direction::Forward => FftDirection::Forward,
            Direction::Backward => FftDirection::Inverse,
        };

        let auto = FftPlanner::<f64>::new().plan_fft(len, fft_direction);
        let trials = effort.trial_runs();
        let (candidate, kernel, time_per_exec) = if trials == 0 {
            (Candidate::Auto, auto, None)
        } else {
            let scalar = FftPlannerScalar::<f64>::new().plan_fft(len, fft_direction);
            let auto_time = time_trials(auto.as_ref(), len, trials);
            let scalar_time = time_trials(scalar.as_ref(), len, trials);
            debug!(len, ?auto_time, ?scalar_time, "timed c2c candidates");
            if scalar_time < auto_time {
                (Candidate::Scalar, scalar, Some(scalar_time))
            } else {
                (Candidate::Auto, auto, Some(auto_time))
            }
        };

        debug!(len, %effort, %direction, %candidate, "planned c2c transform");
        Ok(Self {
            len,
            effort,
            direction,
            candidate,
            kernel,
            time_per_exec,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn effort(&self) -> PlanEffort {
        self.effort
    }
}

fn time_trials(kernel: &dyn Fft<f64>, len: usize, trials: usize) -> Duration {
    let input: Vec<Complex<f64>> = (0..len)
        .map(|k| Complex::new((k % 7) as f64, (k % 3) as f64))
        .collect();
    let mut buffer = input.clone();
    let mut scratch = vec![Complex::default(); kernel.get_inplace_scratch_len()];

    // warm-up
    kernel.process_with_scratch(&mut buffer, &mut scratch);

    let start = Instant::now();
    for _ in 0..trials {
        buffer.copy_from_slice(&input);
        kernel.process_with_scratch(&mut buffer, &mut scratch);
    }
    start.elapsed() / trials as u32
}

impl LineTransform for C2cAdapter {
    fn length(&self) -> usize {
        self.len
    }

    fn line_len(&self) -> usize {
        2 * self.len
    }

    fn make_scratch(&self) -> LineScratch {
        LineScratch::with_lens(0, self.kernel.get_inplace_scratch_len())
    }

    fn execute_with_scratch(&self, line: &mut [f64], scratch: &mut LineScratch) -> Result<()> {
        check_line(line, self.line_len())?;
        let buffer = as_complex_mut(line)?;
        let (_, work) = scratch.split(0, self.kernel.get_inplace_scratch_len());
        self.kernel.process_with_scratch(buffer, work);
        Ok(())
    }

    fn flops(&self) -> FlopCount {
        FlopCount::complex(self.len)
    }

    fn write_plan(&self, sink: &mut dyn io::Write) -> io::Result<()> {
        writeln!(
            sink,
            "c2c length={} direction={} effort={}",
            self.len, self.direction, self.effort
        )?;
        writeln!(sink, "kernel: {}", self.candidate)?;
        match self.time_per_exec {
            Some(t) => writeln!(sink, "measured: {t:?} per execution")?,
            None => writeln!(sink, "measured: no trial runs")?,
        }
        writeln!(sink, "flops: {}", self.flops())
    }
}
