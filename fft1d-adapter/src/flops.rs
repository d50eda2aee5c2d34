use std::fmt;
use std::ops::{Add, Mul};

/// Additive, multiplicative and fused multiply-add operation counts.
///
/// Used for telemetry only; the numbers are the textbook radix-2 estimate,
/// not a count of what the chosen kernel actually executes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FlopCount {
    pub add: f64,
    pub mul: f64,
    pub fma: f64,
}

impl FlopCount {
    /// Estimate for a complex transform of length `n`.
    pub fn complex(n: usize) -> Self {
        if n < 2 {
            return Self::default();
        }
        let n = n as f64;
        let n_log_n = n * n.log2();
        Self {
            add: 3.0 * n_log_n,
            mul: 2.0 * n_log_n,
            fma: 0.0,
        }
    }

    /// Estimate for a real-to-complex transform of length `n`: half the
    /// complex estimate.
    pub fn real(n: usize) -> Self {
        Self::complex(n) * 0.5
    }

    pub fn total(&self) -> f64 {
        self.add + self.mul + self.fma
    }
}

impl Add for FlopCount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            add: self.add + rhs.add,
            mul: self.mul + rhs.mul,
            fma: self.fma + rhs.fma,
        }
    }
}

impl Mul<f64> for FlopCount {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self {
            add: self.add * rhs,
            mul: self.mul * rhs,
            fma: self.fma * rhs,
        }
    }
}

impl fmt::Display for FlopCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "add={} mul={} fma={}", self.add, self.mul, self.fma)
    }
}
