//! Per-stage timing and counters.

use std::collections::HashMap;
use std::time::Duration;

/// Named durations and counters recorded by an engine.
///
/// Lookups of names that were never recorded return zero, so "not measured"
/// and "measured as zero" read the same.
#[derive(Debug, Clone, Default)]
pub struct Measurements {
    durations: HashMap<String, Duration>,
    counters: HashMap<String, f64>,
}

impl Measurements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `elapsed` under `name`, replacing any earlier value.
    pub fn record(&mut self, name: &str, elapsed: Duration) {
        self.durations.insert(name.to_string(), elapsed);
    }

    pub fn set_counter(&mut self, name: &str, value: f64) {
        self.counters.insert(name.to_string(), value);
    }

    /// Duration recorded under `name`, or zero.
    pub fn get(&self, name: &str) -> Duration {
        self.durations.get(name).copied().unwrap_or_default()
    }

    /// Counter recorded under `name`, or zero.
    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).copied().unwrap_or_default()
    }

    /// Whether a duration was recorded under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.durations.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.durations.clear();
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_key_is_zero() {
        let m = Measurements::new();
        assert_eq!(m.get("first_fftw"), Duration::ZERO);
        assert_eq!(m.get("first_fftw"), Duration::ZERO);
        assert_eq!(m.counter("plan_flops"), 0.0);
        assert!(!m.contains("first_fftw"));
    }

    #[test]
    fn test_record_overwrites() {
        let mut m = Measurements::new();
        m.record("total", Duration::from_millis(5));
        m.record("total", Duration::from_millis(7));
        assert_eq!(m.get("total"), Duration::from_millis(7));
        m.set_counter("plan_flops", 12.5);
        assert_eq!(m.counter("plan_flops"), 12.5);

        m.clear();
        assert_eq!(m.get("total"), Duration::ZERO);
        assert_eq!(m.counter("plan_flops"), 0.0);
    }
}
