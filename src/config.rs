//! Engine configuration.

use tracing::warn;

/// Environment variable overriding the worker count of an engine's pool.
pub const NUM_THREADS_ENV: &str = "FFT3D_NUM_THREADS";

/// Worker-pool settings shared by every scheduling strategy.
///
/// ```rust
/// use fft3d_rs::EngineConfig;
///
/// let config = EngineConfig::default().with_num_threads(2);
/// assert_eq!(config.resolved_threads(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Worker threads; `None` uses the available parallelism of the host.
    pub num_threads: Option<usize>,
    /// Prefix of worker thread names.
    pub thread_name_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "fft3d-worker".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults, with the worker count taken from `FFT3D_NUM_THREADS` when it
    /// holds a positive integer. Other values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(NUM_THREADS_ENV) {
            match parse_threads(&raw) {
                Some(n) => config.num_threads = Some(n),
                None => warn!(value = %raw, "ignoring invalid {NUM_THREADS_ENV}"),
            }
        }
        config
    }

    pub fn with_num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Worker count actually used, never below one.
    pub fn resolved_threads(&self) -> usize {
        self.num_threads
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

fn parse_threads(raw: &str) -> Option<usize> {
    raw.trim().parse::<usize>().ok().filter(|&n| n > 0)
}
