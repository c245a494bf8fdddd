//! Volume probe: one free/total sample of a directory's filesystem.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::errors::Result;
use crate::platform::pal::Platform;

/// One usage sample. Ephemeral; consumed by the tracker and the owner's
/// statistics sink, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleResult {
    pub total_bytes: u64,
    pub free_bytes: u64,
    /// Wall time spent in the stat call. Recorded for observability only,
    /// never used to time out the sample.
    pub elapsed: Duration,
}

impl SampleResult {
    /// Usage percentage in `[0, 100]`. A zero-sized filesystem evaluates
    /// as 0% used; the floor condition still catches it.
    #[must_use]
    pub fn usage_percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            100.0 * (self.total_bytes - self.free_bytes.min(self.total_bytes)) as f64
                / self.total_bytes as f64
        }
    }
}

/// Outcome of probing a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The directory does not exist yet. An expected transient condition,
    /// not an error; the caller leaves prior state untouched.
    Absent,
    Sampled(SampleResult),
}

/// Samples free/total bytes and latency for one directory at a time.
#[derive(Clone)]
pub struct VolumeProbe {
    platform: Arc<dyn Platform>,
}

impl VolumeProbe {
    #[must_use]
    pub fn new(platform: Arc<dyn Platform>) -> Self {
        Self { platform }
    }

    pub fn sample(&self, dir: &Path) -> Result<ProbeOutcome> {
        if !self.platform.directory_exists(dir) {
            return Ok(ProbeOutcome::Absent);
        }

        let start = Instant::now();
        let stats = self.platform.volume_stats(dir)?;
        let elapsed = start.elapsed();

        Ok(ProbeOutcome::Sampled(SampleResult {
            total_bytes: stats.total_bytes,
            free_bytes: stats.free_bytes,
            elapsed,
        }))
    }
}
