//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use disk_store_monitor::prelude::*;
//! ```

// Core
pub use crate::core::config::{MonitorConfig, check_critical_percent, check_warn_percent};
pub use crate::core::errors::{DsmError, Result};

// Platform
pub use crate::platform::pal::{Platform, VolumeStats, detect_platform};

// Store seam
pub use crate::store::{MonitoredStore, StoreVolume};

// Monitor
pub use crate::monitor::probe::{ProbeOutcome, SampleResult, VolumeProbe};
pub use crate::monitor::scheduler::DiskUsageMonitor;
pub use crate::monitor::tracker::DiskState;

// Logging
pub use crate::logger::events::{EventLoggerHandle, MonitorEvent};
