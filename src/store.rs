//! Interfaces consumed from the storage engine.
//!
//! The monitor never owns stores; it observes them through these traits
//! and reports back through [`MonitoredStore::on_disk_failure`]. The
//! engine decides the reaction to a failure report (typically refusing
//! further writes); the monitor never retries or auto-recovers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// One directory backing a store, with its per-volume statistics sink.
pub trait StoreVolume: Send + Sync {
    /// Filesystem path of the directory.
    fn path(&self) -> &Path;

    /// Record one usage sample for this volume's statistics.
    fn record_volume_check(&self, total_bytes: u64, free_bytes: u64, elapsed: Duration);
}

/// A persistent store whose volumes are under monitoring.
///
/// Thresholds are polled live every cycle, so runtime changes take effect
/// on the next poll without re-registering the store. Implementations
/// should validate threshold updates with
/// [`crate::core::config::check_warn_percent`] /
/// [`crate::core::config::check_critical_percent`] at the point they are
/// set; a value of zero or below disables that threshold.
pub trait MonitoredStore: Send + Sync {
    /// Store name, used in log events.
    fn name(&self) -> &str;

    /// Ordered set of directories backing this store.
    fn directories(&self) -> Vec<Arc<dyn StoreVolume>>;

    /// Usage percentage above which volumes enter WARN. `<= 0` disables.
    fn warn_threshold_percent(&self) -> f64;

    /// Usage percentage above which volumes enter CRITICAL. `<= 0` disables.
    fn critical_threshold_percent(&self) -> f64;

    /// Largest single write unit the store can produce; part of the
    /// minimum-free-space floor so there is always room for one more
    /// segment.
    fn max_segment_size_bytes(&self) -> u64;

    /// Escalation exit point for a CRITICAL volume.
    fn on_disk_failure(&self, message: &str);
}
