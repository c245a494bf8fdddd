//! Usage tracker: per-volume hysteresis state machine.
//!
//! One parameterized tracker type covers both store volumes and the
//! process log directory; the two policies differ only in their floor,
//! statistics sink, and escalation target. State is guarded by a mutex
//! covering nothing but the state field, so point queries never block on
//! an in-flight sample or callback.

#![allow(missing_docs)]

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::errors::Result;
use crate::monitor::escalation::EscalationSink;
use crate::monitor::probe::{ProbeOutcome, VolumeProbe};
use crate::store::StoreVolume;

/// Free-space floor shared by every volume, sized for log/metadata
/// writes. Store volumes add their maximum segment size on top so there
/// is always room for one further segment.
pub const BASE_FREE_SPACE_FLOOR_BYTES: u64 = 20 * 1024 * 1024;

/// Hysteresis state of one monitored volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskState {
    Normal,
    Warn,
    Critical,
}

impl DiskState {
    /// The transition function. The only place a state is ever computed.
    ///
    /// The floor condition (`below_minimum`) forces CRITICAL even when
    /// the percentage is under both thresholds. A threshold `<= 0` is
    /// disabled. CRITICAL dominates WARN.
    #[must_use]
    pub fn select(usage_percent: f64, warn: f64, critical: f64, below_minimum: bool) -> Self {
        if critical > 0.0 && (usage_percent > critical || below_minimum) {
            Self::Critical
        } else if warn > 0.0 && usage_percent > warn {
            Self::Warn
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub const fn is_normal(self) -> bool {
        matches!(self, Self::Normal)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Warn => "WARN",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for DiskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owns the hysteresis state for one monitored directory.
pub struct UsageTracker {
    path: PathBuf,
    floor_bytes: u64,
    probe: VolumeProbe,
    stats_sink: Option<Arc<dyn StoreVolume>>,
    escalation: EscalationSink,
    state: Mutex<DiskState>,
}

impl UsageTracker {
    /// Tracker for a volume owned by a store.
    pub fn for_store_volume(
        volume: Arc<dyn StoreVolume>,
        max_segment_size_bytes: u64,
        probe: VolumeProbe,
        escalation: EscalationSink,
    ) -> Self {
        Self {
            path: volume.path().to_path_buf(),
            floor_bytes: BASE_FREE_SPACE_FLOOR_BYTES.saturating_add(max_segment_size_bytes),
            probe,
            stats_sink: Some(volume),
            escalation,
            state: Mutex::new(DiskState::Normal),
        }
    }

    /// Tracker for the process log directory: base floor, no stats sink.
    pub fn for_log_directory(
        path: impl Into<PathBuf>,
        probe: VolumeProbe,
        escalation: EscalationSink,
    ) -> Self {
        Self {
            path: path.into(),
            floor_bytes: BASE_FREE_SPACE_FLOOR_BYTES,
            probe,
            stats_sink: None,
            escalation,
            state: Mutex::new(DiskState::Normal),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn floor_bytes(&self) -> u64 {
        self.floor_bytes
    }

    /// Current state. Never blocks on an in-flight sample.
    #[must_use]
    pub fn state(&self) -> DiskState {
        *self.state.lock()
    }

    /// One poll step. Returns the (possibly unchanged) state; the
    /// escalation callback fires only when the state actually changed.
    pub fn update(&self, warn: f64, critical: f64) -> Result<DiskState> {
        let current = *self.state.lock();

        // don't bother sampling when both limits are disabled
        if !(warn > 0.0 || critical > 0.0) {
            return Ok(current);
        }

        let sample = match self.probe.sample(&self.path)? {
            ProbeOutcome::Absent => return Ok(current),
            ProbeOutcome::Sampled(sample) => sample,
        };

        if let Some(sink) = &self.stats_sink {
            sink.record_volume_check(sample.total_bytes, sample.free_bytes, sample.elapsed);
        }

        let usage = sample.usage_percent();
        let below_minimum = sample.free_bytes < self.floor_bytes;
        let next = DiskState::select(usage, warn, critical, below_minimum);
        if next == current {
            return Ok(next);
        }

        *self.state.lock() = next;

        let pct = format!("{}%", usage.round());
        let critical_message = (next == DiskState::Critical).then(|| {
            if below_minimum {
                format!(
                    "the file system only has {} bytes free which is below the minimum of {}.",
                    sample.free_bytes, self.floor_bytes
                )
            } else {
                format!(
                    "the file system is {pct} full, which exceeds the critical threshold of \
                     {critical}%."
                )
            }
        });

        // callback runs outside the state lock
        self.escalation
            .handle_state_change(&self.path, next, &pct, critical_message.as_deref());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::DsmError;
    use crate::logger::events::{EventLoggerConfig, EventLoggerHandle, spawn_logger};
    use crate::logger::jsonl::JsonlConfig;
    use crate::monitor::escalation::DiskStateAction;
    use crate::platform::pal::{Platform, VolumeStats};
    use crate::store::MonitoredStore;
    use parking_lot::RwLock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    // ──────────────────── fakes ────────────────────

    struct FakeVolumePlatform {
        stats: RwLock<Option<VolumeStats>>,
        stat_calls: AtomicUsize,
    }

    impl FakeVolumePlatform {
        fn new(stats: Option<VolumeStats>) -> Arc<Self> {
            Arc::new(Self {
                stats: RwLock::new(stats),
                stat_calls: AtomicUsize::new(0),
            })
        }

        fn set(&self, stats: Option<VolumeStats>) {
            *self.stats.write() = stats;
        }

        fn calls(&self) -> usize {
            self.stat_calls.load(Ordering::SeqCst)
        }
    }

    impl Platform for FakeVolumePlatform {
        fn directory_exists(&self, _path: &Path) -> bool {
            self.stats.read().is_some()
        }

        fn volume_stats(&self, path: &Path) -> Result<VolumeStats> {
            self.stat_calls.fetch_add(1, Ordering::SeqCst);
            let stats = *self.stats.read();
            stats.ok_or_else(|| DsmError::VolumeStats {
                path: path.to_path_buf(),
                details: "volume vanished".to_string(),
            })
        }
    }

    struct FakeStore {
        checks: Mutex<Vec<(u64, u64)>>,
        failures: Mutex<Vec<String>>,
    }

    impl FakeStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                checks: Mutex::new(Vec::new()),
                failures: Mutex::new(Vec::new()),
            })
        }
    }

    impl MonitoredStore for FakeStore {
        fn name(&self) -> &str {
            "fake"
        }
        fn directories(&self) -> Vec<Arc<dyn StoreVolume>> {
            Vec::new()
        }
        fn warn_threshold_percent(&self) -> f64 {
            80.0
        }
        fn critical_threshold_percent(&self) -> f64 {
            95.0
        }
        fn max_segment_size_bytes(&self) -> u64 {
            0
        }
        fn on_disk_failure(&self, message: &str) {
            self.failures.lock().push(message.to_string());
        }
    }

    struct FakeDir {
        path: PathBuf,
        store: Arc<FakeStore>,
    }

    impl StoreVolume for FakeDir {
        fn path(&self) -> &Path {
            &self.path
        }
        fn record_volume_check(&self, total: u64, free: u64, _elapsed: Duration) {
            self.store.checks.lock().push((total, free));
        }
    }

    struct Harness {
        platform: Arc<FakeVolumePlatform>,
        store: Arc<FakeStore>,
        tracker: UsageTracker,
        logger: EventLoggerHandle,
        logger_join: std::thread::JoinHandle<()>,
        _dir: tempfile::TempDir,
        hook_count: Arc<AtomicUsize>,
    }

    impl Harness {
        fn close(self) {
            self.logger.shutdown();
            self.logger_join.join().unwrap();
        }
    }

    fn harness(stats: Option<VolumeStats>) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let (logger, logger_join) = spawn_logger(EventLoggerConfig {
            jsonl: JsonlConfig {
                path: dir.path().join("events.jsonl"),
                ..JsonlConfig::default()
            },
            channel_capacity: 64,
        })
        .unwrap();

        let platform = FakeVolumePlatform::new(stats);
        let store = FakeStore::new();
        let volume: Arc<dyn StoreVolume> = Arc::new(FakeDir {
            path: PathBuf::from("/data/fake/d0"),
            store: store.clone(),
        });

        let hook_count = Arc::new(AtomicUsize::new(0));
        let hook_counter = Arc::clone(&hook_count);
        let hook: DiskStateAction = Arc::new(move |_| {
            hook_counter.fetch_add(1, Ordering::SeqCst);
        });

        let escalation = EscalationSink::for_store(
            store.clone(),
            logger.clone(),
            Arc::new(RwLock::new(Some(hook))),
        );
        let tracker = UsageTracker::for_store_volume(
            volume,
            0,
            VolumeProbe::new(platform.clone()),
            escalation,
        );

        Harness {
            platform,
            store,
            tracker,
            logger,
            logger_join,
            _dir: dir,
            hook_count,
        }
    }

    fn stats_with_usage(total: u64, used_pct: u64) -> VolumeStats {
        VolumeStats {
            total_bytes: total,
            free_bytes: total - total * used_pct / 100,
        }
    }

    const GIB: u64 = 1024 * 1024 * 1024;

    // ──────────────────── select truth table ────────────────────

    #[test]
    fn select_below_warn_is_normal() {
        assert_eq!(DiskState::select(50.0, 80.0, 95.0, false), DiskState::Normal);
    }

    #[test]
    fn select_between_warn_and_critical_is_warn() {
        assert_eq!(DiskState::select(85.0, 80.0, 95.0, false), DiskState::Warn);
    }

    #[test]
    fn select_above_critical_is_critical() {
        assert_eq!(
            DiskState::select(97.0, 80.0, 95.0, false),
            DiskState::Critical
        );
    }

    #[test]
    fn select_exact_threshold_does_not_trip() {
        // strictly-greater comparisons on both thresholds
        assert_eq!(DiskState::select(80.0, 80.0, 95.0, false), DiskState::Normal);
        assert_eq!(DiskState::select(95.0, 80.0, 95.0, false), DiskState::Warn);
    }

    #[test]
    fn select_floor_forces_critical_under_both_thresholds() {
        assert_eq!(
            DiskState::select(50.0, 80.0, 95.0, true),
            DiskState::Critical
        );
        // even when the warn threshold is disabled
        assert_eq!(DiskState::select(50.0, 0.0, 90.0, true), DiskState::Critical);
    }

    #[test]
    fn select_floor_ignored_when_critical_disabled() {
        assert_eq!(DiskState::select(50.0, 80.0, 0.0, true), DiskState::Normal);
        assert_eq!(DiskState::select(85.0, 80.0, 0.0, true), DiskState::Warn);
    }

    #[test]
    fn select_both_disabled_is_always_normal() {
        assert_eq!(DiskState::select(99.9, 0.0, 0.0, true), DiskState::Normal);
        assert_eq!(DiskState::select(99.9, -1.0, -1.0, false), DiskState::Normal);
    }

    proptest::proptest! {
        #[test]
        fn ordered_thresholds_partition_the_usage_axis(
            usage in 0.0_f64..100.0,
            warn in 0.001_f64..99.0,
            gap in 0.001_f64..50.0,
        ) {
            let critical = (warn + gap).min(100.0);
            let state = DiskState::select(usage, warn, critical, false);
            if usage <= warn {
                proptest::prop_assert_eq!(state, DiskState::Normal);
            } else if usage <= critical {
                proptest::prop_assert_eq!(state, DiskState::Warn);
            } else {
                proptest::prop_assert_eq!(state, DiskState::Critical);
            }
        }

        #[test]
        fn floor_dominates_whenever_critical_enabled(
            usage in 0.0_f64..100.0,
            warn in -10.0_f64..100.0,
            critical in 0.001_f64..100.0,
        ) {
            proptest::prop_assert_eq!(
                DiskState::select(usage, warn, critical, true),
                DiskState::Critical
            );
        }

        #[test]
        fn disabled_thresholds_never_leave_normal(
            usage in 0.0_f64..1000.0,
            below in proptest::bool::ANY,
        ) {
            proptest::prop_assert_eq!(
                DiskState::select(usage, 0.0, 0.0, below),
                DiskState::Normal
            );
        }
    }

    // ──────────────────── update ────────────────────

    #[test]
    fn update_skips_sampling_when_both_thresholds_disabled() {
        let h = harness(Some(stats_with_usage(100 * GIB, 99)));
        assert_eq!(h.tracker.update(0.0, 0.0).unwrap(), DiskState::Normal);
        assert_eq!(h.platform.calls(), 0);
        assert!(h.store.checks.lock().is_empty());
        h.close();
    }

    #[test]
    fn update_retains_state_while_directory_absent() {
        let h = harness(Some(stats_with_usage(100 * GIB, 85)));
        assert_eq!(h.tracker.update(80.0, 95.0).unwrap(), DiskState::Warn);

        // directory disappears (e.g. not yet recreated); prior state holds
        h.platform.set(None);
        assert_eq!(h.tracker.update(80.0, 95.0).unwrap(), DiskState::Warn);
        assert_eq!(h.hook_count.load(Ordering::SeqCst), 1);
        h.close();
    }

    #[test]
    fn update_forwards_sample_to_stats_sink() {
        let h = harness(Some(stats_with_usage(100 * GIB, 50)));
        h.tracker.update(80.0, 95.0).unwrap();
        let checks = h.store.checks.lock();
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].0, 100 * GIB);
        drop(checks);
        h.close();
    }

    #[test]
    fn callback_fires_only_on_edges() {
        let h = harness(Some(stats_with_usage(100 * GIB, 85)));

        assert_eq!(h.tracker.update(80.0, 95.0).unwrap(), DiskState::Warn);
        assert_eq!(h.hook_count.load(Ordering::SeqCst), 1);

        // steady usage: polls keep returning WARN without callbacks
        for _ in 0..5 {
            assert_eq!(h.tracker.update(80.0, 95.0).unwrap(), DiskState::Warn);
        }
        assert_eq!(h.hook_count.load(Ordering::SeqCst), 1);

        // recovery is an edge again
        h.platform.set(Some(stats_with_usage(100 * GIB, 10)));
        assert_eq!(h.tracker.update(80.0, 95.0).unwrap(), DiskState::Normal);
        assert_eq!(h.hook_count.load(Ordering::SeqCst), 2);
        h.close();
    }

    #[test]
    fn critical_by_percentage_reports_percentage_cause() {
        let h = harness(Some(stats_with_usage(100 * GIB, 97)));
        assert_eq!(h.tracker.update(80.0, 95.0).unwrap(), DiskState::Critical);
        let failures = h.store.failures.lock();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("exceeds the critical threshold of 95%"));
        assert!(!failures[0].contains("below the minimum"));
        drop(failures);
        h.close();
    }

    #[test]
    fn critical_by_floor_reports_floor_cause() {
        // 50% used but only 10 MiB free: below the 20 MiB base floor
        let h = harness(Some(VolumeStats {
            total_bytes: 20 * 1024 * 1024,
            free_bytes: 10 * 1024 * 1024,
        }));
        assert_eq!(h.tracker.update(0.0, 90.0).unwrap(), DiskState::Critical);
        let failures = h.store.failures.lock();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("below the minimum"));
        assert!(!failures[0].contains("exceeds the critical threshold"));
        drop(failures);
        h.close();
    }

    #[test]
    fn direct_normal_to_critical_transition() {
        let h = harness(Some(stats_with_usage(100 * GIB, 97)));
        assert_eq!(h.tracker.state(), DiskState::Normal);
        assert_eq!(h.tracker.update(80.0, 95.0).unwrap(), DiskState::Critical);
        assert_eq!(h.tracker.state(), DiskState::Critical);
        // exactly one edge, no intermediate WARN callback
        assert_eq!(h.hook_count.load(Ordering::SeqCst), 1);
        h.close();
    }

    #[test]
    fn probe_error_propagates_and_retains_state() {
        let h = harness(Some(stats_with_usage(100 * GIB, 85)));
        h.tracker.update(80.0, 95.0).unwrap();

        // exists() true but stats failing is a cycle fault
        struct ExistsButFails;
        impl Platform for ExistsButFails {
            fn directory_exists(&self, _path: &Path) -> bool {
                true
            }
            fn volume_stats(&self, path: &Path) -> Result<VolumeStats> {
                Err(DsmError::VolumeStats {
                    path: path.to_path_buf(),
                    details: "io error".to_string(),
                })
            }
        }
        let escalation = EscalationSink::for_log_directory(h.logger.clone());
        let failing = UsageTracker::for_log_directory(
            "/var/log",
            VolumeProbe::new(Arc::new(ExistsButFails)),
            escalation,
        );
        assert!(failing.update(99.0, 100.0).is_err());
        assert_eq!(failing.state(), DiskState::Normal);
        h.close();
    }

    #[test]
    fn store_volume_floor_includes_segment_size() {
        let dir = tempfile::tempdir().unwrap();
        let (logger, join) = spawn_logger(EventLoggerConfig {
            jsonl: JsonlConfig {
                path: dir.path().join("events.jsonl"),
                ..JsonlConfig::default()
            },
            channel_capacity: 16,
        })
        .unwrap();

        let store = FakeStore::new();
        let volume: Arc<dyn StoreVolume> = Arc::new(FakeDir {
            path: PathBuf::from("/data/fake/d0"),
            store: store.clone(),
        });
        let platform = FakeVolumePlatform::new(None);
        let tracker = UsageTracker::for_store_volume(
            volume,
            512 * 1024 * 1024,
            VolumeProbe::new(platform),
            EscalationSink::for_store(store, logger.clone(), Arc::new(RwLock::new(None))),
        );
        assert_eq!(
            tracker.floor_bytes(),
            BASE_FREE_SPACE_FLOOR_BYTES + 512 * 1024 * 1024
        );

        logger.shutdown();
        join.join().unwrap();
    }
}
