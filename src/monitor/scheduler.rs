//! Monitor facade and the recurring usage-check cycle.
//!
//! One `DiskUsageMonitor` instance is created at storage-engine startup
//! and torn down at engine shutdown; there is no ambient global state. A
//! single dedicated worker drives all polling: volumes are sampled
//! sequentially within a cycle, never in parallel, so stat calls on the
//! same device never storm.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender, bounded};
use parking_lot::{Mutex, RwLock};

use crate::core::config::MonitorConfig;
use crate::core::errors::{DsmError, Result};
use crate::logger::events::{EventLoggerConfig, EventLoggerHandle, MonitorEvent, spawn_logger};
use crate::logger::jsonl::JsonlConfig;
use crate::monitor::escalation::{DiskStateAction, EscalationSink, SharedDiskStateAction};
use crate::monitor::probe::VolumeProbe;
use crate::monitor::registry::StoreRegistry;
use crate::monitor::tracker::{DiskState, UsageTracker};
use crate::platform::pal::{Platform, detect_platform};
use crate::store::MonitoredStore;

/// Critical percent for the log directory. Pinned at 100 so CRITICAL is
/// reachable in practice only via the free-space floor.
const LOG_DIR_CRITICAL_PERCENT: f64 = 100.0;

/// Disk usage monitor for a storage engine's volumes and the process log
/// directory.
pub struct DiskUsageMonitor {
    config: MonitorConfig,
    platform: Arc<dyn Platform>,
    registry: Arc<StoreRegistry>,
    log_tracker: Arc<UsageTracker>,
    logger: EventLoggerHandle,
    logger_join: Mutex<Option<thread::JoinHandle<()>>>,
    test_action: SharedDiskStateAction,
    shutdown_tx: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    started_at: Instant,
}

impl DiskUsageMonitor {
    /// Construct the monitor for this host's platform and start the
    /// schedule (unless monitoring is disabled).
    pub fn new(log_directory: impl Into<PathBuf>, config: MonitorConfig) -> Result<Self> {
        let platform = detect_platform()?;
        Self::with_platform(log_directory, config, platform)
    }

    /// Construct with an injected platform. Used by tests to drive the
    /// monitor against synthetic volumes.
    pub fn with_platform(
        log_directory: impl Into<PathBuf>,
        config: MonitorConfig,
        platform: Arc<dyn Platform>,
    ) -> Result<Self> {
        let (logger, logger_join) = spawn_logger(EventLoggerConfig {
            jsonl: JsonlConfig {
                path: config.event_log_path.clone(),
                ..JsonlConfig::default()
            },
            ..EventLoggerConfig::default()
        })?;

        logger.send(MonitorEvent::MonitorStarted {
            poll_interval_ms: config.poll_interval_ms,
            log_warn_percent: config.log_warn_percent,
            disabled: config.disabled,
        });

        let registry = Arc::new(StoreRegistry::new());
        let log_tracker = Arc::new(UsageTracker::for_log_directory(
            log_directory,
            VolumeProbe::new(Arc::clone(&platform)),
            EscalationSink::for_log_directory(logger.clone()),
        ));

        let monitor = Self {
            config,
            platform,
            registry,
            log_tracker,
            logger,
            logger_join: Mutex::new(Some(logger_join)),
            test_action: Arc::new(RwLock::new(None)),
            shutdown_tx: Mutex::new(None),
            worker: Mutex::new(None),
            started_at: Instant::now(),
        };

        if !monitor.config.disabled {
            monitor.start_worker()?;
        }
        Ok(monitor)
    }

    fn start_worker(&self) -> Result<()> {
        let (tx, rx) = bounded::<()>(1);
        let registry = Arc::clone(&self.registry);
        let log_tracker = Arc::clone(&self.log_tracker);
        let logger = self.logger.clone();
        let log_warn_percent = self.config.log_warn_percent;
        let interval = Duration::from_millis(self.config.poll_interval_ms);

        let join = thread::Builder::new()
            .name("disk-usage-monitor".to_string())
            .spawn(move || {
                // fixed delay: first run immediate, next delay starts when
                // the previous cycle finishes
                loop {
                    run_cycle(&registry, &log_tracker, log_warn_percent, &logger);
                    match rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // explicit signal or sender dropped: stop scheduling
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|source| DsmError::Runtime {
                details: format!("failed to spawn monitor thread: {source}"),
            })?;

        *self.shutdown_tx.lock() = Some(tx);
        *self.worker.lock() = Some(join);
        Ok(())
    }

    /// Start monitoring every directory of `store`. Safe to call while a
    /// cycle is in flight.
    pub fn add_store(&self, store: Arc<dyn MonitoredStore>) {
        let max_segment = store.max_segment_size_bytes();
        let trackers: Vec<Arc<UsageTracker>> = store
            .directories()
            .into_iter()
            .map(|volume| {
                Arc::new(UsageTracker::for_store_volume(
                    volume,
                    max_segment,
                    VolumeProbe::new(Arc::clone(&self.platform)),
                    EscalationSink::for_store(
                        Arc::clone(&store),
                        self.logger.clone(),
                        Arc::clone(&self.test_action),
                    ),
                ))
            })
            .collect();

        self.logger.send(MonitorEvent::StoreAdded {
            store: store.name().to_string(),
            directories: trackers.len(),
        });
        self.registry.insert(store, trackers);
    }

    /// Stop monitoring `store`. Its volumes disappear from subsequent
    /// queries; a tracker mid-poll finishes its current cycle.
    pub fn remove_store(&self, store: &Arc<dyn MonitoredStore>) {
        if self.registry.remove(store) {
            self.logger.send(MonitorEvent::StoreRemoved {
                store: store.name().to_string(),
            });
        }
    }

    /// Whether a volume is in NORMAL state. Unmonitored pairs — and every
    /// pair when monitoring is disabled — answer `true`: no monitoring
    /// implies no reported problem. Never blocks on an in-flight sample.
    pub fn is_normal(&self, store: &Arc<dyn MonitoredStore>, dir: &Path) -> bool {
        if self.config.disabled {
            return true;
        }
        self.registry
            .state_of(store, dir)
            .is_none_or(DiskState::is_normal)
    }

    /// Install or clear the synchronous transition-observation hook.
    pub fn set_test_action(&self, action: Option<DiskStateAction>) {
        *self.test_action.write() = action;
    }

    /// Dropped-event count of the event log channel, for observability.
    pub fn dropped_log_events(&self) -> u64 {
        self.logger.dropped_events()
    }

    /// Stop scheduling and release resources. Idempotent. An in-flight
    /// cycle is allowed to finish rather than being interrupted.
    pub fn shutdown(&self) {
        // dropping the sender wakes the worker out of its delay
        drop(self.shutdown_tx.lock().take());
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }

        self.registry.clear();

        if let Some(logger_join) = self.logger_join.lock().take() {
            self.logger.send(MonitorEvent::MonitorStopped {
                uptime_secs: self.started_at.elapsed().as_secs(),
            });
            self.logger.shutdown();
            let _ = logger_join.join();
        }
    }
}

impl Drop for DiskUsageMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One usage-check cycle: store-owned trackers grouped by store, then the
/// log directory, always, last.
///
/// Once one of a store's volumes reports CRITICAL this cycle the rest of
/// that store's volumes are skipped; the worst case for that store is
/// already known. Other stores continue to be checked. Any fault is
/// logged and isolated to its target and this cycle.
fn run_cycle(
    registry: &StoreRegistry,
    log_tracker: &UsageTracker,
    log_warn_percent: f64,
    logger: &EventLoggerHandle,
) {
    for (store, trackers) in registry.snapshot() {
        for tracker in trackers {
            // thresholds are polled live so runtime changes apply
            let warn = store.warn_threshold_percent();
            let critical = store.critical_threshold_percent();
            match tracker.update(warn, critical) {
                Ok(DiskState::Critical) => break,
                Ok(_) => {}
                Err(error) => logger.send(MonitorEvent::CycleFault {
                    path: tracker.path().display().to_string(),
                    code: error.code().to_string(),
                    message: error.to_string(),
                }),
            }
        }
    }

    if let Err(error) = log_tracker.update(log_warn_percent, LOG_DIR_CRITICAL_PERCENT) {
        logger.send(MonitorEvent::CycleFault {
            path: log_tracker.path().display().to_string(),
            code: error.code().to_string(),
            message: error.to_string(),
        });
    }
}
