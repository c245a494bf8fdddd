//! Escalation sink: the callback contract invoked on state transitions.
//!
//! One sink per tracker, parameterized by target. Store volumes escalate
//! CRITICAL into the owning store's failure-handling path; the log
//! directory only logs. The optional test-observation hook is a shared
//! slot injected at runtime and exercised identically in tests and
//! production.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::logger::events::{EventLoggerHandle, MonitorEvent};
use crate::monitor::tracker::DiskState;
use crate::store::MonitoredStore;

/// Synchronous observation hook for state transitions.
pub type DiskStateAction = Arc<dyn Fn(DiskState) + Send + Sync>;

/// Runtime-injectable slot for the observation hook, shared between the
/// monitor facade and every store-volume sink.
pub type SharedDiskStateAction = Arc<RwLock<Option<DiskStateAction>>>;

enum EscalationTarget {
    StoreVolume {
        store: Arc<dyn MonitoredStore>,
        test_action: SharedDiskStateAction,
    },
    LogDirectory,
}

/// Delivers edge-transition callbacks for one tracker.
pub struct EscalationSink {
    target: EscalationTarget,
    logger: EventLoggerHandle,
}

impl EscalationSink {
    /// Sink for a volume owned by a store.
    pub fn for_store(
        store: Arc<dyn MonitoredStore>,
        logger: EventLoggerHandle,
        test_action: SharedDiskStateAction,
    ) -> Self {
        Self {
            target: EscalationTarget::StoreVolume { store, test_action },
            logger,
        }
    }

    /// Sink for the process log directory: events only, no owning store.
    pub fn for_log_directory(logger: EventLoggerHandle) -> Self {
        Self {
            target: EscalationTarget::LogDirectory,
            logger,
        }
    }

    /// Invoked by the tracker outside its state lock, only on edges.
    ///
    /// `critical_message` is present iff `next` is CRITICAL, and
    /// distinguishes a floor breach from a percentage-threshold breach.
    pub(crate) fn handle_state_change(
        &self,
        path: &Path,
        next: DiskState,
        pct: &str,
        critical_message: Option<&str>,
    ) {
        match &self.target {
            EscalationTarget::StoreVolume { store, test_action } => {
                // Hook first, so tests observe the transition before the
                // store reacts to it.
                if let Some(action) = test_action.read().clone() {
                    action(next);
                }

                self.logger.send(MonitorEvent::VolumeStateChanged {
                    store: store.name().to_string(),
                    path: path.display().to_string(),
                    state: next.to_string(),
                    usage: pct.to_string(),
                });

                if next == DiskState::Critical {
                    let message = format!(
                        "Critical disk usage threshold exceeded for volume {}: {}",
                        path.display(),
                        critical_message.unwrap_or_default()
                    );
                    self.logger.send(MonitorEvent::DiskFailureEscalated {
                        store: store.name().to_string(),
                        path: path.display().to_string(),
                        message: message.clone(),
                    });
                    store.on_disk_failure(&message);
                }
            }
            EscalationTarget::LogDirectory => {
                self.logger.send(MonitorEvent::LogDirStateChanged {
                    path: path.display().to_string(),
                    state: next.to_string(),
                    usage: pct.to_string(),
                });
            }
        }
    }
}
