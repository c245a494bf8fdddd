//! Monitor event model and the dedicated logger thread.
//!
//! Architecture: one logger thread owns the [`JsonlWriter`]. Every other
//! thread (the scheduler worker, foreground `add_store`/`remove_store`
//! callers) sends [`MonitorEvent`] values through a bounded crossbeam
//! channel. Non-blocking `try_send` ensures a polling cycle is never
//! stalled by logging back-pressure.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, TrySendError, bounded};

use crate::core::errors::{DsmError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Default bounded channel capacity for log events.
const CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the monitor.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    MonitorStarted {
        poll_interval_ms: u64,
        log_warn_percent: f64,
        disabled: bool,
    },
    MonitorStopped {
        uptime_secs: u64,
    },
    StoreAdded {
        store: String,
        directories: usize,
    },
    StoreRemoved {
        store: String,
    },
    /// A store volume crossed a threshold edge.
    VolumeStateChanged {
        store: String,
        path: String,
        state: String,
        usage: String,
    },
    /// The log directory crossed a threshold edge.
    LogDirStateChanged {
        path: String,
        state: String,
        usage: String,
    },
    /// A CRITICAL volume was reported to its owning store.
    DiskFailureEscalated {
        store: String,
        path: String,
        message: String,
    },
    /// A fault isolated to one target in one cycle.
    CycleFault {
        path: String,
        code: String,
        message: String,
    },
    /// Sentinel to request graceful shutdown of the logger thread.
    Shutdown,
}

/// Thread-safe, cheaply-cloneable handle for sending monitor events.
///
/// Internally wraps a bounded crossbeam `Sender`. The `send()` method
/// uses `try_send()` so callers are never blocked by logging
/// back-pressure.
#[derive(Clone)]
pub struct EventLoggerHandle {
    tx: crossbeam_channel::Sender<MonitorEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl EventLoggerHandle {
    /// Send an event to the logger thread. Non-blocking.
    ///
    /// If the channel is full the event is dropped and the dropped-events
    /// counter is incremented. Disconnected is fine during shutdown.
    pub fn send(&self, event: MonitorEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of events dropped due to channel back-pressure.
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Request graceful shutdown of the logger thread.
    pub fn shutdown(&self) {
        let _ = self.tx.send(MonitorEvent::Shutdown);
    }
}

/// Options for the logger thread.
#[derive(Debug, Clone)]
pub struct EventLoggerConfig {
    pub jsonl: JsonlConfig,
    pub channel_capacity: usize,
}

impl Default for EventLoggerConfig {
    fn default() -> Self {
        Self {
            jsonl: JsonlConfig::default(),
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

/// Spawn the logger thread and return a handle.
///
/// The returned handle is `Clone + Send` and can be shared across
/// threads. The thread runs until `handle.shutdown()` is called or all
/// senders are dropped.
pub fn spawn_logger(
    config: EventLoggerConfig,
) -> Result<(EventLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<MonitorEvent>(config.channel_capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = EventLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("dsm-logger".to_string())
        .spawn(move || {
            logger_thread_main(&rx, config.jsonl, &dropped_clone);
        })
        .map_err(|e| DsmError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

fn logger_thread_main(rx: &Receiver<MonitorEvent>, jsonl_config: JsonlConfig, dropped: &AtomicU64) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::CycleFault, Severity::Warning);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, MonitorEvent::Shutdown) {
            break;
        }

        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
    jsonl.fsync();
}

fn event_to_log_entry(event: &MonitorEvent) -> LogEntry {
    match event {
        MonitorEvent::MonitorStarted {
            poll_interval_ms,
            log_warn_percent,
            disabled,
        } => {
            let mut entry = LogEntry::new(EventType::MonitorStart, Severity::Info);
            entry.details = Some(format!(
                "disk monitoring is {}; poll interval {poll_interval_ms} ms; \
                 log directory warning at {log_warn_percent}%",
                if *disabled { "disabled" } else { "enabled" },
            ));
            entry
        }
        MonitorEvent::MonitorStopped { uptime_secs } => {
            let mut entry = LogEntry::new(EventType::MonitorStop, Severity::Info);
            entry.details = Some(format!("uptime {uptime_secs}s"));
            entry
        }
        MonitorEvent::StoreAdded { store, directories } => {
            let mut entry = LogEntry::new(EventType::StoreAdd, Severity::Info);
            entry.store = Some(store.clone());
            entry.details = Some(format!("now monitoring {directories} directories"));
            entry
        }
        MonitorEvent::StoreRemoved { store } => {
            let mut entry = LogEntry::new(EventType::StoreRemove, Severity::Info);
            entry.store = Some(store.clone());
            entry.details = Some("no longer monitoring disk store".to_string());
            entry
        }
        MonitorEvent::VolumeStateChanged {
            store,
            path,
            state,
            usage,
        } => {
            let severity = severity_for_state(state);
            let mut entry = LogEntry::new(EventType::VolumeStateChange, severity);
            entry.store = Some(store.clone());
            entry.path = Some(path.clone());
            entry.state = Some(state.clone());
            entry.usage = Some(usage.clone());
            entry
        }
        MonitorEvent::LogDirStateChanged { path, state, usage } => {
            // The log directory has no failure path; WARN and CRITICAL
            // both surface as warnings.
            let severity = if state == "NORMAL" {
                Severity::Info
            } else {
                Severity::Warning
            };
            let mut entry = LogEntry::new(EventType::LogDirStateChange, severity);
            entry.path = Some(path.clone());
            entry.state = Some(state.clone());
            entry.usage = Some(usage.clone());
            entry
        }
        MonitorEvent::DiskFailureEscalated {
            store,
            path,
            message,
        } => {
            let mut entry = LogEntry::new(EventType::DiskFailure, Severity::Critical);
            entry.store = Some(store.clone());
            entry.path = Some(path.clone());
            entry.error_message = Some(message.clone());
            entry
        }
        MonitorEvent::CycleFault {
            path,
            code,
            message,
        } => {
            let mut entry = LogEntry::new(EventType::CycleFault, Severity::Warning);
            entry.path = Some(path.clone());
            entry.error_code = Some(code.clone());
            entry.error_message = Some(message.clone());
            entry
        }
        MonitorEvent::Shutdown => LogEntry::new(EventType::MonitorStop, Severity::Info),
    }
}

fn severity_for_state(state: &str) -> Severity {
    match state {
        "CRITICAL" => Severity::Critical,
        "WARN" => Severity::Warning,
        _ => Severity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn spawn_into_tempdir() -> (
        EventLoggerHandle,
        thread::JoinHandle<()>,
        tempfile::TempDir,
        std::path::PathBuf,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let config = EventLoggerConfig {
            jsonl: JsonlConfig {
                path: path.clone(),
                ..JsonlConfig::default()
            },
            channel_capacity: 16,
        };
        let (handle, join) = spawn_logger(config).unwrap();
        (handle, join, dir, path)
    }

    #[test]
    fn events_reach_the_jsonl_file() {
        let (handle, join, _dir, path) = spawn_into_tempdir();

        handle.send(MonitorEvent::StoreAdded {
            store: "orders".to_string(),
            directories: 2,
        });
        handle.send(MonitorEvent::VolumeStateChanged {
            store: "orders".to_string(),
            path: "/data/orders".to_string(),
            state: "WARN".to_string(),
            usage: "85%".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "volume_state_change");
        assert_eq!(second["state"], "WARN");
        assert_eq!(second["severity"], "warning");
    }

    #[test]
    fn critical_transition_logged_at_critical_severity() {
        let (handle, join, _dir, path) = spawn_into_tempdir();

        handle.send(MonitorEvent::DiskFailureEscalated {
            store: "orders".to_string(),
            path: "/data/orders".to_string(),
            message: "the file system is 97% full".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap())
            .unwrap();
        assert_eq!(parsed["event"], "disk_failure");
        assert_eq!(parsed["severity"], "critical");
    }

    #[test]
    fn log_dir_recovery_is_info_severity() {
        let (handle, join, _dir, path) = spawn_into_tempdir();

        handle.send(MonitorEvent::LogDirStateChanged {
            path: "/var/log".to_string(),
            state: "NORMAL".to_string(),
            usage: "42%".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap())
            .unwrap();
        assert_eq!(parsed["severity"], "info");
    }

    #[test]
    fn dropped_counter_starts_at_zero() {
        let (handle, join, _dir, _path) = spawn_into_tempdir();
        assert_eq!(handle.dropped_events(), 0);
        handle.shutdown();
        join.join().unwrap();
    }

    #[test]
    fn shutdown_is_safe_to_call_twice() {
        let (handle, join, _dir, _path) = spawn_into_tempdir();
        handle.shutdown();
        handle.shutdown();
        join.join().unwrap();
    }
}
