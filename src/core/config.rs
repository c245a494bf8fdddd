//! Monitor configuration: TOML file + env var overrides + fixed defaults.
//!
//! The configuration surface is process-wide and read once at monitor
//! construction. Per-store warn/critical percentages are not part of it;
//! they are polled live from each store every cycle and validated with
//! [`check_warn_percent`] / [`check_critical_percent`] at the point the
//! engine sets them.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{DsmError, Result};

/// Default fixed delay between usage-check cycles.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Default warning threshold for the process log directory.
pub const DEFAULT_LOG_WARN_PERCENT: f64 = 99.0;

/// Process-wide monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Fixed delay between usage-check cycles, in milliseconds.
    pub poll_interval_ms: u64,
    /// Warning threshold percent for the process log directory.
    pub log_warn_percent: f64,
    /// When true, the schedule is never started and every volume reports
    /// normal.
    pub disabled: bool,
    /// Destination for the JSONL event log.
    pub event_log_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            log_warn_percent: DEFAULT_LOG_WARN_PERCENT,
            disabled: false,
            event_log_path: PathBuf::from("/var/log/disk-store-monitor/events.jsonl"),
        }
    }
}

impl MonitorConfig {
    /// Load config from an optional TOML file, then apply env overrides.
    ///
    /// A missing file is not an error; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(p) if p.exists() => {
                let raw = fs::read_to_string(p).map_err(|source| DsmError::Io {
                    path: p.to_path_buf(),
                    source,
                })?;
                toml::from_str::<Self>(&raw)?
            }
            _ => Self::default(),
        };

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        set_env_u64("DSM_POLL_INTERVAL_MS", &mut self.poll_interval_ms)?;
        set_env_f64("DSM_LOG_WARN_PERCENT", &mut self.log_warn_percent)?;
        set_env_bool("DSM_DISABLE_MONITORING", &mut self.disabled)?;
        if let Some(raw) = env_var("DSM_EVENT_LOG_PATH") {
            self.event_log_path = PathBuf::from(raw);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        check_warn_percent(self.log_warn_percent)?;
        if self.poll_interval_ms == 0 {
            return Err(DsmError::ConfigParse {
                context: "poll_interval_ms",
                details: "poll interval must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Validate a warning threshold percent. Rejected synchronously at
/// configuration time; the monitor never re-checks at evaluation time.
pub fn check_warn_percent(value: f64) -> Result<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(DsmError::InvalidThreshold {
            kind: "warning",
            value,
        })
    }
}

/// Validate a critical threshold percent.
pub fn check_critical_percent(value: f64) -> Result<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(DsmError::InvalidThreshold {
            kind: "critical",
            value,
        })
    }
}

// ──────────────────────── env helpers ────────────────────────

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn set_env_u64(name: &str, slot: &mut u64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<u64>().map_err(|error| DsmError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_f64(name: &str, slot: &mut f64) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = raw.parse::<f64>().map_err(|error| DsmError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })?;
    }
    Ok(())
}

fn set_env_bool(name: &str, slot: &mut bool) -> Result<()> {
    if let Some(raw) = env_var(name) {
        *slot = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                return Err(DsmError::ConfigParse {
                    context: "env",
                    details: format!("{name}={other:?}: expected a boolean"),
                });
            }
        };
    }
    Ok(())
}
