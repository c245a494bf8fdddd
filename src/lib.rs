#![forbid(unsafe_code)]

//! Disk usage monitor for persistent store volumes.
//!
//! A storage engine embeds one [`monitor::scheduler::DiskUsageMonitor`]
//! instance. A background worker samples free space on every registered
//! store's directories plus the process log directory, classifies each
//! volume as NORMAL / WARN / CRITICAL with hysteresis (callbacks fire only
//! on threshold-crossing edges), and escalates CRITICAL transitions into
//! the owning store's failure-handling path.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use disk_store_monitor::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use disk_store_monitor::core::config::MonitorConfig;
//! use disk_store_monitor::monitor::scheduler::DiskUsageMonitor;
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod monitor;
pub mod platform;
pub mod store;
