//! PAL trait and the statvfs-backed Unix implementation.

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

/// Free/total byte counts for the filesystem backing a path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct VolumeStats {
    pub total_bytes: u64,
    /// Bytes usable by the process (unprivileged), not raw free blocks.
    pub free_bytes: u64,
}

/// OS abstraction used by the volume probe.
///
/// Both existence and stats go through this seam so tests can drive the
/// monitor against synthetic volumes.
pub trait Platform: Send + Sync {
    fn directory_exists(&self, path: &Path) -> bool;
    fn volume_stats(&self, path: &Path) -> Result<VolumeStats>;
}

/// Unix platform implementation using `statvfs`.
#[cfg(unix)]
#[derive(Debug, Default)]
pub struct UnixPlatform;

#[cfg(unix)]
impl Platform for UnixPlatform {
    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn volume_stats(&self, path: &Path) -> Result<VolumeStats> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(|error| {
            crate::core::errors::DsmError::VolumeStats {
                path: path.to_path_buf(),
                details: error.to_string(),
            }
        })?;
        let fragment = stat.fragment_size();
        Ok(VolumeStats {
            total_bytes: stat.blocks().saturating_mul(fragment),
            free_bytes: stat.blocks_available().saturating_mul(fragment),
        })
    }
}

/// Detect and return the platform implementation for this host.
pub fn detect_platform() -> Result<Arc<dyn Platform>> {
    #[cfg(unix)]
    {
        Ok(Arc::new(UnixPlatform))
    }
    #[cfg(not(unix))]
    {
        Err(crate::core::errors::DsmError::UnsupportedPlatform {
            details: format!("no volume stats backend for {}", std::env::consts::OS),
        })
    }
}
