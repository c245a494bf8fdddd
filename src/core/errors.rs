//! DSM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, DsmError>;

/// Top-level error type for the disk store monitor.
#[derive(Debug, Error)]
pub enum DsmError {
    #[error("[DSM-1001] invalid {kind} threshold {value}: must lie between 0 and 100")]
    InvalidThreshold { kind: &'static str, value: f64 },

    #[error("[DSM-1002] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[DSM-1101] unsupported platform: {details}")]
    UnsupportedPlatform { details: String },

    #[error("[DSM-2001] volume stats failure for {path}: {details}")]
    VolumeStats { path: PathBuf, details: String },

    #[error("[DSM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[DSM-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl DsmError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidThreshold { .. } => "DSM-1001",
            Self::ConfigParse { .. } => "DSM-1002",
            Self::UnsupportedPlatform { .. } => "DSM-1101",
            Self::VolumeStats { .. } => "DSM-2001",
            Self::Io { .. } => "DSM-3002",
            Self::Runtime { .. } => "DSM-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// Cycle faults are retryable by construction: the scheduler simply
    /// polls the same target again on the next cycle.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::VolumeStats { .. } | Self::Io { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<toml::de::Error> for DsmError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_errors() -> Vec<DsmError> {
        vec![
            DsmError::InvalidThreshold {
                kind: "warning",
                value: 120.0,
            },
            DsmError::ConfigParse {
                context: "toml",
                details: String::new(),
            },
            DsmError::UnsupportedPlatform {
                details: String::new(),
            },
            DsmError::VolumeStats {
                path: PathBuf::new(),
                details: String::new(),
            },
            DsmError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            DsmError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = sample_errors();
        let codes: Vec<&str> = errors.iter().map(DsmError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_dsm_prefix() {
        for err in &sample_errors() {
            assert!(
                err.code().starts_with("DSM-"),
                "code {} must start with DSM-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = DsmError::InvalidThreshold {
            kind: "critical",
            value: -7.5,
        };
        let msg = err.to_string();
        assert!(
            msg.contains("DSM-1001"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("critical"),
            "display should contain threshold kind: {msg}"
        );
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(
            DsmError::VolumeStats {
                path: PathBuf::new(),
                details: String::new(),
            }
            .is_retryable()
        );
        assert!(
            DsmError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            }
            .is_retryable()
        );
        assert!(
            DsmError::Runtime {
                details: String::new(),
            }
            .is_retryable()
        );

        assert!(
            !DsmError::InvalidThreshold {
                kind: "warning",
                value: 101.0,
            }
            .is_retryable()
        );
        assert!(
            !DsmError::UnsupportedPlatform {
                details: String::new(),
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = DsmError::io(
            "/data/store/seg0",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "DSM-3002");
        assert!(err.to_string().contains("/data/store/seg0"));
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: DsmError = toml_err.into();
        assert_eq!(err.code(), "DSM-1002");
    }
}
