//! Error types shared across the builder and the prompting engine.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the `editset` crate.
#[derive(Debug, Error)]
pub enum EditsetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// The source index could not be read or has an unusable shape.
    /// Escalated to process termination by the builder binary.
    #[error("invalid source index {path}: {reason}")]
    InvalidSourceIndex { path: PathBuf, reason: String },

    #[error("manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    #[error("manifest {path} is not a JSON array of objects")]
    InvalidManifest { path: PathBuf },

    #[error("unknown mode: {value} (expected drone, walk, or egovid)")]
    UnknownMode { value: String },

    #[error("unknown prompt family: {value}")]
    UnknownFamily { value: String },

    /// Backend initialisation or a whole-batch inference call failed.
    #[error("backend error: {reason}")]
    Backend { reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, EditsetError>;
