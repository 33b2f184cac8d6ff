//! # Track Error Types
//!
//! All errors that can occur while configuring or building the track.

use std::path::PathBuf;

use rushline_core::PoolError;
use thiserror::Error;

/// Result type for track operations.
pub type TrackResult<T> = Result<T, TrackError>;

/// Errors that can occur in the track generator.
#[derive(Error, Debug)]
pub enum TrackError {
    /// Configuration file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    ConfigIo {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for [`crate::TrackConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No variant with a usable template exists.
    #[error("variant catalog is empty or has no usable template")]
    EmptyCatalog,

    /// A variant id referenced by the configuration does not exist.
    #[error("unknown variant id: {0}")]
    UnknownVariant(String),

    /// Pool failure surfaced through a fallible API.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
}
