//! Error types for semtag-core

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,

    /// A configuration file exists but has no content.
    #[error("config file {path} is empty")]
    Empty {
        /// The empty file.
        path: Utf8PathBuf,
    },

    /// A configuration file could not be parsed for editing.
    #[error("could not update {path}: {message}")]
    Edit {
        /// The file being edited.
        path: Utf8PathBuf,
        /// Parser or serializer diagnostics.
        message: String,
    },

    /// The file format does not support recording the version.
    #[error("cannot record the version in {path}: only TOML and JSON config files can be updated")]
    UnsupportedFormat {
        /// The file that was to be updated.
        path: Utf8PathBuf,
    },
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
