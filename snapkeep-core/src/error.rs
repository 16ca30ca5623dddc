//! Error types for snapkeep-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from retention-engine operations.
#[derive(Debug, Error)]
pub enum RotateError {
    /// The caller's compatibility key differs from the one registered first.
    #[error("invalid compatibility key for backup set '{name}'")]
    Incompatible { name: String },

    /// A request named no backup set.
    #[error("no backup set was named in the request")]
    EmptyName,

    /// A backup-set name that is not a single directory name.
    #[error("backup set name '{name}' must be a single directory name")]
    InvalidName { name: String },

    /// `rotate` was called for a set that was never initialized.
    #[error("backup set '{name}' has not been initialized")]
    UnknownSet { name: String },

    /// Underlying I/O failure, annotated with the path being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed part-way through a scan.
    #[error("error searching for snapshots: {0}")]
    Walk(#[from] walkdir::Error),

    /// The hardlink-copy primitive reported a failure.
    #[error("failed to copy {src} to {dest}: {message}")]
    Copy {
        src: PathBuf,
        dest: PathBuf,
        message: String,
    },

    /// The freshly computed snapshot directory is already on disk.
    #[error("the directory {path} already exists, a rotation is probably running unexpectedly")]
    Conflict { path: PathBuf },

    /// A relative snapshot path could not be read back as a timestamp.
    #[error("cannot read a timestamp from snapshot path {path}: {reason}")]
    PathDate { path: PathBuf, reason: String },

    /// A tier duration pushed the expiration cutoff outside the calendar.
    #[error("retention duration for the {tier} tier is out of range")]
    DurationOutOfRange { tier: &'static str },

    /// The time template is unusable.
    #[error("invalid time template '{template}': {reason}")]
    Template { template: String, reason: String },

    /// Settings file could not be parsed.
    #[error("failed to parse settings at {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Convenience constructor for [`RotateError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RotateError {
    RotateError::Io {
        path: path.into(),
        source,
    }
}
