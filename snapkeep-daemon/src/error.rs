use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the daemon server, wire codec, and client.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("rotation engine error: {0}")]
    Rotate(#[from] snapkeep_core::RotateError),

    #[error("wire codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("daemon protocol error: {0}")]
    Protocol(String),

    #[error("daemon is not running (socket missing: {socket})")]
    DaemonNotRunning { socket: PathBuf },

    #[error("daemon socket already in use: {socket}")]
    SocketInUse { socket: PathBuf },

    #[error("timed out during request: {request}")]
    Timeout { request: String },

    /// The daemon answered with a populated error field.
    #[error("{0}")]
    Remote(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
