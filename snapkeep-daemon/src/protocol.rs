//! Wire envelope and blocking client.
//!
//! One request and one response per connection, both bincode-encoded. The
//! client half-closes its write side after the request; the server answers
//! and closes.

use std::io::{ErrorKind, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use snapkeep_core::{BackupSetConfig, Settings};

use crate::error::{io_err, DaemonError};
use crate::paths;

pub const OP_LASTRUN: &str = "lastrun";
pub const OP_INIT: &str = "init";
pub const OP_ROTATE: &str = "rotate";

/// Absolute deadline for a response, measured from connect.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on an encoded request or response.
pub const MAX_MESSAGE_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Request {
    /// One of [`OP_LASTRUN`], [`OP_INIT`], [`OP_ROTATE`].
    pub op: String,
    pub set: BackupSetConfig,
}

impl Request {
    pub fn new(op: &str, set: BackupSetConfig) -> Self {
        Self {
            op: op.to_string(),
            set,
        }
    }
}

/// Exactly one of the two fields is meaningful; both empty means no answer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Response {
    pub response: String,
    pub error: String,
}

impl Response {
    pub fn ok(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            error: String::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            response: String::new(),
            error: message.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.response.is_empty() && self.error.is_empty()
    }

    pub fn into_result(self) -> Result<String, DaemonError> {
        if self.error.is_empty() {
            Ok(self.response)
        } else {
            Err(DaemonError::Remote(self.error))
        }
    }
}

fn codec() -> impl Options + Copy {
    bincode::DefaultOptions::new().with_limit(MAX_MESSAGE_BYTES)
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, DaemonError> {
    Ok(codec().serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DaemonError> {
    Ok(codec().deserialize(bytes)?)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Client {
    socket: PathBuf,
    timeout: Duration,
}

impl Client {
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self {
            socket: socket.into(),
            timeout: RESPONSE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Client for the socket named by `settings`.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(paths::socket_path(settings))
    }

    /// Send one request and wait for its response until the deadline.
    pub fn send(&self, request: &Request) -> Result<Response, DaemonError> {
        let socket = &self.socket;
        if !socket.exists() {
            return Err(DaemonError::DaemonNotRunning {
                socket: socket.clone(),
            });
        }
        let deadline = Instant::now() + self.timeout;

        let mut stream = UnixStream::connect(socket).map_err(|err| {
            if matches!(
                err.kind(),
                ErrorKind::NotFound | ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
            ) {
                DaemonError::DaemonNotRunning {
                    socket: socket.clone(),
                }
            } else {
                io_err(socket, err)
            }
        })?;

        let payload = encode(request)?;
        stream
            .write_all(&payload)
            .map_err(|e| io_err(socket, e))?;
        stream.flush().map_err(|e| io_err(socket, e))?;
        stream
            .shutdown(Shutdown::Write)
            .map_err(|e| io_err(socket, e))?;

        let timed_out = || DaemonError::Timeout {
            request: format!("{request:?}"),
        };
        let mut received = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(timed_out());
            }
            stream
                .set_read_timeout(Some(remaining))
                .map_err(|e| io_err(socket, e))?;
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => received.extend_from_slice(&chunk[..n]),
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(timed_out());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(io_err(socket, err)),
            }
            if received.len() as u64 > MAX_MESSAGE_BYTES {
                return Err(DaemonError::Protocol(
                    "daemon response exceeds size limit".to_string(),
                ));
            }
        }

        if received.is_empty() {
            return Err(DaemonError::Protocol(
                "daemon closed connection before responding".to_string(),
            ));
        }
        let response: Response = decode(&received)?;
        if response.is_empty() {
            return Err(timed_out());
        }
        Ok(response)
    }

    fn call(&self, op: &str, set: &BackupSetConfig) -> Result<String, DaemonError> {
        self.send(&Request::new(op, set.clone()))?.into_result()
    }

    /// Elapsed time since the set's last rotation, e.g. `26h3m9s`.
    pub fn last_run(&self, set: &BackupSetConfig) -> Result<String, DaemonError> {
        self.call(OP_LASTRUN, set)
    }

    /// Register the set and return its working directory.
    pub fn init(&self, set: &BackupSetConfig) -> Result<PathBuf, DaemonError> {
        self.call(OP_INIT, set).map(PathBuf::from)
    }

    /// Rotate the set and return the completion timestamp (RFC 3339).
    pub fn rotate(&self, set: &BackupSetConfig) -> Result<String, DaemonError> {
        self.call(OP_ROTATE, set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn request_survives_the_codec() {
        let request = Request::new(OP_INIT, BackupSetConfig::named("db1", "v1"));
        let bytes = encode(&request).expect("encode");
        let decoded: Request = decode(&bytes).expect("decode");
        assert_eq!(decoded, request);
    }

    #[test]
    fn truncated_request_fails_to_decode() {
        let bytes = encode(&Request::new(OP_ROTATE, BackupSetConfig::named("db1", "v1")))
            .expect("encode");
        let err = decode::<Request>(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, DaemonError::Codec(_)), "got: {err}");
    }

    #[test]
    fn empty_response_is_no_answer() {
        assert!(Response::default().is_empty());
        assert!(!Response::ok("x").is_empty());
        assert!(!Response::error("x").is_empty());
    }

    #[test]
    fn error_field_becomes_remote_error() {
        let err = Response::error("invalid compatibility key")
            .into_result()
            .unwrap_err();
        assert!(matches!(err, DaemonError::Remote(ref msg) if msg == "invalid compatibility key"));
        assert_eq!(Response::ok("done").into_result().expect("ok"), "done");
    }

    #[test]
    fn client_from_default_settings_dials_well_known_socket() {
        let client = Client::from_settings(&Settings::default());
        assert_eq!(client.socket, PathBuf::from(paths::DAEMON_SOCKET));
        assert_eq!(client.timeout, RESPONSE_TIMEOUT);
    }

    #[test]
    fn missing_socket_means_not_running() {
        let dir = TempDir::new().expect("tempdir");
        let client = Client::new(dir.path().join("absent.sock"));
        let err = client
            .send(&Request::new(OP_LASTRUN, BackupSetConfig::named("db1", "v1")))
            .unwrap_err();
        assert!(matches!(err, DaemonError::DaemonNotRunning { .. }), "got: {err}");
    }
}
