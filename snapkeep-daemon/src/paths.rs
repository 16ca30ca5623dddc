//! Well-known filesystem locations of the daemon.

use std::path::PathBuf;

use snapkeep_core::Settings;

pub const DAEMON_SOCKET: &str = "/tmp/snapkeep.sock";

/// Socket the daemon binds and clients dial: the configured path, or
/// [`DAEMON_SOCKET`] when settings leave it unset.
pub fn socket_path(settings: &Settings) -> PathBuf {
    settings
        .socket_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DAEMON_SOCKET))
}
