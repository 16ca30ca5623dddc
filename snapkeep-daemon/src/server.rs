//! Unix socket listener: one task per connection, one request per task.

use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::error::{io_err, DaemonError};
use crate::protocol::{decode, encode, Request, Response, MAX_MESSAGE_BYTES};

/// Maps one decoded request to its response. Runs on a blocking thread.
pub type Handler = Arc<dyn Fn(Request) -> Response + Send + Sync>;

/// How long a client may take to deliver its request.
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Bind `socket`, replacing a stale socket file, and open it to all local users.
pub fn bind(socket: &Path) -> Result<UnixListener, DaemonError> {
    if let Some(parent) = socket.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    prepare_socket_for_bind(socket)?;
    let listener = UnixListener::bind(socket).map_err(|e| io_err(socket, e))?;
    set_socket_permissions(socket)?;
    Ok(listener)
}

/// Accept connections until `shutdown` resolves.
///
/// Accept failures are logged and the loop keeps going; per-connection
/// failures never stop the server.
pub async fn serve<F>(
    listener: UnixListener,
    handler: Handler,
    shutdown: F,
) -> Result<(), DaemonError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _)) => stream,
                    Err(err) => {
                        tracing::warn!(error = %err, "accept failed");
                        continue;
                    }
                };
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, handler).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }
    Ok(())
}

async fn handle_connection(stream: UnixStream, handler: Handler) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();

    let mut received = Vec::new();
    let read = tokio::time::timeout(
        REQUEST_READ_TIMEOUT,
        reader.take(MAX_MESSAGE_BYTES).read_to_end(&mut received),
    )
    .await;

    let response = match read {
        Err(_) => Response::error("timed out reading request"),
        Ok(Err(err)) => return Err(io_err("daemon socket read", err)),
        Ok(Ok(_)) => match decode::<Request>(&received) {
            Ok(request) => {
                tracing::debug!(op = %request.op, name = %request.set.name, "request received");
                tokio::task::spawn_blocking(move || handler(request))
                    .await
                    .map_err(|err| DaemonError::Protocol(format!("handler join error: {err}")))?
            }
            Err(err) => {
                tracing::warn!(error = %err, bytes = received.len(), "malformed request");
                Response::error(format!("malformed request: {err}"))
            }
        },
    };

    let payload = encode(&response)?;
    writer
        .write_all(&payload)
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .shutdown()
        .await
        .map_err(|e| io_err("daemon socket shutdown", e))?;
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if socket.symlink_metadata().is_err() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::SocketInUse {
                socket: socket.to_path_buf(),
            });
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777)).map_err(|e| io_err(path, e))
}
