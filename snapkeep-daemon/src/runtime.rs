//! Daemon entrypoint: runtime, tracing and shutdown.

use std::fs;
use std::sync::Arc;

use snapkeep_core::{Rotator, Settings};

use crate::dispatch;
use crate::error::{io_err, DaemonError};
use crate::paths;
use crate::server;

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(settings: Settings) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(settings))
}

/// Serve requests until ctrl-c or SIGTERM, then remove the socket.
pub async fn run(settings: Settings) -> Result<(), DaemonError> {
    let rotator = Arc::new(Rotator::new(settings.clone())?);
    let socket = paths::socket_path(&settings);
    let listener = server::bind(&socket)?;

    tracing::info!(
        socket = %socket.display(),
        backup_dir = %settings.backup_dir.display(),
        template = %settings.time_template,
        "daemon listening",
    );

    let result = server::serve(listener, dispatch::handler(rotator), shutdown_signal()).await;

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    tracing::info!("daemon stopped");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "SIGTERM handler failed");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl-c, shutting down daemon"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down daemon"),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}
