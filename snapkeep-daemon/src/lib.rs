//! snapkeep daemon: socket server in front of the retention engine, plus the client.

pub mod dispatch;
mod error;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod server;

pub use error::DaemonError;
pub use protocol::{Client, Request, Response, OP_INIT, OP_LASTRUN, OP_ROTATE};
pub use runtime::{run, start_blocking};
