//! Routes requests to the retention engine and renders results as text.

use std::sync::Arc;

use snapkeep_core::{format_elapsed, Rotator};

use crate::protocol::{Request, Response, OP_INIT, OP_LASTRUN, OP_ROTATE};
use crate::server::Handler;

pub fn dispatch(rotator: &Rotator, request: &Request) -> Response {
    let set = &request.set;
    let result = match request.op.as_str() {
        OP_LASTRUN => rotator.time_since_last_run(set).map(format_elapsed),
        OP_INIT => rotator
            .initialize(set)
            .map(|working| working.display().to_string()),
        OP_ROTATE => match rotator.rotate(set) {
            Ok(report) => Ok(report.completed_at.to_rfc3339()),
            Err(err) => return Response::error(format!("error during rotation: {err}")),
        },
        other => return Response::error(format!("unknown request '{other}'")),
    };

    match result {
        Ok(text) => Response::ok(text),
        Err(err) => Response::error(err.to_string()),
    }
}

/// Socket handler backed by `rotator`.
pub fn handler(rotator: Arc<Rotator>) -> Handler {
    Arc::new(move |request: Request| {
        let response = dispatch(&rotator, &request);
        if !response.error.is_empty() {
            tracing::warn!(
                op = %request.op,
                name = %request.set.name,
                error = %response.error,
                "request failed",
            );
        }
        response
    })
}
