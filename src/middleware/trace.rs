//! Per-request tracing.

use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next, REQUEST_ID};

/// Logs one line per request: method, path, status, latency.
///
/// Place it after [`RequestId`](crate::middleware::RequestId) to get the
/// request ID in the log fields.
pub struct Trace;

impl Middleware for Trace {
    fn handle<'a>(&'a self, ctx: Context, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let method = ctx.method();
            let path = ctx.path().to_owned();
            let request_id = ctx.local(REQUEST_ID).map(str::to_owned);
            let start = Instant::now();

            let resp = next.run(ctx).await;

            info!(
                %method,
                %path,
                status = resp.status_code(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                request_id = request_id.as_deref(),
                "request"
            );
            resp
        })
    }
}
