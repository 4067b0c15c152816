//! Per-request ID injection.

use uuid::Uuid;

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::middleware::{Middleware, Next};

/// Locals key under which the generated ID is stored.
pub const REQUEST_ID: &str = "request-id";

/// Tags every request with a UUID v4.
///
/// The ID is stored in the context locals under [`REQUEST_ID`] so handlers
/// and later middleware can correlate log lines, and echoed back to the
/// client in an `x-request-id` response header. An `x-request-id` the
/// response already carries is left alone.
pub struct RequestId;

impl Middleware for RequestId {
    fn handle<'a>(&'a self, mut ctx: Context, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let id = Uuid::new_v4().to_string();
            ctx.set_local(REQUEST_ID, id.clone());

            let mut resp = next.run(ctx).await;
            if resp.header("x-request-id").is_none() {
                resp.set_header("x-request-id", &id);
            }
            resp
        })
    }
}
