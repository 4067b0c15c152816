//! Cross-origin resource sharing.

use crate::context::Context;
use crate::handler::BoxFuture;
use crate::method::Method;
use crate::middleware::{Middleware, Next};
use crate::response::Response;
use crate::status::Status;

/// CORS middleware.
///
/// `OPTIONS` preflights are answered directly with `204 No Content` and the
/// configured allow-headers — the rest of the chain never runs for them.
/// Every other response gets `access-control-allow-origin` appended on the
/// way out.
///
/// The chain only runs for requests that resolve to a route, so a preflight
/// still needs an `OPTIONS` route to land on; a catch-all covers every
/// preflighted path (the handler body never executes — this middleware
/// short-circuits first):
///
/// ```rust
/// use rove::{Context, Router, Status, middleware::Cors};
///
/// async fn preflight(_ctx: Context) -> Status {
///     Status::NoContent
/// }
///
/// let app = Router::new()
///     .with(Cors::new().allow_origin("https://example.com"))
///     .options("/*", preflight);
/// ```
pub struct Cors {
    allow_origin: String,
    allow_methods: String,
    allow_headers: String,
}

impl Cors {
    /// Permissive defaults: any origin, the standard method set,
    /// `content-type` and `authorization` headers.
    pub fn new() -> Self {
        Self {
            allow_origin: "*".to_owned(),
            allow_methods: "GET, POST, PUT, PATCH, DELETE, HEAD, OPTIONS".to_owned(),
            allow_headers: "content-type, authorization".to_owned(),
        }
    }

    pub fn allow_origin(mut self, origin: impl Into<String>) -> Self {
        self.allow_origin = origin.into();
        self
    }

    pub fn allow_methods(mut self, methods: impl Into<String>) -> Self {
        self.allow_methods = methods.into();
        self
    }

    pub fn allow_headers(mut self, headers: impl Into<String>) -> Self {
        self.allow_headers = headers.into();
        self
    }
}

impl Default for Cors {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for Cors {
    fn handle<'a>(&'a self, ctx: Context, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            if ctx.method() == Method::Options {
                let mut resp = Response::status(Status::NoContent);
                resp.set_header("access-control-allow-origin", &self.allow_origin);
                resp.set_header("access-control-allow-methods", &self.allow_methods);
                resp.set_header("access-control-allow-headers", &self.allow_headers);
                return resp;
            }

            let mut resp = next.run(ctx).await;
            resp.set_header("access-control-allow-origin", &self.allow_origin);
            resp
        })
    }
}
