//! Middleware layer.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection, CORS,
//! and authentication-header inspection.
//!
//! A middleware receives the request [`Context`] and a [`Next`] continuation.
//! Calling `next.run(ctx)` hands the context to the rest of the chain and
//! resolves to the response the later links produced; returning without
//! calling it short-circuits, and the response you return is what the client
//! gets. Code on either side of the `next.run(ctx).await` gives you pre/post
//! instrumentation around everything downstream.
//!
//! Write one as a plain function:
//!
//! ```rust
//! use rove::{BoxFuture, Context, Next, Response, Status};
//!
//! fn require_token(ctx: Context, next: Next<'_>) -> BoxFuture<'_> {
//!     Box::pin(async move {
//!         if ctx.header("authorization").is_none() {
//!             // short-circuit: the handler never runs
//!             return Response::status(Status::Unauthorized);
//!         }
//!         let resp = next.run(ctx).await;
//!         // post: the response from the rest of the chain is in scope here
//!         resp
//!     })
//! }
//! ```
//!
//! Built-ins: [`Cors`], [`RequestId`], [`Trace`].

mod cors;
mod request_id;
mod trace;

pub use cors::Cors;
pub use request_id::{REQUEST_ID, RequestId};
pub use trace::Trace;

use std::sync::Arc;

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler};

/// One link in the chain.
///
/// Implement this directly for configurable middleware (see [`Cors`]), or
/// rely on the blanket impl and write a plain function returning a
/// [`BoxFuture`].
pub trait Middleware: Send + Sync + 'static {
    fn handle<'a>(&'a self, ctx: Context, next: Next<'a>) -> BoxFuture<'a>;
}

/// A shared, type-erased middleware, cloned per dispatch into the chain.
#[doc(hidden)]
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Any `fn(Context, Next) -> BoxFuture` is a middleware.
impl<F> Middleware for F
where
    F: for<'a> Fn(Context, Next<'a>) -> BoxFuture<'a> + Send + Sync + 'static,
{
    fn handle<'a>(&'a self, ctx: Context, next: Next<'a>) -> BoxFuture<'a> {
        (self)(ctx, next)
    }
}

/// The continuation handed to each middleware.
///
/// The chain is an ordered slice plus an index cursor, not nested closures:
/// `run` looks up the link at the cursor, advances it, and hands itself to
/// that link. Past the last link it invokes the terminal handler. A `Next`
/// can be consumed at most once, so a link calls its continuation zero or
/// one times — never twice.
pub struct Next<'a> {
    links: &'a [BoxedMiddleware],
    handler: &'a BoxedHandler,
    index: usize,
}

impl<'a> Next<'a> {
    pub(crate) fn new(links: &'a [BoxedMiddleware], handler: &'a BoxedHandler) -> Self {
        Self { links, handler, index: 0 }
    }

    /// Runs the remainder of the chain to completion.
    pub fn run(mut self, ctx: Context) -> BoxFuture<'a> {
        let links: &'a [BoxedMiddleware] = self.links;
        match links.get(self.index) {
            Some(link) => {
                self.index += 1;
                link.handle(ctx, self)
            }
            None => self.handler.call(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use crate::handler::Handler;
    use crate::method::Method;
    use crate::response::Response;

    fn ctx() -> Context {
        Context::new(Method::Get, "/", None, Vec::new(), Bytes::new())
    }

    fn chain_of(links: Vec<BoxedMiddleware>) -> (Vec<BoxedMiddleware>, BoxedHandler) {
        async fn terminal(_ctx: Context) -> Response {
            Response::text("terminal")
        }
        (links, terminal.into_boxed_handler())
    }

    #[tokio::test]
    async fn links_run_in_order_then_handler() {
        fn outer(mut ctx: Context, next: Next<'_>) -> BoxFuture<'_> {
            Box::pin(async move {
                ctx.set_local("order", "outer");
                next.run(ctx).await
            })
        }
        fn inner(mut ctx: Context, next: Next<'_>) -> BoxFuture<'_> {
            Box::pin(async move {
                let seen = ctx.local("order").unwrap_or("").to_owned();
                ctx.set_local("order", format!("{seen},inner"));
                assert_eq!(ctx.local("order"), Some("outer,inner"));
                next.run(ctx).await
            })
        }
        let (links, handler) = chain_of(vec![Arc::new(outer), Arc::new(inner)]);
        let resp = Next::new(&links, &handler).run(ctx()).await;
        assert_eq!(resp.body(), b"terminal");
    }

    #[tokio::test]
    async fn short_circuit_skips_handler_and_later_links() {
        static HANDLER_RUNS: AtomicUsize = AtomicUsize::new(0);

        fn gate(_ctx: Context, _next: Next<'_>) -> BoxFuture<'_> {
            Box::pin(async move { Response::text("stopped") })
        }
        fn never(_ctx: Context, _next: Next<'_>) -> BoxFuture<'_> {
            panic!("link after a short-circuit must not run");
        }
        async fn counting(_ctx: Context) -> Response {
            HANDLER_RUNS.fetch_add(1, Ordering::SeqCst);
            Response::text("handler")
        }

        let links: Vec<BoxedMiddleware> = vec![Arc::new(gate), Arc::new(never)];
        let handler = counting.into_boxed_handler();
        let resp = Next::new(&links, &handler).run(ctx()).await;

        assert_eq!(resp.body(), b"stopped");
        assert_eq!(HANDLER_RUNS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn post_code_observes_downstream_response() {
        fn stamp(ctx: Context, next: Next<'_>) -> BoxFuture<'_> {
            Box::pin(async move {
                let mut resp = next.run(ctx).await;
                let status = resp.status_code().to_string();
                resp.set_header("x-seen-status", &status);
                resp
            })
        }
        let (links, handler) = chain_of(vec![Arc::new(stamp)]);
        let resp = Next::new(&links, &handler).run(ctx()).await;
        assert_eq!(resp.header("x-seen-status"), Some("200"));
    }
}
