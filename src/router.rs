//! Request router: route table, grouping, mounting, dispatch.
//!
//! Build it once at startup, pass it to [`Server::serve`](crate::Server::serve).
//! Each registration method returns `self` so registrations chain naturally.
//! After setup the router is immutable and shared across connection tasks
//! behind an `Arc` — matching never takes a lock.
//!
//! ```rust
//! use rove::{Context, Method, Response, Router, middleware::Trace};
//!
//! async fn home(_ctx: Context) -> Response { Response::text("home") }
//! async fn login(_ctx: Context) -> Response { Response::text("login") }
//! async fn v1_home(_ctx: Context) -> Response { Response::text("v1") }
//!
//! let user = Router::new().get("/login", login);
//!
//! let app = Router::new()
//!     .with(Trace)
//!     .get("/", home)
//!     .group("/v1", |g| g.get("/", v1_home))
//!     .mount("/user", user);
//! ```

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::context::Context;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::response::{IntoResponse, Response};
use crate::route::{Route, split_path};

/// The application router.
///
/// Owns an ordered route table, the global middleware list, and any mounted
/// sub-routers. All three are fixed at setup time.
pub struct Router {
    routes: Vec<Route>,
    links: Vec<BoxedMiddleware>,
    mounts: Vec<(Vec<String>, Router)>,
}

/// A route resolved for one request: the handler, its parameter bindings,
/// and the full middleware chain (global, outer-to-inner through mounts,
/// then group middleware).
struct Resolved {
    handler: BoxedHandler,
    params: HashMap<String, String>,
    links: Vec<BoxedMiddleware>,
}

/// Match specificity, compared lexicographically: more literal segments
/// before the first parameter or wildcard, then fewer parameter/wildcard
/// segments overall. An exact literal pattern therefore outranks a wildcard
/// over the same prefix regardless of registration order.
type Score = (usize, Reverse<usize>);

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new(), links: Vec::new(), mounts: Vec::new() }
    }

    /// Appends a global middleware. Runs for every route of this router (and
    /// its mounted sub-routers) in the order added.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.links.push(Arc::new(middleware));
        self
    }

    /// Registers a handler for a method + pattern pair. Returns `self` for
    /// chaining.
    ///
    /// Patterns use `:name` for parameters and a trailing `*` for wildcards —
    /// `ctx.param("name")` / `ctx.param("*")` retrieve them.
    ///
    /// # Panics
    ///
    /// Panics on a malformed pattern or a duplicate `(method, pattern)`
    /// registration. Both are setup-time bugs; startup should not proceed.
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        self.register(method, pattern, handler, Vec::new());
        self
    }

    /// Fallible form of [`Router::on`]: `DuplicateRoute` and `InvalidPattern`
    /// come back as values instead of panics.
    pub fn try_on(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
    ) -> Result<(), Error> {
        self.try_register(method, pattern, handler.into_boxed_handler(), Vec::new())
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, pattern, handler)
    }

    pub fn head(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Head, pattern, handler)
    }

    pub fn options(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Options, pattern, handler)
    }

    /// Opens a registration scope: every route registered inside the closure
    /// gets `prefix` prepended to its pattern and the group's middleware
    /// inserted after the global middleware.
    ///
    /// A [`Group`] owns no routes — it writes into this router's table:
    ///
    /// ```rust
    /// # use rove::{BoxFuture, Context, Next, Response, Router};
    /// # async fn v1_home(_ctx: Context) -> Response { Response::text("v1") }
    /// # fn versioned(mut ctx: Context, next: Next<'_>) -> BoxFuture<'_> {
    /// #     Box::pin(async move { ctx.set_local("version", "1"); next.run(ctx).await })
    /// # }
    /// let app = Router::new()
    ///     .group("/v1", |g| g.with(versioned).get("/", v1_home));
    /// ```
    ///
    /// Add the group's middleware before registering its routes: each route
    /// snapshots the middleware list at registration time.
    pub fn group(self, prefix: &str, scope: impl FnOnce(Group) -> Group) -> Self {
        let group = scope(Group {
            router: self,
            prefix: prefix.to_owned(),
            links: Vec::new(),
        });
        group.router
    }

    /// Delegates every path under `prefix` to `sub`, with the prefix
    /// stripped before the sub-router matches. The sub-router's own global
    /// middleware runs in addition to this router's, nested inside it.
    ///
    /// The relationship is static: mount at setup time, never after.
    ///
    /// # Panics
    ///
    /// Panics if `prefix` contains parameter or wildcard segments — mount
    /// prefixes are literal.
    pub fn mount(mut self, prefix: &str, sub: Router) -> Self {
        let segments: Vec<String> = split_path(prefix).iter().map(|s| (*s).to_owned()).collect();
        if segments.iter().any(|s| s.starts_with(':') || s == "*") {
            panic!("invalid mount prefix `{prefix}`: must be literal segments");
        }
        self.mounts.push((segments, sub));
        self
    }

    fn register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: impl Handler,
        links: Vec<BoxedMiddleware>,
    ) {
        self.try_register(method, pattern, handler.into_boxed_handler(), links)
            .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
    }

    fn try_register(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
        links: Vec<BoxedMiddleware>,
    ) -> Result<(), Error> {
        let route = Route::new(method, pattern, handler, links)?;
        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern == route.pattern)
        {
            return Err(Error::DuplicateRoute { method, pattern: route.pattern });
        }
        self.routes.push(route);
        Ok(())
    }

    /// Routes one request through the table and the middleware chain.
    ///
    /// This is the whole inbound contract: `(method, path, headers, body)`
    /// in, [`Response`] out. [`Server`](crate::Server) calls it per request;
    /// tests call it directly, no socket needed. `path` may carry a query
    /// string. An unmatched request resolves to `404` — no request-time
    /// failure escapes this function.
    pub async fn dispatch(
        &self,
        method: Method,
        path: &str,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Response {
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };
        let segments = split_path(path);

        let Some((resolved, _)) = self.resolve(method, &segments) else {
            return Error::NoMatch.into_response();
        };

        let mut ctx = Context::new(method, path, query, headers, body);
        ctx.set_params(resolved.params);

        Next::new(&resolved.links, &resolved.handler).run(ctx).await
    }

    /// Finds the best match for `segments`, recursing through mounts.
    ///
    /// Candidates are ranked by [`Score`]; a mount's prefix segments count
    /// toward its sub-match's literal run. On a full tie the locally
    /// registered route beats any mount, and earlier registration beats
    /// later.
    fn resolve(&self, method: Method, segments: &[&str]) -> Option<(Resolved, Score)> {
        let mut best: Option<(Resolved, Score)> = None;

        for route in &self.routes {
            if route.method != method {
                continue;
            }
            let Some(params) = route.matches(segments) else { continue };
            let score = (route.literal_prefix, Reverse(route.non_literals));
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                let mut links = self.links.clone();
                links.extend(route.links.iter().cloned());
                best = Some((Resolved { handler: route.handler(), params, links }, score));
            }
        }

        for (prefix, sub) in &self.mounts {
            if segments.len() < prefix.len()
                || !prefix.iter().zip(segments).all(|(p, s)| p.as_str() == *s)
            {
                continue;
            }
            let Some((mut resolved, (sub_literals, sub_non_literals))) =
                sub.resolve(method, &segments[prefix.len()..])
            else {
                continue;
            };
            let score = (prefix.len() + sub_literals, sub_non_literals);
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                let mut links = self.links.clone();
                links.append(&mut resolved.links);
                resolved.links = links;
                best = Some((resolved, score));
            }
        }

        best
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// A registration scope over a [`Router`], created by [`Router::group`].
///
/// Prefixes every registered path and prepends its middleware list. Not a
/// runtime entity: it owns no routes and dissolves back into the router when
/// the `group` closure returns.
pub struct Group {
    router: Router,
    prefix: String,
    links: Vec<BoxedMiddleware>,
}

impl Group {
    /// Appends a middleware for routes registered after this call.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.links.push(Arc::new(middleware));
        self
    }

    /// Registers under the group's prefix with the group's middleware.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Router::on`].
    pub fn on(mut self, method: Method, pattern: &str, handler: impl Handler) -> Self {
        let full = format!("{}/{}", self.prefix, pattern);
        self.router.register(method, &full, handler, self.links.clone());
        self
    }

    pub fn get(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Get, pattern, handler)
    }

    pub fn post(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Post, pattern, handler)
    }

    pub fn put(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Put, pattern, handler)
    }

    pub fn patch(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Patch, pattern, handler)
    }

    pub fn delete(self, pattern: &str, handler: impl Handler) -> Self {
        self.on(Method::Delete, pattern, handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn named(ctx: Context) -> Response {
        Response::text(ctx.path().to_owned())
    }

    fn dispatch_get(router: &Router, path: &str) -> Response {
        futures_block(router.dispatch(Method::Get, path, Vec::new(), Bytes::new()))
    }

    // Small current-thread executor so resolve-level tests stay sync-looking.
    fn futures_block<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut router = Router::new().get("/users/:id", named);
        let err = router.try_on(Method::Get, "/users/:id", named);
        assert!(matches!(err, Err(Error::DuplicateRoute { .. })));
        // the original registration still answers
        let resp = dispatch_get(&router, "/users/1");
        assert_eq!(resp.status_code(), 200);
    }

    #[test]
    fn normalization_catches_disguised_duplicates() {
        let mut router = Router::new().get("/a/b", named);
        let err = router.try_on(Method::Get, "/a//b/", named);
        assert!(matches!(err, Err(Error::DuplicateRoute { .. })));
    }

    #[test]
    fn same_pattern_different_method_is_fine() {
        let mut router = Router::new().get("/users", named);
        assert!(router.try_on(Method::Post, "/users", named).is_ok());
    }

    #[test]
    fn literal_beats_param_beats_wildcard() {
        async fn tag_literal(_ctx: Context) -> Response { Response::text("literal") }
        async fn tag_param(_ctx: Context) -> Response { Response::text("param") }
        async fn tag_wild(_ctx: Context) -> Response { Response::text("wild") }

        // registration order deliberately puts the literal route last; the
        // param route precedes the wildcard because both score zero literals
        // and registration order breaks that tie
        let router = Router::new()
            .get("/:name", tag_param)
            .get("/*", tag_wild)
            .get("/query", tag_literal);

        assert_eq!(dispatch_get(&router, "/query").body(), b"literal");
        assert_eq!(dispatch_get(&router, "/other").body(), b"param");
        assert_eq!(dispatch_get(&router, "/a/b").body(), b"wild");
    }

    #[test]
    fn registration_order_breaks_remaining_ties() {
        async fn first(_ctx: Context) -> Response { Response::text("first") }
        async fn second(_ctx: Context) -> Response { Response::text("second") }

        let router = Router::new()
            .get("/:a/x", first)
            .get("/:b/x", second);

        // identical shape (one leading param, one literal); the earlier
        // registration wins
        assert_eq!(dispatch_get(&router, "/k/x").body(), b"first");
    }

    #[test]
    fn fewer_non_literals_wins_equal_literal_run() {
        async fn loose(_ctx: Context) -> Response { Response::text("loose") }
        async fn tight(_ctx: Context) -> Response { Response::text("tight") }

        // both start with a parameter; the pattern with fewer non-literal
        // segments wins even though it was registered later
        let router = Router::new()
            .get("/:a/:c", loose)
            .get("/:b/x", tight);

        assert_eq!(dispatch_get(&router, "/k/x").body(), b"tight");
        assert_eq!(dispatch_get(&router, "/k/y").body(), b"loose");
    }

    #[test]
    fn exact_literal_beats_earlier_wildcard_on_same_prefix() {
        async fn exact(_ctx: Context) -> Response { Response::text("exact") }
        async fn wild(_ctx: Context) -> Response { Response::text("wild") }

        // the wildcard matches /query too (empty remainder) and was
        // registered first — the exact literal route must still win
        let router = Router::new()
            .get("/query/*", wild)
            .get("/query", exact);

        assert_eq!(dispatch_get(&router, "/query").body(), b"exact");
        assert_eq!(dispatch_get(&router, "/query/deep").body(), b"wild");
    }

    #[test]
    fn root_literal_beats_earlier_catch_all() {
        async fn root(_ctx: Context) -> Response { Response::text("root") }
        async fn wild(_ctx: Context) -> Response { Response::text("wild") }

        let router = Router::new()
            .get("/*", wild)
            .get("/", root);

        assert_eq!(dispatch_get(&router, "/").body(), b"root");
        assert_eq!(dispatch_get(&router, "/anything").body(), b"wild");
    }

    #[test]
    fn mounted_router_matches_with_prefix_stripped() {
        async fn login(ctx: Context) -> Response {
            assert_eq!(ctx.path(), "/user/login");
            Response::text("login")
        }
        let sub = Router::new().get("/login", login);
        let app = Router::new().mount("/user", sub);

        assert_eq!(dispatch_get(&app, "/user/login").body(), b"login");
        assert_eq!(dispatch_get(&app, "/login").status_code(), 404);
    }

    #[test]
    fn local_route_beats_mount_on_tie() {
        async fn local(_ctx: Context) -> Response { Response::text("local") }
        async fn mounted(_ctx: Context) -> Response { Response::text("mounted") }

        let sub = Router::new().get("/ping", mounted);
        let app = Router::new()
            .mount("/api", sub)
            .get("/api/ping", local);

        // both match /api/ping with two literal segments; local wins
        assert_eq!(dispatch_get(&app, "/api/ping").body(), b"local");
    }

    #[test]
    fn deeper_literal_mount_beats_shallower_local_param() {
        async fn local(_ctx: Context) -> Response { Response::text("local") }
        async fn mounted(_ctx: Context) -> Response { Response::text("mounted") }

        let sub = Router::new().get("/login", mounted);
        let app = Router::new()
            .get("/user/:page", local)
            .mount("/user", sub);

        // mount chain matches two literals, the local route only one
        assert_eq!(dispatch_get(&app, "/user/login").body(), b"mounted");
        assert_eq!(dispatch_get(&app, "/user/profile").body(), b"local");
    }

    #[test]
    fn unknown_path_is_not_found() {
        let router = Router::new().get("/only", named);
        assert_eq!(dispatch_get(&router, "/missing").status_code(), 404);
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn chained_duplicate_panics_at_setup() {
        let _ = Router::new().get("/dup", named).get("/dup", named);
    }
}
