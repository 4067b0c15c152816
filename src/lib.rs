//! # rove
//!
//! A small HTTP framework for Rust services behind a reverse proxy:
//! a segment router, an explicit middleware chain, route groups, and
//! sub-application mounts. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! nginx handles TLS, rate limiting, slow clients, and body-size limits.
//! rove does not — by design. The proxy does proxy things. The framework
//! does framework things.
//!
//! What's left for rove — the only part that changes between applications:
//!
//! - **Routing** — literal, `:name` parameter, and trailing `*` wildcard
//!   segments; literal matches always beat parameterized ones, ties go to
//!   registration order
//! - **Middleware** — an ordered chain with an explicit [`Next`]
//!   continuation; any link can short-circuit or wrap pre/post logic around
//!   the rest
//! - **Groups and mounts** — `/v1`-style prefix scopes with shared
//!   middleware, and whole sub-routers delegated a path prefix
//! - **Graceful shutdown** — SIGTERM / Ctrl-C, drains in-flight requests
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rove::{Context, Error, Response, Router, Server, Status};
//! use rove::middleware::{RequestId, Trace};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::new()
//!         .with(RequestId)
//!         .with(Trace)
//!         .get("/users/:id", get_user)
//!         .post("/users", create_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(ctx: Context) -> Result<Response, Error> {
//!     let id = ctx.param("id").unwrap_or("unknown");
//!     Ok(Response::json(format!(r#"{{"id":"{id}"}}"#).into_bytes()))
//! }
//!
//! async fn create_user(ctx: Context) -> Result<Response, Error> {
//!     if ctx.body().is_empty() {
//!         return Err(Error::handler(Status::BadRequest, "empty body"));
//!     }
//!     Ok(Response::builder()
//!         .status(Status::Created)
//!         .header("location", "/users/99")
//!         .json(br#"{"id":99}"#.to_vec()))
//! }
//! ```

mod context;
mod error;
mod handler;
mod method;
mod response;
mod route;
mod router;
mod server;
mod status;

pub mod health;
pub mod middleware;

pub use context::Context;
pub use error::Error;
pub use handler::{BoxFuture, Handler};
pub use method::Method;
pub use middleware::{Middleware, Next};
pub use response::{ContentType, IntoResponse, Response};
pub use router::{Group, Router};
pub use server::Server;
pub use status::Status;
