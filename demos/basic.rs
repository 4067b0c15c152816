//! Kitchen-sink rove example — routing, middleware, groups, and a mounted
//! sub-application.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/
//!   curl http://localhost:3000/john/smith
//!   curl 'http://localhost:3000/query?id=1&name=john'
//!   curl http://localhost:3000/windcards/a/b/c
//!   curl http://localhost:3000/v1
//!   curl http://localhost:3000/user/login
//!   curl http://localhost:3000/env -H 'x-forwarded-for: 203.0.113.9'
//!   curl -X POST http://localhost:3000/body \
//!        -H 'content-type: application/json' \
//!        -d '{"id":1,"name":"john"}'

use rove::middleware::{Cors, RequestId, Trace};
use rove::{BoxFuture, Context, Error, Middleware, Next, Response, Router, Server, Status};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let user_app = Router::new().get("/login", login);

    let app = Router::new()
        .with(name_tag)
        .with(RequestId)
        .with(Cors::new())
        .with(Trace)
        .options("/*", preflight)
        .get("/", hello)
        .post("/", hello_post)
        .get("/query", query)
        .get("/windcards/*", windcards)
        .get("/error", always_missing)
        .get("/:name/:surname", greet)
        .group("/v1", |g| g.with(Version("1")).get("/", v1_home))
        .group("/v2", |g| g.with(Version("2")).get("/", v2_home))
        .mount("/user", user_app)
        .get("/env", env)
        .post("/body", create_person)
        .post("/body2", create_loose);

    Server::bind("0.0.0.0:3000")
        .max_conns_per_ip(64)
        .serve(app)
        .await
        .expect("server error");
}

// A hand-written middleware: stores a value for the handler and wraps
// pre/post logic around the rest of the chain.
fn name_tag(mut ctx: Context, next: Next<'_>) -> BoxFuture<'_> {
    Box::pin(async move {
        ctx.set_local("name", "john");
        let resp = next.run(ctx).await;
        tracing::debug!(status = resp.status_code(), "chain finished");
        resp
    })
}

// Group middleware stamping the API version into a response header.
struct Version(&'static str);

impl Middleware for Version {
    fn handle<'a>(&'a self, ctx: Context, next: Next<'a>) -> BoxFuture<'a> {
        Box::pin(async move {
            let mut resp = next.run(ctx).await;
            resp.set_header("version", self.0);
            resp
        })
    }
}

// Catch-all target for CORS preflights; Cors short-circuits before this
// body ever runs.
async fn preflight(_ctx: Context) -> Status {
    Status::NoContent
}

async fn hello(ctx: Context) -> Response {
    let name = ctx.local("name").unwrap_or("world");
    Response::text(format!("GET Hello, World! {name}"))
}

async fn hello_post(_ctx: Context) -> Response {
    Response::text("POST Hello, World!")
}

async fn greet(ctx: Context) -> Response {
    let name = ctx.param("name").unwrap_or("stranger");
    Response::text(format!("Hello, {name}!"))
}

async fn query(ctx: Context) -> Response {
    let id = ctx.query("id").unwrap_or("0");
    let name = ctx.query("name").unwrap_or("");
    Response::json(format!(r#"{{"id":{id},"name":"{name}"}}"#).into_bytes())
}

async fn windcards(ctx: Context) -> Response {
    let rest = ctx.param("*").unwrap_or("");
    Response::text(format!("Windcard: {rest}"))
}

async fn always_missing(_ctx: Context) -> Result<Response, Error> {
    Err(Error::handler(Status::NotFound, "content not found"))
}

async fn v1_home(_ctx: Context) -> Response {
    Response::text("Hello v1")
}

async fn v2_home(_ctx: Context) -> Response {
    Response::text("Hello v2")
}

async fn login(_ctx: Context) -> Response {
    Response::text("Login")
}

// GET /env — echoes what the request context exposes. The peer socket
// address is the proxy's business: read forwarded headers instead.
async fn env(ctx: Context) -> Response {
    let body = format!(
        r#"{{"method":"{}","path":"{}","host":"{}","forwarded_for":"{}","request_id":"{}"}}"#,
        ctx.method(),
        ctx.path(),
        ctx.header("host").unwrap_or(""),
        ctx.header("x-forwarded-for").unwrap_or(""),
        ctx.local(rove::middleware::REQUEST_ID).unwrap_or(""),
    );
    Response::json(body.into_bytes())
}

#[derive(Debug, serde::Deserialize, serde::Serialize)]
struct Person {
    id: i64,
    name: String,
}

// POST /body — decode errors bubble out with `?` and become a 400.
async fn create_person(ctx: Context) -> Result<Response, Error> {
    let person: Person = ctx.json()?;
    Ok(Response::json(serde_json::to_vec(&person)?))
}

// POST /body2 — schemaless decode when the shape isn't known up front.
async fn create_loose(ctx: Context) -> Result<Response, Error> {
    let data: serde_json::Value = ctx.json()?;
    Ok(Response::json(serde_json::to_vec(&data)?))
}
