//! Per-request context.
//!
//! One [`Context`] is created per dispatch, owned exclusively by that
//! dispatch, and discarded once the response is finalized. Nothing in it is
//! shared across requests.
//!
//! Middleware communicates with handlers through the locals store, a string
//! map keyed by `&'static str`. Keys are declared where the middleware is
//! defined; the built-ins use:
//!
//! | key | set by |
//! |---|---|
//! | `"request-id"` | [`middleware::RequestId`](crate::middleware::RequestId) |

use std::collections::HashMap;

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::method::Method;

/// An incoming request plus its dispatch-scoped state.
pub struct Context {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    body: Bytes,
    params: HashMap<String, String>,
    query: Vec<(String, String)>,
    locals: HashMap<&'static str, String>,
}

impl Context {
    pub(crate) fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<&str>,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            body,
            params: HashMap::new(),
            query: query.map(parse_query).unwrap_or_default(),
            locals: HashMap::new(),
        }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// The request path as received, query string excluded.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The raw request body. rove never interprets these bytes unless you
    /// ask it to via [`Context::json`].
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/:id`, `ctx.param("id")` on `/users/42` returns
    /// `Some("42")`. A trailing wildcard binds under `"*"`: for
    /// `/files/*` on `/files/a/b`, `ctx.param("*")` returns `Some("a/b")`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns the first query-string value for `name`, percent-decoded.
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Decodes the body as JSON into `T`.
    ///
    /// Malformed JSON yields [`Error::Decode`]; well-formed JSON whose fields
    /// do not fit `T` yields [`Error::TypeMismatch`]. Both recover into a
    /// `400` when bubbled out of a handler with `?`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Stores a value for later links in the chain and the handler.
    pub fn set_local(&mut self, key: &'static str, value: impl Into<String>) {
        self.locals.insert(key, value.into());
    }

    /// Reads a value stored by an earlier middleware.
    pub fn local(&self, key: &str) -> Option<&str> {
        self.locals.get(key).map(String::as_str)
    }
}

/// Splits `a=1&b=two` into pairs, percent-decoding keys and values.
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (percent_decode(k), percent_decode(v))
        })
        .collect()
}

/// Minimal application/x-www-form-urlencoded decoding: `+` is a space,
/// `%XX` is a byte. Invalid escapes pass through untouched.
fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                match bytes.get(i + 1..i + 3).and_then(|hex| {
                    u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()
                }) {
                    Some(byte) => {
                        out.push(byte);
                        i += 3;
                    }
                    None => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn ctx(query: Option<&str>, body: &str) -> Context {
        Context::new(
            Method::Get,
            "/test",
            query,
            Vec::new(),
            Bytes::copy_from_slice(body.as_bytes()),
        )
    }

    #[derive(Debug, Deserialize)]
    struct Person {
        id: i64,
        name: String,
    }

    #[test]
    fn query_values_are_decoded() {
        let c = ctx(Some("name=john+smith&id=42&x=%2Fa"), "");
        assert_eq!(c.query("name"), Some("john smith"));
        assert_eq!(c.query("id"), Some("42"));
        assert_eq!(c.query("x"), Some("/a"));
        assert_eq!(c.query("missing"), None);
    }

    #[test]
    fn json_decode_happy_path() {
        let c = ctx(None, r#"{"id":1,"name":"john"}"#);
        let p: Person = c.json().unwrap();
        assert_eq!(p.id, 1);
        assert_eq!(p.name, "john");
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let c = ctx(None, r#"{"id":1,"#);
        assert!(matches!(c.json::<Person>(), Err(Error::Decode(_))));
    }

    #[test]
    fn wrong_field_type_is_type_mismatch() {
        let c = ctx(None, r#"{"id":"not-a-number","name":"john"}"#);
        assert!(matches!(c.json::<Person>(), Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut c = ctx(None, "");
        c.headers.push(("Content-Type".to_owned(), "application/json".to_owned()));
        assert_eq!(c.header("content-type"), Some("application/json"));
    }

    #[test]
    fn locals_round_trip() {
        let mut c = ctx(None, "");
        c.set_local("request-id", "abc");
        assert_eq!(c.local("request-id"), Some("abc"));
        assert_eq!(c.local("other"), None);
    }
}
