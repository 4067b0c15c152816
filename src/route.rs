//! Route patterns and the segment matcher.
//!
//! A pattern is an ordered sequence of segment descriptors:
//!
//! - a **literal** (`/users`) matches only identical text, case-sensitively;
//! - a **parameter** (`/:id`) matches any single non-empty segment and binds
//!   its name to the matched text;
//! - a trailing **wildcard** (`/*`) matches the remainder of the path, zero
//!   or more segments included, and binds it under the reserved name `*`.
//!
//! When several patterns match the same path the one with the longer run of
//! literal segments before its first parameter wins; on equal literal runs
//! the one with fewer parameter/wildcard segments wins, so an exact literal
//! pattern always beats a wildcard over the same prefix (`/query` beats
//! `/query/*` for `GET /query`); if still tied, the one registered first
//! wins.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::BoxedHandler;
use crate::method::Method;
use crate::middleware::BoxedMiddleware;

/// Name under which a wildcard binding is stored in the params map.
pub(crate) const WILDCARD: &str = "*";

/// One descriptor in a parsed route pattern.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Segment {
    Literal(String),
    Param(String),
    Wildcard,
}

/// One registered route: the parsed pattern, its handler, and the middleware
/// the enclosing group contributed at registration time.
pub(crate) struct Route {
    pub(crate) method: Method,
    pub(crate) pattern: String,
    pub(crate) segments: Vec<Segment>,
    pub(crate) literal_prefix: usize,
    pub(crate) non_literals: usize,
    pub(crate) handler: BoxedHandler,
    pub(crate) links: Vec<BoxedMiddleware>,
}

impl Route {
    pub(crate) fn new(
        method: Method,
        pattern: &str,
        handler: BoxedHandler,
        links: Vec<BoxedMiddleware>,
    ) -> Result<Self, Error> {
        let segments = parse(pattern)?;
        let literal_prefix = segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count();
        let non_literals = segments
            .iter()
            .filter(|s| !matches!(s, Segment::Literal(_)))
            .count();
        Ok(Self {
            method,
            pattern: normalize(&segments),
            segments,
            literal_prefix,
            non_literals,
            handler,
            links,
        })
    }

    /// Matches `path_segments` against this route's pattern, returning the
    /// extracted parameter bindings on success.
    pub(crate) fn matches(&self, path_segments: &[&str]) -> Option<HashMap<String, String>> {
        let mut params = HashMap::new();
        let mut remaining = path_segments;

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    let (head, rest) = remaining.split_first()?;
                    if *head != text.as_str() {
                        return None;
                    }
                    remaining = rest;
                }
                Segment::Param(name) => {
                    let (head, rest) = remaining.split_first()?;
                    params.insert(name.clone(), (*head).to_owned());
                    remaining = rest;
                }
                Segment::Wildcard => {
                    debug_assert_eq!(i, self.segments.len() - 1);
                    params.insert(WILDCARD.to_owned(), remaining.join("/"));
                    return Some(params);
                }
            }
        }

        if remaining.is_empty() { Some(params) } else { None }
    }

    pub(crate) fn handler(&self) -> BoxedHandler {
        Arc::clone(&self.handler)
    }
}

/// Splits a request path into non-empty segments. `/a//b/` and `/a/b` are
/// the same path.
pub(crate) fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parses a pattern string into segment descriptors.
fn parse(pattern: &str) -> Result<Vec<Segment>, Error> {
    let raw: Vec<&str> = split_path(pattern);
    let mut segments = Vec::with_capacity(raw.len());

    for (i, token) in raw.iter().enumerate() {
        let segment = if *token == "*" {
            if i != raw.len() - 1 {
                return Err(Error::InvalidPattern {
                    pattern: pattern.to_owned(),
                    reason: "wildcard must be the final segment",
                });
            }
            Segment::Wildcard
        } else if let Some(name) = token.strip_prefix(':') {
            if name.is_empty() {
                return Err(Error::InvalidPattern {
                    pattern: pattern.to_owned(),
                    reason: "parameter segment has no name",
                });
            }
            Segment::Param(name.to_owned())
        } else {
            Segment::Literal((*token).to_owned())
        };
        segments.push(segment);
    }

    Ok(segments)
}

/// Rebuilds the canonical pattern string used for duplicate detection:
/// leading slash, single slashes, no trailing slash.
fn normalize(segments: &[Segment]) -> String {
    if segments.is_empty() {
        return "/".to_owned();
    }
    let mut out = String::new();
    for segment in segments {
        out.push('/');
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Param(name) => {
                out.push(':');
                out.push_str(name);
            }
            Segment::Wildcard => out.push('*'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Handler;
    use crate::response::Response;

    fn route(pattern: &str) -> Route {
        async fn noop(_ctx: crate::Context) -> Response {
            Response::text("")
        }
        Route::new(Method::Get, pattern, noop.into_boxed_handler(), Vec::new()).unwrap()
    }

    #[test]
    fn literal_match_is_exact() {
        let r = route("/query");
        assert!(r.matches(&["query"]).is_some());
        assert!(r.matches(&["Query"]).is_none());
        assert!(r.matches(&["query", "more"]).is_none());
    }

    #[test]
    fn params_bind_each_segment() {
        let r = route("/:name/:surname");
        let params = r.matches(&["john", "smith"]).unwrap();
        assert_eq!(params["name"], "john");
        assert_eq!(params["surname"], "smith");
        assert!(r.matches(&["john"]).is_none());
    }

    #[test]
    fn wildcard_takes_remainder_including_empty() {
        let r = route("/windcards/*");
        assert_eq!(r.matches(&["windcards", "a", "b", "c"]).unwrap()[WILDCARD], "a/b/c");
        assert_eq!(r.matches(&["windcards"]).unwrap()[WILDCARD], "");
        assert!(r.matches(&["other"]).is_none());
    }

    #[test]
    fn literal_prefix_counts_leading_literals_only() {
        assert_eq!(route("/a/b/:x/c").literal_prefix, 2);
        assert_eq!(route("/:x").literal_prefix, 0);
        assert_eq!(route("/a/b").literal_prefix, 2);
        assert_eq!(route("/*").literal_prefix, 0);
    }

    #[test]
    fn non_literals_count_params_and_wildcards_anywhere() {
        assert_eq!(route("/a/b").non_literals, 0);
        assert_eq!(route("/a/*").non_literals, 1);
        assert_eq!(route("/a/:x/c").non_literals, 1);
        assert_eq!(route("/:x/:y").non_literals, 2);
    }

    #[test]
    fn pattern_normalization_strips_redundant_slashes() {
        assert_eq!(route("/a//b/").pattern, "/a/b");
        assert_eq!(route("/").pattern, "/");
        assert_eq!(route("/:id/*").pattern, "/:id/*");
    }

    #[test]
    fn wildcard_must_be_final() {
        async fn noop(_ctx: crate::Context) -> Response {
            Response::text("")
        }
        let err = Route::new(Method::Get, "/a/*/b", noop.into_boxed_handler(), Vec::new());
        assert!(matches!(err, Err(Error::InvalidPattern { .. })));
    }
}
