//! Radix-tree route resolution.
//!
//! One tree per HTTP method. A successful lookup yields the handler and a
//! [`Route`]: the matched pattern plus its parameters. The dispatcher owns the
//! route for the lifetime of the request; readers only hold a weak reference.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;
use percent_encoding::percent_decode_str;

use crate::handler::{BoxedHandler, Handler};

/// The outcome of route matching for one request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Route {
    method: Method,
    pattern: String,
    params: HashMap<String, String>,
}

impl Route {
    pub fn new(method: Method, pattern: impl Into<String>) -> Self {
        Self { method, pattern: pattern.into(), params: HashMap::new() }
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method { &self.method }

    /// The registered pattern, e.g. `/users/{id}`.
    pub fn pattern(&self) -> &str { &self.pattern }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// For a route `/users/{id}` matched against `/users/42`, `param("id")` is `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
pub struct Router {
    routes: HashMap<Method, MatchitRouter<(Arc<str>, BoxedHandler)>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax. Requests are matched in their
    /// percent-encoded form, so static segments are written encoded too:
    ///
    /// ```rust,no_run
    /// # use inbound::{Request, Router};
    /// # use http::Method;
    /// # async fn get_user(_: Request) -> &'static str { "" }
    /// # async fn create_user(_: Request) -> &'static str { "" }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid pattern or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, (Arc::from(path), handler.into_boxed_handler()))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Resolves the percent-encoded `path` for `method`.
    ///
    /// Matching runs on the encoded form so `%2F` never splits a segment;
    /// parameter values are decoded afterwards.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, Route)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let (pattern, handler) = matched.value;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), percent_decode_str(v).decode_utf8_lossy().into_owned()))
            .collect();
        let route = Route::new(method.clone(), pattern.to_string()).with_params(params);
        Some((Arc::clone(handler), route))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Request;

    async fn noop(_: Request) -> &'static str { "" }

    #[test]
    fn lookup_yields_pattern_and_params() {
        let router = Router::new()
            .on(Method::GET, "/users/{id}", noop)
            .on(Method::GET, "/users", noop);

        let (_, route) = router.lookup(&Method::GET, "/users/42").unwrap();
        assert_eq!(route.pattern(), "/users/{id}");
        assert_eq!(route.method(), &Method::GET);
        assert_eq!(route.param("id"), Some("42"));
        assert_eq!(route.param("missing"), None);

        let (_, route) = router.lookup(&Method::GET, "/users").unwrap();
        assert!(route.params().is_empty());
    }

    #[test]
    fn encoded_slash_stays_inside_its_segment() {
        let router = Router::new().on(Method::GET, "/files/{name}", noop);

        let (_, route) = router.lookup(&Method::GET, "/files/a%2Fb").unwrap();
        assert_eq!(route.param("name"), Some("a/b"));

        let (_, route) = router.lookup(&Method::GET, "/files/caf%C3%A9%20menu").unwrap();
        assert_eq!(route.param("name"), Some("café menu"));

        assert!(router.lookup(&Method::GET, "/files/a/b").is_none());
    }

    #[test]
    fn methods_have_separate_trees() {
        let router = Router::new().on(Method::POST, "/users", noop);
        assert!(router.lookup(&Method::POST, "/users").is_some());
        assert!(router.lookup(&Method::GET, "/users").is_none());
        assert!(router.lookup(&Method::POST, "/nope").is_none());
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let _ = Router::new()
            .on(Method::GET, "/users/{id}", noop)
            .on(Method::GET, "/users/{name}", noop);
    }
}
