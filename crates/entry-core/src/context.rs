//! Request, entry and load contexts.

use http::header::USER_AGENT;
use http::{Extensions, HeaderMap, Request};

use crate::lifecycle::TimingContext;

/// Header carrying a caller-assigned request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Unique request identifier for tracing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(pub String);

impl RequestId {
    /// Generate a new request ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Create from an existing ID string.
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Reuse the `x-request-id` header when present, otherwise generate.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Self::from_string)
            .unwrap_or_else(Self::generate)
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-request context derived from the incoming request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique request identifier.
    pub request_id: RequestId,
    /// Request URL as received (path and query for origin-form requests).
    pub url: String,
    /// The `User-Agent` header, if present and valid.
    pub user_agent: Option<String>,
    /// Timing context for observability.
    pub timing: TimingContext,
}

impl RequestContext {
    /// Build a context from an HTTP request. The body is not touched.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let headers = request.headers();
        Self {
            request_id: RequestId::from_headers(headers),
            url: request.uri().to_string(),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            timing: TimingContext::new(),
        }
    }
}

/// Context supplied by the routing framework for a document render.
#[derive(Debug, Clone, Default)]
pub struct EntryContext {
    /// Non-interactive full-page render (SPA-mode prerender).
    pub is_spa_mode: bool,
    /// Ids of the matched routes, outermost first.
    pub route_ids: Vec<String>,
}

impl EntryContext {
    /// Create an empty entry context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the render as an SPA-mode render.
    pub fn with_spa_mode(mut self, enabled: bool) -> Self {
        self.is_spa_mode = enabled;
        self
    }

    /// Add a matched route id.
    pub fn with_route(mut self, id: impl Into<String>) -> Self {
        self.route_ids.push(id.into());
        self
    }
}

/// Opaque application context passed through to the renderer.
#[derive(Debug, Clone, Default)]
pub struct LoadContext {
    values: Extensions,
}

impl LoadContext {
    /// Create an empty load context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a typed value, returning the previous one of the same type.
    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        self.values.insert(value)
    }

    /// Builder form of [`LoadContext::insert`].
    pub fn with<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.values.insert(value);
        self
    }

    /// Get a typed value.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get::<T>()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no values are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "abc-123".parse().unwrap());

        assert_eq!(RequestId::from_headers(&headers).as_str(), "abc-123");
    }

    #[test]
    fn test_request_id_blank_header_generates() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "   ".parse().unwrap());

        let id = RequestId::from_headers(&headers);
        assert_eq!(id.as_str().len(), 36);
    }

    #[test]
    fn test_request_id_generate_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }

    #[test]
    fn test_request_context_from_request() {
        let request = Request::builder()
            .uri("/products/42?color=red")
            .header(USER_AGENT, "Mozilla/5.0")
            .header(REQUEST_ID_HEADER, "req-1")
            .body(())
            .unwrap();

        let ctx = RequestContext::from_request(&request);
        assert_eq!(ctx.url, "/products/42?color=red");
        assert_eq!(ctx.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(ctx.request_id, RequestId::from_string("req-1"));
    }

    #[test]
    fn test_request_context_without_user_agent() {
        let request = Request::builder().uri("/").body(()).unwrap();

        let ctx = RequestContext::from_request(&request);
        assert!(ctx.user_agent.is_none());
    }

    #[test]
    fn test_entry_context_builder() {
        let ctx = EntryContext::new()
            .with_spa_mode(true)
            .with_route("root")
            .with_route("routes/home");

        assert!(ctx.is_spa_mode);
        assert_eq!(ctx.route_ids, vec!["root", "routes/home"]);
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Tenant(&'static str);

    #[test]
    fn test_load_context_typed_values() {
        let mut ctx = LoadContext::new().with(Tenant("acme"));
        assert_eq!(ctx.get::<Tenant>(), Some(&Tenant("acme")));
        assert!(ctx.get::<u32>().is_none());

        let previous = ctx.insert(Tenant("globex"));
        assert_eq!(previous, Some(Tenant("acme")));
        assert_eq!(ctx.len(), 1);
    }
}
