//! The standard interceptor set.
//!
//! Request side: authentication header, message signing, logging. Response
//! side: logging, structured error extraction. Ordering rules live with the
//! pipeline; the interceptors themselves are pure request/response
//! transformers (logging observes, it never mutates).
//!
//! Logging never prints credentials: a fixed redaction list covers the
//! authentication and signature headers plus anything that smells like a
//! secret, and bodies are truncated. Output goes through the [`LogSink`]
//! seam; the logging framework itself is the embedder's choice, the
//! default routes to the `log` facade.

use {
    super::message::{HttpRequest, HttpResponse},
    crate::{
        clock::Clock,
        error::Error,
        signature::{
            base::{default_covered_components, CoveredComponent, SignatureParams},
            engine::{attach, sign_request},
            keys::KeyMaterial,
        },
    },
    serde::Deserialize,
    std::{fmt, sync::Arc},
};

/// Replacement text for redacted header values, in logs and messages alike.
pub const REDACTED: &str = "***REDACTED***";

/// Marker appended when a logged body is cut at the byte limit.
const TRUNCATED: &str = "…[truncated]";

/// Default body-logging byte limit.
const DEFAULT_MAX_BODY_BYTES: usize = 4096;

/// Headers that always redact, regardless of content.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "signature",
    "signature-input",
    "content-digest",
];

/// Name fragments that mark a header as sensitive.
const SENSITIVE_FRAGMENTS: &[&str] = &["token", "secret", "key", "password"];

/// True when a (lowercase) header name must never be logged verbatim.
pub(crate) fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS.contains(&name)
        || SENSITIVE_FRAGMENTS.iter().any(|f| name.contains(f))
}

/// Authorization schemes the authentication interceptor can attach.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    Bearer,
    Gnap,
    Basic,
    Custom(String),
}

impl AuthScheme {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Bearer => "Bearer",
            Self::Gnap => "GNAP",
            Self::Basic => "Basic",
            Self::Custom(name) => name,
        }
    }

    /// Render the full `authorization` header value for a credential.
    pub fn header_value(&self, credential: &str) -> String {
        format!("{} {credential}", self.as_str())
    }
}

/// Sets (or replaces) the `authorization` header with a fixed credential.
#[derive(Clone)]
pub struct AuthenticationInterceptor {
    scheme: AuthScheme,
    credential: String,
}

impl AuthenticationInterceptor {
    pub fn new(scheme: AuthScheme, credential: impl Into<String>) -> Self {
        Self {
            scheme,
            credential: credential.into(),
        }
    }

    pub fn apply(&self, request: HttpRequest) -> HttpRequest {
        request.with_header_replaced("authorization", self.scheme.header_value(&self.credential))
    }
}

impl fmt::Debug for AuthenticationInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationInterceptor")
            .field("scheme", &self.scheme)
            .field("credential", &REDACTED)
            .finish()
    }
}

/// Signs the request and attaches `Signature-Input` / `Signature`.
///
/// Covered-set precedence: a set attached to the request itself
/// ([`HttpRequest::with_covered_components`]) wins, then this interceptor's
/// configured override, then the per-request default: `@method`,
/// `@target-uri`, plus `content-digest` and `authorization` when those
/// headers are present. This is why authentication must run before signing
/// in any pipeline that covers `authorization`.
#[derive(Clone)]
pub struct SigningInterceptor {
    key: Arc<KeyMaterial>,
    clock: Arc<dyn Clock>,
    components: Option<Vec<CoveredComponent>>,
}

impl SigningInterceptor {
    pub fn new(key: Arc<KeyMaterial>, clock: Arc<dyn Clock>) -> Self {
        Self {
            key,
            clock,
            components: None,
        }
    }

    /// Override the default covered set.
    pub fn with_components(mut self, components: Vec<CoveredComponent>) -> Self {
        self.components = Some(components);
        self
    }

    pub fn apply(&self, request: HttpRequest) -> Result<HttpRequest, Error> {
        let components = match (request.covered_components(), &self.components) {
            (Some(components), _) => components.to_vec(),
            (None, Some(components)) => components.clone(),
            (None, None) => default_covered_components(&request),
        };
        let params =
            SignatureParams::new(components, self.clock.unix_now(), self.key.key_id());
        let headers = sign_request(&request, &params, &self.key)?;
        Ok(attach(request, &headers))
    }
}

/// Where log lines go. The default routes to the `log` facade; tests inject
/// a capturing sink.
pub trait LogSink: Send + Sync {
    fn emit(&self, level: log::Level, message: &str);
}

/// Routes to `log::log!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FacadeSink;

impl LogSink for FacadeSink {
    fn emit(&self, level: log::Level, message: &str) {
        log::log!(level, "{message}");
    }
}

/// Logs outbound requests after signing, with redaction.
#[derive(Clone)]
pub struct RequestLoggingInterceptor {
    level: log::Level,
    log_headers: bool,
    log_body: bool,
    max_body_bytes: usize,
    sink: Arc<dyn LogSink>,
}

impl Default for RequestLoggingInterceptor {
    fn default() -> Self {
        Self {
            level: log::Level::Debug,
            log_headers: true,
            log_body: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            sink: Arc::new(FacadeSink),
        }
    }
}

impl RequestLoggingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: log::Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_headers(mut self, log_headers: bool) -> Self {
        self.log_headers = log_headers;
        self
    }

    pub fn with_body(mut self, log_body: bool) -> Self {
        self.log_body = log_body;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn apply(&self, request: HttpRequest) -> HttpRequest {
        let mut message = format!("--> {} {}", request.method(), request.target_uri());
        if self.log_headers {
            append_headers(&mut message, request.headers().iter());
        }
        if self.log_body {
            if let Some(body) = request.body() {
                append_body(&mut message, body, self.max_body_bytes);
            }
        }
        self.sink.emit(self.level, &message);
        request
    }
}

/// Logs responses, with independent success and error levels.
#[derive(Clone)]
pub struct ResponseLoggingInterceptor {
    success_level: log::Level,
    error_level: log::Level,
    log_headers: bool,
    log_body: bool,
    max_body_bytes: usize,
    sink: Arc<dyn LogSink>,
}

impl Default for ResponseLoggingInterceptor {
    fn default() -> Self {
        Self {
            success_level: log::Level::Debug,
            error_level: log::Level::Warn,
            log_headers: true,
            log_body: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            sink: Arc::new(FacadeSink),
        }
    }
}

impl ResponseLoggingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_success_level(mut self, level: log::Level) -> Self {
        self.success_level = level;
        self
    }

    pub fn with_error_level(mut self, level: log::Level) -> Self {
        self.error_level = level;
        self
    }

    pub fn with_headers(mut self, log_headers: bool) -> Self {
        self.log_headers = log_headers;
        self
    }

    pub fn with_body(mut self, log_body: bool) -> Self {
        self.log_body = log_body;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn apply(&self, response: HttpResponse) -> HttpResponse {
        let level = if response.is_success() {
            self.success_level
        } else {
            self.error_level
        };
        let mut message = format!("<-- {}", response.status());
        if self.log_headers {
            append_headers(&mut message, response.headers().iter());
        }
        if self.log_body && !response.body().is_empty() {
            append_body(&mut message, response.body(), self.max_body_bytes);
        }
        // Error extraction runs earlier in the chain, so the structured
        // record is available by the time the response is logged.
        if let Some(error) = response.api_error() {
            message.push_str(&format!("\n    api_error: {error}"));
        }
        self.sink.emit(level, &message);
        response
    }
}

fn append_headers<'a>(message: &mut String, headers: impl Iterator<Item = (&'a str, &'a str)>) {
    for (name, value) in headers {
        let value = if is_sensitive_header(name) { REDACTED } else { value };
        message.push_str(&format!("\n    {name}: {value}"));
    }
}

fn append_body(message: &mut String, body: &[u8], max_bytes: usize) {
    let end = body.len().min(max_bytes);
    let mut rendered = String::from_utf8_lossy(&body[..end]).into_owned();
    if body.len() > max_bytes {
        rendered.push_str(TRUNCATED);
    }
    message.push_str(&format!("\n    body: {rendered}"));
}

/// A structured error extracted from a non-2xx response body.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiError {
    pub code: Option<String>,
    pub message: String,
    pub detail: Option<serde_json::Value>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{code}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Parses error fields out of non-2xx response bodies, exactly once.
///
/// Three body shapes are recognized, probed in order; a body that matches
/// none of them (or is not JSON at all) leaves the slot unpopulated; this
/// interceptor never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorExtractionInterceptor;

impl ErrorExtractionInterceptor {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, response: HttpResponse) -> HttpResponse {
        if response.is_success() || response.api_error().is_some() {
            return response;
        }
        match extract_api_error(response.body()) {
            Some(error) => response.with_api_error(error),
            None => response,
        }
    }
}

fn extract_api_error(body: &[u8]) -> Option<ApiError> {
    #[derive(Deserialize)]
    struct GnapShape {
        error: String,
        error_description: Option<String>,
    }

    #[derive(Deserialize)]
    struct CodeShape {
        message: String,
        code: Option<String>,
        details: Option<serde_json::Value>,
    }

    #[derive(Deserialize)]
    struct ProblemShape {
        title: String,
        detail: Option<String>,
        #[serde(rename = "type")]
        problem_type: Option<String>,
    }

    let value: serde_json::Value = serde_json::from_slice(body).ok()?;

    if value.get("error").is_some() {
        let shape: GnapShape = serde_json::from_value(value).ok()?;
        return Some(ApiError {
            message: shape.error_description.unwrap_or_else(|| shape.error.clone()),
            code: Some(shape.error),
            detail: None,
        });
    }
    if value.get("message").is_some() {
        let shape: CodeShape = serde_json::from_value(value).ok()?;
        return Some(ApiError {
            code: shape.code,
            message: shape.message,
            detail: shape.details,
        });
    }
    if value.get("title").is_some() {
        let shape: ProblemShape = serde_json::from_value(value).ok()?;
        return Some(ApiError {
            code: shape.problem_type,
            message: match shape.detail {
                Some(detail) => format!("{}: {detail}", shape.title),
                None => shape.title,
            },
            detail: None,
        });
    }
    None
}
