//! Immutable request and response value types.
//!
//! Mutation is by rebuild: the `with_*` methods consume the value and return
//! a new one, and builders are single-use. Header names are lowercased on
//! insert so lookups are case-insensitive while insertion order (and
//! multi-value headers) survive canonicalization.

use {
    super::interceptors::ApiError,
    crate::{error::EncodingError, signature::base::CoveredComponent},
    serde::de::DeserializeOwned,
    url::Url,
};

/// Request methods the client emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    /// Uppercase method token, as serialized for `@method`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, case-insensitive header multimap.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header, keeping any existing values for the same name.
    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.entries
            .push((name.as_ref().to_ascii_lowercase(), value.into()));
        self
    }

    /// Replace every value of `name` with a single value, appended at the
    /// end of the ordering.
    pub fn with_replaced(self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.without(name.as_ref()).with(name, value)
    }

    /// Drop every value of `name`.
    pub fn without(mut self, name: impl AsRef<str>) -> Self {
        let name = name.as_ref().to_ascii_lowercase();
        self.entries.retain(|(n, _)| *n != name);
        self
    }

    /// First value of `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Every value of `name`, in order of appearance.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.entries.iter().any(|(n, _)| *n == name)
    }

    /// Iterate `(lowercase name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An immutable outbound request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    method: Method,
    uri: Url,
    headers: Headers,
    body: Option<Vec<u8>>,
    covered_components: Option<Vec<CoveredComponent>>,
}

impl HttpRequest {
    pub fn builder(method: Method, uri: Url) -> HttpRequestBuilder {
        HttpRequestBuilder {
            method,
            uri,
            headers: Headers::new(),
            body: None,
            covered_components: None,
        }
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    /// The absolute-form request URI, as serialized for `@target-uri`.
    pub fn target_uri(&self) -> &str {
        self.uri.as_str()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Rebuild with an extra header appended.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers = self.headers.with(name, value);
        self
    }

    /// Rebuild with `name` set to exactly one value.
    pub fn with_header_replaced(
        mut self,
        name: impl AsRef<str>,
        value: impl Into<String>,
    ) -> Self {
        self.headers = self.headers.with_replaced(name, value);
        self
    }

    /// The covered-component set this request asks the signing interceptor
    /// to use instead of its configured or default set.
    pub fn covered_components(&self) -> Option<&[CoveredComponent]> {
        self.covered_components.as_deref()
    }

    /// Rebuild with a covered-component override for this request only.
    pub fn with_covered_components(mut self, components: Vec<CoveredComponent>) -> Self {
        self.covered_components = Some(components);
        self
    }
}

/// Single-use builder for [`HttpRequest`].
pub struct HttpRequestBuilder {
    method: Method,
    uri: Url,
    headers: Headers,
    body: Option<Vec<u8>>,
    covered_components: Option<Vec<CoveredComponent>>,
}

impl HttpRequestBuilder {
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers = self.headers.with(name, value);
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Ask the signing interceptor to cover exactly these components.
    pub fn covered_components(mut self, components: Vec<CoveredComponent>) -> Self {
        self.covered_components = Some(components);
        self
    }

    pub fn build(self) -> HttpRequest {
        HttpRequest {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
            body: self.body,
            covered_components: self.covered_components,
        }
    }
}

/// An immutable response, plus the structured-error slot the
/// error-extraction interceptor fills for non-2xx statuses.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    status: u16,
    headers: Headers,
    body: Vec<u8>,
    api_error: Option<ApiError>,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
            api_error: None,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The structured error extracted from the body, when one was found.
    pub fn api_error(&self) -> Option<&ApiError> {
        self.api_error.as_ref()
    }

    /// Rebuild with the structured-error slot populated.
    pub fn with_api_error(mut self, error: ApiError) -> Self {
        self.api_error = Some(error);
        self
    }

    /// Deserialize the body as JSON, carrying truncated body bytes on
    /// failure for diagnostics.
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, EncodingError> {
        serde_json::from_slice(&self.body).map_err(|e| EncodingError::json(e, &self.body))
    }
}
