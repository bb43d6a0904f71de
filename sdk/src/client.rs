//! The Open Payments client.
//!
//! [`OpenPaymentsClient`] owns the process-wide pieces: one
//! [`KeyMaterial`] shared by all signing, one transport, one interceptor
//! pipeline, all read-only after [`OpenPaymentsClientBuilder::build`].
//! Protocol operations hang off it as action groups
//! ([`crate::grant::GrantActions`], [`crate::grant::TokenActions`],
//! [`crate::wallet::WalletActions`]); this module provides the shared
//! request shaping and the signed resource-call binding they all go
//! through.

use {
    crate::{
        clock::{Clock, SystemClock},
        error::Result,
        grant::{error::TokenError, types::AccessToken},
        http::{
            interceptors::{
                AuthScheme,
                ErrorExtractionInterceptor,
                RequestLoggingInterceptor,
                ResponseLoggingInterceptor,
                SigningInterceptor,
            },
            message::{HttpRequest, HttpResponse, Method},
            pipeline::{Pipeline, RequestInterceptor, ResponseInterceptor},
            transport::{ReqwestTransport, Transport},
        },
        signature::{base::CoveredComponent, digest, keys::KeyMaterial},
    },
    std::sync::Arc,
    url::Url,
};

/// Client-side core for Open Payments: signing, grant negotiation, and
/// authenticated resource calls.
#[derive(Clone)]
pub struct OpenPaymentsClient {
    key: Arc<KeyMaterial>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    pipeline: Arc<Pipeline>,
}

impl OpenPaymentsClient {
    /// Start building a client around its signing key.
    pub fn builder(key: KeyMaterial) -> OpenPaymentsClientBuilder {
        OpenPaymentsClientBuilder {
            key,
            transport: None,
            clock: None,
            request_logging: RequestLoggingInterceptor::new(),
            response_logging: ResponseLoggingInterceptor::new(),
            covered_components: None,
        }
    }

    pub fn key_material(&self) -> &KeyMaterial {
        &self.key
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Run a request through the pipeline, the transport, and the response
    /// pipeline. Dropping the returned future aborts the exchange; no
    /// response interceptor runs for an abandoned call.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let request = self.pipeline.apply_request(request)?;
        let response = self.transport.execute(request).await?;
        self.pipeline.apply_response(response)
    }

    /// Perform a signed resource call, optionally authorized by an access
    /// token.
    ///
    /// Attaches `Content-Digest` when a body is present and
    /// `Authorization: GNAP <token>` when a token is given, then signs via
    /// the pipeline so both headers end up covered. A locally-expired token
    /// is rejected before any bytes leave the process.
    pub async fn resource_request(
        &self,
        method: Method,
        uri: Url,
        body: Option<Vec<u8>>,
        token: Option<&AccessToken>,
    ) -> Result<HttpResponse> {
        let request = self.resource_auth_request(method, uri, body, token)?;
        self.execute(request).await
    }

    /// Like [`Self::resource_request`], but with the signed
    /// covered-component set overridden for this call only. Other requests
    /// from the same client keep the configured (or default) set.
    pub async fn resource_request_with_components(
        &self,
        method: Method,
        uri: Url,
        body: Option<Vec<u8>>,
        token: Option<&AccessToken>,
        components: Vec<CoveredComponent>,
    ) -> Result<HttpResponse> {
        let request = self.resource_auth_request(method, uri, body, token)?;
        self.execute(request.with_covered_components(components)).await
    }

    fn resource_auth_request(
        &self,
        method: Method,
        uri: Url,
        body: Option<Vec<u8>>,
        token: Option<&AccessToken>,
    ) -> Result<HttpRequest> {
        if let Some(token) = token {
            let now = self.clock.now();
            if let Some(expired_at) = token.expires_at.filter(|at| *at <= now) {
                return Err(TokenError::Expired { expired_at }.into());
            }
        }
        let authorization =
            token.map(|t| AuthScheme::Gnap.header_value(t.value.expose()));
        Ok(self.build_request(method, uri, body, authorization))
    }

    /// Shape a request the way every operation in this crate does: JSON
    /// content type and digest when a body is present, an authorization
    /// header when one is given. Signing happens later, in the pipeline.
    pub(crate) fn build_request(
        &self,
        method: Method,
        uri: Url,
        body: Option<Vec<u8>>,
        authorization: Option<String>,
    ) -> HttpRequest {
        let mut builder = HttpRequest::builder(method, uri);
        if let Some(body) = body {
            builder = builder
                .header("content-type", "application/json")
                .header(digest::CONTENT_DIGEST, digest::content_digest(&body))
                .body(body);
        }
        if let Some(authorization) = authorization {
            builder = builder.header("authorization", authorization);
        }
        builder.build()
    }
}

/// Single-use builder for [`OpenPaymentsClient`].
pub struct OpenPaymentsClientBuilder {
    key: KeyMaterial,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    request_logging: RequestLoggingInterceptor,
    response_logging: ResponseLoggingInterceptor,
    covered_components: Option<Vec<CoveredComponent>>,
}

impl OpenPaymentsClientBuilder {
    /// Substitute the transport; defaults to [`ReqwestTransport`].
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Substitute the clock; defaults to [`SystemClock`].
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_request_logging(mut self, interceptor: RequestLoggingInterceptor) -> Self {
        self.request_logging = interceptor;
        self
    }

    pub fn with_response_logging(mut self, interceptor: ResponseLoggingInterceptor) -> Self {
        self.response_logging = interceptor;
        self
    }

    /// Override the default covered-component set for every signed request
    /// this client emits. A set attached to an individual request (via
    /// [`HttpRequest::with_covered_components`] or
    /// [`OpenPaymentsClient::resource_request_with_components`]) still wins
    /// for that request.
    pub fn with_covered_components(mut self, components: Vec<CoveredComponent>) -> Self {
        self.covered_components = Some(components);
        self
    }

    pub fn build(self) -> OpenPaymentsClient {
        let key = Arc::new(self.key);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()) as Arc<dyn Transport>);

        let mut signing = SigningInterceptor::new(Arc::clone(&key), Arc::clone(&clock));
        if let Some(components) = self.covered_components {
            signing = signing.with_components(components);
        }

        // Request side signs then logs (so the produced headers are
        // observable, redacted); response side extracts errors before
        // logging, so structured error fields are parsed exactly once and
        // every later observer of the body, the response logger included,
        // sees the record already populated.
        let pipeline = Pipeline::builder()
            .on_request(RequestInterceptor::Signing(signing))
            .on_request(RequestInterceptor::Logging(self.request_logging))
            .on_response(ResponseInterceptor::ErrorExtraction(
                ErrorExtractionInterceptor::new(),
            ))
            .on_response(ResponseInterceptor::Logging(self.response_logging))
            .build();

        OpenPaymentsClient {
            key,
            transport,
            clock,
            pipeline: Arc::new(pipeline),
        }
    }
}
