//! Ordered interceptor chains.
//!
//! Interceptor kinds are tagged variants rather than trait objects; a new
//! kind is a new variant. A pipeline is constructed once per client and is
//! immutable afterwards; chains run strictly in insertion order and an
//! interceptor error short-circuits the rest of its chain.
//!
//! Ordering constraints the builder caller must respect:
//! - authentication before signing whenever `authorization` is covered, so
//!   the header exists when the signature base is built;
//! - request logging after signing, so the produced (redacted) signature
//!   headers can be observed;
//! - error extraction before response logging, so structured error fields
//!   are parsed exactly once and every later observer of the body, the
//!   pipeline's own response logger included, sees the populated record.

use {
    super::{
        interceptors::{
            AuthenticationInterceptor,
            ErrorExtractionInterceptor,
            RequestLoggingInterceptor,
            ResponseLoggingInterceptor,
            SigningInterceptor,
        },
        message::{HttpRequest, HttpResponse},
    },
    crate::error::Error,
};

/// A request-side transformer.
#[derive(Clone)]
pub enum RequestInterceptor {
    Authentication(AuthenticationInterceptor),
    Signing(SigningInterceptor),
    Logging(RequestLoggingInterceptor),
}

impl RequestInterceptor {
    pub fn apply(&self, request: HttpRequest) -> Result<HttpRequest, Error> {
        match self {
            Self::Authentication(interceptor) => Ok(interceptor.apply(request)),
            Self::Signing(interceptor) => interceptor.apply(request),
            Self::Logging(interceptor) => Ok(interceptor.apply(request)),
        }
    }
}

/// A response-side transformer.
#[derive(Clone)]
pub enum ResponseInterceptor {
    Logging(ResponseLoggingInterceptor),
    ErrorExtraction(ErrorExtractionInterceptor),
}

impl ResponseInterceptor {
    pub fn apply(&self, response: HttpResponse) -> Result<HttpResponse, Error> {
        match self {
            Self::Logging(interceptor) => Ok(interceptor.apply(response)),
            Self::ErrorExtraction(interceptor) => Ok(interceptor.apply(response)),
        }
    }
}

/// The two ordered chains.
#[derive(Clone, Default)]
pub struct Pipeline {
    request: Vec<RequestInterceptor>,
    response: Vec<ResponseInterceptor>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Run the request chain in insertion order.
    pub fn apply_request(&self, request: HttpRequest) -> Result<HttpRequest, Error> {
        self.request
            .iter()
            .try_fold(request, |request, interceptor| interceptor.apply(request))
    }

    /// Run the response chain in insertion order.
    pub fn apply_response(&self, response: HttpResponse) -> Result<HttpResponse, Error> {
        self.response
            .iter()
            .try_fold(response, |response, interceptor| interceptor.apply(response))
    }
}

/// Single-use builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    request: Vec<RequestInterceptor>,
    response: Vec<ResponseInterceptor>,
}

impl PipelineBuilder {
    pub fn on_request(mut self, interceptor: RequestInterceptor) -> Self {
        self.request.push(interceptor);
        self
    }

    pub fn on_response(mut self, interceptor: ResponseInterceptor) -> Self {
        self.response.push(interceptor);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            request: self.request,
            response: self.response,
        }
    }
}
