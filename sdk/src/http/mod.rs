//! HTTP value types, transport capability, and the interceptor pipeline.
//!
//! The core never talks to an HTTP library directly: requests are immutable
//! [`HttpRequest`] values, shaped by an ordered chain of interceptors and
//! handed to an injected [`Transport`]. Responses come back the same way
//! through the response-side chain.

pub mod interceptors;
pub mod message;
pub mod pipeline;
pub mod transport;

pub use {
    interceptors::{
        ApiError,
        AuthScheme,
        AuthenticationInterceptor,
        ErrorExtractionInterceptor,
        LogSink,
        RequestLoggingInterceptor,
        ResponseLoggingInterceptor,
        SigningInterceptor,
    },
    message::{Headers, HttpRequest, HttpRequestBuilder, HttpResponse, Method},
    pipeline::{Pipeline, PipelineBuilder, RequestInterceptor, ResponseInterceptor},
    transport::{ReqwestTransport, Transport, TransportError},
};
