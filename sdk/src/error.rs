//! Crate-wide error taxonomy.
//!
//! Each protocol area owns a dedicated `thiserror` enum next to the code that
//! raises it; this module adds the encoding kinds shared by every layer and
//! the top-level [`Error`] union that client-facing operations return.
//!
//! Propagation policy: crypto and signature-base failures are fatal to the
//! current operation and never retried here; transport failures surface
//! as-is (retrying is the caller's call); protocol failures leave the
//! caller's [`crate::grant::Grant`] untouched so it can be inspected or
//! cancelled.

use {
    crate::{
        grant::error::{ProtocolError, TokenError},
        http::transport::TransportError,
        signature::{error::SignatureError, keys::CryptoError},
    },
    thiserror::Error,
};

/// How much of an offending response body is kept for diagnostics.
const SNIPPET_LIMIT: usize = 256;

/// Failures while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("invalid json: {message} (body: {snippet})")]
    Json { message: String, snippet: String },
    #[error("jwk field '{field}' is missing")]
    JwkFieldMissing { field: &'static str },
    #[error("jwk field '{field}' is invalid: {reason}")]
    JwkFieldInvalid {
        field: &'static str,
        reason: String,
    },
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl EncodingError {
    /// Wrap a JSON failure, carrying a truncated copy of the offending bytes.
    pub(crate) fn json(err: serde_json::Error, body: &[u8]) -> Self {
        let end = body.len().min(SNIPPET_LIMIT);
        let mut snippet = String::from_utf8_lossy(&body[..end]).into_owned();
        if body.len() > SNIPPET_LIMIT {
            snippet.push_str("…[truncated]");
        }
        Self::Json {
            message: err.to_string(),
            snippet,
        }
    }
}

/// Union of every failure kind the client surfaces.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

pub type Result<T> = std::result::Result<T, Error>;
