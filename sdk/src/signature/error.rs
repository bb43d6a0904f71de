//! Signature construction and verification errors.

use {super::base::ALG_ED25519, thiserror::Error};

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("signature base mismatch: {0}")]
    BaseMismatch(String),
    #[error("covered header '{name}' is absent from the message")]
    MissingCoveredHeader { name: String },
    #[error("malformed signature header: {0}")]
    MalformedSignatureInput(String),
    #[error("unknown signature algorithm '{0}', expected '{ALG_ED25519}'")]
    UnknownAlgorithm(String),
    #[error("signature outside its validity window: {0}")]
    SignatureExpired(String),
    #[error("component '{0}' cannot be derived from a request")]
    UnsupportedComponent(String),
}
