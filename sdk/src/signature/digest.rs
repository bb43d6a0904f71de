//! `Content-Digest` header values (RFC 9530).
//!
//! Requests with a body carry `Content-Digest: sha-256=:BASE64(SHA256(body)):`
//! and cover that header in the signature, which binds the body bytes into
//! the signature without canonicalizing them. The digest is computed before
//! the request enters signature-base construction.

use {
    base64::{engine::general_purpose::STANDARD, Engine as _},
    sha2::{Digest as _, Sha256},
};

/// Lowercase header name, as it appears in covered-component lists.
pub const CONTENT_DIGEST: &str = "content-digest";

/// Compute the `Content-Digest` header value for a body.
///
/// The empty body digests the empty octet sequence; callers that have no
/// body at all simply omit the header.
pub fn content_digest(body: &[u8]) -> String {
    format!("sha-256=:{}:", STANDARD.encode(sha256(body)))
}

/// Check a received `Content-Digest` value against body bytes.
pub fn digest_matches_body(header_value: &str, body: &[u8]) -> bool {
    header_value == content_digest(body)
}

/// Compute `sha256(data)` and return the raw 32-byte digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
