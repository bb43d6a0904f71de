//! Signing and verification over the signature base.
//!
//! Signing produces the two headers this client emits on every request:
//!
//! ```text
//! Signature-Input: sig=("@method" "@target-uri" …);created=…;keyid="…";alg="ed25519"
//! Signature:       sig=:BASE64(ed25519_sign(key, signature_base)):
//! ```
//!
//! The label is always `sig`; multiple signatures on one message are not
//! emitted. Verification parses both headers, re-serializes the parsed
//! parameters and compares against the wire bytes (any divergence in
//! ordering, case, whitespace or parameter format is a hard
//! [`SignatureError::BaseMismatch`]), rebuilds the base from the live
//! message, and checks the Ed25519 signature.

use {
    super::{
        base::{signature_base, CoveredComponent, SignatureParams, ALG_ED25519},
        error::SignatureError,
        keys::{CryptoError, KeyMaterial},
    },
    crate::{error::Error, http::HttpRequest},
    base64::{engine::general_purpose::STANDARD, Engine as _},
    ed25519_dalek::{Signature, VerifyingKey},
};

/// Lowercase header names.
pub const SIGNATURE: &str = "signature";
pub const SIGNATURE_INPUT: &str = "signature-input";

/// The single signature label this client uses.
pub const SIGNATURE_LABEL: &str = "sig";

/// The header pair produced by signing.
#[derive(Clone, Debug)]
pub struct SignedHeaders {
    pub signature_input: String,
    pub signature: String,
}

/// Sign a request, producing `Signature-Input` and `Signature` values.
///
/// `params.key_id` should be the id of `key`; the params are serialized
/// verbatim, so a mismatched id would publish a keyid the verifier cannot
/// resolve.
pub fn sign_request(
    request: &HttpRequest,
    params: &SignatureParams,
    key: &KeyMaterial,
) -> Result<SignedHeaders, SignatureError> {
    let base = signature_base(request, params)?;
    let signature = key.sign(&base);
    Ok(SignedHeaders {
        signature_input: format!("{SIGNATURE_LABEL}={}", params.serialize()),
        signature: format!("{SIGNATURE_LABEL}=:{}:", STANDARD.encode(signature)),
    })
}

/// Attach signature headers to a request, replacing any previous signature.
pub fn attach(request: HttpRequest, headers: &SignedHeaders) -> HttpRequest {
    request
        .with_header_replaced(SIGNATURE_INPUT, &headers.signature_input)
        .with_header_replaced(SIGNATURE, &headers.signature)
}

/// Acceptance policy for received signatures.
#[derive(Clone, Copy, Debug)]
pub struct VerifyPolicy {
    /// Allowed skew when comparing `created`/`expires` to local time.
    pub max_clock_skew_secs: u64,
    /// Oldest accepted `created`, as an age relative to local time. `None`
    /// accepts any age (the `expires` parameter still applies when present).
    pub max_age_secs: Option<u64>,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            max_clock_skew_secs: 30,
            max_age_secs: None,
        }
    }
}

/// Verify the signature on a request against a known public key.
///
/// Returns the parsed parameters so callers can inspect the covered set and
/// key id that actually signed the message.
pub fn verify_request(
    request: &HttpRequest,
    public_key: &[u8; 32],
    now: u64,
    policy: &VerifyPolicy,
) -> Result<SignatureParams, Error> {
    let input_value = request.headers().get(SIGNATURE_INPUT).ok_or_else(|| {
        SignatureError::MalformedSignatureInput("missing signature-input header".to_string())
    })?;
    let signature_value = request.headers().get(SIGNATURE).ok_or_else(|| {
        SignatureError::MalformedSignatureInput("missing signature header".to_string())
    })?;

    let raw_params = strip_label(input_value)?;
    let params = parse_signature_params(raw_params)?;

    if params.alg != ALG_ED25519 {
        return Err(SignatureError::UnknownAlgorithm(params.alg).into());
    }

    // Strict re-serialization: the parsed parameters must reproduce the wire
    // bytes exactly, otherwise signer and verifier would hash different
    // bases.
    let reserialized = params.serialize();
    if reserialized != raw_params {
        return Err(SignatureError::BaseMismatch(format!(
            "signature-input reserializes to '{reserialized}', received '{raw_params}'"
        ))
        .into());
    }

    validate_window(&params, now, policy)?;

    let signature = parse_signature(signature_value)?;
    let base = signature_base(request, &params)?;

    let verifying_key =
        VerifyingKey::from_bytes(public_key).map_err(|_| CryptoError::VerificationFailed)?;
    verifying_key
        .verify_strict(&base, &Signature::from_bytes(&signature))
        .map_err(|_| CryptoError::VerificationFailed)?;

    Ok(params)
}

/// Parse a `Signature-Input` header value into [`SignatureParams`].
pub fn parse_signature_input(value: &str) -> Result<SignatureParams, SignatureError> {
    parse_signature_params(strip_label(value)?)
}

/// Parse a `Signature` header value into the raw 64-byte signature.
pub fn parse_signature(value: &str) -> Result<[u8; 64], SignatureError> {
    let inner = strip_label(value)?
        .strip_prefix(':')
        .and_then(|v| v.strip_suffix(':'))
        .ok_or_else(|| {
            SignatureError::MalformedSignatureInput(
                "signature value is not an sf byte sequence".to_string(),
            )
        })?;
    let bytes = STANDARD.decode(inner).map_err(|e| {
        SignatureError::MalformedSignatureInput(format!("invalid base64 signature: {e}"))
    })?;
    <[u8; 64]>::try_from(bytes.as_slice()).map_err(|_| {
        SignatureError::MalformedSignatureInput(format!(
            "invalid signature length {}, expected 64",
            bytes.len()
        ))
    })
}

fn strip_label(value: &str) -> Result<&str, SignatureError> {
    value
        .strip_prefix("sig=")
        .ok_or_else(|| {
            SignatureError::MalformedSignatureInput(format!(
                "expected the '{SIGNATURE_LABEL}' label, got '{value}'"
            ))
        })
}

fn validate_window(
    params: &SignatureParams,
    now: u64,
    policy: &VerifyPolicy,
) -> Result<(), SignatureError> {
    let skew = policy.max_clock_skew_secs;
    if params.created > now.saturating_add(skew) {
        return Err(SignatureError::SignatureExpired(format!(
            "created={} is in the future (now={now})",
            params.created
        )));
    }
    if let Some(expires) = params.expires {
        if expires.saturating_add(skew) < now {
            return Err(SignatureError::SignatureExpired(format!(
                "expires={expires} has passed (now={now})"
            )));
        }
    }
    if let Some(max_age) = policy.max_age_secs {
        if params.created.saturating_add(max_age).saturating_add(skew) < now {
            return Err(SignatureError::SignatureExpired(format!(
                "created={} is older than {max_age}s (now={now})",
                params.created
            )));
        }
    }
    Ok(())
}

fn parse_signature_params(raw: &str) -> Result<SignatureParams, SignatureError> {
    let malformed =
        |detail: &str| SignatureError::MalformedSignatureInput(detail.to_string());

    let rest = raw
        .strip_prefix('(')
        .ok_or_else(|| malformed("covered components must open with '('"))?;
    let (inner, rest) = rest
        .split_once(')')
        .ok_or_else(|| malformed("covered components must close with ')'"))?;

    let mut components = Vec::new();
    for id in inner.split_whitespace() {
        let id = id
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .ok_or_else(|| malformed("component identifiers must be quoted"))?;
        components.push(CoveredComponent::parse(id)?);
    }

    let mut created = None;
    let mut key_id = None;
    let mut alg = None;
    let mut nonce = None;
    let mut expires = None;

    for segment in rest.split(';').filter(|s| !s.is_empty()) {
        let (name, value) = segment
            .split_once('=')
            .ok_or_else(|| malformed("parameters must be name=value"))?;
        match name {
            "created" => {
                created = Some(value.parse::<u64>().map_err(|_| {
                    malformed("created must be a bare integer")
                })?);
            }
            "keyid" => key_id = Some(unquote(value).ok_or_else(|| malformed("keyid must be quoted"))?),
            "alg" => alg = Some(unquote(value).ok_or_else(|| malformed("alg must be quoted"))?),
            "nonce" => {
                nonce = Some(unquote(value).ok_or_else(|| malformed("nonce must be quoted"))?)
            }
            "expires" => {
                expires = Some(value.parse::<u64>().map_err(|_| {
                    malformed("expires must be a bare integer")
                })?);
            }
            other => {
                return Err(SignatureError::MalformedSignatureInput(format!(
                    "unknown signature parameter '{other}'"
                )))
            }
        }
    }

    Ok(SignatureParams {
        components,
        created: created.ok_or_else(|| malformed("missing created parameter"))?,
        key_id: key_id.ok_or_else(|| malformed("missing keyid parameter"))?,
        alg: alg.ok_or_else(|| malformed("missing alg parameter"))?,
        nonce,
        expires,
    })
}

fn unquote(value: &str) -> Option<String> {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .map(str::to_string)
}
