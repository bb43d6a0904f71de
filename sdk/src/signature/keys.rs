//! Ed25519 key material and JWK publication.
//!
//! The client holds exactly one signing key for its process lifetime. The
//! private half never leaves this module: it is wrapped by
//! `ed25519_dalek::SigningKey` (zeroized on drop), seed buffers pass through
//! [`zeroize::Zeroizing`], and [`KeyMaterial`] implements neither `Display`
//! nor equality so key bytes cannot leak through formatting or comparisons.
//!
//! The public half is published as a JWK (RFC 7517) with
//! `kty="OKP"`, `crv="Ed25519"` and the key id the client signs under, so
//! verifiers can resolve `keyid` from `Signature-Input` to a key.

use {
    crate::error::EncodingError,
    base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _},
    ed25519_dalek::{Signature, Signer as _, SigningKey},
    rand::{rngs::OsRng, RngCore as _},
    serde::{Deserialize, Serialize},
    thiserror::Error,
    zeroize::Zeroizing,
};

/// Ed25519 seeds are exactly 32 bytes (RFC 8032).
pub const SEED_LEN: usize = 32;

/// Cryptographic failures around key handling and signature math.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("invalid seed length {len}, expected {SEED_LEN} bytes")]
    InvalidSeed { len: usize },
    #[error("signature verification failed")]
    VerificationFailed,
}

/// An Ed25519 key pair bound to a stable key id.
///
/// The key id uniquely identifies the public key within the client's
/// registered JWK set and is embedded in every `Signature-Input` header the
/// client emits.
#[derive(Clone)]
pub struct KeyMaterial {
    signing: SigningKey,
    key_id: String,
}

impl KeyMaterial {
    /// Generate a fresh random key pair.
    pub fn generate(key_id: impl Into<String>) -> Result<Self, CryptoError> {
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        OsRng
            .try_fill_bytes(seed.as_mut_slice())
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        Ok(Self {
            signing: SigningKey::from_bytes(&seed),
            key_id: key_id.into(),
        })
    }

    /// Construct from a 32-byte seed.
    pub fn from_seed(seed: &[u8], key_id: impl Into<String>) -> Result<Self, CryptoError> {
        if seed.len() != SEED_LEN {
            return Err(CryptoError::InvalidSeed { len: seed.len() });
        }
        let mut buf = Zeroizing::new([0u8; SEED_LEN]);
        buf.copy_from_slice(seed);
        Ok(Self {
            signing: SigningKey::from_bytes(&buf),
            key_id: key_id.into(),
        })
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Sign arbitrary bytes, returning the fixed 64-byte `R||S` signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        let sig: Signature = self.signing.sign(message);
        sig.to_bytes()
    }

    /// Verify a signature against this key pair's public half.
    pub fn verify(&self, message: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let sig = Signature::from_bytes(signature);
        self.signing
            .verifying_key()
            .verify_strict(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    /// Return the raw 32-byte public key bytes.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Export the public half as a JWK carrying this key's id.
    pub fn public_jwk(&self) -> Jwk {
        Jwk::from_public_key(self.public_key_bytes(), &self.key_id)
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

/// JSON Web Key for an Ed25519 public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub crv: String,
    /// base64url (unpadded) encoding of the 32-byte public key.
    pub x: String,
    pub kid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
}

impl Jwk {
    /// Build the JWK for a raw Ed25519 public key.
    pub fn from_public_key(public_key: [u8; 32], kid: impl Into<String>) -> Self {
        Self {
            kty: "OKP".to_string(),
            crv: "Ed25519".to_string(),
            x: URL_SAFE_NO_PAD.encode(public_key),
            kid: kid.into(),
            alg: Some("EdDSA".to_string()),
            key_use: Some("sig".to_string()),
        }
    }

    /// Parse a JWK from JSON bytes, reporting which field is missing or
    /// mistyped rather than a bare deserialization failure.
    pub fn parse(json: &[u8]) -> Result<Self, EncodingError> {
        let value: serde_json::Value =
            serde_json::from_slice(json).map_err(|e| EncodingError::json(e, json))?;
        for field in ["kty", "crv", "x", "kid"] {
            match value.get(field) {
                None => return Err(EncodingError::JwkFieldMissing { field: field_name(field) }),
                Some(v) if !v.is_string() => {
                    return Err(EncodingError::JwkFieldInvalid {
                        field: field_name(field),
                        reason: "expected a string".to_string(),
                    })
                }
                Some(_) => {}
            }
        }
        serde_json::from_value(value).map_err(|e| EncodingError::json(e, json))
    }

    /// Decode the `x` field back to raw public key bytes, checking the OKP /
    /// Ed25519 envelope.
    pub fn public_key_bytes(&self) -> Result<[u8; 32], EncodingError> {
        if self.kty != "OKP" {
            return Err(EncodingError::JwkFieldInvalid {
                field: "kty",
                reason: format!("expected 'OKP', got '{}'", self.kty),
            });
        }
        if self.crv != "Ed25519" {
            return Err(EncodingError::JwkFieldInvalid {
                field: "crv",
                reason: format!("expected 'Ed25519', got '{}'", self.crv),
            });
        }
        let bytes = URL_SAFE_NO_PAD.decode(self.x.as_bytes())?;
        <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| EncodingError::JwkFieldInvalid {
            field: "x",
            reason: format!("expected 32 bytes, got {}", bytes.len()),
        })
    }
}

/// Map JSON field names to the static strings the error type carries.
fn field_name(field: &str) -> &'static str {
    match field {
        "kty" => "kty",
        "crv" => "crv",
        "x" => "x",
        _ => "kid",
    }
}
