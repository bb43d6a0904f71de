//! RFC 9421 HTTP Message Signatures.
//!
//! Every outbound Open Payments request carries two extra headers:
//! - `Signature-Input` names the covered components of the message (method,
//!   target URI, selected headers) plus the signing parameters, and
//! - `Signature` carries the Ed25519 signature over the canonical
//!   "signature base" string those components serialize to.
//!
//! A verifier rebuilds the exact same byte sequence from the message it
//! received and checks the signature against the client's published JWK, so
//! the base construction in [`base`] has to be byte-exact: ordering, case,
//! whitespace, and parameter formatting all feed the hash.
//!
//! Layering mirrors the data flow:
//! - [`keys`]: Ed25519 key material bound to a `kid`, JWK export/parse.
//! - [`digest`]: `Content-Digest` header values (RFC 9530) so the body is
//!   covered indirectly through a header.
//! - [`base`]: covered-component selection and canonical-string building.
//! - [`engine`]: header encoding on sign, strict parsing + rebuild on
//!   verify.

pub mod base;
pub mod digest;
pub mod engine;
pub mod error;
pub mod keys;


pub use {base::*, digest::*, engine::*, error::*, keys::*};
