//! Signature-base construction (RFC 9421 §2.3).
//!
//! The signature base is the canonical byte string both signer and verifier
//! feed to Ed25519. One line per covered component in declared order, then
//! the `@signature-params` line; every byte matters, so this module owns all
//! serialization rules: lowercase identifiers, `, `-joined multi-value
//! headers with collapsed whitespace, the `?`-prefixed (or empty) query, and
//! the fixed parameter order `created`, `keyid`, `alg`, `nonce`, `expires`.

use {
    super::error::SignatureError,
    crate::http::HttpRequest,
    std::fmt,
};

/// Algorithm identifier carried in `Signature-Input` parameters, per the
/// RFC 9421 algorithm registry. Note the JWK spelling is `EdDSA`; both are
/// intentional.
pub const ALG_ED25519: &str = "ed25519";

/// One covered piece of the message: a derived component or a header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoveredComponent {
    Method,
    TargetUri,
    Authority,
    Scheme,
    Path,
    Query,
    /// Response status; never derivable from a request.
    Status,
    /// A header, stored lowercase.
    Header(String),
}

impl CoveredComponent {
    /// Cover a header by name; the name is lowercased on construction so the
    /// emitted identifier is canonical regardless of source casing.
    pub fn header(name: impl AsRef<str>) -> Self {
        Self::Header(name.as_ref().to_ascii_lowercase())
    }

    /// The serialized component identifier, without surrounding quotes.
    pub fn identifier(&self) -> &str {
        match self {
            Self::Method => "@method",
            Self::TargetUri => "@target-uri",
            Self::Authority => "@authority",
            Self::Scheme => "@scheme",
            Self::Path => "@path",
            Self::Query => "@query",
            Self::Status => "@status",
            Self::Header(name) => name,
        }
    }

    /// Parse a component identifier from a `Signature-Input` inner list.
    pub fn parse(id: &str) -> Result<Self, SignatureError> {
        match id {
            "@method" => Ok(Self::Method),
            "@target-uri" => Ok(Self::TargetUri),
            "@authority" => Ok(Self::Authority),
            "@scheme" => Ok(Self::Scheme),
            "@path" => Ok(Self::Path),
            "@query" => Ok(Self::Query),
            "@status" => Ok(Self::Status),
            other if other.starts_with('@') => Err(SignatureError::MalformedSignatureInput(
                format!("unknown derived component '{other}'"),
            )),
            other if !other.is_empty() => Ok(Self::header(other)),
            _ => Err(SignatureError::MalformedSignatureInput(
                "empty component identifier".to_string(),
            )),
        }
    }
}

impl fmt::Display for CoveredComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

/// The ordered covered set plus signing parameters.
///
/// Component order is significant and preserved verbatim on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureParams {
    pub components: Vec<CoveredComponent>,
    /// Signing time, whole seconds since the Unix epoch.
    pub created: u64,
    pub key_id: String,
    pub alg: String,
    pub nonce: Option<String>,
    pub expires: Option<u64>,
}

impl SignatureParams {
    pub fn new(
        components: Vec<CoveredComponent>,
        created: u64,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            components,
            created,
            key_id: key_id.into(),
            alg: ALG_ED25519.to_string(),
            nonce: None,
            expires: None,
        }
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_expires(mut self, expires: u64) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Serialize as the RFC 8941 inner list plus parameters in fixed order:
    /// `("<c1>" "<c2>");created=…;keyid="…";alg="…"[;nonce="…"][;expires=…]`.
    pub fn serialize(&self) -> String {
        let ids = self
            .components
            .iter()
            .map(|c| format!("\"{c}\""))
            .collect::<Vec<_>>()
            .join(" ");
        let mut out = format!(
            "({ids});created={};keyid=\"{}\";alg=\"{}\"",
            self.created, self.key_id, self.alg
        );
        if let Some(nonce) = &self.nonce {
            out.push_str(&format!(";nonce=\"{nonce}\""));
        }
        if let Some(expires) = self.expires {
            out.push_str(&format!(";expires={expires}"));
        }
        out
    }
}

/// The default covered set for outgoing signed requests: method and target
/// URI always, `content-digest` and `authorization` whenever the request
/// carries them.
pub fn default_covered_components(request: &HttpRequest) -> Vec<CoveredComponent> {
    let mut components = vec![CoveredComponent::Method, CoveredComponent::TargetUri];
    if request.headers().contains(super::digest::CONTENT_DIGEST) {
        components.push(CoveredComponent::header(super::digest::CONTENT_DIGEST));
    }
    if request.headers().contains("authorization") {
        components.push(CoveredComponent::header("authorization"));
    }
    components
}

/// Build the signature base for a request.
///
/// Deterministic: the same request and parameters always yield the same
/// bytes. The final newline after the `@signature-params` line is the last
/// byte; there is no trailing blank line.
pub fn signature_base(
    request: &HttpRequest,
    params: &SignatureParams,
) -> Result<Vec<u8>, SignatureError> {
    let mut out = String::new();
    for component in &params.components {
        let value = component_value(request, component)?;
        out.push_str(&format!("\"{component}\": {value}\n"));
    }
    out.push_str(&format!("\"@signature-params\": {}\n", params.serialize()));
    Ok(out.into_bytes())
}

fn component_value(
    request: &HttpRequest,
    component: &CoveredComponent,
) -> Result<String, SignatureError> {
    let uri = request.uri();
    match component {
        CoveredComponent::Method => Ok(request.method().as_str().to_string()),
        CoveredComponent::TargetUri => Ok(request.target_uri().to_string()),
        CoveredComponent::Authority => {
            let host = uri.host_str().ok_or_else(|| {
                SignatureError::UnsupportedComponent("@authority".to_string())
            })?;
            Ok(match uri.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            })
        }
        CoveredComponent::Scheme => Ok(uri.scheme().to_string()),
        CoveredComponent::Path => Ok(uri.path().to_string()),
        CoveredComponent::Query => Ok(uri
            .query()
            .map(|q| format!("?{q}"))
            .unwrap_or_default()),
        CoveredComponent::Status => Err(SignatureError::UnsupportedComponent(
            "@status".to_string(),
        )),
        CoveredComponent::Header(name) => {
            let values = request.headers().get_all(name);
            if values.is_empty() {
                return Err(SignatureError::MissingCoveredHeader { name: name.clone() });
            }
            Ok(values
                .iter()
                .map(|v| canonical_field_value(v))
                .collect::<Vec<_>>()
                .join(", "))
        }
    }
}

/// Trim leading/trailing OWS and collapse internal whitespace runs to a
/// single space.
fn canonical_field_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
