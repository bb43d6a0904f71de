//! Grant and token value types plus the RFC 9635 wire shapes.
//!
//! Everything here is a value: transitions replace a [`Grant`] rather than
//! mutating it, and the wire structs are plain serde mirrors of the JSON
//! bodies the authorization server speaks (snake_case field naming per
//! RFC 9635).

use {
    super::error::ProtocolError,
    crate::signature::keys::Jwk,
    chrono::{DateTime, Duration, Utc},
    serde::{Deserialize, Serialize},
    std::fmt,
    url::Url,
};

// ---------------------------------------------------------------------------
// Requested access
// ---------------------------------------------------------------------------

/// One requested access right.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    #[serde(rename = "type")]
    pub access_type: String,
    pub actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<AccessLimits>,
}

impl AccessRequest {
    pub fn new<S: Into<String>>(
        access_type: impl Into<String>,
        actions: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            access_type: access_type.into(),
            actions: actions.into_iter().map(Into::into).collect(),
            identifier: None,
            limits: None,
        }
    }

    /// Bind the right to a single resource.
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_limits(mut self, limits: AccessLimits) -> Self {
        self.limits = Some(limits);
        self
    }
}

/// Limits attached to a requested access right.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receive_amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: String,
    pub asset_code: String,
    pub asset_scale: u8,
}

// ---------------------------------------------------------------------------
// Client identity and interaction
// ---------------------------------------------------------------------------

/// The `client` member of a grant request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub key: ClientKey,
}

/// Either the client's JWK inline, or a dereferenceable key URI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClientKey {
    Jwk(Jwk),
    Reference(String),
}

impl ClientIdentity {
    pub fn jwk(jwk: Jwk) -> Self {
        Self {
            key: ClientKey::Jwk(jwk),
        }
    }

    pub fn reference(uri: impl Into<String>) -> Self {
        Self {
            key: ClientKey::Reference(uri.into()),
        }
    }
}

/// The `interact` member of a grant request; omitted for non-interactive
/// flows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractRequest {
    pub start: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish: Option<FinishRequest>,
}

impl InteractRequest {
    /// Start a redirect interaction.
    pub fn redirect() -> Self {
        Self {
            start: vec!["redirect".to_string()],
            finish: None,
        }
    }

    pub fn with_finish(mut self, finish: FinishRequest) -> Self {
        self.finish = Some(finish);
        self
    }
}

/// Where and how the AS sends the user back after consent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinishRequest {
    pub method: String,
    pub uri: String,
    pub nonce: String,
}

impl FinishRequest {
    pub fn redirect(uri: impl Into<String>, nonce: impl Into<String>) -> Self {
        Self {
            method: "redirect".to_string(),
            uri: uri.into(),
            nonce: nonce.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire bodies
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub(crate) struct GrantRequestBody {
    pub access_token: AccessTokenRequest,
    pub client: ClientIdentity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interact: Option<InteractRequest>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct AccessTokenRequest {
    pub access: Vec<AccessRequest>,
}

#[derive(Serialize)]
pub(crate) struct ContinueRequestBody<'a> {
    pub interact_ref: &'a str,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct GrantResponseBody {
    #[serde(default)]
    pub access_token: Option<AccessTokenBody>,
    #[serde(default, rename = "continue")]
    pub continuation: Option<ContinueBody>,
    #[serde(default)]
    pub interact: Option<InteractResponseBody>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct AccessTokenBody {
    pub value: String,
    pub manage: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub access: Option<Vec<AccessRequest>>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ContinueBody {
    pub access_token: ContinueTokenBody,
    pub uri: String,
    #[serde(default)]
    pub wait: Option<u64>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ContinueTokenBody {
    pub value: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct InteractResponseBody {
    pub redirect: String,
    #[serde(default)]
    pub finish: Option<String>,
}

/// Rotation responses reuse the approved-grant token shape.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct TokenRotationBody {
    pub access_token: AccessTokenBody,
}

// ---------------------------------------------------------------------------
// Domain values
// ---------------------------------------------------------------------------

/// Opaque bearer token value. Serializes transparently for the wire but
/// always prints as a fixed mask, so a stray `Debug` cannot leak it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenValue(String);

impl TokenValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw value, for building `Authorization: GNAP …` headers.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenValue(***REDACTED***)")
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***REDACTED***")
    }
}

/// A granted access token.
#[derive(Clone, Debug, PartialEq)]
pub struct AccessToken {
    pub value: TokenValue,
    /// Where rotation and revocation are addressed.
    pub manage_uri: Url,
    /// Absolute expiry, derived from response-receipt time + `expires_in`.
    pub expires_at: Option<DateTime<Utc>>,
    pub granted_access: Vec<AccessRequest>,
}

impl AccessToken {
    pub(crate) fn from_body(
        body: AccessTokenBody,
        received_at: DateTime<Utc>,
    ) -> Result<Self, ProtocolError> {
        let manage_uri = Url::parse(&body.manage).map_err(|e| {
            ProtocolError::MalformedGrantResponse(format!(
                "access_token.manage is not a valid uri: {e}"
            ))
        })?;
        Ok(Self {
            value: TokenValue::new(body.value),
            manage_uri,
            expires_at: body
                .expires_in
                .map(|secs| received_at + Duration::seconds(secs as i64)),
            granted_access: body.access.unwrap_or_default(),
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }

    /// True when the token expires within `threshold` of `now` (tokens
    /// without a server-reported expiry never do).
    pub fn is_expiring_within(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        matches!(self.expires_at, Some(at) if at <= now + threshold)
    }
}

/// The continuation triple that drives a not-yet-approved grant forward.
#[derive(Clone, Debug, PartialEq)]
pub struct Continuation {
    pub continue_token: TokenValue,
    pub continue_uri: Url,
    /// Server-requested delay before continuing. Zero and unset are
    /// distinct on the wire and surfaced as-is; the core never schedules.
    pub wait_seconds: Option<u64>,
}

impl Continuation {
    fn from_body(body: ContinueBody) -> Result<Self, ProtocolError> {
        let continue_uri = Url::parse(&body.uri).map_err(|e| {
            ProtocolError::MalformedGrantResponse(format!("continue.uri is not a valid uri: {e}"))
        })?;
        Ok(Self {
            continue_token: TokenValue::new(body.access_token.value),
            continue_uri,
            wait_seconds: body.wait,
        })
    }
}

/// Pending user-consent step.
#[derive(Clone, Debug, PartialEq)]
pub struct Interaction {
    pub redirect_uri: Url,
    /// The AS finish nonce, needed to verify the redirect-back hash.
    pub finish_nonce: Option<String>,
}

impl Interaction {
    fn from_body(body: InteractResponseBody) -> Result<Self, ProtocolError> {
        let redirect_uri = Url::parse(&body.redirect).map_err(|e| {
            ProtocolError::MalformedGrantResponse(format!(
                "interact.redirect is not a valid uri: {e}"
            ))
        })?;
        Ok(Self {
            redirect_uri,
            finish_nonce: body.finish,
        })
    }
}

/// Where a grant currently stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrantState {
    InteractionRequired,
    Pending,
    Approved,
    TerminalFailed,
    TerminalCancelled,
}

impl GrantState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::TerminalFailed | Self::TerminalCancelled)
    }
}

/// The client's record of one grant negotiation.
///
/// Fields are private so the state invariants hold by construction:
/// `Approved` always has a token, `InteractionRequired` always has an
/// interaction and never a token, and terminal states accept no further
/// transitions.
#[derive(Clone, Debug)]
pub struct Grant {
    access_requests: Vec<AccessRequest>,
    continuation: Option<Continuation>,
    interaction: Option<Interaction>,
    access_token: Option<AccessToken>,
    failure: Option<crate::http::interceptors::ApiError>,
    state: GrantState,
}

impl Grant {
    pub(crate) fn from_response(
        access_requests: Vec<AccessRequest>,
        body: GrantResponseBody,
        received_at: DateTime<Utc>,
    ) -> Result<Self, ProtocolError> {
        let access_token = body
            .access_token
            .map(|b| AccessToken::from_body(b, received_at))
            .transpose()?;
        let continuation = body.continuation.map(Continuation::from_body).transpose()?;
        let interaction = body.interact.map(Interaction::from_body).transpose()?;

        let (state, interaction) = match (&access_token, &continuation, interaction) {
            (Some(_), _, _) => (GrantState::Approved, None),
            (None, Some(_), Some(interaction)) => {
                (GrantState::InteractionRequired, Some(interaction))
            }
            (None, Some(_), None) => (GrantState::Pending, None),
            (None, None, _) => {
                return Err(ProtocolError::MalformedGrantResponse(
                    "response carries neither access_token nor continue".to_string(),
                ))
            }
        };

        Ok(Self {
            access_requests,
            continuation,
            interaction,
            access_token,
            failure: None,
            state,
        })
    }

    /// Apply a continuation response, producing the next grant position.
    /// Transitions are monotone forward; terminal grants accept none.
    pub(crate) fn advance(
        self,
        body: GrantResponseBody,
        received_at: DateTime<Utc>,
    ) -> Result<Self, ProtocolError> {
        if self.state.is_terminal() {
            return Err(ProtocolError::UnexpectedTransition(format!(
                "grant in state {:?} cannot advance",
                self.state
            )));
        }
        Self::from_response(self.access_requests, body, received_at)
    }

    /// Terminal transition after a successful cancel.
    pub(crate) fn cancelled(mut self) -> Self {
        self.access_token = None;
        self.interaction = None;
        self.continuation = None;
        self.state = GrantState::TerminalCancelled;
        self
    }

    /// Record a terminal server rejection. Operations do not apply this
    /// themselves; they return the rejection as an error and leave the
    /// caller's grant untouched for inspection.
    pub fn into_failed(mut self, failure: crate::http::interceptors::ApiError) -> Self {
        self.access_token = None;
        self.interaction = None;
        self.failure = Some(failure);
        self.state = GrantState::TerminalFailed;
        self
    }

    /// Replace the access token after a rotation. The granted access rights
    /// carry over unchanged.
    pub fn with_rotated_token(mut self, token: AccessToken) -> Result<Self, ProtocolError> {
        if self.state != GrantState::Approved {
            return Err(ProtocolError::UnexpectedTransition(format!(
                "cannot rotate a token on a grant in state {:?}",
                self.state
            )));
        }
        self.access_token = Some(token);
        Ok(self)
    }

    pub fn state(&self) -> GrantState {
        self.state
    }

    pub fn access_requests(&self) -> &[AccessRequest] {
        &self.access_requests
    }

    pub fn continuation(&self) -> Option<&Continuation> {
        self.continuation.as_ref()
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        self.interaction.as_ref()
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_ref()
    }

    pub fn failure(&self) -> Option<&crate::http::interceptors::ApiError> {
        self.failure.as_ref()
    }
}
