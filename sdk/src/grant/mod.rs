//! GNAP grant negotiation (RFC 9635), client side.
//!
//! A grant moves through a small state machine driven entirely by the
//! caller; the core never polls and never sleeps:
//!
//! ```text
//! (new) -- request --> INTERACTION_REQUIRED -- continue(interact_ref) --> APPROVED
//! (new) -- request --> PENDING ------------- continue ----------------> APPROVED
//! (new) -- request --> APPROVED
//!
//! any non-terminal -- cancel --> TERMINAL_CANCELLED
//! any non-terminal -- server 4xx/5xx --> error (grant untouched)
//! ```
//!
//! Every request is signed through the client pipeline; continuation and
//! cancellation authenticate with `Authorization: GNAP <continue_token>`.

pub mod error;
pub mod token;
pub mod types;

#[cfg(test)]
mod tests;

pub use {
    error::{ProtocolError, TokenError},
    token::TokenActions,
    types::{
        AccessLimits,
        AccessRequest,
        AccessToken,
        Amount,
        ClientIdentity,
        ClientKey,
        Continuation,
        FinishRequest,
        Grant,
        GrantState,
        InteractRequest,
        Interaction,
        TokenValue,
    },
};

use {
    crate::{
        client::OpenPaymentsClient,
        error::{EncodingError, Error, Result},
        http::{
            interceptors::{ApiError, AuthScheme},
            message::{HttpResponse, Method},
        },
        signature::{digest::sha256, keys::CryptoError},
    },
    base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _},
    rand::{rngs::OsRng, RngCore as _},
    types::{AccessTokenRequest, ContinueRequestBody, GrantRequestBody, GrantResponseBody},
    url::Url,
};

/// Generate a finish nonce for interactive flows: 128 bits from the OS RNG,
/// base64url without padding.
pub fn generate_finish_nonce() -> std::result::Result<String, CryptoError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Grant operations, scoped to a client.
pub struct GrantActions<'a> {
    client: &'a OpenPaymentsClient,
}

impl OpenPaymentsClient {
    pub fn grants(&self) -> GrantActions<'_> {
        GrantActions { client: self }
    }
}

impl GrantActions<'_> {
    /// Request a new grant from an authorization server.
    ///
    /// Pass `interact` for flows that need user consent; leave it `None`
    /// for non-interactive grants. The returned [`Grant`] is in whichever
    /// state the server's response puts it.
    pub async fn request(
        &self,
        auth_server: &Url,
        access_requests: Vec<AccessRequest>,
        client_identity: ClientIdentity,
        interact: Option<InteractRequest>,
    ) -> Result<Grant> {
        let body = GrantRequestBody {
            access_token: AccessTokenRequest {
                access: access_requests.clone(),
            },
            client: client_identity,
            interact,
        };
        let bytes =
            serde_json::to_vec(&body).map_err(|e| EncodingError::json(e, b""))?;

        let request =
            self.client
                .build_request(Method::Post, auth_server.clone(), Some(bytes), None);
        let response = self.client.execute(request).await?;
        let received_at = self.client.clock().now();

        let parsed = parse_grant_response(&response)?;
        Grant::from_response(access_requests, parsed, received_at).map_err(Into::into)
    }

    /// Drive a grant forward at its continuation URI, carrying the
    /// `interact_ref` handed back by the consent redirect when there is
    /// one. Callers honor `wait_seconds` themselves.
    pub async fn continue_grant(&self, grant: &Grant, interact_ref: Option<&str>) -> Result<Grant> {
        let continuation = continuation_of(grant)?;

        let bytes = interact_ref
            .map(|interact_ref| {
                serde_json::to_vec(&ContinueRequestBody { interact_ref })
                    .map_err(|e| EncodingError::json(e, b""))
            })
            .transpose()?;

        let request = self.client.build_request(
            Method::Post,
            continuation.continue_uri.clone(),
            bytes,
            Some(AuthScheme::Gnap.header_value(continuation.continue_token.expose())),
        );
        let response = self.client.execute(request).await?;
        let received_at = self.client.clock().now();

        let parsed = parse_grant_response(&response)?;
        grant.clone().advance(parsed, received_at).map_err(Into::into)
    }

    /// Cancel a grant at its continuation URI. On success the returned
    /// grant is terminally cancelled and holds no tokens.
    pub async fn cancel(&self, grant: &Grant) -> Result<Grant> {
        let continuation = continuation_of(grant)?;

        let request = self.client.build_request(
            Method::Delete,
            continuation.continue_uri.clone(),
            None,
            Some(AuthScheme::Gnap.header_value(continuation.continue_token.expose())),
        );
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(rejection_error(&response));
        }
        Ok(grant.clone().cancelled())
    }

    /// Verify the `hash` parameter of an interaction-finish redirect:
    /// `base64url(SHA-256(client_nonce "\n" as_nonce "\n" interact_ref "\n"
    /// grant_endpoint))`.
    pub fn verify_interaction_finish(
        &self,
        client_nonce: &str,
        as_nonce: &str,
        interact_ref: &str,
        grant_endpoint: &str,
        received_hash: &str,
    ) -> Result<()> {
        let preimage = format!("{client_nonce}\n{as_nonce}\n{interact_ref}\n{grant_endpoint}");
        let expected = URL_SAFE_NO_PAD.encode(sha256(preimage.as_bytes()));
        if expected != received_hash {
            return Err(ProtocolError::FinishHashMismatch.into());
        }
        Ok(())
    }
}

fn continuation_of(grant: &Grant) -> Result<&Continuation> {
    if grant.state().is_terminal() {
        return Err(ProtocolError::UnexpectedTransition(format!(
            "grant in state {:?} has no continuation to drive",
            grant.state()
        ))
        .into());
    }
    grant.continuation().ok_or_else(|| {
        ProtocolError::UnexpectedTransition(
            "grant carries no continuation".to_string(),
        )
        .into()
    })
}

pub(crate) fn parse_grant_response(response: &HttpResponse) -> Result<GrantResponseBody> {
    if !response.is_success() {
        return Err(rejection_error(response));
    }
    response.body_json().map_err(Into::into)
}

/// Turn a non-2xx response into the typed rejection, reusing whatever the
/// error-extraction interceptor already parsed.
pub(crate) fn rejection_error(response: &HttpResponse) -> Error {
    let api_error = response.api_error().cloned().unwrap_or_else(|| ApiError {
        code: None,
        message: format!(
            "authorization server returned status {}",
            response.status()
        ),
        detail: None,
    });
    ProtocolError::GrantRejected(api_error).into()
}
