//! Access-token lifecycle: rotation, revocation, expiry.
//!
//! Both operations address the token's manage URI, authenticate with
//! `Authorization: GNAP <token>`, and are signed like every other request.
//! Rotation replaces the token (the old value is invalid once the new one
//! arrives); revocation destroys it and is idempotent on the server side.

use {
    super::{
        error::TokenError,
        rejection_error,
        types::{AccessToken, TokenRotationBody},
    },
    crate::{
        client::OpenPaymentsClient,
        error::Result,
        http::{interceptors::AuthScheme, message::Method},
    },
    chrono::Duration,
};

/// Token-lifecycle operations, scoped to a client.
pub struct TokenActions<'a> {
    client: &'a OpenPaymentsClient,
}

impl OpenPaymentsClient {
    pub fn tokens(&self) -> TokenActions<'_> {
        TokenActions { client: self }
    }
}

impl TokenActions<'_> {
    /// Rotate a token at its manage URI, returning the replacement.
    ///
    /// On success the previous token is invalid and must not be used again.
    /// A 401 means the token is no longer rotatable and the caller must
    /// restart grant acquisition.
    pub async fn rotate(&self, token: &AccessToken) -> Result<AccessToken> {
        let request = self.client.build_request(
            Method::Post,
            token.manage_uri.clone(),
            None,
            Some(AuthScheme::Gnap.header_value(token.value.expose())),
        );
        let response = self.client.execute(request).await?;
        let received_at = self.client.clock().now();

        match response.status() {
            401 => return Err(TokenError::Unrotatable.into()),
            404 => return Err(TokenError::NotFound.into()),
            status if !(200..300).contains(&status) => {
                return Err(rejection_error(&response))
            }
            _ => {}
        }

        let body: TokenRotationBody = response.body_json()?;
        AccessToken::from_body(body.access_token, received_at).map_err(Into::into)
    }

    /// Revoke a token at its manage URI. Servers answer 204 with an empty
    /// body; revoking an already-revoked token yields the same outcome.
    pub async fn revoke(&self, token: &AccessToken) -> Result<()> {
        let request = self.client.build_request(
            Method::Delete,
            token.manage_uri.clone(),
            None,
            Some(AuthScheme::Gnap.header_value(token.value.expose())),
        );
        let response = self.client.execute(request).await?;

        match response.status() {
            404 => Err(TokenError::NotFound.into()),
            status if (200..300).contains(&status) => Ok(()),
            _ => Err(rejection_error(&response)),
        }
    }

    /// True when `token` expires within `threshold` of the client clock's
    /// current time.
    pub fn is_expiring_within(&self, token: &AccessToken, threshold: Duration) -> bool {
        token.is_expiring_within(self.client.clock().now(), threshold)
    }
}
