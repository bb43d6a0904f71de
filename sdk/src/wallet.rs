//! Wallet discovery.
//!
//! Resource access starts by resolving a wallet address: a public document
//! naming the wallet's authorization server, resource server, and asset.
//! The wallet also publishes the JWK set its clients sign under at
//! `<wallet>/jwks.json`. Both are plain GETs through the client pipeline.
//!
//! Unlike the GNAP bodies, these documents are Open Payments REST resources
//! and use camelCase field names on the wire.

use {
    crate::{
        client::OpenPaymentsClient,
        error::Result,
        grant::rejection_error,
        http::message::Method,
        signature::keys::Jwk,
    },
    serde::Deserialize,
    url::Url,
};

/// A wallet address document.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAddress {
    pub id: String,
    /// Grant negotiation happens here.
    pub auth_server: String,
    /// Signed resource calls go here.
    pub resource_server: String,
    #[serde(default)]
    pub public_name: Option<String>,
    pub asset_code: String,
    pub asset_scale: u8,
}

/// The wallet's published JWK set.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

/// Wallet-discovery operations, scoped to a client.
pub struct WalletActions<'a> {
    client: &'a OpenPaymentsClient,
}

impl OpenPaymentsClient {
    pub fn wallet(&self) -> WalletActions<'_> {
        WalletActions { client: self }
    }
}

impl WalletActions<'_> {
    /// Fetch the wallet address document.
    pub async fn fetch_address(&self, wallet_address: &Url) -> Result<WalletAddress> {
        let request =
            self.client
                .build_request(Method::Get, wallet_address.clone(), None, None);
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(rejection_error(&response));
        }
        response.body_json().map_err(Into::into)
    }

    /// Fetch the wallet's JWK set from `<wallet>/jwks.json`.
    pub async fn fetch_jwks(&self, wallet_address: &Url) -> Result<JwkSet> {
        let mut uri = wallet_address.clone();
        let path = format!("{}/jwks.json", uri.path().trim_end_matches('/'));
        uri.set_path(&path);

        let request = self.client.build_request(Method::Get, uri, None, None);
        let response = self.client.execute(request).await?;
        if !response.is_success() {
            return Err(rejection_error(&response));
        }
        response.body_json().map_err(Into::into)
    }
}
