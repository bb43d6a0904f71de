use {
    super::{error::*, types::*, *},
    crate::{
        client::OpenPaymentsClient,
        clock::Clock,
        error::Error,
        http::{
            message::{Headers, HttpRequest, HttpResponse},
            transport::{Transport, TransportError},
        },
        signature::{digest::CONTENT_DIGEST, engine::SIGNATURE_INPUT, keys::KeyMaterial},
    },
    async_trait::async_trait,
    chrono::{DateTime, Duration, Utc},
    std::sync::Mutex,
};

const NOW: i64 = 1_700_000_000;

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }
}

/// Replays canned responses and records every request it executes.
#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<Vec<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    fn respond_with(responses: Vec<HttpResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn json(status: u16, body: &str) -> HttpResponse {
        HttpResponse::new(
            status,
            Headers::new().with("content-type", "application/json"),
            body.as_bytes().to_vec(),
        )
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(TransportError::ConnectionFailed(
                "script exhausted".to_string(),
            ));
        }
        Ok(responses.remove(0))
    }
}

fn client_with(responses: Vec<HttpResponse>) -> OpenPaymentsClient {
    OpenPaymentsClient::builder(KeyMaterial::from_seed(&[7u8; 32], "test-key-1").unwrap())
        .with_transport(ScriptedTransport::respond_with(responses))
        .with_clock(FixedClock)
        .build()
}

fn auth_server() -> url::Url {
    url::Url::parse("https://auth.wallet.example.com/").unwrap()
}

fn incoming_payment_access() -> Vec<AccessRequest> {
    vec![AccessRequest::new("incoming-payment", ["create", "read"])]
}

fn interaction_response() -> &'static str {
    r#"{
        "continue": {
            "access_token": { "value": "cont_123" },
            "uri": "https://auth.wallet.example.com/continue/abc",
            "wait": 5
        },
        "interact": {
            "redirect": "https://auth.wallet.example.com/interact/abc",
            "finish": "as-nonce-1"
        }
    }"#
}

fn approval_response() -> &'static str {
    r#"{
        "access_token": {
            "value": "tok_xyz",
            "manage": "https://auth.wallet.example.com/token/xyz",
            "expires_in": 3600,
            "access": [ { "type": "incoming-payment", "actions": ["create", "read"] } ]
        }
    }"#
}

async fn request_grant(client: &OpenPaymentsClient, interact: Option<InteractRequest>) -> crate::error::Result<Grant> {
    client
        .grants()
        .request(
            &auth_server(),
            incoming_payment_access(),
            ClientIdentity::reference("https://shop.example.com/.well-known/pay"),
            interact,
        )
        .await
}

fn interactive_start() -> Option<InteractRequest> {
    Some(InteractRequest::redirect().with_finish(FinishRequest::redirect(
        "https://shop.example.com/finish",
        "client-nonce-1",
    )))
}

#[tokio::test]
async fn interactive_flow_reaches_approved_via_continue() {
    let client = client_with(vec![
        ScriptedTransport::json(200, interaction_response()),
        ScriptedTransport::json(200, approval_response()),
    ]);

    let grant = request_grant(&client, interactive_start()).await.unwrap();
    assert_eq!(grant.state(), GrantState::InteractionRequired);
    assert!(grant.interaction().is_some());
    assert!(grant.access_token().is_none());
    let continuation = grant.continuation().unwrap();
    assert_eq!(continuation.continue_token.expose(), "cont_123");
    assert_eq!(continuation.wait_seconds, Some(5));
    assert_eq!(
        grant.interaction().unwrap().finish_nonce.as_deref(),
        Some("as-nonce-1")
    );

    let grant = client
        .grants()
        .continue_grant(&grant, Some("abc123"))
        .await
        .unwrap();
    assert_eq!(grant.state(), GrantState::Approved);
    assert!(grant.interaction().is_none());
    let token = grant.access_token().unwrap();
    assert_eq!(token.value.expose(), "tok_xyz");
    assert_eq!(
        token.expires_at,
        Some(DateTime::from_timestamp(NOW + 3600, 0).unwrap())
    );
    assert_eq!(token.granted_access.len(), 1);
}

#[tokio::test]
async fn continuation_only_response_is_pending() {
    let client = client_with(vec![ScriptedTransport::json(
        200,
        r#"{"continue":{"access_token":{"value":"cont_1"},"uri":"https://auth.wallet.example.com/continue/p","wait":0}}"#,
    )]);

    let grant = request_grant(&client, None).await.unwrap();
    assert_eq!(grant.state(), GrantState::Pending);
    assert!(grant.interaction().is_none());
    // wait=0 is distinct from an absent wait and surfaced as-is.
    assert_eq!(grant.continuation().unwrap().wait_seconds, Some(0));
}

#[tokio::test]
async fn immediate_approval_skips_interaction() {
    let client = client_with(vec![ScriptedTransport::json(200, approval_response())]);
    let grant = request_grant(&client, None).await.unwrap();
    assert_eq!(grant.state(), GrantState::Approved);
    assert!(grant.access_token().is_some());
}

#[tokio::test]
async fn response_without_token_or_continuation_is_malformed() {
    let client = client_with(vec![ScriptedTransport::json(200, r#"{}"#)]);
    let err = request_grant(&client, None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::MalformedGrantResponse(_))
    ));
}

#[tokio::test]
async fn rejection_surfaces_the_extracted_error() {
    let client = client_with(vec![ScriptedTransport::json(
        400,
        r#"{"error":"invalid_client","error_description":"unknown key"}"#,
    )]);
    let err = request_grant(&client, None).await.unwrap_err();
    match err {
        Error::Protocol(ProtocolError::GrantRejected(api)) => {
            assert_eq!(api.code.as_deref(), Some("invalid_client"));
            assert_eq!(api.message, "unknown key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn grant_request_is_signed_and_carries_a_digest() {
    let transport = std::sync::Arc::new(ScriptedTransport::respond_with(vec![
        ScriptedTransport::json(200, approval_response()),
    ]));
    let client = OpenPaymentsClient::builder(
        KeyMaterial::from_seed(&[7u8; 32], "test-key-1").unwrap(),
    )
    .with_transport(SharedTransport(std::sync::Arc::clone(&transport)))
    .with_clock(FixedClock)
    .build();

    request_grant(&client, None).await.unwrap();

    let requests = transport.requests.lock().unwrap();
    let sent = &requests[0];
    assert!(sent.headers().contains(SIGNATURE_INPUT));
    assert!(sent.headers().contains("signature"));
    assert!(sent.headers().contains(CONTENT_DIGEST));
    assert_eq!(sent.headers().get("content-type"), Some("application/json"));
    let input = sent.headers().get(SIGNATURE_INPUT).unwrap();
    assert!(input.contains("\"content-digest\""));
    assert!(input.contains("keyid=\"test-key-1\""));
    assert!(input.contains(&format!("created={NOW}")));

    let body: serde_json::Value = serde_json::from_slice(sent.body().unwrap()).unwrap();
    assert_eq!(body["access_token"]["access"][0]["type"], "incoming-payment");
    assert_eq!(body["client"]["key"], "https://shop.example.com/.well-known/pay");
    assert!(body.get("interact").is_none());
}

/// Adapter so a test can keep a handle on the transport it hands the
/// client.
struct SharedTransport(std::sync::Arc<ScriptedTransport>);

#[async_trait]
impl Transport for SharedTransport {
    async fn execute(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        self.0.execute(request).await
    }
}

#[tokio::test]
async fn continue_authenticates_with_the_continuation_token() {
    let transport = std::sync::Arc::new(ScriptedTransport::respond_with(vec![
        ScriptedTransport::json(200, interaction_response()),
        ScriptedTransport::json(200, approval_response()),
    ]));
    let client = OpenPaymentsClient::builder(
        KeyMaterial::from_seed(&[7u8; 32], "test-key-1").unwrap(),
    )
    .with_transport(SharedTransport(std::sync::Arc::clone(&transport)))
    .with_clock(FixedClock)
    .build();

    let grant = request_grant(&client, interactive_start()).await.unwrap();
    client
        .grants()
        .continue_grant(&grant, Some("abc123"))
        .await
        .unwrap();

    let requests = transport.requests.lock().unwrap();
    let sent = &requests[1];
    assert_eq!(
        sent.target_uri(),
        "https://auth.wallet.example.com/continue/abc"
    );
    assert_eq!(sent.headers().get("authorization"), Some("GNAP cont_123"));
    // The authorization header exists before signing, so it is covered.
    assert!(sent
        .headers()
        .get(SIGNATURE_INPUT)
        .unwrap()
        .contains("\"authorization\""));
    let body: serde_json::Value = serde_json::from_slice(sent.body().unwrap()).unwrap();
    assert_eq!(body["interact_ref"], "abc123");
}

#[tokio::test]
async fn continue_without_interact_ref_sends_an_empty_body() {
    let transport = std::sync::Arc::new(ScriptedTransport::respond_with(vec![
        ScriptedTransport::json(
            200,
            r#"{"continue":{"access_token":{"value":"cont_1"},"uri":"https://auth.wallet.example.com/continue/p"}}"#,
        ),
        ScriptedTransport::json(200, approval_response()),
    ]));
    let client = OpenPaymentsClient::builder(
        KeyMaterial::from_seed(&[7u8; 32], "test-key-1").unwrap(),
    )
    .with_transport(SharedTransport(std::sync::Arc::clone(&transport)))
    .with_clock(FixedClock)
    .build();

    let grant = request_grant(&client, None).await.unwrap();
    assert_eq!(grant.state(), GrantState::Pending);
    let grant = client.grants().continue_grant(&grant, None).await.unwrap();
    assert_eq!(grant.state(), GrantState::Approved);

    let requests = transport.requests.lock().unwrap();
    assert!(requests[1].body().is_none());
    assert!(!requests[1].headers().contains(CONTENT_DIGEST));
}

#[tokio::test]
async fn cancel_reaches_terminal_state_and_clears_tokens() {
    let client = client_with(vec![
        ScriptedTransport::json(200, interaction_response()),
        HttpResponse::new(202, Headers::new(), Vec::new()),
    ]);

    let grant = request_grant(&client, interactive_start()).await.unwrap();
    let cancelled = client.grants().cancel(&grant).await.unwrap();
    assert_eq!(cancelled.state(), GrantState::TerminalCancelled);
    assert!(cancelled.access_token().is_none());
    assert!(cancelled.continuation().is_none());

    // Terminal grants accept no further transitions.
    let err = client
        .grants()
        .continue_grant(&cancelled, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::UnexpectedTransition(_))
    ));
}

#[tokio::test]
async fn rejected_continue_leaves_the_grant_usable() {
    let client = client_with(vec![
        ScriptedTransport::json(200, interaction_response()),
        ScriptedTransport::json(403, r#"{"error":"too_fast"}"#),
    ]);

    let grant = request_grant(&client, interactive_start()).await.unwrap();
    let err = client
        .grants()
        .continue_grant(&grant, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::GrantRejected(_))
    ));
    // The caller's grant is untouched and still continuable.
    assert_eq!(grant.state(), GrantState::InteractionRequired);
    assert!(grant.continuation().is_some());
}

#[test]
fn into_failed_records_the_rejection() {
    let body: GrantResponseBody =
        serde_json::from_str(interaction_response()).unwrap();
    let grant = Grant::from_response(
        incoming_payment_access(),
        body,
        DateTime::from_timestamp(NOW, 0).unwrap(),
    )
    .unwrap();

    let failed = grant.into_failed(crate::http::interceptors::ApiError {
        code: Some("denied".to_string()),
        message: "user declined".to_string(),
        detail: None,
    });
    assert_eq!(failed.state(), GrantState::TerminalFailed);
    assert!(failed.access_token().is_none());
    assert_eq!(failed.failure().unwrap().code.as_deref(), Some("denied"));
}

#[tokio::test]
async fn rotation_replaces_the_token() {
    let client = client_with(vec![
        ScriptedTransport::json(200, approval_response()),
        ScriptedTransport::json(
            200,
            r#"{"access_token":{"value":"tok_new","manage":"https://auth.wallet.example.com/token/new","expires_in":7200}}"#,
        ),
    ]);

    let grant = request_grant(&client, None).await.unwrap();
    let old = grant.access_token().unwrap().clone();

    let fresh = client.tokens().rotate(&old).await.unwrap();
    assert_eq!(fresh.value.expose(), "tok_new");
    assert_eq!(
        fresh.manage_uri.as_str(),
        "https://auth.wallet.example.com/token/new"
    );

    let rotated = grant.with_rotated_token(fresh.clone()).unwrap();
    assert_eq!(rotated.state(), GrantState::Approved);
    assert_eq!(rotated.access_token().unwrap().value.expose(), "tok_new");
    // Granted access carries over from the approval.
    assert_eq!(rotated.access_requests().len(), 1);
}

#[tokio::test]
async fn rotation_sends_a_signed_gnap_request_to_the_manage_uri() {
    let transport = std::sync::Arc::new(ScriptedTransport::respond_with(vec![
        ScriptedTransport::json(200, approval_response()),
        ScriptedTransport::json(
            200,
            r#"{"access_token":{"value":"tok_new","manage":"https://auth.wallet.example.com/token/new"}}"#,
        ),
    ]));
    let client = OpenPaymentsClient::builder(
        KeyMaterial::from_seed(&[7u8; 32], "test-key-1").unwrap(),
    )
    .with_transport(SharedTransport(std::sync::Arc::clone(&transport)))
    .with_clock(FixedClock)
    .build();

    let grant = request_grant(&client, None).await.unwrap();
    let token = grant.access_token().unwrap().clone();
    client.tokens().rotate(&token).await.unwrap();

    let requests = transport.requests.lock().unwrap();
    let sent = &requests[1];
    assert_eq!(
        sent.target_uri(),
        "https://auth.wallet.example.com/token/xyz"
    );
    assert_eq!(sent.headers().get("authorization"), Some("GNAP tok_xyz"));
    assert!(sent.headers().contains(SIGNATURE_INPUT));
}

#[tokio::test]
async fn unauthorized_rotation_is_unrotatable() {
    let client = client_with(vec![
        ScriptedTransport::json(200, approval_response()),
        ScriptedTransport::json(401, r#"{"error":"invalid_token"}"#),
    ]);
    let grant = request_grant(&client, None).await.unwrap();
    let err = client
        .tokens()
        .rotate(grant.access_token().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Token(TokenError::Unrotatable)));
}

#[tokio::test]
async fn revocation_succeeds_on_204_and_reports_missing_tokens() {
    let client = client_with(vec![
        ScriptedTransport::json(200, approval_response()),
        HttpResponse::new(204, Headers::new(), Vec::new()),
        HttpResponse::new(404, Headers::new(), Vec::new()),
    ]);
    let grant = request_grant(&client, None).await.unwrap();
    let token = grant.access_token().unwrap();

    client.tokens().revoke(token).await.unwrap();
    let err = client.tokens().revoke(token).await.unwrap_err();
    assert!(matches!(err, Error::Token(TokenError::NotFound)));
}

#[tokio::test]
async fn covered_set_can_vary_per_request_on_one_client() {
    use crate::signature::base::CoveredComponent;

    let transport = std::sync::Arc::new(ScriptedTransport::respond_with(vec![
        ScriptedTransport::json(200, r#"{"ok":true}"#),
        ScriptedTransport::json(200, r#"{"ok":true}"#),
    ]));
    let client = OpenPaymentsClient::builder(
        KeyMaterial::from_seed(&[7u8; 32], "test-key-1").unwrap(),
    )
    .with_transport(SharedTransport(std::sync::Arc::clone(&transport)))
    .with_clock(FixedClock)
    .build();

    let uri = url::Url::parse("https://wallet.example.com/alice?first=10").unwrap();
    client
        .resource_request(crate::http::message::Method::Get, uri.clone(), None, None)
        .await
        .unwrap();
    client
        .resource_request_with_components(
            crate::http::message::Method::Get,
            uri,
            None,
            None,
            vec![
                CoveredComponent::Method,
                CoveredComponent::TargetUri,
                CoveredComponent::Query,
            ],
        )
        .await
        .unwrap();

    let requests = transport.requests.lock().unwrap();
    let first = requests[0].headers().get(SIGNATURE_INPUT).unwrap();
    let second = requests[1].headers().get(SIGNATURE_INPUT).unwrap();
    assert!(first.starts_with("sig=(\"@method\" \"@target-uri\");"));
    assert!(second.starts_with("sig=(\"@method\" \"@target-uri\" \"@query\");"));
    assert_ne!(first, second);
}

#[tokio::test]
async fn locally_expired_tokens_never_reach_the_wire() {
    let transport = std::sync::Arc::new(ScriptedTransport::respond_with(Vec::new()));
    let client = OpenPaymentsClient::builder(
        KeyMaterial::from_seed(&[7u8; 32], "test-key-1").unwrap(),
    )
    .with_transport(SharedTransport(std::sync::Arc::clone(&transport)))
    .with_clock(FixedClock)
    .build();

    let token = AccessToken {
        value: TokenValue::new("tok_old"),
        manage_uri: url::Url::parse("https://auth.wallet.example.com/token/old").unwrap(),
        expires_at: Some(DateTime::from_timestamp(NOW - 1, 0).unwrap()),
        granted_access: Vec::new(),
    };

    let err = client
        .resource_request(
            crate::http::message::Method::Get,
            url::Url::parse("https://wallet.example.com/alice/incoming-payments").unwrap(),
            None,
            Some(&token),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Token(TokenError::Expired { .. })));
    assert!(transport.requests.lock().unwrap().is_empty());
}

#[test]
fn expiry_helpers_track_the_threshold() {
    let now = DateTime::from_timestamp(NOW, 0).unwrap();
    let token = AccessToken {
        value: TokenValue::new("tok"),
        manage_uri: url::Url::parse("https://auth.wallet.example.com/token/t").unwrap(),
        expires_at: Some(now + Duration::seconds(120)),
        granted_access: Vec::new(),
    };
    assert!(!token.is_expired(now));
    assert!(token.is_expiring_within(now, Duration::seconds(180)));
    assert!(!token.is_expiring_within(now, Duration::seconds(60)));

    // Same checks via the client-scoped helper, which reads the clock.
    let client = client_with(Vec::new());
    assert!(client.tokens().is_expiring_within(&token, Duration::seconds(180)));
    assert!(!client.tokens().is_expiring_within(&token, Duration::seconds(60)));

    let unbounded = AccessToken {
        expires_at: None,
        ..token
    };
    assert!(!unbounded.is_expiring_within(now, Duration::days(365)));
}

#[test]
fn finish_hash_verification() {
    let client = client_with(Vec::new());
    let grant_endpoint = "https://auth.wallet.example.com/";
    let preimage = format!("client-nonce-1\nas-nonce-1\nabc123\n{grant_endpoint}");
    let expected = {
        use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
        URL_SAFE_NO_PAD.encode(crate::signature::digest::sha256(preimage.as_bytes()))
    };

    client
        .grants()
        .verify_interaction_finish(
            "client-nonce-1",
            "as-nonce-1",
            "abc123",
            grant_endpoint,
            &expected,
        )
        .unwrap();

    let err = client
        .grants()
        .verify_interaction_finish(
            "client-nonce-1",
            "as-nonce-1",
            "abc123",
            grant_endpoint,
            "bogus",
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Protocol(ProtocolError::FinishHashMismatch)
    ));
}

#[test]
fn finish_nonce_is_unpadded_base64url_with_128_bits() {
    let nonce = generate_finish_nonce().unwrap();
    assert_eq!(nonce.len(), 22);
    assert!(!nonce.contains('='));
    assert_ne!(nonce, generate_finish_nonce().unwrap());
}

#[test]
fn token_values_print_as_a_mask() {
    let token = TokenValue::new("tok_secret");
    assert!(!format!("{token:?}").contains("tok_secret"));
    assert!(!format!("{token}").contains("tok_secret"));
    assert_eq!(token.expose(), "tok_secret");
}

#[test]
fn grant_request_body_serializes_jwk_client_keys_inline() {
    let key = KeyMaterial::from_seed(&[9u8; 32], "kid-1").unwrap();
    let body = GrantRequestBody {
        access_token: AccessTokenRequest {
            access: incoming_payment_access(),
        },
        client: ClientIdentity::jwk(key.public_jwk()),
        interact: Some(
            InteractRequest::redirect().with_finish(FinishRequest::redirect(
                "https://shop.example.com/finish",
                "n-1",
            )),
        ),
    };
    let value = serde_json::to_value(&body).unwrap();
    assert_eq!(value["client"]["key"]["kty"], "OKP");
    assert_eq!(value["interact"]["start"][0], "redirect");
    assert_eq!(value["interact"]["finish"]["method"], "redirect");
    assert_eq!(value["interact"]["finish"]["uri"], "https://shop.example.com/finish");
    assert_eq!(value["interact"]["finish"]["nonce"], "n-1");
}

#[test]
fn access_request_limits_serialize_in_snake_case() {
    let request = AccessRequest::new("outgoing-payment", ["create"])
        .with_identifier("https://wallet.example.com/alice")
        .with_limits(AccessLimits {
            debit_amount: Some(Amount {
                value: "1000".to_string(),
                asset_code: "USD".to_string(),
                asset_scale: 2,
            }),
            receive_amount: None,
            interval: Some("R12/2026-08-01T00:00:00Z/P1M".to_string()),
        });
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["type"], "outgoing-payment");
    assert_eq!(value["limits"]["debit_amount"]["asset_code"], "USD");
    assert_eq!(value["limits"]["debit_amount"]["asset_scale"], 2);
    assert!(value["limits"].get("receive_amount").is_none());
}
