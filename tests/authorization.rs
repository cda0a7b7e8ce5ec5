//! Authorization Code Flow with DPoP
//!
//! Drives the gateway's endpoints the way a wallet would: pushed
//! authorization request, authorization, consent, token exchange, and the
//! credential endpoint.

mod utils;

use base64ct::{Base64, Encoding};
use url::Url;
use vc_gateway::core::pkce;
use vc_gateway::endpoint::{self, Request, Response};
use vc_gateway::oid4vci::types::{
    AuthorizeRequest, CredentialHeaders, CredentialRequest, CredentialResponse, GrantAuth,
    GrantRequest, NotificationHeaders, NotificationRequest, ParRequest, Proof, TokenHeaders,
    TokenRequest, TokenResponse,
};
use vc_gateway::sd_jwt;
use vc_gateway::state::CodeChallengeMethod;

use utils::wallet::Holder;
use utils::{
    CREDENTIAL_ISSUER, NORMAL_USER, ProviderImpl, USER_PASSWORD, WALLET_CLIENT, WALLET_REDIRECT,
};

fn token_url() -> String {
    format!("{CREDENTIAL_ISSUER}/oauth/token")
}

fn credential_url() -> String {
    format!("{CREDENTIAL_ISSUER}/credential")
}

/// PAR for the given scope, returning the `request_uri`.
async fn push_request(provider: &ProviderImpl, scope: &str, verifier: &str) -> String {
    let request = ParRequest {
        client_id: WALLET_CLIENT.to_string(),
        redirect_uri: WALLET_REDIRECT.to_string(),
        scope: scope.to_string(),
        state: "state-1".to_string(),
        code_challenge: Some(pkce::code_challenge(verifier)),
        code_challenge_method: Some(CodeChallengeMethod::S256),
    };
    let response =
        endpoint::handle(CREDENTIAL_ISSUER, request, provider).await.expect("should push");
    assert_eq!(response.status, 201);
    assert_eq!(response.body.expires_in, 60);
    response.body.request_uri
}

/// Authorize, grant consent via basic login, and return `(code, session)`.
async fn authorize_with_consent(provider: &ProviderImpl, request_uri: &str) -> (String, String) {
    let request = AuthorizeRequest {
        request_uri: request_uri.to_string(),
        client_id: WALLET_CLIENT.to_string(),
    };
    let response =
        endpoint::handle(CREDENTIAL_ISSUER, request, provider).await.expect("should authorize");

    // consent not granted yet: the user agent is sent to the consent page
    let authorize = response.body;
    assert!(authorize.code.is_none());
    let redirect = authorize.redirect_url.expect("should redirect to consent");
    assert!(redirect.contains("/authorization/consent?session_id="));

    let grant = GrantRequest {
        auth: GrantAuth::Basic {
            session_id: authorize.session_id.clone(),
            username: NORMAL_USER.to_string(),
            password: USER_PASSWORD.to_string(),
        },
        authentic_source: None,
    };
    let granted =
        endpoint::handle(CREDENTIAL_ISSUER, grant, provider).await.expect("should grant").body;

    // display claims rendered from the source document per the VCTM
    assert_eq!(granted.svg_template_claims["given_name"].value, "John");
    assert_eq!(granted.svg_template_claims["pin"].label, "Social security PIN");

    let redirect = Url::parse(&granted.redirect_url).expect("should parse");
    let code = redirect
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .expect("should carry code");
    let state = redirect.query_pairs().find(|(k, _)| k == "state").map(|(_, v)| v.to_string());
    assert_eq!(state.as_deref(), Some("state-1"));

    (code, authorize.session_id)
}

/// Exchange a code for a token.
async fn exchange(
    provider: &ProviderImpl, holder: &Holder, code: &str, verifier: Option<&str>,
) -> vc_gateway::Result<Response<TokenResponse>> {
    let request = Request {
        body: TokenRequest {
            grant_type: "authorization_code".to_string(),
            code: code.to_string(),
            redirect_uri: Some(WALLET_REDIRECT.to_string()),
            client_id: Some(WALLET_CLIENT.to_string()),
            code_verifier: verifier.map(String::from),
        },
        headers: Some(TokenHeaders { dpop: holder.dpop(&token_url(), "POST", None) }),
    };
    endpoint::handle(CREDENTIAL_ISSUER, request, provider).await
}

/// Request a credential with a DPoP-bound access token.
async fn request_credential(
    provider: &ProviderImpl, holder: &Holder, token: &TokenResponse, configuration_id: &str,
) -> vc_gateway::Result<Response<CredentialResponse>> {
    let request = Request {
        body: CredentialRequest {
            credential_configuration_id: Some(configuration_id.to_string()),
            proof: Some(Proof {
                proof_type: "jwt".to_string(),
                jwt: holder.proof_jwt(CREDENTIAL_ISSUER, &token.c_nonce),
            }),
            ..CredentialRequest::default()
        },
        headers: Some(CredentialHeaders {
            authorization: format!("DPoP {}", token.access_token),
            dpop: holder.dpop(&credential_url(), "POST", Some(&token.access_token)),
        }),
    };
    endpoint::handle(CREDENTIAL_ISSUER, request, provider).await
}

// Happy path: PAR, authorize, basic-auth consent, DPoP token exchange, and
// SD-JWT issuance.
#[tokio::test]
async fn sd_jwt_issuance() {
    let provider = ProviderImpl::new();
    let holder = Holder::new();
    let verifier = pkce::code_verifier();

    let request_uri = push_request(&provider, "ehic_1", &verifier).await;
    assert!(request_uri.starts_with("urn:ietf:params:oauth:request_uri:"));

    let (code, _session) = authorize_with_consent(&provider, &request_uri).await;

    let token =
        exchange(&provider, &holder, &code, Some(&verifier)).await.expect("should exchange").body;
    assert_eq!(token.token_type, "DPoP");
    assert_eq!(token.expires_in, 3600);
    assert!(!token.c_nonce.is_empty());
    let details = token.authorization_details.as_ref().expect("should have details");
    assert_eq!(details[0].credential_configuration_id, "EHICCredential");

    let response = request_credential(&provider, &holder, &token, "EHICCredential")
        .await
        .expect("should issue")
        .body;
    assert_eq!(response.credentials.len(), 1);

    // the SD-JWT header carries the expected media type
    let credential = &response.credentials[0].credential;
    let issuer_jwt = credential.split('~').next().expect("should have issuer JWT");
    let header = jsonwebtoken::decode_header(issuer_jwt).expect("should decode");
    assert_eq!(header.typ.as_deref(), Some("dc+sd-jwt"));

    // disclosed subject matches the authenticated identity
    let claims = sd_jwt::disclosed_claims(credential).expect("should unpack");
    assert_eq!(claims["given_name"], "John");
    assert_eq!(claims["family_name"], "Doe");

    // the credential subject was registered with the status-list backend
    let registered = provider.registered();
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].vct, "urn:eudi:ehic:1");

    // wallet acknowledges storage
    let notification = Request {
        body: NotificationRequest {
            notification_id: response.notification_id.expect("should have id"),
            ..NotificationRequest::default()
        },
        headers: Some(NotificationHeaders {
            authorization: format!("DPoP {}", token.access_token),
        }),
    };
    let acknowledged = endpoint::handle(CREDENTIAL_ISSUER, notification, &provider)
        .await
        .expect("should acknowledge");
    assert_eq!(acknowledged.status, 204);
}

// A code can be exchanged at most once.
#[tokio::test]
async fn code_replay() {
    let provider = ProviderImpl::new();
    let holder = Holder::new();
    let verifier = pkce::code_verifier();

    let request_uri = push_request(&provider, "ehic_1", &verifier).await;
    let (code, _) = authorize_with_consent(&provider, &request_uri).await;

    exchange(&provider, &holder, &code, Some(&verifier)).await.expect("first should succeed");

    let err = exchange(&provider, &holder, &code, Some(&verifier))
        .await
        .expect_err("second should fail");
    assert_eq!(err.to_json()["error"], "invalid_grant");
}

// Of two concurrent exchanges of the same code, exactly one succeeds.
#[tokio::test]
async fn concurrent_exchange() {
    let provider = ProviderImpl::new();
    let holder = Holder::new();
    let verifier = pkce::code_verifier();

    let request_uri = push_request(&provider, "ehic_1", &verifier).await;
    let (code, _) = authorize_with_consent(&provider, &request_uri).await;

    let (first, second) = tokio::join!(
        exchange(&provider, &holder, &code, Some(&verifier)),
        exchange(&provider, &holder, &code, Some(&verifier)),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);

    let err = if first.is_err() { first.unwrap_err() } else { second.unwrap_err() };
    assert_eq!(err.to_json()["error"], "invalid_grant");
}

// A proof whose `htu` names another endpoint is rejected.
#[tokio::test]
async fn dpop_wrong_htu() {
    let provider = ProviderImpl::new();
    let holder = Holder::new();
    let verifier = pkce::code_verifier();

    let request_uri = push_request(&provider, "ehic_1", &verifier).await;
    let (code, _) = authorize_with_consent(&provider, &request_uri).await;

    let request = Request {
        body: TokenRequest {
            grant_type: "authorization_code".to_string(),
            code,
            redirect_uri: Some(WALLET_REDIRECT.to_string()),
            client_id: Some(WALLET_CLIENT.to_string()),
            code_verifier: Some(verifier),
        },
        headers: Some(TokenHeaders {
            dpop: holder.dpop("https://evil.example.com/oauth/token", "POST", None),
        }),
    };
    let err = endpoint::handle(CREDENTIAL_ISSUER, request, &provider)
        .await
        .expect_err("should reject");
    assert_eq!(err.to_json()["error"], "invalid_dpop_proof");
}

// A code pushed with a challenge cannot be exchanged without its verifier.
#[tokio::test]
async fn pkce_required() {
    let provider = ProviderImpl::new();
    let holder = Holder::new();
    let verifier = pkce::code_verifier();

    let request_uri = push_request(&provider, "ehic_1", &verifier).await;
    let (code, _) = authorize_with_consent(&provider, &request_uri).await;

    let err = exchange(&provider, &holder, &code, None).await.expect_err("should fail");
    assert_eq!(err.to_json()["error"], "invalid_grant");

    let err = exchange(&provider, &holder, &code, Some("wrong-verifier"))
        .await
        .expect_err("should fail");
    assert_eq!(err.to_json()["error"], "invalid_grant");
}

// The credential endpoint rejects a proof whose `ath` does not hash the
// presented access token.
#[tokio::test]
async fn credential_ath_mismatch() {
    let provider = ProviderImpl::new();
    let holder = Holder::new();
    let verifier = pkce::code_verifier();

    let request_uri = push_request(&provider, "ehic_1", &verifier).await;
    let (code, _) = authorize_with_consent(&provider, &request_uri).await;
    let token =
        exchange(&provider, &holder, &code, Some(&verifier)).await.expect("should exchange").body;

    let request = Request {
        body: CredentialRequest {
            credential_configuration_id: Some("EHICCredential".to_string()),
            proof: Some(Proof {
                proof_type: "jwt".to_string(),
                jwt: holder.proof_jwt(CREDENTIAL_ISSUER, &token.c_nonce),
            }),
            ..CredentialRequest::default()
        },
        headers: Some(CredentialHeaders {
            authorization: format!("DPoP {}", token.access_token),
            // proof hashes a different token
            dpop: holder.dpop(&credential_url(), "POST", Some("some-other-token")),
        }),
    };
    let err = endpoint::handle(CREDENTIAL_ISSUER, request, &provider)
        .await
        .expect_err("should reject");
    assert_eq!(err.to_json()["error"], "invalid_dpop_proof");
}

// Metadata maps the mdoc configuration to mso_mdoc: the credential comes
// back as base64 of valid CBOR.
#[tokio::test]
async fn mdoc_issuance() {
    let provider = ProviderImpl::new();
    let holder = Holder::new();
    let verifier = pkce::code_verifier();

    let request_uri = push_request(&provider, "ehic_mdoc", &verifier).await;
    let (code, _) = authorize_with_consent(&provider, &request_uri).await;
    let token =
        exchange(&provider, &holder, &code, Some(&verifier)).await.expect("should exchange").body;

    let response = request_credential(&provider, &holder, &token, "EHICCredential_mdoc")
        .await
        .expect("should issue")
        .body;

    let bytes =
        Base64::decode_vec(&response.credentials[0].credential).expect("should be base64");
    let value: ciborium::Value =
        ciborium::de::from_reader(bytes.as_slice()).expect("should be CBOR");
    let ciborium::Value::Map(entries) = value else {
        panic!("expected a CBOR map");
    };
    assert!(entries.iter().any(|(k, _)| k.as_text() == Some("docType")));
}

// A pushed request not exchanged within its window cannot be used.
#[tokio::test]
async fn expired_context() {
    let provider = ProviderImpl::new();
    let verifier = pkce::code_verifier();

    let request_uri = push_request(&provider, "ehic_1", &verifier).await;
    let request = AuthorizeRequest {
        request_uri: request_uri.clone(),
        client_id: WALLET_CLIENT.to_string(),
    };
    let session_id = endpoint::handle(CREDENTIAL_ISSUER, request.clone(), &provider)
        .await
        .expect("should authorize")
        .body
        .session_id;

    provider.expire_session(&session_id);

    let err = endpoint::handle(CREDENTIAL_ISSUER, request, &provider)
        .await
        .expect_err("should reject");
    assert_eq!(err.to_json()["error"], "invalid_grant");
}

// Every context gets its own ephemeral encryption key id and verifier
// response code.
#[tokio::test]
async fn ephemeral_key_ids_unique() {
    let provider = ProviderImpl::new();
    let verifier = pkce::code_verifier();

    let mut key_ids = vec![];
    let mut response_codes = vec![];
    for _ in 0..2 {
        let request_uri = push_request(&provider, "ehic_1", &verifier).await;
        let session_id = endpoint::handle(
            CREDENTIAL_ISSUER,
            AuthorizeRequest { request_uri, client_id: WALLET_CLIENT.to_string() },
            &provider,
        )
        .await
        .expect("should authorize")
        .body
        .session_id;

        let context = provider.context_by_session(&session_id).expect("should exist");
        key_ids.push(context.ephemeral_encryption_key_id);
        response_codes.push(context.verifier_response_code);
    }

    assert_ne!(key_ids[0], key_ids[1]);
    assert_ne!(response_codes[0], response_codes[1]);
}
