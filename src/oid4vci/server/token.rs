//! # Token Endpoint Handler
//!
//! Exchanges a single-use authorization code for a DPoP-bound access
//! token. The code is forfeited through the context store's atomic
//! find-and-mark-used: of two concurrent exchanges of the same code,
//! exactly one succeeds and the other receives `invalid_grant`.

use chrono::Utc;
use url::Url;

use crate::core::{generate, pkce};
use crate::dpop::{Dpop, TOKEN_TYPE};
use crate::endpoint::{Body, Handler, Headers, Request, Response};
use crate::oid4vci::types::{AuthorizationDetail, TokenHeaders, TokenRequest, TokenResponse};
use crate::provider::{Caches, ContextStore, Metadata, Provider};
use crate::state::{CodeChallengeMethod, Expire, TokenInfo};
use crate::{Error, Result, invalid, server};

/// Token request handler.
async fn token(
    _issuer: &str, provider: &impl Provider, request: Request<TokenRequest, TokenHeaders>,
) -> Result<TokenResponse> {
    tracing::debug!("token");

    let Some(headers) = request.headers else {
        return Err(Error::InvalidDpopProof("no DPoP proof presented".to_string()));
    };
    let request = request.body;

    if request.grant_type != "authorization_code" {
        return Err(invalid!("unsupported grant_type: {}", request.grant_type));
    }

    // the forfeit is atomic: a second exchange of the same code gets None
    let context = ContextStore::forfeit_code(provider, &request.code)
        .await
        .map_err(|e| server!("issue forfeiting code: {e}"))?
        .ok_or_else(|| {
            Error::InvalidGrant(
                "authorization code is invalid or has already been used".to_string(),
            )
        })?;

    if context.is_expired() {
        return Err(Error::InvalidGrant("authorization request has expired".to_string()));
    }
    if !context.consent {
        return Err(Error::InvalidGrant("user has not granted consent".to_string()));
    }

    if let Some(challenge) = &context.code_challenge {
        let Some(verifier) = &request.code_verifier else {
            return Err(Error::InvalidGrant("code_verifier is required".to_string()));
        };
        let derived = match context.code_challenge_method.clone().unwrap_or_default() {
            CodeChallengeMethod::S256 => pkce::code_challenge(verifier),
            CodeChallengeMethod::Plain => verifier.clone(),
        };
        if &derived != challenge {
            return Err(Error::InvalidGrant(
                "code_verifier does not match the challenge".to_string(),
            ));
        }
    }

    let config = Metadata::gateway(provider)
        .await
        .map_err(|e| server!("issue getting configuration: {e}"))?;
    let endpoint_url = Url::parse(&config.token_endpoint)
        .map_err(|e| server!("issue parsing token endpoint: {e}"))?;

    Dpop::from(headers.dpop)
        .validate("POST", &endpoint_url, None, Caches::replay_cache(provider))
        .map_err(|e| Error::InvalidDpopProof(e.to_string()))?;

    let token = TokenInfo {
        access_token: generate::access_token(),
        expires_at: Utc::now() + Expire::AccessToken.duration(),
    };
    ContextStore::add_token(provider, &context.session_id, &token)
        .await
        .map_err(|e| server!("issue binding token: {e}"))?;

    let issuer_metadata = Metadata::issuer(provider)
        .await
        .map_err(|e| server!("issue getting issuer metadata: {e}"))?;
    let authorization_details = issuer_metadata.configuration_for_scope(&context.scope).map(|id| {
        vec![AuthorizationDetail {
            type_: "openid_credential".to_string(),
            credential_configuration_id: id.to_string(),
            credential_identifiers: Some(vec![id.to_string()]),
        }]
    });

    Ok(TokenResponse {
        access_token: token.access_token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: Expire::AccessToken.duration().num_seconds(),
        scope: context.scope,
        state: context.state,
        c_nonce: context.nonce,
        authorization_details,
    })
}

impl Handler for Request<TokenRequest, TokenHeaders> {
    type Response = TokenResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        token(issuer, provider, self)
    }
}

impl Body for TokenRequest {}
impl Headers for TokenHeaders {}
