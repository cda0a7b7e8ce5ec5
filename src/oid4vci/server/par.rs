//! # Pushed Authorization Request Handler
//!
//! The `par` handler receives the authorization request parameters
//! directly from the wallet ([RFC 9126]), verifies the
//! client/redirect/scope triple against the allow-list, and mints the
//! authorization context that every later endpoint operates on. The wallet
//! receives only a short-lived `request_uri` in exchange.
//!
//! [RFC 9126]: https://www.rfc-editor.org/rfc/rfc9126.html

use crate::core::generate;
use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::oid4vci::types::{OauthClient, ParRequest, ParResponse};
use crate::provider::{ContextStore, Metadata, Provider};
use crate::state::{AuthorizationContext, Expire};
use crate::{Error, Result, invalid, server};

/// The prefix of a client id derived from a TLS client certificate SAN.
const SAN_DNS_PREFIX: &str = "x509_san_dns:";

/// Pushed authorization request handler: verifies the client and persists
/// a new authorization context.
async fn par(
    _issuer: &str, provider: &impl Provider, request: ParRequest,
) -> Result<Response<ParResponse>> {
    tracing::debug!("par");

    let Ok(client) = Metadata::client(provider, &request.client_id).await else {
        return Err(Error::InvalidClient("client is not registered".to_string()));
    };
    request.verify(&client)?;

    let expires_in = Expire::PushedRequest.duration();
    let context = AuthorizationContext::builder()
        .session_id(generate::session_id())
        .request_uri(generate::request_uri())
        .code(generate::auth_code())
        .scope(request.scope)
        .client_id(request.client_id)
        .redirect_uri(request.redirect_uri)
        .state(request.state)
        .nonce(generate::nonce())
        .code_challenge(request.code_challenge)
        .code_challenge_method(request.code_challenge_method)
        .ephemeral_encryption_key_id(generate::key_id())
        .verifier_response_code(generate::key_id())
        .build()
        .map_err(|e| server!("issue building context: {e}"))?;

    ContextStore::put(provider, &context)
        .await
        .map_err(|e| server!("issue saving context: {e}"))?;

    Ok(Response {
        status: 201,
        headers: None,
        body: ParResponse {
            request_uri: context.request_uri,
            expires_in: expires_in.num_seconds(),
        },
    })
}

impl Handler for Request<ParRequest, NoHeaders> {
    type Response = ParResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        par(issuer, provider, self.body)
    }
}

impl Body for ParRequest {}

impl ParRequest {
    fn verify(&self, client: &OauthClient) -> Result<()> {
        tracing::debug!("par::verify");

        if self.scope.is_empty() {
            return Err(invalid!("no scope requested"));
        }
        if self.client_id.starts_with(SAN_DNS_PREFIX) && !client.allow_san_dns {
            return Err(Error::InvalidClient(
                "certificate-derived client ids are not permitted for this client".to_string(),
            ));
        }
        if !client.redirect_uris.iter().any(|uri| uri == &self.redirect_uri) {
            return Err(Error::InvalidClient("redirect_uri is not registered".to_string()));
        }
        if !client.scopes.iter().any(|scope| scope == &self.scope) {
            return Err(Error::InvalidClient("scope is not permitted".to_string()));
        }

        // registered custom schemes are allowed, plain http is not
        if self.redirect_uri.starts_with("http://") {
            return Err(invalid!("redirect_uri must be HTTPS or a custom scheme"));
        }

        Ok(())
    }
}
