//! # Consent Initiation Handler
//!
//! Entry point for the user-agent leg. For scopes authenticated by PID
//! presentation, consent begins by sending the user's wallet into the
//! inner verification: the handler derives the request-object URI that
//! embeds the session's `verifier_response_code` and wraps it in a wallet
//! deep link.

use url::Url;

use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::oid4vci::types::{ConsentRequest, ConsentResponse};
use crate::provider::{ContextStore, Metadata, Provider};
use crate::{Error, Result, invalid, server};

/// Consent initiation handler.
async fn consent(
    _issuer: &str, provider: &impl Provider, request: ConsentRequest,
) -> Result<ConsentResponse> {
    tracing::debug!("consent");

    let context = ContextStore::by_session(provider, &request.session_id)
        .await
        .map_err(|e| server!("issue fetching context: {e}"))?
        .ok_or_else(|| invalid!("unknown session"))?;

    if context.is_expired() {
        return Err(Error::InvalidGrant("authorization request has expired".to_string()));
    }

    let config = Metadata::gateway(provider)
        .await
        .map_err(|e| server!("issue getting configuration: {e}"))?;

    let request_uri =
        format!("{}?id={}", config.request_object_endpoint, context.verifier_response_code);

    let mut redirect = Url::parse(&config.wallet_url)
        .map_err(|e| server!("issue parsing wallet url: {e}"))?;
    redirect
        .query_pairs_mut()
        .append_pair("client_id", &config.verifier_client_id)
        .append_pair("request_uri", &request_uri);

    Ok(ConsentResponse { redirect_url: redirect.to_string() })
}

impl Handler for Request<ConsentRequest, NoHeaders> {
    type Response = ConsentResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        consent(issuer, provider, self.body)
    }
}

impl Body for ConsentRequest {}
