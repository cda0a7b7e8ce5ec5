//! # Direct Post Endpoint Handler
//!
//! This endpoint is where the wallet posts its encrypted Authorization
//! Response (`direct_post.jwt`). The JWE's `kid` names the session's
//! ephemeral key: the handler decrypts with the matching private key,
//! extracts the PID identity from the presented credential, resolves the
//! documents that identity holds in the datastore, and caches them for the
//! session. The wallet is redirected back to the consent callback carrying
//! the `verifier_response_code`.

use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::jose::jwe;
use crate::oid4vp::types::{DirectPostRequest, DirectPostResponse, ResponseParameters};
use crate::provider::{Caches, ContextStore, DocumentStore, Metadata, Provider};
use crate::sd_jwt;
use crate::{Result, invalid, server};

/// Direct post handler.
async fn direct_post(
    _issuer: &str, provider: &impl Provider, request: DirectPostRequest,
) -> Result<DirectPostResponse> {
    tracing::debug!("direct_post");

    let kid = jwe::header_kid(&request.response)
        .map_err(|e| invalid!("issue reading response header: {e}"))?
        .ok_or_else(|| invalid!("response carries no `kid`"))?;

    let keys = Caches::ephemeral_keys(provider);
    let Some(key_pair) = keys.key_pair(&kid) else {
        return Err(invalid!("no encryption key for this response"));
    };

    let payload = jwe::decrypt(&request.response, &key_pair)
        .map_err(|e| invalid!("issue decrypting response: {e}"))?;
    let parameters: ResponseParameters = serde_json::from_slice(&payload)
        .map_err(|e| invalid!("issue parsing response: {e}"))?;

    let presentation = parameters
        .first_presentation()
        .ok_or_else(|| invalid!("response carries no vp_token"))?;
    let identity = sd_jwt::extract_pid(presentation)
        .map_err(|e| invalid!("no PID credential in vp_token: {e}"))?;

    // the key id is the rendezvous back to the authorization context
    let context = ContextStore::by_encryption_key(provider, &kid)
        .await
        .map_err(|e| server!("issue fetching context: {e}"))?
        .ok_or_else(|| invalid!("no session for this response"))?;

    let constructor = Metadata::constructor(provider, &context.scope)
        .await
        .map_err(|e| server!("issue getting credential constructor: {e}"))?;
    let documents = DocumentStore::documents_for_identity(provider, &constructor.vct, &identity)
        .await
        .map_err(|e| server!("issue querying datastore: {e}"))?;

    Caches::document_cache(provider).put(context.session_id.clone(), documents);
    ContextStore::add_identity(provider, &context.session_id, &identity)
        .await
        .map_err(|e| server!("issue binding identity: {e}"))?;

    // the leg is complete
    keys.remove(&kid);

    let config = Metadata::gateway(provider)
        .await
        .map_err(|e| server!("issue getting configuration: {e}"))?;

    Ok(DirectPostResponse {
        redirect_uri: format!(
            "{}?response_code={}",
            config.consent_callback_endpoint, context.verifier_response_code
        ),
    })
}

impl Handler for Request<DirectPostRequest, NoHeaders> {
    type Response = DirectPostResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        direct_post(issuer, provider, self.body)
    }
}

impl Body for DirectPostRequest {}
