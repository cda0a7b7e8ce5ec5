//! # Request Object Endpoint Handler
//!
//! This endpoint is used by the wallet to retrieve the Authorization
//! Request Object for the inner verification. Instead of sending the
//! Request Object in the consent redirect, the gateway sends a
//! `request_uri` which the wallet dereferences here.
//!
//! The Request Object is built on demand: the handler fetches (or creates)
//! the session's ephemeral encryption key, advertises its public JWK in
//! the client metadata, and signs the object as an RS256 JWT with the
//! issuer's certificate chain in `x5c`.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;

use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::jose::jws;
use crate::oid4vp::types::{
    ClientMetadata, Jwks, RequestObject, RequestObjectRequest, RequestObjectResponse,
    SELF_ISSUED_AUD,
};
use crate::provider::{Caches, ContextStore, Metadata, Provider, Signer};
use crate::{Error, Result, invalid, server};

/// The `typ` of a signed authorization request JWT.
const REQUEST_OBJECT_JWT_TYPE: &str = "oauth-authz-req+jwt";

/// Request object handler.
async fn request_object(
    _issuer: &str, provider: &impl Provider, request: RequestObjectRequest,
) -> Result<RequestObjectResponse> {
    tracing::debug!("request_object");

    let context = ContextStore::by_verifier_response_code(provider, &request.id)
        .await
        .map_err(|e| server!("issue fetching context: {e}"))?
        .ok_or_else(|| invalid!("unknown request id"))?;

    if context.is_expired() {
        return Err(Error::InvalidGrant("authorization request has expired".to_string()));
    }

    let config = Metadata::gateway(provider)
        .await
        .map_err(|e| server!("issue getting configuration: {e}"))?;

    let encryption_jwk = Caches::ephemeral_keys(provider)
        .get_or_create(&context.ephemeral_encryption_key_id)
        .map_err(|e| server!("issue creating ephemeral key: {e}"))?;

    let request_object = RequestObject {
        response_type: "vp_token".to_string(),
        response_mode: "direct_post.jwt".to_string(),
        response_uri: config.response_endpoint,
        client_id: config.verifier_client_id.clone(),
        iss: config.verifier_client_id,
        aud: SELF_ISSUED_AUD.to_string(),
        state: context.verifier_response_code,
        nonce: context.nonce,
        client_metadata: ClientMetadata {
            vp_formats: HashMap::from([(
                "dc+sd-jwt".to_string(),
                json!({"sd-jwt_alg_values": ["ES256"], "kb-jwt_alg_values": ["ES256"]}),
            )]),
            jwks: Jwks { keys: vec![encryption_jwk] },
            authorization_encrypted_response_alg: "ECDH-ES".to_string(),
            authorization_encrypted_response_enc: "A256GCM".to_string(),
        },
        iat: Utc::now().timestamp(),
    };

    let material = Signer::signing_material(provider)
        .await
        .map_err(|e| server!("issue getting signing material: {e}"))?;
    let jwt = jws::sign(REQUEST_OBJECT_JWT_TYPE, &request_object, &material)
        .map_err(|e| server!("issue signing request object: {e}"))?;

    Ok(RequestObjectResponse(jwt))
}

impl Handler for Request<RequestObjectRequest, NoHeaders> {
    type Response = RequestObjectResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        request_object(issuer, provider, self.body)
    }
}

impl Body for RequestObjectRequest {}
