//! # OpenID4VP Types
//!
//! Request object and authorization response types for the verification
//! leg.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::jose::jwk::PublicKeyJwk;

/// The audience of a request object addressed to a self-issued OP.
pub const SELF_ISSUED_AUD: &str = "https://self-issued.me/v2";

/// A wallet's fetch of a previously prepared Request Object.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RequestObjectRequest {
    /// The session's `verifier_response_code`, embedded in the
    /// `request_uri` handed out at consent.
    pub id: String,
}

/// The signed Request Object, as a compact JWT.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct RequestObjectResponse(pub String);

/// An `OpenID4VP` Authorization Request Object, per [RFC 9101].
///
/// [RFC 9101]: https://www.rfc-editor.org/rfc/rfc9101.html
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct RequestObject {
    /// The type of response expected from the wallet: `vp_token`.
    pub response_type: String,

    /// How the response is returned: `direct_post.jwt`.
    pub response_mode: String,

    /// Where the wallet posts the encrypted response.
    pub response_uri: String,

    /// The verifier's client id.
    pub client_id: String,

    /// Issuer of the request object (the verifier's client id).
    pub iss: String,

    /// Fixed audience for self-issued OPs.
    pub aud: String,

    /// Opaque rendezvous value, echoed by the wallet.
    pub state: String,

    /// Nonce binding the presentation to this session.
    pub nonce: String,

    /// Verifier capabilities and the session's encryption key.
    pub client_metadata: ClientMetadata,

    /// Issuance time, epoch seconds.
    pub iat: i64,
}

/// Verifier metadata advertised to the wallet.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ClientMetadata {
    /// The presentation formats the verifier accepts.
    pub vp_formats: HashMap<String, Value>,

    /// The ephemeral keys the wallet may encrypt to.
    pub jwks: Jwks,

    /// JWE `alg` for the authorization response.
    pub authorization_encrypted_response_alg: String,

    /// JWE `enc` for the authorization response.
    pub authorization_encrypted_response_enc: String,
}

/// A JWK set.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Jwks {
    /// The keys.
    pub keys: Vec<PublicKeyJwk>,
}

/// The wallet's encrypted Authorization Response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DirectPostRequest {
    /// A compact JWE whose `kid` names the session's ephemeral key.
    pub response: String,
}

/// Where to send the user agent after the response has been processed.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DirectPostResponse {
    /// The consent callback, carrying the `verifier_response_code`.
    pub redirect_uri: String,
}

/// The decrypted Authorization Response parameters.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ResponseParameters {
    /// The VP token: one presentation, or several.
    pub vp_token: Value,

    /// Describes how the presentation satisfies the request. Unused by the
    /// PID extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_submission: Option<Value>,

    /// The request's `state`, echoed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl ResponseParameters {
    /// The first presentation in the VP token.
    #[must_use]
    pub fn first_presentation(&self) -> Option<&str> {
        match &self.vp_token {
            Value::String(token) => Some(token),
            Value::Array(tokens) => tokens.first().and_then(Value::as_str),
            Value::Object(map) => map.values().next().and_then(|v| match v {
                Value::String(token) => Some(token.as_str()),
                Value::Array(tokens) => tokens.first().and_then(Value::as_str),
                _ => None,
            }),
            _ => None,
        }
    }
}
