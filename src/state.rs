//! # Authorization Context
//!
//! The per-session record threaded through the PAR, authorize, consent,
//! verification, token, and credential endpoints. A context is created at
//! the pushed authorization request, mutated only through the narrow
//! operations on [`crate::provider::ContextStore`], and destroyed on
//! expiry.

use chrono::serde::ts_seconds;
use chrono::{DateTime, Duration, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::document::Identity;

/// Time-to-live of gateway state, by kind.
pub enum Expire {
    /// A pushed authorization request not exchanged within this window
    /// expires.
    PushedRequest,

    /// Access token lifetime.
    AccessToken,

    /// Ephemeral ECDH key lifetime: long enough to span the verification
    /// leg's wallet round trip.
    EphemeralKey,

    /// Documents cached per session by the verification leg.
    Document,

    /// Pre-minted credential offers.
    Offer,

    /// Sliding window within which a DPoP `jti` is considered a replay, and
    /// the accepted `iat` clock skew.
    ProofWindow,
}

impl Expire {
    /// The duration before expiry.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        match self {
            Self::PushedRequest | Self::ProofWindow => Duration::seconds(60),
            Self::AccessToken => Duration::hours(1),
            Self::EphemeralKey => Duration::minutes(10),
            Self::Document | Self::Offer => Duration::minutes(5),
        }
    }
}

/// PKCE code challenge methods accepted at the pushed authorization request
/// endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    /// `base64url(SHA-256(code_verifier))`.
    #[default]
    S256,

    /// The verifier is compared as-is.
    #[serde(rename = "plain")]
    Plain,
}

/// The access token bound to an authorization context at the token
/// endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TokenInfo {
    /// Opaque 32-byte access token.
    pub access_token: String,

    /// Absolute expiry.
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

/// The authorization context: one per issuance flow, keyed by `session_id`
/// and uniquely indexed by `request_uri`, `code`, `access_token`, and
/// `verifier_response_code`.
#[derive(Builder, Clone, Debug, Default, Deserialize, Serialize)]
#[builder(setter(into))]
pub struct AuthorizationContext {
    /// Opaque unique id of this flow. Immutable after creation.
    pub session_id: String,

    /// `urn:ietf:params:oauth:request_uri:<uuid>` handed to the wallet at
    /// PAR.
    pub request_uri: String,

    /// Single-use authorization code.
    pub code: String,

    /// Requested credential scope. Nonempty.
    pub scope: String,

    /// Client identifier, possibly derived as `x509_san_dns:<host>`.
    pub client_id: String,

    /// Wallet callback URI.
    pub redirect_uri: String,

    /// Client state, echoed back to the wallet.
    #[builder(default)]
    pub state: String,

    /// Unpredictable nonce, returned to the wallet as `c_nonce`.
    pub nonce: String,

    /// PKCE challenge, if the client supplied one.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,

    /// Absolute expiry of the pushed request.
    #[builder(default = "Utc::now() + Expire::PushedRequest.duration()")]
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,

    /// Whether the authorization code has been redeemed. Monotone true.
    #[builder(default)]
    pub is_used: bool,

    /// Whether the user has granted consent. Monotone true.
    #[builder(default)]
    pub consent: bool,

    /// 32-byte id binding this context to a key in the ephemeral key store.
    /// Unique per context.
    pub ephemeral_encryption_key_id: String,

    /// 32-byte id used to rendezvous the verification leg. Unique per
    /// context.
    pub verifier_response_code: String,

    /// Subject identity. Populated by consent or the verification leg.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,

    /// The upstream source selected for this issuance.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentic_source: Option<String>,

    /// The issued access token. Single issuance.
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenInfo>,
}

impl AuthorizationContext {
    /// Returns a new [`AuthorizationContextBuilder`].
    #[must_use]
    pub fn builder() -> AuthorizationContextBuilder {
        AuthorizationContextBuilder::default()
    }

    /// Whether the pushed request window has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.signed_duration_since(Utc::now()).num_seconds() < 0
    }

    /// Whether the bound access token (if any) is still valid.
    #[must_use]
    pub fn token_valid(&self) -> bool {
        self.token
            .as_ref()
            .is_some_and(|t| t.expires_at.signed_duration_since(Utc::now()).num_seconds() >= 0)
    }
}
