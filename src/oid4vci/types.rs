//! # OAuth / OpenID4VCI Types
//!
//! Request, response, configuration, and metadata types for the issuance
//! endpoints. The types serialize to and from JSON in accordance with the
//! specifications.

use std::collections::HashMap;

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Identity;
use crate::state::CodeChallengeMethod;
use crate::vctm::{DisplayClaim, Vctm};

// ----------------------------------------------------------------
// Pushed Authorization Request
// ----------------------------------------------------------------

/// A Pushed Authorization Request per
/// [RFC 9126](https://www.rfc-editor.org/rfc/rfc9126.html).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ParRequest {
    /// Client identifier. May be derived as `x509_san_dns:<host>` when the
    /// allow-list entry opts in.
    pub client_id: String,

    /// Wallet callback URI. Must be HTTPS or a registered custom scheme.
    pub redirect_uri: String,

    /// Requested credential scope.
    pub scope: String,

    /// Client state, echoed back to the wallet.
    #[serde(default)]
    pub state: String,

    /// PKCE code challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE code challenge method.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,
}

/// Response to a Pushed Authorization Request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ParResponse {
    /// `urn:ietf:params:oauth:request_uri:<uuid>`, to be presented at the
    /// authorization endpoint.
    pub request_uri: String,

    /// Lifetime of the request URI in seconds.
    pub expires_in: i64,
}

// ----------------------------------------------------------------
// Authorize
// ----------------------------------------------------------------

/// An authorization request referencing a pushed request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthorizeRequest {
    /// The `request_uri` returned at PAR.
    pub request_uri: String,

    /// Client identifier, matched against the pushed request.
    pub client_id: String,
}

/// Authorization response: either a redirect to the consent step or the
/// authorization code.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthorizeResponse {
    /// Where to send the user agent when consent has not yet been granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,

    /// The authorization code, once consent has been granted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Client state, echoed.
    pub state: String,

    /// The scope under authorization.
    pub scope: String,

    /// The session this authorization belongs to.
    pub session_id: String,

    /// Client identifier, echoed.
    pub client_id: String,
}

// ----------------------------------------------------------------
// Consent
// ----------------------------------------------------------------

/// Entry point for the user-agent leg: asks where to send the user's
/// wallet for the inner verification.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConsentRequest {
    /// The session under consent.
    pub session_id: String,
}

/// The wallet redirect initiating the inner verification leg.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConsentResponse {
    /// Wallet deep link carrying `client_id` and `request_uri` query
    /// parameters.
    pub redirect_url: String,
}

/// Identity binding and consent grant.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GrantRequest {
    /// How the user authenticated.
    #[serde(flatten)]
    pub auth: GrantAuth,

    /// The upstream source to issue from, when the user holds documents
    /// from more than one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentic_source: Option<String>,
}

/// The supported user-authentication methods.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "auth_method", rename_all = "snake_case")]
pub enum GrantAuth {
    /// Username and password, validated against the user directory.
    Basic {
        /// The session under consent.
        session_id: String,

        /// Directory username.
        username: String,

        /// Directory password.
        password: String,
    },

    /// A PID presentation received on the verification leg.
    PidAuth {
        /// The rendezvous code minted at PAR and returned by the
        /// verification leg's consent callback.
        verifier_response_code: String,
    },
}

/// Consent response: the display claim bundle and the wallet redirect.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GrantResponse {
    /// `svg_id → {label, value}` extracted from the source document per the
    /// credential type's VCTM.
    pub svg_template_claims: HashMap<String, DisplayClaim>,

    /// `wallet_uri?code=<code>&state=<state>`.
    pub redirect_url: String,
}

// ----------------------------------------------------------------
// Token
// ----------------------------------------------------------------

/// An authorization-code token request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TokenRequest {
    /// Must be `authorization_code`.
    pub grant_type: String,

    /// The single-use authorization code.
    pub code: String,

    /// Wallet callback URI, echoed from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Client identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// PKCE code verifier. Required when the pushed request carried a code
    /// challenge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}

/// Headers accompanying a token request.
#[derive(Clone, Debug, Default)]
pub struct TokenHeaders {
    /// The DPoP proof JWT.
    pub dpop: String,
}

/// Token response per [RFC 6749] with `OpenID4VCI` additions.
///
/// [RFC 6749]: https://www.rfc-editor.org/rfc/rfc6749.html
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    /// Opaque, DPoP-bound access token.
    pub access_token: String,

    /// Always `DPoP`.
    pub token_type: String,

    /// Token lifetime in seconds.
    pub expires_in: i64,

    /// The authorized scope.
    pub scope: String,

    /// Client state, echoed.
    pub state: String,

    /// The context nonce, to be bound into credential request proofs.
    pub c_nonce: String,

    /// The credentials the token authorizes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_details: Option<Vec<AuthorizationDetail>>,
}

/// An `openid_credential` authorization detail.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthorizationDetail {
    /// Always `openid_credential`.
    #[serde(rename = "type")]
    pub type_: String,

    /// The credential configuration the token authorizes.
    pub credential_configuration_id: String,

    /// Identifiers usable at the credential endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_identifiers: Option<Vec<String>>,
}

// ----------------------------------------------------------------
// Credential
// ----------------------------------------------------------------

/// A credential request.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialRequest {
    /// The credential configuration requested, resolved to a format via
    /// issuer metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_configuration_id: Option<String>,

    /// Alternative: a credential identifier from `authorization_details`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_identifier: Option<String>,

    /// Format hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<CredentialFormat>,

    /// Proof of possession of the holder's key material.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof: Option<Proof>,

    /// Multiple proofs; the first is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proofs: Option<Proofs>,
}

/// A single key proof.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Proof {
    /// Must be `jwt`.
    pub proof_type: String,

    /// The proof JWT, carrying the holder's JWK in its header.
    pub jwt: String,
}

/// Multiple key proofs, by proof type.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Proofs {
    /// JWT proofs.
    #[serde(default)]
    pub jwt: Vec<String>,
}

/// Headers accompanying a credential request.
#[derive(Clone, Debug, Default)]
pub struct CredentialHeaders {
    /// `DPoP <access_token>`.
    pub authorization: String,

    /// The DPoP proof JWT, with `ath` binding the access token.
    pub dpop: String,
}

/// Credential response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialResponse {
    /// The issued credentials.
    pub credentials: Vec<Credential>,

    /// Identifier the wallet can use at the notification endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
}

/// A single issued credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Credential {
    /// Compact SD-JWT, or base64-encoded CBOR for mDL documents.
    pub credential: String,
}

/// The credential formats the gateway can dispatch.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum CredentialFormat {
    /// SD-JWT VC, legacy media type.
    #[serde(rename = "vc+sd-jwt")]
    VcSdJwt,

    /// SD-JWT VC.
    #[default]
    #[serde(rename = "dc+sd-jwt")]
    DcSdJwt,

    /// ISO 18013-5 mDL / mdoc, CBOR+COSE encoded.
    #[serde(rename = "mso_mdoc")]
    MsoMdoc,
}

impl CredentialFormat {
    /// Whether the format is one of the SD-JWT media types.
    #[must_use]
    pub const fn is_sd_jwt(&self) -> bool {
        matches!(self, Self::VcSdJwt | Self::DcSdJwt)
    }
}

// ----------------------------------------------------------------
// Notification
// ----------------------------------------------------------------

/// A wallet event notification for an issued credential.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NotificationRequest {
    /// The id returned in the credential response.
    pub notification_id: String,

    /// What happened to the credential.
    pub event: NotificationEvent,

    /// Free-text detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_description: Option<String>,
}

/// Wallet notification events.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    /// The credential was stored in the wallet.
    #[default]
    CredentialAccepted,

    /// Issuance failed on the wallet side.
    CredentialFailure,

    /// The user deleted the credential.
    CredentialDeleted,
}

/// Headers accompanying a notification request.
#[derive(Clone, Debug, Default)]
pub struct NotificationHeaders {
    /// `DPoP <access_token>`.
    pub authorization: String,
}

/// Notification response (empty body, 204).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct NotificationResponse;

// ----------------------------------------------------------------
// Credential offers
// ----------------------------------------------------------------

/// Fetch of a pre-minted credential offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OfferRequest {
    /// The offer UUID.
    pub id: String,
}

/// A pre-minted credential offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OfferResponse {
    /// The offer parameters, ready to hand to a wallet.
    pub credential_offer: CredentialOfferParameters,

    /// base64 PNG data URI of the offer deep link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

/// A stored credential offer, keyed by UUID with a short time-to-live.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialOffer {
    /// Offer UUID.
    pub id: String,

    /// The offer parameters.
    pub credential_offer: CredentialOfferParameters,

    /// Absolute expiry.
    #[serde(with = "ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl CredentialOffer {
    /// Whether the offer has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.signed_duration_since(Utc::now()).num_seconds() < 0
    }
}

/// Credential Offer parameters per `OpenID4VCI`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialOfferParameters {
    /// The issuer the offer can be redeemed at.
    pub credential_issuer: String,

    /// The offered credential configurations.
    pub credential_configuration_ids: Vec<String>,

    /// Grants usable to redeem the offer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grants: Option<Grants>,
}

/// Grants carried by a credential offer.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Grants {
    /// Authorization code grant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<AuthorizationCodeGrant>,
}

/// Authorization code grant parameters.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct AuthorizationCodeGrant {
    /// Opaque state tying the authorization request back to the offer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_state: Option<String>,
}

// ----------------------------------------------------------------
// Metadata
// ----------------------------------------------------------------

/// Fetch of the signed issuer metadata document.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct IssuerMetadataRequest;

/// Fetch of the signed authorization-server metadata document.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct ServerMetadataRequest;

/// Credential issuer metadata
/// (`/.well-known/openid-credential-issuer`).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct IssuerMetadata {
    /// The issuer identifier (external URL).
    pub credential_issuer: String,

    /// The credential endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_endpoint: Option<String>,

    /// Supported credential configurations, by id.
    #[serde(default)]
    pub credential_configurations_supported: HashMap<String, CredentialConfiguration>,

    /// JWS over this document, attached by the metadata publisher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_metadata: Option<String>,

    /// Remaining metadata, published as-is.
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl IssuerMetadata {
    /// Resolve the format of a credential configuration or credential
    /// identifier.
    #[must_use]
    pub fn format_for(&self, configuration_id: &str) -> Option<CredentialFormat> {
        self.credential_configurations_supported.get(configuration_id).map(|c| c.format.clone())
    }

    /// The configuration id backing a scope, if any.
    #[must_use]
    pub fn configuration_for_scope(&self, scope: &str) -> Option<&str> {
        self.credential_configurations_supported
            .iter()
            .find(|(_, config)| config.scope.as_deref() == Some(scope))
            .map(|(id, _)| id.as_str())
    }
}

/// A supported credential configuration.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialConfiguration {
    /// Wire format of credentials issued under this configuration.
    pub format: CredentialFormat,

    /// The OAuth scope requesting this configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// The verifiable credential type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vct: Option<String>,

    /// Remaining configuration, published as-is.
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

/// OAuth authorization server metadata
/// (`/.well-known/oauth-authorization-server`).
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ServerMetadata {
    /// The authorization server identifier.
    pub issuer: String,

    /// The token endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// JWS over this document, attached by the metadata publisher.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed_metadata: Option<String>,

    /// Remaining metadata, published as-is.
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

// ----------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------

/// The gateway's immutable startup configuration. Loaded once by the
/// embedding application and handed to handlers via
/// [`crate::provider::Metadata`].
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// External issuer URL.
    pub credential_issuer: String,

    /// External token endpoint URL, matched against DPoP `htu`.
    pub token_endpoint: String,

    /// External credential endpoint URL, matched against DPoP `htu`.
    pub credential_endpoint: String,

    /// User-facing consent page.
    pub consent_endpoint: String,

    /// Where the verification leg sends the user agent after `direct_post`.
    pub consent_callback_endpoint: String,

    /// Where wallets fetch request objects for the verification leg.
    pub request_object_endpoint: String,

    /// Where wallets post encrypted verification responses.
    pub response_endpoint: String,

    /// Wallet deep-link base used to launch the inner verification.
    pub wallet_url: String,

    /// The client id the gateway presents as a verifier.
    pub verifier_client_id: String,

    /// External URL of the status-list registry.
    pub registry_external_url: String,
}

/// An allow-listed OAuth client.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct OauthClient {
    /// Redirect URIs the client may use.
    pub redirect_uris: Vec<String>,

    /// Scopes the client may request.
    pub scopes: Vec<String>,

    /// Whether a `x509_san_dns:<host>` derived id is accepted for this
    /// client.
    #[serde(default)]
    pub allow_san_dns: bool,
}

/// Per-scope credential construction settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialConstructor {
    /// The verifiable credential type constructed for the scope.
    pub vct: String,

    /// Type metadata driving consent-time display.
    #[serde(default)]
    pub vctm: Vctm,

    /// How users authenticate for this scope.
    #[serde(default)]
    pub auth_method: AuthMethod,
}

/// User-authentication variants.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Username/password against the user directory; documents come from
    /// the datastore.
    #[default]
    Basic,

    /// PID presentation via the inner verification leg; documents come
    /// from the session's document cache.
    PidAuth,
}

// ----------------------------------------------------------------
// Users
// ----------------------------------------------------------------

/// A directory user, for the basic authentication method.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct User {
    /// Unique username.
    pub username: String,

    /// bcrypt hash of the password.
    pub password_hash: String,

    /// The identity bound onto the authorization context on login.
    pub identity: Identity,

    /// The document type the user's documents are stored under.
    pub vct: String,

    /// The source holding the user's documents.
    pub authentic_source: String,
}
