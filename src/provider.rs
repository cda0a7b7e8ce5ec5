//! # Provider
//!
//! The traits implementers provide to connect the gateway to its
//! externals: the persistent stores, the credential-signing backend, the
//! status-list backend, the signing material, and the in-process caches.
//!
//! Each trait covers one concern; [`Provider`] is the super-trait handlers
//! require. The persistent datastore stays behind the narrow queries
//! defined here, and the signing/status backends are typed RPC contracts
//! with no transport prescribed.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{DocumentCache, EphemeralKeys, ReplayCache};
use crate::document::{CompleteDocument, Identity};
use crate::jose::jwk::PublicKeyJwk;
use crate::jose::jws::SigningMaterial;
use crate::oid4vci::types::{
    CredentialConstructor, CredentialOffer, GatewayConfig, IssuerMetadata, OauthClient,
    ServerMetadata, User,
};
use crate::state::{AuthorizationContext, TokenInfo};
use crate::status::InitialStatus;

/// Issuance Provider trait.
pub trait Provider:
    Metadata
    + ContextStore
    + UserStore
    + OfferStore
    + DocumentStore
    + StatusListClient
    + CredentialSigner
    + Signer
    + Caches
    + Clone
{
}

/// A blanket implementation for `Provider` trait so that any type
/// implementing the required super traits is considered a `Provider`.
impl<T> Provider for T where
    T: Metadata
        + ContextStore
        + UserStore
        + OfferStore
        + DocumentStore
        + StatusListClient
        + CredentialSigner
        + Signer
        + Caches
        + Clone
{
}

/// The `Metadata` trait is used by implementers to provide configuration
/// and metadata to the library.
pub trait Metadata: Send + Sync {
    /// The gateway's startup configuration.
    fn gateway(&self) -> impl Future<Output = Result<GatewayConfig>> + Send;

    /// Credential issuer metadata, as loaded from the configured metadata
    /// document.
    fn issuer(&self) -> impl Future<Output = Result<IssuerMetadata>> + Send;

    /// OAuth authorization server metadata.
    fn server(&self) -> impl Future<Output = Result<ServerMetadata>> + Send;

    /// The allow-list entry for a client, or an error if the client is
    /// unknown.
    fn client(&self, client_id: &str) -> impl Future<Output = Result<OauthClient>> + Send;

    /// Credential construction settings for a scope, or an error if no
    /// constructor is configured.
    fn constructor(&self, scope: &str)
    -> impl Future<Output = Result<CredentialConstructor>> + Send;
}

/// Persistent store of authorization contexts.
///
/// Implementations must maintain unique indexes on `request_uri`, `code`,
/// `session_id`, the bound access token, and `verifier_response_code`, so
/// that collisions fail rather than silently overwrite.
pub trait ContextStore: Send + Sync {
    /// Persist a newly created context.
    fn put(&self, context: &AuthorizationContext) -> impl Future<Output = Result<()>> + Send;

    /// Look up by `request_uri`.
    fn by_request_uri(
        &self, request_uri: &str,
    ) -> impl Future<Output = Result<Option<AuthorizationContext>>> + Send;

    /// Look up by session id.
    fn by_session(
        &self, session_id: &str,
    ) -> impl Future<Output = Result<Option<AuthorizationContext>>> + Send;

    /// Look up by bound access token.
    fn by_access_token(
        &self, access_token: &str,
    ) -> impl Future<Output = Result<Option<AuthorizationContext>>> + Send;

    /// Look up by verifier response code.
    fn by_verifier_response_code(
        &self, code: &str,
    ) -> impl Future<Output = Result<Option<AuthorizationContext>>> + Send;

    /// Look up by ephemeral encryption key id.
    fn by_encryption_key(
        &self, key_id: &str,
    ) -> impl Future<Output = Result<Option<AuthorizationContext>>> + Send;

    /// Atomically find the context holding an unused authorization `code`
    /// and mark it used, returning the context as it was before the
    /// update.
    ///
    /// Returns `Ok(None)` when the code is unknown **or already used**: of
    /// two concurrent exchanges of the same code, exactly one receives the
    /// context.
    fn forfeit_code(
        &self, code: &str,
    ) -> impl Future<Output = Result<Option<AuthorizationContext>>> + Send;

    /// Bind an issued access token to the context. Single issuance.
    fn add_token(
        &self, session_id: &str, token: &TokenInfo,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Record user consent. Monotone true.
    fn set_consent(&self, session_id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Bind the authenticated identity onto the context.
    fn add_identity(
        &self, session_id: &str, identity: &Identity,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Record the authentic source selected for this issuance.
    fn set_authentic_source(
        &self, session_id: &str, authentic_source: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// The user directory backing the basic authentication method.
pub trait UserStore: Send + Sync {
    /// Look up a user by username.
    fn user(&self, username: &str) -> impl Future<Output = Result<Option<User>>> + Send;
}

/// Store of pre-minted credential offers.
pub trait OfferStore: Send + Sync {
    /// Persist an offer under its UUID.
    fn put_offer(&self, offer: &CredentialOffer) -> impl Future<Output = Result<()>> + Send;

    /// Look up an offer by UUID.
    fn offer(&self, id: &str) -> impl Future<Output = Result<Option<CredentialOffer>>> + Send;

    /// Remove an offer once collected.
    fn purge_offer(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// The narrow queries the gateway makes against the persistent document
/// datastore.
pub trait DocumentStore: Send + Sync {
    /// The document a source holds for an identity under a document type.
    fn document(
        &self, authentic_source: &str, document_type: &str, identity: &Identity,
    ) -> impl Future<Output = Result<Option<CompleteDocument>>> + Send;

    /// All documents of a type bound to an identity, keyed by authentic
    /// source.
    fn documents_for_identity(
        &self, document_type: &str, identity: &Identity,
    ) -> impl Future<Output = Result<HashMap<String, CompleteDocument>>> + Send;
}

/// RPC contract with the status-list backend.
pub trait StatusListClient: Send + Sync {
    /// Allocate a `(section, index)` pair for a new credential with the
    /// given initial status.
    fn allocate(
        &self, status: InitialStatus,
    ) -> impl Future<Output = Result<StatusAllocation>> + Send;

    /// Record the credential subject behind an allocation. Callers treat
    /// failures as non-fatal.
    fn register(
        &self, record: &CredentialSubjectRecord,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// RPC contract with the credential-signing backend.
pub trait CredentialSigner: Send + Sync {
    /// Produce an SD-JWT VC for a scope, source document, and holder key.
    fn sign_sd_jwt(
        &self, request: &SdJwtSignRequest,
    ) -> impl Future<Output = Result<SdJwtSigned>> + Send;

    /// Produce a CBOR-encoded ISO mDL document for a scope, source
    /// document, and holder `COSE_Key`.
    fn sign_mdoc(&self, request: &MdocSignRequest) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Access to the issuer's signing key and certificate chain, read-only
/// after startup.
pub trait Signer: Send + Sync {
    /// The signing material used for request objects and signed metadata.
    fn signing_material(&self) -> impl Future<Output = Result<SigningMaterial>> + Send;
}

/// Access to the gateway's in-process caches.
pub trait Caches: Send + Sync {
    /// Ephemeral encryption keys for the verification leg.
    fn ephemeral_keys(&self) -> &EphemeralKeys;

    /// Documents resolved per session by the verification leg.
    fn document_cache(&self) -> &DocumentCache;

    /// DPoP `jti` replay window.
    fn replay_cache(&self) -> &ReplayCache;
}

/// A `(section, index)` allocation in the status-list registry.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize)]
pub struct StatusAllocation {
    /// The status-list section.
    pub section: i64,

    /// The index within the section.
    pub index: i64,
}

/// The credential-subject record registered with the status-list backend
/// after SD-JWT issuance.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CredentialSubjectRecord {
    /// The status-list section.
    pub section: i64,

    /// The index within the section.
    pub index: i64,

    /// The credential type issued.
    pub vct: String,
}

/// Request to the signing backend for an SD-JWT VC.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SdJwtSignRequest {
    /// The credential scope being issued.
    pub scope: String,

    /// The source document's data.
    pub document_data: Value,

    /// The holder's public key, bound into the credential's `cnf` claim.
    pub holder_jwk: PublicKeyJwk,
}

/// The signing backend's SD-JWT response.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SdJwtSigned {
    /// The signed credentials. Exactly one is expected per request.
    pub credentials: Vec<String>,

    /// Status-list section allocated by the signer.
    pub section: i64,

    /// Status-list index allocated by the signer.
    pub index: i64,
}

/// Request to the signing backend for an ISO mDL document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MdocSignRequest {
    /// The credential scope being issued.
    pub scope: String,

    /// The source document's data.
    pub document_data: Value,

    /// The holder's device key as a CBOR-encoded `COSE_Key`.
    pub device_key: Vec<u8>,
}
