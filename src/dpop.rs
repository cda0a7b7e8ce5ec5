//! # DPoP (Demonstrating Proof of Possession)
//!
//! Implements the DPoP HTTP header per
//! [RFC 9449](https://datatracker.ietf.org/doc/html/rfc9449).
//!
//! A DPoP proof is a JWT which (1) embeds the public key it can be verified
//! with, and (2) signs the URL and HTTP method of the request being made.
//! Endpoints that additionally require a token to be bound to the proof
//! expect it in the `Authorization` header:
//!
//! ```text
//! Authorization: DPoP $token
//! ```
//!
//! and require the proof's `ath` claim to equal the URL-safe-no-pad base64
//! encoding of the SHA-256 of the token.
//!
//! Example DPoP JWT header and body:
//! ```json
//! {
//!   "typ": "dpop+jwt",
//!   "alg": "ES256",
//!   "jwk": {
//!     "kty": "EC",
//!     "crv": "P-256",
//!     "x": "l8tFrhx-34tV3hRICRDY9zCkDlpBhF42UQUfWVAWBFs",
//!     "y": "9VE4jf_Ok_o64zbTTlcuNJajHmt6v9TDVrU0CdvGRDA"
//!   }
//! }
//! .
//! {
//!   "jti": "-BwC3ESc6acc2lTc",
//!   "htm": "POST",
//!   "htu": "https://server.example.com/token",
//!   "iat": 1562262616
//! }
//! ```

use std::collections::HashSet;

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use p256::ecdsa::SigningKey;
use p256::pkcs8::EncodePrivateKey;
use serde::{Deserialize, Serialize};
use serde_with::base64::{Base64, UrlSafe};
use serde_with::formats::Unpadded;
use serde_with::{serde_as, skip_serializing_none};
use sha2::{Digest, Sha256};
use url::Url;

use crate::cache::ReplayCache;
use crate::core::generate;
use crate::jose::jwk::PublicKeyJwk;
use crate::state::Expire;

/// Name of the HTTP header carrying the proof.
pub const HEADER_NAME: &str = "DPoP";

/// The scheme of a DPoP-bound `Authorization` header.
pub const TOKEN_TYPE: &str = "DPoP";

/// The `typ` of a DPoP proof JWT.
pub const JWT_TYPE: &str = "dpop+jwt";

/// Errors produced when a proof fails validation. Endpoints surface these
/// as `invalid_dpop_proof`.
#[derive(Debug, thiserror::Error)]
pub enum DpopError {
    /// The proof's `typ` header is not `dpop+jwt`.
    #[error("unexpected proof JWT type: expected {JWT_TYPE}")]
    UnexpectedType,

    /// The proof header carries no public key.
    #[error("missing JWK in proof header")]
    MissingJwk,

    /// The `htm` claim does not match the request method.
    #[error("incorrect proof HTTP method")]
    IncorrectMethod,

    /// The `htu` claim does not match the endpoint URL.
    #[error("incorrect proof URL")]
    IncorrectUrl,

    /// The `ath` claim does not hash the presented access token.
    #[error("incorrect access token hash")]
    IncorrectAccessTokenHash,

    /// The `iat` claim falls outside the accepted clock skew.
    #[error("proof issued outside the accepted window")]
    IssuedOutsideWindow,

    /// The `jti` was already seen within the replay window.
    #[error("proof `jti` has already been used")]
    Replayed,

    /// The embedded key could not be converted from/to JWK format.
    #[error("failed to convert key from/to JWK format: {0}")]
    JwkConversion(#[from] anyhow::Error),

    /// The proof JWT could not be decoded or its signature is invalid.
    #[error("proof JWT decoding failed: {0}")]
    JwtDecoding(#[from] jsonwebtoken::errors::Error),
}

/// Result type for DPoP operations.
pub type Result<T, E = DpopError> = std::result::Result<T, E>;

/// The claims of a DPoP proof JWT.
#[serde_as]
#[skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DpopPayload {
    /// The URL of the request the proof covers.
    #[serde(rename = "htu")]
    pub http_url: Url,

    /// The HTTP method of the request the proof covers.
    #[serde(rename = "htm")]
    pub http_method: String,

    /// base64url(SHA-256(access token)), present when the proof binds a
    /// token.
    #[serde(rename = "ath")]
    #[serde_as(as = "Option<Base64<UrlSafe, Unpadded>>")]
    pub access_token_hash: Option<Vec<u8>>,

    /// Unique proof identifier, tracked within the replay window.
    pub jti: String,

    /// Issuance time.
    #[serde(with = "ts_seconds")]
    pub iat: DateTime<Utc>,
}

/// A DPoP proof in compact JWT form.
#[derive(Clone, Debug)]
pub struct Dpop(String);

impl AsRef<str> for Dpop {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Dpop {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Dpop {
    /// Create a proof for a request. This is the wallet half, used by
    /// embedding clients and tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing key cannot be serialized or signing
    /// fails.
    pub fn new(
        signing_key: &SigningKey, url: Url, method: &str, access_token: Option<&str>,
    ) -> Result<Self> {
        let jwk = PublicKeyJwk::from_verifying_key(signing_key.verifying_key());
        let mut header = Header::new(Algorithm::ES256);
        header.typ = Some(JWT_TYPE.to_string());
        header.jwk = Some(
            serde_json::from_value(serde_json::to_value(&jwk).map_err(anyhow::Error::from)?)
                .map_err(anyhow::Error::from)?,
        );

        let payload = DpopPayload {
            jti: generate::key_id(),
            iat: Utc::now(),
            http_method: method.to_string(),
            http_url: url,
            access_token_hash: access_token.map(access_token_hash),
        };

        let der = signing_key.to_pkcs8_der().map_err(anyhow::Error::from)?;
        let encoding_key = EncodingKey::from_ec_der(der.as_bytes());
        let jwt = jsonwebtoken::encode(&header, &payload, &encoding_key)?;
        Ok(Self(jwt))
    }

    /// Validate the proof against the request it claims to cover, returning
    /// the embedded public key.
    ///
    /// When `access_token` is provided the proof must carry a matching
    /// `ath` claim; when it is `None` the proof must carry none.
    ///
    /// # Errors
    ///
    /// Returns a [`DpopError`] naming the first check that failed.
    pub fn validate(
        &self, method: &str, expected_url: &Url, access_token: Option<&str>,
        replay: &ReplayCache,
    ) -> Result<PublicKeyJwk> {
        let header = jsonwebtoken::decode_header(&self.0)?;
        if header.typ.as_deref() != Some(JWT_TYPE) {
            return Err(DpopError::UnexpectedType);
        }
        let Some(jwk) = header.jwk else {
            return Err(DpopError::MissingJwk);
        };
        let public_jwk: PublicKeyJwk =
            serde_json::from_value(serde_json::to_value(&jwk).map_err(anyhow::Error::from)?)
                .map_err(anyhow::Error::from)?;

        let y = public_jwk.y.as_deref().ok_or(DpopError::MissingJwk)?;
        let decoding_key = DecodingKey::from_ec_components(&public_jwk.x, y)?;

        let mut validation = Validation::new(Algorithm::ES256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_aud = false;
        let token_data = jsonwebtoken::decode::<DpopPayload>(&self.0, &decoding_key, &validation)?;
        let claims = token_data.claims;

        if claims.http_method != method {
            return Err(DpopError::IncorrectMethod);
        }
        if claims.http_url != *expected_url {
            return Err(DpopError::IncorrectUrl);
        }
        if claims.access_token_hash != access_token.map(access_token_hash) {
            return Err(DpopError::IncorrectAccessTokenHash);
        }

        let skew = Utc::now().signed_duration_since(claims.iat);
        let window = Expire::ProofWindow.duration();
        if skew > window || skew < -window {
            return Err(DpopError::IssuedOutsideWindow);
        }
        if !replay.insert(&claims.jti) {
            return Err(DpopError::Replayed);
        }

        Ok(public_jwk)
    }
}

/// SHA-256 of an access token, for the `ath` claim.
#[must_use]
pub fn access_token_hash(access_token: &str) -> Vec<u8> {
    Sha256::digest(access_token.as_bytes()).to_vec()
}
