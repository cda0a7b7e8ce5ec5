//! # Gateway Errors
//!
//! This module defines errors for the issuance gateway's OAuth 2.0,
//! `OpenID4VCI`, and `OpenID4VP` endpoints. Errors serialize to RFC 6749
//! style `{"error": ..., "error_description": ...}` bodies.

use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::core::urlencode;

/// Error codes surfaced by the gateway endpoints.
#[derive(Error, Debug, Deserialize)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// The request is missing a required parameter, includes an unsupported
    /// parameter value, repeats a parameter, or is otherwise malformed.
    #[error(r#"{{"error": "invalid_request", "error_description": "{0}"}}"#)]
    InvalidRequest(String),

    /// Client authentication failed: the client/redirect/scope triple
    /// presented at the pushed authorization request endpoint is not
    /// permitted by the allow-list.
    #[error(r#"{{"error": "invalid_client", "error_description": "{0}"}}"#)]
    InvalidClient(String),

    /// The provided authorization grant is invalid, expired, already
    /// redeemed, or does not match the redirection URI used in the
    /// authorization request.
    #[error(r#"{{"error": "invalid_grant", "error_description": "{0}"}}"#)]
    InvalidGrant(String),

    /// The DPoP proof failed validation: bad signature, `htm`/`htu`/`ath`
    /// mismatch, `iat` outside the accepted skew, replayed `jti`, or a
    /// missing `jwk` header, per
    /// [RFC 9449](https://www.rfc-editor.org/rfc/rfc9449.html).
    #[error(r#"{{"error": "invalid_dpop_proof", "error_description": "{0}"}}"#)]
    InvalidDpopProof(String),

    /// The access token is unknown, expired, or malformed.
    #[error(r#"{{"error": "invalid_token", "error_description": "{0}"}}"#)]
    InvalidToken(String),

    /// The resource owner or authorization server denied the request.
    #[error(r#"{{"error": "access_denied", "error_description": "{0}"}}"#)]
    AccessDenied(String),

    /// Requested credential format is not supported.
    #[error(r#"{{"error": "unsupported_credential_format", "error_description": "{0}"}}"#)]
    UnsupportedCredentialFormat(String),

    /// No source document could be resolved for the requested credential:
    /// the document cache is empty, the selected authentic source is
    /// missing, or the datastore query returned nothing.
    #[error(r#"{{"error": "no_document_found", "error_description": "{0}"}}"#)]
    NoDocumentFound(String),

    /// The signing backend could not produce the requested credential.
    #[error(r#"{{"error": "credential_issuance_failed", "error_description": "{0}"}}"#)]
    CredentialIssuanceFailed(String),

    /// A status-list record was requested with an initial status outside
    /// the accepted range.
    #[error(r#"{{"error": "invalid_status_value", "error_description": "{0}"}}"#)]
    InvalidStatusValue(String),

    /// A metadata document was configured with a file type other than YAML
    /// or JSON.
    #[error(r#"{{"error": "unsupported_file_type", "error_description": "{0}"}}"#)]
    UnsupportedFileType(String),

    /// The server encountered an unexpected condition that prevented it
    /// from fulfilling the request. The description carries a correlation
    /// id; backend detail is logged, never surfaced.
    #[error(r#"{{"error": "server_error", "error_description": "{0}"}}"#)]
    ServerError(String),
}

/// Error response for the gateway endpoints.
#[allow(clippy::module_name_repetitions)]
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    error: String,
    error_description: String,
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as SerdeError;

        let Ok(error) = serde_json::from_str::<ErrorResponse>(&self.to_string()) else {
            return Err(SerdeError::custom("issue deserializing Err"));
        };
        error.serialize(serializer)
    }
}

impl Error {
    /// Transform the error to `OpenID` compatible JSON format.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.to_string()).unwrap_or_default()
    }

    /// Transform the error to `OpenID` compatible query string format, for
    /// use in error redirects.
    #[must_use]
    pub fn to_querystring(&self) -> String {
        urlencode::to_string(&self).unwrap_or_default()
    }
}

/// Construct an `Error::InvalidRequest` from a string or format expression.
#[macro_export]
macro_rules! invalid {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::InvalidRequest(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::InvalidRequest(format!($err))
    };
}

/// Construct an `Error::ServerError` from a string or format expression.
#[macro_export]
macro_rules! server {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::ServerError(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::ServerError(format!($err))
    };
}
