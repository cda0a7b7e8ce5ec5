//! JSON Web Key ([RFC 7517]) representation and P-256 conversions.
//!
//! [RFC 7517]: https://www.rfc-editor.org/rfc/rfc7517.html

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use p256::ecdsa::VerifyingKey;
use p256::{EncodedPoint, FieldBytes};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A public JSON Web Key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PublicKeyJwk {
    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key type (`EC` for the keys this gateway handles).
    pub kty: String,

    /// Curve name, e.g. `P-256`.
    pub crv: String,

    /// X coordinate, base64url-encoded.
    pub x: String,

    /// Y coordinate, base64url-encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Intended key use (`sig` or `enc`).
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,

    /// Intended algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
}

impl PublicKeyJwk {
    /// Build a JWK from a P-256 verifying key.
    #[must_use]
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        Self {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x: point.x().map(|x| Base64UrlUnpadded::encode_string(x)).unwrap_or_default(),
            y: point.y().map(|y| Base64UrlUnpadded::encode_string(y)),
            ..Self::default()
        }
    }

    /// Build a JWK from a josekit EC JWK.
    ///
    /// # Errors
    ///
    /// Returns an error if a required EC parameter is missing.
    pub fn from_josekit(jwk: &josekit::jwk::Jwk) -> Result<Self> {
        let required = |name: &str| {
            jwk.parameter(name)
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| anyhow!("missing `{name}` parameter"))
        };
        Ok(Self {
            kty: required("kty")?,
            crv: required("crv")?,
            x: required("x")?,
            y: jwk.parameter("y").and_then(Value::as_str).map(String::from),
            ..Self::default()
        })
    }

    /// Convert the JWK to a P-256 verifying key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key type or curve is unsupported, or the
    /// coordinates do not describe a point on the curve.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey> {
        if self.kty != "EC" {
            return Err(anyhow!("unsupported key type: {}", self.kty));
        }
        if self.crv != "P-256" {
            return Err(anyhow!("unsupported curve: {}", self.crv));
        }

        let x = Base64UrlUnpadded::decode_vec(&self.x)?;
        let y_b64 = self.y.as_ref().ok_or_else(|| anyhow!("missing `y` coordinate"))?;
        let y = Base64UrlUnpadded::decode_vec(y_b64)?;
        if x.len() != 32 || y.len() != 32 {
            return Err(anyhow!("coordinates must be 32 bytes"));
        }

        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&x),
            FieldBytes::from_slice(&y),
            false,
        );
        VerifyingKey::from_encoded_point(&point)
            .map_err(|e| anyhow!("point is not on the curve: {e}"))
    }
}
