//! # IETF SD-JWT Parsing
//!
//! Minimal support for the SD-JWT presentations received on the
//! verification leg: decoding compact serializations, unpacking
//! [`Disclosure`]s, and extracting the PID claims used to authenticate the
//! end user.
//!
//! See [I-D.ietf-oauth-sd-jwt-vc](https://www.ietf.org/archive/id/draft-ietf-oauth-selective-disclosure-jwt-17.html).

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{Rng, rng};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::document::Identity;

/// A claim disclosure.
pub struct Disclosure {
    /// The claim name.
    pub name: String,

    /// The disclosure value.
    pub value: Value,

    salt: String,
}

impl Disclosure {
    /// Create a new disclosure with a random salt.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            salt: Base64UrlUnpadded::encode_string(&rng().random::<[u8; 16]>()),
        }
    }

    /// Decode a base64url-encoded disclosure of the form
    /// `["<b64 Salt>","<Claim Name>","<Claim Value>"]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a three-element JSON array.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let bytes = Base64UrlUnpadded::decode_vec(encoded)
            .map_err(|e| anyhow!("issue decoding disclosure: {e}"))?;
        let Value::Array(parts) = serde_json::from_slice(&bytes)? else {
            return Err(anyhow!("disclosure is not an array"));
        };
        let [Value::String(salt), Value::String(name), value] = parts.as_slice() else {
            return Err(anyhow!("disclosure is not a [salt, name, value] triple"));
        };
        Ok(Self { name: name.clone(), value: value.clone(), salt: salt.clone() })
    }

    /// `Base64Url` encode the disclosure as a JSON array of the form:
    /// `["<b64 Salt>","<Claim Name>","<Claim Value>"]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoding fails.
    pub fn encoded(&self) -> Result<String> {
        let sd_json = serde_json::to_vec(&json!([self.salt, self.name, self.value]))?;
        Ok(Base64UrlUnpadded::encode_string(&sd_json))
    }

    /// Generate the disclosure digest: a base64url-encoded SHA-256 hash of
    /// the encoded disclosure.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoding fails.
    pub fn hashed(&self) -> Result<String> {
        Ok(Base64UrlUnpadded::encode_string(Sha256::digest(&self.encoded()?).as_slice()))
    }
}

/// The claims disclosed by a compact SD-JWT presentation
/// (`<issuer-jwt>~<disclosure>~...~[<kb-jwt>]`): the issuer-signed payload
/// overlaid with each disclosure.
///
/// # Errors
///
/// Returns an error if the serialization or a disclosure is malformed.
pub fn disclosed_claims(compact: &str) -> Result<Map<String, Value>> {
    let mut parts = compact.split('~');
    let issuer_jwt = parts.next().ok_or_else(|| anyhow!("empty SD-JWT"))?;

    let payload =
        issuer_jwt.split('.').nth(1).ok_or_else(|| anyhow!("issuer JWT is not a compact JWS"))?;
    let bytes = Base64UrlUnpadded::decode_vec(payload)
        .map_err(|e| anyhow!("issue decoding issuer JWT payload: {e}"))?;
    let Value::Object(mut claims) = serde_json::from_slice(&bytes)? else {
        return Err(anyhow!("issuer JWT payload is not an object"));
    };
    claims.remove("_sd");
    claims.remove("_sd_alg");

    for part in parts {
        // a trailing empty segment, or a key-binding JWT
        if part.is_empty() || part.contains('.') {
            continue;
        }
        let disclosure = Disclosure::from_encoded(part)?;
        claims.insert(disclosure.name, disclosure.value);
    }

    Ok(claims)
}

/// Extract the PID identity attributes from a VP token's SD-JWT
/// presentation.
///
/// # Errors
///
/// Returns an error if the presentation does not disclose the `given_name`,
/// `family_name`, and `birth_date` claims.
pub fn extract_pid(vp_token: &str) -> Result<Identity> {
    let claims = disclosed_claims(vp_token)?;
    let claim = |name: &str| {
        claims
            .get(name)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| anyhow!("presentation does not disclose `{name}`"))
    };
    Ok(Identity {
        given_name: claim("given_name")?,
        family_name: claim("family_name")?,
        birth_date: claim("birth_date")?,
    })
}
