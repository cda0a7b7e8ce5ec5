//! Random value generation for codes, tokens, nonces, and cache keys.
//!
//! Everything here is 256 bits of OS randomness, base64url-encoded without
//! padding (43 characters), except where a URN or UUID form is called for.

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{Rng, rng};
use uuid::Uuid;

/// Generate an opaque authorization code.
#[must_use]
pub fn auth_code() -> String {
    random_token()
}

/// Generate an opaque access token.
#[must_use]
pub fn access_token() -> String {
    random_token()
}

/// Generate an unpredictable nonce (256 bits).
#[must_use]
pub fn nonce() -> String {
    random_token()
}

/// Generate a 32-byte cache key, used for ephemeral-encryption key ids and
/// verifier response codes.
#[must_use]
pub fn key_id() -> String {
    random_token()
}

/// Generate an opaque session id for a new authorization flow.
#[must_use]
pub fn session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a `request_uri` for a pushed authorization request, per
/// [RFC 9126](https://www.rfc-editor.org/rfc/rfc9126.html#section-2.2).
#[must_use]
pub fn request_uri() -> String {
    format!("urn:ietf:params:oauth:request_uri:{}", Uuid::new_v4())
}

fn random_token() -> String {
    Base64UrlUnpadded::encode_string(&rng().random::<[u8; 32]>())
}
