//! Proof Key for Code Exchange ([RFC 7636]) primitives.
//!
//! [RFC 7636]: https://www.rfc-editor.org/rfc/rfc7636.html

use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{Rng, rng};
use sha2::{Digest, Sha256};

/// Generate a random code verifier: 32 bytes, base64url-encoded.
#[must_use]
pub fn code_verifier() -> String {
    Base64UrlUnpadded::encode_string(&rng().random::<[u8; 32]>())
}

/// Derive the `S256` code challenge for a code verifier.
#[must_use]
pub fn code_challenge(verifier: &str) -> String {
    Base64UrlUnpadded::encode_string(Sha256::digest(verifier.as_bytes()).as_slice())
}
