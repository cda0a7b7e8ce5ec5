//! JWE encryption and decryption for verifier responses.
//!
//! Wallets encrypt `direct_post.jwt` authorization responses to the
//! per-session ephemeral P-256 key advertised in the request object's
//! client metadata (`ECDH-ES` key agreement, `A256GCM` content encryption).

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use josekit::jwe::{ECDH_ES, JweHeader};
use josekit::jwk::Jwk;
use josekit::jwk::alg::ec::EcKeyPair;
use serde_json::Value;

use crate::jose::jwk::PublicKeyJwk;

/// Extract the `kid` from a compact JWE's protected header without
/// decrypting.
///
/// # Errors
///
/// Returns an error if the input is not a compact JWE or the header is not
/// valid JSON.
pub fn header_kid(compact: &str) -> Result<Option<String>> {
    let protected =
        compact.split('.').next().ok_or_else(|| anyhow!("input is not a compact JWE"))?;
    let bytes = Base64UrlUnpadded::decode_vec(protected)
        .map_err(|e| anyhow!("issue decoding JWE header: {e}"))?;
    let header: Value = serde_json::from_slice(&bytes)?;
    Ok(header.get("kid").and_then(Value::as_str).map(String::from))
}

/// Decrypt a compact JWE with the recipient's ephemeral key pair.
///
/// # Errors
///
/// Returns an error if key agreement or content decryption fails.
pub fn decrypt(compact: &str, key_pair: &EcKeyPair) -> Result<Vec<u8>> {
    let decrypter = ECDH_ES
        .decrypter_from_jwk(&key_pair.to_jwk_key_pair())
        .map_err(|e| anyhow!("issue creating decrypter: {e}"))?;
    let (payload, _header) = josekit::jwe::deserialize_compact(compact, &decrypter)
        .map_err(|e| anyhow!("issue decrypting response: {e}"))?;
    Ok(payload)
}

/// Encrypt a payload to a recipient's public JWK as a compact JWE
/// (`ECDH-ES`/`A256GCM`). The wallet half of [`decrypt`]; used by embedding
/// wallets and tests.
///
/// # Errors
///
/// Returns an error if the JWK is not a valid encryption key.
pub fn encrypt(payload: &[u8], recipient: &PublicKeyJwk) -> Result<String> {
    let Value::Object(map) = serde_json::to_value(recipient)? else {
        return Err(anyhow!("JWK did not serialize to an object"));
    };
    let jwk = Jwk::from_map(map).map_err(|e| anyhow!("issue converting JWK: {e}"))?;
    let encrypter =
        ECDH_ES.encrypter_from_jwk(&jwk).map_err(|e| anyhow!("issue creating encrypter: {e}"))?;

    let mut header = JweHeader::new();
    header.set_content_encryption("A256GCM");
    if let Some(kid) = &recipient.kid {
        header.set_key_id(kid);
    }

    josekit::jwe::serialize_compact(payload, &header, &encrypter)
        .map_err(|e| anyhow!("issue encrypting payload: {e}"))
}
