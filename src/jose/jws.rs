//! JWS signing with the issuer's long-lived key and X.509 chain.
//!
//! Request objects and signed metadata documents are RS256 JWS carrying the
//! issuer certificate chain in the `x5c` header, so wallets can validate
//! against a trust anchor rather than a bare key.

use anyhow::{Result, anyhow};
use base64ct::{Base64, Encoding};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;

/// The issuer's signing key and certificate chain, loaded once at startup.
#[derive(Clone)]
pub struct SigningMaterial {
    /// RSA private key.
    pub encoding_key: EncodingKey,

    /// Certificate chain, base64-encoded DER, leaf first.
    pub x5c: Vec<String>,
}

impl SigningMaterial {
    /// Load signing material from a PEM private key and PEM certificate
    /// chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a PEM RSA private key or the
    /// chain contains no certificates.
    pub fn from_pem(key_pem: &[u8], chain_pem: &[u8]) -> Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(key_pem)
            .map_err(|e| anyhow!("issue parsing signing key: {e}"))?;
        let x5c = chain_from_pem(chain_pem)?;
        Ok(Self { encoding_key, x5c })
    }
}

/// Parse a PEM certificate chain into base64-encoded DER entries, in file
/// order (leaf first).
///
/// # Errors
///
/// Returns an error if the buffer contains no PEM blocks or a block cannot
/// be parsed.
pub fn chain_from_pem(chain_pem: &[u8]) -> Result<Vec<String>> {
    let mut chain = vec![];
    for pem in x509_parser::pem::Pem::iter_from_buffer(chain_pem) {
        let pem = pem.map_err(|e| anyhow!("issue parsing certificate chain: {e}"))?;
        chain.push(Base64::encode_string(&pem.contents));
    }
    if chain.is_empty() {
        return Err(anyhow!("certificate chain is empty"));
    }
    Ok(chain)
}

/// Sign a claims set as an RS256 JWS with the certificate chain attached in
/// `x5c`.
///
/// # Errors
///
/// Returns an error if the claims do not serialize or signing fails.
pub fn sign<T: Serialize>(typ: &str, claims: &T, material: &SigningMaterial) -> Result<String> {
    let mut header = Header::new(Algorithm::RS256);
    header.typ = Some(typ.to_string());
    header.x5c = Some(material.x5c.clone());
    jsonwebtoken::encode(&header, claims, &material.encoding_key)
        .map_err(|e| anyhow!("issue signing claims: {e}"))
}
