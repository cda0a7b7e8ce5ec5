//! # JSON Object Signing and Encryption (JOSE)
//!
//! Thin wrappers over the JOSE primitives the gateway needs: RS256 JWS with
//! an attached X.509 chain (request objects, signed metadata), ECDH-ES +
//! A256GCM JWE decryption (verifier responses), and JWK conversions for
//! P-256 keys.

pub mod jwe;
pub mod jwk;
pub mod jws;
