//! # COSE Key Conversion
//!
//! ISO mDL documents bind the holder's key as a `COSE_Key` (RFC 9052)
//! rather than a JWK. This module converts the P-256 JWK extracted from a
//! credential request proof into the CBOR-encoded `COSE_Key` handed to the
//! mDoc signing backend.

use anyhow::{Result, anyhow};
use base64ct::{Base64UrlUnpadded, Encoding};
use coset::{CborSerializable, CoseKey, CoseKeyBuilder, KeyType, Label, iana};

use crate::jose::jwk::PublicKeyJwk;

/// Convert a public EC JWK to a `COSE_Key` (EC2 key type).
///
/// Coordinates are base64url-decoded; the curve is mapped per the COSE
/// elliptic-curve registry.
///
/// # Errors
///
/// Returns an error if the key type or curve is unsupported, or the
/// coordinates do not decode.
pub fn from_jwk(jwk: &PublicKeyJwk) -> Result<CoseKey> {
    if jwk.kty != "EC" {
        return Err(anyhow!("unsupported key type: {}", jwk.kty));
    }
    let curve = match jwk.crv.as_str() {
        "P-256" => iana::EllipticCurve::P_256,
        "P-384" => iana::EllipticCurve::P_384,
        "P-521" => iana::EllipticCurve::P_521,
        _ => return Err(anyhow!("unsupported curve: {}", jwk.crv)),
    };

    let x = Base64UrlUnpadded::decode_vec(&jwk.x)
        .map_err(|e| anyhow!("issue decoding `x` coordinate: {e}"))?;
    let y_b64 = jwk.y.as_ref().ok_or_else(|| anyhow!("missing `y` coordinate"))?;
    let y = Base64UrlUnpadded::decode_vec(y_b64)
        .map_err(|e| anyhow!("issue decoding `y` coordinate: {e}"))?;

    Ok(CoseKeyBuilder::new_ec2_pub_key(curve, x, y).build())
}

/// Convert an EC2 `COSE_Key` back to a public JWK.
///
/// # Errors
///
/// Returns an error if the key is not an EC2 key with a registered curve.
pub fn to_jwk(key: &CoseKey) -> Result<PublicKeyJwk> {
    if key.kty != KeyType::Assigned(iana::KeyType::EC2) {
        return Err(anyhow!("unsupported COSE key type"));
    }

    let mut crv = None;
    let mut x = None;
    let mut y = None;
    for (label, value) in &key.params {
        let Label::Int(label) = label else {
            continue;
        };
        if *label == iana::Ec2KeyParameter::Crv as i64 {
            crv = value.as_integer().and_then(|i| i64::try_from(i).ok());
        } else if *label == iana::Ec2KeyParameter::X as i64 {
            x = value.as_bytes().cloned();
        } else if *label == iana::Ec2KeyParameter::Y as i64 {
            y = value.as_bytes().cloned();
        }
    }

    let crv = match crv {
        Some(c) if c == iana::EllipticCurve::P_256 as i64 => "P-256",
        Some(c) if c == iana::EllipticCurve::P_384 as i64 => "P-384",
        Some(c) if c == iana::EllipticCurve::P_521 as i64 => "P-521",
        _ => return Err(anyhow!("unsupported COSE curve")),
    };
    let x = x.ok_or_else(|| anyhow!("missing `x` coordinate"))?;
    let y = y.ok_or_else(|| anyhow!("missing `y` coordinate"))?;

    Ok(PublicKeyJwk {
        kty: "EC".to_string(),
        crv: crv.to_string(),
        x: Base64UrlUnpadded::encode_string(&x),
        y: Some(Base64UrlUnpadded::encode_string(&y)),
        ..PublicKeyJwk::default()
    })
}

/// CBOR-encode a `COSE_Key`.
///
/// # Errors
///
/// Returns an error if CBOR serialization fails.
pub fn to_vec(key: CoseKey) -> Result<Vec<u8>> {
    key.to_vec().map_err(|e| anyhow!("issue encoding COSE key: {e}"))
}

/// Decode a `COSE_Key` from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not a valid `COSE_Key`.
pub fn from_slice(bytes: &[u8]) -> Result<CoseKey> {
    CoseKey::from_slice(bytes).map_err(|e| anyhow!("issue decoding COSE key: {e}"))
}
