//! Wallet-side helpers: holder keys, DPoP proofs, key proofs, and a mock
//! PID presentation for the verification leg.

use anyhow::Result;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::rand_core::OsRng;
use p256::pkcs8::EncodePrivateKey;
use serde_json::json;
use url::Url;

use vc_gateway::dpop::Dpop;
use vc_gateway::jose::jwk::PublicKeyJwk;
use vc_gateway::provider::SdJwtSignRequest;
use vc_gateway::sd_jwt::Disclosure;

/// A wallet holder with an ES256 key pair.
pub struct Holder {
    signing_key: SigningKey,
}

impl Holder {
    pub fn new() -> Self {
        Self { signing_key: SigningKey::random(&mut OsRng) }
    }

    /// The holder's public JWK.
    pub fn jwk(&self) -> PublicKeyJwk {
        PublicKeyJwk::from_verifying_key(self.signing_key.verifying_key())
    }

    /// A DPoP proof for a request, optionally binding an access token.
    pub fn dpop(&self, url: &str, method: &str, access_token: Option<&str>) -> String {
        let url: Url = url.parse().expect("url should parse");
        Dpop::new(&self.signing_key, url, method, access_token)
            .expect("proof should sign")
            .as_ref()
            .to_string()
    }

    /// An `openid4vci-proof+jwt` key proof bound to the issuer's `c_nonce`.
    pub fn proof_jwt(&self, audience: &str, nonce: &str) -> String {
        let mut header = Header::new(Algorithm::ES256);
        header.typ = Some("openid4vci-proof+jwt".to_string());
        header.jwk = Some(
            serde_json::from_value(serde_json::to_value(self.jwk()).expect("should serialize"))
                .expect("should convert"),
        );

        let claims = json!({
            "aud": audience,
            "iat": Utc::now().timestamp(),
            "nonce": nonce,
        });
        encode_es256(&header, &claims, &self.signing_key)
    }
}

impl Default for Holder {
    fn default() -> Self {
        Self::new()
    }
}

/// A mock PID presentation: an ES256-signed issuer JWT plus the three PID
/// disclosures.
pub fn pid_presentation(given_name: &str, family_name: &str, birth_date: &str) -> String {
    let pid_key = SigningKey::random(&mut OsRng);
    let mut header = Header::new(Algorithm::ES256);
    header.typ = Some("dc+sd-jwt".to_string());

    let claims = json!({
        "iss": "https://pid-issuer.example.com",
        "vct": "urn:eudi:pid:1",
        "iat": Utc::now().timestamp(),
    });
    let jwt = encode_es256(&header, &claims, &pid_key);

    let disclosures = [
        Disclosure::new("given_name", json!(given_name)),
        Disclosure::new("family_name", json!(family_name)),
        Disclosure::new("birth_date", json!(birth_date)),
    ];
    let encoded: Vec<String> =
        disclosures.iter().map(|d| d.encoded().expect("should encode")).collect();
    format!("{jwt}~{}~", encoded.join("~"))
}

/// The signing backend's issuer JWT, used by the test provider's mock
/// signer.
pub fn sign_sd_jwt_stub(request: &SdJwtSignRequest) -> Result<String> {
    let issuer_key = SigningKey::random(&mut OsRng);
    let mut header = Header::new(Algorithm::ES256);
    header.typ = Some("dc+sd-jwt".to_string());

    let claims = json!({
        "iss": "https://issuer.example.com",
        "vct": request.scope,
        "iat": Utc::now().timestamp(),
        "cnf": {"jwk": request.holder_jwk},
    });
    Ok(encode_es256(&header, &claims, &issuer_key))
}

fn encode_es256(
    header: &Header, claims: &serde_json::Value, signing_key: &SigningKey,
) -> String {
    let der = signing_key.to_pkcs8_der().expect("key should serialize");
    jsonwebtoken::encode(header, claims, &EncodingKey::from_ec_der(der.as_bytes()))
        .expect("should sign")
}
