//! # Credential Endpoint Handler
//!
//! Issues the credential a DPoP-bound access token authorizes. The handler
//! verifies the proof-of-possession chain (DPoP `ath` over the access
//! token, plus the key proof in the request body), resolves the source
//! document for the authorized scope, and dispatches construction to the
//! signing backend in the format the issuer metadata prescribes.
//!
//! Document resolution is scope-driven: scopes authenticated by PID
//! presentation read the session's document cache, populated earlier by
//! the verification leg; scopes authenticated against the user directory
//! query the persistent datastore by `{authentic_source, vct, identity}`.

use std::collections::HashSet;

use base64ct::{Base64, Encoding};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use url::Url;
use uuid::Uuid;

use crate::cose;
use crate::document::CompleteDocument;
use crate::dpop::Dpop;
use crate::endpoint::{Body, Handler, Headers, Request, Response};
use crate::jose::jwk::PublicKeyJwk;
use crate::oid4vci::types::{
    AuthMethod, Credential, CredentialFormat, CredentialHeaders, CredentialRequest,
    CredentialResponse,
};
use crate::provider::{
    Caches, ContextStore, CredentialSigner, CredentialSubjectRecord, DocumentStore, MdocSignRequest,
    Metadata, Provider, SdJwtSignRequest, StatusListClient,
};
use crate::state::AuthorizationContext;
use crate::{Error, Result, invalid, server};

/// The `typ` of an `OpenID4VCI` key proof JWT.
const PROOF_JWT_TYPE: &str = "openid4vci-proof+jwt";

/// Credential request handler.
async fn credential(
    _issuer: &str, provider: &impl Provider,
    request: Request<CredentialRequest, CredentialHeaders>,
) -> Result<CredentialResponse> {
    tracing::debug!("credential");

    let Some(headers) = request.headers else {
        return Err(Error::InvalidToken("no access token presented".to_string()));
    };
    let request = request.body;

    // `Authorization: DPoP <token>`, bound to the proof via `ath`
    let Some(access_token) = headers.authorization.strip_prefix("DPoP ") else {
        return Err(Error::InvalidToken("authorization scheme must be DPoP".to_string()));
    };

    let config = Metadata::gateway(provider)
        .await
        .map_err(|e| server!("issue getting configuration: {e}"))?;
    let endpoint_url = Url::parse(&config.credential_endpoint)
        .map_err(|e| server!("issue parsing credential endpoint: {e}"))?;

    Dpop::from(headers.dpop)
        .validate("POST", &endpoint_url, Some(access_token), Caches::replay_cache(provider))
        .map_err(|e| Error::InvalidDpopProof(e.to_string()))?;

    let context = ContextStore::by_access_token(provider, access_token)
        .await
        .map_err(|e| server!("issue fetching context: {e}"))?
        .ok_or_else(|| Error::InvalidToken("access token is not recognized".to_string()))?;
    if !context.token_valid() {
        return Err(Error::InvalidToken("access token has expired".to_string()));
    }
    if context.scope.is_empty() {
        return Err(invalid!("no scope authorized"));
    }
    if !context.consent || context.identity.is_none() {
        return Err(Error::AccessDenied("consent has not been granted".to_string()));
    }

    let constructor = Metadata::constructor(provider, &context.scope)
        .await
        .map_err(|e| server!("issue getting credential constructor: {e}"))?;

    let document = resolve_document(provider, &context, &constructor.vct, &constructor.auth_method)
        .await?;

    let (holder_jwk, proof_claims) = holder_jwk(&request)?;
    if let Some(nonce) = proof_claims.get("nonce").and_then(serde_json::Value::as_str) {
        if nonce != context.nonce {
            return Err(invalid!("proof nonce does not match the issued c_nonce"));
        }
    }

    let format = resolve_format(provider, &request).await?;

    let credential = match format {
        CredentialFormat::VcSdJwt | CredentialFormat::DcSdJwt => {
            sd_jwt(provider, &context, &constructor.vct, &document, holder_jwk).await?
        }
        CredentialFormat::MsoMdoc => mdoc(provider, &context, &document, &holder_jwk).await?,
    };

    Ok(CredentialResponse {
        credentials: vec![Credential { credential }],
        notification_id: Some(Uuid::new_v4().to_string()),
    })
}

/// Resolve the source document for the authorized scope.
async fn resolve_document(
    provider: &impl Provider, context: &AuthorizationContext, vct: &str, auth_method: &AuthMethod,
) -> Result<CompleteDocument> {
    let Some(authentic_source) = &context.authentic_source else {
        return Err(Error::NoDocumentFound("no authentic source selected".to_string()));
    };

    match auth_method {
        AuthMethod::PidAuth => {
            let Some(documents) = Caches::document_cache(provider).get(&context.session_id)
            else {
                return Err(Error::NoDocumentFound(
                    "no documents have been resolved for this session".to_string(),
                ));
            };
            documents.get(authentic_source).cloned().ok_or_else(|| {
                Error::NoDocumentFound(format!("no document from source {authentic_source}"))
            })
        }
        AuthMethod::Basic => {
            let Some(identity) = &context.identity else {
                return Err(Error::NoDocumentFound("no identity bound to session".to_string()));
            };
            DocumentStore::document(provider, authentic_source, vct, identity)
                .await
                .map_err(|e| server!("issue querying datastore: {e}"))?
                .ok_or_else(|| {
                    Error::NoDocumentFound("no document held for this identity".to_string())
                })
        }
    }
}

/// Extract and verify the holder's key proof, returning the embedded JWK
/// and the proof claims.
fn holder_jwk(request: &CredentialRequest) -> Result<(PublicKeyJwk, serde_json::Value)> {
    let jwt = if let Some(proof) = &request.proof {
        if proof.proof_type != "jwt" {
            return Err(invalid!("unsupported proof_type: {}", proof.proof_type));
        }
        proof.jwt.clone()
    } else if let Some(proofs) = &request.proofs {
        let Some(jwt) = proofs.jwt.first() else {
            return Err(invalid!("no key proof presented"));
        };
        jwt.clone()
    } else {
        return Err(invalid!("no key proof presented"));
    };

    let header =
        jsonwebtoken::decode_header(&jwt).map_err(|e| invalid!("issue decoding proof: {e}"))?;
    if header.typ.as_deref() != Some(PROOF_JWT_TYPE) {
        return Err(invalid!("unexpected proof JWT type"));
    }
    let Some(jwk) = header.jwk else {
        return Err(invalid!("proof header carries no JWK"));
    };
    let holder: PublicKeyJwk = serde_json::to_value(&jwk)
        .and_then(serde_json::from_value)
        .map_err(|e| invalid!("issue converting proof JWK: {e}"))?;

    // the proof must verify under its own embedded key
    let y = holder.y.as_deref().ok_or_else(|| invalid!("proof JWK is incomplete"))?;
    let decoding_key = DecodingKey::from_ec_components(&holder.x, y)
        .map_err(|e| invalid!("issue converting proof JWK: {e}"))?;
    let mut validation = Validation::new(Algorithm::ES256);
    validation.required_spec_claims = HashSet::new();
    validation.validate_exp = false;
    validation.validate_aud = false;
    let token_data = jsonwebtoken::decode::<serde_json::Value>(&jwt, &decoding_key, &validation)
        .map_err(|e| invalid!("proof signature is invalid: {e}"))?;

    Ok((holder, token_data.claims))
}

/// Resolve the credential format from issuer metadata, falling back to the
/// request's format hint.
async fn resolve_format(
    provider: &impl Provider, request: &CredentialRequest,
) -> Result<CredentialFormat> {
    let configuration_id = request
        .credential_configuration_id
        .clone()
        .or_else(|| request.credential_identifier.clone())
        .ok_or_else(|| {
            invalid!("no credential_configuration_id or credential_identifier")
        })?;

    let issuer_metadata = Metadata::issuer(provider)
        .await
        .map_err(|e| server!("issue getting issuer metadata: {e}"))?;

    issuer_metadata
        .format_for(&configuration_id)
        .or_else(|| request.format.clone())
        .ok_or_else(|| {
            Error::UnsupportedCredentialFormat(format!(
                "no format known for {configuration_id}"
            ))
        })
}

/// Dispatch SD-JWT construction to the signing backend and register the
/// credential subject with the status-list backend.
async fn sd_jwt(
    provider: &impl Provider, context: &AuthorizationContext, vct: &str,
    document: &CompleteDocument, holder_jwk: PublicKeyJwk,
) -> Result<String> {
    let sign_request = SdJwtSignRequest {
        scope: context.scope.clone(),
        document_data: document.document_data.clone(),
        holder_jwk,
    };
    let mut signed = CredentialSigner::sign_sd_jwt(provider, &sign_request)
        .await
        .map_err(|e| Error::CredentialIssuanceFailed(format!("signer failed: {e}")))?;

    if signed.credentials.len() != 1 {
        return Err(Error::CredentialIssuanceFailed(format!(
            "expected exactly one credential, got {}",
            signed.credentials.len()
        )));
    }

    // best effort: issuance proceeds even if the registration fails
    let record = CredentialSubjectRecord {
        section: signed.section,
        index: signed.index,
        vct: vct.to_string(),
    };
    if let Err(e) = StatusListClient::register(provider, &record).await {
        tracing::warn!("issue registering credential subject: {e}");
    }

    Ok(signed.credentials.remove(0))
}

/// Dispatch mDL construction to the signing backend, converting the holder
/// JWK to a `COSE_Key` and base64-encoding the resulting CBOR.
async fn mdoc(
    provider: &impl Provider, context: &AuthorizationContext, document: &CompleteDocument,
    holder_jwk: &PublicKeyJwk,
) -> Result<String> {
    let device_key = cose::from_jwk(holder_jwk)
        .and_then(cose::to_vec)
        .map_err(|e| invalid!("issue converting holder key: {e}"))?;

    let sign_request = MdocSignRequest {
        scope: context.scope.clone(),
        document_data: document.document_data.clone(),
        device_key,
    };
    let bytes = CredentialSigner::sign_mdoc(provider, &sign_request)
        .await
        .map_err(|e| Error::CredentialIssuanceFailed(format!("signer failed: {e}")))?;

    ciborium::de::from_reader::<ciborium::Value, _>(bytes.as_slice()).map_err(|e| {
        Error::CredentialIssuanceFailed(format!("signer returned invalid CBOR: {e}"))
    })?;

    Ok(Base64::encode_string(&bytes))
}

impl Handler for Request<CredentialRequest, CredentialHeaders> {
    type Response = CredentialResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        credential(issuer, provider, self)
    }
}

impl Body for CredentialRequest {}
impl Headers for CredentialHeaders {}
