//! # Metadata Publisher
//!
//! Serves the issuer and authorization-server metadata documents in
//! JWS-signed form. The documents are authored as YAML or JSON files;
//! publishing clears any stale `signed_metadata` field, computes an RS256
//! JWS over the document with the issuer signing key, attaches the
//! base64-encoded X.509 chain in `x5c`, and returns the document with the
//! fresh signature attached.
//!
//! Published at the paths [RFC 8414] and `OpenID4VCI` prescribe:
//! `/.well-known/oauth-authorization-server` and
//! `/.well-known/openid-credential-issuer`.
//!
//! [RFC 8414]: https://www.rfc-editor.org/rfc/rfc8414.html

use std::ffi::OsStr;
use std::path::Path;

use serde_json::Value;

use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::jose::jws;
use crate::oid4vci::types::{
    IssuerMetadata, IssuerMetadataRequest, ServerMetadata, ServerMetadataRequest,
};
use crate::provider::{Metadata, Provider, Signer};
use crate::{Error, Result, server};

/// Read a metadata document from a YAML or JSON file.
///
/// # Errors
///
/// Fails with `unsupported_file_type` for any other extension, or
/// `server_error` if the file cannot be read or parsed.
pub fn read_metadata(path: &Path) -> Result<Value> {
    let bytes = std::fs::read(path).map_err(|e| server!("issue reading metadata file: {e}"))?;

    match path.extension().and_then(OsStr::to_str) {
        Some("json") => {
            serde_json::from_slice(&bytes).map_err(|e| server!("issue parsing metadata: {e}"))
        }
        Some("yaml" | "yml") => {
            serde_yaml::from_slice(&bytes).map_err(|e| server!("issue parsing metadata: {e}"))
        }
        _ => Err(Error::UnsupportedFileType(
            "metadata documents must be YAML or JSON".to_string(),
        )),
    }
}

/// Issuer metadata request handler.
async fn issuer_metadata(
    _issuer: &str, provider: &impl Provider, _: IssuerMetadataRequest,
) -> Result<IssuerMetadata> {
    let mut metadata = Metadata::issuer(provider)
        .await
        .map_err(|e| server!("issue getting issuer metadata: {e}"))?;

    metadata.signed_metadata = Some(sign(provider, &mut metadata).await?);
    Ok(metadata)
}

/// Authorization server metadata request handler.
async fn server_metadata(
    _issuer: &str, provider: &impl Provider, _: ServerMetadataRequest,
) -> Result<ServerMetadata> {
    let mut metadata = Metadata::server(provider)
        .await
        .map_err(|e| server!("issue getting server metadata: {e}"))?;

    metadata.signed_metadata = None;
    let claims = serde_json::to_value(&metadata)
        .map_err(|e| server!("issue serializing metadata: {e}"))?;
    let material = Signer::signing_material(provider)
        .await
        .map_err(|e| server!("issue getting signing material: {e}"))?;
    metadata.signed_metadata = Some(
        jws::sign("JWT", &claims, &material).map_err(|e| server!("issue signing metadata: {e}"))?,
    );
    Ok(metadata)
}

/// Sign issuer metadata with any previous signature cleared.
async fn sign(provider: &impl Provider, metadata: &mut IssuerMetadata) -> Result<String> {
    metadata.signed_metadata = None;
    let claims = serde_json::to_value(&*metadata)
        .map_err(|e| server!("issue serializing metadata: {e}"))?;
    let material = Signer::signing_material(provider)
        .await
        .map_err(|e| server!("issue getting signing material: {e}"))?;
    jws::sign("JWT", &claims, &material).map_err(|e| server!("issue signing metadata: {e}"))
}

impl Handler for Request<IssuerMetadataRequest, NoHeaders> {
    type Response = IssuerMetadata;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        issuer_metadata(issuer, provider, self.body)
    }
}

impl Handler for Request<ServerMetadataRequest, NoHeaders> {
    type Response = ServerMetadata;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        server_metadata(issuer, provider, self.body)
    }
}

impl Body for IssuerMetadataRequest {}
impl Body for ServerMetadataRequest {}
