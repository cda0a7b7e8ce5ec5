//! # Consent Grant Handler
//!
//! Binds the authenticated identity onto the authorization context and
//! marks consent. Two authentication methods are supported: a username and
//! password checked against the user directory, and a PID presentation
//! received earlier on the verification leg. In both cases the handler
//! resolves the backing document, renders the display claim bundle from
//! the credential type's VCTM, and returns the wallet redirect that
//! carries the authorization code.

use url::Url;

use crate::document::{CompleteDocument, Identity};
use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::oid4vci::types::{GrantAuth, GrantRequest, GrantResponse};
use crate::provider::{Caches, ContextStore, DocumentStore, Metadata, Provider, UserStore};
use crate::state::AuthorizationContext;
use crate::vctm;
use crate::{Error, Result, invalid, server};

/// Consent grant handler.
async fn grant(
    _issuer: &str, provider: &impl Provider, request: GrantRequest,
) -> Result<GrantResponse> {
    tracing::debug!("grant");

    let (context, identity, document, authentic_source) = match &request.auth {
        GrantAuth::Basic { session_id, username, password } => {
            basic(provider, &request, session_id, username, password).await?
        }
        GrantAuth::PidAuth { verifier_response_code } => {
            pid(provider, &request, verifier_response_code).await?
        }
    };

    if context.is_expired() {
        return Err(Error::InvalidGrant("authorization request has expired".to_string()));
    }

    let constructor = Metadata::constructor(provider, &context.scope)
        .await
        .map_err(|e| server!("issue getting credential constructor: {e}"))?;
    let svg_template_claims = vctm::display_claims(&constructor.vctm, &document.document_data)
        .map_err(|e| server!("issue rendering display claims: {e}"))?;

    ContextStore::add_identity(provider, &context.session_id, &identity)
        .await
        .map_err(|e| server!("issue binding identity: {e}"))?;
    ContextStore::set_authentic_source(provider, &context.session_id, &authentic_source)
        .await
        .map_err(|e| server!("issue recording authentic source: {e}"))?;
    ContextStore::set_consent(provider, &context.session_id)
        .await
        .map_err(|e| server!("issue recording consent: {e}"))?;

    let mut redirect = Url::parse(&context.redirect_uri)
        .map_err(|e| server!("issue parsing wallet uri: {e}"))?;
    redirect.query_pairs_mut().append_pair("code", &context.code).append_pair("state", &context.state);

    Ok(GrantResponse { svg_template_claims, redirect_url: redirect.to_string() })
}

/// Username/password authentication against the user directory.
async fn basic(
    provider: &impl Provider, request: &GrantRequest, session_id: &str, username: &str,
    password: &str,
) -> Result<(AuthorizationContext, Identity, CompleteDocument, String)> {
    let user = UserStore::user(provider, username)
        .await
        .map_err(|e| server!("issue fetching user: {e}"))?
        .ok_or_else(|| Error::AccessDenied("invalid username or password".to_string()))?;

    let verified = bcrypt::verify(password, &user.password_hash)
        .map_err(|e| server!("issue verifying password: {e}"))?;
    if !verified {
        return Err(Error::AccessDenied("invalid username or password".to_string()));
    }

    let context = ContextStore::by_session(provider, session_id)
        .await
        .map_err(|e| server!("issue fetching context: {e}"))?
        .ok_or_else(|| invalid!("unknown session"))?;

    let source =
        request.authentic_source.clone().unwrap_or_else(|| user.authentic_source.clone());
    let document = DocumentStore::document(provider, &source, &user.vct, &user.identity)
        .await
        .map_err(|e| server!("issue querying datastore: {e}"))?
        .ok_or_else(|| {
            Error::NoDocumentFound("no document held for this user".to_string())
        })?;

    Ok((context, user.identity, document, source))
}

/// PID authentication: the verification leg has already resolved the
/// session's documents into the document cache.
async fn pid(
    provider: &impl Provider, request: &GrantRequest, verifier_response_code: &str,
) -> Result<(AuthorizationContext, Identity, CompleteDocument, String)> {
    let context = ContextStore::by_verifier_response_code(provider, verifier_response_code)
        .await
        .map_err(|e| server!("issue fetching context: {e}"))?
        .ok_or_else(|| invalid!("unknown verifier response code"))?;

    let Some(documents) = Caches::document_cache(provider).get(&context.session_id) else {
        return Err(Error::NoDocumentFound(
            "no documents have been resolved for this session".to_string(),
        ));
    };

    let source = match &request.authentic_source {
        Some(source) => source.clone(),
        // unambiguous when a single source holds a document
        None if documents.len() == 1 => {
            documents.keys().next().cloned().unwrap_or_default()
        }
        None => {
            return Err(Error::NoDocumentFound("authentic source not selected".to_string()));
        }
    };
    let Some(document) = documents.get(&source) else {
        return Err(Error::NoDocumentFound(format!("no document from source {source}")));
    };

    let Some(identity) =
        context.identity.clone().or_else(|| document.identities.first().cloned())
    else {
        return Err(Error::AccessDenied("no verified identity for this session".to_string()));
    };

    Ok((context, identity, document.clone(), source))
}

impl Handler for Request<GrantRequest, NoHeaders> {
    type Response = GrantResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        grant(issuer, provider, self.body)
    }
}

impl Body for GrantRequest {}
