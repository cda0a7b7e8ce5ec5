//! # Authorization Endpoint Handler
//!
//! The wallet presents the `request_uri` obtained at PAR. Until the user
//! has granted consent the handler answers with a redirect into the
//! consent step; afterwards it releases the authorization code. The
//! handler never mutates the context.

use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::oid4vci::types::{AuthorizeRequest, AuthorizeResponse};
use crate::provider::{ContextStore, Metadata, Provider};
use crate::{Error, Result, invalid, server};

/// Authorization request handler.
async fn authorize(
    _issuer: &str, provider: &impl Provider, request: AuthorizeRequest,
) -> Result<AuthorizeResponse> {
    tracing::debug!("authorize");

    let context = ContextStore::by_request_uri(provider, &request.request_uri)
        .await
        .map_err(|e| server!("issue fetching context: {e}"))?
        .ok_or_else(|| invalid!("unknown request_uri"))?;

    if context.is_expired() {
        return Err(Error::InvalidGrant("authorization request has expired".to_string()));
    }
    if context.client_id != request.client_id {
        return Err(Error::InvalidClient("client_id does not match the pushed request".to_string()));
    }
    if context.is_used {
        return Err(Error::InvalidGrant("authorization code has already been used".to_string()));
    }

    if !context.consent {
        let config = Metadata::gateway(provider)
            .await
            .map_err(|e| server!("issue getting configuration: {e}"))?;

        return Ok(AuthorizeResponse {
            redirect_url: Some(format!(
                "{}?session_id={}",
                config.consent_endpoint, context.session_id
            )),
            code: None,
            state: context.state,
            scope: context.scope,
            session_id: context.session_id,
            client_id: context.client_id,
        });
    }

    Ok(AuthorizeResponse {
        redirect_url: None,
        code: Some(context.code),
        state: context.state,
        scope: context.scope,
        session_id: context.session_id,
        client_id: context.client_id,
    })
}

impl Handler for Request<AuthorizeRequest, NoHeaders> {
    type Response = AuthorizeResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        authorize(issuer, provider, self.body)
    }
}

impl Body for AuthorizeRequest {}
