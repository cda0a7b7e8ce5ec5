//! # Notification Endpoint Handler
//!
//! This endpoint is used by the wallet to notify the issuer of events for
//! issued credentials (stored, failed, deleted). The notification is
//! idempotent: multiple identical calls for the same `notification_id`
//! return success. The gateway records the event in its logs and takes no
//! further action.

use crate::endpoint::{Body, Handler, Headers, Request, Response};
use crate::oid4vci::types::{NotificationHeaders, NotificationRequest, NotificationResponse};
use crate::provider::{ContextStore, Provider};
use crate::{Error, Result, server};

/// Notification request handler.
async fn notification(
    _issuer: &str, provider: &impl Provider,
    request: Request<NotificationRequest, NotificationHeaders>,
) -> Result<Response<NotificationResponse>> {
    tracing::debug!("notification");

    let Some(headers) = request.headers else {
        return Err(Error::InvalidToken("no access token presented".to_string()));
    };
    let Some(access_token) = headers.authorization.strip_prefix("DPoP ") else {
        return Err(Error::InvalidToken("authorization scheme must be DPoP".to_string()));
    };

    ContextStore::by_access_token(provider, access_token)
        .await
        .map_err(|e| server!("issue fetching context: {e}"))?
        .ok_or_else(|| Error::InvalidToken("access token is not recognized".to_string()))?;

    let request = request.body;
    tracing::info!(
        notification_id = %request.notification_id,
        event = ?request.event,
        description = request.event_description.as_deref().unwrap_or(""),
        "credential notification"
    );

    Ok(Response { status: 204, headers: None, body: NotificationResponse })
}

impl Handler for Request<NotificationRequest, NotificationHeaders> {
    type Response = NotificationResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        notification(issuer, provider, self)
    }
}

impl Body for NotificationRequest {}
impl Headers for NotificationHeaders {}
