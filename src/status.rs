//! # Status-List Record Allocation
//!
//! Issued credentials are revocable through a status list: a bit vector in
//! which each credential owns a `(section, index)` position. Allocation is
//! performed by the status-list backend; this endpoint validates the
//! requested initial status, forwards the allocation, and composes the
//! external registry URI for the section.

use serde::{Deserialize, Serialize};

use crate::endpoint::{Body, Handler, NoHeaders, Request, Response};
use crate::provider::{Metadata, Provider, StatusListClient};
use crate::{Error, Result, server};

/// The initial status of a newly allocated credential.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InitialStatus {
    /// The credential is valid.
    #[default]
    Valid,

    /// The credential is invalid.
    Invalid,

    /// The credential is suspended.
    Suspended,
}

impl TryFrom<i64> for InitialStatus {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, i64> {
        match value {
            0 => Ok(Self::Valid),
            1 => Ok(Self::Invalid),
            2 => Ok(Self::Suspended),
            other => Err(other),
        }
    }
}

/// A request for a new status-list record.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StatusRecordRequest {
    /// Initial status: 0 valid (default), 1 invalid, 2 suspended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,
}

/// A newly allocated status-list record.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct StatusRecordResponse {
    /// The status-list section.
    pub section: i64,

    /// The index within the section.
    pub index: i64,

    /// External URI of the section's status list.
    pub uri: String,
}

/// Status record request handler.
async fn status_record(
    _issuer: &str, provider: &impl Provider, request: StatusRecordRequest,
) -> Result<StatusRecordResponse> {
    tracing::debug!("status_record");

    let status = match request.status {
        None => InitialStatus::default(),
        Some(value) => InitialStatus::try_from(value).map_err(|v| {
            Error::InvalidStatusValue(format!("initial status must be 0, 1 or 2, got {v}"))
        })?,
    };

    let allocation = StatusListClient::allocate(provider, status)
        .await
        .map_err(|e| server!("issue allocating status record: {e}"))?;

    let config = Metadata::gateway(provider)
        .await
        .map_err(|e| server!("issue getting configuration: {e}"))?;

    Ok(StatusRecordResponse {
        section: allocation.section,
        index: allocation.index,
        uri: format!("{}/statuslists/{}", config.registry_external_url, allocation.section),
    })
}

impl Handler for Request<StatusRecordRequest, NoHeaders> {
    type Response = StatusRecordResponse;

    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send {
        status_record(issuer, provider, self.body)
    }
}

impl Body for StatusRecordRequest {}
