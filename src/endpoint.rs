//! # Endpoint
//!
//! `endpoint` provides the entry point for gateway requests. Requests are
//! routed to the appropriate handler for processing, returning a response
//! that can be serialized to a JSON object or redirect.

use std::fmt::Debug;

use http::HeaderMap;

use crate::invalid;
use crate::provider::Provider;
use crate::Result;

/// Handle incoming requests.
///
/// # Errors
///
/// This method can fail for a number of reasons related to the incoming
/// request's viability. Expected failures include invalid client
/// authentication, insufficient permissions, and invalid request content.
///
/// Implementers should look to the Error type and description for more
/// information on the reason for failure.
pub async fn handle<B, H, U>(
    issuer: &str, request: impl Into<Request<B, H>>, provider: &impl Provider,
) -> Result<Response<U>>
where
    B: Body,
    H: Headers,
    Request<B, H>: Handler<Response = U>,
{
    let request: Request<B, H> = request.into();
    request.validate(issuer, provider).await?;
    Ok(request.handle(issuer, provider).await?.into())
}

/// A request to process.
#[derive(Clone, Debug)]
pub struct Request<B, H>
where
    B: Body,
    H: Headers,
{
    /// The request to process.
    pub body: B,

    /// Headers associated with this request, for handlers that expect them.
    pub headers: Option<H>,
}

impl<B, H> From<B> for Request<B, H>
where
    B: Body,
    H: Headers,
{
    fn from(body: B) -> Self {
        Self { body, headers: None }
    }
}

/// A handler response, with HTTP status and headers for the embedding
/// server to apply.
#[derive(Clone, Debug)]
pub struct Response<T> {
    /// Response HTTP status code.
    pub status: u16,

    /// Response HTTP headers, if any.
    pub headers: Option<HeaderMap>,

    /// The endpoint-specific response body.
    pub body: T,
}

impl<T> From<T> for Response<T> {
    fn from(body: T) -> Self {
        Self { status: 200, headers: None, body }
    }
}

/// Empty request headers implementation.
#[derive(Clone, Debug)]
pub struct NoHeaders;
impl Headers for NoHeaders {}

/// Methods common to all request types.
///
/// The primary role of this trait is to provide a common interface for
/// requests so they can be processed by the [`handle`] method.
pub trait Handler: Clone + Debug + Send + Sync {
    /// The inner reply type specific to the implementing request.
    type Response;

    /// Routes the request to the concrete handler used to process it.
    fn handle(
        self, issuer: &str, provider: &impl Provider,
    ) -> impl Future<Output = Result<impl Into<Response<Self::Response>>>> + Send;

    /// Perform initial validation of the request.
    ///
    /// Validation undertaken here is common to all requests, with request-
    /// specific validation performed by the request's handler.
    fn validate(
        &self, issuer: &str, _provider: &impl Provider,
    ) -> impl Future<Output = Result<()>> + Send {
        async {
            if issuer.is_empty() {
                return Err(invalid!("no issuer specified"));
            }
            Ok(())
        }
    }
}

pub(crate) use seal::{Body, Headers};
pub(crate) mod seal {
    use std::fmt::Debug;

    /// The `Body` trait is used to restrict the types able to be a Request
    /// body. It is implemented by all `xxxRequest` types.
    pub trait Body: Clone + Debug + Send + Sync {}

    /// The `Headers` trait is used to restrict the types able to be Request
    /// headers. It is implemented by handlers expecting headers.
    pub trait Headers: Clone + Debug + Send + Sync {}
}
