//! The issuance gateway core of a verifiable-credential platform.
//!
//! This library implements the server-side state machine that mediates
//! between a wallet, a user-facing consent/verification step, and a
//! downstream credential-signing service. Wallets obtain credentials using
//! the OAuth 2.0 Pushed Authorization Request ([RFC 9126]) + Authorization
//! Code + DPoP ([RFC 9449]) flow in front of the [OpenID4VCI] credential
//! endpoint. An [OpenID4VP] inner verification leg is used as a means of
//! user authentication: the gateway acts as a verifier towards the user's
//! wallet in order to obtain a PID attestation before consent is granted.
//!
//! # Design
//!
//! The library is architected around the protocol endpoints, each with its
//! own `XxxRequest` and `XxxResponse` types. The types serialize to and
//! from JSON, in accordance with the specifications.
//!
//! The endpoints are designed to be used with Rust-based HTTP servers, such
//! as [axum](https://docs.rs/axum/latest/axum/): each handler is a
//! self-contained transaction over the authorization-context store, exposed
//! through [`endpoint::handle`].
//!
//! Implementers provide `Provider` traits responsible for externals such as
//! persistent storage, the credential-signing backend, and the status-list
//! backend. See [`provider`].
//!
//! [RFC 9126]: https://www.rfc-editor.org/rfc/rfc9126.html
//! [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449.html
//! [OpenID4VCI]: https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html
//! [OpenID4VP]: https://openid.net/specs/openid-4-verifiable-presentations-1_0.html

pub mod cache;
pub mod core;
pub mod cose;
pub mod document;
pub mod dpop;
pub mod endpoint;
mod error;
pub mod jose;
pub mod oid4vci;
pub mod oid4vp;
pub mod provider;
pub mod sd_jwt;
pub mod state;
pub mod status;
pub mod vctm;

pub use error::Error;

/// Result type for gateway endpoints.
pub type Result<T, E = Error> = std::result::Result<T, E>;
