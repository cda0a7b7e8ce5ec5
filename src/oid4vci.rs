//! An OAuth-protected API for the issuance of Verifiable Credentials, based
//! on the [OpenID for Verifiable Credential Issuance] specification.
//!
//! Access to the credential endpoint is authorized using OAuth 2.0
//! [RFC 6749]: wallets push an authorization request ([RFC 9126]), send the
//! user through the consent step, exchange the resulting single-use code
//! for a DPoP-bound access token ([RFC 9449]), and present that token —
//! together with a key proof — to obtain a credential.
//!
//! The module is split the way the protocol is:
//!
//! * [`server`] — the authorization-server half: PAR, authorize, the
//!   user-facing consent step, and the token endpoint.
//! * [`issuer`] — the issuer half: the credential endpoint, wallet event
//!   notification, pre-minted credential offers, and the signed metadata
//!   publisher.
//!
//! Endpoints are exposed through [`crate::endpoint::handle`]; the library
//! works with most common Rust HTTP servers with a few lines of 'wrapper'
//! code per endpoint.
//!
//! [OpenID for Verifiable Credential Issuance]: https://openid.net/specs/openid-4-verifiable-credential-issuance-1_0.html
//! [RFC 6749]: https://www.rfc-editor.org/rfc/rfc6749.html
//! [RFC 9126]: https://www.rfc-editor.org/rfc/rfc9126.html
//! [RFC 9449]: https://www.rfc-editor.org/rfc/rfc9449.html

pub mod issuer;
pub mod server;
pub mod types;

pub use crate::{Error, Result};
