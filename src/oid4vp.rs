//! The gateway's inner verification leg, based on the [OpenID for
//! Verifiable Presentations] specification.
//!
//! For scopes configured with `pid_auth`, user authentication is a
//! presentation: the gateway acts as a verifier towards the user's wallet.
//! The consent step hands the wallet a `request_uri`; the wallet fetches
//! the signed Request Object from [`handlers::request_object`], and posts
//! its encrypted Authorization Response to [`handlers::direct_post`]:
//!
//! ```text
//! +--------------+   +--------------+                       +--------------+
//! |     User     |   |   Gateway    |                       |    Wallet    |
//! +--------------+   +--------------+                       +--------------+
//!         |                 |                                      |
//!         |    Consent      |                                      |
//!         |---------------->|  (1) redirect with request_uri       |
//!         |                 |------------------------------------->|
//!         |                 |                                      |
//!         |                 |  (2) GET request object (signed JWT) |
//!         |                 |<-------------------------------------|
//!         |                 |                                      |
//!         |                 |  (3) POST direct_post (JWE)          |
//!         |                 |<-------------------------------------|
//!         |                 |                                      |
//!         |                 |  (4) redirect to consent callback    |
//!         |                 |------------------------------------->|
//! ```
//!
//! The response is encrypted to the session's ephemeral P-256 key
//! (`ECDH-ES`/`A256GCM`). Decryption yields a PID presentation; the
//! extracted identity drives a datastore lookup whose results are cached
//! per session for the credential endpoint to consume.
//!
//! [OpenID for Verifiable Presentations]: https://openid.net/specs/openid-4-verifiable-presentations-1_0.html

pub mod handlers;
pub mod types;

pub use crate::{Error, Result};
