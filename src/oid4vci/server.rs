//! The authorization-server half of the gateway: pushed authorization
//! requests, the authorization endpoint, the user-facing consent step, and
//! the token endpoint.

pub mod authorize;
pub mod consent;
pub mod grant;
pub mod par;
pub mod token;
