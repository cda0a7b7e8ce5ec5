//! The issuer half of the gateway: the credential endpoint, wallet event
//! notification, pre-minted credential offers, and the signed metadata
//! publisher.

pub mod credential;
pub mod metadata;
pub mod notification;
pub mod offer;
