//! # Core Utilities
//!
//! Shared helpers with no protocol knowledge: random identifier generation,
//! PKCE primitives, and query-string serialization.

pub mod generate;
pub mod pkce;
pub mod urlencode;
