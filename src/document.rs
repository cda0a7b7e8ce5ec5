//! # Source Documents
//!
//! Types describing the documents held by the upstream datastore. A
//! document is produced by an authentic source (e.g. a national health
//! authority) and carries the generic data a credential is constructed
//! from, together with the identities it is bound to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Subject identity attributes, as asserted by a PID presentation or the
/// user directory.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Identity {
    /// Current first name(s) of the subject.
    pub given_name: String,

    /// Current family name(s) of the subject.
    pub family_name: String,

    /// Date of birth, ISO 8601 `YYYY-MM-DD`.
    pub birth_date: String,
}

/// Metadata identifying a document within its authentic source.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DocumentMeta {
    /// The upstream authoritative producer of the document.
    pub authentic_source: String,

    /// The document type, aligned with the `vct` of credentials constructed
    /// from it.
    pub document_type: String,

    /// Source-scoped document identifier.
    pub document_id: String,
}

/// A complete document as stored by the datastore and cached per session by
/// the verification leg.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CompleteDocument {
    /// Document identification.
    pub meta: DocumentMeta,

    /// The identities the document is bound to.
    pub identities: Vec<Identity>,

    /// Presentation hints for user-facing display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_display: Option<Value>,

    /// The document body: a generic map whose layout is described by the
    /// document type's schema.
    pub document_data: Value,

    /// Semver of the `document_data` layout.
    pub document_data_version: String,

    /// Pre-rendered QR for wallet collection, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
}

impl CompleteDocument {
    /// Whether the document is bound to the given identity.
    #[must_use]
    pub fn bound_to(&self, identity: &Identity) -> bool {
        self.identities.iter().any(|i| i == identity)
    }
}
