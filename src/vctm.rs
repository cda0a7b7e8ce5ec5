//! # Verifiable Credential Type Metadata (VCTM)
//!
//! A VCTM document describes the claim layout and display rendering of a
//! credential type: which JSON paths to extract from a source document's
//! `document_data`, and the label and SVG template slot each extracted
//! value is rendered into at consent time.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json_path::JsonPath;

/// Type metadata for a credential type.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Vctm {
    /// The credential type the metadata describes.
    pub vct: String,

    /// Human-readable name of the credential type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Human-readable description of the credential type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// The claims rendered at consent time.
    #[serde(default)]
    pub claims: Vec<VctmClaim>,
}

/// A single claim extraction: a JSON path into `document_data` plus its
/// rendering slot.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct VctmClaim {
    /// JSON path selecting the claim value.
    pub path: String,

    /// The SVG template slot the value is rendered into.
    pub svg_id: String,

    /// Display label.
    pub label: String,
}

/// A claim value ready for display.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct DisplayClaim {
    /// Display label.
    pub label: String,

    /// The extracted value.
    pub value: Value,
}

/// Apply each of the VCTM's claim paths to a document's data, producing the
/// `svg_id → {label, value}` bundle shown to the user at consent time.
///
/// Paths that select nothing are skipped; a malformed path is an error.
///
/// # Errors
///
/// Returns an error if a claim path does not parse as a JSON path.
pub fn display_claims(
    vctm: &Vctm, document_data: &Value,
) -> Result<HashMap<String, DisplayClaim>> {
    let mut claims = HashMap::new();
    for claim in &vctm.claims {
        let path = JsonPath::parse(&claim.path)
            .map_err(|e| anyhow!("issue parsing claim path `{}`: {e}", claim.path))?;
        let nodes = path.query(document_data).all();
        if let Some(value) = nodes.first() {
            claims.insert(
                claim.svg_id.clone(),
                DisplayClaim { label: claim.label.clone(), value: (*value).clone() },
            );
        }
    }
    Ok(claims)
}
