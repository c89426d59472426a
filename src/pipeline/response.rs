//! Model answer → flat attribute record.
//!
//! The answer must be a single JSON object. Every value is flattened to a
//! string and the router's provenance is added on top. Anything that does
//! not parse fails the whole unit of work; there is no partial record.

use crate::error::IdpError;
use crate::pipeline::request::EXTRACTED_IMAGE_FORMAT;
use crate::pipeline::route::{RouteDecision, RouteKind};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Flat field name → string value mapping persisted per source key.
pub type AttributeRecord = BTreeMap<String, String>;

/// Value stored for a JSON `null`.
pub const NO_DATA: &str = "no data";

// ── Attribute names ──────────────────────────────────────────────────────

pub const ATTR_FILE_NAME: &str = "fileName";
pub const ATTR_IS_PDF: &str = "isPdf";
pub const ATTR_CONTAINS_IMAGES: &str = "containsImages";
pub const ATTR_USED_EXTRACTED_IMAGES: &str = "usedExtractedImages";
pub const ATTR_IMAGE_COUNT: &str = "imageCount";
pub const ATTR_LOGO_IMAGE_COUNT: &str = "logoImageCount";
pub const ATTR_DOCUMENT_IMAGE_COUNT: &str = "documentImageCount";
pub const ATTR_ROUTE: &str = "route";
pub const ATTR_IMAGE_FORMAT: &str = "imageFormat";

/// Outcome of a successful extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub raw_response: String,
    pub attributes: AttributeRecord,
    pub route: RouteKind,
}

/// Parse the model answer and build the attribute record for `key`.
pub fn map_response(
    key: &str,
    raw_response: &str,
    decision: &RouteDecision,
) -> Result<ExtractionResult, IdpError> {
    let value: Value = serde_json::from_str(raw_response).map_err(|e| IdpError::MalformedResponse {
        detail: e.to_string(),
    })?;
    let Value::Object(fields) = value else {
        return Err(IdpError::MalformedResponse {
            detail: format!("expected a JSON object, got {}", json_type(&value)),
        });
    };

    let mut attributes: AttributeRecord = fields
        .into_iter()
        .map(|(name, v)| (name, stringify(v)))
        .collect();
    add_provenance(&mut attributes, key, decision);

    Ok(ExtractionResult {
        raw_response: raw_response.to_string(),
        attributes,
        route: decision.route.kind(),
    })
}

/// String form of one JSON value. Strings are stored unquoted; arrays and
/// objects as compact JSON.
pub fn stringify(value: Value) -> String {
    match value {
        Value::Null => NO_DATA.to_string(),
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
    }
}

// Written after model fields, so these win on name collisions.
fn add_provenance(attributes: &mut AttributeRecord, key: &str, decision: &RouteDecision) {
    let p = &decision.provenance;
    let route = decision.route.kind();
    let used_extracted = route == RouteKind::MultiImageInference;

    let mut set = |name: &str, value: String| {
        attributes.insert(name.to_string(), value);
    };
    set(ATTR_FILE_NAME, key.trim().to_string());
    set(ATTR_IS_PDF, p.is_pdf.to_string());
    set(ATTR_CONTAINS_IMAGES, p.contains_document_images().to_string());
    set(ATTR_USED_EXTRACTED_IMAGES, used_extracted.to_string());
    set(ATTR_IMAGE_COUNT, p.total_images().to_string());
    set(ATTR_LOGO_IMAGE_COUNT, p.logo_images.to_string());
    set(ATTR_DOCUMENT_IMAGE_COUNT, p.document_images.to_string());
    set(ATTR_ROUTE, route.to_string());
    if used_extracted {
        set(ATTR_IMAGE_FORMAT, EXTRACTED_IMAGE_FORMAT.to_string());
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
