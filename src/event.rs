//! Invocation events → source key.
//!
//! Two shapes are accepted:
//!
//! * a storage notification, `{"Records": [{"s3": {"object": {"key": "..."}}}]}`,
//!   where only the first record is used;
//! * a workflow step input, `{"Key": "..."}`.
//!
//! Keys arrive form-URL-encoded (`+` for space, `%XX` escapes) and are
//! decoded before use.

use crate::error::IdpError;
use serde_json::Value;
use tracing::debug;

/// Extract and decode the source key from a raw JSON event.
pub fn parse_event(raw: &str) -> Result<String, IdpError> {
    let event: Value = serde_json::from_str(raw)
        .map_err(|e| IdpError::InvalidEvent(format!("event is not valid JSON: {e}")))?;
    source_key(&event)
}

/// Extract and decode the source key from a parsed event.
pub fn source_key(event: &Value) -> Result<String, IdpError> {
    let encoded = if let Some(records) = event.get("Records") {
        records
            .get(0)
            .and_then(|r| r.pointer("/s3/object/key"))
            .and_then(Value::as_str)
            .ok_or_else(|| IdpError::InvalidEvent("Records[0].s3.object.key is missing".into()))?
    } else {
        event
            .get("Key")
            .and_then(Value::as_str)
            .ok_or_else(|| IdpError::InvalidEvent("event has neither Records nor Key".into()))?
    };

    let key = form_url_decode(encoded)?;
    if key.trim().is_empty() {
        return Err(IdpError::InvalidEvent("source key is empty".into()));
    }
    debug!("Event key: {}", key);
    Ok(key)
}

/// Decode `application/x-www-form-urlencoded` text.
pub fn form_url_decode(input: &str) -> Result<String, IdpError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| {
                        IdpError::InvalidEvent(format!("malformed escape at byte {i} in '{input}'"))
                    })?;
                out.push(hex);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    String::from_utf8(out)
        .map_err(|e| IdpError::InvalidEvent(format!("decoded key is not UTF-8: {e}")))
}
