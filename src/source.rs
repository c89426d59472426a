//! The input to one invocation: bytes, declared media type, and key.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// A source file as read from blob storage. Immutable once read.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Stable identifier; also the prefix of the raw-response blob.
    pub key: String,
    /// Declared media type, e.g. `application/pdf`.
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl SourceDocument {
    pub fn new(
        key: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            key: key.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Name carried by the `document` content block.
    pub fn document_name(&self) -> String {
        sanitize_document_name(base_name(&self.key))
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("key", &self.key)
            .field("media_type", &self.media_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Final path segment without its extension.
fn base_name(key: &str) -> &str {
    let file = key.rsplit(['/', '\\']).next().unwrap_or(key);
    match file.rfind('.') {
        Some(0) | None => file,
        Some(dot) => &file[..dot],
    }
}

static RE_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s\-()\[\]]").expect("valid regex"));
static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip characters the inference service rejects in document names.
pub fn sanitize_document_name(name: &str) -> String {
    let kept = RE_DISALLOWED.replace_all(name, "");
    let collapsed = RE_WHITESPACE.replace_all(&kept, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_drops_prefix_and_extension() {
        assert_eq!(base_name("inbox/2024/claim form.pdf"), "claim form");
        assert_eq!(base_name("scan.final.png"), "scan.final");
        assert_eq!(base_name("README"), "README");
        assert_eq!(base_name(".hidden"), ".hidden");
    }

    #[test]
    fn sanitize_removes_punctuation_and_collapses_spaces() {
        assert_eq!(
            sanitize_document_name("  Invoice #42 — ACME_Corp (copy) [v2]  "),
            "Invoice 42 ACMECorp (copy) [v2]"
        );
        assert_eq!(sanitize_document_name("a\t\tb"), "a b");
    }

    #[test]
    fn empty_name_falls_back() {
        assert_eq!(sanitize_document_name("***"), "document");
        let doc = SourceDocument::new("dir/%%%.pdf", "application/pdf", Vec::<u8>::new());
        assert_eq!(doc.document_name(), "document");
    }

    #[test]
    fn debug_hides_payload() {
        let doc = SourceDocument::new("a.pdf", "application/pdf", vec![1u8, 2, 3]);
        let dbg = format!("{doc:?}");
        assert!(dbg.contains("<3 bytes>"), "got: {dbg}");
    }
}
