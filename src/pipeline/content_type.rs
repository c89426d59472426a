//! Declared media type → content kind and concrete sub-format.
//!
//! Matching is case-insensitive containment of a whole token: the token must
//! sit between non-alphanumeric characters (`/`, `.`, `+`, `-`, `;`) or the
//! ends of the string. Parameters (`; charset=...`) and vendor prefixes never
//! prevent a match, while `md` inside `vnd.amd...` is not one. A type that
//! mentions both a document and an image token resolves to
//! [`ContentKind::Document`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse verdict used by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentKind {
    Document,
    Image,
    Unsupported,
}

/// Raster formats the inference service accepts in an `image` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Png => "PNG",
            ImageFormat::Jpeg => "JPEG",
            ImageFormat::Gif => "GIF",
            ImageFormat::Webp => "WEBP",
        })
    }
}

/// Document formats the inference service accepts in a `document` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Csv,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Html,
    Txt,
    Md,
}

impl DocumentFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Csv => "text/csv",
            DocumentFormat::Doc => "application/msword",
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Xls => "application/vnd.ms-excel",
            DocumentFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DocumentFormat::Html => "text/html",
            DocumentFormat::Txt => "text/plain",
            DocumentFormat::Md => "text/markdown",
        }
    }

    /// Plain-text formats that a backend may send as text rather than bytes.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            DocumentFormat::Csv | DocumentFormat::Html | DocumentFormat::Txt | DocumentFormat::Md
        )
    }
}

// Longer tokens first: "docx" must win over "doc", "xlsx" over "xls".
const DOCUMENT_TOKENS: &[(&str, DocumentFormat)] = &[
    ("pdf", DocumentFormat::Pdf),
    ("wordprocessingml", DocumentFormat::Docx),
    ("spreadsheetml", DocumentFormat::Xlsx),
    ("docx", DocumentFormat::Docx),
    ("xlsx", DocumentFormat::Xlsx),
    ("msword", DocumentFormat::Doc),
    ("ms-excel", DocumentFormat::Xls),
    ("doc", DocumentFormat::Doc),
    ("xls", DocumentFormat::Xls),
    ("csv", DocumentFormat::Csv),
    ("html", DocumentFormat::Html),
    ("markdown", DocumentFormat::Md),
    ("text/plain", DocumentFormat::Txt),
    ("txt", DocumentFormat::Txt),
    ("md", DocumentFormat::Md),
];

const IMAGE_TOKENS: &[(&str, ImageFormat)] = &[
    ("png", ImageFormat::Png),
    ("jpeg", ImageFormat::Jpeg),
    ("jpg", ImageFormat::Jpeg),
    ("gif", ImageFormat::Gif),
    ("webp", ImageFormat::Webp),
];

/// Resolve a declared media type to a content kind.
pub fn resolve(media_type: &str) -> ContentKind {
    let lower = media_type.to_ascii_lowercase();
    if document_format_of(&lower).is_some() {
        ContentKind::Document
    } else if image_format_of(&lower).is_some() {
        ContentKind::Image
    } else {
        ContentKind::Unsupported
    }
}

/// Whether the declared type names a PDF.
pub fn is_pdf(media_type: &str) -> bool {
    contains_token(&media_type.to_ascii_lowercase(), "pdf")
}

/// Detect the raster sub-format, defaulting to JPEG.
pub fn detect_image_format(media_type: &str) -> ImageFormat {
    image_format_of(&media_type.to_ascii_lowercase()).unwrap_or(ImageFormat::Jpeg)
}

/// Detect the document sub-format, defaulting to PDF.
pub fn detect_document_format(media_type: &str) -> DocumentFormat {
    document_format_of(&media_type.to_ascii_lowercase()).unwrap_or(DocumentFormat::Pdf)
}

fn document_format_of(lower: &str) -> Option<DocumentFormat> {
    DOCUMENT_TOKENS
        .iter()
        .find(|(token, _)| contains_token(lower, token))
        .map(|&(_, format)| format)
}

fn image_format_of(lower: &str) -> Option<ImageFormat> {
    IMAGE_TOKENS
        .iter()
        .find(|(token, _)| contains_token(lower, token))
        .map(|&(_, format)| format)
}

/// `token` occurs in `haystack` with no letter or digit on either side.
fn contains_token(haystack: &str, token: &str) -> bool {
    let bytes = haystack.as_bytes();
    haystack.match_indices(token).any(|(start, _)| {
        let end = start + token.len();
        let before = start.checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(end).copied();
        !before.is_some_and(|b| b.is_ascii_alphanumeric())
            && !after.is_some_and(|b| b.is_ascii_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_is_document() {
        assert_eq!(resolve("application/pdf"), ContentKind::Document);
        assert_eq!(resolve("Application/PDF"), ContentKind::Document);
        assert!(is_pdf("application/PDF"));
    }

    #[test]
    fn rasters_are_images() {
        for t in ["image/png", "image/jpeg", "image/jpg", "image/gif", "image/webp"] {
            assert_eq!(resolve(t), ContentKind::Image, "{t}");
        }
    }

    #[test]
    fn unknown_types_are_unsupported() {
        assert_eq!(resolve("application/octet-stream"), ContentKind::Unsupported);
        assert_eq!(resolve("image/svg+xml"), ContentKind::Unsupported);
        assert_eq!(resolve(""), ContentKind::Unsupported);
    }

    #[test]
    fn tokens_inside_other_words_do_not_match() {
        assert_eq!(resolve("application/vnd.amd.binary"), ContentKind::Unsupported);
        assert_eq!(resolve("application/vnd.docusign.envelope"), ContentKind::Unsupported);
        assert_eq!(resolve("application/vnd.rapng"), ContentKind::Unsupported);
        assert!(!is_pdf("application/vnd.xpdfx"));
    }

    #[test]
    fn tokens_match_between_separators() {
        assert_eq!(detect_document_format("text/x-markdown"), DocumentFormat::Md);
        assert_eq!(detect_document_format("text/md"), DocumentFormat::Md);
        assert_eq!(detect_document_format("application/vnd.ms-excel"), DocumentFormat::Xls);
        assert_eq!(detect_image_format("IMAGE/JPG"), ImageFormat::Jpeg);
        assert!(is_pdf("application/x-pdf"));
        assert!(is_pdf("application/pdf; charset=binary"));
    }

    #[test]
    fn ambiguous_type_prefers_document() {
        assert_eq!(resolve("application/x-pdf+png"), ContentKind::Document);
    }

    #[test]
    fn office_formats_pick_the_specific_variant() {
        assert_eq!(
            detect_document_format(DocumentFormat::Docx.mime_type()),
            DocumentFormat::Docx
        );
        assert_eq!(
            detect_document_format(DocumentFormat::Xlsx.mime_type()),
            DocumentFormat::Xlsx
        );
        assert_eq!(detect_document_format("application/msword"), DocumentFormat::Doc);
        assert_eq!(detect_document_format("text/csv; charset=utf-8"), DocumentFormat::Csv);
        assert_eq!(detect_document_format("text/plain"), DocumentFormat::Txt);
    }

    #[test]
    fn sub_format_defaults() {
        assert_eq!(detect_image_format("image/x-unknown"), ImageFormat::Jpeg);
        assert_eq!(detect_image_format("image/png"), ImageFormat::Png);
        assert_eq!(detect_document_format("application/x-unknown"), DocumentFormat::Pdf);
    }
}
