//! Inference request construction.
//!
//! A request is `[text(prompt), <route content>]` plus the fixed system
//! instruction and deterministic generation settings. Construction is pure:
//! the same source, decision, prompt and settings always produce an equal
//! request, block for block.

use crate::config::RequestLimits;
use crate::error::IdpError;
use crate::pipeline::content_type::{DocumentFormat, ImageFormat};
use crate::pipeline::route::{ProcessingRoute, RouteDecision};
use crate::prompts::SYSTEM_INSTRUCTION;
use crate::source::SourceDocument;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Format of every image extracted from a PDF.
pub const EXTRACTED_IMAGE_FORMAT: ImageFormat = ImageFormat::Jpeg;

/// One unit of request input.
#[derive(Clone, PartialEq, Eq)]
pub enum ContentBlock {
    Text(String),
    Document {
        name: String,
        format: DocumentFormat,
        bytes: Arc<[u8]>,
    },
    Image {
        format: ImageFormat,
        bytes: Arc<[u8]>,
    },
}

impl ContentBlock {
    /// Binary payload size; zero for text.
    pub fn payload_len(&self) -> usize {
        match self {
            ContentBlock::Text(_) => 0,
            ContentBlock::Document { bytes, .. } | ContentBlock::Image { bytes, .. } => bytes.len(),
        }
    }
}

impl fmt::Debug for ContentBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentBlock::Text(t) => f.debug_tuple("Text").field(t).finish(),
            ContentBlock::Document { name, format, bytes } => f
                .debug_struct("Document")
                .field("name", name)
                .field("format", format)
                .field("bytes", &format_args!("<{} bytes>", bytes.len()))
                .finish(),
            ContentBlock::Image { format, bytes } => f
                .debug_struct("Image")
                .field("format", format)
                .field("bytes", &format_args!("<{} bytes>", bytes.len()))
                .finish(),
        }
    }
}

/// Decoding settings. Temperature and top-p are always zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl GenerationConfig {
    pub fn deterministic(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            temperature: 0.0,
            top_p: 0.0,
        }
    }
}

/// Everything the inference backend needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub system: String,
    pub blocks: Vec<ContentBlock>,
    pub generation: GenerationConfig,
}

impl InferenceRequest {
    pub fn image_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, ContentBlock::Image { .. }))
            .count()
    }

    pub fn payload_len(&self) -> usize {
        self.blocks.iter().map(ContentBlock::payload_len).sum()
    }
}

/// Build the request for a routed source document.
///
/// Returns `Internal` for the `Unsupported` route, which must never reach
/// this point, and `RequestTooLarge` when `limits` are exceeded.
pub fn build_request(
    source: &SourceDocument,
    decision: &RouteDecision,
    prompt: &str,
    generation: GenerationConfig,
    limits: &RequestLimits,
) -> Result<InferenceRequest, IdpError> {
    let mut blocks = vec![ContentBlock::Text(prompt.to_string())];

    match &decision.route {
        ProcessingRoute::WholeDocumentInference { format } => {
            blocks.push(ContentBlock::Document {
                name: source.document_name(),
                format: *format,
                bytes: Arc::clone(&source.bytes),
            });
        }
        ProcessingRoute::MultiImageInference { images } => {
            blocks.extend(images.iter().map(|img| ContentBlock::Image {
                format: EXTRACTED_IMAGE_FORMAT,
                bytes: Arc::clone(&img.data),
            }));
        }
        ProcessingRoute::SingleImageInference { format } => {
            blocks.push(ContentBlock::Image {
                format: *format,
                bytes: Arc::clone(&source.bytes),
            });
        }
        ProcessingRoute::Unsupported => {
            return Err(IdpError::Internal(
                "cannot build an inference request for unsupported content".into(),
            ));
        }
    }

    let request = InferenceRequest {
        system: SYSTEM_INSTRUCTION.to_string(),
        blocks,
        generation,
    };
    check_limits(&request, limits)?;

    debug!(
        "Built request: {} blocks, {} images, {} payload bytes",
        request.blocks.len(),
        request.image_count(),
        request.payload_len()
    );
    Ok(request)
}

fn check_limits(request: &InferenceRequest, limits: &RequestLimits) -> Result<(), IdpError> {
    let images = request.image_count();
    if images > limits.max_images {
        return Err(IdpError::RequestTooLarge {
            detail: format!("{images} images exceed the limit of {}", limits.max_images),
        });
    }
    let bytes = request.payload_len();
    if bytes > limits.max_payload_bytes {
        return Err(IdpError::RequestTooLarge {
            detail: format!(
                "{bytes} payload bytes exceed the limit of {}",
                limits.max_payload_bytes
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::classify::ImageClassification;
    use crate::pipeline::content_type::ContentKind;
    use crate::pipeline::extract::ExtractedImage;
    use crate::pipeline::route::decide_from;

    fn scanned(page: u32, position: usize, tag: u8) -> ExtractedImage {
        ExtractedImage {
            data: Arc::from(vec![0xFF, 0xD8, tag]),
            width: 2000,
            height: 500,
            page,
            position,
            name: format!("Im{position}"),
            classification: ImageClassification::ScannedDocument,
        }
    }

    fn build(
        source: &SourceDocument,
        decision: &RouteDecision,
    ) -> Result<InferenceRequest, IdpError> {
        build_request(
            source,
            decision,
            "PROMPT",
            GenerationConfig::deterministic(1024),
            &RequestLimits::default(),
        )
    }

    #[test]
    fn whole_document_is_text_then_document() {
        let source = SourceDocument::new("in/Claim Form.pdf", "application/pdf", b"%PDF".to_vec());
        let decision = decide_from(ContentKind::Document, "application/pdf", vec![]);
        let req = build(&source, &decision).unwrap();

        assert_eq!(req.blocks.len(), 2);
        assert_eq!(req.blocks[0], ContentBlock::Text("PROMPT".into()));
        match &req.blocks[1] {
            ContentBlock::Document { name, format, bytes } => {
                assert_eq!(name, "Claim Form");
                assert_eq!(*format, DocumentFormat::Pdf);
                assert_eq!(&bytes[..], b"%PDF");
            }
            other => panic!("expected document block, got {other:?}"),
        }
        assert_eq!(req.system, SYSTEM_INSTRUCTION);
        assert_eq!(req.generation.temperature, 0.0);
        assert_eq!(req.generation.top_p, 0.0);
        assert_eq!(req.generation.max_tokens, 1024);
    }

    #[test]
    fn multi_image_keeps_extraction_order() {
        let source = SourceDocument::new("scan.pdf", "application/pdf", b"%PDF".to_vec());
        let decision = decide_from(
            ContentKind::Document,
            "application/pdf",
            vec![scanned(1, 0, 1), scanned(1, 2, 2), scanned(3, 0, 3)],
        );
        let req = build(&source, &decision).unwrap();

        assert!(matches!(req.blocks[0], ContentBlock::Text(_)));
        let tags: Vec<u8> = req.blocks[1..]
            .iter()
            .map(|b| match b {
                ContentBlock::Image { format, bytes } => {
                    assert_eq!(*format, ImageFormat::Jpeg);
                    bytes[2]
                }
                other => panic!("expected image block, got {other:?}"),
            })
            .collect();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn single_image_uses_detected_format() {
        let source = SourceDocument::new("photo.png", "image/png", vec![0x89, b'P']);
        let decision = decide_from(ContentKind::Image, "image/png", vec![]);
        let req = build(&source, &decision).unwrap();
        assert_eq!(
            req.blocks[1],
            ContentBlock::Image {
                format: ImageFormat::Png,
                bytes: Arc::from(vec![0x89, b'P']),
            }
        );
    }

    #[test]
    fn unsupported_route_cannot_be_built() {
        let source = SourceDocument::new("a.zip", "application/zip", vec![]);
        let decision = decide_from(ContentKind::Unsupported, "application/zip", vec![]);
        assert!(matches!(build(&source, &decision), Err(IdpError::Internal(_))));
    }

    #[test]
    fn building_twice_is_identical() {
        let source = SourceDocument::new("scan.pdf", "application/pdf", b"%PDF".to_vec());
        let decision = decide_from(
            ContentKind::Document,
            "application/pdf",
            vec![scanned(1, 0, 7), scanned(2, 1, 8)],
        );
        let a = build(&source, &decision).unwrap();
        let b = build(&source, &decision).unwrap();
        assert_eq!(a, b);
        assert_eq!(format!("{a:?}"), format!("{b:?}"));
    }

    #[test]
    fn too_many_images_rejected() {
        let source = SourceDocument::new("scan.pdf", "application/pdf", b"%PDF".to_vec());
        let images = (0..3).map(|i| scanned(1, i, i as u8)).collect();
        let decision = decide_from(ContentKind::Document, "application/pdf", images);
        let limits = RequestLimits {
            max_images: 2,
            ..RequestLimits::default()
        };
        let err = build_request(
            &source,
            &decision,
            "PROMPT",
            GenerationConfig::deterministic(10),
            &limits,
        )
        .unwrap_err();
        assert!(matches!(err, IdpError::RequestTooLarge { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn oversized_payload_rejected() {
        let source = SourceDocument::new("big.pdf", "application/pdf", vec![0u8; 64]);
        let decision = decide_from(ContentKind::Document, "application/pdf", vec![]);
        let limits = RequestLimits {
            max_payload_bytes: 63,
            ..RequestLimits::default()
        };
        let err = build_request(
            &source,
            &decision,
            "PROMPT",
            GenerationConfig::deterministic(10),
            &limits,
        )
        .unwrap_err();
        assert!(err.to_string().contains("64 payload bytes"));
    }
}
