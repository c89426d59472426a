//! Content routing: decide, once per source document, how it is presented to
//! the model.
//!
//! ```text
//! Unclassified ──resolve──▶ Unsupported                       (terminal, no call)
//!              │
//!              ├──────────▶ Image    ─▶ SingleImageInference
//!              │
//!              └──────────▶ Document ─▶ extract (PDF only) ─▶ scanned docs?
//!                                          ├─ yes ─▶ MultiImageInference
//!                                          └─ no  ─▶ WholeDocumentInference
//! ```
//!
//! The resulting [`RouteDecision`] is the only input the request builder and
//! the response mapper consult; neither re-derives anything from the media
//! type.

use crate::pipeline::classify::{ClassifierThresholds, ImageClassification};
use crate::pipeline::content_type::{self, ContentKind, DocumentFormat, ImageFormat};
use crate::pipeline::extract::{self, ExtractedImage};
use crate::source::SourceDocument;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// How one source document is presented to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingRoute {
    /// Send the original bytes as a single `document` block.
    WholeDocumentInference { format: DocumentFormat },
    /// Send only the scanned-document images pulled out of a PDF.
    MultiImageInference { images: Vec<ExtractedImage> },
    /// Send the original bytes as a single `image` block.
    SingleImageInference { format: ImageFormat },
    /// No inference; the invocation returns the sentinel.
    Unsupported,
}

impl ProcessingRoute {
    pub fn kind(&self) -> RouteKind {
        match self {
            ProcessingRoute::WholeDocumentInference { .. } => RouteKind::WholeDocumentInference,
            ProcessingRoute::MultiImageInference { .. } => RouteKind::MultiImageInference,
            ProcessingRoute::SingleImageInference { .. } => RouteKind::SingleImageInference,
            ProcessingRoute::Unsupported => RouteKind::Unsupported,
        }
    }
}

/// Payload-free tag of a [`ProcessingRoute`], used for provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RouteKind {
    WholeDocumentInference,
    MultiImageInference,
    SingleImageInference,
    Unsupported,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteKind::WholeDocumentInference => "WholeDocumentInference",
            RouteKind::MultiImageInference => "MultiImageInference",
            RouteKind::SingleImageInference => "SingleImageInference",
            RouteKind::Unsupported => "Unsupported",
        })
    }
}

/// What the router saw, recorded alongside the extracted fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Provenance {
    pub is_pdf: bool,
    pub logo_images: usize,
    pub document_images: usize,
}

impl Provenance {
    /// All decoded images, whatever their classification.
    pub fn total_images(&self) -> usize {
        self.logo_images + self.document_images
    }

    pub fn contains_document_images(&self) -> bool {
        self.document_images > 0
    }
}

/// The route plus the facts it was decided from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub kind: ContentKind,
    pub route: ProcessingRoute,
    pub provenance: Provenance,
}

/// Decide the route for a source document, extracting PDF images as needed.
pub async fn decide(source: &SourceDocument, thresholds: &ClassifierThresholds) -> RouteDecision {
    let kind = content_type::resolve(&source.media_type);
    let is_pdf = content_type::is_pdf(&source.media_type);

    let images = if kind == ContentKind::Document && is_pdf {
        extract::extract_images(Arc::clone(&source.bytes), *thresholds).await
    } else {
        Vec::new()
    };

    let decision = decide_from(kind, &source.media_type, images);
    info!(
        "Routing '{}' ({}): {:?} → {} [{} logo, {} scanned]",
        source.key,
        source.media_type,
        decision.kind,
        decision.route.kind(),
        decision.provenance.logo_images,
        decision.provenance.document_images
    );
    decision
}

/// Pure routing step once the content kind and extracted images are known.
///
/// `images` must already be in (page, object position) order; it is only
/// non-empty for PDFs.
pub fn decide_from(
    kind: ContentKind,
    media_type: &str,
    images: Vec<ExtractedImage>,
) -> RouteDecision {
    let is_pdf = content_type::is_pdf(media_type);
    let logo_images = images
        .iter()
        .filter(|i| i.classification == ImageClassification::Logo)
        .count();

    let documents_only: Vec<ExtractedImage> = images
        .into_iter()
        .filter(ExtractedImage::is_scanned_document)
        .collect();

    let provenance = Provenance {
        is_pdf,
        logo_images,
        document_images: documents_only.len(),
    };

    let route = match kind {
        ContentKind::Unsupported => ProcessingRoute::Unsupported,
        ContentKind::Image => ProcessingRoute::SingleImageInference {
            format: content_type::detect_image_format(media_type),
        },
        ContentKind::Document if !documents_only.is_empty() => {
            ProcessingRoute::MultiImageInference {
                images: documents_only,
            }
        }
        ContentKind::Document => ProcessingRoute::WholeDocumentInference {
            format: content_type::detect_document_format(media_type),
        },
    };

    RouteDecision {
        kind,
        route,
        provenance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(page: u32, position: usize, w: u32, h: u32) -> ExtractedImage {
        ExtractedImage {
            data: Arc::from(vec![0xFF, 0xD8]),
            width: w,
            height: h,
            page,
            position,
            name: format!("Im{position}"),
            classification: crate::pipeline::classify::classify(w, h),
        }
    }

    #[test]
    fn pdf_without_images_is_whole_document() {
        let d = decide_from(ContentKind::Document, "application/pdf", vec![]);
        assert_eq!(
            d.route,
            ProcessingRoute::WholeDocumentInference {
                format: DocumentFormat::Pdf
            }
        );
        assert!(d.provenance.is_pdf);
        assert_eq!(d.provenance.total_images(), 0);
    }

    #[test]
    fn pdf_with_only_logos_is_whole_document() {
        let d = decide_from(
            ContentKind::Document,
            "application/pdf",
            vec![image(1, 0, 50, 50), image(2, 0, 120, 60)],
        );
        assert_eq!(d.route.kind(), RouteKind::WholeDocumentInference);
        assert_eq!(d.provenance.logo_images, 2);
        assert!(!d.provenance.contains_document_images());
    }

    #[test]
    fn scanned_images_route_to_multi_image_without_logos() {
        let d = decide_from(
            ContentKind::Document,
            "application/pdf",
            vec![
                image(1, 0, 50, 50),
                image(1, 1, 2000, 500),
                image(2, 0, 800, 600),
                image(2, 1, 40, 40),
            ],
        );
        match &d.route {
            ProcessingRoute::MultiImageInference { images } => {
                let order: Vec<(u32, usize)> =
                    images.iter().map(|i| (i.page, i.position)).collect();
                assert_eq!(order, vec![(1, 1), (2, 0)]);
            }
            other => panic!("expected multi-image route, got {other:?}"),
        }
        assert_eq!(d.provenance.logo_images, 2);
        assert_eq!(d.provenance.document_images, 2);
    }

    #[test]
    fn raster_image_routes_to_single_image_with_format() {
        let d = decide_from(ContentKind::Image, "image/png", vec![]);
        assert_eq!(
            d.route,
            ProcessingRoute::SingleImageInference {
                format: ImageFormat::Png
            }
        );
        assert!(!d.provenance.is_pdf);
    }

    #[test]
    fn non_pdf_document_keeps_its_format() {
        let d = decide_from(ContentKind::Document, "text/csv", vec![]);
        assert_eq!(
            d.route,
            ProcessingRoute::WholeDocumentInference {
                format: DocumentFormat::Csv
            }
        );
    }

    #[test]
    fn unsupported_is_terminal() {
        let d = decide_from(ContentKind::Unsupported, "application/zip", vec![]);
        assert_eq!(d.route, ProcessingRoute::Unsupported);
        assert_eq!(d.route.kind().to_string(), "Unsupported");
    }

    #[tokio::test]
    async fn decide_skips_extraction_for_images() {
        let source = SourceDocument::new("photo.jpg", "image/jpeg", b"not really a jpeg".to_vec());
        let d = decide(&source, &ClassifierThresholds::default()).await;
        assert_eq!(d.route.kind(), RouteKind::SingleImageInference);
        assert_eq!(d.provenance.total_images(), 0);
    }

    #[tokio::test]
    async fn unparsable_pdf_falls_back_to_whole_document() {
        let source = SourceDocument::new("broken.pdf", "application/pdf", b"%PDF-garbage".to_vec());
        let d = decide(&source, &ClassifierThresholds::default()).await;
        assert_eq!(d.route.kind(), RouteKind::WholeDocumentInference);
    }
}
