//! Shared fixtures: in-test PDF/image generation, a recording inference
//! client and an extractor wired to in-memory stores.

#![allow(dead_code)]

use async_trait::async_trait;
use image::{DynamicImage, Rgb, RgbImage};
use idp_extract::store::{MemoryBlobStore, MemoryParameterStore, MemoryRecordStore};
use idp_extract::{
    Collaborators, ExtractionConfig, Extractor, InferenceClient, InferenceError, InferenceRequest,
    InferenceResponse,
};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

// ── Images ───────────────────────────────────────────────────────────────────

/// A flat grey JPEG of the given size.
pub fn jpeg(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([200, 200, 200])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
        .unwrap();
    buf
}

pub fn png(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([10, 20, 30])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

/// An embedded image in a generated PDF.
pub enum Embedded {
    /// DCT-encoded RGB image of the given size.
    Jpeg(u32, u32),
    /// A DCT stream whose bytes are not a JPEG.
    Corrupt,
}

// ── PDFs ─────────────────────────────────────────────────────────────────────

/// Build a PDF with one page per entry; each page's XObject table lists the
/// given images in order as `Im0`, `Im1`, ...
pub fn pdf_with_images(pages: &[&[Embedded]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for images in pages {
        let mut xobjects = Dictionary::new();
        for (i, image) in images.iter().enumerate() {
            let (w, h, content) = match image {
                Embedded::Jpeg(w, h) => (*w, *h, jpeg(*w, *h)),
                Embedded::Corrupt => (64, 64, b"definitely not a jpeg".to_vec()),
            };
            let stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => w as i64,
                    "Height" => h as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8i64,
                    "Filter" => "DCTDecode",
                },
                content,
            );
            let id = doc.add_object(stream);
            xobjects.set(format!("Im{i}"), Object::Reference(id));
        }
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => xobjects },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

// ── Inference ────────────────────────────────────────────────────────────────

/// Answers every request with a fixed reply and records what it was sent.
pub struct RecordingClient {
    reply: Result<String, InferenceError>,
    pub requests: Mutex<Vec<InferenceRequest>>,
}

impl RecordingClient {
    pub fn answering(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: InferenceError) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(err),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> InferenceRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request recorded")
    }
}

#[async_trait]
impl InferenceClient for RecordingClient {
    fn name(&self) -> &str {
        "recording"
    }

    async fn converse(
        &self,
        request: &InferenceRequest,
    ) -> Result<InferenceResponse, InferenceError> {
        self.requests.lock().unwrap().push(request.clone());
        self.reply.clone().map(|text| InferenceResponse {
            text,
            input_tokens: 100,
            output_tokens: 20,
        })
    }
}

// ── Harness ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub extractor: Extractor,
    pub client: Arc<RecordingClient>,
    pub blobs: MemoryBlobStore,
    pub records: MemoryRecordStore,
}

impl Harness {
    pub async fn new(
        client: Arc<RecordingClient>,
        stored_prompt: &str,
        config: ExtractionConfig,
    ) -> Self {
        let blobs = MemoryBlobStore::new();
        let records = MemoryRecordStore::new();
        let extractor = Extractor::new(
            config,
            client.clone(),
            Collaborators {
                blobs: Arc::new(blobs.clone()),
                params: Arc::new(MemoryParameterStore::new(stored_prompt)),
                records: Arc::new(records.clone()),
            },
        );
        Self {
            extractor,
            client,
            blobs,
            records,
        }
    }

    /// Harness with a fixed reply, no stored prompt and a 2048-token budget.
    pub async fn answering(reply: &str) -> Self {
        let config = ExtractionConfig::builder().max_tokens(2048).build().unwrap();
        Self::new(RecordingClient::answering(reply), "", config).await
    }

    pub async fn seed(&self, key: &str, bytes: Vec<u8>, media_type: &str) {
        self.blobs.insert(key, bytes, media_type).await;
    }
}
