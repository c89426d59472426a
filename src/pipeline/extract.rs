//! Embedded image extraction: PDF bytes → classified JPEG images.
//!
//! Walks every page in page order and, for each page, its `/XObject`
//! resource table in table order. Each image XObject is decoded, re-encoded
//! to JPEG and classified by size. Failures never escape this module:
//!
//! - an unparsable PDF yields an empty list (the router then falls back to
//!   whole-document inference, exactly as for a PDF without images);
//! - an image that cannot be decoded is logged and skipped, and extraction
//!   continues with the next object.
//!
//! Supported encodings are `DCTDecode` (optionally behind `FlateDecode`), and
//! raw samples either unfiltered or behind `FlateDecode` with or without a
//! PNG or TIFF predictor. Samples may be 1, 2, 4, 8 or 16 bits in gray, RGB,
//! CMYK, ICC-based or indexed colour spaces, and stencil masks are read as
//! bilevel gray. Everything else (JPX, JBIG2, CCITT, Lab, DeviceN) is skipped.
//!
//! Sample data must match the image geometry exactly, and Flate output is
//! capped at the size that geometry implies, so a mismatched or oversized
//! stream is a decode error rather than a distorted raster.

use crate::error::ExtractError;
use crate::pipeline::classify::{classify_with, ClassifierThresholds, ImageClassification};
use crate::pipeline::encode;
use flate2::read::ZlibDecoder;
use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::Serialize;
use std::borrow::Cow;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Page-tree nodes searched for inherited `/Resources`.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Upper bound on decoded sample bytes for one image, and on Flate output
/// whose final size the image dictionary does not determine.
const MAX_SAMPLE_BYTES: usize = 256 * 1024 * 1024;

/// Flate output limit for a compressed `/Indexed` lookup table.
const MAX_PALETTE_BYTES: usize = 4 * 256;

/// One image found inside a PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedImage {
    /// Canonical JPEG bytes.
    #[serde(skip)]
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// 1-based page number.
    pub page: u32,
    /// 0-based index in the page's XObject resource table.
    pub position: usize,
    /// Resource name, e.g. `Im0`.
    pub name: String,
    pub classification: ImageClassification,
}

impl ExtractedImage {
    pub fn is_scanned_document(&self) -> bool {
        self.classification == ImageClassification::ScannedDocument
    }
}

/// Extract and classify every decodable embedded image.
///
/// Runs inside `spawn_blocking`: decoding and re-encoding large scans is
/// CPU-bound.
pub async fn extract_images(
    pdf: Arc<[u8]>,
    thresholds: ClassifierThresholds,
) -> Vec<ExtractedImage> {
    tokio::task::spawn_blocking(move || extract_images_blocking(&pdf, &thresholds))
        .await
        .unwrap_or_else(|e| {
            warn!("Image extraction task failed: {}; treating as zero images", e);
            Vec::new()
        })
}

/// Blocking implementation of [`extract_images`].
pub fn extract_images_blocking(
    pdf: &[u8],
    thresholds: &ClassifierThresholds,
) -> Vec<ExtractedImage> {
    let doc = match Document::load_mem(pdf) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("{}; treating as zero images", ExtractError::PdfParse(e.to_string()));
            return Vec::new();
        }
    };

    let mut images = Vec::new();
    let mut skipped = 0usize;

    for (page, page_id) in doc.get_pages() {
        let Some(xobjects) = page_xobjects(&doc, page_id) else {
            debug!("Page {}: no XObject resources", page);
            continue;
        };

        for (position, (name, value)) in xobjects.iter().enumerate() {
            let name = String::from_utf8_lossy(name).into_owned();
            match extract_one(&doc, value, thresholds) {
                Ok(Some((data, width, height, classification))) => {
                    debug!(
                        "Page {} object {} ('{}'): {}x{} → {}",
                        page, position, name, width, height, classification
                    );
                    images.push(ExtractedImage {
                        data: data.into(),
                        width,
                        height,
                        page,
                        position,
                        name,
                        classification,
                    });
                }
                Ok(None) => {}
                Err(detail) => {
                    skipped += 1;
                    warn!(
                        "{}",
                        ExtractError::ImageDecode {
                            page,
                            position,
                            name,
                            detail,
                        }
                    );
                }
            }
        }
    }

    info!(
        "Extracted {} images from PDF ({} skipped)",
        images.len(),
        skipped
    );
    images
}

type Decoded = (Vec<u8>, u32, u32, ImageClassification);

/// Decode one XObject table entry. `Ok(None)` for non-image XObjects.
fn extract_one(
    doc: &Document,
    value: &Object,
    thresholds: &ClassifierThresholds,
) -> Result<Option<Decoded>, String> {
    let stream = resolve(doc, value)
        .ok_or("dangling object reference")?
        .as_stream()
        .map_err(|e| format!("not a stream: {e}"))?;

    if !is_image(&stream.dict) {
        return Ok(None);
    }

    let img = decode_image(doc, stream)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        return Err("empty image".into());
    }

    let data = encode::encode_jpeg(&img).map_err(|e| format!("JPEG re-encode failed: {e}"))?;
    let classification = classify_with(thresholds, width, height);
    Ok(Some((data, width, height, classification)))
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|v| resolve(doc, v))
        .and_then(|v| v.as_dict().ok())
}

/// The page's XObject table, honouring `/Resources` inherited from the page tree.
fn page_xobjects(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Some(resources) = resolve_dict(doc, node, b"Resources") {
            return resolve_dict(doc, resources, b"XObject");
        }
        node = resolve_dict(doc, node, b"Parent")?;
    }
    None
}

fn is_image(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Image")
}

fn name_list(obj: Option<&Object>) -> Vec<String> {
    match obj {
        Some(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| match o {
                Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, String> {
    match dict.get(key) {
        Ok(Object::Integer(v)) if *v > 0 => u32::try_from(*v).map_err(|e| e.to_string()),
        Ok(other) => Err(format!(
            "invalid /{}: {:?}",
            String::from_utf8_lossy(key),
            other
        )),
        Err(_) => Err(format!("missing /{}", String::from_utf8_lossy(key))),
    }
}

fn decode_image(doc: &Document, stream: &Stream) -> Result<DynamicImage, String> {
    let filters = name_list(stream.dict.get(b"Filter").ok());
    let params = decode_params(doc, &stream.dict, filters.len());
    let ends_in_dct = matches!(filters.last().map(String::as_str), Some("DCTDecode" | "DCT"));
    let layout = if ends_in_dct {
        None
    } else {
        Some(SampleLayout::read(doc, &stream.dict)?)
    };
    let mut data: Cow<'_, [u8]> = Cow::Borrowed(stream.content.as_slice());

    for (i, filter) in filters.iter().enumerate() {
        let last = i + 1 == filters.len();
        match filter.as_str() {
            "FlateDecode" | "Fl" => {
                let predictor = Predictor::from_params(params[i])?;
                let limit = match &layout {
                    Some(layout) if last => predictor
                        .encoded_limit(layout.max_len()?)
                        .ok_or("image dimensions overflow")?,
                    _ => MAX_SAMPLE_BYTES,
                };
                data = Cow::Owned(predictor.undo(inflate(&data, limit)?)?);
            }
            "DCTDecode" | "DCT" if last => {
                return image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
                    .map_err(|e| format!("JPEG decode failed: {e}"));
            }
            other => return Err(format!("unsupported filter {other}")),
        }
    }

    layout
        .ok_or("no image data")?
        .into_image(data.into_owned())
}

/// `/DecodeParms` per filter: an array is matched by position, a lone
/// dictionary applies to every filter.
fn decode_params<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    filters: usize,
) -> Vec<Option<&'a Dictionary>> {
    let raw = dict
        .get(b"DecodeParms")
        .or_else(|_| dict.get(b"DP"))
        .ok()
        .and_then(|o| resolve(doc, o));
    match raw {
        Some(Object::Array(items)) => (0..filters)
            .map(|i| {
                items
                    .get(i)
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_dict().ok())
            })
            .collect(),
        Some(Object::Dictionary(d)) => vec![Some(d); filters],
        _ => vec![None; filters],
    }
}

/// Inflate at most `limit` bytes; longer output is an error.
fn inflate(data: &[u8], limit: usize) -> Result<Vec<u8>, String> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| format!("Flate decompression failed: {e}"))?;
    if out.len() > limit {
        return Err(format!("Flate data inflates beyond {limit} bytes"));
    }
    Ok(out)
}

// ── Predictors ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PredictorRow {
    colors: usize,
    bits: usize,
    columns: usize,
}

impl PredictorRow {
    fn row_bytes(&self) -> usize {
        (self.colors * self.bits * self.columns).div_ceil(8)
    }

    fn pixel_bytes(&self) -> usize {
        (self.colors * self.bits).div_ceil(8).max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predictor {
    None,
    Tiff(PredictorRow),
    Png(PredictorRow),
}

impl Predictor {
    fn from_params(params: Option<&Dictionary>) -> Result<Self, String> {
        let Some(p) = params else {
            return Ok(Predictor::None);
        };
        let int = |key: &[u8], default: i64| match p.get(key) {
            Ok(Object::Integer(v)) => *v,
            _ => default,
        };

        let row = PredictorRow {
            colors: match int(b"Colors", 1) {
                c @ 1..=32 => c as usize,
                other => return Err(format!("invalid predictor /Colors {other}")),
            },
            bits: match int(b"BitsPerComponent", 8) {
                b @ (1 | 2 | 4 | 8 | 16) => b as usize,
                other => return Err(format!("invalid predictor /BitsPerComponent {other}")),
            },
            columns: match int(b"Columns", 1) {
                c @ 1..=0x100_0000 => c as usize,
                other => return Err(format!("invalid predictor /Columns {other}")),
            },
        };
        match int(b"Predictor", 1) {
            1 => Ok(Predictor::None),
            2 => Ok(Predictor::Tiff(row)),
            10..=15 => Ok(Predictor::Png(row)),
            other => Err(format!("unsupported predictor {other}")),
        }
    }

    /// Encoded length for `decoded` bytes of samples: PNG adds a tag byte
    /// per row.
    fn encoded_limit(&self, decoded: usize) -> Option<usize> {
        match self {
            Predictor::Png(row) => {
                let width = row.row_bytes();
                decoded.div_ceil(width).checked_mul(width + 1)
            }
            Predictor::None | Predictor::Tiff(_) => Some(decoded),
        }
    }

    fn undo(&self, data: Vec<u8>) -> Result<Vec<u8>, String> {
        match self {
            Predictor::None => Ok(data),
            Predictor::Tiff(row) => undo_tiff(data, row),
            Predictor::Png(row) => undo_png(&data, row),
        }
    }
}

fn undo_tiff(mut data: Vec<u8>, row: &PredictorRow) -> Result<Vec<u8>, String> {
    if row.bits != 8 {
        return Err(format!("TIFF predictor with {}-bit samples", row.bits));
    }
    for line in data.chunks_mut(row.row_bytes()) {
        for i in row.colors..line.len() {
            line[i] = line[i].wrapping_add(line[i - row.colors]);
        }
    }
    Ok(data)
}

fn undo_png(data: &[u8], row: &PredictorRow) -> Result<Vec<u8>, String> {
    let width = row.row_bytes();
    let bpp = row.pixel_bytes();
    if data.len() % (width + 1) != 0 {
        return Err(format!(
            "predicted data is {} bytes, not a whole number of {}-byte rows",
            data.len(),
            width + 1
        ));
    }

    let mut out = Vec::with_capacity(data.len() / (width + 1) * width);
    let mut prev = vec![0u8; width];
    for line in data.chunks_exact(width + 1) {
        let tag = line[0];
        let mut cur = line[1..].to_vec();
        for i in 0..width {
            let a = if i >= bpp { cur[i - bpp] } else { 0 };
            let b = prev[i];
            let c = if i >= bpp { prev[i - bpp] } else { 0 };
            let delta = match tag {
                0 => 0,
                1 => a,
                2 => b,
                3 => ((u16::from(a) + u16::from(b)) / 2) as u8,
                4 => paeth(a, b, c),
                other => return Err(format!("invalid PNG row filter {other}")),
            };
            cur[i] = cur[i].wrapping_add(delta);
        }
        out.extend_from_slice(&cur);
        prev = cur;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

// ── Samples ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// One sample per pixel indexing an RGB lookup table.
    Indexed(Vec<[u8; 3]>),
    /// No `/ColorSpace`; components are inferred from the data length.
    Unknown,
}

impl ColorSpace {
    fn components(&self) -> Option<usize> {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed(_) => Some(1),
            ColorSpace::Rgb => Some(3),
            ColorSpace::Cmyk => Some(4),
            ColorSpace::Unknown => None,
        }
    }
}

fn color_space(doc: &Document, dict: &Dictionary) -> Result<ColorSpace, String> {
    match dict
        .get(b"ColorSpace")
        .or_else(|_| dict.get(b"CS"))
        .ok()
        .and_then(|o| resolve(doc, o))
    {
        None => Ok(ColorSpace::Unknown),
        Some(space) => parse_space(doc, space),
    }
}

fn parse_space(doc: &Document, space: &Object) -> Result<ColorSpace, String> {
    match space {
        Object::Name(name) => named_space(name),
        Object::Array(items) => {
            let family = match items.first().and_then(|o| resolve(doc, o)) {
                Some(Object::Name(n)) => n.as_slice(),
                _ => return Err("colour space array without a family name".into()),
            };
            match family {
                b"Indexed" | b"I" => indexed_space(doc, items),
                b"ICCBased" => {
                    let profile = items
                        .get(1)
                        .and_then(|o| resolve(doc, o))
                        .and_then(|o| o.as_stream().ok())
                        .ok_or("ICCBased colour space without a profile stream")?;
                    match profile.dict.get(b"N") {
                        Ok(Object::Integer(1)) => Ok(ColorSpace::Gray),
                        Ok(Object::Integer(3)) => Ok(ColorSpace::Rgb),
                        Ok(Object::Integer(4)) => Ok(ColorSpace::Cmyk),
                        other => Err(format!("unsupported ICC component count {other:?}")),
                    }
                }
                other => named_space(other),
            }
        }
        other => Err(format!("invalid colour space {other:?}")),
    }
}

fn named_space(name: &[u8]) -> Result<ColorSpace, String> {
    match name {
        b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorSpace::Gray),
        b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorSpace::Rgb),
        b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
        other => Err(format!(
            "unsupported colour space {}",
            String::from_utf8_lossy(other)
        )),
    }
}

/// `[/Indexed base hival lookup]` → RGB palette of `hival + 1` entries.
fn indexed_space(doc: &Document, items: &[Object]) -> Result<ColorSpace, String> {
    let [_, base, hival, lookup] = items else {
        return Err("malformed /Indexed colour space".into());
    };
    let base = resolve(doc, base).ok_or("dangling /Indexed base")?;
    let components = match parse_space(doc, base)? {
        ColorSpace::Gray => 1,
        ColorSpace::Rgb => 3,
        ColorSpace::Cmyk => 4,
        other => return Err(format!("unsupported /Indexed base {other:?}")),
    };
    let entries = match resolve(doc, hival) {
        Some(Object::Integer(v @ 0..=255)) => *v as usize + 1,
        other => return Err(format!("invalid /Indexed hival {other:?}")),
    };

    let table: Cow<'_, [u8]> = match resolve(doc, lookup) {
        Some(Object::String(bytes, _)) => Cow::Borrowed(bytes.as_slice()),
        Some(Object::Stream(s)) => match name_list(s.dict.get(b"Filter").ok()).as_slice() {
            [] => Cow::Borrowed(s.content.as_slice()),
            [f] if f == "FlateDecode" || f == "Fl" => {
                Cow::Owned(inflate(&s.content, MAX_PALETTE_BYTES)?)
            }
            other => return Err(format!("unsupported palette filter {other:?}")),
        },
        other => return Err(format!("invalid /Indexed lookup {other:?}")),
    };

    let needed = entries * components;
    if table.len() < needed {
        return Err(format!(
            "palette has {} bytes, {} entries need {}",
            table.len(),
            entries,
            needed
        ));
    }
    let palette = table[..needed]
        .chunks_exact(components)
        .map(|entry| match entry {
            [g] => [*g; 3],
            [r, g, b] => [*r, *g, *b],
            cmyk => {
                let rgb = cmyk_to_rgb(cmyk);
                [rgb[0], rgb[1], rgb[2]]
            }
        })
        .collect();
    Ok(ColorSpace::Indexed(palette))
}

/// Geometry and sample format of a raw image, read from its dictionary.
#[derive(Debug)]
struct SampleLayout {
    width: u32,
    height: u32,
    bits: usize,
    space: ColorSpace,
    /// `/Decode [1 0]`: sample 0 is white.
    inverted: bool,
}

impl SampleLayout {
    fn read(doc: &Document, dict: &Dictionary) -> Result<Self, String> {
        let width = dimension(dict, b"Width")?;
        let height = dimension(dict, b"Height")?;
        let stencil = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));

        let bits = match dict.get(b"BitsPerComponent") {
            Ok(Object::Integer(b @ (1 | 2 | 4 | 8 | 16))) => *b as usize,
            Err(_) if stencil => 1,
            Err(_) => 8,
            Ok(other) => return Err(format!("unsupported BitsPerComponent {other:?}")),
        };
        let space = if stencil {
            ColorSpace::Gray
        } else {
            color_space(doc, dict)?
        };
        if bits == 16 && matches!(space, ColorSpace::Indexed(_)) {
            return Err("16-bit indexed samples".into());
        }

        Ok(Self {
            width,
            height,
            bits,
            space,
            inverted: decode_inverted(dict),
        })
    }

    fn row_bytes(&self, components: usize) -> Option<usize> {
        (self.width as usize)
            .checked_mul(components)?
            .checked_mul(self.bits)
            .map(|b| b.div_ceil(8))
    }

    fn sample_len(&self, components: usize) -> Option<usize> {
        self.row_bytes(components)?
            .checked_mul(self.height as usize)
    }

    /// Largest sample length this dictionary can describe.
    fn max_len(&self) -> Result<usize, String> {
        let components = self.space.components().unwrap_or(4);
        match self.sample_len(components) {
            Some(len) if len <= MAX_SAMPLE_BYTES => Ok(len),
            _ => Err(format!(
                "{}x{} image exceeds {} bytes of samples",
                self.width, self.height, MAX_SAMPLE_BYTES
            )),
        }
    }

    fn into_image(self, samples: Vec<u8>) -> Result<DynamicImage, String> {
        let components = match self.space.components() {
            Some(n) => n,
            None if self.bits == 8 => [3, 1, 4]
                .into_iter()
                .find(|n| self.sample_len(*n) == Some(samples.len()))
                .ok_or_else(|| {
                    format!("cannot infer colour components from {} bytes", samples.len())
                })?,
            None => return Err("missing /ColorSpace".into()),
        };
        let row_bytes = self
            .row_bytes(components)
            .ok_or("image dimensions overflow")?;
        let expected = self
            .sample_len(components)
            .ok_or("image dimensions overflow")?;
        if samples.len() != expected {
            return Err(format!(
                "sample data is {} bytes, expected {} for {}x{}x{} at {} bits",
                samples.len(),
                expected,
                self.width,
                self.height,
                components,
                self.bits
            ));
        }

        let values = unpack(&samples, row_bytes, self.width as usize * components, self.bits);
        let (width, height) = (self.width, self.height);
        let img = match self.space {
            ColorSpace::Indexed(palette) => {
                let last = palette.len() - 1;
                let rgb = values
                    .iter()
                    .flat_map(|&i| palette[usize::from(i).min(last)])
                    .collect();
                RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
            }
            _ => {
                let mut values = scale(values, self.bits);
                if self.inverted {
                    values.iter_mut().for_each(|v| *v = 255 - *v);
                }
                match components {
                    1 => GrayImage::from_raw(width, height, values).map(DynamicImage::ImageLuma8),
                    3 => RgbImage::from_raw(width, height, values).map(DynamicImage::ImageRgb8),
                    _ => RgbImage::from_raw(width, height, cmyk_to_rgb(&values))
                        .map(DynamicImage::ImageRgb8),
                }
            }
        };
        img.ok_or_else(|| "sample buffer does not match dimensions".to_string())
    }
}

fn decode_inverted(dict: &Dictionary) -> bool {
    let number = |o: &Object| match o {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    };
    match dict.get(b"Decode") {
        Ok(Object::Array(range)) => matches!(
            (range.first().and_then(number), range.get(1).and_then(number)),
            (Some(lo), Some(hi)) if lo > hi
        ),
        _ => false,
    }
}

/// One byte per sample. Sub-byte samples are unpacked MSB first from rows
/// padded to a byte boundary; 16-bit samples keep their high byte.
fn unpack(samples: &[u8], row_bytes: usize, per_row: usize, bits: usize) -> Vec<u8> {
    match bits {
        8 => samples.to_vec(),
        16 => samples.chunks_exact(2).map(|s| s[0]).collect(),
        _ => {
            let mask = (1u8 << bits) - 1;
            let mut out = Vec::with_capacity(per_row * (samples.len() / row_bytes));
            for row in samples.chunks_exact(row_bytes) {
                for i in 0..per_row {
                    let bit = i * bits;
                    let shift = 8 - bits - bit % 8;
                    out.push((row[bit / 8] >> shift) & mask);
                }
            }
            out
        }
    }
}

/// Stretch sub-byte samples to the full 0..=255 range.
fn scale(mut values: Vec<u8>, bits: usize) -> Vec<u8> {
    if bits < 8 {
        let max = (1u16 << bits) - 1;
        for v in &mut values {
            *v = (u16::from(*v) * 255 / max) as u8;
        }
    }
    values
}

fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((cmyk.len() / 4) * 3);
    for chunk in cmyk.chunks_exact(4) {
        let k = 255 - u16::from(chunk[3]);
        for &c in &chunk[..3] {
            rgb.push(((255 - u16::from(c)) * k / 255) as u8);
        }
    }
    rgb
}
