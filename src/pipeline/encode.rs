//! Image encoding: `DynamicImage` → canonical JPEG bytes, and bytes → base64.
//!
//! Every image pulled out of a PDF is re-encoded to JPEG regardless of how it
//! was stored (DCT, Flate, raw samples), so the request builder only ever
//! emits one raster format for extracted images. JPEG carries no alpha
//! channel, so the image is flattened to 8-bit RGB first.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Re-encode a decoded image as JPEG.
pub fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)?;

    debug!(
        "Encoded {}x{} image → {} bytes JPEG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Standard base64 for JSON request bodies.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_rgba_image_as_jpeg() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 128])));
        let data = encode_jpeg(&img).expect("encode should succeed");
        // SOI marker
        assert_eq!(&data[..2], &[0xFF, 0xD8]);

        let back = image::load_from_memory_with_format(&data, image::ImageFormat::Jpeg)
            .expect("valid jpeg");
        assert_eq!((back.width(), back.height()), (10, 10));
    }

    #[test]
    fn base64_round_trips() {
        let encoded = to_base64(b"%PDF-1.7");
        assert_eq!(STANDARD.decode(encoded).unwrap(), b"%PDF-1.7");
    }
}
