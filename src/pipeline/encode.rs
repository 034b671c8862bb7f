//! Image encoding: [`UploadedImage`] → base64 PNG payload.
//!
//! VLM APIs accept images as base64 data-URIs embedded in the JSON request
//! body. Every upload is re-encoded to PNG whatever it arrived as, so the
//! provider always sees one format and the payload is a deterministic
//! function of the decoded pixels. PNG is lossless: re-encoding a JPEG does
//! not add a second round of compression artefacts on top of small print.

use crate::error::SgpaError;
use crate::output::UploadSlot;
use crate::pipeline::input::UploadedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// MIME type of every payload.
pub const PAYLOAD_MIME: &str = "image/png";

/// A transport-safe text form of one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImagePayload {
    slot: UploadSlot,
    mime_type: &'static str,
    data: String,
}

impl EncodedImagePayload {
    pub fn slot(&self) -> UploadSlot {
        self.slot
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type
    }

    /// The base64 body, without any `data:` prefix.
    pub fn base64(&self) -> &str {
        &self.data
    }

    /// `data:image/png;base64,…`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    /// Provider-side image reference.
    ///
    /// `detail: "high"` makes GPT-4-class models tile the image instead of
    /// reading a single 512 px overview, which loses table cells.
    pub fn to_image_data(&self) -> ImageData {
        ImageData::new(self.data.clone(), self.mime_type).with_detail("high")
    }

    /// Decode the payload back to pixels.
    pub fn decode(&self) -> Result<DynamicImage, SgpaError> {
        let bytes = STANDARD
            .decode(&self.data)
            .map_err(|e| SgpaError::Internal(format!("payload is not base64: {e}")))?;
        image::load_from_memory_with_format(&bytes, ImageFormat::Png)
            .map_err(|e| SgpaError::Internal(format!("payload is not a PNG: {e}")))
    }
}

/// Encode an upload as a base64 PNG payload.
pub fn encode_image(upload: &UploadedImage) -> Result<EncodedImagePayload, SgpaError> {
    let img = upload.decode()?;
    let data = encode_pixels(&img).map_err(|e| SgpaError::UnreadableImage {
        slot: upload.slot(),
        origin: upload.origin().to_string(),
        detail: format!("PNG re-encoding failed: {e}"),
    })?;
    debug!(
        "{}: encoded {}×{} image → {} bytes base64",
        upload.slot(),
        img.width(),
        img.height(),
        data.len()
    );

    Ok(EncodedImagePayload {
        slot: upload.slot(),
        mime_type: PAYLOAD_MIME,
        data,
    })
}

fn encode_pixels(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(STANDARD.encode(&buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn upload(slot: UploadSlot, img: &DynamicImage, format: ImageFormat) -> UploadedImage {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        UploadedImage::from_bytes(slot, "test", buf).unwrap()
    }

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8, 255])
        }))
    }

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let payload = encode_image(&upload(UploadSlot::ResultSheet, &img, ImageFormat::Png))
            .expect("encode should succeed");
        assert_eq!(payload.mime_type(), "image/png");
        assert!(!payload.base64().is_empty());
        let decoded = STANDARD.decode(payload.base64()).expect("valid base64");
        assert!(!decoded.is_empty());
    }

    #[test]
    fn png_round_trip_is_pixel_identical() {
        let img = gradient(37, 19);
        let payload = encode_image(&upload(UploadSlot::ResultSheet, &img, ImageFormat::Png)).unwrap();
        let back = payload.decode().unwrap();
        assert_eq!(back.to_rgba8(), img.to_rgba8());
    }

    #[test]
    fn jpeg_round_trip_matches_decoded_upload() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(24, 16, |x, y| {
            Rgb([(x * 10) as u8, (y * 15) as u8, 128])
        }));
        let up = upload(UploadSlot::CreditsSheet, &img, ImageFormat::Jpeg);
        let payload = encode_image(&up).unwrap();
        assert_eq!(payload.mime_type(), "image/png");
        assert_eq!(payload.decode().unwrap().to_rgb8(), up.decode().unwrap().to_rgb8());
    }

    #[test]
    fn encoding_is_deterministic() {
        let up = upload(UploadSlot::ResultSheet, &gradient(12, 12), ImageFormat::Png);
        assert_eq!(encode_image(&up).unwrap(), encode_image(&up).unwrap());
    }

    #[test]
    fn distinct_images_give_distinct_payloads() {
        let a = encode_image(&upload(UploadSlot::ResultSheet, &gradient(8, 8), ImageFormat::Png)).unwrap();
        let b = encode_image(&upload(UploadSlot::CreditsSheet, &gradient(9, 8), ImageFormat::Png)).unwrap();
        assert_ne!(a.base64(), b.base64());
    }

    #[test]
    fn data_uri_and_image_data() {
        let up = upload(UploadSlot::ResultSheet, &gradient(2, 2), ImageFormat::Png);
        let payload = encode_image(&up).unwrap();
        assert!(payload.to_data_uri().starts_with("data:image/png;base64,"));
        let data = payload.to_image_data();
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(data.data, payload.base64());
    }
}
