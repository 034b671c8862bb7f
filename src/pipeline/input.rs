//! Input resolution: turn a user-supplied path or URL into an [`UploadedImage`].
//!
//! Uploads are read fully into memory; result and credit sheets are a few
//! hundred kilobytes at most. The format is sniffed from the magic bytes,
//! never from the file extension, so a PNG saved as `.jpg` is still accepted
//! and a PDF renamed to `.png` is rejected here rather than by the provider.

use crate::error::SgpaError;
use crate::output::UploadSlot;
use image::{GenericImageView, ImageFormat};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Raster formats accepted for upload.
pub const ACCEPTED_FORMATS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg];

/// One uploaded image: raw bytes plus the format detected from them.
#[derive(Clone)]
pub struct UploadedImage {
    slot: UploadSlot,
    origin: String,
    format: ImageFormat,
    bytes: Vec<u8>,
}

impl fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedImage")
            .field("slot", &self.slot)
            .field("origin", &self.origin)
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// What the presentation layer shows in place of the image itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImagePreview {
    pub slot: UploadSlot,
    pub origin: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub byte_len: usize,
}

impl fmt::Display for ImagePreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} · {} · {}×{} px · {:.1} KiB",
            self.origin,
            self.mime_type,
            self.width,
            self.height,
            self.byte_len as f64 / 1024.0
        )
    }
}

impl UploadedImage {
    /// Validate in-memory bytes as an upload for `slot`.
    ///
    /// `origin` is only used in messages (file name, URL, "clipboard", …).
    pub fn from_bytes(
        slot: UploadSlot,
        origin: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self, SgpaError> {
        let origin = origin.into();
        if bytes.is_empty() {
            return Err(SgpaError::EmptyUpload { slot, origin });
        }

        let format = image::guess_format(&bytes).map_err(|_| SgpaError::UnsupportedFormat {
            slot,
            origin: origin.clone(),
            detected: "unknown".into(),
        })?;

        if !ACCEPTED_FORMATS.contains(&format) {
            return Err(SgpaError::UnsupportedFormat {
                slot,
                origin,
                detected: format!("{format:?}"),
            });
        }

        debug!("{slot}: {} bytes of {:?} from {}", bytes.len(), format, origin);
        Ok(Self {
            slot,
            origin,
            format,
            bytes,
        })
    }

    pub fn slot(&self) -> UploadSlot {
        self.slot
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type of the upload as received.
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Decode the upload. Fails for truncated or corrupt files.
    pub fn decode(&self) -> Result<image::DynamicImage, SgpaError> {
        image::load_from_memory_with_format(&self.bytes, self.format).map_err(|e| {
            SgpaError::UnreadableImage {
                slot: self.slot,
                origin: self.origin.clone(),
                detail: e.to_string(),
            }
        })
    }

    /// Decode just far enough to describe the upload for display.
    pub fn preview(&self) -> Result<ImagePreview, SgpaError> {
        let (width, height) = self.decode()?.dimensions();
        Ok(ImagePreview {
            slot: self.slot,
            origin: self.origin.clone(),
            mime_type: self.mime_type(),
            width,
            height,
            byte_len: self.bytes.len(),
        })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a path or URL into an upload for `slot`.
pub async fn resolve_input(
    slot: UploadSlot,
    input: &str,
    timeout_secs: u64,
) -> Result<UploadedImage, SgpaError> {
    let bytes = if is_url(input) {
        download_url(input, timeout_secs).await?
    } else {
        read_local(input).await?
    };
    UploadedImage::from_bytes(slot, display_name(input), bytes)
}

async fn read_local(path_str: &str) -> Result<Vec<u8>, SgpaError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            debug!("Read local image: {}", path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(SgpaError::PermissionDenied { path })
        }
        Err(_) => Err(SgpaError::FileNotFound { path }),
    }
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<Vec<u8>, SgpaError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| SgpaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            SgpaError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SgpaError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(SgpaError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| SgpaError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(bytes.to_vec())
}

/// Short name for messages: the file name or the last URL path segment.
fn display_name(input: &str) -> String {
    if is_url(input) {
        if let Ok(parsed) = reqwest::Url::parse(input) {
            if let Some(mut segments) = parsed.path_segments() {
                if let Some(last) = segments.next_back() {
                    if !last.is_empty() {
                        return last.to_string();
                    }
                }
            }
        }
        return input.to_string();
    }
    PathBuf::from(input)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string())
}
