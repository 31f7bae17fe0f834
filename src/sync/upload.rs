//! Collector upload request construction.
//!
//! One POST per record. The location travels as query parameters; the
//! image is either the single `file` part of a `multipart/form-data` body
//! or the raw request body.
//!
//! ```text
//! POST /upscale?lat=47.37&lng=8.54
//! Content-Type: multipart/form-data; boundary=<BOUNDARY>
//!
//! --<BOUNDARY>
//! Content-Disposition: form-data; name="file"; filename="capture_….jpg"
//! Content-Type: image/jpeg
//!
//! <jpeg bytes>
//! --<BOUNDARY>--
//! ```

use crate::config::{SystemConfig, UploadEncoding};
use crate::error::UploadError;
use crate::store::CaptureRecord;

pub const BOUNDARY: &str = "------------------------PetCamBoundary";
const FIELD_NAME: &str = "file";
const IMAGE_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub url: heapless::String<128>,
    pub encoding: UploadEncoding,
    pub timeout_ms: u32,
}

impl UploadSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            url: config.upload_url.clone(),
            encoding: config.upload_encoding,
            timeout_ms: config.upload_timeout_ms,
        }
    }
}

/// A fully composed POST, ready for the [`UploadPort`](crate::app::ports::UploadPort).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub url: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl UploadRequest {
    /// Compose the request for `record` with its `image` bytes.
    pub fn for_record(
        settings: &UploadSettings,
        record: &CaptureRecord,
        image: &[u8],
    ) -> Result<Self, UploadError> {
        let base = settings.url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(UploadError::BadUrl);
        }

        let mut url = String::from(base);
        if let Some(loc) = record.location {
            let sep = if base.contains('?') { '&' } else { '?' };
            url.push_str(&format!("{sep}lat={}&lng={}", loc.latitude, loc.longitude));
        }

        let (content_type, body) = match settings.encoding {
            UploadEncoding::Raw => (String::from(IMAGE_TYPE), image.to_vec()),
            UploadEncoding::Multipart => (
                format!("multipart/form-data; boundary={BOUNDARY}"),
                multipart_body(&format!("{}.jpg", record.key), image),
            ),
        };

        Ok(Self {
            url,
            content_type,
            body,
        })
    }
}

fn multipart_body(filename: &str, image: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{FIELD_NAME}\"; filename=\"{filename}\"\r\n\
         Content-Type: {IMAGE_TYPE}\r\n\r\n"
    );
    let tail = format!("\r\n--{BOUNDARY}--\r\n");

    let mut body = Vec::with_capacity(head.len() + image.len() + tail.len());
    body.extend_from_slice(head.as_bytes());
    body.extend_from_slice(image);
    body.extend_from_slice(tail.as_bytes());
    body
}

/// Any 2xx counts as accepted.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
