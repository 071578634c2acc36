//! Uploaded image payloads.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Raw image bytes with their detected MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageInput {
    /// Wrap bytes, sniffing the MIME type from their magic number.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let mime_type = sniff_mime_type(&bytes).to_string();
        Self { bytes, mime_type }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base64 body for inline request payloads.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Detect PNG, JPEG, GIF and WEBP; anything else is `application/octet-stream`.
pub fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}
