use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Filename given to image payloads that were re-materialized from a URL or
/// data URL before upload.
pub const REFETCHED_IMAGE_NAME: &str = "processed_image.jpg";

/// A user-selected or re-materialized image, fully resident in memory and
/// ready to be attached to a multipart request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub name: String,
}

impl LocalImage {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            name: name.into(),
        }
    }

    /// Read an image from disk, sniffing the MIME type from its content.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read image file: {}", path.display()))?;
        if bytes.is_empty() {
            bail!("Image file is empty: {}", path.display());
        }
        let name = path
            .file_name()
            .map_or_else(|| REFETCHED_IMAGE_NAME.to_string(), |n| n.to_string_lossy().into_owned());
        let mime_type = detect_mime(&bytes, &name);
        Ok(Self {
            bytes,
            mime_type,
            name,
        })
    }

    /// Whether this image is HEIC/HEIF. Conversion happens server-side; the
    /// client only flags the format so the UI layer can message accordingly.
    #[must_use]
    pub fn is_heic(&self) -> bool {
        let name = self.name.to_ascii_lowercase();
        let mime = self.mime_type.to_ascii_lowercase();
        name.ends_with(".heic")
            || name.ends_with(".heif")
            || mime.contains("heic")
            || mime.contains("heif")
    }
}

/// Any image the pipeline can send onward.
///
/// `Remote` holds the raw URL string exactly as received from the service —
/// absolute URL, server-relative path, or `data:` URL. Resolution against the
/// service base URL happens when a step consumes the reference, never earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    Local(LocalImage),
    Remote(String),
}

impl ImageRef {
    /// Short human-readable description for logs and CLI output.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Local(image) => format!("{} ({} bytes)", image.name, image.bytes.len()),
            Self::Remote(url) if url.starts_with("data:") => "data URL".to_string(),
            Self::Remote(url) => url.clone(),
        }
    }

    /// The URL if this reference is remote.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Remote(url) => Some(url),
        }
    }
}

impl From<LocalImage> for ImageRef {
    fn from(image: LocalImage) -> Self {
        Self::Local(image)
    }
}

/// Sniff a MIME type from content, falling back to the file extension.
#[must_use]
pub fn detect_mime(bytes: &[u8], name: &str) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }

    let lower = name.to_ascii_lowercase();
    let ext = lower.rsplit('.').next().unwrap_or_default();
    match ext {
        "jpg" | "jpeg" => mime::IMAGE_JPEG.essence_str().to_string(),
        "png" => mime::IMAGE_PNG.essence_str().to_string(),
        "gif" => mime::IMAGE_GIF.essence_str().to_string(),
        "webp" => "image/webp".to_string(),
        "heic" => "image/heic".to_string(),
        "heif" => "image/heif".to_string(),
        _ => mime::APPLICATION_OCTET_STREAM.essence_str().to_string(),
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL into an in-memory image.
pub fn decode_data_url(url: &str) -> Result<LocalImage> {
    let rest = url
        .strip_prefix("data:")
        .context("Not a data URL")?;
    let (header, payload) = rest
        .split_once(',')
        .context("Malformed data URL: missing ',' separator")?;
    let Some(mime_type) = header.strip_suffix(";base64") else {
        bail!("Unsupported data URL encoding (expected base64)");
    };

    let bytes = BASE64
        .decode(payload.trim())
        .context("Failed to decode base64 image payload")?;
    let mime_type = if mime_type.is_empty() {
        mime::APPLICATION_OCTET_STREAM.essence_str().to_string()
    } else {
        mime_type.to_string()
    };

    Ok(LocalImage::new(bytes, mime_type, REFETCHED_IMAGE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smallest valid JPEG magic prefix; enough for content sniffing.
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn detect_mime_sniffs_jpeg_content() {
        assert_eq!(detect_mime(JPEG_MAGIC, "anything.bin"), "image/jpeg");
    }

    #[test]
    fn detect_mime_falls_back_to_extension() {
        assert_eq!(detect_mime(b"not an image", "room.png"), "image/png");
        assert_eq!(detect_mime(b"not an image", "room.HEIC"), "image/heic");
    }

    #[test]
    fn detect_mime_unknown_is_octet_stream() {
        assert_eq!(
            detect_mime(b"not an image", "mystery"),
            "application/octet-stream"
        );
    }

    #[test]
    fn heic_detection_by_name_and_mime() {
        let by_name = LocalImage::new(vec![1], "application/octet-stream", "kitchen.HEIC");
        assert!(by_name.is_heic());

        let by_mime = LocalImage::new(vec![1], "image/heif", "kitchen.img");
        assert!(by_mime.is_heic());

        let jpeg = LocalImage::new(vec![1], "image/jpeg", "kitchen.jpg");
        assert!(!jpeg.is_heic());
    }

    #[test]
    fn decode_data_url_roundtrips_payload() {
        let payload = BASE64.encode(b"pixels");
        let url = format!("data:image/png;base64,{payload}");

        let image = decode_data_url(&url).unwrap();

        assert_eq!(image.bytes, b"pixels");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.name, REFETCHED_IMAGE_NAME);
    }

    #[test]
    fn decode_data_url_rejects_non_base64_encoding() {
        let err = decode_data_url("data:image/png,rawbytes").unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn decode_data_url_rejects_missing_separator() {
        assert!(decode_data_url("data:image/png;base64").is_err());
    }

    #[test]
    fn image_ref_describe_hides_data_url_payload() {
        let data = ImageRef::Remote("data:image/png;base64,AAAA".into());
        assert_eq!(data.describe(), "data URL");

        let remote = ImageRef::Remote("/generated/a.png".into());
        assert_eq!(remote.describe(), "/generated/a.png");
    }
}
