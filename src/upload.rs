//! Vehicle photo upload with client-side validation.
//!
//! Validation runs before any request is built: a file that is not an image
//! is rejected locally and never reaches the backend.

use std::path::Path;

use image::ImageFormat;
use tracing::{info, warn};

use crate::api::{ClaimsBackend, UploadResponse};
use crate::error::{AutoGuardError, Result};
use crate::session::SessionContext;

/// Largest photo accepted for analysis.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const ACCEPTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Gif,
    ImageFormat::Bmp,
];

/// Check that `bytes` look like a supported image and return its MIME type.
///
/// The format is detected from the file's magic bytes, not its extension.
pub fn validate_image(bytes: &[u8], file_name: &str) -> Result<&'static str> {
    if bytes.is_empty() {
        return Err(AutoGuardError::Validation(format!("{} is empty", file_name)));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(AutoGuardError::Validation(format!(
            "{} is {} bytes, the limit is {} bytes",
            file_name,
            bytes.len(),
            MAX_UPLOAD_BYTES
        )));
    }

    match image::guess_format(bytes) {
        Ok(format) if ACCEPTED_FORMATS.contains(&format) => Ok(format.to_mime_type()),
        Ok(format) => Err(AutoGuardError::Validation(format!(
            "{} is a {:?} image; upload a JPEG, PNG, WebP, GIF or BMP photo",
            file_name, format
        ))),
        Err(_) => Err(AutoGuardError::Validation(format!(
            "{} is not an image file",
            file_name
        ))),
    }
}

/// Validate and upload a photo held in memory.
pub async fn upload_image(
    backend: &dyn ClaimsBackend,
    bytes: Vec<u8>,
    file_name: &str,
) -> Result<UploadResponse> {
    let mime_type = validate_image(&bytes, file_name).map_err(|e| {
        warn!("Rejected upload: {}", e);
        e
    })?;
    let response = backend.upload_image(bytes, file_name, mime_type).await?;
    info!(
        "Uploaded {}, analysis {} ({:?}, ~{}s)",
        file_name, response.analysis_id, response.status, response.estimated_time
    );
    Ok(response)
}

/// Read, validate and upload a photo from disk, remembering the new
/// analysis in the session.
pub async fn upload_file(
    backend: &dyn ClaimsBackend,
    path: &Path,
    session: &mut SessionContext,
) -> Result<UploadResponse> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let unreadable =
        |e: std::io::Error| AutoGuardError::Validation(format!("Failed to read {:?}: {}", path, e));

    let size = tokio::fs::metadata(path).await.map_err(unreadable)?.len();
    if size > MAX_UPLOAD_BYTES as u64 {
        warn!("Rejected upload: {} is {} bytes", file_name, size);
        return Err(AutoGuardError::Validation(format!(
            "{} is {} bytes, the limit is {} bytes",
            file_name, size, MAX_UPLOAD_BYTES
        )));
    }

    let bytes = tokio::fs::read(path).await.map_err(unreadable)?;

    let response = upload_image(backend, bytes, &file_name).await?;
    session.remember_analysis(&response.analysis_id);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];

    #[test]
    fn test_accepts_png_and_jpeg() {
        assert_eq!(validate_image(PNG_MAGIC, "car.png").unwrap(), "image/png");
        assert_eq!(validate_image(JPEG_MAGIC, "car.jpg").unwrap(), "image/jpeg");
    }

    #[test]
    fn test_extension_is_not_trusted() {
        let err = validate_image(b"just some text", "car.jpg").unwrap_err();
        assert!(matches!(err, AutoGuardError::Validation(_)), "got {:?}", err);

        // A real PNG with a misleading name still passes
        assert!(validate_image(PNG_MAGIC, "notes.txt").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        let err = validate_image(&[], "car.png").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_rejects_oversized() {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.resize(MAX_UPLOAD_BYTES + 1, 0);
        let err = validate_image(&bytes, "huge.png").unwrap_err();
        assert!(err.to_string().contains("limit"), "got {}", err);
    }

    #[test]
    fn test_rejects_pdf() {
        assert!(validate_image(b"%PDF-1.7\n%binary", "claim.pdf").is_err());
    }
}
