//! Upload validation and re-encoding

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use sha2::{Digest, Sha256};

use super::UploadFile;
use crate::{CatalogError, Result};

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/webp", "image/gif"];
const MAX_EDGE: u32 = 1600;
const JPEG_QUALITY: u8 = 85;
const THUMBNAIL_EDGE: u32 = 200;

/// Re-encoded image ready to send to the asset host.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Hex SHA-256 of `bytes`.
    pub digest: String,
}

impl PreparedImage {
    pub const CONTENT_TYPE: &'static str = "image/jpeg";
    pub const FORMAT: &'static str = "jpg";
}

pub fn validate(file: &UploadFile) -> Result<()> {
    if file.bytes.is_empty() {
        return Err(CatalogError::bad_request(format!("File {} is empty", file.file_name)));
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CatalogError::bad_request(format!(
            "File {} is too large: {} bytes (max {MAX_UPLOAD_BYTES})",
            file.file_name,
            file.bytes.len()
        )));
    }
    let content_type = file.content_type.to_ascii_lowercase();
    if !ALLOWED_TYPES.contains(&content_type.as_str()) {
        return Err(CatalogError::bad_request(format!(
            "Unsupported file type {}. Allowed: jpeg, png, webp, gif",
            file.content_type
        )));
    }
    Ok(())
}

/// Validates, decodes, shrinks to at most 1600px on the long edge and
/// re-encodes as JPEG.
pub fn prepare_upload(file: &UploadFile) -> Result<PreparedImage> {
    validate(file)?;
    let mut img = image::load_from_memory(&file.bytes)
        .map_err(|e| CatalogError::bad_request(format!("Invalid image {}: {e}", file.file_name)))?;
    let (w, h) = img.dimensions();
    if w.max(h) > MAX_EDGE {
        img = img.resize(MAX_EDGE, MAX_EDGE, FilterType::Lanczos3);
    }
    let (width, height) = img.dimensions();
    let bytes = encode_jpeg(&img)?;
    let digest = hex::encode(Sha256::digest(&bytes));
    Ok(PreparedImage { bytes, width, height, digest })
}

/// Square 200px JPEG cropped from the centre of `file`.
pub fn thumbnail(file: &UploadFile) -> Result<UploadFile> {
    validate(file)?;
    let img = image::load_from_memory(&file.bytes)
        .map_err(|e| CatalogError::bad_request(format!("Invalid image {}: {e}", file.file_name)))?;
    let thumb = img.resize_to_fill(THUMBNAIL_EDGE, THUMBNAIL_EDGE, FilterType::Lanczos3);
    let stem = file.file_name.rsplit_once('.').map_or(file.file_name.as_str(), |(stem, _)| stem);
    Ok(UploadFile {
        file_name: format!("{stem}-thumb.{}", PreparedImage::FORMAT),
        content_type: PreparedImage::CONTENT_TYPE.into(),
        bytes: encode_jpeg(&thumb)?,
    })
}

fn encode_jpeg(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| CatalogError::internal(format!("Image compression failed: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png).unwrap();
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content_type: &str, bytes: Vec<u8>) -> UploadFile {
        UploadFile { file_name: "photo.png".into(), content_type: content_type.into(), bytes }
    }

    #[test]
    fn test_rejects_unsupported_type() {
        let err = prepare_upload(&file("application/pdf", vec![1, 2, 3])).unwrap_err();
        assert!(matches!(err, CatalogError::BadRequest(_)));
    }

    #[test]
    fn test_rejects_oversized_file() {
        let err = validate(&file("image/png", vec![0; MAX_UPLOAD_BYTES + 1])).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_rejects_undecodable_bytes() {
        assert!(prepare_upload(&file("image/png", vec![0; 64])).is_err());
    }

    #[test]
    fn test_shrinks_long_edge() {
        let prepared = prepare_upload(&file("image/png", sample_png(2000, 1000))).unwrap();
        assert_eq!((prepared.width, prepared.height), (1600, 800));
        assert_eq!(prepared.digest.len(), 64);
    }

    #[test]
    fn test_thumbnail_is_square_jpeg() {
        let thumb = thumbnail(&file("image/png", sample_png(640, 320))).unwrap();
        assert_eq!(thumb.file_name, "photo-thumb.jpg");
        assert_eq!(thumb.content_type, "image/jpeg");
        let decoded = image::load_from_memory(&thumb.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (200, 200));
    }

    #[test]
    fn test_small_image_keeps_size() {
        let prepared = prepare_upload(&file("image/png", sample_png(40, 30))).unwrap();
        assert_eq!((prepared.width, prepared.height), (40, 30));
    }
}
