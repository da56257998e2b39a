//! Input image loading and identity.
//!
//! Images are identified by the SHA-256 of their content so annotations
//! keyed on `image_id` stay stable across sessions, renames, and moves.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while loading input images.
#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{path} is not a supported image type (need JPEG or PNG)")]
    UnsupportedType { path: PathBuf },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// An input image held in memory for upload and local generation.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    /// Hex SHA-256 of the file content.
    pub id: String,
    /// Where the file was loaded from.
    pub path: PathBuf,
    /// Raw file bytes, as sent to the remote service.
    pub bytes: Vec<u8>,
    /// Detected MIME type.
    pub mime_type: String,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

impl ImagePayload {
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

/// Compute the content hash used as an image id.
pub fn compute_image_id(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Load one image from disk, sniffing its type from content rather than
/// trusting the extension.
pub fn load_image(path: &Path) -> Result<ImagePayload, ImageLoadError> {
    let bytes = std::fs::read(path).map_err(|source| ImageLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let mime_type = match infer::get(&bytes) {
        Some(kind) if matches!(kind.mime_type(), "image/jpeg" | "image/png") => {
            kind.mime_type().to_string()
        }
        _ => {
            return Err(ImageLoadError::UnsupportedType {
                path: path.to_path_buf(),
            })
        }
    };

    let (width, height) = image::ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| ImageLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?
        .into_dimensions()
        .map_err(|source| ImageLoadError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(ImagePayload {
        id: compute_image_id(&bytes),
        path: path.to_path_buf(),
        bytes,
        mime_type,
        width,
        height,
    })
}

/// Load an ordered set of images, preserving argument order.
pub fn load_images(paths: &[PathBuf]) -> Result<Vec<ImagePayload>, ImageLoadError> {
    let mut payloads = Vec::with_capacity(paths.len());
    for path in paths {
        payloads.push(load_image(path)?);
    }
    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbaImage};
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_load_image_dimensions_and_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tall.png");
        write_png(&path, 2, 5);

        let payload = load_image(&path).unwrap();
        assert_eq!(payload.width, 2);
        assert_eq!(payload.height, 5);
        assert!(payload.is_portrait());
        assert_eq!(payload.mime_type, "image/png");
        assert_eq!(payload.id.len(), 64);
    }

    #[test]
    fn test_image_id_stable_across_paths() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_png(&a, 3, 2);
        std::fs::copy(&a, &b).unwrap();

        let pa = load_image(&a).unwrap();
        let pb = load_image(&b).unwrap();
        assert_eq!(pa.id, pb.id);
        assert!(!pa.is_portrait());
    }

    #[test]
    fn test_rejects_non_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"plain text, not pixels").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, ImageLoadError::UnsupportedType { .. }));
    }

    #[test]
    fn test_load_images_preserves_order() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("one.png");
        let second = dir.path().join("two.png");
        write_png(&first, 4, 1);
        write_png(&second, 1, 4);

        let payloads = load_images(&[first.clone(), second.clone()]).unwrap();
        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0].path, first);
        assert_eq!(payloads[1].path, second);
    }
}
