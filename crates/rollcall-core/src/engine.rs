//! The opaque detection + embedding seam.
//!
//! Everything upstream (the reference-store builder, the upload handler)
//! talks to [`FaceEngine`] and never to the models directly, so tests can
//! substitute deterministic stubs.

use crate::detector::{DetectorError, FaceDetector};
use crate::embedder::{EmbedderError, FaceEmbedder};
use crate::types::DetectedFace;
use std::io::Write;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("temp spool failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("image could not be decoded: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

/// The narrow interface over the pretrained models: image bytes in, one
/// `(location, embedding)` pair per detected face out, in model order.
pub trait FaceEngine: Send {
    fn detect_and_embed(&mut self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>, EngineError>;
}

/// Production engine: UltraFace detection + 128-d embedding, both ONNX.
pub struct OnnxFaceEngine {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl OnnxFaceEngine {
    /// Load both models, failing fast if either file is missing.
    pub fn load(detector_path: &str, embedder_path: &str) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(detector_path)?;
        let embedder = FaceEmbedder::load(embedder_path)?;
        Ok(Self { detector, embedder })
    }
}

impl FaceEngine for OnnxFaceEngine {
    fn detect_and_embed(&mut self, image_bytes: &[u8]) -> Result<Vec<DetectedFace>, EngineError> {
        let decoded = decode_spooled(image_bytes)?;
        let rgb = decoded.to_rgb8();

        let locations = self.detector.detect(&rgb)?;
        tracing::debug!(faces = locations.len(), "detection complete");

        let mut faces = Vec::with_capacity(locations.len());
        for location in locations {
            let embedding = self.embedder.embed(&rgb, &location)?;
            faces.push(DetectedFace { location, embedding });
        }
        Ok(faces)
    }
}

/// Spool image bytes to a named temporary file and decode from there.
///
/// The spool file exists only for the duration of the decode; dropping the
/// `NamedTempFile` removes it on every exit path, error or not.
fn decode_spooled(image_bytes: &[u8]) -> Result<image::DynamicImage, EngineError> {
    let mut spool = tempfile::Builder::new().prefix("rollcall-").tempfile()?;
    spool.write_all(image_bytes)?;
    spool.flush()?;

    let decoded = image::ImageReader::open(spool.path())?
        .with_guessed_format()?
        .decode()?;
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let frame = RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        let mut buf = Vec::new();
        frame
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_spooled_roundtrip() {
        let decoded = decode_spooled(&png_bytes(8, 6)).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 6);
    }

    #[test]
    fn test_decode_spooled_rejects_garbage() {
        let err = decode_spooled(b"definitely not an image").unwrap_err();
        assert!(matches!(err, EngineError::ImageDecode(_)));
    }
}
