//! Face embedder via ONNX Runtime.
//!
//! Extracts 128-dimensional embeddings from face crops using a
//! MobileFaceNet-class model. Crops are taken straight from the detector's
//! box and resized — no landmark alignment happens here.

use crate::types::{Embedding, FaceLocation};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const EMBED_INPUT_SIZE: u32 = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 127.5;
/// Embedding dimension fixed by the model. Every embedding in the system,
/// reference or probe, has exactly this many values.
pub const EMBEDDING_DIM: usize = 128;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0} — download the embedder model and place in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face crop is empty")]
    EmptyCrop,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX-backed face embedder.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the embedder ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face embedder model"
        );

        Ok(Self { session })
    }

    /// Extract an embedding for one detected face in an RGB frame.
    pub fn embed(
        &mut self,
        frame: &RgbImage,
        face: &FaceLocation,
    ) -> Result<Embedding, EmbedderError> {
        if face.width() == 0 || face.height() == 0 {
            return Err(EmbedderError::EmptyCrop);
        }

        let crop =
            image::imageops::crop_imm(frame, face.left, face.top, face.width(), face.height())
                .to_image();
        let resized = image::imageops::resize(
            &crop,
            EMBED_INPUT_SIZE,
            EMBED_INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );

        let input = preprocess(&resized);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw_data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        let raw: Vec<f32> = raw_data.to_vec();

        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(l2_normalize(raw)))
    }
}

/// Preprocess a 112×112 RGB crop into a NCHW float tensor with symmetric
/// normalization.
fn preprocess(crop: &RgbImage) -> Array4<f32> {
    let size = EMBED_INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in crop.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] =
                (pixel.0[channel] as f32 - EMBED_MEAN) / EMBED_STD;
        }
    }
    tensor
}

fn l2_normalize(raw: Vec<f32>) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw
    }
}
