//! UltraFace face detector via ONNX Runtime.
//!
//! Runs the version-RFB-320 "Ultra-Light-Fast" face detection model: a
//! prior-free head with two outputs (per-anchor class scores and normalized
//! corner boxes), post-processed with greedy IoU suppression.

use crate::types::FaceLocation;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (no magic numbers) ---
const ULTRAFACE_INPUT_WIDTH: u32 = 320;
const ULTRAFACE_INPUT_HEIGHT: u32 = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_NMS_THRESHOLD: f32 = 0.3;
/// Values per anchor in the score tensor: [background, face].
const ULTRAFACE_CLASSES: usize = 2;
/// Values per anchor in the box tensor: [x1, y1, x2, y2], normalized.
const ULTRAFACE_BOX_COORDS: usize = 4;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download version-RFB-320.onnx and place in models/")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Candidate detection in normalized [0, 1] corner coordinates, pre-NMS.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
}

/// UltraFace-based face detector.
pub struct FaceDetector {
    session: Session,
    scores_idx: usize,
    boxes_idx: usize,
}

impl FaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded UltraFace model"
        );

        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "UltraFace model requires 2 outputs (scores, boxes), got {}",
                output_names.len()
            )));
        }

        // The reference export names its outputs "scores" and "boxes"; fall
        // back to positional ordering when the names are not recognized.
        let (scores_idx, boxes_idx) = discover_output_indices(&output_names);
        tracing::debug!(scores_idx, boxes_idx, "UltraFace output tensor mapping");

        Ok(Self { session, scores_idx, boxes_idx })
    }

    /// Detect faces in an RGB frame, returning pixel locations in the frame's
    /// own coordinates.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<Vec<FaceLocation>, DetectorError> {
        let input = preprocess(frame);

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[self.scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[self.boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode(scores, boxes, ULTRAFACE_CONFIDENCE_THRESHOLD);
        let kept = nms(candidates, ULTRAFACE_NMS_THRESHOLD);

        Ok(kept
            .iter()
            .map(|c| to_location(c, frame.width(), frame.height()))
            .collect())
    }
}

/// Map output tensor names to (scores, boxes) indices, positional fallback.
fn discover_output_indices(names: &[String]) -> (usize, usize) {
    let scores = names.iter().position(|n| n == "scores");
    let boxes = names.iter().position(|n| n == "boxes");
    match (scores, boxes) {
        (Some(s), Some(b)) => (s, b),
        _ => {
            tracing::info!(
                ?names,
                "UltraFace: output names not recognized, using positional mapping [0]=scores, [1]=boxes"
            );
            (0, 1)
        }
    }
}

/// Preprocess an RGB frame into the NCHW float tensor the model expects.
///
/// The frame is resized (not letterboxed — the model was trained on plain
/// resizes) and normalized to the UltraFace input distribution.
fn preprocess(frame: &RgbImage) -> Array4<f32> {
    let resized = image::imageops::resize(
        frame,
        ULTRAFACE_INPUT_WIDTH,
        ULTRAFACE_INPUT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );

    let (w, h) = (ULTRAFACE_INPUT_WIDTH as usize, ULTRAFACE_INPUT_HEIGHT as usize);
    let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, channel, y as usize, x as usize]] =
                (pixel.0[channel] as f32 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
        }
    }
    tensor
}

/// Decode raw score/box tensors into confidence-filtered candidates.
///
/// `scores` is `[background, face]` pairs per anchor; `boxes` is normalized
/// `[x1, y1, x2, y2]` per anchor. Degenerate boxes are dropped.
fn decode(scores: &[f32], boxes: &[f32], threshold: f32) -> Vec<Candidate> {
    let anchors = scores.len() / ULTRAFACE_CLASSES;
    let mut candidates = Vec::new();

    for idx in 0..anchors {
        let score = scores[idx * ULTRAFACE_CLASSES + 1];
        if score <= threshold {
            continue;
        }

        let off = idx * ULTRAFACE_BOX_COORDS;
        if off + 3 >= boxes.len() {
            break;
        }
        let x1 = boxes[off].clamp(0.0, 1.0);
        let y1 = boxes[off + 1].clamp(0.0, 1.0);
        let x2 = boxes[off + 2].clamp(0.0, 1.0);
        let y2 = boxes[off + 3].clamp(0.0, 1.0);

        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        candidates.push(Candidate { x1, y1, x2, y2, score });
    }

    candidates
}

/// Greedy Non-Maximum Suppression over normalized candidates.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-Union between two normalized candidates.
fn iou(a: &Candidate, b: &Candidate) -> f32 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    let union = area_a + area_b - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Scale a normalized candidate to pixel coordinates in the original frame.
fn to_location(candidate: &Candidate, width: u32, height: u32) -> FaceLocation {
    let scale_x = width as f32;
    let scale_y = height as f32;

    let left = (candidate.x1 * scale_x).floor().max(0.0) as u32;
    let top = (candidate.y1 * scale_y).floor().max(0.0) as u32;
    let right = ((candidate.x2 * scale_x).ceil() as u32).min(width);
    let bottom = ((candidate.y2 * scale_y).ceil() as u32).min(height);

    FaceLocation { top, right, bottom, left }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Candidate {
        Candidate { x1, y1, x2, y2, score }
    }

    #[test]
    fn test_decode_filters_by_confidence() {
        // Two anchors: one face at 0.95, one at 0.1.
        let scores = [0.05, 0.95, 0.9, 0.1];
        let boxes = [0.1, 0.1, 0.5, 0.5, 0.6, 0.6, 0.9, 0.9];

        let candidates = decode(&scores, &boxes, ULTRAFACE_CONFIDENCE_THRESHOLD);
        assert_eq!(candidates.len(), 1);
        assert!((candidates[0].score - 0.95).abs() < 1e-6);
        assert!((candidates[0].x1 - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_decode_drops_degenerate_boxes() {
        // Confident anchor whose box collapses after clamping.
        let scores = [0.01, 0.99];
        let boxes = [0.5, 0.5, 0.5, 0.4];

        assert!(decode(&scores, &boxes, 0.7).is_empty());
    }

    #[test]
    fn test_decode_clamps_out_of_range_coords() {
        let scores = [0.01, 0.99];
        let boxes = [-0.2, -0.1, 1.3, 1.1];

        let candidates = decode(&scores, &boxes, 0.7);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].x1, 0.0);
        assert_eq!(candidates[0].y2, 1.0);
    }

    #[test]
    fn test_iou_identical_is_one() {
        let a = candidate(0.1, 0.1, 0.5, 0.5, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = candidate(0.0, 0.0, 0.2, 0.2, 1.0);
        let b = candidate(0.5, 0.5, 0.7, 0.7, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlapping_keeps_distant() {
        let candidates = vec![
            candidate(0.10, 0.10, 0.50, 0.50, 0.9),
            candidate(0.12, 0.12, 0.52, 0.52, 0.8), // overlaps the first
            candidate(0.70, 0.70, 0.90, 0.90, 0.7),
        ];

        let kept = nms(candidates, ULTRAFACE_NMS_THRESHOLD);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.9).abs() < 1e-6);
        assert!((kept[1].score - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], ULTRAFACE_NMS_THRESHOLD).is_empty());
    }

    #[test]
    fn test_to_location_scales_and_clamps() {
        let c = candidate(0.25, 0.25, 0.75, 0.75, 1.0);
        let loc = to_location(&c, 640, 480);
        assert_eq!(loc.left, 160);
        assert_eq!(loc.top, 120);
        assert_eq!(loc.right, 480);
        assert_eq!(loc.bottom, 360);
    }

    #[test]
    fn test_to_location_never_exceeds_frame() {
        let c = candidate(0.9, 0.9, 1.0, 1.0, 1.0);
        let loc = to_location(&c, 333, 217);
        assert!(loc.right <= 333);
        assert!(loc.bottom <= 217);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = ["boxes", "scores"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (1, 0));
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = ["428", "429"].iter().map(|s| s.to_string()).collect();
        assert_eq!(discover_output_indices(&names), (0, 1));
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let frame = RgbImage::from_pixel(64, 64, image::Rgb([127, 127, 127]));
        let tensor = preprocess(&frame);
        assert_eq!(
            tensor.shape(),
            &[1, 3, ULTRAFACE_INPUT_HEIGHT as usize, ULTRAFACE_INPUT_WIDTH as usize]
        );
        // Pixel value 127 normalizes to exactly 0.
        assert!(tensor[[0, 0, 0, 0]].abs() < 1e-6);
    }
}
