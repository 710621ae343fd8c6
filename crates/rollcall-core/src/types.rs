use serde::{Deserialize, Serialize};

/// Pixel bounding box for a detected face, in `(top, right, bottom, left)`
/// order — the order the upload API reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl FaceLocation {
    /// Wire form: `[top, right, bottom, left]`.
    pub fn as_array(&self) -> [u32; 4] {
        [self.top, self.right, self.bottom, self.left]
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Face embedding vector (128-dimensional for the bundled embedder model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Compute Euclidean (L2) distance between two embeddings.
    ///
    /// Both vectors carry the dimension fixed by the embedder model; the
    /// engine validates that at extraction time, so no check happens here.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face found in a probe image: where it is and what it looks like.
/// Lives only for the duration of a single request.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub location: FaceLocation,
    pub embedding: Embedding,
}

/// A known identity in the reference gallery.
///
/// `embedding: None` means enrollment failed for this member (fetch error or
/// no detectable face in the source image); such entries are permanently
/// excluded from matching and never retried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub roll_no: String,
    pub url: String,
    pub embedding: Option<Embedding>,
}

/// A gallery entry within tolerance of a probe embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchHit {
    pub roll_no: String,
    pub matched_url: String,
    /// Euclidean distance, rounded to 4 decimal digits.
    pub distance: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Embedding::new(vec![0.3, -0.7, 1.2]);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_euclidean_distance_unit_axes() {
        let a = Embedding::new(vec![1.0, 0.0]);
        let b = Embedding::new(vec![0.0, 1.0]);
        assert!((a.euclidean_distance(&b) - std::f32::consts::SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_distance_symmetric() {
        let a = Embedding::new(vec![0.1, 0.2, 0.3, 0.4]);
        let b = Embedding::new(vec![-0.4, 0.0, 0.9, 2.5]);
        assert_eq!(a.euclidean_distance(&b), b.euclidean_distance(&a));
    }

    #[test]
    fn test_location_as_array_order() {
        let loc = FaceLocation { top: 10, right: 90, bottom: 80, left: 20 };
        assert_eq!(loc.as_array(), [10, 90, 80, 20]);
        assert_eq!(loc.width(), 70);
        assert_eq!(loc.height(), 70);
    }
}
