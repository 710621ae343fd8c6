//! The reference store: one entry per roster member, built once at startup.

use crate::config::Roster;
use rollcall_core::{matches_within, Embedding, FaceEngine, MatchHit, ReferenceEntry};
use thiserror::Error;

#[derive(Error, Debug)]
enum FetchError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(reqwest::StatusCode),
}

/// Ordered, read-only gallery of enrolled identities.
///
/// Built exactly once before the daemon accepts requests; afterwards it is
/// shared read-only, so concurrent matching needs no locking.
#[derive(Debug, Clone)]
pub struct ReferenceStore {
    entries: Vec<ReferenceEntry>,
}

impl ReferenceStore {
    /// Construct a store from prebuilt entries. This is the seam tests and
    /// embedders use instead of fetching anything.
    pub fn from_entries(entries: Vec<ReferenceEntry>) -> Self {
        Self { entries }
    }

    /// Build the store by fetching and enrolling every roster member,
    /// sequentially and in roster order.
    ///
    /// Individual failures (fetch, decode, inference, no face in the photo)
    /// are logged and leave that member unenrolled; they are never retried
    /// and never abort the build. The builder itself cannot fail.
    pub async fn build(
        roster: &Roster,
        client: &reqwest::Client,
        engine: &mut dyn FaceEngine,
    ) -> Self {
        let mut entries = Vec::with_capacity(roster.members.len());

        for member in &roster.members {
            let embedding = match fetch_photo(client, &member.url).await {
                Ok(bytes) => enroll_from_bytes(engine, &member.roll_no, &bytes),
                Err(err) => {
                    tracing::warn!(
                        roll_no = %member.roll_no,
                        error = %err,
                        "photo fetch failed; member stays unenrolled"
                    );
                    None
                }
            };

            entries.push(ReferenceEntry {
                roll_no: member.roll_no.clone(),
                url: member.url.clone(),
                embedding,
            });
        }

        let store = Self { entries };
        tracing::info!(
            members = store.len(),
            enrolled = store.enrolled_count(),
            "reference store built"
        );
        store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of members that actually carry an embedding.
    pub fn enrolled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.embedding.is_some()).count()
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    /// Every enrolled entry within `tolerance` of `probe`, in store order.
    pub fn matches_for(&self, probe: &Embedding, tolerance: f32) -> Vec<MatchHit> {
        matches_within(&self.entries, probe, tolerance)
    }
}

async fn fetch_photo(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::Status(response.status()));
    }
    Ok(response.bytes().await?.to_vec())
}

/// Run the engine over a fetched photo. The FIRST returned face becomes the
/// member's reference embedding; any further faces in the photo are
/// discarded. Zero faces, like any engine failure, leaves the member
/// unenrolled.
fn enroll_from_bytes(
    engine: &mut dyn FaceEngine,
    roll_no: &str,
    bytes: &[u8],
) -> Option<Embedding> {
    match engine.detect_and_embed(bytes) {
        Ok(faces) if faces.is_empty() => {
            tracing::warn!(roll_no, "no face detected in reference photo");
            None
        }
        Ok(mut faces) => {
            if faces.len() > 1 {
                tracing::debug!(
                    roll_no,
                    discarded = faces.len() - 1,
                    "reference photo has multiple faces; keeping the first"
                );
            }
            Some(faces.remove(0).embedding)
        }
        Err(err) => {
            tracing::warn!(roll_no, error = %err, "reference photo could not be processed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::{DetectedFace, EngineError, FaceLocation};

    fn face(values: Vec<f32>) -> DetectedFace {
        DetectedFace {
            location: FaceLocation { top: 0, right: 10, bottom: 10, left: 0 },
            embedding: Embedding::new(values),
        }
    }

    /// Engine that returns a fixed answer for every call.
    struct StubEngine {
        result: Result<Vec<DetectedFace>, ()>,
    }

    impl FaceEngine for StubEngine {
        fn detect_and_embed(
            &mut self,
            _image_bytes: &[u8],
        ) -> Result<Vec<DetectedFace>, EngineError> {
            match &self.result {
                Ok(faces) => Ok(faces.clone()),
                Err(()) => Err(EngineError::Io(std::io::Error::other("stub failure"))),
            }
        }
    }

    #[test]
    fn test_enroll_takes_first_face_only() {
        let mut engine = StubEngine {
            result: Ok(vec![face(vec![1.0, 0.0]), face(vec![0.0, 1.0])]),
        };
        let embedding = enroll_from_bytes(&mut engine, "r1", b"img").unwrap();
        assert_eq!(embedding.values, vec![1.0, 0.0]);
    }

    #[test]
    fn test_enroll_zero_faces_leaves_unenrolled() {
        let mut engine = StubEngine { result: Ok(vec![]) };
        assert!(enroll_from_bytes(&mut engine, "r1", b"img").is_none());
    }

    #[test]
    fn test_enroll_engine_failure_leaves_unenrolled() {
        let mut engine = StubEngine { result: Err(()) };
        assert!(enroll_from_bytes(&mut engine, "r1", b"img").is_none());
    }

    #[test]
    fn test_matches_for_skips_unenrolled_and_keeps_order() {
        let store = ReferenceStore::from_entries(vec![
            ReferenceEntry {
                roll_no: "skipped".into(),
                url: "https://photos.example/skipped.jpg".into(),
                embedding: None,
            },
            ReferenceEntry {
                roll_no: "farther".into(),
                url: "https://photos.example/farther.jpg".into(),
                embedding: Some(Embedding::new(vec![0.3, 0.0])),
            },
            ReferenceEntry {
                roll_no: "nearer".into(),
                url: "https://photos.example/nearer.jpg".into(),
                embedding: Some(Embedding::new(vec![0.1, 0.0])),
            },
        ]);

        let hits = store.matches_for(&Embedding::new(vec![0.0, 0.0]), 0.5);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].roll_no, "farther");
        assert_eq!(hits[1].roll_no, "nearer");
    }

    #[test]
    fn test_enrolled_count() {
        let store = ReferenceStore::from_entries(vec![
            ReferenceEntry {
                roll_no: "a".into(),
                url: "u".into(),
                embedding: Some(Embedding::new(vec![0.0])),
            },
            ReferenceEntry { roll_no: "b".into(), url: "u".into(), embedding: None },
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.enrolled_count(), 1);
    }
}
