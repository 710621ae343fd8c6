//! rollcall-core — face detection, embedding, and gallery matching.
//!
//! Detection (UltraFace) and embedding extraction run via ONNX Runtime on
//! CPU; both sit behind the [`FaceEngine`] trait so callers can be tested
//! against deterministic stubs.

pub mod detector;
pub mod embedder;
pub mod engine;
pub mod matcher;
pub mod types;

pub use engine::{EngineError, FaceEngine, OnnxFaceEngine};
pub use matcher::{matches_within, DEFAULT_TOLERANCE};
pub use types::{DetectedFace, Embedding, FaceLocation, MatchHit, ReferenceEntry};
