//! Face-identity roster and recognition engine.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both
//! running via ONNX Runtime for CPU inference. The roster of enrolled
//! people lives in a single bincode file, reloaded on every operation.

pub mod alignment;
pub mod annotate;
pub mod detector;
pub mod embedder;
pub mod engine;
pub mod enroll;
pub mod matching;
pub mod recognizer;
pub mod roster;
pub mod types;

pub use annotate::Annotator;
pub use engine::{FaceEngine, OnnxFaceEngine};
pub use enroll::{enroll, is_face_detectable, EnrollError};
pub use recognizer::{recognize, Recognition};
pub use roster::{Roster, RosterError, RosterStore};
pub use types::{Embedding, FaceRegion, PersonRecord, StoredImage, EMBEDDING_DIM};
