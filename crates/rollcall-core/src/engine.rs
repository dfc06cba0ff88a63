//! The narrow face-engine interface the rest of the crate is written
//! against, plus the production ONNX-backed implementation.

use std::path::Path;

use image::RgbImage;
use thiserror::Error;

use crate::detector::{DetectorError, FaceDetector};
use crate::embedder::{EmbedderError, FaceEmbedder};
use crate::types::{Embedding, FaceRegion};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("embedder error: {0}")]
    Embedder(#[from] EmbedderError),
}

/// Face detection and embedding extraction.
///
/// `detect` returns regions in confidence-descending order; `embed` returns
/// one embedding per region, same order. Comparison lives in
/// [`crate::matching`] and is engine-independent.
pub trait FaceEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, EngineError>;

    fn embed(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<Embedding>, EngineError>;
}

/// Production engine: SCRFD detection + ArcFace embeddings, both via ONNX
/// Runtime CPU inference.
pub struct OnnxFaceEngine {
    detector: FaceDetector,
    embedder: FaceEmbedder,
}

impl OnnxFaceEngine {
    /// Load both models from `model_dir`. Fails fast if either file is
    /// missing so callers can surface a clear startup error.
    pub fn load(model_dir: &Path) -> Result<Self, EngineError> {
        let detector = FaceDetector::load(&model_dir.join(crate::detector::MODEL_FILE))?;
        let embedder = FaceEmbedder::load(&model_dir.join(crate::embedder::MODEL_FILE))?;
        tracing::info!(dir = %model_dir.display(), "face engine ready");
        Ok(Self { detector, embedder })
    }
}

impl FaceEngine for OnnxFaceEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, EngineError> {
        Ok(self.detector.detect(image)?)
    }

    fn embed(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<Embedding>, EngineError> {
        let mut embeddings = Vec::with_capacity(regions.len());
        for region in regions {
            embeddings.push(self.embedder.extract(image, region)?);
        }
        Ok(embeddings)
    }
}
