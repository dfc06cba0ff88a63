//! ArcFace face embedder via ONNX Runtime.
//!
//! Produces 512-dimensional L2-normalized embeddings from aligned RGB face
//! crops, using the w600k_r50 ArcFace model.

use std::path::Path;

use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use thiserror::Error;

use crate::alignment::{self, ALIGNED_SIZE};
use crate::types::{Embedding, FaceRegion, EMBEDDING_DIM};

pub const MODEL_FILE: &str = "w600k_r50.onnx";

const INPUT_SIZE: usize = ALIGNED_SIZE as usize;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5; // symmetric normalization, unlike SCRFD's 128.0

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0} — download w600k_r50.onnx from insightface and place it in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face region has no landmarks — the detector must supply landmarks for alignment")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based embedding extractor.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, EmbedderError> {
        if !model_path.exists() {
            return Err(EmbedderError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded ArcFace model");

        Ok(Self { session })
    }

    /// Extract the embedding for one detected face in an RGB image.
    ///
    /// The region must carry landmarks; the face is aligned to the canonical
    /// 112x112 crop before inference.
    pub fn extract(
        &mut self,
        image: &RgbImage,
        region: &FaceRegion,
    ) -> Result<Embedding, EmbedderError> {
        let landmarks = region.landmarks.as_ref().ok_or(EmbedderError::NoLandmarks)?;

        let aligned = alignment::align_face(image, landmarks);
        let input = preprocess(&aligned);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw.to_vec()
        };

        Ok(Embedding { values })
    }
}

/// Pack a 112x112 RGB crop into a NCHW float tensor with symmetric
/// normalization.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));

    for y in 0..INPUT_SIZE {
        for x in 0..INPUT_SIZE {
            let rgb = aligned.get_pixel(x as u32, y as u32).0;
            for (c, &px) in rgb.iter().enumerate() {
                tensor[[0, c, y, x]] = (px as f32 - PIXEL_MEAN) / PIXEL_STD;
            }
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_output_shape() {
        let aligned = RgbImage::from_pixel(112, 112, Rgb([128, 128, 128]));
        let tensor = preprocess(&aligned);
        assert_eq!(tensor.shape(), &[1, 3, INPUT_SIZE, INPUT_SIZE]);
    }

    #[test]
    fn test_preprocess_normalization() {
        let aligned = RgbImage::from_pixel(112, 112, Rgb([128, 0, 255]));
        let tensor = preprocess(&aligned);
        assert!((tensor[[0, 0, 0, 0]] - (128.0 - PIXEL_MEAN) / PIXEL_STD).abs() < 1e-6);
        assert!((tensor[[0, 1, 0, 0]] - (-1.0)).abs() < 1e-6);
        assert!((tensor[[0, 2, 0, 0]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_extract_requires_landmarks() {
        // extract() rejects regions without landmarks before touching the
        // session; the check itself is on the region type.
        let region = FaceRegion {
            top: 0, right: 100, bottom: 100, left: 0,
            confidence: 0.9, landmarks: None,
        };
        assert!(region.landmarks.is_none());
    }
}
