#![allow(dead_code)]

use std::collections::HashMap;

use image::{Rgb, RgbImage};
use rollcall_core::engine::{EngineError, FaceEngine};
use rollcall_core::types::{Embedding, FaceRegion, EMBEDDING_DIM};

/// Deterministic 512-dim embedding with a spike at `seed`. Distinct seeds
/// give orthogonal vectors (pairwise distance sqrt(2)).
pub fn spike_embedding(seed: usize) -> Embedding {
    let mut values = vec![0.0f32; EMBEDDING_DIM];
    values[seed % EMBEDDING_DIM] = 1.0;
    Embedding { values }
}

/// Solid-color test image. The gray level doubles as the stub engine's
/// lookup key; levels at least 64 apart stay distinguishable after a lossy
/// JPEG round-trip.
pub fn test_image(level: u8) -> RgbImage {
    RgbImage::from_pixel(16, 16, Rgb([level, level, level]))
}

fn full_region() -> FaceRegion {
    FaceRegion {
        top: 0,
        right: 16,
        bottom: 16,
        left: 0,
        confidence: 0.95,
        landmarks: None,
    }
}

/// Engine test double: maps an image (keyed by its bucketed top-left pixel)
/// to a fixed list of faces. Images with no mapping have zero faces.
pub struct StubEngine {
    faces: HashMap<u8, Vec<(FaceRegion, Embedding)>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self { faces: HashMap::new() }
    }

    /// Register one face for images at this gray level.
    pub fn with_face(mut self, level: u8, embedding: Embedding) -> Self {
        self.faces
            .entry(level / 64)
            .or_default()
            .push((full_region(), embedding));
        self
    }

    fn marker(image: &RgbImage) -> u8 {
        image.get_pixel(0, 0)[0] / 64
    }
}

impl FaceEngine for StubEngine {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceRegion>, EngineError> {
        Ok(self
            .faces
            .get(&Self::marker(image))
            .map(|faces| faces.iter().map(|(r, _)| r.clone()).collect())
            .unwrap_or_default())
    }

    fn embed(
        &mut self,
        image: &RgbImage,
        regions: &[FaceRegion],
    ) -> Result<Vec<Embedding>, EngineError> {
        let faces = self.faces.get(&Self::marker(image)).cloned().unwrap_or_default();
        Ok(faces.into_iter().take(regions.len()).map(|(_, e)| e).collect())
    }
}
