use std::collections::BTreeMap;

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Fixed output dimensionality of the ArcFace embedder (w600k_r50).
pub const EMBEDDING_DIM: usize = 512;

/// Detected face region in pixel coordinates, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceRegion {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

impl FaceRegion {
    pub fn width(&self) -> i64 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i64 {
        (self.bottom - self.top).max(0)
    }
}

/// Face embedding vector (512-dimensional, L2-normalized by the embedder).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance between two embeddings. Lower = more similar.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// A color image in the canonical in-memory representation: tightly packed
/// RGB8 rows. All decode paths normalize to this, so stored reference images
/// and recognition inputs always agree on channel order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl StoredImage {
    pub fn from_rgb(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.as_raw().clone(),
        }
    }

    /// Rebuild the `image` crate view of this image.
    ///
    /// Returns `None` if the stored buffer does not match the recorded
    /// dimensions (a corrupted store).
    pub fn to_rgb(&self) -> Option<RgbImage> {
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }
}

/// One enrolled person: identity, reference image, and the embedding of the
/// primary face in that image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonRecord {
    pub external_id: String,
    pub display_name: String,
    pub reference_image: StoredImage,
    pub embedding: Embedding,
}

/// The full roster, keyed by slot. BTreeMap iteration is slot-ascending,
/// which is the deterministic "roster iteration order" the recognizer's
/// first-match rule depends on.
pub type Roster = BTreeMap<u32, PersonRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_identical() {
        let a = Embedding { values: vec![1.0, 0.0, 0.0] };
        assert!(a.distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_distance_orthogonal_unit() {
        let a = Embedding { values: vec![1.0, 0.0] };
        let b = Embedding { values: vec![0.0, 1.0] };
        assert!((a.distance(&b) - 2.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_stored_image_roundtrip() {
        let mut img = RgbImage::new(4, 3);
        img.put_pixel(2, 1, image::Rgb([10, 20, 30]));
        let stored = StoredImage::from_rgb(&img);
        let back = stored.to_rgb().unwrap();
        assert_eq!(back.dimensions(), (4, 3));
        assert_eq!(back.get_pixel(2, 1), &image::Rgb([10, 20, 30]));
    }

    #[test]
    fn test_stored_image_corrupt_buffer() {
        let stored = StoredImage { width: 10, height: 10, pixels: vec![0; 7] };
        assert!(stored.to_rgb().is_none());
    }

    #[test]
    fn test_region_extent() {
        let r = FaceRegion {
            top: 10, right: 50, bottom: 40, left: 20,
            confidence: 0.9, landmarks: None,
        };
        assert_eq!(r.width(), 30);
        assert_eq!(r.height(), 30);
    }
}
