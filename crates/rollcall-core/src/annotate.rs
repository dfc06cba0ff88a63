//! Bounding-box and label drawing for recognition output images.

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use thiserror::Error;

use crate::recognizer::FaceLabel;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const BOX_THICKNESS: i64 = 2;
const TEXT_SCALE: f32 = 24.0;
/// Vertical offsets above the box for the distance and name lines.
const DISTANCE_OFFSET: i64 = 30;
const NAME_OFFSET: i64 = 10;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("font file not found: {0} — place a TTF font at the configured path")]
    FontNotFound(PathBuf),
    #[error("failed to parse font: {0}")]
    InvalidFont(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Draws face boxes and labels onto recognition images.
pub struct Annotator {
    font: FontVec,
}

impl Annotator {
    /// Load the label font from a TTF file.
    pub fn load(font_path: &Path) -> Result<Self, AnnotatorError> {
        if !font_path.exists() {
            return Err(AnnotatorError::FontNotFound(font_path.to_path_buf()));
        }
        let bytes = std::fs::read(font_path)?;
        let font =
            FontVec::try_from_vec(bytes).map_err(|e| AnnotatorError::InvalidFont(e.to_string()))?;
        tracing::info!(path = %font_path.display(), "annotation font loaded");
        Ok(Self { font })
    }

    /// Draw one labeled face onto the image: a green rectangle around the
    /// region, the match distance (2 decimals) above it when matched, and
    /// the resolved name between the two.
    pub fn annotate(&self, image: &mut RgbImage, label: &FaceLabel) {
        let region = &label.region;

        let width = region.width().max(1) as u32;
        let height = region.height().max(1) as u32;
        for t in 0..BOX_THICKNESS {
            let rect = Rect::at((region.left - t) as i32, (region.top - t) as i32)
                .of_size(width + 2 * t as u32, height + 2 * t as u32);
            draw_hollow_rect_mut(image, rect, BOX_COLOR);
        }

        let scale = PxScale::from(TEXT_SCALE);
        if let Some(distance) = label.distance {
            self.draw_line(
                image,
                region.left,
                region.top - DISTANCE_OFFSET,
                scale,
                &format!("{distance:.2}"),
            );
        }
        self.draw_line(
            image,
            region.left,
            region.top - NAME_OFFSET,
            scale,
            &label.display_name,
        );
    }

    fn draw_line(&self, image: &mut RgbImage, x: i64, y: i64, scale: PxScale, text: &str) {
        draw_text_mut(
            image,
            BOX_COLOR,
            x.max(0) as i32,
            y.max(0) as i32,
            scale,
            &self.font,
            text,
        );
    }
}
