//! Landmark-based face alignment for the embedder.
//!
//! Maps the five detected facial landmarks onto the InsightFace reference
//! positions with a least-squares similarity fit, then warps the face into
//! the canonical 112x112 ArcFace crop.

use image::{Rgb, RgbImage};

/// ArcFace reference landmarks for a 112x112 output.
const REFERENCE_LANDMARKS_112: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

pub const ALIGNED_SIZE: u32 = 112;

/// Scale-rotation-translation transform constrained to the form
/// `dst = [a -b; b a] * src + (tx, ty)`.
#[derive(Debug, Clone, Copy)]
struct Similarity {
    a: f32,
    b: f32,
    tx: f32,
    ty: f32,
}

impl Similarity {
    const IDENTITY: Similarity = Similarity { a: 1.0, b: 0.0, tx: 0.0, ty: 0.0 };

    /// Least-squares fit from `src` points to `dst` points.
    ///
    /// After centering both point sets the normal equations decouple, so
    /// the optimum has a closed form: `a` and `b` are ratios of the
    /// centered cross-sums over the centered source energy, and the
    /// translation re-centers the destination mean.
    fn fit(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Similarity {
        let n = src.len() as f32;
        let (mut mx, mut my, mut mu, mut mv) = (0.0f32, 0.0, 0.0, 0.0);
        for i in 0..src.len() {
            mx += src[i].0;
            my += src[i].1;
            mu += dst[i].0;
            mv += dst[i].1;
        }
        mx /= n;
        my /= n;
        mu /= n;
        mv /= n;

        let mut energy = 0.0f32;
        let mut dot = 0.0f32;
        let mut cross = 0.0f32;
        for i in 0..src.len() {
            let (x, y) = (src[i].0 - mx, src[i].1 - my);
            let (u, v) = (dst[i].0 - mu, dst[i].1 - mv);
            energy += x * x + y * y;
            dot += x * u + y * v;
            cross += x * v - y * u;
        }

        if energy < 1e-12 {
            // degenerate landmarks, all points coincide
            return Similarity::IDENTITY;
        }

        let a = dot / energy;
        let b = cross / energy;
        Similarity {
            a,
            b,
            tx: mu - a * mx + b * my,
            ty: mv - b * mx - a * my,
        }
    }

    /// Map a destination-space point back into source space.
    fn pull_back(&self, dx: f32, dy: f32) -> Option<(f32, f32)> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let (ox, oy) = (dx - self.tx, dy - self.ty);
        Some((
            (self.a * ox + self.b * oy) / det,
            (self.a * oy - self.b * ox) / det,
        ))
    }
}

/// Warp a detected face into the canonical 112x112 RGB crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let transform = Similarity::fit(landmarks, &REFERENCE_LANDMARKS_112);
    let mut crop = RgbImage::new(ALIGNED_SIZE, ALIGNED_SIZE);

    for oy in 0..ALIGNED_SIZE {
        for ox in 0..ALIGNED_SIZE {
            if let Some((sx, sy)) = transform.pull_back(ox as f32, oy as f32) {
                crop.put_pixel(ox, oy, bilinear(image, sx, sy));
            }
        }
    }
    crop
}

/// Bilinear sample at a fractional position. Out-of-bounds taps read black.
fn bilinear(image: &RgbImage, sx: f32, sy: f32) -> Rgb<u8> {
    let (width, height) = image.dimensions();
    let x0 = sx.floor() as i64;
    let y0 = sy.floor() as i64;
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let tap = |x: i64, y: i64, c: usize| -> f32 {
        if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
            image.get_pixel(x as u32, y as u32)[c] as f32
        } else {
            0.0
        }
    };

    let mut rgb = [0u8; 3];
    for (c, out) in rgb.iter_mut().enumerate() {
        let top = tap(x0, y0, c) * (1.0 - fx) + tap(x0 + 1, y0, c) * fx;
        let bottom = tap(x0, y0 + 1, c) * (1.0 - fx) + tap(x0 + 1, y0 + 1, c) * fx;
        *out = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(rgb)
}
