//! Label every detected face in a query image against the current roster.

use image::RgbImage;
use serde::Serialize;

use crate::annotate::Annotator;
use crate::engine::{EngineError, FaceEngine};
use crate::matching;
use crate::types::{Embedding, FaceRegion, Roster};

pub const UNKNOWN: &str = "Unknown";

/// Identity resolved for one detected face.
#[derive(Debug, Clone)]
pub struct FaceLabel {
    pub region: FaceRegion,
    pub display_name: String,
    pub external_id: String,
    /// Distance to the matched roster entry; `None` for unknown faces.
    pub distance: Option<f32>,
}

/// Caller-facing outcome of a recognition call. Carries the identity of the
/// LAST processed face only; with several faces in frame, earlier identities
/// are visible in the annotated image but not returned here. Kept for
/// compatibility with the attendance API contract.
#[derive(Debug, Clone, Serialize)]
pub struct Recognition {
    pub display_name: String,
    pub external_id: String,
}

impl Recognition {
    fn unknown() -> Self {
        Self {
            display_name: UNKNOWN.to_string(),
            external_id: UNKNOWN.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.display_name == UNKNOWN && self.external_id == UNKNOWN
    }
}

/// Resolve an identity for every face the engine detects in `image`.
///
/// For each face, per-roster-entry match flags (distance within `tolerance`)
/// are evaluated in slot order and the FIRST flagged entry wins, regardless
/// of whether a later entry is closer. Faces with no flagged entry are
/// labeled "Unknown".
pub fn label_faces(
    engine: &mut dyn FaceEngine,
    roster: &Roster,
    image: &RgbImage,
    tolerance: f32,
) -> Result<Vec<FaceLabel>, EngineError> {
    let entries: Vec<_> = roster.values().collect();
    let known: Vec<Embedding> = entries.iter().map(|r| r.embedding.clone()).collect();

    let regions = engine.detect(image)?;
    let embeddings = engine.embed(image, &regions)?;

    let mut labels = Vec::with_capacity(regions.len());
    for (region, embedding) in regions.into_iter().zip(embeddings) {
        let flags = matching::compare(&known, &embedding, tolerance);
        let label = match flags.iter().position(|&matched| matched) {
            Some(idx) => {
                let dists = matching::distances(&known, &embedding);
                FaceLabel {
                    region,
                    display_name: entries[idx].display_name.clone(),
                    external_id: entries[idx].external_id.clone(),
                    distance: Some(dists[idx]),
                }
            }
            None => FaceLabel {
                region,
                display_name: UNKNOWN.to_string(),
                external_id: UNKNOWN.to_string(),
                distance: None,
            },
        };
        labels.push(label);
    }

    Ok(labels)
}

/// Annotate `image` in place with every labeled face and return the
/// last-processed face's identity.
///
/// Zero detected faces leaves the image untouched and returns
/// "Unknown"/"Unknown"; so does an empty roster for every face present.
pub fn recognize(
    engine: &mut dyn FaceEngine,
    annotator: &Annotator,
    roster: &Roster,
    image: &mut RgbImage,
    tolerance: f32,
) -> Result<Recognition, EngineError> {
    let labels = label_faces(engine, roster, &*image, tolerance)?;

    for label in &labels {
        annotator.annotate(image, label);
    }
    let outcome = resolve_outcome(&labels);

    tracing::debug!(
        faces = labels.len(),
        name = %outcome.display_name,
        id = %outcome.external_id,
        "recognition complete"
    );
    Ok(outcome)
}

/// Fold per-face labels into the single caller-facing identity: the label
/// of the LAST face in detection order, or "Unknown"/"Unknown" when no
/// faces were detected.
fn resolve_outcome(labels: &[FaceLabel]) -> Recognition {
    labels
        .last()
        .map(|label| Recognition {
            display_name: label.display_name.clone(),
            external_id: label.external_id.clone(),
        })
        .unwrap_or_else(Recognition::unknown)
}
