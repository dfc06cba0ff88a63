//! Enrollment: gate store mutation on face detectability.

use image::RgbImage;
use thiserror::Error;

use crate::engine::{EngineError, FaceEngine};
use crate::roster::{RosterError, RosterStore};
use crate::types::StoredImage;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("no face detected in the enrollment image")]
    NoFaceDetected,
    #[error("identifier {0:?} already exists in the roster")]
    DuplicateIdentifier(String),
    #[error(transparent)]
    Roster(RosterError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<RosterError> for EnrollError {
    fn from(err: RosterError) -> Self {
        match err {
            RosterError::DuplicateIdentifier(id) => EnrollError::DuplicateIdentifier(id),
            other => EnrollError::Roster(other),
        }
    }
}

/// True iff the engine reports at least one face region in the image.
pub fn is_face_detectable(
    engine: &mut dyn FaceEngine,
    image: &RgbImage,
) -> Result<bool, EngineError> {
    Ok(!engine.detect(image)?.is_empty())
}

/// Enroll a person (or update one in place when `old_slot` is given).
///
/// The detectability gate runs before any embedding work or store mutation;
/// a zero-face image never touches the roster. When the image holds several
/// faces, only the first detected face's embedding is stored.
pub fn enroll(
    store: &RosterStore,
    engine: &mut dyn FaceEngine,
    external_id: &str,
    display_name: &str,
    image: &RgbImage,
    old_slot: Option<u32>,
) -> Result<u32, EnrollError> {
    let regions = engine.detect(image)?;
    let Some(first) = regions.first() else {
        return Err(EnrollError::NoFaceDetected);
    };

    let embedding = engine
        .embed(image, std::slice::from_ref(first))?
        .into_iter()
        .next()
        .ok_or(EnrollError::NoFaceDetected)?;

    let slot = store.insert(
        external_id,
        display_name,
        StoredImage::from_rgb(image),
        embedding,
        old_slot,
    )?;
    Ok(slot)
}
