//! Durable slot → person mapping backed by a single bincode file.
//!
//! Every operation is a self-contained load → mutate → whole-file rewrite.
//! There is no caching between calls and no locking here; callers that need
//! isolation must serialize their own read-modify-write sequences (the
//! daemon routes all mutations through one worker thread for exactly that
//! reason). The overwrite is not atomic: a crash mid-write can corrupt the
//! backing file.

use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

use crate::engine::{EngineError, FaceEngine};
use crate::types::{Embedding, PersonRecord, StoredImage};

pub use crate::types::Roster;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("roster file not found at {0} — run a dataset rebuild to create it")]
    StoreNotFound(PathBuf),
    #[error("identifier {0:?} already exists in the roster")]
    DuplicateIdentifier(String),
    #[error("failed to decode roster file: {0}")]
    Decode(String),
    #[error("failed to encode roster: {0}")]
    Encode(String),
    #[error("engine produced no embedding for {0}")]
    MissingEmbedding(String),
    #[error("engine error during rebuild: {0}")]
    Engine(#[from] EngineError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to the roster backing file. Holds no in-memory state beyond the
/// path; clones are cheap and refer to the same file.
#[derive(Debug, Clone)]
pub struct RosterStore {
    path: PathBuf,
}

impl RosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the full roster from disk.
    ///
    /// A missing backing file is a hard error, not an empty-store default:
    /// the store must be created by a rebuild (or an explicit save) first.
    pub fn load(&self) -> Result<Roster, RosterError> {
        if !self.path.exists() {
            return Err(RosterError::StoreNotFound(self.path.clone()));
        }
        let bytes = std::fs::read(&self.path)?;
        bincode::deserialize(&bytes).map_err(|e| RosterError::Decode(e.to_string()))
    }

    /// Serialize the full roster back to the backing file (plain overwrite).
    pub fn save(&self, roster: &Roster) -> Result<(), RosterError> {
        let bytes =
            bincode::serialize(roster).map_err(|e| RosterError::Encode(e.to_string()))?;
        std::fs::write(&self.path, bytes)?;
        tracing::debug!(path = %self.path.display(), records = roster.len(), "roster saved");
        Ok(())
    }

    /// Linear scan for the first record with the given external identifier.
    /// Absence is `None`, not an error.
    pub fn lookup_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<(u32, PersonRecord)>, RosterError> {
        let roster = self.load()?;
        Ok(roster
            .into_iter()
            .find(|(_, record)| record.external_id == external_id))
    }

    /// Insert or update a record, then persist the whole roster.
    ///
    /// With `old_slot`, the record at that slot is overwritten in place and
    /// no duplicate-identifier check is made against other slots (the update
    /// path allows renames without the uniqueness gate). Without it, a
    /// duplicate `external_id` anywhere in the roster is rejected and the
    /// new record takes slot = current record count.
    pub fn insert(
        &self,
        external_id: &str,
        display_name: &str,
        reference_image: StoredImage,
        embedding: Embedding,
        old_slot: Option<u32>,
    ) -> Result<u32, RosterError> {
        let mut roster = self.load()?;

        let slot = match old_slot {
            Some(slot) => slot,
            None => {
                if roster.values().any(|r| r.external_id == external_id) {
                    return Err(RosterError::DuplicateIdentifier(external_id.to_string()));
                }
                roster.len() as u32
            }
        };

        roster.insert(
            slot,
            PersonRecord {
                external_id: external_id.to_string(),
                display_name: display_name.to_string(),
                reference_image,
                embedding,
            },
        );
        self.save(&roster)?;

        tracing::info!(slot, external_id, "roster record written");
        Ok(slot)
    }

    /// Remove the first record matching `external_id` and persist. A missing
    /// identifier is a silent no-op (the file is still rewritten).
    pub fn delete_by_external_id(&self, external_id: &str) -> Result<(), RosterError> {
        let mut roster = self.load()?;

        let found = roster
            .iter()
            .find(|(_, record)| record.external_id == external_id)
            .map(|(slot, _)| *slot);
        if let Some(slot) = found {
            roster.remove(&slot);
            tracing::info!(slot, external_id, "roster record deleted");
        }

        self.save(&roster)
    }

    /// Rebuild the store from a directory of enrollment photos, replacing
    /// any prior contents.
    ///
    /// Files must be named `<externalId>_<displayName>.jpg`, with
    /// underscores in the name part standing in for spaces. Non-`.jpg`
    /// files are ignored, and images with no detectable face are skipped
    /// silently. Slots are assigned densely in sorted-filename order.
    /// Returns the number of records written.
    pub fn rebuild_from_directory(
        &self,
        dataset_dir: &Path,
        engine: &mut dyn FaceEngine,
    ) -> Result<usize, RosterError> {
        let mut filenames: Vec<String> = std::fs::read_dir(dataset_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".jpg"))
            .collect();
        filenames.sort();

        let mut roster = Roster::new();
        let mut slot = 0u32;

        for filename in filenames {
            let stem = filename.split('.').next().unwrap_or_default();
            let mut parts = stem.split('_');
            let external_id = parts.next().unwrap_or_default().to_string();
            let display_name = parts.collect::<Vec<_>>().join(" ");

            let path = dataset_dir.join(&filename);
            let image: RgbImage = image::open(&path)
                .map_err(|e| RosterError::Decode(format!("{}: {e}", path.display())))?
                .to_rgb8();

            let regions = engine.detect(&image)?;
            let Some(first) = regions.first() else {
                tracing::warn!(file = %filename, "no face detected, skipping");
                continue;
            };
            let embedding = engine
                .embed(&image, std::slice::from_ref(first))?
                .into_iter()
                .next()
                .ok_or_else(|| RosterError::MissingEmbedding(filename.clone()))?;

            roster.insert(
                slot,
                PersonRecord {
                    external_id,
                    display_name,
                    reference_image: StoredImage::from_rgb(&image),
                    embedding,
                },
            );
            slot += 1;
        }

        let count = roster.len();
        self.save(&roster)?;
        tracing::info!(records = count, path = %self.path.display(), "dataset rebuild complete");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FaceRegion;
    use tempfile::TempDir;

    fn emb(seed: usize) -> Embedding {
        let mut values = vec![0.0f32; 8];
        values[seed % 8] = 1.0;
        Embedding { values }
    }

    fn img() -> StoredImage {
        StoredImage { width: 2, height: 2, pixels: vec![0; 12] }
    }

    fn empty_store(dir: &TempDir) -> RosterStore {
        let store = RosterStore::new(dir.path().join("roster.bin"));
        store.save(&Roster::new()).unwrap();
        store
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        let store = RosterStore::new(dir.path().join("absent.bin"));
        assert!(matches!(store.load(), Err(RosterError::StoreNotFound(_))));
    }

    #[test]
    fn test_insert_assigns_dense_slots() {
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);

        let s0 = store.insert("S1", "Ann", img(), emb(0), None).unwrap();
        let s1 = store.insert("S2", "Ben", img(), emb(1), None).unwrap();
        assert_eq!((s0, s1), (0, 1));
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_insert_duplicate_id_rejected() {
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);

        store.insert("S1", "Ann", img(), emb(0), None).unwrap();
        let err = store.insert("S1", "Other", img(), emb(1), None).unwrap_err();
        assert!(matches!(err, RosterError::DuplicateIdentifier(id) if id == "S1"));
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn test_update_in_place_skips_duplicate_check() {
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);

        store.insert("S1", "Ann", img(), emb(0), None).unwrap();
        store.insert("S2", "Ben", img(), emb(1), None).unwrap();

        // Renaming slot 1 to an id held by slot 0 is allowed on this path.
        store.insert("S1", "Ben", img(), emb(1), Some(1)).unwrap();
        let roster = store.load().unwrap();
        assert_eq!(roster[&0].external_id, "S1");
        assert_eq!(roster[&1].external_id, "S1");
    }

    #[test]
    fn test_lookup_returns_first_match() {
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);

        store.insert("S1", "Ann", img(), emb(0), None).unwrap();
        store.insert("S2", "Ben", img(), emb(1), None).unwrap();

        let (slot, record) = store.lookup_by_external_id("S2").unwrap().unwrap();
        assert_eq!(slot, 1);
        assert_eq!(record.display_name, "Ben");
        assert!(store.lookup_by_external_id("S9").unwrap().is_none());
    }

    #[test]
    fn test_delete_removes_exactly_one() {
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);

        store.insert("S1", "Ann", img(), emb(0), None).unwrap();
        store.insert("S2", "Ben", img(), emb(1), None).unwrap();

        store.delete_by_external_id("S1").unwrap();
        let roster = store.load().unwrap();
        assert_eq!(roster.len(), 1);
        assert!(store.lookup_by_external_id("S1").unwrap().is_none());
        assert!(store.lookup_by_external_id("S2").unwrap().is_some());
    }

    #[test]
    fn test_delete_missing_id_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);

        store.insert("S1", "Ann", img(), emb(0), None).unwrap();
        store.delete_by_external_id("nope").unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
    }

    /// Detects one face in every image but never yields an embedding.
    struct NoEmbedEngine;

    impl FaceEngine for NoEmbedEngine {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<FaceRegion>, EngineError> {
            Ok(vec![FaceRegion {
                top: 0,
                right: 8,
                bottom: 8,
                left: 0,
                confidence: 0.9,
                landmarks: None,
            }])
        }

        fn embed(
            &mut self,
            _image: &RgbImage,
            _regions: &[FaceRegion],
        ) -> Result<Vec<Embedding>, EngineError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_rebuild_reports_missing_embedding_by_filename() {
        let dataset = TempDir::new().unwrap();
        RgbImage::from_pixel(8, 8, image::Rgb([200, 200, 200]))
            .save(dataset.path().join("S1_Ann.jpg"))
            .unwrap();

        let store_dir = TempDir::new().unwrap();
        let store = RosterStore::new(store_dir.path().join("roster.bin"));

        let err = store
            .rebuild_from_directory(dataset.path(), &mut NoEmbedEngine)
            .unwrap_err();
        assert!(matches!(err, RosterError::MissingEmbedding(f) if f == "S1_Ann.jpg"));
    }

    #[test]
    fn test_slot_reuse_after_delete() {
        // After deleting slot 0 of {0, 1}, the next insert takes
        // slot = count = 1, colliding with the survivor's key space if
        // counts realign. Documented hazard, preserved.
        let dir = TempDir::new().unwrap();
        let store = empty_store(&dir);

        store.insert("S1", "Ann", img(), emb(0), None).unwrap();
        store.insert("S2", "Ben", img(), emb(1), None).unwrap();
        store.delete_by_external_id("S1").unwrap();

        let slot = store.insert("S3", "Cam", img(), emb(2), None).unwrap();
        assert_eq!(slot, 1);
        let roster = store.load().unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[&1].external_id, "S3");
    }
}
