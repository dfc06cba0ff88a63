//! Dedicated engine thread owning the ONNX sessions and the roster store.
//!
//! All store mutations (enroll, update, delete, rebuild) and all recognition
//! requests flow through one bounded channel into this thread, which makes
//! it the single-writer serialization boundary for the roster's
//! load-mutate-rewrite cycle. Read-only roster loads elsewhere in the
//! daemon deliberately bypass the queue.

use std::path::PathBuf;

use image::RgbImage;
use rollcall_core::recognizer::Recognition;
use rollcall_core::roster::RosterError;
use rollcall_core::{
    enroll, recognizer, Annotator, EnrollError, OnnxFaceEngine, RosterStore,
};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Enroll(#[from] EnrollError),
    #[error(transparent)]
    Roster(#[from] RosterError),
    #[error("recognition failed: {0}")]
    Engine(#[from] rollcall_core::engine::EngineError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Enroll {
        external_id: String,
        display_name: String,
        image: RgbImage,
        old_slot: Option<u32>,
        reply: oneshot::Sender<Result<u32, WorkerError>>,
    },
    Delete {
        external_id: String,
        reply: oneshot::Sender<Result<(), WorkerError>>,
    },
    Recognize {
        image: RgbImage,
        tolerance: f32,
        reply: oneshot::Sender<Result<(RgbImage, Recognition), WorkerError>>,
    },
    Rebuild {
        reply: oneshot::Sender<Result<usize, WorkerError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub async fn enroll(
        &self,
        external_id: String,
        display_name: String,
        image: RgbImage,
        old_slot: Option<u32>,
    ) -> Result<u32, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll {
                external_id,
                display_name,
                image,
                old_slot,
                reply: reply_tx,
            })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    pub async fn delete(&self, external_id: String) -> Result<(), WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Delete { external_id, reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    /// Annotate faces in `image` against the current roster. Returns the
    /// annotated image and the resolved identity.
    pub async fn recognize(
        &self,
        image: RgbImage,
        tolerance: f32,
    ) -> Result<(RgbImage, Recognition), WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Recognize { image, tolerance, reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }

    pub async fn rebuild(&self) -> Result<usize, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Rebuild { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| WorkerError::ChannelClosed)?
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// Loads both ONNX models and the annotation font synchronously so a
/// missing asset fails startup, then enters the request loop. A missing
/// roster file is not a startup error; it fails only the operations that
/// load it.
pub fn spawn_engine(config: &Config) -> anyhow::Result<EngineHandle> {
    let mut engine = OnnxFaceEngine::load(&config.model_dir)?;
    let annotator = Annotator::load(&config.font_path)?;
    let store = RosterStore::new(config.roster_path.clone());
    let dataset_dir: PathBuf = config.dataset_dir.clone();

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(8);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll {
                        external_id,
                        display_name,
                        image,
                        old_slot,
                        reply,
                    } => {
                        let result = enroll(
                            &store,
                            &mut engine,
                            &external_id,
                            &display_name,
                            &image,
                            old_slot,
                        )
                        .map_err(WorkerError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Delete { external_id, reply } => {
                        let result = store
                            .delete_by_external_id(&external_id)
                            .map_err(WorkerError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Recognize { mut image, tolerance, reply } => {
                        let result = store
                            .load()
                            .map_err(WorkerError::from)
                            .and_then(|roster| {
                                recognizer::recognize(
                                    &mut engine,
                                    &annotator,
                                    &roster,
                                    &mut image,
                                    tolerance,
                                )
                                .map_err(WorkerError::from)
                            })
                            .map(|outcome| (image, outcome));
                        let _ = reply.send(result);
                    }
                    EngineRequest::Rebuild { reply } => {
                        let result = store
                            .rebuild_from_directory(&dataset_dir, &mut engine)
                            .map_err(WorkerError::from);
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}
