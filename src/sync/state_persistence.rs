//! State persistence service for mirror synchronization.
//!
//! This module provides the `StatePersistenceService`, which saves the mirror as checkpoints and
//! restores the newest one on startup. It uses the `SnapshotRepository` trait to abstract the
//! file layout, enabling resumable synchronization.
//!
//! `CheckpointEventHandler` drives the service from sync events: a checkpoint is written every
//! `CheckpointConfig::interval` ingested blocks and at the end of every pass that ingested
//! something.

use super::events::{SyncEvent, SyncEventHandler};
use super::types::SyncError;
use crate::mirror::{FileSnapshotRepository, MirrorStore, SnapshotRepository};

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Service for managing state persistence operations.
pub struct StatePersistenceService {
    snapshot_repo: Box<dyn SnapshotRepository>,
}

impl StatePersistenceService {
    /// Create a new state persistence service for the given data directory.
    pub fn new(data_dir: PathBuf) -> Self {
        Self::with_repository(Box::new(FileSnapshotRepository::new(data_dir)))
    }

    pub fn with_repository(snapshot_repo: Box<dyn SnapshotRepository>) -> Self {
        Self { snapshot_repo }
    }

    /// Save a checkpoint of the whole mirror, returning the block count it was saved at.
    pub async fn save_checkpoint(&self, store: &dyn MirrorStore) -> Result<u64, SyncError> {
        let block_count = store.block_count(None)? as u64;
        let state = store.export_state()?;
        self.snapshot_repo.save(&state, block_count).await?;
        Ok(block_count)
    }

    /// Load the latest checkpoint into `store`, returning its block count if one was found.
    pub async fn restore_latest(&self, store: &dyn MirrorStore) -> Result<Option<u64>, SyncError> {
        let Some((path, _)) = self.snapshot_repo.find_latest().await? else {
            return Ok(None);
        };

        let (state, metadata) = self.snapshot_repo.load(&path).await?;
        store.import_state(state)?;
        for (chain, height) in &metadata.heights {
            info!("Restored chain {} at height {}", chain, height);
        }
        Ok(Some(metadata.block_count))
    }

    /// Clean up old checkpoints, keeping only the most recent N.
    pub async fn cleanup_checkpoints(&self, keep_count: usize) -> Result<(), SyncError> {
        Ok(self.snapshot_repo.cleanup_old(keep_count).await?)
    }
}

/// Configuration for checkpoint saving.
///
/// This struct controls how often checkpoints are saved and how many are retained.
#[derive(Debug, Clone)]
pub struct CheckpointConfig {
    /// Save checkpoint every N blocks.
    pub interval: u64,
    /// Number of checkpoints to keep.
    pub keep_count: usize,
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 1000,
            keep_count: 2,
        }
    }
}

/// Writes checkpoints in response to sync events.
pub struct CheckpointEventHandler {
    persistence: Arc<StatePersistenceService>,
    store: Arc<dyn MirrorStore>,
    config: CheckpointConfig,
    blocks_since_checkpoint: u64,
}

impl CheckpointEventHandler {
    pub fn new(
        persistence: Arc<StatePersistenceService>,
        store: Arc<dyn MirrorStore>,
        config: CheckpointConfig,
    ) -> Self {
        Self {
            persistence,
            store,
            config,
            blocks_since_checkpoint: 0,
        }
    }

    async fn checkpoint(&mut self) -> Result<(), SyncError> {
        self.blocks_since_checkpoint = 0;
        self.persistence.save_checkpoint(self.store.as_ref()).await?;
        self.persistence
            .cleanup_checkpoints(self.config.keep_count)
            .await
    }
}

#[async_trait::async_trait]
impl SyncEventHandler for CheckpointEventHandler {
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError> {
        match event {
            SyncEvent::BlockIngested { .. } => {
                self.blocks_since_checkpoint += 1;
                if self.blocks_since_checkpoint >= self.config.interval.max(1) {
                    self.checkpoint().await?;
                }
            }
            SyncEvent::PassCompleted { .. } if self.blocks_since_checkpoint > 0 => {
                self.checkpoint().await?;
            }
            _ => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "CheckpointEventHandler"
    }
}
