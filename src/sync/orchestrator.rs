//! Mirror sync orchestrator.
//!
//! This module defines `ExplorerSync`, which keeps the mirror in step with the node. Each pass
//! refreshes the chain list, asks the node for every chain's height and hands the chain to the
//! strategy matching its state:
//!
//! - `Unsynced`/`Seeding` chains catch up on history with `SeedingSync` (parallel fetch, in-order
//!   commit) and move to `Tracking` once caught up.
//! - `Tracking` chains follow the tip block by block with `TrackingSync`.
//!
//! `run` repeats passes forever with a fixed delay. A failed pass is logged and dispatched as
//! `SyncEvent::PassFailed`; the next pass starts from whatever the mirror already holds.
//!
//! `ExplorerInitializer` seeds reference data and restores the newest checkpoint before the first
//! pass.

use crate::mirror::MirrorStore;
use crate::node::ChainSource;
use crate::sync::{
    events::{EventDispatcher, SyncEvent, SyncEventHandler},
    ingest_service::BlockIngestService,
    parallel::DEFAULT_PARALLEL_WINDOW,
    progress_tracker::SyncProgressTracker,
    state_persistence::StatePersistenceService,
    strategies::{SeedingConfig, SeedingSync, SyncStrategy, TrackingSync},
    types::{ChainSyncState, SyncError, SyncReport},
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration of the synchronizer loop
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between two passes
    pub interval: Duration,
    /// Requests in flight at once
    pub window: usize,
    /// Blocks per seeding chunk
    pub seed_chunk_size: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            window: DEFAULT_PARALLEL_WINDOW,
            seed_chunk_size: 256,
        }
    }
}

/// Main sync orchestrator that coordinates all sync components.
pub struct ExplorerSync {
    ingest: BlockIngestService,

    // Sync strategies
    seeding: Box<dyn SyncStrategy>,
    tracking: Box<dyn SyncStrategy>,

    states: HashMap<String, ChainSyncState>,
    dispatcher: EventDispatcher,
    config: SyncConfig,
}

impl ExplorerSync {
    pub fn new(
        source: Arc<dyn ChainSource>,
        store: Arc<dyn MirrorStore>,
        config: SyncConfig,
    ) -> Self {
        let ingest = BlockIngestService::new(source, store, config.window);
        let seeding = SeedingSync::new(
            ingest.clone(),
            SeedingConfig {
                window: config.window,
                chunk_size: config.seed_chunk_size,
            },
        );
        let tracking = TrackingSync::new(ingest.clone());

        Self {
            ingest,
            seeding: Box::new(seeding),
            tracking: Box::new(tracking),
            states: HashMap::new(),
            dispatcher: EventDispatcher::new(),
            config,
        }
    }

    /// Register an event handler; handlers run in registration order.
    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.dispatcher.register_handler(handler);
    }

    /// State of a chain, or `None` if no pass has seen it yet.
    pub fn chain_state(&self, address: &str) -> Option<ChainSyncState> {
        self.states.get(address).copied()
    }

    /// Run one synchronization pass.
    pub async fn sync_once(&mut self) -> Result<SyncReport, SyncError> {
        let mut tracker = SyncProgressTracker::new();

        match self.run_pass(&mut tracker).await {
            Ok(report) => {
                tracker.log_progress(true);
                self.dispatcher
                    .dispatch(&SyncEvent::PassCompleted {
                        report: report.clone(),
                    })
                    .await;
                Ok(report)
            }
            Err(e) => {
                self.dispatcher
                    .dispatch(&SyncEvent::PassFailed {
                        error: e.to_string(),
                    })
                    .await;
                Err(e)
            }
        }
    }

    async fn run_pass(&mut self, tracker: &mut SyncProgressTracker) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();

        for chain in self.ingest.refresh_chains().await? {
            self.states
                .insert(chain.address.clone(), ChainSyncState::Unsynced);
            self.dispatcher
                .dispatch(&SyncEvent::ChainDiscovered {
                    address: chain.address.clone(),
                    name: chain.name.clone(),
                })
                .await;
            report.chains_discovered.push(chain.address);
        }

        for chain in self.ingest.store().chains()? {
            let address = chain.address.clone();
            let state = *self
                .states
                .entry(address.clone())
                .or_insert(ChainSyncState::Unsynced);
            let remote_height = self.ingest.remote_height(&address).await?;

            if remote_height < chain.height {
                warn!(
                    "Node reports height {} for {} below mirrored height {}",
                    remote_height, chain.name, chain.height
                );
                continue;
            }

            let committed = match state {
                ChainSyncState::Unsynced | ChainSyncState::Seeding => {
                    self.states.insert(address.clone(), ChainSyncState::Seeding);
                    let committed = self
                        .seeding
                        .sync_chain(&chain, remote_height, &mut self.dispatcher, tracker)
                        .await?;

                    self.states.insert(address.clone(), ChainSyncState::Tracking);
                    let height = self
                        .ingest
                        .store()
                        .chain(&address)?
                        .map(|c| c.height)
                        .unwrap_or(chain.height);
                    self.dispatcher
                        .dispatch(&SyncEvent::ChainSeeded {
                            chain: address.clone(),
                            height,
                        })
                        .await;
                    committed
                }
                ChainSyncState::Tracking => {
                    self.tracking
                        .sync_chain(&chain, remote_height, &mut self.dispatcher, tracker)
                        .await?
                }
            };

            if committed > 0 {
                report.blocks_ingested.insert(address, committed);
            }
        }

        tracker.validate_completion().map_err(SyncError::SyncError)?;
        report.transactions_ingested = tracker.get_stats().transactions_processed;
        Ok(report)
    }

    /// Run passes forever, `SyncConfig::interval` apart.
    pub async fn run(mut self) {
        info!(
            "Starting synchronizer (interval {:?}, window {})",
            self.config.interval, self.config.window
        );

        loop {
            match self.sync_once().await {
                Ok(report) => debug!("Sync pass done: {} blocks", report.total_blocks()),
                Err(e) => error!("Sync pass failed: {}", e),
            }
            tokio::time::sleep(self.config.interval).await;
        }
    }
}

/// Result of the first-start seeding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    /// Block count of the restored checkpoint, if any
    pub restored_blocks: Option<u64>,
    pub chains_discovered: usize,
    pub tokens: usize,
    pub apps: usize,
}

/// Seeds reference data and restores the newest checkpoint.
pub struct ExplorerInitializer {
    ingest: BlockIngestService,
    persistence: Option<Arc<StatePersistenceService>>,
}

impl ExplorerInitializer {
    pub fn new(source: Arc<dyn ChainSource>, store: Arc<dyn MirrorStore>) -> Self {
        Self {
            ingest: BlockIngestService::new(source, store, DEFAULT_PARALLEL_WINDOW),
            persistence: None,
        }
    }

    pub fn with_persistence(mut self, persistence: Arc<StatePersistenceService>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Restore the newest checkpoint, then mirror chains, tokens and applications.
    ///
    /// An unreadable checkpoint is logged and the mirror starts empty. Node failures are
    /// returned; callers treat them as fatal.
    pub async fn initialize(&self) -> Result<InitReport, SyncError> {
        let mut report = InitReport::default();

        if let Some(persistence) = &self.persistence {
            match persistence.restore_latest(self.ingest.store().as_ref()).await {
                Ok(Some(blocks)) => {
                    info!("Restored mirror checkpoint with {} blocks", blocks);
                    report.restored_blocks = Some(blocks);
                }
                Ok(None) => info!("No mirror checkpoint found, starting from an empty mirror"),
                Err(e) => warn!("Ignoring unreadable mirror checkpoint: {}", e),
            }
        }

        report.chains_discovered = self.ingest.refresh_chains().await?.len();
        report.tokens = self.ingest.refresh_tokens().await?;
        report.apps = self.ingest.refresh_apps().await?;

        info!(
            "Initialized mirror: {} new chains, {} tokens, {} apps",
            report.chains_discovered, report.tokens, report.apps
        );
        Ok(report)
    }
}
