//! Mirror Synchronization Module
//!
//! This module keeps the local mirror in step with the remote node. It is composed of several
//! submodules, each responsible for a specific aspect of the sync process:
//!
//! - `orchestrator`: `ExplorerSync` (the pass loop and per-chain state machine) and
//!   `ExplorerInitializer` (first-start seeding and checkpoint restore).
//! - `strategies`: seeding (bulk, parallel) and tracking (block by block) strategies.
//! - `ingest_service`: fetches blocks and reference data and commits them to the mirror.
//! - `block_processor`: converts node responses into mirror rows and transaction summaries.
//! - `parallel`: bounded-parallel request batching.
//! - `events`: sync events and the handler dispatcher.
//! - `progress_tracker`: per-pass progress, statistics and gap detection.
//! - `state_persistence`: checkpoint save/restore and the checkpoint event handler.

/// Node response to mirror row conversion
pub mod block_processor;
/// Event system for decoupled communication during sync
pub mod events;
/// Fetches and commits blocks and reference data
pub mod ingest_service;
/// Main coordinator for the sync process
pub mod orchestrator;
/// Bounded-parallel requests
pub mod parallel;
/// Tracks synchronization progress and statistics
pub mod progress_tracker;
/// Checkpoint persistence
pub mod state_persistence;
/// Pluggable synchronization strategies
pub mod strategies;
#[cfg(test)]
pub(crate) mod testing;
/// Errors, states and reports
pub mod types;

pub use events::{EventDispatcher, LoggingEventHandler, SyncEvent, SyncEventHandler};
pub use orchestrator::{ExplorerInitializer, ExplorerSync, InitReport, SyncConfig};
pub use parallel::{DEFAULT_PARALLEL_WINDOW, do_parallel_requests};
pub use state_persistence::{CheckpointConfig, CheckpointEventHandler, StatePersistenceService};
pub use types::{ChainSyncState, SyncError, SyncReport};
