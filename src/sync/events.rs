//! Event system for mirror synchronization.
//!
//! This module defines the event types, the event handler trait and the event dispatcher used
//! throughout a synchronization pass. Strategies and the orchestrator emit events; registered
//! handlers react to them (logging, checkpointing) without the sync logic knowing about them.

use super::types::{SyncError, SyncReport};

use tracing::{debug, info, warn};

/// Events that occur during synchronization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A chain appeared on the node for the first time
    ChainDiscovered { address: String, name: String },
    /// A block committed to the mirror
    BlockIngested {
        chain: String,
        height: u64,
        transactions: usize,
    },
    /// A chain finished its historical seeding and is now tracked block by block
    ChainSeeded { chain: String, height: u64 },
    /// A pass finished
    PassCompleted { report: SyncReport },
    /// A pass failed; the next one starts after the usual delay
    PassFailed { error: String },
}

/// Trait for handling sync events.
///
/// Implementors receive all sync events and can perform side effects or state updates.
#[async_trait::async_trait]
pub trait SyncEventHandler: Send + Sync {
    /// Handle a sync event.
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError>;

    /// Get the name of this handler for logging and diagnostics.
    fn name(&self) -> &'static str;
}

/// Event dispatcher that manages multiple event handlers.
///
/// Handlers are called in the order they are registered.
#[derive(Default)]
pub struct EventDispatcher {
    handlers: Vec<Box<dyn SyncEventHandler>>,
}

impl EventDispatcher {
    /// Create a new, empty event dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new event handler.
    pub fn register_handler(&mut self, handler: Box<dyn SyncEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Dispatch an event to all registered handlers.
    ///
    /// Errors from handlers are logged, but do not stop other handlers from running.
    pub async fn dispatch(&mut self, event: &SyncEvent) {
        for handler in &mut self.handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::error!("Handler {} failed to process event: {}", handler.name(), e);
            }
        }
    }
}

/// Writes sync events to the log.
pub struct LoggingEventHandler;

#[async_trait::async_trait]
impl SyncEventHandler for LoggingEventHandler {
    async fn handle(&mut self, event: &SyncEvent) -> Result<(), SyncError> {
        match event {
            SyncEvent::ChainDiscovered { address, name } => {
                info!("Discovered chain {} ({})", name, address);
            }
            SyncEvent::BlockIngested {
                chain,
                height,
                transactions,
            } => {
                debug!(
                    "Ingested block {} of {} with {} transactions",
                    height, chain, transactions
                );
            }
            SyncEvent::ChainSeeded { chain, height } => {
                info!("Chain {} seeded up to height {}, now tracking", chain, height);
            }
            SyncEvent::PassCompleted { report } => {
                if report.total_blocks() > 0 {
                    info!(
                        "Sync pass ingested {} blocks and {} transactions",
                        report.total_blocks(),
                        report.transactions_ingested
                    );
                }
            }
            SyncEvent::PassFailed { error } => {
                warn!("Sync pass failed: {}", error);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "LoggingEventHandler"
    }
}
