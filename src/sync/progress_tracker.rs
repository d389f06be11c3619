//! Progress tracking for mirror synchronization.
//!
//! This module provides the `SyncProgressTracker`, which is responsible for tracking the progress
//! of one synchronization pass. It records the heights ingested per chain, counts blocks and
//! transactions, and provides statistics and gap detection so a pass can be validated.
//!
//! The progress tracker is used by sync strategies and the orchestrator to monitor and log sync
//! progress.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

/// Blocks between two periodic progress lines.
const LOG_INTERVAL: u64 = 1000;

/// Service for tracking synchronization progress
///
/// The progress tracker records which heights have been ingested on each chain, counts blocks
/// and transactions, and reports gaps in the ingested heights.
#[derive(Debug, Clone, Default)]
pub struct SyncProgressTracker {
    /// Heights ingested during this pass, per chain address
    processed_heights: BTreeMap<String, BTreeSet<u64>>,
    /// Total blocks ingested
    blocks_processed: u64,
    /// Total transactions ingested
    transactions_processed: usize,
    /// Block count at which we last logged progress
    last_logged_blocks: u64,
}

impl SyncProgressTracker {
    /// Create a new, empty progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an ingested block and its transaction count
    pub fn record_block(&mut self, chain: &str, height: u64, transactions: usize) {
        let inserted = self
            .processed_heights
            .entry(chain.to_string())
            .or_default()
            .insert(height);
        if inserted {
            self.blocks_processed += 1;
            self.transactions_processed += transactions;
        }
    }

    /// Highest height ingested on `chain` during this pass
    pub fn highest_height(&self, chain: &str) -> Option<u64> {
        self.processed_heights
            .get(chain)
            .and_then(|heights| heights.last().copied())
    }

    /// Blocks ingested on `chain` during this pass
    pub fn blocks_for(&self, chain: &str) -> u64 {
        self.processed_heights
            .get(chain)
            .map(|heights| heights.len() as u64)
            .unwrap_or(0)
    }

    /// Check for gaps in processed heights
    ///
    /// Returns `(chain, before, after)` triples for every missing range.
    pub fn check_for_gaps(&self) -> Vec<(String, u64, u64)> {
        let mut gaps = Vec::new();

        for (chain, heights) in &self.processed_heights {
            let sorted: Vec<u64> = heights.iter().copied().collect();
            for window in sorted.windows(2) {
                if window[1] - window[0] > 1 {
                    gaps.push((chain.clone(), window[0], window[1]));
                }
            }
        }

        gaps
    }

    /// Log progress at regular intervals or when forced
    pub fn log_progress(&mut self, force: bool) {
        let blocks_since_last_log = self
            .blocks_processed
            .saturating_sub(self.last_logged_blocks);
        let should_log = force || blocks_since_last_log >= LOG_INTERVAL;

        if should_log && self.blocks_processed > 0 {
            info!(
                "Sync progress: {} blocks, {} transactions ingested across {} chains",
                self.blocks_processed,
                self.transactions_processed,
                self.processed_heights.len()
            );
            self.last_logged_blocks = self.blocks_processed;
        }
    }

    /// Get sync statistics as a SyncStats struct
    pub fn get_stats(&self) -> SyncStats {
        SyncStats {
            blocks_processed: self.blocks_processed,
            transactions_processed: self.transactions_processed,
            highest_heights: self
                .processed_heights
                .iter()
                .filter_map(|(chain, heights)| {
                    heights.last().map(|height| (chain.clone(), *height))
                })
                .collect(),
            gaps: self.check_for_gaps(),
        }
    }

    /// Validate the pass, returning an error if ingested heights are not contiguous
    pub fn validate_completion(&self) -> Result<(), String> {
        let gaps = self.check_for_gaps();
        if gaps.is_empty() {
            return Ok(());
        }

        for (chain, start, end) in &gaps {
            warn!(
                "Gap detected on {}: missing heights between {} and {}",
                chain, start, end
            );
        }
        Err(format!("Pass finished with {} gaps in ingested heights", gaps.len()))
    }
}

/// Statistics about the sync progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub blocks_processed: u64,
    pub transactions_processed: usize,
    pub highest_heights: BTreeMap<String, u64>,
    pub gaps: Vec<(String, u64, u64)>,
}

impl SyncStats {
    /// Get a human-readable summary of the sync statistics
    pub fn summary(&self) -> String {
        format!(
            "{} blocks and {} transactions on {} chains{}",
            self.blocks_processed,
            self.transactions_processed,
            self.highest_heights.len(),
            if self.gaps.is_empty() {
                String::new()
            } else {
                format!(" ({} gaps)", self.gaps.len())
            }
        )
    }
}
