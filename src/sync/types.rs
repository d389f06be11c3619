use crate::events::CodecError;
use crate::mirror::StoreError;
use crate::node::NodeError;

use serde::Serialize;
use std::collections::BTreeMap;

/// Per-chain synchronization state. `Tracking` is never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChainSyncState {
	Unsynced,
	Seeding,
	Tracking,
}

/// Outcome of one synchronization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
	/// Blocks ingested per chain address during the pass.
	pub blocks_ingested: BTreeMap<String, u64>,
	pub transactions_ingested: usize,
	/// Chains first seen during the pass.
	pub chains_discovered: Vec<String>,
}

impl SyncReport {
	pub fn total_blocks(&self) -> u64 {
		self.blocks_ingested.values().sum()
	}
}

/// Errors raised while synchronizing the mirror
#[allow(clippy::enum_variant_names)]
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Node error: {0}")]
	NodeError(#[from] NodeError),

	#[error("Store error: {0}")]
	StoreError(#[from] StoreError),

	#[error("Payload error: {0}")]
	CodecError(#[from] CodecError),

	#[error("Block {height} of chain {chain} is missing on the node")]
	MissingBlock { chain: String, height: u64 },

	#[error("Malformed block data: {0}")]
	ParseError(String),

	#[error("Sync error: {0}")]
	SyncError(String),
}
