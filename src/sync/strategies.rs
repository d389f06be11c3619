use crate::mirror::Chain;
use crate::node::BlockResult;
use crate::sync::events::{EventDispatcher, SyncEvent};
use crate::sync::ingest_service::{BlockIngestService, IngestOutcome};
use crate::sync::parallel::{DEFAULT_PARALLEL_WINDOW, do_parallel_requests};
use crate::sync::progress_tracker::SyncProgressTracker;
use crate::sync::types::SyncError;
use tracing::{debug, info};

/// Trait for different synchronization strategies
#[async_trait::async_trait]
pub trait SyncStrategy: Send + Sync {
	/// Bring `chain` from its mirrored height up to `remote_height`.
	///
	/// Returns the number of blocks committed.
	async fn sync_chain(
		&self,
		chain: &Chain,
		remote_height: u64,
		event_dispatcher: &mut EventDispatcher,
		progress_tracker: &mut SyncProgressTracker,
	) -> Result<u64, SyncError>;

	/// Get the name of this strategy
	fn name(&self) -> &'static str;
}

/// Configuration for the seeding strategy
#[derive(Debug, Clone)]
pub struct SeedingConfig {
	/// Requests in flight at once
	pub window: usize,
	/// Blocks fetched before a chunk is committed
	pub chunk_size: u64,
}

impl Default for SeedingConfig {
	fn default() -> Self {
		Self {
			window: DEFAULT_PARALLEL_WINDOW,
			chunk_size: 256,
		}
	}
}

async fn commit_block(
	ingest: &BlockIngestService,
	chain: &Chain,
	block: &BlockResult,
	event_dispatcher: &mut EventDispatcher,
	progress_tracker: &mut SyncProgressTracker,
) -> Result<IngestOutcome, SyncError> {
	let outcome = ingest.ingest(block).await?;
	if outcome.applied {
		progress_tracker.record_block(&chain.address, block.height, outcome.transactions);
		event_dispatcher
			.dispatch(&SyncEvent::BlockIngested {
				chain: chain.address.clone(),
				height: block.height,
				transactions: outcome.transactions,
			})
			.await;
	}
	Ok(outcome)
}

/// Strategy for catching up on history: parallel fetch, in-order commit
pub struct SeedingSync {
	ingest: BlockIngestService,
	config: SeedingConfig,
}

impl SeedingSync {
	pub fn new(ingest: BlockIngestService, config: SeedingConfig) -> Self {
		Self { ingest, config }
	}
}

#[async_trait::async_trait]
impl SyncStrategy for SeedingSync {
	async fn sync_chain(
		&self,
		chain: &Chain,
		remote_height: u64,
		event_dispatcher: &mut EventDispatcher,
		progress_tracker: &mut SyncProgressTracker,
	) -> Result<u64, SyncError> {
		if remote_height <= chain.height {
			return Ok(0);
		}

		info!(
			"Seeding {} from height {} to {}",
			chain.name,
			chain.height + 1,
			remote_height
		);

		let chunk_size = self.config.chunk_size.max(1);
		let mut next = chain.height + 1;
		let mut committed = 0;

		while next <= remote_height {
			let start = next;
			let count = chunk_size.min(remote_height - start + 1);
			let description = format!("{} blocks {}..={}", chain.name, start, start + count - 1);

			let ingest = &self.ingest;
			let address = chain.address.as_str();
			let blocks = do_parallel_requests(
				&description,
				count as usize,
				self.config.window,
				move |i| ingest.fetch_block(address, start + i as u64),
			)
			.await?;

			for block in &blocks {
				let outcome =
					commit_block(ingest, chain, block, event_dispatcher, progress_tracker).await?;
				if outcome.applied {
					committed += 1;
				}
			}

			next = start + count;
			progress_tracker.log_progress(false);
		}

		Ok(committed)
	}

	fn name(&self) -> &'static str {
		"SeedingSync"
	}
}

/// Strategy for following the tip one block at a time
pub struct TrackingSync {
	ingest: BlockIngestService,
}

impl TrackingSync {
	pub fn new(ingest: BlockIngestService) -> Self {
		Self { ingest }
	}
}

#[async_trait::async_trait]
impl SyncStrategy for TrackingSync {
	async fn sync_chain(
		&self,
		chain: &Chain,
		remote_height: u64,
		event_dispatcher: &mut EventDispatcher,
		progress_tracker: &mut SyncProgressTracker,
	) -> Result<u64, SyncError> {
		let mut height = chain.height;
		let mut committed = 0;

		while height < remote_height {
			let block = self.ingest.fetch_block(&chain.address, height + 1).await?;
			debug!("Tracking {}: block {}", chain.name, block.height);
			let outcome =
				commit_block(&self.ingest, chain, &block, event_dispatcher, progress_tracker)
					.await?;
			if outcome.applied {
				committed += 1;
			}
			height += 1;
		}

		Ok(committed)
	}

	fn name(&self) -> &'static str {
		"TrackingSync"
	}
}
