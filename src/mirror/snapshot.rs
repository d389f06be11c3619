use super::store::{MirrorState, StoreError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CHECKPOINT_PREFIX: &str = "mirror_checkpoint_";
const BODY_SUFFIX: &str = ".bin";
const META_SUFFIX: &str = ".meta.json";

/// Metadata written next to every checkpoint body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotMetadata {
	/// Total number of mirrored blocks; also the checkpoint sequence number.
	pub block_count: u64,
	/// Mirrored height per chain address.
	pub heights: BTreeMap<String, u64>,
	pub timestamp: String,
}

/// Repository for mirror checkpoints
#[async_trait::async_trait]
pub trait SnapshotRepository: Send + Sync {
	async fn save(&self, state: &MirrorState, block_count: u64) -> Result<(), StoreError>;
	async fn find_latest(&self) -> Result<Option<(PathBuf, u64)>, StoreError>;
	async fn load(&self, path: &Path) -> Result<(MirrorState, SnapshotMetadata), StoreError>;
	async fn cleanup_old(&self, keep_count: usize) -> Result<(), StoreError>;
}

/// File-based implementation of SnapshotRepository
pub struct FileSnapshotRepository {
	data_dir: PathBuf,
}

impl FileSnapshotRepository {
	pub fn new(data_dir: PathBuf) -> Self {
		Self { data_dir }
	}

	fn body_filename(&self, block_count: u64) -> PathBuf {
		self.data_dir
			.join(format!("{}{}{}", CHECKPOINT_PREFIX, block_count, BODY_SUFFIX))
	}

	fn metadata_filename(body: &Path) -> PathBuf {
		let name = body
			.file_name()
			.and_then(|f| f.to_str())
			.and_then(|f| f.strip_suffix(BODY_SUFFIX))
			.unwrap_or_default();
		body.with_file_name(format!("{}{}", name, META_SUFFIX))
	}

	fn parse_block_count(path: &Path) -> Option<u64> {
		path.file_name()
			.and_then(|f| f.to_str())
			.and_then(|f| f.strip_prefix(CHECKPOINT_PREFIX))
			.and_then(|s| s.strip_suffix(BODY_SUFFIX))
			.and_then(|s| s.parse::<u64>().ok())
	}

	async fn list_checkpoints(&self) -> Result<Vec<(PathBuf, u64)>, StoreError> {
		let mut checkpoints = Vec::new();
		let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(checkpoints),
			Err(e) => return Err(e.into()),
		};

		while let Some(entry) = entries.next_entry().await? {
			let path = entry.path();
			if let Some(count) = Self::parse_block_count(&path) {
				checkpoints.push((path, count));
			}
		}

		Ok(checkpoints)
	}
}

#[async_trait::async_trait]
impl SnapshotRepository for FileSnapshotRepository {
	async fn save(&self, state: &MirrorState, block_count: u64) -> Result<(), StoreError> {
		tokio::fs::create_dir_all(&self.data_dir).await?;

		let body = self.body_filename(block_count);
		let metadata = SnapshotMetadata {
			block_count,
			heights: state.heights(),
			timestamp: chrono::Utc::now().to_rfc3339(),
		};

		let state_bytes = bincode::serialize(state)?;
		// Body first: a checkpoint is only discoverable once its body is complete
		let partial = body.with_extension("partial");
		tokio::fs::write(&partial, &state_bytes).await?;
		tokio::fs::write(
			Self::metadata_filename(&body),
			serde_json::to_string_pretty(&metadata)?,
		)
		.await?;
		tokio::fs::rename(&partial, &body).await?;

		info!(
			"Saved mirror checkpoint to {:?} ({} blocks, {} bytes)",
			body,
			block_count,
			state_bytes.len()
		);
		Ok(())
	}

	async fn find_latest(&self) -> Result<Option<(PathBuf, u64)>, StoreError> {
		Ok(self
			.list_checkpoints()
			.await?
			.into_iter()
			.max_by_key(|(_, count)| *count))
	}

	async fn load(&self, path: &Path) -> Result<(MirrorState, SnapshotMetadata), StoreError> {
		let state_bytes = tokio::fs::read(path).await?;
		let state: MirrorState = bincode::deserialize(&state_bytes)?;

		let metadata = match tokio::fs::read_to_string(Self::metadata_filename(path)).await {
			Ok(content) => serde_json::from_str(&content)?,
			Err(e) => {
				warn!("Checkpoint metadata for {:?} unreadable: {}", path, e);
				let block_count = Self::parse_block_count(path).ok_or_else(|| {
					StoreError::SnapshotError("Invalid checkpoint filename format".to_string())
				})?;
				SnapshotMetadata {
					block_count,
					heights: state.heights(),
					timestamp: String::new(),
				}
			}
		};

		info!(
			"Loaded mirror checkpoint {:?} at {} blocks",
			path, metadata.block_count
		);
		Ok((state, metadata))
	}

	async fn cleanup_old(&self, keep_count: usize) -> Result<(), StoreError> {
		let mut checkpoints = self.list_checkpoints().await?;
		if checkpoints.len() <= keep_count {
			return Ok(());
		}

		checkpoints.sort_by_key(|(_, count)| std::cmp::Reverse(*count));

		for (path, _) in checkpoints.into_iter().skip(keep_count) {
			for file in [Self::metadata_filename(&path), path] {
				if let Err(e) = tokio::fs::remove_file(&file).await {
					warn!("Failed to remove old checkpoint file {:?}: {}", file, e);
				}
			}
		}

		Ok(())
	}
}
