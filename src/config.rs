//! Configuration for the explorer

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix of every environment variable read by `ExplorerConfig::from_env`.
pub const ENV_PREFIX: &str = "EXPLORER_";

/// Explorer configuration, read from `EXPLORER_*` environment variables
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ExplorerConfig {
	/// JSON-RPC endpoint of the node
	#[serde(default = "default_node_url")]
	pub node_url: String,

	/// Address the JSON API listens on
	#[serde(default = "default_listen_addr")]
	pub listen_addr: SocketAddr,

	/// Items per page in paginated listings
	#[serde(default = "default_page_size")]
	pub page_size: usize,

	/// Delay between two sync passes in seconds
	#[serde(default = "default_sync_interval")]
	pub sync_interval_secs: u64,

	/// Concurrent requests while seeding
	#[serde(default = "default_parallel_window")]
	pub parallel_window: usize,

	/// Blocks committed per seeding chunk
	#[serde(default = "default_seed_chunk_size")]
	pub seed_chunk_size: u64,

	/// Directory for mirror checkpoints
	#[serde(default = "default_data_dir")]
	pub data_dir: PathBuf,

	/// Save a checkpoint every N ingested blocks
	#[serde(default = "default_checkpoint_interval")]
	pub checkpoint_interval: u64,

	/// Checkpoints kept on disk
	#[serde(default = "default_checkpoint_keep")]
	pub checkpoint_keep: usize,

	/// Token ranked by the rich list when none is given
	#[serde(default = "default_native_token")]
	pub native_token: String,

	/// Per-request timeout towards the node in seconds
	#[serde(default = "default_request_timeout")]
	pub request_timeout_secs: u64,
}

impl ExplorerConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, envy::Error> {
		envy::prefixed(ENV_PREFIX).from_env()
	}

	pub fn sync_interval(&self) -> Duration {
		Duration::from_secs(self.sync_interval_secs)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_secs(self.request_timeout_secs)
	}
}

impl Default for ExplorerConfig {
	fn default() -> Self {
		Self {
			node_url: default_node_url(),
			listen_addr: default_listen_addr(),
			page_size: default_page_size(),
			sync_interval_secs: default_sync_interval(),
			parallel_window: default_parallel_window(),
			seed_chunk_size: default_seed_chunk_size(),
			data_dir: default_data_dir(),
			checkpoint_interval: default_checkpoint_interval(),
			checkpoint_keep: default_checkpoint_keep(),
			native_token: default_native_token(),
			request_timeout_secs: default_request_timeout(),
		}
	}
}

fn default_node_url() -> String {
	"http://localhost:7077/rpc".to_string()
}

fn default_listen_addr() -> SocketAddr {
	SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_page_size() -> usize {
	20
}

fn default_sync_interval() -> u64 {
	2
}

fn default_parallel_window() -> usize {
	16
}

fn default_seed_chunk_size() -> u64 {
	256
}

fn default_data_dir() -> PathBuf {
	PathBuf::from("./data")
}

fn default_checkpoint_interval() -> u64 {
	1000
}

fn default_checkpoint_keep() -> usize {
	2
}

fn default_native_token() -> String {
	"SOUL".to_string()
}

fn default_request_timeout() -> u64 {
	30
}
