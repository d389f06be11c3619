//!
//! JSON-RPC client for the remote chain node.
//!
//! This module provides an async client for the read-only node endpoints the explorer consumes:
//! chain list, chain heights, blocks, accounts, tokens, applications and organizations.
//! The `ChainSource` trait is the seam the synchronizer is written against, so it can be
//! driven by a scripted source in tests.

use super::types::*;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Read-only view of a remote chain node.
#[async_trait::async_trait]
pub trait ChainSource: Send + Sync {
	async fn get_chains(&self) -> Result<Vec<ChainResult>, NodeError>;

	/// Current height of the chain with the given address or name.
	async fn get_block_height(&self, chain: &str) -> Result<u64, NodeError>;

	async fn get_block_by_height(
		&self,
		chain: &str,
		height: u64,
	) -> Result<Option<BlockResult>, NodeError>;

	async fn get_block_by_hash(&self, hash: &str) -> Result<Option<BlockResult>, NodeError>;

	async fn get_account(&self, address: &str) -> Result<Option<AccountResult>, NodeError>;

	async fn get_tokens(&self) -> Result<Vec<TokenResult>, NodeError>;

	async fn get_apps(&self) -> Result<Vec<AppResult>, NodeError>;

	async fn get_organization(&self, id: &str) -> Result<Option<OrganizationResult>, NodeError>;
}

/// Node JSON-RPC client
pub struct NodeRpcClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// The JSON-RPC endpoint.
	rpc_url: String,
	/// Monotonic request id.
	next_id: AtomicU64,
}

impl NodeRpcClient {
	/// Create a new node client.
	///
	/// # Arguments
	/// * `rpc_url` - The JSON-RPC endpoint of the node.
	/// * `timeout` - Per-request timeout.
	pub fn new(rpc_url: String, timeout: Duration) -> Result<Self, NodeError> {
		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			rpc_url,
			next_id: AtomicU64::new(1),
		})
	}

	/// Execute a JSON-RPC call.
	///
	/// # Returns
	/// `None` when the node answers with a null result, the decoded result otherwise.
	///
	/// # Errors
	/// Returns `NodeError` on transport failures, non-success HTTP status, JSON-RPC errors
	/// or a result that does not match `T`.
	pub async fn call<T: DeserializeOwned>(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<Option<T>, NodeError> {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed);
		let request_body = json!({
			"jsonrpc": "2.0",
			"method": method,
			"params": params,
			"id": id,
		});

		debug!("RPC {} #{} {}", method, id, request_body["params"]);

		let response = self
			.http_client
			.post(&self.rpc_url)
			.header("Content-Type", "application/json")
			.json(&request_body)
			.send()
			.await?;

		if !response.status().is_success() {
			return Err(NodeError::Status(response.status().as_u16()));
		}

		let mut response_json: serde_json::Value = response.json().await?;

		if let Some(error) = response_json.get("error").filter(|e| !e.is_null()) {
			let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
			let message = error
				.get("message")
				.and_then(|m| m.as_str())
				.map(|m| m.to_string())
				.unwrap_or_else(|| error.to_string());
			return Err(NodeError::Rpc { code, message });
		}

		match response_json.get_mut("result").map(serde_json::Value::take) {
			None | Some(serde_json::Value::Null) => Ok(None),
			Some(result) => Ok(Some(serde_json::from_value(result)?)),
		}
	}

	/// Execute a JSON-RPC call whose result must be present.
	async fn call_required<T: DeserializeOwned>(
		&self,
		method: &str,
		params: serde_json::Value,
	) -> Result<T, NodeError> {
		self.call(method, params)
			.await?
			.ok_or_else(|| NodeError::Malformed(format!("{} returned no result", method)))
	}
}

#[async_trait::async_trait]
impl ChainSource for NodeRpcClient {
	async fn get_chains(&self) -> Result<Vec<ChainResult>, NodeError> {
		self.call_required("getChains", json!([])).await
	}

	async fn get_block_height(&self, chain: &str) -> Result<u64, NodeError> {
		// Some node versions answer with a decimal string
		let height: serde_json::Value = self.call_required("getBlockHeight", json!([chain])).await?;
		match &height {
			serde_json::Value::Number(n) => n.as_u64(),
			serde_json::Value::String(s) => s.parse().ok(),
			_ => None,
		}
		.ok_or_else(|| NodeError::Malformed(format!("invalid height {}", height)))
	}

	async fn get_block_by_height(
		&self,
		chain: &str,
		height: u64,
	) -> Result<Option<BlockResult>, NodeError> {
		self.call("getBlockByHeight", json!([chain, height])).await
	}

	async fn get_block_by_hash(&self, hash: &str) -> Result<Option<BlockResult>, NodeError> {
		self.call("getBlockByHash", json!([hash])).await
	}

	async fn get_account(&self, address: &str) -> Result<Option<AccountResult>, NodeError> {
		self.call("getAccount", json!([address])).await
	}

	async fn get_tokens(&self) -> Result<Vec<TokenResult>, NodeError> {
		Ok(self.call("getTokens", json!([])).await?.unwrap_or_default())
	}

	async fn get_apps(&self) -> Result<Vec<AppResult>, NodeError> {
		Ok(self.call("getApps", json!([])).await?.unwrap_or_default())
	}

	async fn get_organization(&self, id: &str) -> Result<Option<OrganizationResult>, NodeError> {
		self.call("getOrganization", json!([id])).await
	}
}
