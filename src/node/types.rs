//! Types for the node JSON-RPC integration

use serde::{Deserialize, Serialize};

/// Chain entry as returned by `getChains`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainResult {
	pub name: String,
	pub address: String,
	/// Parent chain name, empty for the root chain.
	#[serde(default)]
	pub parent: String,
	pub height: u64,
	#[serde(default)]
	pub contracts: Vec<String>,
}

/// Event as embedded in a transaction result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventResult {
	pub address: String,
	pub contract: String,
	pub kind: String,
	/// Hex encoded event payload.
	#[serde(default)]
	pub data: String,
}

/// Transaction as embedded in a block result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
	pub hash: String,
	#[serde(default)]
	pub chain_address: String,
	pub timestamp: i64,
	#[serde(default)]
	pub block_height: u64,
	#[serde(default)]
	pub block_hash: String,
	/// Hex encoded script.
	#[serde(default)]
	pub script: String,
	/// Hex encoded payload.
	#[serde(default)]
	pub payload: String,
	#[serde(default)]
	pub events: Vec<EventResult>,
	#[serde(default)]
	pub result: String,
	#[serde(default)]
	pub fee: String,
}

/// Block as returned by `getBlockByHeight` / `getBlockByHash`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockResult {
	pub hash: String,
	#[serde(default)]
	pub previous_hash: String,
	pub timestamp: i64,
	pub height: u64,
	pub chain_address: String,
	#[serde(default)]
	pub protocol: u32,
	#[serde(default)]
	pub validator_address: String,
	#[serde(default)]
	pub reward: String,
	/// Hex encoded block payload.
	#[serde(default)]
	pub payload: String,
	#[serde(default)]
	pub txs: Vec<TransactionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakeResult {
	pub amount: String,
	#[serde(default)]
	pub time: i64,
	#[serde(default)]
	pub unclaimed: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceResult {
	pub chain: String,
	pub amount: String,
	pub symbol: String,
	#[serde(default)]
	pub decimals: u32,
	/// Token ids for non-fungible balances.
	#[serde(default)]
	pub ids: Vec<String>,
}

/// Account as returned by `getAccount`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountResult {
	pub address: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub stakes: Option<StakeResult>,
	#[serde(default)]
	pub balances: Vec<BalanceResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPropertyResult {
	pub key: String,
	pub value: String,
}

/// Token as returned by `getTokens`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
	pub symbol: String,
	pub name: String,
	pub decimals: u32,
	#[serde(default)]
	pub current_supply: String,
	#[serde(default)]
	pub max_supply: String,
	/// Comma separated flag names, e.g. `"Transferable, Fungible, Finite"`.
	#[serde(default)]
	pub flags: String,
	#[serde(default)]
	pub metadata: Vec<TokenPropertyResult>,
}

/// Application registry entry as returned by `getApps`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppResult {
	pub id: String,
	pub title: String,
	pub url: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub icon: String,
}

/// Organization as returned by `getOrganization`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationResult {
	pub id: String,
	pub name: String,
	#[serde(default)]
	pub members: Vec<String>,
}

/// Parse a decimal amount string as sent by the node. Empty strings count as zero.
pub fn parse_amount(raw: &str) -> Result<u128, NodeError> {
	let trimmed = raw.trim();
	if trimmed.is_empty() {
		return Ok(0);
	}
	trimmed
		.parse::<u128>()
		.map_err(|e| NodeError::Malformed(format!("invalid amount {:?}: {}", raw, e)))
}

/// Decode a hex field as sent by the node. Empty strings decode to no bytes.
pub fn decode_hex_field(raw: &str) -> Result<Vec<u8>, NodeError> {
	let digits = raw.strip_prefix("0x").unwrap_or(raw);
	hex::decode(digits)
		.map_err(|e| NodeError::Malformed(format!("invalid hex field: {}", e)))
}

/// Error types for node requests
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
	#[error("RPC error {code}: {message}")]
	Rpc { code: i64, message: String },

	#[error("HTTP error: {0}")]
	HttpError(#[from] reqwest::Error),

	#[error("HTTP status: {0}")]
	Status(u16),

	#[error("JSON parse error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Malformed response: {0}")]
	Malformed(String),
}
