//! Entities held by the local mirror.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One ledger tracked by the explorer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chain {
	pub address: String,
	pub name: String,
	pub parent_address: Option<String>,
	/// Last mirrored height, 0 while no block is mirrored.
	pub height: u64,
	pub contracts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
	pub hash: String,
	pub chain_address: String,
	pub previous_hash: String,
	pub height: u64,
	pub timestamp: DateTime<Utc>,
	pub validator_address: String,
	pub reward: u128,
	pub payload: Vec<u8>,
	pub transaction_hashes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
	pub hash: String,
	pub block_hash: String,
	pub chain_address: String,
	pub block_height: u64,
	pub script: Vec<u8>,
	pub result: String,
	pub timestamp: DateTime<Utc>,
	pub events: Vec<Event>,
	pub summary: TransactionSummary,
}

impl Transaction {
	/// Every address mentioned by one of the transaction's events.
	pub fn participants(&self) -> BTreeSet<String> {
		self.events
			.iter()
			.filter(|e| !e.address.is_empty())
			.map(|e| e.address.clone())
			.collect()
	}
}

/// Description computed once when the transaction is ingested.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionSummary {
	pub description: String,
	pub transfer: Option<Transfer>,
	/// Fee paid in the fuel token, summed over all payers.
	pub fee: u128,
	/// Symbols of tokens moved by the transaction's events.
	pub token_symbols: BTreeSet<String>,
}

/// A matched send/receive pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transfer {
	pub amount: u128,
	pub symbol: String,
	pub sender: String,
	pub receiver: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
	pub kind: EventKind,
	pub contract: String,
	pub address: String,
	pub data: Vec<u8>,
}

/// Kind tag of a node event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
	ChainCreate,
	TokenCreate,
	TokenSend,
	TokenReceive,
	TokenMint,
	TokenBurn,
	TokenStake,
	TokenClaim,
	TokenEscrow,
	AddressRegister,
	AddressLink,
	AddressUnlink,
	OrganizationCreate,
	OrganizationAdd,
	OrganizationRemove,
	GasEscrow,
	GasPayment,
	PlatformCreate,
	ValidatorPropose,
	ValidatorElect,
	ValidatorRemove,
	ContractDeploy,
	Unknown(String),
}

impl EventKind {
	pub fn parse(kind: &str) -> Self {
		match kind {
			"ChainCreate" => EventKind::ChainCreate,
			"TokenCreate" => EventKind::TokenCreate,
			"TokenSend" => EventKind::TokenSend,
			"TokenReceive" => EventKind::TokenReceive,
			"TokenMint" => EventKind::TokenMint,
			"TokenBurn" => EventKind::TokenBurn,
			"TokenStake" => EventKind::TokenStake,
			"TokenClaim" => EventKind::TokenClaim,
			"TokenEscrow" => EventKind::TokenEscrow,
			"AddressRegister" => EventKind::AddressRegister,
			"AddressLink" => EventKind::AddressLink,
			"AddressUnlink" => EventKind::AddressUnlink,
			"OrganizationCreate" => EventKind::OrganizationCreate,
			"OrganizationAdd" => EventKind::OrganizationAdd,
			"OrganizationRemove" => EventKind::OrganizationRemove,
			"GasEscrow" => EventKind::GasEscrow,
			"GasPayment" => EventKind::GasPayment,
			"PlatformCreate" => EventKind::PlatformCreate,
			"ValidatorPropose" => EventKind::ValidatorPropose,
			"ValidatorElect" => EventKind::ValidatorElect,
			"ValidatorRemove" => EventKind::ValidatorRemove,
			"ContractDeploy" => EventKind::ContractDeploy,
			other => EventKind::Unknown(other.to_string()),
		}
	}

	/// Events whose payload is a token amount.
	pub fn is_token_movement(&self) -> bool {
		matches!(
			self,
			EventKind::TokenSend
				| EventKind::TokenReceive
				| EventKind::TokenMint
				| EventKind::TokenBurn
				| EventKind::TokenStake
				| EventKind::TokenClaim
				| EventKind::TokenEscrow
		)
	}

	pub fn is_gas(&self) -> bool {
		matches!(self, EventKind::GasEscrow | EventKind::GasPayment)
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EventKind::Unknown(kind) => write!(f, "{}", kind),
			other => write!(f, "{:?}", other),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FungibleBalance {
	pub symbol: String,
	pub chain: String,
	pub amount: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NftHolding {
	pub symbol: String,
	pub token_id: String,
	pub chain: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
	pub address: String,
	pub name: Option<String>,
	pub staked: u128,
	pub balances: Vec<FungibleBalance>,
	pub nfts: Vec<NftHolding>,
	pub transactions: BTreeSet<String>,
}

impl Account {
	pub fn new(address: &str) -> Self {
		Self {
			address: address.to_string(),
			..Default::default()
		}
	}

	/// Balance of `symbol` summed over all chains.
	pub fn balance_of(&self, symbol: &str) -> u128 {
		self.balances
			.iter()
			.filter(|b| b.symbol == symbol)
			.fold(0u128, |acc, b| acc.saturating_add(b.amount))
	}
}

/// Token flag bitset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenFlags(u32);

impl TokenFlags {
	pub const TRANSFERABLE: TokenFlags = TokenFlags(1 << 0);
	pub const FUNGIBLE: TokenFlags = TokenFlags(1 << 1);
	pub const FINITE: TokenFlags = TokenFlags(1 << 2);
	pub const DIVISIBLE: TokenFlags = TokenFlags(1 << 3);
	pub const FUEL: TokenFlags = TokenFlags(1 << 4);
	pub const STAKABLE: TokenFlags = TokenFlags(1 << 5);
	pub const FIAT: TokenFlags = TokenFlags(1 << 6);
	pub const BURNABLE: TokenFlags = TokenFlags(1 << 7);

	pub const fn empty() -> Self {
		TokenFlags(0)
	}

	pub const fn bits(self) -> u32 {
		self.0
	}

	pub fn contains(self, other: TokenFlags) -> bool {
		self.0 & other.0 == other.0
	}

	pub fn insert(&mut self, other: TokenFlags) {
		self.0 |= other.0;
	}

	/// Parse the node's comma separated flag list. Unknown names are ignored.
	pub fn parse(raw: &str) -> Self {
		let mut flags = TokenFlags::empty();
		for name in raw.split(',').map(str::trim) {
			let flag = match name {
				"Transferable" => TokenFlags::TRANSFERABLE,
				"Fungible" => TokenFlags::FUNGIBLE,
				"Finite" => TokenFlags::FINITE,
				"Divisible" => TokenFlags::DIVISIBLE,
				"Fuel" => TokenFlags::FUEL,
				"Stakable" => TokenFlags::STAKABLE,
				"Fiat" => TokenFlags::FIAT,
				"Burnable" => TokenFlags::BURNABLE,
				_ => continue,
			};
			flags.insert(flag);
		}
		flags
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Token {
	pub symbol: String,
	pub name: String,
	pub decimals: u32,
	pub flags: TokenFlags,
	pub current_supply: u128,
	pub max_supply: u128,
	pub metadata: BTreeMap<String, String>,
}

impl Token {
	pub fn is_fungible(&self) -> bool {
		self.flags.contains(TokenFlags::FUNGIBLE)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
	pub id: String,
	pub title: String,
	pub url: String,
	pub icon: String,
	pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Organization {
	pub id: String,
	pub name: String,
	pub members: Vec<String>,
}

/// Everything one block contributes to the mirror, committed in a single write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockBundle {
	pub block: Block,
	pub transactions: Vec<Transaction>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_token_flags_parse() {
		let flags = TokenFlags::parse("Transferable, Fungible, Finite, Weird");
		assert!(flags.contains(TokenFlags::TRANSFERABLE));
		assert!(flags.contains(TokenFlags::FUNGIBLE));
		assert!(flags.contains(TokenFlags::FINITE));
		assert!(!flags.contains(TokenFlags::FUEL));
		assert_eq!(TokenFlags::parse("").bits(), 0);
	}

	#[test]
	fn test_event_kind_round_trips_unknown() {
		assert_eq!(EventKind::parse("TokenSend"), EventKind::TokenSend);
		let unknown = EventKind::parse("LeaderboardInsert");
		assert_eq!(unknown, EventKind::Unknown("LeaderboardInsert".to_string()));
		assert_eq!(unknown.to_string(), "LeaderboardInsert");
		assert_eq!(EventKind::GasPayment.to_string(), "GasPayment");
	}

	#[test]
	fn test_balance_of_sums_chains() {
		let mut account = Account::new("P2KA");
		account.balances.push(FungibleBalance {
			symbol: "SOUL".into(),
			chain: "main".into(),
			amount: 5,
		});
		account.balances.push(FungibleBalance {
			symbol: "SOUL".into(),
			chain: "side".into(),
			amount: 7,
		});
		account.balances.push(FungibleBalance {
			symbol: "KCAL".into(),
			chain: "main".into(),
			amount: 100,
		});
		assert_eq!(account.balance_of("SOUL"), 12);
		assert_eq!(account.balance_of("NONE"), 0);
	}
}
