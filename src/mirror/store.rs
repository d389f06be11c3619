//! Repository for the local mirror.
//!
//! `MirrorStore` is the read/write contract the synchronizer, query layer and API are written
//! against. `InMemoryMirror` keeps everything behind one `RwLock`; each `apply_block` call is a
//! single write so a block, its transactions, events and account links commit together.

use super::model::*;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("Mirror lock poisoned")]
	Poisoned,

	#[error("Unknown chain: {0}")]
	UnknownChain(String),

	#[error("Out of order block for chain {chain}: expected height {expected}, got {got}")]
	OutOfOrder {
		chain: String,
		expected: u64,
		got: u64,
	},

	#[error(
		"Chain linkage broken for {chain} at height {height}: previous hash {found} does not match {expected}"
	)]
	ChainLinkage {
		chain: String,
		height: u64,
		expected: String,
		found: String,
	},

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Snapshot encoding error: {0}")]
	EncodingError(#[from] bincode::Error),

	#[error("Snapshot metadata error: {0}")]
	JsonError(#[from] serde_json::Error),

	#[error("Snapshot error: {0}")]
	SnapshotError(String),
}

/// Balances and profile of an account as last reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRefresh {
	pub address: String,
	pub name: Option<String>,
	pub staked: u128,
	pub balances: Vec<FungibleBalance>,
	pub nfts: Vec<NftHolding>,
}

/// Read/write contract of the mirror.
///
/// Lookups by unknown key return `Ok(None)`; errors are reserved for storage failures and
/// integrity violations.
pub trait MirrorStore: Send + Sync {
	// Chains
	fn chains(&self) -> Result<Vec<Chain>, StoreError>;
	fn chain(&self, address: &str) -> Result<Option<Chain>, StoreError>;
	fn chain_by_name(&self, name: &str) -> Result<Option<Chain>, StoreError>;
	/// Insert a chain, or refresh name/parent/contracts of a known one. The mirrored height is
	/// never taken from the argument for known chains.
	fn upsert_chain(&self, chain: Chain) -> Result<bool, StoreError>;

	// Blocks
	fn block_by_hash(&self, hash: &str) -> Result<Option<Block>, StoreError>;
	fn block_by_height(&self, chain: &str, height: u64) -> Result<Option<Block>, StoreError>;
	/// Blocks ordered by descending timestamp, then height.
	fn recent_blocks(
		&self,
		chain: Option<&str>,
		offset: usize,
		limit: usize,
	) -> Result<Vec<Block>, StoreError>;
	fn block_count(&self, chain: Option<&str>) -> Result<usize, StoreError>;
	/// Commit a block with its transactions and derived account links.
	///
	/// Returns `false` when the block is already mirrored.
	fn apply_block(&self, bundle: BlockBundle) -> Result<bool, StoreError>;

	// Transactions
	fn transaction(&self, hash: &str) -> Result<Option<Transaction>, StoreError>;
	/// Transactions ordered by descending timestamp.
	fn recent_transactions(
		&self,
		chain: Option<&str>,
		offset: usize,
		limit: usize,
	) -> Result<Vec<Transaction>, StoreError>;
	fn transaction_count(&self, chain: Option<&str>) -> Result<usize, StoreError>;
	fn block_transactions(&self, block_hash: &str) -> Result<Vec<Transaction>, StoreError>;
	fn token_transaction_count(&self, symbol: &str) -> Result<usize, StoreError>;

	// Accounts
	fn account(&self, address: &str) -> Result<Option<Account>, StoreError>;
	fn account_by_name(&self, name: &str) -> Result<Option<Account>, StoreError>;
	/// Transactions of an account, most recent first.
	fn account_transactions(
		&self,
		address: &str,
		offset: usize,
		limit: usize,
	) -> Result<Vec<Transaction>, StoreError>;
	/// `(address, balance)` for every account holding a non-zero amount of `symbol`.
	fn holders(&self, symbol: &str) -> Result<Vec<(String, u128)>, StoreError>;
	fn refresh_account(&self, refresh: AccountRefresh) -> Result<(), StoreError>;

	// Reference data
	fn tokens(&self) -> Result<Vec<Token>, StoreError>;
	fn token(&self, symbol: &str) -> Result<Option<Token>, StoreError>;
	fn token_by_name(&self, name: &str) -> Result<Option<Token>, StoreError>;
	fn upsert_token(&self, token: Token) -> Result<(), StoreError>;
	fn apps(&self) -> Result<Vec<App>, StoreError>;
	fn app(&self, id: &str) -> Result<Option<App>, StoreError>;
	fn upsert_app(&self, app: App) -> Result<(), StoreError>;
	fn organizations(&self) -> Result<Vec<Organization>, StoreError>;
	fn organization(&self, id: &str) -> Result<Option<Organization>, StoreError>;
	fn upsert_organization(&self, organization: Organization) -> Result<(), StoreError>;

	// Snapshots
	fn export_state(&self) -> Result<MirrorState, StoreError>;
	fn import_state(&self, state: MirrorState) -> Result<(), StoreError>;
}

/// Whole mirror contents, also the snapshot body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MirrorState {
	chains: BTreeMap<String, Chain>,
	blocks: HashMap<String, Block>,
	/// (chain address, height) -> block hash
	block_heights: BTreeMap<(String, u64), String>,
	/// (timestamp, height, block hash), ascending
	block_timeline: BTreeSet<(i64, u64, String)>,
	transactions: HashMap<String, Transaction>,
	/// (timestamp, block height, tx hash), ascending
	transaction_timeline: BTreeSet<(i64, u64, String)>,
	accounts: BTreeMap<String, Account>,
	/// token symbol -> transaction hashes
	token_transactions: BTreeMap<String, BTreeSet<String>>,
	tokens: BTreeMap<String, Token>,
	apps: BTreeMap<String, App>,
	organizations: BTreeMap<String, Organization>,
}

impl MirrorState {
	/// Mirrored height per chain address.
	pub fn heights(&self) -> BTreeMap<String, u64> {
		self.chains
			.values()
			.map(|c| (c.address.clone(), c.height))
			.collect()
	}

	fn transactions_by_hash<'a, I>(&self, hashes: I) -> Vec<Transaction>
	where
		I: IntoIterator<Item = &'a String>,
	{
		hashes
			.into_iter()
			.filter_map(|h| self.transactions.get(h).cloned())
			.collect()
	}
}

/// In-memory `MirrorStore`.
#[derive(Default)]
pub struct InMemoryMirror {
	state: RwLock<MirrorState>,
}

impl InMemoryMirror {
	pub fn new() -> Self {
		Self::default()
	}

	fn read(&self) -> Result<RwLockReadGuard<'_, MirrorState>, StoreError> {
		self.state.read().map_err(|_| StoreError::Poisoned)
	}

	fn write(&self) -> Result<RwLockWriteGuard<'_, MirrorState>, StoreError> {
		self.state.write().map_err(|_| StoreError::Poisoned)
	}
}

impl MirrorStore for InMemoryMirror {
	fn chains(&self) -> Result<Vec<Chain>, StoreError> {
		Ok(self.read()?.chains.values().cloned().collect())
	}

	fn chain(&self, address: &str) -> Result<Option<Chain>, StoreError> {
		Ok(self.read()?.chains.get(address).cloned())
	}

	fn chain_by_name(&self, name: &str) -> Result<Option<Chain>, StoreError> {
		Ok(self
			.read()?
			.chains
			.values()
			.find(|c| c.name == name)
			.cloned())
	}

	fn upsert_chain(&self, chain: Chain) -> Result<bool, StoreError> {
		let mut state = self.write()?;
		match state.chains.get_mut(&chain.address) {
			Some(existing) => {
				existing.name = chain.name;
				existing.parent_address = chain.parent_address;
				existing.contracts = chain.contracts;
				Ok(false)
			}
			None => {
				debug!("Mirroring new chain {} ({})", chain.name, chain.address);
				state.chains.insert(chain.address.clone(), chain);
				Ok(true)
			}
		}
	}

	fn block_by_hash(&self, hash: &str) -> Result<Option<Block>, StoreError> {
		Ok(self.read()?.blocks.get(hash).cloned())
	}

	fn block_by_height(&self, chain: &str, height: u64) -> Result<Option<Block>, StoreError> {
		let state = self.read()?;
		Ok(state
			.block_heights
			.get(&(chain.to_string(), height))
			.and_then(|hash| state.blocks.get(hash))
			.cloned())
	}

	fn recent_blocks(
		&self,
		chain: Option<&str>,
		offset: usize,
		limit: usize,
	) -> Result<Vec<Block>, StoreError> {
		let state = self.read()?;
		Ok(state
			.block_timeline
			.iter()
			.rev()
			.filter_map(|(_, _, hash)| state.blocks.get(hash))
			.filter(|b| chain.is_none_or(|c| b.chain_address == c))
			.skip(offset)
			.take(limit)
			.cloned()
			.collect())
	}

	fn block_count(&self, chain: Option<&str>) -> Result<usize, StoreError> {
		let state = self.read()?;
		Ok(match chain {
			None => state.blocks.len(),
			Some(c) => state.chains.get(c).map(|c| c.height as usize).unwrap_or(0),
		})
	}

	fn apply_block(&self, bundle: BlockBundle) -> Result<bool, StoreError> {
		let mut state = self.write()?;
		let BlockBundle {
			block,
			transactions,
		} = bundle;

		if state.blocks.contains_key(&block.hash) {
			debug!("Block {} already mirrored", block.hash);
			return Ok(false);
		}

		let chain = state
			.chains
			.get(&block.chain_address)
			.ok_or_else(|| StoreError::UnknownChain(block.chain_address.clone()))?;

		let expected = chain.height + 1;
		if block.height != expected {
			return Err(StoreError::OutOfOrder {
				chain: chain.address.clone(),
				expected,
				got: block.height,
			});
		}

		if block.height > 1 {
			let tip = state
				.block_heights
				.get(&(chain.address.clone(), chain.height))
				.cloned()
				.unwrap_or_default();
			if tip != block.previous_hash {
				return Err(StoreError::ChainLinkage {
					chain: chain.address.clone(),
					height: block.height,
					expected: tip,
					found: block.previous_hash.clone(),
				});
			}
		}

		for tx in transactions {
			if state.transactions.contains_key(&tx.hash) {
				continue;
			}
			for address in tx.participants() {
				state
					.accounts
					.entry(address.clone())
					.or_insert_with(|| Account::new(&address))
					.transactions
					.insert(tx.hash.clone());
			}
			for symbol in &tx.summary.token_symbols {
				state
					.token_transactions
					.entry(symbol.clone())
					.or_default()
					.insert(tx.hash.clone());
			}
			state.transaction_timeline.insert((
				tx.timestamp.timestamp(),
				tx.block_height,
				tx.hash.clone(),
			));
			state.transactions.insert(tx.hash.clone(), tx);
		}

		state.block_heights.insert(
			(block.chain_address.clone(), block.height),
			block.hash.clone(),
		);
		state
			.block_timeline
			.insert((block.timestamp.timestamp(), block.height, block.hash.clone()));
		if let Some(chain) = state.chains.get_mut(&block.chain_address) {
			chain.height = block.height;
		}
		state.blocks.insert(block.hash.clone(), block);

		Ok(true)
	}

	fn transaction(&self, hash: &str) -> Result<Option<Transaction>, StoreError> {
		Ok(self.read()?.transactions.get(hash).cloned())
	}

	fn recent_transactions(
		&self,
		chain: Option<&str>,
		offset: usize,
		limit: usize,
	) -> Result<Vec<Transaction>, StoreError> {
		let state = self.read()?;
		Ok(state
			.transaction_timeline
			.iter()
			.rev()
			.filter_map(|(_, _, hash)| state.transactions.get(hash))
			.filter(|t| chain.is_none_or(|c| t.chain_address == c))
			.skip(offset)
			.take(limit)
			.cloned()
			.collect())
	}

	fn transaction_count(&self, chain: Option<&str>) -> Result<usize, StoreError> {
		let state = self.read()?;
		Ok(match chain {
			None => state.transactions.len(),
			Some(c) => state
				.transactions
				.values()
				.filter(|t| t.chain_address == c)
				.count(),
		})
	}

	fn block_transactions(&self, block_hash: &str) -> Result<Vec<Transaction>, StoreError> {
		let state = self.read()?;
		Ok(match state.blocks.get(block_hash) {
			Some(block) => state.transactions_by_hash(&block.transaction_hashes),
			None => Vec::new(),
		})
	}

	fn token_transaction_count(&self, symbol: &str) -> Result<usize, StoreError> {
		Ok(self
			.read()?
			.token_transactions
			.get(symbol)
			.map(|set| set.len())
			.unwrap_or(0))
	}

	fn account(&self, address: &str) -> Result<Option<Account>, StoreError> {
		Ok(self.read()?.accounts.get(address).cloned())
	}

	fn account_by_name(&self, name: &str) -> Result<Option<Account>, StoreError> {
		Ok(self
			.read()?
			.accounts
			.values()
			.find(|a| a.name.as_deref() == Some(name))
			.cloned())
	}

	fn account_transactions(
		&self,
		address: &str,
		offset: usize,
		limit: usize,
	) -> Result<Vec<Transaction>, StoreError> {
		let state = self.read()?;
		let Some(account) = state.accounts.get(address) else {
			return Ok(Vec::new());
		};
		let mut transactions = state.transactions_by_hash(&account.transactions);
		transactions.sort_by(|a, b| {
			b.timestamp
				.cmp(&a.timestamp)
				.then(b.block_height.cmp(&a.block_height))
				.then(a.hash.cmp(&b.hash))
		});
		Ok(transactions.into_iter().skip(offset).take(limit).collect())
	}

	fn holders(&self, symbol: &str) -> Result<Vec<(String, u128)>, StoreError> {
		Ok(self
			.read()?
			.accounts
			.values()
			.map(|a| (a.address.clone(), a.balance_of(symbol)))
			.filter(|(_, amount)| *amount > 0)
			.collect())
	}

	fn refresh_account(&self, refresh: AccountRefresh) -> Result<(), StoreError> {
		let mut state = self.write()?;
		let account = state
			.accounts
			.entry(refresh.address.clone())
			.or_insert_with(|| Account::new(&refresh.address));
		account.name = refresh.name;
		account.staked = refresh.staked;
		account.balances = refresh.balances;
		account.nfts = refresh.nfts;
		Ok(())
	}

	fn tokens(&self) -> Result<Vec<Token>, StoreError> {
		Ok(self.read()?.tokens.values().cloned().collect())
	}

	fn token(&self, symbol: &str) -> Result<Option<Token>, StoreError> {
		Ok(self.read()?.tokens.get(symbol).cloned())
	}

	fn token_by_name(&self, name: &str) -> Result<Option<Token>, StoreError> {
		Ok(self
			.read()?
			.tokens
			.values()
			.find(|t| t.name.eq_ignore_ascii_case(name))
			.cloned())
	}

	fn upsert_token(&self, token: Token) -> Result<(), StoreError> {
		self.write()?.tokens.insert(token.symbol.clone(), token);
		Ok(())
	}

	fn apps(&self) -> Result<Vec<App>, StoreError> {
		Ok(self.read()?.apps.values().cloned().collect())
	}

	fn app(&self, id: &str) -> Result<Option<App>, StoreError> {
		Ok(self.read()?.apps.get(id).cloned())
	}

	fn upsert_app(&self, app: App) -> Result<(), StoreError> {
		self.write()?.apps.insert(app.id.clone(), app);
		Ok(())
	}

	fn organizations(&self) -> Result<Vec<Organization>, StoreError> {
		Ok(self.read()?.organizations.values().cloned().collect())
	}

	fn organization(&self, id: &str) -> Result<Option<Organization>, StoreError> {
		Ok(self.read()?.organizations.get(id).cloned())
	}

	fn upsert_organization(&self, organization: Organization) -> Result<(), StoreError> {
		self.write()?
			.organizations
			.insert(organization.id.clone(), organization);
		Ok(())
	}

	fn export_state(&self) -> Result<MirrorState, StoreError> {
		Ok(self.read()?.clone())
	}

	fn import_state(&self, state: MirrorState) -> Result<(), StoreError> {
		*self.write()? = state;
		Ok(())
	}
}


#[cfg(test)]
mod tests {
	use super::fixtures::*;
	use super::*;

	fn mirror_with_chain() -> InMemoryMirror {
		let mirror = InMemoryMirror::new();
		mirror.upsert_chain(chain("S3dMain", "main")).unwrap();
		mirror
	}

	#[test]
	fn test_apply_block_is_idempotent() {
		let mirror = mirror_with_chain();
		assert!(mirror.apply_block(bundle("S3dMain", 1, &["X", "Y"])).unwrap());
		assert!(!mirror.apply_block(bundle("S3dMain", 1, &["X", "Y"])).unwrap());

		assert_eq!(mirror.chain("S3dMain").unwrap().unwrap().height, 1);
		assert_eq!(mirror.transaction_count(None).unwrap(), 1);
		assert_eq!(mirror.account("X").unwrap().unwrap().transactions.len(), 1);
		assert_eq!(mirror.token_transaction_count("SOUL").unwrap(), 1);
	}

	#[test]
	fn test_out_of_order_block_rejected() {
		let mirror = mirror_with_chain();
		let err = mirror.apply_block(bundle("S3dMain", 2, &[])).unwrap_err();
		assert!(matches!(
			err,
			StoreError::OutOfOrder {
				expected: 1,
				got: 2,
				..
			}
		));
	}

	#[test]
	fn test_chain_linkage_checked() {
		let mirror = mirror_with_chain();
		mirror.apply_block(bundle("S3dMain", 1, &[])).unwrap();
		let mut next = bundle("S3dMain", 2, &[]);
		next.block.previous_hash = "forged".into();
		let err = mirror.apply_block(next).unwrap_err();
		assert!(matches!(err, StoreError::ChainLinkage { height: 2, .. }));
		assert_eq!(mirror.chain("S3dMain").unwrap().unwrap().height, 1);
	}

	#[test]
	fn test_unknown_chain_rejected() {
		let mirror = InMemoryMirror::new();
		let err = mirror.apply_block(bundle("S3dSide", 1, &[])).unwrap_err();
		assert!(matches!(err, StoreError::UnknownChain(_)));
	}

	#[test]
	fn test_upsert_chain_keeps_height() {
		let mirror = mirror_with_chain();
		mirror.apply_block(bundle("S3dMain", 1, &[])).unwrap();
		let mut renamed = chain("S3dMain", "main");
		renamed.height = 99;
		renamed.contracts = vec!["gas".into()];
		assert!(!mirror.upsert_chain(renamed).unwrap());

		let stored = mirror.chain("S3dMain").unwrap().unwrap();
		assert_eq!(stored.height, 1);
		assert_eq!(stored.contracts, vec!["gas".to_string()]);
	}

	#[test]
	fn test_recent_blocks_newest_first() {
		let mirror = mirror_with_chain();
		mirror.upsert_chain(chain("S3dSide", "side")).unwrap();
		for h in 1..=3 {
			mirror.apply_block(bundle("S3dMain", h, &[])).unwrap();
		}
		mirror.apply_block(bundle("S3dSide", 1, &[])).unwrap();

		let heights: Vec<u64> = mirror
			.recent_blocks(Some("S3dMain"), 0, 2)
			.unwrap()
			.iter()
			.map(|b| b.height)
			.collect();
		assert_eq!(heights, vec![3, 2]);
		assert_eq!(mirror.recent_blocks(None, 0, 10).unwrap().len(), 4);
		assert_eq!(mirror.block_count(Some("S3dSide")).unwrap(), 1);
	}

	#[test]
	fn test_refresh_account_keeps_transactions() {
		let mirror = mirror_with_chain();
		mirror.apply_block(bundle("S3dMain", 1, &["X"])).unwrap();
		mirror
			.refresh_account(AccountRefresh {
				address: "X".into(),
				name: Some("alice".into()),
				staked: 10,
				balances: vec![FungibleBalance {
					symbol: "SOUL".into(),
					chain: "main".into(),
					amount: 50,
				}],
				nfts: vec![],
			})
			.unwrap();

		let account = mirror.account_by_name("alice").unwrap().unwrap();
		assert_eq!(account.address, "X");
		assert_eq!(account.transactions.len(), 1);
		assert_eq!(mirror.holders("SOUL").unwrap(), vec![("X".to_string(), 50)]);
	}

	#[test]
	fn test_unknown_keys_are_none() {
		let mirror = mirror_with_chain();
		assert!(mirror.block_by_hash("nope").unwrap().is_none());
		assert!(mirror.transaction("nope").unwrap().is_none());
		assert!(mirror.account("nope").unwrap().is_none());
		assert!(mirror.token("nope").unwrap().is_none());
		assert!(mirror.block_transactions("nope").unwrap().is_empty());
		assert!(mirror.account_transactions("nope", 0, 20).unwrap().is_empty());
	}
}
