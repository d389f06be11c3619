//! Read-only projections over the mirror.
//!
//! `MirrorQuery` layers the lookup and ranking policies on top of a `MirrorStore`:
//! key-then-name resolution, "last N" listings, paging and the rich list.

use super::model::*;
use super::pagination::{DEFAULT_PAGE_SIZE, Page, Pagination};
use super::store::{MirrorStore, StoreError};

use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;

/// Token ranked by the rich list when none is given.
pub const DEFAULT_NATIVE_TOKEN: &str = "SOUL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RichListEntry {
	pub address: String,
	pub name: Option<String>,
	pub balance: u128,
}

#[derive(Clone)]
pub struct MirrorQuery {
	store: Arc<dyn MirrorStore>,
	page_size: usize,
	native_token: String,
}

impl MirrorQuery {
	pub fn new(store: Arc<dyn MirrorStore>) -> Self {
		Self {
			store,
			page_size: DEFAULT_PAGE_SIZE,
			native_token: DEFAULT_NATIVE_TOKEN.to_string(),
		}
	}

	pub fn with_page_size(mut self, page_size: usize) -> Self {
		self.page_size = page_size.max(1);
		self
	}

	pub fn with_native_token(mut self, symbol: impl Into<String>) -> Self {
		self.native_token = symbol.into();
		self
	}

	pub fn store(&self) -> &Arc<dyn MirrorStore> {
		&self.store
	}

	pub fn page_size(&self) -> usize {
		self.page_size
	}

	pub fn native_token(&self) -> &str {
		&self.native_token
	}

	/// Chain by address, then by name.
	pub fn find_chain(&self, input: &str) -> Result<Option<Chain>, StoreError> {
		match self.store.chain(input)? {
			Some(chain) => Ok(Some(chain)),
			None => self.store.chain_by_name(input),
		}
	}

	/// Token by symbol (as given, then upper-cased), then by name.
	pub fn find_token(&self, input: &str) -> Result<Option<Token>, StoreError> {
		if let Some(token) = self.store.token(input)? {
			return Ok(Some(token));
		}
		let upper = input.to_ascii_uppercase();
		if upper != input {
			if let Some(token) = self.store.token(&upper)? {
				return Ok(Some(token));
			}
		}
		self.store.token_by_name(input)
	}

	/// Account by address, then by registered name.
	pub fn find_account(&self, input: &str) -> Result<Option<Account>, StoreError> {
		match self.store.account(input)? {
			Some(account) => Ok(Some(account)),
			None => self.store.account_by_name(input),
		}
	}

	pub fn last_blocks(&self, chain: Option<&str>, n: usize) -> Result<Vec<Block>, StoreError> {
		self.store.recent_blocks(chain, 0, n)
	}

	pub fn last_transactions(
		&self,
		chain: Option<&str>,
		n: usize,
	) -> Result<Vec<Transaction>, StoreError> {
		self.store.recent_transactions(chain, 0, n)
	}

	pub fn blocks_page(&self, chain: Option<&str>, page: usize) -> Result<Page<Block>, StoreError> {
		let pagination = Pagination::new(self.store.block_count(chain)?, self.page_size, page);
		Ok(Page {
			items: self
				.store
				.recent_blocks(chain, pagination.offset(), pagination.page_size)?,
			pagination,
		})
	}

	pub fn transactions_page(
		&self,
		chain: Option<&str>,
		page: usize,
	) -> Result<Page<Transaction>, StoreError> {
		let pagination =
			Pagination::new(self.store.transaction_count(chain)?, self.page_size, page);
		Ok(Page {
			items: self
				.store
				.recent_transactions(chain, pagination.offset(), pagination.page_size)?,
			pagination,
		})
	}

	pub fn account_transactions(
		&self,
		address: &str,
		n: usize,
	) -> Result<Vec<Transaction>, StoreError> {
		self.store.account_transactions(address, 0, n)
	}

	pub fn account_transactions_page(
		&self,
		address: &str,
		page: usize,
	) -> Result<Page<Transaction>, StoreError> {
		let count = self.address_transaction_count(address)?;
		let pagination = Pagination::new(count, self.page_size, page);
		Ok(Page {
			items: self.store.account_transactions(
				address,
				pagination.offset(),
				pagination.page_size,
			)?,
			pagination,
		})
	}

	pub fn chain_transaction_count(&self, chain: &str) -> Result<usize, StoreError> {
		self.store.transaction_count(Some(chain))
	}

	pub fn address_transaction_count(&self, address: &str) -> Result<usize, StoreError> {
		Ok(self
			.store
			.account(address)?
			.map(|a| a.transactions.len())
			.unwrap_or(0))
	}

	pub fn token_transaction_count(&self, symbol: &str) -> Result<usize, StoreError> {
		self.store.token_transaction_count(symbol)
	}

	/// Top `k` holders of `symbol` (native token by default), largest balance first.
	pub fn rich_list(
		&self,
		symbol: Option<&str>,
		k: usize,
	) -> Result<Vec<RichListEntry>, StoreError> {
		let symbol = symbol.unwrap_or(&self.native_token);
		let ranked = self
			.store
			.holders(symbol)?
			.into_iter()
			.filter(|(_, balance)| *balance > 0)
			.sorted_by(|(a_addr, a_bal), (b_addr, b_bal)| {
				b_bal.cmp(a_bal).then_with(|| a_addr.cmp(b_addr))
			})
			.take(k)
			.collect::<Vec<_>>();

		ranked
			.into_iter()
			.map(|(address, balance)| {
				let name = self.store.account(&address)?.and_then(|a| a.name);
				Ok(RichListEntry {
					address,
					name,
					balance,
				})
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mirror::store::fixtures::*;
	use crate::mirror::store::{AccountRefresh, InMemoryMirror};
	use std::collections::BTreeMap;

	fn soul(amount: u128) -> Vec<FungibleBalance> {
		vec![FungibleBalance {
			symbol: "SOUL".into(),
			chain: "main".into(),
			amount,
		}]
	}

	fn query_with_accounts(balances: &[(&str, u128)]) -> MirrorQuery {
		let store = Arc::new(InMemoryMirror::new());
		for (address, amount) in balances {
			store
				.refresh_account(AccountRefresh {
					address: address.to_string(),
					balances: soul(*amount),
					..Default::default()
				})
				.unwrap();
		}
		MirrorQuery::new(store)
	}

	#[test]
	fn test_rich_list_ranks_descending_without_zero() {
		let query = query_with_accounts(&[("X", 50), ("Y", 200), ("Z", 10), ("W", 0)]);
		let addresses: Vec<String> = query
			.rich_list(Some("SOUL"), 3)
			.unwrap()
			.into_iter()
			.map(|e| e.address)
			.collect();
		assert_eq!(addresses, vec!["Y", "X", "Z"]);
	}

	#[test]
	fn test_rich_list_defaults_to_native_token() {
		let query = query_with_accounts(&[("X", 5)]);
		assert_eq!(query.rich_list(None, 10).unwrap().len(), 1);
		let query = query.with_native_token("KCAL");
		assert!(query.rich_list(None, 10).unwrap().is_empty());
	}

	#[test]
	fn test_chain_lookup_by_name_matches_address() {
		let store = Arc::new(InMemoryMirror::new());
		store.upsert_chain(chain("S3dMain", "main")).unwrap();
		let query = MirrorQuery::new(store);

		let by_address = query.find_chain("S3dMain").unwrap();
		let by_name = query.find_chain("main").unwrap();
		assert!(by_address.is_some());
		assert_eq!(by_address, by_name);
		assert!(query.find_chain("nowhere").unwrap().is_none());
	}

	#[test]
	fn test_token_lookup_by_name_matches_symbol() {
		let store = Arc::new(InMemoryMirror::new());
		store
			.upsert_token(Token {
				symbol: "KCAL".into(),
				name: "Phantasma Energy".into(),
				decimals: 10,
				flags: TokenFlags::FUNGIBLE,
				current_supply: 0,
				max_supply: 0,
				metadata: BTreeMap::new(),
			})
			.unwrap();
		let query = MirrorQuery::new(store);

		let by_symbol = query.find_token("KCAL").unwrap();
		assert!(by_symbol.is_some());
		assert_eq!(query.find_token("kcal").unwrap(), by_symbol);
		assert_eq!(query.find_token("Phantasma Energy").unwrap(), by_symbol);
	}

	#[test]
	fn test_blocks_page() {
		let store = Arc::new(InMemoryMirror::new());
		store.upsert_chain(chain("S3dMain", "main")).unwrap();
		for h in 1..=45 {
			store.apply_block(bundle("S3dMain", h, &["X"])).unwrap();
		}
		let query = MirrorQuery::new(store);

		let page = query.blocks_page(Some("S3dMain"), 3).unwrap();
		assert_eq!(page.pagination.total_pages(), 3);
		assert_eq!(page.items.len(), 5);
		assert_eq!(page.items[0].height, 5);
		assert_eq!(query.last_blocks(None, 20).unwrap()[0].height, 45);
		let recent = query.last_transactions(Some("S3dMain"), 2).unwrap();
		assert_eq!(recent.len(), 2);
		assert_eq!(recent[0].hash, "S3dMain-T45");

		let txs = query.account_transactions_page("X", 1).unwrap();
		assert_eq!(txs.pagination.count, 45);
		assert_eq!(txs.items.len(), 20);
		assert_eq!(txs.items[0].block_height, 45);
		assert_eq!(query.address_transaction_count("X").unwrap(), 45);
		assert_eq!(query.chain_transaction_count("S3dMain").unwrap(), 45);
	}
}
