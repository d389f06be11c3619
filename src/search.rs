//! Search over the mirror.
//!
//! A query is tried against an ordered list of strategies; the first one that recognizes it
//! wins. The default order is address, token, app, chain, transaction hash, block hash.

use crate::mirror::{MirrorQuery, StoreError};

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde::Serialize;

/// Bytes escaped when a key becomes a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
	.add(b' ')
	.add(b'"')
	.add(b'#')
	.add(b'%')
	.add(b'/')
	.add(b'<')
	.add(b'>')
	.add(b'?')
	.add(b'`')
	.add(b'{')
	.add(b'}');

/// What a search resolved to, carrying the canonical key of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "key")]
pub enum SearchHit {
	Address(String),
	Token(String),
	App(String),
	Chain(String),
	Transaction(String),
	Block(String),
}

impl SearchHit {
	/// API route of the record's detail view.
	pub fn route(&self) -> String {
		let (prefix, key) = match self {
			SearchHit::Address(address) => ("/api/get_account/", address),
			SearchHit::Token(symbol) => ("/api/token/", symbol),
			SearchHit::App(id) => ("/api/app/", id),
			SearchHit::Chain(address) => ("/api/chain/", address),
			SearchHit::Transaction(hash) => ("/api/transaction/", hash),
			SearchHit::Block(hash) => ("/api/get_block/", hash),
		};
		format!("{}{}", prefix, utf8_percent_encode(key, SEGMENT))
	}
}

/// One way of interpreting a search query
pub trait SearchStrategy: Send + Sync {
	fn find(&self, query: &MirrorQuery, input: &str) -> Result<Option<SearchHit>, StoreError>;

	fn name(&self) -> &'static str;
}

/// Account address or registered name
pub struct AddressSearch;

impl SearchStrategy for AddressSearch {
	fn find(&self, query: &MirrorQuery, input: &str) -> Result<Option<SearchHit>, StoreError> {
		Ok(query
			.find_account(input)?
			.map(|account| SearchHit::Address(account.address)))
	}

	fn name(&self) -> &'static str {
		"AddressSearch"
	}
}

/// Token symbol or name
pub struct TokenSearch;

impl SearchStrategy for TokenSearch {
	fn find(&self, query: &MirrorQuery, input: &str) -> Result<Option<SearchHit>, StoreError> {
		Ok(query
			.find_token(input)?
			.map(|token| SearchHit::Token(token.symbol)))
	}

	fn name(&self) -> &'static str {
		"TokenSearch"
	}
}

/// Application id
pub struct AppSearch;

impl SearchStrategy for AppSearch {
	fn find(&self, query: &MirrorQuery, input: &str) -> Result<Option<SearchHit>, StoreError> {
		Ok(query.store().app(input)?.map(|app| SearchHit::App(app.id)))
	}

	fn name(&self) -> &'static str {
		"AppSearch"
	}
}

/// Chain address or name
pub struct ChainSearch;

impl SearchStrategy for ChainSearch {
	fn find(&self, query: &MirrorQuery, input: &str) -> Result<Option<SearchHit>, StoreError> {
		Ok(query
			.find_chain(input)?
			.map(|chain| SearchHit::Chain(chain.address)))
	}

	fn name(&self) -> &'static str {
		"ChainSearch"
	}
}

pub struct TransactionSearch;

impl SearchStrategy for TransactionSearch {
	fn find(&self, query: &MirrorQuery, input: &str) -> Result<Option<SearchHit>, StoreError> {
		Ok(query
			.store()
			.transaction(input)?
			.map(|tx| SearchHit::Transaction(tx.hash)))
	}

	fn name(&self) -> &'static str {
		"TransactionSearch"
	}
}

pub struct BlockSearch;

impl SearchStrategy for BlockSearch {
	fn find(&self, query: &MirrorQuery, input: &str) -> Result<Option<SearchHit>, StoreError> {
		Ok(query
			.store()
			.block_by_hash(input)?
			.map(|block| SearchHit::Block(block.hash)))
	}

	fn name(&self) -> &'static str {
		"BlockSearch"
	}
}

/// Ordered search over the mirror
pub struct Search {
	query: MirrorQuery,
	strategies: Vec<Box<dyn SearchStrategy>>,
}

impl Search {
	pub fn new(query: MirrorQuery) -> Self {
		Self::with_strategies(
			query,
			vec![
				Box::new(AddressSearch),
				Box::new(TokenSearch),
				Box::new(AppSearch),
				Box::new(ChainSearch),
				Box::new(TransactionSearch),
				Box::new(BlockSearch),
			],
		)
	}

	pub fn with_strategies(query: MirrorQuery, strategies: Vec<Box<dyn SearchStrategy>>) -> Self {
		Self { query, strategies }
	}

	/// First hit in strategy order; blank input never matches.
	pub fn search(&self, input: &str) -> Result<Option<SearchHit>, StoreError> {
		let input = input.trim();
		if input.is_empty() {
			return Ok(None);
		}

		for strategy in &self.strategies {
			if let Some(hit) = strategy.find(&self.query, input)? {
				tracing::debug!("Search {:?} matched by {}", input, strategy.name());
				return Ok(Some(hit));
			}
		}
		Ok(None)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mirror::store::fixtures::*;
	use crate::mirror::{AccountRefresh, App, InMemoryMirror, MirrorStore, Token, TokenFlags};
	use std::sync::Arc;

	fn search() -> Search {
		let store = Arc::new(InMemoryMirror::new());
		store.upsert_chain(chain("S3dMain", "main")).unwrap();
		store.apply_block(bundle("S3dMain", 1, &["P2K"])).unwrap();
		store
			.refresh_account(AccountRefresh {
				address: "P2K".into(),
				name: Some("genesis".into()),
				..Default::default()
			})
			.unwrap();
		store
			.upsert_token(Token {
				symbol: "SOUL".into(),
				name: "Phantasma Stake".into(),
				decimals: 8,
				flags: TokenFlags::FUNGIBLE,
				current_supply: 0,
				max_supply: 0,
				metadata: Default::default(),
			})
			.unwrap();
		store
			.upsert_app(App {
				id: "main".into(),
				title: "Main app".into(),
				url: String::new(),
				icon: String::new(),
				description: String::new(),
			})
			.unwrap();
		Search::new(MirrorQuery::new(store))
	}

	#[test]
	fn test_each_kind_is_found() {
		let search = search();
		assert_eq!(
			search.search("genesis").unwrap(),
			Some(SearchHit::Address("P2K".into()))
		);
		assert_eq!(
			search.search("soul").unwrap(),
			Some(SearchHit::Token("SOUL".into()))
		);
		assert_eq!(
			search.search("S3dMain").unwrap(),
			Some(SearchHit::Chain("S3dMain".into()))
		);
		assert_eq!(
			search.search("S3dMain-T1").unwrap(),
			Some(SearchHit::Transaction("S3dMain-T1".into()))
		);
		assert_eq!(
			search.search(" S3dMain-B1 ").unwrap(),
			Some(SearchHit::Block("S3dMain-B1".into()))
		);
	}

	#[test]
	fn test_app_wins_over_chain_name() {
		// "main" is both an app id and the chain's name
		assert_eq!(
			search().search("main").unwrap(),
			Some(SearchHit::App("main".into()))
		);
	}

	#[test]
	fn test_no_match() {
		let search = search();
		assert_eq!(search.search("nothing here").unwrap(), None);
		assert_eq!(search.search("   ").unwrap(), None);
	}

	#[test]
	fn test_hit_routes() {
		assert_eq!(
			SearchHit::Block("abc".into()).route(),
			"/api/get_block/abc"
		);
		assert_eq!(
			SearchHit::Address("P2K".into()).route(),
			"/api/get_account/P2K"
		);
		assert_eq!(
			SearchHit::App("my app/1".into()).route(),
			"/api/app/my%20app%2F1"
		);
	}
}
