use crate::events::codec::decode_string_payload;
use crate::events::describe_transaction;
use crate::mirror::{
	AccountRefresh, App, Block, BlockBundle, Chain, Event, EventKind, FungibleBalance, MirrorStore,
	NftHolding, Organization, Token, TokenFlags, Transaction,
};
use crate::node::{
	AccountResult, AppResult, BlockResult, ChainResult, EventResult, OrganizationResult,
	TokenResult, TransactionResult, decode_hex_field, parse_amount,
};
use crate::sync::types::SyncError;

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error};

/// Names the node reports for accounts without a registered name.
const ANONYMOUS_NAMES: [&str; 2] = ["", "anonymous"];

/// A node block turned into mirror rows, plus the follow-up work it implies.
#[derive(Debug, Clone)]
pub struct ProcessedBlock {
	pub bundle: BlockBundle,
	/// Every address mentioned by an event of the block.
	pub touched_accounts: BTreeSet<String>,
	/// Organization ids created by the block.
	pub organizations: BTreeSet<String>,
}

#[derive(Clone)]
pub struct BlockProcessor {
	store: Arc<dyn MirrorStore>,
}

impl BlockProcessor {
	pub fn new(store: Arc<dyn MirrorStore>) -> Self {
		Self { store }
	}

	fn token_decimals(&self, symbol: &str) -> Option<u32> {
		self.store
			.token(symbol)
			.ok()
			.flatten()
			.map(|token| token.decimals)
	}

	/// Convert a node block into a bundle ready for `MirrorStore::apply_block`
	pub fn process_block(&self, block: &BlockResult) -> Result<ProcessedBlock, SyncError> {
		let timestamp = parse_timestamp(block.timestamp)?;
		let transactions = block
			.txs
			.iter()
			.map(|tx| self.process_transaction(tx, block, timestamp))
			.collect::<Result<Vec<_>, _>>()?;

		let mut touched_accounts = BTreeSet::new();
		let mut organizations = BTreeSet::new();

		for tx in &transactions {
			touched_accounts.extend(tx.participants());
			for event in tx
				.events
				.iter()
				.filter(|e| e.kind == EventKind::OrganizationCreate)
			{
				match decode_string_payload(&event.data) {
					Ok(id) => {
						organizations.insert(id);
					}
					Err(e) => debug!("Skipping organization event in {}: {}", tx.hash, e),
				}
			}
		}

		debug!(
			"Processed block {} at height {} ({} transactions)",
			block.hash,
			block.height,
			transactions.len()
		);

		Ok(ProcessedBlock {
			bundle: BlockBundle {
				block: Block {
					hash: block.hash.clone(),
					chain_address: block.chain_address.clone(),
					previous_hash: block.previous_hash.clone(),
					height: block.height,
					timestamp,
					validator_address: block.validator_address.clone(),
					reward: parse_amount(&block.reward)?,
					payload: decode_hex_field(&block.payload)?,
					transaction_hashes: transactions.iter().map(|tx| tx.hash.clone()).collect(),
				},
				transactions,
			},
			touched_accounts,
			organizations,
		})
	}

	/// Decode a transaction and compute its persisted summary
	pub fn process_transaction(
		&self,
		tx: &TransactionResult,
		block: &BlockResult,
		block_timestamp: DateTime<Utc>,
	) -> Result<Transaction, SyncError> {
		let events = tx
			.events
			.iter()
			.map(parse_event)
			.collect::<Result<Vec<_>, _>>()
			.map_err(|e| {
				error!("[PROCESS_TRANSACTION] Failed to decode events of {}: {}", tx.hash, e);
				e
			})?;

		let timestamp = if tx.timestamp > 0 {
			parse_timestamp(tx.timestamp)?
		} else {
			block_timestamp
		};
		let summary = describe_transaction(&events, |symbol| self.token_decimals(symbol));

		Ok(Transaction {
			hash: tx.hash.clone(),
			block_hash: block.hash.clone(),
			chain_address: block.chain_address.clone(),
			block_height: block.height,
			script: decode_hex_field(&tx.script)?,
			result: tx.result.clone(),
			timestamp,
			events,
			summary,
		})
	}
}

fn parse_timestamp(seconds: i64) -> Result<DateTime<Utc>, SyncError> {
	Utc.timestamp_opt(seconds, 0)
		.single()
		.ok_or_else(|| SyncError::ParseError(format!("invalid timestamp {}", seconds)))
}

/// Whether any transaction of the block creates a token.
pub fn creates_token(block: &BlockResult) -> bool {
	block
		.txs
		.iter()
		.flat_map(|tx| &tx.events)
		.any(|e| EventKind::parse(&e.kind) == EventKind::TokenCreate)
}

pub fn parse_event(event: &EventResult) -> Result<Event, SyncError> {
	Ok(Event {
		kind: EventKind::parse(&event.kind),
		contract: event.contract.clone(),
		address: event.address.clone(),
		data: decode_hex_field(&event.data)?,
	})
}

pub fn chain_from_result(result: &ChainResult) -> Chain {
	Chain {
		address: result.address.clone(),
		name: result.name.clone(),
		parent_address: Some(result.parent.clone()).filter(|p| !p.is_empty()),
		height: 0,
		contracts: result.contracts.clone(),
	}
}

pub fn token_from_result(result: &TokenResult) -> Result<Token, SyncError> {
	Ok(Token {
		symbol: result.symbol.clone(),
		name: result.name.clone(),
		decimals: result.decimals,
		flags: TokenFlags::parse(&result.flags),
		current_supply: parse_amount(&result.current_supply)?,
		max_supply: parse_amount(&result.max_supply)?,
		metadata: result
			.metadata
			.iter()
			.map(|p| (p.key.clone(), p.value.clone()))
			.collect(),
	})
}

pub fn app_from_result(result: &AppResult) -> App {
	App {
		id: result.id.clone(),
		title: result.title.clone(),
		url: result.url.clone(),
		icon: result.icon.clone(),
		description: result.description.clone(),
	}
}

pub fn organization_from_result(result: &OrganizationResult) -> Organization {
	Organization {
		id: result.id.clone(),
		name: result.name.clone(),
		members: result.members.clone(),
	}
}

/// Balances with token ids are NFT holdings; everything else is fungible.
pub fn account_refresh_from_result(result: &AccountResult) -> Result<AccountRefresh, SyncError> {
	let mut balances = Vec::new();
	let mut nfts = Vec::new();

	for balance in &result.balances {
		if balance.ids.is_empty() {
			balances.push(FungibleBalance {
				symbol: balance.symbol.clone(),
				chain: balance.chain.clone(),
				amount: parse_amount(&balance.amount)?,
			});
		} else {
			nfts.extend(balance.ids.iter().map(|id| NftHolding {
				symbol: balance.symbol.clone(),
				token_id: id.clone(),
				chain: balance.chain.clone(),
			}));
		}
	}

	let staked = match &result.stakes {
		Some(stake) => parse_amount(&stake.amount)?,
		None => 0,
	};

	Ok(AccountRefresh {
		address: result.address.clone(),
		name: Some(result.name.clone()).filter(|n| !ANONYMOUS_NAMES.contains(&n.as_str())),
		staked,
		balances,
		nfts,
	})
}


#[cfg(test)]
mod tests {
	use super::fixtures::*;
	use super::*;
	use crate::events::codec::encode;
	use crate::mirror::InMemoryMirror;
	use crate::node::{BalanceResult, StakeResult};

	fn processor_with_soul() -> BlockProcessor {
		let store = Arc::new(InMemoryMirror::new());
		store
			.upsert_token(Token {
				symbol: "SOUL".into(),
				name: "Phantasma Stake".into(),
				decimals: 2,
				flags: TokenFlags::FUNGIBLE,
				current_supply: 0,
				max_supply: 0,
				metadata: Default::default(),
			})
			.unwrap();
		BlockProcessor::new(store)
	}

	#[test]
	fn test_process_block_describes_transfer() {
		let processed = processor_with_soul()
			.process_block(&remote_block("S3dMain", 3))
			.unwrap();

		let block = &processed.bundle.block;
		assert_eq!(block.height, 3);
		assert_eq!(block.previous_hash, "S3dMain-R2");
		assert_eq!(block.transaction_hashes, vec!["S3dMain-RT3".to_string()]);

		let tx = &processed.bundle.transactions[0];
		assert_eq!(tx.block_hash, block.hash);
		assert_eq!(tx.script, vec![0]);
		assert_eq!(tx.summary.description, "X transferred 1 SOUL to Y");
		assert_eq!(
			processed.touched_accounts,
			["X".to_string(), "Y".to_string()].into_iter().collect()
		);
		assert!(!creates_token(&remote_block("S3dMain", 3)));
	}

	#[test]
	fn test_process_block_collects_follow_ups() {
		let block = remote_block_with_events(
			"S3dMain",
			1,
			vec![
				event("OrganizationCreate", "A", &encode::string_event("validators")),
				event("TokenCreate", "A", &encode::string_event("NACHO")),
			],
		);
		let processed = processor_with_soul().process_block(&block).unwrap();
		assert!(processed.organizations.contains("validators"));
		assert!(creates_token(&block));
	}

	#[test]
	fn test_bad_event_hex_is_rejected() {
		let block = remote_block_with_events("S3dMain", 1, vec![event("TokenSend", "X", &[])]);
		let mut block = block;
		block.txs[0].events[0].data = "zz".into();
		assert!(processor_with_soul().process_block(&block).is_err());
	}

	#[test]
	fn test_account_refresh_splits_nfts() {
		let result = AccountResult {
			address: "X".into(),
			name: "anonymous".into(),
			stakes: Some(StakeResult {
				amount: "500".into(),
				time: 0,
				unclaimed: "0".into(),
			}),
			balances: vec![
				BalanceResult {
					chain: "main".into(),
					amount: "1200".into(),
					symbol: "SOUL".into(),
					decimals: 8,
					ids: vec![],
				},
				BalanceResult {
					chain: "main".into(),
					amount: "2".into(),
					symbol: "CROWN".into(),
					decimals: 0,
					ids: vec!["1".into(), "2".into()],
				},
			],
		};

		let refresh = account_refresh_from_result(&result).unwrap();
		assert_eq!(refresh.name, None);
		assert_eq!(refresh.staked, 500);
		assert_eq!(refresh.balances.len(), 1);
		assert_eq!(refresh.balances[0].amount, 1200);
		assert_eq!(refresh.nfts.len(), 2);
	}

	#[test]
	fn test_chain_without_parent() {
		let chain = chain_from_result(&ChainResult {
			name: "main".into(),
			address: "S3dMain".into(),
			parent: String::new(),
			height: 10,
			contracts: vec![],
		});
		assert_eq!(chain.parent_address, None);
		assert_eq!(chain.height, 0);
	}
}
