//! JSON shapes served by the API.
//!
//! Amounts leave the API as decimal strings, both raw and formatted with the token's decimals.
//! Binary fields leave as hex.

use crate::mirror::{
	Account, Block, Chain, Event, MirrorQuery, NftHolding, RichListEntry, StoreError, Token,
	Transaction, Transfer,
};
use crate::utils::format_token_amount;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AmountView {
	pub raw: String,
	pub formatted: String,
}

impl AmountView {
	pub fn new(amount: u128, decimals: u32) -> Self {
		Self {
			raw: amount.to_string(),
			formatted: format_token_amount(amount, decimals),
		}
	}
}

fn decimals_of(query: &MirrorQuery, symbol: &str) -> Result<u32, StoreError> {
	Ok(query.store().token(symbol)?.map(|t| t.decimals).unwrap_or(0))
}

#[derive(Debug, Clone, Serialize)]
pub struct ChainView {
	pub address: String,
	pub name: String,
	pub parent_address: Option<String>,
	pub height: u64,
	pub contracts: Vec<String>,
	pub transaction_count: usize,
}

impl ChainView {
	pub fn build(query: &MirrorQuery, chain: Chain) -> Result<Self, StoreError> {
		Ok(Self {
			transaction_count: query.chain_transaction_count(&chain.address)?,
			address: chain.address,
			name: chain.name,
			parent_address: chain.parent_address,
			height: chain.height,
			contracts: chain.contracts,
		})
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct EventView {
	pub kind: String,
	pub contract: String,
	pub address: String,
	pub data: String,
}

impl From<Event> for EventView {
	fn from(event: Event) -> Self {
		Self {
			kind: event.kind.to_string(),
			contract: event.contract,
			address: event.address,
			data: hex::encode(event.data),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferView {
	pub sender: String,
	pub receiver: String,
	pub symbol: String,
	pub amount: AmountView,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionView {
	pub hash: String,
	pub block_hash: String,
	pub chain_address: String,
	pub block_height: u64,
	pub timestamp: DateTime<Utc>,
	pub description: String,
	pub transfer: Option<TransferView>,
	pub fee: AmountView,
	pub result: String,
	pub script: String,
	pub events: Vec<EventView>,
}

impl TransactionView {
	/// `fee_decimals` are the decimals of the token gas is paid in.
	pub fn build(
		query: &MirrorQuery,
		tx: Transaction,
		fee_decimals: u32,
	) -> Result<Self, StoreError> {
		let transfer = match tx.summary.transfer {
			Some(Transfer {
				amount,
				symbol,
				sender,
				receiver,
			}) => Some(TransferView {
				amount: AmountView::new(amount, decimals_of(query, &symbol)?),
				sender,
				receiver,
				symbol,
			}),
			None => None,
		};

		Ok(Self {
			hash: tx.hash,
			block_hash: tx.block_hash,
			chain_address: tx.chain_address,
			block_height: tx.block_height,
			timestamp: tx.timestamp,
			description: tx.summary.description,
			transfer,
			fee: AmountView::new(tx.summary.fee, fee_decimals),
			result: tx.result,
			script: hex::encode(tx.script),
			events: tx.events.into_iter().map(EventView::from).collect(),
		})
	}

	pub fn build_all(
		query: &MirrorQuery,
		txs: Vec<Transaction>,
		fee_decimals: u32,
	) -> Result<Vec<Self>, StoreError> {
		txs.into_iter()
			.map(|tx| Self::build(query, tx, fee_decimals))
			.collect()
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockSummaryView {
	pub hash: String,
	pub chain_address: String,
	pub height: u64,
	pub timestamp: DateTime<Utc>,
	pub validator_address: String,
	pub transaction_count: usize,
}

impl From<Block> for BlockSummaryView {
	fn from(block: Block) -> Self {
		Self {
			transaction_count: block.transaction_hashes.len(),
			hash: block.hash,
			chain_address: block.chain_address,
			height: block.height,
			timestamp: block.timestamp,
			validator_address: block.validator_address,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockView {
	pub hash: String,
	pub previous_hash: String,
	pub chain_address: String,
	pub height: u64,
	pub timestamp: DateTime<Utc>,
	pub validator_address: String,
	pub reward: AmountView,
	pub payload: String,
	pub transactions: Vec<TransactionView>,
}

impl BlockView {
	pub fn build(
		query: &MirrorQuery,
		block: Block,
		fee_decimals: u32,
	) -> Result<Self, StoreError> {
		let transactions = query.store().block_transactions(&block.hash)?;
		Ok(Self {
			transactions: TransactionView::build_all(query, transactions, fee_decimals)?,
			hash: block.hash,
			previous_hash: block.previous_hash,
			chain_address: block.chain_address,
			height: block.height,
			timestamp: block.timestamp,
			validator_address: block.validator_address,
			reward: AmountView::new(block.reward, fee_decimals),
			payload: hex::encode(block.payload),
		})
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
	pub symbol: String,
	pub chain: String,
	pub amount: AmountView,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
	pub address: String,
	pub name: Option<String>,
	pub staked: AmountView,
	pub balances: Vec<BalanceView>,
	pub nfts: Vec<NftHolding>,
	pub transaction_count: usize,
}

impl AccountView {
	/// `stake_decimals` are the decimals of the staked (native) token.
	pub fn build(
		query: &MirrorQuery,
		account: Account,
		stake_decimals: u32,
	) -> Result<Self, StoreError> {
		let balances = account
			.balances
			.into_iter()
			.map(|b| {
				Ok(BalanceView {
					amount: AmountView::new(b.amount, decimals_of(query, &b.symbol)?),
					symbol: b.symbol,
					chain: b.chain,
				})
			})
			.collect::<Result<Vec<_>, StoreError>>()?;

		Ok(Self {
			transaction_count: account.transactions.len(),
			address: account.address,
			name: account.name,
			staked: AmountView::new(account.staked, stake_decimals),
			balances,
			nfts: account.nfts,
		})
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenView {
	pub symbol: String,
	pub name: String,
	pub decimals: u32,
	pub fungible: bool,
	pub flags: u32,
	pub current_supply: AmountView,
	pub max_supply: AmountView,
	pub metadata: BTreeMap<String, String>,
	pub transaction_count: usize,
}

impl TokenView {
	pub fn build(query: &MirrorQuery, token: Token) -> Result<Self, StoreError> {
		Ok(Self {
			transaction_count: query.token_transaction_count(&token.symbol)?,
			fungible: token.is_fungible(),
			flags: token.flags.bits(),
			current_supply: AmountView::new(token.current_supply, token.decimals),
			max_supply: AmountView::new(token.max_supply, token.decimals),
			symbol: token.symbol,
			name: token.name,
			decimals: token.decimals,
			metadata: token.metadata,
		})
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct RichListView {
	pub rank: usize,
	pub address: String,
	pub name: Option<String>,
	pub balance: AmountView,
}

impl RichListView {
	pub fn build(entries: Vec<RichListEntry>, decimals: u32) -> Vec<Self> {
		entries
			.into_iter()
			.enumerate()
			.map(|(i, entry)| Self {
				rank: i + 1,
				address: entry.address,
				name: entry.name,
				balance: AmountView::new(entry.balance, decimals),
			})
			.collect()
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorView {
	pub error: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_amount_view() {
		let amount = AmountView::new(150_000_000, 8);
		assert_eq!(amount.raw, "150000000");
		assert_eq!(amount.formatted, "1.5");
	}

	#[test]
	fn test_rich_list_ranks_from_one() {
		let views = RichListView::build(
			vec![
				RichListEntry {
					address: "Y".into(),
					name: None,
					balance: 200,
				},
				RichListEntry {
					address: "X".into(),
					name: Some("x".into()),
					balance: 50,
				},
			],
			0,
		);
		assert_eq!(views[0].rank, 1);
		assert_eq!(views[1].rank, 2);
		assert_eq!(views[1].balance.formatted, "50");
	}
}
