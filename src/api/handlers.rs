use super::views::*;
use crate::mirror::{MirrorQuery, Page, StoreError, TokenFlags};
use crate::search::Search;

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::error;
use warp::http::{StatusCode, Uri};
use warp::reply::{Reply, Response};

/// Upper bound for caller-chosen list lengths.
pub const MAX_LIST_LENGTH: usize = 1000;

const DEFAULT_RICH_LIST_SIZE: usize = 20;

/// Shared state of every handler
#[derive(Clone)]
pub struct ApiState {
	pub query: MirrorQuery,
	pub search: Arc<Search>,
}

impl ApiState {
	pub fn new(query: MirrorQuery) -> Self {
		Self {
			search: Arc::new(Search::new(query.clone())),
			query,
		}
	}

	/// Decimals of the token gas and block rewards are paid in.
	fn fuel_decimals(&self) -> Result<u32, StoreError> {
		Ok(self
			.query
			.store()
			.tokens()?
			.into_iter()
			.find(|t| t.flags.contains(TokenFlags::FUEL))
			.map(|t| t.decimals)
			.unwrap_or(0))
	}

	fn native_decimals(&self) -> Result<u32, StoreError> {
		Ok(self
			.query
			.find_token(self.query.native_token())?
			.map(|t| t.decimals)
			.unwrap_or(0))
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
	pub chain: Option<String>,
	pub page: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RichListParams {
	pub top: Option<usize>,
}

pub fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
	warp::reply::with_status(
		warp::reply::json(&ErrorView {
			error: message.into(),
		}),
		status,
	)
	.into_response()
}

fn not_found(what: &str, key: &str) -> Response {
	error_reply(StatusCode::NOT_FOUND, format!("{} {} not found", what, key))
}

/// 200 with the value, 404 on a miss, 500 on a store failure.
fn respond<T: Serialize>(result: Result<Option<T>, StoreError>, what: &str, key: &str) -> Response {
	match result {
		Ok(Some(value)) => warp::reply::json(&value).into_response(),
		Ok(None) => not_found(what, key),
		Err(e) => {
			error!("Failed to serve {} {}: {}", what, key, e);
			error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
		}
	}
}

/// Resolve an optional chain filter (address or name) to an address.
fn resolve_chain(state: &ApiState, input: Option<&str>) -> Result<Option<Option<String>>, StoreError> {
	match input {
		None => Ok(Some(None)),
		Some(input) => Ok(state.query.find_chain(input)?.map(|c| Some(c.address))),
	}
}

fn account_view(state: &ApiState, address: &str) -> Result<Option<AccountView>, StoreError> {
	let Some(account) = state.query.find_account(address)? else {
		return Ok(None);
	};
	AccountView::build(&state.query, account, state.native_decimals()?).map(Some)
}

pub async fn get_account(address: String, state: ApiState) -> Result<Response, Infallible> {
	Ok(respond(account_view(&state, &address), "Account", &address))
}

fn account_transactions(
	state: &ApiState,
	address: &str,
	amount: usize,
) -> Result<Option<Vec<TransactionView>>, StoreError> {
	let Some(account) = state.query.find_account(address)? else {
		return Ok(None);
	};
	let txs = state
		.query
		.account_transactions(&account.address, amount.min(MAX_LIST_LENGTH))?;
	TransactionView::build_all(&state.query, txs, state.fuel_decimals()?).map(Some)
}

pub async fn get_account_txs(
	address: String,
	amount: usize,
	state: ApiState,
) -> Result<Response, Infallible> {
	let result = account_transactions(&state, &address, amount);
	Ok(respond(result, "Account", &address))
}

fn block_view(state: &ApiState, hash: &str) -> Result<Option<BlockView>, StoreError> {
	let Some(block) = state.query.store().block_by_hash(hash)? else {
		return Ok(None);
	};
	BlockView::build(&state.query, block, state.fuel_decimals()?).map(Some)
}

pub async fn get_block(hash: String, state: ApiState) -> Result<Response, Infallible> {
	Ok(respond(block_view(&state, &hash), "Block", &hash))
}

fn transaction_view(state: &ApiState, hash: &str) -> Result<Option<TransactionView>, StoreError> {
	let Some(tx) = state.query.store().transaction(hash)? else {
		return Ok(None);
	};
	TransactionView::build(&state.query, tx, state.fuel_decimals()?).map(Some)
}

pub async fn get_transaction(hash: String, state: ApiState) -> Result<Response, Infallible> {
	Ok(respond(transaction_view(&state, &hash), "Transaction", &hash))
}

pub async fn search(input: String, state: ApiState) -> Result<Response, Infallible> {
	let response = match state.search.search(&input) {
		Ok(Some(hit)) => match Uri::try_from(hit.route()) {
			Ok(uri) => warp::redirect::see_other(uri).into_response(),
			Err(e) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
		},
		Ok(None) => not_found("Search result for", &input),
		Err(e) => error_reply(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
	};
	Ok(response)
}

pub async fn list_chains(state: ApiState) -> Result<Response, Infallible> {
	let result = state.query.store().chains().and_then(|chains| {
		chains
			.into_iter()
			.map(|chain| ChainView::build(&state.query, chain))
			.collect::<Result<Vec<_>, _>>()
			.map(Some)
	});
	Ok(respond(result, "Chains", ""))
}

pub async fn get_chain(input: String, state: ApiState) -> Result<Response, Infallible> {
	let result = state
		.query
		.find_chain(&input)
		.and_then(|chain| chain.map(|c| ChainView::build(&state.query, c)).transpose());
	Ok(respond(result, "Chain", &input))
}

fn blocks_page(
	state: &ApiState,
	params: &ListParams,
) -> Result<Option<Page<BlockSummaryView>>, StoreError> {
	let Some(chain) = resolve_chain(state, params.chain.as_deref())? else {
		return Ok(None);
	};
	let page = state
		.query
		.blocks_page(chain.as_deref(), params.page.unwrap_or(1))?;
	Ok(Some(Page {
		items: page.items.into_iter().map(BlockSummaryView::from).collect(),
		pagination: page.pagination,
	}))
}

pub async fn list_blocks(params: ListParams, state: ApiState) -> Result<Response, Infallible> {
	let key = params.chain.clone().unwrap_or_default();
	Ok(respond(blocks_page(&state, &params), "Chain", &key))
}

fn transactions_page(
	state: &ApiState,
	params: &ListParams,
) -> Result<Option<Page<TransactionView>>, StoreError> {
	let Some(chain) = resolve_chain(state, params.chain.as_deref())? else {
		return Ok(None);
	};
	let page = state
		.query
		.transactions_page(chain.as_deref(), params.page.unwrap_or(1))?;
	Ok(Some(Page {
		items: TransactionView::build_all(&state.query, page.items, state.fuel_decimals()?)?,
		pagination: page.pagination,
	}))
}

pub async fn list_transactions(params: ListParams, state: ApiState) -> Result<Response, Infallible> {
	let key = params.chain.clone().unwrap_or_default();
	Ok(respond(transactions_page(&state, &params), "Chain", &key))
}

pub async fn list_tokens(state: ApiState) -> Result<Response, Infallible> {
	let result = state.query.store().tokens().and_then(|tokens| {
		tokens
			.into_iter()
			.map(|token| TokenView::build(&state.query, token))
			.collect::<Result<Vec<_>, _>>()
			.map(Some)
	});
	Ok(respond(result, "Tokens", ""))
}

pub async fn get_token(input: String, state: ApiState) -> Result<Response, Infallible> {
	let result = state
		.query
		.find_token(&input)
		.and_then(|token| token.map(|t| TokenView::build(&state.query, t)).transpose());
	Ok(respond(result, "Token", &input))
}

pub async fn rich_list(
	symbol: String,
	params: RichListParams,
	state: ApiState,
) -> Result<Response, Infallible> {
	let top = params
		.top
		.unwrap_or(DEFAULT_RICH_LIST_SIZE)
		.min(MAX_LIST_LENGTH);
	Ok(respond(rich_list_view(&state, &symbol, top), "Token", &symbol))
}

fn rich_list_view(
	state: &ApiState,
	symbol: &str,
	top: usize,
) -> Result<Option<Vec<RichListView>>, StoreError> {
	let Some(token) = state.query.find_token(symbol)? else {
		return Ok(None);
	};
	let entries = state.query.rich_list(Some(&token.symbol), top)?;
	Ok(Some(RichListView::build(entries, token.decimals)))
}

pub async fn list_apps(state: ApiState) -> Result<Response, Infallible> {
	Ok(respond(state.query.store().apps().map(Some), "Apps", ""))
}

pub async fn get_app(id: String, state: ApiState) -> Result<Response, Infallible> {
	Ok(respond(state.query.store().app(&id), "App", &id))
}

pub async fn list_organizations(state: ApiState) -> Result<Response, Infallible> {
	Ok(respond(
		state.query.store().organizations().map(Some),
		"Organizations",
		"",
	))
}

pub async fn get_organization(id: String, state: ApiState) -> Result<Response, Infallible> {
	Ok(respond(
		state.query.store().organization(&id),
		"Organization",
		&id,
	))
}
