//! JSON API over the mirror.
//!
//! Every route is read-only. Lookups that miss answer 404 with `{"error": ...}`; search answers
//! with a redirect to the detail route of the first hit.

/// Route handlers
pub mod handlers;
/// Response shapes
pub mod views;

pub use handlers::ApiState;

use handlers::{ListParams, RichListParams, error_reply};
use percent_encoding::percent_decode_str;
use std::convert::Infallible;
use std::net::SocketAddr;
use tracing::info;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// A path segment that is not valid percent-encoded UTF-8.
#[derive(Debug)]
struct InvalidSegment(String);

impl warp::reject::Reject for InvalidSegment {}

fn with_state(
	state: ApiState,
) -> impl Filter<Extract = (ApiState,), Error = Infallible> + Clone {
	warp::any().map(move || state.clone())
}

/// Next path segment, percent-decoded.
fn segment() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
	warp::path::param::<String>().and_then(|raw: String| async move {
		let decoded = percent_decode_str(&raw)
			.decode_utf8()
			.map(|s| s.into_owned());
		decoded.map_err(|_| warp::reject::custom(InvalidSegment(raw)))
	})
}

/// All API routes, including the rejection handler.
pub fn routes(
	state: ApiState,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
	let health = warp::path!("health")
		.and(warp::get())
		.map(|| warp::reply::with_status("OK", StatusCode::OK));

	let get_account = warp::path!("api" / "get_account" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::get_account);

	let get_block = warp::path!("api" / "get_block" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::get_block);

	let get_account_txs = warp::path!("api" / "get_account_txs" / ..)
		.and(segment())
		.and(warp::path::param::<usize>())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::get_account_txs);

	let search = warp::path!("api" / "search" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::search);

	let chains = warp::path!("api" / "chains")
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::list_chains);

	let chain = warp::path!("api" / "chain" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::get_chain);

	let blocks = warp::path!("api" / "blocks")
		.and(warp::get())
		.and(warp::query::<ListParams>())
		.and(with_state(state.clone()))
		.and_then(handlers::list_blocks);

	let transactions = warp::path!("api" / "transactions")
		.and(warp::get())
		.and(warp::query::<ListParams>())
		.and(with_state(state.clone()))
		.and_then(handlers::list_transactions);

	let transaction = warp::path!("api" / "transaction" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::get_transaction);

	let tokens = warp::path!("api" / "tokens")
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::list_tokens);

	let token = warp::path!("api" / "token" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::get_token);

	let rich_list = warp::path!("api" / "rich_list" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(warp::query::<RichListParams>())
		.and(with_state(state.clone()))
		.and_then(handlers::rich_list);

	let apps = warp::path!("api" / "apps")
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::list_apps);

	let app = warp::path!("api" / "app" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::get_app);

	let organizations = warp::path!("api" / "organizations")
		.and(warp::get())
		.and(with_state(state.clone()))
		.and_then(handlers::list_organizations);

	let organization = warp::path!("api" / "organization" / ..)
		.and(segment())
		.and(warp::path::end())
		.and(warp::get())
		.and(with_state(state))
		.and_then(handlers::get_organization);

	health
		.or(get_account)
		.or(get_block)
		.or(get_account_txs)
		.or(search)
		.or(chains)
		.or(chain)
		.or(blocks)
		.or(transactions)
		.or(transaction)
		.or(tokens)
		.or(token)
		.or(rich_list)
		.or(apps)
		.or(app)
		.or(organizations)
		.or(organization)
		.recover(handle_rejection)
}

async fn handle_rejection(rejection: Rejection) -> Result<warp::reply::Response, Infallible> {
	let response = if let Some(InvalidSegment(raw)) = rejection.find::<InvalidSegment>() {
		error_reply(
			StatusCode::BAD_REQUEST,
			format!("Invalid path segment {}", raw),
		)
	} else if rejection.is_not_found() {
		error_reply(StatusCode::NOT_FOUND, "Not found")
	} else if rejection
		.find::<warp::reject::InvalidQuery>()
		.is_some()
	{
		error_reply(StatusCode::BAD_REQUEST, "Invalid query string")
	} else if rejection
		.find::<warp::reject::MethodNotAllowed>()
		.is_some()
	{
		error_reply(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
	} else {
		error_reply(StatusCode::INTERNAL_SERVER_ERROR, format!("{:?}", rejection))
	};
	Ok(response)
}

/// Serve the API until the process exits.
pub async fn serve(state: ApiState, addr: SocketAddr) {
	info!("Serving explorer API on http://{}", addr);
	warp::serve(routes(state)).run(addr).await;
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::mirror::store::fixtures::*;
	use crate::mirror::{
		AccountRefresh, FungibleBalance, InMemoryMirror, MirrorQuery, MirrorStore, Token,
		TokenFlags,
	};
	use serde_json::Value;
	use std::sync::Arc;

	fn state() -> ApiState {
		let store = Arc::new(InMemoryMirror::new());
		store.upsert_chain(chain("S3dMain", "main")).unwrap();
		for h in 1..=3 {
			store.apply_block(bundle("S3dMain", h, &["X"])).unwrap();
		}
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
			.upsert_token(Token {
				symbol: "KCAL".into(),
				name: "Phantasma Energy".into(),
				decimals: 10,
				flags: TokenFlags::parse("Fungible,Fuel"),
				current_supply: 0,
				max_supply: 0,
				metadata: Default::default(),
			})
			.unwrap();
		for (address, amount) in [("X", 250_000_000u128), ("Y", 900_000_000)] {
			store
				.refresh_account(AccountRefresh {
					address: address.into(),
					balances: vec![FungibleBalance {
						symbol: "SOUL".into(),
						chain: "main".into(),
						amount,
					}],
					..Default::default()
				})
				.unwrap();
		}
		ApiState::new(MirrorQuery::new(store))
	}

	async fn get(path: &str) -> (StatusCode, Value) {
		let response = warp::test::request()
			.method("GET")
			.path(path)
			.reply(&routes(state()))
			.await;
		let body = serde_json::from_slice(response.body()).unwrap_or(Value::Null);
		(response.status(), body)
	}

	#[tokio::test]
	async fn test_health() {
		let response = warp::test::request()
			.path("/health")
			.reply(&routes(state()))
			.await;
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[tokio::test]
	async fn test_get_account() {
		let (status, body) = get("/api/get_account/X").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["address"], "X");
		assert_eq!(body["balances"][0]["amount"]["formatted"], "2.5");
		assert_eq!(body["transaction_count"], 3);
	}

	#[tokio::test]
	async fn test_unknown_account_is_json_404() {
		let (status, body) = get("/api/get_account/nobody").await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert!(body["error"].as_str().unwrap().contains("nobody"));
	}

	#[tokio::test]
	async fn test_get_block_with_transactions() {
		let (status, body) = get("/api/get_block/S3dMain-B2").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["height"], 2);
		assert_eq!(body["transactions"][0]["hash"], "S3dMain-T2");
	}

	#[tokio::test]
	async fn test_account_txs_most_recent_first() {
		let (status, body) = get("/api/get_account_txs/X/2").await;
		assert_eq!(status, StatusCode::OK);
		let txs = body.as_array().unwrap();
		assert_eq!(txs.len(), 2);
		assert_eq!(txs[0]["block_height"], 3);
	}

	#[tokio::test]
	async fn test_blocks_page_by_chain_name() {
		let (status, body) = get("/api/blocks?chain=main&page=1").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["pagination"]["count"], 3);
		assert_eq!(body["pagination"]["total_pages"], 1);
		assert_eq!(body["pagination"]["show_next"], false);
		assert_eq!(body["pagination"]["show_previous"], false);
		assert_eq!(body["items"][0]["height"], 3);

		let (status, _) = get("/api/blocks?chain=nowhere").await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_rich_list() {
		let (status, body) = get("/api/rich_list/soul?top=1").await;
		assert_eq!(status, StatusCode::OK);
		let entries = body.as_array().unwrap();
		assert_eq!(entries.len(), 1);
		assert_eq!(entries[0]["address"], "Y");
		assert_eq!(entries[0]["balance"]["formatted"], "9");
	}

	#[tokio::test]
	async fn test_search_redirects() {
		let response = warp::test::request()
			.path("/api/search/S3dMain-T1")
			.reply(&routes(state()))
			.await;
		assert_eq!(response.status(), StatusCode::SEE_OTHER);
		assert_eq!(
			response.headers()["location"],
			"/api/transaction/S3dMain-T1"
		);

		let (status, _) = get("/api/search/unknown").await;
		assert_eq!(status, StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn test_lookup_by_name_with_space() {
		let (status, body) = get("/api/token/Phantasma%20Energy").await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["symbol"], "KCAL");

		let response = warp::test::request()
			.path("/api/search/Phantasma%20Energy")
			.reply(&routes(state()))
			.await;
		assert_eq!(response.status(), StatusCode::SEE_OTHER);
		assert_eq!(response.headers()["location"], "/api/token/KCAL");
	}

	#[tokio::test]
	async fn test_invalid_utf8_segment_is_400() {
		let (status, body) = get("/api/token/%FF").await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert!(body["error"].as_str().unwrap().contains("%FF"));
	}

	#[tokio::test]
	async fn test_unknown_route_is_json_404() {
		let (status, body) = get("/api/nothing").await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "Not found");
	}
}
