//! Human readable descriptions of transactions.
//!
//! `describe_transaction` scans a transaction's events once. Gas events only feed the fee
//! accounting; recognized kinds each add one narrative line; a single matched send/receive
//! pair is promoted to a structured transfer.

use super::codec::{GasEventData, PayloadReader, TokenEventData, decode_string_payload};
use crate::mirror::{Event, EventKind, TransactionSummary, Transfer};
use crate::utils::format_token_amount;

use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Description used when no event produced a line.
pub const CUSTOM_TRANSACTION: &str = "Custom Transaction";

#[derive(Debug, Default)]
struct GasLedger {
	escrowed: u128,
	paid: u128,
}

struct TokenMove {
	address: String,
	symbol: String,
	amount: u128,
}

/// Build the persisted summary for a transaction.
///
/// `decimals` resolves a token symbol to its decimals; unknown tokens render raw amounts.
pub fn describe_transaction<F>(events: &[Event], decimals: F) -> TransactionSummary
where
	F: Fn(&str) -> Option<u32>,
{
	let mut lines = Vec::new();
	let mut gas: BTreeMap<String, GasLedger> = BTreeMap::new();
	let mut sends = Vec::new();
	let mut receives = Vec::new();
	let mut token_symbols = BTreeSet::new();

	let amount = |value: u128, symbol: &str| {
		format!(
			"{} {}",
			format_token_amount(value, decimals(symbol).unwrap_or(0)),
			symbol
		)
	};

	for event in events {
		if event.kind.is_gas() {
			match GasEventData::decode(&event.data) {
				Ok(data) => {
					let entry = gas.entry(event.address.clone()).or_default();
					if event.kind == EventKind::GasEscrow {
						entry.escrowed = entry.escrowed.saturating_add(data.fee());
					} else {
						entry.paid = entry.paid.saturating_add(data.fee());
					}
				}
				Err(e) => debug!("Skipping undecodable {} event: {}", event.kind, e),
			}
			continue;
		}

		if event.kind.is_token_movement() {
			let data = match TokenEventData::decode(&event.data) {
				Ok(data) => data,
				Err(e) => {
					debug!("Skipping undecodable {} event: {}", event.kind, e);
					continue;
				}
			};
			token_symbols.insert(data.symbol.clone());

			let verb = match event.kind {
				EventKind::TokenMint => "minted",
				EventKind::TokenBurn => "burned",
				EventKind::TokenSend => "sent",
				EventKind::TokenReceive => "received",
				EventKind::TokenStake => "staked",
				EventKind::TokenClaim => "claimed",
				_ => continue,
			};
			lines.push(format!(
				"{} {} {}",
				event.address,
				verb,
				amount(data.value, &data.symbol)
			));

			let movement = TokenMove {
				address: event.address.clone(),
				symbol: data.symbol,
				amount: data.value,
			};
			match event.kind {
				EventKind::TokenSend => sends.push(movement),
				EventKind::TokenReceive => receives.push(movement),
				_ => {}
			}
			continue;
		}

		let line = match &event.kind {
			EventKind::ChainCreate => decode_string_payload(&event.data)
				.map(|name| format!("{} created chain {}", event.address, name)),
			EventKind::TokenCreate => decode_string_payload(&event.data)
				.map(|symbol| format!("{} created token {}", event.address, symbol)),
			EventKind::OrganizationCreate => decode_string_payload(&event.data)
				.map(|id| format!("{} created organization {}", event.address, id)),
			EventKind::PlatformCreate => decode_string_payload(&event.data)
				.map(|name| format!("{} created platform {}", event.address, name)),
			EventKind::AddressRegister => decode_string_payload(&event.data)
				.map(|name| format!("{} registered the name {}", event.address, name)),
			EventKind::ValidatorElect => PayloadReader::new(&event.data)
				.read_byte_array()
				.map(|validator| {
					format!(
						"{} elected validator {}",
						event.address,
						hex::encode(validator)
					)
				}),
			_ => continue,
		};

		match line {
			Ok(line) => lines.push(line),
			Err(e) => debug!("Skipping undecodable {} event: {}", event.kind, e),
		}
	}

	let fee = gas
		.values()
		.fold(0u128, |acc, ledger| acc.saturating_add(ledger.paid));
	for (payer, ledger) in &gas {
		debug!(
			"Gas for {}: escrowed {}, paid {}",
			payer, ledger.escrowed, ledger.paid
		);
	}

	let transfer = single_transfer(&sends, &receives);
	let description = match &transfer {
		Some(t) => format!(
			"{} transferred {} to {}",
			t.sender,
			amount(t.amount, &t.symbol),
			t.receiver
		),
		None if lines.is_empty() => CUSTOM_TRANSACTION.to_string(),
		None => lines.join("\n"),
	};

	TransactionSummary {
		description,
		transfer,
		fee,
		token_symbols,
	}
}

/// Pair every send with the first unused receive of the same token and amount. Only a single
/// pair counts as a transfer.
fn single_transfer(sends: &[TokenMove], receives: &[TokenMove]) -> Option<Transfer> {
	let mut used = vec![false; receives.len()];
	let mut pairs = Vec::new();

	for send in sends {
		let matched = receives.iter().enumerate().position(|(i, receive)| {
			!used[i] && receive.symbol == send.symbol && receive.amount == send.amount
		});
		if let Some(i) = matched {
			used[i] = true;
			pairs.push((send, &receives[i]));
		}
	}

	match pairs.as_slice() {
		[(send, receive)] => Some(Transfer {
			amount: send.amount,
			symbol: send.symbol.clone(),
			sender: send.address.clone(),
			receiver: receive.address.clone(),
		}),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::events::codec::encode;

	fn event(kind: EventKind, address: &str, data: Vec<u8>) -> Event {
		Event {
			kind,
			contract: "token".to_string(),
			address: address.to_string(),
			data,
		}
	}

	fn decimals(symbol: &str) -> Option<u32> {
		match symbol {
			"SOUL" => Some(8),
			"KCAL" => Some(10),
			_ => None,
		}
	}

	#[test]
	fn test_matched_send_receive_is_transfer() {
		let events = vec![
			event(
				EventKind::GasEscrow,
				"X",
				encode::gas_event(&[1; 34], 100_000, 500),
			),
			event(
				EventKind::TokenSend,
				"X",
				encode::token_event("SOUL", 150_000_000, "main"),
			),
			event(
				EventKind::TokenReceive,
				"Y",
				encode::token_event("SOUL", 150_000_000, "main"),
			),
			event(
				EventKind::GasPayment,
				"X",
				encode::gas_event(&[1; 34], 100_000, 420),
			),
		];

		let summary = describe_transaction(&events, decimals);
		let transfer = summary.transfer.expect("transfer");
		assert_eq!(transfer.amount, 150_000_000);
		assert_eq!(transfer.symbol, "SOUL");
		assert_eq!(transfer.sender, "X");
		assert_eq!(transfer.receiver, "Y");
		assert_eq!(summary.description, "X transferred 1.5 SOUL to Y");
		assert_eq!(summary.fee, 42_000_000);
		assert!(summary.token_symbols.contains("SOUL"));
	}

	#[test]
	fn test_two_pairs_fall_back_to_narrative() {
		let events = vec![
			event(EventKind::TokenSend, "X", encode::token_event("SOUL", 1, "main")),
			event(EventKind::TokenReceive, "Y", encode::token_event("SOUL", 1, "main")),
			event(EventKind::TokenSend, "X", encode::token_event("KCAL", 2, "main")),
			event(EventKind::TokenReceive, "Z", encode::token_event("KCAL", 2, "main")),
		];

		let summary = describe_transaction(&events, decimals);
		assert!(summary.transfer.is_none());
		assert_eq!(summary.description.lines().count(), 4);
		assert!(summary.description.starts_with("X sent 0.00000001 SOUL"));
	}

	#[test]
	fn test_mismatched_amount_is_not_transfer() {
		let events = vec![
			event(EventKind::TokenSend, "X", encode::token_event("SOUL", 10, "main")),
			event(EventKind::TokenReceive, "Y", encode::token_event("SOUL", 9, "main")),
		];
		assert!(describe_transaction(&events, decimals).transfer.is_none());
	}

	#[test]
	fn test_recognized_kinds_produce_lines() {
		let events = vec![
			event(EventKind::TokenCreate, "A", encode::string_event("NACHO")),
			event(EventKind::AddressRegister, "A", encode::string_event("alice")),
			event(EventKind::TokenMint, "A", encode::token_event("NACHO", 7, "main")),
		];

		let summary = describe_transaction(&events, decimals);
		assert_eq!(
			summary.description,
			"A created token NACHO\nA registered the name alice\nA minted 7 NACHO"
		);
	}

	#[test]
	fn test_only_gas_and_unknown_is_custom() {
		let events = vec![
			event(
				EventKind::GasEscrow,
				"X",
				encode::gas_event(&[0; 34], 1, 1),
			),
			event(EventKind::Unknown("LeaderboardInsert".into()), "X", vec![]),
			// undecodable payloads are skipped
			event(EventKind::TokenSend, "X", vec![0xFF]),
		];

		let summary = describe_transaction(&events, decimals);
		assert_eq!(summary.description, CUSTOM_TRANSACTION);
		assert_eq!(summary.fee, 0);
	}
}
