//! Block explorer backend for a multi-chain network.
//!
//! The synchronizer mirrors chains, blocks, transactions, accounts and reference data from a
//! node's JSON-RPC API into a local store; the API serves the mirror as JSON.

pub mod api;
pub mod config;
pub mod events;
pub mod mirror;
pub mod node;
pub mod search;
pub mod sync;
pub mod utils;
