//! Remote node integration module
//!
//! This module provides the client and types for talking to the chain node's JSON-RPC API.
//! The node is the source of truth for chains, blocks, accounts, tokens, applications and
//! organizations; the explorer only ever reads from it.

/// JSON-RPC client and the `ChainSource` seam
mod client;
/// Type definitions for node responses
mod types;

pub use client::{ChainSource, NodeRpcClient};
pub use types::*;
