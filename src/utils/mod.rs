//!
//! Utility module for the explorer.
//!
//! Re-exports formatting helpers used by the description generator and the API.
/// Utility functions for formatting and display
pub mod index;

pub use index::format_token_amount;
