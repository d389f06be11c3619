//! Event payload decoding and transaction description generation.

/// Binary payload codec
pub mod codec;
/// Narrative and transfer extraction
pub mod describe;

pub use codec::{CodecError, GasEventData, TokenEventData};
pub use describe::{CUSTOM_TRANSACTION, describe_transaction};
