//! Decoder for the binary event payloads embedded in transactions.
//!
//! Payloads use the node's compact serialization: little-endian var-ints (a single byte below
//! `0xFD`, otherwise a marker followed by a 2, 4 or 8 byte integer), length-prefixed byte
//! arrays and UTF-8 strings, and big integers written as length-prefixed little-endian two's
//! complement bytes.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
	#[error("unexpected end of payload: needed {needed} bytes at offset {offset}")]
	UnexpectedEnd { offset: usize, needed: usize },

	#[error("invalid UTF-8 string at offset {0}")]
	InvalidString(usize),

	#[error("integer does not fit in 128 bits")]
	Overflow,

	#[error("negative amount")]
	Negative,
}

/// Cursor over a payload.
pub struct PayloadReader<'a> {
	bytes: &'a [u8],
	offset: usize,
}

impl<'a> PayloadReader<'a> {
	pub fn new(bytes: &'a [u8]) -> Self {
		Self { bytes, offset: 0 }
	}

	pub fn remaining(&self) -> usize {
		self.bytes.len() - self.offset
	}

	fn take(&mut self, needed: usize) -> Result<&'a [u8], CodecError> {
		if self.remaining() < needed {
			return Err(CodecError::UnexpectedEnd {
				offset: self.offset,
				needed,
			});
		}
		let slice = &self.bytes[self.offset..self.offset + needed];
		self.offset += needed;
		Ok(slice)
	}

	fn read_le(&mut self, width: usize) -> Result<u64, CodecError> {
		let bytes = self.take(width)?;
		Ok(bytes
			.iter()
			.rev()
			.fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
	}

	pub fn read_byte(&mut self) -> Result<u8, CodecError> {
		Ok(self.take(1)?[0])
	}

	pub fn read_var_int(&mut self) -> Result<u64, CodecError> {
		match self.read_byte()? {
			0xFD => self.read_le(2),
			0xFE => self.read_le(4),
			0xFF => self.read_le(8),
			small => Ok(u64::from(small)),
		}
	}

	pub fn read_byte_array(&mut self) -> Result<&'a [u8], CodecError> {
		let len = self.read_var_int()?;
		let len = usize::try_from(len).map_err(|_| CodecError::Overflow)?;
		self.take(len)
	}

	pub fn read_var_string(&mut self) -> Result<String, CodecError> {
		let start = self.offset;
		let bytes = self.read_byte_array()?;
		std::str::from_utf8(bytes)
			.map(str::to_string)
			.map_err(|_| CodecError::InvalidString(start))
	}

	/// Read a non-negative big integer.
	pub fn read_big_int(&mut self) -> Result<u128, CodecError> {
		let bytes = self.read_byte_array()?;
		decode_unsigned_le(bytes)
	}
}

/// Two's complement little-endian bytes to `u128`, rejecting negatives.
fn decode_unsigned_le(bytes: &[u8]) -> Result<u128, CodecError> {
	let Some(&last) = bytes.last() else {
		return Ok(0);
	};
	if last & 0x80 != 0 {
		return Err(CodecError::Negative);
	}
	// A trailing zero is a sign byte, it may push the length to 17
	let significant = bytes
		.iter()
		.rposition(|b| *b != 0)
		.map(|i| i + 1)
		.unwrap_or(0);
	if significant > 16 {
		return Err(CodecError::Overflow);
	}
	Ok(bytes[..significant]
		.iter()
		.rev()
		.fold(0u128, |acc, b| (acc << 8) | u128::from(*b)))
}

/// Payload of token mint/burn/send/receive/stake/claim/escrow events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenEventData {
	pub symbol: String,
	pub value: u128,
	pub chain_name: String,
}

impl TokenEventData {
	pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
		let mut reader = PayloadReader::new(bytes);
		Ok(Self {
			symbol: reader.read_var_string()?,
			value: reader.read_big_int()?,
			chain_name: reader.read_var_string()?,
		})
	}
}

/// Payload of gas escrow/payment events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasEventData {
	pub address: Vec<u8>,
	pub price: u128,
	pub amount: u128,
}

impl GasEventData {
	pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
		let mut reader = PayloadReader::new(bytes);
		Ok(Self {
			address: reader.read_byte_array()?.to_vec(),
			price: reader.read_big_int()?,
			amount: reader.read_big_int()?,
		})
	}

	/// Total fee represented by the event.
	pub fn fee(&self) -> u128 {
		self.price.saturating_mul(self.amount)
	}
}

/// Payload made of a single string (names, symbols, identifiers).
pub fn decode_string_payload(bytes: &[u8]) -> Result<String, CodecError> {
	PayloadReader::new(bytes).read_var_string()
}
