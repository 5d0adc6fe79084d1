// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! ChannelId definition.

use bitcoin::hashes::{sha256, Hash, HashEngine};
use bitcoin::hex::FromHex;

use crate::chain::transaction::OutPoint;

use core::fmt;

/// A unique 32-byte identifier for a channel, used in wire messages.
///
/// Derived as `SHA256(funding_txid || funding_output_index)` with the output index encoded
/// big-endian in two bytes, so every surface that knows the funding outpoint agrees on the
/// id without further coordination.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ChannelId(pub [u8; 32]);

impl ChannelId {
	/// Derives the channel ID from the funding outpoint.
	pub fn from_funding_outpoint(outpoint: &OutPoint) -> Self {
		let mut engine = sha256::HashEngine::default();
		engine.input(outpoint.txid.as_byte_array());
		engine.input(&outpoint.index.to_be_bytes());
		Self(sha256::Hash::from_engine(engine).to_byte_array())
	}

	/// Generic constructor; create a new channel ID from the provided data.
	pub fn from_bytes(data: [u8; 32]) -> Self {
		Self(data)
	}

	/// Create a channel ID consisting of all-zeros data, the wire convention for "all
	/// channels with this peer".
	pub fn new_zero() -> Self {
		Self([0; 32])
	}

	/// Check whether ID is consisting of all zeros (the "all channels" convention).
	pub fn is_zero(&self) -> bool {
		self.0[..] == [0; 32]
	}

	/// Parses a 64-character hex string into a channel ID.
	pub fn from_hex(s: &str) -> Option<Self> {
		<[u8; 32]>::from_hex(s).ok().map(Self)
	}
}

impl fmt::Display for ChannelId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		crate::util::logger::DebugBytes(&self.0).fmt(f)
	}
}

#[cfg(test)]
mod tests {
	use super::ChannelId;
	use crate::chain::transaction::OutPoint;

	use bitcoin::hashes::{sha256, Hash, HashEngine};
	use bitcoin::hex::DisplayHex;
	use bitcoin::Txid;

	fn txid_from_byte(byte: u8) -> Txid {
		Txid::from_byte_array([byte; 32])
	}

	#[test]
	fn test_channel_id_derivation() {
		let outpoint = OutPoint { txid: txid_from_byte(2), index: 1 };
		let mut engine = sha256::HashEngine::default();
		engine.input(&[2; 32]);
		engine.input(&[0, 1]);
		let expected = sha256::Hash::from_engine(engine);
		assert_eq!(ChannelId::from_funding_outpoint(&outpoint).0, expected.to_byte_array());
	}

	#[test]
	fn test_channel_id_differs_by_index() {
		let id_0 = ChannelId::from_funding_outpoint(&OutPoint { txid: txid_from_byte(2), index: 0 });
		let id_1 = ChannelId::from_funding_outpoint(&OutPoint { txid: txid_from_byte(2), index: 1 });
		assert_ne!(id_0, id_1);
	}

	#[test]
	fn test_channel_id_hex_round_trip() {
		let id = ChannelId::from_funding_outpoint(&OutPoint { txid: txid_from_byte(7), index: 3 });
		let hex = id.0.to_lower_hex_string();
		assert_eq!(format!("{}", id), hex);
		assert_eq!(ChannelId::from_hex(&hex), Some(id));
		assert_eq!(ChannelId::from_hex("zz"), None);
	}

	#[test]
	fn test_zero_channel_id() {
		assert!(ChannelId::new_zero().is_zero());
		let id = ChannelId::from_funding_outpoint(&OutPoint { txid: txid_from_byte(0), index: 0 });
		assert!(!id.is_zero());
	}
}
