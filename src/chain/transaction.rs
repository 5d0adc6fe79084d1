// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Types describing on-chain transactions.

use bitcoin::hash_types::Txid;
use bitcoin::transaction::OutPoint as BitcoinOutPoint;

/// A reference to the funding output of a channel.
///
/// Unlike `bitcoin::transaction::OutPoint` the index is a u16, since the protocol caps
/// funding output indexes at 16 bits; narrowing here spares every consumer the conversion.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Hash)]
pub struct OutPoint {
	/// The referenced transaction's txid.
	pub txid: Txid,
	/// The index of the referenced output in its transaction's vout.
	pub index: u16,
}

impl OutPoint {
	/// Widens back into the outpoint type used by rust-bitcoin.
	pub fn into_bitcoin_outpoint(self) -> BitcoinOutPoint {
		BitcoinOutPoint { txid: self.txid, vout: self.index as u32 }
	}
}

impl core::fmt::Display for OutPoint {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(f, "{}:{}", self.txid, self.index)
	}
}

#[cfg(test)]
mod tests {
	use crate::chain::transaction::OutPoint;
	use crate::ln::channel_id::ChannelId;

	use bitcoin::consensus::encode;
	use bitcoin::hex::FromHex;
	use bitcoin::transaction::Transaction;

	#[test]
	fn test_channel_id_is_stable_per_output_index() {
		let tx: Transaction = encode::deserialize(&<Vec<u8>>::from_hex("020000000001010e0adef48412e4361325ac1c6e36411299ab09d4f083b9d8ddb55fbc06e1b0c00000000000feffffff0220a1070000000000220020f81d95e040bd0a493e38bae27bff52fe2bb58b93b293eb579c01c31b05c5af1dc072cfee54a3000016001434b1d6211af5551905dc2642d05f5b04d25a8fe80247304402207f570e3f0de50546aad25a872e3df059d277e776dda4269fa0d2cc8c2ee6ec9a022054e7fae5ca94d47534c86705857c24ceea3ad51c69dd6051c5850304880fc43a012103cb11a1bacc223d98d91f1946c6752e358a5eb1a1c983b3e6fb15378f453b76bd00000000").unwrap()[..]).unwrap();
		let id_0 = ChannelId::from_funding_outpoint(&OutPoint { txid: tx.compute_txid(), index: 0 });
		let id_1 = ChannelId::from_funding_outpoint(&OutPoint { txid: tx.compute_txid(), index: 1 });
		assert_ne!(id_0, id_1);
		assert_eq!(id_0, ChannelId::from_funding_outpoint(&OutPoint { txid: tx.compute_txid(), index: 0 }));
	}

	#[test]
	fn test_round_trips_through_bitcoin_outpoint() {
		let tx: Transaction = encode::deserialize(&<Vec<u8>>::from_hex("020000000001010e0adef48412e4361325ac1c6e36411299ab09d4f083b9d8ddb55fbc06e1b0c00000000000feffffff0220a1070000000000220020f81d95e040bd0a493e38bae27bff52fe2bb58b93b293eb579c01c31b05c5af1dc072cfee54a3000016001434b1d6211af5551905dc2642d05f5b04d25a8fe80247304402207f570e3f0de50546aad25a872e3df059d277e776dda4269fa0d2cc8c2ee6ec9a022054e7fae5ca94d47534c86705857c24ceea3ad51c69dd6051c5850304880fc43a012103cb11a1bacc223d98d91f1946c6752e358a5eb1a1c983b3e6fb15378f453b76bd00000000").unwrap()[..]).unwrap();
		let ours = OutPoint { txid: tx.compute_txid(), index: 1 };
		let widened = ours.into_bitcoin_outpoint();
		assert_eq!(widened.txid, ours.txid);
		assert_eq!(widened.vout, 1);
		assert_eq!(format!("{}", ours), format!("{}:1", ours.txid));
	}
}
