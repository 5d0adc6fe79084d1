// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The contract to the hardware-signer daemon.
//!
//! The signer is a serialized external oracle: one request, one reply, over a dedicated
//! channel. The control plane never holds key material; it sends the stored commitment
//! transaction out for a signature each time it needs to broadcast, and the witness is
//! assembled locally (see [`crate::ln::chan_utils`]).

use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::PublicKey;
use bitcoin::transaction::Transaction;

use core::fmt;

/// The signer refused or failed a request.
///
/// Any error from the signer is fatal to the process: a signer that cannot sign our own
/// commitment means we can no longer enforce the channel on chain.
#[derive(Debug)]
pub struct SignerError(pub String);

impl fmt::Display for SignerError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Signs commitment transactions on behalf of the node.
pub trait CommitmentSigner {
	/// Produces our signature over `tx`, spending the 2-of-2 funding output of the channel
	/// identified by `(peer_id, channel_dbid)`.
	///
	/// `remote_funding_key` and `funding_satoshis` pin down the input being spent so the
	/// signer can independently derive the witness script and amount commitment.
	fn sign_commitment_tx(
		&self, peer_id: &PublicKey, channel_dbid: u64, tx: &Transaction,
		remote_funding_key: &PublicKey, funding_satoshis: u64,
	) -> Result<Signature, SignerError>;
}
