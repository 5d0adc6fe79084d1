// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Traits which allow the control plane to interact with the blockchain.
//!
//! Includes the trait for transaction broadcasting and the constant governing how long we
//! keep reporting funding depth to the channel worker.

use bitcoin::transaction::Transaction;

/// Number of confirmations at which a channel may be announced to the network; the funding
/// watcher keeps reporting depth to the worker until this is reached.
pub const ANNOUNCE_MIN_DEPTH: u32 = 6;

/// An interface to send a transaction to the Bitcoin network.
pub trait BroadcasterInterface {
	/// Sends a transaction out to (hopefully) be mined.
	///
	/// Implementations must keep re-broadcasting until the transaction confirms or the output
	/// it spends is gone; a rejection because an equivalent transaction is already known (the
	/// counterparty beat us to the broadcast) is success, not failure.
	fn broadcast_transaction(&self, tx: &Transaction);
}
