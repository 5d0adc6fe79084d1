// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Events the control plane surfaces to the host.
//!
//! Anything that cannot be answered in the same call that caused it ends up here: a `close`
//! command that resolved (or failed) after its RPC call returned pending, and peer
//! connection changes that outstanding `connect` commands or plugin notifications wait on.
//! The host drains the queue each loop turn via
//! [`PeerControl::get_and_clear_pending_events`](crate::ln::peer_control::PeerControl::get_and_clear_pending_events).

use bitcoin::hash_types::Txid;
use bitcoin::secp256k1::PublicKey;
use bitcoin::transaction::Transaction;

use crate::ln::msgs::NetAddress;

/// How a channel ended up closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseType {
	/// Both sides signed a negotiated close transaction.
	Mutual,
	/// One side broadcast its commitment.
	Unilateral,
}

impl CloseType {
	/// The name used in the `close` RPC result.
	pub fn name(&self) -> &'static str {
		match self {
			CloseType::Mutual => "mutual",
			CloseType::Unilateral => "unilateral",
		}
	}
}

/// The successful outcome of a `close` command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseSuccess {
	/// The transaction that closes the channel.
	pub tx: Transaction,
	/// Its txid.
	pub txid: Txid,
	/// Whether the close was mutual or unilateral.
	pub close_type: CloseType,
}

/// Why a `close` command failed without the channel reaching a close transaction through it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseFailure {
	/// The user-visible message.
	pub message: String,
}

/// An event the host must react to.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
	/// A peer connection came up (and, if a channel existed, was handed to the right
	/// worker). Completes any `connect` commands awaiting this peer.
	PeerConnected {
		/// The peer's node id.
		peer_id: PublicKey,
		/// The address the connection came from.
		addr: NetAddress,
	},
	/// A peer connection went down.
	PeerDisconnected {
		/// The peer's node id.
		peer_id: PublicKey,
	},
	/// A previously-registered `close` command finished, one way or the other. Exactly one
	/// such event fires per registered command.
	CloseCommandResolved {
		/// The id handed out when the command was registered.
		id: u64,
		/// The outcome.
		result: Result<CloseSuccess, CloseFailure>,
	},
}
