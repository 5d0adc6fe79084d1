// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Contracts to the subprocess supervisor and the transport daemon.
//!
//! One worker subprocess drives one channel through one protocol phase. The supervisor owns
//! process lifecycles and the file descriptors; the control plane decides *which* worker a
//! channel (and its peer connection) is handed to, and observes terminations through
//! [`PeerControl::channel_errmsg`](crate::ln::peer_control::PeerControl::channel_errmsg).

use bitcoin::hash_types::Txid;
use bitcoin::secp256k1::PublicKey;
use bitcoin::transaction::Transaction;

use crate::ln::channel_id::ChannelId;
use crate::ln::msgs::{ErrorMessage, NetAddress, WorkerMsg};

use std::os::fd::RawFd;
use std::sync::Arc;

use core::fmt;

/// The per-peer transport triple handed over by the transport daemon on connection: the peer
/// socket itself, the gossip channel, and the shared gossip store.
///
/// The worker currently driving the peer's channel owns these for the duration; the triple is
/// moved, never cloned, so exactly one owner exists at any time.
#[derive(Debug)]
pub struct PeerTransport {
	/// The encrypted peer socket.
	pub peer_fd: RawFd,
	/// The per-peer gossip channel to the gossip daemon.
	pub gossip_fd: RawFd,
	/// The append-only gossip store, read-shared by seeking.
	pub gossip_store_fd: RawFd,
}

/// The protocol phase a worker subprocess drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerRole {
	/// Opening negotiation for a channel that is not yet durable.
	Opening,
	/// Normal operation: commitment updates, HTLC forwarding, shutdown initiation.
	Channel,
	/// Mutual close fee negotiation and signature exchange.
	Closing,
	/// On-chain resolution after the funding output was spent.
	Onchain,
}

impl WorkerRole {
	/// The stable name of the worker binary for this role, as shown in `listpeers`.
	pub fn name(&self) -> &'static str {
		match self {
			WorkerRole::Opening => "openingd",
			WorkerRole::Channel => "channeld",
			WorkerRole::Closing => "closingd",
			WorkerRole::Onchain => "onchaind",
		}
	}
}

impl fmt::Display for WorkerRole {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A live worker subprocess, as seen by the control plane.
///
/// Messages sent through one handle are delivered FIFO. Dropping the last handle to a worker
/// is the control plane's signal that the worker is no longer the channel's owner; the
/// supervisor tears the process down and, where applicable, recovers the peer transport for
/// the next owner.
pub trait WorkerHandle {
	/// The role this worker was started with.
	fn role(&self) -> WorkerRole;
	/// Queues a typed message to the worker.
	fn send(&self, msg: WorkerMsg);
	/// Tells the worker the funding transaction's current depth. Returns false if the worker
	/// is not in a state to consume it yet (the watcher will retry on the next depth change).
	fn handle_depth(&self, txid: &Txid, depth: u32) -> bool;
}

/// Starts worker subprocesses and delivers connection-scoped messages.
///
/// None of these calls re-enter the control plane synchronously; worker outcomes arrive
/// later through the event loop.
pub trait WorkerBroker {
	/// Starts a channel worker for `channel_id`, handing it the peer transport.
	/// `reconnected` is true when this is a reestablishment rather than a fresh channel.
	fn start_channel_worker(
		&self, peer_id: &PublicKey, channel_id: &ChannelId, transport: PeerTransport,
		reconnected: bool,
	) -> Arc<dyn WorkerHandle>;
	/// Starts a closing worker for a channel in signature exchange.
	fn start_closing_worker(
		&self, peer_id: &PublicKey, channel_id: &ChannelId, transport: PeerTransport,
		reconnected: bool,
	) -> Arc<dyn WorkerHandle>;
	/// Starts an opening worker to negotiate a fresh channel (or simply to sit on the
	/// connection until one side proposes an open).
	fn start_opening_worker(
		&self, peer_id: &PublicKey, transport: PeerTransport,
	) -> Arc<dyn WorkerHandle>;
	/// Starts the on-chain resolver for a channel whose funding output was spent by `tx` at
	/// `blockheight`.
	fn start_onchain_worker(
		&self, peer_id: &PublicKey, channel_id: &ChannelId, tx: &Transaction, blockheight: u32,
	) -> Arc<dyn WorkerHandle>;
	/// Sends a protocol error over the peer connection and closes it, consuming the
	/// transport.
	fn send_error_and_close(&self, transport: PeerTransport, error: &ErrorMessage);
}

/// The outbound face of the transport daemon.
pub trait PeerConnector {
	/// Asks the transport daemon to (re-)establish a connection to `peer_id`, waiting up to
	/// `seconds` before the first attempt (0 = immediately), trying `addr` first if given.
	fn connect_to_peer(&self, peer_id: &PublicKey, seconds: u32, addr: Option<&NetAddress>);
}
