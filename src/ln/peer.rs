// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The per-peer record.
//!
//! A peer exists only as long as something references it: a channel, or an in-flight opening
//! negotiation. The registry (owned by
//! [`PeerControl`](crate::ln::peer_control::PeerControl)) enforces that by deleting peers the
//! moment their last channel goes away.

use bitcoin::secp256k1::PublicKey;

use crate::ln::channel::Channel;
use crate::ln::msgs::NetAddress;
use crate::ln::subd::WorkerHandle;
use crate::util::logger::{Level, PeerLog};

use std::sync::Arc;

/// Size cap of one peer's log ring.
const PEER_LOG_BYTES: usize = 128 * 1024;

/// An in-flight opening negotiation that is not yet durable.
///
/// If the negotiation fails, or the peer simply forgets about it, this is dropped and the
/// peer becomes eligible for deletion.
pub struct UncommittedChannel {
	/// The opening worker driving the negotiation. Holds the peer transport.
	pub owner: Arc<dyn WorkerHandle>,
}

/// Returns 0 if `a` sorts lexicographically before `b` in serialized form, else 1.
///
/// This is the canonical "direction" index used by gossip to tell the two halves of a
/// channel apart.
pub fn node_id_idx(a: &PublicKey, b: &PublicKey) -> u8 {
	if a.serialize()[..] < b.serialize()[..] {
		0
	} else {
		1
	}
}

/// Everything we know about one peer.
pub struct Peer {
	/// The peer's node id.
	pub id: PublicKey,
	/// Database row id; 0 until (unless) the peer gets a durable row.
	pub dbid: u64,
	/// The address we last saw the peer on. Not persisted; re-learned on reconnect.
	pub addr: NetAddress,
	/// The peer's global feature bits. Only meaningful while connected.
	pub globalfeatures: Vec<u8>,
	/// The peer's local feature bits. Only meaningful while connected.
	pub localfeatures: Vec<u8>,
	/// The channels belonging to this peer, in insertion order.
	pub channels: Vec<Channel>,
	/// An opening negotiation in progress, if any.
	pub uncommitted_channel: Option<UncommittedChannel>,
	/// The peer's bounded log ring.
	pub log: PeerLog,
	/// Our side index relative to this peer (see [`node_id_idx`]).
	pub direction: u8,
}

impl Peer {
	/// Creates a peer with no channels. The caller must ensure something references it soon,
	/// or delete it.
	pub fn new(
		our_id: &PublicKey, id: PublicKey, addr: NetAddress, dbid: u64, mirror_level: Level,
	) -> Peer {
		Peer {
			id,
			dbid,
			addr,
			globalfeatures: Vec::new(),
			localfeatures: Vec::new(),
			channels: Vec::new(),
			uncommitted_channel: None,
			log: PeerLog::new(PEER_LOG_BYTES, mirror_level),
			direction: node_id_idx(our_id, &id),
		}
	}

	/// Replaces both feature vectors. Features are ephemeral: they reflect the live
	/// connection and are never persisted.
	pub fn update_features(&mut self, globalfeatures: Vec<u8>, localfeatures: Vec<u8>) {
		self.globalfeatures = globalfeatures;
		self.localfeatures = localfeatures;
	}

	/// The single channel this peer routes through, if any: the first channel still taking
	/// part in the off-chain protocol.
	pub fn active_channel(&self) -> Option<&Channel> {
		self.channels.iter().find(|c| c.is_active())
	}

	/// Mutable form of [`Peer::active_channel`].
	pub fn active_channel_mut(&mut self) -> Option<&mut Channel> {
		self.channels.iter_mut().find(|c| c.is_active())
	}

	/// Whether we currently have a live connection to this peer.
	pub fn is_connected(&self) -> bool {
		if self.uncommitted_channel.is_some() {
			return true;
		}
		self.active_channel().map(|c| c.connected).unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ln::channel::ChannelState;
	use crate::util::test_utils;

	#[test]
	fn direction_is_lexicographic() {
		let a = test_utils::pubkey(3);
		let b = test_utils::pubkey(5);
		let (lesser, greater) = if a.serialize()[..] < b.serialize()[..] { (a, b) } else { (b, a) };
		assert_eq!(node_id_idx(&lesser, &greater), 0);
		assert_eq!(node_id_idx(&greater, &lesser), 1);
	}

	#[test]
	fn active_channel_skips_resolved_channels() {
		let our_id = test_utils::pubkey(2);
		let their_id = test_utils::pubkey(3);
		let mut peer = Peer::new(
			&our_id,
			their_id,
			NetAddress::IPv4 { addr: [127, 0, 0, 1], port: 9735 },
			0,
			Level::Info,
		);
		assert!(peer.active_channel().is_none());

		peer.channels.push(test_utils::channel(their_id, 1, ChannelState::Onchain));
		assert!(peer.active_channel().is_none());

		peer.channels.push(test_utils::channel(their_id, 2, ChannelState::ChanneldNormal));
		assert_eq!(peer.active_channel().unwrap().dbid, 2);
	}

	#[test]
	fn connected_follows_active_channel() {
		let our_id = test_utils::pubkey(2);
		let their_id = test_utils::pubkey(3);
		let mut peer = Peer::new(
			&our_id,
			their_id,
			NetAddress::IPv4 { addr: [127, 0, 0, 1], port: 9735 },
			0,
			Level::Info,
		);
		peer.channels.push(test_utils::channel(their_id, 1, ChannelState::ChanneldNormal));
		assert!(!peer.is_connected());
		peer.channels[0].connected = true;
		assert!(peer.is_connected());
	}
}
