// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Various user-configurable channel and node limits are contained here.

use crate::ln::msgs::NetAddress;

/// Configuration we impose on our side of a channel during the handshake. The counterparty's
/// equivalent set arrives over the wire and is stored symmetrically on the channel record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelHandshakeConfig {
	/// The threshold below which outputs on transactions broadcast by us will be omitted.
	pub dust_limit_satoshis: u64,
	/// The portion of the channel value we require the counterparty to keep unspendable on
	/// their side, so that they always have something to lose on a cheat attempt. Imposed on
	/// the *other* side.
	pub channel_reserve_satoshis: u64,
	/// The number of blocks the counterparty's to-self outputs are locked for after a
	/// unilateral close by them. Imposed on the *other* side.
	pub to_self_delay: u16,
	/// The maximum total value of HTLCs the counterparty may have in flight towards us.
	pub max_htlc_value_in_flight_msat: u64,
	/// The maximum number of HTLCs the counterparty may have pending towards us.
	pub max_accepted_htlcs: u16,
	/// The smallest HTLC we will accept.
	pub htlc_minimum_msat: u64,
}

impl Default for ChannelHandshakeConfig {
	/// Provides sane defaults for a channel. The reserve defaults to 1% of a typical channel
	/// and should be overridden per-channel at open time.
	fn default() -> ChannelHandshakeConfig {
		ChannelHandshakeConfig {
			dust_limit_satoshis: 546,
			channel_reserve_satoshis: 1000,
			to_self_delay: 144,
			max_htlc_value_in_flight_msat: 0xffff_ffff,
			max_accepted_htlcs: 483,
			htlc_minimum_msat: 1,
		}
	}
}

/// Node-level configuration consumed by the control plane.
///
/// Nothing here is persisted by this crate; the host loads it from its own configuration
/// mechanism and hands it in at construction.
#[derive(Clone, Debug)]
pub struct NodeConfig {
	/// The node alias reported by `getinfo`.
	pub alias: String,
	/// The node color, reported by `getinfo` as hex.
	pub color: [u8; 3],
	/// The human-readable chain tag (e.g. "bitcoin", "testnet", "regtest").
	pub network: String,
	/// Addresses we announce to the network. Empty if we do not listen.
	pub announce_addresses: Vec<NetAddress>,
	/// Addresses we are actually bound to.
	pub binding: Vec<NetAddress>,
	/// Default routing fee base in millisatoshi, used when `setchannelfee` omits `base`.
	pub fee_base: u32,
	/// Default routing fee in parts-per-million, used when `setchannelfee` omits `ppm`.
	pub fee_per_satoshi: u32,
	/// Whether to ask the transport daemon to re-establish connections to peers we have
	/// channels with.
	pub reconnect: bool,
	/// Entries below this level are kept only in the per-peer ring and not mirrored to the
	/// process log.
	pub peer_log_mirror_level: crate::util::logger::Level,
}

impl Default for NodeConfig {
	fn default() -> NodeConfig {
		NodeConfig {
			alias: String::new(),
			color: [0; 3],
			network: "bitcoin".to_string(),
			announce_addresses: Vec::new(),
			binding: Vec::new(),
			fee_base: 1000,
			fee_per_satoshi: 10,
			reconnect: true,
			peer_log_mirror_level: crate::util::logger::Level::Info,
		}
	}
}
