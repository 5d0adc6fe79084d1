// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The read model published over `listpeers`.
//!
//! Plain data, produced in one loop turn by
//! [`PeerControl::list_peers`](crate::ln::peer_control::PeerControl::list_peers) and
//! serialized as-is by the RPC adapter: two snapshots taken with no event in between are
//! byte-identical. Optional fields are omitted (not null) when absent, which keeps the
//! uncommitted-channel synthetic entry small.

use crate::ln::channel::{HtlcDirection, HtlcStateDetails};

use serde::Serialize;

use std::collections::BTreeMap;

/// One in-flight HTLC as reported to the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HtlcDetails {
	/// Direction relative to us.
	pub direction: HtlcDirection,
	/// Per-channel, per-direction id.
	pub id: u64,
	/// Amount in millisatoshi.
	pub amount_msat: u64,
	/// The block height at which the HTLC expires.
	pub expiry: u32,
	/// The payment hash, hex-encoded.
	pub payment_hash: String,
	/// Where the HTLC stands in the commitment dance.
	pub state: HtlcStateDetails,
}

/// One channel as reported to the user.
///
/// Uncommitted channels report only `state`, `owner`, and `status`; every other field is
/// omitted.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChannelDetails {
	/// The lifecycle state name.
	pub state: String,
	/// The txid of the transaction we would enforce unilaterally.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub scratch_txid: Option<String>,
	/// The worker currently driving the channel.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub owner: Option<String>,
	/// The short channel id, once the funding tx is buried deep enough.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub short_channel_id: Option<String>,
	/// Our side index (0 if our node id sorts before the peer's).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub direction: Option<u8>,
	/// The wire channel id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub channel_id: Option<String>,
	/// The funding transaction id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub funding_txid: Option<String>,
	/// Whether the channel is unannounced.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub private: Option<bool>,
	/// Who contributed the funding, in millisatoshi, keyed by node id.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub funding_allocation_msat: Option<BTreeMap<String, u64>>,
	/// Our current balance in millisatoshi.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub to_us_msat: Option<u64>,
	/// Historical minimum of our balance.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub min_to_us_msat: Option<u64>,
	/// Historical maximum of our balance.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_to_us_msat: Option<u64>,
	/// The channel total, in millisatoshi.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total_msat: Option<u64>,
	/// Our dust limit in satoshis.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dust_limit_satoshis: Option<u64>,
	/// The most the counterparty may have in flight towards us.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_total_htlc_in_msat: Option<u64>,
	/// The reserve we imposed on the counterparty, in satoshis.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub their_channel_reserve_satoshis: Option<u64>,
	/// The reserve the counterparty imposed on us, in satoshis.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub our_channel_reserve_satoshis: Option<u64>,
	/// How much we can send right now, in millisatoshi.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub spendable_msat: Option<u64>,
	/// The smallest HTLC we accept, in millisatoshi.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub minimum_htlc_in_msat: Option<u64>,
	/// The delay we imposed on the counterparty's to-self outputs, in blocks.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub their_to_self_delay: Option<u16>,
	/// The delay the counterparty imposed on our to-self outputs, in blocks.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub our_to_self_delay: Option<u16>,
	/// The most HTLCs the counterparty may have pending towards us.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_accepted_htlcs: Option<u16>,
	/// The billboard: permanent lines in state order, then the transient line.
	pub status: Vec<String>,
	/// Count of HTLCs ever offered to us.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub in_payments_offered: Option<u64>,
	/// Millisatoshi ever offered to us.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub in_offered_msat: Option<u64>,
	/// Count of inbound HTLCs fulfilled.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub in_payments_fulfilled: Option<u64>,
	/// Millisatoshi of inbound HTLCs fulfilled.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub in_fulfilled_msat: Option<u64>,
	/// Count of HTLCs we ever offered out.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub out_payments_offered: Option<u64>,
	/// Millisatoshi we ever offered out.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub out_offered_msat: Option<u64>,
	/// Count of outbound HTLCs fulfilled.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub out_payments_fulfilled: Option<u64>,
	/// Millisatoshi of outbound HTLCs fulfilled.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub out_fulfilled_msat: Option<u64>,
	/// In-flight HTLCs.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub htlcs: Option<Vec<HtlcDetails>>,
}

/// One retained per-peer log entry as reported to the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LogDetails {
	/// The severity name.
	#[serde(rename = "type")]
	pub log_type: String,
	/// The module the entry came from.
	pub source: String,
	/// The message.
	pub log: String,
}

/// One peer as reported to the user.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PeerDetails {
	/// The peer's node id, hex-encoded.
	pub id: String,
	/// Whether we currently have a live connection.
	pub connected: bool,
	/// The peer's network address. Only present while connected, since a stale address is
	/// worse than none.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub netaddr: Option<Vec<String>>,
	/// The peer's global feature bits, hex-encoded. Only present while connected.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub globalfeatures: Option<String>,
	/// The peer's local feature bits, hex-encoded. Only present while connected.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub localfeatures: Option<String>,
	/// The peer's channels, uncommitted first, then in insertion order.
	pub channels: Vec<ChannelDetails>,
	/// The peer's log ring, when a level was requested.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub log: Option<Vec<LogDetails>>,
}
