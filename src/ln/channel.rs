// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The per-channel record and its lifecycle state machine.

use bitcoin::hash_types::Txid;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::PublicKey;
use bitcoin::transaction::Transaction;

use crate::chain::transaction::OutPoint;
use crate::ln::channel_id::ChannelId;
use crate::ln::msgs::ErrorMessage;
use crate::ln::subd::WorkerHandle;
use crate::ln::PaymentHash;
use crate::util::config::ChannelHandshakeConfig;
use crate::util::persist::TxType;
use crate::util::scid_utils::ShortChannelId;

use serde::Serialize;

use core::fmt;
use std::sync::Arc;

/// The lifecycle state of a channel.
///
/// The names render exactly as they appear in user-visible errors and `listpeers`, which is
/// why they carry their historical daemon prefixes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelState {
	/// Opening negotiation in progress; nothing durable yet. Only ever reported for an
	/// uncommitted channel.
	Openingd = 0,
	/// Funding broadcast, waiting for it to be buried `minimum_depth` deep.
	ChanneldAwaitingLockin = 1,
	/// Normal operation.
	ChanneldNormal = 2,
	/// A shutdown exchange is in progress.
	ChanneldShuttingDown = 3,
	/// Mutual close fee negotiation and signature exchange.
	ClosingdSigexchange = 4,
	/// A mutual close transaction has been signed and broadcast.
	ClosingdComplete = 5,
	/// Permanent failure; our commitment is (or will be) on its way to the chain.
	AwaitingUnilateral = 6,
	/// The funding output was seen spent on-chain.
	FundingSpendSeen = 7,
	/// The on-chain resolver owns the channel.
	Onchain = 8,
}

/// Number of channel states, which sizes the billboard's permanent slots.
pub const CHANNEL_STATE_COUNT: usize = 9;

static CHANNEL_STATE_NAMES: [&'static str; CHANNEL_STATE_COUNT] = [
	"OPENINGD",
	"CHANNELD_AWAITING_LOCKIN",
	"CHANNELD_NORMAL",
	"CHANNELD_SHUTTING_DOWN",
	"CLOSINGD_SIGEXCHANGE",
	"CLOSINGD_COMPLETE",
	"AWAITING_UNILATERAL",
	"FUNDING_SPEND_SEEN",
	"ONCHAIN",
];

impl ChannelState {
	fn index(&self) -> usize {
		*self as usize
	}

	/// The user-visible name of this state.
	pub fn name(&self) -> &'static str {
		CHANNEL_STATE_NAMES[self.index()]
	}

	/// Whether the state machine permits moving from `self` to `to`.
	///
	/// Any pre-terminal state may fail permanently into `AWAITING_UNILATERAL`, and the
	/// funding output may be seen spent from any state once it exists on chain.
	pub fn can_transition_to(&self, to: ChannelState) -> bool {
		use ChannelState::*;
		match (*self, to) {
			(Openingd, ChanneldAwaitingLockin) => true,
			(ChanneldAwaitingLockin, ChanneldNormal) => true,
			(ChanneldAwaitingLockin, ChanneldShuttingDown) => true,
			(ChanneldNormal, ChanneldShuttingDown) => true,
			(ChanneldShuttingDown, ClosingdSigexchange) => true,
			(ClosingdSigexchange, ClosingdComplete) => true,
			(from, AwaitingUnilateral) => from != FundingSpendSeen && from != Onchain,
			(from, FundingSpendSeen) => from != Openingd && from != FundingSpendSeen && from != Onchain,
			(FundingSpendSeen, Onchain) => true,
			_ => false,
		}
	}
}

impl fmt::Display for ChannelState {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Which side funded the channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
	/// We opened (and funded) the channel.
	Local,
	/// The counterparty opened (and funded) the channel.
	Remote,
}

/// Operator-readable status lines for a channel: one permanent slot per lifecycle state,
/// plus a single transient line.
#[derive(Clone, Debug, Default)]
pub struct Billboard {
	permanent: [Option<String>; CHANNEL_STATE_COUNT],
	transient: Option<String>,
}

impl Billboard {
	/// Sets (or clears) the permanent line for `state`.
	pub fn set_permanent(&mut self, state: ChannelState, msg: Option<String>) {
		self.permanent[state.index()] = msg;
	}

	/// Sets (or clears) the transient line.
	pub fn set_transient(&mut self, msg: Option<String>) {
		self.transient = msg;
	}

	/// All current lines, permanent (in state order) before transient.
	pub fn entries(&self) -> Vec<&str> {
		let mut res: Vec<&str> =
			self.permanent.iter().filter_map(|m| m.as_deref()).collect();
		if let Some(t) = self.transient.as_deref() {
			res.push(t);
		}
		res
	}
}

/// Which way an HTLC flows relative to us.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HtlcDirection {
	/// Offered to us.
	In,
	/// Offered by us.
	Out,
}

/// Where an in-flight HTLC stands in the commitment update dance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HtlcStateDetails {
	/// Announced, not yet on both commitment transactions.
	AwaitingRemoteRevokeToAdd,
	/// On both commitment transactions.
	Committed,
	/// Being removed by fulfillment.
	AwaitingRemoteRevokeToRemoveFulfill,
	/// Being removed by failure.
	AwaitingRemoteRevokeToRemoveFail,
}

/// An in-flight HTLC as known to the control plane (maintained by the HTLC layer, reported
/// in `listpeers`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtlcInfo {
	/// Direction relative to us.
	pub direction: HtlcDirection,
	/// Per-channel, per-direction id, starting at 0.
	pub id: u64,
	/// Amount in millisatoshi.
	pub amount_msat: u64,
	/// The block height at which the HTLC expires.
	pub cltv_expiry: u32,
	/// The payment hash.
	pub payment_hash: PaymentHash,
	/// Where the HTLC stands.
	pub state: HtlcStateDetails,
}

/// The durable snapshot of a channel: exactly the fields that survive a restart.
///
/// Worker ownership, connection status, the billboard, in-flight HTLC details, and any
/// latched error are all rebuilt or re-learned at runtime and deliberately absent.
#[derive(Clone, Debug)]
pub struct ChannelSeed {
	/// The owning peer's node id.
	pub peer_id: PublicKey,
	/// The channel's database row id. Stable and non-zero.
	pub dbid: u64,
	/// The lifecycle state the channel was last saved in.
	pub state: ChannelState,
	/// The funding outpoint.
	pub funding: OutPoint,
	/// The funding amount in satoshis.
	pub funding_satoshis: u64,
	/// Which side funded the channel.
	pub funder: Side,
	/// Confirmations required before the channel may be used.
	pub minimum_depth: u32,
	/// The short channel id, once the funding tx was buried.
	pub scid: Option<ShortChannelId>,
	/// The latest transaction we can unilaterally enforce (commitment, or the signed mutual
	/// close once negotiation finished). Stored without witness.
	pub last_tx: Transaction,
	/// The counterparty's signature over `last_tx`.
	pub last_sig: Signature,
	/// How `last_tx` should be annotated in the wallet when broadcast.
	pub last_tx_type: TxType,
	/// The parameters we imposed on the counterparty.
	pub our_config: ChannelHandshakeConfig,
	/// The parameters the counterparty imposed on us.
	pub their_config: ChannelHandshakeConfig,
	/// Our current balance in millisatoshi.
	pub our_msat: u64,
	/// Historical minimum of our balance.
	pub msat_to_us_min: u64,
	/// Historical maximum of our balance.
	pub msat_to_us_max: u64,
	/// Routing fee base in millisatoshi.
	pub feerate_base: u32,
	/// Routing fee in parts-per-million.
	pub feerate_ppm: u32,
	/// Set iff the counterparty proved they hold a commitment newer than anything we have;
	/// we must never broadcast ours.
	pub future_per_commitment_point: Option<PublicKey>,
	/// Whether the channel should be announced to the network.
	pub announce_channel: bool,
	/// Our funding key for the 2-of-2 output.
	pub local_funding_pubkey: PublicKey,
	/// The counterparty's funding key for the 2-of-2 output.
	pub remote_funding_pubkey: PublicKey,
}

/// A channel with everything the control plane knows about it.
pub struct Channel {
	/// The owning peer's node id. Relation-only: the peer is found through the registry.
	pub peer_id: PublicKey,
	/// Database row id. Stable and non-zero.
	pub dbid: u64,
	pub(crate) state: ChannelState,
	/// The funding outpoint.
	pub funding: OutPoint,
	/// The funding amount in satoshis.
	pub funding_satoshis: u64,
	/// Which side funded the channel.
	pub funder: Side,
	/// Confirmations required before the channel may be used.
	pub minimum_depth: u32,
	/// The short channel id, once assigned by the funding watcher.
	pub scid: Option<ShortChannelId>,
	/// The latest transaction we can unilaterally enforce. Canonically stored *without*
	/// witness; the signature is re-requested on each broadcast.
	pub last_tx: Transaction,
	/// The counterparty's signature over `last_tx`.
	pub last_sig: Signature,
	/// How `last_tx` should be annotated in the wallet when broadcast.
	pub last_tx_type: TxType,
	/// The parameters we imposed on the counterparty.
	pub our_config: ChannelHandshakeConfig,
	/// The parameters the counterparty imposed on us.
	pub their_config: ChannelHandshakeConfig,
	/// Our current balance in millisatoshi.
	pub our_msat: u64,
	/// Historical minimum of our balance.
	pub msat_to_us_min: u64,
	/// Historical maximum of our balance.
	pub msat_to_us_max: u64,
	/// Routing fee base in millisatoshi.
	pub feerate_base: u32,
	/// Routing fee in parts-per-million.
	pub feerate_ppm: u32,
	/// A protocol error latched for delivery on the next reconnect. Not persisted.
	pub error: Option<ErrorMessage>,
	/// Set iff the counterparty proved they hold a commitment newer than anything we have.
	pub future_per_commitment_point: Option<PublicKey>,
	/// Operator-readable status lines.
	pub billboard: Billboard,
	/// The worker currently driving this channel, if any. Set iff that worker holds the
	/// peer's wire endpoint; must be cleared before the endpoint is handed elsewhere.
	pub owner: Option<Arc<dyn WorkerHandle>>,
	/// Whether the peer connection is currently up.
	pub connected: bool,
	/// Whether the channel should be announced to the network.
	pub announce_channel: bool,
	/// Our funding key for the 2-of-2 output.
	pub local_funding_pubkey: PublicKey,
	/// The counterparty's funding key for the 2-of-2 output.
	pub remote_funding_pubkey: PublicKey,
	/// In-flight HTLCs, maintained by the HTLC layer.
	pub htlcs: Vec<HtlcInfo>,
}

impl Channel {
	/// Rebuilds a channel from its durable snapshot.
	pub fn from_seed(seed: ChannelSeed) -> Channel {
		Channel {
			peer_id: seed.peer_id,
			dbid: seed.dbid,
			state: seed.state,
			funding: seed.funding,
			funding_satoshis: seed.funding_satoshis,
			funder: seed.funder,
			minimum_depth: seed.minimum_depth,
			scid: seed.scid,
			last_tx: seed.last_tx,
			last_sig: seed.last_sig,
			last_tx_type: seed.last_tx_type,
			our_config: seed.our_config,
			their_config: seed.their_config,
			our_msat: seed.our_msat,
			msat_to_us_min: seed.msat_to_us_min,
			msat_to_us_max: seed.msat_to_us_max,
			feerate_base: seed.feerate_base,
			feerate_ppm: seed.feerate_ppm,
			error: None,
			future_per_commitment_point: seed.future_per_commitment_point,
			billboard: Billboard::default(),
			owner: None,
			connected: false,
			announce_channel: seed.announce_channel,
			local_funding_pubkey: seed.local_funding_pubkey,
			remote_funding_pubkey: seed.remote_funding_pubkey,
			htlcs: Vec::new(),
		}
	}

	/// Snapshots the durable fields for the wallet.
	pub fn to_seed(&self) -> ChannelSeed {
		ChannelSeed {
			peer_id: self.peer_id,
			dbid: self.dbid,
			state: self.state,
			funding: self.funding,
			funding_satoshis: self.funding_satoshis,
			funder: self.funder,
			minimum_depth: self.minimum_depth,
			scid: self.scid,
			last_tx: self.last_tx.clone(),
			last_sig: self.last_sig,
			last_tx_type: self.last_tx_type,
			our_config: self.our_config.clone(),
			their_config: self.their_config.clone(),
			our_msat: self.our_msat,
			msat_to_us_min: self.msat_to_us_min,
			msat_to_us_max: self.msat_to_us_max,
			feerate_base: self.feerate_base,
			feerate_ppm: self.feerate_ppm,
			future_per_commitment_point: self.future_per_commitment_point,
			announce_channel: self.announce_channel,
			local_funding_pubkey: self.local_funding_pubkey,
			remote_funding_pubkey: self.remote_funding_pubkey,
		}
	}

	/// The current lifecycle state.
	pub fn state(&self) -> ChannelState {
		self.state
	}

	/// Moves the channel from `old` to `new`.
	///
	/// Panics if the channel is not actually in `old` or the transition is illegal; both
	/// indicate a control-plane bug, and continuing would risk funds.
	pub(crate) fn set_state(&mut self, old: ChannelState, new: ChannelState) {
		if self.state != old {
			panic!("channel state {} should be {}", self.state, old);
		}
		if !old.can_transition_to(new) {
			panic!("channel state transition {} -> {} is not allowed", old, new);
		}
		self.state = new;
	}

	/// The wire channel id, derived from the funding outpoint.
	pub fn channel_id(&self) -> ChannelId {
		ChannelId::from_funding_outpoint(&self.funding)
	}

	/// The txid of `last_tx`.
	pub fn scratch_txid(&self) -> Txid {
		self.last_tx.compute_txid()
	}

	/// Updates our balance, maintaining the historical bounds.
	pub fn set_our_msat(&mut self, msat: u64) {
		self.our_msat = msat;
		if msat < self.msat_to_us_min {
			self.msat_to_us_min = msat;
		}
		if msat > self.msat_to_us_max {
			self.msat_to_us_max = msat;
		}
	}

	/// Whether the channel still takes part in off-chain protocol activity. A channel
	/// awaiting our own unilateral close is still "active" in that a reconnect gets an
	/// answer, just not a worker.
	pub fn is_active(&self) -> bool {
		!matches!(
			self.state,
			ChannelState::FundingSpendSeen | ChannelState::ClosingdComplete | ChannelState::Onchain
		)
	}

	/// How much we could send through this channel right now: our balance minus the reserve
	/// the counterparty imposed on us, floored at zero.
	pub fn spendable_msat(&self) -> u64 {
		self.our_msat.saturating_sub(self.their_config.channel_reserve_satoshis.saturating_mul(1000))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::util::test_utils;

	#[test]
	fn state_names_render_like_the_daemon() {
		assert_eq!(ChannelState::ChanneldNormal.to_string(), "CHANNELD_NORMAL");
		assert_eq!(ChannelState::AwaitingUnilateral.to_string(), "AWAITING_UNILATERAL");
		assert_eq!(ChannelState::ClosingdSigexchange.to_string(), "CLOSINGD_SIGEXCHANGE");
	}

	#[test]
	fn transition_table() {
		use ChannelState::*;
		assert!(ChanneldAwaitingLockin.can_transition_to(ChanneldNormal));
		assert!(ChanneldNormal.can_transition_to(ChanneldShuttingDown));
		assert!(ChanneldShuttingDown.can_transition_to(ClosingdSigexchange));
		assert!(ClosingdSigexchange.can_transition_to(ClosingdComplete));
		assert!(ChanneldNormal.can_transition_to(AwaitingUnilateral));
		assert!(ClosingdComplete.can_transition_to(FundingSpendSeen));
		assert!(AwaitingUnilateral.can_transition_to(FundingSpendSeen));
		assert!(FundingSpendSeen.can_transition_to(Onchain));

		assert!(!ChanneldNormal.can_transition_to(ChanneldAwaitingLockin));
		assert!(!Onchain.can_transition_to(AwaitingUnilateral));
		assert!(!FundingSpendSeen.can_transition_to(AwaitingUnilateral));
		assert!(!Onchain.can_transition_to(FundingSpendSeen));
		assert!(!ChanneldNormal.can_transition_to(ClosingdSigexchange));
	}

	#[test]
	#[should_panic(expected = "is not allowed")]
	fn illegal_transition_panics() {
		let mut chan = test_utils::channel(test_utils::pubkey(7), 1, ChannelState::ChanneldNormal);
		chan.set_state(ChannelState::ChanneldNormal, ChannelState::ClosingdComplete);
	}

	#[test]
	#[should_panic(expected = "should be")]
	fn stale_state_panics() {
		let mut chan = test_utils::channel(test_utils::pubkey(7), 1, ChannelState::ChanneldNormal);
		chan.set_state(ChannelState::ChanneldShuttingDown, ChannelState::ClosingdSigexchange);
	}

	#[test]
	fn billboard_orders_and_clears() {
		let mut billboard = Billboard::default();
		billboard.set_permanent(ChannelState::ChanneldNormal, Some("Channel announced".to_string()));
		billboard.set_permanent(ChannelState::ChanneldAwaitingLockin, Some("Funding needs 1 more confirmation".to_string()));
		billboard.set_transient(Some("Attempting to reconnect".to_string()));
		assert_eq!(
			billboard.entries(),
			vec!["Funding needs 1 more confirmation", "Channel announced", "Attempting to reconnect"]
		);
		billboard.set_transient(None);
		assert_eq!(billboard.entries().len(), 2);
	}

	#[test]
	fn balance_bounds_track_extremes() {
		let mut chan = test_utils::channel(test_utils::pubkey(7), 1, ChannelState::ChanneldNormal);
		let start = chan.our_msat;
		chan.set_our_msat(start + 500);
		chan.set_our_msat(start.saturating_sub(200));
		assert_eq!(chan.msat_to_us_max, start + 500);
		assert_eq!(chan.msat_to_us_min, start.saturating_sub(200));
		assert_eq!(chan.our_msat, start.saturating_sub(200));
	}

	#[test]
	fn spendable_floors_at_zero() {
		let mut chan = test_utils::channel(test_utils::pubkey(7), 1, ChannelState::ChanneldNormal);
		chan.their_config.channel_reserve_satoshis = 10_000;
		chan.set_our_msat(1_000);
		assert_eq!(chan.spendable_msat(), 0);
		chan.set_our_msat(11_000_000);
		assert_eq!(chan.spendable_msat(), 1_000_000);
	}
}
