// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The contract to the wallet/database and blockchain-index layer.
//!
//! Peers and channels have durable rows keyed by id; the control plane calls typed save and
//! delete operations on them and never sees SQL or raw bytes. Feature bits and network
//! addresses are deliberately *not* persisted; they are re-learned on reconnect. The same
//! layer indexes confirmed transactions, so block/tx-index lookups and funding-output
//! spentness queries live here too.

use bitcoin::hash_types::Txid;
use bitcoin::transaction::Transaction;

use crate::chain::transaction::OutPoint;
use crate::ln::channel::ChannelSeed;
use crate::ln::msgs::NetAddress;

use bitcoin::secp256k1::PublicKey;

use core::fmt;

/// Annotation tag recorded against a transaction we hand to the wallet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxType {
	/// The channel's funding transaction.
	ChannelFunding,
	/// Our own commitment transaction, broadcast on a unilateral close.
	ChannelUnilateral,
	/// A negotiated mutual close transaction.
	ChannelClose,
}

/// A channel-event record appended to the channel's durable history.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelTxEvent {
	/// The funding output was spent and on-chain resolution began.
	OnchainInit,
}

impl fmt::Display for ChannelTxEvent {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			ChannelTxEvent::OnchainInit => f.write_str("ON-CHAIN INIT"),
		}
	}
}

/// Where a confirmed transaction landed in the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxLocation {
	/// Height of the containing block.
	pub blockheight: u32,
	/// Index of the transaction within that block.
	pub index: u32,
}

/// Cumulative per-channel payment statistics, maintained by the HTLC layer and read back for
/// the `listpeers` report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
	/// Count of HTLCs ever offered to us on this channel.
	pub in_payments_offered: u64,
	/// Total millisatoshi ever offered to us on this channel.
	pub in_msatoshi_offered: u64,
	/// Count of inbound HTLCs that were fulfilled.
	pub in_payments_fulfilled: u64,
	/// Total millisatoshi of inbound HTLCs that were fulfilled.
	pub in_msatoshi_fulfilled: u64,
	/// Count of HTLCs we ever offered out on this channel.
	pub out_payments_offered: u64,
	/// Total millisatoshi we ever offered out on this channel.
	pub out_msatoshi_offered: u64,
	/// Count of outbound HTLCs that were fulfilled.
	pub out_payments_fulfilled: u64,
	/// Total millisatoshi of outbound HTLCs that were fulfilled.
	pub out_msatoshi_fulfilled: u64,
}

/// A peer row restored at startup, with the channels that reference it.
pub struct StoredPeer {
	/// The peer's node id.
	pub id: PublicKey,
	/// The peer's database row id. Never 0 for a stored peer.
	pub dbid: u64,
	/// The address we last connected to the peer on.
	pub addr: NetAddress,
	/// The stored channels belonging to this peer.
	pub channels: Vec<ChannelSeed>,
}

/// The database failed in a way the control plane cannot recover from.
#[derive(Debug)]
pub struct WalletError(pub String);

/// The typed persistence and chain-index operations the control plane relies on.
///
/// Implementations must apply each operation durably before returning; the control plane
/// assumes a returned save can be read back by [`Wallet::load_channels`] after a restart.
pub trait Wallet {
	/// Drops the durable row for a peer. Called when the last channel (and any uncommitted
	/// channel) of a persisted peer goes away.
	fn peer_delete(&self, peer_dbid: u64);
	/// Creates or updates the durable row for a channel.
	fn channel_save(&self, channel: &ChannelSeed);
	/// Drops the durable row for a channel.
	fn channel_delete(&self, channel_dbid: u64);
	/// Reads back the cumulative payment statistics for a channel.
	fn channel_stats(&self, channel_dbid: u64) -> ChannelStats;
	/// Records a transaction we are about to broadcast (or have seen confirm).
	fn transaction_add(&self, tx: &Transaction, blockheight: u32, txindex: u32);
	/// Tags a recorded transaction with its role for a given channel.
	fn transaction_annotate(&self, txid: &Txid, tx_type: TxType, channel_dbid: u64);
	/// Looks up where a confirmed transaction landed, if the index has seen it.
	fn transaction_locate(&self, txid: &Txid) -> Option<TxLocation>;
	/// Appends a channel-event record to the channel's history.
	fn channel_event_add(&self, channel_dbid: u64, event: ChannelTxEvent, txid: &Txid, blockheight: u32);
	/// Total routing fees this node has ever collected, in millisatoshi.
	fn total_forward_fees(&self) -> u64;
	/// Returns the value of the given output if it is still unspent, in satoshis.
	fn utxo_amount(&self, outpoint: &OutPoint) -> Option<u64>;
	/// Restores all stored peers and their channels. Errors here are not recoverable.
	fn load_channels(&self) -> Result<Vec<StoredPeer>, WalletError>;
}
