// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The top-level channel control plane.
//!
//! [`PeerControl`] owns the peer registry and arbitrates everything that can happen to a
//! channel: peer reconnects (gated by the `peer_connected` plugin hook), chain
//! confirmations and spends of the funding output, worker subprocess outcomes, and user
//! commands. All mutation happens on the caller's single event loop; the collaborator
//! traits never call back in synchronously, so methods here are straight-line code.

use bitcoin::hash_types::Txid;
use bitcoin::hex::DisplayHex;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::PublicKey;
use bitcoin::transaction::Transaction;
use bitcoin::Witness;

use crate::chain::chaininterface::{BroadcasterInterface, ANNOUNCE_MIN_DEPTH};
use crate::chain::{BestBlock, WatchResult};
use crate::events::{CloseFailure, CloseSuccess, CloseType, Event};
use crate::ln::chan_utils;
use crate::ln::channel::{Channel, ChannelSeed, ChannelState};
use crate::ln::channel_id::ChannelId;
use crate::ln::channel_state::{ChannelDetails, HtlcDetails, LogDetails, PeerDetails};
use crate::ln::hooks::{parse_peer_connected_reply, HookVerdict, PeerConnectedPayload, PeerConnectedPeer, PluginHooks};
use crate::ln::msgs::{ErrorMessage, NetAddress, WorkerMsg};
use crate::ln::peer::{Peer, UncommittedChannel};
use crate::ln::subd::{PeerConnector, PeerTransport, WorkerBroker, WorkerRole};
use crate::sign::CommitmentSigner;
use crate::util::config::NodeConfig;
use crate::util::errors::APIError;
use crate::util::logger::{Level, Logger};
use crate::util::persist::{ChannelTxEvent, TxType, Wallet};
use crate::util::scid_utils::ShortChannelId;
use crate::util::time::Instant;

use serde::Serialize;

use core::ops::Deref;
use core::time::Duration;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Ways a user command can refer to a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelSelector {
	/// By the owning peer's node id.
	PeerId(PublicKey),
	/// By the wire channel id.
	ChannelId(ChannelId),
	/// By the short channel id.
	ShortChannelId(ShortChannelId),
}

impl ChannelSelector {
	/// Parses the `id` parameter of `close`/`setchannelfee`: a 33-byte hex node key, a
	/// 32-byte hex channel id, or a `BLOCKxTXxOUT` short channel id.
	pub fn parse(s: &str) -> Option<ChannelSelector> {
		if s.len() == 66 {
			if let Ok(key) = s.parse::<PublicKey>() {
				return Some(ChannelSelector::PeerId(key));
			}
		}
		if s.len() == 64 {
			if let Some(cid) = ChannelId::from_hex(s) {
				return Some(ChannelSelector::ChannelId(cid));
			}
		}
		if let Ok(scid) = s.parse::<ShortChannelId>() {
			return Some(ChannelSelector::ShortChannelId(scid));
		}
		None
	}
}

/// What a `close` call did immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseAction {
	/// The peer only had an uncommitted channel; it was killed and the command is done.
	UncommittedChannelKilled,
	/// A close command was registered; an [`Event::CloseCommandResolved`] with this id will
	/// fire when it finishes.
	Pending {
		/// The registered command's id.
		command_id: u64,
	},
}

/// One channel updated by `setchannelfee`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetFeeChannel {
	/// The owning peer's node id, hex-encoded.
	pub peer_id: String,
	/// The wire channel id, hex-encoded.
	pub channel_id: String,
	/// The short channel id, if assigned.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub short_channel_id: Option<String>,
}

/// The result of `setchannelfee`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SetFeeResult {
	/// The fee base applied, in millisatoshi.
	pub base: u32,
	/// The proportional fee applied, in parts-per-million.
	pub ppm: u32,
	/// The channels that were updated.
	pub channels: Vec<SetFeeChannel>,
}

/// The result of `getinfo`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GetInfo {
	/// Our node id, hex-encoded.
	pub id: String,
	/// Our alias.
	pub alias: String,
	/// Our color, hex-encoded.
	pub color: String,
	/// Number of peers in the registry.
	pub num_peers: u32,
	/// Number of channels still waiting for lockin.
	pub num_pending_channels: u32,
	/// Number of channels in active operation or close negotiation.
	pub num_active_channels: u32,
	/// Number of channels being resolved on-chain.
	pub num_inactive_channels: u32,
	/// Addresses we announce.
	pub address: Vec<String>,
	/// Addresses we are bound to.
	pub binding: Vec<String>,
	/// Our version string.
	pub version: String,
	/// The best known block height.
	pub blockheight: u32,
	/// The chain we are on.
	pub network: String,
	/// Total routing fees collected, in millisatoshi.
	pub fees_collected_msat: u64,
}

/// The result of `dev-forget-channel`.
#[cfg(feature = "developer")]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DevForgetResult {
	/// Whether the UTXO check was overridden.
	pub forced: bool,
	/// Whether the funding output was still unspent.
	pub funding_unspent: bool,
	/// The funding transaction id.
	pub funding_txid: String,
}

/// A registered user request to close a channel.
///
/// Weakly attached to its channel by database id: if the channel vanishes, the command fails
/// with a well-defined error; exactly one of {resolution, channel-destroyed, timeout} fires
/// per command.
struct CloseCommand {
	id: u64,
	channel_dbid: u64,
	force: bool,
	registered_at: Instant,
	timeout: Duration,
}

/// The peer/channel control plane.
///
/// Single-threaded cooperative: the host calls in from one event loop, and internal locks
/// exist to make `&self` methods possible, not for parallelism.
pub struct PeerControl<SD: Deref, CO: Deref, SI: Deref, W: Deref, T: Deref, H: Deref, L: Deref>
where
	SD::Target: WorkerBroker,
	CO::Target: PeerConnector,
	SI::Target: CommitmentSigner,
	W::Target: Wallet,
	T::Target: BroadcasterInterface,
	H::Target: PluginHooks,
	L::Target: Logger,
{
	our_node_id: PublicKey,
	config: NodeConfig,
	peers: Mutex<Vec<Peer>>,
	close_commands: Mutex<Vec<CloseCommand>>,
	pending_events: Mutex<Vec<Event>>,
	best_block: Mutex<BestBlock>,
	next_close_id: AtomicU64,
	broker: SD,
	connector: CO,
	signer: SI,
	wallet: W,
	broadcaster: T,
	hooks: H,
	logger: L,
}

impl<SD: Deref, CO: Deref, SI: Deref, W: Deref, T: Deref, H: Deref, L: Deref>
	PeerControl<SD, CO, SI, W, T, H, L>
where
	SD::Target: WorkerBroker,
	CO::Target: PeerConnector,
	SI::Target: CommitmentSigner,
	W::Target: Wallet,
	T::Target: BroadcasterInterface,
	H::Target: PluginHooks,
	L::Target: Logger,
{
	/// Constructs a new control plane with an empty registry.
	pub fn new(
		our_node_id: PublicKey, config: NodeConfig, broker: SD, connector: CO, signer: SI,
		wallet: W, broadcaster: T, hooks: H, logger: L,
	) -> Self {
		PeerControl {
			our_node_id,
			config,
			peers: Mutex::new(Vec::new()),
			close_commands: Mutex::new(Vec::new()),
			pending_events: Mutex::new(Vec::new()),
			best_block: Mutex::new(BestBlock::new(0)),
			next_close_id: AtomicU64::new(1),
			broker,
			connector,
			signer,
			wallet,
			broadcaster,
			hooks,
			logger,
		}
	}

	/// Our own node id.
	pub fn get_our_node_id(&self) -> PublicKey {
		self.our_node_id
	}

	/// Restores peers and channels from the wallet. Call once at startup, before any events
	/// are delivered.
	pub fn load_from_wallet(&self) {
		let stored = match self.wallet.load_channels() {
			Ok(stored) => stored,
			Err(e) => panic!("Could not load channels from the database: {}", e.0),
		};
		let mut peers = self.peers.lock().unwrap();
		assert!(peers.is_empty());
		log_info!(self.logger, "Loading {} peers from the wallet", stored.len());
		for stored_peer in stored {
			let mut peer = Peer::new(
				&self.our_node_id,
				stored_peer.id,
				stored_peer.addr,
				stored_peer.dbid,
				self.config.peer_log_mirror_level,
			);
			for seed in stored_peer.channels {
				peer.channels.push(Channel::from_seed(seed));
			}
			peers.push(peer);
		}
	}

	/// Kicks off reconnection attempts for every peer we still have an active channel with.
	/// The host re-registers funding watches separately, based on the restored records.
	pub fn activate_peers(&self) {
		if !self.config.reconnect {
			return;
		}
		let mut peers = self.peers.lock().unwrap();
		log_debug!(self.logger, "Activating {} peers", peers.len());
		for peer in peers.iter_mut() {
			let id = peer.id;
			let addr = peer.addr;
			if let Some(channel) = peer.active_channel_mut() {
				self.connector.connect_to_peer(&id, 0, Some(&addr));
				channel.billboard.set_transient(Some("Attempting to reconnect".to_string()));
			}
		}
	}

	/// The chain watcher tells us about a new tip.
	pub fn best_block_updated(&self, height: u32) {
		*self.best_block.lock().unwrap() = BestBlock::new(height);
	}

	/// Returns and clears all pending events. The host must handle each exactly once.
	pub fn get_and_clear_pending_events(&self) -> Vec<Event> {
		std::mem::take(&mut *self.pending_events.lock().unwrap())
	}

	/// Looks a peer up by its durable row id, for layers (like HTLC restore) that join
	/// against the database rather than the wire.
	pub fn peer_by_dbid(&self, dbid: u64) -> Option<PublicKey> {
		if dbid == 0 {
			return None;
		}
		self.peers.lock().unwrap().iter().find(|p| p.dbid == dbid).map(|p| p.id)
	}

	// Registry plumbing.

	fn peer_index(&self, peers: &[Peer], id: &PublicKey) -> Option<usize> {
		peers.iter().position(|p| p.id == *id)
	}

	fn channel_index(&self, peers: &[Peer], channel_id: &ChannelId) -> Option<(usize, usize)> {
		for (pidx, peer) in peers.iter().enumerate() {
			for (cidx, channel) in peer.channels.iter().enumerate() {
				if channel.channel_id() == *channel_id {
					return Some((pidx, cidx));
				}
			}
		}
		None
	}

	fn channel_index_by_dbid(&self, peers: &[Peer], dbid: u64) -> Option<(usize, usize)> {
		for (pidx, peer) in peers.iter().enumerate() {
			for (cidx, channel) in peer.channels.iter().enumerate() {
				if channel.dbid == dbid {
					return Some((pidx, cidx));
				}
			}
		}
		None
	}

	/// Last one out deletes the peer: no channels and no uncommitted channel means nothing
	/// references it any more.
	fn maybe_delete_peer(&self, peers: &mut Vec<Peer>, pidx: usize) {
		if !peers[pidx].channels.is_empty() {
			return;
		}
		if peers[pidx].uncommitted_channel.is_some() {
			// Not enough to keep a durable row alive on its own.
			if peers[pidx].dbid != 0 {
				self.wallet.peer_delete(peers[pidx].dbid);
				peers[pidx].dbid = 0;
			}
			return;
		}
		if peers[pidx].dbid != 0 {
			self.wallet.peer_delete(peers[pidx].dbid);
		}
		peers.remove(pidx);
	}

	fn kill_uncommitted_channel(&self, peers: &mut Vec<Peer>, pidx: usize, why: &str) {
		{
			let peer = &mut peers[pidx];
			log_peer_info!(self.logger, peer.log, "Killing openingd: {}", why);
			peer.uncommitted_channel = None;
		}
		self.maybe_delete_peer(peers, pidx);
	}

	/// Removes a channel entirely: fails any close commands still attached, drops the
	/// durable row, and deletes the peer if this was the last reference.
	fn delete_channel(&self, peers: &mut Vec<Peer>, pidx: usize, cidx: usize) {
		let channel = peers[pidx].channels.remove(cidx);
		self.fail_close_commands(channel.dbid, "Channel forgotten before proper close");
		self.wallet.channel_delete(channel.dbid);
		self.maybe_delete_peer(peers, pidx);
	}

	// Close coordination.

	fn register_close_command(&self, channel_dbid: u64, timeout_secs: u64, force: bool) -> u64 {
		let id = self.next_close_id.fetch_add(1, Ordering::AcqRel);
		self.close_commands.lock().unwrap().push(CloseCommand {
			id,
			channel_dbid,
			force,
			registered_at: Instant::now(),
			timeout: Duration::from_secs(timeout_secs),
		});
		id
	}

	/// Resolves every close command attached to `channel` with a success result, in one
	/// turn. Detaching and resolution are one step, so a reentrant path (timeout firing
	/// while we resolve) cannot double-fire.
	fn resolve_close_commands(&self, channel: &Channel, cooperative: bool) {
		let close_type = if cooperative { CloseType::Mutual } else { CloseType::Unilateral };
		let mut commands = self.close_commands.lock().unwrap();
		let mut events = self.pending_events.lock().unwrap();
		commands.retain(|cc| {
			if cc.channel_dbid != channel.dbid {
				return true;
			}
			events.push(Event::CloseCommandResolved {
				id: cc.id,
				result: Ok(CloseSuccess {
					tx: channel.last_tx.clone(),
					txid: channel.last_tx.compute_txid(),
					close_type,
				}),
			});
			false
		});
	}

	fn fail_close_commands(&self, channel_dbid: u64, message: &str) {
		let mut commands = self.close_commands.lock().unwrap();
		let mut events = self.pending_events.lock().unwrap();
		commands.retain(|cc| {
			if cc.channel_dbid != channel_dbid {
				return true;
			}
			events.push(Event::CloseCommandResolved {
				id: cc.id,
				result: Err(CloseFailure { message: message.to_string() }),
			});
			false
		});
	}

	/// Fires close-command deadlines. Call once a second or so.
	pub fn timer_tick_occurred(&self) {
		let now = Instant::now();
		loop {
			let expired = {
				let mut commands = self.close_commands.lock().unwrap();
				match commands
					.iter()
					.position(|cc| now.duration_since(cc.registered_at) >= cc.timeout)
				{
					None => break,
					Some(i) => {
						if commands[i].force {
							// Stays registered: the permanent failure below resolves it
							// through drop_to_chain with a unilateral result.
							(commands[i].id, commands[i].channel_dbid, true)
						} else {
							let cc = commands.remove(i);
							(cc.id, cc.channel_dbid, false)
						}
					},
				}
			};
			let (id, channel_dbid, force) = expired;
			if force {
				let mut peers = self.peers.lock().unwrap();
				match self.channel_index_by_dbid(&peers, channel_dbid) {
					Some((pidx, cidx)) => {
						self.channel_fail_permanent(
							&mut peers[pidx],
							cidx,
							"Forcibly closed by 'close' command timeout".to_string(),
						);
					},
					None => {
						// Channel destruction fails its commands before removal, so a live
						// command without a channel means bookkeeping broke somewhere.
						log_broken!(self.logger, "Close command {} lost its channel without resolution", id);
						self.close_commands.lock().unwrap().retain(|cc| cc.id != id);
						self.pending_events.lock().unwrap().push(Event::CloseCommandResolved {
							id,
							result: Err(CloseFailure {
								message: "Channel forgotten before proper close".to_string(),
							}),
						});
					},
				}
			} else {
				self.pending_events.lock().unwrap().push(Event::CloseCommandResolved {
					id,
					result: Err(CloseFailure {
						message: "Channel close negotiation not finished before timeout"
							.to_string(),
					}),
				});
			}
		}
	}

	// Commitment broadcast.

	fn sign_last_tx(&self, channel: &mut Channel) {
		assert!(channel.last_tx.input[0].witness.is_empty());
		let our_sig: Signature = match self.signer.sign_commitment_tx(
			&channel.peer_id,
			channel.dbid,
			&channel.last_tx,
			&channel.remote_funding_pubkey,
			channel.funding_satoshis,
		) {
			Ok(sig) => sig,
			Err(e) => panic!("Signer failed on sign_commitment_tx: {}", e),
		};
		let witness = chan_utils::funding_spend_witness(
			&our_sig,
			&channel.last_sig,
			&channel.local_funding_pubkey,
			&channel.remote_funding_pubkey,
		);
		channel.last_tx.input[0].witness = witness;
	}

	fn remove_sig(channel: &mut Channel) {
		channel.last_tx.input[0].witness = Witness::new();
	}

	/// Puts `last_tx` on chain (unless the counterparty has proven a later state) and
	/// resolves any close commands registered against the channel.
	fn drop_to_chain(&self, peer: &mut Peer, cidx: usize, cooperative: bool) {
		let Peer { ref log, ref mut channels, .. } = *peer;
		let channel = &mut channels[cidx];
		if channel.future_per_commitment_point.is_some() && !cooperative {
			// The counterparty proved they hold a later commitment; broadcasting ours would
			// hand them every output. Wait for them to close.
			log_peer_broken!(
				self.logger,
				log,
				"Cannot broadcast our commitment tx: they have a future one"
			);
		} else {
			self.sign_last_tx(channel);
			let txid = channel.last_tx.compute_txid();
			self.wallet.transaction_add(&channel.last_tx, 0, 0);
			self.wallet.transaction_annotate(&txid, channel.last_tx_type, channel.dbid);
			// Keep broadcasting until told to stop; losing the race to the counterparty's
			// copy counts as done.
			self.broadcaster.broadcast_transaction(&channel.last_tx);
			Self::remove_sig(channel);
		}
		self.resolve_close_commands(channel, cooperative);
	}

	// State transitions and failure paths.

	fn set_channel_state(&self, peer: &mut Peer, cidx: usize, old: ChannelState, new: ChannelState) {
		let Peer { ref log, ref mut channels, .. } = *peer;
		let channel = &mut channels[cidx];
		log_peer_info!(self.logger, log, "State changed from {} to {}", old, new);
		channel.set_state(old, new);
		self.wallet.channel_save(&channel.to_seed());
	}

	/// Tears down the channel's worker but leaves the channel untouched; the peer will
	/// reconnect and pick up where it left off.
	fn channel_fail_transient(&self, peer: &mut Peer, cidx: usize, why: String) {
		let id = peer.id;
		let addr = peer.addr;
		{
			let Peer { ref log, ref mut channels, .. } = *peer;
			let channel = &mut channels[cidx];
			log_peer_info!(
				self.logger,
				log,
				"Peer transient failure in {}: {}",
				channel.state(),
				why
			);
			channel.owner = None;
			channel.connected = false;
			if self.config.reconnect {
				channel.billboard.set_transient(Some("Attempting to reconnect".to_string()));
			}
		}
		if self.config.reconnect {
			self.connector.connect_to_peer(&id, 1, Some(&addr));
		}
	}

	/// The channel can no longer operate off-chain: latch an error for the peer, tear down
	/// the worker, drop our commitment to the chain, and park the channel in
	/// `AWAITING_UNILATERAL`.
	fn channel_fail_permanent(&self, peer: &mut Peer, cidx: usize, why: String) {
		{
			let Peer { ref log, ref mut channels, .. } = *peer;
			let channel = &mut channels[cidx];
			log_peer_warn!(
				self.logger,
				log,
				"Peer permanent failure in {}: {}",
				channel.state(),
				why
			);
			if channel.error.is_none() {
				channel.error = Some(ErrorMessage::new(channel.channel_id(), why));
			}
			channel.owner = None;
			channel.connected = false;
		}
		self.drop_to_chain(peer, cidx, false);
		if peer.channels[cidx].is_active() {
			let old = peer.channels[cidx].state();
			self.set_channel_state(peer, cidx, old, ChannelState::AwaitingUnilateral);
		}
	}

	fn channel_internal_error(&self, peer: &mut Peer, cidx: usize, why: &str) {
		log_peer_broken!(self.logger, peer.log, "Internal error: {}", why);
		self.channel_fail_permanent(peer, cidx, "Internal error".to_string());
	}

	// Worker outcomes.

	/// A worker terminated, either with a live transport (protocol error on the connection,
	/// possibly with an error we sent) or without one (crash or disconnection, always
	/// transient).
	pub fn channel_errmsg(
		&self, channel_id: &ChannelId, transport: Option<PeerTransport>, desc: &str,
		err_for_them: Option<ErrorMessage>,
	) {
		let mut peers = self.peers.lock().unwrap();
		let (pidx, cidx) = match self.channel_index(&peers, channel_id) {
			Some(found) => found,
			None => {
				log_error!(self.logger, "Worker error for unknown channel {}: {}", channel_id, desc);
				return;
			},
		};
		let owner_name = peers[pidx].channels[cidx]
			.owner
			.as_ref()
			.map(|o| o.role().name())
			.unwrap_or("unowned");

		// No transport means a worker crash or a disconnection; both are transient.
		let transport = match transport {
			None => {
				let why = format!("{}: {}", owner_name, desc);
				self.channel_fail_transient(&mut peers[pidx], cidx, why);
				return;
			},
			Some(transport) => transport,
		};

		let sent = err_for_them.is_some();
		if let Some(err) = err_for_them {
			if peers[pidx].channels[cidx].error.is_none() {
				peers[pidx].channels[cidx].error = Some(err);
			}
		}

		self.pending_events
			.lock()
			.unwrap()
			.push(Event::PeerDisconnected { peer_id: peers[pidx].id });

		// The worker already delivered (or consumed) the error; the connection dies with it.
		// TODO: an all-channels error (zero channel_id) should fail every channel with this
		// peer and close the connection entirely.
		drop(transport);

		let why = format!(
			"{}: {} ERROR {}",
			owner_name,
			if sent { "sent" } else { "received" },
			desc
		);
		self.channel_fail_permanent(&mut peers[pidx], cidx, why);
	}

	/// The opening worker finished its handshake and the channel is now durable. The opening
	/// worker hands the transport back; the channel worker takes over awaiting lockin.
	///
	/// `peer_dbid` is the durable peer row the wallet created alongside the channel row.
	pub fn opening_succeeded(
		&self, seed: ChannelSeed, peer_dbid: u64, transport: PeerTransport,
	) -> ChannelId {
		assert_eq!(seed.state, ChannelState::ChanneldAwaitingLockin);
		let mut peers = self.peers.lock().unwrap();
		let pidx = match self.peer_index(&peers, &seed.peer_id) {
			Some(pidx) => pidx,
			None => panic!("Opening succeeded for unknown peer {}", log_pubkey!(seed.peer_id)),
		};
		let peer = &mut peers[pidx];
		peer.uncommitted_channel = None;
		if peer.dbid == 0 {
			peer.dbid = peer_dbid;
		}
		self.wallet.channel_save(&seed);
		let mut channel = Channel::from_seed(seed);
		let channel_id = channel.channel_id();
		log_peer_info!(
			self.logger,
			peer.log,
			"New channel {} now {}",
			channel_id,
			channel.state()
		);
		channel.owner =
			Some(self.broker.start_channel_worker(&peer.id, &channel_id, transport, false));
		channel.connected = true;
		peer.channels.push(channel);
		channel_id
	}

	/// The opening worker failed or the peer walked away; nothing was ever durable.
	pub fn opening_failed(&self, peer_id: &PublicKey, why: &str) {
		let mut peers = self.peers.lock().unwrap();
		match self.peer_index(&peers, peer_id) {
			Some(pidx) if peers[pidx].uncommitted_channel.is_some() => {
				self.kill_uncommitted_channel(&mut peers, pidx, why);
			},
			_ => {
				log_warn!(self.logger, "Opening failure for unknown peer {}", log_pubkey!(*peer_id));
			},
		}
	}

	/// The channel worker saw both sides' `funding_locked`; the channel is usable.
	pub fn funding_locked(&self, channel_id: &ChannelId) {
		let mut peers = self.peers.lock().unwrap();
		if let Some((pidx, cidx)) = self.channel_index(&peers, channel_id) {
			self.set_channel_state(
				&mut peers[pidx],
				cidx,
				ChannelState::ChanneldAwaitingLockin,
				ChannelState::ChanneldNormal,
			);
		}
	}

	/// The channel worker completed the shutdown exchange and handed the transport back; the
	/// closing worker takes over fee negotiation.
	pub fn shutdown_complete(&self, channel_id: &ChannelId, transport: PeerTransport) {
		let mut peers = self.peers.lock().unwrap();
		let (pidx, cidx) = match self.channel_index(&peers, channel_id) {
			Some(found) => found,
			None => panic!("shutdown_complete for unknown channel {}", channel_id),
		};
		// The transport must be unowned before it is handed to the next worker.
		peers[pidx].channels[cidx].owner = None;
		self.set_channel_state(
			&mut peers[pidx],
			cidx,
			ChannelState::ChanneldShuttingDown,
			ChannelState::ClosingdSigexchange,
		);
		let peer_id = peers[pidx].id;
		peers[pidx].channels[cidx].owner =
			Some(self.broker.start_closing_worker(&peer_id, channel_id, transport, false));
	}

	/// The closing worker agreed on a close transaction with the peer. We store it as the
	/// new `last_tx`, broadcast it, and resolve any close commands as mutual.
	pub fn closing_complete(&self, channel_id: &ChannelId, tx: Transaction, their_sig: Signature) {
		let mut peers = self.peers.lock().unwrap();
		let (pidx, cidx) = match self.channel_index(&peers, channel_id) {
			Some(found) => found,
			None => panic!("closing_complete for unknown channel {}", channel_id),
		};
		{
			let channel = &mut peers[pidx].channels[cidx];
			channel.last_tx = tx;
			channel.last_sig = their_sig;
			channel.last_tx_type = TxType::ChannelClose;
			channel.owner = None;
		}
		self.set_channel_state(
			&mut peers[pidx],
			cidx,
			ChannelState::ClosingdSigexchange,
			ChannelState::ClosingdComplete,
		);
		self.drop_to_chain(&mut peers[pidx], cidx, true);
	}

	// Funding watcher callbacks.

	/// Depth change of the funding transaction.
	pub fn funding_depth_changed(
		&self, channel_id: &ChannelId, txid: &Txid, depth: u32,
	) -> WatchResult {
		let mut peers = self.peers.lock().unwrap();
		let (pidx, cidx) = match self.channel_index(&peers, channel_id) {
			Some(found) => found,
			None => return WatchResult::DeleteWatch,
		};
		let peer = &mut peers[pidx];
		let minimum_depth = peer.channels[cidx].minimum_depth;
		log_peer_debug!(
			self.logger,
			peer.log,
			"Funding tx {} depth {} of {}",
			txid,
			depth,
			minimum_depth
		);

		let min_depth_reached = depth >= minimum_depth;
		let have_scid = peer.channels[cidx].scid.is_some();

		// A reorg can change the scid, so re-derive whenever the tx has any depth and we
		// already assigned one (depth 0 means the block carrying it was disconnected).
		if (min_depth_reached && !have_scid) || (depth > 0 && have_scid) {
			let dbid = peer.channels[cidx].dbid;
			self.wallet.transaction_annotate(txid, TxType::ChannelFunding, dbid);
			let loc = match self.wallet.transaction_locate(txid) {
				Some(loc) => loc,
				// The index lags the watcher; try again on the next notification.
				None => return WatchResult::KeepWatching,
			};
			let funding_outnum = peer.channels[cidx].funding.index;
			let scid = match ShortChannelId::from_parts(
				loc.blockheight as u64,
				loc.index as u64,
				funding_outnum as u64,
			) {
				Ok(scid) => scid,
				Err(_) => {
					self.channel_fail_permanent(
						peer,
						cidx,
						format!(
							"Invalid funding scid {}:{}:{}",
							loc.blockheight, loc.index, funding_outnum
						),
					);
					return WatchResult::DeleteWatch;
				},
			};
			match peer.channels[cidx].scid {
				None => {
					peer.channels[cidx].scid = Some(scid);
					self.wallet.channel_save(&peer.channels[cidx].to_seed());
				},
				Some(old_scid) if old_scid != scid => {
					// Restarting the worker hands it the updated scid and re-announces it.
					self.channel_fail_transient(
						peer,
						cidx,
						format!("short_channel_id changed to {} (was {})", scid, old_scid),
					);
					peer.channels[cidx].scid = Some(scid);
					self.wallet.channel_save(&peer.channels[cidx].to_seed());
					return WatchResult::KeepWatching;
				},
				Some(_) => {},
			}
		}

		// Try to tell the worker; if it is not ready, retry on the next depth change.
		let told = match peer.channels[cidx].owner {
			Some(ref owner) => owner.handle_depth(txid, depth),
			None => false,
		};
		if !told {
			return WatchResult::KeepWatching;
		}

		if !min_depth_reached {
			return WatchResult::KeepWatching;
		}

		// Keep reporting depth until the channel could be announced.
		if depth < ANNOUNCE_MIN_DEPTH {
			return WatchResult::KeepWatching;
		}

		WatchResult::DeleteWatch
	}

	/// The funding output was spent. Record the event and hand the channel to the on-chain
	/// resolver.
	pub fn funding_spent(
		&self, channel_id: &ChannelId, tx: &Transaction, blockheight: u32,
	) -> WatchResult {
		let mut peers = self.peers.lock().unwrap();
		let (pidx, cidx) = match self.channel_index(&peers, channel_id) {
			Some(found) => found,
			None => return WatchResult::DeleteWatch,
		};
		let txid = tx.compute_txid();
		let dbid = peers[pidx].channels[cidx].dbid;
		self.wallet.channel_event_add(dbid, ChannelTxEvent::OnchainInit, &txid, blockheight);

		let state = peers[pidx].channels[cidx].state();
		if !state.can_transition_to(ChannelState::FundingSpendSeen) {
			return WatchResult::KeepWatching;
		}
		peers[pidx].channels[cidx].owner = None;
		self.set_channel_state(&mut peers[pidx], cidx, state, ChannelState::FundingSpendSeen);
		let peer_id = peers[pidx].id;
		peers[pidx].channels[cidx].owner =
			Some(self.broker.start_onchain_worker(&peer_id, channel_id, tx, blockheight));
		self.set_channel_state(
			&mut peers[pidx],
			cidx,
			ChannelState::FundingSpendSeen,
			ChannelState::Onchain,
		);
		WatchResult::KeepWatching
	}

	// Connect orchestration.

	/// The transport daemon handed us a fresh peer connection. Consults the `peer_connected`
	/// hook, then routes the connection to whichever worker the channel state demands.
	pub fn peer_connected(
		&self, their_id: PublicKey, addr: NetAddress, transport: PeerTransport,
		globalfeatures: Vec<u8>, localfeatures: Vec<u8>,
	) {
		log_trace!(self.logger, "peer_connected: {}", log_pubkey!(their_id));
		let mut peers = self.peers.lock().unwrap();
		let pidx = match self.peer_index(&peers, &their_id) {
			Some(pidx) => pidx,
			None => {
				peers.push(Peer::new(
					&self.our_node_id,
					their_id,
					addr,
					0,
					self.config.peer_log_mirror_level,
				));
				peers.len() - 1
			},
		};
		peers[pidx].update_features(globalfeatures, localfeatures);

		// Complete any outstanding connect commands.
		self.pending_events
			.lock()
			.unwrap()
			.push(Event::PeerConnected { peer_id: their_id, addr });

		// The transport daemon never hands us a duplicate connection while a negotiation is
		// live; it waits until we report the peer gone.
		assert!(peers[pidx].uncommitted_channel.is_none());

		let payload = PeerConnectedPayload {
			peer: PeerConnectedPeer {
				id: format!("{}", log_pubkey!(their_id)),
				addr: addr.to_string(),
				globalfeatures: peers[pidx].globalfeatures.to_lower_hex_string(),
				localfeatures: peers[pidx].localfeatures.to_lower_hex_string(),
			},
		};
		match parse_peer_connected_reply(&self.hooks.peer_connected(&payload)) {
			HookVerdict::Continue => {},
			HookVerdict::Disconnect { error_message } => {
				if let Some(msg) = error_message {
					let err = ErrorMessage::new(ChannelId::new_zero(), msg);
					self.broker.send_error_and_close(transport, &err);
				}
				self.maybe_delete_peer(&mut peers, pidx);
				return;
			},
		}

		let cidx = peers[pidx].channels.iter().position(|c| c.is_active());
		let cidx = match cidx {
			Some(cidx) => cidx,
			None => {
				// No channel: park the connection in an opening worker, ready for either
				// side to propose one.
				let peer = &mut peers[pidx];
				peer.addr = addr;
				let owner = self.broker.start_opening_worker(&their_id, transport);
				peer.uncommitted_channel = Some(UncommittedChannel { owner });
				return;
			},
		};

		let peer = &mut peers[pidx];
		log_peer_debug!(
			self.logger,
			peer.log,
			"Peer has reconnected, state {}",
			peer.channels[cidx].state()
		);

		// If we have a canned error, deliver it now.
		if let Some(err) = peer.channels[cidx].error.clone() {
			log_peer_debug!(
				self.logger,
				peer.log,
				"Telling connectd to send error {}",
				log_bytes!(err.encode())
			);
			self.broker.send_error_and_close(transport, &err);
			return;
		}

		match peer.channels[cidx].state() {
			ChannelState::Onchain
			| ChannelState::FundingSpendSeen
			| ChannelState::ClosingdComplete => {
				// is_active() filtered these out above.
				unreachable!("Channel in {} state on reconnect", peer.channels[cidx].state());
			},

			// We consider this "active" but we only send an error.
			ChannelState::AwaitingUnilateral => {
				let err = ErrorMessage::new(
					peer.channels[cidx].channel_id(),
					"Awaiting unilateral close".to_string(),
				);
				self.broker.send_error_and_close(transport, &err);
			},

			ChannelState::ChanneldAwaitingLockin
			| ChannelState::ChanneldNormal
			| ChannelState::ChanneldShuttingDown => {
				assert!(peer.channels[cidx].owner.is_none());
				peer.addr = addr;
				let channel_id = peer.channels[cidx].channel_id();
				peer.channels[cidx].owner =
					Some(self.broker.start_channel_worker(&their_id, &channel_id, transport, true));
				peer.channels[cidx].connected = true;
				peer.channels[cidx].billboard.set_transient(None);
			},

			ChannelState::ClosingdSigexchange => {
				assert!(peer.channels[cidx].owner.is_none());
				peer.addr = addr;
				let channel_id = peer.channels[cidx].channel_id();
				peer.channels[cidx].owner =
					Some(self.broker.start_closing_worker(&their_id, &channel_id, transport, true));
				peer.channels[cidx].connected = true;
				peer.channels[cidx].billboard.set_transient(None);
			},

			ChannelState::Openingd => {
				unreachable!("Committed channel in OPENINGD state");
			},
		}
	}

	/// The transport daemon reports the peer's connection gone.
	pub fn peer_disconnected(&self, their_id: &PublicKey) {
		let mut peers = self.peers.lock().unwrap();
		if let Some(pidx) = self.peer_index(&peers, their_id) {
			for channel in peers[pidx].channels.iter_mut() {
				channel.connected = false;
			}
		}
		self.pending_events.lock().unwrap().push(Event::PeerDisconnected { peer_id: *their_id });
	}

	// User commands.

	/// Resolves a selector to a channel among active channels. `peers` is the locked
	/// registry.
	fn select_channel(
		&self, peers: &[Peer], selector: &ChannelSelector,
	) -> Result<(usize, usize), APIError> {
		match selector {
			ChannelSelector::PeerId(_) => unreachable!("peer selectors are handled by callers"),
			ChannelSelector::ChannelId(cid) => {
				for (pidx, peer) in peers.iter().enumerate() {
					if let Some(cidx) = peer.channels.iter().position(|c| c.is_active()) {
						if peer.channels[cidx].channel_id() == *cid {
							return Ok((pidx, cidx));
						}
					}
				}
				Err(APIError::APIMisuseError { err: format!("Channel ID not found: '{}'", cid) })
			},
			ChannelSelector::ShortChannelId(scid) => {
				for (pidx, peer) in peers.iter().enumerate() {
					if let Some(cidx) = peer.channels.iter().position(|c| c.is_active()) {
						if peer.channels[cidx].scid == Some(*scid) {
							return Ok((pidx, cidx));
						}
					}
				}
				Err(APIError::APIMisuseError {
					err: format!("Short channel ID not found: '{}'", scid),
				})
			},
		}
	}

	/// Begins closing a channel.
	///
	/// From `CHANNELD_NORMAL` or `CHANNELD_AWAITING_LOCKIN` this starts the shutdown
	/// exchange; from the two closing states it just adds another command waiting on the
	/// same resolution (a previous `close` may have timed out). The returned pending id
	/// resolves through [`Event::CloseCommandResolved`] within `timeout_secs` (or earlier).
	pub fn close(
		&self, selector: &ChannelSelector, force: bool, timeout_secs: u64,
	) -> Result<CloseAction, APIError> {
		let mut peers = self.peers.lock().unwrap();
		let (pidx, cidx) = match selector {
			ChannelSelector::PeerId(id) => {
				let pidx = self.peer_index(&peers, id).ok_or(APIError::ChannelUnavailable {
					err: "Peer has no active channel".to_string(),
				})?;
				match peers[pidx].channels.iter().position(|c| c.is_active()) {
					Some(cidx) => (pidx, cidx),
					None => {
						if peers[pidx].uncommitted_channel.is_some() {
							// Easy case: peer can simply be forgotten.
							self.kill_uncommitted_channel(&mut peers, pidx, "close command called");
							return Ok(CloseAction::UncommittedChannelKilled);
						}
						return Err(APIError::ChannelUnavailable {
							err: "Peer has no active channel".to_string(),
						});
					},
				}
			},
			other => self.select_channel(&peers, other)?,
		};

		// Shutting-down and sigexchange are allowed: a previous close command may have timed
		// out, and this command waits on the effects of that one.
		let state = peers[pidx].channels[cidx].state();
		match state {
			ChannelState::ChanneldNormal | ChannelState::ChanneldAwaitingLockin => {
				self.set_channel_state(
					&mut peers[pidx],
					cidx,
					state,
					ChannelState::ChanneldShuttingDown,
				);
				if let Some(ref owner) = peers[pidx].channels[cidx].owner {
					owner.send(WorkerMsg::SendShutdown);
				}
			},
			ChannelState::ChanneldShuttingDown | ChannelState::ClosingdSigexchange => {},
			other => {
				return Err(APIError::ChannelUnavailable {
					err: format!("Channel is in state {}", other),
				});
			},
		}

		let dbid = peers[pidx].channels[cidx].dbid;
		let command_id = self.register_close_command(dbid, timeout_secs, force);
		Ok(CloseAction::Pending { command_id })
	}

	/// Disconnects from a peer. Refuses if an active channel exists, unless `force`, which
	/// transient-fails the channel (tearing its worker down).
	pub fn disconnect_peer(&self, peer_id: &PublicKey, force: bool) -> Result<(), APIError> {
		let mut peers = self.peers.lock().unwrap();
		let pidx = self.peer_index(&peers, peer_id).ok_or(APIError::ChannelUnavailable {
			err: "Peer not connected".to_string(),
		})?;
		if let Some(cidx) = peers[pidx].channels.iter().position(|c| c.is_active()) {
			if force {
				self.channel_fail_transient(
					&mut peers[pidx],
					cidx,
					"disconnect command force=true".to_string(),
				);
				return Ok(());
			}
			return Err(APIError::ChannelUnavailable {
				err: format!("Peer is in state {}", peers[pidx].channels[cidx].state()),
			});
		}
		if peers[pidx].uncommitted_channel.is_none() {
			return Err(APIError::ChannelUnavailable { err: "Peer not connected".to_string() });
		}
		self.kill_uncommitted_channel(&mut peers, pidx, "disconnect command");
		Ok(())
	}

	fn apply_channel_fees(
		&self, peer: &mut Peer, cidx: usize, base: u32, ppm: u32, out: &mut Vec<SetFeeChannel>,
	) {
		{
			let channel = &mut peer.channels[cidx];
			channel.feerate_base = base;
			channel.feerate_ppm = ppm;
			// Tell the worker to re-announce its side of the channel.
			if let Some(ref owner) = channel.owner {
				if owner.role() == WorkerRole::Channel {
					owner.send(WorkerMsg::SpecificFeerates { base, ppm });
				}
			}
			self.wallet.channel_save(&channel.to_seed());
		}
		let channel = &peer.channels[cidx];
		out.push(SetFeeChannel {
			peer_id: format!("{}", log_pubkey!(peer.id)),
			channel_id: format!("{}", channel.channel_id()),
			short_channel_id: channel.scid.map(|s| s.to_string()),
		});
	}

	/// Updates routing fees on one channel, or on every eligible channel when `target` is
	/// `None` ("all"). Eligible states are `CHANNELD_NORMAL` and `CHANNELD_AWAITING_LOCKIN`.
	pub fn set_channel_fee(
		&self, target: Option<&ChannelSelector>, base: Option<u32>, ppm: Option<u32>,
	) -> Result<SetFeeResult, APIError> {
		let base = base.unwrap_or(self.config.fee_base);
		let ppm = ppm.unwrap_or(self.config.fee_per_satoshi);
		let mut out = Vec::new();
		let mut peers = self.peers.lock().unwrap();

		match target {
			None => {
				for pidx in 0..peers.len() {
					let cidx = match peers[pidx].channels.iter().position(|c| c.is_active()) {
						Some(cidx) => cidx,
						None => continue,
					};
					match peers[pidx].channels[cidx].state() {
						ChannelState::ChanneldNormal | ChannelState::ChanneldAwaitingLockin => {},
						_ => continue,
					}
					self.apply_channel_fees(&mut peers[pidx], cidx, base, ppm, &mut out);
				}
			},
			Some(ChannelSelector::PeerId(id)) => {
				let pidx = self.peer_index(&peers, id).ok_or(APIError::ChannelUnavailable {
					err: "Could not find active channel of peer with that id".to_string(),
				})?;
				let cidx = peers[pidx]
					.channels
					.iter()
					.position(|c| c.is_active())
					.ok_or(APIError::ChannelUnavailable {
						err: "Could not find active channel of peer with that id".to_string(),
					})?;
				match peers[pidx].channels[cidx].state() {
					ChannelState::ChanneldNormal | ChannelState::ChanneldAwaitingLockin => {},
					other => {
						return Err(APIError::ChannelUnavailable {
							err: format!("Channel is in state {}", other),
						});
					},
				}
				self.apply_channel_fees(&mut peers[pidx], cidx, base, ppm, &mut out);
			},
			Some(other) => {
				let (pidx, cidx) = self.select_channel(&peers, other)?;
				match peers[pidx].channels[cidx].state() {
					ChannelState::ChanneldNormal | ChannelState::ChanneldAwaitingLockin => {},
					other => {
						return Err(APIError::ChannelUnavailable {
							err: format!("Channel is in state {}", other),
						});
					},
				}
				self.apply_channel_fees(&mut peers[pidx], cidx, base, ppm, &mut out);
			},
		}

		Ok(SetFeeResult { base, ppm, channels: out })
	}

	// Read models.

	fn channel_details(&self, our_id: &PublicKey, peer: &Peer, channel: &Channel) -> ChannelDetails {
		let stats = self.wallet.channel_stats(channel.dbid);
		let peer_hex = format!("{}", log_pubkey!(peer.id));
		let our_hex = format!("{}", log_pubkey!(*our_id));

		let funding_msat = match channel.funding_satoshis.checked_mul(1000) {
			Some(msat) => msat,
			None => {
				log_peer_broken!(
					self.logger,
					peer.log,
					"Overflow converting funding {}",
					channel.funding_satoshis
				);
				0
			},
		};
		let mut funding_allocation = BTreeMap::new();
		match channel.funder {
			crate::ln::channel::Side::Local => {
				funding_allocation.insert(peer_hex, 0);
				funding_allocation.insert(our_hex, funding_msat);
			},
			crate::ln::channel::Side::Remote => {
				funding_allocation.insert(our_hex, 0);
				funding_allocation.insert(peer_hex, funding_msat);
			},
		}

		ChannelDetails {
			state: channel.state().name().to_string(),
			scratch_txid: Some(channel.scratch_txid().to_string()),
			owner: channel.owner.as_ref().map(|o| o.role().name().to_string()),
			short_channel_id: channel.scid.map(|s| s.to_string()),
			direction: channel.scid.map(|_| peer.direction),
			channel_id: Some(format!("{}", channel.channel_id())),
			funding_txid: Some(channel.funding.txid.to_string()),
			private: Some(!channel.announce_channel),
			funding_allocation_msat: Some(funding_allocation),
			to_us_msat: Some(channel.our_msat),
			min_to_us_msat: Some(channel.msat_to_us_min),
			max_to_us_msat: Some(channel.msat_to_us_max),
			total_msat: Some(funding_msat),
			dust_limit_satoshis: Some(channel.our_config.dust_limit_satoshis),
			max_total_htlc_in_msat: Some(channel.our_config.max_htlc_value_in_flight_msat),
			// Each side's reserve binds the *other* side, hence the crossover.
			their_channel_reserve_satoshis: Some(channel.our_config.channel_reserve_satoshis),
			our_channel_reserve_satoshis: Some(channel.their_config.channel_reserve_satoshis),
			spendable_msat: Some(channel.spendable_msat()),
			minimum_htlc_in_msat: Some(channel.our_config.htlc_minimum_msat),
			their_to_self_delay: Some(channel.our_config.to_self_delay),
			our_to_self_delay: Some(channel.their_config.to_self_delay),
			max_accepted_htlcs: Some(channel.our_config.max_accepted_htlcs),
			status: channel.billboard.entries().iter().map(|s| s.to_string()).collect(),
			in_payments_offered: Some(stats.in_payments_offered),
			in_offered_msat: Some(stats.in_msatoshi_offered),
			in_payments_fulfilled: Some(stats.in_payments_fulfilled),
			in_fulfilled_msat: Some(stats.in_msatoshi_fulfilled),
			out_payments_offered: Some(stats.out_payments_offered),
			out_offered_msat: Some(stats.out_msatoshi_offered),
			out_payments_fulfilled: Some(stats.out_payments_fulfilled),
			out_fulfilled_msat: Some(stats.out_msatoshi_fulfilled),
			htlcs: Some(
				channel
					.htlcs
					.iter()
					.map(|h| HtlcDetails {
						direction: h.direction,
						id: h.id,
						amount_msat: h.amount_msat,
						expiry: h.cltv_expiry,
						payment_hash: format!("{}", h.payment_hash),
						state: h.state,
					})
					.collect(),
			),
		}
	}

	fn uncommitted_channel_details() -> ChannelDetails {
		ChannelDetails {
			state: ChannelState::Openingd.name().to_string(),
			owner: Some(WorkerRole::Opening.name().to_string()),
			status: vec!["Negotiating channel open".to_string()],
			..Default::default()
		}
	}

	fn peer_details(&self, peer: &Peer, log_level: Option<Level>) -> PeerDetails {
		let connected = peer.is_connected();
		let mut channels = Vec::new();
		if peer.uncommitted_channel.is_some() {
			channels.push(Self::uncommitted_channel_details());
		}
		for channel in peer.channels.iter() {
			channels.push(self.channel_details(&self.our_node_id, peer, channel));
		}
		PeerDetails {
			id: format!("{}", log_pubkey!(peer.id)),
			connected,
			// If it's not connected, features and address are unreliable: we don't store
			// them, and they'd only reflect the *last* connection.
			netaddr: if connected { Some(vec![peer.addr.to_string()]) } else { None },
			globalfeatures: if connected {
				Some(peer.globalfeatures.to_lower_hex_string())
			} else {
				None
			},
			localfeatures: if connected {
				Some(peer.localfeatures.to_lower_hex_string())
			} else {
				None
			},
			channels,
			log: log_level.map(|level| {
				peer.log
					.dump(level)
					.into_iter()
					.map(|e| LogDetails {
						log_type: e.level.to_string(),
						source: e.module_path.to_string(),
						log: e.message,
					})
					.collect()
			}),
		}
	}

	/// Snapshots the registry for `listpeers`. `filter` restricts to one peer;
	/// `log_level` additionally dumps the per-peer log ring at or above that level.
	pub fn list_peers(
		&self, filter: Option<&PublicKey>, log_level: Option<Level>,
	) -> Vec<PeerDetails> {
		let peers = self.peers.lock().unwrap();
		match filter {
			Some(id) => peers
				.iter()
				.filter(|p| p.id == *id)
				.map(|p| self.peer_details(p, log_level))
				.collect(),
			None => peers.iter().map(|p| self.peer_details(p, log_level)).collect(),
		}
	}

	/// Aggregate node information.
	pub fn get_info(&self) -> GetInfo {
		let peers = self.peers.lock().unwrap();
		let mut num_peers = 0u32;
		let mut pending = 0u32;
		let mut active = 0u32;
		let mut inactive = 0u32;
		for peer in peers.iter() {
			num_peers += 1;
			for channel in peer.channels.iter() {
				if channel.state() == ChannelState::ChanneldAwaitingLockin {
					pending += 1;
				} else if channel.is_active() {
					active += 1;
				} else {
					inactive += 1;
				}
			}
		}
		GetInfo {
			id: format!("{}", log_pubkey!(self.our_node_id)),
			alias: self.config.alias.clone(),
			color: self.config.color.to_lower_hex_string(),
			num_peers,
			num_pending_channels: pending,
			num_active_channels: active,
			num_inactive_channels: inactive,
			address: self.config.announce_addresses.iter().map(|a| a.to_string()).collect(),
			binding: self.config.binding.iter().map(|a| a.to_string()).collect(),
			version: env!("CARGO_PKG_VERSION").to_string(),
			blockheight: self.best_block.lock().unwrap().height,
			network: self.config.network.clone(),
			fees_collected_msat: self.wallet.total_forward_fees(),
		}
	}

	// Test-only peeks at registry internals.

	#[cfg(test)]
	pub(crate) fn test_with_channel<R>(
		&self, channel_id: &ChannelId, f: impl FnOnce(&Channel) -> R,
	) -> Option<R> {
		let peers = self.peers.lock().unwrap();
		self.channel_index(&peers, channel_id).map(|(pidx, cidx)| f(&peers[pidx].channels[cidx]))
	}

	#[cfg(test)]
	pub(crate) fn test_mutate_channel(
		&self, channel_id: &ChannelId, f: impl FnOnce(&mut Channel),
	) {
		let mut peers = self.peers.lock().unwrap();
		let (pidx, cidx) = self.channel_index(&peers, channel_id).expect("unknown channel");
		f(&mut peers[pidx].channels[cidx]);
	}

	#[cfg(test)]
	pub(crate) fn test_channel_state(&self, channel_id: &ChannelId) -> Option<ChannelState> {
		self.test_with_channel(channel_id, |c| c.state())
	}

	#[cfg(test)]
	pub(crate) fn test_peer_count(&self) -> usize {
		self.peers.lock().unwrap().len()
	}

	// Developer commands.

	/// Signs and returns the channel's `last_tx` without broadcasting it, leaving the stored
	/// copy witness-free as always.
	#[cfg(feature = "developer")]
	pub fn dev_sign_last_tx(&self, peer_id: &PublicKey) -> Result<Transaction, APIError> {
		let mut peers = self.peers.lock().unwrap();
		let pidx = self.peer_index(&peers, peer_id).ok_or(APIError::ChannelUnavailable {
			err: "Could not find peer with that id".to_string(),
		})?;
		let cidx = peers[pidx].channels.iter().position(|c| c.is_active()).ok_or(
			APIError::ChannelUnavailable { err: "Could not find active channel".to_string() },
		)?;
		{
			let peer = &peers[pidx];
			log_peer_debug!(
				self.logger,
				peer.log,
				"dev-sign-last-tx: signing tx with {} outputs",
				peer.channels[cidx].last_tx.output.len()
			);
		}
		self.sign_last_tx(&mut peers[pidx].channels[cidx]);
		let signed = peers[pidx].channels[cidx].last_tx.clone();
		Self::remove_sig(&mut peers[pidx].channels[cidx]);
		Ok(signed)
	}

	/// Fails the peer's active channel as if an internal error had occurred.
	#[cfg(feature = "developer")]
	pub fn dev_fail(&self, peer_id: &PublicKey) -> Result<(), APIError> {
		let mut peers = self.peers.lock().unwrap();
		let pidx = self.peer_index(&peers, peer_id).ok_or(APIError::ChannelUnavailable {
			err: "Could not find peer with that id".to_string(),
		})?;
		let cidx = peers[pidx].channels.iter().position(|c| c.is_active()).ok_or(
			APIError::ChannelUnavailable {
				err: "Could not find active channel with peer".to_string(),
			},
		)?;
		self.channel_internal_error(&mut peers[pidx], cidx, "Failing due to dev-fail command");
		Ok(())
	}

	/// Asks the channel worker to re-enable its commit timer.
	#[cfg(feature = "developer")]
	pub fn dev_reenable_commit(&self, peer_id: &PublicKey) -> Result<(), APIError> {
		let peers = self.peers.lock().unwrap();
		let pidx = self.peer_index(&peers, peer_id).ok_or(APIError::ChannelUnavailable {
			err: "Could not find peer with that id".to_string(),
		})?;
		let cidx = peers[pidx].channels.iter().position(|c| c.is_active()).ok_or(
			APIError::ChannelUnavailable { err: "Peer has no active channel".to_string() },
		)?;
		let owner = peers[pidx].channels[cidx].owner.as_ref().ok_or(
			APIError::ChannelUnavailable { err: "Peer has no owner".to_string() },
		)?;
		if owner.role() != WorkerRole::Channel {
			return Err(APIError::ChannelUnavailable {
				err: format!("Peer owned by {}", owner.role()),
			});
		}
		owner.send(WorkerMsg::DevReenableCommit);
		Ok(())
	}

	/// Forgets a channel outright, bypassing the close protocol. Refuses if HTLCs are
	/// attached, or (without `force`) if the funding output is still unspent.
	#[cfg(feature = "developer")]
	pub fn dev_forget_channel(
		&self, peer_id: &PublicKey, scid: Option<ShortChannelId>, force: bool,
	) -> Result<DevForgetResult, APIError> {
		let mut peers = self.peers.lock().unwrap();
		let pidx = self.peer_index(&peers, peer_id).ok_or(APIError::ChannelUnavailable {
			err: "Could not find channel with that peer".to_string(),
		})?;
		let mut found: Option<usize> = None;
		for (cidx, channel) in peers[pidx].channels.iter().enumerate() {
			if let Some(want_scid) = scid {
				if channel.scid != Some(want_scid) {
					continue;
				}
			}
			if found.is_some() {
				return Err(APIError::ChannelUnavailable {
					err: "Multiple channels: please specify short_channel_id".to_string(),
				});
			}
			found = Some(cidx);
		}
		let cidx = found.ok_or(APIError::ChannelUnavailable {
			err: format!(
				"No channels matching that peer_id{}",
				if scid.is_some() { " and that short_channel_id" } else { "" }
			),
		})?;

		if !peers[pidx].channels[cidx].htlcs.is_empty() {
			return Err(APIError::ChannelUnavailable {
				err: "This channel has HTLCs attached and it is not safe to forget it. \
				      Please use `close` or `dev-fail` instead."
					.to_string(),
			});
		}

		let funding = peers[pidx].channels[cidx].funding;
		let funding_unspent = self.wallet.utxo_amount(&funding).is_some();
		if funding_unspent && !force {
			return Err(APIError::ChannelUnavailable {
				err: "Cowardly refusing to forget channel with an unspent funding output, if \
				      you know what you're doing you can override with `force=true`, otherwise \
				      consider `close` or `dev-fail`! If you force and the channel confirms we \
				      will not track the funds in the channel"
					.to_string(),
			});
		}

		// Latch an error so we don't try to pick the channel back up on reconnect.
		peers[pidx].channels[cidx].error = Some(ErrorMessage::new(
			ChannelId::new_zero(),
			"dev_forget_channel".to_string(),
		));
		let funding_txid = funding.txid.to_string();
		self.delete_channel(&mut peers, pidx, cidx);
		Ok(DevForgetResult { forced: force, funding_unspent, funding_txid })
	}
}
