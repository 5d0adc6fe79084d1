// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

use crate::chain::chaininterface::BroadcasterInterface;
use crate::chain::transaction::OutPoint;
use crate::ln::channel::{Channel, ChannelSeed, ChannelState, Side};
use crate::ln::channel_id::ChannelId;
use crate::ln::hooks::{PeerConnectedPayload, PluginHooks};
use crate::ln::msgs::{ErrorMessage, NetAddress, WorkerMsg};
use crate::ln::subd::{PeerConnector, PeerTransport, WorkerBroker, WorkerHandle, WorkerRole};
use crate::sign::{CommitmentSigner, SignerError};
use crate::util::config::ChannelHandshakeConfig;
use crate::util::logger::{Level, Logger, Record};
use crate::util::persist::{ChannelStats, ChannelTxEvent, StoredPeer, TxLocation, TxType, Wallet, WalletError};

use bitcoin::absolute::LockTime;
use bitcoin::hash_types::Txid;
use bitcoin::hashes::Hash;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::{PublicKey, Secp256k1, SecretKey};
use bitcoin::transaction::{Transaction, TxIn, TxOut, Version};
use bitcoin::{Amount, ScriptBuf, Sequence, Witness};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub struct TestLogger {
	level: Level,
	pub lines: Mutex<HashMap<(String, String), usize>>,
}

impl TestLogger {
	pub fn new() -> TestLogger {
		TestLogger { level: Level::Trace, lines: Mutex::new(HashMap::new()) }
	}

	pub fn enable(&mut self, level: Level) {
		self.level = level;
	}

	pub fn assert_log(&self, module: &str, line: &str, count: usize) {
		let log_entries = self.lines.lock().unwrap();
		assert_eq!(log_entries.get(&(module.to_string(), line.to_string())), Some(&count));
	}

	/// Search for the number of occurrences of the logged lines which
	/// 1. belong to the specified module and
	/// 2. contain `line` in them.
	/// And asserts if the number of occurrences is the same with the given `count`
	pub fn assert_log_contains(&self, module: &str, line: &str, count: usize) {
		let log_entries = self.lines.lock().unwrap();
		let l: usize = log_entries
			.iter()
			.filter(|&(&(ref m, ref l), _c)| m == module && l.contains(line))
			.map(|(_, c)| c)
			.sum();
		assert_eq!(l, count)
	}

	/// Search for the number of occurrences of logged lines which
	/// 1. belong to the specified module and
	/// 2. match the given regex pattern.
	/// Assert that the number of occurrences equals the given `count`
	pub fn assert_log_regex(&self, module: &str, pattern: regex::Regex, count: usize) {
		let log_entries = self.lines.lock().unwrap();
		let l: usize = log_entries
			.iter()
			.filter(|&(&(ref m, ref l), _c)| m == module && pattern.is_match(&l))
			.map(|(_, c)| c)
			.sum();
		assert_eq!(l, count)
	}
}

impl Logger for TestLogger {
	fn log(&self, record: &Record) {
		*self
			.lines
			.lock()
			.unwrap()
			.entry((record.module_path.to_string(), format!("{}", record.args)))
			.or_insert(0) += 1;
		if record.level >= self.level {
			println!(
				"{:<6} [{} : {}, {}] {}",
				record.level.to_string(),
				record.module_path,
				record.file,
				record.line,
				record.args
			);
		}
	}
}

pub struct TestBroadcaster {
	pub txn_broadcasted: Mutex<Vec<Transaction>>,
}

impl TestBroadcaster {
	pub fn new() -> TestBroadcaster {
		TestBroadcaster { txn_broadcasted: Mutex::new(Vec::new()) }
	}
}

impl BroadcasterInterface for TestBroadcaster {
	fn broadcast_transaction(&self, tx: &Transaction) {
		self.txn_broadcasted.lock().unwrap().push(tx.clone());
	}
}

pub struct TestSigner {
	pub requests: Mutex<Vec<(PublicKey, u64)>>,
	pub fail: AtomicBool,
}

impl TestSigner {
	pub fn new() -> TestSigner {
		TestSigner { requests: Mutex::new(Vec::new()), fail: AtomicBool::new(false) }
	}

	pub fn sign_count(&self) -> usize {
		self.requests.lock().unwrap().len()
	}
}

impl CommitmentSigner for TestSigner {
	fn sign_commitment_tx(
		&self, peer_id: &PublicKey, channel_dbid: u64, _tx: &Transaction,
		_remote_funding_key: &PublicKey, _funding_satoshis: u64,
	) -> Result<Signature, SignerError> {
		if self.fail.load(Ordering::Acquire) {
			return Err(SignerError("refused".to_string()));
		}
		self.requests.lock().unwrap().push((*peer_id, channel_dbid));
		Ok(dummy_sig())
	}
}

pub struct TestWorker {
	role: WorkerRole,
	pub msgs: Mutex<Vec<WorkerMsg>>,
	pub depths: Mutex<Vec<(Txid, u32)>>,
	pub depth_ready: AtomicBool,
}

impl TestWorker {
	pub fn new(role: WorkerRole) -> TestWorker {
		TestWorker {
			role,
			msgs: Mutex::new(Vec::new()),
			depths: Mutex::new(Vec::new()),
			depth_ready: AtomicBool::new(true),
		}
	}
}

impl WorkerHandle for TestWorker {
	fn role(&self) -> WorkerRole {
		self.role
	}

	fn send(&self, msg: WorkerMsg) {
		self.msgs.lock().unwrap().push(msg);
	}

	fn handle_depth(&self, txid: &Txid, depth: u32) -> bool {
		if !self.depth_ready.load(Ordering::Acquire) {
			return false;
		}
		self.depths.lock().unwrap().push((*txid, depth));
		true
	}
}

pub struct TestBroker {
	pub spawns: Mutex<Vec<(WorkerRole, PublicKey, bool)>>,
	pub workers: Mutex<Vec<Arc<TestWorker>>>,
	pub sent_errors: Mutex<Vec<ErrorMessage>>,
	pub onchain_spawns: Mutex<Vec<(ChannelId, Txid, u32)>>,
}

impl TestBroker {
	pub fn new() -> TestBroker {
		TestBroker {
			spawns: Mutex::new(Vec::new()),
			workers: Mutex::new(Vec::new()),
			sent_errors: Mutex::new(Vec::new()),
			onchain_spawns: Mutex::new(Vec::new()),
		}
	}

	fn spawn(&self, role: WorkerRole, peer_id: &PublicKey, reconnected: bool) -> Arc<dyn WorkerHandle> {
		let worker = Arc::new(TestWorker::new(role));
		self.spawns.lock().unwrap().push((role, *peer_id, reconnected));
		self.workers.lock().unwrap().push(Arc::clone(&worker));
		worker
	}

	pub fn last_worker(&self) -> Arc<TestWorker> {
		Arc::clone(self.workers.lock().unwrap().last().expect("no worker spawned"))
	}

	pub fn spawn_count(&self) -> usize {
		self.spawns.lock().unwrap().len()
	}
}

impl WorkerBroker for TestBroker {
	fn start_channel_worker(
		&self, peer_id: &PublicKey, _channel_id: &ChannelId, _transport: PeerTransport,
		reconnected: bool,
	) -> Arc<dyn WorkerHandle> {
		self.spawn(WorkerRole::Channel, peer_id, reconnected)
	}

	fn start_closing_worker(
		&self, peer_id: &PublicKey, _channel_id: &ChannelId, _transport: PeerTransport,
		reconnected: bool,
	) -> Arc<dyn WorkerHandle> {
		self.spawn(WorkerRole::Closing, peer_id, reconnected)
	}

	fn start_opening_worker(
		&self, peer_id: &PublicKey, _transport: PeerTransport,
	) -> Arc<dyn WorkerHandle> {
		self.spawn(WorkerRole::Opening, peer_id, false)
	}

	fn start_onchain_worker(
		&self, peer_id: &PublicKey, channel_id: &ChannelId, tx: &Transaction, blockheight: u32,
	) -> Arc<dyn WorkerHandle> {
		self.onchain_spawns.lock().unwrap().push((*channel_id, tx.compute_txid(), blockheight));
		self.spawn(WorkerRole::Onchain, peer_id, false)
	}

	fn send_error_and_close(&self, _transport: PeerTransport, error: &ErrorMessage) {
		self.sent_errors.lock().unwrap().push(error.clone());
	}
}

pub struct TestConnector {
	pub requests: Mutex<Vec<(PublicKey, u32)>>,
}

impl TestConnector {
	pub fn new() -> TestConnector {
		TestConnector { requests: Mutex::new(Vec::new()) }
	}
}

impl PeerConnector for TestConnector {
	fn connect_to_peer(&self, peer_id: &PublicKey, seconds: u32, _addr: Option<&NetAddress>) {
		self.requests.lock().unwrap().push((*peer_id, seconds));
	}
}

pub struct TestHooks {
	pub reply: Mutex<serde_json::Value>,
	pub payloads: Mutex<Vec<serde_json::Value>>,
}

impl TestHooks {
	pub fn new() -> TestHooks {
		TestHooks {
			reply: Mutex::new(serde_json::Value::Null),
			payloads: Mutex::new(Vec::new()),
		}
	}

	pub fn set_reply(&self, reply: serde_json::Value) {
		*self.reply.lock().unwrap() = reply;
	}
}

impl PluginHooks for TestHooks {
	fn peer_connected(&self, payload: &PeerConnectedPayload) -> serde_json::Value {
		self.payloads
			.lock()
			.unwrap()
			.push(serde_json::to_value(payload).expect("payload serializes"));
		self.reply.lock().unwrap().clone()
	}
}

pub struct TestWallet {
	pub saved_channels: Mutex<Vec<ChannelSeed>>,
	pub deleted_channels: Mutex<Vec<u64>>,
	pub deleted_peers: Mutex<Vec<u64>>,
	pub transactions: Mutex<Vec<(Txid, u32, u32)>>,
	pub annotations: Mutex<Vec<(Txid, TxType, u64)>>,
	pub locations: Mutex<HashMap<Txid, TxLocation>>,
	pub channel_events: Mutex<Vec<(u64, ChannelTxEvent, Txid, u32)>>,
	pub utxos: Mutex<HashMap<OutPoint, u64>>,
	pub stats: Mutex<HashMap<u64, ChannelStats>>,
	pub forward_fees: Mutex<u64>,
	pub stored: Mutex<Vec<StoredPeer>>,
}

impl TestWallet {
	pub fn new() -> TestWallet {
		TestWallet {
			saved_channels: Mutex::new(Vec::new()),
			deleted_channels: Mutex::new(Vec::new()),
			deleted_peers: Mutex::new(Vec::new()),
			transactions: Mutex::new(Vec::new()),
			annotations: Mutex::new(Vec::new()),
			locations: Mutex::new(HashMap::new()),
			channel_events: Mutex::new(Vec::new()),
			utxos: Mutex::new(HashMap::new()),
			stats: Mutex::new(HashMap::new()),
			forward_fees: Mutex::new(0),
			stored: Mutex::new(Vec::new()),
		}
	}

	pub fn save_count(&self, dbid: u64) -> usize {
		self.saved_channels.lock().unwrap().iter().filter(|s| s.dbid == dbid).count()
	}

	pub fn locate_at(&self, txid: Txid, blockheight: u32, index: u32) {
		self.locations.lock().unwrap().insert(txid, TxLocation { blockheight, index });
	}
}

impl Wallet for TestWallet {
	fn peer_delete(&self, peer_dbid: u64) {
		self.deleted_peers.lock().unwrap().push(peer_dbid);
	}

	fn channel_save(&self, channel: &ChannelSeed) {
		self.saved_channels.lock().unwrap().push(channel.clone());
	}

	fn channel_delete(&self, channel_dbid: u64) {
		self.deleted_channels.lock().unwrap().push(channel_dbid);
	}

	fn channel_stats(&self, channel_dbid: u64) -> ChannelStats {
		self.stats.lock().unwrap().get(&channel_dbid).copied().unwrap_or_default()
	}

	fn transaction_add(&self, tx: &Transaction, blockheight: u32, txindex: u32) {
		self.transactions.lock().unwrap().push((tx.compute_txid(), blockheight, txindex));
	}

	fn transaction_annotate(&self, txid: &Txid, tx_type: TxType, channel_dbid: u64) {
		self.annotations.lock().unwrap().push((*txid, tx_type, channel_dbid));
	}

	fn transaction_locate(&self, txid: &Txid) -> Option<TxLocation> {
		self.locations.lock().unwrap().get(txid).copied()
	}

	fn channel_event_add(
		&self, channel_dbid: u64, event: ChannelTxEvent, txid: &Txid, blockheight: u32,
	) {
		self.channel_events.lock().unwrap().push((channel_dbid, event, *txid, blockheight));
	}

	fn total_forward_fees(&self) -> u64 {
		*self.forward_fees.lock().unwrap()
	}

	fn utxo_amount(&self, outpoint: &OutPoint) -> Option<u64> {
		self.utxos.lock().unwrap().get(outpoint).copied()
	}

	fn load_channels(&self) -> Result<Vec<StoredPeer>, WalletError> {
		Ok(std::mem::take(&mut *self.stored.lock().unwrap()))
	}
}

pub fn pubkey(byte: u8) -> PublicKey {
	let secp = Secp256k1::new();
	let secret = SecretKey::from_slice(&[byte; 32]).unwrap();
	PublicKey::from_secret_key(&secp, &secret)
}

pub fn dummy_sig() -> Signature {
	Signature::from_compact(&[0x4e; 64]).unwrap()
}

pub fn net_addr() -> NetAddress {
	NetAddress::IPv4 { addr: [127, 0, 0, 1], port: 9735 }
}

pub fn transport() -> PeerTransport {
	PeerTransport { peer_fd: -1, gossip_fd: -1, gossip_store_fd: -1 }
}

pub fn funding_outpoint(dbid: u64) -> OutPoint {
	OutPoint { txid: Txid::from_byte_array([dbid as u8; 32]), index: 0 }
}

/// A minimal transaction spending `funding`, standing in for a commitment or closing tx.
pub fn spending_tx(funding: OutPoint, value_sats: u64) -> Transaction {
	Transaction {
		version: Version::TWO,
		lock_time: LockTime::ZERO,
		input: vec![TxIn {
			previous_output: funding.into_bitcoin_outpoint(),
			script_sig: ScriptBuf::new(),
			sequence: Sequence::MAX,
			witness: Witness::new(),
		}],
		output: vec![TxOut {
			value: Amount::from_sat(value_sats),
			script_pubkey: ScriptBuf::new(),
		}],
	}
}

pub fn channel_seed(peer_id: PublicKey, dbid: u64, state: ChannelState) -> ChannelSeed {
	let funding = funding_outpoint(dbid);
	let funding_satoshis = 1_000_000;
	ChannelSeed {
		peer_id,
		dbid,
		state,
		funding,
		funding_satoshis,
		funder: Side::Local,
		minimum_depth: 3,
		scid: None,
		last_tx: spending_tx(funding, funding_satoshis - 1000),
		last_sig: dummy_sig(),
		last_tx_type: TxType::ChannelUnilateral,
		our_config: ChannelHandshakeConfig::default(),
		their_config: ChannelHandshakeConfig::default(),
		our_msat: funding_satoshis * 1000,
		msat_to_us_min: funding_satoshis * 1000,
		msat_to_us_max: funding_satoshis * 1000,
		feerate_base: 10,
		feerate_ppm: 1,
		future_per_commitment_point: None,
		announce_channel: true,
		local_funding_pubkey: pubkey(0x61),
		remote_funding_pubkey: pubkey(0x62),
	}
}

pub fn channel(peer_id: PublicKey, dbid: u64, state: ChannelState) -> Channel {
	Channel::from_seed(channel_seed(peer_id, dbid, state))
}
