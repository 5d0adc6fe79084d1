// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Tests that drive the control plane end-to-end against test doubles for every
//! collaborator: connect orchestration, the channel lifecycle, close coordination with its
//! three mutually exclusive outcomes, and the funding watcher.

use crate::chain::WatchResult;
use crate::events::{CloseType, Event};
use crate::ln::channel::ChannelState;
use crate::ln::channel_id::ChannelId;
use crate::ln::msgs::{ErrorMessage, WorkerMsg};
use crate::ln::peer_control::{ChannelSelector, CloseAction, PeerControl};
use crate::rpc::RpcServer;
use crate::util::config::NodeConfig;
use crate::util::errors::APIError;
use crate::util::logger::Level;
use crate::util::persist::{ChannelTxEvent, StoredPeer};
use crate::util::test_utils::*;
use crate::util::time::Instant;

use bitcoin::secp256k1::PublicKey;

use core::time::Duration;

type TestControl<'a> = PeerControl<
	&'a TestBroker,
	&'a TestConnector,
	&'a TestSigner,
	&'a TestWallet,
	&'a TestBroadcaster,
	&'a TestHooks,
	&'a TestLogger,
>;

struct Harness {
	broker: TestBroker,
	connector: TestConnector,
	signer: TestSigner,
	wallet: TestWallet,
	broadcaster: TestBroadcaster,
	hooks: TestHooks,
	logger: TestLogger,
	our_id: PublicKey,
}

const CONTROL_MODULE: &str = "lightning_peerd::ln::peer_control";

impl Harness {
	fn new() -> Harness {
		Harness {
			broker: TestBroker::new(),
			connector: TestConnector::new(),
			signer: TestSigner::new(),
			wallet: TestWallet::new(),
			broadcaster: TestBroadcaster::new(),
			hooks: TestHooks::new(),
			logger: TestLogger::new(),
			our_id: pubkey(11),
		}
	}

	fn control(&self) -> TestControl<'_> {
		PeerControl::new(
			self.our_id,
			NodeConfig::default(),
			&self.broker,
			&self.connector,
			&self.signer,
			&self.wallet,
			&self.broadcaster,
			&self.hooks,
			&self.logger,
		)
	}

	/// A control plane restored with one stored peer owning one channel in `state`.
	fn control_with_channel(&self, state: ChannelState) -> (TestControl<'_>, PublicKey, ChannelId) {
		let peer_id = pubkey(42);
		self.wallet.stored.lock().unwrap().push(StoredPeer {
			id: peer_id,
			dbid: 9,
			addr: net_addr(),
			channels: vec![channel_seed(peer_id, 1, state)],
		});
		let control = self.control();
		control.load_from_wallet();
		let channel_id = ChannelId::from_funding_outpoint(&funding_outpoint(1));
		(control, peer_id, channel_id)
	}
}

fn connect(control: &TestControl<'_>, peer_id: PublicKey) {
	control.peer_connected(peer_id, net_addr(), transport(), vec![0xaa], vec![0xbb]);
}

fn close_resolutions(events: &[Event]) -> Vec<(u64, &Event)> {
	events
		.iter()
		.filter_map(|e| match e {
			Event::CloseCommandResolved { id, .. } => Some((*id, e)),
			_ => None,
		})
		.collect()
}

// Scenario: mutual close driven by a user command, start to finish.
#[test]
fn close_mutual() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);
	let worker = h.broker.last_worker();

	let action = control.close(&ChannelSelector::PeerId(peer_id), false, 30).unwrap();
	let command_id = match action {
		CloseAction::Pending { command_id } => command_id,
		other => panic!("unexpected close action {:?}", other),
	};
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::ChanneldShuttingDown));
	assert_eq!(worker.msgs.lock().unwrap().as_slice(), &[WorkerMsg::SendShutdown]);
	h.logger.assert_log_regex(
		CONTROL_MODULE,
		regex::Regex::new("State changed from CHANNELD_NORMAL to CHANNELD_SHUTTING_DOWN").unwrap(),
		1,
	);

	// The channel worker finishes the shutdown exchange and hands the connection over.
	control.shutdown_complete(&channel_id, transport());
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::ClosingdSigexchange));

	// The closing worker negotiates a mutual close transaction.
	let mutual_tx = spending_tx(funding_outpoint(1), 999_500);
	let mutual_txid = mutual_tx.compute_txid();
	control.closing_complete(&channel_id, mutual_tx, dummy_sig());
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::ClosingdComplete));

	// It was signed by us and broadcast...
	assert_eq!(h.signer.sign_count(), 1);
	let broadcast = h.broadcaster.txn_broadcasted.lock().unwrap();
	assert_eq!(broadcast.len(), 1);
	assert_eq!(broadcast[0].compute_txid(), mutual_txid);
	assert_eq!(broadcast[0].input[0].witness.len(), 4);

	// ...while the stored copy is back in canonical witness-free shape.
	control
		.test_with_channel(&channel_id, |c| assert!(c.last_tx.input[0].witness.is_empty()))
		.unwrap();

	// And the user command resolved as mutual, with the broadcast txid.
	let events = control.get_and_clear_pending_events();
	let resolutions = close_resolutions(&events);
	assert_eq!(resolutions.len(), 1);
	match resolutions[0].1 {
		Event::CloseCommandResolved { id, result: Ok(success) } => {
			assert_eq!(*id, command_id);
			assert_eq!(success.txid, mutual_txid);
			assert_eq!(success.close_type, CloseType::Mutual);
		},
		other => panic!("unexpected resolution {:?}", other),
	}
}

// Scenario: close with force=true and an unresponsive counterparty falls back to a
// unilateral close when the deadline fires.
#[test]
fn close_force_timeout() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);

	let action = control.close(&ChannelSelector::PeerId(peer_id), true, 1).unwrap();
	let command_id = match action {
		CloseAction::Pending { command_id } => command_id,
		other => panic!("unexpected close action {:?}", other),
	};

	// Nothing happens while the deadline has not passed.
	control.timer_tick_occurred();
	assert!(close_resolutions(&control.get_and_clear_pending_events()).is_empty());
	assert_eq!(h.signer.sign_count(), 0);

	Instant::advance(Duration::from_secs(2));
	control.timer_tick_occurred();

	// The channel was failed permanently: commitment signed, broadcast, state parked.
	assert_eq!(h.signer.sign_count(), 1);
	assert_eq!(h.broadcaster.txn_broadcasted.lock().unwrap().len(), 1);
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::AwaitingUnilateral));
	h.logger.assert_log_contains(
		CONTROL_MODULE,
		"Forcibly closed by 'close' command timeout",
		1,
	);
	control
		.test_with_channel(&channel_id, |c| assert!(c.last_tx.input[0].witness.is_empty()))
		.unwrap();

	let events = control.get_and_clear_pending_events();
	let resolutions = close_resolutions(&events);
	assert_eq!(resolutions.len(), 1);
	match resolutions[0].1 {
		Event::CloseCommandResolved { id, result: Ok(success) } => {
			assert_eq!(*id, command_id);
			assert_eq!(success.close_type, CloseType::Unilateral);
		},
		other => panic!("unexpected resolution {:?}", other),
	}

	// The command is gone; later ticks must not fire it again.
	Instant::advance(Duration::from_secs(10));
	control.timer_tick_occurred();
	assert!(close_resolutions(&control.get_and_clear_pending_events()).is_empty());
}

// A close command without force times out with an error, but the channel keeps closing.
#[test]
fn close_timeout_without_force_fails_command_only() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);

	let command_id = match control.close(&ChannelSelector::PeerId(peer_id), false, 1).unwrap() {
		CloseAction::Pending { command_id } => command_id,
		other => panic!("unexpected close action {:?}", other),
	};
	Instant::advance(Duration::from_secs(2));
	control.timer_tick_occurred();

	let events = control.get_and_clear_pending_events();
	let resolutions = close_resolutions(&events);
	assert_eq!(resolutions.len(), 1);
	match resolutions[0].1 {
		Event::CloseCommandResolved { id, result: Err(fail) } => {
			assert_eq!(*id, command_id);
			assert_eq!(fail.message, "Channel close negotiation not finished before timeout");
		},
		other => panic!("unexpected resolution {:?}", other),
	}

	// The channel is still shutting down, untouched by the command's death...
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::ChanneldShuttingDown));
	assert_eq!(h.signer.sign_count(), 0);

	// ...and when the close eventually completes, the dead command does not fire again.
	control.shutdown_complete(&channel_id, transport());
	control.closing_complete(&channel_id, spending_tx(funding_outpoint(1), 999_500), dummy_sig());
	assert!(close_resolutions(&control.get_and_clear_pending_events()).is_empty());
}

// A second close command on an already-closing channel waits for the same resolution.
#[test]
fn multiple_close_commands_resolve_together() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);

	let first = control.close(&ChannelSelector::PeerId(peer_id), false, 30).unwrap();
	let second = control.close(&ChannelSelector::ChannelId(channel_id), false, 30).unwrap();
	assert_ne!(first, second);

	control.shutdown_complete(&channel_id, transport());
	control.closing_complete(&channel_id, spending_tx(funding_outpoint(1), 999_500), dummy_sig());

	let events = control.get_and_clear_pending_events();
	let resolutions = close_resolutions(&events);
	assert_eq!(resolutions.len(), 2);
	for (_, event) in resolutions {
		match event {
			Event::CloseCommandResolved { result: Ok(success), .. } => {
				assert_eq!(success.close_type, CloseType::Mutual);
			},
			other => panic!("unexpected resolution {:?}", other),
		}
	}
}

// Scenario: a reconnect to a channel awaiting our unilateral close gets a protocol error
// referencing the channel id, and no worker.
#[test]
fn reconnect_to_awaiting_unilateral_sends_error() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::AwaitingUnilateral);

	connect(&control, peer_id);

	assert_eq!(h.broker.spawn_count(), 0);
	let errors = h.broker.sent_errors.lock().unwrap();
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].channel_id, channel_id);
	assert_eq!(errors[0].data, "Awaiting unilateral close");
	drop(errors);
	assert!(control.test_with_channel(&channel_id, |c| c.owner.is_none()).unwrap());
}

// Scenario: the counterparty proved a future commitment; a permanent failure must not sign
// or broadcast anything, but close commands still resolve.
#[test]
fn future_commitment_point_prevents_broadcast() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);
	control.test_mutate_channel(&channel_id, |c| {
		c.future_per_commitment_point = Some(pubkey(99));
	});

	let command_id = match control.close(&ChannelSelector::PeerId(peer_id), false, 30).unwrap() {
		CloseAction::Pending { command_id } => command_id,
		other => panic!("unexpected close action {:?}", other),
	};
	let original_txid = control.test_with_channel(&channel_id, |c| c.scratch_txid()).unwrap();

	control.channel_errmsg(&channel_id, Some(transport()), "invalid reestablish", None);

	// No signer call, no wallet record, no broadcast.
	assert_eq!(h.signer.sign_count(), 0);
	assert!(h.broadcaster.txn_broadcasted.lock().unwrap().is_empty());
	assert!(h.wallet.transactions.lock().unwrap().is_empty());
	h.logger.assert_log_contains(
		CONTROL_MODULE,
		"Cannot broadcast our commitment tx: they have a future one",
		1,
	);
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::AwaitingUnilateral));

	// The close command still resolved, as unilateral, with last_tx untouched.
	let events = control.get_and_clear_pending_events();
	let resolutions = close_resolutions(&events);
	assert_eq!(resolutions.len(), 1);
	match resolutions[0].1 {
		Event::CloseCommandResolved { id, result: Ok(success) } => {
			assert_eq!(*id, command_id);
			assert_eq!(success.close_type, CloseType::Unilateral);
			assert_eq!(success.txid, original_txid);
			assert!(success.tx.input[0].witness.is_empty());
		},
		other => panic!("unexpected resolution {:?}", other),
	}
}

// Scenario: disconnect refuses while a channel is up, unless forced.
#[test]
fn disconnect_requires_force_with_active_channel() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);

	match control.disconnect_peer(&peer_id, false) {
		Err(APIError::ChannelUnavailable { err }) => {
			assert_eq!(err, "Peer is in state CHANNELD_NORMAL");
		},
		other => panic!("unexpected disconnect result {:?}", other),
	}

	control.disconnect_peer(&peer_id, true).unwrap();
	control
		.test_with_channel(&channel_id, |c| {
			assert!(c.owner.is_none());
			assert!(!c.connected);
		})
		.unwrap();
	// The channel survives; we immediately ask connectd for the peer back.
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::ChanneldNormal));
	assert!(h.connector.requests.lock().unwrap().iter().any(|(id, _)| *id == peer_id));
}

// Scenario: setchannelfee all only touches channels that can still route.
#[test]
fn setchannelfee_all_skips_ineligible_states() {
	let h = Harness::new();
	let peer_a = pubkey(42);
	let peer_b = pubkey(43);
	{
		let mut stored = h.wallet.stored.lock().unwrap();
		stored.push(StoredPeer {
			id: peer_a,
			dbid: 9,
			addr: net_addr(),
			channels: vec![channel_seed(peer_a, 1, ChannelState::ChanneldNormal)],
		});
		stored.push(StoredPeer {
			id: peer_b,
			dbid: 10,
			addr: net_addr(),
			channels: vec![channel_seed(peer_b, 2, ChannelState::AwaitingUnilateral)],
		});
	}
	let control = h.control();
	control.load_from_wallet();

	let result = control.set_channel_fee(None, Some(1000), Some(10)).unwrap();
	assert_eq!(result.base, 1000);
	assert_eq!(result.ppm, 10);
	assert_eq!(result.channels.len(), 1);
	assert_eq!(result.channels[0].peer_id, peer_a.to_string());

	let cid_a = ChannelId::from_funding_outpoint(&funding_outpoint(1));
	let cid_b = ChannelId::from_funding_outpoint(&funding_outpoint(2));
	control
		.test_with_channel(&cid_a, |c| {
			assert_eq!(c.feerate_base, 1000);
			assert_eq!(c.feerate_ppm, 10);
		})
		.unwrap();
	control
		.test_with_channel(&cid_b, |c| {
			assert_eq!(c.feerate_base, 10);
			assert_eq!(c.feerate_ppm, 1);
		})
		.unwrap();
	// Only the eligible channel was persisted.
	assert_eq!(h.wallet.save_count(1), 1);
	assert_eq!(h.wallet.save_count(2), 0);
}

// Fees survive persistence: what was saved is what a restart loads.
#[test]
fn setchannelfee_survives_reload() {
	let h = Harness::new();
	let (control, peer_id, _) = h.control_with_channel(ChannelState::ChanneldNormal);
	control.set_channel_fee(Some(&ChannelSelector::PeerId(peer_id)), Some(4321), Some(99)).unwrap();

	let saved = h.wallet.saved_channels.lock().unwrap().last().unwrap().clone();
	assert_eq!(saved.feerate_base, 4321);
	assert_eq!(saved.feerate_ppm, 99);

	let h2 = Harness::new();
	h2.wallet.stored.lock().unwrap().push(StoredPeer {
		id: peer_id,
		dbid: 9,
		addr: net_addr(),
		channels: vec![saved],
	});
	let control2 = h2.control();
	control2.load_from_wallet();
	let channel_id = ChannelId::from_funding_outpoint(&funding_outpoint(1));
	control2
		.test_with_channel(&channel_id, |c| {
			assert_eq!(c.feerate_base, 4321);
			assert_eq!(c.feerate_ppm, 99);
		})
		.unwrap();
}

#[test]
fn setchannelfee_single_channel_wrong_state_fails() {
	let h = Harness::new();
	let (control, peer_id, _) = h.control_with_channel(ChannelState::AwaitingUnilateral);
	match control.set_channel_fee(Some(&ChannelSelector::PeerId(peer_id)), Some(10), Some(1)) {
		Err(APIError::ChannelUnavailable { err }) => {
			assert_eq!(err, "Channel is in state AWAITING_UNILATERAL");
		},
		other => panic!("unexpected setchannelfee result {:?}", other),
	}
}

// setchannelfee tells the channel worker to emit a fresh channel_update.
#[test]
fn setchannelfee_notifies_worker() {
	let h = Harness::new();
	let (control, peer_id, _) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);
	let worker = h.broker.last_worker();

	control.set_channel_fee(Some(&ChannelSelector::PeerId(peer_id)), Some(77), Some(7)).unwrap();
	assert!(worker
		.msgs
		.lock()
		.unwrap()
		.contains(&WorkerMsg::SpecificFeerates { base: 77, ppm: 7 }));
}

// A fresh peer with no channel lands in an opening worker; killing the negotiation deletes
// the peer (registry invariant: no channels and no uncommitted channel means no peer).
#[test]
fn uncommitted_channel_keeps_peer_alive_until_killed() {
	let h = Harness::new();
	let control = h.control();
	let peer_id = pubkey(42);

	connect(&control, peer_id);
	assert_eq!(control.test_peer_count(), 1);
	assert_eq!(h.broker.spawns.lock().unwrap()[0].0, crate::ln::subd::WorkerRole::Opening);

	match control.close(&ChannelSelector::PeerId(peer_id), false, 30).unwrap() {
		CloseAction::UncommittedChannelKilled => {},
		other => panic!("unexpected close action {:?}", other),
	}
	assert_eq!(control.test_peer_count(), 0);
}

#[test]
fn disconnect_kills_uncommitted_channel() {
	let h = Harness::new();
	let control = h.control();
	let peer_id = pubkey(42);

	connect(&control, peer_id);
	control.disconnect_peer(&peer_id, false).unwrap();
	assert_eq!(control.test_peer_count(), 0);

	match control.disconnect_peer(&peer_id, false) {
		Err(APIError::ChannelUnavailable { err }) => assert_eq!(err, "Peer not connected"),
		other => panic!("unexpected disconnect result {:?}", other),
	}
}

#[test]
fn close_unknown_peer_fails() {
	let h = Harness::new();
	let control = h.control();
	match control.close(&ChannelSelector::PeerId(pubkey(42)), false, 30) {
		Err(APIError::ChannelUnavailable { err }) => {
			assert_eq!(err, "Peer has no active channel");
		},
		other => panic!("unexpected close result {:?}", other),
	}
}

#[test]
fn close_wrong_state_reports_state_name() {
	let h = Harness::new();
	let (control, peer_id, _) = h.control_with_channel(ChannelState::AwaitingUnilateral);
	match control.close(&ChannelSelector::PeerId(peer_id), false, 30) {
		Err(APIError::ChannelUnavailable { err }) => {
			assert_eq!(err, "Channel is in state AWAITING_UNILATERAL");
		},
		other => panic!("unexpected close result {:?}", other),
	}
}

// The plugin hook can veto a connection, optionally with an error for the peer.
#[test]
fn hook_disconnect_verdict_sends_error_and_drops_peer() {
	let h = Harness::new();
	let control = h.control();
	h.hooks.set_reply(serde_json::json!({
		"result": "disconnect",
		"error_message": "not welcome here"
	}));

	connect(&control, pubkey(42));

	assert_eq!(h.broker.spawn_count(), 0);
	let errors = h.broker.sent_errors.lock().unwrap();
	assert_eq!(errors.len(), 1);
	assert!(errors[0].channel_id.is_zero());
	assert_eq!(errors[0].data, "not welcome here");
	drop(errors);
	assert_eq!(control.test_peer_count(), 0);
}

#[test]
fn hook_payload_carries_peer_identity_and_features() {
	let h = Harness::new();
	let control = h.control();
	let peer_id = pubkey(42);

	connect(&control, peer_id);

	let payloads = h.hooks.payloads.lock().unwrap();
	assert_eq!(payloads.len(), 1);
	let peer = &payloads[0]["peer"];
	assert_eq!(peer["id"], serde_json::json!(peer_id.to_string()));
	assert_eq!(peer["addr"], serde_json::json!("127.0.0.1:9735"));
	assert_eq!(peer["globalfeatures"], serde_json::json!("aa"));
	assert_eq!(peer["localfeatures"], serde_json::json!("bb"));
}

#[test]
#[should_panic(expected = "invalid response to the connected hook")]
fn hook_garbage_verdict_is_fatal() {
	let h = Harness::new();
	let control = h.control();
	h.hooks.set_reply(serde_json::json!({ "result": "maybe later" }));
	connect(&control, pubkey(42));
}

// A reconnect while a channel exists goes straight to the right worker by state.
#[test]
fn reconnect_dispatches_by_state() {
	for (state, role) in [
		(ChannelState::ChanneldAwaitingLockin, crate::ln::subd::WorkerRole::Channel),
		(ChannelState::ChanneldNormal, crate::ln::subd::WorkerRole::Channel),
		(ChannelState::ChanneldShuttingDown, crate::ln::subd::WorkerRole::Channel),
		(ChannelState::ClosingdSigexchange, crate::ln::subd::WorkerRole::Closing),
	] {
		let h = Harness::new();
		let (control, peer_id, channel_id) = h.control_with_channel(state);
		connect(&control, peer_id);

		let spawns = h.broker.spawns.lock().unwrap();
		assert_eq!(spawns.len(), 1, "state {}", state);
		assert_eq!(spawns[0].0, role, "state {}", state);
		// reconnect=true: these channels already exist.
		assert!(spawns[0].2, "state {}", state);
		drop(spawns);
		assert!(control.test_with_channel(&channel_id, |c| c.connected).unwrap());
	}
}

// A worker death without a transport is always transient: state preserved, reconnect asked.
#[test]
fn worker_crash_is_transient() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);

	control.channel_errmsg(&channel_id, None, "Owning subdaemon died (62208)", None);

	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::ChanneldNormal));
	assert!(control.test_with_channel(&channel_id, |c| c.owner.is_none()).unwrap());
	assert_eq!(h.signer.sign_count(), 0);
	h.logger.assert_log_contains(
		CONTROL_MODULE,
		"Peer transient failure in CHANNELD_NORMAL: channeld: Owning subdaemon died (62208)",
		1,
	);
	assert!(h.connector.requests.lock().unwrap().iter().any(|(id, secs)| *id == peer_id && *secs == 1));

	// The per-peer ring kept it too: listpeers with a level dumps the log.
	let details = control.list_peers(Some(&peer_id), Some(Level::Info));
	assert!(details[0].log.as_ref().unwrap().iter().any(|l| l.log.contains("transient failure")));
}

// A protocol error with a live transport is permanent, and the error we sent is latched for
// delivery on the next reconnect.
#[test]
fn protocol_error_latches_and_redelivers() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);

	let sent = ErrorMessage::new(channel_id, "your signature was invalid".to_string());
	control.channel_errmsg(&channel_id, Some(transport()), "bad commitment sig", Some(sent.clone()));

	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::AwaitingUnilateral));
	assert_eq!(h.signer.sign_count(), 1);
	assert_eq!(h.broadcaster.txn_broadcasted.lock().unwrap().len(), 1);
	h.logger.assert_log_contains(
		CONTROL_MODULE,
		"Peer permanent failure in CHANNELD_NORMAL: channeld: sent ERROR bad commitment sig",
		1,
	);
	let events = control.get_and_clear_pending_events();
	assert!(events.iter().any(|e| matches!(e, Event::PeerDisconnected { peer_id: p } if *p == peer_id)));

	// On reconnect, the latched error is delivered instead of a worker.
	connect(&control, peer_id);
	let errors = h.broker.sent_errors.lock().unwrap();
	assert_eq!(errors.last().unwrap(), &sent);
	drop(errors);
	assert_eq!(h.broker.spawn_count(), 1);
}

// Funding watcher: scid assignment, idempotence, announce-depth watch retirement.
#[test]
fn funding_depth_assigns_scid_idempotently() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldAwaitingLockin);
	connect(&control, peer_id);
	let worker = h.broker.last_worker();
	let txid = funding_outpoint(1).txid;
	h.wallet.locate_at(txid, 103, 4);

	// Below minimum depth: keep watching, no scid yet.
	assert_eq!(control.funding_depth_changed(&channel_id, &txid, 1), WatchResult::KeepWatching);
	assert_eq!(control.test_with_channel(&channel_id, |c| c.scid).unwrap(), None);
	assert_eq!(h.wallet.save_count(1), 0);

	// Minimum depth: scid assigned and saved once.
	assert_eq!(control.funding_depth_changed(&channel_id, &txid, 3), WatchResult::KeepWatching);
	let scid = control.test_with_channel(&channel_id, |c| c.scid).unwrap().unwrap();
	assert_eq!(scid.to_string(), "103x4x0");
	assert_eq!(h.wallet.save_count(1), 1);

	// With an scid the channel is routable, so listpeers now reports our side index.
	let details = control.list_peers(Some(&peer_id), None);
	assert_eq!(details[0].channels[0].short_channel_id.as_deref(), Some("103x4x0"));
	assert_eq!(
		details[0].channels[0].direction,
		Some(crate::ln::peer::node_id_idx(&h.our_id, &peer_id))
	);

	// Same callback again: no re-save.
	assert_eq!(control.funding_depth_changed(&channel_id, &txid, 4), WatchResult::KeepWatching);
	assert_eq!(h.wallet.save_count(1), 1);

	// Worker heard about every depth change.
	assert_eq!(worker.depths.lock().unwrap().len(), 3);

	// Announce depth: the watch can go.
	assert_eq!(control.funding_depth_changed(&channel_id, &txid, 6), WatchResult::DeleteWatch);
}

#[test]
fn funding_depth_keeps_watching_when_worker_not_ready() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldAwaitingLockin);
	connect(&control, peer_id);
	let txid = funding_outpoint(1).txid;
	h.wallet.locate_at(txid, 103, 4);
	h.broker.last_worker().depth_ready.store(false, std::sync::atomic::Ordering::Release);

	// Even at announce depth, an unready worker keeps the watch alive.
	assert_eq!(control.funding_depth_changed(&channel_id, &txid, 6), WatchResult::KeepWatching);
}

// A reorg that moves the funding tx changes the scid: save the new one and restart the
// worker so gossip picks it up.
#[test]
fn funding_reorg_changes_scid_and_restarts_worker() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldAwaitingLockin);
	connect(&control, peer_id);
	let txid = funding_outpoint(1).txid;
	h.wallet.locate_at(txid, 103, 4);
	assert_eq!(control.funding_depth_changed(&channel_id, &txid, 3), WatchResult::KeepWatching);

	h.wallet.locate_at(txid, 104, 1);
	assert_eq!(control.funding_depth_changed(&channel_id, &txid, 2), WatchResult::KeepWatching);

	let scid = control.test_with_channel(&channel_id, |c| c.scid).unwrap().unwrap();
	assert_eq!(scid.to_string(), "104x1x0");
	assert_eq!(h.wallet.save_count(1), 2);
	// Transient failure: worker torn down, channel intact.
	assert!(control.test_with_channel(&channel_id, |c| c.owner.is_none()).unwrap());
	assert_eq!(
		control.test_channel_state(&channel_id),
		Some(ChannelState::ChanneldAwaitingLockin)
	);
	h.logger.assert_log_contains(
		CONTROL_MODULE,
		"short_channel_id changed to 104x1x0 (was 103x4x0)",
		1,
	);
}

#[test]
fn funding_depth_invalid_scid_fails_channel() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldAwaitingLockin);
	connect(&control, peer_id);
	let txid = funding_outpoint(1).txid;
	h.wallet.locate_at(txid, 0x0100_0000, 0);

	assert_eq!(control.funding_depth_changed(&channel_id, &txid, 3), WatchResult::DeleteWatch);
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::AwaitingUnilateral));
	assert_eq!(h.broadcaster.txn_broadcasted.lock().unwrap().len(), 1);
}

// Funding spend: record the on-chain event and hand off to the resolver.
#[test]
fn funding_spent_hands_off_to_onchain_resolver() {
	let h = Harness::new();
	let (control, _, channel_id) = h.control_with_channel(ChannelState::AwaitingUnilateral);
	let spend = spending_tx(funding_outpoint(1), 900_000);

	assert_eq!(control.funding_spent(&channel_id, &spend, 500), WatchResult::KeepWatching);

	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::Onchain));
	let events = h.wallet.channel_events.lock().unwrap();
	assert_eq!(events.len(), 1);
	assert_eq!(events[0].0, 1);
	assert_eq!(events[0].1, ChannelTxEvent::OnchainInit);
	assert_eq!(events[0].3, 500);
	drop(events);
	let onchain = h.broker.onchain_spawns.lock().unwrap();
	assert_eq!(onchain.len(), 1);
	assert_eq!(onchain[0].0, channel_id);
	assert_eq!(onchain[0].2, 500);
}

// Opening handshake: the uncommitted channel becomes durable and the channel worker takes
// over; a failed negotiation deletes the peer.
#[test]
fn opening_success_creates_channel() {
	let h = Harness::new();
	let control = h.control();
	let peer_id = pubkey(42);
	connect(&control, peer_id);

	let seed = channel_seed(peer_id, 5, ChannelState::ChanneldAwaitingLockin);
	let channel_id = control.opening_succeeded(seed, 77, transport());

	assert_eq!(
		control.test_channel_state(&channel_id),
		Some(ChannelState::ChanneldAwaitingLockin)
	);
	assert_eq!(h.wallet.save_count(5), 1);
	let spawns = h.broker.spawns.lock().unwrap();
	assert_eq!(spawns.last().unwrap().0, crate::ln::subd::WorkerRole::Channel);
	assert!(!spawns.last().unwrap().2);
	drop(spawns);

	// The peer picked up the durable row created with the channel.
	assert_eq!(control.peer_by_dbid(77), Some(peer_id));
	assert_eq!(control.peer_by_dbid(0), None);

	// Lockin completes through the worker.
	control.funding_locked(&channel_id);
	assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::ChanneldNormal));
}

#[test]
fn opening_failure_deletes_peer() {
	let h = Harness::new();
	let control = h.control();
	let peer_id = pubkey(42);
	connect(&control, peer_id);
	assert_eq!(control.test_peer_count(), 1);

	control.opening_failed(&peer_id, "they hung up");
	assert_eq!(control.test_peer_count(), 0);
}

// listpeers is a pure snapshot: identical twice in a row, and carrying the read model.
#[test]
fn listpeers_snapshot_is_stable_and_complete() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);

	let first = serde_json::to_string(&control.list_peers(None, None)).unwrap();
	let second = serde_json::to_string(&control.list_peers(None, None)).unwrap();
	assert_eq!(first, second);

	let details = control.list_peers(Some(&peer_id), None);
	assert_eq!(details.len(), 1);
	let peer = &details[0];
	assert_eq!(peer.id, peer_id.to_string());
	assert!(peer.connected);
	assert_eq!(peer.netaddr.as_ref().unwrap()[0], "127.0.0.1:9735");
	assert_eq!(peer.globalfeatures.as_deref(), Some("aa"));
	let chan = &peer.channels[0];
	assert_eq!(chan.state, "CHANNELD_NORMAL");
	assert_eq!(chan.owner.as_deref(), Some("channeld"));
	assert_eq!(chan.channel_id.as_deref(), Some(format!("{}", channel_id).as_str()));
	assert_eq!(chan.total_msat, Some(1_000_000_000));
	assert_eq!(chan.to_us_msat, Some(1_000_000_000));
	// Spendable = balance minus the reserve they imposed on us.
	assert_eq!(chan.spendable_msat, Some(1_000_000_000 - 1000 * 1000));
	assert_eq!(chan.private, Some(false));
	let allocation = chan.funding_allocation_msat.as_ref().unwrap();
	assert_eq!(allocation.get(&h.our_id.to_string()), Some(&1_000_000_000));
	assert_eq!(allocation.get(&peer_id.to_string()), Some(&0));
}

#[test]
fn listpeers_hides_features_when_disconnected() {
	let h = Harness::new();
	let (control, peer_id, _) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);
	control.peer_disconnected(&peer_id);

	let details = control.list_peers(Some(&peer_id), None);
	assert!(!details[0].connected);
	assert!(details[0].netaddr.is_none());
	assert!(details[0].globalfeatures.is_none());
	assert!(details[0].localfeatures.is_none());
}

#[test]
fn listpeers_reports_uncommitted_channel() {
	let h = Harness::new();
	let control = h.control();
	let peer_id = pubkey(42);
	connect(&control, peer_id);

	let details = control.list_peers(Some(&peer_id), None);
	assert!(details[0].connected);
	assert_eq!(details[0].channels.len(), 1);
	assert_eq!(details[0].channels[0].state, "OPENINGD");
	assert_eq!(details[0].channels[0].owner.as_deref(), Some("openingd"));
	assert!(details[0].channels[0].channel_id.is_none());
}

// Overflow in the read model is reported broken and substituted, never fatal.
#[test]
fn listpeers_funding_overflow_reports_broken() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	control.test_mutate_channel(&channel_id, |c| c.funding_satoshis = u64::MAX);

	let details = control.list_peers(Some(&peer_id), None);
	assert_eq!(details[0].channels[0].total_msat, Some(0));
	h.logger.assert_log_contains(CONTROL_MODULE, "Overflow converting funding", 1);
}

#[test]
fn getinfo_counts_channels_by_state() {
	let h = Harness::new();
	let peer_a = pubkey(42);
	let peer_b = pubkey(43);
	let peer_c = pubkey(44);
	{
		let mut stored = h.wallet.stored.lock().unwrap();
		stored.push(StoredPeer {
			id: peer_a,
			dbid: 9,
			addr: net_addr(),
			channels: vec![channel_seed(peer_a, 1, ChannelState::ChanneldAwaitingLockin)],
		});
		stored.push(StoredPeer {
			id: peer_b,
			dbid: 10,
			addr: net_addr(),
			channels: vec![channel_seed(peer_b, 2, ChannelState::ChanneldNormal)],
		});
		stored.push(StoredPeer {
			id: peer_c,
			dbid: 11,
			addr: net_addr(),
			channels: vec![channel_seed(peer_c, 3, ChannelState::Onchain)],
		});
	}
	let control = h.control();
	control.load_from_wallet();
	control.best_block_updated(1234);
	*h.wallet.forward_fees.lock().unwrap() = 5500;

	let info = control.get_info();
	assert_eq!(info.id, h.our_id.to_string());
	assert_eq!(info.num_peers, 3);
	assert_eq!(info.num_pending_channels, 1);
	assert_eq!(info.num_active_channels, 1);
	assert_eq!(info.num_inactive_channels, 1);
	assert_eq!(info.blockheight, 1234);
	assert_eq!(info.network, "bitcoin");
	assert_eq!(info.fees_collected_msat, 5500);
}

// Startup restore wires peers back up and asks connectd for them.
#[test]
fn activate_peers_requests_reconnects() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);

	control.activate_peers();

	assert!(h.connector.requests.lock().unwrap().iter().any(|(id, secs)| *id == peer_id && *secs == 0));
	let details = control.list_peers(Some(&peer_id), None);
	assert!(details[0].channels[0].status.iter().any(|s| s == "Attempting to reconnect"));
	// Reconnect clears the transient line.
	connect(&control, peer_id);
	let details = control.list_peers(Some(&peer_id), None);
	assert!(!details[0].channels[0].status.iter().any(|s| s == "Attempting to reconnect"));
	assert!(control.test_with_channel(&channel_id, |c| c.connected).unwrap());
}

// The RPC adapter end to end: framing, dispatch, deferred close responses.
#[test]
fn rpc_close_mutual_roundtrip() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);
	let server = RpcServer::new();

	let request = format!(
		r#"{{"jsonrpc":"2.0","id":1,"method":"close","params":{{"id":"{}"}}}}"#,
		peer_id
	);
	// The response is deferred until the close resolves.
	assert_eq!(server.handle_line(&control, &request), None);

	control.shutdown_complete(&channel_id, transport());
	let mutual_tx = spending_tx(funding_outpoint(1), 999_500);
	let mutual_txid = mutual_tx.compute_txid();
	control.closing_complete(&channel_id, mutual_tx, dummy_sig());

	let events = control.get_and_clear_pending_events();
	let frames = server.handle_events(&events);
	assert_eq!(frames.len(), 1);
	let response: serde_json::Value = serde_json::from_str(frames[0].trim_end()).unwrap();
	assert_eq!(response["id"], serde_json::json!(1));
	assert_eq!(response["result"]["type"], serde_json::json!("mutual"));
	assert_eq!(response["result"]["txid"], serde_json::json!(mutual_txid.to_string()));
	assert!(response["result"]["tx"].as_str().unwrap().len() > 0);
}

#[test]
fn rpc_close_wrong_state_is_an_error() {
	let h = Harness::new();
	let (control, peer_id, _) = h.control_with_channel(ChannelState::AwaitingUnilateral);
	let server = RpcServer::new();

	let request = format!(
		r#"{{"jsonrpc":"2.0","id":5,"method":"close","params":{{"id":"{}"}}}}"#,
		peer_id
	);
	let frame = server.handle_line(&control, &request).unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["error"]["code"], serde_json::json!(crate::rpc::LIGHTNINGD));
	assert_eq!(
		response["error"]["message"],
		serde_json::json!("Channel is in state AWAITING_UNILATERAL")
	);
}

#[test]
fn rpc_dispatch_and_errors() {
	let h = Harness::new();
	let (control, peer_id, _) = h.control_with_channel(ChannelState::ChanneldNormal);
	let server = RpcServer::new();

	let frame = server
		.handle_line(&control, r#"{"jsonrpc":"2.0","id":1,"method":"getinfo","params":{}}"#)
		.unwrap();
	assert!(frame.ends_with("\n\n"));
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["result"]["network"], serde_json::json!("bitcoin"));

	let frame = server
		.handle_line(&control, r#"{"jsonrpc":"2.0","id":2,"method":"borked","params":{}}"#)
		.unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["error"]["code"], serde_json::json!(crate::rpc::METHOD_NOT_FOUND));

	let frame = server.handle_line(&control, "this is not json").unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["error"]["code"], serde_json::json!(crate::rpc::PARSE_ERROR));

	let frame = server
		.handle_line(
			&control,
			r#"{"jsonrpc":"2.0","id":3,"method":"close","params":{"id":"junk"}}"#,
		)
		.unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["error"]["code"], serde_json::json!(crate::rpc::INVALID_PARAMS));

	// setchannelfee with a suffixed base and positional ppm defaulting.
	let request = format!(
		r#"{{"jsonrpc":"2.0","id":4,"method":"setchannelfee","params":{{"id":"{}","base":"2sat"}}}}"#,
		peer_id
	);
	let frame = server.handle_line(&control, &request).unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["result"]["base"], serde_json::json!(2000));
	assert_eq!(response["result"]["channels"].as_array().unwrap().len(), 1);

	// A fee base beyond u32 is refused.
	let request = format!(
		r#"{{"jsonrpc":"2.0","id":6,"method":"setchannelfee","params":{{"id":"{}","base":"1btc"}}}}"#,
		peer_id
	);
	let frame = server.handle_line(&control, &request).unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["error"]["code"], serde_json::json!(crate::rpc::INVALID_PARAMS));
	assert!(response["error"]["message"].as_str().unwrap().contains("exceeds u32 max"));
}

#[test]
fn rpc_selects_channel_by_scid_and_channel_id() {
	let h = Harness::new();
	let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);
	let txid = funding_outpoint(1).txid;
	h.wallet.locate_at(txid, 103, 4);
	control.funding_depth_changed(&channel_id, &txid, 3);
	let server = RpcServer::new();

	let request = format!(
		r#"{{"jsonrpc":"2.0","id":1,"method":"setchannelfee","params":{{"id":"103x4x0","base":11,"ppm":1}}}}"#
	);
	let frame = server.handle_line(&control, &request).unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["result"]["channels"][0]["short_channel_id"], serde_json::json!("103x4x0"));

	let request = format!(
		r#"{{"jsonrpc":"2.0","id":2,"method":"setchannelfee","params":{{"id":"{}","base":12,"ppm":1}}}}"#,
		channel_id
	);
	let frame = server.handle_line(&control, &request).unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(
		response["result"]["channels"][0]["channel_id"],
		serde_json::json!(format!("{}", channel_id))
	);

	// An unknown channel id is reported as such.
	let bogus = ChannelId::from_bytes([0x5a; 32]);
	let request = format!(
		r#"{{"jsonrpc":"2.0","id":3,"method":"close","params":{{"id":"{}"}}}}"#,
		bogus
	);
	let frame = server.handle_line(&control, &request).unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert!(response["error"]["message"].as_str().unwrap().starts_with("Channel ID not found"));
}

#[test]
fn rpc_listpeers_with_log_level() {
	let h = Harness::new();
	let (control, peer_id, _) = h.control_with_channel(ChannelState::ChanneldNormal);
	connect(&control, peer_id);
	let server = RpcServer::new();

	let request = format!(
		r#"{{"jsonrpc":"2.0","id":1,"method":"listpeers","params":{{"id":"{}","level":"debug"}}}}"#,
		peer_id
	);
	let frame = server.handle_line(&control, &request).unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	let peers = response["result"]["peers"].as_array().unwrap();
	assert_eq!(peers.len(), 1);
	assert!(peers[0]["log"].as_array().unwrap().len() > 0);

	let frame = server
		.handle_line(
			&control,
			r#"{"jsonrpc":"2.0","id":2,"method":"listpeers","params":{"level":"noisy"}}"#,
		)
		.unwrap();
	let response: serde_json::Value = serde_json::from_str(frame.trim_end()).unwrap();
	assert_eq!(response["error"]["code"], serde_json::json!(crate::rpc::INVALID_PARAMS));
}

#[cfg(feature = "developer")]
mod developer {
	use super::*;

	#[test]
	fn dev_sign_last_tx_leaves_stored_copy_unsigned() {
		let h = Harness::new();
		let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);

		let signed = control.dev_sign_last_tx(&peer_id).unwrap();
		assert_eq!(signed.input[0].witness.len(), 4);
		control
			.test_with_channel(&channel_id, |c| assert!(c.last_tx.input[0].witness.is_empty()))
			.unwrap();
	}

	#[test]
	fn dev_fail_fails_permanently() {
		let h = Harness::new();
		let (control, peer_id, channel_id) = h.control_with_channel(ChannelState::ChanneldNormal);

		control.dev_fail(&peer_id).unwrap();
		assert_eq!(control.test_channel_state(&channel_id), Some(ChannelState::AwaitingUnilateral));
		assert_eq!(h.broadcaster.txn_broadcasted.lock().unwrap().len(), 1);
	}

	#[test]
	fn dev_forget_channel_checks_funding_output() {
		let h = Harness::new();
		let (control, peer_id, _) = h.control_with_channel(ChannelState::ChanneldNormal);
		h.wallet.utxos.lock().unwrap().insert(funding_outpoint(1), 1_000_000);

		// Refused while the funding output is unspent...
		match control.dev_forget_channel(&peer_id, None, false) {
			Err(APIError::ChannelUnavailable { err }) => {
				assert!(err.starts_with("Cowardly refusing"));
			},
			other => panic!("unexpected forget result {:?}", other),
		}

		// ...but force overrides, deleting channel and peer.
		let result = control.dev_forget_channel(&peer_id, None, true).unwrap();
		assert!(result.forced);
		assert!(result.funding_unspent);
		assert_eq!(control.test_peer_count(), 0);
		assert_eq!(h.wallet.deleted_channels.lock().unwrap().as_slice(), &[1]);
		assert_eq!(h.wallet.deleted_peers.lock().unwrap().as_slice(), &[9]);
	}

	// The third close-command path: channel destroyed before the close finishes.
	#[test]
	fn channel_destruction_fails_pending_close_commands() {
		let h = Harness::new();
		let (control, peer_id, _) = h.control_with_channel(ChannelState::ChanneldNormal);

		let command_id = match control.close(&ChannelSelector::PeerId(peer_id), false, 30).unwrap() {
			CloseAction::Pending { command_id } => command_id,
			other => panic!("unexpected close action {:?}", other),
		};
		control.dev_forget_channel(&peer_id, None, true).unwrap();

		let events = control.get_and_clear_pending_events();
		let resolutions = close_resolutions(&events);
		assert_eq!(resolutions.len(), 1);
		match resolutions[0].1 {
			Event::CloseCommandResolved { id, result: Err(fail) } => {
				assert_eq!(*id, command_id);
				assert_eq!(fail.message, "Channel forgotten before proper close");
			},
			other => panic!("unexpected resolution {:?}", other),
		}

		// The timeout path must not fire for the already-failed command.
		Instant::advance(Duration::from_secs(60));
		control.timer_tick_occurred();
		assert!(close_resolutions(&control.get_and_clear_pending_events()).is_empty());
	}

	#[test]
	fn dev_reenable_commit_requires_channel_owner() {
		let h = Harness::new();
		let (control, peer_id, _) = h.control_with_channel(ChannelState::ChanneldNormal);

		match control.dev_reenable_commit(&peer_id) {
			Err(APIError::ChannelUnavailable { err }) => assert_eq!(err, "Peer has no owner"),
			other => panic!("unexpected reenable result {:?}", other),
		}

		connect(&control, peer_id);
		control.dev_reenable_commit(&peer_id).unwrap();
		assert!(h
			.broker
			.last_worker()
			.msgs
			.lock()
			.unwrap()
			.contains(&WorkerMsg::DevReenableCommit));
	}
}
