// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The line-framed JSON-RPC 2.0 adapter.
//!
//! One request per line in, one response frame out, each frame terminated by a blank line so
//! that a client which does not parse JSON can still demarcate responses. The adapter is
//! transport-free: the host reads lines off its local socket, feeds them through
//! [`RpcServer::handle_line`], and writes back whatever frames come out of it and of
//! [`RpcServer::handle_events`] (which turns deferred `close` resolutions into late
//! responses).

use bitcoin::consensus::encode::serialize_hex;
use bitcoin::secp256k1::PublicKey;

use crate::chain::chaininterface::BroadcasterInterface;
use crate::events::Event;
use crate::ln::hooks::PluginHooks;
use crate::ln::peer_control::{ChannelSelector, CloseAction, PeerControl};
use crate::ln::subd::{PeerConnector, WorkerBroker};
use crate::sign::CommitmentSigner;
use crate::util::errors::APIError;
use crate::util::logger::{Level, Logger};
use crate::util::persist::Wallet;

use serde::Deserialize;
use serde_json::{json, Value};

use core::ops::Deref;
use std::collections::HashMap;
use std::sync::Mutex;

/// JSON-RPC 2.0 parse error.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC 2.0 invalid request.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC 2.0 method not found.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC 2.0 invalid params.
pub const INVALID_PARAMS: i64 = -32602;
/// The catch-all error code for command failures.
pub const LIGHTNINGD: i64 = -1;

#[derive(Deserialize)]
struct Request {
	#[serde(default)]
	id: Value,
	method: String,
	#[serde(default)]
	params: Value,
}

fn frame(body: Value) -> String {
	format!("{}\n\n", body)
}

fn success(id: &Value, result: Value) -> String {
	frame(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

fn failure(id: &Value, code: i64, message: String) -> String {
	frame(json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } }))
}

fn api_error(id: &Value, e: APIError) -> String {
	failure(id, e.code(), e.message().to_string())
}

/// Fetches a parameter by name (object params) or position (array params).
fn param<'a>(params: &'a Value, name: &str, pos: usize) -> Option<&'a Value> {
	match params {
		Value::Object(map) => map.get(name),
		Value::Array(items) => items.get(pos),
		_ => None,
	}
}

/// Parses a millisatoshi amount that must fit in a u32 (the fee base). Accepts a bare
/// number or a string with an `msat`/`sat`/`btc` suffix.
fn parse_msat_u32(value: &Value, name: &str) -> Result<u32, String> {
	let msat: u64 = if let Some(n) = value.as_u64() {
		n
	} else if let Some(s) = value.as_str() {
		let (digits, multiplier) = if let Some(d) = s.strip_suffix("msat") {
			(d, 1u64)
		} else if let Some(d) = s.strip_suffix("sat") {
			(d, 1000u64)
		} else if let Some(d) = s.strip_suffix("btc") {
			(d, 100_000_000_000u64)
		} else {
			(s, 1u64)
		};
		let base: u64 = digits
			.parse()
			.map_err(|_| format!("'{}' should be an amount, not '{}'", name, s))?;
		base.checked_mul(multiplier)
			.ok_or_else(|| format!("'{}' value '{}' exceeds u32 max", name, s))?
	} else {
		return Err(format!("'{}' should be an amount", name));
	};
	u32::try_from(msat).map_err(|_| format!("'{}' value '{}msat' exceeds u32 max", name, msat))
}

fn parse_pubkey(value: &Value) -> Option<PublicKey> {
	value.as_str().and_then(|s| s.parse().ok())
}

/// The RPC dispatcher plus the table of `close` commands whose responses are deferred.
pub struct RpcServer {
	pending_closes: Mutex<HashMap<u64, Value>>,
}

impl RpcServer {
	/// Creates a dispatcher with no commands pending.
	pub fn new() -> RpcServer {
		RpcServer { pending_closes: Mutex::new(HashMap::new()) }
	}

	/// Handles one request line. Returns the response frame, or `None` when the response is
	/// deferred (a `close` still negotiating; see [`RpcServer::handle_events`]).
	pub fn handle_line<SD: Deref, CO: Deref, SI: Deref, W: Deref, T: Deref, H: Deref, L: Deref>(
		&self, control: &PeerControl<SD, CO, SI, W, T, H, L>, line: &str,
	) -> Option<String>
	where
		SD::Target: WorkerBroker,
		CO::Target: PeerConnector,
		SI::Target: CommitmentSigner,
		W::Target: Wallet,
		T::Target: BroadcasterInterface,
		H::Target: PluginHooks,
		L::Target: Logger,
	{
		let request: Request = match serde_json::from_str(line) {
			Ok(request) => request,
			Err(_) => {
				// Distinguish unparseable JSON from JSON that is not a request.
				return Some(match serde_json::from_str::<Value>(line) {
					Ok(_) => failure(&Value::Null, INVALID_REQUEST, "Expected a request object".to_string()),
					Err(e) => failure(&Value::Null, PARSE_ERROR, format!("Parse error: {}", e)),
				});
			},
		};
		let id = request.id;
		let params = request.params;

		match request.method.as_str() {
			"getinfo" => {
				let info = control.get_info();
				Some(success(&id, serde_json::to_value(info).expect("getinfo serializes")))
			},

			"listpeers" => {
				let filter = match param(&params, "id", 0) {
					Some(v) => match parse_pubkey(v) {
						Some(key) => Some(key),
						None => {
							return Some(failure(
								&id,
								INVALID_PARAMS,
								format!("id: should be a node id: {}", v),
							))
						},
					},
					None => None,
				};
				let level = match param(&params, "level", 1) {
					Some(v) => match v.as_str().and_then(Level::from_name) {
						Some(level) => Some(level),
						None => {
							return Some(failure(
								&id,
								INVALID_PARAMS,
								format!("level: should be a log level: {}", v),
							))
						},
					},
					None => None,
				};
				let peers = control.list_peers(filter.as_ref(), level);
				Some(success(
					&id,
					json!({ "peers": serde_json::to_value(peers).expect("peers serialize") }),
				))
			},

			"close" => {
				let id_param = match param(&params, "id", 0).and_then(|v| v.as_str()) {
					Some(s) => s.to_string(),
					None => {
						return Some(failure(
							&id,
							INVALID_PARAMS,
							"missing required parameter: id".to_string(),
						))
					},
				};
				let selector = match ChannelSelector::parse(&id_param) {
					Some(selector) => selector,
					None => {
						return Some(failure(
							&id,
							INVALID_PARAMS,
							format!("Given id is not a channel ID or short channel ID: '{}'", id_param),
						))
					},
				};
				let force = param(&params, "force", 1).and_then(|v| v.as_bool()).unwrap_or(false);
				let timeout = param(&params, "timeout", 2).and_then(|v| v.as_u64()).unwrap_or(30);
				match control.close(&selector, force, timeout) {
					Ok(CloseAction::UncommittedChannelKilled) => Some(success(&id, Value::Null)),
					Ok(CloseAction::Pending { command_id }) => {
						self.pending_closes.lock().unwrap().insert(command_id, id);
						None
					},
					Err(e) => Some(api_error(&id, e)),
				}
			},

			"disconnect" => {
				let peer_id = match param(&params, "id", 0).and_then(|v| parse_pubkey(v)) {
					Some(key) => key,
					None => {
						return Some(failure(
							&id,
							INVALID_PARAMS,
							"id: should be a node id".to_string(),
						))
					},
				};
				let force = param(&params, "force", 1).and_then(|v| v.as_bool()).unwrap_or(false);
				match control.disconnect_peer(&peer_id, force) {
					Ok(()) => Some(success(&id, Value::Null)),
					Err(e) => Some(api_error(&id, e)),
				}
			},

			"setchannelfee" => {
				let id_param = match param(&params, "id", 0).and_then(|v| v.as_str()) {
					Some(s) => s.to_string(),
					None => {
						return Some(failure(
							&id,
							INVALID_PARAMS,
							"missing required parameter: id".to_string(),
						))
					},
				};
				let target = if id_param == "all" {
					None
				} else {
					match ChannelSelector::parse(&id_param) {
						Some(selector) => Some(selector),
						None => {
							return Some(failure(
								&id,
								INVALID_PARAMS,
								format!(
									"Given id is not a channel ID or short channel ID: '{}'",
									id_param
								),
							))
						},
					}
				};
				let base = match param(&params, "base", 1) {
					Some(v) => match parse_msat_u32(v, "base") {
						Ok(base) => Some(base),
						Err(msg) => return Some(failure(&id, INVALID_PARAMS, msg)),
					},
					None => None,
				};
				let ppm = match param(&params, "ppm", 2) {
					Some(v) => match v.as_u64().and_then(|n| u32::try_from(n).ok()) {
						Some(ppm) => Some(ppm),
						None => {
							return Some(failure(
								&id,
								INVALID_PARAMS,
								"ppm: should be an unsigned 32 bit integer".to_string(),
							))
						},
					},
					None => None,
				};
				match control.set_channel_fee(target.as_ref(), base, ppm) {
					Ok(result) => Some(success(
						&id,
						serde_json::to_value(result).expect("fee result serializes"),
					)),
					Err(e) => Some(api_error(&id, e)),
				}
			},

			#[cfg(feature = "developer")]
			"dev-sign-last-tx" => {
				let peer_id = match param(&params, "id", 0).and_then(|v| parse_pubkey(v)) {
					Some(key) => key,
					None => {
						return Some(failure(
							&id,
							INVALID_PARAMS,
							"id: should be a node id".to_string(),
						))
					},
				};
				match control.dev_sign_last_tx(&peer_id) {
					Ok(tx) => Some(success(&id, json!({ "tx": serialize_hex(&tx) }))),
					Err(e) => Some(api_error(&id, e)),
				}
			},

			#[cfg(feature = "developer")]
			"dev-fail" => {
				let peer_id = match param(&params, "id", 0).and_then(|v| parse_pubkey(v)) {
					Some(key) => key,
					None => {
						return Some(failure(
							&id,
							INVALID_PARAMS,
							"id: should be a node id".to_string(),
						))
					},
				};
				match control.dev_fail(&peer_id) {
					Ok(()) => Some(success(&id, Value::Null)),
					Err(e) => Some(api_error(&id, e)),
				}
			},

			#[cfg(feature = "developer")]
			"dev-reenable-commit" => {
				let peer_id = match param(&params, "id", 0).and_then(|v| parse_pubkey(v)) {
					Some(key) => key,
					None => {
						return Some(failure(
							&id,
							INVALID_PARAMS,
							"id: should be a node id".to_string(),
						))
					},
				};
				match control.dev_reenable_commit(&peer_id) {
					Ok(()) => Some(success(&id, Value::Null)),
					Err(e) => Some(api_error(&id, e)),
				}
			},

			#[cfg(feature = "developer")]
			"dev-forget-channel" => {
				let peer_id = match param(&params, "id", 0).and_then(|v| parse_pubkey(v)) {
					Some(key) => key,
					None => {
						return Some(failure(
							&id,
							INVALID_PARAMS,
							"id: should be a node id".to_string(),
						))
					},
				};
				let scid = match param(&params, "short_channel_id", 1).and_then(|v| v.as_str()) {
					Some(s) => match s.parse() {
						Ok(scid) => Some(scid),
						Err(_) => {
							return Some(failure(
								&id,
								INVALID_PARAMS,
								"short_channel_id: should be a short channel id".to_string(),
							))
						},
					},
					None => None,
				};
				let force = param(&params, "force", 2).and_then(|v| v.as_bool()).unwrap_or(false);
				match control.dev_forget_channel(&peer_id, scid, force) {
					Ok(result) => Some(success(
						&id,
						serde_json::to_value(result).expect("forget result serializes"),
					)),
					Err(e) => Some(api_error(&id, e)),
				}
			},

			other => Some(failure(&id, METHOD_NOT_FOUND, format!("Unknown command '{}'", other))),
		}
	}

	/// Turns resolved close commands into the late response frames their callers are still
	/// waiting on. Events not addressed to a pending command are ignored; the host handles
	/// those itself.
	pub fn handle_events(&self, events: &[Event]) -> Vec<String> {
		let mut pending = self.pending_closes.lock().unwrap();
		let mut frames = Vec::new();
		for event in events {
			if let Event::CloseCommandResolved { id, result } = event {
				let rpc_id = match pending.remove(id) {
					Some(rpc_id) => rpc_id,
					None => continue,
				};
				match result {
					Ok(close) => frames.push(success(
						&rpc_id,
						json!({
							"tx": serialize_hex(&close.tx),
							"txid": close.txid.to_string(),
							"type": close.close_type.name(),
						}),
					)),
					Err(fail) => {
						frames.push(failure(&rpc_id, LIGHTNINGD, fail.message.clone()))
					},
				}
			}
		}
		frames
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn msat_u32_parsing() {
		assert_eq!(parse_msat_u32(&json!(1000), "base"), Ok(1000));
		assert_eq!(parse_msat_u32(&json!("1000"), "base"), Ok(1000));
		assert_eq!(parse_msat_u32(&json!("1000msat"), "base"), Ok(1000));
		assert_eq!(parse_msat_u32(&json!("2sat"), "base"), Ok(2000));
		assert!(parse_msat_u32(&json!("5btc"), "base").unwrap_err().contains("exceeds u32 max"));
		assert!(parse_msat_u32(&json!("50000000000"), "base")
			.unwrap_err()
			.contains("exceeds u32 max"));
		assert!(parse_msat_u32(&json!("bogus"), "base").is_err());
		assert!(parse_msat_u32(&json!(true), "base").is_err());
	}

	#[test]
	fn frames_end_with_blank_line() {
		let s = success(&json!(1), Value::Null);
		assert!(s.ends_with("\n\n"));
		assert!(!s[..s.len() - 2].contains('\n'));
		let f = failure(&json!(1), LIGHTNINGD, "nope".to_string());
		assert!(f.ends_with("\n\n"));
	}

	#[test]
	fn unaddressed_events_produce_no_frames() {
		use crate::events::{CloseFailure, Event};
		let server = RpcServer::new();
		let events = vec![Event::CloseCommandResolved {
			id: 7,
			result: Err(CloseFailure { message: "nope".to_string() }),
		}];
		assert!(server.handle_events(&events).is_empty());
	}
}
