// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! The plugin-hook contract.
//!
//! A hook is a synchronous external decision point: the control plane serializes a payload,
//! the plugin transport delivers it and blocks for the plugin's verdict, and the raw JSON
//! reply comes back for the control plane to interpret. A plugin is trusted code the
//! operator chose to load, so a malformed verdict is a fatal error, not a recoverable one.

use serde::Serialize;

/// The `peer` object inside a [`PeerConnectedPayload`].
#[derive(Clone, Debug, Serialize)]
pub struct PeerConnectedPeer {
	/// The peer's node id, hex-encoded.
	pub id: String,
	/// The address the connection came from.
	pub addr: String,
	/// The peer's global feature bits, hex-encoded.
	pub globalfeatures: String,
	/// The peer's local feature bits, hex-encoded.
	pub localfeatures: String,
}

/// Payload of the `peer_connected` hook.
#[derive(Clone, Debug, Serialize)]
pub struct PeerConnectedPayload {
	/// The connecting peer.
	pub peer: PeerConnectedPeer,
}

/// The parsed verdict of a `peer_connected` hook reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HookVerdict {
	/// Proceed with the connection.
	Continue,
	/// Send `error_message` (if any) to the peer and close the connection.
	Disconnect {
		/// Optional protocol-error text to deliver before closing.
		error_message: Option<String>,
	},
}

/// The plugin hooks the control plane consults.
///
/// Implementations deliver the payload to every registered plugin and return the raw JSON
/// reply; interpreting (and rejecting) the reply is the control plane's job so that the
/// fatal-on-garbage rule is applied uniformly. With no plugin registered, return
/// `serde_json::Value::Null` and the control plane treats it as "continue".
pub trait PluginHooks {
	/// Calls the `peer_connected` hook and returns the raw reply.
	fn peer_connected(&self, payload: &PeerConnectedPayload) -> serde_json::Value;
}

/// Parses a raw `peer_connected` hook reply into a verdict.
///
/// Panics on any reply shape other than `null`, `{result: "continue"}`, or
/// `{result: "disconnect", error_message?}` — a trusted collaborator sent us garbage.
pub fn parse_peer_connected_reply(reply: &serde_json::Value) -> HookVerdict {
	if reply.is_null() {
		return HookVerdict::Continue;
	}
	let result = match reply.get("result").and_then(|r| r.as_str()) {
		Some(r) => r,
		None => panic!("Plugin returned an invalid response to the connected hook: {}", reply),
	};
	match result {
		"continue" => HookVerdict::Continue,
		"disconnect" => {
			let error_message =
				reply.get("error_message").and_then(|m| m.as_str()).map(|m| m.to_string());
			HookVerdict::Disconnect { error_message }
		},
		_ => panic!("Plugin returned an invalid response to the connected hook: {}", reply),
	}
}
