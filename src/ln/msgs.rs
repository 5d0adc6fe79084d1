// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Wire-facing message types the control plane produces or routes.
//!
//! The control plane never talks BOLT wire framing itself beyond the `error` message it may
//! need to latch and deliver on reconnect; everything else here is the typed vocabulary of
//! the worker and transport contracts in [`crate::ln::subd`].

use crate::ln::channel_id::ChannelId;
use crate::util::string::PrintableString;

use core::fmt;

/// The wire message type number of a BOLT #1 `error`.
const ERROR_TYPE: u16 = 17;

/// An `error` message to be sent to or received from a peer.
///
/// An all-zero `channel_id` refers to every channel with the peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMessage {
	/// The channel ID involved in the error.
	pub channel_id: ChannelId,
	/// A possibly printable ASCII string describing the error.
	pub data: String,
}

impl ErrorMessage {
	/// Builds an error referring to a single channel.
	pub fn new(channel_id: ChannelId, data: String) -> ErrorMessage {
		ErrorMessage { channel_id, data }
	}

	/// Encodes to raw wire bytes: type, channel id, length-prefixed data.
	pub fn encode(&self) -> Vec<u8> {
		let mut res = Vec::with_capacity(2 + 32 + 2 + self.data.len());
		res.extend_from_slice(&ERROR_TYPE.to_be_bytes());
		res.extend_from_slice(&self.channel_id.0);
		res.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
		res.extend_from_slice(self.data.as_bytes());
		res
	}
}

impl fmt::Display for ErrorMessage {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "channel {}: {}", self.channel_id, PrintableString(&self.data))
	}
}

/// An address which can be used to connect to a remote peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetAddress {
	/// An IPv4 address/port on which the peer is listening.
	IPv4 {
		/// The 4-byte IPv4 address
		addr: [u8; 4],
		/// The port on which the node is listening
		port: u16,
	},
	/// An IPv6 address/port on which the peer is listening.
	IPv6 {
		/// The 16-byte IPv6 address
		addr: [u8; 16],
		/// The port on which the node is listening
		port: u16,
	},
}

impl fmt::Display for NetAddress {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			NetAddress::IPv4 { addr, port } => {
				write!(f, "{}:{}", core::net::Ipv4Addr::from(*addr), port)
			},
			NetAddress::IPv6 { addr, port } => {
				write!(f, "[{}]:{}", core::net::Ipv6Addr::from(*addr), port)
			},
		}
	}
}

/// A typed message from the control plane to a channel worker. Delivery is FIFO per worker
/// and causal with the state transitions the control plane makes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerMsg {
	/// Begin the shutdown exchange with the peer; the channel has entered the shutting-down
	/// state.
	SendShutdown,
	/// Routing fees changed; emit a fresh channel_update.
	SpecificFeerates {
		/// New fee base in millisatoshi.
		base: u32,
		/// New proportional fee in parts-per-million.
		ppm: u32,
	},
	/// Re-enable the commit timer.
	#[cfg(feature = "developer")]
	DevReenableCommit,
}
