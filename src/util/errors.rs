// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Error types live here.

use core::fmt;

/// Indicates an error on the client's part (usually some variant of attempting to use
/// too-low or too-high values, or a command aimed at a channel in the wrong state).
///
/// These are returned to the user over JSON-RPC and never have side effects on channel
/// state.
#[derive(Clone, PartialEq, Eq)]
pub enum APIError {
	/// Indicates the API was wholly misused (see err for more). Cases where these can be
	/// returned are documented, but generally indicates some precondition of a function was
	/// violated. Maps to the JSON-RPC invalid-params error code.
	APIMisuseError {
		/// A human-readable error message
		err: String,
	},
	/// We were unable to complete the request as the channel required to do so is unable to
	/// complete it (or was not found). This can take many forms, including a disconnected
	/// peer, a channel in the wrong lifecycle state, or no channel at all.
	ChannelUnavailable {
		/// A human-readable error message
		err: String,
	},
}

impl APIError {
	/// The JSON-RPC error code this error is reported under.
	pub fn code(&self) -> i64 {
		match self {
			APIError::APIMisuseError { .. } => crate::rpc::INVALID_PARAMS,
			APIError::ChannelUnavailable { .. } => crate::rpc::LIGHTNINGD,
		}
	}

	/// The human-readable message.
	pub fn message(&self) -> &str {
		match self {
			APIError::APIMisuseError { err } => err,
			APIError::ChannelUnavailable { err } => err,
		}
	}
}

impl fmt::Debug for APIError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			APIError::APIMisuseError { err } => f.write_str(err),
			APIError::ChannelUnavailable { err } => f.write_str(err),
		}
	}
}
