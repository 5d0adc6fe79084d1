// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Structs and traits which allow the control plane to interact with the blockchain.

pub mod chaininterface;
pub mod transaction;

/// What the funding watcher tells the chain watcher to do with a watch after a callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchResult {
	/// The watch is still needed; deliver future depth changes/spends.
	KeepWatching,
	/// The watch has served its purpose and can be dropped.
	DeleteWatch,
}

/// The best known block as identified by its height.
///
/// Updated by the chain watcher via
/// [`PeerControl::best_block_updated`](crate::ln::peer_control::PeerControl::best_block_updated)
/// and reported by `getinfo`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BestBlock {
	/// The height at which the block was confirmed.
	pub height: u32,
}

impl BestBlock {
	/// Creates a `BestBlock` at the given height.
	pub fn new(height: u32) -> BestBlock {
		BestBlock { height }
	}
}
