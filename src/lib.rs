// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

#![crate_name = "lightning_peerd"]

//! The peer/channel control plane of a Lightning node, in library form.
//!
//! This crate owns the in-memory peer registry and the per-channel lifecycle: it decides
//! which worker subprocess drives a channel at any moment, reacts to funding confirmations
//! and funding spends, arbitrates user `close`/`disconnect` commands against protocol
//! progress, and guarantees the safety rules required to avoid losing on-chain funds (most
//! importantly: never broadcasting our own commitment when the counterparty has proven a
//! later state).
//!
//! There is no built-in execution environment. The transport daemon, the per-channel
//! workers, the hardware signer, the wallet/chain database, and the plugin transport are
//! all consumed through traits (see [`ln::subd`], [`sign`], [`util::persist`], and
//! [`ln::hooks`]); the host wires them up and calls into [`ln::peer_control::PeerControl`]
//! from its event loop. Results that cannot be produced synchronously (e.g. a `close`
//! command still negotiating) surface through the [`events::Event`] queue.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]
#![cfg_attr(not(test), deny(missing_docs))]
#![forbid(unsafe_code)]

extern crate bitcoin;
extern crate serde;
extern crate serde_json;
#[cfg(test)]
extern crate regex;

#[macro_use]
pub mod util;
pub mod chain;
pub mod events;
pub mod ln;
pub mod rpc;
pub mod sign;
