// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Log traits live here, which are called throughout the library to provide useful information for
//! debugging purposes.
//!
//! Log messages can be filtered in two ways: at compile time with the `max_level_*` features, or
//! client-side by checking the [`Record`]'s `level` field. Peers additionally keep their own
//! bounded [`PeerLog`] ring, which mirrors high-severity entries to the parent logger.

use bitcoin::secp256k1::PublicKey;

use core::cmp;
use core::fmt;
use std::collections::VecDeque;
use std::sync::Mutex;

static LOG_LEVEL_NAMES: [&'static str; 6] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR", "BROKEN"];

/// An enum representing the available verbosity levels of the logger.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum Level {
	/// Designates very low priority, often extremely verbose, information
	Trace,
	/// Designates lower priority information
	Debug,
	/// Designates useful information
	Info,
	/// Designates hazardous situations
	Warn,
	/// Designates very serious errors
	Error,
	/// Designates a broken internal invariant that was recovered with a safe default. Anything
	/// logged at this level indicates a bug.
	Broken,
}

impl PartialOrd for Level {
	#[inline]
	fn partial_cmp(&self, other: &Level) -> Option<cmp::Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for Level {
	#[inline]
	fn cmp(&self, other: &Level) -> cmp::Ordering {
		(*self as usize).cmp(&(*other as usize))
	}
}

impl fmt::Display for Level {
	fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
		fmt.pad(LOG_LEVEL_NAMES[*self as usize])
	}
}

impl Level {
	/// Returns the most verbose logging level.
	#[inline]
	pub fn max() -> Level {
		Level::Trace
	}

	/// Parses a level name as given in a `listpeers` request, case-insensitively.
	pub fn from_name(name: &str) -> Option<Level> {
		match name.to_ascii_lowercase().as_str() {
			"trace" => Some(Level::Trace),
			"debug" => Some(Level::Debug),
			"info" => Some(Level::Info),
			"warn" => Some(Level::Warn),
			"error" => Some(Level::Error),
			"broken" => Some(Level::Broken),
			_ => None,
		}
	}
}

/// A Record, unit of logging output with Metadata to enable filtering
/// Module_path, file, line to inform on log's source
#[derive(Clone, Debug)]
pub struct Record<'a> {
	/// The verbosity level of the message.
	pub level: Level,
	/// The message body.
	pub args: fmt::Arguments<'a>,
	/// The module path of the message.
	pub module_path: &'static str,
	/// The source file containing the message.
	pub file: &'static str,
	/// The line containing the message.
	pub line: u32,
}

impl<'a> Record<'a> {
	/// Returns a new Record.
	#[inline]
	pub fn new(
		level: Level, args: fmt::Arguments<'a>, module_path: &'static str, file: &'static str,
		line: u32,
	) -> Record<'a> {
		Record { level, args, module_path, file, line }
	}
}

/// A trait encapsulating the operations required of a logger
pub trait Logger {
	/// Logs the `Record`
	fn log(&self, record: &Record);
}

/// One retained entry in a [`PeerLog`] ring.
#[derive(Clone, Debug, PartialEq)]
pub struct PeerLogEntry {
	/// The verbosity level the entry was logged at.
	pub level: Level,
	/// The module path the entry came from.
	pub module_path: &'static str,
	/// The formatted message body.
	pub message: String,
}

// Per-entry bookkeeping overhead charged against the ring's byte budget, so that many tiny
// entries cannot grow the ring without bound.
const PEER_LOG_ENTRY_OVERHEAD: usize = 64;

/// A bounded per-peer log ring.
///
/// Every peer keeps its own recent history (dumped by `listpeers` when a `level` is given);
/// entries at or above `mirror_level` are copied to the parent [`Logger`] so that the process
/// log still carries everything an operator needs. The ring is byte-budgeted: once the budget
/// is exceeded the oldest entries are dropped.
pub struct PeerLog {
	entries: Mutex<VecDeque<PeerLogEntry>>,
	used_bytes: Mutex<usize>,
	max_bytes: usize,
	mirror_level: Level,
}

impl PeerLog {
	/// Creates a new ring holding roughly `max_bytes` of messages, mirroring entries at or
	/// above `mirror_level` to the parent logger on [`PeerLog::log`].
	pub fn new(max_bytes: usize, mirror_level: Level) -> PeerLog {
		PeerLog {
			entries: Mutex::new(VecDeque::new()),
			used_bytes: Mutex::new(0),
			max_bytes,
			mirror_level,
		}
	}

	/// Appends `record` to the ring, evicting from the front if over budget, and mirrors it to
	/// `parent` if it is at or above the mirror level.
	pub fn log<PL: Logger + ?Sized>(&self, parent: &PL, record: &Record) {
		if record.level >= self.mirror_level {
			parent.log(record);
		}
		let entry = PeerLogEntry {
			level: record.level,
			module_path: record.module_path,
			message: format!("{}", record.args),
		};
		let mut entries = self.entries.lock().unwrap();
		let mut used = self.used_bytes.lock().unwrap();
		*used += entry.message.len() + PEER_LOG_ENTRY_OVERHEAD;
		entries.push_back(entry);
		while *used > self.max_bytes {
			match entries.pop_front() {
				Some(evicted) => *used -= evicted.message.len() + PEER_LOG_ENTRY_OVERHEAD,
				None => break,
			}
		}
	}

	/// Returns all retained entries at or above `min_level`, oldest first.
	pub fn dump(&self, min_level: Level) -> Vec<PeerLogEntry> {
		self.entries.lock().unwrap().iter().filter(|e| e.level >= min_level).cloned().collect()
	}
}

/// Wrapper for logging a [`PublicKey`] in hex format.
#[doc(hidden)]
pub struct DebugPubKey<'a>(pub &'a PublicKey);
impl<'a> core::fmt::Display for DebugPubKey<'a> {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		for i in self.0.serialize().iter() {
			write!(f, "{:02x}", i)?;
		}
		Ok(())
	}
}

/// Wrapper for logging byte slices in hex format.
#[doc(hidden)]
pub struct DebugBytes<'a>(pub &'a [u8]);
impl<'a> core::fmt::Display for DebugBytes<'a> {
	fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
		for i in self.0 {
			write!(f, "{:02x}", i)?;
		}
		Ok(())
	}
}
