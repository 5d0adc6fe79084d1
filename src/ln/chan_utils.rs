// This file is Copyright its original authors, visible in version control
// history.
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Utilities for the 2-of-2 multisig funding output shared by both commitment and mutual
//! close transactions.

use bitcoin::opcodes;
use bitcoin::script::Builder;
use bitcoin::secp256k1::ecdsa::Signature;
use bitcoin::secp256k1::PublicKey;
use bitcoin::sighash::EcdsaSighashType;
use bitcoin::{ScriptBuf, Witness};

/// Gets the redeemscript for a funding output from the two funding public keys.
///
/// Note that the order of funding public keys does not matter.
pub fn make_funding_redeemscript(broadcaster: &PublicKey, countersignatory: &PublicKey) -> ScriptBuf {
	let broadcaster_funding_key = broadcaster.serialize();
	let countersignatory_funding_key = countersignatory.serialize();

	let builder = Builder::new().push_opcode(opcodes::all::OP_PUSHNUM_2);
	if broadcaster_funding_key[..] < countersignatory_funding_key[..] {
		builder.push_slice(&broadcaster_funding_key).push_slice(&countersignatory_funding_key)
	} else {
		builder.push_slice(&countersignatory_funding_key).push_slice(&broadcaster_funding_key)
	}
	.push_opcode(opcodes::all::OP_PUSHNUM_2)
	.push_opcode(opcodes::all::OP_CHECKMULTISIG)
	.into_script()
}

/// Assembles the witness spending a 2-of-2 funding output.
///
/// `CHECKMULTISIG` requires the signatures in the same order the keys appear in the
/// redeemscript (lexicographic by serialized key), plus the off-by-one empty element.
pub fn funding_spend_witness(
	local_sig: &Signature, remote_sig: &Signature, local_funding_key: &PublicKey,
	remote_funding_key: &PublicKey,
) -> Witness {
	let redeemscript = make_funding_redeemscript(local_funding_key, remote_funding_key);

	let mut local_sig_ser = local_sig.serialize_der().to_vec();
	local_sig_ser.push(EcdsaSighashType::All as u8);
	let mut remote_sig_ser = remote_sig.serialize_der().to_vec();
	remote_sig_ser.push(EcdsaSighashType::All as u8);

	let mut witness = Witness::new();
	witness.push(Vec::new());
	if local_funding_key.serialize()[..] < remote_funding_key.serialize()[..] {
		witness.push(local_sig_ser);
		witness.push(remote_sig_ser);
	} else {
		witness.push(remote_sig_ser);
		witness.push(local_sig_ser);
	}
	witness.push(redeemscript.into_bytes());
	witness
}
