//! Script and address handling
//!
//! Just enough of the underlying chain's script language to recognise the
//! output shapes registry transactions use (a data carrier plus a change
//! output), to map scripts to base58check addresses, and to pull a public
//! key out of a pay-to-pubkey-hash scriptSig.

use log::debug;

use crate::crypto;
use crate::error::{CoreError, Result};
use crate::models::TxInput;

/// Address version byte for pay-to-pubkey-hash
pub const P2PKH_VERSION: u8 = 0x00;

/// Address version byte for pay-to-script-hash
pub const P2SH_VERSION: u8 = 0x05;

/// Largest payload a standard data carrier output relays
pub const MAX_NULLDATA_LENGTH: usize = 80;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_EQUAL: u8 = 0x87;
const OP_CHECKSIG: u8 = 0xac;
const OP_RETURN: u8 = 0x6a;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

/// Encode a 20-byte hash as a base58check address
pub fn hash160_to_address(version: u8, hash: &[u8; 20]) -> String {
    let mut data = Vec::with_capacity(25);
    data.push(version);
    data.extend_from_slice(hash);
    let checksum = crypto::sha256d(&data);
    data.extend_from_slice(&checksum[..4]);
    bs58::encode(data).into_string()
}

/// Decode a base58check address into its version byte and hash
///
/// Returns `None` for anything that is not a 25-byte payload with a valid
/// checksum.
pub fn address_to_hash160(address: &str) -> Option<(u8, [u8; 20])> {
    let data = bs58::decode(address).into_vec().ok()?;
    if data.len() != 25 {
        return None;
    }

    let (body, checksum) = data.split_at(21);
    if crypto::sha256d(body)[..4] != *checksum {
        return None;
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&body[1..]);
    Some((body[0], hash))
}

/// Pay-to-pubkey-hash address of a serialized public key
pub fn pubkey_to_address(pubkey: &[u8]) -> String {
    hash160_to_address(P2PKH_VERSION, &crypto::hash160(pubkey))
}

/// Address a standard scriptPubKey pays to
pub fn script_hex_to_address(script_hex: &str) -> Option<String> {
    let script = hex::decode(script_hex).ok()?;

    match script.as_slice() {
        [OP_DUP, OP_HASH160, 20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG] if hash.len() == 20 => {
            let mut h = [0u8; 20];
            h.copy_from_slice(hash);
            Some(hash160_to_address(P2PKH_VERSION, &h))
        }
        [OP_HASH160, 20, hash @ .., OP_EQUAL] if hash.len() == 20 => {
            let mut h = [0u8; 20];
            h.copy_from_slice(hash);
            Some(hash160_to_address(P2SH_VERSION, &h))
        }
        _ => None,
    }
}

/// scriptPubKey (hex) paying to `address`
pub fn make_pay_to_address_script(address: &str) -> Result<String> {
    let (version, hash) = address_to_hash160(address)
        .ok_or_else(|| CoreError::InvalidInput(format!("Invalid address '{}'", address)))?;

    let mut script = Vec::with_capacity(25);
    match version {
        P2PKH_VERSION => {
            script.extend_from_slice(&[OP_DUP, OP_HASH160, 20]);
            script.extend_from_slice(&hash);
            script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        }
        P2SH_VERSION => {
            script.extend_from_slice(&[OP_HASH160, 20]);
            script.extend_from_slice(&hash);
            script.push(OP_EQUAL);
        }
        other => {
            return Err(CoreError::InvalidInput(format!(
                "Unsupported address version {:#04x}",
                other
            )))
        }
    }

    Ok(hex::encode(script))
}

/// Whether a scriptPubKey (hex) is an OP_RETURN data carrier
pub fn is_op_return_script(script_hex: &str) -> bool {
    match hex::decode(script_hex) {
        Ok(script) => script.first() == Some(&OP_RETURN),
        Err(_) => false,
    }
}

/// OP_RETURN scriptPubKey (hex) carrying `data`
pub fn make_op_return_script(data: &[u8]) -> Result<String> {
    if data.len() > MAX_NULLDATA_LENGTH {
        return Err(CoreError::InvalidInput(format!(
            "Data carrier payload is {} bytes, limit is {}",
            data.len(),
            MAX_NULLDATA_LENGTH
        )));
    }

    let mut script = Vec::with_capacity(data.len() + 3);
    script.push(OP_RETURN);
    if data.len() < OP_PUSHDATA1 as usize {
        script.push(data.len() as u8);
    } else {
        script.push(OP_PUSHDATA1);
        script.push(data.len() as u8);
    }
    script.extend_from_slice(data);

    Ok(hex::encode(script))
}

/// Data pushed by an OP_RETURN script, if it is one
pub fn op_return_data(script_hex: &str) -> Option<Vec<u8>> {
    let script = hex::decode(script_hex).ok()?;
    match script.split_first() {
        Some((&OP_RETURN, rest)) => {
            let mut pushes = parse_pushes(rest)?;
            match pushes.len() {
                0 => Some(Vec::new()),
                1 => pushes.pop(),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Split a push-only script into its data pushes
///
/// Returns `None` if the script contains anything other than data pushes
/// or a push runs past the end of the script.
pub fn parse_pushes(script: &[u8]) -> Option<Vec<Vec<u8>>> {
    let mut pushes = Vec::new();
    let mut i = 0;

    while i < script.len() {
        let opcode = script[i];
        i += 1;

        let len = match opcode {
            1..=0x4b => opcode as usize,
            OP_PUSHDATA1 => {
                let n = *script.get(i)? as usize;
                i += 1;
                n
            }
            OP_PUSHDATA2 => {
                let bytes = script.get(i..i + 2)?;
                i += 2;
                u16::from_le_bytes([bytes[0], bytes[1]]) as usize
            }
            OP_PUSHDATA4 => {
                let bytes = script.get(i..i + 4)?;
                i += 4;
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
            }
            _ => return None,
        };

        let data = script.get(i..i.checked_add(len)?)?;
        pushes.push(data.to_vec());
        i += len;
    }

    Some(pushes)
}

fn is_public_key(data: &[u8]) -> bool {
    matches!((data.len(), data.first()), (33, Some(0x02 | 0x03)) | (65, Some(0x04)))
}

/// Recover the public key (hex) that signed for `address`
///
/// Scans the inputs for a pay-to-pubkey-hash scriptSig (`<sig> <pubkey>`)
/// whose public key hashes to `address`.
pub fn get_public_key_hex_from_inputs(inputs: &[TxInput], address: &str) -> Option<String> {
    for input in inputs {
        let Some(script_sig) = input.script_sig.as_deref() else {
            continue;
        };

        let Some(pushes) = hex::decode(script_sig).ok().and_then(|s| parse_pushes(&s)) else {
            debug!("Skipping non-push scriptSig in input {}:{}", input.prev_txid, input.prev_vout);
            continue;
        };

        if let Some(pubkey) = pushes.last().filter(|p| is_public_key(p)) {
            if pubkey_to_address(pubkey) == address {
                return Some(hex::encode(pubkey));
            }
        }
    }

    None
}
