//! Payload framing
//!
//! Every registry payload is `[2 bytes magic][1 byte opcode][body]`,
//! carried in a single data carrier output.

use log::debug;

use namereg_core::OpCode;

/// Largest framed payload the protocol accepts
pub const MAX_OP_LENGTH: usize = 40;

/// Bytes taken by the magic and the opcode
pub const FRAMING_LENGTH: usize = 3;

/// Frame an operation body
pub fn frame(magic: [u8; 2], opcode: OpCode, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(FRAMING_LENGTH + body.len());
    payload.extend_from_slice(&magic);
    payload.push(opcode.as_byte());
    payload.extend_from_slice(body);
    payload
}

/// Split a framed payload into its opcode and body
///
/// Returns `None` for foreign magic bytes, unknown opcodes and oversized
/// payloads; none of those are registry operations.
pub fn unframe(magic: [u8; 2], payload: &[u8]) -> Option<(OpCode, &[u8])> {
    if payload.len() > MAX_OP_LENGTH {
        debug!("Ignoring {}-byte payload, limit is {}", payload.len(), MAX_OP_LENGTH);
        return None;
    }

    let [m0, m1, op, body @ ..] = payload else {
        return None;
    };

    if [*m0, *m1] != magic {
        return None;
    }

    match OpCode::from_byte(*op) {
        Some(opcode) => Some((opcode, body)),
        None => {
            debug!("Ignoring payload with unknown opcode {:#04x}", op);
            None
        }
    }
}

/// Body of a payload whose framing is already known to be valid
pub fn strip_framing(payload: &[u8]) -> Option<&[u8]> {
    payload.get(FRAMING_LENGTH..)
}
