//! Binary field writers for the module container format.
//!
//! Every size, count and index in the format is a base-128 variable
//! length integer, so all section serialization funnels through here.
//! Each writer takes a short description of the field being emitted and
//! logs it at trace level, which makes a `RUST_LOG=trace` dump of an
//! assembly run line up with the byte stream.

use tracing::trace;

const OPCODE_I32_CONST: u8 = 0x41;
const OPCODE_END: u8 = 0x0b;

/// Appends a single raw byte.
pub fn write_u8(out: &mut Vec<u8>, byte: u8, desc: &str) {
    trace!(at = out.len(), value = byte, "write u8: {}", desc);
    out.push(byte);
}

/// Appends an unsigned LEB128 integer.
pub fn write_uleb128(out: &mut Vec<u8>, mut value: u64, desc: &str) {
    trace!(at = out.len(), value, "write uleb128: {}", desc);
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.push(byte);
        if value == 0 {
            break;
        }
    }
}

/// Appends a signed LEB128 integer.
pub fn write_sleb128(out: &mut Vec<u8>, mut value: i64, desc: &str) {
    trace!(at = out.len(), value, "write sleb128: {}", desc);
    loop {
        let byte = (value as u8) & 0x7f;
        // Arithmetic shift keeps the sign; encoding ends once the
        // remaining bits agree with the sign bit just emitted.
        value >>= 7;
        if (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0) {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Appends a length-prefixed UTF-8 string, the format's name encoding.
pub fn write_str(out: &mut Vec<u8>, s: &str, desc: &str) {
    trace!(at = out.len(), name = s, "write string: {}", desc);
    write_uleb128(out, s.len() as u64, desc);
    out.extend_from_slice(s.as_bytes());
}

/// Appends an `i32.const` initializer expression. Data segment headers
/// use this to state the segment's base address.
pub fn write_i32_const_expr(out: &mut Vec<u8>, value: i32, desc: &str) {
    write_u8(out, OPCODE_I32_CONST, desc);
    write_sleb128(out, i64::from(value), desc);
    write_u8(out, OPCODE_END, "init expr end");
}
