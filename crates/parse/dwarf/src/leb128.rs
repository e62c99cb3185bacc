//! LEB128 variable-length integers.
//!
//! Operands in `.debug_line` and `.debug_info` are read with the decoders;
//! regenerated line programs are written with the `write_*` functions.

/// Longest encoding of a 64-bit value.
const MAX_ENCODED_LEN: usize = 10;

/// The bytes of the LEB128 value at the start of `data`, up to and including
/// the first byte without the continuation bit.
fn encoded(data: &[u8]) -> Option<&[u8]> {
    let last = data
        .iter()
        .take(MAX_ENCODED_LEN)
        .position(|&byte| byte & 0x80 == 0)?;
    Some(&data[..=last])
}

/// Decodes an unsigned LEB128 value from the start of `data`.
///
/// Returns `(value, bytes_consumed)`, or `None` if the encoding is
/// truncated, longer than ten bytes, or does not fit a `u64`.
#[must_use]
pub fn decode_uleb128(data: &[u8]) -> Option<(u64, usize)> {
    let bytes = encoded(data)?;
    let mut value = 0u64;
    for &byte in bytes.iter().rev() {
        if value > u64::MAX >> 7 {
            return None;
        }
        value = value << 7 | u64::from(byte & 0x7f);
    }
    Some((value, bytes.len()))
}

/// Decodes a signed LEB128 value from the start of `data`.
///
/// Returns `(value, bytes_consumed)`, or `None` if the encoding is
/// truncated or longer than ten bytes.
#[must_use]
pub fn decode_sleb128(data: &[u8]) -> Option<(i64, usize)> {
    let bytes = encoded(data)?;
    // Bit 6 of the final byte is the sign.
    let mut value: i64 = if bytes[bytes.len() - 1] & 0x40 == 0 { 0 } else { -1 };
    for &byte in bytes.iter().rev() {
        value = value << 7 | i64::from(byte & 0x7f);
    }
    Some((value, bytes.len()))
}

/// Appends the unsigned LEB128 encoding of `value` to `out`.
pub fn write_uleb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        #[expect(clippy::cast_possible_truncation, reason = "masked to 7 bits")]
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

/// Appends the signed LEB128 encoding of `value` to `out`.
pub fn write_sleb128(out: &mut Vec<u8>, mut value: i64) {
    loop {
        #[expect(clippy::cast_possible_truncation, reason = "masked to 7 bits")]
        #[expect(clippy::cast_sign_loss, reason = "masked to 7 bits")]
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let sign_bit_clear = byte & 0x40 == 0;
        let done = (value == 0 && sign_bit_clear) || (value == -1 && !sign_bit_clear);
        if done {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
}

/// Returns the number of bytes [`write_uleb128`] emits for `value`.
#[must_use]
pub fn uleb128_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}
