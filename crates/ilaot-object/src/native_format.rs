//! Compressed unsigned integer encoding.
//!
//! The low bits of the first byte select the length and the payload is
//! packed above them, little-endian:
//!
//! | Range       | Bytes | First-byte tag |
//! |-------------|-------|----------------|
//! | `< 2^7`     | 1     | `xxxxxxx0`     |
//! | `< 2^14`    | 2     | `xxxxxx01`     |
//! | `< 2^21`    | 3     | `xxxxx011`     |
//! | `< 2^28`    | 4     | `xxxx0111`     |
//! | otherwise   | 5     | `00001111` followed by a raw `u32` |

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NativeFormatError {
    #[error("compressed integer needs {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("invalid compressed integer prefix: {0:#04x}")]
    InvalidPrefix(u8),
}

/// Number of bytes `value` takes in compressed form.
pub fn compressed_uint_len(value: u32) -> usize {
    match value {
        0..0x80 => 1,
        0x80..0x4000 => 2,
        0x4000..0x20_0000 => 3,
        0x20_0000..0x1000_0000 => 4,
        _ => 5,
    }
}

/// Append the compressed form of `value` to `out`.
pub fn encode_compressed_uint(value: u32, out: &mut Vec<u8>) {
    let len = compressed_uint_len(value);
    if len == 5 {
        out.push(0x0F);
        out.extend_from_slice(&value.to_le_bytes());
        return;
    }
    let tag = (1u32 << (len - 1)) - 1;
    let packed = (value << len) | tag;
    out.extend_from_slice(&packed.to_le_bytes()[..len]);
}

/// Decode a compressed integer from the start of `bytes`.
///
/// Returns the value and the number of bytes consumed.
pub fn decode_compressed_uint(bytes: &[u8]) -> Result<(u32, usize), NativeFormatError> {
    let first = *bytes.first().ok_or(NativeFormatError::Truncated {
        needed: 1,
        available: 0,
    })?;
    let len = (first.trailing_ones() as usize) + 1;
    if len > 5 || (len == 5 && first != 0x0F) {
        return Err(NativeFormatError::InvalidPrefix(first));
    }
    if bytes.len() < len {
        return Err(NativeFormatError::Truncated {
            needed: len,
            available: bytes.len(),
        });
    }
    if len == 5 {
        let value = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        return Ok((value, 5));
    }
    let mut raw = [0u8; 4];
    raw[..len].copy_from_slice(&bytes[..len]);
    Ok((u32::from_le_bytes(raw) >> len, len))
}
