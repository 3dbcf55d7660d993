//! Block1/Block2 option values (RFC 7959 §2.2).
//!
//! Wire format (1 to 3 bytes, big-endian):
//! ```text
//! +----------------------+---+-------+
//! | NUM (4/12/20 bits)   | M | SZX   |
//! +----------------------+---+-------+
//! ```
//!
//! A present but zero-length option means a block-wise transfer was requested
//! without choosing parameters. Concrete values are therefore always encoded
//! with at least one byte, so `NUM=0, M=0, SZX=0` is `[0x00]` and never empty.

use crate::core::{CoapError, CoapResult, MAX_BLOCK_NUM, MAX_BLOCK_SZX};

/// Decoded block option value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockValue {
    /// Block sequence number.
    pub num: u32,
    /// More blocks follow.
    pub more: bool,
    /// Size exponent: block size is `2^(szx + 4)`.
    pub szx: u8,
}

impl BlockValue {
    /// Create a block value.
    ///
    /// Returns `None` if `szx` is reserved or `num` needs more than 20 bits.
    pub fn new(num: u32, more: bool, szx: u8) -> Option<Self> {
        if szx > MAX_BLOCK_SZX || num > MAX_BLOCK_NUM {
            return None;
        }
        Some(Self { num, more, szx })
    }

    /// Size exponent for a block size in bytes (16..=1024, power of two).
    pub fn szx_for_size(size: usize) -> Option<u8> {
        if !size.is_power_of_two() || !(16..=1024).contains(&size) {
            return None;
        }
        Some((size.trailing_zeros() - 4) as u8)
    }

    /// Block size in bytes.
    pub fn size(&self) -> usize {
        1usize << (self.szx + 4)
    }

    /// Byte offset of this block within the whole payload.
    pub fn offset(&self) -> usize {
        self.num as usize * self.size()
    }

    /// Encode as an option value (never empty).
    pub fn encode(&self) -> Vec<u8> {
        let raw = (self.num << 4) | (u32::from(self.more) << 3) | u32::from(self.szx);
        let bytes = raw.to_be_bytes();
        match raw {
            0..=0xFF => vec![bytes[3]],
            0x100..=0xFFFF => bytes[2..].to_vec(),
            _ => bytes[1..].to_vec(),
        }
    }

    /// Decode an option value.
    ///
    /// Returns `Ok(None)` for an empty value (parameters unset).
    pub fn decode(bytes: &[u8]) -> CoapResult<Option<Self>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        if bytes.len() > 3 {
            return Err(CoapError::InvalidBlockOption);
        }
        let raw = bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
        let szx = (raw & 0x07) as u8;
        if szx > MAX_BLOCK_SZX {
            return Err(CoapError::InvalidBlockOption);
        }
        Ok(Some(Self {
            num: raw >> 4,
            more: raw & 0x08 != 0,
            szx,
        }))
    }
}
