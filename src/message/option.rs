//! Option numbers and uint option values (RFC 7252 §5.10, §3.2).

/// Registered option numbers.
pub mod numbers {
    /// If-Match
    pub const IF_MATCH: u16 = 1;
    /// Uri-Host
    pub const URI_HOST: u16 = 3;
    /// ETag
    pub const ETAG: u16 = 4;
    /// If-None-Match
    pub const IF_NONE_MATCH: u16 = 5;
    /// Observe (RFC 7641)
    pub const OBSERVE: u16 = 6;
    /// Uri-Port
    pub const URI_PORT: u16 = 7;
    /// Location-Path
    pub const LOCATION_PATH: u16 = 8;
    /// Uri-Path
    pub const URI_PATH: u16 = 11;
    /// Content-Format
    pub const CONTENT_FORMAT: u16 = 12;
    /// Max-Age
    pub const MAX_AGE: u16 = 14;
    /// Uri-Query
    pub const URI_QUERY: u16 = 15;
    /// Accept
    pub const ACCEPT: u16 = 17;
    /// Location-Query
    pub const LOCATION_QUERY: u16 = 20;
    /// Block2 (RFC 7959)
    pub const BLOCK2: u16 = 23;
    /// Block1 (RFC 7959)
    pub const BLOCK1: u16 = 27;
    /// Size2 (RFC 7959)
    pub const SIZE2: u16 = 28;
    /// Proxy-Uri
    pub const PROXY_URI: u16 = 35;
    /// Proxy-Scheme
    pub const PROXY_SCHEME: u16 = 39;
    /// Size1
    pub const SIZE1: u16 = 60;
}

/// Encode a uint option value in the fewest bytes (zero is empty).
pub fn encode_uint(value: u32) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    bytes[skip..].to_vec()
}

/// Decode a uint option value, accepting leading zero bytes.
///
/// Returns `None` when the value is longer than four bytes.
pub fn decode_uint(bytes: &[u8]) -> Option<u32> {
    if bytes.len() > 4 {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
}

/// Whether an option is critical (odd number, RFC 7252 §5.4.6).
pub fn is_critical(number: u16) -> bool {
    number & 0x01 != 0
}
