//! Message ID and token generation.

use std::fmt;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU16, Ordering};

use crate::core::{EncodeError, MAX_TOKEN_LENGTH};

/// Sequential message ID source.
///
/// Starts at a random value and wraps at `u16::MAX`, so IDs are unique for
/// the last 65536 messages drawn from the same generator.
#[derive(Debug)]
pub struct MessageIdGenerator {
    next: AtomicU16,
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageIdGenerator {
    /// Create a generator with a random starting point.
    pub fn new() -> Self {
        Self::starting_at(rand::random())
    }

    /// Create a generator with a fixed starting point.
    pub fn starting_at(first: u16) -> Self {
        Self {
            next: AtomicU16::new(first),
        }
    }

    /// Draw the next ID.
    pub fn next_id(&self) -> u16 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// Draw a message ID from the process-wide generator.
pub fn next_message_id() -> u16 {
    static GENERATOR: OnceLock<MessageIdGenerator> = OnceLock::new();
    GENERATOR.get_or_init(MessageIdGenerator::new).next_id()
}

/// Opaque request/response correlation token (0 to 8 bytes).
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Token(Vec<u8>);

impl Token {
    /// Length of tokens produced by [`Token::random`].
    pub const RANDOM_LENGTH: usize = 8;

    /// Zero-length token.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Random eight-byte token.
    pub fn random() -> Self {
        Self(rand::random::<[u8; Self::RANDOM_LENGTH]>().to_vec())
    }

    /// Wrap raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodeError> {
        if bytes.len() > MAX_TOKEN_LENGTH {
            return Err(EncodeError::TokenTooLong(bytes.len()));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Token length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Zero-length token.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for Token {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let ids = MessageIdGenerator::starting_at(10);
        assert_eq!(ids.next_id(), 10);
        assert_eq!(ids.next_id(), 11);
        assert_eq!(ids.next_id(), 12);
    }

    #[test]
    fn test_ids_wrap() {
        let ids = MessageIdGenerator::starting_at(u16::MAX);
        assert_eq!(ids.next_id(), u16::MAX);
        assert_eq!(ids.next_id(), 0);
    }

    #[test]
    fn test_global_ids_differ() {
        assert_ne!(next_message_id(), next_message_id());
    }

    #[test]
    fn test_random_token() {
        let token = Token::random();
        assert_eq!(token.len(), Token::RANDOM_LENGTH);
        assert_eq!(token.to_string().len(), 16);
    }

    #[test]
    fn test_token_limits() {
        assert!(Token::from_bytes(&[1; 8]).is_ok());
        assert_eq!(
            Token::from_bytes(&[1; 9]),
            Err(EncodeError::TokenTooLong(9))
        );
        assert_eq!(Token::from_bytes(&[0xab, 0x01]).unwrap().to_string(), "ab01");
    }
}
