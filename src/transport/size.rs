//! Datagram size gating.

use crate::core::MAX_MESSAGE_SIZE;
use crate::message::{Message, encode};

/// Whether `message` encodes within [`MAX_MESSAGE_SIZE`] bytes.
///
/// Fails closed: a message that cannot be encoded is not allowed.
pub fn message_size_allowed(message: &Message) -> bool {
    size_allowed_within(message, MAX_MESSAGE_SIZE)
}

/// Whether `message` encodes within `limit` bytes.
pub fn size_allowed_within(message: &Message, limit: usize) -> bool {
    encode(message).is_ok_and(|bytes| bytes.len() <= limit)
}
