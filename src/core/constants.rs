//! Protocol constants from RFC 7252 (CoAP), RFC 7641 (Observe) and
//! RFC 7959 (block-wise transfer).
//!
//! Values marked as transmission parameters may be overridden through
//! [`ClientConfig`](crate::client::ClientConfig); the rest are fixed by the
//! wire format.

use std::time::Duration;

// =============================================================================
// MESSAGE FORMAT (RFC 7252 §3)
// =============================================================================

/// Protocol version carried in the first two bits of every header.
pub const COAP_VERSION: u8 = 1;

/// Fixed header size (version/type/TKL + code + message ID).
pub const HEADER_SIZE: usize = 4;

/// Longest token a message may carry.
pub const MAX_TOKEN_LENGTH: usize = 8;

/// Marker byte separating options from the payload.
pub const PAYLOAD_MARKER: u8 = 0xFF;

// =============================================================================
// SIZE LIMITS
// =============================================================================

/// Largest encoded message accepted for sending without a block option.
pub const MAX_MESSAGE_SIZE: usize = 65536;

/// Receive buffer for request/response exchanges.
pub const RECV_BUFFER_SIZE: usize = 1500;

/// Default receive buffer for the observe reader.
pub const MAX_PACKET_SIZE: usize = 65535;

// =============================================================================
// TRANSMISSION PARAMETERS (RFC 7252 §4.8)
// =============================================================================

/// Deadline for a confirmable round trip, measured from the first write.
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Initial retransmission timeout for confirmable messages.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound of the random factor applied to [`ACK_TIMEOUT`].
pub const ACK_RANDOM_FACTOR: f64 = 1.5;

/// Maximum number of retransmissions of one confirmable message.
pub const MAX_RETRANSMIT: u32 = 4;

/// Back-off multiplier applied after each retransmission.
pub const BACKOFF_MULTIPLIER: u32 = 2;

// =============================================================================
// OBSERVE (RFC 7641 §2)
// =============================================================================

/// Observe option value that registers interest in a resource.
pub const OBSERVE_REGISTER: u32 = 0;

/// Observe option value that deregisters interest in a resource.
pub const OBSERVE_DEREGISTER: u32 = 1;

/// Default capacity of a notification channel.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// BLOCK-WISE TRANSFER (RFC 7959 §2.2)
// =============================================================================

/// Largest block size exponent (SZX 6 = 1024 bytes; 7 is reserved).
pub const MAX_BLOCK_SZX: u8 = 6;

/// Largest block number representable in a 3-byte block option.
pub const MAX_BLOCK_NUM: u32 = (1 << 20) - 1;
