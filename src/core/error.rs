//! Error types for the CoAP transport.

use thiserror::Error;

use crate::message::Code;

/// Errors that can occur when decoding a datagram into a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Datagram shorter than the fixed header.
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Version bits are not 1.
    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    /// Token length nibble is 9..=15.
    #[error("invalid token length: {0}")]
    InvalidTokenLength(u8),

    /// Option delta or length nibble is the reserved value 15.
    #[error("reserved option nibble")]
    ReservedOptionNibble,

    /// Option header or value runs past the end of the datagram.
    #[error("truncated option")]
    TruncatedOption,

    /// Payload marker present with no payload after it.
    #[error("payload marker followed by empty payload")]
    EmptyPayload,

    /// Option number overflows 16 bits.
    #[error("option number overflow")]
    OptionNumberOverflow,

    /// Empty message (code 0.00) carrying a token, options or payload.
    #[error("empty message with content")]
    MalformedEmpty,
}

/// Errors that can occur when encoding a message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Token longer than eight bytes.
    #[error("token too long: {0} bytes")]
    TokenTooLong(usize),

    /// Option value longer than the 16-bit extended length allows.
    #[error("option {number} value too long: {len} bytes")]
    OptionTooLong {
        /// Option number.
        number: u16,
        /// Value length.
        len: usize,
    },
}

/// Errors surfaced by the connection, dispatcher and observe layers.
#[derive(Debug, Error)]
pub enum CoapError {
    /// Encoded message exceeds the datagram ceiling and has no usable block option.
    #[error("message too large, no block option set ({size} > {limit} bytes)")]
    MessageTooLarge {
        /// Encoded size.
        size: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// Message could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Datagram could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Block1 option value is malformed (longer than 3 bytes or SZX 7).
    #[error("invalid block option")]
    InvalidBlockOption,

    /// Block number does not fit the 20-bit NUM field.
    #[error("block number {0} exceeds the 20-bit limit")]
    BlockNumberOverflow(u32),

    /// Peer answered an intermediate block with an error response.
    #[error("block {num} rejected with {code}")]
    BlockRejected {
        /// Block number that was rejected.
        num: u32,
        /// Response code.
        code: Code,
    },

    /// No message was supplied.
    #[error("nil message")]
    NilMessage,

    /// No reply arrived before the exchange deadline.
    #[error("exchange timed out")]
    Timeout,

    /// Peer rejected the message with a Reset.
    #[error("message {message_id} reset by peer")]
    Reset {
        /// ID of the message that was reset.
        message_id: u16,
    },

    /// Connection has been closed or its reader has stopped.
    #[error("connection closed")]
    ConnectionClosed,

    /// Observe registration answered with a non-success code.
    #[error("observe registration rejected with {0}")]
    ObserveRejected(Code),

    /// Delivery channel already attached.
    #[error("observe channel already attached")]
    ObserveAlreadyRunning,

    /// `stop_observe` called when no delivery channel is attached.
    #[error("observe already stopped")]
    ObserveStopped,

    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoapError {
    /// Check if this error ends the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoapError::ConnectionClosed | CoapError::ObserveStopped)
    }

    /// Check if retrying the same exchange could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            CoapError::Timeout => true,
            CoapError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Result type for connection operations.
pub type CoapResult<T> = Result<T, CoapError>;
