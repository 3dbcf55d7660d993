//! Wire encoding and decoding (RFC 7252 §3).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |Ver| T |  TKL  |      Code     |          Message ID           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Token (if any, TKL bytes) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |   Options (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |1 1 1 1 1 1 1 1|    Payload (if any) ...
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```

use super::ids::Token;
use super::message::Message;
use super::types::{Code, MessageType};
use crate::core::{
    COAP_VERSION, DecodeError, EncodeError, HEADER_SIZE, MAX_TOKEN_LENGTH, PAYLOAD_MARKER,
};

/// Largest value an extended option delta or length can carry.
const MAX_EXTENDED: usize = 65535 + 269;

/// Encode a message into a datagram.
pub fn encode(message: &Message) -> Result<Vec<u8>, EncodeError> {
    let token = message.token.as_bytes();
    if token.len() > MAX_TOKEN_LENGTH {
        return Err(EncodeError::TokenTooLong(token.len()));
    }

    let mut buf = Vec::with_capacity(HEADER_SIZE + token.len() + 1 + message.payload.len());
    buf.push((COAP_VERSION << 6) | (message.message_type.as_bits() << 4) | token.len() as u8);
    buf.push(message.code.as_byte());
    buf.extend_from_slice(&message.message_id.to_be_bytes());
    buf.extend_from_slice(token);

    let mut previous = 0u16;
    for (number, value) in message.iter_options() {
        if value.len() > MAX_EXTENDED {
            return Err(EncodeError::OptionTooLong {
                number,
                len: value.len(),
            });
        }
        let delta = usize::from(number - previous);
        let (delta_nibble, delta_ext) = split_nibble(delta);
        let (len_nibble, len_ext) = split_nibble(value.len());

        buf.push((delta_nibble << 4) | len_nibble);
        buf.extend_from_slice(&delta_ext);
        buf.extend_from_slice(&len_ext);
        buf.extend_from_slice(value);
        previous = number;
    }

    if !message.payload.is_empty() {
        buf.push(PAYLOAD_MARKER);
        buf.extend_from_slice(&message.payload);
    }

    Ok(buf)
}

/// Decode a datagram into a message.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let version = bytes[0] >> 6;
    if version != COAP_VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let message_type = MessageType::from_bits(bytes[0] >> 4);
    let tkl = bytes[0] & 0x0F;
    if usize::from(tkl) > MAX_TOKEN_LENGTH {
        return Err(DecodeError::InvalidTokenLength(tkl));
    }
    let code = Code::from_byte(bytes[1]);
    let message_id = u16::from_be_bytes([bytes[2], bytes[3]]);

    let token_end = HEADER_SIZE + usize::from(tkl);
    if bytes.len() < token_end {
        return Err(DecodeError::TooShort {
            expected: token_end,
            actual: bytes.len(),
        });
    }

    let mut message = Message::new(message_type, code, message_id);
    message.token = Token::from_bytes(&bytes[HEADER_SIZE..token_end])
        .map_err(|_| DecodeError::InvalidTokenLength(tkl))?;

    let mut pos = token_end;
    let mut number = 0u16;
    while pos < bytes.len() {
        let byte = bytes[pos];
        pos += 1;

        if byte == PAYLOAD_MARKER {
            if pos == bytes.len() {
                return Err(DecodeError::EmptyPayload);
            }
            message.payload = bytes[pos..].to_vec();
            break;
        }

        let delta = read_extended(byte >> 4, bytes, &mut pos)?;
        let len = read_extended(byte & 0x0F, bytes, &mut pos)?;

        number = u16::try_from(usize::from(number) + delta)
            .map_err(|_| DecodeError::OptionNumberOverflow)?;

        let end = pos.checked_add(len).ok_or(DecodeError::TruncatedOption)?;
        if end > bytes.len() {
            return Err(DecodeError::TruncatedOption);
        }
        message.add_option(number, &bytes[pos..end]);
        pos = end;
    }

    if message.is_empty()
        && (!message.token.is_empty() || !message.has_no_options() || !message.payload.is_empty())
    {
        return Err(DecodeError::MalformedEmpty);
    }

    Ok(message)
}

/// Split a delta or length into its 4-bit nibble and extended bytes.
fn split_nibble(value: usize) -> (u8, Vec<u8>) {
    match value {
        0..=12 => (value as u8, Vec::new()),
        13..=268 => (13, vec![(value - 13) as u8]),
        _ => (14, ((value - 269) as u16).to_be_bytes().to_vec()),
    }
}

/// Read the extended form of a delta or length nibble.
fn read_extended(nibble: u8, bytes: &[u8], pos: &mut usize) -> Result<usize, DecodeError> {
    match nibble {
        0..=12 => Ok(usize::from(nibble)),
        13 => {
            let b = *bytes.get(*pos).ok_or(DecodeError::TruncatedOption)?;
            *pos += 1;
            Ok(usize::from(b) + 13)
        }
        14 => {
            let hi = *bytes.get(*pos).ok_or(DecodeError::TruncatedOption)?;
            let lo = *bytes.get(*pos + 1).ok_or(DecodeError::TruncatedOption)?;
            *pos += 2;
            Ok(usize::from(u16::from_be_bytes([hi, lo])) + 269)
        }
        _ => Err(DecodeError::ReservedOptionNibble),
    }
}
