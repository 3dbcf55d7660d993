//! The CoAP message model.

use std::collections::BTreeMap;

use super::block::BlockValue;
use super::ids::Token;
use super::option::{decode_uint, encode_uint, numbers};
use super::types::{Code, MessageType};
use crate::core::CoapResult;

/// A CoAP message (RFC 7252 §3).
///
/// Options are kept ordered by option number; repeated options keep their
/// insertion order, which is the order they are encoded in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message type.
    pub message_type: MessageType,
    /// Request method or response code.
    pub code: Code,
    /// Message ID used for deduplication and ACK/RST matching.
    pub message_id: u16,
    /// Request/response correlation token.
    pub token: Token,
    /// Options keyed by option number.
    options: BTreeMap<u16, Vec<Vec<u8>>>,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Message {
    /// Create a message with no token, options or payload.
    pub fn new(message_type: MessageType, code: Code, message_id: u16) -> Self {
        Self {
            message_type,
            code,
            message_id,
            token: Token::empty(),
            options: BTreeMap::new(),
            payload: Vec::new(),
        }
    }

    /// Empty acknowledgement correlated to `message_id`.
    pub fn empty_ack(message_id: u16) -> Self {
        Self::new(MessageType::Acknowledgement, Code::EMPTY, message_id)
    }

    /// Empty reset correlated to `message_id`.
    pub fn reset(message_id: u16) -> Self {
        Self::new(MessageType::Reset, Code::EMPTY, message_id)
    }

    /// Append a value for an option, after any existing values.
    pub fn add_option(&mut self, number: u16, value: impl Into<Vec<u8>>) {
        self.options.entry(number).or_default().push(value.into());
    }

    /// Append a uint-valued option.
    pub fn add_uint_option(&mut self, number: u16, value: u32) {
        self.add_option(number, encode_uint(value));
    }

    /// Replace all values of an option.
    pub fn replace_options(&mut self, number: u16, values: Vec<Vec<u8>>) {
        if values.is_empty() {
            self.options.remove(&number);
        } else {
            self.options.insert(number, values);
        }
    }

    /// Replace an option with a single value.
    pub fn set_option(&mut self, number: u16, value: impl Into<Vec<u8>>) {
        self.options.insert(number, vec![value.into()]);
    }

    /// First value of an option.
    pub fn option(&self, number: u16) -> Option<&[u8]> {
        self.options
            .get(&number)
            .and_then(|values| values.first())
            .map(Vec::as_slice)
    }

    /// All values of an option, in order.
    pub fn options(&self, number: u16) -> &[Vec<u8>] {
        self.options.get(&number).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value of an option decoded as uint.
    pub fn uint_option(&self, number: u16) -> Option<u32> {
        self.option(number).and_then(decode_uint)
    }

    /// Whether an option is present.
    pub fn has_option(&self, number: u16) -> bool {
        self.options.contains_key(&number)
    }

    /// Remove all values of an option.
    pub fn remove_option(&mut self, number: u16) {
        self.options.remove(&number);
    }

    /// Iterate `(number, value)` pairs in wire order.
    pub fn iter_options(&self) -> impl Iterator<Item = (u16, &[u8])> {
        self.options
            .iter()
            .flat_map(|(number, values)| values.iter().map(move |v| (*number, v.as_slice())))
    }

    /// Whether the message carries no options.
    pub fn has_no_options(&self) -> bool {
        self.options.is_empty()
    }

    /// Set Uri-Path from a `/`-separated path, replacing any existing segments.
    pub fn set_uri_path(&mut self, path: &str) {
        let segments: Vec<Vec<u8>> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.as_bytes().to_vec())
            .collect();
        self.replace_options(numbers::URI_PATH, segments);
    }

    /// Uri-Path joined with `/`, with a leading `/`.
    pub fn uri_path(&self) -> String {
        self.options(numbers::URI_PATH)
            .iter()
            .fold(String::new(), |mut path, segment| {
                path.push('/');
                path.push_str(&String::from_utf8_lossy(segment));
                path
            })
    }

    /// Observe option value, if present.
    pub fn observe(&self) -> Option<u32> {
        self.uint_option(numbers::OBSERVE)
    }

    /// Content-Format option value, if present.
    pub fn content_format(&self) -> Option<u16> {
        self.uint_option(numbers::CONTENT_FORMAT)
            .and_then(|v| u16::try_from(v).ok())
    }

    /// Set Content-Format.
    pub fn set_content_format(&mut self, media_type: u16) {
        self.set_option(numbers::CONTENT_FORMAT, encode_uint(u32::from(media_type)));
    }

    /// Set Accept.
    pub fn set_accept(&mut self, media_type: u16) {
        self.set_option(numbers::ACCEPT, encode_uint(u32::from(media_type)));
    }

    /// Block1 option state.
    ///
    /// - `Ok(None)`: no Block1 option.
    /// - `Ok(Some(None))`: Block1 present but its value is unset.
    /// - `Ok(Some(Some(block)))`: concrete block parameters.
    pub fn block1(&self) -> CoapResult<Option<Option<BlockValue>>> {
        match self.option(numbers::BLOCK1) {
            None => Ok(None),
            Some(raw) => BlockValue::decode(raw).map(Some),
        }
    }

    /// Replace the Block1 option with a concrete value.
    pub fn set_block1(&mut self, block: BlockValue) {
        self.set_option(numbers::BLOCK1, block.encode());
    }

    /// Whether this is an empty message (code 0.00).
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::media_type;

    #[test]
    fn test_options_keep_insertion_order() {
        let mut msg = Message::new(MessageType::Confirmable, Code::GET, 1);
        msg.add_option(numbers::URI_QUERY, "b=2");
        msg.add_option(numbers::URI_PATH, "a");
        msg.add_option(numbers::URI_QUERY, "a=1");

        let collected: Vec<(u16, &[u8])> = msg.iter_options().collect();
        assert_eq!(
            collected,
            vec![
                (numbers::URI_PATH, b"a".as_slice()),
                (numbers::URI_QUERY, b"b=2".as_slice()),
                (numbers::URI_QUERY, b"a=1".as_slice()),
            ]
        );
    }

    #[test]
    fn test_uri_path() {
        let mut msg = Message::new(MessageType::Confirmable, Code::GET, 1);
        msg.set_uri_path("/sensors/temp");
        assert_eq!(msg.options(numbers::URI_PATH).len(), 2);
        assert_eq!(msg.uri_path(), "/sensors/temp");

        msg.set_uri_path("");
        assert!(!msg.has_option(numbers::URI_PATH));
        assert_eq!(msg.uri_path(), "");
    }

    #[test]
    fn test_replace_and_remove() {
        let mut msg = Message::new(MessageType::Confirmable, Code::PUT, 1);
        msg.add_uint_option(numbers::OBSERVE, 0);
        assert_eq!(msg.observe(), Some(0));
        msg.set_option(numbers::OBSERVE, encode_uint(1));
        assert_eq!(msg.observe(), Some(1));
        msg.remove_option(numbers::OBSERVE);
        assert_eq!(msg.observe(), None);
    }

    #[test]
    fn test_media_type_options() {
        let mut msg = Message::new(MessageType::Confirmable, Code::GET, 1);
        msg.set_content_format(media_type::LWM2M_JSON);
        msg.set_accept(media_type::LWM2M_JSON);
        assert_eq!(msg.content_format(), Some(media_type::LWM2M_JSON));
        assert_eq!(msg.uint_option(numbers::ACCEPT), Some(11543));
    }

    #[test]
    fn test_block1_states() {
        let mut msg = Message::new(MessageType::Confirmable, Code::PUT, 1);
        assert!(msg.block1().unwrap().is_none());

        msg.add_option(numbers::BLOCK1, Vec::new());
        assert_eq!(msg.block1().unwrap(), Some(None));

        let block = BlockValue::new(3, true, 2).unwrap();
        msg.set_block1(block);
        assert_eq!(msg.block1().unwrap(), Some(Some(block)));
        assert_eq!(msg.options(numbers::BLOCK1).len(), 1);

        msg.set_option(numbers::BLOCK1, vec![0x07]);
        assert!(msg.block1().is_err());
    }
}
