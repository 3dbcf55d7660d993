//! Request and response wrappers around [`Message`].

use super::ids::{Token, next_message_id};
use super::message::Message;
use super::types::{Code, MessageType, Method};

/// An outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    message: Message,
}

impl Request {
    /// Create a request with a fresh message ID and a random token.
    pub fn new(message_type: MessageType, method: Method) -> Self {
        let mut message = Message::new(message_type, method.into(), next_message_id());
        message.token = Token::random();
        Self { message }
    }

    /// Wrap an existing message.
    pub fn from_message(message: Message) -> Self {
        Self { message }
    }

    /// Set the target resource path.
    pub fn set_uri_path(&mut self, path: &str) {
        self.message.set_uri_path(path);
    }

    /// Builder-style [`Request::set_uri_path`].
    pub fn with_uri_path(mut self, path: &str) -> Self {
        self.set_uri_path(path);
        self
    }

    /// Set the payload and its Content-Format.
    pub fn set_payload(&mut self, payload: impl Into<Vec<u8>>, media_type: u16) {
        self.message.payload = payload.into();
        self.message.set_content_format(media_type);
    }

    /// Builder-style [`Request::set_payload`].
    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>, media_type: u16) -> Self {
        self.set_payload(payload, media_type);
        self
    }

    /// The underlying message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Mutable access to the underlying message.
    pub fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    /// Consume the request, returning the message.
    pub fn into_message(self) -> Message {
        self.message
    }
}

/// A response to a sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    message: Message,
}

impl Response {
    /// Wrap a decoded reply.
    pub fn new(message: Message) -> Self {
        Self { message }
    }

    /// Empty response correlated to a message ID, for sends that do not wait.
    pub fn empty(message_id: u16) -> Self {
        Self::new(Message::empty_ack(message_id))
    }

    /// Response code.
    pub fn code(&self) -> Code {
        self.message.code
    }

    /// Correlated message ID.
    pub fn message_id(&self) -> u16 {
        self.message.message_id
    }

    /// Token carried by the reply.
    pub fn token(&self) -> &Token {
        &self.message.token
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    /// Whether this is a locally produced empty response.
    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }

    /// The underlying message.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Consume the response, returning the message.
    pub fn into_message(self) -> Message {
        self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{media_type, numbers};

    #[test]
    fn test_new_request() {
        let req = Request::new(MessageType::Confirmable, Method::Get).with_uri_path("/a/b");
        let msg = req.message();

        assert_eq!(msg.message_type, MessageType::Confirmable);
        assert_eq!(msg.code, Code::GET);
        assert_eq!(msg.token.len(), Token::RANDOM_LENGTH);
        assert_eq!(msg.uri_path(), "/a/b");
    }

    #[test]
    fn test_requests_get_distinct_ids() {
        let a = Request::new(MessageType::Confirmable, Method::Get);
        let b = Request::new(MessageType::Confirmable, Method::Get);
        assert_ne!(a.message().message_id, b.message().message_id);
    }

    #[test]
    fn test_request_payload() {
        let req = Request::new(MessageType::NonConfirmable, Method::Post)
            .with_payload(b"hello".to_vec(), media_type::TEXT_PLAIN);
        assert_eq!(req.message().payload, b"hello");
        assert_eq!(
            req.message().uint_option(numbers::CONTENT_FORMAT),
            Some(u32::from(media_type::TEXT_PLAIN))
        );
    }

    #[test]
    fn test_empty_response() {
        let resp = Response::empty(42);
        assert!(resp.is_empty());
        assert_eq!(resp.message_id(), 42);
        assert!(resp.payload().is_empty());
    }
}
