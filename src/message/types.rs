//! Message types, codes and media types (RFC 7252 §3, §5.9, §12.3).

use std::fmt;

/// Message type carried in the header's T field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Requires an acknowledgement.
    Confirmable = 0,
    /// Fire-and-forget.
    NonConfirmable = 1,
    /// Acknowledges a confirmable message.
    Acknowledgement = 2,
    /// Rejects a message that could not be processed.
    Reset = 3,
}

impl MessageType {
    /// Parse the two-bit T field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Self::Confirmable,
            1 => Self::NonConfirmable,
            2 => Self::Acknowledgement,
            _ => Self::Reset,
        }
    }

    /// Two-bit representation.
    pub fn as_bits(self) -> u8 {
        self as u8
    }
}

/// Request/response code, `class.detail` packed as `ccc ddddd`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code(u8);

impl Code {
    /// 0.00, empty message.
    pub const EMPTY: Self = Self::new(0, 0);
    /// 0.01 GET.
    pub const GET: Self = Self::new(0, 1);
    /// 0.02 POST.
    pub const POST: Self = Self::new(0, 2);
    /// 0.03 PUT.
    pub const PUT: Self = Self::new(0, 3);
    /// 0.04 DELETE.
    pub const DELETE: Self = Self::new(0, 4);
    /// 2.01 Created.
    pub const CREATED: Self = Self::new(2, 1);
    /// 2.02 Deleted.
    pub const DELETED: Self = Self::new(2, 2);
    /// 2.03 Valid.
    pub const VALID: Self = Self::new(2, 3);
    /// 2.04 Changed.
    pub const CHANGED: Self = Self::new(2, 4);
    /// 2.05 Content.
    pub const CONTENT: Self = Self::new(2, 5);
    /// 2.31 Continue (RFC 7959).
    pub const CONTINUE: Self = Self::new(2, 31);
    /// 4.00 Bad Request.
    pub const BAD_REQUEST: Self = Self::new(4, 0);
    /// 4.04 Not Found.
    pub const NOT_FOUND: Self = Self::new(4, 4);
    /// 4.08 Request Entity Incomplete (RFC 7959).
    pub const REQUEST_ENTITY_INCOMPLETE: Self = Self::new(4, 8);
    /// 4.13 Request Entity Too Large.
    pub const REQUEST_ENTITY_TOO_LARGE: Self = Self::new(4, 13);
    /// 5.00 Internal Server Error.
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(5, 0);

    /// Build a code from class and detail.
    pub const fn new(class: u8, detail: u8) -> Self {
        Self(((class & 0x07) << 5) | (detail & 0x1F))
    }

    /// Wrap a raw code byte.
    pub const fn from_byte(byte: u8) -> Self {
        Self(byte)
    }

    /// Raw code byte.
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Code class (0 request, 2 success, 4 client error, 5 server error).
    pub const fn class(self) -> u8 {
        self.0 >> 5
    }

    /// Code detail.
    pub const fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    /// 0.00.
    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// Class 0, non-empty.
    pub fn is_request(self) -> bool {
        self.class() == 0 && !self.is_empty()
    }

    /// Class 2.
    pub fn is_success(self) -> bool {
        self.class() == 2
    }

    /// Class 4 or 5.
    pub fn is_error(self) -> bool {
        matches!(self.class(), 4 | 5)
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Code({self})")
    }
}

/// Request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl From<Method> for Code {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Code::GET,
            Method::Post => Code::POST,
            Method::Put => Code::PUT,
            Method::Delete => Code::DELETE,
        }
    }
}

/// Content-Format registry values used with the Content-Format and Accept options.
pub mod media_type {
    /// `text/plain; charset=utf-8`
    pub const TEXT_PLAIN: u16 = 0;
    /// `application/link-format`
    pub const LINK_FORMAT: u16 = 40;
    /// `application/xml`
    pub const XML: u16 = 41;
    /// `application/octet-stream`
    pub const OCTET_STREAM: u16 = 42;
    /// `application/exi`
    pub const EXI: u16 = 47;
    /// `application/json`
    pub const JSON: u16 = 50;
    /// `application/cbor`
    pub const CBOR: u16 = 60;
    /// `application/vnd.oma.lwm2m+tlv`
    pub const LWM2M_TLV: u16 = 11542;
    /// `application/vnd.oma.lwm2m+json`
    pub const LWM2M_JSON: u16 = 11543;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_bits() {
        for t in [
            MessageType::Confirmable,
            MessageType::NonConfirmable,
            MessageType::Acknowledgement,
            MessageType::Reset,
        ] {
            assert_eq!(MessageType::from_bits(t.as_bits()), t);
        }
    }

    #[test]
    fn test_code_parts() {
        assert_eq!(Code::CONTENT.as_byte(), 0x45);
        assert_eq!(Code::CONTENT.class(), 2);
        assert_eq!(Code::CONTENT.detail(), 5);
        assert_eq!(Code::CONTINUE.to_string(), "2.31");
        assert_eq!(Code::NOT_FOUND.to_string(), "4.04");
    }

    #[test]
    fn test_code_classes() {
        assert!(Code::EMPTY.is_empty());
        assert!(!Code::EMPTY.is_request());
        assert!(Code::GET.is_request());
        assert!(Code::CHANGED.is_success());
        assert!(Code::REQUEST_ENTITY_TOO_LARGE.is_error());
        assert!(Code::INTERNAL_SERVER_ERROR.is_error());
        assert!(!Code::CONTINUE.is_error());
    }

    #[test]
    fn test_method_codes() {
        assert_eq!(Code::from(Method::Get), Code::GET);
        assert_eq!(Code::from(Method::Delete).as_byte(), 0x04);
    }
}
