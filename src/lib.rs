//! # coap-link
//!
//! A client-side CoAP (RFC 7252) transport engine over UDP.
//!
//! It provides:
//!
//! - **Codec**: RFC 7252 message encoding and decoding
//! - **Exchanges**: confirmable round trips with retransmission, fire-and-forget
//!   non-confirmable sends, local acknowledgements
//! - **Block-wise transfer**: Block1 uploads of payloads larger than a datagram
//! - **Observe**: RFC 7641 registration, cancellation and notification delivery
//!
//! ## Feature Flags
//!
//! - `transport` (default): Transport layer (sockets, demultiplexing, block transfer)
//! - `client` (default): Client API ([`client::Connection`])
//!
//! ## Modules
//!
//! - [`core`]: Core traits, constants, and error types (always included)
//! - [`message`]: Message model and codec (always included)
//! - [`transport`]: Transport layer (requires `transport` feature)
//! - [`client`]: Client API (requires `client` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use coap_link::prelude::*;
//!
//! let request = Request::new(MessageType::Confirmable, Method::Get)
//!     .with_uri_path("/sensors/temp");
//!
//! let bytes = encode(request.message()).unwrap();
//! let decoded = decode(&bytes).unwrap();
//!
//! assert_eq!(decoded.code, Code::GET);
//! assert_eq!(decoded.uri_path(), "/sensors/temp");
//! assert!(message_size_allowed(&decoded));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Message model and codec (always included)
pub mod message;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Client API (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits, errors and constants
    pub use crate::core::*;

    // Message model and codec
    pub use crate::message::*;

    // Transport types (when enabled)
    #[cfg(feature = "transport")]
    pub use crate::transport::{
        BlockPlan, ConnectionPhase, Notification, NotificationReceiver, NotificationSender,
        RetransmitPolicy, message_size_allowed, notification_channel,
    };

    // Client types (when enabled)
    #[cfg(feature = "client")]
    pub use crate::client::*;
}

// Re-export commonly used items at crate root
pub use crate::core::{CoapError, CoapResult, DecodeError, EncodeError, MessageExchange};
pub use crate::message::{Code, Message, MessageType, Method, Request, Response, Token};

#[cfg(feature = "client")]
pub use crate::client::{ClientConfig, Connection, ConnectionBuilder};
