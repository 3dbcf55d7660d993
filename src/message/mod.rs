//! CoAP message model and wire codec.
//!
//! - **Types**: [`MessageType`], [`Code`], [`Method`], [`media_type`]
//! - **Options**: [`numbers`], uint helpers, [`BlockValue`]
//! - **Model**: [`Message`], [`Request`], [`Response`], [`Token`]
//! - **Codec**: [`encode`] / [`decode`]
//! - **IDs**: [`MessageIdGenerator`], [`next_message_id`]

mod block;
mod codec;
mod ids;
#[allow(clippy::module_inception)]
mod message;
mod option;
mod request;
mod types;

pub use block::BlockValue;
pub use codec::{decode, encode};
pub use ids::{MessageIdGenerator, Token, next_message_id};
pub use message::Message;
pub use option::{decode_uint, encode_uint, is_critical, numbers};
pub use request::{Request, Response};
pub use types::{Code, MessageType, Method, media_type};
