//! Core traits for the CoAP transport.

use std::future::Future;

use super::error::CoapResult;
use crate::message::{Message, Response};

/// Something that can carry one message to the peer and produce its reply.
///
/// The type-dependent wait semantics (fire-and-forget, local acknowledgement,
/// round trip) belong to the implementor. The block-wise transfer engine is
/// written against this trait so it can run over a real connection or over
/// a recording double in tests.
///
/// # Example
///
/// ```ignore
/// struct Loopback;
///
/// impl MessageExchange for Loopback {
///     async fn send_message(&self, message: Message) -> CoapResult<Response> {
///         Ok(Response::empty(message.message_id))
///     }
/// }
/// ```
pub trait MessageExchange {
    /// Send one fully formed message and return the correlated response.
    fn send_message(&self, message: Message) -> impl Future<Output = CoapResult<Response>> + Send;
}
