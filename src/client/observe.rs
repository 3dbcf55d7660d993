//! Resource observation (RFC 7641).
//!
//! Registration and cancellation are protocol exchanges with the server.
//! Attaching and stopping the notification channel are local. Neither side
//! implies the other: cancelling leaves the channel attached, stopping sends
//! nothing to the server.

use tracing::info;

use super::connection::Connection;
use crate::core::{CoapError, CoapResult, OBSERVE_DEREGISTER, OBSERVE_REGISTER};
use crate::message::{MessageType, Method, Request, Token, numbers};
use crate::transport::{ExchangeKind, NotificationSender};

impl Connection {
    /// Register interest in `resource`.
    ///
    /// On a success reply the connection moves to `Open` and the reply's
    /// token is returned; notifications carry the same token.
    pub async fn observe_resource(&self, resource: &str) -> CoapResult<Token> {
        let request = self.observe_request(resource, OBSERVE_REGISTER);
        let kind = ExchangeKind::Register {
            resource: request.message().uri_path(),
        };

        let response = self.send_as(request, kind).await?;
        if !response.code().is_success() {
            return Err(CoapError::ObserveRejected(response.code()));
        }
        if !self.demux().state().mark_open() {
            return Err(CoapError::ConnectionClosed);
        }
        info!("observing {} ({})", resource, response.code());
        Ok(response.token().clone())
    }

    /// Ask the server to stop notifying about `resource`.
    ///
    /// `token` is the one returned by [`observe_resource`](Self::observe_resource).
    pub async fn cancel_observe_resource(&self, resource: &str, token: &Token) -> CoapResult<()> {
        let mut request = self.observe_request(resource, OBSERVE_DEREGISTER);
        request.message_mut().token = token.clone();

        let response = self.send(request).await?;
        if !response.code().is_success() {
            return Err(CoapError::ObserveRejected(response.code()));
        }
        self.demux().unsubscribe(token);
        info!("cancelled observation of {}", resource);
        Ok(())
    }

    /// Deliver notifications to `sender` until stopped.
    pub fn observe(&self, sender: NotificationSender) -> CoapResult<()> {
        self.ensure_usable()?;
        self.demux().attach(sender)
    }

    /// Stop delivering notifications, close the channel and the connection,
    /// and release the socket.
    ///
    /// Fails with [`CoapError::ObserveStopped`] if no channel is attached,
    /// including on a second call.
    pub async fn stop_observe(&self) -> CoapResult<()> {
        let Some(sink) = self.demux().detach() else {
            return Err(CoapError::ObserveStopped);
        };
        self.demux().state().close();
        drop(sink);
        self.release().await;
        info!("observe stopped");
        Ok(())
    }

    fn observe_request(&self, resource: &str, observe: u32) -> Request {
        let media_type = self.config().observe_media_type;
        let mut request = Request::new(MessageType::Confirmable, Method::Get).with_uri_path(resource);
        let message = request.message_mut();
        message.add_uint_option(numbers::OBSERVE, observe);
        message.set_content_format(media_type);
        message.set_accept(media_type);
        request
    }
}
