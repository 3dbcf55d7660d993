//! Connection configuration and builder.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::core::{
    CoapResult, EXCHANGE_TIMEOUT, MAX_MESSAGE_SIZE, MAX_PACKET_SIZE,
    NOTIFICATION_CHANNEL_CAPACITY, RECV_BUFFER_SIZE,
};
use crate::message::media_type;
use crate::transport::RetransmitPolicy;

use super::Connection;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address to connect to.
    pub server_addr: SocketAddr,

    /// Local address to bind. Port 0 picks an ephemeral port.
    pub bind_addr: SocketAddr,

    /// Deadline for one confirmable exchange, retransmissions included.
    pub exchange_timeout: Duration,

    /// Confirmable retransmission policy.
    pub retransmit: RetransmitPolicy,

    /// Largest encoded message accepted for sending without a Block1 option.
    pub max_message_size: usize,

    /// Receive buffer size for ordinary replies.
    pub recv_buffer_size: usize,

    /// Largest datagram accepted while notifications are delivered.
    pub max_packet_size: usize,

    /// Content-Format and Accept sent with observe registrations.
    pub observe_media_type: u16,

    /// Capacity of channels created by [`Connection::notification_channel`].
    pub notification_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 5683)),
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            exchange_timeout: EXCHANGE_TIMEOUT,
            retransmit: RetransmitPolicy::default(),
            max_message_size: MAX_MESSAGE_SIZE,
            recv_buffer_size: RECV_BUFFER_SIZE,
            max_packet_size: MAX_PACKET_SIZE,
            observe_media_type: media_type::LWM2M_JSON,
            notification_capacity: NOTIFICATION_CHANNEL_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Size of the reader task's receive buffer.
    ///
    /// A single reader serves both replies and notifications, so it sizes for
    /// the larger of the two.
    pub fn reader_buffer_size(&self) -> usize {
        self.recv_buffer_size.max(self.max_packet_size)
    }
}

/// Builder for creating a [`Connection`].
#[derive(Debug)]
pub struct ConnectionBuilder {
    config: ClientConfig,
}

impl ConnectionBuilder {
    /// Create a new connection builder.
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the server address.
    pub fn server_addr(mut self, addr: SocketAddr) -> Self {
        self.config.server_addr = addr;
        self
    }

    /// Set the local bind address.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    /// Set the exchange deadline.
    pub fn exchange_timeout(mut self, timeout: Duration) -> Self {
        self.config.exchange_timeout = timeout;
        self
    }

    /// Set the retransmission policy.
    pub fn retransmit(mut self, policy: RetransmitPolicy) -> Self {
        self.config.retransmit = policy;
        self
    }

    /// Set the maximum encoded message size.
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// Set the maximum datagram size accepted for notifications.
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// Set the media type used for observe registrations.
    pub fn observe_media_type(mut self, media_type: u16) -> Self {
        self.config.observe_media_type = media_type;
        self
    }

    /// Set the notification channel capacity.
    pub fn notification_capacity(mut self, capacity: usize) -> Self {
        self.config.notification_capacity = capacity;
        self
    }

    /// Build the client configuration.
    pub fn build(self) -> ClientConfig {
        self.config
    }

    /// Bind, connect and start the connection.
    pub async fn connect(self) -> CoapResult<Connection> {
        Connection::connect(self.config).await
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
