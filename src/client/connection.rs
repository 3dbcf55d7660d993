//! The CoAP client connection.
//!
//! A [`Connection`] owns one connected UDP socket and one reader task. The
//! request path registers each confirmable exchange with the reader's
//! demultiplexer and waits on a oneshot for the routed reply. Closing the
//! connection stops the reader and releases the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info, warn};

use super::config::ClientConfig;
use crate::core::{CoapError, CoapResult, MessageExchange};
use crate::message::{Message, MessageType, Request, Response, encode};
use crate::transport::{
    CoapSocket, ConnectionPhase, Demux, ExchangeKind, NotificationReceiver, NotificationSender,
    RetransmitPolicy, notification_channel, run_reader, size_allowed_within, transfer,
};

/// A CoAP-over-UDP client connection.
///
/// # Example
///
/// ```ignore
/// use coap_link::client::{ClientConfig, Connection};
/// use coap_link::message::{MessageType, Method, Request};
///
/// let conn = Connection::connect(ClientConfig::default()).await?;
/// let request = Request::new(MessageType::Confirmable, Method::Get).with_uri_path("/sensors/temp");
/// let response = conn.send(request).await?;
/// println!("{}: {:?}", response.code(), response.payload());
/// conn.close().await?;
/// ```
#[derive(Debug)]
pub struct Connection {
    socket: Mutex<Option<CoapSocket>>,
    demux: Arc<Demux>,
    config: ClientConfig,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Bind to `config.bind_addr`, connect to `config.server_addr` and start
    /// the reader task.
    pub async fn connect(config: ClientConfig) -> CoapResult<Self> {
        let socket = CoapSocket::connect(config.bind_addr, config.server_addr).await?;
        info!(
            "connected {} -> {}",
            socket.local_addr()?,
            config.server_addr
        );
        Ok(Self::start(socket, config))
    }

    /// Use a socket that is already connected to its peer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_socket(socket: UdpSocket, config: ClientConfig) -> Self {
        Self::start(CoapSocket::from_socket(socket), config)
    }

    fn start(socket: CoapSocket, config: ClientConfig) -> Self {
        let demux = Arc::new(Demux::new());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let reader = tokio::spawn(run_reader(
            socket.clone(),
            demux.clone(),
            config.reader_buffer_size(),
            shutdown_rx,
        ));

        Self {
            socket: Mutex::new(Some(socket)),
            demux,
            config,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            reader: Mutex::new(Some(reader)),
        }
    }

    /// Get the local address.
    pub fn local_addr(&self) -> CoapResult<SocketAddr> {
        Ok(self.socket()?.local_addr()?)
    }

    /// Get the server address.
    pub fn peer_addr(&self) -> CoapResult<SocketAddr> {
        Ok(self.socket()?.peer_addr()?)
    }

    /// Connection configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.demux.state().phase()
    }

    /// Whether an observe subscription has been accepted.
    pub fn is_open(&self) -> bool {
        self.demux.state().is_open()
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.demux.state().is_closed()
    }

    /// Create a notification channel sized by the configuration.
    pub fn notification_channel(&self) -> (NotificationSender, NotificationReceiver) {
        notification_channel(self.config.notification_capacity)
    }

    /// Send a request.
    ///
    /// A request carrying a concrete Block1 value is sent block by block.
    /// Otherwise the encoded message must fit the configured size limit.
    pub async fn send(&self, request: Request) -> CoapResult<Response> {
        self.send_as(request, ExchangeKind::Request).await
    }

    pub(super) async fn send_as(&self, request: Request, kind: ExchangeKind) -> CoapResult<Response> {
        self.ensure_usable()?;
        let message = request.into_message();
        match message.block1()? {
            Some(Some(first)) => transfer(self, message, first).await,
            Some(None) | None => {
                self.check_size(&message)?;
                self.dispatch(message, kind).await
            }
        }
    }

    /// Send one fully formed message.
    ///
    /// - NonConfirmable: written on a detached task; returns at once with an
    ///   empty response carrying the message ID.
    /// - Acknowledgement: written, never waits for a reply.
    /// - Confirmable: retransmitted until a reply arrives or the exchange
    ///   deadline passes.
    /// - Reset: written once, then waits like a confirmable exchange.
    pub async fn send_message(&self, message: Message) -> CoapResult<Response> {
        self.dispatch(message, ExchangeKind::Request).await
    }

    /// [`send_message`](Self::send_message) for a possibly absent message.
    pub async fn send_message_opt(&self, message: Option<Message>) -> CoapResult<Response> {
        match message {
            Some(message) => self.send_message(message).await,
            None => Err(CoapError::NilMessage),
        }
    }

    /// Close the connection, stop the reader and release the socket.
    /// Idempotent.
    pub async fn close(&self) -> CoapResult<()> {
        if self.demux.state().close() != ConnectionPhase::Closed {
            debug!("closing connection");
        }
        self.release().await;
        Ok(())
    }

    pub(super) fn demux(&self) -> &Demux {
        &self.demux
    }

    pub(super) fn ensure_usable(&self) -> CoapResult<()> {
        if self.is_closed() {
            return Err(CoapError::ConnectionClosed);
        }
        Ok(())
    }

    /// Handle to the socket, unless the connection has been released.
    fn socket(&self) -> CoapResult<CoapSocket> {
        self.socket.lock().clone().ok_or(CoapError::ConnectionClosed)
    }

    /// Stop the reader, wait for it to exit, then drop the socket.
    ///
    /// The reader's exit fails every pending exchange. Request paths only
    /// hold a socket handle for the duration of one write.
    pub(super) async fn release(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        let handle = self.reader.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("reader task failed: {}", e);
            }
        }
        if self.socket.lock().take().is_some() {
            debug!("socket released");
        }
    }

    fn check_size(&self, message: &Message) -> CoapResult<()> {
        let limit = self.config.max_message_size;
        if size_allowed_within(message, limit) {
            return Ok(());
        }
        let size = encode(message)?.len();
        Err(CoapError::MessageTooLarge { size, limit })
    }

    async fn dispatch(&self, message: Message, kind: ExchangeKind) -> CoapResult<Response> {
        self.ensure_usable()?;
        let bytes = encode(&message)?;
        let message_id = message.message_id;

        match message.message_type {
            MessageType::NonConfirmable => {
                let socket = self.socket()?;
                tokio::spawn(async move {
                    if let Err(e) = socket.write(&bytes, None).await {
                        warn!("non-confirmable message {} not sent: {}", message_id, e);
                    }
                });
                Ok(Response::empty(message_id))
            }
            MessageType::Acknowledgement => {
                self.socket()?.write(&bytes, None).await?;
                Ok(Response::empty(message_id))
            }
            MessageType::Confirmable => {
                let policy = self.config.retransmit;
                self.round_trip(&message, &bytes, kind, policy).await
            }
            MessageType::Reset => {
                let policy = RetransmitPolicy::disabled();
                self.round_trip(&message, &bytes, kind, policy).await
            }
        }
    }

    /// A socket handle is taken per write and never held while waiting, so
    /// releasing the connection closes the socket even with exchanges parked.
    async fn round_trip(
        &self,
        message: &Message,
        bytes: &[u8],
        kind: ExchangeKind,
        policy: RetransmitPolicy,
    ) -> CoapResult<Response> {
        let message_id = message.message_id;
        let deadline = instant_after(self.config.exchange_timeout);
        let mut pending = self.demux.register(message_id, message.token.clone(), kind);
        let _guard = PendingGuard {
            demux: &self.demux,
            message_id,
        };

        self.socket()?.write(bytes, Some(deadline)).await?;
        let mut backoff = policy.start();

        loop {
            let retry = !pending.acked.load(Ordering::Acquire) && backoff.can_retransmit();
            let wait_until = if retry {
                instant_after(backoff.timeout()).min(deadline)
            } else {
                deadline
            };

            match timeout_at(wait_until, &mut pending.reply).await {
                Ok(Ok(reply)) if reply.message_type == MessageType::Reset => {
                    return Err(CoapError::Reset { message_id });
                }
                Ok(Ok(reply)) => return Ok(Response::new(reply)),
                Ok(Err(_)) => return Err(CoapError::ConnectionClosed),
                Err(_) if Instant::now() >= deadline => {
                    debug!("message {} timed out", message_id);
                    return Err(CoapError::Timeout);
                }
                Err(_) => {
                    if pending.acked.load(Ordering::Acquire) {
                        continue;
                    }
                    backoff.on_retransmit();
                    debug!(
                        "retransmitting message {} (attempt {})",
                        message_id,
                        backoff.attempts()
                    );
                    self.socket()?.write(bytes, Some(deadline)).await?;
                }
            }
        }
    }
}

impl MessageExchange for Connection {
    async fn send_message(&self, message: Message) -> CoapResult<Response> {
        self.dispatch(message, ExchangeKind::Request).await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Signal the reader; it releases its socket handle on exit
        if let Some(tx) = self.shutdown_tx.get_mut().take() {
            let _ = tx.send(());
        }
    }
}

/// `now + timeout`, saturating at roughly thirty years out.
fn instant_after(timeout: Duration) -> Instant {
    const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);
    let now = Instant::now();
    now.checked_add(timeout.min(FAR_FUTURE))
        .unwrap_or(now)
}

/// Removes a pending exchange when its waiter returns, however it returns.
struct PendingGuard<'a> {
    demux: &'a Demux,
    message_id: u16,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.demux.cancel(self.message_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{BlockValue, Code, Method, Token, decode, media_type};

    async fn setup(config: ClientConfig) -> (Connection, UdpSocket) {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = ClientConfig {
            server_addr: server.local_addr().unwrap(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..config
        };
        let conn = Connection::connect(config).await.unwrap();
        server.connect(conn.local_addr().unwrap()).await.unwrap();
        (conn, server)
    }

    async fn recv_message(server: &UdpSocket) -> Message {
        let mut buf = vec![0u8; 70000];
        let n = server.recv(&mut buf).await.unwrap();
        decode(&buf[..n]).unwrap()
    }

    fn piggybacked(request: &Message, code: Code, payload: &[u8]) -> Vec<u8> {
        let mut reply = Message::new(MessageType::Acknowledgement, code, request.message_id);
        reply.token = request.token.clone();
        reply.payload = payload.to_vec();
        encode(&reply).unwrap()
    }

    fn get(path: &str) -> Request {
        Request::new(MessageType::Confirmable, Method::Get).with_uri_path(path)
    }

    #[tokio::test]
    async fn test_confirmable_round_trip() {
        let (conn, server) = setup(ClientConfig::default()).await;

        let responder = tokio::spawn(async move {
            let request = recv_message(&server).await;
            assert_eq!(request.uri_path(), "/sensors/temp");
            server
                .send(&piggybacked(&request, Code::CONTENT, b"{\"v\":21}"))
                .await
                .unwrap();
            request
        });

        let request = get("/sensors/temp");
        let token = request.message().token.clone();
        let response = conn.send(request).await.unwrap();
        let seen = responder.await.unwrap();

        assert_eq!(response.code(), Code::CONTENT);
        assert_eq!(response.payload(), b"{\"v\":21}");
        assert_eq!(response.token(), &token);
        assert_eq!(response.message_id(), seen.message_id);
    }

    #[tokio::test]
    async fn test_non_confirmable_returns_immediately() {
        let (conn, server) = setup(ClientConfig::default()).await;

        let request = Request::new(MessageType::NonConfirmable, Method::Post)
            .with_uri_path("/log")
            .with_payload(b"hello".to_vec(), media_type::TEXT_PLAIN);
        let id = request.message().message_id;

        let response = conn.send(request).await.unwrap();
        assert!(response.is_empty());
        assert_eq!(response.message_id(), id);

        // The detached write still reaches the server
        let received = recv_message(&server).await;
        assert_eq!(received.message_id, id);
        assert_eq!(received.payload, b"hello");
    }

    #[tokio::test]
    async fn test_acknowledgement_does_not_wait() {
        let (conn, server) = setup(ClientConfig::default()).await;

        let response = tokio::time::timeout(
            Duration::from_secs(1),
            conn.send_message(Message::empty_ack(4242)),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(response.is_empty());
        assert_eq!(response.message_id(), 4242);

        let received = recv_message(&server).await;
        assert_eq!(received.message_type, MessageType::Acknowledgement);
        assert_eq!(received.message_id, 4242);
    }

    #[tokio::test]
    async fn test_confirmable_timeout() {
        let config = ClientConfig {
            exchange_timeout: Duration::from_millis(200),
            ..ClientConfig::default()
        };
        let (conn, _server) = setup(config).await;

        let started = std::time::Instant::now();
        let err = conn.send(get("/silent")).await.unwrap_err();
        assert!(matches!(err, CoapError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(conn.demux().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_confirmable_retransmission() {
        let config = ClientConfig {
            exchange_timeout: Duration::from_secs(3),
            retransmit: RetransmitPolicy {
                ack_timeout: Duration::from_millis(50),
                ack_random_factor: 1.0,
                ..RetransmitPolicy::default()
            },
            ..ClientConfig::default()
        };
        let (conn, server) = setup(config).await;

        let responder = tokio::spawn(async move {
            let first = recv_message(&server).await;
            let second = recv_message(&server).await;
            server
                .send(&piggybacked(&second, Code::CONTENT, b"late"))
                .await
                .unwrap();
            (first, second)
        });

        let response = conn.send(get("/flaky")).await.unwrap();
        let (first, second) = responder.await.unwrap();

        assert_eq!(response.payload(), b"late");
        assert_eq!(first.message_id, second.message_id);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_separate_response() {
        let (conn, server) = setup(ClientConfig::default()).await;

        let responder = tokio::spawn(async move {
            let request = recv_message(&server).await;
            server
                .send(&encode(&Message::empty_ack(request.message_id)).unwrap())
                .await
                .unwrap();

            let mut response = Message::new(MessageType::Confirmable, Code::CONTENT, 777);
            response.token = request.token.clone();
            response.payload = b"done".to_vec();
            server.send(&encode(&response).unwrap()).await.unwrap();

            // Client acknowledges the separate response
            recv_message(&server).await
        });

        let response = conn.send(get("/slow")).await.unwrap();
        assert_eq!(response.payload(), b"done");
        assert_eq!(response.message_id(), 777);

        let ack = responder.await.unwrap();
        assert_eq!(ack.message_type, MessageType::Acknowledgement);
        assert_eq!(ack.message_id, 777);
        assert!(ack.is_empty());
    }

    #[tokio::test]
    async fn test_reset_reply() {
        let (conn, server) = setup(ClientConfig::default()).await;

        tokio::spawn(async move {
            let request = recv_message(&server).await;
            server
                .send(&encode(&Message::reset(request.message_id)).unwrap())
                .await
                .unwrap();
        });

        let request = get("/nope");
        let id = request.message().message_id;
        let err = conn.send(request).await.unwrap_err();
        assert!(matches!(err, CoapError::Reset { message_id } if message_id == id));
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let (conn, _server) = setup(ClientConfig::default()).await;

        let request = Request::new(MessageType::Confirmable, Method::Put)
            .with_uri_path("/firmware")
            .with_payload(vec![0u8; 70000], media_type::OCTET_STREAM);
        let err = conn.send(request).await.unwrap_err();
        assert!(matches!(
            err,
            CoapError::MessageTooLarge { size, limit: 65536 } if size > 70000
        ));
    }

    #[tokio::test]
    async fn test_block_transfer_over_udp() {
        let (conn, server) = setup(ClientConfig::default()).await;
        let payload: Vec<u8> = (0..200u32).map(|i| (i % 251) as u8).collect();

        let responder = tokio::spawn(async move {
            let mut assembled = Vec::new();
            loop {
                let request = recv_message(&server).await;
                let block = request.block1().unwrap().unwrap().unwrap();
                assert_eq!(block.offset(), assembled.len());
                assembled.extend_from_slice(&request.payload);
                let code = if block.more { Code::CONTINUE } else { Code::CHANGED };
                server.send(&piggybacked(&request, code, b"")).await.unwrap();
                if !block.more {
                    return assembled;
                }
            }
        });

        let mut request = Request::new(MessageType::Confirmable, Method::Put)
            .with_uri_path("/firmware")
            .with_payload(payload.clone(), media_type::OCTET_STREAM);
        request
            .message_mut()
            .set_block1(BlockValue::new(0, false, 2).unwrap()); // 64-byte blocks

        let response = conn.send(request).await.unwrap();
        assert_eq!(response.code(), Code::CHANGED);
        assert_eq!(responder.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_nil_message() {
        let (conn, _server) = setup(ClientConfig::default()).await;
        let err = conn.send_message_opt(None).await.unwrap_err();
        assert!(matches!(err, CoapError::NilMessage));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (conn, _server) = setup(ClientConfig::default()).await;
        assert_eq!(conn.phase(), ConnectionPhase::Ready);

        conn.close().await.unwrap();
        conn.close().await.unwrap();
        assert!(conn.is_closed());

        let err = conn.send(get("/after-close")).await.unwrap_err();
        assert!(matches!(err, CoapError::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_close_releases_socket() {
        let (conn, _server) = setup(ClientConfig::default()).await;
        let conn = Arc::new(conn);
        let local = conn.local_addr().unwrap();

        // An exchange parked on a silent server
        let parked = {
            let conn = conn.clone();
            tokio::spawn(async move { conn.send(get("/silent")).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        conn.close().await.unwrap();
        let err = parked.await.unwrap().unwrap_err();
        assert!(matches!(err, CoapError::ConnectionClosed));
        assert!(matches!(conn.local_addr(), Err(CoapError::ConnectionClosed)));

        let rebound = UdpSocket::bind(local).await;
        assert!(rebound.is_ok(), "port still bound after close: {:?}", rebound.err());
    }

    #[tokio::test]
    async fn test_huge_timeouts_do_not_overflow() {
        let config = ClientConfig {
            exchange_timeout: Duration::MAX,
            retransmit: RetransmitPolicy {
                ack_timeout: Duration::MAX,
                ..RetransmitPolicy::default()
            },
            ..ClientConfig::default()
        };
        let (conn, server) = setup(config).await;

        tokio::spawn(async move {
            let request = recv_message(&server).await;
            server
                .send(&piggybacked(&request, Code::CONTENT, b"ok"))
                .await
                .unwrap();
        });

        let response = conn.send(get("/sensors/temp")).await.unwrap();
        assert_eq!(response.payload(), b"ok");
    }

    #[test]
    fn test_instant_after_saturates() {
        let now = Instant::now();
        assert!(instant_after(Duration::MAX) > now + Duration::from_secs(86400 * 365));
        assert!(instant_after(Duration::ZERO) >= now);
    }

    #[tokio::test]
    async fn test_from_socket() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.connect(server.local_addr().unwrap()).await.unwrap();
        server.connect(socket.local_addr().unwrap()).await.unwrap();

        let conn = Connection::from_socket(socket, ClientConfig::default());
        assert_eq!(conn.peer_addr().unwrap(), server.local_addr().unwrap());

        let message = Message::new(MessageType::NonConfirmable, Code::GET, 9);
        conn.send_message(message).await.unwrap();
        let received = recv_message(&server).await;
        assert_eq!(received.message_id, 9);
        assert_eq!(received.token, Token::empty());
    }
}
