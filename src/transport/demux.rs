//! Inbound datagram demultiplexing.
//!
//! One reader task owns the receive side of the socket. Each decoded message
//! is routed, in order:
//!
//! 1. ACK/RST by message ID to a pending exchange. An empty ACK only marks
//!    the exchange acknowledged, the response follows separately.
//! 2. By token to a pending exchange (separate response).
//! 3. Messages carrying Observe to the notification channel, while the
//!    connection is open.
//! 4. Anything else is dropped.
//!
//! Confirmable messages are acknowledged with an empty ACK.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, error, trace, warn};

use super::connection::ConnectionState;
use super::notification::{DeliveryError, Notification, NotificationSender};
use super::socket::DatagramIo;
use crate::core::{CoapError, CoapResult};
use crate::message::{Message, MessageType, Token, decode, encode, numbers};

/// What a pending exchange is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeKind {
    /// An ordinary request.
    Request,
    /// An observe registration for `resource`. A success reply records the
    /// subscription and opens the connection.
    Register {
        /// Path of the observed resource.
        resource: String,
    },
}

#[derive(Debug)]
struct PendingExchange {
    token: Token,
    kind: ExchangeKind,
    acked: Arc<AtomicBool>,
    reply: oneshot::Sender<Message>,
}

/// Handle held by the request path while it waits for a reply.
#[derive(Debug)]
pub struct PendingReply {
    /// Resolves with the reply, or fails once the reader stops.
    pub reply: oneshot::Receiver<Message>,
    /// Set once an empty ACK has been received for the exchange.
    pub acked: Arc<AtomicBool>,
}

/// Outcome of routing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Delivered to a waiting exchange.
    Reply,
    /// Empty ACK recorded against a waiting exchange.
    Acknowledged,
    /// Delivered to the notification channel.
    Notified,
    /// A notification that could not be delivered.
    Dropped,
    /// Matched nothing.
    Unmatched,
}

/// Shared routing tables and connection state.
#[derive(Debug, Default)]
pub struct Demux {
    state: ConnectionState,
    pending: Mutex<HashMap<u16, PendingExchange>>,
    subscriptions: Mutex<HashMap<Token, String>>,
    sink: Mutex<Option<NotificationSender>>,
}

impl Demux {
    /// Create empty tables in the `Ready` phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connection state.
    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    /// Register a waiting exchange keyed by its message ID.
    pub fn register(&self, message_id: u16, token: Token, kind: ExchangeKind) -> PendingReply {
        let (tx, rx) = oneshot::channel();
        let acked = Arc::new(AtomicBool::new(false));
        let previous = self.pending.lock().insert(
            message_id,
            PendingExchange {
                token,
                kind,
                acked: acked.clone(),
                reply: tx,
            },
        );
        if previous.is_some() {
            warn!("message ID {} reused while an exchange was pending", message_id);
        }
        PendingReply { reply: rx, acked }
    }

    /// Forget a waiting exchange.
    pub fn cancel(&self, message_id: u16) {
        self.pending.lock().remove(&message_id);
    }

    /// Number of exchanges waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Resource recorded for an accepted subscription.
    pub fn subscription(&self, token: &Token) -> Option<String> {
        self.subscriptions.lock().get(token).cloned()
    }

    /// Forget an accepted subscription, returning its resource.
    pub fn unsubscribe(&self, token: &Token) -> Option<String> {
        self.subscriptions.lock().remove(token)
    }

    /// Install the notification sink.
    pub fn attach(&self, sender: NotificationSender) -> CoapResult<()> {
        if self.state.is_closed() {
            return Err(CoapError::ConnectionClosed);
        }
        let mut sink = self.sink.lock();
        if sink.is_some() {
            return Err(CoapError::ObserveAlreadyRunning);
        }
        *sink = Some(sender);
        Ok(())
    }

    /// Remove the notification sink, returning it if one was installed.
    pub fn detach(&self) -> Option<NotificationSender> {
        self.sink.lock().take()
    }

    /// Close the connection state, drop the sink and fail every waiter.
    pub fn shutdown(&self) {
        self.state.close();
        drop(self.detach());
        let pending = std::mem::take(&mut *self.pending.lock());
        if !pending.is_empty() {
            debug!("failing {} pending exchanges", pending.len());
        }
    }

    /// Route one inbound message.
    pub fn route(&self, message: Message) -> Disposition {
        if matches!(
            message.message_type,
            MessageType::Acknowledgement | MessageType::Reset
        ) {
            let mut pending = self.pending.lock();
            if let Entry::Occupied(entry) = pending.entry(message.message_id) {
                if message.message_type == MessageType::Acknowledgement && message.is_empty() {
                    entry.get().acked.store(true, Ordering::Release);
                    trace!("message {} acknowledged", message.message_id);
                    return Disposition::Acknowledged;
                }
                let exchange = entry.remove();
                drop(pending);
                self.complete(exchange, message);
                return Disposition::Reply;
            }
        }

        if !message.is_empty() {
            // A notification for a live subscription only answers a registration
            let notification = message.has_option(numbers::OBSERVE)
                && self.subscriptions.lock().contains_key(&message.token);
            let matched = {
                let mut pending = self.pending.lock();
                let id = pending
                    .iter()
                    .find(|(_, exchange)| {
                        exchange.token == message.token
                            && (!notification
                                || matches!(exchange.kind, ExchangeKind::Register { .. }))
                    })
                    .map(|(id, _)| *id);
                id.and_then(|id| pending.remove(&id))
            };
            if let Some(exchange) = matched {
                self.complete(exchange, message);
                return Disposition::Reply;
            }
        }

        if message.has_option(numbers::OBSERVE) {
            return self.notify(message);
        }

        debug!(
            "dropping unmatched {:?} message {} ({})",
            message.message_type, message.message_id, message.code
        );
        Disposition::Unmatched
    }

    fn complete(&self, exchange: PendingExchange, message: Message) {
        if let ExchangeKind::Register { resource } = exchange.kind {
            if message.code.is_success() {
                debug!("subscription to {} accepted ({})", resource, message.code);
                self.subscriptions
                    .lock()
                    .insert(message.token.clone(), resource);
                self.state.mark_open();
            }
        }
        if exchange.reply.send(message).is_err() {
            trace!("reply arrived after its exchange gave up");
        }
    }

    fn notify(&self, message: Message) -> Disposition {
        if !self.state.is_open() {
            debug!("dropping notification, no open subscription");
            return Disposition::Dropped;
        }
        let resource = self
            .subscription(&message.token)
            .unwrap_or_else(|| message.uri_path());

        let sink = self.sink.lock();
        let Some(sender) = sink.as_ref() else {
            debug!("dropping notification for {}, no observe channel", resource);
            return Disposition::Dropped;
        };
        match sender.try_deliver(Notification::new(resource, message)) {
            Ok(()) => Disposition::Notified,
            Err(DeliveryError::Full) => {
                warn!("notification channel full, dropping notification");
                Disposition::Dropped
            }
            Err(DeliveryError::Closed) => {
                debug!("notification receiver dropped");
                Disposition::Dropped
            }
        }
    }
}

fn is_recoverable(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

/// Reader loop. Runs until `shutdown` fires (or its sender is dropped) or
/// the socket fails, then shuts the demultiplexer down: the connection is
/// closed, the notification channel is closed and every waiter fails.
pub async fn run_reader<S: DatagramIo>(
    socket: S,
    demux: Arc<Demux>,
    buffer_size: usize,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut buf = vec![0u8; buffer_size];
    loop {
        let len = tokio::select! {
            _ = &mut shutdown => {
                debug!("reader shutting down");
                break;
            }
            result = socket.recv_datagram(&mut buf) => match result {
                Ok(len) => len,
                Err(e) if is_recoverable(&e) => {
                    warn!("recoverable read error: {}", e);
                    continue;
                }
                Err(e) => {
                    error!("read failed, closing connection: {}", e);
                    break;
                }
            },
        };

        let message = match decode(&buf[..len]) {
            Ok(message) => message,
            Err(e) => {
                warn!("dropping undecodable datagram ({} bytes): {}", len, e);
                continue;
            }
        };
        trace!(
            "received {:?} {} id={} token={}",
            message.message_type, message.code, message.message_id, message.token
        );

        let ack_id = (message.message_type == MessageType::Confirmable).then_some(message.message_id);
        let disposition = demux.route(message);
        trace!("routed: {:?}", disposition);

        if let Some(id) = ack_id {
            match encode(&Message::empty_ack(id)) {
                Ok(bytes) => {
                    if let Err(e) = socket.send_datagram(&bytes).await {
                        warn!("failed to acknowledge message {}: {}", id, e);
                    }
                }
                Err(e) => warn!("failed to encode acknowledgement: {}", e),
            }
        }
    }
    demux.shutdown();
}
