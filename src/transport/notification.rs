//! Observe notification delivery channel.

use tokio::sync::mpsc;

use crate::message::Message;

/// A notification received for an observed resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Path of the observed resource.
    pub resource: String,
    /// Notification payload.
    pub payload: Vec<u8>,
    /// The full decoded message.
    pub message: Message,
}

impl Notification {
    /// Build a notification for `resource` from a decoded message.
    pub fn new(resource: impl Into<String>, message: Message) -> Self {
        Self {
            resource: resource.into(),
            payload: message.payload.clone(),
            message,
        }
    }

    /// Observe sequence number, if present.
    pub fn sequence(&self) -> Option<u32> {
        self.message.observe()
    }
}

/// Create a bounded notification channel.
pub fn notification_channel(capacity: usize) -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (NotificationSender { tx }, NotificationReceiver { rx })
}

/// Producing half, handed to the connection.
///
/// Not `Clone`: once the connection drops it, the channel is closed.
#[derive(Debug)]
pub struct NotificationSender {
    tx: mpsc::Sender<Notification>,
}

/// Why a notification could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The channel is at capacity.
    Full,
    /// The receiver was dropped.
    Closed,
}

impl NotificationSender {
    /// Deliver without waiting.
    pub fn try_deliver(&self, notification: Notification) -> Result<(), DeliveryError> {
        self.tx.try_send(notification).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// Whether the receiver has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consuming half, held by the application.
#[derive(Debug)]
pub struct NotificationReceiver {
    rx: mpsc::Receiver<Notification>,
}

impl NotificationReceiver {
    /// Wait for the next notification.
    ///
    /// Returns `None` once the connection has stopped delivering and every
    /// buffered notification has been received.
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Take a buffered notification, if any.
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Stop accepting notifications. Buffered ones can still be received.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
