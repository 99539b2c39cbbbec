//! Notifications emitted by the client to whoever drives it.

use tokio::sync::mpsc;

/// Something observable happened on the GC session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The GC session is established; requests may be sent.
    Ready,
    /// The GC session was lost; the client is recovering it.
    Unready,
    /// A message arrived with no registered handler.
    Unhandled {
        /// Message type tag.
        msg_type: u32,
        /// Name resolved through the codec.
        name: String,
    },
    /// The hello threshold was exceeded without a welcome. Retries continue.
    HelloTimeout,
    /// A handler returned an error or panicked. The message was dropped.
    HandlerFailed {
        /// Message type tag.
        msg_type: u32,
        /// Name resolved through the codec.
        name: String,
        /// What went wrong.
        error: String,
    },
}

/// Receiving half of the notification stream.
pub type Notifications = mpsc::UnboundedReceiver<Notification>;

/// Sending half used by the client. Notifications sent after the receiver is
/// dropped are discarded.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationSink {
    /// Create a connected sink/receiver pair.
    pub fn channel() -> (Self, Notifications) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit a notification.
    pub fn emit(&self, notification: Notification) {
        tracing::trace!(?notification, "emit");
        let _ = self.tx.send(notification);
    }
}
