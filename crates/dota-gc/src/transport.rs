//! Transport shim contract: the authenticated Steam session the core rides on.
//!
//! The core never connects or logs in. It announces the running app, sends
//! raw GC messages, and consumes [`InboundMessage`]s that the host forwards
//! through the bounded channel from [`inbound_channel`].

use tokio::sync::mpsc;

use crate::messages::ProtoHeader;

/// A message received from the GC, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// App whose GC sent the message.
    pub app_id: u32,
    /// Message type tag.
    pub msg_type: u32,
    /// Encoded payload, opaque to the core.
    pub payload: Vec<u8>,
}

/// One-shot continuation invoked by the transport with the reply to a send.
pub type ReplyFn = Box<dyn FnOnce(InboundMessage) + Send>;

/// The Steam session operations the GC core depends on.
pub trait Transport: Send + Sync {
    /// SteamID64 of the logged-in user, `None` while logged off.
    fn steam_id(&self) -> Option<u64>;

    /// Tell Steam which apps are running. An empty slice stops all of them.
    fn announce_presence(&self, app_ids: &[u32]);

    /// Send a message to the GC of `app_id`.
    ///
    /// When `on_reply` is given the transport must call it at most once,
    /// with the reply it correlates to this send.
    fn send_raw(
        &self,
        app_id: u32,
        msg_type: u32,
        header: &ProtoHeader,
        payload: Vec<u8>,
        on_reply: Option<ReplyFn>,
    );
}

/// Create a channel pair for passing GC messages from the transport to the
/// client's event loop.
pub fn inbound_channel(
    buffer: usize,
) -> (mpsc::Sender<InboundMessage>, mpsc::Receiver<InboundMessage>) {
    mpsc::channel(buffer)
}
