//! Request/response correlation over the transport's reply channel.
//!
//! The GC protocol has no request ids for most messages. The transport
//! already ties a reply to the send it answers, so a request here is a send
//! plus a one-shot continuation that decodes the reply and calls back once.
//! No timeout is imposed; wrap [`ReplyReceiver::recv`] in
//! `tokio::time::timeout` when one is needed.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::codec::{DecodeError, decode_protobuf};
use crate::error::RequestError;
use crate::messages::ProtoHeader;
use crate::transport::{ReplyFn, Transport};

type DecodeFn<T> = Box<dyn FnOnce(Vec<u8>) -> Result<T, DecodeError> + Send>;
type CallbackFn<T> = Box<dyn FnOnce(Result<T, RequestError>) + Send>;

/// A decode step and the callback waiting for its result.
///
/// Lives exactly as long as one reply round trip; it is moved into the
/// transport's continuation and consumed when that fires.
pub struct PendingCallback<T> {
    decode: DecodeFn<T>,
    callback: CallbackFn<T>,
}

impl PendingCallback<Vec<u8>> {
    /// Hand the raw reply payload to `callback`.
    pub fn raw<C>(callback: C) -> Self
    where
        C: FnOnce(Result<Vec<u8>, RequestError>) + Send + 'static,
    {
        Self {
            decode: Box::new(|payload: Vec<u8>| Ok::<_, DecodeError>(payload)),
            callback: Box::new(callback),
        }
    }
}

impl<T: 'static> PendingCallback<T> {
    /// Decode the reply with `decode` before handing it to `callback`.
    pub fn decoded<D, C>(decode: D, callback: C) -> Self
    where
        D: FnOnce(Vec<u8>) -> Result<T, DecodeError> + Send + 'static,
        C: FnOnce(Result<T, RequestError>) + Send + 'static,
    {
        Self {
            decode: Box::new(decode),
            callback: Box::new(callback),
        }
    }

    /// Fail without sending.
    pub(crate) fn fail(self, error: RequestError) {
        (self.callback)(Err(error));
    }

    /// Turn into the continuation handed to the transport.
    pub(crate) fn into_reply_fn(self) -> ReplyFn {
        Box::new(move |reply| {
            let result = (self.decode)(reply.payload).map_err(RequestError::from);
            if let Err(e) = &result {
                tracing::debug!(msg_type = reply.msg_type, "Reply decode failed: {e}");
            }
            (self.callback)(result);
        })
    }
}

impl<T: prost::Message + Default + 'static> PendingCallback<T> {
    /// Decode the reply as protobuf message `T`.
    pub fn protobuf<C>(callback: C) -> Self
    where
        C: FnOnce(Result<T, RequestError>) + Send + 'static,
    {
        Self::decoded(|payload: Vec<u8>| decode_protobuf(&payload), callback)
    }
}

// ---------------------------------------------------------------------------
// ReplyReceiver
// ---------------------------------------------------------------------------

/// Future-style handle to a request's reply.
pub struct ReplyReceiver<T> {
    rx: oneshot::Receiver<Result<T, RequestError>>,
}

impl<T: Send + 'static> ReplyReceiver<T> {
    /// A pending callback that completes the returned receiver.
    pub fn channel<D>(decode: D) -> (PendingCallback<T>, Self)
    where
        D: FnOnce(Vec<u8>) -> Result<T, DecodeError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let pending = PendingCallback::decoded(decode, move |result| {
            let _ = tx.send(result);
        });
        (pending, Self { rx })
    }

    /// Wait for the reply. [`RequestError::Disconnected`] if the transport
    /// dropped the continuation.
    pub async fn recv(self) -> Result<T, RequestError> {
        self.rx.await.unwrap_or(Err(RequestError::Disconnected))
    }
}

// ---------------------------------------------------------------------------
// GcSender
// ---------------------------------------------------------------------------

/// Outbound half of the client: stamps headers and forwards to the transport.
///
/// Readiness is checked by the caller; a sender itself never refuses.
#[derive(Clone)]
pub struct GcSender {
    transport: Arc<dyn Transport>,
    app_id: u32,
}

impl GcSender {
    /// Sender addressing the GC of `app_id`.
    pub fn new(transport: Arc<dyn Transport>, app_id: u32) -> Self {
        Self { transport, app_id }
    }

    /// The app this sender addresses.
    pub fn app_id(&self) -> u32 {
        self.app_id
    }

    /// The transport behind this sender.
    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Header for the next outbound message.
    pub fn header(&self) -> ProtoHeader {
        ProtoHeader {
            client_steam_id: self.transport.steam_id(),
            source_app_id: self.app_id,
        }
    }

    /// Send without readiness checks. Used for the hello handshake.
    pub(crate) fn send_raw(&self, msg_type: u32, payload: Vec<u8>, on_reply: Option<ReplyFn>) {
        let header = self.header();
        self.transport
            .send_raw(self.app_id, msg_type, &header, payload, on_reply);
    }

    /// Fire-and-forget send, gated on `ready`.
    pub(crate) fn send(
        &self,
        ready: bool,
        msg_type: u32,
        payload: Vec<u8>,
    ) -> Result<(), RequestError> {
        if !ready {
            tracing::warn!(msg_type, "GC not ready, wait for the Ready notification");
            return Err(RequestError::NotReady);
        }
        self.send_raw(msg_type, payload, None);
        Ok(())
    }

    /// Send with a reply continuation, gated on `ready`.
    ///
    /// When not ready the callback runs synchronously with
    /// [`RequestError::NotReady`] and nothing reaches the transport.
    pub(crate) fn request<T: 'static>(
        &self,
        ready: bool,
        msg_type: u32,
        payload: Vec<u8>,
        pending: PendingCallback<T>,
    ) -> Result<(), RequestError> {
        if !ready {
            tracing::warn!(msg_type, "GC not ready, wait for the Ready notification");
            pending.fail(RequestError::NotReady);
            return Err(RequestError::NotReady);
        }
        self.send_raw(msg_type, payload, Some(pending.into_reply_fn()));
        Ok(())
    }
}
