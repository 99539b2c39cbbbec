//! Error types surfaced by the GC client.

use crate::codec::DecodeError;

/// Why a send or request did not produce a reply value.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// No GC session yet. Wait for [`crate::Notification::Ready`].
    #[error("GC session not ready")]
    NotReady,
    /// The reply arrived but could not be decoded.
    #[error("failed to decode reply: {0}")]
    Decode(#[from] DecodeError),
    /// The reply continuation was dropped without being called.
    #[error("reply channel closed before a reply arrived")]
    Disconnected,
}

/// Error returned by a registered handler.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload did not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Any other handler failure.
    #[error("{0}")]
    Failed(String),
}

/// Handler registration was refused.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The message type is handled by the session core.
    #[error("message type {0} is reserved for the session core")]
    Reserved(u32),
}
