//! Codec registry contract: message names and the base message codecs.
//!
//! The core never interprets domain payloads. It needs a name for every
//! message type (for logs and unhandled reports), the connection-status
//! decoder, and the hello encoder. [`BaseCodec`] provides those with prost
//! and accepts additional game-specific names.

use std::borrow::Cow;
use std::collections::HashMap;

use prost::Message;

use crate::messages::{
    CMsgClientHello, CMsgConnectionStatus, ConnectionStatus, K_EMSG_GC_CLIENT_CONNECTION_STATUS,
    K_EMSG_GC_CLIENT_HELLO, K_EMSG_GC_CLIENT_WELCOME, K_EMSG_GC_SERVER_CONNECTION_STATUS,
    K_EMSG_GC_SERVER_HELLO, K_EMSG_GC_SERVER_WELCOME,
};

/// A payload could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The bytes are not a valid protobuf message of the expected type.
    #[error("protobuf decode failed: {0}")]
    Protobuf(#[from] prost::DecodeError),
    /// The bytes decoded but the content is unusable.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Encode/decode capability consumed by the session core.
pub trait Codec: Send + Sync {
    /// Human-readable name of `msg_type`, if known.
    fn message_name(&self, msg_type: u32) -> Option<Cow<'_, str>>;

    /// Decode the status field of a connection-status push.
    fn decode_connection_status(&self, payload: &[u8]) -> Result<ConnectionStatus, DecodeError>;

    /// Encode the hello handshake payload.
    fn encode_hello(&self) -> Vec<u8>;
}

/// Name of `msg_type` for diagnostics, `Unknown(<n>)` when the codec has none.
pub fn display_name(codec: &dyn Codec, msg_type: u32) -> String {
    codec
        .message_name(msg_type)
        .map(Cow::into_owned)
        .unwrap_or_else(|| format!("Unknown({msg_type})"))
}

/// Decode any prost message, mapping the error into [`DecodeError`].
pub fn decode_protobuf<M: Message + Default>(payload: &[u8]) -> Result<M, DecodeError> {
    Ok(M::decode(payload)?)
}

// ---------------------------------------------------------------------------
// BaseCodec
// ---------------------------------------------------------------------------

/// Codec for the `EGCBaseClientMsg` messages plus a caller-supplied name table.
pub struct BaseCodec {
    names: HashMap<u32, String>,
    hello: CMsgClientHello,
}

impl BaseCodec {
    /// A codec knowing only the base message names.
    pub fn new() -> Self {
        let names = [
            (K_EMSG_GC_CLIENT_WELCOME, "k_EMsgGCClientWelcome"),
            (K_EMSG_GC_SERVER_WELCOME, "k_EMsgGCServerWelcome"),
            (K_EMSG_GC_CLIENT_HELLO, "k_EMsgGCClientHello"),
            (K_EMSG_GC_SERVER_HELLO, "k_EMsgGCServerHello"),
            (K_EMSG_GC_CLIENT_CONNECTION_STATUS, "k_EMsgGCClientConnectionStatus"),
            (K_EMSG_GC_SERVER_CONNECTION_STATUS, "k_EMsgGCServerConnectionStatus"),
        ]
        .into_iter()
        .map(|(id, name)| (id, name.to_string()))
        .collect();

        Self {
            names,
            hello: CMsgClientHello::default(),
        }
    }

    /// Add game-specific names. Later entries replace earlier ones.
    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        self.names
            .extend(names.into_iter().map(|(id, name)| (id, name.into())));
        self
    }

    /// Use a non-empty hello (e.g. with a client version).
    pub fn with_hello(mut self, hello: CMsgClientHello) -> Self {
        self.hello = hello;
        self
    }
}

impl Default for BaseCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for BaseCodec {
    fn message_name(&self, msg_type: u32) -> Option<Cow<'_, str>> {
        self.names.get(&msg_type).map(|name| Cow::Borrowed(name.as_str()))
    }

    fn decode_connection_status(&self, payload: &[u8]) -> Result<ConnectionStatus, DecodeError> {
        let msg: CMsgConnectionStatus = decode_protobuf(payload)?;
        Ok(msg.connection_status())
    }

    fn encode_hello(&self) -> Vec<u8> {
        self.hello.encode_to_vec()
    }
}
