//! Dota 2 Game Coordinator client: session handshake, message routing and
//! request/response correlation over an authenticated Steam transport.

pub mod cache;
pub mod client;
pub mod codec;
pub mod correlator;
pub mod driver;
pub mod error;
pub mod ids;
pub mod messages;
pub mod notification;
pub mod routing;
pub mod session;
pub mod transport;

pub use cache::SessionCaches;
pub use client::GcClient;
pub use codec::{BaseCodec, Codec, DecodeError};
pub use correlator::{GcSender, PendingCallback, ReplyReceiver};
pub use driver::{DriverHandle, DriverStopped};
pub use error::{HandlerError, RegistryError, RequestError};
pub use ids::{to_account_id, to_steam_id};
pub use messages::{ConnectionStatus, DOTA_APP_ID, ProtoHeader};
pub use notification::{Notification, Notifications};
pub use routing::{GcHandler, HandlerContext, HandlerRegistry};
pub use session::{SessionState, SessionStateWatch, wait_ready};
pub use transport::{InboundMessage, ReplyFn, Transport, inbound_channel};

#[cfg(test)]
mod test_support;
