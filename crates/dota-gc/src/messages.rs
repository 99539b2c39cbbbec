//! Well-known GC message types and the base protobuf messages.
//!
//! The core only needs to understand three messages: the hello it sends, the
//! welcome that acknowledges it, and the connection-status push. Everything
//! else is an opaque `(msg_type, payload)` pair for the domain handlers.

/// Steam app id of Dota 2.
pub const DOTA_APP_ID: u32 = 570;

// ---------------------------------------------------------------------------
// EGCBaseClientMsg
// ---------------------------------------------------------------------------

/// `k_EMsgGCClientWelcome`: GC acknowledges a hello, carrying initial caches.
pub const K_EMSG_GC_CLIENT_WELCOME: u32 = 4004;
/// `k_EMsgGCServerWelcome`.
pub const K_EMSG_GC_SERVER_WELCOME: u32 = 4005;
/// `k_EMsgGCClientHello`: the handshake that requests a GC session.
pub const K_EMSG_GC_CLIENT_HELLO: u32 = 4006;
/// `k_EMsgGCServerHello`.
pub const K_EMSG_GC_SERVER_HELLO: u32 = 4007;
/// `k_EMsgGCClientConnectionStatus`: unsolicited session-health push.
pub const K_EMSG_GC_CLIENT_CONNECTION_STATUS: u32 = 4009;
/// `k_EMsgGCServerConnectionStatus`.
pub const K_EMSG_GC_SERVER_CONNECTION_STATUS: u32 = 4010;

/// Message types handled by the session core itself.
pub const RESERVED_MESSAGE_TYPES: [u32; 2] =
    [K_EMSG_GC_CLIENT_WELCOME, K_EMSG_GC_CLIENT_CONNECTION_STATUS];

/// Whether `msg_type` is owned by the session core.
pub fn is_reserved(msg_type: u32) -> bool {
    RESERVED_MESSAGE_TYPES.contains(&msg_type)
}

// ---------------------------------------------------------------------------
// GCConnectionStatus
// ---------------------------------------------------------------------------

/// Session health reported by the GC in a connection-status push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// The client has a live GC session.
    HaveSession,
    /// The GC is shutting down.
    GcGoingDown,
    /// No session; a hello is needed.
    NoSession,
    /// No session yet, queued for logon.
    NoSessionInLogonQueue,
    /// Steam itself is unavailable.
    NoSteam,
    /// Session suspended by the GC.
    Suspended,
    /// Steam is shutting down.
    SteamGoingDown,
    /// A value this client does not know.
    Unknown(i32),
}

impl ConnectionStatus {
    /// Map the wire value of `GCConnectionStatus`.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::HaveSession,
            1 => Self::GcGoingDown,
            2 => Self::NoSession,
            3 => Self::NoSessionInLogonQueue,
            4 => Self::NoSteam,
            5 => Self::Suspended,
            6 => Self::SteamGoingDown,
            other => Self::Unknown(other),
        }
    }

    /// Wire value of this status.
    pub fn as_i32(self) -> i32 {
        match self {
            Self::HaveSession => 0,
            Self::GcGoingDown => 1,
            Self::NoSession => 2,
            Self::NoSessionInLogonQueue => 3,
            Self::NoSteam => 4,
            Self::Suspended => 5,
            Self::SteamGoingDown => 6,
            Self::Unknown(other) => other,
        }
    }

    /// Protocol name, for logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::HaveSession => "GCConnectionStatus_HAVE_SESSION",
            Self::GcGoingDown => "GCConnectionStatus_GC_GOING_DOWN",
            Self::NoSession => "GCConnectionStatus_NO_SESSION",
            Self::NoSessionInLogonQueue => "GCConnectionStatus_NO_SESSION_IN_LOGON_QUEUE",
            Self::NoSteam => "GCConnectionStatus_NO_STEAM",
            Self::Suspended => "GCConnectionStatus_SUSPENDED",
            Self::SteamGoingDown => "GCConnectionStatus_STEAM_GOING_DOWN",
            Self::Unknown(_) => "GCConnectionStatus_UNKNOWN",
        }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Protobuf header fields attached to every outbound GC message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtoHeader {
    /// SteamID64 of the logged-in user, if the transport has one.
    pub client_steam_id: Option<u64>,
    /// App the message is addressed to.
    pub source_app_id: u32,
}

// ---------------------------------------------------------------------------
// Protobuf payloads
// ---------------------------------------------------------------------------

/// `CMsgClientHello`. Sent empty by default.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CMsgClientHello {
    /// Client protocol version.
    #[prost(uint32, optional, tag = "1")]
    pub version: Option<u32>,
    /// Session kind the client is asking for.
    #[prost(uint32, optional, tag = "3")]
    pub client_session_need: Option<u32>,
}

/// `CMsgConnectionStatus`.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CMsgConnectionStatus {
    /// `GCConnectionStatus` wire value. Absent means `HAVE_SESSION`.
    #[prost(int32, optional, tag = "1")]
    pub status: Option<i32>,
    #[prost(uint32, optional, tag = "2")]
    pub client_session_need: Option<u32>,
    #[prost(int32, optional, tag = "3")]
    pub queue_position: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub queue_size: Option<i32>,
    #[prost(int32, optional, tag = "5")]
    pub wait_seconds: Option<i32>,
    #[prost(int32, optional, tag = "6")]
    pub estimated_wait_seconds_remaining: Option<i32>,
}

impl CMsgConnectionStatus {
    /// The decoded status, applying the proto2 default.
    pub fn connection_status(&self) -> ConnectionStatus {
        ConnectionStatus::from_i32(self.status.unwrap_or(0))
    }
}
