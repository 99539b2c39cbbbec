//! Per-session state the domain handlers fill in.
//!
//! Entries hold shared objects in their encoded form; decoding them is the
//! owning handler's job. Everything here is cleared on every `launch`.

use std::collections::HashMap;

/// Domain caches for one GC session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCaches {
    /// Account id of the logged-in user, derived at launch.
    pub account_id: Option<u32>,
    /// Economy items (cosmetics, player cards, ...).
    pub inventory: Vec<Vec<u8>>,
    /// Joined chat channels, keyed by channel name.
    pub chat_channels: HashMap<String, Vec<u8>>,
    /// The lobby the bot is in.
    pub lobby: Option<Vec<u8>>,
    /// Pending lobby invitation.
    pub lobby_invite: Option<Vec<u8>>,
    /// The party the bot is in.
    pub party: Option<Vec<u8>>,
    /// Pending party invitation.
    pub party_invite: Option<Vec<u8>>,
}

impl SessionCaches {
    /// Drop all session data and record the account id for the new session.
    pub fn reset(&mut self, account_id: Option<u32>) {
        *self = Self {
            account_id,
            ..Self::default()
        };
    }
}
