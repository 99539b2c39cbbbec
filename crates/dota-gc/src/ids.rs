//! SteamID64 <-> account id conversion.

/// SteamID64 of account id 0 in the public universe (individual account).
pub const STEAM_ID_BASE: u64 = 76_561_197_960_265_728;

/// Account id of a SteamID64: its low 32 bits.
pub fn to_account_id(steam_id: u64) -> u32 {
    (steam_id & 0xFFFF_FFFF) as u32
}

/// SteamID64 of an individual account in the public universe.
pub fn to_steam_id(account_id: u32) -> u64 {
    STEAM_ID_BASE + u64::from(account_id)
}
