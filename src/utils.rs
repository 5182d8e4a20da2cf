//! Utility functions for the lobby notification service

use crate::types::LobbyId;
use chrono::{DateTime, Utc};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Derive the deterministic identity key for a lobby.
///
/// Uses the same 32-bit string hash over UTF-16 code units that historical
/// deployments persisted records under, so existing stored lobbies keep
/// their keys across upgrades.
pub fn lobby_key(name: &str, host: &str, map: &str) -> LobbyId {
    let joined = format!("{name}-{host}-{map}");
    let mut hash: i32 = 0;
    for unit in joined.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    hash as LobbyId
}

/// Normalize a raw map name from a feed: strip the archive file extension
/// and replace underscores with spaces.
pub fn normalize_map_name(raw: &str) -> String {
    let trimmed = raw
        .strip_suffix(".w3x")
        .or_else(|| raw.strip_suffix(".w3m"))
        .unwrap_or(raw);
    trimmed.replace('_', " ")
}

/// Case-insensitive substring containment
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
