//! Typed ID wrappers for type safety across trackwave.
//!
//! Tracks are identified by the integer the metadata store assigns on insert,
//! listeners by their account name, and stream sessions by a random UUID.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Maximum length of a listener name.
pub const MAX_LISTENER_LEN: usize = 50;

/// Identifier of an ingested track, assigned by the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(i64);

impl TrackId {
    /// Raw database value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for TrackId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<TrackId> for i64 {
    fn from(id: TrackId) -> Self {
        id.0
    }
}

impl FromStr for TrackId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_input(format!("invalid track id: {s:?}")));
        }
        s.parse::<i64>()
            .map(Self)
            .map_err(|e| Error::invalid_input(format!("invalid track id {s:?}: {e}")))
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a listener (the account name of the person playing a track).
///
/// Only `[A-Za-z0-9_-]`, at most [`MAX_LISTENER_LEN`] characters. The name is
/// embedded in storage paths, so the restriction is enforced at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ListenerId(String);

impl ListenerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ListenerId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid_chars = s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if s.is_empty() || s.len() > MAX_LISTENER_LEN || !valid_chars {
            return Err(Error::invalid_input(format!("invalid listener name: {s:?}")));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ListenerId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ListenerId> for String {
    fn from(id: ListenerId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_parse() {
        assert_eq!("17".parse::<TrackId>().unwrap(), TrackId::from(17));
        assert!("".parse::<TrackId>().is_err());
        assert!("-3".parse::<TrackId>().is_err());
        assert!("12a".parse::<TrackId>().is_err());
        assert!("99999999999999999999999".parse::<TrackId>().is_err());
    }

    #[test]
    fn test_listener_id_validation() {
        assert!("dj_shadow-2".parse::<ListenerId>().is_ok());
        assert!("".parse::<ListenerId>().is_err());
        assert!("../etc".parse::<ListenerId>().is_err());
        assert!("with space".parse::<ListenerId>().is_err());
        assert!("a".repeat(MAX_LISTENER_LEN).parse::<ListenerId>().is_ok());
        assert!("a".repeat(MAX_LISTENER_LEN + 1).parse::<ListenerId>().is_err());
    }

    #[test]
    fn test_listener_id_serde_rejects_invalid() {
        let ok: ListenerId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(ok.as_str(), "alice");
        assert!(serde_json::from_str::<ListenerId>("\"a/b\"").is_err());
    }

    #[test]
    fn test_session_ids_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
