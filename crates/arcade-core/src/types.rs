//! Player identity and credential types.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Absolute cap on player id length. The effective limit also depends on the
/// application prefix; see [`crate::Naming::max_player_id_len`].
pub const MAX_PLAYER_ID_LEN: usize = 40;

static PLAYER_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("player id pattern is valid")
});

/// Errors raised while parsing a [`PlayerId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayerIdError {
    #[error("player id is empty")]
    Empty,

    #[error("player id {0:?} is longer than {MAX_PLAYER_ID_LEN} bytes")]
    TooLong(String),

    #[error("player id {id:?} is longer than {max} bytes, the most application prefix {app:?} leaves room for")]
    TooLongForApp { id: String, app: String, max: usize },

    #[error("player id {0:?} must be lowercase alphanumerics and '-', starting and ending alphanumeric")]
    InvalidCharacters(String),
}

/// Stable identifier of a player, used to derive every resource name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerId(String);

impl PlayerId {
    /// Parse and validate a player id.
    pub fn parse(raw: impl Into<String>) -> Result<Self, PlayerIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(PlayerIdError::Empty);
        }
        if raw.len() > MAX_PLAYER_ID_LEN {
            return Err(PlayerIdError::TooLong(raw));
        }
        if !PLAYER_ID_PATTERN.is_match(&raw) {
            return Err(PlayerIdError::InvalidCharacters(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PlayerId {
    type Error = PlayerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.0
    }
}

impl AsRef<str> for PlayerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Environment variable holding the cloud API token.
pub const CLOUD_TOKEN_ENV: &str = "ARCADE_CLOUD_TOKEN";
/// Environment variable holding the cloud realm.
pub const CLOUD_REALM_ENV: &str = "ARCADE_CLOUD_REALM";

/// Credentials handed to the infrastructure tool inside cloud jobs.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CloudCredentials {
    pub token: String,
    pub realm: String,
}

impl CloudCredentials {
    pub fn new(token: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            realm: realm.into(),
        }
    }

    /// Read credentials from `ARCADE_CLOUD_TOKEN` / `ARCADE_CLOUD_REALM`.
    /// Missing variables become empty strings.
    pub fn from_env() -> Self {
        Self {
            token: std::env::var(CLOUD_TOKEN_ENV).unwrap_or_default(),
            realm: std::env::var(CLOUD_REALM_ENV).unwrap_or_default(),
        }
    }
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("token", &"<redacted>")
            .field("realm", &self.realm)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_ids() {
        for raw in ["alice", "bob-2", "7", "a-b-c"] {
            let id = PlayerId::parse(raw).unwrap();
            assert_eq!(id.as_str(), raw);
        }
    }

    #[test]
    fn rejects_bad_ids() {
        assert_eq!(PlayerId::parse(""), Err(PlayerIdError::Empty));
        assert!(matches!(
            PlayerId::parse("Alice"),
            Err(PlayerIdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            PlayerId::parse("-alice"),
            Err(PlayerIdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            PlayerId::parse("alice-"),
            Err(PlayerIdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            PlayerId::parse("al/ice"),
            Err(PlayerIdError::InvalidCharacters(_))
        ));
        assert!(matches!(
            PlayerId::parse("a".repeat(MAX_PLAYER_ID_LEN + 1)),
            Err(PlayerIdError::TooLong(_))
        ));
    }

    #[derive(Debug, Deserialize)]
    struct Wrapper {
        id: PlayerId,
    }

    #[test]
    fn deserialize_validates() {
        let ok: Wrapper = toml::from_str("id = \"alice\"").unwrap();
        assert_eq!(ok.id.as_str(), "alice");
        assert!(toml::from_str::<Wrapper>("id = \"NOPE\"").is_err());
    }

    #[test]
    fn debug_redacts_token() {
        let creds = CloudCredentials::new("s3cr3t", "us1");
        let shown = format!("{creds:?}");
        assert!(!shown.contains("s3cr3t"));
        assert!(shown.contains("us1"));
    }
}
