use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type SessionId = String;
pub type Username = String;
pub type ImageId = String;
pub type Token = String;

/// Safe character set for short codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 5;

/// Session ids are plain uppercase letters so they can be read out loud.
const SESSION_ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
pub const SESSION_ID_LENGTH: usize = 6;

/// Generate a random short code (5 characters), used as a capability token.
pub fn generate_short_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Generate a candidate session id. Collision handling is the registry's job.
pub fn generate_session_id() -> SessionId {
    let mut rng = rand::rng();
    (0..SESSION_ID_LENGTH)
        .map(|_| SESSION_ID_CHARS[rng.random_range(0..SESSION_ID_CHARS.len())] as char)
        .collect()
}

/// Random hex color assigned to a player on join.
pub fn generate_hex_color() -> String {
    let mut rng = rand::rng();
    format!("#{:06X}", rng.random_range(0..0x1000000u32))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    Waiting,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// A joined participant. The host is never a `Player`; it is the
/// `Author::Host` sentinel and does not occupy a roster slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub username: Username,
    pub points: i64,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub connection_status: ConnectionStatus,
}

impl Player {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            points: 0,
            color: generate_hex_color(),
            avatar_url: None,
            connection_status: ConnectionStatus::Disconnected,
        }
    }

    /// Usernames are unique and addressable case-insensitively.
    pub fn key(&self) -> String {
        self.username.to_lowercase()
    }
}

/// Message author: the privileged host or a player snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Author {
    Host,
    Player { player: Player },
}

impl Author {
    pub fn player(player: Player) -> Self {
        Self::Player { player }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Host => None,
            Self::Player { player } => Some(&player.username),
        }
    }
}

/// Named scoring bonus attached to a matchup outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AwardName {
    Domination,
    OnFire,
    Bruh,
    Comeback,
    Fast,
    Pride,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Award {
    pub name: AwardName,
    pub bonus: i64,
}

/// A drawing submission. `last_edit` stays `None` until the placeholder is
/// first replaced by the player; the timing award depends on that.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: ImageId,
    pub title: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    pub artists: Vec<Username>,
    pub last_edit: Option<DateTime<Utc>>,
    /// When the originating draw/counter phase started and how long it ran,
    /// captured at creation for timing-based scoring.
    pub phase_started: DateTime<Utc>,
    pub phase_secs: u64,
}

impl Image {
    pub fn placeholder(
        prompt: impl Into<String>,
        artist: impl Into<String>,
        phase_started: DateTime<Utc>,
        phase_secs: u64,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            title: String::new(),
            prompt: prompt.into(),
            data_url: None,
            artists: vec![artist.into()],
            last_edit: None,
            phase_started,
            phase_secs,
        }
    }

    /// Content hash used to address historical submissions.
    pub fn content_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        if let Some(data) = &self.data_url {
            hasher.update(data.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn has_artist(&self, username: &str) -> bool {
        self.artists
            .iter()
            .any(|a| a.eq_ignore_ascii_case(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_code_alphabet() {
        for _ in 0..50 {
            let code = generate_short_code();
            assert_eq!(code.len(), 5);
            assert!(code.bytes().all(|b| CODE_CHARS.contains(&b)));
        }
    }

    #[test]
    fn test_session_id_shape() {
        let id = generate_session_id();
        assert_eq!(id.len(), SESSION_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn test_author_username() {
        assert_eq!(Author::Host.username(), None);
        let author = Author::player(Player::new("Ann"));
        assert_eq!(author.username(), Some("Ann"));
    }

    #[test]
    fn test_image_hash_tracks_content() {
        let started = Utc::now();
        let mut img = Image::placeholder("a prompt", "ann", started, 60);
        let before = img.content_hash();
        img.title = "Champ".to_string();
        assert_ne!(before, img.content_hash());
    }
}
