//! Wire protocol shared by every game kind.
//!
//! Inbound frames are `{type, value}`; outbound frames add the resolved
//! `author`. Handlers return an [`Outcome`] that the dispatcher interprets:
//! direct replies first, then paced broadcasts, then an optional deferred
//! action.

use crate::types::Author;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Closed set of frame discriminators. Unknown strings fail to parse and are
/// answered with an `ERROR` frame; the connection stays open.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    // Engine-level
    HostConnect,
    HostDisconnect,
    Connect,
    Disconnect,
    Players,
    Start,
    Stop,
    Chat,
    Pm,
    Poll,
    PollVote,
    Notify,
    Error,
    State,
    Event,
    // Champ'd Up
    Image,
    ImageSubmits,
    ImageSwap,
    Matchup,
    MatchupVote,
    MatchupStart,
    MatchupResult,
    Leaderboard,
}

/// A parsed inbound frame. Both `type` and `value` must be present.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub value: Value,
}

/// An outbound frame as it goes over the wire.
#[derive(Debug, Clone, Serialize)]
pub struct ServerFrame {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub value: Value,
    pub author: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping: Option<bool>,
}

/// An outbound message before it is bound to a connection.
#[derive(Debug, Clone)]
pub struct Payload {
    pub kind: MessageType,
    pub value: Value,
    pub author: Author,
}

impl Payload {
    pub fn new(kind: MessageType, value: Value) -> Self {
        Self {
            kind,
            value,
            author: Author::Host,
        }
    }

    pub fn authored(kind: MessageType, value: Value, author: Author) -> Self {
        Self {
            kind,
            value,
            author,
        }
    }

    pub fn into_frame(self) -> ServerFrame {
        ServerFrame {
            kind: self.kind,
            value: self.value,
            author: self.author,
            ping: None,
        }
    }
}

/// User-visible notification severity, carried in `NOTIFY` frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotifyKind {
    Success,
    Fail,
    Info,
}

/// Declarative result of one handler invocation.
///
/// Processed in a fixed order: `replies` to the invoking connection, then
/// `broadcasts` to everyone (with a short gap between successive messages),
/// then timer bookkeeping, then the optional deferred `action` after its
/// delay. `refresh` asks the engine to push a personalized `STATE` frame to
/// every live connection.
#[derive(Debug)]
pub struct Outcome<A> {
    pub replies: Vec<Payload>,
    /// Targeted sends to single players other than the sender (`/pm`).
    pub directs: Vec<(String, Payload)>,
    pub broadcasts: Vec<Payload>,
    pub refresh: bool,
    pub kill_timer: bool,
    pub timer: Option<(DateTime<Utc>, A)>,
    pub action: Option<A>,
    pub action_delay: Option<Duration>,
}

impl<A> Default for Outcome<A> {
    fn default() -> Self {
        Self {
            replies: Vec::new(),
            directs: Vec::new(),
            broadcasts: Vec::new(),
            refresh: false,
            kill_timer: false,
            timer: None,
            action: None,
            action_delay: None,
        }
    }
}

impl<A> Outcome<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_reply(&mut self, kind: MessageType, value: Value) {
        self.replies.push(Payload::new(kind, value));
    }

    pub fn add_broadcast(&mut self, kind: MessageType, value: Value) {
        self.broadcasts.push(Payload::new(kind, value));
    }

    pub fn add_direct(&mut self, username: impl Into<String>, payload: Payload) {
        self.directs.push((username.into(), payload));
    }

    pub fn add_broadcast_from(&mut self, kind: MessageType, value: Value, author: Author) {
        self.broadcasts.push(Payload::authored(kind, value, author));
    }

    /// Reply with a user-visible notification; the standard shape for
    /// application-level rejections.
    pub fn notify(&mut self, kind: NotifyKind, text: impl Into<String>) {
        self.add_reply(
            MessageType::Notify,
            serde_json::json!({ "kind": kind, "text": text.into() }),
        );
    }

    pub fn set_action(&mut self, action: A) {
        self.action = Some(action);
    }

    pub fn set_action_delay(&mut self, delay: Duration) {
        self.action_delay = Some(delay);
    }

    /// Arm the session timer for `deadline`, superseding any pending one.
    pub fn arm_timer(&mut self, deadline: DateTime<Utc>, action: A) {
        self.timer = Some((deadline, action));
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
            && self.directs.is_empty()
            && self.broadcasts.is_empty()
            && !self.refresh
            && !self.kill_timer
            && self.timer.is_none()
            && self.action.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_requires_type_and_value() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"CHAT","value":"hi"}"#).is_ok());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"CHAT"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"value":"hi"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"NOPE","value":1}"#).is_err());
    }

    #[test]
    fn test_message_type_wire_names() {
        let json = serde_json::to_string(&MessageType::MatchupVote).unwrap();
        assert_eq!(json, "\"MATCHUP_VOTE\"");
        let json = serde_json::to_string(&MessageType::HostDisconnect).unwrap();
        assert_eq!(json, "\"HOST_DISCONNECT\"");
    }

    #[test]
    fn test_outcome_defaults_empty() {
        let outcome: Outcome<()> = Outcome::new();
        assert!(outcome.is_empty());
    }
}
