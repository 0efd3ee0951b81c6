//! Participant roster and live connection bookkeeping for one session.

use indexmap::IndexMap;
use serde_json::json;
use thiserror::Error;
use tokio::sync::mpsc;

use super::Engine;
use crate::protocol::{MessageType, ServerFrame};
use crate::types::{ConnectionStatus, GameStatus, Player, Token, Username};

/// Outbound half of one socket. Every connection gets its own unbounded
/// queue and writer task, so a slow socket never blocks a broadcast to the
/// others.
pub type ConnectionSink = mpsc::UnboundedSender<ServerFrame>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("game is full")]
    CapacityExceeded,
    #[error("username '{0}' is taken")]
    NameTaken(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LeaveError {
    #[error("no player found with username '{0}'")]
    NotFound(String),
    #[error("players cannot leave a running game")]
    SessionRunning,
}

/// identity -> live channel. At most one binding per identity; rebinding
/// replaces, never merges.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    host: Option<ConnectionSink>,
    players: IndexMap<String, ConnectionSink>,
}

impl ConnectionTable {
    pub fn bind_host(&mut self, sink: ConnectionSink) {
        self.host = Some(sink);
    }

    pub fn bind_player(&mut self, key: String, sink: ConnectionSink) {
        self.players.insert(key, sink);
    }

    /// Drop a binding, but only if `sink` is still the current channel for
    /// that identity; a rebind that already replaced it stays untouched.
    pub fn unbind_host(&mut self, sink: &ConnectionSink) {
        if self.host.as_ref().is_some_and(|h| h.same_channel(sink)) {
            self.host = None;
        }
    }

    pub fn unbind_player(&mut self, key: &str, sink: &ConnectionSink) {
        if self
            .players
            .get(key)
            .is_some_and(|p| p.same_channel(sink))
        {
            self.players.shift_remove(key);
        }
    }

    pub fn remove_player(&mut self, key: &str) {
        self.players.shift_remove(key);
    }

    pub fn player_sink(&self, key: &str) -> Option<&ConnectionSink> {
        self.players.get(key)
    }

    pub fn host_sink(&self) -> Option<&ConnectionSink> {
        self.host.as_ref()
    }

    /// Snapshot of every live sink, host included.
    pub fn fanout(&self) -> Vec<ConnectionSink> {
        self.host
            .iter()
            .chain(self.players.values())
            .cloned()
            .collect()
    }

    pub fn close_all(&mut self) {
        self.host = None;
        self.players.clear();
    }
}

impl Engine {
    /// Register a new participant. Capacity of -1 means unbounded; the host
    /// never counts against it.
    pub fn join(&mut self, username: &str) -> Result<Player, JoinError> {
        if self.max_players != -1 && self.players.len() as i64 >= self.max_players {
            return Err(JoinError::CapacityExceeded);
        }
        let key = username.to_lowercase();
        if self.players.contains_key(&key) {
            return Err(JoinError::NameTaken(username.to_string()));
        }
        let player = Player::new(username);
        self.players.insert(key.clone(), player.clone());
        self.tokens.insert(key, crate::types::generate_short_code());
        self.broadcast_roster(MessageType::Players, None);
        Ok(player)
    }

    /// Remove a participant. Only legal while the session is WAITING; a
    /// running game keeps disconnected players for reconnection.
    pub fn leave(&mut self, username: &str) -> Result<Player, LeaveError> {
        let key = username.to_lowercase();
        if !self.players.contains_key(&key) {
            return Err(LeaveError::NotFound(username.to_string()));
        }
        if self.status != GameStatus::Waiting {
            return Err(LeaveError::SessionRunning);
        }
        let Some(player) = self.players.shift_remove(&key) else {
            return Err(LeaveError::NotFound(username.to_string()));
        };
        self.tokens.remove(&key);
        self.connections.remove_player(&key);
        self.broadcast_roster(MessageType::Players, Some(&player));
        Ok(player)
    }

    pub fn player(&self, username: &str) -> Option<&Player> {
        self.players.get(&username.to_lowercase())
    }

    pub fn player_mut(&mut self, username: &str) -> Option<&mut Player> {
        self.players.get_mut(&username.to_lowercase())
    }

    /// Roster in join order.
    pub fn roster(&self) -> Vec<Player> {
        self.players.values().cloned().collect()
    }

    pub fn player_token(&self, username: &str) -> Option<&Token> {
        self.tokens.get(&username.to_lowercase())
    }

    /// Look up a participant by capability token.
    pub fn username_for_token(&self, token: &str) -> Option<Username> {
        self.tokens
            .iter()
            .find(|(_, t)| t.as_str() == token)
            .and_then(|(key, _)| self.players.get(key))
            .map(|p| p.username.clone())
    }

    /// Bind the host channel and announce the (re)connect.
    pub fn connect_host(&mut self, sink: ConnectionSink) {
        self.host_connected = true;
        self.connections.bind_host(sink);
        self.broadcast_roster(MessageType::HostConnect, None);
    }

    /// Bind a player channel, replacing any previous one, and announce it.
    pub fn connect_player(&mut self, username: &str, sink: ConnectionSink) {
        let key = username.to_lowercase();
        if let Some(player) = self.players.get_mut(&key) {
            player.connection_status = ConnectionStatus::Connected;
        }
        self.connections.bind_player(key, sink);
        self.broadcast_roster(MessageType::Connect, None);
    }

    /// The host socket closed. The session is not destroyed; everyone gets
    /// told and the game waits for a host reconnect.
    pub fn disconnect_host(&mut self, sink: &ConnectionSink) {
        let superseded = !self
            .connections
            .host_sink()
            .is_some_and(|h| h.same_channel(sink));
        if superseded {
            return;
        }
        self.connections.unbind_host(sink);
        self.host_connected = false;
        tracing::info!(session = %self.id, "host disconnected, waiting for reconnect");
        self.broadcast_roster(MessageType::HostDisconnect, None);
    }

    /// A player socket closed. While WAITING the player leaves outright;
    /// while RUNNING they are only marked disconnected and keep their score.
    pub fn disconnect_player(&mut self, username: &str, sink: &ConnectionSink) {
        let key = username.to_lowercase();
        let superseded = !self
            .connections
            .player_sink(&key)
            .is_some_and(|p| p.same_channel(sink));
        if superseded {
            return;
        }
        self.connections.unbind_player(&key, sink);
        if self.status == GameStatus::Waiting {
            if let Err(e) = self.leave(username) {
                tracing::debug!(session = %self.id, %username, "leave on disconnect: {e}");
            }
            return;
        }
        let affected = match self.players.get_mut(&key) {
            Some(player) => {
                player.connection_status = ConnectionStatus::Disconnected;
                Some(player.clone())
            }
            None => None,
        };
        tracing::info!(session = %self.id, %username, "player disconnected");
        self.broadcast_roster(MessageType::Disconnect, affected.as_ref());
    }

    /// Push one frame to every live connection, host included. Used for
    /// roster updates and other single-frame side effects; paced broadcast
    /// sequences go through the outcome loop instead.
    pub fn broadcast_frame(&self, frame: ServerFrame) {
        for sink in self.connections.fanout() {
            let _ = sink.send(frame.clone());
        }
    }

    fn broadcast_roster(&self, kind: MessageType, affected: Option<&Player>) {
        let value = match affected {
            Some(player) => json!({ "players": self.roster(), "player": player }),
            None => json!({ "players": self.roster() }),
        };
        self.broadcast_frame(ServerFrame {
            kind,
            value,
            author: crate::types::Author::Host,
            ping: None,
        });
    }
}
