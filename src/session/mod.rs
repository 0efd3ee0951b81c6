//! The game session engine.
//!
//! One session is one logical unit of mutable state behind a single
//! `tokio::sync::Mutex`. Inbound frame handlers and timer callbacks both
//! follow the same shape: lock, mutate, collect a declarative [`Outcome`],
//! unlock, then perform the sends/pacing/delays outside the lock. Timer
//! firings re-validate their generation after re-acquiring the lock, so a
//! superseded deadline can never commit anything.

pub mod chat;
pub mod connection;
pub mod timer;

pub use connection::{ConnectionSink, ConnectionTable, JoinError, LeaveError};
pub use timer::PhaseTimer;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::ConfigField;
use crate::protocol::{ClientFrame, MessageType, Outcome, Payload, ServerFrame};
use crate::types::{Author, GameStatus, Player, SessionId, Token, Username};

/// Gap between successive broadcast frames, preserving client-side
/// animation pacing.
pub const BROADCAST_GAP: Duration = Duration::from_millis(50);

/// Game-agnostic per-session state: roster, tokens, connections, timer.
pub struct Engine {
    pub id: SessionId,
    pub status: GameStatus,
    pub max_players: i64,
    /// key = lowercase username; iteration order is join order.
    pub players: IndexMap<String, Player>,
    pub tokens: HashMap<String, Token>,
    pub host_token: Token,
    pub host_connected: bool,
    pub connections: ConnectionTable,
    pub timer: PhaseTimer,
    pub poll: Option<chat::Poll>,
    pub created_at: DateTime<Utc>,
}

impl Engine {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            status: GameStatus::Waiting,
            max_players: -1,
            players: IndexMap::new(),
            tokens: HashMap::new(),
            host_token: crate::types::generate_short_code(),
            host_connected: false,
            connections: ConnectionTable::default(),
            timer: PhaseTimer::new(),
            poll: None,
            created_at: Utc::now(),
        }
    }

    /// WAITING -> RUNNING -> STOPPED, never backwards.
    pub fn set_status(&mut self, status: GameStatus) {
        debug_assert!(
            !(self.status == GameStatus::Stopped && status != GameStatus::Stopped),
            "status transitions are monotonic"
        );
        self.status = status;
    }
}

/// The capability set a concrete game supplies to the engine.
///
/// Handlers never return errors for application-level misuse (wrong phase,
/// bad vote value); they return an empty or notification-only outcome.
pub trait GameLogic: Send + Sized + 'static {
    /// Deferred work the dispatcher or timer hands back to the game.
    type Action: Send + Clone + std::fmt::Debug + 'static;

    fn kind(&self) -> &'static str;

    fn handle_host(&mut self, engine: &mut Engine, frame: ClientFrame) -> Outcome<Self::Action>;

    fn handle_player(
        &mut self,
        engine: &mut Engine,
        player: &Player,
        frame: ClientFrame,
    ) -> Outcome<Self::Action>;

    fn run_action(&mut self, engine: &mut Engine, action: Self::Action) -> Outcome<Self::Action>;

    /// Full state snapshot tailored to one viewer, sent on (re)connect and
    /// whenever an outcome asks for a refresh.
    fn state_for(&self, engine: &Engine, viewer: &Author) -> Value;

    /// Transpiled public config, derived purely from the typed schema.
    fn config_fields(&self) -> Vec<ConfigField>;
}

/// Who sent an inbound frame. Resolved to a fresh [`Author`] snapshot under
/// the session lock at dispatch time.
#[derive(Debug, Clone)]
pub enum Sender {
    Host,
    Player(Username),
}

pub struct GameSession<G: GameLogic> {
    pub engine: Engine,
    pub game: G,
    weak: Weak<Mutex<GameSession<G>>>,
}

impl<G: GameLogic> std::fmt::Debug for GameSession<G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession").finish_non_exhaustive()
    }
}

pub type SharedSession<G> = Arc<Mutex<GameSession<G>>>;

/// An [`Outcome`] resolved against live connections, ready to deliver
/// outside the lock.
pub struct Settled<A> {
    replies: Vec<ServerFrame>,
    directs: Vec<(ConnectionSink, ServerFrame)>,
    broadcasts: Vec<ServerFrame>,
    personalized: Vec<(ConnectionSink, ServerFrame)>,
    fanout: Vec<ConnectionSink>,
    action: Option<(A, Option<Duration>)>,
}

impl<G: GameLogic> GameSession<G> {
    pub fn create(id: SessionId, game: G, max_players: i64) -> SharedSession<G> {
        Arc::new_cyclic(|weak| {
            let mut engine = Engine::new(id);
            engine.max_players = max_players;
            Mutex::new(Self {
                engine,
                game,
                weak: weak.clone(),
            })
        })
    }

    /// Tailored full-state frame for one viewer.
    pub fn snapshot_for(&self, viewer: &Author) -> ServerFrame {
        ServerFrame {
            kind: MessageType::State,
            value: self.game.state_for(&self.engine, viewer),
            author: Author::Host,
            ping: None,
        }
    }

    /// Resolve timer requests and personalization against the current
    /// connection set; must run under the session lock, in the same critical
    /// section that produced the outcome.
    pub fn settle(&mut self, outcome: Outcome<G::Action>) -> Settled<G::Action> {
        if outcome.kill_timer {
            self.engine.timer.kill();
        }
        if let Some((deadline, action)) = outcome.timer {
            self.arm_timer(deadline, action);
        }
        let directs = outcome
            .directs
            .into_iter()
            .filter_map(|(username, payload)| {
                self.engine
                    .connections
                    .player_sink(&username.to_lowercase())
                    .cloned()
                    .map(|sink| (sink, payload.into_frame()))
            })
            .collect();
        let personalized = if outcome.refresh {
            self.state_frames()
        } else {
            Vec::new()
        };
        Settled {
            replies: outcome.replies.into_iter().map(Payload::into_frame).collect(),
            directs,
            broadcasts: outcome
                .broadcasts
                .into_iter()
                .map(Payload::into_frame)
                .collect(),
            personalized,
            fanout: self.engine.connections.fanout(),
            action: outcome.action.map(|a| (a, outcome.action_delay)),
        }
    }

    /// One tailored STATE frame per live connection.
    fn state_frames(&self) -> Vec<(ConnectionSink, ServerFrame)> {
        let mut frames = Vec::new();
        if let Some(sink) = self.engine.connections.host_sink() {
            frames.push((sink.clone(), self.snapshot_for(&Author::Host)));
        }
        for (key, player) in &self.engine.players {
            if let Some(sink) = self.engine.connections.player_sink(key) {
                let viewer = Author::player(player.clone());
                frames.push((sink.clone(), self.snapshot_for(&viewer)));
            }
        }
        frames
    }

    fn arm_timer(&mut self, deadline: DateTime<Utc>, action: G::Action) {
        let weak = self.weak.clone();
        self.engine.timer.arm(deadline, move |generation| async move {
            let Some(session) = weak.upgrade() else {
                return;
            };
            drive(&session, Some(generation), action).await;
        });
    }

    /// Tear the session down: kill the timer, drop every connection, stop
    /// the game. Timer tasks only hold a weak reference, so nothing outlives
    /// the registry entry.
    pub fn destroy(&mut self) {
        self.engine.timer.kill();
        self.engine.connections.close_all();
        self.engine.set_status(GameStatus::Stopped);
    }
}

/// Dispatch one inbound frame: resolve the author, try the engine-level
/// chat/poll frames, otherwise hand it to the game's host or player handler,
/// then deliver the outcome.
pub async fn dispatch<G: GameLogic>(session: &SharedSession<G>, sender: Sender, frame: ClientFrame) {
    let (settled, origin) = {
        let mut guard = session.lock().await;
        let author = match &sender {
            Sender::Host => Author::Host,
            Sender::Player(username) => match guard.engine.player(username) {
                Some(player) => Author::player(player.clone()),
                // Sender left while the frame was in flight.
                None => return,
            },
        };
        let origin = match &sender {
            Sender::Host => guard.engine.connections.host_sink().cloned(),
            Sender::Player(username) => guard
                .engine
                .connections
                .player_sink(&username.to_lowercase())
                .cloned(),
        };
        let GameSession { engine, game, .. } = &mut *guard;
        let outcome = match chat::intercept(engine, &author, &frame) {
            Some(outcome) => outcome,
            None => match author {
                Author::Host => game.handle_host(engine, frame),
                Author::Player { player } => game.handle_player(engine, &player, frame),
            },
        };
        (guard.settle(outcome), origin)
    };
    deliver(session, origin.as_ref(), settled).await;
}

/// Run a deferred action through the standard outcome loop. When
/// `expected_generation` is set (timer firings), a stale generation is a
/// silent no-op.
pub async fn drive<G: GameLogic>(
    session: &SharedSession<G>,
    expected_generation: Option<u64>,
    action: G::Action,
) {
    let settled = {
        let mut guard = session.lock().await;
        if let Some(generation) = expected_generation {
            if !guard.engine.timer.is_current(generation) {
                return;
            }
        }
        let GameSession { engine, game, .. } = &mut *guard;
        let outcome = game.run_action(engine, action);
        guard.settle(outcome)
    };
    deliver(session, None, settled).await;
}

/// Deliver a settled outcome and chase its deferred-action chain. Holds no
/// lock while sending or sleeping; re-locks only to run the next action.
async fn deliver<G: GameLogic>(
    session: &SharedSession<G>,
    origin: Option<&ConnectionSink>,
    mut settled: Settled<G::Action>,
) {
    loop {
        if let Some(sink) = origin {
            for frame in settled.replies.drain(..) {
                let _ = sink.send(frame);
            }
        }
        for (sink, frame) in settled.directs.drain(..) {
            let _ = sink.send(frame);
        }
        let total = settled.broadcasts.len();
        for (i, frame) in settled.broadcasts.drain(..).enumerate() {
            for sink in &settled.fanout {
                let _ = sink.send(frame.clone());
            }
            if i + 1 < total {
                tokio::time::sleep(BROADCAST_GAP).await;
            }
        }
        for (sink, frame) in settled.personalized.drain(..) {
            let _ = sink.send(frame);
        }

        let Some((action, delay)) = settled.action.take() else {
            break;
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        settled = {
            let mut guard = session.lock().await;
            let GameSession { engine, game, .. } = &mut *guard;
            let outcome = game.run_action(engine, action);
            guard.settle(outcome)
        };
    }
}
