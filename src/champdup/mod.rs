//! Champ'd Up: draw a champion, counter someone else's, vote on the
//! matchups. Two rounds of draw/counter/vote, an optional bonus interlude,
//! then the leaderboard.

pub mod events;
pub mod images;
pub mod matchup;
pub mod score;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{as_i64, ConfigField, ConfigRejection};
use crate::protocol::{ClientFrame, MessageType, NotifyKind, Outcome};
use crate::session::{Engine, GameLogic};
use crate::types::{Author, Award, GameStatus, Image, Player};

use events::{event_sequence, EventName, RoundEvent};
use images::{HistoryStore, PhaseBoard, PromptPool};
use matchup::{Matchup, MatchupPool, Side, VoteCycle};

/// A meaningful game needs an original, a counter and at least one voter.
pub const MIN_PLAYERS: i64 = 3;

/// Pause between a matchup result and the next matchup.
const GRACE_SECS: i64 = 10;
/// Length of the bonus interlude.
const BONUS_SECS: i64 = 30;
/// Drumroll between the START broadcast and the first draw phase.
const START_DELAY: Duration = Duration::from_millis(500);

/// Host-configurable options. Every instance builds its own defaults; the
/// closed key set is validated per key in [`ChampdUpConfig::apply`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChampdUpConfig {
    pub max_players: i64,
    pub bonus_round_enabled: bool,
    /// Seconds for each draw/counter phase.
    pub draw_duration: i64,
    /// Seconds each matchup stays open for votes.
    pub vote_duration: i64,
    /// Advance a phase as soon as everyone has submitted.
    pub early_advance: bool,
    pub custom_prompts: Vec<String>,
}

impl Default for ChampdUpConfig {
    fn default() -> Self {
        Self {
            max_players: 10,
            bonus_round_enabled: true,
            draw_duration: 90,
            vote_duration: 20,
            early_advance: true,
            custom_prompts: Vec::new(),
        }
    }
}

impl ChampdUpConfig {
    /// Apply a public-config map. Each key is validated independently:
    /// rejected keys keep their defaults and come back as (key, reason).
    pub fn apply(&mut self, map: &serde_json::Map<String, Value>) -> Vec<ConfigRejection> {
        let mut rejections = Vec::new();
        for (key, value) in map {
            let reject = |reason: &str| (key.clone(), reason.to_string());
            match key.as_str() {
                "max_players" => match as_i64(value) {
                    Some(n) if n == -1 || n >= MIN_PLAYERS => self.max_players = n,
                    Some(_) => rejections.push(reject(
                        "max_players must be at least 3 (a minimum of 3 players are required to play) or -1 for unbounded",
                    )),
                    None => rejections.push(reject("expected a number")),
                },
                "bonus_round_enabled" => match value.as_bool() {
                    Some(b) => self.bonus_round_enabled = b,
                    None => rejections.push(reject("expected a boolean")),
                },
                "draw_duration" => match as_i64(value) {
                    Some(n) if n >= 10 => self.draw_duration = n,
                    Some(_) => rejections.push(reject("draw_duration must be at least 10 seconds")),
                    None => rejections.push(reject("expected a number")),
                },
                "vote_duration" => match as_i64(value) {
                    Some(n) if n >= 5 => self.vote_duration = n,
                    Some(_) => rejections.push(reject("vote_duration must be at least 5 seconds")),
                    None => rejections.push(reject("expected a number")),
                },
                "early_advance" => match value.as_bool() {
                    Some(b) => self.early_advance = b,
                    None => rejections.push(reject("expected a boolean")),
                },
                "custom_prompts" => match value.as_array() {
                    Some(items) if items.iter().all(|v| v.is_string()) => {
                        self.custom_prompts = items
                            .iter()
                            .filter_map(|v| v.as_str())
                            .map(|s| s.to_string())
                            .collect();
                    }
                    Some(_) => rejections.push(reject("expected a list of strings")),
                    None => rejections.push(reject("expected a list of strings")),
                },
                _ => rejections.push(reject("unrecognized key")),
            }
        }
        rejections
    }

    /// Pure transpilation of the typed schema for the frontend.
    pub fn fields(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::number("max_players", self.max_players),
            ConfigField::bool("bonus_round_enabled", self.bonus_round_enabled),
            ConfigField::number("draw_duration", self.draw_duration),
            ConfigField::number("vote_duration", self.vote_duration),
            ConfigField::bool("early_advance", self.early_advance),
            ConfigField::select("custom_prompts", &self.custom_prompts),
        ]
    }
}

/// Deferred work handed back through the dispatcher or a timer. Every
/// variant carries the cursor it was scheduled under; a mismatch at run
/// time means the state moved on and the action is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Advance { from: isize },
    MatchupResult { idx: isize },
    MatchupGrace { idx: isize },
}

/// A winning image shown on the leaderboard with its display awards.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardImage {
    pub image: Image,
    pub awards: Vec<Award>,
    pub points: i64,
}

pub struct ChampdUp {
    pub config: ChampdUpConfig,
    events: Vec<RoundEvent>,
    /// -1 = not started; increments only, skipping disabled events.
    cursor: isize,
    prompts: PromptPool,
    /// Live draw/counter board; archived into `finished` on phase exit.
    board: Option<PhaseBoard>,
    finished: HashMap<EventName, PhaseBoard>,
    pool: Option<MatchupPool>,
    history: HistoryStore,
    champions: Vec<LeaderboardImage>,
}

#[derive(Debug, Deserialize)]
struct ImageSubmission {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "data")]
    data_url: Option<String>,
}

impl ChampdUp {
    pub fn new(config: ChampdUpConfig) -> Self {
        let prompts = PromptPool::new(&config.custom_prompts);
        Self {
            config,
            events: event_sequence(),
            cursor: -1,
            prompts,
            board: None,
            finished: HashMap::new(),
            pool: None,
            history: HistoryStore::default(),
            champions: Vec::new(),
        }
    }

    pub fn cursor(&self) -> isize {
        self.cursor
    }

    /// Index of the matchup currently in its vote cycle, if any.
    pub fn matchup_index(&self) -> Option<isize> {
        self.pool.as_ref().map(|pool| pool.idx)
    }

    pub fn current_event(&self) -> Option<&RoundEvent> {
        usize::try_from(self.cursor)
            .ok()
            .and_then(|i| self.events.get(i))
    }

    fn current_event_name(&self) -> Option<EventName> {
        self.current_event().map(|e| e.name)
    }

    fn set_current_ends(&mut self, ends: Option<DateTime<Utc>>) {
        if let Ok(i) = usize::try_from(self.cursor) {
            if let Some(event) = self.events.get_mut(i) {
                event.ends = ends;
            }
        }
    }

    fn roster_keys(&self, engine: &Engine) -> Vec<(String, String)> {
        engine
            .players
            .iter()
            .map(|(key, player)| (key.clone(), player.username.clone()))
            .collect()
    }

    /// Players ordered by points descending; ties keep join order.
    fn podium(&self, engine: &Engine) -> Vec<Player> {
        let mut podium = engine.roster();
        podium.sort_by(|a, b| b.points.cmp(&a.points));
        podium
    }

    // ---- host frames ----

    fn handle_start(&mut self, engine: &mut Engine) -> Outcome<Action> {
        let mut outcome = Outcome::new();
        if engine.status != GameStatus::Waiting {
            outcome.notify(NotifyKind::Fail, "The game has already started");
            return outcome;
        }
        if (engine.players.len() as i64) < MIN_PLAYERS {
            outcome.notify(NotifyKind::Fail, "At least 3 players are required to play");
            return outcome;
        }
        engine.set_status(GameStatus::Running);
        tracing::info!(session = %engine.id, players = engine.players.len(), "game started");
        outcome.add_broadcast(MessageType::Start, json!({ "players": engine.roster() }));
        outcome.set_action(Action::Advance { from: self.cursor });
        outcome.set_action_delay(START_DELAY);
        outcome
    }

    fn handle_stop(&mut self, engine: &mut Engine) -> Outcome<Action> {
        let mut outcome = Outcome::new();
        if engine.status == GameStatus::Stopped {
            return outcome;
        }
        engine.set_status(GameStatus::Stopped);
        tracing::info!(session = %engine.id, "game stopped by host");
        outcome.kill_timer = true;
        outcome.add_broadcast(MessageType::Stop, json!({ "players": engine.roster() }));
        outcome
    }

    /// Host skip: accepted in the result/grace sub-modes only, where it
    /// kills the pending timer and forces the grace transition.
    fn handle_skip(&mut self) -> Outcome<Action> {
        let mut outcome = Outcome::new();
        if !self.current_event_name().is_some_and(EventName::is_vote) {
            outcome.notify(NotifyKind::Fail, "Nothing to skip right now");
            return outcome;
        }
        let Some(pool) = self.pool.as_ref() else {
            return outcome;
        };
        match pool.cycle {
            VoteCycle::Result | VoteCycle::Grace => {
                outcome.kill_timer = true;
                outcome.set_action(Action::MatchupGrace { idx: pool.idx });
            }
            VoteCycle::Voting => {
                outcome.notify(NotifyKind::Fail, "Voting is still open");
            }
        }
        outcome
    }

    // ---- player frames ----

    fn handle_image(&mut self, engine: &Engine, player: &Player, value: &Value) -> Outcome<Action> {
        let mut outcome = Outcome::new();
        let in_phase = self
            .current_event_name()
            .is_some_and(|e| e.is_draw() || e.is_counter());
        if !in_phase {
            outcome.notify(NotifyKind::Fail, "Submissions are closed");
            return outcome;
        }
        let Ok(submission) = serde_json::from_value::<ImageSubmission>(value.clone()) else {
            outcome.notify(NotifyKind::Fail, "Malformed submission");
            return outcome;
        };
        if submission.title.is_none() && submission.data_url.is_none() {
            outcome.notify(NotifyKind::Fail, "Empty submission");
            return outcome;
        }
        let Some(board) = self.board.as_mut() else {
            return outcome;
        };
        let key = player.key();
        let Some(image) = board.submit(&key, submission.title, submission.data_url, Utc::now())
        else {
            outcome.notify(NotifyKind::Fail, "You are not part of this phase");
            return outcome;
        };
        let image = image.clone();
        self.history.record(&key, &image);
        outcome.notify(NotifyKind::Success, "Submission received");
        outcome.add_broadcast(
            MessageType::ImageSubmits,
            json!({
                "submitted": self.board.as_ref().map(PhaseBoard::submitted_count),
                "total": engine.players.len(),
            }),
        );
        let everyone_in = self.board.as_ref().is_some_and(PhaseBoard::all_submitted);
        if everyone_in && self.config.early_advance {
            outcome.kill_timer = true;
            outcome.set_action(Action::Advance { from: self.cursor });
        }
        outcome
    }

    fn handle_vote(&mut self, player: &Player, value: &Value) -> Outcome<Action> {
        let mut outcome = Outcome::new();
        if !self.current_event_name().is_some_and(EventName::is_vote) {
            return outcome;
        }
        let Some(pool) = self.pool.as_mut() else {
            return outcome;
        };
        if pool.cycle != VoteCycle::Voting {
            outcome.notify(NotifyKind::Fail, "Voting is closed for this matchup");
            return outcome;
        }
        let idx = pool.idx;
        let Some(matchup) = pool.current_mut() else {
            return outcome;
        };
        if matchup.is_artist(&player.username) {
            outcome.notify(NotifyKind::Fail, "Artists cannot vote on their own matchup");
            return outcome;
        }
        let side = match value.as_str() {
            Some("left") => Side::Left,
            Some("right") => Side::Right,
            _ => {
                outcome.notify(NotifyKind::Fail, "Vote must be 'left' or 'right'");
                return outcome;
            }
        };
        matchup.vote(&player.username, side);
        let (left, right) = matchup.counts();
        outcome.add_broadcast(
            MessageType::MatchupVote,
            json!({ "idx": idx, "left": left, "right": right }),
        );
        outcome
    }

    fn handle_swap(&mut self, player: &Player, value: &Value) -> Outcome<Action> {
        let mut outcome = Outcome::new();
        let in_second_vote = self.current_event_name() == Some(EventName::SecondVote);
        if !in_second_vote {
            outcome.notify(NotifyKind::Fail, "Swaps are only allowed during round two voting");
            return outcome;
        }
        let Some(hash) = value.as_str() else {
            outcome.notify(NotifyKind::Fail, "Malformed swap request");
            return outcome;
        };
        let Some(historic) = self.history.get(&player.key(), hash).cloned() else {
            outcome.notify(NotifyKind::Fail, "No such submission in your history");
            return outcome;
        };
        let Some(pool) = self.pool.as_mut() else {
            return outcome;
        };
        if pool.cycle != VoteCycle::Voting {
            outcome.notify(NotifyKind::Fail, "Voting is closed for this matchup");
            return outcome;
        }
        let idx = pool.idx;
        let Some(matchup) = pool.current_mut() else {
            return outcome;
        };
        let Some(side) = matchup.side_of(&player.username) else {
            outcome.notify(NotifyKind::Fail, "You are not part of the current matchup");
            return outcome;
        };
        *matchup.image_mut(side) = historic;
        outcome.add_broadcast(
            MessageType::ImageSwap,
            json!({ "idx": idx, "target": side, "matchup": matchup.public_view() }),
        );
        outcome
    }

    // ---- sequence ----

    /// Move the cursor to the next enabled event and set it up. Past the
    /// last event this is a no-op: the sequence ends without error.
    fn advance(&mut self, engine: &mut Engine) -> Outcome<Action> {
        if let Some(board) = self.board.take() {
            self.finished.insert(board.event, board);
        }
        self.cursor += 1;
        let Some(name) = self.current_event_name() else {
            let mut outcome = Outcome::new();
            outcome.kill_timer = true;
            return outcome;
        };
        if name == EventName::BonusRound && !self.config.bonus_round_enabled {
            return self.advance(engine);
        }
        tracing::debug!(session = %engine.id, event = ?name, cursor = self.cursor, "advancing");
        if name.is_draw() {
            self.setup_sketch_phase(engine, name)
        } else if name.is_counter() {
            self.setup_sketch_phase(engine, name)
        } else if name.is_vote() {
            self.setup_vote(engine, name)
        } else if name == EventName::BonusRound {
            self.setup_bonus()
        } else {
            self.setup_leaderboard(engine)
        }
    }

    /// Common setup for draw and counter phases: fresh board, full readiness
    /// set, phase deadline, personalized state push.
    fn setup_sketch_phase(&mut self, engine: &mut Engine, name: EventName) -> Outcome<Action> {
        let now = Utc::now();
        let secs = self.config.draw_duration;
        let ends = now + ChronoDuration::seconds(secs);
        let roster = self.roster_keys(engine);
        let board = if let Some(source_event) = name.counter_source() {
            match self.finished.get(&source_event) {
                Some(source) => {
                    PhaseBoard::for_counter(name, &roster, source, now, secs as u64)
                }
                None => {
                    tracing::error!(session = %engine.id, event = ?name, "counter phase without a finished draw phase");
                    return self.advance(engine);
                }
            }
        } else {
            PhaseBoard::for_draw(name, &roster, &mut self.prompts, now, secs as u64)
        };
        self.board = Some(board);
        self.set_current_ends(Some(ends));

        let mut outcome = Outcome::new();
        outcome.add_broadcast(
            MessageType::Event,
            json!({ "name": name, "timed": true, "ends": ends }),
        );
        outcome.refresh = true;
        outcome.arm_timer(ends, Action::Advance { from: self.cursor });
        outcome
    }

    fn setup_vote(&mut self, engine: &mut Engine, name: EventName) -> Outcome<Action> {
        let Some((draw_event, counter_event)) = name.vote_sources() else {
            return self.advance(engine);
        };
        let (Some(draw), Some(counter)) = (
            self.finished.get(&draw_event),
            self.finished.get(&counter_event),
        ) else {
            tracing::error!(session = %engine.id, event = ?name, "vote phase without finished source phases");
            return self.advance(engine);
        };
        let mut matchups = Vec::new();
        for (key, counter_image) in &counter.images {
            let Some(source_key) = counter.targets.get(key) else {
                continue;
            };
            let Some(draw_image) = draw.images.get(source_key) else {
                continue;
            };
            matchups.push(Matchup::new(draw_image.clone(), counter_image.clone()));
        }
        if matchups.is_empty() {
            // Degenerate but survivable: log it and keep the sequence going.
            tracing::error!(session = %engine.id, event = ?name, "vote phase with an empty matchup pool");
            return self.advance(engine);
        }
        matchups.shuffle(&mut rand::rng());
        self.pool = Some(MatchupPool::new(matchups));
        self.set_current_ends(None);

        let mut outcome = self.grace_step(engine);
        outcome.broadcasts.insert(
            0,
            crate::protocol::Payload::new(
                MessageType::Event,
                json!({ "name": name, "timed": true, "ends": null }),
            ),
        );
        outcome.refresh = true;
        outcome
    }

    /// The grace transition: advance the matchup cursor; past the pool, the
    /// outer sequence resumes; otherwise the next matchup opens for votes.
    fn grace_step(&mut self, engine: &mut Engine) -> Outcome<Action> {
        let exhausted = match self.pool.as_mut() {
            None => return Outcome::new(),
            Some(pool) => {
                pool.cycle = VoteCycle::Grace;
                !pool.advance()
            }
        };
        if exhausted {
            self.pool = None;
            return self.advance(engine);
        }
        let Some(pool) = self.pool.as_mut() else {
            return Outcome::new();
        };
        let now = Utc::now();
        let ends = now + ChronoDuration::seconds(self.config.vote_duration);
        pool.deadline = Some(ends);
        pool.cycle = VoteCycle::Voting;
        let idx = pool.idx;
        let view = pool
            .current()
            .map(Matchup::public_view)
            .unwrap_or(Value::Null);

        let mut outcome = Outcome::new();
        outcome.add_broadcast(
            MessageType::Matchup,
            json!({ "idx": idx, "matchup": view, "ends": ends }),
        );
        outcome.arm_timer(ends, Action::MatchupResult { idx });
        outcome
    }

    /// The result transition: close voting, score once, pay artists, record
    /// the champion, broadcast the verdict with the grace deadline.
    fn result_step(&mut self, engine: &mut Engine) -> Outcome<Action> {
        let Some(round) = self.current_event_name().map(EventName::round) else {
            return Outcome::new();
        };
        let total_players = engine.players.len();
        let Some(pool) = self.pool.as_mut() else {
            return Outcome::new();
        };
        pool.cycle = VoteCycle::Result;
        let idx = pool.idx;
        let Some(matchup) = pool.current() else {
            return Outcome::new();
        };

        let verdict = score::score_matchup(matchup, round, total_players);
        for side in [Side::Left, Side::Right] {
            let earned = verdict.side(side).points;
            if earned == 0 {
                continue;
            }
            for artist in &matchup.image(side).artists {
                if let Some(player) = engine.players.get_mut(&artist.to_lowercase()) {
                    player.points += earned;
                }
            }
        }

        let winning_image = matchup.image(verdict.winner).clone();
        let hash = winning_image.content_hash();
        if !self
            .champions
            .iter()
            .any(|c| c.image.content_hash() == hash)
        {
            self.champions.push(LeaderboardImage {
                image: winning_image,
                awards: verdict.display_awards(),
                points: verdict.side(verdict.winner).points,
            });
        }

        let now = Utc::now();
        let grace_ends = now + ChronoDuration::seconds(GRACE_SECS);
        let Some(pool) = self.pool.as_mut() else {
            return Outcome::new();
        };
        pool.deadline = Some(grace_ends);
        let (left_votes, right_votes) = pool
            .current()
            .map(Matchup::counts)
            .unwrap_or((0, 0));

        let mut outcome = Outcome::new();
        outcome.add_broadcast(
            MessageType::MatchupResult,
            json!({
                "idx": idx,
                "winner": verdict.winner,
                "left": { "votes": left_votes, "points": verdict.left.points, "awards": verdict.left.awards },
                "right": { "votes": right_votes, "points": verdict.right.points, "awards": verdict.right.awards },
                "ends": grace_ends,
            }),
        );
        outcome.refresh = true;
        outcome.arm_timer(grace_ends, Action::MatchupGrace { idx });
        outcome
    }

    fn setup_bonus(&mut self) -> Outcome<Action> {
        let now = Utc::now();
        let ends = now + ChronoDuration::seconds(BONUS_SECS);
        self.set_current_ends(Some(ends));
        let mut outcome = Outcome::new();
        outcome.add_broadcast(
            MessageType::Event,
            json!({ "name": EventName::BonusRound, "timed": true, "ends": ends }),
        );
        outcome.refresh = true;
        outcome.arm_timer(ends, Action::Advance { from: self.cursor });
        outcome
    }

    /// Terminal event: final standings plus the champions collected across
    /// both vote cycles. No timer; the session idles until the host stops it.
    fn setup_leaderboard(&mut self, engine: &mut Engine) -> Outcome<Action> {
        let mut outcome = Outcome::new();
        outcome.kill_timer = true;
        outcome.add_broadcast(
            MessageType::Event,
            json!({ "name": EventName::Leaderboard, "timed": false, "ends": null }),
        );
        outcome.add_broadcast(
            MessageType::Leaderboard,
            json!({ "podium": self.podium(engine), "champions": self.champions }),
        );
        outcome.refresh = true;
        outcome
    }

    /// Event-specific slice of the state snapshot for one viewer.
    fn event_data(&self, engine: &Engine, viewer: &Author) -> Value {
        let Some(name) = self.current_event_name() else {
            return Value::Null;
        };
        if name.is_draw() || name.is_counter() {
            let Some(board) = self.board.as_ref() else {
                return Value::Null;
            };
            return match viewer.username() {
                None => json!({
                    "submitted": board.submitted_count(),
                    "total": board.images.len(),
                }),
                Some(username) => {
                    let key = username.to_lowercase();
                    let countering = name
                        .counter_source()
                        .and_then(|source| self.finished.get(&source))
                        .and_then(|source| board.source_image(source, &key));
                    json!({
                        "image": board.images.get(&key),
                        "countering": countering,
                        "submitted": board.submitted_count(),
                        "total": board.images.len(),
                    })
                }
            };
        }
        if name.is_vote() {
            let Some(pool) = self.pool.as_ref() else {
                return Value::Null;
            };
            let (left, right) = pool.current().map(Matchup::counts).unwrap_or((0, 0));
            return json!({
                "idx": pool.idx,
                "cycle": pool.cycle,
                "matchup": pool.current().map(Matchup::public_view),
                "left": left,
                "right": right,
                "ends": pool.deadline,
            });
        }
        if name == EventName::Leaderboard {
            return json!({
                "podium": self.podium(engine),
                "champions": self.champions,
            });
        }
        Value::Null
    }
}

impl GameLogic for ChampdUp {
    type Action = Action;

    fn kind(&self) -> &'static str {
        "champdup"
    }

    fn handle_host(&mut self, engine: &mut Engine, frame: ClientFrame) -> Outcome<Action> {
        match frame.kind {
            MessageType::Start => self.handle_start(engine),
            MessageType::Stop => self.handle_stop(engine),
            MessageType::MatchupStart => self.handle_skip(),
            other => {
                tracing::debug!(session = %engine.id, kind = ?other, "unhandled host frame");
                Outcome::new()
            }
        }
    }

    fn handle_player(
        &mut self,
        engine: &mut Engine,
        player: &Player,
        frame: ClientFrame,
    ) -> Outcome<Action> {
        match frame.kind {
            MessageType::Image => self.handle_image(engine, player, &frame.value),
            MessageType::MatchupVote => self.handle_vote(player, &frame.value),
            MessageType::ImageSwap => self.handle_swap(player, &frame.value),
            other => {
                tracing::debug!(session = %engine.id, kind = ?other, "unhandled player frame");
                Outcome::new()
            }
        }
    }

    /// Deferred/timer entry point. Every branch re-validates the cursor or
    /// matchup index it was scheduled under; stale actions are no-ops.
    fn run_action(&mut self, engine: &mut Engine, action: Action) -> Outcome<Action> {
        match action {
            Action::Advance { from } => {
                if self.cursor != from || engine.status != GameStatus::Running {
                    return Outcome::new();
                }
                self.advance(engine)
            }
            Action::MatchupResult { idx } => {
                let live = self
                    .pool
                    .as_ref()
                    .is_some_and(|p| p.idx == idx && p.cycle == VoteCycle::Voting);
                if !live || !self.current_event_name().is_some_and(EventName::is_vote) {
                    return Outcome::new();
                }
                self.result_step(engine)
            }
            Action::MatchupGrace { idx } => {
                let due = self
                    .pool
                    .as_ref()
                    .is_some_and(|p| p.idx == idx && p.cycle == VoteCycle::Result);
                if !due || !self.current_event_name().is_some_and(EventName::is_vote) {
                    return Outcome::new();
                }
                self.grace_step(engine)
            }
        }
    }

    fn state_for(&self, engine: &Engine, viewer: &Author) -> Value {
        json!({
            "status": engine.status,
            "players": engine.roster(),
            "event": self.current_event(),
            "data": self.event_data(engine, viewer),
        })
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        self.config.fields()
    }
}
