//! In-memory collections backing the draw/counter phases: the prompt pool,
//! the per-phase submission board with readiness tracking, and the
//! per-player submission history used for round-two swaps.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

use super::events::EventName;
use crate::types::Image;

/// Built-in champion prompts. Custom prompts from the session config are
/// mixed into the pool on top of these.
pub const DEFAULT_PROMPTS: &[&str] = &[
    "A champion that skips leg day",
    "A champion that lives in the walls",
    "A champion that is legally a sandwich",
    "A champion that peaked in high school",
    "A champion that fears the vacuum cleaner",
    "A champion that sells you insurance at 3am",
    "A champion that runs entirely on spite",
    "A champion that is two kids in a trenchcoat",
    "A champion that lost the instruction manual",
    "A champion that invented a worse wheel",
    "A champion that haunts the office printer",
    "A champion that collects expired coupons",
    "A champion that speaks only in movie quotes",
    "A champion that is banned from the aquarium",
    "A champion that swallowed a GPS",
    "A champion that moonlights as a mattress",
];

/// Prompts are drawn without replacement; the pool refills once exhausted.
#[derive(Debug)]
pub struct PromptPool {
    source: Vec<String>,
    remaining: Vec<String>,
}

impl PromptPool {
    pub fn new(custom: &[String]) -> Self {
        let mut source: Vec<String> = DEFAULT_PROMPTS.iter().map(|s| s.to_string()).collect();
        source.extend(custom.iter().cloned());
        Self {
            source,
            remaining: Vec::new(),
        }
    }

    pub fn draw(&mut self) -> String {
        let mut rng = rand::rng();
        if self.remaining.is_empty() {
            self.remaining = self.source.clone();
            self.remaining.shuffle(&mut rng);
        }
        self.remaining.pop().unwrap_or_default()
    }
}

/// Submission store for one draw or counter phase: one image per player,
/// placeholder until replaced, plus the readiness set of players who still
/// owe a submission.
#[derive(Debug)]
pub struct PhaseBoard {
    pub event: EventName,
    /// key = lowercase username, iteration order = roster order at setup.
    pub images: IndexMap<String, Image>,
    /// Counter phases: counterer key -> countered (source) key.
    pub targets: HashMap<String, String>,
    pub pending: HashSet<String>,
    pub started: DateTime<Utc>,
    pub duration_secs: u64,
}

impl PhaseBoard {
    /// Draw phase: every player gets a fresh prompt and a placeholder.
    pub fn for_draw(
        event: EventName,
        roster: &[(String, String)],
        prompts: &mut PromptPool,
        started: DateTime<Utc>,
        duration_secs: u64,
    ) -> Self {
        let mut images = IndexMap::new();
        for (key, username) in roster {
            let prompt = prompts.draw();
            images.insert(
                key.clone(),
                Image::placeholder(prompt, username.clone(), started, duration_secs),
            );
        }
        Self {
            event,
            pending: images.keys().cloned().collect(),
            images,
            targets: HashMap::new(),
            started,
            duration_secs,
        }
    }

    /// Counter phase: a fixed random offset over the roster decides who
    /// counters whom, so nobody counters their own champion.
    pub fn for_counter(
        event: EventName,
        roster: &[(String, String)],
        source: &PhaseBoard,
        started: DateTime<Utc>,
        duration_secs: u64,
    ) -> Self {
        let n = roster.len();
        let offset = if n > 1 {
            rand::rng().random_range(1..n)
        } else {
            0
        };
        let mut images = IndexMap::new();
        let mut targets = HashMap::new();
        for (i, (key, username)) in roster.iter().enumerate() {
            let (target_key, _) = &roster[(i + offset) % n];
            let prompt = source
                .images
                .get(target_key)
                .map(|img| img.prompt.clone())
                .unwrap_or_default();
            targets.insert(key.clone(), target_key.clone());
            images.insert(
                key.clone(),
                Image::placeholder(prompt, username.clone(), started, duration_secs),
            );
        }
        Self {
            event,
            pending: images.keys().cloned().collect(),
            images,
            targets,
            started,
            duration_secs,
        }
    }

    /// Replace a player's placeholder (or earlier submission). Returns the
    /// stored image, or `None` if the player has no slot this phase.
    pub fn submit(
        &mut self,
        key: &str,
        title: Option<String>,
        data_url: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<&Image> {
        let image = self.images.get_mut(key)?;
        if let Some(title) = title {
            image.title = title;
        }
        if let Some(data_url) = data_url {
            image.data_url = Some(data_url);
        }
        image.last_edit = Some(now);
        self.pending.remove(key);
        Some(image)
    }

    /// The image a counterer is drawing against.
    pub fn source_image<'a>(&self, source: &'a PhaseBoard, key: &str) -> Option<&'a Image> {
        self.targets
            .get(key)
            .and_then(|target| source.images.get(target))
    }

    pub fn submitted_count(&self) -> usize {
        self.images.len() - self.pending.len()
    }

    pub fn all_submitted(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Every submission a player made this session, addressable by content hash.
#[derive(Debug, Default)]
pub struct HistoryStore {
    by_player: HashMap<String, IndexMap<String, Image>>,
}

impl HistoryStore {
    pub fn record(&mut self, key: &str, image: &Image) {
        self.by_player
            .entry(key.to_string())
            .or_default()
            .insert(image.content_hash(), image.clone());
    }

    pub fn get(&self, key: &str, hash: &str) -> Option<&Image> {
        self.by_player.get(key)?.get(hash)
    }
}
