//! Pairwise voting contests between an original champion and its counter.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;

use crate::types::Image;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// The three sub-modes of the inter-matchup vote cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteCycle {
    Voting,
    Result,
    Grace,
}

#[derive(Debug, Clone)]
pub struct Matchup {
    pub left: Image,
    pub right: Image,
    pub left_votes: HashSet<String>,
    pub right_votes: HashSet<String>,
    /// Which side the first recorded vote went to; feeds the comeback award.
    pub initial_leader: Option<Side>,
}

impl Matchup {
    pub fn new(left: Image, right: Image) -> Self {
        Self {
            left,
            right,
            left_votes: HashSet::new(),
            right_votes: HashSet::new(),
            initial_leader: None,
        }
    }

    /// Idempotently register a vote: a voter switching sides is moved, never
    /// counted twice.
    pub fn vote(&mut self, voter: &str, side: Side) {
        let key = voter.to_lowercase();
        if self.initial_leader.is_none() {
            self.initial_leader = Some(side);
        }
        match side {
            Side::Left => {
                self.right_votes.remove(&key);
                self.left_votes.insert(key);
            }
            Side::Right => {
                self.left_votes.remove(&key);
                self.right_votes.insert(key);
            }
        }
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.left_votes.len(), self.right_votes.len())
    }

    /// Artists of either side may not vote on their own matchup.
    pub fn is_artist(&self, username: &str) -> bool {
        self.left.has_artist(username) || self.right.has_artist(username)
    }

    /// Every distinct artist across both sides (lowercase keys).
    pub fn artist_keys(&self) -> HashSet<String> {
        self.left
            .artists
            .iter()
            .chain(self.right.artists.iter())
            .map(|a| a.to_lowercase())
            .collect()
    }

    pub fn image(&self, side: Side) -> &Image {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    pub fn image_mut(&mut self, side: Side) -> &mut Image {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// The side `username` drew for, if any.
    pub fn side_of(&self, username: &str) -> Option<Side> {
        if self.left.has_artist(username) {
            Some(Side::Left)
        } else if self.right.has_artist(username) {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn public_view(&self) -> serde_json::Value {
        json!({
            "left": self.left,
            "right": self.right,
            "prompt": self.left.prompt,
        })
    }
}

/// The ordered matchups of one vote event plus the cycle cursor.
#[derive(Debug)]
pub struct MatchupPool {
    pub matchups: Vec<Matchup>,
    /// -1 before the first matchup starts; only ever incremented.
    pub idx: isize,
    pub cycle: VoteCycle,
    pub deadline: Option<chrono::DateTime<chrono::Utc>>,
}

impl MatchupPool {
    pub fn new(matchups: Vec<Matchup>) -> Self {
        Self {
            matchups,
            idx: -1,
            cycle: VoteCycle::Grace,
            deadline: None,
        }
    }

    /// Move to the next matchup. False once the pool is exhausted.
    pub fn advance(&mut self) -> bool {
        self.idx += 1;
        (self.idx as usize) < self.matchups.len()
    }

    pub fn current(&self) -> Option<&Matchup> {
        usize::try_from(self.idx)
            .ok()
            .and_then(|i| self.matchups.get(i))
    }

    pub fn current_mut(&mut self) -> Option<&mut Matchup> {
        usize::try_from(self.idx)
            .ok()
            .and_then(|i| self.matchups.get_mut(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn image(artist: &str) -> Image {
        let mut img = Image::placeholder("a prompt", artist, Utc::now(), 90);
        img.title = format!("{artist}'s champ");
        img
    }

    fn matchup() -> Matchup {
        Matchup::new(image("Ann"), image("Ben"))
    }

    #[test]
    fn test_vote_idempotent_switch() {
        let mut m = matchup();
        m.vote("Cyn", Side::Left);
        m.vote("Cyn", Side::Right);
        assert_eq!(m.counts(), (0, 1));
        m.vote("CYN", Side::Left);
        assert_eq!(m.counts(), (1, 0));
    }

    #[test]
    fn test_initial_leader_sticks() {
        let mut m = matchup();
        m.vote("Cyn", Side::Right);
        m.vote("Dee", Side::Left);
        m.vote("Cyn", Side::Left);
        assert_eq!(m.initial_leader, Some(Side::Right));
    }

    #[test]
    fn test_artist_detection() {
        let m = matchup();
        assert!(m.is_artist("ann"));
        assert!(m.is_artist("Ben"));
        assert!(!m.is_artist("Cyn"));
        assert_eq!(m.side_of("Ben"), Some(Side::Right));
    }

    #[test]
    fn test_pool_cursor_bounds() {
        let mut pool = MatchupPool::new(vec![matchup(), matchup()]);
        assert_eq!(pool.idx, -1);
        assert!(pool.current().is_none());
        assert!(pool.advance());
        assert!(pool.current().is_some());
        assert!(pool.advance());
        assert!(!pool.advance());
        assert!(pool.current().is_none());
    }
}
