//! Engine-level chat: plain messages, `/pm` private messages, `/poll`
//! yes/no polls. Handled uniformly for the host and players before a frame
//! reaches the game's own handlers.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashSet;

use super::Engine;
use crate::protocol::{ClientFrame, MessageType, NotifyKind, Outcome, Payload};
use crate::types::Author;

/// How long a `/poll` accepts votes.
pub const POLL_DURATION_SECS: i64 = 30;

/// A yes/no poll. Expiry is evaluated lazily at the next access; there is no
/// background sweep.
#[derive(Debug, Clone)]
pub struct Poll {
    pub prompt: String,
    pub ends: DateTime<Utc>,
    pub yes: HashSet<String>,
    pub no: HashSet<String>,
}

impl Poll {
    pub fn open(prompt: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            prompt: prompt.into(),
            ends: now + chrono::Duration::seconds(POLL_DURATION_SECS),
            yes: HashSet::new(),
            no: HashSet::new(),
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.ends
    }

    /// Register a vote, idempotently moving the voter between the disjoint
    /// sets. Returns false for an unrecognized choice.
    pub fn vote(&mut self, voter: &str, choice: &str) -> bool {
        let key = voter.to_lowercase();
        match choice {
            "yes" => {
                self.no.remove(&key);
                self.yes.insert(key);
                true
            }
            "no" => {
                self.yes.remove(&key);
                self.no.insert(key);
                true
            }
            _ => false,
        }
    }

    pub fn tally(&self) -> serde_json::Value {
        json!({
            "prompt": self.prompt,
            "ends": self.ends,
            "yes": self.yes.len(),
            "no": self.no.len(),
        })
    }
}

/// Handle engine-level frames; `None` means the frame belongs to the game.
pub fn intercept<A>(engine: &mut Engine, author: &Author, frame: &ClientFrame) -> Option<Outcome<A>> {
    match frame.kind {
        MessageType::Chat => Some(handle_chat(engine, author, &frame.value)),
        MessageType::PollVote => Some(handle_poll_vote(engine, author, &frame.value)),
        _ => None,
    }
}

fn handle_chat<A>(engine: &mut Engine, author: &Author, value: &serde_json::Value) -> Outcome<A> {
    let mut outcome = Outcome::new();
    let Some(text) = value.as_str() else {
        outcome.notify(NotifyKind::Fail, "Chat messages must be text");
        return outcome;
    };
    if let Some(args) = text.strip_prefix("/pm ") {
        return handle_pm(engine, author, args);
    }
    if let Some(prompt) = text.strip_prefix("/poll ") {
        return handle_poll_open(engine, prompt);
    }
    outcome.add_broadcast_from(MessageType::Chat, json!(text), author.clone());
    outcome
}

fn handle_pm<A>(engine: &Engine, author: &Author, args: &str) -> Outcome<A> {
    let mut outcome = Outcome::new();
    let names: Vec<&str> = engine
        .players
        .values()
        .map(|p| p.username.as_str())
        .collect();
    let Some((target, text)) = match_pm_target(&names, author.username(), args) else {
        outcome.notify(NotifyKind::Fail, "Usage: /pm <name> <message>");
        return outcome;
    };
    let value = json!({
        "from": author.clone(),
        "to": target,
        "text": text,
    });
    // Delivered to exactly two connections: the sender and the target.
    outcome.add_reply(MessageType::Pm, value.clone());
    outcome.add_direct(target, Payload::new(MessageType::Pm, value));
    outcome
}

fn handle_poll_open<A>(engine: &mut Engine, prompt: &str) -> Outcome<A> {
    let mut outcome = Outcome::new();
    let now = Utc::now();
    if engine.poll.as_ref().is_some_and(|p| p.is_live(now)) {
        outcome.notify(NotifyKind::Fail, "A poll is already running");
        return outcome;
    }
    let poll = Poll::open(prompt.trim(), now);
    outcome.add_broadcast(MessageType::Poll, poll.tally());
    engine.poll = Some(poll);
    outcome
}

fn handle_poll_vote<A>(engine: &mut Engine, author: &Author, value: &serde_json::Value) -> Outcome<A> {
    let mut outcome = Outcome::new();
    let Some(voter) = author.username() else {
        // The host moderates polls, it does not vote in them.
        return outcome;
    };
    let now = Utc::now();
    let Some(poll) = engine.poll.as_mut().filter(|p| p.is_live(now)) else {
        outcome.notify(NotifyKind::Info, "No poll is running");
        return outcome;
    };
    let Some(choice) = value.as_str() else {
        return outcome;
    };
    if poll.vote(voter, choice) {
        outcome.add_broadcast(MessageType::PollVote, poll.tally());
    }
    outcome
}

/// Greedy longest-prefix match of `/pm` arguments against player names.
///
/// Words are accumulated left to right; after each word the accumulated
/// prefix is tested against every name, scanned sorted by length (then
/// alphabetically), and the first hit wins that length - longer
/// accumulations replace shorter ones. Accumulation stops once the prefix
/// outgrows the longest name. The sender never matches themselves. Returns
/// the matched name and the remaining message text.
pub fn match_pm_target<'a>(
    names: &[&'a str],
    sender: Option<&str>,
    args: &str,
) -> Option<(&'a str, String)> {
    let mut candidates: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| sender.is_none_or(|s| !n.eq_ignore_ascii_case(s)))
        .collect();
    candidates.sort_by_key(|n| (n.len(), n.to_lowercase()));
    let max_len = candidates.iter().map(|n| n.len()).max()?;

    let words: Vec<&str> = args.split_whitespace().collect();
    let mut best: Option<(&str, usize)> = None;
    let mut accumulated = String::new();
    for (i, word) in words.iter().enumerate() {
        if !accumulated.is_empty() {
            accumulated.push(' ');
        }
        accumulated.push_str(word);
        if accumulated.len() > max_len {
            break;
        }
        let needle = accumulated.to_lowercase();
        if let Some(name) = candidates
            .iter()
            .find(|n| n.to_lowercase().starts_with(&needle))
        {
            best = Some((name, i + 1));
        }
    }

    let (name, consumed) = best?;
    let text = words[consumed..].join(" ");
    if text.is_empty() {
        return None;
    }
    Some((name, text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pm_matches_exact_name() {
        let names = ["Ann", "Ben"];
        let (target, text) = match_pm_target(&names, Some("Ann"), "Ben hello there").unwrap();
        assert_eq!(target, "Ben");
        assert_eq!(text, "hello there");
    }

    #[test]
    fn test_pm_prefix_match() {
        let names = ["Benjamin"];
        let (target, text) = match_pm_target(&names, None, "benj hi").unwrap();
        assert_eq!(target, "Benjamin");
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_pm_tie_breaks_on_shortest_name() {
        let names = ["Benny", "Ben"];
        let (target, _) = match_pm_target(&names, None, "Ben hi").unwrap();
        assert_eq!(target, "Ben");
    }

    #[test]
    fn test_pm_longer_accumulation_wins() {
        let names = ["Big", "Big Ben"];
        let (target, text) = match_pm_target(&names, None, "Big Ben hi").unwrap();
        assert_eq!(target, "Big Ben");
        assert_eq!(text, "hi");
    }

    #[test]
    fn test_pm_never_matches_sender() {
        let names = ["Ben", "Benny"];
        let (target, _) = match_pm_target(&names, Some("Ben"), "ben hi").unwrap();
        assert_eq!(target, "Benny");
    }

    #[test]
    fn test_pm_requires_text() {
        let names = ["Ben"];
        assert!(match_pm_target(&names, None, "Ben").is_none());
        assert!(match_pm_target(&names, None, "nobody hi").is_none());
    }

    #[test]
    fn test_poll_vote_idempotent_move() {
        let mut poll = Poll::open("pizza?", Utc::now());
        assert!(poll.vote("Ann", "yes"));
        assert!(poll.vote("Ann", "no"));
        assert!(poll.vote("ann", "no"));
        assert!(!poll.yes.contains("ann"));
        assert_eq!(poll.no.len(), 1);
        assert!(!poll.vote("Ann", "maybe"));
    }

    #[test]
    fn test_poll_lazy_expiry_allows_reopen() {
        let mut engine = Engine::new("TESTID".to_string());
        let mut expired = Poll::open("old?", Utc::now());
        expired.ends = Utc::now() - chrono::Duration::seconds(1);
        expired.yes.insert("ann".into());
        engine.poll = Some(expired);

        // A past deadline means inactive on next access, whatever its state.
        let outcome: Outcome<()> = handle_poll_open(&mut engine, "new?");
        assert_eq!(outcome.broadcasts.len(), 1);
        assert_eq!(engine.poll.as_ref().unwrap().prompt, "new?");
        assert!(engine.poll.as_ref().unwrap().yes.is_empty());
    }

    #[test]
    fn test_poll_open_rejected_while_live() {
        let mut engine = Engine::new("TESTID".to_string());
        let first: Outcome<()> = handle_poll_open(&mut engine, "first?");
        assert!(!first.broadcasts.is_empty());
        let second: Outcome<()> = handle_poll_open(&mut engine, "second?");
        assert!(second.broadcasts.is_empty());
        assert_eq!(engine.poll.as_ref().unwrap().prompt, "first?");
    }

    #[test]
    fn test_expired_poll_rejects_votes() {
        let mut engine = Engine::new("TESTID".to_string());
        let mut poll = Poll::open("late?", Utc::now());
        poll.ends = Utc::now() - chrono::Duration::seconds(1);
        engine.poll = Some(poll);
        let author = Author::player(crate::types::Player::new("Ann"));
        let outcome: Outcome<()> =
            handle_poll_vote(&mut engine, &author, &serde_json::json!("yes"));
        assert!(outcome.broadcasts.is_empty());
        assert!(engine.poll.as_ref().unwrap().yes.is_empty());
    }
}
