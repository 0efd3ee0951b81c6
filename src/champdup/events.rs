//! The fixed round-event sequence: draw, counter and vote twice over, an
//! optional bonus interlude, then the leaderboard.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventName {
    FirstDraw,
    FirstCounter,
    FirstVote,
    SecondDraw,
    SecondCounter,
    SecondVote,
    BonusRound,
    Leaderboard,
}

/// Which of the two draw/counter/vote rounds an event belongs to. Round two
/// pays doubled scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRound {
    One,
    Two,
}

impl EventName {
    pub fn round(self) -> MatchRound {
        match self {
            Self::FirstDraw | Self::FirstCounter | Self::FirstVote => MatchRound::One,
            _ => MatchRound::Two,
        }
    }

    pub fn is_draw(self) -> bool {
        matches!(self, Self::FirstDraw | Self::SecondDraw)
    }

    pub fn is_counter(self) -> bool {
        matches!(self, Self::FirstCounter | Self::SecondCounter)
    }

    pub fn is_vote(self) -> bool {
        matches!(self, Self::FirstVote | Self::SecondVote)
    }

    /// For a counter event, the draw event it counters.
    pub fn counter_source(self) -> Option<EventName> {
        match self {
            Self::FirstCounter => Some(Self::FirstDraw),
            Self::SecondCounter => Some(Self::SecondDraw),
            _ => None,
        }
    }

    /// For a vote event, the (draw, counter) pair feeding its matchups.
    pub fn vote_sources(self) -> Option<(EventName, EventName)> {
        match self {
            Self::FirstVote => Some((Self::FirstDraw, Self::FirstCounter)),
            Self::SecondVote => Some((Self::SecondDraw, Self::SecondCounter)),
            _ => None,
        }
    }
}

/// One step of the sequence. `ends` is set when the step starts, for
/// time-boxed steps only.
#[derive(Debug, Clone, Serialize)]
pub struct RoundEvent {
    pub name: EventName,
    pub timed: bool,
    pub ends: Option<DateTime<Utc>>,
}

impl RoundEvent {
    fn timed(name: EventName) -> Self {
        Self {
            name,
            timed: true,
            ends: None,
        }
    }

    fn untimed(name: EventName) -> Self {
        Self {
            name,
            timed: false,
            ends: None,
        }
    }
}

/// The declared event order. The cursor over this list starts at -1 and only
/// ever moves forward.
pub fn event_sequence() -> Vec<RoundEvent> {
    vec![
        RoundEvent::timed(EventName::FirstDraw),
        RoundEvent::timed(EventName::FirstCounter),
        RoundEvent::timed(EventName::FirstVote),
        RoundEvent::timed(EventName::SecondDraw),
        RoundEvent::timed(EventName::SecondCounter),
        RoundEvent::timed(EventName::SecondVote),
        RoundEvent::timed(EventName::BonusRound),
        RoundEvent::untimed(EventName::Leaderboard),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_order() {
        let names: Vec<EventName> = event_sequence().iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![
                EventName::FirstDraw,
                EventName::FirstCounter,
                EventName::FirstVote,
                EventName::SecondDraw,
                EventName::SecondCounter,
                EventName::SecondVote,
                EventName::BonusRound,
                EventName::Leaderboard,
            ]
        );
    }

    #[test]
    fn test_vote_sources() {
        assert_eq!(
            EventName::SecondVote.vote_sources(),
            Some((EventName::SecondDraw, EventName::SecondCounter))
        );
        assert_eq!(EventName::BonusRound.vote_sources(), None);
    }

    #[test]
    fn test_rounds() {
        assert_eq!(EventName::FirstVote.round(), MatchRound::One);
        assert_eq!(EventName::SecondDraw.round(), MatchRound::Two);
    }
}
