//! Matchup scoring: weighted base points, count-pattern bonuses, and the
//! independent award categories. Runs exactly once per matchup when the vote
//! deadline closes.

use serde::Serialize;

use super::events::MatchRound;
use super::matchup::{Matchup, Side};
use crate::types::{Award, AwardName};

pub const WINNER_SCALAR: i64 = 300;
pub const LOSER_SCALAR: i64 = 100;
pub const TIE_BONUS: i64 = 150;

pub const DOMINATION_BONUS: i64 = 500;
pub const ON_FIRE_BONUS: i64 = 250;
pub const BRUH_BONUS: i64 = 100;
pub const COMEBACK_BONUS: i64 = 300;
pub const FAST_BONUS: i64 = 200;
pub const PRIDE_BONUS: i64 = 100;

/// Title marker for the content-based award.
pub const PRIDE_MARKER: &str = "pride";

/// What one side takes home from a matchup.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SideOutcome {
    pub points: i64,
    pub awards: Vec<Award>,
}

impl SideOutcome {
    fn award(&mut self, name: AwardName, bonus: i64) {
        self.points += bonus;
        self.awards.push(Award { name, bonus });
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub winner: Side,
    pub left: SideOutcome,
    pub right: SideOutcome,
}

impl Verdict {
    pub fn side(&self, side: Side) -> &SideOutcome {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideOutcome {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }

    /// Awards shown on the leaderboard: only those attached to the winner.
    /// Points for the rest are still paid.
    pub fn display_awards(&self) -> Vec<Award> {
        self.side(self.winner).awards.clone()
    }
}

/// Score a closed matchup.
///
/// `total_players` is the session roster size; eligibility excludes both
/// sides' artists, and the count-pattern bonuses only pay out when more than
/// half of the eligible voters actually voted.
pub fn score_matchup(matchup: &Matchup, round: MatchRound, total_players: usize) -> Verdict {
    let (lv, rv) = matchup.counts();
    let multiplier = match round {
        MatchRound::One => 1,
        MatchRound::Two => 2,
    };
    let winner_scalar = WINNER_SCALAR * multiplier;
    let loser_scalar = LOSER_SCALAR * multiplier;

    let winner = if lv > rv {
        Side::Left
    } else if rv > lv {
        Side::Right
    } else {
        // Tie: the side that led the first vote keeps the crown; an
        // entirely voteless matchup defaults to the original.
        matchup.initial_leader.unwrap_or(Side::Left)
    };
    let loser = winner.other();
    let (winner_votes, loser_votes) = match winner {
        Side::Left => (lv as i64, rv as i64),
        Side::Right => (rv as i64, lv as i64),
    };

    let mut verdict = Verdict {
        winner,
        left: SideOutcome::default(),
        right: SideOutcome::default(),
    };

    if lv == rv {
        verdict.left.points += loser_scalar * lv as i64;
        verdict.right.points += loser_scalar * rv as i64;
        verdict.side_mut(winner).points += TIE_BONUS;
    } else {
        verdict.side_mut(winner).points += winner_scalar * winner_votes;
        verdict.side_mut(loser).points += loser_scalar * loser_votes;
    }

    let eligible = total_players.saturating_sub(matchup.artist_keys().len());
    let turnout_met = 2 * (lv + rv) > eligible;

    // Count-pattern bonuses; mutually exclusive by construction.
    if lv == 0 && rv == 0 {
        verdict.side_mut(winner).award(AwardName::Bruh, BRUH_BONUS);
    } else if (lv == 0) != (rv == 0) {
        if turnout_met {
            let side = if lv == 0 { Side::Right } else { Side::Left };
            verdict.side_mut(side).award(AwardName::Domination, DOMINATION_BONUS);
        }
    } else if lv.max(rv) > 2 * lv.min(rv) && turnout_met {
        let side = if lv > rv { Side::Left } else { Side::Right };
        verdict.side_mut(side).award(AwardName::OnFire, ON_FIRE_BONUS);
    }

    // Content award: paid to whichever side matches, win or lose.
    for side in [Side::Left, Side::Right] {
        if matchup
            .image(side)
            .title
            .to_lowercase()
            .contains(PRIDE_MARKER)
        {
            verdict.side_mut(side).award(AwardName::Pride, PRIDE_BONUS);
        }
    }

    // Comeback: the winner was behind after the first recorded vote.
    if matchup
        .initial_leader
        .is_some_and(|leader| leader != winner)
    {
        verdict.side_mut(winner).award(AwardName::Comeback, COMEBACK_BONUS);
    }

    // Timing: the winning champion was finished inside the first third of
    // its phase - or never touched at all, which counts as instant.
    let winning_image = matchup.image(winner);
    let fast = match winning_image.last_edit {
        None => true,
        Some(edited) => {
            let elapsed = (edited - winning_image.phase_started).num_seconds();
            elapsed >= 0 && elapsed as u64 * 3 <= winning_image.phase_secs
        }
    };
    if fast {
        verdict.side_mut(winner).award(AwardName::Fast, FAST_BONUS);
    }

    verdict
}
