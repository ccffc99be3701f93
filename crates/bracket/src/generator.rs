use shared::domain::{Fencer, FencerId, Mode};
use tracing::{debug, warn};

use crate::{
    roster::RosterIndex,
    state::{BracketState, ConsolationRound, Match},
    BracketError,
};

const TEAM_PLACEMENT_ENTRANTS: usize = 16;

impl BracketState {
    pub fn generate(participant_count: usize, mode: Mode) -> Result<Self, BracketError> {
        if participant_count < 2 {
            return Err(BracketError::UnsupportedParticipantCount(participant_count));
        }

        // ceil(log2(n))
        let total_rounds = participant_count.next_power_of_two().trailing_zeros() as usize;
        let rounds = (0..total_rounds)
            .map(|round| {
                let matches_in_round = 1usize << (total_rounds - 1 - round);
                (0..matches_in_round)
                    .map(|index| Match::new(format!("round-{round}-match-{index}")))
                    .collect()
            })
            .collect();

        let consolation_rounds = if mode == Mode::Team && participant_count == TEAM_PLACEMENT_ENTRANTS
        {
            team_placement_rounds()
        } else {
            Vec::new()
        };

        debug!(participant_count, total_rounds, mode = mode.as_str(), "generated bracket");
        Ok(Self {
            total_rounds,
            rounds,
            consolation_rounds,
            mode,
        })
    }

    /// Seats the seeded list into round 0, rank i against rank n-1-i.
    /// Ids the roster does not know leave their slot empty. Returns the
    /// number of seated fencers.
    pub fn populate_first_round(&mut self, roster: &RosterIndex, seeded_ids: &[FencerId]) -> usize {
        let Some(first_round) = self.rounds.first_mut() else {
            return 0;
        };

        let entrants = seeded_ids.len();
        let mut seated = 0;
        for (index, bout) in first_round.iter_mut().enumerate() {
            bout.slot1 = None;
            bout.slot2 = None;
            bout.winner = None;

            let opposite = entrants.checked_sub(index + 1);
            let Some(opposite) = opposite.filter(|&opposite| opposite >= index) else {
                continue;
            };

            bout.slot1 = seat(roster, &seeded_ids[index]);
            if opposite > index {
                bout.slot2 = seat(roster, &seeded_ids[opposite]);
            }
            seated += usize::from(bout.slot1.is_some()) + usize::from(bout.slot2.is_some());
        }
        seated
    }
}

fn seat(roster: &RosterIndex, id: &FencerId) -> Option<Fencer> {
    let fencer = roster.lookup(id).cloned();
    if fencer.is_none() {
        warn!(fencer_id = %id, "seeded id not found in roster");
    }
    fencer
}

fn team_placement_rounds() -> Vec<ConsolationRound> {
    vec![
        ConsolationRound {
            title: "Places 5-8 (semifinal)".into(),
            matches: vec![
                Match::new("consolation-5-8-hf-0"),
                Match::new("consolation-5-8-hf-1"),
            ],
        },
        ConsolationRound {
            title: "Places 5/6 & 7/8".into(),
            matches: vec![
                Match::new("consolation-5-6-final"),
                Match::new("consolation-7-8-final"),
            ],
        },
        ConsolationRound {
            title: "3rd/4th place".into(),
            matches: vec![Match::new("consolation-3-4")],
        },
    ]
}

/// Operator-facing name of a main-draw round.
pub fn round_label(total_rounds: usize, round: usize) -> String {
    let remaining = 1usize << total_rounds.saturating_sub(round);
    match remaining {
        2 => "Final".to_string(),
        4 => "Semifinal".to_string(),
        _ => format!("Table of {remaining}"),
    }
}

#[cfg(test)]
#[path = "tests/generator_tests.rs"]
mod tests;
