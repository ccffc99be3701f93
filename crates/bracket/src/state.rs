use serde::{Deserialize, Serialize};
use shared::domain::{Fencer, FencerId, MatchId, Mode, Slot};

use crate::BracketError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LaneAssignment {
    #[default]
    Automatic,
    Manual {
        lane: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub slot1: Option<Fencer>,
    pub slot2: Option<Fencer>,
    pub winner: Option<Fencer>,
    #[serde(default)]
    pub lane: LaneAssignment,
}

impl Match {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: MatchId::new(id),
            slot1: None,
            slot2: None,
            winner: None,
            lane: LaneAssignment::Automatic,
        }
    }

    pub fn slot(&self, slot: Slot) -> Option<&Fencer> {
        match slot {
            Slot::One => self.slot1.as_ref(),
            Slot::Two => self.slot2.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: Slot) -> &mut Option<Fencer> {
        match slot {
            Slot::One => &mut self.slot1,
            Slot::Two => &mut self.slot2,
        }
    }

    pub fn is_open(&self) -> bool {
        self.winner.is_none()
    }

    /// The fencer in the slot opposite the winner.
    pub fn loser(&self) -> Option<&Fencer> {
        let winner = self.winner.as_ref()?;
        if self.slot1.as_ref() == Some(winner) {
            self.slot2.as_ref()
        } else if self.slot2.as_ref() == Some(winner) {
            self.slot1.as_ref()
        } else {
            None
        }
    }

    pub fn contains(&self, fencer_id: &FencerId) -> bool {
        [&self.slot1, &self.slot2, &self.winner]
            .into_iter()
            .flatten()
            .any(|fencer| &fencer.id == fencer_id)
    }

    /// Nulls every slot or winner field holding `fencer_id`.
    pub(crate) fn purge(&mut self, fencer_id: &FencerId) -> bool {
        let mut changed = false;
        for field in [&mut self.slot1, &mut self.slot2, &mut self.winner] {
            if field.as_ref().is_some_and(|fencer| &fencer.id == fencer_id) {
                *field = None;
                changed = true;
            }
        }
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolationRound {
    pub title: String,
    pub matches: Vec<Match>,
}

/// Addresses a match in either the main draw or a placement round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchRef {
    Main { round: usize, index: usize },
    Consolation { round: usize, index: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketState {
    pub total_rounds: usize,
    pub rounds: Vec<Vec<Match>>,
    #[serde(default)]
    pub consolation_rounds: Vec<ConsolationRound>,
    pub mode: Mode,
}

impl BracketState {
    pub fn first_round_size(&self) -> usize {
        self.rounds.first().map_or(0, Vec::len)
    }

    pub fn round(&self, round: usize) -> Result<&[Match], BracketError> {
        self.rounds
            .get(round)
            .map(Vec::as_slice)
            .ok_or(BracketError::RoundOutOfRange {
                round,
                available: self.rounds.len(),
            })
    }

    pub fn match_at(&self, target: MatchRef) -> Result<&Match, BracketError> {
        self.check(target)?;
        Ok(match target {
            MatchRef::Main { round, index } => &self.rounds[round][index],
            MatchRef::Consolation { round, index } => &self.consolation_rounds[round].matches[index],
        })
    }

    pub(crate) fn match_mut(&mut self, target: MatchRef) -> Result<&mut Match, BracketError> {
        self.check(target)?;
        Ok(match target {
            MatchRef::Main { round, index } => &mut self.rounds[round][index],
            MatchRef::Consolation { round, index } => {
                &mut self.consolation_rounds[round].matches[index]
            }
        })
    }

    pub(crate) fn check(&self, target: MatchRef) -> Result<(), BracketError> {
        match target {
            MatchRef::Main { round, index } => {
                let matches = self.round(round)?;
                if index >= matches.len() {
                    return Err(BracketError::MatchOutOfRange {
                        round,
                        index,
                        available: matches.len(),
                    });
                }
            }
            MatchRef::Consolation { round, index } => {
                let Some(placement) = self.consolation_rounds.get(round) else {
                    return Err(BracketError::PlacementRoundOutOfRange {
                        round,
                        available: self.consolation_rounds.len(),
                    });
                };
                if index >= placement.matches.len() {
                    return Err(BracketError::PlacementMatchOutOfRange {
                        round,
                        index,
                        available: placement.matches.len(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn champion(&self) -> Option<&Fencer> {
        self.rounds.last()?.first()?.winner.as_ref()
    }
}
