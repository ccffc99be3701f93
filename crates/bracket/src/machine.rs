//! Winner selection and retraction for the main draw and the team
//! placement rounds.
//!
//! Placement routing only exists for a 16-entrant team bracket:
//!
//! | source                          | routed fencer | target                                  |
//! |---------------------------------|---------------|-----------------------------------------|
//! | main round 1 (quarterfinal) m   | loser         | placement semifinal `m / 2`, slot by `m % 2` |
//! | main round 2 (semifinal) m      | loser         | 3rd/4th match, slot by `m`              |
//! | placement semifinal s           | winner        | 5/6 final, slot by `s`                  |
//! | placement semifinal s           | loser         | 7/8 final, slot by `s`                  |
//!
//! The finals and the 3rd/4th match are terminal.

use shared::domain::{Fencer, FencerId, Mode, Slot};
use tracing::debug;

use crate::{
    state::{BracketState, LaneAssignment, MatchRef},
    BracketError, Mutation,
};

const QUARTERFINAL_ROUND: usize = 1;
const SEMIFINAL_ROUND: usize = 2;
const PLACEMENT_SEMIFINALS: usize = 0;
const PLACEMENT_FINALS: usize = 1;
const THIRD_PLACE: usize = 2;
const HIGHER_FINAL: usize = 0;
const LOWER_FINAL: usize = 1;
const TEAM_FIRST_ROUND_MATCHES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Seat {
    round: usize,
    index: usize,
    slot: Slot,
}

fn slot_for_index(index: usize) -> Slot {
    if index % 2 == 0 {
        Slot::One
    } else {
        Slot::Two
    }
}

fn loser_seat(round: usize, index: usize) -> Option<Seat> {
    match (round, index) {
        (QUARTERFINAL_ROUND, 0..=3) => Some(Seat {
            round: PLACEMENT_SEMIFINALS,
            index: index / 2,
            slot: slot_for_index(index),
        }),
        (SEMIFINAL_ROUND, 0..=1) => Some(Seat {
            round: THIRD_PLACE,
            index: 0,
            slot: slot_for_index(index),
        }),
        _ => None,
    }
}

fn placement_final_seats(semifinal: usize) -> (Seat, Seat) {
    let slot = slot_for_index(semifinal);
    (
        Seat {
            round: PLACEMENT_FINALS,
            index: HIGHER_FINAL,
            slot,
        },
        Seat {
            round: PLACEMENT_FINALS,
            index: LOWER_FINAL,
            slot,
        },
    )
}

impl BracketState {
    /// Whether losers are routed into the placement rounds.
    pub fn placement_routing_enabled(&self) -> bool {
        self.mode == Mode::Team
            && self.first_round_size() == TEAM_FIRST_ROUND_MATCHES
            && self.consolation_rounds.len() > THIRD_PLACE
    }

    pub fn select_winner(
        &mut self,
        round: usize,
        index: usize,
        slot: Slot,
    ) -> Result<Mutation, BracketError> {
        let target = MatchRef::Main { round, index };
        let bout = self.match_at(target)?;
        let Some(fencer) = bout.slot(slot).cloned() else {
            return Ok(Mutation::Unchanged);
        };
        if bout.winner.as_ref() == Some(&fencer) {
            return Ok(Mutation::Unchanged);
        }
        if bout.winner.is_some() {
            self.retract_main(round, index);
        }

        let bout = &mut self.rounds[round][index];
        let loser = bout.slot(slot.other()).cloned();
        bout.winner = Some(fencer.clone());

        if let Some(next_round) = self.rounds.get_mut(round + 1) {
            *next_round[index / 2].slot_mut(slot_for_index(index)) = Some(fencer.clone());
        }

        if let Some(loser) = loser {
            if self.placement_routing_enabled() {
                if let Some(seat) = loser_seat(round, index) {
                    self.seat_in_placement(seat, loser);
                }
            }
        }

        debug!(round, index, fencer_id = %fencer.id, "winner selected");
        Ok(Mutation::Applied)
    }

    pub fn clear_winner(&mut self, round: usize, index: usize) -> Result<Mutation, BracketError> {
        self.check(MatchRef::Main { round, index })?;
        let cleared = self.retract_main(round, index);
        if cleared {
            debug!(round, index, "winner cleared");
        }
        Ok(Mutation::from_changed(cleared))
    }

    pub fn select_consolation_winner(
        &mut self,
        round: usize,
        index: usize,
        slot: Slot,
    ) -> Result<Mutation, BracketError> {
        let bout = self.match_at(MatchRef::Consolation { round, index })?;
        let Some(fencer) = bout.slot(slot).cloned() else {
            return Ok(Mutation::Unchanged);
        };
        if bout.winner.as_ref() == Some(&fencer) {
            return Ok(Mutation::Unchanged);
        }
        let loser = bout.slot(slot.other()).cloned();

        self.consolation_rounds[round].matches[index].winner = Some(fencer.clone());
        if round == PLACEMENT_SEMIFINALS && self.placement_routing_enabled() {
            self.seat_placement_finals(index, &fencer, loser.as_ref());
        }

        debug!(round, index, fencer_id = %fencer.id, "placement winner selected");
        Ok(Mutation::Applied)
    }

    pub fn clear_consolation_winner(
        &mut self,
        round: usize,
        index: usize,
    ) -> Result<Mutation, BracketError> {
        self.check(MatchRef::Consolation { round, index })?;
        let cleared = self.retract_consolation(round, index);
        Ok(Mutation::from_changed(cleared))
    }

    pub fn set_lane_override(
        &mut self,
        target: MatchRef,
        lane: LaneAssignment,
    ) -> Result<Mutation, BracketError> {
        let bout = self.match_mut(target)?;
        if bout.lane == lane {
            return Ok(Mutation::Unchanged);
        }
        bout.lane = lane;
        Ok(Mutation::Applied)
    }

    /// Exchanges the two slots of a main-draw match. Attendance is not part of
    /// the bracket; callers swap it alongside.
    pub fn swap_sides(&mut self, round: usize, index: usize) -> Result<Mutation, BracketError> {
        let bout = self.match_mut(MatchRef::Main { round, index })?;
        if bout.slot1.is_none() && bout.slot2.is_none() {
            return Ok(Mutation::Unchanged);
        }
        std::mem::swap(&mut bout.slot1, &mut bout.slot2);
        Ok(Mutation::Applied)
    }

    fn retract_main(&mut self, round: usize, index: usize) -> bool {
        let bout = &mut self.rounds[round][index];
        let loser = bout.loser().map(|fencer| fencer.id.clone());
        let Some(removed) = bout.winner.take() else {
            return false;
        };

        let mut placement_purges: Vec<FencerId> = loser.into_iter().collect();
        placement_purges.push(removed.id.clone());

        for later in self.rounds.iter_mut().skip(round + 1) {
            for bout in later.iter_mut() {
                if bout.winner.as_ref() == Some(&removed) {
                    if let Some(beaten) = bout.loser() {
                        placement_purges.push(beaten.id.clone());
                    }
                }
                bout.purge(&removed.id);
            }
        }

        for fencer_id in &placement_purges {
            self.purge_from_placement(fencer_id);
        }
        true
    }

    fn retract_consolation(&mut self, round: usize, index: usize) -> bool {
        let bout = &mut self.consolation_rounds[round].matches[index];
        if bout.winner.take().is_none() {
            return false;
        }
        if round == PLACEMENT_SEMIFINALS && self.placement_routing_enabled() {
            let bout = &self.consolation_rounds[round].matches[index];
            let seated: Vec<FencerId> = [&bout.slot1, &bout.slot2]
                .into_iter()
                .flatten()
                .map(|fencer| fencer.id.clone())
                .collect();
            self.purge_from_finals(&seated);
        }
        true
    }

    /// Removes a fencer from every placement match. A resolved semifinal the
    /// fencer took part in is voided along with what it seated in the finals.
    fn purge_from_placement(&mut self, fencer_id: &FencerId) {
        if self.consolation_rounds.is_empty() {
            return;
        }
        if self.placement_routing_enabled() {
            let affected: Vec<usize> = self.consolation_rounds[PLACEMENT_SEMIFINALS]
                .matches
                .iter()
                .enumerate()
                .filter(|(_, bout)| bout.winner.is_some() && bout.contains(fencer_id))
                .map(|(index, _)| index)
                .collect();
            for index in affected {
                self.retract_consolation(PLACEMENT_SEMIFINALS, index);
            }
        }
        for placement in &mut self.consolation_rounds {
            for bout in &mut placement.matches {
                bout.purge(fencer_id);
            }
        }
    }

    fn purge_from_finals(&mut self, fencer_ids: &[FencerId]) {
        let Some(finals) = self.consolation_rounds.get_mut(PLACEMENT_FINALS) else {
            return;
        };
        for bout in &mut finals.matches {
            for fencer_id in fencer_ids {
                bout.purge(fencer_id);
            }
        }
    }

    fn seat_in_placement(&mut self, seat: Seat, fencer: Fencer) {
        let occupant = self.consolation_rounds[seat.round].matches[seat.index]
            .slot(seat.slot)
            .map(|occupant| occupant.id.clone());
        if let Some(occupant) = occupant.filter(|occupant| occupant != &fencer.id) {
            self.purge_from_placement(&occupant);
        }
        self.purge_from_placement(&fencer.id);
        *self.consolation_rounds[seat.round].matches[seat.index].slot_mut(seat.slot) = Some(fencer);
    }

    fn seat_placement_finals(&mut self, semifinal: usize, winner: &Fencer, loser: Option<&Fencer>) {
        let mut seated = vec![winner.id.clone()];
        seated.extend(loser.map(|fencer| fencer.id.clone()));
        self.purge_from_finals(&seated);

        let (higher, lower) = placement_final_seats(semifinal);
        let finals = &mut self.consolation_rounds[PLACEMENT_FINALS].matches;
        *finals[higher.index].slot_mut(higher.slot) = Some(winner.clone());
        if let Some(loser) = loser {
            *finals[lower.index].slot_mut(lower.slot) = Some(loser.clone());
        }
    }
}

#[cfg(test)]
#[path = "tests/machine_tests.rs"]
mod tests;
