use std::collections::BTreeMap;

use serde::Serialize;

use crate::record::{Fixture, PlayoffMatch, Record, Round};

pub const DEFAULT_PLAYOFF_LEGS: usize = 2;

/// What happened to a bracket slot after one of its legs received a score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Some legs of the slot are still unplayed.
    Pending,
    /// Aggregate level after all legs; one more leg was scheduled.
    Replay,
    /// Winner (and, out of a semifinal, loser) moved on.
    Decided {
        winner: String,
        loser: String,
        next: Option<Round>,
        third_place: bool,
    },
}

/// Goals over all played legs of one slot, from the view of the slot's id0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Aggregate {
    pub id0: Option<String>,
    pub id1: Option<String>,
    pub goals0: u32,
    pub goals1: u32,
    pub legs: usize,
    pub legs_played: usize,
}

impl Aggregate {
    pub fn is_complete(&self) -> bool {
        self.legs > 0 && self.legs == self.legs_played
    }

    /// `(winner, loser)` when every leg is played and the aggregate is not level.
    pub fn outcome(&self) -> Option<(String, String)> {
        if !self.is_complete() || self.goals0 == self.goals1 {
            return None;
        }
        let (Some(id0), Some(id1)) = (self.id0.clone(), self.id1.clone()) else {
            return None;
        };
        if self.goals0 > self.goals1 {
            Some((id0, id1))
        } else {
            Some((id1, id0))
        }
    }
}

/// Depth of the first knockout round for `pairs` first-round ties.
pub fn first_round(pairs: usize) -> Round {
    Round::Knockout {
        depth: pairs.max(1).trailing_zeros(),
    }
}

/// Full placeholder bracket: drawn pairs in the first round, empty slots for
/// every later round down to the final, and a third-place match when a
/// semifinal exists. Every slot gets `legs` records.
pub fn build_bracket(pairs: &[(String, String)], legs: usize) -> Vec<Record> {
    let legs = legs.max(1);
    let first = first_round(pairs.len());
    let mut records = Vec::new();

    for (slot, (a, b)) in pairs.iter().enumerate() {
        push_legs(&mut records, first, slot, Fixture::scheduled(a, b), legs);
    }

    let mut round = first.next();
    while let Some(current) = round {
        for slot in 0..current.slots() {
            push_legs(&mut records, current, slot, Fixture::placeholder(), legs);
        }
        round = current.next();
    }

    if matches!(first, Round::Knockout { depth } if depth >= 1) {
        push_legs(&mut records, Round::ThirdPlace, 0, Fixture::placeholder(), legs);
    }
    records
}

fn push_legs(records: &mut Vec<Record>, round: Round, slot: usize, fixture: Fixture, legs: usize) {
    for _ in 0..legs {
        records.push(Record::Playoff(PlayoffMatch {
            round,
            slot,
            fixture: fixture.clone(),
        }));
    }
}

fn slot_legs(records: &[Record], round: Round, slot: usize) -> impl Iterator<Item = (usize, &PlayoffMatch)> {
    records
        .iter()
        .enumerate()
        .filter_map(move |(idx, record)| match record {
            Record::Playoff(m) if m.round == round && m.slot == slot => Some((idx, m)),
            _ => None,
        })
}

pub fn aggregate(records: &[Record], round: Round, slot: usize) -> Aggregate {
    let mut agg = Aggregate {
        id0: None,
        id1: None,
        goals0: 0,
        goals1: 0,
        legs: 0,
        legs_played: 0,
    };
    for (_, leg) in slot_legs(records, round, slot) {
        let fixture = &leg.fixture;
        if agg.legs == 0 {
            agg.id0 = fixture.id0.clone();
            agg.id1 = fixture.id1.clone();
        }
        agg.legs += 1;
        let Some(score) = fixture.score else {
            continue;
        };
        agg.legs_played += 1;
        // Legs stored in the opposite orientation still count for the right side.
        let (mine, theirs) = if fixture.id0 == agg.id0 {
            (score.g0, score.g1)
        } else {
            (score.g1, score.g0)
        };
        agg.goals0 = agg.goals0.saturating_add(mine);
        agg.goals1 = agg.goals1.saturating_add(theirs);
    }
    agg
}

/// Re-evaluates `(round, slot)` after a leg was scored and applies the result
/// to the record set: a level aggregate schedules a replay leg right after
/// the existing legs, a decided one fills the next round (and the third-place
/// match out of a semifinal).
pub fn advance(records: &mut Vec<Record>, round: Round, slot: usize) -> Advance {
    let agg = aggregate(records, round, slot);
    if !agg.is_complete() {
        return Advance::Pending;
    }

    let Some((winner, loser)) = agg.outcome() else {
        let Some(last) = slot_legs(records, round, slot).map(|(idx, _)| idx).last() else {
            return Advance::Pending;
        };
        records.insert(
            last + 1,
            Record::Playoff(PlayoffMatch {
                round,
                slot,
                fixture: Fixture {
                    id0: agg.id0.clone(),
                    id1: agg.id1.clone(),
                    score: None,
                },
            }),
        );
        return Advance::Replay;
    };

    let next = round.next();
    if let Some(next_round) = next {
        fill_slot(records, next_round, slot / 2, &winner);
    }
    let third_place = round == Round::SEMIFINAL;
    if third_place {
        fill_slot(records, Round::ThirdPlace, 0, &loser);
    }
    Advance::Decided {
        winner,
        loser,
        next,
        third_place,
    }
}

fn fill_slot(records: &mut [Record], round: Round, slot: usize, id: &str) {
    for record in records.iter_mut() {
        if let Record::Playoff(m) = record
            && m.round == round
            && m.slot == slot
            && !m.fixture.involves(id)
        {
            m.fixture.fill_empty_side(id);
        }
    }
}

/// Every `(round, slot)` present in the record set, in bracket display order.
pub fn bracket_slots(records: &[Record]) -> BTreeMap<(i64, usize), Round> {
    records
        .iter()
        .filter_map(|record| match record {
            Record::Playoff(m) => Some(((m.round.display_order(), m.slot), m.round)),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Podium {
    pub gold: String,
    pub silver: String,
    pub bronze: Option<String>,
}

/// Reads the final and third-place aggregates. `None` until the final is decided.
pub fn podium(records: &[Record]) -> Option<Podium> {
    let (gold, silver) = aggregate(records, Round::FINAL, 0).outcome()?;
    let bronze = aggregate(records, Round::ThirdPlace, 0)
        .outcome()
        .map(|(winner, _)| winner);
    Some(Podium {
        gold,
        silver,
        bronze,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_round_depth_follows_pair_count() {
        assert_eq!(first_round(1), Round::FINAL);
        assert_eq!(first_round(2), Round::SEMIFINAL);
        assert_eq!(first_round(4), Round::Knockout { depth: 2 });
        assert_eq!(first_round(8), Round::Knockout { depth: 3 });
    }

    #[test]
    fn single_pair_bracket_has_no_third_place() {
        let pairs = vec![("a".to_string(), "b".to_string())];
        let records = build_bracket(&pairs, 2);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| matches!(
            r,
            Record::Playoff(PlayoffMatch { round: Round::Knockout { depth: 0 }, .. })
        )));
    }
}
