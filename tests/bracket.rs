use fc_league::bracket::{Advance, advance, aggregate, build_bracket, podium};
use fc_league::record::{PlayoffMatch, Round};
use fc_league::{Record, Score};

const QUARTER: Round = Round::Knockout { depth: 2 };

fn four_pairs() -> Vec<(String, String)> {
    (1..=4)
        .map(|i| (format!("s{i}"), format!("u{i}")))
        .collect()
}

fn leg_indices(records: &[Record], round: Round, slot: usize) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter_map(|(idx, r)| match r {
            Record::Playoff(m) if m.round == round && m.slot == slot => Some(idx),
            _ => None,
        })
        .collect()
}

fn score_leg(records: &mut [Record], round: Round, slot: usize, leg: usize, score: Score) {
    let idx = leg_indices(records, round, slot)[leg];
    records[idx]
        .fixture_mut()
        .expect("playoff record has a fixture")
        .score = Some(score);
}

fn playoff(record: &Record) -> &PlayoffMatch {
    match record {
        Record::Playoff(m) => m,
        other => panic!("expected playoff record, got {other:?}"),
    }
}

#[test]
fn four_pair_bracket_is_fully_pre_created() {
    let records = build_bracket(&four_pairs(), 2);
    assert_eq!(records.len(), 4 * 2 + 2 * 2 + 2 + 2);
    assert_eq!(leg_indices(&records, QUARTER, 3).len(), 2);
    assert_eq!(leg_indices(&records, Round::SEMIFINAL, 1).len(), 2);
    assert_eq!(leg_indices(&records, Round::ThirdPlace, 0).len(), 2);
    for idx in leg_indices(&records, Round::FINAL, 0) {
        let fixture = &playoff(&records[idx]).fixture;
        assert!(fixture.id0.is_none() && fixture.id1.is_none());
    }
}

#[test]
fn decisive_quarter_fills_one_semifinal_side() {
    let mut records = build_bracket(&four_pairs(), 2);
    score_leg(&mut records, QUARTER, 2, 0, Score::new(2, 0));
    assert_eq!(advance(&mut records, QUARTER, 2), Advance::Pending);

    score_leg(&mut records, QUARTER, 2, 1, Score::new(1, 1));
    let before = records.clone();
    let outcome = advance(&mut records, QUARTER, 2);
    assert_eq!(
        outcome,
        Advance::Decided {
            winner: "s3".to_string(),
            loser: "u3".to_string(),
            next: Some(Round::SEMIFINAL),
            third_place: false,
        }
    );

    assert_eq!(records.len(), before.len());
    let semi = leg_indices(&records, Round::SEMIFINAL, 1);
    for (idx, (after, prior)) in records.iter().zip(before.iter()).enumerate() {
        if semi.contains(&idx) {
            let fixture = &playoff(after).fixture;
            assert_eq!(fixture.id0.as_deref(), Some("s3"));
            assert_eq!(fixture.id1, None);
        } else {
            assert_eq!(after, prior, "record {idx} should be untouched");
        }
    }
}

#[test]
fn level_aggregate_appends_one_replay_leg() {
    let mut records = build_bracket(&four_pairs(), 2);
    score_leg(&mut records, QUARTER, 0, 0, Score::new(1, 0));
    score_leg(&mut records, QUARTER, 0, 1, Score::new(0, 1));

    let before = records.clone();
    assert_eq!(advance(&mut records, QUARTER, 0), Advance::Replay);
    assert_eq!(records.len(), before.len() + 1);

    let legs = leg_indices(&records, QUARTER, 0);
    assert_eq!(legs, vec![0, 1, 2]);
    let replay = &playoff(&records[2]).fixture;
    assert_eq!(replay.id0.as_deref(), Some("s1"));
    assert_eq!(replay.id1.as_deref(), Some("u1"));
    assert!(replay.score.is_none());

    assert_eq!(&records[..2], &before[..2]);
    assert_eq!(&records[3..], &before[2..]);
}

#[test]
fn legs_stored_reversed_count_for_the_right_side() {
    let mut records = build_bracket(&[("a".to_string(), "b".to_string())], 2);
    score_leg(&mut records, Round::FINAL, 0, 0, Score::new(1, 0));
    let idx = leg_indices(&records, Round::FINAL, 0)[1];
    if let Record::Playoff(m) = &mut records[idx] {
        m.fixture.id0 = Some("b".to_string());
        m.fixture.id1 = Some("a".to_string());
        m.fixture.score = Some(Score::new(3, 0));
    }
    let agg = aggregate(&records, Round::FINAL, 0);
    assert_eq!((agg.goals0, agg.goals1), (1, 3));
    assert_eq!(agg.outcome(), Some(("b".to_string(), "a".to_string())));
}

#[test]
fn semifinal_losers_meet_for_third_place() {
    let pairs = vec![
        ("a".to_string(), "b".to_string()),
        ("c".to_string(), "d".to_string()),
    ];
    let mut records = build_bracket(&pairs, 1);
    score_leg(&mut records, Round::SEMIFINAL, 0, 0, Score::new(2, 1));
    score_leg(&mut records, Round::SEMIFINAL, 1, 0, Score::new(0, 1));
    advance(&mut records, Round::SEMIFINAL, 0);
    let decided = advance(&mut records, Round::SEMIFINAL, 1);
    assert!(matches!(decided, Advance::Decided { third_place: true, .. }));

    let final_leg = &playoff(&records[leg_indices(&records, Round::FINAL, 0)[0]]).fixture;
    assert_eq!(final_leg.id0.as_deref(), Some("a"));
    assert_eq!(final_leg.id1.as_deref(), Some("d"));
    let third = &playoff(&records[leg_indices(&records, Round::ThirdPlace, 0)[0]]).fixture;
    assert_eq!(third.id0.as_deref(), Some("b"));
    assert_eq!(third.id1.as_deref(), Some("c"));

    assert!(podium(&records).is_none());
    score_leg(&mut records, Round::FINAL, 0, 0, Score::new(0, 2));
    score_leg(&mut records, Round::ThirdPlace, 0, 0, Score::new(4, 0));
    let medals = podium(&records).expect("final is decided");
    assert_eq!(medals.gold, "d");
    assert_eq!(medals.silver, "a");
    assert_eq!(medals.bronze.as_deref(), Some("b"));
}
