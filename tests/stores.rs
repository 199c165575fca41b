use std::fs;
use std::path::PathBuf;

use fc_league::bracket::build_bracket;
use fc_league::draw::group_schedule;
use fc_league::participants::{Participant, ParticipantDirectory, SqliteDirectory, rating_table};
use fc_league::record::{META_SEASON, Round, meta_value};
use fc_league::store::{CsvStore, RecordStore, SqliteStore};
use fc_league::{Record, Score, Stage, TournamentKey};

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn sample_records() -> Vec<Record> {
    let groups = vec![
        vec!["u1".to_string(), "u2".to_string()],
        vec!["u3".to_string(), "u4".to_string()],
    ];
    let mut records = vec![Record::meta(META_SEASON, "27")];
    records.extend(group_schedule(&groups, 2));
    records.extend(build_bracket(
        &[
            ("u1".to_string(), "u4".to_string()),
            ("u3".to_string(), "u2".to_string()),
        ],
        1,
    ));
    if let Some(fixture) = records[1].fixture_mut() {
        fixture.score = Some(Score::new(3, 2));
    }
    records
}

fn matches_then_meta(records: &[Record]) -> Vec<Record> {
    let mut out: Vec<Record> = records
        .iter()
        .filter(|r| !matches!(r, Record::Meta(_)))
        .cloned()
        .collect();
    out.extend(records.iter().filter(|r| matches!(r, Record::Meta(_))).cloned());
    out
}

#[test]
fn reads_reference_csv_layout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CsvStore::new(dir.path());
    let key = TournamentKey::new("CL", 27);
    fs::copy(fixture_path("season_27.csv"), store.path_for(&key)).expect("copy fixture");

    let records = store.read_all(&key).expect("fixture should decode");
    assert_eq!(records.len(), 10);
    assert_eq!(meta_value(&records, "groups"), Some("2"));
    assert!(matches!(&records[2], Record::Group(m) if m.group == 'B'));
    assert_eq!(records[0].fixture().and_then(|f| f.score), Some(Score::new(2, 1)));
    assert_eq!(records[3].fixture().and_then(|f| f.score), None);
    assert!(matches!(
        &records[7],
        Record::Playoff(m) if m.round == Round::ThirdPlace && m.fixture.id0.is_none()
    ));
    assert_eq!(Stage::of(&records), Stage::Playoff);
}

#[test]
fn unreadable_score_cell_fails_the_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CsvStore::new(dir.path());
    let key = TournamentKey::new("CL", 27);
    let raw = fs::read_to_string(fixture_path("season_27.csv")).expect("fixture readable");
    let damaged = raw.replace("3,group,B,0,u4,u3,\n", "3,group,B,0,u4,u3,x:y\n");
    assert_ne!(raw, damaged);
    fs::write(store.path_for(&key), &damaged).expect("write damaged csv");

    let err = store.read_all(&key).unwrap_err();
    let text = format!("{err:#}");
    assert!(text.contains("decode record row 3"), "{text}");
    assert!(text.contains("invalid score"), "{text}");
    assert_eq!(
        fs::read_to_string(store.path_for(&key)).expect("file kept"),
        damaged
    );
}

#[test]
fn csv_store_rewrites_with_header_and_trailing_meta() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = CsvStore::new(dir.path().join("nested"));
    let key = TournamentKey::new("Super League", 3);
    assert!(store.read_all(&key).expect("missing file reads empty").is_empty());

    let records = sample_records();
    store.write_all(&key, &records).expect("write csv");
    let path = store.path_for(&key);
    assert!(path.ends_with("Super_League_3.csv"));

    let raw = fs::read_to_string(&path).expect("csv readable");
    let mut lines = raw.lines();
    assert_eq!(lines.next(), Some("id,stage,tag,number,id0,id1,score"));
    assert_eq!(lines.next(), Some("0,group,A,0,u1,u2,3:2"));
    assert_eq!(raw.lines().last(), Some("8,metainfo,season,0,27,,"));
    assert!(raw.contains(",playoff,final,0,,,"));

    assert_eq!(store.read_all(&key).expect("read back"), matches_then_meta(&records));
}

#[test]
fn sqlite_store_keeps_tournaments_apart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("league.sqlite")).expect("open db");
    let first = TournamentKey::new("CL", 1);
    let second = TournamentKey::new("CL", 2);

    let records = sample_records();
    store.write_all(&first, &records).expect("write first");
    store.write_all(&second, &records[..3]).expect("write second");
    assert_eq!(store.read_all(&first).expect("read first"), matches_then_meta(&records));
    assert_eq!(store.read_all(&second).expect("read second").len(), 3);

    store.write_all(&first, &records[..1]).expect("shrink first");
    assert_eq!(store.read_all(&first).expect("reread first"), records[..1].to_vec());
    assert!(
        store
            .read_all(&TournamentKey::new("EL", 1))
            .expect("unknown key")
            .is_empty()
    );
}

#[test]
fn sqlite_directory_registers_and_rates() {
    let directory = SqliteDirectory::in_memory().expect("open directory");
    directory
        .upsert(&Participant::new("10", "Alice", 1500, "CL"))
        .expect("register alice");
    directory
        .upsert(&Participant::new("11", "bob", 1700, "CL"))
        .expect("register bob");
    directory
        .upsert(&Participant::new("12", "carl", 1900, "EL"))
        .expect("register carl");

    let cl: Vec<String> = directory
        .participants("CL")
        .expect("list league")
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(cl, vec!["11", "10"]);
    assert_eq!(directory.resolve_id("@ALICE").expect("lookup"), Some("10".to_string()));
    assert_eq!(directory.resolve_handle("12").expect("lookup"), Some("carl".to_string()));
    assert_eq!(directory.resolve_id("nobody").expect("lookup"), None);

    let message = directory.update_rating("10", "Alice", 2000).expect("rate");
    assert_eq!(message, "Alice, new rating 2000 saved!");
    let table = rating_table(&directory.all().expect("all"));
    assert!(table.starts_with("League rating\n\n1. Alice [2000]\n2. carl [1900]\n"));
}
