use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::bracket::{self, Advance, Podium};
use crate::config::{EngineConfig, PlayoffSize};
use crate::draw::{draw_groups, draw_playoff, group_schedule};
use crate::participants::ParticipantDirectory;
use crate::record::{
    MAX_GOALS, META_CREATED_AT, META_GROUPS, META_SEASON, Record, Score, TournamentKey,
};
use crate::report::{self, Names};
use crate::result_parser::parse_statement;
use crate::standings::{group_fixtures, group_tables, ranked_field};
use crate::store::RecordStore;

/// Macro-phase of a tournament, always derived from its record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    NotStarted,
    Group,
    GroupComplete,
    Playoff,
    PlayoffComplete,
}

impl Stage {
    pub fn of(records: &[Record]) -> Stage {
        let mut any_match = false;
        let mut any_playoff = false;
        let mut all_played = true;
        for record in records {
            let Some(fixture) = record.fixture() else {
                continue;
            };
            any_match = true;
            any_playoff |= matches!(record, Record::Playoff(_));
            all_played &= fixture.is_played();
        }
        match (any_match, any_playoff, all_played) {
            (false, _, _) => Stage::NotStarted,
            (true, false, false) => Stage::Group,
            (true, false, true) => Stage::GroupComplete,
            (true, true, false) => Stage::Playoff,
            (true, true, true) => Stage::PlayoffComplete,
        }
    }

    pub fn is_playoff(self) -> bool {
        matches!(self, Stage::Playoff | Stage::PlayoffComplete)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::NotStarted => "not started",
            Stage::Group => "group stage",
            Stage::GroupComplete => "group stage complete",
            Stage::Playoff => "playoff",
            Stage::PlayoffComplete => "playoff complete",
        };
        f.write_str(label)
    }
}

/// Expected business refusals. The message is meant for the end user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum Rejection {
    #[error("Cannot {operation}: the tournament is at stage \"{stage}\"")]
    WrongStage { operation: &'static str, stage: Stage },
    #[error("The group stage is not finished: not all matches are played")]
    GroupsUnfinished,
    #[error("No unplayed match found between {a} and {b}")]
    MatchNotFound { a: String, b: String },
    #[error("Player {0} is not in the participant database")]
    UnknownParticipant(String),
    #[error(
        "I could not understand the result. Accepted formats:\n\
         1) I lost to @username 0:1\n\
         2) I won against @username 1:0\n\
         3) I played a draw with @username 1:1"
    )]
    Unparsable,
    #[error("Not enough participants: {found} found, {needed} needed")]
    NotEnoughParticipants { found: usize, needed: usize },
    #[error("{0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Outcome {
    Done(String),
    Rejected(Rejection),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub stage: Stage,
    pub outcome: Outcome,
}

impl Response {
    pub fn text(&self) -> String {
        match &self.outcome {
            Outcome::Done(text) | Outcome::Failed(text) => text.clone(),
            Outcome::Rejected(rejection) => rejection.to_string(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self.outcome, Outcome::Done(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match &self.outcome {
            Outcome::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }
}

enum OpError {
    Rejected(Rejection),
    Failed(anyhow::Error),
}

impl From<Rejection> for OpError {
    fn from(rejection: Rejection) -> Self {
        OpError::Rejected(rejection)
    }
}

impl From<anyhow::Error> for OpError {
    fn from(err: anyhow::Error) -> Self {
        OpError::Failed(err)
    }
}

type OpResult<T> = Result<T, OpError>;

struct Change {
    message: String,
    write: bool,
}

impl Change {
    fn wrote(message: String) -> Self {
        Self {
            message,
            write: true,
        }
    }

    fn read(message: String) -> Self {
        Self {
            message,
            write: false,
        }
    }
}

/// Tournament progression engine. Every public operation runs one
/// read → compute → full rewrite cycle under the tournament key's lock.
pub struct Engine<S, D> {
    store: S,
    directory: D,
    config: EngineConfig,
    rng: Mutex<StdRng>,
    locks: Mutex<HashMap<TournamentKey, Arc<Mutex<()>>>>,
}

impl<S: RecordStore, D: ParticipantDirectory> Engine<S, D> {
    pub fn new(store: S, directory: D, config: EngineConfig) -> Self {
        Self::with_rng(store, directory, config, StdRng::from_entropy())
    }

    /// Deterministic draws, for tests and replays of a draw.
    pub fn with_seed(store: S, directory: D, config: EngineConfig, seed: u64) -> Self {
        Self::with_rng(store, directory, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: S, directory: D, config: EngineConfig, rng: StdRng) -> Self {
        Self {
            store,
            directory,
            config,
            rng: Mutex::new(rng),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    fn key_lock(&self, key: &TournamentKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(key.clone()).or_default().clone()
    }

    fn transact<F>(&self, key: &TournamentKey, operation: &'static str, op: F) -> Response
    where
        F: FnOnce(&mut Vec<Record>, Stage) -> OpResult<Change>,
    {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut records = match self.store.read_all(key) {
            Ok(records) => records,
            Err(err) => return failed(key, operation, Stage::NotStarted, err),
        };
        let before = Stage::of(&records);

        match op(&mut records, before) {
            Ok(change) => {
                if change.write
                    && let Err(err) = self.store.write_all(key, &records)
                {
                    return failed(key, operation, before, err);
                }
                Response {
                    stage: Stage::of(&records),
                    outcome: Outcome::Done(change.message),
                }
            }
            Err(OpError::Rejected(rejection)) => {
                warn!(%key, operation, stage = %before, %rejection, "operation rejected");
                Response {
                    stage: before,
                    outcome: Outcome::Rejected(rejection),
                }
            }
            Err(OpError::Failed(err)) => failed(key, operation, before, err),
        }
    }

    pub fn stage(&self, key: &TournamentKey) -> Response {
        self.transact(key, "read stage", |_, stage| {
            Ok(Change::read(format!("{key}: {stage}")))
        })
    }

    /// Draws the league's active participants into groups. Without an explicit
    /// count, groups of the configured size are formed.
    pub fn start_group_stage(&self, key: &TournamentKey, group_count: Option<usize>) -> Response {
        self.transact(key, "make groups", |records, stage| {
            if stage != Stage::NotStarted {
                return Err(Rejection::WrongStage {
                    operation: "make groups",
                    stage,
                }
                .into());
            }
            let participants = self.directory.participants(&key.league)?;
            let found = participants.len();
            if found < 2 {
                return Err(Rejection::NotEnoughParticipants { found, needed: 2 }.into());
            }
            let count = group_count.unwrap_or_else(|| (found / self.config.group_size).max(1));
            if count == 0 || count > 26 || found / count < 2 {
                return Err(Rejection::InvalidInput(format!(
                    "{count} groups do not fit {found} participants"
                ))
                .into());
            }

            let ids: Vec<String> = participants.iter().map(|p| p.id.clone()).collect();
            let groups = {
                let mut rng = self.rng.lock().map_err(|_| anyhow!("rng lock poisoned"))?;
                draw_groups(&ids, count, &mut *rng)
            };
            records.extend(group_schedule(&groups, self.config.group_legs));
            records.push(Record::meta(META_SEASON, key.season.to_string()));
            records.push(Record::meta(META_GROUPS, count.to_string()));
            records.push(Record::meta(META_CREATED_AT, Utc::now().to_rfc3339()));

            info!(%key, groups = count, participants = found, "group stage drawn");
            let names = Names::new(
                participants
                    .into_iter()
                    .map(|p| (p.id, p.handle))
                    .collect(),
            );
            Ok(Change::wrote(report::group_draw_announcement(&groups, &names)))
        })
    }

    /// Ranks the group field, draws the first knockout round and stores the
    /// whole placeholder bracket.
    pub fn start_playoff(&self, key: &TournamentKey, size: PlayoffSize) -> Response {
        self.transact(key, "make playoff", |records, stage| {
            match stage {
                Stage::Group if self.config.playoff_requires_complete_groups => {
                    return Err(Rejection::GroupsUnfinished.into());
                }
                Stage::Group | Stage::GroupComplete => {}
                _ => {
                    return Err(Rejection::WrongStage {
                        operation: "make playoff",
                        stage,
                    }
                    .into());
                }
            }

            let tables = group_tables(records);
            let field = ranked_field(&tables);
            let found = field.len();
            let qualifiers = match size {
                PlayoffSize::Auto => found.div_ceil(2).next_power_of_two().max(2),
                PlayoffSize::Pairs(pairs) if pairs == 0 || !pairs.is_power_of_two() => {
                    return Err(Rejection::InvalidInput(format!(
                        "playoff pair count must be a power of two, got {pairs}"
                    ))
                    .into());
                }
                PlayoffSize::Pairs(pairs) => pairs * 2,
            };
            if qualifiers > found {
                return Err(Rejection::NotEnoughParticipants {
                    found,
                    needed: qualifiers,
                }
                .into());
            }

            let group_of: HashMap<&str, char> = tables
                .iter()
                .flat_map(|(tag, items)| items.iter().map(move |item| (item.id.as_str(), *tag)))
                .collect();
            let half = qualifiers / 2;
            let seeded: Vec<String> = field[..half].iter().map(|i| i.id.clone()).collect();
            let unseeded: Vec<String> =
                field[half..qualifiers].iter().map(|i| i.id.clone()).collect();
            let unseeded = align_group_mates(&seeded, unseeded, &group_of);

            let pairs = {
                let mut rng = self.rng.lock().map_err(|_| anyhow!("rng lock poisoned"))?;
                draw_playoff(&seeded, &unseeded, &mut *rng)
            };
            append_matches(records, bracket::build_bracket(&pairs, self.config.playoff_legs));

            info!(%key, pairs = pairs.len(), field = found, "playoff drawn");
            let names = self.names_for(records)?;
            Ok(Change::wrote(report::playoff_draw_announcement(&pairs, &names)))
        })
    }

    /// Stores `score` (goals of `a` : goals of `b`) in the first unplayed match
    /// between the two and advances the bracket when a tie is complete.
    pub fn record_result(&self, key: &TournamentKey, a: &str, b: &str, score: Score) -> Response {
        self.transact(key, "record a result", |records, stage| {
            self.apply_result(records, stage, a, b, score)
        })
    }

    /// Parses a free-text report from `reporter` ("I won against @bob 2:0")
    /// and records it.
    pub fn report_result<T: AsRef<str>>(
        &self,
        key: &TournamentKey,
        reporter: &str,
        tokens: &[T],
    ) -> Response {
        self.transact(key, "record a result", |records, stage| {
            let report = parse_statement(tokens)?;
            let opponent = self
                .directory
                .resolve_id(&report.opponent)?
                .ok_or_else(|| Rejection::UnknownParticipant(report.opponent.clone()))?;
            let (g0, g1) = report.score;
            self.apply_result(records, stage, reporter, &opponent, Score::new(g0, g1))
        })
    }

    fn apply_result(
        &self,
        records: &mut Vec<Record>,
        stage: Stage,
        a: &str,
        b: &str,
        score: Score,
    ) -> OpResult<Change> {
        if matches!(stage, Stage::NotStarted | Stage::PlayoffComplete) {
            return Err(Rejection::WrongStage {
                operation: "record a result",
                stage,
            }
            .into());
        }
        if a == b {
            return Err(Rejection::InvalidInput("a participant cannot play themselves".into()).into());
        }

        if score.g0 > MAX_GOALS || score.g1 > MAX_GOALS {
            return Err(Rejection::InvalidInput(format!(
                "{score} is not a valid score: at most {MAX_GOALS} goals per side"
            ))
            .into());
        }

        let found = if stage.is_playoff() {
            first_unplayed(records, a, b, true).or_else(|| first_unplayed(records, a, b, false))
        } else {
            first_unplayed(records, a, b, false)
        };
        let Some((idx, flipped)) = found else {
            let names = self.names_for(records)?;
            return Err(Rejection::MatchNotFound {
                a: names.get(a).to_string(),
                b: names.get(b).to_string(),
            }
            .into());
        };

        let stored = if flipped { score.flipped() } else { score };
        if let Some(fixture) = records[idx].fixture_mut() {
            fixture.score = Some(stored);
        }
        info!(a, b, score = %score, "result recorded");

        let mut message = String::from("Result recorded!");
        let playoff_slot = match &records[idx] {
            Record::Playoff(m) => Some((m.round, m.slot)),
            _ => None,
        };
        if let Some((round, slot)) = playoff_slot {
            let advance = bracket::advance(records, round, slot);
            let names = self.names_for(records)?;
            match advance {
                Advance::Pending => {}
                Advance::Replay => {
                    info!(round = %round.tag(), slot, "aggregate level, replay scheduled");
                    message.push_str("\nAggregate is level: one more leg is scheduled.");
                }
                Advance::Decided {
                    winner,
                    next,
                    third_place,
                    loser,
                } => {
                    info!(round = %round.tag(), slot, winner = %winner, "tie decided");
                    match next {
                        Some(next) => message.push_str(&format!(
                            "\n@{} advances to: {}",
                            names.get(&winner),
                            report::round_title(next)
                        )),
                        None => message.push_str(&format!(
                            "\n@{} wins the {}",
                            names.get(&winner),
                            report::round_title(round).to_lowercase()
                        )),
                    }
                    if third_place {
                        message.push_str(&format!(
                            "\n@{} plays the third place match",
                            names.get(&loser)
                        ));
                    }
                }
            }
        }
        if Stage::of(records) == Stage::PlayoffComplete {
            info!("tournament complete");
            message.push_str("\nThe tournament is complete!");
        }
        Ok(Change::wrote(message))
    }

    /// Group tables or the playoff schedule. With a participant, only their
    /// group (with its match list) or their pending playoff matches.
    pub fn status(&self, key: &TournamentKey, participant: Option<&str>) -> Response {
        self.transact(key, "show status", |records, stage| {
            let names = self.names_for(records)?;
            let mut out = format!("{key}: {stage}\n\n");
            match stage {
                Stage::NotStarted => out.push_str("The tournament has not started yet."),
                Stage::Group | Stage::GroupComplete => {
                    out.push_str(&group_status(records, participant, &names));
                }
                Stage::Playoff | Stage::PlayoffComplete => {
                    out.push_str(&report::playoff_schedule(records, &names));
                    if let Some(id) = participant {
                        let pending: Vec<String> = records
                            .iter()
                            .filter(|r| matches!(r, Record::Playoff(_)))
                            .filter_map(Record::fixture)
                            .filter(|f| !f.is_played() && f.involves(id))
                            .map(|f| report::fixture_line(f, &names))
                            .collect();
                        if !pending.is_empty() {
                            out.push_str("\n\nYour matches:\n");
                            out.push_str(&pending.join("\n"));
                        }
                    }
                }
            }
            Ok(Change::read(out.trim_end().to_string()))
        })
    }

    pub fn summary(&self, key: &TournamentKey) -> Response {
        self.transact(key, "get summary", |records, stage| {
            let podium = finished_podium(records, stage)?;
            let names = self.names_for(records)?;
            Ok(Change::read(report::podium_text(&podium, &names)))
        })
    }

    /// Structured podium for callers that format it themselves.
    pub fn podium(&self, key: &TournamentKey) -> anyhow::Result<Option<Podium>> {
        let records = self.store.read_all(key)?;
        let stage = Stage::of(&records);
        Ok(finished_podium(&records, stage).ok())
    }

    fn names_for(&self, records: &[Record]) -> anyhow::Result<Names> {
        let mut ids = HashSet::new();
        for fixture in records.iter().filter_map(Record::fixture) {
            ids.extend(fixture.id0.iter().cloned());
            ids.extend(fixture.id1.iter().cloned());
        }
        let mut map = HashMap::new();
        for id in ids {
            if let Some(handle) = self.directory.resolve_handle(&id)? {
                map.insert(id, handle);
            }
        }
        Ok(Names::new(map))
    }
}

fn failed(key: &TournamentKey, operation: &'static str, stage: Stage, err: anyhow::Error) -> Response {
    error!(%key, operation, "store failure: {err:#}");
    Response {
        stage,
        outcome: Outcome::Failed(format!("Storage is unavailable, could not {operation}")),
    }
}

fn finished_podium(records: &[Record], stage: Stage) -> OpResult<Podium> {
    let wrong_stage = || Rejection::WrongStage {
        operation: "get summary",
        stage,
    };
    if stage != Stage::PlayoffComplete {
        return Err(wrong_stage().into());
    }
    bracket::podium(records).ok_or_else(|| wrong_stage().into())
}

fn group_status(records: &[Record], participant: Option<&str>, names: &Names) -> String {
    let fixtures = group_fixtures(records);
    let own_group = participant.and_then(|id| {
        fixtures
            .iter()
            .find(|(_, list)| list.iter().any(|f| f.involves(id)))
            .map(|(tag, _)| *tag)
    });

    let mut tables = Vec::new();
    for (tag, list) in &fixtures {
        if own_group.is_some_and(|own| own != *tag) {
            continue;
        }
        let items = crate::standings::compute_table(list.iter().copied());
        tables.push(report::render_table(
            *tag,
            &items,
            list,
            names,
            own_group.is_some(),
        ));
    }
    tables.join("\n\n")
}

/// Reorders `unseeded` so that position `i` holds a group-mate of
/// `seeded[i]` where one exists; those are the pairings the playoff draw
/// avoids. Remaining ids keep their ranking order.
fn align_group_mates(
    seeded: &[String],
    unseeded: Vec<String>,
    group_of: &HashMap<&str, char>,
) -> Vec<String> {
    let mut remaining = unseeded;
    let mut aligned: Vec<Option<String>> = vec![None; seeded.len()];
    for (i, id) in seeded.iter().enumerate() {
        let Some(group) = group_of.get(id.as_str()) else {
            continue;
        };
        if let Some(pos) = remaining
            .iter()
            .position(|u| group_of.get(u.as_str()) == Some(group))
        {
            aligned[i] = Some(remaining.remove(pos));
        }
    }
    let mut rest = remaining.into_iter();
    aligned
        .into_iter()
        .filter_map(|slot| slot.or_else(|| rest.next()))
        .collect()
}

/// Index and orientation of the first unplayed record between `a` and `b`.
/// Once the playoff is drawn, bracket legs are matched before any group
/// record left open between the same pair.
fn first_unplayed(
    records: &[Record],
    a: &str,
    b: &str,
    playoff_only: bool,
) -> Option<(usize, bool)> {
    records.iter().enumerate().find_map(|(idx, record)| {
        if playoff_only && !matches!(record, Record::Playoff(_)) {
            return None;
        }
        let fixture = record.fixture()?;
        if fixture.is_played() {
            return None;
        }
        fixture.orientation(a, b).map(|flipped| (idx, flipped))
    })
}

/// Appends match records ahead of the trailing meta rows.
fn append_matches(records: &mut Vec<Record>, new: Vec<Record>) {
    let at = records
        .iter()
        .position(|r| matches!(r, Record::Meta(_)))
        .unwrap_or(records.len());
    records.splice(at..at, new);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn group_mates_line_up_with_their_winner() {
        let group_of = HashMap::from([("a1", 'A'), ("b1", 'B'), ("a2", 'A'), ("b2", 'B')]);
        let aligned = align_group_mates(&ids(&["a1", "b1"]), ids(&["b2", "a2"]), &group_of);
        assert_eq!(aligned, ids(&["a2", "b2"]));
    }

    #[test]
    fn unmatched_positions_take_leftovers_in_order() {
        let group_of = HashMap::from([("a1", 'A'), ("b1", 'B'), ("c2", 'C'), ("d2", 'D')]);
        let aligned = align_group_mates(&ids(&["a1", "b1"]), ids(&["c2", "d2"]), &group_of);
        assert_eq!(aligned, ids(&["c2", "d2"]));
    }

    #[test]
    fn stage_ignores_meta_rows() {
        let records = vec![Record::meta(META_SEASON, "3")];
        assert_eq!(Stage::of(&records), Stage::NotStarted);
    }
}
