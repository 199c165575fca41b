use std::fmt;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

pub const STAGE_GROUP: &str = "group";
pub const STAGE_PLAYOFF: &str = "playoff";
pub const STAGE_META: &str = "metainfo";

pub const META_SEASON: &str = "season";
pub const META_GROUPS: &str = "groups";
pub const META_CREATED_AT: &str = "created_at";

/// Upper bound for one side's goals in a recorded result.
pub const MAX_GOALS: u32 = 99;

/// Selects one tournament's record set, e.g. league `CL`, season 27.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TournamentKey {
    pub league: String,
    pub season: u32,
}

impl TournamentKey {
    pub fn new(league: impl Into<String>, season: u32) -> Self {
        Self {
            league: league.into(),
            season,
        }
    }

    /// Filesystem/table friendly form.
    pub fn slug(&self) -> String {
        let league = self
            .league
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect::<String>();
        format!("{league}_{}", self.season)
    }
}

impl fmt::Display for TournamentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.league, self.season)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub g0: u32,
    pub g1: u32,
}

impl Score {
    pub fn new(g0: u32, g1: u32) -> Self {
        Self { g0, g1 }
    }

    pub fn flipped(self) -> Self {
        Self {
            g0: self.g1,
            g1: self.g0,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (g0, g1) = raw.trim().split_once(':')?;
        Some(Self {
            g0: g0.trim().parse().ok()?,
            g1: g1.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.g0, self.g1)
    }
}

/// Knockout rounds are indexed by depth: 0 is the final, 1 the semifinal,
/// and a round at depth `d` holds `2^d` slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Round {
    Knockout { depth: u32 },
    ThirdPlace,
}

impl Round {
    pub const FINAL: Round = Round::Knockout { depth: 0 };
    pub const SEMIFINAL: Round = Round::Knockout { depth: 1 };

    pub fn tag(self) -> String {
        match self {
            Round::ThirdPlace => "third".to_string(),
            Round::Knockout { depth: 0 } => "final".to_string(),
            Round::Knockout { depth: 1 } => "semifinal".to_string(),
            Round::Knockout { depth: 2 } => "quarter".to_string(),
            Round::Knockout { depth } => format!("last{}", 1u64 << (depth + 1)),
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "third" => Some(Round::ThirdPlace),
            "final" => Some(Round::FINAL),
            "semifinal" | "semi" => Some(Round::SEMIFINAL),
            "quarter" => Some(Round::Knockout { depth: 2 }),
            other => {
                let n = other.strip_prefix("last")?.parse::<u64>().ok()?;
                if n <= 8 || !n.is_power_of_two() {
                    return None;
                }
                Some(Round::Knockout {
                    depth: n.trailing_zeros() - 1,
                })
            }
        }
    }

    /// The round the winner moves on to; `None` for the final and third place.
    pub fn next(self) -> Option<Round> {
        match self {
            Round::Knockout { depth } if depth > 0 => Some(Round::Knockout { depth: depth - 1 }),
            _ => None,
        }
    }

    pub fn slots(self) -> usize {
        match self {
            Round::ThirdPlace => 1,
            Round::Knockout { depth } => 1usize << depth,
        }
    }

    /// Display order: earliest knockout round first, third place before the final.
    pub fn display_order(self) -> i64 {
        match self {
            Round::ThirdPlace => -1,
            Round::Knockout { depth } => -2 * i64::from(depth),
        }
    }
}

/// Two sides and an optional score; `None` ids are bracket slots still waiting
/// for a winner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub id0: Option<String>,
    pub id1: Option<String>,
    pub score: Option<Score>,
}

impl Fixture {
    pub fn scheduled(id0: &str, id1: &str) -> Self {
        Self {
            id0: Some(id0.to_string()),
            id1: Some(id1.to_string()),
            score: None,
        }
    }

    pub fn placeholder() -> Self {
        Self {
            id0: None,
            id1: None,
            score: None,
        }
    }

    pub fn is_played(&self) -> bool {
        self.score.is_some()
    }

    pub fn involves(&self, id: &str) -> bool {
        self.id0.as_deref() == Some(id) || self.id1.as_deref() == Some(id)
    }

    /// Score as seen from `a`'s side when this fixture is `a` vs `b` in either
    /// orientation; `None` when the fixture is between other participants.
    pub fn orientation(&self, a: &str, b: &str) -> Option<bool> {
        let (Some(id0), Some(id1)) = (self.id0.as_deref(), self.id1.as_deref()) else {
            return None;
        };
        if id0 == a && id1 == b {
            Some(false)
        } else if id0 == b && id1 == a {
            Some(true)
        } else {
            None
        }
    }

    /// Fills the first empty side. Returns false if both sides are taken.
    pub fn fill_empty_side(&mut self, id: &str) -> bool {
        if self.id0.is_none() {
            self.id0 = Some(id.to_string());
            true
        } else if self.id1.is_none() {
            self.id1 = Some(id.to_string());
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMatch {
    pub group: char,
    pub fixture: Fixture,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayoffMatch {
    pub round: Round,
    pub slot: usize,
    pub fixture: Fixture,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Record {
    Group(GroupMatch),
    Playoff(PlayoffMatch),
    Meta(MetaEntry),
}

impl Record {
    pub fn fixture(&self) -> Option<&Fixture> {
        match self {
            Record::Group(m) => Some(&m.fixture),
            Record::Playoff(m) => Some(&m.fixture),
            Record::Meta(_) => None,
        }
    }

    pub fn fixture_mut(&mut self) -> Option<&mut Fixture> {
        match self {
            Record::Group(m) => Some(&mut m.fixture),
            Record::Playoff(m) => Some(&mut m.fixture),
            Record::Meta(_) => None,
        }
    }

    pub fn meta(key: &str, value: impl Into<String>) -> Self {
        Record::Meta(MetaEntry {
            key: key.to_string(),
            value: value.into(),
        })
    }
}

pub fn meta_value<'a>(records: &'a [Record], key: &str) -> Option<&'a str> {
    records.iter().find_map(|r| match r {
        Record::Meta(m) if m.key == key => Some(m.value.as_str()),
        _ => None,
    })
}

/// The persisted row shape shared by every backend. Column order is part of
/// the contract other tooling reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub id: usize,
    pub stage: String,
    pub tag: String,
    pub number: usize,
    pub id0: String,
    pub id1: String,
    pub score: String,
}

/// Encodes records as rows with match rows first and meta rows trailing.
pub fn to_rows(records: &[Record]) -> Vec<RecordRow> {
    let matches = records.iter().filter(|r| !matches!(r, Record::Meta(_)));
    let metas = records.iter().filter(|r| matches!(r, Record::Meta(_)));
    matches
        .chain(metas)
        .enumerate()
        .map(|(id, record)| match record {
            Record::Group(m) => fixture_row(id, STAGE_GROUP, m.group.to_string(), 0, &m.fixture),
            Record::Playoff(m) => fixture_row(id, STAGE_PLAYOFF, m.round.tag(), m.slot, &m.fixture),
            Record::Meta(m) => RecordRow {
                id,
                stage: STAGE_META.to_string(),
                tag: m.key.clone(),
                number: 0,
                id0: m.value.clone(),
                id1: String::new(),
                score: String::new(),
            },
        })
        .collect()
}

fn fixture_row(id: usize, stage: &str, tag: String, number: usize, fixture: &Fixture) -> RecordRow {
    RecordRow {
        id,
        stage: stage.to_string(),
        tag,
        number,
        id0: fixture.id0.clone().unwrap_or_default(),
        id1: fixture.id1.clone().unwrap_or_default(),
        score: fixture.score.map(|s| s.to_string()).unwrap_or_default(),
    }
}

pub fn from_rows(rows: Vec<RecordRow>) -> Result<Vec<Record>> {
    let mut rows = rows;
    rows.sort_by_key(|r| r.id);
    rows.into_iter()
        .map(|row| from_row(&row).with_context(|| format!("decode record row {}", row.id)))
        .collect()
}

fn from_row(row: &RecordRow) -> Result<Record> {
    match row.stage.as_str() {
        STAGE_META => Ok(Record::meta(&row.tag, row.id0.clone())),
        STAGE_GROUP => {
            let mut chars = row.tag.trim().chars();
            let (Some(group), None) = (chars.next(), chars.next()) else {
                return Err(anyhow!("invalid group tag {:?}", row.tag));
            };
            Ok(Record::Group(GroupMatch {
                group: group.to_ascii_uppercase(),
                fixture: row_fixture(row)?,
            }))
        }
        STAGE_PLAYOFF => {
            let round = Round::from_tag(row.tag.trim())
                .ok_or_else(|| anyhow!("invalid round tag {:?}", row.tag))?;
            Ok(Record::Playoff(PlayoffMatch {
                round,
                slot: row.number,
                fixture: row_fixture(row)?,
            }))
        }
        other => Err(anyhow!("unknown stage {other:?}")),
    }
}

fn row_fixture(row: &RecordRow) -> Result<Fixture> {
    let score = if row.score.trim().is_empty() {
        None
    } else {
        let parsed =
            Score::parse(&row.score).ok_or_else(|| anyhow!("invalid score {:?}", row.score))?;
        Some(parsed)
    };
    Ok(Fixture {
        id0: non_empty(&row.id0),
        id1: non_empty(&row.id1),
        score,
    })
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_tags_cover_named_and_last_rounds() {
        assert_eq!(Round::FINAL.tag(), "final");
        assert_eq!(Round::SEMIFINAL.tag(), "semifinal");
        assert_eq!(Round::Knockout { depth: 2 }.tag(), "quarter");
        assert_eq!(Round::Knockout { depth: 3 }.tag(), "last16");
        assert_eq!(Round::Knockout { depth: 5 }.tag(), "last64");
        assert_eq!(Round::from_tag("last16"), Some(Round::Knockout { depth: 3 }));
        assert_eq!(Round::from_tag("last8"), None);
        assert_eq!(Round::from_tag("last12"), None);
        assert_eq!(Round::from_tag("third"), Some(Round::ThirdPlace));
    }

    #[test]
    fn score_parse_rejects_garbage() {
        assert_eq!(Score::parse("2:1"), Some(Score::new(2, 1)));
        assert_eq!(Score::parse(" 0 : 0 "), Some(Score::new(0, 0)));
        assert_eq!(Score::parse("2-1"), None);
        assert_eq!(Score::parse("a:1"), None);
    }

    #[test]
    fn meta_rows_trail_match_rows() {
        let records = vec![
            Record::meta(META_SEASON, "27"),
            Record::Group(GroupMatch {
                group: 'A',
                fixture: Fixture::scheduled("1", "2"),
            }),
        ];
        let rows = to_rows(&records);
        assert_eq!(rows[0].stage, STAGE_GROUP);
        assert_eq!(rows[1].stage, STAGE_META);
        assert_eq!(rows[1].id, 1);

        let decoded = from_rows(rows).unwrap();
        assert!(matches!(decoded[0], Record::Group(_)));
        assert_eq!(meta_value(&decoded, META_SEASON), Some("27"));
    }

    #[test]
    fn bad_score_cell_fails_decode() {
        let row = RecordRow {
            id: 4,
            stage: STAGE_GROUP.to_string(),
            tag: "b".to_string(),
            number: 0,
            id0: "1".to_string(),
            id1: "2".to_string(),
            score: "tbd".to_string(),
        };
        let err = from_rows(vec![row]).unwrap_err();
        let text = format!("{err:#}");
        assert!(text.contains("decode record row 4"));
        assert!(text.contains("invalid score \"tbd\""));
    }
}
