use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bracket::DEFAULT_PLAYOFF_LEGS;
use crate::draw::DEFAULT_GROUP_LEGS;

const DATA_DIR: &str = "fc_league";
const DB_FILE: &str = "league.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Records scheduled per pair in a group.
    pub group_legs: usize,
    /// Records per bracket slot.
    pub playoff_legs: usize,
    /// Used to derive the group count when the caller does not pass one.
    pub group_size: usize,
    pub playoff_requires_complete_groups: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            group_legs: DEFAULT_GROUP_LEGS,
            playoff_legs: DEFAULT_PLAYOFF_LEGS,
            group_size: 4,
            playoff_requires_complete_groups: false,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            group_legs: env_usize("LEAGUE_GROUP_LEGS").unwrap_or(d.group_legs).clamp(1, 4),
            playoff_legs: env_usize("LEAGUE_PLAYOFF_LEGS")
                .unwrap_or(d.playoff_legs)
                .clamp(1, 4),
            group_size: env_usize("LEAGUE_GROUP_SIZE").unwrap_or(d.group_size).max(2),
            playoff_requires_complete_groups: env_bool("LEAGUE_PLAYOFF_REQUIRES_COMPLETE_GROUPS")
                .unwrap_or(d.playoff_requires_complete_groups),
        }
    }
}

/// First-round size for "make playoff".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayoffSize {
    Pairs(usize),
    /// Smallest power of two covering half of the group field.
    Auto,
}

impl PlayoffSize {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("auto") {
            return Some(PlayoffSize::Auto);
        }
        raw.parse::<usize>().ok().map(PlayoffSize::Pairs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite(PathBuf),
    Csv(PathBuf),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub backend: StoreBackend,
    /// Participant directory database.
    pub directory_path: PathBuf,
    pub league: String,
    pub season: u32,
    pub playoff_size: PlayoffSize,
}

impl AppConfig {
    pub fn from_env() -> Option<Self> {
        let data_dir = env_path("LEAGUE_DATA_DIR").or_else(default_data_dir)?;
        let db_path = env_path("LEAGUE_DB_PATH").unwrap_or_else(|| data_dir.join(DB_FILE));
        let backend = match env::var("LEAGUE_STORE")
            .unwrap_or_else(|_| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "csv" => StoreBackend::Csv(
                env_path("LEAGUE_CSV_DIR").unwrap_or_else(|| data_dir.join("tournaments")),
            ),
            _ => StoreBackend::Sqlite(db_path.clone()),
        };
        let playoff_size = env::var("LEAGUE_PLAYOFF_PAIRS")
            .ok()
            .and_then(|raw| PlayoffSize::parse(&raw))
            .unwrap_or(PlayoffSize::Auto);
        Some(Self {
            engine: EngineConfig::from_env(),
            backend,
            directory_path: db_path,
            league: env::var("LEAGUE_TAG")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "CL".to_string()),
            season: env::var("LEAGUE_SEASON")
                .ok()
                .and_then(|val| val.trim().parse::<u32>().ok())
                .unwrap_or(1),
            playoff_size,
        })
    }
}

pub fn default_data_dir() -> Option<PathBuf> {
    if let Ok(base) = env::var("XDG_DATA_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR));
    }
    let home = env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".local").join("share").join(DATA_DIR))
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|val| val.trim().parse::<usize>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    let raw = env::var(key).ok()?;
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|val| !val.trim().is_empty())
        .map(PathBuf::from)
}
