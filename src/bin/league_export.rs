use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use fc_league::config::{AppConfig, StoreBackend};
use fc_league::store::{CsvStore, RecordStore, SqliteStore};
use fc_league::{Stage, TournamentKey};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let config = AppConfig::from_env().context("unable to resolve data directory")?;
    let db_path = arg_value("db")
        .map(PathBuf::from)
        .or_else(|| match &config.backend {
            StoreBackend::Sqlite(path) => Some(path.clone()),
            StoreBackend::Csv(_) => None,
        })
        .context("no sqlite store configured; pass --db=PATH")?;
    let out_dir = arg_value("out")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let league = arg_value("league").unwrap_or_else(|| config.league.clone());
    let season = match arg_value("season") {
        Some(raw) => raw
            .parse::<u32>()
            .with_context(|| format!("invalid season {raw:?}"))?,
        None => config.season,
    };
    let key = TournamentKey::new(league, season);

    let source = SqliteStore::open(&db_path)?;
    let records = source.read_all(&key)?;
    if records.is_empty() {
        return Err(anyhow!("no records for {key} in {}", db_path.display()));
    }

    let target = CsvStore::new(out_dir);
    target.write_all(&key, &records)?;

    println!("Export complete");
    println!("DB: {}", db_path.display());
    println!("Tournament: {key} ({})", Stage::of(&records));
    println!("Records: {}", records.len());
    println!("CSV: {}", target.path_for(&key).display());
    Ok(())
}

fn arg_value(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("--{name}=");
    let flag = format!("--{name}");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&prefix) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag {
            let Some(next) = args.get(idx + 1) else {
                continue;
            };
            if !next.trim().is_empty() {
                return Some(next.trim().to_string());
            }
        }
    }
    None
}
