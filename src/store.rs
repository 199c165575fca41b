use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, params};
use tracing::debug;

use crate::record::{Record, RecordRow, TournamentKey, from_rows, to_rows};

/// Persistence contract: the engine always reads and rewrites the whole
/// record set of one tournament.
pub trait RecordStore: Send + Sync {
    fn read_all(&self, key: &TournamentKey) -> Result<Vec<Record>>;
    fn write_all(&self, key: &TournamentKey, records: &[Record]) -> Result<()>;
}

impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    fn read_all(&self, key: &TournamentKey) -> Result<Vec<Record>> {
        (**self).read_all(key)
    }

    fn write_all(&self, key: &TournamentKey, records: &[Record]) -> Result<()> {
        (**self).write_all(key, records)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    sets: Mutex<HashMap<TournamentKey, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn read_all(&self, key: &TournamentKey) -> Result<Vec<Record>> {
        let sets = self.sets.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(sets.get(key).cloned().unwrap_or_default())
    }

    fn write_all(&self, key: &TournamentKey, records: &[Record]) -> Result<()> {
        let mut sets = self.sets.lock().map_err(|_| anyhow!("memory store lock poisoned"))?;
        sets.insert(key.clone(), records.to_vec());
        Ok(())
    }
}

/// One CSV file per tournament: `<dir>/<league>_<season>.csv`.
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &TournamentKey) -> PathBuf {
        self.dir.join(format!("{}.csv", key.slug()))
    }
}

impl RecordStore for CsvStore {
    fn read_all(&self, key: &TournamentKey) -> Result<Vec<Record>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let rows = read_csv_rows(&path)?;
        from_rows(rows).with_context(|| format!("decode {}", path.display()))
    }

    fn write_all(&self, key: &TournamentKey, records: &[Record]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create store dir {}", self.dir.display()))?;
        let path = self.path_for(key);
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&tmp)
                .with_context(|| format!("open {}", tmp.display()))?;
            for row in to_rows(records) {
                writer.serialize(row).context("write record row")?;
            }
            writer.flush().context("flush record rows")?;
        }
        fs::rename(&tmp, &path).with_context(|| format!("swap {}", path.display()))?;
        debug!(%key, rows = records.len(), path = %path.display(), "csv records written");
        Ok(())
    }
}

fn read_csv_rows(path: &Path) -> Result<Vec<RecordRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize::<RecordRow>() {
        rows.push(row.with_context(|| format!("parse row in {}", path.display()))?);
    }
    Ok(rows)
}

/// All tournaments in one sqlite table; a rewrite replaces one key's rows
/// inside a single transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        let conn =
            Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS match_records (
            tournament TEXT NOT NULL,
            id INTEGER NOT NULL,
            stage TEXT NOT NULL,
            tag TEXT NOT NULL,
            number INTEGER NOT NULL,
            id0 TEXT NOT NULL,
            id1 TEXT NOT NULL,
            score TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (tournament, id)
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

impl RecordStore for SqliteStore {
    fn read_all(&self, key: &TournamentKey) -> Result<Vec<Record>> {
        let conn = self.conn.lock().map_err(|_| anyhow!("sqlite store lock poisoned"))?;
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, stage, tag, number, id0, id1, score
                FROM match_records
                WHERE tournament = ?1
                ORDER BY id ASC
                "#,
            )
            .context("prepare load records query")?;
        let rows = stmt
            .query_map(params![key.to_string()], |row| {
                Ok(RecordRow {
                    id: row.get::<_, i64>(0)? as usize,
                    stage: row.get(1)?,
                    tag: row.get(2)?,
                    number: row.get::<_, i64>(3)? as usize,
                    id0: row.get(4)?,
                    id1: row.get(5)?,
                    score: row.get(6)?,
                })
            })
            .context("query load records")?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode record row")?);
        }
        from_rows(out)
    }

    fn write_all(&self, key: &TournamentKey, records: &[Record]) -> Result<()> {
        let mut conn = self.conn.lock().map_err(|_| anyhow!("sqlite store lock poisoned"))?;
        let tournament = key.to_string();
        let updated_at = Utc::now().to_rfc3339();
        let tx = conn.transaction().context("begin rewrite transaction")?;
        tx.execute(
            "DELETE FROM match_records WHERE tournament = ?1",
            params![tournament],
        )
        .context("clear tournament records")?;
        for row in to_rows(records) {
            tx.execute(
                r#"
                INSERT INTO match_records (tournament, id, stage, tag, number, id0, id1, score, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    tournament,
                    row.id as i64,
                    row.stage,
                    row.tag,
                    row.number as i64,
                    row.id0,
                    row.id1,
                    row.score,
                    updated_at,
                ],
            )
            .context("insert record row")?;
        }
        tx.commit().context("commit rewrite transaction")?;
        debug!(%key, rows = records.len(), "sqlite records written");
        Ok(())
    }
}
