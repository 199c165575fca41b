use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub handle: String,
    pub rate: i64,
    pub league: String,
    pub active: bool,
}

impl Participant {
    pub fn new(id: &str, handle: &str, rate: i64, league: &str) -> Self {
        Self {
            id: id.to_string(),
            handle: handle.to_string(),
            rate,
            league: league.to_string(),
            active: true,
        }
    }
}

/// Read side the engine needs from the user directory.
pub trait ParticipantDirectory: Send + Sync {
    /// Active participants of a league, strongest rate first.
    fn participants(&self, league: &str) -> Result<Vec<Participant>>;
    fn resolve_handle(&self, id: &str) -> Result<Option<String>>;
    fn resolve_id(&self, handle: &str) -> Result<Option<String>>;
}

fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}

fn sort_by_rate(participants: &mut [Participant]) {
    participants.sort_by(|a, b| b.rate.cmp(&a.rate));
}

pub fn rating_table(participants: &[Participant]) -> String {
    let mut active: Vec<Participant> = participants.iter().filter(|p| p.active).cloned().collect();
    sort_by_rate(&mut active);
    let mut out = String::from("League rating\n\n");
    for (num, p) in active.iter().enumerate() {
        out.push_str(&format!("{}. {} [{}]\n", num + 1, p.handle, p.rate));
    }
    out
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    users: Mutex<Vec<Participant>>,
}

impl MemoryDirectory {
    pub fn new(users: Vec<Participant>) -> Self {
        Self {
            users: Mutex::new(users),
        }
    }

    /// Adds the participant unless the id is already known.
    pub fn register(&self, participant: Participant) {
        let mut users = self.users.lock().expect("directory lock poisoned");
        if !users.iter().any(|u| u.id == participant.id) {
            users.push(participant);
        }
    }

    pub fn all(&self) -> Vec<Participant> {
        self.users.lock().expect("directory lock poisoned").clone()
    }
}

impl ParticipantDirectory for MemoryDirectory {
    fn participants(&self, league: &str) -> Result<Vec<Participant>> {
        let users = self.users.lock().map_err(|_| anyhow!("directory lock poisoned"))?;
        let mut out: Vec<Participant> = users
            .iter()
            .filter(|u| u.active && u.league == league)
            .cloned()
            .collect();
        sort_by_rate(&mut out);
        Ok(out)
    }

    fn resolve_handle(&self, id: &str) -> Result<Option<String>> {
        let users = self.users.lock().map_err(|_| anyhow!("directory lock poisoned"))?;
        Ok(users.iter().find(|u| u.id == id).map(|u| u.handle.clone()))
    }

    fn resolve_id(&self, handle: &str) -> Result<Option<String>> {
        let wanted = normalize_handle(handle);
        let users = self.users.lock().map_err(|_| anyhow!("directory lock poisoned"))?;
        Ok(users
            .iter()
            .find(|u| normalize_handle(&u.handle) == wanted)
            .map(|u| u.id.clone()))
    }
}

/// Participants kept in a sqlite table next to the tournament records.
pub struct SqliteDirectory {
    conn: Mutex<Connection>,
}

impl SqliteDirectory {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open participants db {}", path.display()))?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory participants db")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS participants (
                id TEXT PRIMARY KEY,
                handle TEXT NOT NULL,
                rate INTEGER NOT NULL,
                league TEXT NOT NULL,
                active INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_participants_handle ON participants(handle);
            CREATE INDEX IF NOT EXISTS idx_participants_league ON participants(league);
            "#,
        )
        .context("create participants schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("participants db lock poisoned"))
    }

    pub fn upsert(&self, p: &Participant) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO participants (id, handle, rate, league, active, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                handle = excluded.handle,
                rate = excluded.rate,
                league = excluded.league,
                active = excluded.active,
                updated_at = excluded.updated_at
            "#,
            params![
                p.id,
                p.handle,
                p.rate,
                p.league,
                i64::from(p.active),
                Utc::now().to_rfc3339()
            ],
        )
        .context("upsert participant")?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Participant>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, handle, rate, league, active FROM participants WHERE id = ?1",
            params![id],
            decode_participant,
        )
        .optional()
        .context("query participant")
    }

    /// Records a new rate, registering the user when unknown and marking them
    /// active. Returns the confirmation text shown to the user.
    pub fn update_rating(&self, id: &str, handle: &str, rate: i64) -> Result<String> {
        let mut participant = self
            .get(id)?
            .unwrap_or_else(|| Participant::new(id, handle, 0, ""));
        participant.handle = handle.to_string();
        participant.rate = rate;
        participant.active = true;
        self.upsert(&participant)?;
        tracing::info!(id, handle, rate, "rating updated");
        Ok(format!("{handle}, new rating {rate} saved!"))
    }

    pub fn all(&self) -> Result<Vec<Participant>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, handle, rate, league, active FROM participants ORDER BY rowid")
            .context("prepare participants query")?;
        let rows = stmt
            .query_map([], decode_participant)
            .context("query participants")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.context("decode participant row")?);
        }
        Ok(out)
    }
}

fn decode_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: row.get(0)?,
        handle: row.get(1)?,
        rate: row.get(2)?,
        league: row.get(3)?,
        active: row.get::<_, i64>(4)? != 0,
    })
}

impl ParticipantDirectory for SqliteDirectory {
    fn participants(&self, league: &str) -> Result<Vec<Participant>> {
        let mut out: Vec<Participant> = self
            .all()?
            .into_iter()
            .filter(|p| p.active && p.league == league)
            .collect();
        sort_by_rate(&mut out);
        Ok(out)
    }

    fn resolve_handle(&self, id: &str) -> Result<Option<String>> {
        Ok(self.get(id)?.map(|p| p.handle))
    }

    fn resolve_id(&self, handle: &str) -> Result<Option<String>> {
        let wanted = normalize_handle(handle);
        Ok(self
            .all()?
            .into_iter()
            .find(|p| normalize_handle(&p.handle) == wanted)
            .map(|p| p.id))
    }
}
