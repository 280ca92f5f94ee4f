//! Persistent record of posts and comments the bot has already handled.
//!
//! Backed by SQLite. Each event kind has its own append-only table with a
//! unique constraint on the Reddit id; that constraint is what keeps a
//! re-delivered event from being enforced twice.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use thiserror::Error;

use crate::domain::EventKind;

/// Errors that can occur with the seen store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Result of recording an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First time this id was seen
    Inserted,

    /// The id was already recorded
    AlreadyPresent,
}

impl RecordOutcome {
    /// Check if this was a new insert
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Inserted)
    }
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeenCounts {
    pub submissions: u64,
    pub comments: u64,
}

impl SeenCounts {
    pub fn total(&self) -> u64 {
        self.submissions + self.comments
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS seen_submissions (
    id        INTEGER PRIMARY KEY,
    seen_at   TEXT NOT NULL,
    reddit_id TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS seen_comments (
    id        INTEGER PRIMARY KEY,
    seen_at   TEXT NOT NULL,
    reddit_id TEXT NOT NULL UNIQUE
);
";

fn table_for(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Submission => "seen_submissions",
        EventKind::Comment => "seen_comments",
    }
}

/// SQLite-backed dedup store
#[derive(Clone)]
pub struct SeenStore {
    conn: Arc<Mutex<Connection>>,
}

impl SeenStore {
    /// Open (or create) the store at a path.
    ///
    /// `":memory:"` opens a private in-memory database.
    pub fn open(location: &str) -> Result<Self, StoreError> {
        if location == ":memory:" {
            return Self::open_in_memory();
        }

        let path = Path::new(location);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!("Seen store initialized");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Record an event id unless it is already present
    pub async fn record_if_absent(
        &self,
        kind: EventKind,
        reddit_id: &str,
    ) -> Result<RecordOutcome, StoreError> {
        let conn = self.conn.clone();
        let reddit_id = reddit_id.to_string();

        tokio::task::spawn_blocking(move || -> Result<RecordOutcome, StoreError> {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            let sql = format!(
                "INSERT INTO {} (seen_at, reddit_id) VALUES (?1, ?2)",
                table_for(kind)
            );

            match conn.execute(&sql, params![Utc::now().to_rfc3339(), reddit_id]) {
                Ok(_) => Ok(RecordOutcome::Inserted),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Ok(RecordOutcome::AlreadyPresent)
                }
                Err(e) => Err(StoreError::Sqlite(e)),
            }
        })
        .await?
    }

    /// Count recorded ids per kind
    pub async fn counts(&self) -> Result<SeenCounts, StoreError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || -> Result<SeenCounts, StoreError> {
            let conn = conn.lock().unwrap_or_else(|e| e.into_inner());
            let count = |kind: EventKind| -> Result<u64, rusqlite::Error> {
                let sql = format!("SELECT COUNT(*) FROM {}", table_for(kind));
                conn.query_row(&sql, [], |row| row.get::<_, i64>(0))
                    .map(|n| n.max(0) as u64)
            };

            Ok(SeenCounts {
                submissions: count(EventKind::Submission)?,
                comments: count(EventKind::Comment)?,
            })
        })
        .await?
    }
}
