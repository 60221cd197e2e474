//! Event log implementation with async `SQLite` operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{params, Connection};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::error::AuditError;
use super::schema::SCHEMA;

/// Long messages are truncated to this many characters before storage.
const MESSAGE_PREVIEW_LIMIT: usize = 300;

/// Returns the default path for the event database.
///
/// This is `~/.local/share/voice-dispatch/events.db` on Unix systems.
#[must_use]
pub fn default_event_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("voice-dispatch")
        .join("events.db")
}

/// A stored audit event.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    /// RFC 3339 timestamp of when the event was recorded.
    pub recorded_at: String,
    /// Originating component (MAIN, SUPERVISOR, STT, TTS).
    pub service: String,
    /// What the event is about, `-` when not applicable.
    pub subject: String,
    /// Human-readable description, truncated to a preview.
    pub message: String,
    /// Elapsed time for timed operations.
    pub duration_secs: Option<f64>,
}

/// Best-effort audit log for dispatcher, worker, and speech events.
///
/// Uses `SQLite` for persistent storage with async operations via
/// `spawn_blocking`. Callers on the dispatch path must swallow errors from
/// [`EventLog::record`]; audit failures never abort the loop.
#[derive(Debug, Clone)]
pub struct EventLog {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// Open an event log at the specified path.
    ///
    /// Creates parent directories if they don't exist and initializes the
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the schema cannot
    /// be applied.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await.map_err(|source| {
                    AuditError::CreateDir {
                        path: parent.to_path_buf(),
                        source,
                    }
                })?;
            }
        }

        let path_clone = path.clone();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, AuditError> {
            let conn =
                Connection::open(&path_clone).map_err(|source| AuditError::DatabaseOpen {
                    path: path_clone,
                    source,
                })?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        })
    }

    /// Open an in-memory event log for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or the schema
    /// cannot be applied.
    pub async fn open_in_memory() -> Result<Self, AuditError> {
        let conn = tokio::task::spawn_blocking(|| -> Result<Connection, AuditError> {
            let conn = Connection::open_in_memory()?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        })
    }

    /// Returns the path to the database, if opened from a file.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record one audit event.
    ///
    /// Newlines in the message are flattened and the result truncated to a
    /// short preview, so multi-line worker output cannot bloat the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be inserted.
    pub async fn record(
        &self,
        service: &str,
        subject: &str,
        message: &str,
        duration_secs: Option<f64>,
    ) -> Result<(), AuditError> {
        let id = Uuid::new_v4().to_string();
        let recorded_at = chrono::Utc::now().to_rfc3339();
        let service = service.to_string();
        let subject = subject.to_string();
        let preview: String = message
            .replace('\n', " ")
            .chars()
            .take(MESSAGE_PREVIEW_LIMIT)
            .collect();

        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<(), AuditError> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT INTO events (id, recorded_at, service, subject, message, duration_secs)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, recorded_at, service, subject, preview, duration_secs],
            )?;
            Ok(())
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)??;

        Ok(())
    }

    /// Fetch the most recent events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn recent(&self, limit: usize) -> Result<Vec<RecordedEvent>, AuditError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<RecordedEvent>, AuditError> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(
                "SELECT recorded_at, service, subject, message, duration_secs
                 FROM events ORDER BY recorded_at DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok(RecordedEvent {
                    recorded_at: row.get(0)?,
                    service: row.get(1)?,
                    subject: row.get(2)?,
                    message: row.get(3)?,
                    duration_secs: row.get(4)?,
                })
            })?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(|_| AuditError::TaskCancelled)?
    }
}
