//! Persistence for the Lale assistant.
//!
//! Two backends behind the same repository traits: an in-memory store for
//! tests and ephemeral sessions, and a SQLite store for durable state. The
//! [`Store`] enum fans calls out to whichever backend the database URL
//! selected. Instants are persisted as fixed-width RFC 3339 UTC strings so
//! that string comparison in SQL agrees with chronological order.

pub mod dedup;

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::dedup::{duplicate_window, is_duplicate};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stored timestamp is invalid: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Done,
}

impl TaskStatus {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Done => "done",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code {
            "done" => Self::Done,
            _ => Self::Open,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub remind_policy: Option<Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: i64,
    pub title: String,
    pub due: Option<DateTime<Utc>>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub start: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub remind_policy: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub due: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewNote {
    pub title: String,
    pub body: String,
}

/// Result of a guarded insert: either a fresh id or the id of the existing
/// record the candidate collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateOutcome {
    pub id: i64,
    pub duplicate: bool,
}

/// Half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

pub trait EventRepository {
    async fn create_event(&self, event: NewEvent) -> StorageResult<CreateOutcome>;
    async fn list_events(&self, window: Option<TimeWindow>) -> StorageResult<Vec<EventRecord>>;
    async fn update_event(&self, id: i64, patch: EventPatch) -> StorageResult<bool>;
    async fn delete_event(&self, id: i64) -> StorageResult<bool>;
}

pub trait TaskRepository {
    async fn create_task(&self, task: NewTask) -> StorageResult<CreateOutcome>;
    async fn list_tasks(&self, open_only: bool) -> StorageResult<Vec<TaskRecord>>;
    async fn update_task(&self, id: i64, patch: TaskPatch) -> StorageResult<bool>;
    async fn delete_task(&self, id: i64) -> StorageResult<bool>;
    async fn complete_task(&self, id: i64) -> StorageResult<bool>;
}

pub trait NoteRepository {
    async fn create_note(&self, note: NewNote) -> StorageResult<i64>;
}

/// Partial update; `None` fields keep their stored values.
#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub start: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due: Option<DateTime<Utc>>,
}

fn fmt_utc(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn parse_utc(text: &str) -> StorageResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(text)?.with_timezone(&Utc))
}

// ---------------------------------------------------------------------------
// In-memory backend

#[derive(Default)]
struct MemoryInner {
    events: Vec<EventRecord>,
    tasks: Vec<TaskRecord>,
    notes: Vec<NoteRecord>,
    next_event_id: i64,
    next_task_id: i64,
    next_note_id: i64,
}

/// Process-local store. All mutation happens under one write lock, which
/// serializes the duplicate check against concurrent inserts.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventRepository for MemoryStore {
    async fn create_event(&self, event: NewEvent) -> StorageResult<CreateOutcome> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner
            .events
            .iter()
            .find(|rec| is_duplicate(&event.title, event.start, &rec.title, rec.start))
        {
            return Ok(CreateOutcome { id: existing.id, duplicate: true });
        }
        inner.next_event_id += 1;
        let id = inner.next_event_id;
        inner.events.push(EventRecord {
            id,
            title: event.title,
            start: event.start,
            timezone: event.timezone,
            remind_policy: event.remind_policy,
            created_at: Utc::now(),
        });
        Ok(CreateOutcome { id, duplicate: false })
    }

    async fn list_events(&self, window: Option<TimeWindow>) -> StorageResult<Vec<EventRecord>> {
        let inner = self.inner.read();
        let mut events: Vec<EventRecord> = inner
            .events
            .iter()
            .filter(|rec| match window {
                Some(window) => rec.start.is_some_and(|start| window.contains(start)),
                None => true,
            })
            .cloned()
            .collect();
        events.sort_by_key(|rec| (rec.start.is_none(), rec.start, rec.id));
        Ok(events)
    }

    async fn update_event(&self, id: i64, patch: EventPatch) -> StorageResult<bool> {
        let mut inner = self.inner.write();
        match inner.events.iter_mut().find(|rec| rec.id == id) {
            Some(rec) => {
                if let Some(title) = patch.title {
                    rec.title = title;
                }
                if let Some(start) = patch.start {
                    rec.start = Some(start);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_event(&self, id: i64) -> StorageResult<bool> {
        let mut inner = self.inner.write();
        let before = inner.events.len();
        inner.events.retain(|rec| rec.id != id);
        Ok(inner.events.len() < before)
    }
}

impl TaskRepository for MemoryStore {
    async fn create_task(&self, task: NewTask) -> StorageResult<CreateOutcome> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner
            .tasks
            .iter()
            .find(|rec| is_duplicate(&task.title, task.due, &rec.title, rec.due))
        {
            return Ok(CreateOutcome { id: existing.id, duplicate: true });
        }
        inner.next_task_id += 1;
        let id = inner.next_task_id;
        inner.tasks.push(TaskRecord {
            id,
            title: task.title,
            due: task.due,
            status: TaskStatus::Open,
            created_at: Utc::now(),
        });
        Ok(CreateOutcome { id, duplicate: false })
    }

    async fn list_tasks(&self, open_only: bool) -> StorageResult<Vec<TaskRecord>> {
        let inner = self.inner.read();
        let mut tasks: Vec<TaskRecord> = inner
            .tasks
            .iter()
            .filter(|rec| !open_only || rec.status == TaskStatus::Open)
            .cloned()
            .collect();
        tasks.sort_by_key(|rec| (rec.due.is_none(), rec.due, rec.id));
        Ok(tasks)
    }

    async fn update_task(&self, id: i64, patch: TaskPatch) -> StorageResult<bool> {
        let mut inner = self.inner.write();
        match inner.tasks.iter_mut().find(|rec| rec.id == id) {
            Some(rec) => {
                if let Some(title) = patch.title {
                    rec.title = title;
                }
                if let Some(due) = patch.due {
                    rec.due = Some(due);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_task(&self, id: i64) -> StorageResult<bool> {
        let mut inner = self.inner.write();
        let before = inner.tasks.len();
        inner.tasks.retain(|rec| rec.id != id);
        Ok(inner.tasks.len() < before)
    }

    async fn complete_task(&self, id: i64) -> StorageResult<bool> {
        let mut inner = self.inner.write();
        match inner.tasks.iter_mut().find(|rec| rec.id == id) {
            Some(rec) => {
                rec.status = TaskStatus::Done;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl NoteRepository for MemoryStore {
    async fn create_note(&self, note: NewNote) -> StorageResult<i64> {
        let mut inner = self.inner.write();
        inner.next_note_id += 1;
        let id = inner.next_note_id;
        inner.notes.push(NoteRecord {
            id,
            title: note.title,
            body: note.body,
            created_at: Utc::now(),
        });
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// SQLite backend

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) and migrate the database at `url`.
    ///
    /// The pool is capped at one connection: this is a single-user store and
    /// a single writer keeps the duplicate-check transaction serialized.
    #[instrument]
    pub async fn connect(url: &str) -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> StorageResult<()> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                start TEXT,
                timezone TEXT,
                remind_policy TEXT,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                due TEXT,
                status TEXT NOT NULL DEFAULT 'open',
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_start ON events(start);
            CREATE INDEX IF NOT EXISTS idx_tasks_due ON tasks(due);
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn event_from_row(row: &SqliteRow) -> StorageResult<EventRecord> {
    let start: Option<String> = row.try_get("start")?;
    let remind_policy: Option<String> = row.try_get("remind_policy")?;
    Ok(EventRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        start: start.as_deref().map(parse_utc).transpose()?,
        timezone: row.try_get("timezone")?,
        remind_policy: remind_policy
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        created_at: parse_utc(row.try_get::<String, _>("created_at")?.as_str())?,
    })
}

fn task_from_row(row: &SqliteRow) -> StorageResult<TaskRecord> {
    let due: Option<String> = row.try_get("due")?;
    let status: String = row.try_get("status")?;
    Ok(TaskRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        due: due.as_deref().map(parse_utc).transpose()?,
        status: TaskStatus::from_code(&status),
        created_at: parse_utc(row.try_get::<String, _>("created_at")?.as_str())?,
    })
}

impl EventRepository for SqliteStore {
    async fn create_event(&self, event: NewEvent) -> StorageResult<CreateOutcome> {
        let mut tx = self.pool.begin().await?;

        let candidates = match event.start {
            Some(start) => {
                sqlx::query("SELECT id, title, start FROM events WHERE start IS NOT NULL AND start >= ?1 AND start <= ?2")
                    .bind(fmt_utc(start - duplicate_window()))
                    .bind(fmt_utc(start + duplicate_window()))
                    .fetch_all(&mut *tx)
                    .await?
            }
            None => {
                sqlx::query("SELECT id, title, start FROM events WHERE start IS NULL")
                    .fetch_all(&mut *tx)
                    .await?
            }
        };
        for row in &candidates {
            let title: String = row.try_get("title")?;
            let start: Option<String> = row.try_get("start")?;
            let start = start.as_deref().map(parse_utc).transpose()?;
            if is_duplicate(&event.title, event.start, &title, start) {
                let id: i64 = row.try_get("id")?;
                tx.commit().await?;
                debug!(id, "duplicate event suppressed");
                return Ok(CreateOutcome { id, duplicate: true });
            }
        }

        let remind_policy = event
            .remind_policy
            .map(|policy| serde_json::to_string(&policy))
            .transpose()?;
        let result = sqlx::query(
            "INSERT INTO events (title, start, timezone, remind_policy, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&event.title)
        .bind(event.start.map(fmt_utc))
        .bind(&event.timezone)
        .bind(remind_policy)
        .bind(fmt_utc(Utc::now()))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(CreateOutcome { id: result.last_insert_rowid(), duplicate: false })
    }

    async fn list_events(&self, window: Option<TimeWindow>) -> StorageResult<Vec<EventRecord>> {
        let rows = match window {
            Some(window) => {
                sqlx::query("SELECT * FROM events WHERE start IS NOT NULL AND start >= ?1 AND start < ?2 ORDER BY start, id")
                    .bind(fmt_utc(window.start))
                    .bind(fmt_utc(window.end))
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT * FROM events ORDER BY start IS NULL, start, id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(event_from_row).collect()
    }

    async fn update_event(&self, id: i64, patch: EventPatch) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE events SET title = COALESCE(?1, title), start = COALESCE(?2, start) WHERE id = ?3",
        )
        .bind(patch.title)
        .bind(patch.start.map(fmt_utc))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_event(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl TaskRepository for SqliteStore {
    async fn create_task(&self, task: NewTask) -> StorageResult<CreateOutcome> {
        let mut tx = self.pool.begin().await?;

        let candidates = match task.due {
            Some(due) => {
                sqlx::query("SELECT id, title, due FROM tasks WHERE due IS NOT NULL AND due >= ?1 AND due <= ?2")
                    .bind(fmt_utc(due - duplicate_window()))
                    .bind(fmt_utc(due + duplicate_window()))
                    .fetch_all(&mut *tx)
                    .await?
            }
            None => {
                sqlx::query("SELECT id, title, due FROM tasks WHERE due IS NULL")
                    .fetch_all(&mut *tx)
                    .await?
            }
        };
        for row in &candidates {
            let title: String = row.try_get("title")?;
            let due: Option<String> = row.try_get("due")?;
            let due = due.as_deref().map(parse_utc).transpose()?;
            if is_duplicate(&task.title, task.due, &title, due) {
                let id: i64 = row.try_get("id")?;
                tx.commit().await?;
                debug!(id, "duplicate task suppressed");
                return Ok(CreateOutcome { id, duplicate: true });
            }
        }

        let result = sqlx::query(
            "INSERT INTO tasks (title, due, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&task.title)
        .bind(task.due.map(fmt_utc))
        .bind(TaskStatus::Open.as_code())
        .bind(fmt_utc(Utc::now()))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(CreateOutcome { id: result.last_insert_rowid(), duplicate: false })
    }

    async fn list_tasks(&self, open_only: bool) -> StorageResult<Vec<TaskRecord>> {
        let sql = if open_only {
            "SELECT * FROM tasks WHERE status = 'open' ORDER BY due IS NULL, due, id"
        } else {
            "SELECT * FROM tasks ORDER BY due IS NULL, due, id"
        };
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(task_from_row).collect()
    }

    async fn update_task(&self, id: i64, patch: TaskPatch) -> StorageResult<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET title = COALESCE(?1, title), due = COALESCE(?2, due) WHERE id = ?3",
        )
        .bind(patch.title)
        .bind(patch.due.map(fmt_utc))
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_task(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_task(&self, id: i64) -> StorageResult<bool> {
        let result = sqlx::query("UPDATE tasks SET status = 'done' WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

impl NoteRepository for SqliteStore {
    async fn create_note(&self, note: NewNote) -> StorageResult<i64> {
        let result = sqlx::query(
            "INSERT INTO notes (title, body, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(&note.title)
        .bind(&note.body)
        .bind(fmt_utc(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

// ---------------------------------------------------------------------------
// Backend selection

/// Runtime-selected backend. `memory` (or an empty URL) picks the in-memory
/// store, anything else is treated as a SQLite URL.
#[derive(Clone)]
pub enum Store {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl Store {
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let trimmed = database_url.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("memory") {
            return Ok(Self::Memory(MemoryStore::new()));
        }
        Ok(Self::Sqlite(SqliteStore::connect(trimmed).await?))
    }
}

impl EventRepository for Store {
    async fn create_event(&self, event: NewEvent) -> StorageResult<CreateOutcome> {
        match self {
            Self::Memory(store) => store.create_event(event).await,
            Self::Sqlite(store) => store.create_event(event).await,
        }
    }

    async fn list_events(&self, window: Option<TimeWindow>) -> StorageResult<Vec<EventRecord>> {
        match self {
            Self::Memory(store) => store.list_events(window).await,
            Self::Sqlite(store) => store.list_events(window).await,
        }
    }

    async fn update_event(&self, id: i64, patch: EventPatch) -> StorageResult<bool> {
        match self {
            Self::Memory(store) => store.update_event(id, patch).await,
            Self::Sqlite(store) => store.update_event(id, patch).await,
        }
    }

    async fn delete_event(&self, id: i64) -> StorageResult<bool> {
        match self {
            Self::Memory(store) => store.delete_event(id).await,
            Self::Sqlite(store) => store.delete_event(id).await,
        }
    }
}

impl TaskRepository for Store {
    async fn create_task(&self, task: NewTask) -> StorageResult<CreateOutcome> {
        match self {
            Self::Memory(store) => store.create_task(task).await,
            Self::Sqlite(store) => store.create_task(task).await,
        }
    }

    async fn list_tasks(&self, open_only: bool) -> StorageResult<Vec<TaskRecord>> {
        match self {
            Self::Memory(store) => store.list_tasks(open_only).await,
            Self::Sqlite(store) => store.list_tasks(open_only).await,
        }
    }

    async fn update_task(&self, id: i64, patch: TaskPatch) -> StorageResult<bool> {
        match self {
            Self::Memory(store) => store.update_task(id, patch).await,
            Self::Sqlite(store) => store.update_task(id, patch).await,
        }
    }

    async fn delete_task(&self, id: i64) -> StorageResult<bool> {
        match self {
            Self::Memory(store) => store.delete_task(id).await,
            Self::Sqlite(store) => store.delete_task(id).await,
        }
    }

    async fn complete_task(&self, id: i64) -> StorageResult<bool> {
        match self {
            Self::Memory(store) => store.complete_task(id).await,
            Self::Sqlite(store) => store.complete_task(id).await,
        }
    }
}

impl NoteRepository for Store {
    async fn create_note(&self, note: NewNote) -> StorageResult<i64> {
        match self {
            Self::Memory(store) => store.create_note(note).await,
            Self::Sqlite(store) => store.create_note(note).await,
        }
    }
}
