use anyhow::{anyhow, Result};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{Level, SourceId};

/// A persisted alert as returned by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: i64,
    pub source_id: SourceId,
    pub level: Level,
    pub message: String,
    /// Unix seconds.
    pub created_at: i64,
}

/// Persistence collaborator shared by all workers.
///
/// Ids are assigned by the store and strictly increase across calls.
pub trait NotificationStore: Send + Sync {
    fn record_alert(&self, source_id: &SourceId, level: Level, message: &str)
        -> Result<Notification>;
}

pub struct SqliteNotificationStore {
    conn: Mutex<Connection>,
}

impl SqliteNotificationStore {
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        ensure_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Most recent notifications first.
    pub fn recent(&self, limit: usize) -> Result<Vec<Notification>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, source_id, level, message, created_at
             FROM notifications ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, source_id, level, message, created_at) = row?;
            let level = Level::parse(&level)
                .ok_or_else(|| anyhow!("corrupt notification {}: level '{}'", id, level))?;
            out.push(Notification {
                id,
                source_id: SourceId::from(source_id),
                level,
                message,
                created_at,
            });
        }
        Ok(out)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("notification store lock poisoned"))
    }
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;

        CREATE TABLE IF NOT EXISTS notifications (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          source_id TEXT NOT NULL,
          level TEXT NOT NULL,
          message TEXT NOT NULL,
          created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_created ON notifications(created_at);
        "#,
    )?;
    Ok(())
}

impl NotificationStore for SqliteNotificationStore {
    fn record_alert(
        &self,
        source_id: &SourceId,
        level: Level,
        message: &str,
    ) -> Result<Notification> {
        let created_at = now_s()?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO notifications(source_id, level, message, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![source_id.as_str(), level.as_str(), message, created_at],
        )?;
        Ok(Notification {
            id: conn.last_insert_rowid(),
            source_id: source_id.clone(),
            level,
            message: message.to_string(),
            created_at,
        })
    }
}

/// Volatile store for tests and runs without a database.
#[derive(Default)]
pub struct InMemoryNotificationStore {
    rows: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Notification> {
        match self.rows.lock() {
            Ok(rows) => rows.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationStore for InMemoryNotificationStore {
    fn record_alert(
        &self,
        source_id: &SourceId,
        level: Level,
        message: &str,
    ) -> Result<Notification> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| anyhow!("notification store lock poisoned"))?;
        let id = rows.last().map(|n| n.id + 1).unwrap_or(1);
        let notification = Notification {
            id,
            source_id: source_id.clone(),
            level,
            message: message.to_string(),
            created_at: now_s()?,
        };
        rows.push(notification.clone());
        Ok(notification)
    }
}

fn now_s() -> Result<i64> {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    i64::try_from(secs).map_err(|_| anyhow!("clock exceeds i64 range"))
}
