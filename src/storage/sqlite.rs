use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{CachedQuery, ChatMessage, ChatSession, SenderType};

/// SQLite storage for chat sessions, messages and cached query results
/// Uses tokio::Mutex for async-friendly locking
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        // Handle SQLite URL format (sqlite:./path or sqlite://path)
        let path_str = db_path.as_ref().to_string_lossy();
        let clean_path: &str = if path_str.starts_with("sqlite:") {
            let mut cleaned = path_str.trim_start_matches("sqlite:");
            cleaned = cleaned.trim_start_matches("//");
            cleaned
        } else {
            path_str.as_ref()
        };

        let conn = Connection::open(clean_path)?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize database schema
    async fn init_schema(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS chat_sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                sender_type TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS cached_queries (
                id TEXT PRIMARY KEY,
                normalized_question TEXT NOT NULL,
                query_text TEXT NOT NULL,
                result_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                ttl_seconds INTEGER,
                hit_count INTEGER NOT NULL DEFAULT 0
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_chat_messages_session_id ON chat_messages(session_id)",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cached_queries_question ON cached_queries(normalized_question)",
            [],
        )?;

        Ok(())
    }

    // ==================== Chat sessions ====================

    pub async fn create_session(&self, session: &ChatSession) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO chat_sessions (id, title, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![session.id, session.title, session.created_at.to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn get_session(&self, id: &str) -> SqliteResult<Option<ChatSession>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT id, title, created_at FROM chat_sessions WHERE id = ?1")?;

        let result = stmt.query_row(rusqlite::params![id], |row| {
            Ok(ChatSession {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: parse_timestamp(&row.get::<_, String>(2)?),
            })
        });

        match result {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn list_sessions(&self) -> SqliteResult<Vec<ChatSession>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT id, title, created_at FROM chat_sessions ORDER BY created_at DESC")?;

        let rows = stmt.query_map([], |row| {
            Ok(ChatSession {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: parse_timestamp(&row.get::<_, String>(2)?),
            })
        })?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(row?);
        }
        Ok(sessions)
    }

    /// Delete a session and its messages; returns false when unknown
    pub async fn delete_session(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM chat_messages WHERE session_id = ?1", rusqlite::params![id])?;
        let rows_affected = conn.execute("DELETE FROM chat_sessions WHERE id = ?1", rusqlite::params![id])?;
        Ok(rows_affected > 0)
    }

    // ==================== Chat messages ====================

    pub async fn add_message(&self, message: &ChatMessage) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO chat_messages (id, session_id, sender_type, content, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            rusqlite::params![
                message.id,
                message.session_id,
                message.sender_type.as_str(),
                message.content,
                message.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub async fn list_messages(&self, session_id: &str) -> SqliteResult<Vec<ChatMessage>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, sender_type, content, created_at FROM chat_messages WHERE session_id = ?1 ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(rusqlite::params![session_id], |row| {
            Ok(ChatMessage {
                id: row.get(0)?,
                session_id: row.get(1)?,
                sender_type: SenderType::from_str(&row.get::<_, String>(2)?),
                content: row.get(3)?,
                created_at: parse_timestamp(&row.get::<_, String>(4)?),
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    // ==================== Cached queries ====================

    pub async fn insert_cached_query(&self, entry: &CachedQuery) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            r#"
            INSERT INTO cached_queries
            (id, normalized_question, query_text, result_json, created_at, ttl_seconds, hit_count)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            rusqlite::params![
                entry.id,
                entry.normalized_question,
                entry.query_text,
                entry.result_json,
                entry.created_at.to_rfc3339(),
                entry.ttl_seconds,
                entry.hit_count,
            ],
        )?;
        Ok(())
    }

    pub async fn list_cached_queries(&self) -> SqliteResult<Vec<CachedQuery>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, normalized_question, query_text, result_json, created_at, ttl_seconds, hit_count FROM cached_queries ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(CachedQuery {
                id: row.get(0)?,
                normalized_question: row.get(1)?,
                query_text: row.get(2)?,
                result_json: row.get(3)?,
                created_at: parse_timestamp(&row.get::<_, String>(4)?),
                ttl_seconds: row.get(5)?,
                hit_count: row.get(6)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub async fn increment_cache_hit(&self, id: &str) -> SqliteResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE cached_queries SET hit_count = hit_count + 1 WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now())
}
