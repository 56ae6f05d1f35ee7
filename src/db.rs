//! Database layer
//!
//! Persistence for accounts, chat threads, and per-user settings.

mod schema;

pub use schema::{Setting, Thread, ThreadMessage, User};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use schema::{parse_datetime, SCHEMA};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("user already exists: {0}")]
    UserExists(String),
    #[error("thread not found: {0}")]
    ThreadNotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== User Operations ====================

    pub fn create_user(
        &self,
        email: &str,
        username: &str,
        password_hash: &str,
        registration_ip: Option<&str>,
    ) -> DbResult<User> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO users (email, username, password_hash, role, disabled, registration_ip, registration_date)
             VALUES (?1, ?2, ?3, 'user', 0, ?4, ?5)",
            params![email, username, password_hash, registration_ip, now.to_rfc3339()],
        )?;
        if inserted == 0 {
            return Err(DbError::UserExists(email.to_string()));
        }

        Ok(User {
            email: email.to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role: "user".to_string(),
            disabled: false,
            registration_ip: registration_ip.map(String::from),
            registration_date: now,
            last_login: None,
            last_ip: None,
        })
    }

    pub fn get_user(&self, email: &str) -> DbResult<User> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT email, username, password_hash, role, disabled, registration_ip,
                    registration_date, last_login, last_ip
             FROM users WHERE email = ?1",
        )?;

        stmt.query_row(params![email], |row| {
            Ok(User {
                email: row.get(0)?,
                username: row.get(1)?,
                password_hash: row.get(2)?,
                role: row.get(3)?,
                disabled: row.get(4)?,
                registration_ip: row.get(5)?,
                registration_date: parse_datetime(&row.get::<_, String>(6)?),
                last_login: row
                    .get::<_, Option<String>>(7)?
                    .map(|raw| parse_datetime(&raw)),
                last_ip: row.get(8)?,
            })
        })
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => DbError::UserNotFound(email.to_string()),
            other => DbError::Sqlite(other),
        })
    }

    pub fn update_username(&self, email: &str, username: &str) -> DbResult<()> {
        self.update_user_column(email, "username", username)
    }

    pub fn update_password(&self, email: &str, password_hash: &str) -> DbResult<()> {
        self.update_user_column(email, "password_hash", password_hash)
    }

    pub fn set_user_disabled(&self, email: &str, disabled: bool) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE users SET disabled = ?2 WHERE email = ?1",
            params![email, disabled],
        )?;
        if updated == 0 {
            return Err(DbError::UserNotFound(email.to_string()));
        }
        Ok(())
    }

    /// Stamp a successful login with its time and source address.
    pub fn record_login(&self, email: &str, ip: &str, at: DateTime<Utc>) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE users SET last_login = ?2, last_ip = ?3 WHERE email = ?1",
            params![email, at.to_rfc3339(), ip],
        )?;
        if updated == 0 {
            return Err(DbError::UserNotFound(email.to_string()));
        }
        Ok(())
    }

    fn update_user_column(&self, email: &str, column: &str, value: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        // Column names come from the fixed callers above, never from input.
        let updated = conn.execute(
            &format!("UPDATE users SET {column} = ?2 WHERE email = ?1"),
            params![email, value],
        )?;
        if updated == 0 {
            return Err(DbError::UserNotFound(email.to_string()));
        }
        Ok(())
    }

    // ==================== Thread Operations ====================

    pub fn create_thread(&self, thread_id: &str, title: &str, created_by: &str) -> DbResult<Thread> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO threads (thread_id, title, created_by, created_at, last_updated, disabled)
             VALUES (?1, ?2, ?3, ?4, ?4, 0)",
            params![thread_id, title, created_by, now.to_rfc3339()],
        )?;

        Ok(Thread {
            thread_id: thread_id.to_string(),
            title: title.to_string(),
            created_by: created_by.to_string(),
            created_at: now,
            last_updated: now,
            disabled: false,
        })
    }

    /// Active (non-disabled) threads for one user, most recent first.
    pub fn get_threads(&self, created_by: &str) -> DbResult<Vec<Thread>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT thread_id, title, created_by, created_at, last_updated, disabled
             FROM threads WHERE created_by = ?1 AND disabled = 0
             ORDER BY last_updated DESC",
        )?;

        let rows = stmt.query_map(params![created_by], map_thread_row)?;
        let mut threads = Vec::new();
        for row in rows {
            threads.push(row?);
        }
        Ok(threads)
    }

    /// Fetch one thread, scoped to its owner.
    pub fn get_thread(&self, thread_id: &str, created_by: &str) -> DbResult<Thread> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT thread_id, title, created_by, created_at, last_updated, disabled
             FROM threads WHERE thread_id = ?1 AND created_by = ?2",
        )?;

        stmt.query_row(params![thread_id, created_by], map_thread_row)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DbError::ThreadNotFound(thread_id.to_string())
                }
                other => DbError::Sqlite(other),
            })
    }

    pub fn set_thread_disabled(&self, thread_id: &str, disabled: bool) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE threads SET disabled = ?2 WHERE thread_id = ?1",
            params![thread_id, disabled],
        )?;
        if updated == 0 {
            return Err(DbError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }

    /// Append a message and touch the thread's freshness columns.
    pub fn add_thread_message(
        &self,
        thread_id: &str,
        author: &str,
        content: &str,
    ) -> DbResult<ThreadMessage> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let id = uuid::Uuid::new_v4().to_string();

        let touched = conn.execute(
            "UPDATE threads SET last_updated = ?2 WHERE thread_id = ?1",
            params![thread_id, now.to_rfc3339()],
        )?;
        if touched == 0 {
            return Err(DbError::ThreadNotFound(thread_id.to_string()));
        }

        conn.execute(
            "INSERT INTO thread_messages (id, thread_id, author, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, thread_id, author, content, now.to_rfc3339()],
        )?;

        Ok(ThreadMessage {
            id,
            thread_id: thread_id.to_string(),
            author: author.to_string(),
            content: content.to_string(),
            created_at: now,
        })
    }

    /// Messages of one thread in insertion order.
    pub fn get_thread_messages(&self, thread_id: &str) -> DbResult<Vec<ThreadMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, author, content, created_at
             FROM thread_messages WHERE thread_id = ?1
             ORDER BY created_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(params![thread_id], |row| {
            Ok(ThreadMessage {
                id: row.get(0)?,
                thread_id: row.get(1)?,
                author: row.get(2)?,
                content: row.get(3)?,
                created_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;
        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    // ==================== Settings Operations ====================

    pub fn get_settings(&self, created_by: &str) -> DbResult<Vec<Setting>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT key, value FROM settings WHERE created_by = ?1 ORDER BY key ASC",
        )?;

        let rows = stmt.query_map(params![created_by], |row| {
            Ok(Setting {
                key: row.get(0)?,
                value: row.get(1)?,
            })
        })?;
        let mut settings = Vec::new();
        for row in rows {
            settings.push(row?);
        }
        Ok(settings)
    }

    pub fn upsert_setting(&self, created_by: &str, key: &str, value: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (created_by, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(created_by, key) DO UPDATE SET value = excluded.value",
            params![created_by, key, value],
        )?;
        Ok(())
    }
}

fn map_thread_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Thread> {
    Ok(Thread {
        thread_id: row.get(0)?,
        title: row.get(1)?,
        created_by: row.get(2)?,
        created_at: parse_datetime(&row.get::<_, String>(3)?),
        last_updated: parse_datetime(&row.get::<_, String>(4)?),
        disabled: row.get(5)?,
    })
}
