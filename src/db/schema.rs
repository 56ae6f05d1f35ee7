//! Database schema and row types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema migrations, applied as a batch at open.
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS users (
    email TEXT PRIMARY KEY,
    username TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL DEFAULT 'user',
    disabled INTEGER NOT NULL DEFAULT 0,
    registration_ip TEXT,
    registration_date TEXT NOT NULL,
    last_login TEXT,
    last_ip TEXT
);

CREATE TABLE IF NOT EXISTS threads (
    thread_id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    created_by TEXT NOT NULL REFERENCES users(email),
    created_at TEXT NOT NULL,
    last_updated TEXT NOT NULL,
    disabled INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_threads_created_by ON threads(created_by);

CREATE TABLE IF NOT EXISTS thread_messages (
    id TEXT PRIMARY KEY,
    thread_id TEXT NOT NULL REFERENCES threads(thread_id),
    author TEXT NOT NULL,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_thread_messages_thread
    ON thread_messages(thread_id, created_at);

CREATE TABLE IF NOT EXISTS settings (
    created_by TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (created_by, key)
);
";

/// A registered account. The password hash never serializes out.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub email: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub disabled: bool,
    pub registration_ip: Option<String>,
    pub registration_date: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub last_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    pub title: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub thread_id: String,
    pub author: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}

/// Parse a stored RFC 3339 timestamp, tolerating rows written by hand.
pub(crate) fn parse_datetime(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339());
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_parse_datetime_tolerates_garbage() {
        assert_eq!(parse_datetime("not a date"), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            email: "a@b.c".into(),
            username: "a".into(),
            password_hash: "secret".into(),
            role: "user".into(),
            disabled: false,
            registration_ip: None,
            registration_date: Utc::now(),
            last_login: None,
            last_ip: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "a@b.c");
    }
}
