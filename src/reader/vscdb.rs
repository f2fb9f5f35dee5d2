//! Read-only access to VS Code style `state.vscdb` key-value databases
//!
//! Handles are opened per call and dropped before the caller returns, so no
//! reader keeps an editor database open between extractions.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::path::Path;

pub(crate) struct StateDb {
    conn: Connection,
}

impl StateDb {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        Ok(Self { conn })
    }

    fn get_text(&self, table: &str, key: &str) -> Result<Option<String>> {
        let sql = format!("SELECT value FROM {} WHERE key = ?", table);
        let raw: Option<rusqlite::types::Value> = self
            .conn
            .query_row(&sql, [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Failed to read {} from {}", key, table))?;
        Ok(raw.and_then(value_text))
    }

    /// JSON stored under `key` in `ItemTable`
    pub fn item(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get_text("ItemTable", key)?.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// JSON stored under `key` in `cursorDiskKV`
    pub fn disk_kv(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.get_text("cursorDiskKV", key)?.and_then(|s| serde_json::from_str(&s).ok()))
    }

    /// Every `cursorDiskKV` row whose key starts with `prefix`, parsed as JSON.
    /// Rows that fail to parse are skipped.
    pub fn disk_kv_prefixed(&self, prefix: &str) -> Result<Vec<(String, Value)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key, value FROM cursorDiskKV WHERE key LIKE ? ESCAPE '\\'")?;
        let pattern = format!("{}%", prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_"));
        let rows = stmt.query_map([pattern], |row| {
            let key: String = row.get(0)?;
            let raw: rusqlite::types::Value = row.get(1)?;
            Ok((key, raw))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (key, raw) = row?;
            let Some(text) = value_text(raw) else { continue };
            match serde_json::from_str(&text) {
                Ok(value) => out.push((key, value)),
                Err(e) => tracing::debug!("skipping malformed {}: {}", key, e),
            }
        }
        Ok(out)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                [table],
                |_| Ok(()),
            )
            .is_ok()
    }
}

// values are TEXT in ItemTable and BLOB in cursorDiskKV
fn value_text(raw: rusqlite::types::Value) -> Option<String> {
    match raw {
        rusqlite::types::Value::Text(s) => Some(s),
        rusqlite::types::Value::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod fixture {
    use rusqlite::{params, Connection};
    use std::path::Path;

    /// Create a state.vscdb with both tables and the given rows
    pub fn write_state_db(path: &Path, items: &[(&str, String)], disk_kv: &[(&str, String)]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);
             CREATE TABLE cursorDiskKV (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB);",
        )
        .unwrap();
        for (k, v) in items {
            conn.execute("INSERT INTO ItemTable (key, value) VALUES (?, ?)", params![k, v]).unwrap();
        }
        for (k, v) in disk_kv {
            conn.execute("INSERT INTO cursorDiskKV (key, value) VALUES (?, ?)", params![k, v]).unwrap();
        }
    }
}
