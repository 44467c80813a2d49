//! SQLite-backed persistence for scheduled notifications and the string-set
//! key-value namespace used by the dismissal journal.
//! Survives process death and device reboot.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use nudge_core::error::{NudgeError, Result};
use nudge_core::record::NotificationRecord;
use rusqlite::{Connection, OptionalExtension};

use crate::store::ScheduleEntry;

/// SQLite-backed persistence store. Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct SchedulerDb {
    conn: Arc<Mutex<Connection>>,
}

impl SchedulerDb {
    /// Open or create the scheduler database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| db_err("DB open", e))?;
        Self::with_connection(conn)
    }

    /// Private in-memory database (tests, ephemeral hosts).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| db_err("DB open", e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            -- Pending schedules, re-armed after reboot
            CREATE TABLE IF NOT EXISTS scheduled_notifications (
                id INTEGER PRIMARY KEY,
                record TEXT NOT NULL,            -- JSON payload (host wire keys)
                fire_at TEXT NOT NULL,           -- RFC3339, next fire
                interval_secs INTEGER,           -- NULL for one-shot
                scheduled_at TEXT NOT NULL
            );

            -- Named string sets (namespace + key → members)
            CREATE TABLE IF NOT EXISTS kv_string_sets (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                member TEXT NOT NULL,
                PRIMARY KEY (namespace, key, member)
            );
         ",
            )
            .map_err(|e| db_err("Migration", e))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| NudgeError::Persistence("connection mutex poisoned".into()))
    }

    // ─── Scheduled notifications ──────────────────────────────

    /// Insert or replace the entry for `entry.record.id`.
    pub fn upsert_schedule(&self, entry: &ScheduleEntry) -> Result<()> {
        let record_json = serde_json::Value::Object(entry.record.to_payload()).to_string();
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO scheduled_notifications
                 (id, record, fire_at, interval_secs, scheduled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    entry.record.id,
                    record_json,
                    entry.fire_at.to_rfc3339(),
                    entry.record.interval_seconds,
                    entry.scheduled_at.to_rfc3339(),
                ],
            )
            .map_err(|e| db_err("Save schedule", e))?;
        Ok(())
    }

    /// Delete the entry for `id`. Returns whether a row existed.
    pub fn remove_schedule(&self, id: i32) -> Result<bool> {
        let n = self
            .conn()?
            .execute("DELETE FROM scheduled_notifications WHERE id = ?1", [id])
            .map_err(|e| db_err("Remove schedule", e))?;
        Ok(n > 0)
    }

    pub fn get_schedule(&self, id: i32) -> Result<Option<ScheduleEntry>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT record, fire_at, scheduled_at FROM scheduled_notifications WHERE id = ?1",
                [id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()
            .map_err(|e| db_err("Get schedule", e))?;
        Ok(row.and_then(|(record, fire_at, scheduled_at)| decode_entry(&record, &fire_at, &scheduled_at)))
    }

    /// Load all schedule entries, ordered by next fire time.
    /// Rows that no longer decode are skipped with a warning.
    pub fn load_schedules(&self) -> Result<Vec<ScheduleEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT record, fire_at, scheduled_at FROM scheduled_notifications ORDER BY fire_at")
            .map_err(|e| db_err("Load schedules", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })
            .map_err(|e| db_err("Load schedules", e))?;

        let mut entries = Vec::new();
        for row in rows {
            let (record, fire_at, scheduled_at) = row.map_err(|e| db_err("Load schedules", e))?;
            if let Some(entry) = decode_entry(&record, &fire_at, &scheduled_at) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    pub fn count_schedules(&self) -> Result<usize> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM scheduled_notifications", [], |r| r.get(0))
            .map_err(|e| db_err("Count schedules", e))?;
        Ok(n as usize)
    }

    // ─── String sets ──────────────────────────────────────────

    pub fn set_members(&self, namespace: &str, key: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT member FROM kv_string_sets WHERE namespace = ?1 AND key = ?2 ORDER BY rowid")
            .map_err(|e| db_err("Read set", e))?;
        let rows = stmt
            .query_map([namespace, key], |row| row.get::<_, String>(0))
            .map_err(|e| db_err("Read set", e))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("Read set", e))
    }

    /// Remove every `stale` member and add `member` in one transaction; an
    /// identical member is collapsed (set semantics). On error the set is unchanged.
    pub fn replace_members(
        &self,
        namespace: &str,
        key: &str,
        stale: &[String],
        member: &str,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(|e| db_err("Write set", e))?;
        for old in stale {
            tx.execute(
                "DELETE FROM kv_string_sets WHERE namespace = ?1 AND key = ?2 AND member = ?3",
                [namespace, key, old.as_str()],
            )
            .map_err(|e| db_err("Write set", e))?;
        }
        tx.execute(
            "INSERT OR IGNORE INTO kv_string_sets (namespace, key, member) VALUES (?1, ?2, ?3)",
            [namespace, key, member],
        )
        .map_err(|e| db_err("Write set", e))?;
        tx.commit().map_err(|e| db_err("Write set", e))
    }

    pub fn clear_set(&self, namespace: &str, key: &str) -> Result<()> {
        self.conn()?
            .execute(
                "DELETE FROM kv_string_sets WHERE namespace = ?1 AND key = ?2",
                [namespace, key],
            )
            .map_err(|e| db_err("Clear set", e))?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn()?
            .execute_batch(sql)
            .map_err(|e| db_err("Batch", e))
    }
}

fn db_err(ctx: &str, e: rusqlite::Error) -> NudgeError {
    NudgeError::Persistence(format!("{ctx}: {e}"))
}

fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

fn decode_entry(record_json: &str, fire_at: &str, scheduled_at: &str) -> Option<ScheduleEntry> {
    let payload = match serde_json::from_str::<serde_json::Value>(record_json) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::warn!("⚠️ Skipping schedule row with unreadable record: {record_json}");
            return None;
        }
    };
    let record = match NotificationRecord::from_payload(&payload) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("⚠️ Skipping invalid stored record: {e}");
            return None;
        }
    };
    let fire_at = parse_time(fire_at)?;
    let scheduled_at = parse_time(scheduled_at).unwrap_or(fire_at);
    Some(ScheduleEntry {
        record,
        fire_at,
        scheduled_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: i32) -> ScheduleEntry {
        let now = Utc::now();
        ScheduleEntry {
            record: NotificationRecord::new(id, "general", "title", "body", "icon"),
            fire_at: now,
            scheduled_at: now,
        }
    }

    #[test]
    fn test_open_and_migrate() {
        let dir = std::env::temp_dir().join("nudge-sched-db-test");
        std::fs::remove_dir_all(&dir).ok();
        let db = SchedulerDb::open(&dir.join("test.db")).unwrap();
        assert!(db.load_schedules().unwrap().is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_upsert_replaces_by_id() {
        let db = SchedulerDb::open_in_memory().unwrap();
        db.upsert_schedule(&entry(1)).unwrap();
        let mut second = entry(1);
        second.record.title = "updated".into();
        db.upsert_schedule(&second).unwrap();

        assert_eq!(db.count_schedules().unwrap(), 1);
        assert_eq!(db.get_schedule(1).unwrap().unwrap().record.title, "updated");
    }

    #[test]
    fn test_remove_schedule() {
        let db = SchedulerDb::open_in_memory().unwrap();
        db.upsert_schedule(&entry(3)).unwrap();
        assert!(db.remove_schedule(3).unwrap());
        assert!(!db.remove_schedule(3).unwrap());
        assert!(db.get_schedule(3).unwrap().is_none());
    }

    #[test]
    fn test_string_set_semantics() {
        let db = SchedulerDb::open_in_memory().unwrap();
        db.replace_members("ns", "k", &[], "a").unwrap();
        db.replace_members("ns", "k", &[], "a").unwrap();
        db.replace_members("ns", "k", &[], "b").unwrap();
        db.replace_members("ns", "other", &[], "c").unwrap();
        assert_eq!(db.set_members("ns", "k").unwrap(), vec!["a", "b"]);

        db.replace_members("ns", "k", &["a".to_string()], "d").unwrap();
        assert_eq!(db.set_members("ns", "k").unwrap(), vec!["b", "d"]);

        db.clear_set("ns", "k").unwrap();
        assert!(db.set_members("ns", "k").unwrap().is_empty());
        assert_eq!(db.set_members("ns", "other").unwrap(), vec!["c"]);
    }

    #[test]
    fn test_failed_replace_leaves_set_unchanged() {
        let db = SchedulerDb::open_in_memory().unwrap();
        db.replace_members("ns", "k", &[], "a").unwrap();
        db.execute_batch(
            "CREATE TRIGGER reject_insert BEFORE INSERT ON kv_string_sets
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

        assert!(db.replace_members("ns", "k", &["a".to_string()], "b").is_err());
        assert_eq!(db.set_members("ns", "k").unwrap(), vec!["a"]);
    }
}
