//! Dismissal journal: durable set of dismissals that arrived while no host was
//! attached, replayed once the host becomes ready.
//!
//! Layout: one string set under `(namespace, key)` in [`SchedulerDb`]; each member is
//! a self-contained JSON snapshot of the record using the host payload keys.
//!
//! With `dedup_by_id` (the default) appending a snapshot first drops any member for
//! the same notification id, so a replay emits at most one dismissal per id with the
//! newest snapshot. With it off, only byte-identical snapshots collapse.

use nudge_core::config::JournalConfig;
use nudge_core::error::Result;
use nudge_core::record::{NotificationRecord, KEY_ID};

use crate::persistence::SchedulerDb;

pub struct DismissalJournal {
    db: SchedulerDb,
    namespace: String,
    key: String,
    dedup_by_id: bool,
}

impl DismissalJournal {
    pub fn new(db: SchedulerDb, config: &JournalConfig) -> Self {
        Self {
            db,
            namespace: config.namespace.clone(),
            key: config.key.clone(),
            dedup_by_id: config.dedup_by_id,
        }
    }

    /// Persist a dismissal snapshot.
    pub fn append(&self, record: &NotificationRecord) -> Result<()> {
        let snapshot = serde_json::Value::Object(record.to_payload()).to_string();
        let stale: Vec<String> = if self.dedup_by_id {
            self.db
                .set_members(&self.namespace, &self.key)?
                .into_iter()
                .filter(|member| *member != snapshot && snapshot_id(member) == Some(record.id))
                .collect()
        } else {
            Vec::new()
        };
        if !stale.is_empty() {
            tracing::debug!("📝 Replacing stale dismissal snapshot for {}", record.id);
        }
        self.db
            .replace_members(&self.namespace, &self.key, &stale, &snapshot)?;
        tracing::debug!("📝 Journaled dismissal for {}: {snapshot}", record.id);
        Ok(())
    }

    /// Every journaled record, in insertion order. Unreadable members are skipped.
    pub fn entries(&self) -> Result<Vec<NotificationRecord>> {
        let members = self.db.set_members(&self.namespace, &self.key)?;
        Ok(members.iter().filter_map(|m| decode(m)).collect())
    }

    pub fn clear(&self) -> Result<()> {
        self.db.clear_set(&self.namespace, &self.key)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.db.set_members(&self.namespace, &self.key)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn snapshot_id(member: &str) -> Option<i32> {
    let value: serde_json::Value = serde_json::from_str(member).ok()?;
    value.get(KEY_ID)?.as_i64().and_then(|id| i32::try_from(id).ok())
}

fn decode(member: &str) -> Option<NotificationRecord> {
    let payload = match serde_json::from_str::<serde_json::Value>(member) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => {
            tracing::error!("❌ Failed to parse stored dismissal snapshot: {member}");
            return None;
        }
    };
    match NotificationRecord::from_payload(&payload) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::error!("❌ Stored dismissal snapshot is not a valid record: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journal(db: &SchedulerDb, dedup_by_id: bool) -> DismissalJournal {
        let config = JournalConfig {
            dedup_by_id,
            ..JournalConfig::default()
        };
        DismissalJournal::new(db.clone(), &config)
    }

    #[test]
    fn test_append_and_clear() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let j = journal(&db, true);
        j.append(&NotificationRecord::new(42, "c", "t", "b", "i")).unwrap();
        j.append(&NotificationRecord::new(43, "c", "t", "b", "i")).unwrap();
        assert_eq!(j.len().unwrap(), 2);

        let entries = j.entries().unwrap();
        assert_eq!(entries.iter().map(|r| r.id).collect::<Vec<_>>(), vec![42, 43]);
        j.clear().unwrap();
        assert!(j.is_empty().unwrap());
    }

    #[test]
    fn test_exact_duplicates_collapse() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let j = journal(&db, false);
        let record = NotificationRecord::new(1, "c", "t", "b", "i");
        j.append(&record).unwrap();
        j.append(&record).unwrap();
        assert_eq!(j.len().unwrap(), 1);
    }

    #[test]
    fn test_dedup_by_id_keeps_newest_snapshot() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let j = journal(&db, true);
        j.append(&NotificationRecord::new(5, "c", "old", "b", "i")).unwrap();
        j.append(&NotificationRecord::new(5, "c", "new", "b", "i")).unwrap();

        let entries = j.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "new");
    }

    #[test]
    fn test_near_duplicates_kept_without_dedup() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let j = journal(&db, false);
        j.append(&NotificationRecord::new(5, "c", "old", "b", "i")).unwrap();
        j.append(&NotificationRecord::new(5, "c", "new", "b", "i")).unwrap();
        assert_eq!(j.len().unwrap(), 2);
    }

    #[test]
    fn test_corrupt_member_is_skipped() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let j = journal(&db, true);
        let config = JournalConfig::default();
        db.replace_members(&config.namespace, &config.key, &[], "{not json")
            .unwrap();
        j.append(&NotificationRecord::new(9, "c", "t", "b", "i")).unwrap();

        let entries = j.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, 9);
        assert_eq!(j.len().unwrap(), 2);
    }

    #[test]
    fn test_failed_append_keeps_previous_snapshot() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let j = journal(&db, true);
        j.append(&NotificationRecord::new(5, "c", "old", "b", "i")).unwrap();
        db.execute_batch(
            "CREATE TRIGGER reject_insert BEFORE INSERT ON kv_string_sets
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .unwrap();

        assert!(j.append(&NotificationRecord::new(5, "c", "new", "b", "i")).is_err());
        let entries = j.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "old");
    }
}
