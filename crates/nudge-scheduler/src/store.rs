//! Schedule store: durable `id → record` mapping used to re-arm timers after a
//! reboot and to tell pending notifications from fired ones.
//! No in-memory cache: every call reads or writes the database.

use chrono::{DateTime, Utc};
use nudge_core::error::Result;
use nudge_core::record::NotificationRecord;

use crate::persistence::SchedulerDb;

/// One durable schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    pub record: NotificationRecord,
    /// Next fire time.
    pub fire_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
}

impl ScheduleEntry {
    pub fn is_repeating(&self) -> bool {
        self.record.is_repeating()
    }
}

/// Durable schedule store.
#[derive(Clone)]
pub struct ScheduleStore {
    db: SchedulerDb,
}

impl ScheduleStore {
    pub fn new(db: SchedulerDb) -> Self {
        Self { db }
    }

    /// Insert or overwrite (last writer wins).
    pub fn upsert(&self, entry: &ScheduleEntry) -> Result<()> {
        self.db.upsert_schedule(entry)?;
        tracing::debug!(
            "💾 Stored schedule {} (fire at {}, repeating: {})",
            entry.record.id,
            entry.fire_at,
            entry.is_repeating()
        );
        Ok(())
    }

    /// Remove the entry for `id`. Returns whether one existed.
    pub fn remove(&self, id: i32) -> Result<bool> {
        let removed = self.db.remove_schedule(id)?;
        if removed {
            tracing::debug!("🗑️ Removed schedule {id}");
        }
        Ok(removed)
    }

    pub fn get(&self, id: i32) -> Result<Option<ScheduleEntry>> {
        self.db.get_schedule(id)
    }

    pub fn contains(&self, id: i32) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }

    pub fn entries(&self) -> Result<Vec<ScheduleEntry>> {
        self.db.load_schedules()
    }

    pub fn len(&self) -> Result<usize> {
        self.db.count_schedules()
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
