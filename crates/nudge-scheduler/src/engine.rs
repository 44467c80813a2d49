//! Scheduling engine: turns schedule/cancel requests into timer registrations
//! plus schedule-store mutations. Owns the one-shot vs repeating policy.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nudge_core::error::Result;
use nudge_core::record::NotificationRecord;
use nudge_core::traits::{Clock, Timer};

use crate::store::{ScheduleEntry, ScheduleStore};

/// The scheduling engine.
pub struct SchedulingEngine {
    store: ScheduleStore,
    timer: Arc<dyn Timer>,
    clock: Arc<dyn Clock>,
}

impl SchedulingEngine {
    pub fn new(store: ScheduleStore, timer: Arc<dyn Timer>, clock: Arc<dyn Clock>) -> Self {
        Self { store, timer, clock }
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    /// Arm a timer for `record` and persist it. Overwrites any existing schedule
    /// with the same id. Fails with `InvalidRecord` before touching anything.
    pub fn schedule(&self, record: &NotificationRecord) -> Result<()> {
        record.validate()?;

        let previous = self.store.get(record.id)?;
        let now = self.clock.now();
        let fire_at = now + chrono::Duration::seconds(i64::from(record.delay_seconds));
        self.arm(record, fire_at)?;

        let entry = ScheduleEntry {
            record: record.clone(),
            fire_at,
            scheduled_at: now,
        };
        if let Err(e) = self.store.upsert(&entry) {
            // Timers must match the store: put back whatever it still holds
            self.restore(record.id, previous);
            return Err(e);
        }

        match record.interval_seconds {
            Some(every) => tracing::info!(
                "📅 Scheduled notification {} at {} every {}s",
                record.id,
                fire_at,
                every
            ),
            None => tracing::info!("📅 Scheduled notification {} at {}", record.id, fire_at),
        }
        Ok(())
    }

    /// Cancel the timer and drop the store entry. Idempotent.
    pub fn cancel(&self, id: i32) -> Result<()> {
        self.timer.cancel(id);
        let removed = self.store.remove(id)?;
        tracing::info!("🛑 Cancelled notification {id} (had schedule: {removed})");
        Ok(())
    }

    /// Re-arm every stored schedule after the OS timer state was lost.
    ///
    /// One-shot entries already in the past fire immediately. Repeating entries in the
    /// past resume at their next occurrence on the original cadence. Returns how many
    /// entries were re-armed.
    pub fn reconcile_after_reboot(&self) -> Result<usize> {
        let entries = self.store.entries()?;
        let now = self.clock.now();
        let mut armed = 0;

        for mut entry in entries {
            let fire_at = next_fire_at(&entry, now);
            if let Err(e) = self.arm(&entry.record, fire_at) {
                tracing::warn!("⚠️ Failed to re-arm notification {}: {e}", entry.record.id);
                continue;
            }
            if fire_at != entry.fire_at && entry.is_repeating() {
                entry.fire_at = fire_at;
                if let Err(e) = self.store.upsert(&entry) {
                    tracing::warn!("⚠️ Failed to update fire time for {}: {e}", entry.record.id);
                }
            }
            armed += 1;
        }

        tracing::info!("🔁 Re-armed {armed} notification(s) after reboot");
        Ok(armed)
    }

    fn restore(&self, id: i32, previous: Option<ScheduleEntry>) {
        match previous {
            Some(entry) => {
                if let Err(e) = self.arm(&entry.record, entry.fire_at) {
                    tracing::warn!("⚠️ Failed to restore timer for notification {id}: {e}");
                    self.timer.cancel(id);
                }
            }
            None => self.timer.cancel(id),
        }
    }

    fn arm(&self, record: &NotificationRecord, fire_at: DateTime<Utc>) -> Result<()> {
        match record.interval_seconds {
            Some(every) => self.timer.register_repeating(
                record.id,
                fire_at,
                Duration::from_secs(u64::from(every)),
                record.clone(),
            ),
            None => self.timer.register_once(record.id, fire_at, record.clone()),
        }
    }
}

/// Fire time to use when re-arming `entry` at `now`.
fn next_fire_at(entry: &ScheduleEntry, now: DateTime<Utc>) -> DateTime<Utc> {
    if entry.fire_at >= now {
        return entry.fire_at;
    }
    match entry.record.interval_seconds {
        None => now,
        Some(every) => {
            let every = i64::from(every.max(1));
            let behind = (now - entry.fire_at).num_seconds();
            let periods = (behind + every - 1) / every;
            let next = entry.fire_at + chrono::Duration::seconds(periods * every);
            if next < now { next + chrono::Duration::seconds(every) } else { next }
        }
    }
}
