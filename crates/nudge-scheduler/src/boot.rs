//! Boot replay: re-arms stored schedules once per process after the OS lost its timers.

use crate::engine::SchedulingEngine;

#[derive(Debug, Default)]
pub struct BootReplay {
    replayed: bool,
}

impl BootReplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_replayed(&self) -> bool {
        self.replayed
    }

    /// Re-arm every stored schedule. Later calls in the same process are ignored.
    /// Returns the number of schedules re-armed by this call.
    pub fn replay_once(&mut self, engine: &SchedulingEngine) -> usize {
        if self.replayed {
            tracing::debug!("Boot replay already ran in this process");
            return 0;
        }
        self.replayed = true;
        match engine.reconcile_after_reboot() {
            Ok(armed) => armed,
            Err(e) => {
                tracing::error!("❌ Boot replay failed: {e}");
                0
            }
        }
    }
}
