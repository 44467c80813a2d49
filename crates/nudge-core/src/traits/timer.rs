//! Timer/alarm primitive.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::record::NotificationRecord;

/// Wake-at-time service keyed by notification id.
///
/// Registering an id that already has a registration replaces it. The record travels
/// with the registration and comes back unchanged in the [`TimerFire`].
pub trait Timer: Send + Sync {
    fn register_once(&self, id: i32, fire_at: DateTime<Utc>, record: NotificationRecord) -> Result<()>;

    fn register_repeating(
        &self,
        id: i32,
        first_fire_at: DateTime<Utc>,
        interval: Duration,
        record: NotificationRecord,
    ) -> Result<()>;

    /// Remove the registration for `id`. No-op if absent.
    fn cancel(&self, id: i32);
}

/// A timer elapsing, delivered back to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerFire {
    pub id: i32,
    pub record: NotificationRecord,
}
