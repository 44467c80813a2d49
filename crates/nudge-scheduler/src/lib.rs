//! # Nudge Scheduler
//!
//! Local notification lifecycle engine: durable schedules, timer-driven delivery and
//! exactly-once reporting of user interactions to a host that may come and go.
//!
//! ## Design Principles
//! - SQLite persistence: schedules and dismissals survive process death and reboot
//! - Tokio timers only: one task per armed notification, zero work when idle
//! - The payload travelling with a timer is what gets rendered
//! - Host events are queued or journaled until a host is ready to hear them
//!
//! ## Architecture
//! ```text
//! NotificationScheduler (host commands + OS entry points)
//!   ├── SchedulingEngine: schedule / cancel / reconcile_after_reboot
//!   │     ├── Timer (TokioTimer) ──fires──▶ run_fire_loop
//!   │     └── ScheduleStore ──▶ SchedulerDb (scheduled_notifications)
//!   ├── DeliveryDispatcher: on_timer_fired → Renderer → NotificationSurface
//!   ├── LifecycleReconciler: Detached → Attaching → Ready
//!   │     ├── pending-opened queue (memory)
//!   │     ├── DismissalJournal ──▶ SchedulerDb (kv_string_sets)
//!   │     └── Deduplicator (memory)
//!   └── BootReplay: once per process after boot
//! ```

pub mod boot;
pub mod dedup;
pub mod dispatch;
pub mod engine;
pub mod journal;
pub mod persistence;
pub mod reconciler;
pub mod runtime;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use boot::BootReplay;
pub use dedup::Deduplicator;
pub use dispatch::{DeliveryDispatcher, DispatchOutcome};
pub use engine::SchedulingEngine;
pub use journal::DismissalJournal;
pub use persistence::SchedulerDb;
pub use reconciler::{HostState, LifecycleReconciler, ReplaySummary};
pub use runtime::{run_fire_loop, TokioTimer};
pub use scheduler::{Collaborators, NotificationScheduler};
pub use store::{ScheduleEntry, ScheduleStore};
