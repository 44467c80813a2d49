//! Tokio runtime glue: a `Timer` backed by tokio tasks and the loop that feeds
//! their fires into the shared scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nudge_core::error::{NudgeError, Result};
use nudge_core::record::NotificationRecord;
use nudge_core::traits::{Timer, TimerFire};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::scheduler::NotificationScheduler;

/// One tokio task per registered id. Fires are sent to the channel handed to `new`.
pub struct TokioTimer {
    handle: Handle,
    fires: mpsc::Sender<TimerFire>,
    tasks: std::sync::Mutex<HashMap<i32, JoinHandle<()>>>,
}

impl TokioTimer {
    /// Must be called from within a tokio runtime.
    pub fn new(fires: mpsc::Sender<TimerFire>) -> Self {
        Self::with_handle(Handle::current(), fires)
    }

    pub fn with_handle(handle: Handle, fires: mpsc::Sender<TimerFire>) -> Self {
        Self {
            handle,
            fires,
            tasks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Registrations whose task has not finished yet.
    pub fn active(&self) -> usize {
        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|_, task| !task.is_finished());
                tasks.len()
            }
            Err(_) => 0,
        }
    }

    fn install(&self, id: i32, task: JoinHandle<()>) -> Result<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| NudgeError::PlatformUnavailable("timer table poisoned".into()))?;
        tasks.retain(|_, task| !task.is_finished());
        if let Some(previous) = tasks.insert(id, task) {
            previous.abort();
        }
        Ok(())
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }
}

/// Time left until `at`, zero if it already passed.
fn until(at: DateTime<Utc>) -> Duration {
    (at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
}

impl Timer for TokioTimer {
    fn register_once(&self, id: i32, fire_at: DateTime<Utc>, record: NotificationRecord) -> Result<()> {
        let deadline = Instant::now() + until(fire_at);
        let fires = self.fires.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if fires.send(TimerFire { id, record }).await.is_err() {
                tracing::debug!("Fire loop closed; dropping fire for {id}");
            }
        });
        self.install(id, task)?;
        tracing::debug!("⏲️ Armed one-shot timer {id} for {fire_at}");
        Ok(())
    }

    fn register_repeating(
        &self,
        id: i32,
        first_fire_at: DateTime<Utc>,
        interval: Duration,
        record: NotificationRecord,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(NudgeError::InvalidRecord(format!("notification {id}: zero interval")));
        }
        let start = Instant::now() + until(first_fire_at);
        let fires = self.fires.clone();
        let task = self.handle.spawn(async move {
            let mut ticker = tokio::time::interval_at(start, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let fire = TimerFire {
                    id,
                    record: record.clone(),
                };
                if fires.send(fire).await.is_err() {
                    tracing::debug!("Fire loop closed; stopping repeating timer {id}");
                    break;
                }
            }
        });
        self.install(id, task)?;
        tracing::debug!("⏲️ Armed repeating timer {id} from {first_fire_at} every {interval:?}");
        Ok(())
    }

    fn cancel(&self, id: i32) {
        if let Ok(mut tasks) = self.tasks.lock() {
            if let Some(task) = tasks.remove(&id) {
                task.abort();
            }
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}

/// Consume timer fires until every sender is gone, dispatching each under the
/// scheduler lock. Run it with `tokio::spawn`.
pub async fn run_fire_loop(
    scheduler: Arc<Mutex<NotificationScheduler>>,
    mut fires: mpsc::Receiver<TimerFire>,
) {
    tracing::info!("⏰ Fire loop started");
    while let Some(fire) = fires.recv().await {
        let id = fire.id;
        let outcome = {
            let scheduler = scheduler.lock().await;
            scheduler.on_timer_fired(fire)
        };
        tracing::debug!("Fire {id} → {outcome:?}");
    }
    tracing::info!("⏰ Fire loop stopped");
}
