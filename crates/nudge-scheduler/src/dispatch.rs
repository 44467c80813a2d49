//! Delivery dispatch: what happens when a timer elapses.
//!
//! The record carried by the timer is authoritative for rendering; the store is only
//! consulted to retire one-shot entries and to notice cancelled repeating ones.
//! Nothing here returns an error: there is no caller to report to, so failures are
//! logged and the single fire is dropped.

use std::sync::Arc;

use nudge_core::traits::{NotificationSurface, Renderer, TimerFire};

use crate::store::ScheduleStore;

/// What became of one timer fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Rendered and handed to the notification surface.
    Presented,
    /// Repeating schedule no longer exists; nothing shown.
    Suppressed,
    /// Renderer declined or presentation failed.
    Dropped(String),
}

pub struct DeliveryDispatcher {
    store: ScheduleStore,
    renderer: Arc<dyn Renderer>,
    surface: Arc<dyn NotificationSurface>,
}

impl DeliveryDispatcher {
    pub fn new(
        store: ScheduleStore,
        renderer: Arc<dyn Renderer>,
        surface: Arc<dyn NotificationSurface>,
    ) -> Self {
        Self {
            store,
            renderer,
            surface,
        }
    }

    pub fn on_timer_fired(&self, fire: TimerFire) -> DispatchOutcome {
        let TimerFire { id, record } = fire;
        tracing::info!("🔔 Timer fired for notification {id}");

        if record.is_repeating() {
            match self.store.contains(id) {
                Ok(false) => {
                    tracing::info!("🔕 Notification {id} was cancelled; suppressing repeat");
                    return DispatchOutcome::Suppressed;
                }
                Ok(true) => {}
                // Can't tell; the timer payload still counts
                Err(e) => tracing::warn!("⚠️ Store lookup failed for {id}: {e}"),
            }
        } else {
            // Retire before rendering so a racing cancel can't leave a stale duplicate
            match self.store.remove(id) {
                Ok(true) => {}
                Ok(false) => tracing::debug!("Notification {id} already retired"),
                Err(e) => tracing::warn!("⚠️ Failed to retire notification {id}: {e}"),
            }
        }

        let Some(notification) = self.renderer.render(&record) else {
            tracing::warn!("⚠️ Unable to render notification {id}; dropping this fire");
            return DispatchOutcome::Dropped("renderer returned nothing".into());
        };

        match self.surface.present(id, notification) {
            Ok(()) => {
                tracing::info!("📣 Presented notification {id}: {}", record.title);
                DispatchOutcome::Presented
            }
            Err(e) => {
                tracing::warn!("⚠️ Failed to present notification {id}: {e}");
                DispatchOutcome::Dropped(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SchedulingEngine;
    use crate::persistence::SchedulerDb;
    use crate::testing::{record, FakeRenderer, FakeSurface, FixedClock, RecordingTimer};
    use std::sync::atomic::Ordering;

    struct Harness {
        engine: SchedulingEngine,
        dispatcher: DeliveryDispatcher,
        timer: Arc<RecordingTimer>,
        renderer: Arc<FakeRenderer>,
        surface: Arc<FakeSurface>,
    }

    impl Harness {
        fn new() -> Self {
            let store = ScheduleStore::new(SchedulerDb::open_in_memory().unwrap());
            let timer = Arc::new(RecordingTimer::default());
            let renderer = Arc::new(FakeRenderer::new());
            let surface = Arc::new(FakeSurface::default());
            Self {
                engine: SchedulingEngine::new(store.clone(), timer.clone(), Arc::new(FixedClock::new())),
                dispatcher: DeliveryDispatcher::new(store, renderer.clone(), surface.clone()),
                timer,
                renderer,
                surface,
            }
        }

        /// Fire whatever the timer currently holds for `id`.
        fn fire(&self, id: i32) -> Option<DispatchOutcome> {
            let reg = self.timer.get(id)?;
            Some(self.dispatcher.on_timer_fired(TimerFire { id, record: reg.record }))
        }
    }

    #[test]
    fn test_one_shot_fire_retires_and_presents() {
        let h = Harness::new();
        h.engine.schedule(&record(1)).unwrap();

        assert_eq!(h.fire(1), Some(DispatchOutcome::Presented));
        assert!(!h.engine.store().contains(1).unwrap());
        assert_eq!(h.surface.presented.lock().unwrap()[0].0, 1);
    }

    #[test]
    fn test_repeating_fire_keeps_entry() {
        let h = Harness::new();
        h.engine.schedule(&record(2).with_interval(60)).unwrap();

        assert_eq!(h.fire(2), Some(DispatchOutcome::Presented));
        assert_eq!(h.fire(2), Some(DispatchOutcome::Presented));
        assert!(h.engine.store().contains(2).unwrap());
        assert_eq!(h.surface.presented.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_cancel_before_fire_renders_nothing() {
        let h = Harness::new();
        h.engine.schedule(&record(3).with_delay(60)).unwrap();
        h.engine.cancel(3).unwrap();

        assert_eq!(h.fire(3), None);
        assert!(h.renderer.rendered.lock().unwrap().is_empty());
        assert!(!h.engine.store().contains(3).unwrap());
    }

    #[test]
    fn test_one_shot_fire_after_cancel_race_still_uses_payload() {
        let h = Harness::new();
        let r = record(4);
        h.engine.schedule(&r).unwrap();
        h.engine.store().remove(4).unwrap();

        let outcome = h.dispatcher.on_timer_fired(TimerFire { id: 4, record: r });
        assert_eq!(outcome, DispatchOutcome::Presented);
    }

    #[test]
    fn test_cancelled_repeating_fire_is_suppressed() {
        let h = Harness::new();
        let r = record(5).with_interval(30);
        h.engine.schedule(&r).unwrap();
        h.engine.cancel(5).unwrap();

        let outcome = h.dispatcher.on_timer_fired(TimerFire { id: 5, record: r });
        assert_eq!(outcome, DispatchOutcome::Suppressed);
        assert!(h.surface.presented.lock().unwrap().is_empty());
    }

    #[test]
    fn test_render_refusal_drops_fire() {
        let h = Harness::new();
        h.renderer.enabled.store(false, Ordering::SeqCst);
        h.engine.schedule(&record(6)).unwrap();

        assert!(matches!(h.fire(6), Some(DispatchOutcome::Dropped(_))));
        assert!(h.surface.presented.lock().unwrap().is_empty());
        // Retirement already happened; the fire is not retried
        assert!(!h.engine.store().contains(6).unwrap());
    }

    #[test]
    fn test_reschedule_renders_only_second_content() {
        let h = Harness::new();
        let mut first = record(7);
        first.title = "first".into();
        let mut second = record(7);
        second.title = "second".into();
        h.engine.schedule(&first).unwrap();
        h.engine.schedule(&second).unwrap();

        h.fire(7);
        assert_eq!(h.surface.presented_titles(), vec!["second".to_string()]);
    }
}
