//! Lifecycle reconciler: delivers opened/dismissed events to the host exactly once
//! per notification id, whether the host is running, starting, or dead.
//!
//! ```text
//! Detached ──on_attach──▶ Attaching ──on_ready──▶ Ready
//!    ▲                                              │
//!    └──────────────────on_detach───────────────────┘
//! ```
//!
//! Entering `Ready` replays, in order:
//! 1. the in-memory pending-opened queue (FIFO),
//! 2. the durable dismissal journal, which is then cleared,
//! 3. the launch payload of this attachment, unless its id was already reported.
//!
//! Opened events travel two independent paths (queue and launch payload) and are
//! deduplicated; dismissed events have a single path and are only made durable.

use std::collections::VecDeque;
use std::sync::Arc;

use nudge_core::event::{EventName, EventPayload};
use nudge_core::record::{NotificationRecord, Payload, KEY_ID};
use nudge_core::traits::EventSink;

use crate::dedup::Deduplicator;
use crate::journal::DismissalJournal;

/// Host attachment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    /// No host instance.
    Detached,
    /// Host constructed, still setting itself up.
    Attaching,
    /// Host can receive events.
    Ready,
}

impl std::fmt::Display for HostState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostState::Detached => write!(f, "detached"),
            HostState::Attaching => write!(f, "attaching"),
            HostState::Ready => write!(f, "ready"),
        }
    }
}

/// Counts of what one `Attaching → Ready` transition replayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub opened: usize,
    pub dismissed: usize,
    pub launch_opened: bool,
}

pub struct LifecycleReconciler {
    state: HostState,
    sink: Option<Arc<dyn EventSink>>,
    launch_payload: Option<Payload>,
    pending_opened: VecDeque<NotificationRecord>,
    dedup: Deduplicator,
    journal: DismissalJournal,
}

impl LifecycleReconciler {
    pub fn new(journal: DismissalJournal) -> Self {
        Self {
            state: HostState::Detached,
            sink: None,
            launch_payload: None,
            pending_opened: VecDeque::new(),
            dedup: Deduplicator::new(),
            journal,
        }
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == HostState::Ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending_opened.len()
    }

    pub fn dedup(&self) -> &Deduplicator {
        &self.dedup
    }

    pub fn journal(&self) -> &DismissalJournal {
        &self.journal
    }

    /// A host instance was constructed. `launch_payload` is whatever the OS started
    /// it with (a notification payload after a cold-start tap, otherwise `None`).
    pub fn on_attach(&mut self, sink: Arc<dyn EventSink>, launch_payload: Option<Payload>) {
        if self.state != HostState::Detached {
            tracing::warn!("⚠️ Host attached while {}; replacing previous instance", self.state);
        }
        self.sink = Some(sink);
        self.launch_payload = launch_payload;
        self.state = HostState::Attaching;
        tracing::info!("🔌 Host attaching");
    }

    /// The host finished its own setup. Replays queued, journaled and launch events.
    pub fn on_ready(&mut self) -> ReplaySummary {
        match self.state {
            HostState::Attaching => {}
            HostState::Ready => {
                tracing::debug!("Host already ready; nothing to replay");
                return ReplaySummary::default();
            }
            HostState::Detached => {
                tracing::warn!("⚠️ Host ready without attach; ignoring");
                return ReplaySummary::default();
            }
        }
        self.state = HostState::Ready;
        tracing::info!("✅ Host ready");

        let mut summary = ReplaySummary::default();

        while let Some(record) = self.pending_opened.pop_front() {
            if !self.dedup.mark(record.id) {
                tracing::info!("⏭️ Skipping duplicate queued open for {}", record.id);
                continue;
            }
            self.emit(EventName::NotificationOpened, EventPayload::Record(record.to_payload()));
            tracing::info!("📬 Flushed queued open event for {}", record.id);
            summary.opened += 1;
        }

        match self.journal.entries() {
            Ok(records) => {
                if !records.is_empty() {
                    tracing::info!("📝 Found {} journaled dismissal(s)", records.len());
                }
                for record in records {
                    self.emit(EventName::NotificationDismissed, EventPayload::Record(record.to_payload()));
                    self.dedup.mark(record.id);
                    summary.dismissed += 1;
                }
                if let Err(e) = self.journal.clear() {
                    tracing::error!("❌ Failed to clear dismissal journal: {e}");
                }
            }
            Err(e) => tracing::error!("❌ Failed to read dismissal journal: {e}"),
        }

        if let Some(payload) = &self.launch_payload {
            match NotificationRecord::from_payload(payload) {
                Ok(record) if self.dedup.contains(record.id) => {
                    tracing::info!("⏭️ Launch payload {} already reported", record.id);
                }
                Ok(record) => {
                    self.dedup.mark(record.id);
                    self.emit(EventName::NotificationOpened, EventPayload::Record(record.to_payload()));
                    tracing::info!("🚀 Reported cold-start open for {}", record.id);
                    summary.launch_opened = true;
                }
                Err(e) => tracing::debug!("Launch payload is not a notification: {e}"),
            }
        }

        summary
    }

    /// The host instance went away. Process-lifetime state is dropped.
    pub fn on_detach(&mut self) {
        if !self.pending_opened.is_empty() {
            tracing::warn!(
                "⚠️ Discarding {} queued open event(s) on detach",
                self.pending_opened.len()
            );
        }
        self.state = HostState::Detached;
        self.sink = None;
        self.launch_payload = None;
        self.pending_opened.clear();
        self.dedup.clear();
        tracing::info!("🔌 Host detached");
    }

    /// User tapped a notification.
    pub fn handle_opened(&mut self, record: NotificationRecord) {
        if self.is_ready() {
            self.dedup.mark(record.id);
            self.emit(EventName::NotificationOpened, EventPayload::Record(record.to_payload()));
        } else {
            tracing::info!("📥 Host not ready, queueing open event for {}", record.id);
            self.pending_opened.push_back(record);
        }
    }

    /// User dismissed a notification.
    pub fn handle_dismissed(&mut self, record: NotificationRecord) {
        if self.is_ready() {
            self.emit(EventName::NotificationDismissed, EventPayload::Record(record.to_payload()));
            return;
        }
        tracing::info!("💾 Host not ready, journaling dismissal for {}", record.id);
        if let Err(e) = self.journal.append(&record) {
            tracing::error!("❌ Dismissal for {} lost: {e}", record.id);
        }
    }

    /// Emit a non-notification event if a ready host is there to hear it.
    pub fn emit_if_ready(&self, event: EventName, payload: EventPayload) -> bool {
        if self.is_ready() {
            self.emit(event, payload);
            true
        } else {
            tracing::warn!("⚠️ No ready host for '{event}'; event dropped");
            false
        }
    }

    /// Notification id carried by this attachment's launch payload, or `default`.
    pub fn launch_notification_id(&self, default: i32) -> i32 {
        self.launch_payload
            .as_ref()
            .and_then(|payload| payload.get(KEY_ID))
            .and_then(|id| id.as_i64())
            .and_then(|id| i32::try_from(id).ok())
            .unwrap_or(default)
    }

    fn emit(&self, event: EventName, payload: EventPayload) {
        match &self.sink {
            Some(sink) => sink.emit(event, payload),
            None => tracing::warn!("⚠️ No event sink for '{event}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SchedulerDb;
    use crate::testing::{record, RecordingSink};
    use nudge_core::config::JournalConfig;

    fn reconciler(db: &SchedulerDb) -> LifecycleReconciler {
        LifecycleReconciler::new(DismissalJournal::new(db.clone(), &JournalConfig::default()))
    }

    fn attach(r: &mut LifecycleReconciler, launch: Option<Payload>) -> Arc<RecordingSink> {
        let sink = Arc::new(RecordingSink::default());
        r.on_attach(sink.clone(), launch);
        sink
    }

    #[test]
    fn test_queued_opens_flush_in_fifo_order() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        r.handle_opened(record(3));
        r.handle_opened(record(7));
        assert_eq!(r.pending_len(), 2);

        let sink = attach(&mut r, None);
        let summary = r.on_ready();

        assert_eq!(sink.ids(EventName::NotificationOpened), vec![3, 7]);
        assert_eq!(summary.opened, 2);
        assert_eq!(r.dedup().ids(), vec![3, 7]);
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn test_duplicate_queued_open_is_suppressed() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        for id in [5, 3, 5] {
            r.handle_opened(record(id));
        }
        let sink = attach(&mut r, None);
        r.on_ready();
        assert_eq!(sink.ids(EventName::NotificationOpened), vec![5, 3]);
    }

    #[test]
    fn test_opened_while_attaching_is_queued() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        let sink = attach(&mut r, None);
        r.handle_opened(record(1));
        assert!(sink.events.lock().unwrap().is_empty());

        r.on_ready();
        assert_eq!(sink.ids(EventName::NotificationOpened), vec![1]);
    }

    #[test]
    fn test_ready_emits_immediately() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        let sink = attach(&mut r, None);
        r.on_ready();

        r.handle_opened(record(2));
        r.handle_dismissed(record(4));
        assert_eq!(sink.ids(EventName::NotificationOpened), vec![2]);
        assert_eq!(sink.ids(EventName::NotificationDismissed), vec![4]);
        assert!(r.dedup().contains(2));
        assert!(r.journal().is_empty().unwrap());
    }

    #[test]
    fn test_repeated_dismissals_while_ready_are_all_emitted() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        let sink = attach(&mut r, None);
        r.on_ready();

        r.handle_dismissed(record(4));
        r.handle_dismissed(record(4));
        assert_eq!(sink.ids(EventName::NotificationDismissed), vec![4, 4]);
        assert!(!r.dedup().contains(4));
    }

    #[test]
    fn test_dismissal_survives_process_restart() {
        let dir = std::env::temp_dir().join("nudge-test-dismissal-restart");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("state.db");
        {
            let db = SchedulerDb::open(&path).unwrap();
            let mut r = reconciler(&db);
            r.handle_dismissed(record(42));
            assert_eq!(r.journal().len().unwrap(), 1);
        }

        // New process: fresh in-memory state, same durable file
        let db = SchedulerDb::open(&path).unwrap();
        let mut r = reconciler(&db);
        let sink = attach(&mut r, None);
        let summary = r.on_ready();

        assert_eq!(sink.ids(EventName::NotificationDismissed), vec![42]);
        assert_eq!(summary.dismissed, 1);
        assert!(r.journal().is_empty().unwrap());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_cold_start_launch_is_deduplicated_against_queue() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        r.handle_opened(record(9));

        let sink = attach(&mut r, Some(record(9).to_payload()));
        let summary = r.on_ready();

        assert_eq!(sink.ids(EventName::NotificationOpened), vec![9]);
        assert!(!summary.launch_opened);
    }

    #[test]
    fn test_cold_start_launch_without_queue_is_reported() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        let sink = attach(&mut r, Some(record(11).to_payload()));
        let summary = r.on_ready();

        assert_eq!(sink.ids(EventName::NotificationOpened), vec![11]);
        assert!(summary.launch_opened);
        assert_eq!(r.launch_notification_id(-1), 11);
    }

    #[test]
    fn test_invalid_launch_payload_is_ignored() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        let mut payload = record(12).to_payload();
        payload.remove("content");
        let sink = attach(&mut r, Some(payload));
        r.on_ready();
        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_replay_order_queue_then_journal_then_launch() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        r.handle_opened(record(1));
        r.handle_dismissed(record(2));

        let sink = attach(&mut r, Some(record(3).to_payload()));
        r.on_ready();
        assert_eq!(
            sink.names(),
            vec![
                EventName::NotificationOpened,
                EventName::NotificationDismissed,
                EventName::NotificationOpened,
            ]
        );
    }

    #[test]
    fn test_detach_clears_process_state() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        attach(&mut r, Some(record(1).to_payload()));
        r.on_ready();
        assert!(r.dedup().contains(1));

        r.on_detach();
        assert_eq!(r.state(), HostState::Detached);
        assert!(r.dedup().is_empty());
        assert_eq!(r.launch_notification_id(-1), -1);

        r.handle_opened(record(5));
        r.on_detach();
        assert_eq!(r.pending_len(), 0);
    }

    #[test]
    fn test_second_ready_does_not_replay_again() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        let sink = attach(&mut r, Some(record(1).to_payload()));
        r.on_ready();
        r.on_ready();
        assert_eq!(sink.ids(EventName::NotificationOpened), vec![1]);
    }

    #[test]
    fn test_independent_reconcilers() {
        let db_a = SchedulerDb::open_in_memory().unwrap();
        let db_b = SchedulerDb::open_in_memory().unwrap();
        let mut a = reconciler(&db_a);
        let mut b = reconciler(&db_b);
        a.handle_opened(record(1));
        let sink_b = attach(&mut b, None);
        b.on_ready();
        assert!(sink_b.events.lock().unwrap().is_empty());
        assert_eq!(a.pending_len(), 1);
    }

    #[test]
    fn test_emit_if_ready() {
        let db = SchedulerDb::open_in_memory().unwrap();
        let mut r = reconciler(&db);
        assert!(!r.emit_if_ready(EventName::PermissionGranted, EventPayload::None));
        let sink = attach(&mut r, None);
        r.on_ready();
        assert!(r.emit_if_ready(EventName::PermissionGranted, EventPayload::Permission("p".into())));
        assert_eq!(sink.names(), vec![EventName::PermissionGranted]);
    }
}
