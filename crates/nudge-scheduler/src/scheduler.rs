//! `NotificationScheduler`: the host command surface plus the OS entry points.
//!
//! Commands return a [`ResultCode`] and never panic. Until `initialize()` is called for
//! the current host attachment every command is refused with `Unconfigured` and does
//! nothing. OS entry points (timer fires, taps, dismissals, boot, lifecycle) work
//! regardless of initialization, since they can arrive while no host exists.

use std::sync::Arc;

use nudge_core::channel::ChannelSpec;
use nudge_core::config::JournalConfig;
use nudge_core::error::NudgeError;
use nudge_core::event::{EventName, EventPayload, ResultCode};
use nudge_core::record::{NotificationRecord, Payload};
use nudge_core::traits::{
    Clock, EventSink, NotificationSurface, PermissionRequest, Platform, Renderer, Timer, TimerFire,
};

use crate::boot::BootReplay;
use crate::dispatch::{DeliveryDispatcher, DispatchOutcome};
use crate::engine::SchedulingEngine;
use crate::journal::DismissalJournal;
use crate::persistence::SchedulerDb;
use crate::reconciler::{HostState, LifecycleReconciler, ReplaySummary};
use crate::store::ScheduleStore;

/// Payload of `permission_granted` / `permission_denied`.
pub const PERMISSION_POST_NOTIFICATIONS: &str = "post_notifications";
/// Payload of the battery optimization events.
pub const PERMISSION_IGNORE_BATTERY_OPTIMIZATIONS: &str = "ignore_battery_optimizations";

/// Platform services the scheduler is wired to.
pub struct Collaborators {
    pub timer: Arc<dyn Timer>,
    pub renderer: Arc<dyn Renderer>,
    pub surface: Arc<dyn NotificationSurface>,
    pub platform: Arc<dyn Platform>,
    pub clock: Arc<dyn Clock>,
}

pub struct NotificationScheduler {
    initialized: bool,
    engine: SchedulingEngine,
    dispatcher: DeliveryDispatcher,
    reconciler: LifecycleReconciler,
    boot: BootReplay,
    platform: Arc<dyn Platform>,
    surface: Arc<dyn NotificationSurface>,
}

impl NotificationScheduler {
    pub fn new(db: SchedulerDb, journal: &JournalConfig, parts: Collaborators) -> Self {
        let store = ScheduleStore::new(db.clone());
        Self {
            initialized: false,
            engine: SchedulingEngine::new(store.clone(), parts.timer, parts.clock),
            dispatcher: DeliveryDispatcher::new(store, parts.renderer, parts.surface.clone()),
            reconciler: LifecycleReconciler::new(DismissalJournal::new(db, journal)),
            boot: BootReplay::new(),
            platform: parts.platform,
            surface: parts.surface,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn engine(&self) -> &SchedulingEngine {
        &self.engine
    }

    pub fn reconciler(&self) -> &LifecycleReconciler {
        &self.reconciler
    }

    pub fn host_state(&self) -> HostState {
        self.reconciler.state()
    }

    // ── Commands ────────────────────────────────────────────

    pub fn initialize(&mut self) -> ResultCode {
        self.initialized = true;
        tracing::info!("🚀 Notification scheduler initialized");
        self.reconciler
            .emit_if_ready(EventName::InitializationCompleted, EventPayload::None);
        ResultCode::Ok
    }

    pub fn create_channel(&self, spec: &ChannelSpec) -> ResultCode {
        if !self.initialized {
            return unconfigured("create_channel");
        }
        if let Err(e) = spec.validate() {
            tracing::warn!("⚠️ Rejected channel: {e}");
            return ResultCode::from(&e);
        }
        if self.platform.channel_exists(&spec.id) {
            tracing::info!("Channel '{}' already exists", spec.id);
            return ResultCode::AlreadyExists;
        }
        match self.platform.create_channel(spec) {
            Ok(()) => {
                tracing::info!("📢 Created channel '{}' ({:?})", spec.id, spec.importance);
                ResultCode::Ok
            }
            Err(e) => {
                tracing::error!("❌ Failed to create channel '{}': {e}", spec.id);
                ResultCode::from(&e)
            }
        }
    }

    /// `create_channel` from the host's raw channel mapping.
    pub fn create_channel_from_payload(&self, payload: &Payload) -> ResultCode {
        if !self.initialized {
            return unconfigured("create_channel");
        }
        match ChannelSpec::from_payload(payload) {
            Ok(spec) => self.create_channel(&spec),
            Err(e) => {
                tracing::warn!("⚠️ Rejected channel payload: {e}");
                ResultCode::InvalidData
            }
        }
    }

    pub fn schedule(&self, payload: &Payload) -> ResultCode {
        if !self.initialized {
            return unconfigured("schedule");
        }
        match NotificationRecord::from_payload(payload) {
            Ok(record) => self.schedule_record(&record),
            Err(e) => {
                tracing::warn!("⚠️ Rejected notification payload: {e}");
                ResultCode::InvalidData
            }
        }
    }

    pub fn schedule_record(&self, record: &NotificationRecord) -> ResultCode {
        if !self.initialized {
            return unconfigured("schedule");
        }
        let result = self.engine.schedule(record);
        if let Err(e) = &result {
            tracing::warn!("⚠️ Failed to schedule notification {}: {e}", record.id);
        }
        ResultCode::from(&result)
    }

    /// Cancel the schedule and take down the visible notification, if any.
    pub fn cancel(&self, id: i32) -> ResultCode {
        if !self.initialized {
            return unconfigured("cancel");
        }
        if let Err(e) = self.surface.dismiss(id) {
            tracing::warn!("⚠️ Failed to dismiss visible notification {id}: {e}");
        }
        match self.engine.cancel(id) {
            Ok(()) => ResultCode::Ok,
            Err(e) => {
                tracing::error!("❌ Failed to cancel notification {id}: {e}");
                ResultCode::from(&e)
            }
        }
    }

    pub fn set_badge_count(&self, count: u32) -> ResultCode {
        if !self.initialized {
            return unconfigured("set_badge_count");
        }
        match self.surface.set_badge_count(count) {
            Ok(()) => ResultCode::Ok,
            Err(e) => {
                tracing::info!("Badge count not set: {e}");
                ResultCode::from(&e)
            }
        }
    }

    pub fn get_notification_id_from_launch(&self, default: i32) -> i32 {
        if !self.initialized {
            unconfigured("get_notification_id_from_launch");
            return default;
        }
        self.reconciler.launch_notification_id(default)
    }

    pub fn has_notification_permission(&self) -> bool {
        if !self.initialized {
            unconfigured("has_notification_permission");
            return false;
        }
        self.platform.has_notification_permission()
    }

    pub fn request_notification_permission(&self) -> ResultCode {
        if !self.initialized {
            return unconfigured("request_notification_permission");
        }
        match self.platform.request_notification_permission() {
            Ok(PermissionRequest::AlreadyGranted) => {
                self.reconciler.emit_if_ready(
                    EventName::PermissionGranted,
                    EventPayload::Permission(PERMISSION_POST_NOTIFICATIONS.into()),
                );
                ResultCode::Ok
            }
            Ok(PermissionRequest::Requested) => {
                tracing::info!("🔐 Notification permission requested");
                ResultCode::Ok
            }
            Ok(PermissionRequest::Unsupported) => {
                tracing::info!("Notification permission is not requestable on this platform");
                ResultCode::Unavailable
            }
            Err(e) => {
                tracing::error!("❌ Notification permission request failed: {e}");
                ResultCode::from(&e)
            }
        }
    }

    pub fn is_ignoring_battery_optimizations(&self) -> bool {
        if !self.initialized {
            unconfigured("is_ignoring_battery_optimizations");
            return false;
        }
        self.platform.is_ignoring_battery_optimizations()
    }

    pub fn request_ignore_battery_optimizations(&self) -> ResultCode {
        if !self.initialized {
            return unconfigured("request_ignore_battery_optimizations");
        }
        match self.platform.request_ignore_battery_optimizations() {
            // Nothing to exempt from on older platforms either
            Ok(PermissionRequest::AlreadyGranted | PermissionRequest::Unsupported) => {
                self.reconciler.emit_if_ready(
                    EventName::BatteryOptimizationGranted,
                    EventPayload::Permission(PERMISSION_IGNORE_BATTERY_OPTIMIZATIONS.into()),
                );
                ResultCode::Ok
            }
            Ok(PermissionRequest::Requested) => {
                tracing::info!("🔋 Battery optimization exemption requested");
                ResultCode::Ok
            }
            Err(e) => {
                tracing::error!("❌ Battery optimization request failed: {e}");
                ResultCode::from(&e)
            }
        }
    }

    pub fn open_app_settings(&self) -> ResultCode {
        if !self.initialized {
            return unconfigured("open_app_settings");
        }
        match self.platform.open_app_settings() {
            Ok(()) => ResultCode::Ok,
            Err(e) => {
                tracing::error!("❌ Failed to open app settings: {e}");
                ResultCode::from(&e)
            }
        }
    }

    // ── OS entry points ─────────────────────────────────────

    pub fn on_timer_fired(&self, fire: TimerFire) -> DispatchOutcome {
        self.dispatcher.on_timer_fired(fire)
    }

    /// User tapped a notification: bring the host forward, then report the open.
    pub fn on_notification_tapped(&mut self, payload: &Payload) {
        let record = match NotificationRecord::from_payload(payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("⚠️ Ignoring tap with invalid payload: {e}");
                return;
            }
        };
        tracing::info!("👆 Notification {} tapped", record.id);
        if let Err(e) = self.platform.launch_host(&record.launch_directive()) {
            tracing::warn!("⚠️ Failed to launch host for {}: {e}", record.id);
        }
        self.reconciler.handle_opened(record);
    }

    pub fn on_notification_dismissed(&mut self, payload: &Payload) {
        match NotificationRecord::from_payload(payload) {
            Ok(record) => {
                tracing::info!("👋 Notification {} dismissed", record.id);
                self.reconciler.handle_dismissed(record);
            }
            Err(e) => tracing::warn!("⚠️ Ignoring dismissal with invalid payload: {e}"),
        }
    }

    pub fn on_host_attached(&mut self, sink: Arc<dyn EventSink>, launch_payload: Option<Payload>) {
        self.reconciler.on_attach(sink, launch_payload);
    }

    pub fn on_host_ready(&mut self) -> ReplaySummary {
        self.reconciler.on_ready()
    }

    /// The host went away; the next host must `initialize()` again.
    pub fn on_host_detached(&mut self) {
        self.initialized = false;
        self.reconciler.on_detach();
    }

    pub fn on_boot_completed(&mut self) -> usize {
        tracing::info!("🔄 Boot completed, replaying schedules");
        self.boot.replay_once(&self.engine)
    }

    pub fn on_permission_result(&self, granted: bool) {
        let event = if granted {
            EventName::PermissionGranted
        } else {
            EventName::PermissionDenied
        };
        tracing::info!("🔐 Notification permission result: {event}");
        self.reconciler
            .emit_if_ready(event, EventPayload::Permission(PERMISSION_POST_NOTIFICATIONS.into()));
    }

    pub fn on_battery_optimization_result(&self, granted: bool) {
        let event = if granted {
            EventName::BatteryOptimizationGranted
        } else {
            EventName::BatteryOptimizationDenied
        };
        tracing::info!("🔋 Battery optimization result: {event}");
        self.reconciler.emit_if_ready(
            event,
            EventPayload::Permission(PERMISSION_IGNORE_BATTERY_OPTIMIZATIONS.into()),
        );
    }
}

fn unconfigured(command: &str) -> ResultCode {
    tracing::error!("❌ {command}: {}", NudgeError::NotInitialized);
    ResultCode::Unconfigured
}
