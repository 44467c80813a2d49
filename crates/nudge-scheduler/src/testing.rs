//! In-crate fakes for the collaborator traits.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use nudge_core::channel::ChannelSpec;
use nudge_core::error::{NudgeError, Result};
use nudge_core::event::{EventName, EventPayload};
use nudge_core::record::{LaunchDirective, NotificationRecord};
use nudge_core::traits::{
    Clock, EventSink, NotificationSurface, PermissionRequest, Platform, PlatformNotification,
    Renderer, Timer,
};

pub fn record(id: i32) -> NotificationRecord {
    NotificationRecord::new(id, "general", &format!("title {id}"), &format!("content {id}"), "ic_stat")
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::seconds(secs);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub fire_at: DateTime<Utc>,
    pub interval: Option<Duration>,
    pub record: NotificationRecord,
}

#[derive(Default)]
pub struct RecordingTimer {
    pub active: Mutex<HashMap<i32, Registration>>,
    pub cancels: AtomicUsize,
    pub fail: AtomicBool,
}

impl RecordingTimer {
    pub fn get(&self, id: i32) -> Option<Registration> {
        self.active.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NudgeError::PlatformUnavailable("alarm refused".into()));
        }
        Ok(())
    }
}

impl Timer for RecordingTimer {
    fn register_once(&self, id: i32, fire_at: DateTime<Utc>, record: NotificationRecord) -> Result<()> {
        self.check()?;
        self.active.lock().unwrap().insert(
            id,
            Registration {
                fire_at,
                interval: None,
                record,
            },
        );
        Ok(())
    }

    fn register_repeating(
        &self,
        id: i32,
        first_fire_at: DateTime<Utc>,
        interval: Duration,
        record: NotificationRecord,
    ) -> Result<()> {
        self.check()?;
        self.active.lock().unwrap().insert(
            id,
            Registration {
                fire_at: first_fire_at,
                interval: Some(interval),
                record,
            },
        );
        Ok(())
    }

    fn cancel(&self, id: i32) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.active.lock().unwrap().remove(&id);
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<(EventName, EventPayload)>>,
}

impl RecordingSink {
    /// Ids carried by every emitted `event`, in emission order.
    pub fn ids(&self, event: EventName) -> Vec<i32> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| *name == event)
            .filter_map(|(_, payload)| payload.notification_id())
            .collect()
    }

    pub fn names(&self) -> Vec<EventName> {
        self.events.lock().unwrap().iter().map(|(n, _)| *n).collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: EventName, payload: EventPayload) {
        self.events.lock().unwrap().push((event, payload));
    }
}

pub struct FakeRenderer {
    pub enabled: AtomicBool,
    pub rendered: Mutex<Vec<NotificationRecord>>,
}

impl FakeRenderer {
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            rendered: Mutex::new(Vec::new()),
        }
    }
}

impl Renderer for FakeRenderer {
    fn render(&self, record: &NotificationRecord) -> Option<PlatformNotification> {
        if !self.enabled.load(Ordering::SeqCst) {
            return None;
        }
        self.rendered.lock().unwrap().push(record.clone());
        Some(PlatformNotification::from_record(record))
    }
}

#[derive(Default)]
pub struct FakeSurface {
    pub presented: Mutex<Vec<(i32, PlatformNotification)>>,
    pub dismissed: Mutex<Vec<i32>>,
    pub badge: Mutex<Option<u32>>,
    pub supports_badge: AtomicBool,
}

impl FakeSurface {
    pub fn presented_titles(&self) -> Vec<String> {
        self.presented
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| n.title.clone())
            .collect()
    }
}

impl NotificationSurface for FakeSurface {
    fn present(&self, id: i32, notification: PlatformNotification) -> Result<()> {
        self.presented.lock().unwrap().push((id, notification));
        Ok(())
    }

    fn dismiss(&self, id: i32) -> Result<()> {
        self.dismissed.lock().unwrap().push(id);
        Ok(())
    }

    fn set_badge_count(&self, count: u32) -> Result<()> {
        if !self.supports_badge.load(Ordering::SeqCst) {
            return Err(NudgeError::PlatformUnavailable("no badges".into()));
        }
        *self.badge.lock().unwrap() = Some(count);
        Ok(())
    }
}

pub struct FakePlatform {
    pub permission: AtomicBool,
    pub battery_exempt: AtomicBool,
    pub channels: Mutex<HashSet<String>>,
    pub launched: Mutex<Vec<LaunchDirective>>,
    pub settings_opened: AtomicUsize,
    pub prompts: AtomicUsize,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            permission: AtomicBool::new(true),
            battery_exempt: AtomicBool::new(false),
            channels: Mutex::new(HashSet::new()),
            launched: Mutex::new(Vec::new()),
            settings_opened: AtomicUsize::new(0),
            prompts: AtomicUsize::new(0),
        }
    }
}

impl Platform for FakePlatform {
    fn has_notification_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn request_notification_permission(&self) -> Result<PermissionRequest> {
        if self.has_notification_permission() {
            return Ok(PermissionRequest::AlreadyGranted);
        }
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(PermissionRequest::Requested)
    }

    fn is_ignoring_battery_optimizations(&self) -> bool {
        self.battery_exempt.load(Ordering::SeqCst)
    }

    fn request_ignore_battery_optimizations(&self) -> Result<PermissionRequest> {
        if self.is_ignoring_battery_optimizations() {
            return Ok(PermissionRequest::AlreadyGranted);
        }
        self.prompts.fetch_add(1, Ordering::SeqCst);
        Ok(PermissionRequest::Requested)
    }

    fn open_app_settings(&self) -> Result<()> {
        self.settings_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn channel_exists(&self, channel_id: &str) -> bool {
        self.channels.lock().unwrap().contains(channel_id)
    }

    fn create_channel(&self, spec: &ChannelSpec) -> Result<()> {
        self.channels.lock().unwrap().insert(spec.id.clone());
        Ok(())
    }

    fn launch_host(&self, directive: &LaunchDirective) -> Result<()> {
        self.launched.lock().unwrap().push(directive.clone());
        Ok(())
    }
}
