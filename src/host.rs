//! Desktop stand-ins for the OS services: a tray kept in memory, events and
//! presentations written to stdout as JSON lines.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use nudge_core::channel::ChannelSpec;
use nudge_core::error::{NudgeError, Result};
use nudge_core::event::{EventName, EventPayload};
use nudge_core::record::{LaunchDirective, NotificationRecord};
use nudge_core::traits::{
    EventSink, NotificationSurface, PermissionRequest, Platform, PlatformNotification, Renderer,
};
use serde_json::json;

/// Write one JSON line to stdout.
pub fn emit_line(value: serde_json::Value) {
    println!("{value}");
}

/// Renders straight from the record, optionally refusing without permission.
pub struct DesktopRenderer {
    platform: Arc<dyn Platform>,
    require_permission: bool,
}

impl DesktopRenderer {
    pub fn new(platform: Arc<dyn Platform>, require_permission: bool) -> Self {
        Self {
            platform,
            require_permission,
        }
    }
}

impl Renderer for DesktopRenderer {
    fn render(&self, record: &NotificationRecord) -> Option<PlatformNotification> {
        if self.require_permission && !self.platform.has_notification_permission() {
            tracing::warn!("⚠️ Notification permission missing; not rendering {}", record.id);
            return None;
        }
        Some(PlatformNotification::from_record(record))
    }
}

/// In-memory notification tray.
#[derive(Default)]
pub struct DesktopTray {
    visible: Mutex<BTreeMap<i32, PlatformNotification>>,
}

impl DesktopTray {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a visible notification, returning the record it was built from.
    pub fn take(&self, id: i32) -> Option<NotificationRecord> {
        let mut visible = self.visible.lock().ok()?;
        visible.remove(&id).map(|n| n.record)
    }

    pub fn visible_ids(&self) -> Vec<i32> {
        self.visible
            .lock()
            .map(|v| v.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl NotificationSurface for DesktopTray {
    fn present(&self, id: i32, notification: PlatformNotification) -> Result<()> {
        emit_line(json!({
            "presented": id,
            "channel_id": notification.channel_id,
            "title": notification.title,
            "content": notification.body,
        }));
        let mut visible = self
            .visible
            .lock()
            .map_err(|_| NudgeError::PlatformUnavailable("tray poisoned".into()))?;
        visible.insert(id, notification);
        Ok(())
    }

    fn dismiss(&self, id: i32) -> Result<()> {
        if self.take(id).is_some() {
            tracing::debug!("Removed notification {id} from tray");
        }
        Ok(())
    }
}

/// Events go out as `{"event": ..., "data": ...}` lines.
pub struct StdoutSink;

impl EventSink for StdoutSink {
    fn emit(&self, event: EventName, payload: EventPayload) {
        if let Some(id) = payload.notification_id() {
            tracing::debug!("📣 {event} for notification {id}");
        }
        emit_line(json!({ "event": event, "data": payload }));
    }
}

/// Desktop platform: notifications always allowed, no battery optimizations.
pub struct DesktopPlatform {
    permission: AtomicBool,
    channels: Mutex<HashSet<String>>,
}

impl DesktopPlatform {
    pub fn new() -> Self {
        Self {
            permission: AtomicBool::new(true),
            channels: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_permission(&self, granted: bool) {
        self.permission.store(granted, Ordering::SeqCst);
    }
}

impl Platform for DesktopPlatform {
    fn has_notification_permission(&self) -> bool {
        self.permission.load(Ordering::SeqCst)
    }

    fn request_notification_permission(&self) -> Result<PermissionRequest> {
        if self.has_notification_permission() {
            Ok(PermissionRequest::AlreadyGranted)
        } else {
            // Answer comes back through a `permission_result` command
            Ok(PermissionRequest::Requested)
        }
    }

    fn is_ignoring_battery_optimizations(&self) -> bool {
        true
    }

    fn request_ignore_battery_optimizations(&self) -> Result<PermissionRequest> {
        Ok(PermissionRequest::Unsupported)
    }

    fn open_app_settings(&self) -> Result<()> {
        Err(NudgeError::PlatformUnavailable(
            "no app settings screen on desktop".into(),
        ))
    }

    fn channel_exists(&self, channel_id: &str) -> bool {
        self.channels
            .lock()
            .map(|c| c.contains(channel_id))
            .unwrap_or(false)
    }

    fn create_channel(&self, spec: &ChannelSpec) -> Result<()> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| NudgeError::PlatformUnavailable("channel table poisoned".into()))?;
        channels.insert(spec.id.clone());
        Ok(())
    }

    fn launch_host(&self, directive: &LaunchDirective) -> Result<()> {
        tracing::info!(
            "🚀 Launch host (restart: {}, deeplink: {})",
            directive.restart,
            directive.deeplink.as_deref().unwrap_or("-")
        );
        Ok(())
    }
}
