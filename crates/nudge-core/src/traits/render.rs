//! Rendering and presentation of OS-level notifications.

use crate::error::{NudgeError, Result};
use crate::record::{LaunchDirective, NotificationRecord};

/// A fully built platform notification, ready to present.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformNotification {
    pub channel_id: String,
    pub title: String,
    pub body: String,
    pub small_icon: String,
    pub large_icon: Option<String>,
    pub badge_count: Option<u32>,
    /// What a tap on this notification should do to the host.
    pub on_tap: LaunchDirective,
    /// The record handed back with tap/dismiss callbacks.
    pub record: NotificationRecord,
}

impl PlatformNotification {
    /// Straight field mapping from a record, used by simple renderers.
    pub fn from_record(record: &NotificationRecord) -> Self {
        Self {
            channel_id: record.channel_id.clone(),
            title: record.title.clone(),
            body: record.content.clone(),
            small_icon: record.small_icon_name.clone(),
            large_icon: record.large_icon_name.clone(),
            badge_count: record.badge_count,
            on_tap: record.launch_directive(),
            record: record.clone(),
        }
    }
}

/// Pure function from record (plus current permission/OS state) to a platform object.
/// `None` means "do not present".
pub trait Renderer: Send + Sync {
    fn render(&self, record: &NotificationRecord) -> Option<PlatformNotification>;
}

/// The OS notification tray.
pub trait NotificationSurface: Send + Sync {
    /// Show `notification` under `id`, replacing any visible one with the same id.
    fn present(&self, id: i32, notification: PlatformNotification) -> Result<()>;

    fn dismiss(&self, id: i32) -> Result<()>;

    fn set_badge_count(&self, _count: u32) -> Result<()> {
        Err(NudgeError::PlatformUnavailable("badge count not supported".into()))
    }
}
