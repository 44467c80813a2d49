//! Line protocol between a host process and the scheduler.
//!
//! Each stdin line is one command, `{"cmd": "...", "data": ...}`; each command
//! produces one `{"cmd": "...", "result": ...}` line on stdout.

use std::sync::Arc;

use nudge_core::record::Payload;
use nudge_scheduler::{HostState, NotificationScheduler};
use serde::Deserialize;
use serde_json::{json, Value as Json};
use tokio::sync::Mutex;

use crate::host::{DesktopPlatform, DesktopTray, StdoutSink};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", content = "data", rename_all = "snake_case")]
pub enum HostCommand {
    Initialize,
    CreateChannel(Payload),
    Schedule(Payload),
    Cancel(i32),
    SetBadgeCount(u32),
    GetNotificationIdFromLaunch(i32),
    HasNotificationPermission,
    RequestNotificationPermission,
    IsIgnoringBatteryOptimizations,
    RequestIgnoreBatteryOptimizations,
    OpenAppSettings,
    /// User tapped the visible notification with this id.
    Tap(i32),
    /// User swiped away the visible notification with this id.
    Dismiss(i32),
    Attach,
    Ready,
    Detach,
    PermissionResult(bool),
    BatteryOptimizationResult(bool),
    /// Ids of scheduled and visible notifications.
    List,
}

impl HostCommand {
    pub fn name(&self) -> &'static str {
        match self {
            HostCommand::Initialize => "initialize",
            HostCommand::CreateChannel(_) => "create_channel",
            HostCommand::Schedule(_) => "schedule",
            HostCommand::Cancel(_) => "cancel",
            HostCommand::SetBadgeCount(_) => "set_badge_count",
            HostCommand::GetNotificationIdFromLaunch(_) => "get_notification_id_from_launch",
            HostCommand::HasNotificationPermission => "has_notification_permission",
            HostCommand::RequestNotificationPermission => "request_notification_permission",
            HostCommand::IsIgnoringBatteryOptimizations => "is_ignoring_battery_optimizations",
            HostCommand::RequestIgnoreBatteryOptimizations => "request_ignore_battery_optimizations",
            HostCommand::OpenAppSettings => "open_app_settings",
            HostCommand::Tap(_) => "tap",
            HostCommand::Dismiss(_) => "dismiss",
            HostCommand::Attach => "attach",
            HostCommand::Ready => "ready",
            HostCommand::Detach => "detach",
            HostCommand::PermissionResult(_) => "permission_result",
            HostCommand::BatteryOptimizationResult(_) => "battery_optimization_result",
            HostCommand::List => "list",
        }
    }
}

pub struct Session {
    scheduler: Arc<Mutex<NotificationScheduler>>,
    tray: Arc<DesktopTray>,
    platform: Arc<DesktopPlatform>,
    /// Payload of a tap that had to launch the host; handed over on the next attach.
    pending_launch: Option<Payload>,
}

impl Session {
    pub fn new(
        scheduler: Arc<Mutex<NotificationScheduler>>,
        tray: Arc<DesktopTray>,
        platform: Arc<DesktopPlatform>,
    ) -> Self {
        Self {
            scheduler,
            tray,
            platform,
            pending_launch: None,
        }
    }

    /// Parse and apply one input line.
    pub async fn handle_line(&mut self, line: &str) -> Json {
        match serde_json::from_str::<HostCommand>(line) {
            Ok(cmd) => self.apply(cmd).await,
            Err(e) => json!({ "error": format!("bad command: {e}") }),
        }
    }

    pub async fn apply(&mut self, cmd: HostCommand) -> Json {
        let name = cmd.name();
        let mut scheduler = self.scheduler.lock().await;
        let result = match cmd {
            HostCommand::Initialize => json!(scheduler.initialize()),
            HostCommand::CreateChannel(payload) => json!(scheduler.create_channel_from_payload(&payload)),
            HostCommand::Schedule(payload) => json!(scheduler.schedule(&payload)),
            HostCommand::Cancel(id) => json!(scheduler.cancel(id)),
            HostCommand::SetBadgeCount(count) => json!(scheduler.set_badge_count(count)),
            HostCommand::GetNotificationIdFromLaunch(default) => {
                json!(scheduler.get_notification_id_from_launch(default))
            }
            HostCommand::HasNotificationPermission => json!(scheduler.has_notification_permission()),
            HostCommand::RequestNotificationPermission => {
                json!(scheduler.request_notification_permission())
            }
            HostCommand::IsIgnoringBatteryOptimizations => {
                json!(scheduler.is_ignoring_battery_optimizations())
            }
            HostCommand::RequestIgnoreBatteryOptimizations => {
                json!(scheduler.request_ignore_battery_optimizations())
            }
            HostCommand::OpenAppSettings => json!(scheduler.open_app_settings()),
            HostCommand::Tap(id) => {
                let Some(record) = self.tray.take(id) else {
                    return json!({ "cmd": name, "error": format!("notification {id} is not visible") });
                };
                let payload = record.to_payload();
                // Only a tap with no host at all launches a new one
                if scheduler.host_state() == HostState::Detached {
                    self.pending_launch = Some(payload.clone());
                }
                scheduler.on_notification_tapped(&payload);
                json!("OK")
            }
            HostCommand::Dismiss(id) => {
                let Some(record) = self.tray.take(id) else {
                    return json!({ "cmd": name, "error": format!("notification {id} is not visible") });
                };
                scheduler.on_notification_dismissed(&record.to_payload());
                json!("OK")
            }
            HostCommand::Attach => {
                scheduler.on_host_attached(Arc::new(StdoutSink), self.pending_launch.take());
                json!("OK")
            }
            HostCommand::Ready => {
                let summary = scheduler.on_host_ready();
                json!({
                    "opened": summary.opened,
                    "dismissed": summary.dismissed,
                    "launch_opened": summary.launch_opened,
                })
            }
            HostCommand::Detach => {
                self.pending_launch = None;
                scheduler.on_host_detached();
                json!("OK")
            }
            HostCommand::PermissionResult(granted) => {
                self.platform.set_permission(granted);
                scheduler.on_permission_result(granted);
                json!("OK")
            }
            HostCommand::BatteryOptimizationResult(granted) => {
                scheduler.on_battery_optimization_result(granted);
                json!("OK")
            }
            HostCommand::List => {
                let scheduled: Vec<i32> = match scheduler.engine().store().entries() {
                    Ok(entries) => entries.iter().map(|e| e.record.id).collect(),
                    Err(e) => return json!({ "cmd": name, "error": e.to_string() }),
                };
                json!({ "scheduled": scheduled, "visible": self.tray.visible_ids() })
            }
        };
        json!({ "cmd": name, "result": result })
    }
}
