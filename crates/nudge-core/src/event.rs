//! Host-facing events and command result codes.

use serde::{Deserialize, Serialize};

use crate::error::NudgeError;
use crate::record::Payload;

/// Named signals emitted to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    InitializationCompleted,
    NotificationOpened,
    NotificationDismissed,
    PermissionGranted,
    PermissionDenied,
    BatteryOptimizationGranted,
    BatteryOptimizationDenied,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::InitializationCompleted => "initialization_completed",
            EventName::NotificationOpened => "notification_opened",
            EventName::NotificationDismissed => "notification_dismissed",
            EventName::PermissionGranted => "permission_granted",
            EventName::PermissionDenied => "permission_denied",
            EventName::BatteryOptimizationGranted => "battery_optimization_granted",
            EventName::BatteryOptimizationDenied => "battery_optimization_denied",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payload: the raw record mapping, a permission name, or nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    Record(Payload),
    Permission(String),
    None,
}

impl EventPayload {
    /// Notification id carried by a record payload.
    pub fn notification_id(&self) -> Option<i32> {
        match self {
            EventPayload::Record(map) => map
                .get(crate::record::KEY_ID)
                .and_then(|v| v.as_i64())
                .and_then(|id| i32::try_from(id).ok()),
            _ => None,
        }
    }
}

/// Result code returned by every host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultCode {
    Ok,
    InvalidData,
    AlreadyExists,
    Unconfigured,
    Unavailable,
    Failed,
}

impl ResultCode {
    pub fn is_ok(&self) -> bool {
        *self == ResultCode::Ok
    }
}

impl From<&NudgeError> for ResultCode {
    fn from(err: &NudgeError) -> Self {
        match err {
            NudgeError::InvalidRecord(_) => ResultCode::InvalidData,
            NudgeError::NotInitialized => ResultCode::Unconfigured,
            NudgeError::AlreadyExists(_) => ResultCode::AlreadyExists,
            NudgeError::PlatformUnavailable(_) => ResultCode::Unavailable,
            _ => ResultCode::Failed,
        }
    }
}

impl<T> From<&crate::error::Result<T>> for ResultCode {
    fn from(result: &crate::error::Result<T>) -> Self {
        match result {
            Ok(_) => ResultCode::Ok,
            Err(e) => ResultCode::from(e),
        }
    }
}
