//! Notification record: the canonical representation of one schedulable notification.
//!
//! Hosts hand records over as string-keyed JSON objects. [`NotificationRecord::from_payload`]
//! is the only place where those payloads are type-checked; everything past that
//! boundary works with the typed struct.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::error::{NudgeError, Result};
use crate::value::Value;

/// Raw host payload: the record mapping as the host sees it.
pub type Payload = Map<String, serde_json::Value>;

pub const KEY_ID: &str = "notification_id";
pub const KEY_CHANNEL_ID: &str = "channel_id";
pub const KEY_TITLE: &str = "title";
pub const KEY_CONTENT: &str = "content";
pub const KEY_SMALL_ICON_NAME: &str = "small_icon_name";
pub const KEY_LARGE_ICON_NAME: &str = "large_icon_name";
pub const KEY_DELAY: &str = "delay";
pub const KEY_INTERVAL: &str = "interval";
pub const KEY_DEEPLINK: &str = "deeplink";
pub const KEY_BADGE_COUNT: &str = "badge_count";
pub const KEY_CUSTOM_DATA: &str = "custom_data";
pub const KEY_RESTART_APP: &str = "restart_app";

/// A schedulable local notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// Caller-supplied id; also the timer key and the rendered-notification key.
    pub id: i32,
    pub channel_id: String,
    pub title: String,
    pub content: String,
    pub small_icon_name: String,
    pub large_icon_name: Option<String>,
    /// Seconds from scheduling time to first delivery.
    pub delay_seconds: u32,
    /// Present ⇒ repeating every N seconds.
    pub interval_seconds: Option<u32>,
    /// URI handed to the host when the notification is opened.
    pub deeplink: Option<String>,
    pub restart_app: Option<bool>,
    pub badge_count: Option<u32>,
    /// Opaque payload round-tripped to the host.
    pub custom_data: Option<BTreeMap<String, Value>>,
}

/// How the host should be brought to the foreground when a notification is tapped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchDirective {
    /// Clear the existing host task before launching.
    pub restart: bool,
    pub deeplink: Option<String>,
}

impl NotificationRecord {
    /// Create a one-shot record that fires immediately.
    pub fn new(id: i32, channel_id: &str, title: &str, content: &str, small_icon_name: &str) -> Self {
        Self {
            id,
            channel_id: channel_id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            small_icon_name: small_icon_name.to_string(),
            large_icon_name: None,
            delay_seconds: 0,
            interval_seconds: None,
            deeplink: None,
            restart_app: None,
            badge_count: None,
            custom_data: None,
        }
    }

    pub fn with_delay(mut self, seconds: u32) -> Self {
        self.delay_seconds = seconds;
        self
    }

    pub fn with_interval(mut self, seconds: u32) -> Self {
        self.interval_seconds = Some(seconds);
        self
    }

    pub fn with_deeplink(mut self, uri: &str) -> Self {
        self.deeplink = Some(uri.to_string());
        self
    }

    pub fn with_custom(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.custom_data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn is_repeating(&self) -> bool {
        self.interval_seconds.is_some()
    }

    /// Check the invariants the typed struct cannot express on its own.
    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds == Some(0) {
            return Err(NudgeError::InvalidRecord(format!(
                "notification {}: interval must be greater than zero",
                self.id
            )));
        }
        Ok(())
    }

    pub fn launch_directive(&self) -> LaunchDirective {
        LaunchDirective {
            restart: self.restart_app.unwrap_or(false),
            deeplink: self.deeplink.clone(),
        }
    }

    /// Convert a host payload into a record.
    ///
    /// Required keys: `notification_id`, `channel_id`, `title`, `content`,
    /// `small_icon_name`, `delay`. Non-primitive `custom_data` entries are dropped.
    pub fn from_payload(payload: &Payload) -> Result<Self> {
        let id = required_int(payload, KEY_ID)?;
        let id = i32::try_from(id).map_err(|_| invalid(KEY_ID, "out of range"))?;
        let delay = required_int(payload, KEY_DELAY)?;
        let delay_seconds = u32::try_from(delay).map_err(|_| invalid(KEY_DELAY, "must be >= 0"))?;

        let interval_seconds = match optional_int(payload, KEY_INTERVAL)? {
            Some(i) if i > 0 => Some(u32::try_from(i).map_err(|_| invalid(KEY_INTERVAL, "out of range"))?),
            Some(_) => return Err(invalid(KEY_INTERVAL, "must be > 0")),
            None => None,
        };
        let badge_count = match optional_int(payload, KEY_BADGE_COUNT)? {
            Some(b) => Some(u32::try_from(b).map_err(|_| invalid(KEY_BADGE_COUNT, "must be >= 0"))?),
            None => None,
        };
        let restart_app = match payload.get(KEY_RESTART_APP) {
            None | Some(serde_json::Value::Null) => None,
            Some(v) => Some(v.as_bool().ok_or_else(|| invalid(KEY_RESTART_APP, "expected bool"))?),
        };

        let record = Self {
            id,
            channel_id: required_str(payload, KEY_CHANNEL_ID)?,
            title: required_str(payload, KEY_TITLE)?,
            content: required_str(payload, KEY_CONTENT)?,
            small_icon_name: required_str(payload, KEY_SMALL_ICON_NAME)?,
            large_icon_name: optional_str(payload, KEY_LARGE_ICON_NAME)?,
            delay_seconds,
            interval_seconds,
            deeplink: optional_str(payload, KEY_DEEPLINK)?,
            restart_app,
            badge_count,
            custom_data: custom_data(id, payload.get(KEY_CUSTOM_DATA))?,
        };
        record.validate()?;
        Ok(record)
    }

    /// The raw record mapping, as emitted to the host and persisted in the journal.
    pub fn to_payload(&self) -> Payload {
        let mut map = Map::new();
        map.insert(KEY_ID.into(), self.id.into());
        map.insert(KEY_CHANNEL_ID.into(), self.channel_id.clone().into());
        map.insert(KEY_TITLE.into(), self.title.clone().into());
        map.insert(KEY_CONTENT.into(), self.content.clone().into());
        map.insert(KEY_SMALL_ICON_NAME.into(), self.small_icon_name.clone().into());
        map.insert(KEY_DELAY.into(), self.delay_seconds.into());
        if let Some(icon) = &self.large_icon_name {
            map.insert(KEY_LARGE_ICON_NAME.into(), icon.clone().into());
        }
        if let Some(interval) = self.interval_seconds {
            map.insert(KEY_INTERVAL.into(), interval.into());
        }
        if let Some(link) = &self.deeplink {
            map.insert(KEY_DEEPLINK.into(), link.clone().into());
        }
        if let Some(restart) = self.restart_app {
            map.insert(KEY_RESTART_APP.into(), restart.into());
        }
        if let Some(badge) = self.badge_count {
            map.insert(KEY_BADGE_COUNT.into(), badge.into());
        }
        if let Some(custom) = &self.custom_data {
            let obj: Map<String, serde_json::Value> =
                custom.iter().map(|(k, v)| (k.clone(), v.to_json())).collect();
            map.insert(KEY_CUSTOM_DATA.into(), serde_json::Value::Object(obj));
        }
        map
    }
}

fn invalid(key: &str, reason: &str) -> NudgeError {
    NudgeError::InvalidRecord(format!("'{key}': {reason}"))
}

fn required_int(payload: &Payload, key: &str) -> Result<i64> {
    optional_int(payload, key)?.ok_or_else(|| invalid(key, "missing"))
}

fn optional_int(payload: &Payload, key: &str) -> Result<Option<i64>> {
    match payload.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| invalid(key, "expected integer")),
    }
}

fn required_str(payload: &Payload, key: &str) -> Result<String> {
    optional_str(payload, key)?.ok_or_else(|| invalid(key, "missing"))
}

fn optional_str(payload: &Payload, key: &str) -> Result<Option<String>> {
    match payload.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(key, "expected string")),
    }
}

fn custom_data(id: i32, raw: Option<&serde_json::Value>) -> Result<Option<BTreeMap<String, Value>>> {
    let obj = match raw {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Object(obj)) => obj,
        Some(_) => return Err(invalid(KEY_CUSTOM_DATA, "expected object")),
    };
    let mut out = BTreeMap::new();
    for (key, value) in obj {
        match Value::from_json(value) {
            Some(v) => {
                out.insert(key.clone(), v);
            }
            None => tracing::warn!(
                "⚠️ Notification {id}: skipping custom_data '{key}' (unsupported value type)"
            ),
        }
    }
    Ok(Some(out))
}
