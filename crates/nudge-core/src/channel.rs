//! Notification channels: named delivery categories registered before scheduling.

use serde::{Deserialize, Serialize};

use crate::error::{NudgeError, Result};
use crate::record::Payload;

/// Channel importance, ordered from least to most intrusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Min,
    Low,
    Default,
    High,
    Max,
}

impl Importance {
    /// Host API level: 1 = min … 5 = max.
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Importance::Min),
            2 => Some(Importance::Low),
            3 => Some(Importance::Default),
            4 => Some(Importance::High),
            5 => Some(Importance::Max),
            _ => None,
        }
    }
}

/// A channel registration request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub id: String,
    pub name: String,
    pub description: String,
    pub importance: Importance,
    pub badge_enabled: bool,
}

impl ChannelSpec {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            importance: Importance::Default,
            badge_enabled: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(NudgeError::InvalidRecord("channel id is empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(NudgeError::InvalidRecord(format!("channel '{}' has no name", self.id)));
        }
        Ok(())
    }

    /// Build from the host's `{id, name, description, importance, badge_enabled}` mapping.
    pub fn from_payload(payload: &Payload) -> Result<Self> {
        let text = |key: &str| payload.get(key).and_then(|v| v.as_str()).map(str::to_string);
        let importance = match payload.get("importance").and_then(|v| v.as_i64()) {
            Some(level) => Importance::from_level(level).ok_or_else(|| {
                NudgeError::InvalidRecord(format!("unknown channel importance {level}"))
            })?,
            None => Importance::Default,
        };
        let spec = Self {
            id: text("id").unwrap_or_default(),
            name: text("name").unwrap_or_default(),
            description: text("description").unwrap_or_default(),
            importance,
            badge_enabled: payload
                .get("badge_enabled")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
        };
        spec.validate()?;
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_payload() {
        let p = json!({"id": "rewards", "name": "Rewards", "importance": 4, "badge_enabled": true});
        let spec = ChannelSpec::from_payload(p.as_object().unwrap()).unwrap();
        assert_eq!(spec.importance, Importance::High);
        assert!(spec.badge_enabled);
        assert_eq!(spec.description, "");
    }

    #[test]
    fn test_invalid_channel() {
        assert!(ChannelSpec::new("", "x").validate().is_err());
        assert!(ChannelSpec::new("id", " ").validate().is_err());
        let p = json!({"id": "a", "name": "A", "importance": 9});
        assert!(ChannelSpec::from_payload(p.as_object().unwrap()).is_err());
    }
}
