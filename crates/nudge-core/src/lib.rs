//! # Nudge Core
//!
//! Shared types for the Nudge local notification scheduler: the notification record
//! and its payload boundary, channel specs, host events and result codes, the error
//! taxonomy, configuration, and the collaborator traits the scheduling core drives.

pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod record;
pub mod traits;
pub mod value;

pub use channel::{ChannelSpec, Importance};
pub use config::NudgeConfig;
pub use error::{NudgeError, Result};
pub use event::{EventName, EventPayload, ResultCode};
pub use record::{LaunchDirective, NotificationRecord, Payload};
pub use value::Value;
