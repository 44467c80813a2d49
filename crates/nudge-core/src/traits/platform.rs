//! Permission, settings and channel services of the host platform.

use crate::channel::ChannelSpec;
use crate::error::Result;
use crate::record::LaunchDirective;

/// Outcome of asking the platform for a permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionRequest {
    /// Nothing to ask; the permission is already in place.
    AlreadyGranted,
    /// A system prompt was shown; the answer arrives later as a callback.
    Requested,
    /// The platform has no such permission (e.g. older OS versions).
    Unsupported,
}

/// Simple request/response platform services.
pub trait Platform: Send + Sync {
    fn has_notification_permission(&self) -> bool;

    fn request_notification_permission(&self) -> Result<PermissionRequest>;

    fn is_ignoring_battery_optimizations(&self) -> bool;

    fn request_ignore_battery_optimizations(&self) -> Result<PermissionRequest>;

    fn open_app_settings(&self) -> Result<()>;

    fn channel_exists(&self, channel_id: &str) -> bool;

    fn create_channel(&self, spec: &ChannelSpec) -> Result<()>;

    /// Bring the host to the foreground after a notification tap.
    fn launch_host(&self, directive: &LaunchDirective) -> Result<()>;
}
