//! Collaborator contracts consumed by the scheduling core.
//!
//! Everything platform-specific sits behind one of these traits so the core can be
//! driven by plain function calls in tests.

pub mod clock;
pub mod platform;
pub mod render;
pub mod sink;
pub mod timer;

pub use clock::{Clock, SystemClock};
pub use platform::{PermissionRequest, Platform};
pub use render::{NotificationSurface, PlatformNotification, Renderer};
pub use sink::EventSink;
pub use timer::{Timer, TimerFire};
