//! The monitor: a single task that owns the display session, polls the
//! selected entity and renders the matching sprite.
//!
//! ```text
//! Uninitialized -> Initializing -> Active <-> Reconnecting
//!                                     \            /
//!                                      -> TornDown <-
//! ```

mod message;
#[allow(clippy::module_inception)]
mod monitor;
mod session;

pub use message::Command;
pub use message::DriverEvent;
pub use monitor::Monitor;
pub use monitor::MonitorHandle;
pub use monitor::MonitorOptions;
pub use session::DeviceSnapshot;
pub use session::MonitorStatus;
pub use session::Phase;
pub use session::select_sprite;
pub(crate) use message::Input;
