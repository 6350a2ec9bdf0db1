//! Everything the monitor reacts to arrives as an [`Input`] on a single
//! queue, so the session is only ever touched from the monitor task.

use crate::ha::ApiError;
use crate::ha::Entity;
use crate::settings::Settings;

/// Requests from outside the monitor, sent through a
/// [`MonitorHandle`](super::MonitorHandle).
#[derive(Debug, Clone)]
pub enum Command {
    /// Load settings and connect the display. Repeated activations are
    /// ignored.
    Activate,
    /// A client went away. Polling keeps running.
    Unbind,
    /// Stop everything and release the driver.
    Teardown,
    Toggle,
    /// Poll right now.
    Refresh,
    /// Replace credentials and selected entity.
    Configure(Settings),
}

/// Lifecycle callbacks from the display driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverEvent {
    Connected,
    Disconnected,
}

#[derive(Debug)]
pub(crate) enum Input {
    Command(Command),
    Driver(DriverEvent),
    PollTick,
    ReconnectDue,
    /// The post-toggle delay has elapsed
    ReconcileDue,
    PollCompleted {
        entity_id: String,
        result: Result<Entity, ApiError>,
    },
    ToggleCompleted {
        entity_id: String,
        result: Result<(), ApiError>,
    },
}
