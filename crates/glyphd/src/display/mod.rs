//! Display driver abstraction.
//!
//! The monitor owns exactly one [`DisplayDriver`]. Drivers report their
//! connection lifecycle and raw hardware events through the [`DriverLink`]
//! handed to them on every connect.

mod console;
mod frame;
#[cfg(feature = "display_mqtt")]
mod mqtt;

use anyhow::bail;
use async_trait::async_trait;
use linkme::distributed_slice;
use tokio::sync::mpsc;
use tracing::debug;

pub use console::ConsoleDisplay;
pub use frame::MatrixFrame;
#[cfg(feature = "display_mqtt")]
pub use mqtt::MqttDisplay;

use crate::config::Config;
use crate::monitor::DriverEvent;
use crate::monitor::Input;
use crate::router::HardwareEventSender;
use crate::sprite::Sprite;

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("Display driver is not connected")]
    Disconnected,

    #[error("Display is not registered")]
    NotRegistered,

    #[error("Display transport error: {0}")]
    Transport(String),

    #[error("Cannot build frame: {0}")]
    Frame(String),
}

/// Callbacks from a driver into glyphd.
///
/// Cheap to clone; a driver keeps one for as long as its connection lives.
#[derive(Debug, Clone)]
pub struct DriverLink {
    lifecycle: mpsc::UnboundedSender<Input>,
    hardware: HardwareEventSender,
}

impl DriverLink {
    pub(crate) fn new(lifecycle: mpsc::UnboundedSender<Input>, hardware: HardwareEventSender) -> Self {
        Self {
            lifecycle,
            hardware,
        }
    }

    /// The connection handshake completed.
    pub fn connected(&self) {
        self.lifecycle_event(DriverEvent::Connected);
    }

    /// The link to the display dropped.
    pub fn disconnected(&self) {
        self.lifecycle_event(DriverEvent::Disconnected);
    }

    /// A hardware event (e.g. "change", "aod") arrived from the device.
    pub fn hardware_event(&self, name: &str) {
        self.hardware.send(name);
    }

    fn lifecycle_event(&self, event: DriverEvent) {
        if self.lifecycle.send(Input::Driver(event)).is_err() {
            debug!("Monitor is gone, dropping {:?}", event);
        }
    }
}

/// Contract between the monitor and the physical matrix.
#[async_trait]
pub trait DisplayDriver: Send {
    fn name(&self) -> &str;

    /// Matrix size as (width, height).
    fn dimensions(&self) -> (usize, usize);

    /// Start the connection handshake. Completion is reported through
    /// [`DriverLink::connected`]; failures through an error here or a later
    /// [`DriverLink::disconnected`].
    async fn connect(&mut self, link: DriverLink) -> Result<(), DisplayError>;

    async fn register(&mut self, device_id: &str) -> Result<(), DisplayError>;

    fn build_frame(&self, sprite: &Sprite) -> Result<MatrixFrame, DisplayError> {
        let (width, height) = self.dimensions();
        Ok(MatrixFrame::compose(sprite, width, height))
    }

    async fn push(&mut self, frame: MatrixFrame) -> Result<(), DisplayError>;

    async fn unregister(&mut self) -> Result<(), DisplayError>;

    /// Drop the connection and any background tasks.
    async fn release(&mut self);
}

/// Result type for display factory functions
pub type DisplayFactoryResult = anyhow::Result<Option<Box<dyn DisplayDriver>>>;

pub struct DisplayContext<'a> {
    pub config: &'a Config,
}

#[distributed_slice]
pub static DISPLAY_REGISTRY: [fn(&DisplayContext) -> DisplayFactoryResult];

/// Build the driver named by `display.driver`.
pub fn driver_from_config(config: &Config) -> anyhow::Result<Box<dyn DisplayDriver>> {
    let ctx = DisplayContext { config };
    for constr in DISPLAY_REGISTRY {
        if let Some(driver) = constr(&ctx)? {
            return Ok(driver);
        }
    }
    bail!("Unknown display driver: {}", config.display.driver)
}
