//! Hardware event routing.
//!
//! Drivers forward raw event names; the router turns them into monitor
//! commands in arrival order.

use std::str::FromStr;

use strum::Display;
use strum::EnumString;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;

use crate::monitor::MonitorHandle;

/// Hardware events the display can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ToyEvent {
    /// Long press on the glyph button
    Change,
    /// Always-on-display refresh tick
    Aod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Toggle,
    Refresh,
}

impl From<ToyEvent> for Action {
    fn from(event: ToyEvent) -> Self {
        match event {
            ToyEvent::Change => Action::Toggle,
            ToyEvent::Aod => Action::Refresh,
        }
    }
}

/// Map a raw event name to an action. Unknown names map to nothing.
pub fn route(name: &str) -> Option<Action> {
    ToyEvent::from_str(name.trim()).ok().map(Action::from)
}

/// Sending half given to drivers.
#[derive(Debug, Clone)]
pub struct HardwareEventSender(mpsc::UnboundedSender<String>);

impl HardwareEventSender {
    pub fn send(&self, name: &str) {
        if self.0.send(name.to_string()).is_err() {
            debug!("Event router is gone, dropping {:?}", name);
        }
    }
}

pub struct EventRouter {
    events: mpsc::UnboundedReceiver<String>,
    monitor: MonitorHandle,
}

impl EventRouter {
    pub fn channel() -> (HardwareEventSender, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (HardwareEventSender(tx), rx)
    }

    pub fn new(events: mpsc::UnboundedReceiver<String>, monitor: MonitorHandle) -> Self {
        Self { events, monitor }
    }

    /// Route events until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(name) = self.events.recv().await {
            self.handle(&name);
        }
        debug!("Event router exited");
    }

    fn handle(&self, name: &str) {
        match route(name) {
            Some(Action::Toggle) => {
                debug!("{} -> toggle", name);
                self.monitor.toggle();
            }
            Some(Action::Refresh) => {
                debug!("{} -> refresh", name);
                self.monitor.refresh();
            }
            None => info!("Ignoring unknown hardware event {:?}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route() {
        assert_eq!(route("change"), Some(Action::Toggle));
        assert_eq!(route("CHANGE"), Some(Action::Toggle));
        assert_eq!(route(" aod\n"), Some(Action::Refresh));
        assert_eq!(route("doubletap"), None);
        assert_eq!(route(""), None);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(ToyEvent::Change.to_string(), "change");
        assert_eq!(ToyEvent::Aod.to_string(), "aod");
    }
}
